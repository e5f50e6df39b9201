//! Ambient request metadata
//!
//! The entry builder never reads hidden global state. Request metadata is an
//! `AmbientContext` value, either passed explicitly or installed for the
//! current thread with [`AmbientContext::enter`] for the duration of a request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::Arc;

thread_local! {
    static CURRENT: RefCell<Option<Arc<AmbientContext>>> = const { RefCell::new(None) };
}

/// Request metadata read once per entry; absent fields are omitted
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AmbientContext {
    /// Host header, possibly with a port
    pub host: Option<String>,
    pub forwarded_for: Option<String>,
    pub remote_addr: Option<String>,
    pub method: Option<String>,
    pub uri: Option<String>,
    pub user_agent: Option<String>,
    /// Seeds the duration of the first entry
    pub request_start: Option<DateTime<Utc>>,
}

impl AmbientContext {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    #[must_use]
    pub fn with_forwarded_for(mut self, ip: impl Into<String>) -> Self {
        self.forwarded_for = Some(ip.into());
        self
    }

    #[must_use]
    pub fn with_remote_addr(mut self, ip: impl Into<String>) -> Self {
        self.remote_addr = Some(ip.into());
        self
    }

    #[must_use]
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    #[must_use]
    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    #[must_use]
    pub fn with_request_start(mut self, start: DateTime<Utc>) -> Self {
        self.request_start = Some(start);
        self
    }

    /// Read the CGI request variables from the process environment
    pub fn from_cgi_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any CGI-style variable lookup
    ///
    /// ```
    /// use rust_event_logger::AmbientContext;
    ///
    /// let ctx = AmbientContext::from_lookup(|key| match key {
    ///     "HTTP_HOST" => Some("shop.example:8443".to_string()),
    ///     "REQUEST_METHOD" => Some("POST".to_string()),
    ///     _ => None,
    /// });
    /// assert_eq!(ctx.host_name(), "shop.example");
    /// assert_eq!(ctx.method.as_deref(), Some("POST"));
    /// ```
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let present = |key: &str| lookup(key).filter(|value| !value.is_empty());

        Self {
            host: present("HTTP_HOST"),
            forwarded_for: present("HTTP_X_FORWARDED_FOR"),
            remote_addr: present("REMOTE_ADDR"),
            method: present("REQUEST_METHOD"),
            uri: present("REQUEST_URI"),
            user_agent: present("HTTP_USER_AGENT"),
            request_start: present("REQUEST_TIME_FLOAT")
                .and_then(|value| value.trim().parse::<f64>().ok())
                .and_then(|secs| {
                    let micros = (secs * 1_000_000.0) as i64;
                    DateTime::from_timestamp(
                        micros.div_euclid(1_000_000),
                        (micros.rem_euclid(1_000_000) * 1_000) as u32,
                    )
                }),
        }
    }

    /// Host without port, `"localhost"` when unknown
    pub fn host_name(&self) -> String {
        self.host
            .as_deref()
            .and_then(|host| host.split(':').find(|part| !part.is_empty()))
            .unwrap_or("localhost")
            .to_string()
    }

    /// Forwarded address when present, else the peer address
    pub fn client_ip(&self) -> Option<&str> {
        non_empty(&self.forwarded_for).or_else(|| non_empty(&self.remote_addr))
    }

    /// Install as the current thread's request context
    ///
    /// The previous context is restored when the returned scope drops.
    pub fn enter(self) -> RequestScope {
        let previous = CURRENT.with(|current| current.replace(Some(Arc::new(self))));
        RequestScope {
            previous,
            _thread_bound: PhantomData,
        }
    }

    /// The current thread's request context, or an empty one
    pub fn current() -> Arc<AmbientContext> {
        CURRENT
            .with(|current| current.borrow().clone())
            .unwrap_or_default()
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Guard for a request context installed with [`AmbientContext::enter`]
#[must_use = "the request context is removed as soon as the scope drops"]
pub struct RequestScope {
    previous: Option<Arc<AmbientContext>>,
    _thread_bound: PhantomData<Rc<()>>,
}

impl Drop for RequestScope {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT.with(|current| *current.borrow_mut() = previous);
    }
}

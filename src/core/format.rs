//! Message parts and printf-style formatting
//!
//! Entries are assembled from message parts. When more than one part is
//! given, the first one is tried as a format string for the rest.

use serde_json::{Number, Value};
use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

/// A scalar message part
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Str(String),
    Int(i64),
    UInt(u64),
    Float(f64),
}

impl Scalar {
    pub fn from_number(number: &Number) -> Self {
        if let Some(i) = number.as_i64() {
            Scalar::Int(i)
        } else if let Some(u) = number.as_u64() {
            Scalar::UInt(u)
        } else {
            Scalar::Float(number.as_f64().unwrap_or(0.0))
        }
    }

    /// Integer reading of the part; strings contribute their numeric prefix
    pub fn as_i64(&self) -> i64 {
        match self {
            Scalar::Str(s) => leading_int(s),
            Scalar::Int(i) => *i,
            Scalar::UInt(u) => *u as i64,
            Scalar::Float(f) => *f as i64,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match self {
            Scalar::Str(s) => leading_float(s),
            Scalar::Int(i) => *i as f64,
            Scalar::UInt(u) => *u as f64,
            Scalar::Float(f) => *f,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Scalar::Str(s) => Value::String(s.clone()),
            Scalar::Int(i) => Value::from(*i),
            Scalar::UInt(u) => Value::from(*u),
            Scalar::Float(f) => Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Str(s) => f.write_str(s),
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::UInt(u) => write!(f, "{}", u),
            Scalar::Float(fl) if fl.is_nan() => f.write_str("NAN"),
            Scalar::Float(fl) if fl.is_infinite() => {
                f.write_str(if *fl > 0.0 { "INF" } else { "-INF" })
            }
            Scalar::Float(fl) => write!(f, "{}", fl),
        }
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::Str(s)
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Str(s.to_string())
    }
}

macro_rules! scalar_from {
    ($variant:ident as $target:ty: $($ty:ty),*) => {$(
        impl From<$ty> for Scalar {
            fn from(value: $ty) -> Self {
                Scalar::$variant(value as $target)
            }
        }
    )*};
}

scalar_from!(Int as i64: i8, i16, i32, i64, isize);
scalar_from!(UInt as u64: u8, u16, u32, u64, usize);
scalar_from!(Float as f64: f32, f64);

fn numeric_prefix(s: &str, allow_fraction: bool) -> &str {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if allow_fraction {
        if end < bytes.len() && bytes[end] == b'.' {
            end += 1;
            while end < bytes.len() && bytes[end].is_ascii_digit() {
                end += 1;
            }
        }
        if end > digits_start && end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
            let mut exp_end = end + 1;
            if matches!(bytes.get(exp_end), Some(b'+') | Some(b'-')) {
                exp_end += 1;
            }
            let exp_digits = exp_end;
            while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
                exp_end += 1;
            }
            if exp_end > exp_digits {
                end = exp_end;
            }
        }
    }
    &s[..end]
}

fn leading_int(s: &str) -> i64 {
    let float_prefix = numeric_prefix(s, true);
    let int_prefix = numeric_prefix(s, false);
    if float_prefix.len() > int_prefix.len() {
        return leading_float(s) as i64;
    }
    match int_prefix.parse::<i64>() {
        Ok(value) => value,
        Err(_) if int_prefix.len() > 1 => {
            if int_prefix.starts_with('-') {
                i64::MIN
            } else {
                i64::MAX
            }
        }
        Err(_) => 0,
    }
}

fn leading_float(s: &str) -> f64 {
    numeric_prefix(s, true).parse().unwrap_or(0.0)
}

/// Largest accepted width or precision
pub const MAX_FIELD_WIDTH: usize = 4096;

#[derive(Debug, Default)]
struct Spec {
    arg_num: Option<usize>,
    left: bool,
    plus: bool,
    pad: Option<char>,
    width: usize,
    precision: Option<usize>,
}

/// Format `format` with printf-style conversions.
///
/// Supports `%%`, positional arguments (`%2$s`), the flags `-`, `+`, `0`,
/// space and `'c` (custom pad), width, precision and the conversions
/// `b c d e E f F o s u x X`. Returns `None` on an unknown conversion,
/// when the format asks for more arguments than were given, or when a
/// width or precision exceeds [`MAX_FIELD_WIDTH`].
///
/// ```
/// use rust_event_logger::core::format::{sprintf, Scalar};
///
/// assert_eq!(sprintf("count: %d", &[Scalar::Int(3)]).as_deref(), Some("count: 3"));
/// assert_eq!(sprintf("%05.1f", &[Scalar::Float(2.34)]).as_deref(), Some("002.3"));
/// assert_eq!(sprintf("%s and %s", &[Scalar::from("one")]), None);
/// ```
pub fn sprintf(format: &str, args: &[Scalar]) -> Option<String> {
    let mut out = String::with_capacity(format.len() + 16);
    let mut chars = format.chars().peekable();
    let mut next_arg = 0;

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        if chars.peek() == Some(&'%') {
            chars.next();
            out.push('%');
            continue;
        }

        let mut spec = Spec::default();

        // Positional argument: digits followed by '$'
        let mut lookahead = chars.clone();
        let mut digits = String::new();
        while let Some(d) = lookahead.peek().copied().filter(char::is_ascii_digit) {
            digits.push(d);
            lookahead.next();
        }
        if !digits.is_empty() && lookahead.peek() == Some(&'$') {
            lookahead.next();
            let position: usize = digits.parse().ok()?;
            if position == 0 {
                return None;
            }
            spec.arg_num = Some(position - 1);
            chars = lookahead;
        }

        loop {
            match chars.peek().copied() {
                Some('-') => spec.left = true,
                Some('+') => spec.plus = true,
                Some('0') => spec.pad = Some('0'),
                Some(' ') => spec.pad = Some(' '),
                Some('\'') => {
                    chars.next();
                    spec.pad = Some(chars.peek().copied()?);
                }
                _ => break,
            }
            chars.next();
        }

        spec.width = read_bound(&mut chars)?;

        if chars.peek() == Some(&'.') {
            chars.next();
            spec.precision = Some(read_bound(&mut chars)?);
        }

        let conversion = chars.next()?;
        let arg = match spec.arg_num {
            Some(index) => args.get(index)?,
            None => {
                let arg = args.get(next_arg)?;
                next_arg += 1;
                arg
            }
        };

        let (body, numeric) = convert(conversion, arg, &spec)?;
        out.push_str(&pad(body, numeric, &spec));
    }

    Some(out)
}

// Width or precision digits; `None` once the value exceeds MAX_FIELD_WIDTH
fn read_bound(chars: &mut Peekable<Chars<'_>>) -> Option<usize> {
    let mut value: usize = 0;
    while let Some(d) = chars.peek().and_then(|c| c.to_digit(10)) {
        value = value.checked_mul(10)?.checked_add(d as usize)?;
        if value > MAX_FIELD_WIDTH {
            return None;
        }
        chars.next();
    }
    Some(value)
}

fn signed(value: String, negative: bool, plus: bool) -> String {
    if !negative && plus {
        format!("+{}", value)
    } else {
        value
    }
}

fn convert(conversion: char, arg: &Scalar, spec: &Spec) -> Option<(String, bool)> {
    let converted = match conversion {
        'd' => {
            let value = arg.as_i64();
            (signed(value.to_string(), value < 0, spec.plus), true)
        }
        'u' => (format!("{}", arg.as_i64() as u64), true),
        'f' | 'F' => {
            let value = arg.as_f64();
            let text = format!("{:.*}", spec.precision.unwrap_or(6), value);
            (signed(text, value.is_sign_negative(), spec.plus), true)
        }
        'e' | 'E' => {
            let value = arg.as_f64();
            let text = exponent(value, spec.precision.unwrap_or(6));
            let text = if conversion == 'E' {
                text.to_uppercase()
            } else {
                text
            };
            (signed(text, value.is_sign_negative(), spec.plus), true)
        }
        's' => {
            let text = arg.to_string();
            let text = match spec.precision {
                Some(limit) => text.chars().take(limit).collect(),
                None => text,
            };
            (text, false)
        }
        'x' => (format!("{:x}", arg.as_i64() as u64), false),
        'X' => (format!("{:X}", arg.as_i64() as u64), false),
        'o' => (format!("{:o}", arg.as_i64() as u64), false),
        'b' => (format!("{:b}", arg.as_i64() as u64), false),
        'c' => (char::from((arg.as_i64() & 0xff) as u8).to_string(), false),
        _ => return None,
    };
    Some(converted)
}

// Exponent without zero padding and with an explicit sign: 1.5e+3
fn exponent(value: f64, precision: usize) -> String {
    let text = format!("{:.*e}", precision, value);
    match text.split_once('e') {
        Some((mantissa, exp)) if exp.starts_with('-') => format!("{}e{}", mantissa, exp),
        Some((mantissa, exp)) => format!("{}e+{}", mantissa, exp),
        None => text,
    }
}

fn pad(body: String, numeric: bool, spec: &Spec) -> String {
    let len = body.chars().count();
    if len >= spec.width {
        return body;
    }
    let fill = spec.width - len;
    let pad_char = spec.pad.unwrap_or(' ');

    if spec.left {
        let pad_char = if pad_char == '0' { ' ' } else { pad_char };
        return format!("{}{}", body, pad_char.to_string().repeat(fill));
    }

    if pad_char == '0' && numeric && (body.starts_with('-') || body.starts_with('+')) {
        let (sign, digits) = body.split_at(1);
        return format!("{}{}{}", sign, "0".repeat(fill), digits);
    }

    format!("{}{}", pad_char.to_string().repeat(fill), body)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(format: &str, args: &[Scalar]) -> Option<String> {
        sprintf(format, args)
    }

    #[test]
    fn test_basic_conversions() {
        assert_eq!(fmt("count: %d", &[3.into()]).unwrap(), "count: 3");
        assert_eq!(fmt("%s=%s", &["a".into(), 1.into()]).unwrap(), "a=1");
        assert_eq!(fmt("%u", &[(-1i64).into()]).unwrap(), u64::MAX.to_string());
        assert_eq!(fmt("%x|%X|%o|%b", &[255.into(), 255.into(), 8.into(), 5.into()]).unwrap(), "ff|FF|10|101");
        assert_eq!(fmt("%c", &[65.into()]).unwrap(), "A");
        assert_eq!(fmt("100%%", &[]).unwrap(), "100%");
    }

    #[test]
    fn test_floats() {
        assert_eq!(fmt("%f", &[1.5.into()]).unwrap(), "1.500000");
        assert_eq!(fmt("%.2f", &[3.14159.into()]).unwrap(), "3.14");
        assert_eq!(fmt("%e", &[1234.5.into()]).unwrap(), "1.234500e+3");
        assert_eq!(fmt("%.1E", &[0.05.into()]).unwrap(), "5.0E-2");
    }

    #[test]
    fn test_padding_and_flags() {
        assert_eq!(fmt("[%5d]", &[42.into()]).unwrap(), "[   42]");
        assert_eq!(fmt("[%-5d]", &[42.into()]).unwrap(), "[42   ]");
        assert_eq!(fmt("[%05d]", &[(-42).into()]).unwrap(), "[-0042]");
        assert_eq!(fmt("[%+d]", &[7.into()]).unwrap(), "[+7]");
        assert_eq!(fmt("[%'*6s]", &["ab".into()]).unwrap(), "[****ab]");
        assert_eq!(fmt("[%.3s]", &["abcdef".into()]).unwrap(), "[abc]");
    }

    #[test]
    fn test_positional_arguments() {
        assert_eq!(
            fmt("%2$s %1$s", &["world".into(), "hello".into()]).unwrap(),
            "hello world"
        );
    }

    #[test]
    fn test_failures() {
        assert_eq!(fmt("%d and %d", &[1.into()]), None);
        assert_eq!(fmt("%y", &[1.into()]), None);
        assert_eq!(fmt("%0$s", &[1.into()]), None);
        assert_eq!(fmt("trailing %", &[1.into()]), None);
    }

    #[test]
    fn test_oversized_width_and_precision() {
        assert_eq!(fmt("%99999999999999999999d", &[1.into()]), None);
        assert_eq!(fmt("%.99999999999999999999f", &[1.5.into()]), None);
        assert_eq!(fmt("%9999999999d", &[1.into()]), None);
        assert_eq!(fmt("%4097s", &["a".into()]), None);

        let padded = fmt("%4096d", &[1.into()]).unwrap();
        assert_eq!(padded.len(), MAX_FIELD_WIDTH);
        assert_eq!(fmt("%.4096f", &[1.into()]).unwrap().len(), 4098);
    }

    #[test]
    fn test_extra_arguments_are_ignored() {
        assert_eq!(fmt("User", &["logged in".into()]).unwrap(), "User");
    }

    #[test]
    fn test_string_numeric_prefix() {
        assert_eq!(Scalar::from("12abc").as_i64(), 12);
        assert_eq!(Scalar::from("  -7").as_i64(), -7);
        assert_eq!(Scalar::from("abc").as_i64(), 0);
        assert_eq!(Scalar::from("2.5kg").as_f64(), 2.5);
        assert_eq!(Scalar::from("1e3").as_i64(), 1000);
    }

    #[test]
    fn test_scalar_display() {
        assert_eq!(Scalar::Float(3.0).to_string(), "3");
        assert_eq!(Scalar::Float(0.1).to_string(), "0.1");
        assert_eq!(Scalar::Float(f64::NAN).to_string(), "NAN");
        assert_eq!(Scalar::UInt(u64::MAX).to_string(), u64::MAX.to_string());
    }
}

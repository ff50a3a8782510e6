use chrono::{FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use core::fmt;
use rust_decimal::Decimal;

use super::temporal;
use super::types::XmlTypeCode;

/// A single atomic value. Every variant maps to exactly one schema type code.
#[derive(Debug, Clone, PartialEq)]
pub enum XdmAtomicValue {
    Boolean(bool),
    String(String),
    UntypedAtomic(String),
    AnyUri(String),
    // string-derived
    NormalizedString(String),
    Token(String),
    Language(String),
    NmToken(String),
    Name(String),
    NcName(String),
    Id(String),
    IdRef(String),
    Entity(String),
    // numeric family
    Decimal(Decimal),
    Integer(i64),
    NonPositiveInteger(i64),
    NegativeInteger(i64),
    Long(i64),
    Int(i32),
    Short(i16),
    Byte(i8),
    NonNegativeInteger(u64),
    UnsignedLong(u64),
    UnsignedInt(u32),
    UnsignedShort(u16),
    UnsignedByte(u8),
    PositiveInteger(u64),
    Float(f32),
    Double(f64),
    // durations: months and (decimal) seconds are kept separately
    Duration {
        months: i32,
        seconds: Decimal,
    },
    YearMonthDuration(i32),
    DayTimeDuration(Decimal),
    // date/time family
    DateTime {
        value: NaiveDateTime,
        tz: Option<FixedOffset>,
    },
    Date {
        date: NaiveDate,
        tz: Option<FixedOffset>,
    },
    Time {
        time: NaiveTime,
        tz: Option<FixedOffset>,
    },
    GYearMonth {
        year: i32,
        month: u32,
        tz: Option<FixedOffset>,
    },
    GYear {
        year: i32,
        tz: Option<FixedOffset>,
    },
    GMonthDay {
        month: u32,
        day: u32,
        tz: Option<FixedOffset>,
    },
    GDay {
        day: u32,
        tz: Option<FixedOffset>,
    },
    GMonth {
        month: u32,
        tz: Option<FixedOffset>,
    },
    HexBinary(Vec<u8>),
    Base64Binary(Vec<u8>),
    QName {
        ns_uri: Option<String>,
        prefix: Option<String>,
        local: String,
    },
    Notation(String),
}

impl XdmAtomicValue {
    pub fn type_code(&self) -> XmlTypeCode {
        use XdmAtomicValue as V;
        match self {
            V::Boolean(_) => XmlTypeCode::Boolean,
            V::String(_) => XmlTypeCode::String,
            V::UntypedAtomic(_) => XmlTypeCode::UntypedAtomic,
            V::AnyUri(_) => XmlTypeCode::AnyUri,
            V::NormalizedString(_) => XmlTypeCode::NormalizedString,
            V::Token(_) => XmlTypeCode::Token,
            V::Language(_) => XmlTypeCode::Language,
            V::NmToken(_) => XmlTypeCode::NmToken,
            V::Name(_) => XmlTypeCode::Name,
            V::NcName(_) => XmlTypeCode::NcName,
            V::Id(_) => XmlTypeCode::Id,
            V::IdRef(_) => XmlTypeCode::IdRef,
            V::Entity(_) => XmlTypeCode::Entity,
            V::Decimal(_) => XmlTypeCode::Decimal,
            V::Integer(_) => XmlTypeCode::Integer,
            V::NonPositiveInteger(_) => XmlTypeCode::NonPositiveInteger,
            V::NegativeInteger(_) => XmlTypeCode::NegativeInteger,
            V::Long(_) => XmlTypeCode::Long,
            V::Int(_) => XmlTypeCode::Int,
            V::Short(_) => XmlTypeCode::Short,
            V::Byte(_) => XmlTypeCode::Byte,
            V::NonNegativeInteger(_) => XmlTypeCode::NonNegativeInteger,
            V::UnsignedLong(_) => XmlTypeCode::UnsignedLong,
            V::UnsignedInt(_) => XmlTypeCode::UnsignedInt,
            V::UnsignedShort(_) => XmlTypeCode::UnsignedShort,
            V::UnsignedByte(_) => XmlTypeCode::UnsignedByte,
            V::PositiveInteger(_) => XmlTypeCode::PositiveInteger,
            V::Float(_) => XmlTypeCode::Float,
            V::Double(_) => XmlTypeCode::Double,
            V::Duration { .. } => XmlTypeCode::Duration,
            V::YearMonthDuration(_) => XmlTypeCode::YearMonthDuration,
            V::DayTimeDuration(_) => XmlTypeCode::DayTimeDuration,
            V::DateTime { .. } => XmlTypeCode::DateTime,
            V::Date { .. } => XmlTypeCode::Date,
            V::Time { .. } => XmlTypeCode::Time,
            V::GYearMonth { .. } => XmlTypeCode::GYearMonth,
            V::GYear { .. } => XmlTypeCode::GYear,
            V::GMonthDay { .. } => XmlTypeCode::GMonthDay,
            V::GDay { .. } => XmlTypeCode::GDay,
            V::GMonth { .. } => XmlTypeCode::GMonth,
            V::HexBinary(_) => XmlTypeCode::HexBinary,
            V::Base64Binary(_) => XmlTypeCode::Base64Binary,
            V::QName { .. } => XmlTypeCode::QName,
            V::Notation(_) => XmlTypeCode::Notation,
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.type_code().is_numeric()
    }

    /// `xs:string` and its subtypes, `xs:untypedAtomic` and `xs:anyURI`:
    /// the values that compare by their string form.
    pub fn is_string_like(&self) -> bool {
        let code = self.type_code();
        code.is_string_derived() || matches!(code, XmlTypeCode::UntypedAtomic | XmlTypeCode::AnyUri)
    }

    pub fn is_duration(&self) -> bool {
        self.type_code().is_duration()
    }

    /// Borrow the payload of a string-like value.
    pub fn as_str(&self) -> Option<&str> {
        use XdmAtomicValue as V;
        match self {
            V::String(s)
            | V::UntypedAtomic(s)
            | V::AnyUri(s)
            | V::NormalizedString(s)
            | V::Token(s)
            | V::Language(s)
            | V::NmToken(s)
            | V::Name(s)
            | V::NcName(s)
            | V::Id(s)
            | V::IdRef(s)
            | V::Entity(s)
            | V::Notation(s) => Some(s),
            _ => None,
        }
    }

    /// Integer-derived payload widened to `i128`.
    pub fn as_integer(&self) -> Option<i128> {
        use XdmAtomicValue as V;
        Some(match self {
            V::Integer(v) | V::NonPositiveInteger(v) | V::NegativeInteger(v) | V::Long(v) => i128::from(*v),
            V::Int(v) => i128::from(*v),
            V::Short(v) => i128::from(*v),
            V::Byte(v) => i128::from(*v),
            V::NonNegativeInteger(v) | V::UnsignedLong(v) | V::PositiveInteger(v) => i128::from(*v),
            V::UnsignedInt(v) => i128::from(*v),
            V::UnsignedShort(v) => i128::from(*v),
            V::UnsignedByte(v) => i128::from(*v),
            _ => return None,
        })
    }

    /// Canonical lexical representation (the result of `cast as xs:string`).
    pub fn string_value(&self) -> String {
        use XdmAtomicValue as V;
        if let Some(s) = self.as_str() {
            return s.to_string();
        }
        if let Some(i) = self.as_integer() {
            return i.to_string();
        }
        match self {
            V::Boolean(b) => b.to_string(),
            V::Decimal(d) => format_decimal(*d),
            V::Float(f) => format_float(*f),
            V::Double(d) => format_double(*d),
            V::Duration { months, seconds } => temporal::format_duration(*months, *seconds),
            V::YearMonthDuration(m) => temporal::format_year_month_duration(*m),
            V::DayTimeDuration(s) => temporal::format_day_time_duration(*s),
            V::DateTime { value, tz } => temporal::format_date_time(*value, *tz),
            V::Date { date, tz } => temporal::format_date(*date, *tz),
            V::Time { time, tz } => temporal::format_time(*time, *tz),
            V::GYearMonth { year, month, tz } => temporal::format_g_year_month(*year, *month, *tz),
            V::GYear { year, tz } => temporal::format_g_year(*year, *tz),
            V::GMonthDay { month, day, tz } => temporal::format_g_month_day(*month, *day, *tz),
            V::GDay { day, tz } => temporal::format_g_day(*day, *tz),
            V::GMonth { month, tz } => temporal::format_g_month(*month, *tz),
            V::HexBinary(b) => encode_hex_upper(b),
            V::Base64Binary(b) => {
                use base64::Engine as _;
                base64::engine::general_purpose::STANDARD.encode(b)
            }
            V::QName { prefix, local, .. } => match prefix {
                Some(p) if !p.is_empty() => format!("{p}:{local}"),
                _ => local.clone(),
            },
            _ => String::new(),
        }
    }
}

impl fmt::Display for XdmAtomicValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.string_value())
    }
}

impl From<bool> for XdmAtomicValue {
    fn from(b: bool) -> Self {
        XdmAtomicValue::Boolean(b)
    }
}

impl From<i64> for XdmAtomicValue {
    fn from(i: i64) -> Self {
        XdmAtomicValue::Integer(i)
    }
}

impl From<f64> for XdmAtomicValue {
    fn from(d: f64) -> Self {
        XdmAtomicValue::Double(d)
    }
}

impl From<Decimal> for XdmAtomicValue {
    fn from(d: Decimal) -> Self {
        XdmAtomicValue::Decimal(d)
    }
}

impl From<&str> for XdmAtomicValue {
    fn from(s: &str) -> Self {
        XdmAtomicValue::String(s.to_string())
    }
}

impl From<String> for XdmAtomicValue {
    fn from(s: String) -> Self {
        XdmAtomicValue::String(s)
    }
}

pub fn encode_hex_upper(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push(HEX[(b >> 4) as usize] as char);
        out.push(HEX[(b & 0x0f) as usize] as char);
    }
    out
}

/// xs:decimal canonical form: no exponent, no trailing fractional zeros, `1.0` prints as `1`.
pub fn format_decimal(d: Decimal) -> String {
    let n = d.normalize();
    let s = n.to_string();
    if s == "-0" { "0".to_string() } else { s }
}

/// xs:double canonical form (XPath 2.0 casting rules): plain decimal notation for
/// magnitudes in `[1e-6, 1e6)`, otherwise `mantissa E exponent`.
pub fn format_double(d: f64) -> String {
    if d.is_nan() {
        return "NaN".to_string();
    }
    if d.is_infinite() {
        return if d > 0.0 { "INF" } else { "-INF" }.to_string();
    }
    if d == 0.0 {
        return if d.is_sign_negative() { "-0" } else { "0" }.to_string();
    }
    let abs = d.abs();
    if (1e-6..1e6).contains(&abs) {
        let s = format!("{d}");
        return trim_fraction(&s);
    }
    format_scientific(&format!("{d:E}"))
}

pub fn format_float(f: f32) -> String {
    if f.is_nan() {
        return "NaN".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "INF" } else { "-INF" }.to_string();
    }
    if f == 0.0 {
        return if f.is_sign_negative() { "-0" } else { "0" }.to_string();
    }
    let abs = f.abs();
    if (1e-6..1e6).contains(&abs) {
        let s = format!("{f}");
        return trim_fraction(&s);
    }
    format_scientific(&format!("{f:E}"))
}

fn trim_fraction(s: &str) -> String {
    if let Some((int, frac)) = s.split_once('.') {
        let frac = frac.trim_end_matches('0');
        if frac.is_empty() { int.to_string() } else { format!("{int}.{frac}") }
    } else {
        s.to_string()
    }
}

/// Rust renders `1E7`; the canonical form needs at least one fractional digit (`1.0E7`).
fn format_scientific(s: &str) -> String {
    let Some((mantissa, exp)) = s.split_once('E') else {
        return s.to_string();
    };
    let mantissa = if mantissa.contains('.') { mantissa.to_string() } else { format!("{mantissa}.0") };
    format!("{mantissa}E{exp}")
}

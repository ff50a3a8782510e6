//! `cast as`: value-level conversion between the built-in atomic types.
//!
//! Follows the casting table of F&O 1.0 section 17.1. The source is first
//! classified by its primitive type; string-like sources (including
//! `xs:untypedAtomic`) go through the target's lexical space.

use base64::Engine as _;
use chrono::{Datelike, NaiveTime, Timelike};
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};

use crate::engine::runtime::{Error, ErrorCode, StaticContext};
use crate::xdm::XdmAtomicValue as V;
use crate::xdm::temporal::{self, DurationForm};
use crate::xdm::{XdmAtomicValue, XmlTypeCode};

use super::numeric::{NumKind, classify};

fn invalid(target: XmlTypeCode, s: &str) -> Error {
    Error::from_code(ErrorCode::FORG0001, format!("cannot cast '{s}' to {target}"))
}

fn not_castable(v: &XdmAtomicValue, target: XmlTypeCode) -> Error {
    Error::from_code(
        ErrorCode::XPTY0004,
        format!("casting from {} to {target} is not allowed", v.type_code()),
    )
}

/// XML whitespace collapse: runs of `#x20 | #x9 | #xD | #xA` become one space,
/// leading and trailing whitespace is removed.
pub(crate) fn collapse_whitespace(s: &str) -> String {
    s.split([' ', '\t', '\r', '\n']).filter(|p| !p.is_empty()).collect::<Vec<_>>().join(" ")
}

pub(crate) fn is_ncname(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '-' | '.' | '_' | '\u{B7}'))
}

fn is_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '-' | '.' | '_' | ':' | '\u{B7}'))
}

fn is_nmtoken(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_alphanumeric() || matches!(c, '-' | '.' | '_' | ':' | '\u{B7}'))
}

fn is_language(s: &str) -> bool {
    let mut parts = s.split('-');
    let first_ok = parts
        .next()
        .is_some_and(|p| (1..=8).contains(&p.len()) && p.chars().all(|c| c.is_ascii_alphabetic()));
    first_ok && parts.all(|p| (1..=8).contains(&p.len()) && p.chars().all(|c| c.is_ascii_alphanumeric()))
}

fn string_to_string_type(target: XmlTypeCode, s: &str) -> Result<XdmAtomicValue, Error> {
    let normalized = || s.replace(['\t', '\r', '\n'], " ");
    let token = || collapse_whitespace(s);
    Ok(match target {
        XmlTypeCode::String => V::String(s.to_string()),
        XmlTypeCode::NormalizedString => V::NormalizedString(normalized()),
        XmlTypeCode::Token => V::Token(token()),
        XmlTypeCode::Language => {
            let t = token();
            if !is_language(&t) {
                return Err(invalid(target, s));
            }
            V::Language(t)
        }
        XmlTypeCode::NmToken => {
            let t = token();
            if !is_nmtoken(&t) {
                return Err(invalid(target, s));
            }
            V::NmToken(t)
        }
        XmlTypeCode::Name => {
            let t = token();
            if !is_name(&t) {
                return Err(invalid(target, s));
            }
            V::Name(t)
        }
        XmlTypeCode::NcName | XmlTypeCode::Id | XmlTypeCode::IdRef | XmlTypeCode::Entity => {
            let t = token();
            if !is_ncname(&t) {
                return Err(invalid(target, s));
            }
            match target {
                XmlTypeCode::NcName => V::NcName(t),
                XmlTypeCode::Id => V::Id(t),
                XmlTypeCode::IdRef => V::IdRef(t),
                _ => V::Entity(t),
            }
        }
        _ => return Err(invalid(target, s)),
    })
}

/// Build an integer-derived value, checking the facets of `target`.
pub(crate) fn integer_value(target: XmlTypeCode, i: i128) -> Result<XdmAtomicValue, Error> {
    let out_of_range = || Error::from_code(ErrorCode::FORG0001, format!("{i} is out of range for {target}"));
    Ok(match target {
        XmlTypeCode::Integer => V::Integer(
            i64::try_from(i).map_err(|_| Error::from_code(ErrorCode::FOCA0003, format!("{i} is too large for xs:integer")))?,
        ),
        XmlTypeCode::Long => V::Long(i64::try_from(i).map_err(|_| out_of_range())?),
        XmlTypeCode::Int => V::Int(i32::try_from(i).map_err(|_| out_of_range())?),
        XmlTypeCode::Short => V::Short(i16::try_from(i).map_err(|_| out_of_range())?),
        XmlTypeCode::Byte => V::Byte(i8::try_from(i).map_err(|_| out_of_range())?),
        XmlTypeCode::NonPositiveInteger if i <= 0 => {
            V::NonPositiveInteger(i64::try_from(i).map_err(|_| out_of_range())?)
        }
        XmlTypeCode::NegativeInteger if i < 0 => V::NegativeInteger(i64::try_from(i).map_err(|_| out_of_range())?),
        XmlTypeCode::NonNegativeInteger => V::NonNegativeInteger(u64::try_from(i).map_err(|_| out_of_range())?),
        XmlTypeCode::UnsignedLong => V::UnsignedLong(u64::try_from(i).map_err(|_| out_of_range())?),
        XmlTypeCode::UnsignedInt => V::UnsignedInt(u32::try_from(i).map_err(|_| out_of_range())?),
        XmlTypeCode::UnsignedShort => V::UnsignedShort(u16::try_from(i).map_err(|_| out_of_range())?),
        XmlTypeCode::UnsignedByte => V::UnsignedByte(u8::try_from(i).map_err(|_| out_of_range())?),
        XmlTypeCode::PositiveInteger if i > 0 => V::PositiveInteger(u64::try_from(i).map_err(|_| out_of_range())?),
        _ => return Err(out_of_range()),
    })
}

fn parse_integer_lexical(target: XmlTypeCode, s: &str) -> Result<i128, Error> {
    let t = s.trim();
    let digits = t.strip_prefix(['+', '-']).unwrap_or(t);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid(target, s));
    }
    t.parse::<i128>()
        .map_err(|_| Error::from_code(ErrorCode::FOCA0003, format!("'{s}' is too large for {target}")))
}

fn parse_decimal_lexical(s: &str) -> Result<Decimal, Error> {
    let t = s.trim();
    let body = t.strip_prefix(['+', '-']).unwrap_or(t);
    let valid = !body.is_empty()
        && body != "."
        && body.chars().filter(|c| *c == '.').count() <= 1
        && body.chars().all(|c| c.is_ascii_digit() || c == '.');
    if !valid {
        return Err(invalid(XmlTypeCode::Decimal, s));
    }
    let t = t.strip_prefix('+').unwrap_or(t);
    t.parse::<Decimal>()
        .map_err(|_| Error::from_code(ErrorCode::FOCA0001, format!("'{s}' is too large for xs:decimal")))
}

/// `xs:double` lexical space: decimal or exponent notation, `INF`, `-INF`, `NaN`.
pub(crate) fn parse_double_lexical(s: &str) -> Option<f64> {
    let t = s.trim();
    match t {
        "INF" => return Some(f64::INFINITY),
        "-INF" => return Some(f64::NEG_INFINITY),
        "NaN" => return Some(f64::NAN),
        _ => {}
    }
    let body = t.strip_prefix(['+', '-']).unwrap_or(t);
    let ok = !body.is_empty()
        && body.chars().all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
        && body.chars().next().is_some_and(|c| c.is_ascii_digit() || c == '.');
    if !ok {
        return None;
    }
    t.parse::<f64>().ok()
}

fn decimal_from_f64(target: XmlTypeCode, f: f64) -> Result<Decimal, Error> {
    if f.is_nan() || f.is_infinite() {
        return Err(Error::from_code(ErrorCode::FOCA0002, format!("cannot cast {f} to {target}")));
    }
    Decimal::from_f64(f).ok_or_else(|| Error::from_code(ErrorCode::FOCA0001, format!("{f} is too large for {target}")))
}

fn numeric_to_target(n: NumKind, target: XmlTypeCode) -> Result<XdmAtomicValue, Error> {
    match target {
        XmlTypeCode::Double => Ok(V::Double(n.to_f64())),
        XmlTypeCode::Float => Ok(V::Float(match n {
            NumKind::Float(f) => f,
            other => other.to_f64() as f32,
        })),
        XmlTypeCode::Decimal => Ok(V::Decimal(match n {
            NumKind::Int(i) => Decimal::from(i),
            NumKind::Dec(d) => d,
            NumKind::Float(f) => decimal_from_f64(target, f64::from(f))?,
            NumKind::Double(d) => decimal_from_f64(target, d)?,
        })),
        t if t.is_integer_derived() => {
            let i: i128 = match n {
                NumKind::Int(i) => i128::from(i),
                NumKind::Dec(d) => d
                    .trunc()
                    .to_i128()
                    .ok_or_else(|| Error::from_code(ErrorCode::FOCA0003, format!("{d} is too large for {t}")))?,
                NumKind::Float(_) | NumKind::Double(_) => {
                    let f = n.to_f64();
                    if f.is_nan() || f.is_infinite() {
                        return Err(Error::from_code(ErrorCode::FOCA0002, format!("cannot cast {f} to {t}")));
                    }
                    let tr = f.trunc();
                    if tr.abs() >= 1.7e38 {
                        return Err(Error::from_code(ErrorCode::FOCA0003, format!("{f} is too large for {t}")));
                    }
                    tr as i128
                }
            };
            integer_value(t, i)
        }
        _ => Err(Error::from_code(ErrorCode::XPTY0004, format!("{target} is not numeric"))),
    }
}

fn string_to_numeric(target: XmlTypeCode, s: &str) -> Result<XdmAtomicValue, Error> {
    match target {
        XmlTypeCode::Double => parse_double_lexical(s).map(V::Double).ok_or_else(|| invalid(target, s)),
        XmlTypeCode::Float => parse_double_lexical(s)
            .map(|d| V::Float(d as f32))
            .ok_or_else(|| invalid(target, s)),
        XmlTypeCode::Decimal => parse_decimal_lexical(s).map(V::Decimal),
        t => integer_value(t, parse_integer_lexical(t, s)?),
    }
}

fn string_to_duration(target: XmlTypeCode, s: &str) -> Result<XdmAtomicValue, Error> {
    let t = s.trim();
    Ok(match target {
        XmlTypeCode::Duration => {
            let (months, seconds) = temporal::parse_duration(t, DurationForm::Full)?;
            V::Duration { months, seconds }
        }
        XmlTypeCode::YearMonthDuration => V::YearMonthDuration(temporal::parse_duration(t, DurationForm::YearMonth)?.0),
        _ => V::DayTimeDuration(temporal::parse_duration(t, DurationForm::DayTime)?.1),
    })
}

fn duration_parts(v: &XdmAtomicValue) -> Option<(i32, Decimal)> {
    match v {
        V::Duration { months, seconds } => Some((*months, *seconds)),
        V::YearMonthDuration(m) => Some((*m, Decimal::ZERO)),
        V::DayTimeDuration(s) => Some((0, *s)),
        _ => None,
    }
}

fn string_to_temporal(target: XmlTypeCode, s: &str, end_of_day_midnight: bool) -> Result<XdmAtomicValue, Error> {
    let t = s.trim();
    Ok(match target {
        XmlTypeCode::DateTime => {
            let (value, tz) = temporal::parse_date_time(t, end_of_day_midnight)?;
            V::DateTime { value, tz }
        }
        XmlTypeCode::Date => {
            let (date, tz) = temporal::parse_date(t)?;
            V::Date { date, tz }
        }
        XmlTypeCode::Time => {
            let (time, tz) = temporal::parse_time(t, end_of_day_midnight)?;
            V::Time { time, tz }
        }
        XmlTypeCode::GYearMonth => {
            let (year, month, tz) = temporal::parse_g_year_month(t)?;
            V::GYearMonth { year, month, tz }
        }
        XmlTypeCode::GYear => {
            let (year, tz) = temporal::parse_g_year(t)?;
            V::GYear { year, tz }
        }
        XmlTypeCode::GMonthDay => {
            let (month, day, tz) = temporal::parse_g_month_day(t)?;
            V::GMonthDay { month, day, tz }
        }
        XmlTypeCode::GDay => {
            let (day, tz) = temporal::parse_g_day(t)?;
            V::GDay { day, tz }
        }
        _ => {
            let (month, tz) = temporal::parse_g_month(t)?;
            V::GMonth { month, tz }
        }
    })
}

/// dateTime/date sources narrowed to another member of the date/time family.
fn temporal_to_temporal(v: &XdmAtomicValue, target: XmlTypeCode) -> Option<XdmAtomicValue> {
    let (date, time, tz) = match v {
        V::DateTime { value, tz } => (value.date(), Some(value.time()), *tz),
        V::Date { date, tz } => (*date, None, *tz),
        _ => return None,
    };
    Some(match target {
        XmlTypeCode::DateTime => V::DateTime {
            value: date.and_time(time.unwrap_or(NaiveTime::MIN)),
            tz,
        },
        XmlTypeCode::Date => V::Date { date, tz },
        XmlTypeCode::Time => {
            let t = time?;
            V::Time {
                time: NaiveTime::from_hms_nano_opt(t.hour(), t.minute(), t.second(), t.nanosecond())?,
                tz,
            }
        }
        XmlTypeCode::GYearMonth => V::GYearMonth {
            year: date.year(),
            month: date.month(),
            tz,
        },
        XmlTypeCode::GYear => V::GYear { year: date.year(), tz },
        XmlTypeCode::GMonthDay => V::GMonthDay {
            month: date.month(),
            day: date.day(),
            tz,
        },
        XmlTypeCode::GDay => V::GDay { day: date.day(), tz },
        XmlTypeCode::GMonth => V::GMonth { month: date.month(), tz },
        _ => return None,
    })
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    let t = s.trim();
    if t.len() % 2 != 0 {
        return None;
    }
    (0..t.len())
        .step_by(2)
        .map(|i| t.get(i..i + 2).and_then(|pair| u8::from_str_radix(pair, 16).ok()))
        .collect()
}

fn decode_base64(s: &str) -> Option<Vec<u8>> {
    let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    base64::engine::general_purpose::STANDARD.decode(compact).ok()
}

/// Resolve a lexical QName against the static namespace bindings.
pub(crate) fn resolve_lexical_qname(s: &str, ctx: &StaticContext) -> Result<XdmAtomicValue, Error> {
    let t = s.trim();
    let (prefix, local) = match t.split_once(':') {
        Some((p, l)) => (Some(p), l),
        None => (None, t),
    };
    if !is_ncname(local) || prefix.is_some_and(|p| !is_ncname(p)) {
        return Err(Error::from_code(ErrorCode::FOCA0002, format!("'{s}' is not a valid QName")));
    }
    let ns_uri = match prefix {
        Some(p) => Some(
            ctx.namespaces
                .resolve(p)
                .map(str::to_string)
                .ok_or_else(|| Error::from_code(ErrorCode::FONS0004, format!("no namespace bound to prefix '{p}'")))?,
        ),
        None => ctx.default_element_namespace.clone(),
    };
    Ok(V::QName {
        ns_uri,
        prefix: prefix.map(str::to_string),
        local: local.to_string(),
    })
}

/// Cast a single atomic value to the built-in atomic type `target`.
///
/// `literal` marks a cast whose operand is written directly in the expression
/// (`xs:date("2024-01-01")`, `"x" cast as xs:QName`). Only literal strings may
/// be cast to `xs:QName`, and a non-literal value that already has the target
/// type is returned unchanged.
pub(crate) fn cast_atomic(
    v: &XdmAtomicValue,
    target: XmlTypeCode,
    literal: bool,
    ctx: &StaticContext,
) -> Result<XdmAtomicValue, Error> {
    if target.is_abstract() {
        return Err(Error::from_code(
            ErrorCode::XPST0080,
            format!("{target} is abstract and cannot be a cast target"),
        ));
    }
    let source = v.type_code();
    if !literal && source == target {
        return Ok(v.clone());
    }
    let string_source = matches!(v, V::String(_) | V::UntypedAtomic(_)) || source.is_string_derived();

    // anything castable to a string type goes through its canonical form
    if target.is_string_derived() {
        return string_to_string_type(target, &v.string_value());
    }
    if target == XmlTypeCode::UntypedAtomic {
        return Ok(V::UntypedAtomic(v.string_value()));
    }

    if string_source {
        let s = v.as_str().unwrap_or_default();
        return match target {
            XmlTypeCode::Boolean => match s.trim() {
                "true" | "1" => Ok(V::Boolean(true)),
                "false" | "0" => Ok(V::Boolean(false)),
                _ => Err(invalid(target, s)),
            },
            XmlTypeCode::AnyUri => Ok(V::AnyUri(collapse_whitespace(s))),
            t if t.is_numeric() => string_to_numeric(t, s),
            t if t.is_duration() => string_to_duration(t, s),
            XmlTypeCode::DateTime
            | XmlTypeCode::Date
            | XmlTypeCode::Time
            | XmlTypeCode::GYearMonth
            | XmlTypeCode::GYear
            | XmlTypeCode::GMonthDay
            | XmlTypeCode::GDay
            | XmlTypeCode::GMonth => string_to_temporal(target, s, ctx.end_of_day_midnight),
            XmlTypeCode::HexBinary => decode_hex(s).map(V::HexBinary).ok_or_else(|| invalid(target, s)),
            XmlTypeCode::Base64Binary => decode_base64(s).map(V::Base64Binary).ok_or_else(|| invalid(target, s)),
            XmlTypeCode::QName if literal && !matches!(v, V::UntypedAtomic(_)) => resolve_lexical_qname(s, ctx),
            _ => Err(not_castable(v, target)),
        };
    }

    match target {
        XmlTypeCode::Boolean => match classify(v) {
            Some(n) => Ok(V::Boolean(!(n.is_nan() || n.to_f64() == 0.0))),
            None if source == XmlTypeCode::Boolean => Ok(v.clone()),
            None => Err(not_castable(v, target)),
        },
        t if t.is_numeric() => match (classify(v), v) {
            (Some(n), _) => numeric_to_target(n, t),
            (None, V::Boolean(b)) => numeric_to_target(NumKind::Int(i64::from(*b)), t),
            _ => Err(not_castable(v, target)),
        },
        t if t.is_duration() => {
            let (months, seconds) = duration_parts(v).ok_or_else(|| not_castable(v, target))?;
            Ok(match t {
                XmlTypeCode::Duration => V::Duration { months, seconds },
                XmlTypeCode::YearMonthDuration => V::YearMonthDuration(months),
                _ => V::DayTimeDuration(seconds),
            })
        }
        XmlTypeCode::HexBinary => match v {
            V::HexBinary(b) | V::Base64Binary(b) => Ok(V::HexBinary(b.clone())),
            _ => Err(not_castable(v, target)),
        },
        XmlTypeCode::Base64Binary => match v {
            V::HexBinary(b) | V::Base64Binary(b) => Ok(V::Base64Binary(b.clone())),
            _ => Err(not_castable(v, target)),
        },
        t => {
            let narrows = match source {
                XmlTypeCode::DateTime => true,
                XmlTypeCode::Date => t != XmlTypeCode::Time,
                _ => false,
            };
            if narrows {
                temporal_to_temporal(v, t).ok_or_else(|| not_castable(v, target))
            } else if source == t {
                Ok(v.clone())
            } else {
                Err(not_castable(v, target))
            }
        }
    }
}

/// `xs:double` value of an atomic for numeric promotion of `xs:untypedAtomic`.
pub(crate) fn untyped_to_double(s: &str) -> Result<XdmAtomicValue, Error> {
    parse_double_lexical(s)
        .map(V::Double)
        .ok_or_else(|| invalid(XmlTypeCode::Double, s))
}

/// fn:number semantics: NaN instead of an error.
pub(crate) fn number_or_nan(v: &XdmAtomicValue) -> f64 {
    match v {
        V::Boolean(b) => f64::from(u8::from(*b)),
        other => match classify(other) {
            Some(n) => n.to_f64(),
            None => other.as_str().and_then(parse_double_lexical).unwrap_or(f64::NAN),
        },
    }
}

/// Decimal from an arbitrary numeric kind, used by rounding functions.
pub(crate) fn as_decimal(n: NumKind) -> Option<Decimal> {
    match n {
        NumKind::Int(i) => Some(Decimal::from(i)),
        NumKind::Dec(d) => Some(d),
        NumKind::Float(f) => Decimal::from_f32(f),
        NumKind::Double(d) => Decimal::from_f64(d),
    }
}

//! Numeric classification, promotion and the arithmetic operators.
//!
//! [`NumKind`] classifies an atomic value into the four primitive numeric
//! types, carrying the promoted value. Both arithmetic and comparison go
//! through [`classify`] + [`unify_numeric`] so promotion is applied the same way
//! everywhere: integer + integer stays integer, integer + decimal is decimal,
//! anything + float is float, anything + double is double.

use chrono::{Duration as ChronoDuration, FixedOffset, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};

use crate::engine::runtime::{Error, ErrorCode};
use crate::parser::ast::ArithOp;
use crate::xdm::XdmAtomicValue;
use crate::xdm::temporal::{add_months, chrono_to_seconds, seconds_to_chrono};

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum NumKind {
    Int(i64),
    Dec(Decimal),
    Float(f32),
    Double(f64),
}

impl NumKind {
    /// Lossy for large decimals.
    pub(crate) fn to_f64(self) -> f64 {
        match self {
            NumKind::Int(i) => i as f64,
            NumKind::Dec(d) => d.to_f64().unwrap_or(f64::NAN),
            NumKind::Float(f) => f64::from(f),
            NumKind::Double(d) => d,
        }
    }

    pub(crate) fn is_nan(self) -> bool {
        match self {
            NumKind::Float(f) => f.is_nan(),
            NumKind::Double(d) => d.is_nan(),
            _ => false,
        }
    }

    pub(crate) fn into_atomic(self) -> XdmAtomicValue {
        match self {
            NumKind::Int(i) => XdmAtomicValue::Integer(i),
            NumKind::Dec(d) => XdmAtomicValue::Decimal(d),
            NumKind::Float(f) => XdmAtomicValue::Float(f),
            NumKind::Double(d) => XdmAtomicValue::Double(d),
        }
    }
}

/// Classify a numeric atomic value; `None` for everything else.
pub(crate) fn classify(v: &XdmAtomicValue) -> Option<NumKind> {
    match v {
        XdmAtomicValue::Decimal(d) => Some(NumKind::Dec(*d)),
        XdmAtomicValue::Float(f) => Some(NumKind::Float(*f)),
        XdmAtomicValue::Double(d) => Some(NumKind::Double(*d)),
        other => {
            let i = other.as_integer()?;
            Some(match i64::try_from(i) {
                Ok(small) => NumKind::Int(small),
                Err(_) => NumKind::Dec(Decimal::from_i128_with_scale(i, 0)),
            })
        }
    }
}

pub(crate) fn unify_numeric(a: NumKind, b: NumKind) -> (NumKind, NumKind) {
    use NumKind::*;
    match (a, b) {
        (Double(x), y) => (Double(x), Double(y.to_f64())),
        (y, Double(x)) => (Double(y.to_f64()), Double(x)),
        (Float(x), Float(y)) => (Float(x), Float(y)),
        (Float(x), y) => (Float(x), Float(y.to_f64() as f32)),
        (y, Float(x)) => (Float(y.to_f64() as f32), Float(x)),
        (Dec(x), Dec(y)) => (Dec(x), Dec(y)),
        (Dec(x), Int(y)) => (Dec(x), Dec(Decimal::from(y))),
        (Int(x), Dec(y)) => (Dec(Decimal::from(x)), Dec(y)),
        (Int(x), Int(y)) => (Int(x), Int(y)),
    }
}

fn overflow() -> Error {
    Error::from_code(ErrorCode::FOAR0002, "numeric overflow")
}

fn div_zero() -> Error {
    Error::from_code(ErrorCode::FOAR0001, "division by zero")
}

fn type_error(op: ArithOp, a: &XdmAtomicValue, b: &XdmAtomicValue) -> Error {
    Error::from_code(
        ErrorCode::XPTY0004,
        format!("operator {op:?} is not defined for {} and {}", a.type_code(), b.type_code()),
    )
}

fn numeric_op(op: ArithOp, a: NumKind, b: NumKind) -> Result<NumKind, Error> {
    use NumKind::*;
    Ok(match unify_numeric(a, b) {
        (Int(x), Int(y)) => match op {
            ArithOp::Add => Int(x.checked_add(y).ok_or_else(overflow)?),
            ArithOp::Sub => Int(x.checked_sub(y).ok_or_else(overflow)?),
            ArithOp::Mul => Int(x.checked_mul(y).ok_or_else(overflow)?),
            ArithOp::Div => {
                if y == 0 {
                    return Err(div_zero());
                }
                Dec(Decimal::from(x).checked_div(Decimal::from(y)).ok_or_else(overflow)?)
            }
            ArithOp::IDiv => {
                if y == 0 {
                    return Err(div_zero());
                }
                Int(x.checked_div(y).ok_or_else(overflow)?)
            }
            ArithOp::Mod => {
                if y == 0 {
                    return Err(div_zero());
                }
                Int(x.checked_rem(y).unwrap_or(0))
            }
        },
        (Dec(x), Dec(y)) => match op {
            ArithOp::Add => Dec(x.checked_add(y).ok_or_else(overflow)?),
            ArithOp::Sub => Dec(x.checked_sub(y).ok_or_else(overflow)?),
            ArithOp::Mul => Dec(x.checked_mul(y).ok_or_else(overflow)?),
            ArithOp::Div => {
                if y.is_zero() {
                    return Err(div_zero());
                }
                Dec(x.checked_div(y).ok_or_else(overflow)?)
            }
            ArithOp::IDiv => {
                if y.is_zero() {
                    return Err(div_zero());
                }
                let q = x.checked_div(y).ok_or_else(overflow)?.trunc();
                Int(q.to_i64().ok_or_else(overflow)?)
            }
            ArithOp::Mod => {
                if y.is_zero() {
                    return Err(div_zero());
                }
                Dec(x.checked_rem(y).ok_or_else(overflow)?)
            }
        },
        (Float(x), Float(y)) => match op {
            ArithOp::IDiv => Int(float_idiv(f64::from(x), f64::from(y))?),
            _ => Float(float_op(op, f64::from(x), f64::from(y)) as f32),
        },
        (Double(x), Double(y)) => match op {
            ArithOp::IDiv => Int(float_idiv(x, y)?),
            _ => Double(float_op(op, x, y)),
        },
        _ => return Err(overflow()),
    })
}

fn float_op(op: ArithOp, x: f64, y: f64) -> f64 {
    match op {
        ArithOp::Add => x + y,
        ArithOp::Sub => x - y,
        ArithOp::Mul => x * y,
        ArithOp::Div => x / y,
        // IEEE remainder with the sign of the dividend, like `fmod`
        ArithOp::Mod => x % y,
        ArithOp::IDiv => (x / y).trunc(),
    }
}

fn float_idiv(x: f64, y: f64) -> Result<i64, Error> {
    if y == 0.0 {
        return Err(div_zero());
    }
    if x.is_nan() || y.is_nan() || x.is_infinite() {
        return Err(Error::from_code(ErrorCode::FOAR0002, "idiv operand is NaN or infinite"));
    }
    let q = (x / y).trunc();
    if q.abs() >= 9.2e18 {
        return Err(overflow());
    }
    Ok(q as i64)
}

/// Unary minus on a numeric value.
pub(crate) fn negate(v: &XdmAtomicValue) -> Result<XdmAtomicValue, Error> {
    let n = classify(v).ok_or_else(|| {
        Error::from_code(ErrorCode::XPTY0004, format!("unary minus is not defined for {}", v.type_code()))
    })?;
    Ok(match n {
        NumKind::Int(i) => XdmAtomicValue::Integer(i.checked_neg().ok_or_else(overflow)?),
        NumKind::Dec(d) => XdmAtomicValue::Decimal(-d),
        NumKind::Float(f) => XdmAtomicValue::Float(-f),
        NumKind::Double(d) => XdmAtomicValue::Double(-d),
    })
}

/// Point on the UTC timeline; values without a timezone take the implicit one.
pub(crate) fn to_utc(value: NaiveDateTime, tz: Option<FixedOffset>, implicit: FixedOffset) -> NaiveDateTime {
    let offset = tz.unwrap_or(implicit);
    value - ChronoDuration::seconds(i64::from(offset.local_minus_utc()))
}

fn date_overflow() -> Error {
    Error::from_code(ErrorCode::FODT0001, "date/time arithmetic overflow")
}

fn duration_overflow() -> Error {
    Error::from_code(ErrorCode::FODT0002, "duration arithmetic overflow")
}

fn shift_date_time(value: NaiveDateTime, months: i32, seconds: Decimal) -> Result<NaiveDateTime, Error> {
    let shifted = add_months(value, months)?;
    let delta = seconds_to_chrono(seconds)?;
    shifted.checked_add_signed(delta).ok_or_else(date_overflow)
}

fn shift_time(time: NaiveTime, seconds: Decimal) -> Result<NaiveTime, Error> {
    let delta = seconds_to_chrono(seconds)?;
    Ok(time.overflowing_add_signed(delta).0)
}

fn number_of(v: &XdmAtomicValue) -> Option<f64> {
    classify(v).map(NumKind::to_f64)
}

fn scale_months(months: i32, factor: f64) -> Result<i32, Error> {
    if factor.is_nan() {
        return Err(Error::from_code(ErrorCode::FOCA0005, "cannot scale a duration by NaN"));
    }
    let scaled = (f64::from(months) * factor).round();
    if !scaled.is_finite() || scaled.abs() > f64::from(i32::MAX) {
        return Err(duration_overflow());
    }
    Ok(scaled as i32)
}

fn scale_seconds(seconds: Decimal, factor: f64) -> Result<Decimal, Error> {
    if factor.is_nan() {
        return Err(Error::from_code(ErrorCode::FOCA0005, "cannot scale a duration by NaN"));
    }
    let f = Decimal::from_f64(factor).ok_or_else(duration_overflow)?;
    let scaled = seconds.checked_mul(f).ok_or_else(duration_overflow)?;
    // xs:dayTimeDuration keeps millisecond-or-finer precision; round to nanoseconds
    Ok(scaled.round_dp(9))
}

/// Apply an arithmetic operator to two atomized, non-empty operands.
/// `xs:untypedAtomic` operands must already have been cast to `xs:double`.
pub(crate) fn arithmetic(
    op: ArithOp,
    a: &XdmAtomicValue,
    b: &XdmAtomicValue,
    implicit_tz: FixedOffset,
) -> Result<XdmAtomicValue, Error> {
    use XdmAtomicValue as V;
    if let (Some(x), Some(y)) = (classify(a), classify(b)) {
        return numeric_op(op, x, y).map(NumKind::into_atomic);
    }
    match (a, b, op) {
        // duration +/- duration
        (V::YearMonthDuration(x), V::YearMonthDuration(y), ArithOp::Add) => {
            Ok(V::YearMonthDuration(x.checked_add(*y).ok_or_else(duration_overflow)?))
        }
        (V::YearMonthDuration(x), V::YearMonthDuration(y), ArithOp::Sub) => {
            Ok(V::YearMonthDuration(x.checked_sub(*y).ok_or_else(duration_overflow)?))
        }
        (V::DayTimeDuration(x), V::DayTimeDuration(y), ArithOp::Add) => {
            Ok(V::DayTimeDuration(x.checked_add(*y).ok_or_else(duration_overflow)?))
        }
        (V::DayTimeDuration(x), V::DayTimeDuration(y), ArithOp::Sub) => {
            Ok(V::DayTimeDuration(x.checked_sub(*y).ok_or_else(duration_overflow)?))
        }
        // duration / duration
        (V::YearMonthDuration(x), V::YearMonthDuration(y), ArithOp::Div) => {
            if *y == 0 {
                return Err(div_zero());
            }
            Ok(V::Decimal(Decimal::from(*x) / Decimal::from(*y)))
        }
        (V::DayTimeDuration(x), V::DayTimeDuration(y), ArithOp::Div) => {
            if y.is_zero() {
                return Err(div_zero());
            }
            Ok(V::Decimal(x.checked_div(*y).ok_or_else(duration_overflow)?))
        }
        // duration * number, number * duration, duration / number
        (V::YearMonthDuration(m), n, ArithOp::Mul) | (n, V::YearMonthDuration(m), ArithOp::Mul) => {
            let f = number_of(n).ok_or_else(|| type_error(op, a, b))?;
            Ok(V::YearMonthDuration(scale_months(*m, f)?))
        }
        (V::DayTimeDuration(s), n, ArithOp::Mul) | (n, V::DayTimeDuration(s), ArithOp::Mul) => {
            let f = number_of(n).ok_or_else(|| type_error(op, a, b))?;
            Ok(V::DayTimeDuration(scale_seconds(*s, f)?))
        }
        (V::YearMonthDuration(m), n, ArithOp::Div) => {
            let f = number_of(n).ok_or_else(|| type_error(op, a, b))?;
            if f == 0.0 {
                return Err(duration_overflow());
            }
            Ok(V::YearMonthDuration(scale_months(*m, 1.0 / f)?))
        }
        (V::DayTimeDuration(s), n, ArithOp::Div) => {
            let f = number_of(n).ok_or_else(|| type_error(op, a, b))?;
            if f == 0.0 {
                return Err(duration_overflow());
            }
            Ok(V::DayTimeDuration(scale_seconds(*s, 1.0 / f)?))
        }
        // dateTime/date +/- duration
        (V::DateTime { value, tz }, d, ArithOp::Add | ArithOp::Sub) if d.is_duration() => {
            let (months, seconds) = signed_duration(d, op, a, b)?;
            Ok(V::DateTime {
                value: shift_date_time(*value, months, seconds)?,
                tz: *tz,
            })
        }
        (d, V::DateTime { value, tz }, ArithOp::Add) if d.is_duration() => {
            let (months, seconds) = signed_duration(d, op, a, b)?;
            Ok(V::DateTime {
                value: shift_date_time(*value, months, seconds)?,
                tz: *tz,
            })
        }
        (V::Date { date, tz }, d, ArithOp::Add | ArithOp::Sub) if d.is_duration() => {
            let (months, seconds) = signed_duration(d, op, a, b)?;
            let start = date.and_hms_opt(0, 0, 0).ok_or_else(date_overflow)?;
            Ok(V::Date {
                date: shift_date_time(start, months, seconds)?.date(),
                tz: *tz,
            })
        }
        (d, V::Date { date, tz }, ArithOp::Add) if d.is_duration() => {
            let (months, seconds) = signed_duration(d, op, a, b)?;
            let start = date.and_hms_opt(0, 0, 0).ok_or_else(date_overflow)?;
            Ok(V::Date {
                date: shift_date_time(start, months, seconds)?.date(),
                tz: *tz,
            })
        }
        (V::Time { time, tz }, V::DayTimeDuration(s), ArithOp::Add | ArithOp::Sub) => {
            let s = if op == ArithOp::Sub { -*s } else { *s };
            Ok(V::Time {
                time: shift_time(*time, s)?,
                tz: *tz,
            })
        }
        (V::DayTimeDuration(s), V::Time { time, tz }, ArithOp::Add) => Ok(V::Time {
            time: shift_time(*time, *s)?,
            tz: *tz,
        }),
        // differences
        (V::DateTime { value: x, tz: tx }, V::DateTime { value: y, tz: ty }, ArithOp::Sub) => {
            let diff = to_utc(*x, *tx, implicit_tz) - to_utc(*y, *ty, implicit_tz);
            Ok(V::DayTimeDuration(chrono_to_seconds(diff)))
        }
        (V::Date { date: x, tz: tx }, V::Date { date: y, tz: ty }, ArithOp::Sub) => {
            let x = x.and_hms_opt(0, 0, 0).ok_or_else(date_overflow)?;
            let y = y.and_hms_opt(0, 0, 0).ok_or_else(date_overflow)?;
            let diff = to_utc(x, *tx, implicit_tz) - to_utc(y, *ty, implicit_tz);
            Ok(V::DayTimeDuration(chrono_to_seconds(diff)))
        }
        (V::Time { time: x, tz: tx }, V::Time { time: y, tz: ty }, ArithOp::Sub) => {
            let base = chrono::NaiveDate::from_ymd_opt(1972, 12, 31).ok_or_else(date_overflow)?;
            let diff = to_utc(base.and_time(*x), *tx, implicit_tz) - to_utc(base.and_time(*y), *ty, implicit_tz);
            Ok(V::DayTimeDuration(chrono_to_seconds(diff)))
        }
        _ => Err(type_error(op, a, b)),
    }
}

/// `(months, seconds)` of a duration operand, negated for subtraction.
fn signed_duration(
    d: &XdmAtomicValue,
    op: ArithOp,
    a: &XdmAtomicValue,
    b: &XdmAtomicValue,
) -> Result<(i32, Decimal), Error> {
    let (months, seconds) = match d {
        XdmAtomicValue::YearMonthDuration(m) => (*m, Decimal::ZERO),
        XdmAtomicValue::DayTimeDuration(s) => (0, *s),
        // plain xs:duration is not an operand of date arithmetic
        _ => return Err(type_error(op, a, b)),
    };
    Ok(if op == ArithOp::Sub {
        (-months, -seconds)
    } else {
        (months, seconds)
    })
}

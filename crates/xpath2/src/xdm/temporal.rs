//! Lexical parsing and canonical formatting for the date/time and duration families.
//!
//! Lexical forms follow XML Schema part 2 (section 3.2.6 - 3.2.14). All parse
//! failures surface as `FORG0001`; values that parse but do not fit the
//! underlying representation surface as `FODT0001`/`FODT0002`.

use chrono::{Datelike, Duration as ChronoDuration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::engine::runtime::{Error, ErrorCode};

const SECONDS_PER_DAY: i64 = 86_400;

fn invalid(kind: &str, s: &str) -> Error {
    Error::from_code(ErrorCode::FORG0001, format!("invalid lexical form for {kind}: '{s}'"))
}

/// Split a trailing timezone (`Z`, `+hh:mm`, `-hh:mm`) off a lexical value.
pub fn split_timezone<'a>(kind: &str, s: &'a str) -> Result<(&'a str, Option<FixedOffset>), Error> {
    if let Some(body) = s.strip_suffix('Z') {
        return Ok((body, FixedOffset::east_opt(0)));
    }
    if s.len() >= 6 && s.is_char_boundary(s.len() - 6) {
        let (body, tz) = s.split_at(s.len() - 6);
        let b = tz.as_bytes();
        if (b[0] == b'+' || b[0] == b'-') && b[3] == b':' {
            let hh: i32 = tz[1..3].parse().map_err(|_| invalid(kind, s))?;
            let mm: i32 = tz[4..6].parse().map_err(|_| invalid(kind, s))?;
            if hh > 14 || mm > 59 || (hh == 14 && mm != 0) {
                return Err(invalid(kind, s));
            }
            let secs = (hh * 60 + mm) * 60;
            let secs = if b[0] == b'-' { -secs } else { secs };
            return Ok((body, FixedOffset::east_opt(secs)));
        }
    }
    Ok((s, None))
}

fn parse_year(kind: &str, full: &str, s: &str) -> Result<i32, Error> {
    let digits = s.strip_prefix('-').unwrap_or(s);
    if digits.len() < 4 || !digits.bytes().all(|c| c.is_ascii_digit()) {
        return Err(invalid(kind, full));
    }
    if digits.len() > 4 && digits.starts_with('0') {
        return Err(invalid(kind, full));
    }
    let y: i32 = s
        .parse()
        .map_err(|_| Error::from_code(ErrorCode::FODT0001, format!("year out of range in '{full}'")))?;
    if y == 0 {
        return Err(invalid(kind, full));
    }
    Ok(y)
}

fn parse_two_digits(kind: &str, full: &str, s: &str) -> Result<u32, Error> {
    if s.len() != 2 || !s.bytes().all(|c| c.is_ascii_digit()) {
        return Err(invalid(kind, full));
    }
    s.parse().map_err(|_| invalid(kind, full))
}

fn date_parts(kind: &str, full: &str, body: &str) -> Result<NaiveDate, Error> {
    // the year may carry a leading '-', so split from the right
    let mut parts = body.rsplitn(3, '-');
    let (Some(d), Some(m), Some(y)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(invalid(kind, full));
    };
    let year = parse_year(kind, full, y)?;
    let month = parse_two_digits(kind, full, m)?;
    let day = parse_two_digits(kind, full, d)?;
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| invalid(kind, full))
}

pub fn parse_date(s: &str) -> Result<(NaiveDate, Option<FixedOffset>), Error> {
    let s = s.trim();
    let (body, tz) = split_timezone("xs:date", s)?;
    Ok((date_parts("xs:date", s, body)?, tz))
}

/// Parsed `hh:mm:ss(.fff)?`. `rolls_over` is set for `24:00:00`, which denotes
/// the first instant of the following day.
struct TimeParts {
    time: NaiveTime,
    rolls_over: bool,
}

fn time_parts(kind: &str, full: &str, body: &str, end_of_day_midnight: bool) -> Result<TimeParts, Error> {
    let mut it = body.splitn(3, ':');
    let (Some(h), Some(m), Some(sec)) = (it.next(), it.next(), it.next()) else {
        return Err(invalid(kind, full));
    };
    let hour = parse_two_digits(kind, full, h)?;
    let minute = parse_two_digits(kind, full, m)?;
    let (whole, frac) = match sec.split_once('.') {
        Some((w, f)) if !f.is_empty() && f.bytes().all(|c| c.is_ascii_digit()) => (w, f),
        Some(_) => return Err(invalid(kind, full)),
        None => (sec, ""),
    };
    let second = parse_two_digits(kind, full, whole)?;
    let mut nanos: u32 = 0;
    for (i, c) in frac.bytes().take(9).enumerate() {
        nanos += u32::from(c - b'0') * 10u32.pow(8 - i as u32);
    }
    if hour == 24 {
        if minute != 0 || second != 0 || nanos != 0 {
            return Err(invalid(kind, full));
        }
        if end_of_day_midnight {
            let time = NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999).ok_or_else(|| invalid(kind, full))?;
            return Ok(TimeParts { time, rolls_over: false });
        }
        return Ok(TimeParts { time: NaiveTime::MIN, rolls_over: true });
    }
    if minute > 59 || second > 59 {
        return Err(invalid(kind, full));
    }
    let time = NaiveTime::from_hms_nano_opt(hour, minute, second, nanos).ok_or_else(|| invalid(kind, full))?;
    Ok(TimeParts { time, rolls_over: false })
}

/// Parse `xs:time`. `24:00:00` maps to `00:00:00` unless `end_of_day_midnight`
/// requests the end-of-day reading.
pub fn parse_time(s: &str, end_of_day_midnight: bool) -> Result<(NaiveTime, Option<FixedOffset>), Error> {
    let s = s.trim();
    let (body, tz) = split_timezone("xs:time", s)?;
    let parts = time_parts("xs:time", s, body, end_of_day_midnight)?;
    Ok((parts.time, tz))
}

/// Parse `xs:dateTime`. With `end_of_day_midnight` off, `T24:00:00` becomes
/// `00:00:00` of the following day; with it on, `23:59:59.999999999` of the same day.
pub fn parse_date_time(s: &str, end_of_day_midnight: bool) -> Result<(NaiveDateTime, Option<FixedOffset>), Error> {
    let s = s.trim();
    let (body, tz) = split_timezone("xs:dateTime", s)?;
    let (d, t) = body.split_once('T').ok_or_else(|| invalid("xs:dateTime", s))?;
    let date = date_parts("xs:dateTime", s, d)?;
    let parts = time_parts("xs:dateTime", s, t, end_of_day_midnight)?;
    let date = if parts.rolls_over {
        date.succ_opt()
            .ok_or_else(|| Error::from_code(ErrorCode::FODT0001, "dateTime overflow"))?
    } else {
        date
    };
    Ok((NaiveDateTime::new(date, parts.time), tz))
}

pub fn parse_g_year(s: &str) -> Result<(i32, Option<FixedOffset>), Error> {
    let s = s.trim();
    let (body, tz) = split_timezone("xs:gYear", s)?;
    Ok((parse_year("xs:gYear", s, body)?, tz))
}

pub fn parse_g_year_month(s: &str) -> Result<(i32, u32, Option<FixedOffset>), Error> {
    let s = s.trim();
    let (body, tz) = split_timezone("xs:gYearMonth", s)?;
    let (y, m) = body.rsplit_once('-').ok_or_else(|| invalid("xs:gYearMonth", s))?;
    let year = parse_year("xs:gYearMonth", s, y)?;
    let month = parse_two_digits("xs:gYearMonth", s, m)?;
    if !(1..=12).contains(&month) {
        return Err(invalid("xs:gYearMonth", s));
    }
    Ok((year, month, tz))
}

pub fn parse_g_month(s: &str) -> Result<(u32, Option<FixedOffset>), Error> {
    let s = s.trim();
    let (body, tz) = split_timezone("xs:gMonth", s)?;
    let m = body.strip_prefix("--").ok_or_else(|| invalid("xs:gMonth", s))?;
    let month = parse_two_digits("xs:gMonth", s, m)?;
    if !(1..=12).contains(&month) {
        return Err(invalid("xs:gMonth", s));
    }
    Ok((month, tz))
}

pub fn parse_g_month_day(s: &str) -> Result<(u32, u32, Option<FixedOffset>), Error> {
    let s = s.trim();
    let (body, tz) = split_timezone("xs:gMonthDay", s)?;
    let md = body.strip_prefix("--").ok_or_else(|| invalid("xs:gMonthDay", s))?;
    let (m, d) = md.split_once('-').ok_or_else(|| invalid("xs:gMonthDay", s))?;
    let month = parse_two_digits("xs:gMonthDay", s, m)?;
    let day = parse_two_digits("xs:gMonthDay", s, d)?;
    // 2000 is a leap year, so --02-29 is accepted
    NaiveDate::from_ymd_opt(2000, month, day).ok_or_else(|| invalid("xs:gMonthDay", s))?;
    Ok((month, day, tz))
}

pub fn parse_g_day(s: &str) -> Result<(u32, Option<FixedOffset>), Error> {
    let s = s.trim();
    let (body, tz) = split_timezone("xs:gDay", s)?;
    let d = body.strip_prefix("---").ok_or_else(|| invalid("xs:gDay", s))?;
    let day = parse_two_digits("xs:gDay", s, d)?;
    if !(1..=31).contains(&day) {
        return Err(invalid("xs:gDay", s));
    }
    Ok((day, tz))
}

/// Which components a duration lexical form may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationForm {
    Full,
    YearMonth,
    DayTime,
}

/// Parse `PnYnMnDTnHnMnS` into `(months, seconds)`.
pub fn parse_duration(s: &str, form: DurationForm) -> Result<(i32, Decimal), Error> {
    let kind = match form {
        DurationForm::Full => "xs:duration",
        DurationForm::YearMonth => "xs:yearMonthDuration",
        DurationForm::DayTime => "xs:dayTimeDuration",
    };
    let full = s.trim();
    let (negative, rest) = match full.strip_prefix('-') {
        Some(r) => (true, r),
        None => (false, full),
    };
    let rest = rest.strip_prefix('P').ok_or_else(|| invalid(kind, full))?;
    let (date_part, time_part) = match rest.split_once('T') {
        Some((d, t)) => {
            if t.is_empty() {
                return Err(invalid(kind, full));
            }
            (d, Some(t))
        }
        None => (rest, None),
    };
    if date_part.is_empty() && time_part.is_none() {
        return Err(invalid(kind, full));
    }
    let mut months: i64 = 0;
    let mut seconds = Decimal::ZERO;
    let mut num = String::new();
    let mut seen_date = 0u8;
    let order = ['Y', 'M', 'D'];
    for c in date_part.chars() {
        if c.is_ascii_digit() {
            num.push(c);
            continue;
        }
        let idx = order.iter().position(|o| *o == c).ok_or_else(|| invalid(kind, full))?;
        if num.is_empty() || (seen_date >> idx) != 0 {
            return Err(invalid(kind, full));
        }
        seen_date |= 1 << idx;
        let v: i64 = num.parse().map_err(|_| Error::from_code(ErrorCode::FODT0002, "duration overflow"))?;
        num.clear();
        match c {
            'Y' => months += v.checked_mul(12).ok_or_else(|| Error::from_code(ErrorCode::FODT0002, "duration overflow"))?,
            'M' => months += v,
            _ => seconds += Decimal::from(v) * Decimal::from(SECONDS_PER_DAY),
        }
    }
    if !num.is_empty() {
        return Err(invalid(kind, full));
    }
    let mut seen_time = 0u8;
    if let Some(t) = time_part {
        let order = ['H', 'M', 'S'];
        let mut saw_dot = false;
        for c in t.chars() {
            if c.is_ascii_digit() {
                num.push(c);
                continue;
            }
            if c == '.' && !saw_dot {
                saw_dot = true;
                num.push(c);
                continue;
            }
            let idx = order.iter().position(|o| *o == c).ok_or_else(|| invalid(kind, full))?;
            if num.is_empty() || num.ends_with('.') || (seen_time >> idx) != 0 || (saw_dot && c != 'S') {
                return Err(invalid(kind, full));
            }
            seen_time |= 1 << idx;
            let v: Decimal = num.parse().map_err(|_| invalid(kind, full))?;
            num.clear();
            seconds += match c {
                'H' => v * Decimal::from(3600),
                'M' => v * Decimal::from(60),
                _ => v,
            };
        }
        if !num.is_empty() || seen_time == 0 {
            return Err(invalid(kind, full));
        }
    }
    let has_ym = seen_date & 0b011 != 0;
    let has_dt = seen_date & 0b100 != 0 || seen_time != 0;
    match form {
        DurationForm::YearMonth if has_dt => return Err(invalid(kind, full)),
        DurationForm::DayTime if has_ym => return Err(invalid(kind, full)),
        _ => {}
    }
    let months = i32::try_from(months).map_err(|_| Error::from_code(ErrorCode::FODT0002, "duration overflow"))?;
    if negative {
        Ok((-months, -seconds))
    } else {
        Ok((months, seconds))
    }
}

pub fn format_timezone(tz: Option<FixedOffset>) -> String {
    let Some(tz) = tz else { return String::new() };
    let secs = tz.local_minus_utc();
    if secs == 0 {
        return "Z".to_string();
    }
    let sign = if secs < 0 { '-' } else { '+' };
    let mins = secs.abs() / 60;
    format!("{sign}{:02}:{:02}", mins / 60, mins % 60)
}

fn format_year(y: i32) -> String {
    if y < 0 { format!("-{:04}", -y) } else { format!("{y:04}") }
}

pub fn format_date(date: NaiveDate, tz: Option<FixedOffset>) -> String {
    format!(
        "{}-{:02}-{:02}{}",
        format_year(date.year()),
        date.month(),
        date.day(),
        format_timezone(tz)
    )
}

fn format_clock(t: NaiveTime) -> String {
    let mut out = format!("{:02}:{:02}:{:02}", t.hour(), t.minute(), t.second());
    let nanos = t.nanosecond();
    if nanos != 0 {
        let frac = format!("{nanos:09}");
        out.push('.');
        out.push_str(frac.trim_end_matches('0'));
    }
    out
}

pub fn format_time(t: NaiveTime, tz: Option<FixedOffset>) -> String {
    format!("{}{}", format_clock(t), format_timezone(tz))
}

pub fn format_date_time(dt: NaiveDateTime, tz: Option<FixedOffset>) -> String {
    format!(
        "{}T{}{}",
        format_date(dt.date(), None),
        format_clock(dt.time()),
        format_timezone(tz)
    )
}

pub fn format_g_year(y: i32, tz: Option<FixedOffset>) -> String {
    format!("{}{}", format_year(y), format_timezone(tz))
}

pub fn format_g_year_month(y: i32, m: u32, tz: Option<FixedOffset>) -> String {
    format!("{}-{m:02}{}", format_year(y), format_timezone(tz))
}

pub fn format_g_month(m: u32, tz: Option<FixedOffset>) -> String {
    format!("--{m:02}{}", format_timezone(tz))
}

pub fn format_g_month_day(m: u32, d: u32, tz: Option<FixedOffset>) -> String {
    format!("--{m:02}-{d:02}{}", format_timezone(tz))
}

pub fn format_g_day(d: u32, tz: Option<FixedOffset>) -> String {
    format!("---{d:02}{}", format_timezone(tz))
}

fn push_year_month(out: &mut String, months: u32) {
    let (y, m) = (months / 12, months % 12);
    if y != 0 {
        out.push_str(&format!("{y}Y"));
    }
    if m != 0 {
        out.push_str(&format!("{m}M"));
    }
}

fn push_day_time(out: &mut String, seconds: Decimal) {
    let day = Decimal::from(SECONDS_PER_DAY);
    let days = (seconds / day).trunc();
    let mut rem = seconds - days * day;
    let hours = (rem / Decimal::from(3600)).trunc();
    rem -= hours * Decimal::from(3600);
    let minutes = (rem / Decimal::from(60)).trunc();
    rem -= minutes * Decimal::from(60);
    if !days.is_zero() {
        out.push_str(&format!("{days}D"));
    }
    if !hours.is_zero() || !minutes.is_zero() || !rem.is_zero() {
        out.push('T');
        if !hours.is_zero() {
            out.push_str(&format!("{hours}H"));
        }
        if !minutes.is_zero() {
            out.push_str(&format!("{minutes}M"));
        }
        if !rem.is_zero() {
            out.push_str(&format!("{}S", rem.normalize()));
        }
    }
}

pub fn format_duration(months: i32, seconds: Decimal) -> String {
    if months == 0 && seconds.is_zero() {
        return "PT0S".to_string();
    }
    let mut out = String::new();
    if months < 0 || seconds.is_sign_negative() {
        out.push('-');
    }
    out.push('P');
    push_year_month(&mut out, months.unsigned_abs());
    push_day_time(&mut out, seconds.abs());
    out
}

pub fn format_year_month_duration(months: i32) -> String {
    if months == 0 {
        return "P0M".to_string();
    }
    let mut out = String::new();
    if months < 0 {
        out.push('-');
    }
    out.push('P');
    push_year_month(&mut out, months.unsigned_abs());
    out
}

pub fn format_day_time_duration(seconds: Decimal) -> String {
    if seconds.is_zero() {
        return "PT0S".to_string();
    }
    let mut out = String::new();
    if seconds.is_sign_negative() {
        out.push('-');
    }
    out.push('P');
    push_day_time(&mut out, seconds.abs());
    out
}

/// Convert a decimal number of seconds into a chrono duration (nanosecond precision).
pub fn seconds_to_chrono(seconds: Decimal) -> Result<ChronoDuration, Error> {
    let nanos = (seconds * Decimal::from(1_000_000_000))
        .trunc()
        .to_i64()
        .ok_or_else(|| Error::from_code(ErrorCode::FODT0002, "duration overflow"))?;
    Ok(ChronoDuration::nanoseconds(nanos))
}

pub fn chrono_to_seconds(d: ChronoDuration) -> Decimal {
    let secs = Decimal::from(d.num_seconds());
    let sub = d - ChronoDuration::seconds(d.num_seconds());
    let nanos = sub.num_nanoseconds().unwrap_or(0);
    secs + Decimal::new(nanos, 9)
}

/// Add a signed number of months, clamping the day to the end of the target month.
pub fn add_months(dt: NaiveDateTime, months: i32) -> Result<NaiveDateTime, Error> {
    let total = dt.year() * 12 + dt.month0() as i32 + months;
    let year = total.div_euclid(12);
    let month = total.rem_euclid(12) as u32 + 1;
    let mut day = dt.day();
    loop {
        if let Some(d) = NaiveDate::from_ymd_opt(year, month, day) {
            return Ok(NaiveDateTime::new(d, dt.time()));
        }
        if day <= 28 {
            return Err(Error::from_code(ErrorCode::FODT0001, "date overflow"));
        }
        day -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn midnight_rolls_to_next_day_by_default() {
        let (dt, _) = parse_date_time("2024-01-31T24:00:00", false).unwrap();
        assert_eq!(format_date_time(dt, None), "2024-02-01T00:00:00");
    }

    #[test]
    fn midnight_stays_on_day_when_flag_set() {
        let (dt, _) = parse_date_time("2024-01-31T24:00:00", true).unwrap();
        assert_eq!(dt.date(), NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());
        assert_eq!(dt.time().hour(), 23);
    }

    #[test]
    fn duration_canonical_form() {
        let (m, s) = parse_duration("P1Y14M3DT25H0.50S", DurationForm::Full).unwrap();
        assert_eq!(format_duration(m, s), "P2Y2M4DT1H0.5S");
        assert!(parse_duration("P1YT", DurationForm::Full).is_err());
        assert!(parse_duration("P1D", DurationForm::YearMonth).is_err());
    }

    #[test]
    fn timezone_round_trip() {
        let (t, tz) = parse_time("10:30:00-05:00", false).unwrap();
        assert_eq!(format_time(t, tz), "10:30:00-05:00");
    }
}

//! Date, time and date-time literal sub-grammars.
//!
//! Each parser reports `Ok(None)` when the text does not have the literal's
//! shape at all, so callers can try the next alternative, and `Err` when the
//! shape matches but the calendar or clock values are out of range.

use winnow::combinator::{opt, preceded};
use winnow::prelude::*;
use winnow::token::take_while;

use super::ast::{DateLiteral, TimeLiteral};

// Manually define PResult for resilience against winnow version changes
type PResult<T> = Result<T, winnow::error::ErrMode<winnow::error::ContextError>>;

fn year(input: &mut &str) -> PResult<i32> {
    take_while(4, |c: char| c.is_ascii_digit())
        .try_map(|s: &str| s.parse::<i32>())
        .parse_next(input)
}

fn short_number(input: &mut &str) -> PResult<u8> {
    take_while(1..=2, |c: char| c.is_ascii_digit())
        .try_map(|s: &str| s.parse::<u8>())
        .parse_next(input)
}

/// Fractional seconds, right-padded to milliseconds: `.5` -> 500.
fn milliseconds(input: &mut &str) -> PResult<u16> {
    preceded('.', take_while(1..=3, |c: char| c.is_ascii_digit()))
        .try_map(|s: &str| {
            s.parse::<u16>()
                .map(|n| n * 10u16.pow(3 - s.len() as u32))
        })
        .parse_next(input)
}

fn date_parts(input: &mut &str) -> PResult<DateLiteral> {
    (year, '-', short_number, '-', short_number)
        .map(|(year, _, month, _, day)| DateLiteral { year, month, day })
        .parse_next(input)
}

fn time_parts(input: &mut &str) -> PResult<TimeLiteral> {
    (
        short_number,
        ':',
        short_number,
        opt((preceded(':', short_number), opt(milliseconds))),
    )
        .map(|(hours, _, minutes, rest)| {
            let (seconds, milliseconds) = match rest {
                Some((seconds, ms)) => (seconds, ms.unwrap_or(0)),
                None => (0, 0),
            };
            TimeLiteral {
                hours,
                minutes,
                seconds,
                milliseconds,
            }
        })
        .parse_next(input)
}

fn date_time_parts(input: &mut &str) -> PResult<(DateLiteral, TimeLiteral)> {
    (date_parts, 'T', time_parts)
        .map(|(date, _, time)| (date, time))
        .parse_next(input)
}

fn check_date(date: DateLiteral) -> Result<DateLiteral, String> {
    let month = time::Month::try_from(date.month)
        .map_err(|e| format!("invalid date {date}: {e}"))?;
    time::Date::from_calendar_date(date.year, month, date.day)
        .map_err(|e| format!("invalid date {date}: {e}"))?;
    Ok(date)
}

fn check_time(time: TimeLiteral) -> Result<TimeLiteral, String> {
    time::Time::from_hms_milli(time.hours, time.minutes, time.seconds, time.milliseconds)
        .map_err(|e| format!("invalid time {time}: {e}"))?;
    Ok(time)
}

/// `YYYY-MM-DD`
pub fn parse_date(text: &str) -> Result<Option<DateLiteral>, String> {
    match date_parts.parse(text) {
        Ok(date) => check_date(date).map(Some),
        Err(_) => Ok(None),
    }
}

/// `HH:MM[:SS[.mmm]]`
pub fn parse_time(text: &str) -> Result<Option<TimeLiteral>, String> {
    match time_parts.parse(text) {
        Ok(time) => check_time(time).map(Some),
        Err(_) => Ok(None),
    }
}

/// `YYYY-MM-DDTHH:MM[:SS[.mmm]]`
pub fn parse_date_time(text: &str) -> Result<Option<(DateLiteral, TimeLiteral)>, String> {
    match date_time_parts.parse(text) {
        Ok((date, time)) => Ok(Some((check_date(date)?, check_time(time)?))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date() {
        assert_eq!(
            parse_date("2010-06-25"),
            Ok(Some(DateLiteral {
                year: 2010,
                month: 6,
                day: 25
            }))
        );
    }

    #[test]
    fn test_date_shape_mismatch() {
        assert_eq!(parse_date("2010"), Ok(None));
        assert_eq!(parse_date("2010-06-25T10:00"), Ok(None));
        assert_eq!(parse_date("bruce"), Ok(None));
    }

    #[test]
    fn test_invalid_calendar_date() {
        assert!(parse_date("2010-13-01").is_err());
        assert!(parse_date("2011-02-29").is_err());
    }

    #[test]
    fn test_time_with_milliseconds() {
        assert_eq!(
            parse_time("10:05:30.5"),
            Ok(Some(TimeLiteral {
                hours: 10,
                minutes: 5,
                seconds: 30,
                milliseconds: 500
            }))
        );
    }

    #[test]
    fn test_time_without_seconds() {
        let time = parse_time("23:59").unwrap().unwrap();
        assert_eq!((time.hours, time.minutes, time.seconds), (23, 59, 0));
    }

    #[test]
    fn test_invalid_time() {
        assert!(parse_time("25:00:00").is_err());
    }

    #[test]
    fn test_date_time() {
        let (date, time) = parse_date_time("2010-06-25T08:30:00").unwrap().unwrap();
        assert_eq!(date.to_string(), "2010-06-25");
        assert_eq!(time.to_string(), "08:30:00");
    }
}

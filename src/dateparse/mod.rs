//! Deterministic natural-language date-expression parser.
//!
//! The source this system was distilled from delegated this job to an LLM
//! prompt. That is fine for a chat assistant but not for a component whose
//! output gates a retention safety check. §8's property tests require the
//! parser to be a pure function of its input, so this is a small
//! hand-written grammar instead.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Between,
    GreaterThan,
    LessThan,
    Equals,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Between => "between",
            Operation::GreaterThan => "greater_than",
            Operation::LessThan => "less_than",
            Operation::Equals => "equals",
        }
    }
}

// One rendering of a resolved range, in the wire format a particular
// consumer needs.
#[derive(Debug, Clone)]
pub struct FormattedRange {
    pub operation: Operation,
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ParsedDateExpression {
    pub operation: Operation,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub description: String,
    pub confidence: f64,
    pub assumptions: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct DateParseFailure {
    pub message: String,
}

pub type DateParseResult = Result<ParsedDateExpression, DateParseFailure>;

impl ParsedDateExpression {
    // YYYYMMDDHHMMSS strings, for the activities/transactions tables.
    pub fn activities_transactions(&self) -> FormattedRange {
        FormattedRange {
            operation: self.operation,
            start: self.start_date.map(|d| d.format("%Y%m%d%H%M%S").to_string()),
            end: self.end_date.map(|d| d.format("%Y%m%d%H%M%S").to_string()),
        }
    }

    // ISO-8601, for job_logs native timestamp columns.
    pub fn job_logs(&self) -> FormattedRange {
        FormattedRange {
            operation: self.operation,
            start: self.start_date.map(|d| d.to_rfc3339()),
            end: self.end_date.map(|d| d.to_rfc3339()),
        }
    }

    pub fn generic_datetime(&self) -> FormattedRange {
        FormattedRange {
            operation: self.operation,
            start: self
                .start_date
                .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string()),
            end: self
                .end_date
                .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string()),
        }
    }

    pub fn date_only(&self) -> FormattedRange {
        FormattedRange {
            operation: self.operation,
            start: self.start_date.map(|d| d.format("%Y-%m-%d").to_string()),
            end: self.end_date.map(|d| d.format("%Y-%m-%d").to_string()),
        }
    }
}

fn start_of_day(d: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&d.and_hms_opt(0, 0, 0).unwrap())
}

fn end_of_day(d: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&d.and_hms_opt(23, 59, 59).unwrap())
}

fn month_span(year: i32, month: u32) -> (NaiveDate, NaiveDate) {
    let start = NaiveDate::from_ymd_opt(year, month, 1).unwrap();
    let end = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1).unwrap()
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1).unwrap()
    }
    .pred_opt()
    .unwrap();
    (start, end)
}

static RELATIVE_OLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)older\s+than\s+(\d+)\s*(day|month|year)s?").unwrap());
static RELATIVE_LAST_N: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)last\s+(\d+)\s+days?").unwrap());
static MONTH_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(january|february|march|april|may|june|july|august|september|october|november|december)\b(?:\s+(\d{4}))?").unwrap()
});
static QUARTER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bq([1-4])\s*(\d{4})\b").unwrap());
static RANGE_FROM_TO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)from\s+(.+?)\s+to\s+(.+)").unwrap());
static RANGE_BETWEEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)between\s+(.+?)\s+and\s+(.+)").unwrap());

const MONTH_NAMES: &[&str] = &[
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

fn month_number(name: &str) -> Option<u32> {
    MONTH_NAMES
        .iter()
        .position(|m| *m == name.to_lowercase())
        .map(|i| i as u32 + 1)
}

// Parses a bare month/year fragment like "january 2024" or "january".
// Returns a single instant, not a span.
fn parse_simple_endpoint(text: &str, now: DateTime<Utc>, assumptions: &mut Vec<String>) -> Option<DateTime<Utc>> {
    let trimmed = text.trim();
    if let Some(caps) = MONTH_YEAR.captures(trimmed) {
        let month = month_number(&caps[1])?;
        let year = caps
            .get(2)
            .and_then(|m| m.as_str().parse::<i32>().ok())
            .unwrap_or_else(|| {
                assumptions.push(format!("assumed year {} for '{}'", now.year(), caps[1].to_string()));
                now.year()
            });
        return Some(start_of_day(NaiveDate::from_ymd_opt(year, month, 1)?));
    }
    None
}

// `now` is injected so the caller controls the reference instant (tests
// use a fixed one).
pub fn parse(phrase: &str, now: DateTime<Utc>) -> DateParseResult {
    let text = phrase.trim();
    if text.is_empty() {
        return Err(DateParseFailure {
            message: "empty date expression".to_string(),
        });
    }
    let lower = text.to_lowercase();
    let mut assumptions = Vec::new();

    // Calendar-relative single days. Checked ahead of the vague terms so
    // "yesterday"/"today" resolve to a tight, unambiguous span rather than
    // falling through to a fuzzy bucket.
    if Regex::new(r"(?i)\byesterday\b").unwrap().is_match(&lower) {
        let y = (now - Duration::days(1)).date_naive();
        return Ok(ParsedDateExpression {
            operation: Operation::Between,
            start_date: Some(start_of_day(y)),
            end_date: Some(end_of_day(y)),
            description: "yesterday".to_string(),
            confidence: 1.0,
            assumptions,
        });
    }
    if Regex::new(r"(?i)\btoday\b").unwrap().is_match(&lower) {
        let d = now.date_naive();
        return Ok(ParsedDateExpression {
            operation: Operation::Between,
            start_date: Some(start_of_day(d)),
            end_date: Some(now),
            description: "today".to_string(),
            confidence: 1.0,
            assumptions,
        });
    }

    // Vague terms first; they are unambiguous keywords.
    if lower.contains("recent") || lower.contains("latest") {
        assumptions.push("'recent/latest' assumed to mean the last 7 days".to_string());
        return Ok(ParsedDateExpression {
            operation: Operation::GreaterThan,
            start_date: Some(now - Duration::days(7)),
            end_date: None,
            description: "last 7 days".to_string(),
            confidence: 0.6,
            assumptions,
        });
    }
    if lower.contains("old data") {
        assumptions.push("'old data' assumed to mean older than one year".to_string());
        return Ok(ParsedDateExpression {
            operation: Operation::LessThan,
            start_date: None,
            end_date: Some(now - Duration::days(365)),
            description: "older than 1 year".to_string(),
            confidence: 0.5,
            assumptions,
        });
    }
    if lower.contains("holiday season") {
        assumptions.push("'holiday season' assumed to mean Dec 1 - Jan 7".to_string());
        let year = now.year();
        let start = start_of_day(NaiveDate::from_ymd_opt(year, 12, 1).unwrap());
        let end = end_of_day(NaiveDate::from_ymd_opt(year + 1, 1, 7).unwrap());
        return Ok(ParsedDateExpression {
            operation: Operation::Between,
            start_date: Some(start),
            end_date: Some(end),
            description: "holiday season (Dec 1 - Jan 7)".to_string(),
            confidence: 0.5,
            assumptions,
        });
    }

    // Relative: "older than N {day|month|year}[s]"
    if let Some(caps) = RELATIVE_OLDER.captures(&lower) {
        let n: i64 = caps[1].parse().map_err(|_| DateParseFailure {
            message: "could not parse numeric amount".to_string(),
        })?;
        let unit = caps[2].to_lowercase();
        let end = match unit.as_str() {
            "day" => now - Duration::days(n),
            "month" => now - Duration::days(n * 30),
            "year" => now - Duration::days(n * 365),
            _ => {
                return Err(DateParseFailure {
                    message: format!("unsupported unit '{unit}'"),
                })
            }
        };
        return Ok(ParsedDateExpression {
            operation: Operation::LessThan,
            start_date: None,
            end_date: Some(end),
            description: format!("older than {n} {unit}(s)"),
            confidence: 1.0,
            assumptions,
        });
    }

    // Relative: "last N days"
    if let Some(caps) = RELATIVE_LAST_N.captures(&lower) {
        let n: i64 = caps[1].parse().map_err(|_| DateParseFailure {
            message: "could not parse numeric amount".to_string(),
        })?;
        return Ok(ParsedDateExpression {
            operation: Operation::GreaterThan,
            start_date: Some(now - Duration::days(n)),
            end_date: None,
            description: format!("last {n} days"),
            confidence: 1.0,
            assumptions,
        });
    }

    // Quarters: "Q1 2025"
    if let Some(caps) = QUARTER.captures(&lower) {
        let q: u32 = caps[1].parse().unwrap();
        let year: i32 = caps[2].parse().map_err(|_| DateParseFailure {
            message: "could not parse year".to_string(),
        })?;
        let start_month = (q - 1) * 3 + 1;
        let end_month = start_month + 2;
        let (start, _) = month_span(year, start_month);
        let (_, end) = month_span(year, end_month);
        return Ok(ParsedDateExpression {
            operation: Operation::Between,
            start_date: Some(start_of_day(start)),
            end_date: Some(end_of_day(end)),
            description: format!("Q{q} {year}"),
            confidence: 1.0,
            assumptions,
        });
    }

    // Ranges: "from A to B" / "between A and B"
    if let Some(caps) = RANGE_FROM_TO.captures(text).or_else(|| RANGE_BETWEEN.captures(text)) {
        let a = caps.get(1).unwrap().as_str();
        let b = caps.get(2).unwrap().as_str();
        let start = parse_simple_endpoint(a, now, &mut assumptions);
        let end = parse_simple_endpoint(b, now, &mut assumptions);
        match (start, end) {
            (Some(s), Some(e)) => {
                return Ok(ParsedDateExpression {
                    operation: Operation::Between,
                    start_date: Some(s),
                    end_date: Some(e),
                    description: format!("{a} to {b}"),
                    confidence: if assumptions.is_empty() { 1.0 } else { 0.7 },
                    assumptions,
                });
            }
            _ => {
                return Err(DateParseFailure {
                    message: format!("could not resolve range endpoints in '{text}'"),
                });
            }
        }
    }

    // Absolute month/year: "January 2024" or bare "january"
    if let Some(caps) = MONTH_YEAR.captures(&lower) {
        let month = month_number(&caps[1]).ok_or_else(|| DateParseFailure {
            message: "unrecognized month".to_string(),
        })?;
        let year = match caps.get(2) {
            Some(m) => m.as_str().parse::<i32>().map_err(|_| DateParseFailure {
                message: "could not parse year".to_string(),
            })?,
            None => {
                assumptions.push(format!("assumed current year {}", now.year()));
                now.year()
            }
        };
        let (start, end) = month_span(year, month);
        return Ok(ParsedDateExpression {
            operation: Operation::Between,
            start_date: Some(start_of_day(start)),
            end_date: Some(end_of_day(end)),
            description: format!("{} {}", &caps[1], year),
            confidence: if assumptions.is_empty() { 1.0 } else { 0.8 },
            assumptions,
        });
    }

    Err(DateParseFailure {
        message: format!("unrecognized date expression: '{text}'"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn reference_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn older_than_days() {
        let parsed = parse("older than 7 days", reference_now()).unwrap();
        assert_eq!(parsed.operation, Operation::LessThan);
        assert_eq!(
            parsed.end_date.unwrap(),
            reference_now() - Duration::days(7)
        );
        assert_eq!(parsed.confidence, 1.0);
    }

    #[test]
    fn last_n_days() {
        let parsed = parse("last 30 days", reference_now()).unwrap();
        assert_eq!(parsed.operation, Operation::GreaterThan);
        assert_eq!(
            parsed.start_date.unwrap(),
            reference_now() - Duration::days(30)
        );
    }

    #[test]
    fn bare_month_assumes_current_year() {
        let parsed = parse("january", reference_now()).unwrap();
        assert!(parsed.confidence < 1.0);
        assert!(!parsed.assumptions.is_empty());
        assert_eq!(parsed.start_date.unwrap().year(), 2025);
    }

    #[test]
    fn month_with_year() {
        let parsed = parse("January 2024", reference_now()).unwrap();
        assert_eq!(parsed.operation, Operation::Between);
        assert_eq!(parsed.start_date.unwrap().year(), 2024);
        assert_eq!(parsed.start_date.unwrap().month(), 1);
        assert_eq!(parsed.end_date.unwrap().day(), 31);
    }

    #[test]
    fn quarter_expression() {
        let parsed = parse("Q1 2025", reference_now()).unwrap();
        assert_eq!(parsed.start_date.unwrap().month(), 1);
        assert_eq!(parsed.end_date.unwrap().month(), 3);
    }

    #[test]
    fn vague_recent_has_reduced_confidence() {
        let parsed = parse("recent activity", reference_now()).unwrap();
        assert!(parsed.confidence < 1.0);
        assert!(!parsed.assumptions.is_empty());
    }

    #[test]
    fn vague_old_data() {
        let parsed = parse("old data", reference_now()).unwrap();
        assert_eq!(parsed.operation, Operation::LessThan);
        assert_eq!(
            parsed.end_date.unwrap(),
            reference_now() - Duration::days(365)
        );
    }

    #[test]
    fn yesterday_resolves_to_a_single_day_span() {
        let parsed = parse("records from yesterday", reference_now()).unwrap();
        assert_eq!(parsed.operation, Operation::Between);
        assert_eq!(parsed.confidence, 1.0);
        let end = parsed.end_date.unwrap();
        assert!(now_minus_days(1) <= end && end < reference_now());
    }

    fn now_minus_days(n: i64) -> DateTime<Utc> {
        reference_now() - Duration::days(n)
    }

    #[test]
    fn unrecognized_phrase_fails() {
        let result = parse("whenever you feel like it", reference_now());
        assert!(result.is_err());
    }

    #[test]
    fn empty_phrase_fails() {
        assert!(parse("", reference_now()).is_err());
    }

    #[test]
    fn activities_transactions_format_is_fixed_width() {
        let parsed = parse("older than 7 days", reference_now()).unwrap();
        let formatted = parsed.activities_transactions();
        assert_eq!(formatted.end.unwrap().len(), 14);
    }
}

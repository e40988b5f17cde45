//! Free-text trip request extraction.
//!
//! Turns a sentence like "5 days in Tokyo in April with a $1500 budget" into
//! a structured request. Pattern matching only; anything not recognized stays
//! `None` and the caller decides how to degrade.

use chrono::{Datelike, Duration, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

static BUDGET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\$\s?(\d{2,6})|(\d{2,6})\s?(?:usd|dollars|bucks)").unwrap());

static DURATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d{1,2})\s*-?\s*(?:day|days|night|nights)\b").unwrap());

static MONTH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(january|february|march|april|may|june|july|august|september|october|november|december)\b",
    )
    .unwrap()
});

// Capitalized phrase after a travel preposition, e.g. "to New York City"
static DESTINATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\bto|\bin|\bat|\bvisit(?:ing)?)\s+([A-Z][a-z]+(?:\s+[A-Z][a-z]+){0,3})")
        .unwrap()
});

const MONTHS: [&str; 12] = [
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

const DEFAULT_DURATION_DAYS: u32 = 3;

/// Structured trip request extracted from free text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TripRequest {
    pub destination: Option<String>,
    pub budget: Option<u32>,
    pub duration_days: Option<u32>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl TripRequest {
    /// Extract a trip request from free text, resolving dates relative to
    /// `today`.
    pub fn extract(text: &str, today: NaiveDate) -> Self {
        let destination = extract_destination(text);
        let budget = extract_budget(text);
        let duration_days = extract_duration(text);

        let start_date = extract_month(text)
            .map(|month| first_of_month(today, month))
            .or(Some(first_of_next_month(today)));
        let end_date = start_date
            .map(|start| start + Duration::days(duration_days.unwrap_or(DEFAULT_DURATION_DAYS) as i64));

        Self {
            destination,
            budget,
            duration_days,
            start_date,
            end_date,
        }
    }
}

fn extract_budget(text: &str) -> Option<u32> {
    let caps = BUDGET_RE.captures(text)?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .and_then(|m| m.as_str().parse().ok())
}

fn extract_duration(text: &str) -> Option<u32> {
    DURATION_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .filter(|days| *days >= 1)
}

fn extract_month(text: &str) -> Option<u32> {
    let name = MONTH_RE.find(text)?.as_str().to_lowercase();
    MONTHS
        .iter()
        .position(|month| *month == name)
        .map(|i| i as u32 + 1)
}

fn extract_destination(text: &str) -> Option<String> {
    for caps in DESTINATION_RE.captures_iter(text) {
        let candidate = caps.get(1)?.as_str().trim();
        // Month names also appear after "in"
        if MONTHS.contains(&candidate.to_lowercase().as_str()) {
            continue;
        }
        return Some(candidate.to_string());
    }
    None
}

/// First day of `month` in the current year, or next year for months that
/// have already passed. The current month stays in the current year.
fn first_of_month(today: NaiveDate, month: u32) -> NaiveDate {
    let year = if month >= today.month() {
        today.year()
    } else {
        today.year() + 1
    };
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(today)
}

fn first_of_next_month(today: NaiveDate) -> NaiveDate {
    if today.month() == 12 {
        NaiveDate::from_ymd_opt(today.year() + 1, 1, 1).unwrap_or(today)
    } else {
        NaiveDate::from_ymd_opt(today.year(), today.month() + 1, 1).unwrap_or(today)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 15).unwrap()
    }

    #[test]
    fn test_full_request() {
        let request =
            TripRequest::extract("Plan a 5 day trip to Tokyo in October, budget $1500", today());
        assert_eq!(request.destination.as_deref(), Some("Tokyo"));
        assert_eq!(request.budget, Some(1500));
        assert_eq!(request.duration_days, Some(5));
        assert_eq!(
            request.start_date,
            NaiveDate::from_ymd_opt(2026, 10, 1)
        );
        assert_eq!(request.end_date, NaiveDate::from_ymd_opt(2026, 10, 6));
    }

    #[test]
    fn test_budget_word_forms() {
        assert_eq!(extract_budget("around 800 dollars"), Some(800));
        assert_eq!(extract_budget("roughly 2000 USD total"), Some(2000));
        assert_eq!(extract_budget("$ 950 please"), Some(950));
        assert_eq!(extract_budget("no numbers here"), None);
    }

    #[test]
    fn test_duration_night_form() {
        assert_eq!(extract_duration("a 4-night getaway"), Some(4));
        assert_eq!(extract_duration("staying 10 days"), Some(10));
        assert_eq!(extract_duration("a long weekend"), None);
    }

    #[test]
    fn test_multi_word_destination() {
        assert_eq!(
            extract_destination("flying to New York City soon"),
            Some("New York City".to_string())
        );
    }

    #[test]
    fn test_month_not_mistaken_for_destination() {
        let request = TripRequest::extract("somewhere warm in December", today());
        assert_eq!(request.destination, None);
        assert_eq!(
            request.start_date,
            NaiveDate::from_ymd_opt(2026, 12, 1)
        );
    }

    #[test]
    fn test_current_month_stays_in_current_year() {
        // Today is August 15; "in August" means this August, not next year's
        let request = TripRequest::extract("visit Porto in August", today());
        assert_eq!(
            request.start_date,
            NaiveDate::from_ymd_opt(2026, 8, 1)
        );
    }

    #[test]
    fn test_past_month_rolls_to_next_year() {
        // Today is August; March already passed this year
        let request = TripRequest::extract("visit Lisbon in March", today());
        assert_eq!(request.destination.as_deref(), Some("Lisbon"));
        assert_eq!(
            request.start_date,
            NaiveDate::from_ymd_opt(2027, 3, 1)
        );
    }

    #[test]
    fn test_no_month_defaults_to_next_month() {
        let request = TripRequest::extract("weekend trip to Oslo", today());
        assert_eq!(
            request.start_date,
            NaiveDate::from_ymd_opt(2026, 9, 1)
        );
    }

    #[test]
    fn test_december_wraps_year() {
        let december = NaiveDate::from_ymd_opt(2026, 12, 20).unwrap();
        assert_eq!(
            first_of_next_month(december),
            NaiveDate::from_ymd_opt(2027, 1, 1).unwrap()
        );
    }

    #[test]
    fn test_empty_text() {
        let request = TripRequest::extract("", today());
        assert_eq!(request.destination, None);
        assert_eq!(request.budget, None);
        assert_eq!(request.duration_days, None);
        // Dates still default so itineraries always have a window
        assert!(request.start_date.is_some());
    }
}

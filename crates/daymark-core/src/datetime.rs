use std::sync::OnceLock;

use chrono::{DateTime, Local, NaiveDate};
use regex::Regex;
use tracing::debug;

/// Canonical date text. Fixed-width and zero-padded so that lexicographic
/// string order equals chronological order; the datastore's `<`/`>`
/// comparisons depend on this.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Wall-clock display format used by the ticker's clock events.
pub const CLOCK_FORMAT: &str = "%b %d, %Y %I:%M:%S %p";

/// The date-picker form used by early versions of the app. Accepted on
/// input and converted; never stored.
const LEGACY_DATE_FORMAT: &str = "%d-%m-%Y";

#[must_use]
pub fn today_string(now: DateTime<Local>) -> String {
    now.format(DATE_FORMAT).to_string()
}

#[must_use]
pub fn format_clock(now: DateTime<Local>) -> String {
    now.format(CLOCK_FORMAT).to_string()
}

fn canonical_shape() -> &'static Regex {
    static SHAPE: OnceLock<Regex> = OnceLock::new();
    SHAPE.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid date shape regex"))
}

fn legacy_shape() -> &'static Regex {
    static SHAPE: OnceLock<Regex> = OnceLock::new();
    SHAPE.get_or_init(|| Regex::new(r"^\d{2}-\d{2}-\d{4}$").expect("valid date shape regex"))
}

/// Normalize a user-selected date into the canonical form.
///
/// Recognizes the canonical `YYYY-MM-DD` shape and the legacy `DD-MM-YYYY`
/// picker shape (converted). Anything else is returned verbatim: malformed
/// dates are never rejected, they just partition by their literal string
/// value.
#[must_use]
pub fn normalize_selected_date(input: &str) -> String {
    let token = input.trim();

    if canonical_shape().is_match(token) {
        return token.to_string();
    }

    if legacy_shape().is_match(token)
        && let Ok(date) = NaiveDate::parse_from_str(token, LEGACY_DATE_FORMAT)
    {
        let canonical = date.format(DATE_FORMAT).to_string();
        debug!(input = %token, canonical = %canonical, "converted legacy date form");
        return canonical;
    }

    debug!(input = %token, "date did not match a known shape; keeping verbatim");
    token.to_string()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn canonical_order_is_chronological() {
        // The whole partition scheme rides on this equivalence.
        let earlier = "2024-05-20";
        let later = "2024-06-03";
        assert!(earlier < later);

        let e = NaiveDate::parse_from_str(earlier, DATE_FORMAT).expect("parse");
        let l = NaiveDate::parse_from_str(later, DATE_FORMAT).expect("parse");
        assert!(e < l);
    }

    #[test]
    fn today_string_is_canonical() {
        let now = Local.with_ymd_and_hms(2024, 6, 1, 9, 30, 0).single().expect("valid");
        assert_eq!(today_string(now), "2024-06-01");
    }

    #[test]
    fn normalizes_legacy_picker_form() {
        assert_eq!(normalize_selected_date("03-06-2024"), "2024-06-03");
        assert_eq!(normalize_selected_date("  01-06-2024 "), "2024-06-01");
    }

    #[test]
    fn keeps_canonical_form_unchanged() {
        assert_eq!(normalize_selected_date("2024-06-03"), "2024-06-03");
    }

    #[test]
    fn passes_unknown_shapes_through() {
        assert_eq!(normalize_selected_date("next tuesday"), "next tuesday");
        assert_eq!(normalize_selected_date("99-99-9999"), "99-99-9999");
    }

    #[test]
    fn legacy_form_with_impossible_date_is_kept_verbatim() {
        // Matches the legacy shape but is not a real date.
        assert_eq!(normalize_selected_date("32-13-2024"), "32-13-2024");
    }
}

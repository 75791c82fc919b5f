//! Company registration anniversaries.
//!
//! [`generate`] derives one occurrence per company and year from the
//! registration date. It is a pure function of its inputs: the same companies
//! and window always produce the same logical ids, dates and titles, so a
//! generation pass can be repeated or abandoned at any point.

use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::event::{Company, LogicalId};
use crate::time::DateWindow;

static NON_ALNUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("Invalid slug regex"));

/// One year's anniversary of a company, computed on demand and never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedOccurrence {
    pub logical_id: LogicalId,
    pub company_id: i64,
    pub title: String,
    pub date: NaiveDate,
    /// Completed years since registration.
    pub years: u32,
}

/// Generates the anniversaries falling inside `window`.
///
/// Companies without a registration date are skipped, as is the registration
/// year itself. A 29 February registration is celebrated on 28 February in
/// common years. The result is sorted by date, then logical id.
pub fn generate(companies: &[Company], window: &DateWindow) -> Vec<GeneratedOccurrence> {
    let mut out = Vec::new();

    for company in companies {
        let Some(registered) = company.registration_date else {
            continue;
        };
        let slug = company_slug(company);

        for year in window.years() {
            let years = year - registered.year();
            if years < 1 {
                continue;
            }
            let Some(date) = anniversary_in(registered, year) else {
                continue;
            };
            if !window.contains(date) {
                continue;
            }
            // years >= 1 was checked above
            let years = years.unsigned_abs();
            out.push(GeneratedOccurrence {
                logical_id: LogicalId::for_anniversary(&slug, year),
                company_id: company.id,
                title: anniversary_title(&company.name, years),
                date,
                years,
            });
        }
    }

    out.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.logical_id.cmp(&b.logical_id)));
    out
}

/// Lower-cased company name with non-alphanumeric runs collapsed to `-`.
///
/// Falls back to `company-<id>` when nothing alphanumeric remains.
pub fn company_slug(company: &Company) -> String {
    let lower = company.name.to_lowercase();
    let slug = NON_ALNUM.replace_all(&lower, "-");
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        format!("company-{}", company.id)
    } else {
        slug.to_string()
    }
}

/// Display title, e.g. `Acme Ltd — 5th Anniversary`.
pub fn anniversary_title(name: &str, years: u32) -> String {
    format!("{} — {} Anniversary", name.trim(), ordinal(years))
}

fn anniversary_in(registered: NaiveDate, year: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, registered.month(), registered.day()).or_else(|| {
        // 29 February in a common year
        NaiveDate::from_ymd_opt(year, registered.month(), 28)
    })
}

fn ordinal(n: u32) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{n}{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn window(start: NaiveDate, end: NaiveDate) -> DateWindow {
        DateWindow::new(start, end).unwrap()
    }

    #[test]
    fn acme_fifth_anniversary() {
        let companies = vec![Company::new(1, "Acme Ltd", Some(date(2020, 3, 1)))];
        let out = generate(&companies, &window(date(2025, 1, 1), date(2026, 1, 1)));

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].logical_id.as_str(), "acme-ltd-anniv-2025");
        assert_eq!(out[0].date, date(2025, 3, 1));
        assert_eq!(out[0].title, "Acme Ltd — 5th Anniversary");
        assert_eq!(out[0].years, 5);
        assert_eq!(out[0].company_id, 1);
    }

    #[test]
    fn deterministic_across_runs() {
        let companies = vec![
            Company::new(1, "Acme Ltd", Some(date(2020, 3, 1))),
            Company::new(2, "Blue Widgets PLC", Some(date(2018, 7, 14))),
        ];
        let w = window(date(2024, 1, 1), date(2026, 1, 1));
        assert_eq!(generate(&companies, &w), generate(&companies, &w));
        assert_eq!(generate(&companies, &w).len(), 4);
    }

    #[test]
    fn skips_missing_registration_and_first_year() {
        let companies = vec![
            Company::new(1, "No Date Ltd", None),
            Company::new(2, "Fresh Co", Some(date(2025, 2, 1))),
        ];
        let out = generate(&companies, &window(date(2025, 1, 1), date(2026, 1, 1)));
        assert!(out.is_empty());
    }

    #[test]
    fn window_end_is_exclusive() {
        let companies = vec![Company::new(1, "Acme Ltd", Some(date(2020, 3, 1)))];
        assert!(generate(&companies, &window(date(2025, 1, 1), date(2025, 3, 1))).is_empty());
        assert_eq!(
            generate(&companies, &window(date(2025, 3, 1), date(2025, 3, 2))).len(),
            1
        );
    }

    #[test]
    fn leap_day_falls_back_to_28th() {
        let companies = vec![Company::new(3, "Leap Co", Some(date(2020, 2, 29)))];
        let out = generate(&companies, &window(date(2023, 1, 1), date(2025, 1, 1)));
        let dates: Vec<_> = out.iter().map(|o| o.date).collect();
        assert_eq!(dates, vec![date(2023, 2, 28), date(2024, 2, 29)]);
    }

    #[test]
    fn multi_year_window_is_sorted() {
        let companies = vec![
            Company::new(2, "Zed", Some(date(2010, 1, 5))),
            Company::new(1, "Alpha", Some(date(2010, 1, 5))),
        ];
        let out = generate(&companies, &window(date(2024, 1, 1), date(2026, 1, 1)));
        let ids: Vec<_> = out.iter().map(|o| o.logical_id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["alpha-anniv-2024", "zed-anniv-2024", "alpha-anniv-2025", "zed-anniv-2025"]
        );
    }

    #[test]
    fn slug_rules() {
        assert_eq!(company_slug(&Company::new(1, "Acme Ltd", None)), "acme-ltd");
        assert_eq!(
            company_slug(&Company::new(1, "  O'Brien & Sons, Inc. ", None)),
            "o-brien-sons-inc"
        );
        assert_eq!(company_slug(&Company::new(9, "!!!", None)), "company-9");
    }

    #[test]
    fn ordinals() {
        let cases = [
            (1, "1st"),
            (2, "2nd"),
            (3, "3rd"),
            (4, "4th"),
            (11, "11th"),
            (12, "12th"),
            (13, "13th"),
            (21, "21st"),
            (102, "102nd"),
            (111, "111th"),
        ];
        for (n, expected) in cases {
            assert_eq!(ordinal(n), expected, "ordinal({n})");
        }
    }
}

//! Bill projection
//!
//! Computes the next expected payment date for verified patterns and answers
//! the "what's due soon" query. Last-payment date and next-due date are
//! always recomputed together; `project` derives one from the other so a
//! stale pairing cannot exist.

use chrono::{Duration, Months, NaiveDate};

use crate::models::{Frequency, RecurringPattern};

/// Set `next_due_date` from the pattern's last transaction date and
/// frequency. Unknown frequency clears the projection.
pub fn project(pattern: &mut RecurringPattern) {
    pattern.next_due_date = pattern
        .frequency
        .and_then(|f| next_due(pattern.last_transaction_date, f));
}

/// The next due date after one observed payment.
///
/// Weekly and biweekly step in whole days; monthly and up use calendar
/// arithmetic, which clamps to the end of shorter months (Jan 31 -> Feb 28).
pub fn next_due(last: NaiveDate, frequency: Frequency) -> Option<NaiveDate> {
    match frequency {
        Frequency::Weekly => Some(last + Duration::days(7)),
        Frequency::Biweekly => Some(last + Duration::days(14)),
        Frequency::Monthly => last.checked_add_months(Months::new(1)),
        Frequency::Quarterly => last.checked_add_months(Months::new(3)),
        Frequency::Yearly => last.checked_add_months(Months::new(12)),
    }
}

/// Patterns due within the lookahead window, soonest first.
///
/// Filters out excluded patterns and those with no projection, keeps
/// `as_of <= next_due <= as_of + horizon_days`, sorts ascending by due date
/// with ties broken by descending average amount, then merchant name for
/// full determinism.
pub fn upcoming(
    patterns: &[RecurringPattern],
    as_of: NaiveDate,
    horizon_days: i64,
) -> Vec<RecurringPattern> {
    let horizon_end = as_of + Duration::days(horizon_days);

    let mut due: Vec<RecurringPattern> = patterns
        .iter()
        .filter(|p| !p.exclude_from_bills)
        .filter(|p| {
            p.next_due_date
                .map(|d| d >= as_of && d <= horizon_end)
                .unwrap_or(false)
        })
        .cloned()
        .collect();

    due.sort_by(|a, b| {
        a.next_due_date
            .cmp(&b.next_due_date)
            .then_with(|| {
                b.avg_amount
                    .partial_cmp(&a.avg_amount)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| a.merchant_name.cmp(&b.merchant_name))
    });

    due
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PatternKind;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn pattern(merchant: &str, last: NaiveDate, freq: Option<Frequency>) -> RecurringPattern {
        let mut p = RecurringPattern {
            id: 0,
            merchant_name: merchant.to_string(),
            normalized_key: merchant.to_lowercase(),
            category: None,
            kind: PatternKind::Subscription,
            frequency: freq,
            avg_amount: 10.0,
            amount_variance: 0.0,
            occurrences: 3,
            confidence: 0.8,
            mixed_pattern: false,
            last_transaction_date: last,
            next_due_date: None,
            exclude_from_bills: false,
            linked_transaction_ids: vec!["a".into(), "b".into(), "c".into()],
            auto_detected: true,
        };
        project(&mut p);
        p
    }

    #[test]
    fn test_next_due_offsets() {
        let last = date(2024, 3, 15);
        assert_eq!(next_due(last, Frequency::Weekly), Some(date(2024, 3, 22)));
        assert_eq!(next_due(last, Frequency::Biweekly), Some(date(2024, 3, 29)));
        assert_eq!(next_due(last, Frequency::Monthly), Some(date(2024, 4, 15)));
        assert_eq!(next_due(last, Frequency::Quarterly), Some(date(2024, 6, 15)));
        assert_eq!(next_due(last, Frequency::Yearly), Some(date(2025, 3, 15)));
    }

    #[test]
    fn test_end_of_month_clamping() {
        assert_eq!(
            next_due(date(2024, 1, 31), Frequency::Monthly),
            Some(date(2024, 2, 29))
        );
        assert_eq!(
            next_due(date(2023, 1, 31), Frequency::Monthly),
            Some(date(2023, 2, 28))
        );
        assert_eq!(
            next_due(date(2023, 11, 30), Frequency::Quarterly),
            Some(date(2024, 2, 29))
        );
    }

    #[test]
    fn test_unknown_frequency_clears_projection() {
        let p = pattern("Mystery", date(2024, 3, 1), None);
        assert!(p.next_due_date.is_none());
    }

    #[test]
    fn test_due_date_strictly_after_last() {
        for freq in [
            Frequency::Weekly,
            Frequency::Biweekly,
            Frequency::Monthly,
            Frequency::Quarterly,
            Frequency::Yearly,
        ] {
            let p = pattern("X", date(2024, 1, 31), Some(freq));
            assert!(p.next_due_date.unwrap() > p.last_transaction_date);
        }
    }

    #[test]
    fn test_upcoming_window_and_sort() {
        let as_of = date(2024, 4, 1);
        let mut soon = pattern("Alpha", date(2024, 3, 26), Some(Frequency::Weekly));
        soon.avg_amount = 5.0; // due 2024-04-02
        let mut same_day_bigger = pattern("Beta", date(2024, 3, 26), Some(Frequency::Weekly));
        same_day_bigger.avg_amount = 50.0; // due 2024-04-02
        let later = pattern("Gamma", date(2024, 3, 8), Some(Frequency::Monthly)); // due 2024-04-08
        let outside = pattern("Delta", date(2024, 4, 1), Some(Frequency::Monthly)); // due 2024-05-01

        let due = upcoming(
            &[soon, later, outside, same_day_bigger],
            as_of,
            7,
        );
        let names: Vec<&str> = due.iter().map(|p| p.merchant_name.as_str()).collect();
        // Same due date: larger amount first
        assert_eq!(names, vec!["Beta", "Alpha", "Gamma"]);
    }

    #[test]
    fn test_upcoming_excludes_past_due() {
        let as_of = date(2024, 5, 1);
        let past = pattern("Old", date(2024, 3, 1), Some(Frequency::Monthly)); // due 2024-04-01
        assert!(upcoming(&[past], as_of, 7).is_empty());
    }

    #[test]
    fn test_exclusion_invariant() {
        let as_of = date(2024, 4, 1);
        let mut p = pattern("Hidden", date(2024, 3, 26), Some(Frequency::Weekly));
        p.exclude_from_bills = true;
        // Due tomorrow, but excluded patterns never surface
        assert_eq!(p.next_due_date, Some(date(2024, 4, 2)));
        assert!(upcoming(&[p], as_of, 7).is_empty());
    }
}

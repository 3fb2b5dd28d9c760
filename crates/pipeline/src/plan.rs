//! Batch planning.

use serde::Serialize;
use time::Date;

/// The date folders one site visits in one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Plan {
    /// Past folders, oldest first. Each advances the checkpoint once processed.
    pub past: Vec<Date>,
    /// Today's folder, if present. Always visited, never checkpointed.
    pub today: Option<Date>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.past.is_empty() && self.today.is_none()
    }

    /// Every selected folder paired with whether it is today's, in
    /// processing order.
    pub fn folders(&self) -> impl Iterator<Item = (Date, bool)> + '_ {
        self.past.iter().map(|date| (*date, false)).chain(self.today.map(|date| (date, true)))
    }
}

/// Select the folders to visit.
///
/// Only dates after the checkpoint are candidates (all of them when there is
/// no checkpoint yet). Of those, the `batch_size` oldest past dates are taken;
/// today's folder is added on top whenever it exists. Dates after today are
/// never selected.
///
/// # Examples
///
/// ```
/// use thermo_pipeline::plan;
/// use time::macros::date;
///
/// let dates = [date!(2024 - 01 - 01), date!(2024 - 01 - 02), date!(2024 - 01 - 03)];
/// let plan = plan(&dates, None, date!(2024 - 01 - 03), 2);
/// assert_eq!(plan.past, vec![date!(2024 - 01 - 01), date!(2024 - 01 - 02)]);
/// assert_eq!(plan.today, Some(date!(2024 - 01 - 03)));
/// ```
pub fn plan(dates: &[Date], checkpoint: Option<Date>, today: Date, batch_size: usize) -> Plan {
    let mut candidates: Vec<Date> =
        dates.iter().copied().filter(|date| checkpoint.is_none_or(|checkpoint| *date > checkpoint)).collect();
    candidates.sort_unstable();
    candidates.dedup();
    Plan {
        past: candidates.iter().copied().filter(|date| *date < today).take(batch_size).collect(),
        today: candidates.contains(&today).then_some(today),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use time::macros::date;

    fn days(first: Date, count: usize) -> Vec<Date> {
        std::iter::successors(Some(first), |d| d.next_day()).take(count).collect()
    }

    #[test]
    fn test_active_day() {
        let dates = days(date!(2024 - 01 - 01), 3);
        let plan = plan(&dates, None, date!(2024 - 01 - 03), 2);
        let folders: Vec<_> = plan.folders().collect();
        assert_eq!(folders, vec![
            (date!(2024 - 01 - 01), false),
            (date!(2024 - 01 - 02), false),
            (date!(2024 - 01 - 03), true),
        ]);
    }

    #[test]
    fn test_bounded_batch() {
        let dates = days(date!(2024 - 01 - 01), 11);
        let plan = plan(&dates, None, date!(2024 - 01 - 11), 2);
        assert_eq!(plan.past, vec![date!(2024 - 01 - 01), date!(2024 - 01 - 02)]);
        assert_eq!(plan.today, Some(date!(2024 - 01 - 11)));
    }

    #[rstest]
    #[case::after_checkpoint(Some(date!(2024 - 01 - 02)), vec![date!(2024 - 01 - 03), date!(2024 - 01 - 04)])]
    #[case::no_checkpoint(None, vec![date!(2024 - 01 - 01), date!(2024 - 01 - 02)])]
    #[case::checkpoint_not_on_server(Some(date!(2023 - 06 - 01)), vec![date!(2024 - 01 - 01), date!(2024 - 01 - 02)])]
    fn test_checkpoint_filter(#[case] checkpoint: Option<Date>, #[case] expected: Vec<Date>) {
        let dates = days(date!(2024 - 01 - 01), 5);
        let plan = plan(&dates, checkpoint, date!(2024 - 02 - 01), 2);
        assert_eq!(plan.past, expected);
        assert_eq!(plan.today, None);
    }

    #[test]
    fn test_today_ignores_batch_size() {
        let dates = days(date!(2024 - 01 - 01), 4);
        let plan = plan(&dates, Some(date!(2024 - 01 - 03)), date!(2024 - 01 - 04), 0);
        assert!(plan.past.is_empty());
        assert_eq!(plan.today, Some(date!(2024 - 01 - 04)));
    }

    #[test]
    fn test_future_dates_never_selected() {
        let dates = days(date!(2024 - 01 - 05), 3);
        let plan = plan(&dates, None, date!(2024 - 01 - 04), 2);
        assert!(plan.is_empty());
    }

    #[test]
    fn test_fully_checkpointed_site_is_empty() {
        let dates = days(date!(2024 - 01 - 01), 3);
        assert!(plan(&dates, Some(date!(2024 - 01 - 03)), date!(2024 - 01 - 10), 2).is_empty());
    }
}

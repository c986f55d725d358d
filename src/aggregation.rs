//! Dashboard chart preparation.
//!
//! Turns a flat activity list into a per-day series for the line chart and
//! per-category totals for the breakdown chart. For every category,
//! `series + earlier + undated == totals`.

use chrono::{DateTime, Duration, Local, NaiveDate, TimeZone, Utc};
use std::collections::BTreeMap;

use crate::models::{Activity, Category};
use crate::utils::parse_timestamp;

/// Number of most recent days kept in the series
pub const MAX_BUCKETS: usize = 7;

/// Reference figure shown in the comparison panel
pub const NATIONAL_DAILY_AVERAGE_KG: f64 = 9.8;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CategoryTotals {
    pub transport: f64,
    pub energy: f64,
    pub food: f64,
}

impl CategoryTotals {
    /// Add an emission to its category. Returns false for categories without a total.
    pub fn add(&mut self, category: Category, kg: f64) -> bool {
        match category {
            Category::Transport => self.transport += kg,
            Category::Energy => self.energy += kg,
            Category::Food => self.food += kg,
            Category::Other => return false,
        }
        true
    }

    pub fn get(&self, category: Category) -> f64 {
        match category {
            Category::Transport => self.transport,
            Category::Energy => self.energy,
            Category::Food => self.food,
            Category::Other => 0.0,
        }
    }

    pub fn merge(&mut self, other: &CategoryTotals) {
        self.transport += other.transport;
        self.energy += other.energy;
        self.food += other.food;
    }

    pub fn sum(&self) -> f64 {
        self.transport + self.energy + self.food
    }

    /// Percentage share per category, skipping empty ones
    pub fn shares(&self) -> Vec<(Category, f64)> {
        let sum = self.sum();
        if sum <= 0.0 {
            return Vec::new();
        }
        [Category::Transport, Category::Energy, Category::Food]
            .into_iter()
            .filter(|c| self.get(*c) > 0.0)
            .map(|c| (c, self.get(c) / sum * 100.0))
            .collect()
    }
}

/// One calendar day of emissions
#[derive(Debug, Clone, PartialEq)]
pub struct DayBucket {
    pub date: NaiveDate,
    /// Short label for the chart axis, e.g. "Oct 17"
    pub label: String,
    pub by_category: CategoryTotals,
    /// Everything logged that day, including uncategorised records
    pub total: f64,
}

impl DayBucket {
    fn new(date: NaiveDate) -> Self {
        Self {
            date,
            label: date.format("%b %-d").to_string(),
            by_category: CategoryTotals::default(),
            total: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmissionsReport {
    /// Ascending by date, at most MAX_BUCKETS long
    pub series: Vec<DayBucket>,
    /// Totals over the whole input
    pub totals: CategoryTotals,
    /// Category sums of days older than the series window
    pub earlier: CategoryTotals,
    /// Category sums of records whose timestamp could not be parsed
    pub undated: CategoryTotals,
    /// Records left out of the series because of their timestamp
    pub skipped: usize,
    pub record_count: usize,
}

impl EmissionsReport {
    pub fn is_empty(&self) -> bool {
        self.record_count == 0
    }

    /// Average per day over the days shown in the series
    pub fn daily_average(&self) -> f64 {
        if self.series.is_empty() {
            return 0.0;
        }
        self.series.iter().map(|b| b.total).sum::<f64>() / self.series.len() as f64
    }

    /// Highest single-day total in the series, used to scale the chart
    pub fn peak(&self) -> f64 {
        self.series
            .iter()
            .flat_map(|b| {
                [b.total, b.by_category.transport, b.by_category.energy, b.by_category.food]
            })
            .fold(0.0, f64::max)
    }
}

/// Aggregate in the local time zone
pub fn aggregate(records: &[Activity]) -> EmissionsReport {
    aggregate_in(records, &Local)
}

/// Aggregate, grouping by calendar day in `tz`
pub fn aggregate_in<Tz: TimeZone>(records: &[Activity], tz: &Tz) -> EmissionsReport {
    let mut report = EmissionsReport {
        record_count: records.len(),
        ..EmissionsReport::default()
    };
    let mut buckets: BTreeMap<NaiveDate, DayBucket> = BTreeMap::new();

    for record in records {
        let kg = record.emission();
        report.totals.add(record.category, kg);

        let Some(timestamp) = parse_timestamp(&record.timestamp) else {
            report.undated.add(record.category, kg);
            report.skipped += 1;
            continue;
        };

        let date = timestamp.with_timezone(tz).date_naive();
        let bucket = buckets.entry(date).or_insert_with(|| DayBucket::new(date));
        bucket.by_category.add(record.category, kg);
        bucket.total += kg;
    }

    if report.skipped > 0 {
        tracing::debug!(skipped = report.skipped, "Activities with unparseable timestamps left out of the series");
    }

    let mut series: Vec<DayBucket> = buckets.into_values().collect();
    if series.len() > MAX_BUCKETS {
        let dropped = series.len() - MAX_BUCKETS;
        for bucket in series.drain(..dropped) {
            report.earlier.merge(&bucket.by_category);
        }
    }
    report.series = series;
    report
}

/// Sum of emissions in the seven days ending on `now`
pub fn rolling_week_total<Tz: TimeZone>(records: &[Activity], now: DateTime<Utc>, tz: &Tz) -> f64 {
    let today = now.with_timezone(tz).date_naive();
    let first_day = today - Duration::days(6);
    records
        .iter()
        .filter_map(|r| parse_timestamp(&r.timestamp).map(|t| (t.with_timezone(tz).date_naive(), r)))
        .filter(|(date, _)| *date >= first_day && *date <= today)
        .map(|(_, r)| r.emission())
        .sum()
}

/// Progress towards an emissions budget
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GoalProgress {
    pub goal_kg: f64,
    pub used_kg: f64,
    /// 0..=100, for the gauge
    pub percent: u16,
    pub remaining_kg: f64,
    pub exceeded: bool,
}

/// The profile's weekly goal when it is a usable budget, else the configured default
pub fn weekly_goal(profile_goal_kg: Option<f64>, default_kg: f64) -> f64 {
    profile_goal_kg
        .filter(|g| g.is_finite() && *g > 0.0)
        .unwrap_or(default_kg)
}

pub fn goal_progress(used_kg: f64, goal_kg: f64) -> GoalProgress {
    let used_kg = used_kg.max(0.0);
    let ratio = if goal_kg > 0.0 { used_kg / goal_kg } else { 0.0 };
    GoalProgress {
        goal_kg,
        used_kg,
        percent: (ratio * 100.0).round().clamp(0.0, 100.0) as u16,
        remaining_kg: (goal_kg - used_kg).max(0.0),
        exceeded: goal_kg > 0.0 && used_kg > goal_kg,
    }
}

/// Percentage relative to the national average; negative means below it
pub fn compare_to_national(daily_average_kg: f64) -> f64 {
    (daily_average_kg - NATIONAL_DAILY_AVERAGE_KG) / NATIONAL_DAILY_AVERAGE_KG * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn activity(category: Category, co2: f64, timestamp: &str) -> Activity {
        Activity {
            id: format!("{}-{}", category.as_str(), timestamp),
            category,
            kind: String::new(),
            distance_km: None,
            usage: None,
            unit: None,
            servings: None,
            co2_kg: co2,
            timestamp: timestamp.to_string(),
            notes: None,
        }
    }

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
    }

    #[test]
    fn test_empty_input_gives_empty_report() {
        let report = aggregate_in(&[], &Utc);
        assert!(report.is_empty());
        assert!(report.series.is_empty());
        assert_eq!(report.totals, CategoryTotals::default());
        assert_eq!(report.daily_average(), 0.0);
    }

    #[test]
    fn test_groups_by_day_and_category() {
        let records = vec![
            activity(Category::Transport, 2.5, "2026-10-15T08:00:00Z"),
            activity(Category::Energy, 3.0, "2026-10-15T20:00:00Z"),
            activity(Category::Transport, 1.0, "2026-10-16T09:00:00Z"),
        ];
        let report = aggregate_in(&records, &Utc);
        assert_eq!(report.series.len(), 2);
        assert_eq!(report.series[0].label, "Oct 15");
        assert_close(report.series[0].by_category.transport, 2.5);
        assert_close(report.series[0].by_category.energy, 3.0);
        assert_close(report.series[0].total, 5.5);
        assert_close(report.totals.transport, 3.5);
    }

    #[test]
    fn test_series_truncated_to_most_recent_days_in_order() {
        let records: Vec<Activity> = (1..=10)
            .rev()
            .map(|day| activity(Category::Energy, day as f64, &format!("2026-10-{:02}T12:00:00Z", day)))
            .collect();
        let report = aggregate_in(&records, &Utc);

        assert_eq!(report.series.len(), MAX_BUCKETS);
        assert!(report.series.windows(2).all(|w| w[0].date < w[1].date));
        assert_eq!(report.series[0].date, NaiveDate::from_ymd_opt(2026, 10, 4).unwrap());
        assert_close(report.earlier.energy, 1.0 + 2.0 + 3.0);
    }

    #[test]
    fn test_totals_are_conserved_across_both_paths() {
        let categories = [Category::Transport, Category::Energy, Category::Food];
        let records: Vec<Activity> = (0..40)
            .map(|i| {
                activity(
                    categories[i % 3],
                    0.3 * (i as f64 + 1.0),
                    &format!("2026-09-{:02}T{:02}:15:00Z", 1 + (i * 7) % 28, i % 24),
                )
            })
            .collect();
        let report = aggregate_in(&records, &Utc);

        let mut from_buckets = CategoryTotals::default();
        for bucket in &report.series {
            from_buckets.merge(&bucket.by_category);
        }
        from_buckets.merge(&report.earlier);
        from_buckets.merge(&report.undated);

        for category in categories {
            assert_close(from_buckets.get(category), report.totals.get(category));
        }
    }

    #[test]
    fn test_unknown_category_counts_toward_day_total_only() {
        let records = vec![
            activity(Category::Transport, 1.0, "2026-10-15T08:00:00Z"),
            activity(Category::Other, 4.0, "2026-10-15T09:00:00Z"),
        ];
        let report = aggregate_in(&records, &Utc);
        assert_close(report.series[0].total, 5.0);
        assert_close(report.series[0].by_category.sum(), 1.0);
        assert_close(report.totals.sum(), 1.0);
    }

    #[test]
    fn test_malformed_timestamp_is_skipped_from_series() {
        let records = vec![
            activity(Category::Energy, 2.0, "not a date"),
            activity(Category::Energy, 1.0, "2026-10-15T08:00:00Z"),
        ];
        let report = aggregate_in(&records, &Utc);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.series.len(), 1);
        assert_close(report.undated.energy, 2.0);
        assert_close(report.totals.energy, 3.0);
        assert!(!report.is_empty());
    }

    #[test]
    fn test_day_boundary_follows_time_zone() {
        let records = vec![activity(Category::Energy, 1.0, "2026-10-15T23:30:00Z")];
        let tokyo = chrono::FixedOffset::east_opt(9 * 3600).unwrap();
        let report = aggregate_in(&records, &tokyo);
        assert_eq!(report.series[0].date, NaiveDate::from_ymd_opt(2026, 10, 16).unwrap());
    }

    #[test]
    fn test_shares() {
        let totals = CategoryTotals { transport: 1.0, energy: 3.0, food: 0.0 };
        let shares = totals.shares();
        assert_eq!(shares.len(), 2);
        assert_eq!(shares[0].0, Category::Transport);
        assert_close(shares[0].1, 25.0);
        assert!(CategoryTotals::default().shares().is_empty());
    }

    #[test]
    fn test_rolling_week_total() {
        let records = vec![
            activity(Category::Energy, 1.0, "2026-10-17T08:00:00Z"),
            activity(Category::Energy, 2.0, "2026-10-11T08:00:00Z"),
            activity(Category::Energy, 4.0, "2026-10-10T08:00:00Z"),
        ];
        let now = Utc.with_ymd_and_hms(2026, 10, 17, 12, 0, 0).unwrap();
        assert_close(rolling_week_total(&records, now, &Utc), 3.0);
    }

    #[test]
    fn test_weekly_goal_ignores_unusable_profile_values() {
        assert_close(weekly_goal(Some(30.0), 45.0), 30.0);
        assert_close(weekly_goal(None, 45.0), 45.0);
        assert_close(weekly_goal(Some(0.0), 45.0), 45.0);
        assert_close(weekly_goal(Some(-5.0), 45.0), 45.0);
        assert_close(weekly_goal(Some(f64::NAN), 45.0), 45.0);
    }

    #[test]
    fn test_goal_progress() {
        let progress = goal_progress(39.15, 45.0);
        assert_eq!(progress.percent, 87);
        assert_close(progress.remaining_kg, 5.85);
        assert!(!progress.exceeded);

        let over = goal_progress(60.0, 45.0);
        assert_eq!(over.percent, 100);
        assert!(over.exceeded);
        assert_eq!(over.remaining_kg, 0.0);
    }

    #[test]
    fn test_compare_to_national() {
        assert!(compare_to_national(7.4) < 0.0);
        assert_close(compare_to_national(9.8), 0.0);
    }
}

//! Capacity metrics: rolling per-location completion windows and the
//! category mix.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use crate::entities::{daily_completion, location, InstrumentCategory};
use crate::errors::ServiceError;

/// Completed-unit total for one location over a window.
#[derive(Debug, Clone, Serialize)]
pub struct LocationWindowTotal {
    pub location_id: Uuid,
    pub store_number: String,
    pub city: String,
    pub units_completed: i64,
}

/// One category's share of the completed units.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryShare {
    pub category: InstrumentCategory,
    pub units_completed: i64,
    /// Whole-number percentage of the grand total. Zero when nothing has
    /// been completed at all.
    pub percentage: u32,
}

/// The dashboard metrics bundle.
#[derive(Debug, Clone, Serialize)]
pub struct CapacityMetrics {
    pub last_7_days: Vec<LocationWindowTotal>,
    pub last_30_days: Vec<LocationWindowTotal>,
    pub category_breakdown: Vec<CategoryShare>,
}

/// Service computing capacity metrics from the completion log.
#[derive(Clone)]
pub struct MetricsService {
    db: Arc<DatabaseConnection>,
}

impl MetricsService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Both rolling windows plus the 30-day category mix, fetched
    /// concurrently. Any failing fetch fails the whole bundle; the dashboard
    /// never renders a partially wrong picture.
    #[instrument(skip(self))]
    pub async fn capacity_metrics(&self) -> Result<CapacityMetrics, ServiceError> {
        let today = Utc::now().date_naive();

        let (locations, week, month) = tokio::try_join!(
            self.all_locations(),
            self.completions_since(window_start(today, 7)),
            self.completions_since(window_start(today, 30)),
        )?;

        let category_breakdown = category_breakdown(&month);
        Ok(CapacityMetrics {
            last_7_days: sum_by_location(&locations, &week),
            last_30_days: sum_by_location(&locations, &month),
            category_breakdown,
        })
    }

    async fn all_locations(&self) -> Result<Vec<location::Model>, ServiceError> {
        Ok(location::Entity::find().all(&*self.db).await?)
    }

    async fn completions_since(
        &self,
        start: NaiveDate,
    ) -> Result<Vec<daily_completion::Model>, ServiceError> {
        Ok(daily_completion::Entity::find()
            .filter(daily_completion::Column::CompletionDate.gte(start))
            .all(&*self.db)
            .await?)
    }
}

/// Inclusive lower bound of a trailing window ending today, anchored at
/// `today` minus `days`. A 7-day window on the 15th admits completions
/// dated the 8th onward.
pub fn window_start(today: NaiveDate, days: i64) -> NaiveDate {
    today - Duration::days(days)
}

/// Sums completed units per location. Every known location appears exactly
/// once, zero-filled, in store-number order.
pub fn sum_by_location(
    locations: &[location::Model],
    completions: &[daily_completion::Model],
) -> Vec<LocationWindowTotal> {
    let mut totals: HashMap<Uuid, i64> = HashMap::new();
    for completion in completions {
        *totals.entry(completion.location_id).or_default() += i64::from(completion.quantity_completed);
    }

    let mut rows: Vec<LocationWindowTotal> = locations
        .iter()
        .map(|loc| LocationWindowTotal {
            location_id: loc.id,
            store_number: loc.store_number.clone(),
            city: loc.city.clone(),
            units_completed: totals.get(&loc.id).copied().unwrap_or(0),
        })
        .collect();
    rows.sort_by(|a, b| a.store_number.cmp(&b.store_number));
    rows
}

/// Splits the completed units across instrument categories, busiest first.
/// Every category appears, zero-filled; percentages are rounded to whole
/// numbers and are all zero when nothing has been completed.
pub fn category_breakdown(completions: &[daily_completion::Model]) -> Vec<CategoryShare> {
    use sea_orm::Iterable;

    let mut per_category: HashMap<InstrumentCategory, i64> = HashMap::new();
    for completion in completions {
        *per_category.entry(completion.category).or_default() +=
            i64::from(completion.quantity_completed);
    }
    let total: i64 = per_category.values().sum();

    let mut shares: Vec<CategoryShare> = InstrumentCategory::iter()
        .map(|category| {
            let units = per_category.get(&category).copied().unwrap_or(0);
            let percentage = if total == 0 {
                0
            } else {
                ((units as f64 / total as f64) * 100.0).round() as u32
            };
            CategoryShare {
                category,
                units_completed: units,
                percentage,
            }
        })
        .collect();
    shares.sort_by(|a, b| b.units_completed.cmp(&a.units_completed));
    shares
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn loc(id: u128, store: &str, city: &str) -> location::Model {
        location::Model {
            id: Uuid::from_u128(id),
            store_number: store.to_string(),
            city: city.to_string(),
            state: "TX".to_string(),
            created_at: DateTime::<Utc>::MIN_UTC,
        }
    }

    fn completion(
        location: &location::Model,
        category: InstrumentCategory,
        quantity: i32,
    ) -> daily_completion::Model {
        daily_completion::Model {
            id: Uuid::new_v4(),
            location_id: location.id,
            tech_id: Uuid::from_u128(99),
            category,
            instrument_type: "Trumpet".to_string(),
            brand: "Bach".to_string(),
            quantity_completed: quantity,
            yellow_armband_applied: true,
            qc_card_signed: true,
            notes: None,
            completion_date: day(2026, 1, 15),
            created_at: DateTime::<Utc>::MIN_UTC,
        }
    }

    #[test]
    fn window_start_is_anchored_days_before_today() {
        assert_eq!(window_start(day(2026, 1, 15), 7), day(2026, 1, 8));
        assert_eq!(window_start(day(2026, 1, 15), 30), day(2025, 12, 16));
        assert_eq!(window_start(day(2026, 1, 15), 1), day(2026, 1, 14));
    }

    #[test]
    fn boundary_day_falls_inside_the_window() {
        let today = day(2026, 1, 15);
        let start = window_start(today, 7);
        assert!(day(2026, 1, 8) >= start);
        assert!(day(2026, 1, 7) < start);
    }

    #[test]
    fn locations_without_completions_are_zero_filled() {
        let a = loc(1, "9397", "Austin");
        let b = loc(2, "1201", "Dallas");
        let completions = vec![completion(&a, InstrumentCategory::Brass, 5)];

        let rows = sum_by_location(&[a, b], &completions);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].store_number, "1201");
        assert_eq!(rows[0].units_completed, 0);
        assert_eq!(rows[1].store_number, "9397");
        assert_eq!(rows[1].units_completed, 5);
    }

    #[test]
    fn location_totals_sum_quantities_not_rows() {
        let a = loc(1, "9397", "Austin");
        let completions = vec![
            completion(&a, InstrumentCategory::Brass, 5),
            completion(&a, InstrumentCategory::Woodwinds, 3),
        ];
        let rows = sum_by_location(std::slice::from_ref(&a), &completions);
        assert_eq!(rows[0].units_completed, 8);
    }

    #[test]
    fn location_totals_conserve_the_grand_total() {
        let a = loc(1, "9397", "Austin");
        let b = loc(2, "1201", "Dallas");
        let completions = vec![
            completion(&a, InstrumentCategory::Brass, 5),
            completion(&b, InstrumentCategory::Strings, 7),
            completion(&a, InstrumentCategory::Woodwinds, 2),
        ];
        let rows = sum_by_location(&[a, b], &completions);
        let total: i64 = rows.iter().map(|r| r.units_completed).sum();
        assert_eq!(total, 14);
    }

    #[test]
    fn breakdown_covers_every_category() {
        let a = loc(1, "9397", "Austin");
        let completions = vec![
            completion(&a, InstrumentCategory::Brass, 3),
            completion(&a, InstrumentCategory::Brass, 1),
            completion(&a, InstrumentCategory::Strings, 4),
        ];
        let shares = category_breakdown(&completions);
        assert_eq!(shares.len(), 3);
        assert_eq!(shares[0].category, InstrumentCategory::Brass);
        assert_eq!(shares[1].category, InstrumentCategory::Strings);

        let brass = shares
            .iter()
            .find(|s| s.category == InstrumentCategory::Brass)
            .unwrap();
        assert_eq!(brass.units_completed, 4);
        assert_eq!(brass.percentage, 50);

        let woodwinds = shares
            .iter()
            .find(|s| s.category == InstrumentCategory::Woodwinds)
            .unwrap();
        assert_eq!(woodwinds.units_completed, 0);
        assert_eq!(woodwinds.percentage, 0);
    }

    #[test]
    fn empty_log_yields_zero_percentages() {
        let shares = category_breakdown(&[]);
        assert!(shares.iter().all(|s| s.units_completed == 0));
        assert!(shares.iter().all(|s| s.percentage == 0));
    }
}

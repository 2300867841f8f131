//! Admin dashboard rollups over booking history.
//!
//! The report is computed from two reads (event count, booking facts) and the
//! aggregation itself is pure. Cancelled bookings never count. Monthly buckets
//! are emitted only for months with at least one booking; gaps are not filled.

use chrono::Datelike;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};
use crate::models::RequestContext;
use crate::store::{BookingFact, DateWindow, Store};

/// Group key used for bookings whose event has no city or region.
pub const UNSPECIFIED: &str = "unspecified";
pub const DEFAULT_TOP_N: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsQuery {
    pub window: DateWindow,
    pub top: usize,
}

impl Default for AnalyticsQuery {
    fn default() -> Self {
        Self {
            window: DateWindow::default(),
            top: DEFAULT_TOP_N,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub total_events: u64,
    pub total_bookings: u64,
    pub total_tickets: i64,
    pub total_revenue: Decimal,
    pub average_ticket_price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupCount {
    pub name: String,
    pub bookings: u64,
    pub tickets: i64,
    pub revenue: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRevenue {
    pub event_id: Uuid,
    pub title: String,
    pub bookings: u64,
    pub tickets: i64,
    pub revenue: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyBucket {
    /// `YYYY-MM`
    pub month: String,
    pub bookings: u64,
    pub tickets: i64,
    pub revenue: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingAggregates {
    pub total_bookings: u64,
    pub total_tickets: i64,
    pub total_revenue: Decimal,
    pub average_ticket_price: Decimal,
    pub top_cities: Vec<GroupCount>,
    pub top_regions: Vec<GroupCount>,
    pub top_categories: Vec<GroupCount>,
    pub top_events_by_revenue: Vec<EventRevenue>,
    pub revenue_by_month: Vec<MonthlyBucket>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsReport {
    pub window: DateWindow,
    pub totals: Totals,
    pub top_cities: Vec<GroupCount>,
    pub top_regions: Vec<GroupCount>,
    pub top_categories: Vec<GroupCount>,
    pub top_events_by_revenue: Vec<EventRevenue>,
    pub revenue_by_month: Vec<MonthlyBucket>,
    /// Always false: months with no bookings are omitted from `revenue_by_month`.
    pub months_gap_filled: bool,
    /// Sections that could not be computed and were zeroed.
    pub warnings: Vec<String>,
}

#[derive(Default)]
struct Tally {
    bookings: u64,
    tickets: i64,
    revenue: Decimal,
}

impl Tally {
    fn add(&mut self, fact: &BookingFact) {
        self.bookings += 1;
        self.tickets += i64::from(fact.quantity);
        self.revenue += fact.total_amount;
    }
}

/// Tallies facts per key, remembering the order keys were first seen in.
fn tally_by<K, F>(facts: &[BookingFact], key: F) -> Vec<(K, Tally)>
where
    K: Eq + Hash + Clone,
    F: Fn(&BookingFact) -> K,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut groups: Vec<(K, Tally)> = Vec::new();
    for fact in facts {
        let k = key(fact);
        let slot = *index.entry(k.clone()).or_insert_with(|| {
            groups.push((k, Tally::default()));
            groups.len() - 1
        });
        groups[slot].1.add(fact);
    }
    groups
}

fn location_key(value: Option<&str>) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => UNSPECIFIED.to_string(),
    }
}

/// Top `n` groups by booking count. `sort_by` is stable, so ties keep first-seen order.
fn top_by_count(facts: &[BookingFact], n: usize, key: impl Fn(&BookingFact) -> String) -> Vec<GroupCount> {
    let mut groups = tally_by(facts, key);
    groups.sort_by(|a, b| b.1.bookings.cmp(&a.1.bookings));
    groups
        .into_iter()
        .take(n)
        .map(|(name, tally)| GroupCount {
            name,
            bookings: tally.bookings,
            tickets: tally.tickets,
            revenue: tally.revenue,
        })
        .collect()
}

fn top_events_by_revenue(facts: &[BookingFact], n: usize) -> Vec<EventRevenue> {
    let titles: HashMap<Uuid, &str> = facts
        .iter()
        .map(|f| (f.event_id, f.event_title.as_str()))
        .collect();
    let mut groups = tally_by(facts, |f| f.event_id);
    groups.sort_by(|a, b| b.1.revenue.cmp(&a.1.revenue));
    groups
        .into_iter()
        .take(n)
        .map(|(event_id, tally)| EventRevenue {
            title: titles.get(&event_id).copied().unwrap_or_default().to_string(),
            event_id,
            bookings: tally.bookings,
            tickets: tally.tickets,
            revenue: tally.revenue,
        })
        .collect()
}

fn revenue_by_month(facts: &[BookingFact]) -> Vec<MonthlyBucket> {
    let mut months: BTreeMap<(i32, u32), Tally> = BTreeMap::new();
    for fact in facts {
        let key = (fact.created_at.year(), fact.created_at.month());
        months.entry(key).or_default().add(fact);
    }
    months
        .into_iter()
        .map(|((year, month), tally)| MonthlyBucket {
            month: format!("{year:04}-{month:02}"),
            bookings: tally.bookings,
            tickets: tally.tickets,
            revenue: tally.revenue,
        })
        .collect()
}

/// Mean over bookings of `total_amount / quantity`.
fn average_ticket_price(facts: &[BookingFact]) -> Decimal {
    let prices: Vec<Decimal> = facts
        .iter()
        .filter(|f| f.quantity > 0)
        .map(|f| f.total_amount / Decimal::from(f.quantity))
        .collect();
    if prices.is_empty() {
        return Decimal::ZERO;
    }
    let sum: Decimal = prices.iter().sum();
    (sum / Decimal::from(prices.len() as u64)).round_dp(2)
}

pub fn aggregate(facts: &[BookingFact], top: usize) -> BookingAggregates {
    BookingAggregates {
        total_bookings: facts.len() as u64,
        total_tickets: facts.iter().map(|f| i64::from(f.quantity)).sum(),
        total_revenue: facts.iter().map(|f| f.total_amount).sum(),
        average_ticket_price: average_ticket_price(facts),
        top_cities: top_by_count(facts, top, |f| location_key(f.city.as_deref())),
        top_regions: top_by_count(facts, top, |f| location_key(f.region.as_deref())),
        top_categories: top_by_count(facts, top, |f| location_key(Some(f.category.as_str()))),
        top_events_by_revenue: top_events_by_revenue(facts, top),
        revenue_by_month: revenue_by_month(facts),
    }
}

#[derive(Clone)]
pub struct AnalyticsService {
    store: Arc<dyn Store>,
}

impl AnalyticsService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Builds the admin report. A failing read zeroes the sections that depend
    /// on it and is reported in `warnings` instead of failing the report.
    pub async fn report(
        &self,
        ctx: &RequestContext,
        query: AnalyticsQuery,
    ) -> ServiceResult<AnalyticsReport> {
        if !ctx.is_admin() {
            return Err(ServiceError::Forbidden("analytics are admin-only".into()));
        }
        if let (Some(start), Some(end)) = (query.window.start_date, query.window.end_date) {
            if start > end {
                return Err(ServiceError::Validation(format!(
                    "startDate {start} is after endDate {end}"
                )));
            }
        }

        let mut warnings = Vec::new();
        let (events, facts) = tokio::join!(
            self.store.count_events(query.window),
            self.store.booking_facts(query.window)
        );

        let total_events = events.unwrap_or_else(|err| {
            warn!(error = %err, "Event count unavailable for analytics report");
            warnings.push(format!("totalEvents unavailable: {err}"));
            0
        });
        let aggregates = match facts {
            Ok(facts) => aggregate(&facts, query.top),
            Err(err) => {
                warn!(error = %err, "Booking history unavailable for analytics report");
                warnings.push(format!("booking aggregates unavailable: {err}"));
                BookingAggregates::default()
            }
        };

        info!(
            total_events,
            total_bookings = aggregates.total_bookings,
            warnings = warnings.len(),
            "Analytics report built"
        );

        Ok(AnalyticsReport {
            window: query.window,
            totals: Totals {
                total_events,
                total_bookings: aggregates.total_bookings,
                total_tickets: aggregates.total_tickets,
                total_revenue: aggregates.total_revenue,
                average_ticket_price: aggregates.average_ticket_price,
            },
            top_cities: aggregates.top_cities,
            top_regions: aggregates.top_regions,
            top_categories: aggregates.top_categories,
            top_events_by_revenue: aggregates.top_events_by_revenue,
            revenue_by_month: aggregates.revenue_by_month,
            months_gap_filled: false,
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn fact(
        event_id: Uuid,
        category: &str,
        city: Option<&str>,
        quantity: i32,
        total: i64,
        (y, m, d): (i32, u32, u32),
    ) -> BookingFact {
        BookingFact {
            booking_id: Uuid::new_v4(),
            event_id,
            event_title: format!("Event {category}"),
            category: category.to_string(),
            city: city.map(str::to_string),
            region: None,
            quantity,
            total_amount: Decimal::new(total * 100, 2),
            created_at: Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_revenue_by_month_is_ascending() {
        let event = Uuid::new_v4();
        let facts = vec![
            fact(event, "music", Some("Douala"), 1, 1500, (2026, 3, 10)),
            fact(event, "music", Some("Douala"), 2, 3000, (2026, 1, 5)),
            fact(event, "music", Some("Douala"), 1, 1500, (2026, 3, 20)),
        ];
        let mut sorted = facts.clone();
        sorted.sort_by_key(|f| f.created_at);

        let months = aggregate(&sorted, 5).revenue_by_month;
        assert_eq!(months.len(), 2);
        assert_eq!(months[0].month, "2026-01");
        assert_eq!(months[0].revenue, Decimal::new(300000, 2));
        assert_eq!(months[1].month, "2026-03");
        assert_eq!(months[1].bookings, 2);
        let sum: Decimal = months.iter().map(|m| m.revenue).sum();
        assert_eq!(sum, Decimal::new(600000, 2));
    }

    #[test]
    fn test_missing_city_is_its_own_bucket() {
        let event = Uuid::new_v4();
        let facts = vec![
            fact(event, "music", None, 1, 1000, (2026, 1, 1)),
            fact(event, "music", Some("  "), 1, 1000, (2026, 1, 2)),
            fact(event, "music", Some("Yaoundé"), 1, 1000, (2026, 1, 3)),
        ];
        let cities = aggregate(&facts, 5).top_cities;
        assert_eq!(cities[0].name, UNSPECIFIED);
        assert_eq!(cities[0].bookings, 2);
        assert_eq!(cities[1].name, "Yaoundé");

        let regions = aggregate(&facts, 5).top_regions;
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].bookings, 3);
    }

    #[test]
    fn test_ties_keep_first_seen_order() {
        let event = Uuid::new_v4();
        let facts = vec![
            fact(event, "theatre", None, 1, 1000, (2026, 1, 1)),
            fact(event, "music", None, 1, 1000, (2026, 1, 2)),
            fact(event, "sport", None, 1, 1000, (2026, 1, 3)),
            fact(event, "sport", None, 1, 1000, (2026, 1, 4)),
        ];
        let categories = aggregate(&facts, 2).top_categories;
        let names: Vec<&str> = categories.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["sport", "theatre"]);
    }

    #[test]
    fn test_totals_and_average_price() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let facts = vec![
            fact(a, "music", None, 3, 4500, (2026, 1, 1)),
            fact(b, "sport", None, 1, 2500, (2026, 1, 2)),
        ];
        let agg = aggregate(&facts, 5);
        assert_eq!(agg.total_bookings, 2);
        assert_eq!(agg.total_tickets, 4);
        assert_eq!(agg.total_revenue, Decimal::new(700000, 2));
        // (1500 + 2500) / 2
        assert_eq!(agg.average_ticket_price, Decimal::new(200000, 2));

        assert_eq!(agg.top_events_by_revenue[0].event_id, a);
        assert_eq!(agg.top_events_by_revenue[0].revenue, Decimal::new(450000, 2));
        assert_eq!(agg.top_events_by_revenue[1].event_id, b);
    }

    #[test]
    fn test_empty_history() {
        let agg = aggregate(&[], 5);
        assert_eq!(agg.total_bookings, 0);
        assert_eq!(agg.average_ticket_price, Decimal::ZERO);
        assert!(agg.revenue_by_month.is_empty());
    }
}

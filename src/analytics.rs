// 📊 Client Analytics - five independent metrics over a client's rentals
//
// Each metric runs on its own thread with its own session. A metric that
// fails (or panics) becomes null in the report; the others still arrive.
// Metrics may observe slightly different snapshots of the data.

use crate::db::{Database, StoreResult, RENTAL_TABLE};
use crate::entities::{ClientId, RentedHouse};
use crate::filters::FilterPredicateBuilder;
use crate::money;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use std::thread;

// ============================================================================
// LEDGER (metric source)
// ============================================================================

/// Aggregate queries over rental records of one client
pub trait RentalLedger: Send + Sync {
    fn transaction_count(&self, client: ClientId) -> StoreResult<i64>;

    /// `None` when the client has no rentals
    fn average_amount(&self, client: ClientId) -> StoreResult<Option<Decimal>>;

    /// Highest total amount; ties go to the most recent start date, then
    /// the highest house id
    fn largest_deal(&self, client: ClientId) -> StoreResult<Option<RentedHouse>>;

    fn total_spent(&self, client: ClientId) -> StoreResult<Decimal>;

    /// Sum of rental durations, in days
    fn total_rental_period(&self, client: ClientId) -> StoreResult<i64>;
}

impl RentalLedger for Database {
    fn transaction_count(&self, client: ClientId) -> StoreResult<i64> {
        let session = self.open_session()?;
        session.scalar("COUNT(*)", RENTAL_TABLE, &FilterPredicateBuilder::rentals_of(client))
    }

    fn average_amount(&self, client: ClientId) -> StoreResult<Option<Decimal>> {
        let session = self.open_session()?;
        let predicate = FilterPredicateBuilder::rentals_of(client);

        // sum and count from one snapshot
        let _snapshot = session.begin()?;
        let total = session.scalar("SUM(total_amount_cents)", RENTAL_TABLE, &predicate)?;
        let count = session.scalar("COUNT(*)", RENTAL_TABLE, &predicate)?;
        Ok(money::average_cents(total, count))
    }

    fn largest_deal(&self, client: ClientId) -> StoreResult<Option<RentedHouse>> {
        let session = self.open_session()?;
        let deals: Vec<RentedHouse> = session.select_ordered(
            RENTAL_TABLE,
            &FilterPredicateBuilder::rentals_of(client),
            "total_amount_cents DESC, rental_start_date DESC, id_house DESC",
            Some(1),
        )?;
        Ok(deals.into_iter().next())
    }

    fn total_spent(&self, client: ClientId) -> StoreResult<Decimal> {
        let session = self.open_session()?;
        let cents = session.scalar(
            "SUM(total_amount_cents)",
            RENTAL_TABLE,
            &FilterPredicateBuilder::rentals_of(client),
        )?;
        Ok(money::from_cents(cents))
    }

    fn total_rental_period(&self, client: ClientId) -> StoreResult<i64> {
        let session = self.open_session()?;
        session.scalar(
            "SUM(rental_duration)",
            RENTAL_TABLE,
            &FilterPredicateBuilder::rentals_of(client),
        )
    }
}

// ============================================================================
// REPORT
// ============================================================================

/// Every field is null when its metric could not be computed
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientReport {
    pub transaction_count: Option<i64>,
    pub average_amount: Option<Decimal>,
    pub largest_deal: Option<RentedHouse>,
    pub total_spent: Option<Decimal>,
    pub total_rental_period: Option<i64>,
}

// ============================================================================
// AGGREGATOR
// ============================================================================

pub struct ClientAnalyticsAggregator {
    ledger: Arc<dyn RentalLedger>,
}

impl ClientAnalyticsAggregator {
    pub fn new(ledger: Arc<dyn RentalLedger>) -> Self {
        ClientAnalyticsAggregator { ledger }
    }

    /// Run all five metrics concurrently and wait for every one of them
    pub fn report(&self, client: ClientId) -> ClientReport {
        let ledger = self.ledger.as_ref();

        thread::scope(|scope| {
            let count = scope.spawn(|| ledger.transaction_count(client));
            let average = scope.spawn(|| ledger.average_amount(client));
            let largest = scope.spawn(|| ledger.largest_deal(client));
            let spent = scope.spawn(|| ledger.total_spent(client));
            let period = scope.spawn(|| ledger.total_rental_period(client));

            ClientReport {
                transaction_count: settle("transactionCount", client, count.join()),
                average_amount: settle("averageAmount", client, average.join()).flatten(),
                largest_deal: settle("largestDeal", client, largest.join()).flatten(),
                total_spent: settle("totalSpent", client, spent.join()),
                total_rental_period: settle("totalRentalPeriod", client, period.join()),
            }
        })
    }
}

/// Metric value, or `None` after logging why it is missing
fn settle<T>(metric: &'static str, client: ClientId, joined: thread::Result<StoreResult<T>>) -> Option<T> {
    match joined {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            tracing::warn!(metric, client, error = %e, "metric failed");
            None
        }
        Err(_) => {
            tracing::warn!(metric, client, "metric panicked");
            None
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::{memory_db, sample_client, sample_house, sample_rental};
    use crate::db::{insert_client, insert_house, insert_rental, StoreError};
    use chrono::{Duration, TimeZone};
    use std::str::FromStr;

    fn dec(text: &str) -> Decimal {
        Decimal::from_str(text).unwrap()
    }

    /// Client 1 with rentals of 100.00, 250.00, 250.00 at increasing start
    /// dates; client 2 with none.
    fn seeded() -> (Arc<Database>, ClientId, ClientId) {
        let db = Arc::new(memory_db());
        let session = db.open_session().unwrap();
        let conn = session.connection();

        let rich = insert_client(conn, &sample_client("anna", "1")).unwrap();
        let idle = insert_client(conn, &sample_client("boris", "2")).unwrap();
        let t1 = db.zone().with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap();

        for (i, (days, amount)) in [(1, "100.00"), (3, "250.00"), (2, "250.00")].iter().enumerate() {
            let house = insert_house(conn, &sample_house(&format!("Lenina {}", i), "North", "Eco")).unwrap();
            let start = t1 + Duration::days(10 * i as i64);
            insert_rental(conn, &sample_rental(house.id, rich.id, start, *days, amount)).unwrap();
        }

        (db.clone(), rich.id, idle.id)
    }

    #[test]
    fn test_zero_rentals_report() {
        let (db, _, idle) = seeded();
        let report = ClientAnalyticsAggregator::new(db).report(idle);

        assert_eq!(report.transaction_count, Some(0));
        assert_eq!(report.average_amount, None);
        assert_eq!(report.largest_deal, None);
        assert_eq!(report.total_spent, Some(Decimal::ZERO));
        assert_eq!(report.total_rental_period, Some(0));
    }

    #[test]
    fn test_three_rental_scenario() {
        let (db, rich, _) = seeded();
        let report = ClientAnalyticsAggregator::new(db.clone()).report(rich);

        assert_eq!(report.transaction_count, Some(3));
        assert_eq!(report.average_amount, Some(dec("200.00")));
        assert_eq!(report.total_spent, Some(dec("600.00")));
        assert_eq!(report.total_rental_period, Some(6));

        // tie on 250.00 goes to the most recent start date
        let largest = report.largest_deal.unwrap();
        assert_eq!(largest.total_amount, dec("250.00"));
        assert_eq!(largest.rental_duration, 2);
        assert_eq!(
            largest.rental_start_date,
            db.zone().with_ymd_and_hms(2025, 1, 21, 10, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_largest_deal_full_tie_prefers_highest_house() {
        let db = memory_db();
        let session = db.open_session().unwrap();
        let conn = session.connection();

        let client = insert_client(conn, &sample_client("anna", "1")).unwrap();
        let start = db.zone().with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap();
        let first = insert_house(conn, &sample_house("Lenina 1", "North", "Eco")).unwrap();
        let second = insert_house(conn, &sample_house("Lenina 2", "North", "Eco")).unwrap();
        insert_rental(conn, &sample_rental(second.id, client.id, start, 2, "250.00")).unwrap();
        insert_rental(conn, &sample_rental(first.id, client.id, start, 2, "250.00")).unwrap();

        let largest = db.largest_deal(client.id).unwrap().unwrap();
        assert_eq!(largest.key.house, second.id);
    }

    #[test]
    fn test_report_json_shape() {
        let (db, _, idle) = seeded();
        let report = ClientAnalyticsAggregator::new(db).report(idle);
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["transactionCount"], 0);
        assert!(json["averageAmount"].is_null());
        assert!(json["largestDeal"].is_null());
        assert_eq!(json["totalSpent"], "0.00");
        assert_eq!(json["totalRentalPeriod"], 0);
    }

    /// Database-backed ledger with one broken metric
    struct FaultyLedger {
        inner: Arc<Database>,
        panic_instead: bool,
    }

    impl RentalLedger for FaultyLedger {
        fn transaction_count(&self, client: ClientId) -> StoreResult<i64> {
            self.inner.transaction_count(client)
        }

        fn average_amount(&self, client: ClientId) -> StoreResult<Option<Decimal>> {
            self.inner.average_amount(client)
        }

        fn largest_deal(&self, client: ClientId) -> StoreResult<Option<RentedHouse>> {
            self.inner.largest_deal(client)
        }

        fn total_spent(&self, _client: ClientId) -> StoreResult<Decimal> {
            if self.panic_instead {
                panic!("simulated crash");
            }
            Err(StoreError::Closed)
        }

        fn total_rental_period(&self, client: ClientId) -> StoreResult<i64> {
            self.inner.total_rental_period(client)
        }
    }

    #[test]
    fn test_failed_metric_is_null_others_survive() {
        let (db, rich, _) = seeded();
        let ledger = FaultyLedger {
            inner: db,
            panic_instead: false,
        };
        let report = ClientAnalyticsAggregator::new(Arc::new(ledger)).report(rich);

        assert_eq!(report.total_spent, None);
        assert_eq!(report.transaction_count, Some(3));
        assert_eq!(report.average_amount, Some(dec("200.00")));
        assert!(report.largest_deal.is_some());
        assert_eq!(report.total_rental_period, Some(6));
    }

    #[test]
    fn test_panicking_metric_is_null() {
        let (db, rich, _) = seeded();
        let ledger = FaultyLedger {
            inner: db,
            panic_instead: true,
        };
        let report = ClientAnalyticsAggregator::new(Arc::new(ledger)).report(rich);

        assert_eq!(report.total_spent, None);
        assert_eq!(report.transaction_count, Some(3));
    }

    #[test]
    fn test_closed_database_nulls_every_metric() {
        let (db, rich, _) = seeded();
        let aggregator = ClientAnalyticsAggregator::new(db.clone());
        db.close();

        let report = aggregator.report(rich);
        assert_eq!(report.transaction_count, None);
        assert_eq!(report.average_amount, None);
        assert_eq!(report.largest_deal, None);
        assert_eq!(report.total_spent, None);
        assert_eq!(report.total_rental_period, None);
    }
}

// 📥 Seed Import - load clients, houses and rentals from CSV
//
// Rows that collide with existing data (unique login/phone/address or an
// already rented house/client pair) are counted as duplicates and skipped.
// Any other bad row aborts the whole file.

use crate::db::{self, Session, StoreError};
use crate::entities::{ClientId, ClientPayload, HouseId, HousePayload, RentalKey, RentedHouse};
use crate::money;
use crate::schema;
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub inserted: usize,
    pub duplicates: usize,
}

impl ImportStats {
    fn record(&mut self, outcome: std::result::Result<(), StoreError>) -> Result<()> {
        match outcome {
            Ok(()) => self.inserted += 1,
            Err(StoreError::DuplicateRental(_)) => self.duplicates += 1,
            Err(e) if e.is_constraint_violation() => self.duplicates += 1,
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }
}

/// Columns: login, password (plaintext), phoneNumber, balance, status
pub fn import_clients(session: &Session, input: impl Read) -> Result<ImportStats> {
    let mut rdr = csv::Reader::from_reader(input);
    let tx = session.begin()?;
    let mut stats = ImportStats::default();

    for (line, result) in rdr.deserialize::<ClientPayload>().enumerate() {
        let payload = result.with_context(|| format!("Failed to read client row {}", line + 1))?;
        payload
            .validate_for_create()
            .map_err(|errors| anyhow!("client row {}: {}", line + 1, schema::summarize(&errors)))?;

        let client = payload.into_new_client();
        stats.record(db::insert_client(&tx, &client).map(|_| ()))?;
    }

    tx.commit().context("Failed to commit clients")?;
    Ok(stats)
}

/// Columns: address, pricePerDay, district, comfortClass, mapLocation,
/// additionDate (optional, defaults to `now`)
pub fn import_houses(
    session: &Session,
    input: impl Read,
    now: DateTime<FixedOffset>,
) -> Result<ImportStats> {
    let mut rdr = csv::Reader::from_reader(input);
    let tx = session.begin()?;
    let mut stats = ImportStats::default();

    for (line, result) in rdr.deserialize::<HousePayload>().enumerate() {
        let payload = result.with_context(|| format!("Failed to read house row {}", line + 1))?;
        payload
            .validate_for_create()
            .map_err(|errors| anyhow!("house row {}: {}", line + 1, schema::summarize(&errors)))?;

        let house = payload.into_new_house(now);
        stats.record(db::insert_house(&tx, &house).map(|_| ()))?;
    }

    tx.commit().context("Failed to commit houses")?;
    Ok(stats)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RentalRow {
    id_house: HouseId,
    id_client: ClientId,
    rental_start_date: DateTime<FixedOffset>,
    rental_duration: i32,
    rental_end_date: DateTime<FixedOffset>,
    total_amount: Decimal,
}

/// Columns: idHouse, idClient, rentalStartDate, rentalDuration,
/// rentalEndDate, totalAmount
pub fn import_rentals(session: &Session, input: impl Read) -> Result<ImportStats> {
    let mut rdr = csv::Reader::from_reader(input);
    let tx = session.begin()?;
    let mut stats = ImportStats::default();

    for (line, result) in rdr.deserialize::<RentalRow>().enumerate() {
        let row = result.with_context(|| format!("Failed to read rental row {}", line + 1))?;
        let rental = RentedHouse {
            key: RentalKey::new(row.id_house, row.id_client),
            rental_start_date: row.rental_start_date,
            rental_duration: row.rental_duration,
            rental_end_date: row.rental_end_date,
            total_amount: money::fixed(row.total_amount)
                .with_context(|| format!("rental row {}", line + 1))?,
        };

        stats.record(db::insert_rental(&tx, &rental))?;
    }

    tx.commit().context("Failed to commit rentals")?;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;
    use crate::db::tests::memory_db;
    use chrono::TimeZone;

    const CLIENTS: &str = "\
login,password,phoneNumber,balance,status
anna,secret,+7-900-1,10.50,active
boris,secret,+7-900-2,,
anna,other,+7-900-3,0,active
";

    const HOUSES: &str = "\
address,pricePerDay,district,comfortClass,mapLocation,additionDate
Lenina 1,120.00,North,Eco,\"55.75,37.61\",2024-01-01T10:00:00+03:00
Lenina 2,300,South,Premium,\"55.70,37.50\",
";

    const RENTALS: &str = "\
idHouse,idClient,rentalStartDate,rentalDuration,rentalEndDate,totalAmount
1,1,2025-01-01T10:00:00+03:00,2,2025-01-03T10:00:00+03:00,240.00
2,1,2025-02-01T10:00:00+03:00,1,2025-02-02T10:00:00+03:00,300
1,1,2025-03-01T10:00:00+03:00,1,2025-03-02T10:00:00+03:00,120.00
";

    #[test]
    fn test_import_counts_duplicates() {
        let db = memory_db();
        let session = db.open_session().unwrap();
        let now = db.zone().with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();

        let clients = import_clients(&session, CLIENTS.as_bytes()).unwrap();
        assert_eq!(clients, ImportStats { inserted: 2, duplicates: 1 });

        let houses = import_houses(&session, HOUSES.as_bytes(), now).unwrap();
        assert_eq!(houses.inserted, 2);

        let rentals = import_rentals(&session, RENTALS.as_bytes()).unwrap();
        assert_eq!(rentals, ImportStats { inserted: 2, duplicates: 1 });

        let boris = session.client_by_login("boris").unwrap().unwrap();
        assert_eq!(boris.status, "active");

        let houses = catalog::all_houses(&session).unwrap();
        assert_eq!(houses[1].addition_date, now);
        assert_eq!(houses[0].map_location, "55.75,37.61");
    }

    #[test]
    fn test_import_is_all_or_nothing_on_bad_row() {
        let db = memory_db();
        let session = db.open_session().unwrap();
        let bad = "login,password,phoneNumber,balance,status\nanna,secret,1,1,active\n,secret,2,1,active\n";

        let err = import_clients(&session, bad.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("client row 2"));
        assert!(catalog::all_clients(&session).unwrap().is_empty());
    }
}

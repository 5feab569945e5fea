// 📚 Catalog - plain create / read / delete operations and account actions

use crate::db::{self, Session, CLIENT_TABLE, HOUSE_TABLE, RENTAL_TABLE};
use crate::entities::{
    hash_password, Client, ClientId, ClientPayload, House, HouseId, HousePayload, RentedHouse,
};
use crate::error::{AppError, AppResult};
use crate::filters::Predicate;
use crate::money;
use crate::schema::Requirements;
use chrono::{DateTime, FixedOffset};
use rand::Rng;
use serde::Deserialize;

/// Smallest and largest random credit, in cents
pub const CREDIT_RANGE_CENTS: (i64, i64) = (10, 100_000);

// ============================================================================
// CLIENTS
// ============================================================================

pub fn all_clients(session: &Session) -> AppResult<Vec<Client>> {
    Ok(session.select(CLIENT_TABLE, &Predicate::all())?)
}

pub fn client_by_id(session: &Session, id: ClientId) -> AppResult<Client> {
    session
        .get(&id)?
        .ok_or_else(|| AppError::not_found(format!("client {} not found", id)))
}

pub fn create_client(session: &Session, payload: ClientPayload) -> AppResult<Client> {
    payload.validate_for_create()?;
    let client = payload.into_new_client();

    let created = db::insert_client(session.connection(), &client)
        .map_err(|e| AppError::from_store_conflict(e, "login or phone number already exists"))?;
    tracing::info!(id = created.id, login = %created.login, "client created");
    Ok(created)
}

pub fn delete_client(session: &Session, id: ClientId) -> AppResult<()> {
    if !db::delete::<Client>(session.connection(), &id)? {
        return Err(AppError::not_found(format!("client {} not found", id)));
    }
    tracing::info!(id, "client deleted");
    Ok(())
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    pub login: Option<String>,
    pub password: Option<String>,
}

/// Client whose login and password match
pub fn login(session: &Session, request: &LoginRequest) -> AppResult<Client> {
    Requirements::new("Login")
        .present("login", &request.login)
        .present("password", &request.password)
        .finish()?;
    let (login, password) = match (&request.login, &request.password) {
        (Some(login), Some(password)) => (login, password),
        _ => return Err(AppError::validation("request must contain 'login' and 'password'")),
    };

    let client = session
        .client_by_login(login)?
        .ok_or_else(|| AppError::not_found(format!("client '{}' not found", login)))?;

    if client.password != hash_password(password) {
        return Err(AppError::Unauthorized("wrong password".to_string()));
    }
    Ok(client)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreditRequest {
    pub id: Option<ClientId>,
}

/// Credit a random amount to a client's balance
pub fn give_money(session: &Session, id: ClientId, rng: &mut impl Rng) -> AppResult<Client> {
    let (low, high) = CREDIT_RANGE_CENTS;
    let cents = rng.gen_range(low..=high);

    let tx = session.begin()?;
    if !db::credit_balance(&tx, id, cents)? {
        return Err(AppError::not_found(format!("client {} not found", id)));
    }
    let client: Client = session
        .get(&id)?
        .ok_or_else(|| AppError::internal(format!("client {} vanished during credit", id)))?;
    tx.commit().map_err(db::StoreError::from)?;

    tracing::info!(id, amount = %money::from_cents(cents), "balance credited");
    Ok(client)
}

// ============================================================================
// HOUSES
// ============================================================================

pub fn all_houses(session: &Session) -> AppResult<Vec<House>> {
    Ok(session.select(HOUSE_TABLE, &Predicate::all())?)
}

pub fn create_house(
    session: &Session,
    payload: HousePayload,
    now: DateTime<FixedOffset>,
) -> AppResult<House> {
    payload.validate_for_create()?;
    let house = payload.into_new_house(now);

    let created = db::insert_house(session.connection(), &house)
        .map_err(|e| AppError::from_store_conflict(e, "address already exists"))?;
    tracing::info!(id = created.id, address = %created.address, "house created");
    Ok(created)
}

pub fn delete_house(session: &Session, id: HouseId) -> AppResult<()> {
    if !db::delete::<House>(session.connection(), &id)? {
        return Err(AppError::not_found(format!("house {} not found", id)));
    }
    tracing::info!(id, "house deleted");
    Ok(())
}

// ============================================================================
// RENTALS
// ============================================================================

pub fn all_rentals(session: &Session) -> AppResult<Vec<RentedHouse>> {
    Ok(session.select(RENTAL_TABLE, &Predicate::all())?)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::{memory_db, sample_house, sample_rental};
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn new_client(login: &str, phone: &str) -> ClientPayload {
        ClientPayload {
            login: Some(login.to_string()),
            password: Some("secret".to_string()),
            phone_number: Some(phone.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_create_and_fetch_client() {
        let db = memory_db();
        let session = db.open_session().unwrap();

        let created = create_client(&session, new_client("anna", "1")).unwrap();
        assert!(created.id > 0);
        assert_eq!(created.status, "active");
        assert_eq!(created.balance, Decimal::ZERO);

        assert_eq!(client_by_id(&session, created.id).unwrap(), created);
        assert_eq!(all_clients(&session).unwrap().len(), 1);
    }

    #[test]
    fn test_create_client_conflicts() {
        let db = memory_db();
        let session = db.open_session().unwrap();
        create_client(&session, new_client("anna", "1")).unwrap();

        let err = create_client(&session, new_client("anna", "2")).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        let err = create_client(&session, new_client("boris", "1")).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let err = create_client(&session, ClientPayload::default()).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_login_outcomes() {
        let db = memory_db();
        let session = db.open_session().unwrap();
        let created = create_client(&session, new_client("anna", "1")).unwrap();

        let ok = LoginRequest {
            login: Some("anna".to_string()),
            password: Some("secret".to_string()),
        };
        assert_eq!(login(&session, &ok).unwrap().id, created.id);

        let wrong = LoginRequest {
            password: Some("nope".to_string()),
            ..ok.clone()
        };
        assert!(matches!(login(&session, &wrong), Err(AppError::Unauthorized(_))));

        let unknown = LoginRequest {
            login: Some("ghost".to_string()),
            ..ok.clone()
        };
        assert!(matches!(login(&session, &unknown), Err(AppError::NotFound(_))));

        let partial = LoginRequest {
            password: None,
            ..ok
        };
        assert!(matches!(login(&session, &partial), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_give_money_credits_within_range() {
        let db = memory_db();
        let session = db.open_session().unwrap();
        let created = create_client(&session, new_client("anna", "1")).unwrap();
        let mut rng = StdRng::seed_from_u64(7);

        let credited = give_money(&session, created.id, &mut rng).unwrap();
        assert!(credited.balance >= Decimal::from_str("0.10").unwrap());
        assert!(credited.balance <= Decimal::from_str("1000.00").unwrap());
        assert_eq!(credited.version, created.version + 1);

        let err = give_money(&session, 999, &mut rng).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_delete_client_removes_client_not_house() {
        let db = memory_db();
        let session = db.open_session().unwrap();
        let client = create_client(&session, new_client("anna", "1")).unwrap();
        let house = db::insert_house(session.connection(), &sample_house("Lenina 1", "North", "Eco")).unwrap();

        delete_client(&session, client.id).unwrap();
        assert!(all_clients(&session).unwrap().is_empty());
        assert_eq!(all_houses(&session).unwrap(), vec![house]);

        assert!(matches!(delete_client(&session, client.id), Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_delete_rented_house_is_conflict() {
        let db = memory_db();
        let session = db.open_session().unwrap();
        let client = create_client(&session, new_client("anna", "1")).unwrap();
        let house = db::insert_house(session.connection(), &sample_house("Lenina 1", "North", "Eco")).unwrap();
        let start = db.zone().with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        db::insert_rental(session.connection(), &sample_rental(house.id, client.id, start, 2, "200.00")).unwrap();

        assert!(matches!(delete_house(&session, house.id), Err(AppError::Conflict(_))));
        assert_eq!(all_rentals(&session).unwrap().len(), 1);
    }

    #[test]
    fn test_create_house_defaults_addition_date() {
        let db = memory_db();
        let session = db.open_session().unwrap();
        let now = db.zone().with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();

        let payload = HousePayload {
            address: Some("Lenina 1".to_string()),
            price_per_day: Some(Decimal::from_str("99.90").unwrap()),
            district: Some("North".to_string()),
            comfort_class: Some("Eco".to_string()),
            map_location: Some("55.75,37.61".to_string()),
            ..Default::default()
        };
        let created = create_house(&session, payload.clone(), now).unwrap();
        assert_eq!(created.addition_date, now);

        let err = create_house(&session, payload, now).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }
}

// 🗄️ Storage - SQLite persistence provider and scoped sessions
//
// `Database` is created once at startup and shared by `Arc`. Every unit of
// work opens its own `Session` (one fresh connection) and drops it when
// done. Amounts are stored as integer cents, instants as UTC text with
// millisecond precision.

use crate::entities::{Client, ClientId, House, HouseId, RentalKey, RentedHouse};
use crate::filters::Predicate;
use crate::money::{self, MoneyError};
use crate::temporal;
use chrono::{DateTime, FixedOffset};
use rusqlite::functions::FunctionFlags;
use rusqlite::types::Value;
use rusqlite::{
    params, params_from_iter, Connection, ErrorCode, OptionalExtension, Row, Transaction,
    TransactionBehavior,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;

pub const CLIENT_TABLE: &str = "client";
pub const HOUSE_TABLE: &str = "house";
pub const RENTAL_TABLE: &str = "rented_house";

/// Houses with no rental ending now or later
pub const FREE_HOUSE_VIEW: &str = "free_house";

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("corrupt row in {table}: {detail}")]
    Corrupt { table: &'static str, detail: String },

    #[error("database is closed")]
    Closed,

    #[error(transparent)]
    Money(#[from] MoneyError),

    #[error("rental {0} already exists")]
    DuplicateRental(RentalKey),
}

impl StoreError {
    /// Unique or primary-key violation
    pub fn is_constraint_violation(&self) -> bool {
        self.sqlite_extended_code().map_or(false, |code| {
            code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        })
    }

    /// Row is still referenced (or references a missing row)
    pub fn is_foreign_key_violation(&self) -> bool {
        self.sqlite_extended_code() == Some(rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY)
    }

    /// Write lock unavailable, including a read snapshot that went stale
    /// before it could be upgraded
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            StoreError::Sqlite(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::DatabaseBusy
        )
    }

    fn sqlite_extended_code(&self) -> Option<i32> {
        match self {
            StoreError::Sqlite(rusqlite::Error::SqliteFailure(e, _))
                if e.code == ErrorCode::ConstraintViolation =>
            {
                Some(e.extended_code)
            }
            _ => None,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

// ============================================================================
// STORED ENTITIES
// ============================================================================

/// Row mapping for an entity kind
pub trait Stored: Sized {
    type Key;

    const TABLE: &'static str;
    /// Column list in the order `from_row` reads it
    const COLUMNS: &'static str;
    /// Clause selecting one row by key
    const KEY_CLAUSE: &'static str;
    const ORDER_BY: &'static str;

    fn key_values(key: &Self::Key) -> Vec<Value>;

    fn from_row(row: &Row<'_>, zone: &FixedOffset) -> StoreResult<Self>;
}

fn instant(table: &'static str, text: &str, zone: &FixedOffset) -> StoreResult<DateTime<FixedOffset>> {
    temporal::from_storage(text, zone).map_err(|e| StoreError::Corrupt {
        table,
        detail: format!("bad timestamp '{}': {}", text, e),
    })
}

impl Stored for Client {
    type Key = ClientId;

    const TABLE: &'static str = CLIENT_TABLE;
    const COLUMNS: &'static str = "id, login, password, phone_number, balance_cents, status, version";
    const KEY_CLAUSE: &'static str = "id = ?";
    const ORDER_BY: &'static str = "id";

    fn key_values(key: &ClientId) -> Vec<Value> {
        vec![Value::Integer(*key)]
    }

    fn from_row(row: &Row<'_>, _zone: &FixedOffset) -> StoreResult<Self> {
        Ok(Client {
            id: row.get(0)?,
            login: row.get(1)?,
            password: row.get(2)?,
            phone_number: row.get(3)?,
            balance: money::from_cents(row.get(4)?),
            status: row.get(5)?,
            version: row.get(6)?,
        })
    }
}

impl Stored for House {
    type Key = HouseId;

    const TABLE: &'static str = HOUSE_TABLE;
    const COLUMNS: &'static str = "id, address, price_per_day_cents, district, comfort_class, \
                                   map_location, addition_date, last_change_date, version";
    const KEY_CLAUSE: &'static str = "id = ?";
    const ORDER_BY: &'static str = "id";

    fn key_values(key: &HouseId) -> Vec<Value> {
        vec![Value::Integer(*key)]
    }

    fn from_row(row: &Row<'_>, zone: &FixedOffset) -> StoreResult<Self> {
        let addition: String = row.get(6)?;
        let last_change: Option<String> = row.get(7)?;

        Ok(House {
            id: row.get(0)?,
            address: row.get(1)?,
            price_per_day: money::from_cents(row.get(2)?),
            district: row.get(3)?,
            comfort_class: row.get(4)?,
            map_location: row.get(5)?,
            addition_date: instant(HOUSE_TABLE, &addition, zone)?,
            last_change_date: last_change
                .map(|text| instant(HOUSE_TABLE, &text, zone))
                .transpose()?,
            version: row.get(8)?,
        })
    }
}

impl Stored for RentedHouse {
    type Key = RentalKey;

    const TABLE: &'static str = RENTAL_TABLE;
    const COLUMNS: &'static str = "id_house, id_client, rental_start_date, rental_duration, \
                                   rental_end_date, total_amount_cents";
    const KEY_CLAUSE: &'static str = "id_house = ? AND id_client = ?";
    const ORDER_BY: &'static str = "rental_start_date, id_house, id_client";

    fn key_values(key: &RentalKey) -> Vec<Value> {
        vec![Value::Integer(key.house), Value::Integer(key.client)]
    }

    fn from_row(row: &Row<'_>, zone: &FixedOffset) -> StoreResult<Self> {
        let start: String = row.get(2)?;
        let end: String = row.get(4)?;

        Ok(RentedHouse {
            key: RentalKey::new(row.get(0)?, row.get(1)?),
            rental_start_date: instant(RENTAL_TABLE, &start, zone)?,
            rental_duration: row.get(3)?,
            rental_end_date: instant(RENTAL_TABLE, &end, zone)?,
            total_amount: money::from_cents(row.get(5)?),
        })
    }
}

// ============================================================================
// DATABASE (provider handle)
// ============================================================================

#[derive(Debug, Clone)]
enum Target {
    File(PathBuf),
    /// Shared-cache URI; kept alive by the anchor connection
    Memory(String),
}

pub struct Database {
    target: Target,
    zone: FixedOffset,
    closed: AtomicBool,
    anchor: Mutex<Option<Connection>>,
}

impl Database {
    /// Open (or create) a database file in WAL mode
    pub fn open(path: impl AsRef<Path>, zone: FixedOffset) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path)?;

        // Enable WAL mode for crash recovery
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        tracing::debug!(path = %path.display(), journal_mode = %mode, "database opened");

        Ok(Database {
            target: Target::File(path),
            zone,
            closed: AtomicBool::new(false),
            anchor: Mutex::new(None),
        })
    }

    /// Private in-memory database shared by all sessions of this handle
    pub fn open_in_memory(zone: FixedOffset) -> StoreResult<Self> {
        let uri = format!(
            "file:rental-{}?mode=memory&cache=shared",
            uuid::Uuid::new_v4()
        );
        let anchor = Connection::open(&uri)?;

        Ok(Database {
            target: Target::Memory(uri),
            zone,
            closed: AtomicBool::new(false),
            anchor: Mutex::new(Some(anchor)),
        })
    }

    pub fn zone(&self) -> FixedOffset {
        self.zone
    }

    /// New scoped unit of work. Fails once the database is closed.
    pub fn open_session(&self) -> StoreResult<Session> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }

        let conn = match &self.target {
            Target::File(path) => Connection::open(path)?,
            Target::Memory(uri) => Connection::open(uri)?,
        };
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        register_functions(&conn)?;

        Ok(Session {
            conn,
            zone: self.zone,
        })
    }

    /// Create tables, indexes and the free-house view if missing
    pub fn setup_schema(&self) -> StoreResult<()> {
        setup_database(&self.open_session()?.conn)
    }

    /// Refuse new sessions; sessions already open stay usable until dropped
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Ok(mut anchor) = self.anchor.lock() {
            anchor.take();
        }
        tracing::info!("database closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Case-insensitive comparison helper: `casefold(text)` lowercases with
/// full Unicode rules, which SQLite's built-in `lower` does not.
fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "casefold",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let text: Option<String> = ctx.get(0)?;
            Ok(text.map(|t| t.to_lowercase()))
        },
    )
}

pub fn setup_database(conn: &Connection) -> StoreResult<()> {
    // ==========================================================================
    // Clients
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS client (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            login TEXT NOT NULL UNIQUE,
            password TEXT NOT NULL,
            phone_number TEXT NOT NULL UNIQUE,
            balance_cents INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL,
            version INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;

    // ==========================================================================
    // Houses
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS house (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            address TEXT NOT NULL UNIQUE,
            price_per_day_cents INTEGER NOT NULL,
            district TEXT NOT NULL,
            comfort_class TEXT NOT NULL,
            map_location TEXT NOT NULL,
            addition_date TEXT NOT NULL,
            last_change_date TEXT,
            version INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;

    // ==========================================================================
    // Rentals (one per house/client pair)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS rented_house (
            id_house INTEGER NOT NULL REFERENCES house(id) ON DELETE RESTRICT,
            id_client INTEGER NOT NULL REFERENCES client(id) ON DELETE RESTRICT,
            rental_start_date TEXT NOT NULL,
            rental_duration INTEGER NOT NULL,
            rental_end_date TEXT NOT NULL,
            total_amount_cents INTEGER NOT NULL,
            PRIMARY KEY (id_house, id_client)
        )",
        [],
    )?;

    // ==========================================================================
    // Free houses (read model)
    // ==========================================================================
    conn.execute(
        "CREATE VIEW IF NOT EXISTS free_house AS
            SELECT h.* FROM house h
            WHERE NOT EXISTS (
                SELECT 1 FROM rented_house r
                WHERE r.id_house = h.id
                  AND r.rental_end_date >= strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
            )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_rented_house_client ON rented_house(id_client)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_rented_house_start ON rented_house(rental_start_date)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// SESSION (scoped unit of work)
// ============================================================================

/// One connection, released when dropped
pub struct Session {
    conn: Connection,
    zone: FixedOffset,
}

impl Session {
    pub fn zone(&self) -> FixedOffset {
        self.zone
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Start a transaction; rolled back on drop unless committed
    pub fn begin(&self) -> StoreResult<Transaction<'_>> {
        Ok(self.conn.unchecked_transaction()?)
    }

    /// Start a transaction that takes the write lock up front
    pub fn begin_immediate(&self) -> StoreResult<Transaction<'_>> {
        Ok(Transaction::new_unchecked(
            &self.conn,
            TransactionBehavior::Immediate,
        )?)
    }

    pub fn get<E: Stored>(&self, key: &E::Key) -> StoreResult<Option<E>> {
        let predicate = Predicate::all().and(E::KEY_CLAUSE, E::key_values(key));
        Ok(self.select::<E>(E::TABLE, &predicate)?.into_iter().next())
    }

    /// Rows of `relation` (a table or view with `E`'s columns) matching
    /// `predicate`, in `E`'s default order
    pub fn select<E: Stored>(&self, relation: &'static str, predicate: &Predicate) -> StoreResult<Vec<E>> {
        self.select_ordered(relation, predicate, E::ORDER_BY, None)
    }

    pub fn select_ordered<E: Stored>(
        &self,
        relation: &'static str,
        predicate: &Predicate,
        order_by: &'static str,
        limit: Option<u32>,
    ) -> StoreResult<Vec<E>> {
        let mut sql = format!(
            "SELECT {} FROM {}{} ORDER BY {}",
            E::COLUMNS,
            relation,
            predicate.where_clause(),
            order_by
        );
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(predicate.bindings()))?;

        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(E::from_row(row, &self.zone)?);
        }
        Ok(out)
    }

    /// Single integer aggregate over `relation`, e.g. `COUNT(*)`
    pub fn scalar(&self, expr: &'static str, relation: &'static str, predicate: &Predicate) -> StoreResult<i64> {
        let sql = format!("SELECT {} FROM {}{}", expr, relation, predicate.where_clause());
        let value: Option<i64> = self.conn.query_row(
            &sql,
            params_from_iter(predicate.bindings()),
            |row| row.get(0),
        )?;
        Ok(value.unwrap_or(0))
    }

    pub fn client_by_login(&self, login: &str) -> StoreResult<Option<Client>> {
        let predicate = Predicate::all().and("login = ?", [Value::Text(login.to_string())]);
        Ok(self.select::<Client>(CLIENT_TABLE, &predicate)?.into_iter().next())
    }
}

// ============================================================================
// WRITES
// ============================================================================

/// Insert a new client and return it with its assigned id
pub fn insert_client(conn: &Connection, client: &Client) -> StoreResult<Client> {
    conn.execute(
        "INSERT INTO client (login, password, phone_number, balance_cents, status, version)
         VALUES (?1, ?2, ?3, ?4, ?5, 0)",
        params![
            client.login,
            client.password,
            client.phone_number,
            money::to_cents(client.balance)?,
            client.status,
        ],
    )?;

    Ok(Client {
        id: conn.last_insert_rowid(),
        version: 0,
        ..client.clone()
    })
}

pub fn insert_house(conn: &Connection, house: &House) -> StoreResult<House> {
    conn.execute(
        "INSERT INTO house (address, price_per_day_cents, district, comfort_class,
                            map_location, addition_date, last_change_date, version)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0)",
        params![
            house.address,
            money::to_cents(house.price_per_day)?,
            house.district,
            house.comfort_class,
            house.map_location,
            temporal::to_storage(&house.addition_date),
            house.last_change_date.as_ref().map(temporal::to_storage),
        ],
    )?;

    Ok(House {
        id: conn.last_insert_rowid(),
        version: 0,
        ..house.clone()
    })
}

/// Insert a rental; a second rental for the same pair is rejected
pub fn insert_rental(conn: &Connection, rental: &RentedHouse) -> StoreResult<()> {
    let exists = conn
        .query_row(
            "SELECT 1 FROM rented_house WHERE id_house = ?1 AND id_client = ?2",
            params![rental.key.house, rental.key.client],
            |_| Ok(()),
        )
        .optional()?
        .is_some();
    if exists {
        return Err(StoreError::DuplicateRental(rental.key));
    }

    conn.execute(
        "INSERT INTO rented_house (id_house, id_client, rental_start_date, rental_duration,
                                   rental_end_date, total_amount_cents)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            rental.key.house,
            rental.key.client,
            temporal::to_storage(&rental.rental_start_date),
            rental.rental_duration,
            temporal::to_storage(&rental.rental_end_date),
            money::to_cents(rental.total_amount)?,
        ],
    )?;

    Ok(())
}

/// Write `client` if the stored version is still `client.version`.
/// Returns false when no row matched (missing or concurrently changed).
pub fn update_client(conn: &Connection, client: &Client) -> StoreResult<bool> {
    let rows = conn.execute(
        "UPDATE client
         SET login = ?1, password = ?2, phone_number = ?3, balance_cents = ?4, status = ?5,
             version = version + 1
         WHERE id = ?6 AND version = ?7",
        params![
            client.login,
            client.password,
            client.phone_number,
            money::to_cents(client.balance)?,
            client.status,
            client.id,
            client.version,
        ],
    )?;
    Ok(rows == 1)
}

pub fn update_house(conn: &Connection, house: &House) -> StoreResult<bool> {
    let rows = conn.execute(
        "UPDATE house
         SET address = ?1, price_per_day_cents = ?2, district = ?3, comfort_class = ?4,
             map_location = ?5, addition_date = ?6, last_change_date = ?7,
             version = version + 1
         WHERE id = ?8 AND version = ?9",
        params![
            house.address,
            money::to_cents(house.price_per_day)?,
            house.district,
            house.comfort_class,
            house.map_location,
            temporal::to_storage(&house.addition_date),
            house.last_change_date.as_ref().map(temporal::to_storage),
            house.id,
            house.version,
        ],
    )?;
    Ok(rows == 1)
}

/// Add `cents` to a client's balance in one statement
pub fn credit_balance(conn: &Connection, id: ClientId, cents: i64) -> StoreResult<bool> {
    let rows = conn.execute(
        "UPDATE client SET balance_cents = balance_cents + ?1, version = version + 1 WHERE id = ?2",
        params![cents, id],
    )?;
    Ok(rows == 1)
}

/// Delete by key; false when nothing matched
pub fn delete<E: Stored>(conn: &Connection, key: &E::Key) -> StoreResult<bool> {
    let sql = format!("DELETE FROM {} WHERE {}", E::TABLE, E::KEY_CLAUSE);
    let rows = conn.execute(&sql, params_from_iter(E::key_values(key)))?;
    Ok(rows > 0)
}

// ============================================================================
// TESTS
// ============================================================================

// 👤 Client Entity - renter account with balance
//
// Login and phone number are unique. The password is kept only as a
// SHA-256 hex digest and never leaves the process in responses.

use crate::fields::FieldDescriptor;
use crate::money;
use crate::reconciliation::Reconcilable;
use crate::schema::{Requirements, ValidationResult};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub type ClientId = i64;

pub const DEFAULT_STATUS: &str = "active";

// ============================================================================
// CLIENT ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: ClientId,
    pub login: String,

    /// SHA-256 digest, lowercase hex
    #[serde(skip_serializing, default)]
    pub password: String,

    pub phone_number: String,

    /// Non-negative by convention, not enforced
    pub balance: Decimal,

    pub status: String,

    /// Optimistic concurrency counter, bumped on every committed change
    pub version: i64,
}

impl Reconcilable for Client {
    const KIND: &'static str = "Client";

    fn field_table() -> Vec<FieldDescriptor<Self>> {
        type F = FieldDescriptor<Client>;
        vec![
            F::plain("login", |c| &c.login, |c, v| c.login = v),
            F::plain("password", |c| &c.password, |c, v| c.password = v),
            F::plain("phoneNumber", |c| &c.phone_number, |c, v| c.phone_number = v),
            F::new(
                "balance",
                |c| &c.balance,
                |c, v| {
                    c.balance = money::fixed(v).map_err(|e| e.to_string())?;
                    Ok(())
                },
                money::same_amount,
            ),
            F::plain("status", |c| &c.status, |c, v| c.status = v),
        ]
    }

    fn id(&self) -> i64 {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }
}

/// Hash a plaintext password the way it is stored
pub fn hash_password(plain: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(plain.as_bytes());
    format!("{:x}", hasher.finalize())
}

// ============================================================================
// REQUEST PAYLOAD
// ============================================================================

/// Client as submitted by a caller: every field optional so that missing
/// ones can be reported instead of failing deserialization.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientPayload {
    pub id: Option<ClientId>,
    pub login: Option<String>,
    /// Plaintext
    pub password: Option<String>,
    pub phone_number: Option<String>,
    pub balance: Option<Decimal>,
    pub status: Option<String>,
    pub version: Option<i64>,
}

impl ClientPayload {
    pub fn validate_for_create(&self) -> ValidationResult {
        Requirements::new("Client")
            .present("login", &self.login)
            .present("password", &self.password)
            .present("phoneNumber", &self.phone_number)
            .optional_amount("balance", &self.balance)
            .finish()
    }

    pub fn validate_for_edit(&self) -> ValidationResult {
        Requirements::new("Client")
            .present("id", &self.id)
            .present("login", &self.login)
            .present("password", &self.password)
            .present("phoneNumber", &self.phone_number)
            .amount("balance", &self.balance)
            .present("status", &self.status)
            .finish()
    }

    /// New client ready for insertion (id and version assigned by storage)
    pub fn into_new_client(self) -> Client {
        Client {
            id: 0,
            login: self.login.unwrap_or_default(),
            password: hash_password(&self.password.unwrap_or_default()),
            phone_number: self.phone_number.unwrap_or_default(),
            balance: self.balance.unwrap_or(Decimal::ZERO),
            status: self.status.unwrap_or_else(|| DEFAULT_STATUS.to_string()),
            version: 0,
        }
    }

    /// Proposed replacement for `stored`. The password is hashed so that
    /// resubmitting the same plaintext is inert; an omitted version means
    /// "whatever is stored".
    pub fn into_proposed(self, stored: &Client) -> Client {
        Client {
            id: stored.id,
            login: self.login.unwrap_or_else(|| stored.login.clone()),
            password: self
                .password
                .map(|plain| hash_password(&plain))
                .unwrap_or_else(|| stored.password.clone()),
            phone_number: self
                .phone_number
                .unwrap_or_else(|| stored.phone_number.clone()),
            balance: self.balance.unwrap_or(stored.balance),
            status: self.status.unwrap_or_else(|| stored.status.clone()),
            version: self.version.unwrap_or(stored.version),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

// 📄 Rented House - one rental transaction
//
// Keyed by the (house, client) pair: at most one stored rental per pair.
// Records are immutable once created.

use super::{ClientId, HouseId};
use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Composite identity of a rental record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RentalKey {
    #[serde(rename = "idHouse")]
    pub house: HouseId,
    #[serde(rename = "idClient")]
    pub client: ClientId,
}

impl RentalKey {
    pub fn new(house: HouseId, client: ClientId) -> Self {
        RentalKey { house, client }
    }
}

impl std::fmt::Display for RentalKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(house {}, client {})", self.house, self.client)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RentedHouse {
    #[serde(flatten)]
    pub key: RentalKey,
    pub rental_start_date: DateTime<FixedOffset>,
    /// Whole days
    pub rental_duration: i32,
    pub rental_end_date: DateTime<FixedOffset>,
    pub total_amount: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_key_equality_and_hashing() {
        let mut keys = HashSet::new();
        keys.insert(RentalKey::new(1, 2));
        keys.insert(RentalKey::new(1, 2));
        keys.insert(RentalKey::new(2, 1));

        assert_eq!(keys.len(), 2);
        assert!(keys.contains(&RentalKey::new(2, 1)));
    }

    #[test]
    fn test_key_is_flattened_in_json() {
        let json = serde_json::json!({
            "idHouse": 4,
            "idClient": 9,
            "rentalStartDate": "2025-03-01T12:00:00+03:00",
            "rentalDuration": 3,
            "rentalEndDate": "2025-03-04T12:00:00+03:00",
            "totalAmount": "360.00"
        });

        let rental: RentedHouse = serde_json::from_value(json).unwrap();
        assert_eq!(rental.key, RentalKey::new(4, 9));
        assert_eq!(rental.rental_duration, 3);

        let back = serde_json::to_value(&rental).unwrap();
        assert_eq!(back["idHouse"], 4);
        assert_eq!(back["totalAmount"], "360.00");
    }
}

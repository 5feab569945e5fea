// 🏠 House Entity - rentable property
//
// Address is unique. `addition_date` is set once; `last_change_date` is
// touched by every successful edit.

use crate::fields::FieldDescriptor;
use crate::money;
use crate::reconciliation::Reconcilable;
use crate::schema::{Requirements, ValidationResult};
use crate::temporal;
use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub type HouseId = i64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct House {
    pub id: HouseId,
    pub address: String,
    pub price_per_day: Decimal,
    pub district: String,
    pub comfort_class: String,

    /// Free-form geolocation, e.g. "55.7558,37.6173"
    pub map_location: String,

    pub addition_date: DateTime<FixedOffset>,
    pub last_change_date: Option<DateTime<FixedOffset>>,
    pub version: i64,
}

impl Reconcilable for House {
    const KIND: &'static str = "House";

    fn field_table() -> Vec<FieldDescriptor<Self>> {
        type F = FieldDescriptor<House>;
        vec![
            F::plain("address", |h| &h.address, |h, v| h.address = v),
            F::new(
                "pricePerDay",
                |h| &h.price_per_day,
                |h, v| {
                    h.price_per_day = money::fixed(v).map_err(|e| e.to_string())?;
                    Ok(())
                },
                money::same_amount,
            ),
            F::plain("district", |h| &h.district, |h, v| h.district = v),
            F::plain("comfortClass", |h| &h.comfort_class, |h, v| h.comfort_class = v),
            F::plain("mapLocation", |h| &h.map_location, |h, v| h.map_location = v),
            F::new(
                "additionDate",
                |h| &h.addition_date,
                |h, v| {
                    h.addition_date = v;
                    Ok(())
                },
                temporal::same_instant,
            ),
            F::new(
                "lastChangeDate",
                |h| &h.last_change_date,
                |h, v| {
                    h.last_change_date = v;
                    Ok(())
                },
                temporal::same_optional_instant,
            ),
        ]
    }

    fn id(&self) -> i64 {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn after_merge(&mut self, now: DateTime<FixedOffset>) {
        self.last_change_date = Some(now);
    }
}

// ============================================================================
// REQUEST PAYLOAD
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HousePayload {
    pub id: Option<HouseId>,
    pub address: Option<String>,
    pub price_per_day: Option<Decimal>,
    pub district: Option<String>,
    pub comfort_class: Option<String>,
    pub map_location: Option<String>,
    pub addition_date: Option<DateTime<FixedOffset>>,
    pub last_change_date: Option<DateTime<FixedOffset>>,
    pub version: Option<i64>,
}

impl HousePayload {
    pub fn validate_for_create(&self) -> ValidationResult {
        self.require_data(&mut Requirements::new("House")).finish()
    }

    pub fn validate_for_edit(&self) -> ValidationResult {
        let mut requirements = Requirements::new("House");
        requirements.present("id", &self.id);
        self.require_data(&mut requirements).finish()
    }

    fn require_data<'r>(&self, requirements: &'r mut Requirements) -> &'r mut Requirements {
        requirements
            .present("address", &self.address)
            .amount("pricePerDay", &self.price_per_day)
            .present("district", &self.district)
            .present("comfortClass", &self.comfort_class)
            .present("mapLocation", &self.map_location)
    }

    /// New house stamped with `now` unless the caller supplied an addition date
    pub fn into_new_house(self, now: DateTime<FixedOffset>) -> House {
        House {
            id: 0,
            address: self.address.unwrap_or_default(),
            price_per_day: self.price_per_day.unwrap_or(Decimal::ZERO),
            district: self.district.unwrap_or_default(),
            comfort_class: self.comfort_class.unwrap_or_default(),
            map_location: self.map_location.unwrap_or_default(),
            addition_date: self.addition_date.unwrap_or(now),
            last_change_date: self.last_change_date,
            version: 0,
        }
    }

    /// Proposed replacement for `stored`; omitted timestamps and version are
    /// taken from `stored` so that leaving them out changes nothing.
    pub fn into_proposed(self, stored: &House) -> House {
        House {
            id: stored.id,
            address: self.address.unwrap_or_else(|| stored.address.clone()),
            price_per_day: self.price_per_day.unwrap_or(stored.price_per_day),
            district: self.district.unwrap_or_else(|| stored.district.clone()),
            comfort_class: self
                .comfort_class
                .unwrap_or_else(|| stored.comfort_class.clone()),
            map_location: self
                .map_location
                .unwrap_or_else(|| stored.map_location.clone()),
            addition_date: self.addition_date.unwrap_or(stored.addition_date),
            last_change_date: self.last_change_date.or(stored.last_change_date),
            version: self.version.unwrap_or(stored.version),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::temporal::reference_zone;
    use chrono::TimeZone;
    use std::str::FromStr;

    fn added() -> DateTime<FixedOffset> {
        reference_zone(3)
            .unwrap()
            .with_ymd_and_hms(2024, 5, 1, 9, 0, 0)
            .unwrap()
    }

    fn stored() -> House {
        House {
            id: 3,
            address: "Lenina 1".to_string(),
            price_per_day: Decimal::from_str("120.00").unwrap(),
            district: "North".to_string(),
            comfort_class: "Eco".to_string(),
            map_location: "55.75,37.61".to_string(),
            addition_date: added(),
            last_change_date: None,
            version: 0,
        }
    }

    #[test]
    fn test_house_json_is_camel_case() {
        let json = serde_json::to_value(stored()).unwrap();
        assert_eq!(json["pricePerDay"], "120.00");
        assert_eq!(json["comfortClass"], "Eco");
        assert!(json["lastChangeDate"].is_null());
    }

    #[test]
    fn test_create_reports_missing_fields() {
        let payload = HousePayload {
            address: Some("Lenina 1".to_string()),
            ..Default::default()
        };

        let errors = payload.validate_for_create().unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec!["pricePerDay", "district", "comfortClass", "mapLocation"]
        );
    }

    #[test]
    fn test_edit_requires_id() {
        let payload = HousePayload {
            address: Some("Lenina 1".to_string()),
            price_per_day: Some(Decimal::from_str("120").unwrap()),
            district: Some("North".to_string()),
            comfort_class: Some("Eco".to_string()),
            map_location: Some("55.75,37.61".to_string()),
            ..Default::default()
        };

        assert!(payload.validate_for_create().is_ok());
        let errors = payload.validate_for_edit().unwrap_err();
        assert_eq!(errors[0].field, "id");
    }

    #[test]
    fn test_omitted_timestamps_come_from_stored() {
        let mut current = stored();
        current.last_change_date = Some(added());

        let payload = HousePayload {
            id: Some(3),
            district: Some("South".to_string()),
            ..Default::default()
        };
        let proposed = payload.into_proposed(&current);

        assert_eq!(proposed.addition_date, current.addition_date);
        assert_eq!(proposed.last_change_date, current.last_change_date);
        assert_eq!(proposed.district, "South");
    }

    #[test]
    fn test_new_house_defaults_addition_date() {
        let now = added();
        let payload = HousePayload {
            address: Some("Lenina 1".to_string()),
            ..Default::default()
        };

        assert_eq!(payload.into_new_house(now).addition_date, now);
    }
}

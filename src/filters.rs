// 🔎 Filter Predicates - optional query input to bound SQL predicates
//
// A predicate is a list of clause templates joined with AND, plus the
// values bound to their `?` placeholders in order. Caller text only ever
// travels as a bound value; templates are fixed strings built here.

use crate::entities::ClientId;
use crate::schema::ValidationError;
use crate::temporal;
use chrono::{DateTime, Duration, FixedOffset, Months};
use rusqlite::types::Value;

// ============================================================================
// PREDICATE
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    clauses: Vec<String>,
    bindings: Vec<Value>,
}

impl Predicate {
    /// Matches every row
    pub fn all() -> Self {
        Self::default()
    }

    /// Add a clause. `template` must be fixed SQL with one `?` per value.
    pub fn and(mut self, template: impl Into<String>, values: impl IntoIterator<Item = Value>) -> Self {
        let template = template.into();
        let before = self.bindings.len();
        self.bindings.extend(values);
        debug_assert_eq!(
            template.matches('?').count(),
            self.bindings.len() - before,
            "placeholder count mismatch in {template}"
        );
        self.clauses.push(template);
        self
    }

    pub fn is_unfiltered(&self) -> bool {
        self.clauses.is_empty()
    }

    /// `""` or `" WHERE a AND b"`, ready to append after a FROM clause
    pub fn where_clause(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    pub fn bindings(&self) -> &[Value] {
        &self.bindings
    }
}

// ============================================================================
// HOUSE FILTER
// ============================================================================

/// Optional comfort class and district list for the available-house search
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HouseFilter {
    comfort_class: Option<String>,
    districts: Option<Vec<String>>,
}

impl HouseFilter {
    /// Blank values are dropped; an empty district list is the same as none.
    pub fn new(comfort_class: Option<String>, districts: Option<Vec<String>>) -> Self {
        let comfort_class = comfort_class.filter(|c| !c.trim().is_empty());
        let districts = districts
            .map(|list| {
                list.into_iter()
                    .filter(|d| !d.trim().is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|list| !list.is_empty());

        HouseFilter {
            comfort_class,
            districts,
        }
    }

    pub fn comfort_class(&self) -> Option<&str> {
        self.comfort_class.as_deref()
    }

    pub fn districts(&self) -> Option<&[String]> {
        self.districts.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.comfort_class.is_none() && self.districts.is_none()
    }
}

// ============================================================================
// RENTAL PERIOD
// ============================================================================

/// Relative lookback selected by a period token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Day,
    Month,
    Year,
}

impl Period {
    /// First of "day", "month", "year" contained in `token`, in that order
    pub fn parse(token: &str) -> Result<Self, ValidationError> {
        if token.contains("day") {
            Ok(Period::Day)
        } else if token.contains("month") {
            Ok(Period::Month)
        } else if token.contains("year") {
            Ok(Period::Year)
        } else {
            Err(ValidationError {
                field: "period".to_string(),
                message: format!("'{}' is not one of day, month, year", token),
                context: "RentedHouse".to_string(),
            })
        }
    }

    /// `[now - period, now]`; `None` only if the start falls outside the
    /// representable calendar.
    pub fn window_ending(self, now: DateTime<FixedOffset>) -> Option<RentalWindow> {
        let start = match self {
            Period::Day => now.checked_sub_signed(Duration::days(1))?,
            Period::Month => now.checked_sub_months(Months::new(1))?,
            Period::Year => now.checked_sub_months(Months::new(12))?,
        };
        Some(RentalWindow { start, end: now })
    }
}

/// Inclusive on both ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RentalWindow {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

// ============================================================================
// BUILDER
// ============================================================================

pub struct FilterPredicateBuilder;

impl FilterPredicateBuilder {
    /// Comfort class and districts compare case-insensitively; districts
    /// match any element; both present means both must hold.
    pub fn houses(filter: &HouseFilter) -> Predicate {
        let mut predicate = Predicate::all();

        if let Some(class) = filter.comfort_class() {
            predicate = predicate.and(
                "casefold(comfort_class) = casefold(?)",
                [Value::Text(class.to_string())],
            );
        }

        if let Some(districts) = filter.districts() {
            let placeholders = vec!["casefold(?)"; districts.len()].join(", ");
            predicate = predicate.and(
                format!("casefold(district) IN ({})", placeholders),
                districts.iter().map(|d| Value::Text(d.clone())),
            );
        }

        predicate
    }

    /// Rentals whose start date lies inside `window`
    pub fn rentals_within(window: &RentalWindow) -> Predicate {
        Predicate::all().and(
            "rental_start_date >= ? AND rental_start_date <= ?",
            [
                Value::Text(temporal::to_storage(&window.start)),
                Value::Text(temporal::to_storage(&window.end)),
            ],
        )
    }

    pub fn rentals_of(client: ClientId) -> Predicate {
        Predicate::all().and("id_client = ?", [Value::Integer(client)])
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::temporal::reference_zone;
    use chrono::TimeZone;

    fn now() -> DateTime<FixedOffset> {
        reference_zone(3)
            .unwrap()
            .with_ymd_and_hms(2025, 3, 31, 12, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_empty_filter_is_unfiltered() {
        let filter = HouseFilter::new(None, Some(vec![]));
        assert!(filter.is_empty());

        let predicate = FilterPredicateBuilder::houses(&filter);
        assert!(predicate.is_unfiltered());
        assert_eq!(predicate.where_clause(), "");
        assert!(predicate.bindings().is_empty());
    }

    #[test]
    fn test_comfort_class_only() {
        let filter = HouseFilter::new(Some("Eco".to_string()), None);
        let predicate = FilterPredicateBuilder::houses(&filter);

        assert_eq!(
            predicate.where_clause(),
            " WHERE casefold(comfort_class) = casefold(?)"
        );
        assert_eq!(predicate.bindings(), &[Value::Text("Eco".to_string())]);
    }

    #[test]
    fn test_districts_are_bound_not_concatenated() {
        let filter = HouseFilter::new(
            None,
            Some(vec!["North".to_string(), "'; DROP TABLE house; --".to_string()]),
        );
        let predicate = FilterPredicateBuilder::houses(&filter);

        assert_eq!(
            predicate.where_clause(),
            " WHERE casefold(district) IN (casefold(?), casefold(?))"
        );
        assert_eq!(predicate.bindings().len(), 2);
        assert!(!predicate.where_clause().contains("DROP"));
    }

    #[test]
    fn test_both_filters_are_conjoined() {
        let filter = HouseFilter::new(
            Some("Premium".to_string()),
            Some(vec!["South".to_string()]),
        );
        let predicate = FilterPredicateBuilder::houses(&filter);

        assert_eq!(
            predicate.where_clause(),
            " WHERE casefold(comfort_class) = casefold(?) AND casefold(district) IN (casefold(?))"
        );
        assert_eq!(
            predicate.bindings(),
            &[
                Value::Text("Premium".to_string()),
                Value::Text("South".to_string()),
            ]
        );
    }

    #[test]
    fn test_period_tokens() {
        assert_eq!(Period::parse("day").unwrap(), Period::Day);
        assert_eq!(Period::parse("last-month").unwrap(), Period::Month);
        assert_eq!(Period::parse("year").unwrap(), Period::Year);
        // first match wins
        assert_eq!(Period::parse("yearday").unwrap(), Period::Day);
        assert_eq!(Period::parse("week").unwrap_err().field, "period");
        assert!(Period::parse("DAY").is_err());
    }

    #[test]
    fn test_window_bounds() {
        let day = Period::Day.window_ending(now()).unwrap();
        assert_eq!(day.end, now());
        assert_eq!(day.start, now() - Duration::days(1));

        // month arithmetic clamps to the last valid day
        let month = Period::Month.window_ending(now()).unwrap();
        assert_eq!(
            month.start,
            reference_zone(3).unwrap().with_ymd_and_hms(2025, 2, 28, 12, 0, 0).unwrap()
        );

        let year = Period::Year.window_ending(now()).unwrap();
        assert_eq!(
            year.start,
            reference_zone(3).unwrap().with_ymd_and_hms(2024, 3, 31, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_window_predicate_binds_start_then_end() {
        let window = Period::Day.window_ending(now()).unwrap();
        let predicate = FilterPredicateBuilder::rentals_within(&window);

        assert_eq!(
            predicate.bindings(),
            &[
                Value::Text("2025-03-30T09:00:00.000Z".to_string()),
                Value::Text("2025-03-31T09:00:00.000Z".to_string()),
            ]
        );
    }
}

// 🔍 Search - available houses and time-windowed rentals
//
// An unfiltered search may legitimately come back empty. A filtered
// search that matches nothing is reported as NotFound.

use crate::db::{Session, FREE_HOUSE_VIEW, RENTAL_TABLE};
use crate::entities::{House, RentedHouse};
use crate::error::{AppError, AppResult};
use crate::filters::{FilterPredicateBuilder, HouseFilter, Period, Predicate};
use chrono::{DateTime, FixedOffset};

/// Free houses matching `filter`
pub fn search_free_houses(session: &Session, filter: &HouseFilter) -> AppResult<Vec<House>> {
    let predicate = FilterPredicateBuilder::houses(filter);
    let houses: Vec<House> = session.select(FREE_HOUSE_VIEW, &predicate)?;

    tracing::debug!(
        comfort_class = ?filter.comfort_class(),
        districts = ?filter.districts(),
        found = houses.len(),
        "free house search"
    );

    if houses.is_empty() && !predicate.is_unfiltered() {
        return Err(AppError::not_found("no free houses match the given filters"));
    }
    Ok(houses)
}

/// Rentals that started within the period named by `token`, ending at
/// `now`. Without a token every rental is returned, possibly none.
pub fn rentals_in_period(
    session: &Session,
    token: Option<&str>,
    now: DateTime<FixedOffset>,
) -> AppResult<Vec<RentedHouse>> {
    let predicate = match token {
        None => return Ok(session.select::<RentedHouse>(RENTAL_TABLE, &Predicate::all())?),
        Some(token) => {
            let period = Period::parse(token).map_err(|e| AppError::from(vec![e]))?;
            let window = period
                .window_ending(now)
                .ok_or_else(|| AppError::internal(format!("window for {:?} ending {} overflows", period, now)))?;
            FilterPredicateBuilder::rentals_within(&window)
        }
    };

    let rentals: Vec<RentedHouse> = session.select(RENTAL_TABLE, &predicate)?;
    if rentals.is_empty() {
        return Err(AppError::not_found("no rentals found for the given period"));
    }
    Ok(rentals)
}

// ============================================================================
// TESTS
// ============================================================================

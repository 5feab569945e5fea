// 🌐 REST API - axum router over the rental core
//
// Every handler hands its work to the blocking pool with its own session;
// nothing holds a connection across requests.

use crate::analytics::{ClientAnalyticsAggregator, ClientReport};
use crate::catalog::{self, CreditRequest, LoginRequest};
use crate::db::Database;
use crate::editing;
use crate::entities::{Client, ClientId, ClientPayload, House, HousePayload, RentedHouse};
use crate::error::{AppError, AppResult};
use crate::filters::HouseFilter;
use crate::reconciliation::EntityReconciler;
use crate::search;
use crate::temporal::Clock;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, RawQuery, State},
    http::{Method, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

// ============================================================================
// STATE
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub clock: Arc<dyn Clock>,
    pub clients: Arc<EntityReconciler<Client>>,
    pub houses: Arc<EntityReconciler<House>>,
    pub analytics: Arc<ClientAnalyticsAggregator>,
}

impl AppState {
    pub fn new(db: Arc<Database>, clock: Arc<dyn Clock>) -> Self {
        Self {
            clients: Arc::new(EntityReconciler::new(clock.clone())),
            houses: Arc::new(EntityReconciler::new(clock.clone())),
            analytics: Arc::new(ClientAnalyticsAggregator::new(db.clone())),
            db,
            clock,
        }
    }
}

// ============================================================================
// RESPONSES
// ============================================================================

/// API Response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T> {
    success: bool,
    data: T,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

#[derive(Serialize)]
struct ClientList {
    clients: Vec<Client>,
}

#[derive(Serialize)]
struct HouseList {
    houses: Vec<House>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RentalList {
    rented_houses: Vec<RentedHouse>,
}

#[derive(Serialize)]
struct Message {
    message: String,
}

type Reply<T> = AppResult<Json<ApiResponse<T>>>;

// ============================================================================
// HELPERS
// ============================================================================

/// Run storage work on the blocking pool
async fn blocking<T, F>(work: F) -> AppResult<T>
where
    F: FnOnce() -> AppResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AppError::internal(format!("worker task failed: {}", e)))?
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| AppError::validation(rejection.body_text()))
}

#[derive(Debug, Deserialize)]
struct IdQuery {
    id: Option<i64>,
}

impl IdQuery {
    fn require(&self) -> AppResult<i64> {
        self.id
            .ok_or_else(|| AppError::validation("request must contain 'id'"))
    }
}

#[derive(Debug, Deserialize)]
struct PeriodQuery {
    period: Option<String>,
}

/// `comfort-class` plus `districts`, given repeated
/// (`districts=a&districts=b`) or comma-separated (`districts=a,b`).
/// Values are split on literal commas before decoding, so a district
/// whose name contains a comma is sent percent-encoded (`%2C`).
fn house_filter(raw: Option<&str>) -> HouseFilter {
    let mut comfort_class = None;
    let mut districts: Option<Vec<String>> = None;

    for pair in raw.unwrap_or("").split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        match decode(key).as_str() {
            "comfort-class" | "comfortClass" => comfort_class = Some(decode(value)),
            "districts" | "districts[]" => districts
                .get_or_insert_with(Vec::new)
                .extend(value.split(',').map(|d| decode(d).trim().to_string())),
            _ => {}
        }
    }

    HouseFilter::new(comfort_class, districts)
}

fn decode(component: &str) -> String {
    let spaced = component.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|decoded| decoded.into_owned())
        .unwrap_or(spaced)
}

// ============================================================================
// HANDLERS - health
// ============================================================================

/// GET /api/health
async fn health_check() -> Json<ApiResponse<&'static str>> {
    ApiResponse::ok("OK")
}

// ============================================================================
// HANDLERS - clients
// ============================================================================

/// GET /api/clients/all
async fn list_clients(State(state): State<AppState>) -> Reply<ClientList> {
    let clients = blocking(move || catalog::all_clients(&state.db.open_session()?)).await?;
    Ok(ApiResponse::ok(ClientList { clients }))
}

/// GET /api/clients/:id
async fn get_client(State(state): State<AppState>, Path(id): Path<ClientId>) -> Reply<Client> {
    let client = blocking(move || catalog::client_by_id(&state.db.open_session()?, id)).await?;
    Ok(ApiResponse::ok(client))
}

/// GET /api/clients/login
async fn login_client(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Reply<Client> {
    let request = body(payload)?;
    let client = blocking(move || catalog::login(&state.db.open_session()?, &request)).await?;
    Ok(ApiResponse::ok(client))
}

/// POST /api/clients/create
async fn create_client(
    State(state): State<AppState>,
    payload: Result<Json<ClientPayload>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let payload = body(payload)?;
    let client = blocking(move || catalog::create_client(&state.db.open_session()?, payload)).await?;
    Ok((StatusCode::CREATED, ApiResponse::ok(client)))
}

/// PUT /api/clients/edit
async fn edit_client(
    State(state): State<AppState>,
    payload: Result<Json<ClientPayload>, JsonRejection>,
) -> Reply<Client> {
    let payload = body(payload)?;
    let client = blocking(move || {
        editing::edit_client(&state.db.open_session()?, &state.clients, payload)
    })
    .await?;
    Ok(ApiResponse::ok(client))
}

/// PUT /api/clients/give_money
async fn give_money(
    State(state): State<AppState>,
    payload: Result<Json<CreditRequest>, JsonRejection>,
) -> Reply<Client> {
    let request = body(payload)?;
    let id = request
        .id
        .ok_or_else(|| AppError::validation("request must contain 'id'"))?;
    let client = blocking(move || {
        catalog::give_money(&state.db.open_session()?, id, &mut rand::thread_rng())
    })
    .await?;
    Ok(ApiResponse::ok(client))
}

/// DELETE /api/clients/delete?id=
async fn delete_client(State(state): State<AppState>, Query(query): Query<IdQuery>) -> Reply<Message> {
    let id = query.require()?;
    blocking(move || catalog::delete_client(&state.db.open_session()?, id)).await?;
    Ok(ApiResponse::ok(Message {
        message: "deleted successfully".to_string(),
    }))
}

// ============================================================================
// HANDLERS - houses
// ============================================================================

/// GET /api/houses/all
async fn list_houses(State(state): State<AppState>) -> Reply<HouseList> {
    let houses = blocking(move || catalog::all_houses(&state.db.open_session()?)).await?;
    Ok(ApiResponse::ok(HouseList { houses }))
}

/// GET /api/houses/free?comfort-class=&districts=
async fn free_houses(State(state): State<AppState>, RawQuery(raw): RawQuery) -> Reply<HouseList> {
    let filter = house_filter(raw.as_deref());
    let houses =
        blocking(move || search::search_free_houses(&state.db.open_session()?, &filter)).await?;
    Ok(ApiResponse::ok(HouseList { houses }))
}

/// POST /api/houses/create
async fn create_house(
    State(state): State<AppState>,
    payload: Result<Json<HousePayload>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let payload = body(payload)?;
    let house = blocking(move || {
        catalog::create_house(&state.db.open_session()?, payload, state.clock.now())
    })
    .await?;
    Ok((StatusCode::CREATED, ApiResponse::ok(house)))
}

/// PUT /api/houses/edit
async fn edit_house(
    State(state): State<AppState>,
    payload: Result<Json<HousePayload>, JsonRejection>,
) -> Reply<House> {
    let payload = body(payload)?;
    let house = blocking(move || {
        editing::edit_house(&state.db.open_session()?, &state.houses, payload)
    })
    .await?;
    Ok(ApiResponse::ok(house))
}

/// DELETE /api/houses/delete?id=
async fn delete_house(State(state): State<AppState>, Query(query): Query<IdQuery>) -> Reply<Message> {
    let id = query.require()?;
    blocking(move || catalog::delete_house(&state.db.open_session()?, id)).await?;
    Ok(ApiResponse::ok(Message {
        message: "deleted successfully".to_string(),
    }))
}

// ============================================================================
// HANDLERS - rentals
// ============================================================================

/// GET /api/rented-houses/all
async fn list_rentals(State(state): State<AppState>) -> Reply<RentalList> {
    let rented_houses = blocking(move || catalog::all_rentals(&state.db.open_session()?)).await?;
    Ok(ApiResponse::ok(RentalList { rented_houses }))
}

/// GET /api/rented-houses/rented?period=
async fn rentals_in_period(
    State(state): State<AppState>,
    Query(query): Query<PeriodQuery>,
) -> Reply<RentalList> {
    let rented_houses = blocking(move || {
        let session = state.db.open_session()?;
        search::rentals_in_period(&session, query.period.as_deref(), state.clock.now())
    })
    .await?;
    Ok(ApiResponse::ok(RentalList { rented_houses }))
}

/// GET /api/rented-houses/rented-user-info/:id
async fn client_report(
    State(state): State<AppState>,
    Path(id): Path<ClientId>,
) -> Reply<ClientReport> {
    let report = blocking(move || Ok(state.analytics.report(id))).await?;
    Ok(ApiResponse::ok(report))
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn build_router(state: AppState) -> Router {
    let clients = Router::new()
        .route("/all", get(list_clients))
        .route("/login", get(login_client))
        .route("/create", post(create_client))
        .route("/edit", put(edit_client))
        .route("/give_money", put(give_money))
        .route("/delete", delete(delete_client))
        .route("/:id", get(get_client));

    let houses = Router::new()
        .route("/all", get(list_houses))
        .route("/free", get(free_houses))
        .route("/create", post(create_house))
        .route("/edit", put(edit_house))
        .route("/delete", delete(delete_house));

    let rentals = Router::new()
        .route("/all", get(list_rentals))
        .route("/rented", get(rentals_in_period))
        .route("/rented-user-info/:id", get(client_report));

    let api = Router::new()
        .route("/health", get(health_check))
        .nest("/clients", clients)
        .nest("/houses", houses)
        .nest("/rented-houses", rentals);

    Router::new()
        .nest("/api", api)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::DELETE,
                    Method::OPTIONS,
                ]),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_districts_repeated_or_comma_separated() {
        let repeated = house_filter(Some("districts=North&districts=South"));
        let comma = house_filter(Some("districts=North,South"));

        assert_eq!(repeated, comma);
        assert_eq!(
            comma.districts().unwrap(),
            &["North".to_string(), "South".to_string()]
        );
        assert!(comma.comfort_class().is_none());
    }

    #[test]
    fn test_query_values_are_decoded() {
        let filter = house_filter(Some("comfort-class=Eco+Plus&districts=%D0%A6%D0%B5%D0%BD%D1%82%D1%80"));
        assert_eq!(filter.comfort_class(), Some("Eco Plus"));
        assert_eq!(filter.districts().unwrap(), &["Центр".to_string()]);
    }

    #[test]
    fn test_encoded_comma_stays_in_district_name() {
        let filter = house_filter(Some("districts=Old+Town%2C+East,North"));
        assert_eq!(
            filter.districts().unwrap(),
            &["Old Town, East".to_string(), "North".to_string()]
        );
    }

    #[test]
    fn test_empty_districts_are_absent() {
        assert!(house_filter(Some("districts=")).is_empty());
        assert!(house_filter(None).is_empty());
    }
}

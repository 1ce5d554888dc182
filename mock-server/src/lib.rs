use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        FromRequest, FromRequestParts, Path, Query, Request, State,
    },
    http::{header, request::Parts, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

const EARTH_RADIUS_MILES: f64 = 3958.8;
const BASE_PRICE: f64 = 10.0;
const PRICE_PER_MILE: f64 = 1.5;
/// Cubic inches; one and eight cubic feet.
const SMALL_VOLUME: f64 = 1728.0;
const MEDIUM_VOLUME: f64 = 13824.0;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Item {
    pub length: f64,
    pub width: f64,
    pub height: f64,
    pub weight: f64,
    pub quantity: u32,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
}

/// Address and contact are passed through untouched; only coordinates are read.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Location {
    pub address: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Location {
    fn coordinates(&self) -> Option<(f64, f64)> {
        Some((
            self.address.get("latitude")?.as_f64()?,
            self.address.get("longitude")?.as_f64()?,
        ))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Deserialize)]
pub struct CreateEstimate {
    pub items: Vec<Item>,
    pub pickup_location: Location,
    pub delivery_location: Location,
    pub pickup_after: DateTime<Utc>,
    pub deliver_between: TimeWindow,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Estimate {
    pub price: f64,
    pub size: String,
    pub estimated_distance: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Event {
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Shipment {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternate_id_1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternate_id_2: Option<String>,
    pub state: String,
    pub items: Vec<Item>,
    pub pickup_location: Location,
    pub delivery_location: Location,
    pub pickup_after: DateTime<Utc>,
    pub deliver_between: TimeWindow,
    pub options: Value,
    pub tracking_number: String,
    pub price: f64,
    pub estimated_distance: f64,
    pub events: Vec<Event>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Deserialize)]
pub struct CreateShipment {
    pub reference_id: Option<String>,
    pub description: Option<String>,
    pub alternate_id_1: Option<String>,
    pub alternate_id_2: Option<String>,
    pub items: Vec<Item>,
    pub pickup_location: Location,
    pub delivery_location: Location,
    pub pickup_after: DateTime<Utc>,
    pub deliver_between: TimeWindow,
    #[serde(default)]
    pub options: Value,
}

#[derive(Deserialize)]
pub struct UpdateShipment {
    pub reference_id: Option<String>,
    pub description: Option<String>,
    pub alternate_id_1: Option<String>,
    pub alternate_id_2: Option<String>,
    pub items: Option<Vec<Item>>,
    pub pickup_location: Option<Location>,
    pub delivery_location: Option<Location>,
    pub pickup_after: Option<DateTime<Utc>>,
    pub deliver_between: Option<TimeWindow>,
    pub options: Option<Value>,
}

#[derive(Deserialize)]
pub struct CancelShipment {
    pub cancellation_code: String,
    pub cancellation_comment: Option<String>,
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub ids: Option<String>,
}

/// Error in the API's `{"errors":[...]}` shape.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    parameter: Option<&'static str>,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            parameter: None,
            message: message.into(),
        }
    }

    fn invalid(parameter: &'static str, message: impl Into<String>) -> Self {
        Self {
            parameter: Some(parameter),
            ..Self::new(StatusCode::UNPROCESSABLE_ENTITY, "invalid_parameter", message)
        }
    }

    fn not_found(id: u64) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", format!("Shipment {id} not found"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut detail = json!({"code": self.code, "message": self.message});
        if let Some(parameter) = self.parameter {
            detail["parameter"] = json!(parameter);
        }
        (self.status, Json(json!({ "errors": [detail] }))).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), "invalid_body", rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::new(rejection.status(), "invalid_parameter", rejection.body_text())
    }
}

/// `Json` whose rejections use the `{"errors":[...]}` shape.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

/// `Path` whose rejections use the `{"errors":[...]}` shape.
pub struct ApiPath<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

#[derive(Default)]
pub struct Store {
    next_id: u64,
    shipments: HashMap<u64, Shipment>,
}

pub struct AppState {
    token: Option<String>,
    store: RwLock<Store>,
}

pub type Db = Arc<AppState>;

/// Router accepting unauthenticated requests.
pub fn app() -> Router {
    router(None)
}

/// Router requiring `Authorization: Bearer <token>` on every route.
pub fn app_with_token(token: impl Into<String>) -> Router {
    router(Some(token.into()))
}

fn router(token: Option<String>) -> Router {
    let db: Db = Arc::new(AppState {
        token,
        store: RwLock::new(Store::default()),
    });
    Router::new()
        .route("/v1/estimates", post(create_estimate))
        .route("/v1/shipments", get(list_shipments).post(create_shipment))
        .route(
            "/v1/shipments/{id}",
            get(get_shipment).patch(update_shipment).delete(cancel_shipment),
        )
        .layer(middleware::from_fn_with_state(db.clone(), require_bearer))
        .layer(TraceLayer::new_for_http())
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

pub async fn run_with_token(listener: TcpListener, token: String) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with_token(token)).await
}

async fn require_bearer(State(db): State<Db>, request: Request, next: Next) -> Response {
    let Some(expected) = db.token.as_deref() else {
        return next.run(request).await;
    };
    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    if presented == Some(expected) {
        next.run(request).await
    } else {
        ApiError::new(StatusCode::UNAUTHORIZED, "unauthorized", "Invalid access token")
            .into_response()
    }
}

async fn create_estimate(
    ApiJson(input): ApiJson<CreateEstimate>,
) -> Result<Json<Estimate>, ApiError> {
    validate_schedule(&input.items, input.pickup_after, &input.deliver_between)?;
    Ok(Json(estimate(
        &input.items,
        &input.pickup_location,
        &input.delivery_location,
    )))
}

async fn create_shipment(
    State(db): State<Db>,
    ApiJson(input): ApiJson<CreateShipment>,
) -> Result<(StatusCode, Json<Shipment>), ApiError> {
    validate_schedule(&input.items, input.pickup_after, &input.deliver_between)?;
    if input.delivery_location.contact.is_none() {
        return Err(ApiError::invalid(
            "delivery_location.contact",
            "delivery_location.contact is required",
        ));
    }

    let quote = estimate(&input.items, &input.pickup_location, &input.delivery_location);
    let now = Utc::now();
    let mut store = db.store.write().await;
    store.next_id += 1;
    let shipment = Shipment {
        id: store.next_id,
        reference_id: input.reference_id,
        description: input.description,
        alternate_id_1: input.alternate_id_1,
        alternate_id_2: input.alternate_id_2,
        state: "scheduled".to_string(),
        items: input.items,
        pickup_location: input.pickup_location,
        delivery_location: input.delivery_location,
        pickup_after: input.pickup_after,
        deliver_between: input.deliver_between,
        options: if input.options.is_null() {
            json!({})
        } else {
            input.options
        },
        tracking_number: Uuid::new_v4().to_string(),
        price: quote.price,
        estimated_distance: quote.estimated_distance,
        events: vec![Event {
            name: "scheduled".to_string(),
            occurred_at: now,
        }],
        created_at: now,
        updated_at: now,
    };
    store.shipments.insert(shipment.id, shipment.clone());
    Ok((StatusCode::CREATED, Json(shipment)))
}

async fn list_shipments(
    State(db): State<Db>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Shipment>>, ApiError> {
    let store = db.store.read().await;
    let mut shipments: Vec<Shipment> = match query.ids.as_deref() {
        Some(ids) => {
            let ids = ids
                .split(',')
                .map(|id| id.trim().parse::<u64>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|_| {
                    let mut err = ApiError::invalid("ids", "ids must be comma separated integers");
                    err.status = StatusCode::BAD_REQUEST;
                    err
                })?;
            ids.iter()
                .filter_map(|id| store.shipments.get(id).cloned())
                .collect()
        }
        None => store.shipments.values().cloned().collect(),
    };
    shipments.sort_by_key(|s| s.id);
    Ok(Json(shipments))
}

async fn get_shipment(
    State(db): State<Db>,
    ApiPath(id): ApiPath<u64>,
) -> Result<Json<Shipment>, ApiError> {
    let store = db.store.read().await;
    store
        .shipments
        .get(&id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::not_found(id))
}

async fn update_shipment(
    State(db): State<Db>,
    ApiPath(id): ApiPath<u64>,
    ApiJson(input): ApiJson<UpdateShipment>,
) -> Result<Json<Shipment>, ApiError> {
    let mut store = db.store.write().await;
    let shipment = store.shipments.get_mut(&id).ok_or_else(|| ApiError::not_found(id))?;
    if shipment.state == "canceled" {
        return Err(ApiError::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            "invalid_state",
            "Canceled shipments cannot be updated",
        ));
    }
    if let Some(v) = input.reference_id {
        shipment.reference_id = Some(v);
    }
    if let Some(v) = input.description {
        shipment.description = Some(v);
    }
    if let Some(v) = input.alternate_id_1 {
        shipment.alternate_id_1 = Some(v);
    }
    if let Some(v) = input.alternate_id_2 {
        shipment.alternate_id_2 = Some(v);
    }
    if let Some(v) = input.items {
        shipment.items = v;
    }
    if let Some(v) = input.pickup_location {
        shipment.pickup_location = v;
    }
    if let Some(v) = input.delivery_location {
        shipment.delivery_location = v;
    }
    if let Some(v) = input.pickup_after {
        shipment.pickup_after = v;
    }
    if let Some(v) = input.deliver_between {
        shipment.deliver_between = v;
    }
    if let Some(v) = input.options {
        shipment.options = v;
    }
    shipment.updated_at = Utc::now();
    Ok(Json(shipment.clone()))
}

async fn cancel_shipment(
    State(db): State<Db>,
    ApiPath(id): ApiPath<u64>,
    ApiJson(input): ApiJson<CancelShipment>,
) -> Result<StatusCode, ApiError> {
    let mut store = db.store.write().await;
    let shipment = store.shipments.get_mut(&id).ok_or_else(|| ApiError::not_found(id))?;
    if shipment.state == "canceled" {
        return Err(ApiError::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            "invalid_state",
            format!("Shipment {id} is already canceled"),
        ));
    }
    tracing::info!(
        id,
        code = %input.cancellation_code,
        comment = input.cancellation_comment.as_deref().unwrap_or(""),
        "shipment canceled"
    );
    let now = Utc::now();
    shipment.state = "canceled".to_string();
    shipment.events.push(Event {
        name: "canceled".to_string(),
        occurred_at: now,
    });
    shipment.updated_at = now;
    Ok(StatusCode::NO_CONTENT)
}

fn validate_schedule(
    items: &[Item],
    pickup_after: DateTime<Utc>,
    window: &TimeWindow,
) -> Result<(), ApiError> {
    if items.is_empty() {
        return Err(ApiError::invalid("items", "items must not be empty"));
    }
    if window.end <= window.start {
        return Err(ApiError::invalid(
            "deliver_between",
            "deliver_between.end must be after deliver_between.start",
        ));
    }
    if window.end <= pickup_after {
        return Err(ApiError::invalid(
            "deliver_between",
            "deliver_between.end must be after pickup_after",
        ));
    }
    Ok(())
}

/// Prices a delivery by great-circle distance; size by total item volume.
pub fn estimate(items: &[Item], pickup: &Location, delivery: &Location) -> Estimate {
    let distance = match (pickup.coordinates(), delivery.coordinates()) {
        (Some(from), Some(to)) => haversine_miles(from, to),
        _ => 0.0,
    };
    let volume: f64 = items
        .iter()
        .map(|i| i.length * i.width * i.height * f64::from(i.quantity))
        .sum();
    let size = if volume < SMALL_VOLUME {
        "small"
    } else if volume < MEDIUM_VOLUME {
        "medium"
    } else {
        "large"
    };
    Estimate {
        price: round_cents(BASE_PRICE + PRICE_PER_MILE * distance),
        size: size.to_string(),
        estimated_distance: round_cents(distance),
    }
}

fn haversine_miles((lat1, lon1): (f64, f64), (lat2, lon2): (f64, f64)) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();
    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_MILES * a.sqrt().asin()
}

fn round_cents(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

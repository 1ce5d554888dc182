use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, app_with_token, Estimate, Shipment};
use serde_json::{json, Value};
use tower::ServiceExt;

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn json_request(method: &str, uri: &str, body: &Value) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .unwrap()
}

fn get_request(uri: &str) -> Request<String> {
    Request::builder().uri(uri).body(String::new()).unwrap()
}

fn location(street: &str, lat: f64, lng: f64) -> Value {
    json!({
        "address": {
            "street1": street,
            "city": "Atlanta",
            "state": "GA",
            "zip": "30305",
            "latitude": lat,
            "longitude": lng
        },
        "contact": {"name": "Pat", "phone": "4045550100"}
    })
}

fn estimate_body() -> Value {
    json!({
        "items": [{"length": 10, "width": 8, "height": 4, "weight": 2, "quantity": 1, "value": 40}],
        "pickup_location": location("1 A St", 33.84, -84.38),
        "delivery_location": location("2 B St", 33.79, -84.39),
        "pickup_after": "2024-05-01T14:00:00Z",
        "deliver_between": {"start": "2024-05-01T15:00:00Z", "end": "2024-05-01T19:00:00Z"}
    })
}

fn shipment_body() -> Value {
    let mut body = estimate_body();
    body["reference_id"] = json!("order-1001");
    body["options"] = json!({"signature_required": true});
    body
}

// --- estimates ---

#[tokio::test]
async fn create_estimate_returns_quote() {
    let resp = app()
        .oneshot(json_request("POST", "/v1/estimates", &estimate_body()))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let estimate: Estimate = body_json(resp).await;
    assert_eq!(estimate.size, "small");
    assert!(estimate.estimated_distance > 3.0 && estimate.estimated_distance < 4.0);
    assert!(estimate.price > 10.0);
}

#[tokio::test]
async fn create_estimate_without_items_returns_422_payload() {
    let mut body = estimate_body();
    body["items"] = json!([]);
    let resp = app()
        .oneshot(json_request("POST", "/v1/estimates", &body))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let payload: Value = body_json(resp).await;
    assert_eq!(payload["errors"][0]["parameter"], "items");
    assert_eq!(payload["errors"][0]["code"], "invalid_parameter");
}

#[tokio::test]
async fn create_estimate_with_inverted_window_returns_422() {
    let mut body = estimate_body();
    body["deliver_between"] = json!({"start": "2024-05-01T19:00:00Z", "end": "2024-05-01T15:00:00Z"});
    let resp = app()
        .oneshot(json_request("POST", "/v1/estimates", &body))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let payload: Value = body_json(resp).await;
    assert_eq!(payload["errors"][0]["parameter"], "deliver_between");
}

// --- auth ---

#[tokio::test]
async fn token_required_when_configured() {
    let resp = app_with_token("secret")
        .oneshot(json_request("POST", "/v1/estimates", &estimate_body()))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let payload: Value = body_json(resp).await;
    assert_eq!(payload["errors"][0]["code"], "unauthorized");
}

#[tokio::test]
async fn matching_token_is_accepted() {
    let mut req = json_request("POST", "/v1/estimates", &estimate_body());
    req.headers_mut().insert(
        http::header::AUTHORIZATION,
        "Bearer secret".parse().unwrap(),
    );
    let resp = app_with_token("secret").oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

// --- shipments ---

#[tokio::test]
async fn create_shipment_requires_delivery_contact() {
    let mut body = shipment_body();
    body["delivery_location"]
        .as_object_mut()
        .unwrap()
        .remove("contact");
    let resp = app()
        .oneshot(json_request("POST", "/v1/shipments", &body))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn get_shipment_not_found() {
    let resp = app().oneshot(get_request("/v1/shipments/99")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let payload: Value = body_json(resp).await;
    assert_eq!(payload["errors"][0]["message"], "Shipment 99 not found");
}

#[tokio::test]
async fn list_with_bad_ids_returns_400() {
    let resp = app()
        .oneshot(get_request("/v1/shipments?ids=1,abc"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn cancel_unknown_shipment_returns_404() {
    let resp = app()
        .oneshot(json_request(
            "DELETE",
            "/v1/shipments/5",
            &json!({"cancellation_code": "other"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// --- request rejections ---

#[tokio::test]
async fn malformed_json_body_returns_error_payload() {
    let request = Request::builder()
        .method("POST")
        .uri("/v1/estimates")
        .header(http::header::CONTENT_TYPE, "application/json")
        .body("{not json".to_string())
        .unwrap();
    let resp = app().oneshot(request).await.unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let payload: Value = body_json(resp).await;
    assert_eq!(payload["errors"][0]["code"], "invalid_body");
    assert!(payload["errors"][0]["message"].as_str().is_some());
}

#[tokio::test]
async fn wrong_body_shape_returns_422_payload() {
    let mut body = shipment_body();
    body["items"] = json!("shoes");
    let resp = app()
        .oneshot(json_request("POST", "/v1/shipments", &body))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let payload: Value = body_json(resp).await;
    assert_eq!(payload["errors"][0]["code"], "invalid_body");
}

#[tokio::test]
async fn missing_content_type_returns_415_payload() {
    let request = Request::builder()
        .method("PATCH")
        .uri("/v1/shipments/1")
        .body(json!({"description": "x"}).to_string())
        .unwrap();
    let resp = app().oneshot(request).await.unwrap();

    assert_eq!(resp.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    let payload: Value = body_json(resp).await;
    assert_eq!(payload["errors"][0]["code"], "invalid_body");
}

#[tokio::test]
async fn non_numeric_shipment_id_returns_400_payload() {
    let resp = app().oneshot(get_request("/v1/shipments/abc")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let payload: Value = body_json(resp).await;
    assert_eq!(payload["errors"][0]["code"], "invalid_parameter");
}

// --- full shipment lifecycle ---

#[tokio::test]
async fn shipment_lifecycle() {
    use tower::Service;

    let mut app = app().into_service();

    // create
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request("POST", "/v1/shipments", &shipment_body()))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Shipment = body_json(resp).await;
    assert_eq!(created.id, 1);
    assert_eq!(created.state, "scheduled");
    assert_eq!(created.reference_id.as_deref(), Some("order-1001"));
    assert_eq!(created.events.len(), 1);

    // get
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(get_request("/v1/shipments/1"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let fetched: Shipment = body_json(resp).await;
    assert_eq!(fetched.tracking_number, created.tracking_number);

    // update — partial: only description
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request(
            "PATCH",
            "/v1/shipments/1",
            &json!({"description": "Leave at door"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let updated: Shipment = body_json(resp).await;
    assert_eq!(updated.description.as_deref(), Some("Leave at door"));
    assert_eq!(updated.reference_id.as_deref(), Some("order-1001")); // unchanged

    // list by ids — unknown id skipped
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(get_request("/v1/shipments?ids=1,7"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let shipments: Vec<Shipment> = body_json(resp).await;
    assert_eq!(shipments.len(), 1);

    // cancel
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request(
            "DELETE",
            "/v1/shipments/1",
            &json!({"cancellation_code": "customer_canceled"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(body_bytes(resp).await.is_empty());

    // cancel again — 422
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request(
            "DELETE",
            "/v1/shipments/1",
            &json!({"cancellation_code": "customer_canceled"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    // get after cancel — state canceled, event appended
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(get_request("/v1/shipments/1"))
        .await
        .unwrap();
    let canceled: Shipment = body_json(resp).await;
    assert_eq!(canceled.state, "canceled");
    assert_eq!(canceled.events.last().unwrap().name, "canceled");
}

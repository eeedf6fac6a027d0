//! Integration tests for the API server.

use std::sync::OnceLock;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{Duration, Utc};
use common::{CouponId, EventId, Money, UserId};
use metrics_exporter_prometheus::PrometheusHandle;
use store::{Event, MemoryStore, User, UserCoupon, UserPoint};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

struct TestApp {
    app: Router,
    store: MemoryStore,
    organizer: UserId,
    customer: UserId,
    event_id: EventId,
}

async fn setup() -> TestApp {
    setup_with_seats(3).await
}

async fn setup_with_seats(seats: i32) -> TestApp {
    let store = MemoryStore::new();
    let organizer = UserId::new();
    let customer = UserId::new();
    store
        .insert_user(User {
            id: organizer,
            referral_code: None,
            referred_by: None,
        })
        .await;
    store
        .insert_user(User {
            id: customer,
            referral_code: Some("REF12345".to_string()),
            referred_by: None,
        })
        .await;

    let now = Utc::now();
    let event = Event {
        id: EventId::new(),
        organizer_id: organizer,
        name: "Eventix Live".to_string(),
        price: Money::from_minor(100_000),
        total_seats: seats,
        available_seats: seats,
        starts_at: now + Duration::days(7),
        ends_at: now + Duration::days(8),
    };
    let event_id = event.id;
    store.insert_event(event).await;

    let state = api::create_state(store.clone());
    let app = api::create_app(state, get_metrics_handle());

    TestApp {
        app,
        store,
        organizer,
        customer,
        event_id,
    }
}

fn as_customer(user_id: UserId, req: Request<Body>) -> Request<Body> {
    with_identity(user_id, "customer", req)
}

fn as_organizer(user_id: UserId, req: Request<Body>) -> Request<Body> {
    with_identity(user_id, "organizer", req)
}

fn with_identity(user_id: UserId, role: &str, mut req: Request<Body>) -> Request<Body> {
    let headers = req.headers_mut();
    headers.insert("x-user-id", user_id.to_string().parse().unwrap());
    headers.insert("x-user-role", role.parse().unwrap());
    req
}

fn json_body(value: serde_json::Value) -> Body {
    Body::from(serde_json::to_string(&value).unwrap())
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn checkout_request(event_id: EventId) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/transactions/checkout")
        .header("content-type", "application/json")
        .body(json_body(serde_json::json!({
            "event_id": event_id.as_uuid(),
        })))
        .unwrap()
}

/// Runs checkout as the customer and returns the created transaction id.
async fn checkout(fx: &TestApp) -> String {
    let response = fx
        .app
        .clone()
        .oneshot(as_customer(fx.customer, checkout_request(fx.event_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    json["id"].as_str().unwrap().to_string()
}

async fn upload_proof(fx: &TestApp, id: &str) {
    let response = fx
        .app
        .clone()
        .oneshot(as_customer(
            fx.customer,
            Request::builder()
                .method("POST")
                .uri(format!("/transactions/{id}/proof"))
                .header("content-type", "application/json")
                .body(json_body(
                    serde_json::json!({ "proof_url": "/uploads/proof.jpg" }),
                ))
                .unwrap(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_health_check() {
    let fx = setup().await;

    let response = fx
        .app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["service"], "eventix-api");
}

#[tokio::test]
async fn test_metrics_endpoint_renders() {
    let fx = setup().await;

    let response = fx
        .app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/plain"));
}

#[tokio::test]
async fn test_checkout_requires_identity_headers() {
    let fx = setup().await;

    let response = fx
        .app
        .oneshot(checkout_request(fx.event_id))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_checkout_rejects_garbage_identity() {
    let fx = setup().await;

    let mut req = checkout_request(fx.event_id);
    req.headers_mut()
        .insert("x-user-id", "not-a-uuid".parse().unwrap());
    req.headers_mut()
        .insert("x-user-role", "customer".parse().unwrap());

    let response = fx.app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_checkout_is_customer_only() {
    let fx = setup().await;

    let response = fx
        .app
        .oneshot(as_organizer(fx.organizer, checkout_request(fx.event_id)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_checkout_creates_a_reservation() {
    let fx = setup().await;

    let response = fx
        .app
        .clone()
        .oneshot(as_customer(fx.customer, checkout_request(fx.event_id)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["status"], "WAITING_PAYMENT");
    assert_eq!(json["total_price"], 100_000);
    assert_eq!(json["event_id"], fx.event_id.to_string());
    assert_eq!(fx.store.available_seats(fx.event_id).await, Some(2));
}

#[tokio::test]
async fn test_checkout_applies_points_and_coupon() {
    let fx = setup().await;
    let now = Utc::now();
    fx.store
        .insert_point(UserPoint {
            id: uuid::Uuid::new_v4(),
            user_id: fx.customer,
            amount: Money::from_minor(10_000),
            is_used: false,
            expired_at: now + Duration::days(30),
        })
        .await;
    let coupon_id = CouponId::new();
    fx.store
        .insert_coupon(UserCoupon {
            id: coupon_id,
            user_id: fx.customer,
            discount_val: 10,
            is_used: false,
            expired_at: now + Duration::days(30),
        })
        .await;

    let request = Request::builder()
        .method("POST")
        .uri("/transactions/checkout")
        .header("content-type", "application/json")
        .body(json_body(serde_json::json!({
            "event_id": fx.event_id.as_uuid(),
            "use_points": true,
            "coupon_id": coupon_id.as_uuid(),
        })))
        .unwrap();

    let response = fx
        .app
        .oneshot(as_customer(fx.customer, request))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    // 100_000 - 10_000 points - 10% of 100_000
    assert_eq!(json["total_price"], 80_000);
}

#[tokio::test]
async fn test_checkout_unknown_event_is_not_found() {
    let fx = setup().await;

    let response = fx
        .app
        .oneshot(as_customer(fx.customer, checkout_request(EventId::new())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_checkout_sold_out_is_a_conflict() {
    let fx = setup_with_seats(1).await;
    checkout(&fx).await;

    let response = fx
        .app
        .clone()
        .oneshot(as_customer(fx.customer, checkout_request(fx.event_id)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_checkout_with_unknown_coupon_is_a_bad_request() {
    let fx = setup().await;

    let request = Request::builder()
        .method("POST")
        .uri("/transactions/checkout")
        .header("content-type", "application/json")
        .body(json_body(serde_json::json!({
            "event_id": fx.event_id.as_uuid(),
            "coupon_id": uuid::Uuid::new_v4(),
        })))
        .unwrap();

    let response = fx
        .app
        .oneshot(as_customer(fx.customer, request))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_full_flow_checkout_proof_approve() {
    let fx = setup().await;
    let id = checkout(&fx).await;
    upload_proof(&fx, &id).await;

    let response = fx
        .app
        .clone()
        .oneshot(as_organizer(
            fx.organizer,
            Request::builder()
                .method("POST")
                .uri(format!("/transactions/{id}/decision"))
                .header("content-type", "application/json")
                .body(json_body(serde_json::json!("APPROVE")))
                .unwrap(),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "DONE");
}

#[tokio::test]
async fn test_rejection_returns_the_seat() {
    let fx = setup().await;
    let id = checkout(&fx).await;
    upload_proof(&fx, &id).await;
    assert_eq!(fx.store.available_seats(fx.event_id).await, Some(2));

    let response = fx
        .app
        .clone()
        .oneshot(as_organizer(
            fx.organizer,
            Request::builder()
                .method("POST")
                .uri(format!("/transactions/{id}/decision"))
                .header("content-type", "application/json")
                .body(json_body(serde_json::json!("REJECT")))
                .unwrap(),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "REJECTED");
    assert_eq!(fx.store.available_seats(fx.event_id).await, Some(3));
}

#[tokio::test]
async fn test_deciding_before_proof_is_a_conflict() {
    let fx = setup().await;
    let id = checkout(&fx).await;

    let response = fx
        .app
        .clone()
        .oneshot(as_organizer(
            fx.organizer,
            Request::builder()
                .method("POST")
                .uri(format!("/transactions/{id}/decision"))
                .header("content-type", "application/json")
                .body(json_body(serde_json::json!("APPROVE")))
                .unwrap(),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_foreign_organizer_cannot_decide() {
    let fx = setup().await;
    let id = checkout(&fx).await;
    upload_proof(&fx, &id).await;

    let impostor = UserId::new();
    let response = fx
        .app
        .clone()
        .oneshot(as_organizer(
            impostor,
            Request::builder()
                .method("POST")
                .uri(format!("/transactions/{id}/decision"))
                .header("content-type", "application/json")
                .body(json_body(serde_json::json!("APPROVE")))
                .unwrap(),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cancel_releases_the_reservation() {
    let fx = setup().await;
    let id = checkout(&fx).await;

    let response = fx
        .app
        .clone()
        .oneshot(as_customer(
            fx.customer,
            Request::builder()
                .method("POST")
                .uri(format!("/transactions/{id}/cancel"))
                .body(Body::empty())
                .unwrap(),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "CANCELED");
    assert_eq!(fx.store.available_seats(fx.event_id).await, Some(3));
}

#[tokio::test]
async fn test_listing_is_scoped_to_the_caller() {
    let fx = setup().await;
    checkout(&fx).await;

    let mine = fx
        .app
        .clone()
        .oneshot(as_customer(
            fx.customer,
            Request::builder()
                .uri("/transactions")
                .body(Body::empty())
                .unwrap(),
        ))
        .await
        .unwrap();
    assert_eq!(mine.status(), StatusCode::OK);
    assert_eq!(body_json(mine).await.as_array().unwrap().len(), 1);

    let stranger = UserId::new();
    let theirs = fx
        .app
        .clone()
        .oneshot(as_customer(
            stranger,
            Request::builder()
                .uri("/transactions")
                .body(Body::empty())
                .unwrap(),
        ))
        .await
        .unwrap();
    assert_eq!(theirs.status(), StatusCode::OK);
    assert!(body_json(theirs).await.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_fetching_a_foreign_transaction_is_not_found() {
    let fx = setup().await;
    let id = checkout(&fx).await;

    let stranger = UserId::new();
    let response = fx
        .app
        .clone()
        .oneshot(as_customer(
            stranger,
            Request::builder()
                .uri(format!("/transactions/{id}"))
                .body(Body::empty())
                .unwrap(),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_approvals_inbox_lists_pending_confirmations() {
    let fx = setup().await;
    let id = checkout(&fx).await;
    upload_proof(&fx, &id).await;

    let response = fx
        .app
        .clone()
        .oneshot(as_organizer(
            fx.organizer,
            Request::builder()
                .uri(format!("/events/{}/approvals", fx.event_id))
                .body(Body::empty())
                .unwrap(),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let inbox = json.as_array().unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0]["id"], id);
    assert_eq!(inbox[0]["status"], "WAITING_CONFIRMATION");
}

#[tokio::test]
async fn test_invalid_transaction_id_format_is_a_bad_request() {
    let fx = setup().await;

    let response = fx
        .app
        .oneshot(as_customer(
            fx.customer,
            Request::builder()
                .uri("/transactions/not-a-uuid")
                .body(Body::empty())
                .unwrap(),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

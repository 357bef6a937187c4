use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use bazaar_common::Money;
use bazaar_order_engine::{
    db_types::{Order, OrderStatusType, PaymentOutcome, Registration, RegistrationStatus},
    order_objects::ReconcileResult,
    traits::GatewayError,
    PaymentSessionApi,
    SqliteDatabase,
};
use gateway_tools::WEBHOOK_SIGNATURE_HEADER;
use serde_json::json;

use super::{
    helpers::{get_request, issue_token, patch_request, post_request, public_request, Marketplace, BUYER, OTHER_BUYER},
    mocks::MockGateway,
};
use crate::{auth::Role, data_objects::PaymentSessionResponse, routes::IssueOrderPaymentRoute};

async fn checkout(m: &Marketplace, items: serde_json::Value) -> Order {
    let token = issue_token(BUYER, vec![Role::Buyer]);
    let (status, body) =
        post_request(&token, "/orders", &json!({ "items": items }), m.configure()).await.expect("Request failed");
    assert_eq!(status, StatusCode::CREATED, "{body}");
    serde_json::from_str(&body).unwrap()
}

async fn open_session(m: &Marketplace, order_id: i64) -> PaymentSessionResponse {
    let token = issue_token(BUYER, vec![Role::Buyer]);
    let (status, body) = post_request(&token, &format!("/orders/{order_id}/payment"), &json!({}), m.configure())
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::OK, "{body}");
    serde_json::from_str(&body).unwrap()
}

async fn fetch_order(m: &Marketplace, order_id: i64) -> Order {
    let token = issue_token(BUYER, vec![Role::Buyer]);
    let (status, body) = get_request(&token, &format!("/orders/{order_id}"), m.configure()).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK, "{body}");
    serde_json::from_str(&body).unwrap()
}

fn webhook(body: Vec<u8>, signature: &str) -> TestRequest {
    TestRequest::post()
        .uri("/payments/webhook")
        .insert_header((WEBHOOK_SIGNATURE_HEADER, signature))
        .insert_header(("X-Forwarded-For", "203.0.113.9"))
        .set_payload(body)
}

#[actix_web::test]
async fn checkout_prices_come_from_the_catalog() {
    let m = Marketplace::new().await;
    let order = checkout(&m, json!([{ "product_id": 1, "quantity": 2 }, { "product_id": 2, "quantity": 1 }])).await;
    assert_eq!(order.buyer_id, BUYER);
    assert_eq!(order.status, OrderStatusType::Pending);
    assert_eq!(order.subtotal, Money::from(6_000));
    assert_eq!(order.delivery_fee, Money::from(500));
    assert_eq!(order.total, Money::from(6_500));
    assert_eq!(order.items.len(), 2);
    assert!(order.payment_reference.is_none());
}

#[actix_web::test]
async fn checkout_ignores_client_prices() {
    let m = Marketplace::new().await;
    let order = checkout(&m, json!([{ "product_id": 1, "quantity": 1, "unit_price": 1 }])).await;
    assert_eq!(order.subtotal, Money::from(2_500));
}

#[actix_web::test]
async fn checkout_rejects_bad_carts() {
    let m = Marketplace::new().await;
    let token = issue_token(BUYER, vec![Role::Buyer]);
    let cases = [
        (json!({ "items": [] }), "An order must contain at least one item"),
        (json!({ "items": [{ "product_id": 77, "quantity": 1 }] }), "Product 77 is not available for purchase"),
        (
            json!({ "items": [{ "product_id": 1, "quantity": 0 }] }),
            "Invalid quantity 0 for product 1. Quantities must be between 1 and 10000",
        ),
        (
            json!({ "items": [{ "product_id": 1, "quantity": 576_460_752_303_423_489_i64 }] }),
            "Invalid quantity 576460752303423489 for product 1. Quantities must be between 1 and 10000",
        ),
    ];
    for (body, message) in cases {
        let (status, body) = post_request(&token, "/orders", &body, m.configure()).await.expect("Request failed");
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": message }).to_string());
    }
    let (status, body) = get_request(&token, "/orders", m.configure()).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "[]");
}

#[actix_web::test]
async fn pay_and_verify_an_order() {
    let m = Marketplace::new().await;
    let order = checkout(&m, json!([{ "product_id": 1, "quantity": 2 }])).await;
    let session = open_session(&m, order.id).await;
    assert_eq!(session.amount, order.total);
    assert_eq!(session.currency, order.currency);
    assert!(session.payment_url.ends_with(&session.reference));

    let token = issue_token(BUYER, vec![Role::Buyer]);
    let path = format!("/payments/verify/{}", session.reference);
    // Not paid yet
    let (status, _) = get_request(&token, &path, m.configure()).await.expect("Request failed");
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(fetch_order(&m, order.id).await.status, OrderStatusType::Pending);

    m.gateway.complete(&session.reference, PaymentOutcome::Succeeded);
    let (status, body) = get_request(&token, &path, m.configure()).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK, "{body}");
    let result: ReconcileResult = serde_json::from_str(&body).unwrap();
    assert_eq!(result.status, "paid");
    let paid = fetch_order(&m, order.id).await;
    assert_eq!(paid.status, OrderStatusType::Paid);
    assert_eq!(paid.payment_reference.as_deref(), Some(session.reference.as_str()));

    // Verifying again changes nothing
    let (status, _) = get_request(&token, &path, m.configure()).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetch_order(&m, order.id).await, paid);
}

#[actix_web::test]
async fn only_the_payer_can_verify() {
    let m = Marketplace::new().await;
    let order = checkout(&m, json!([{ "product_id": 2, "quantity": 1 }])).await;
    let session = open_session(&m, order.id).await;
    m.gateway.complete(&session.reference, PaymentOutcome::Succeeded);
    let path = format!("/payments/verify/{}", session.reference);

    let token = issue_token(OTHER_BUYER, vec![Role::Buyer]);
    let (status, _) = get_request(&token, &path, m.configure()).await.expect("Request failed");
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(m.gateway.verified_count(), 0);

    let token = issue_token(99, vec![Role::Admin]);
    let (status, _) = get_request(&token, &path, m.configure()).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetch_order(&m, order.id).await.status, OrderStatusType::Paid);
}

#[actix_web::test]
async fn unknown_references_never_reach_the_gateway() {
    let m = Marketplace::new().await;
    let token = issue_token(BUYER, vec![Role::Buyer]);
    for reference in ["BZR-O1-doesnotexist", "bad%20ref"] {
        let (status, _) =
            get_request(&token, &format!("/payments/verify/{reference}"), m.configure()).await.expect("Request failed");
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
    assert_eq!(m.gateway.verified_count(), 0);
}

#[actix_web::test]
async fn one_live_session_at_a_time() {
    let m = Marketplace::new().await;
    let order = checkout(&m, json!([{ "product_id": 1, "quantity": 1 }])).await;
    let session = open_session(&m, order.id).await;
    let token = issue_token(BUYER, vec![Role::Buyer]);
    let path = format!("/orders/{}/payment", order.id);
    let (status, body) = post_request(&token, &path, &json!({}), m.configure()).await.expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("already has a live payment session"), "{body}");

    // A failed attempt frees the buyer to try again with a fresh reference
    m.gateway.complete(&session.reference, PaymentOutcome::Failed);
    let (status, _) = get_request(&token, &format!("/payments/verify/{}", session.reference), m.configure())
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetch_order(&m, order.id).await.status, OrderStatusType::Pending);
    let retry = open_session(&m, order.id).await;
    assert_ne!(retry.reference, session.reference);

    let (status, body) =
        get_request(&token, &format!("/orders/{}/payments", order.id), m.configure()).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let history: Vec<serde_json::Value> = serde_json::from_str(&body).unwrap();
    assert_eq!(history.len(), 2);
}

#[actix_web::test]
async fn paid_orders_cannot_be_paid_again() {
    let m = Marketplace::new().await;
    let order = checkout(&m, json!([{ "product_id": 1, "quantity": 1 }])).await;
    let session = open_session(&m, order.id).await;
    let (body, signature) = m.gateway.webhook(&session.reference, PaymentOutcome::Succeeded);
    m.gateway.complete(&session.reference, PaymentOutcome::Succeeded);
    let (status, _, _) = public_request(webhook(body, &signature), m.configure()).await;
    assert_eq!(status, StatusCode::OK);

    let token = issue_token(BUYER, vec![Role::Buyer]);
    let path = format!("/orders/{}/payment", order.id);
    let (status, body) = post_request(&token, &path, &json!({}), m.configure()).await.expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("has already been paid"), "{body}");
}

#[actix_web::test]
async fn cancelled_orders_cannot_be_paid() {
    let m = Marketplace::new().await;
    let order = checkout(&m, json!([{ "product_id": 1, "quantity": 1 }])).await;
    let token = issue_token(BUYER, vec![Role::Buyer]);
    let path = format!("/orders/{}/cancel", order.id);
    let (status, body) = patch_request(&token, &path, &json!({ "reason": "Found it cheaper" }), m.configure())
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::OK, "{body}");
    let cancelled: Order = serde_json::from_str(&body).unwrap();
    assert_eq!(cancelled.status, OrderStatusType::Cancelled);
    assert_eq!(cancelled.cancellation_reason.as_deref(), Some("Found it cheaper"));

    let path = format!("/orders/{}/payment", order.id);
    let (status, _) = post_request(&token, &path, &json!({}), m.configure()).await.expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(m.gateway.initialized_count(), 0);
}

#[actix_web::test]
async fn buyers_cannot_cancel_other_peoples_orders() {
    let m = Marketplace::new().await;
    let order = checkout(&m, json!([{ "product_id": 1, "quantity": 1 }])).await;
    let token = issue_token(OTHER_BUYER, vec![Role::Buyer]);
    let path = format!("/orders/{}/cancel", order.id);
    let (status, _) = patch_request(&token, &path, &json!({}), m.configure()).await.expect("Request failed");
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(fetch_order(&m, order.id).await.status, OrderStatusType::Pending);
}

#[actix_web::test]
async fn webhook_marks_order_paid_once() {
    let m = Marketplace::new().await;
    let order = checkout(&m, json!([{ "product_id": 1, "quantity": 1 }])).await;
    let session = open_session(&m, order.id).await;
    let (body, signature) = m.gateway.webhook(&session.reference, PaymentOutcome::Succeeded);

    let (status, _, response) = public_request(webhook(body.clone(), &signature), m.configure()).await;
    assert_eq!(status, StatusCode::OK, "{response}");
    let result: ReconcileResult = serde_json::from_str(&response).unwrap();
    assert_eq!(result.reference, session.reference);
    let paid = fetch_order(&m, order.id).await;
    assert_eq!(paid.status, OrderStatusType::Paid);

    // Redelivery is acknowledged and changes nothing
    let (status, _, _) = public_request(webhook(body, &signature), m.configure()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetch_order(&m, order.id).await, paid);
}

#[actix_web::test]
async fn forged_webhooks_are_rejected() {
    let m = Marketplace::new().await;
    let order = checkout(&m, json!([{ "product_id": 1, "quantity": 1 }])).await;
    let session = open_session(&m, order.id).await;
    let (mut body, signature) = m.gateway.webhook(&session.reference, PaymentOutcome::Succeeded);
    body.push(b' ');
    let (status, _, response) = public_request(webhook(body.clone(), &signature), m.configure()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response, r#"{"error":"The webhook signature is invalid"}"#);

    let req = TestRequest::post().uri("/payments/webhook").set_payload(body);
    let (status, _, _) = public_request(req, m.configure()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(fetch_order(&m, order.id).await.status, OrderStatusType::Pending);
}

#[actix_web::test]
async fn webhooks_for_unknown_references_are_acknowledged() {
    let m = Marketplace::new().await;
    let (body, signature) = m.gateway.webhook("BZR-O404-nosuchsession", PaymentOutcome::Succeeded);
    let (status, _, response) = public_request(webhook(body, &signature), m.configure()).await;
    assert_eq!(status, StatusCode::OK);
    assert!(response.contains("Unknown reference"), "{response}");
}

#[actix_web::test]
async fn callback_redirects_to_the_app() {
    let m = Marketplace::new().await;
    let order = checkout(&m, json!([{ "product_id": 2, "quantity": 3 }])).await;
    let session = open_session(&m, order.id).await;
    let uri = format!("/payments/callback?reference={}", session.reference);

    let (status, location, _) = public_request(TestRequest::get().uri(&uri), m.configure()).await;
    assert_eq!(status, StatusCode::FOUND);
    let location = location.expect("redirect location");
    assert!(location.starts_with(super::helpers::REDIRECT_URL), "{location}");
    assert!(location.contains("status=pending"), "{location}");
    assert_eq!(fetch_order(&m, order.id).await.status, OrderStatusType::Pending);

    m.gateway.complete(&session.reference, PaymentOutcome::Succeeded);
    let uri = format!("/payments/callback?trxref={0}&reference={0}", session.reference);
    let (status, location, _) = public_request(TestRequest::get().uri(&uri), m.configure()).await;
    assert_eq!(status, StatusCode::FOUND);
    let location = location.expect("redirect location");
    assert!(location.contains("status=paid"), "{location}");
    assert!(location.contains(&format!("order_id={}", order.id)), "{location}");
    assert_eq!(fetch_order(&m, order.id).await.status, OrderStatusType::Paid);
}

#[actix_web::test]
async fn callback_without_reference() {
    let m = Marketplace::new().await;
    let (status, _, _) = public_request(TestRequest::get().uri("/payments/callback"), m.configure()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, location, _) =
        public_request(TestRequest::get().uri("/payments/callback?reference=BZR-O9-unknown"), m.configure()).await;
    assert_eq!(status, StatusCode::FOUND);
    assert!(location.unwrap_or_default().contains("status=unknown"));
}

#[actix_web::test]
async fn registration_fees_use_the_same_payment_flow() {
    let m = Marketplace::new().await;
    let token = issue_token(BUYER, vec![Role::Buyer]);
    let (status, body) = post_request(&token, "/registrations", &json!({ "programme": "Pastry Arts" }), m.configure())
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let registration: Registration = serde_json::from_str(&body).unwrap();
    assert_eq!(registration.fee, Money::from(15_000));
    assert_eq!(registration.status, RegistrationStatus::Pending);

    let path = format!("/registrations/{}/payment", registration.id);
    let token_other = issue_token(OTHER_BUYER, vec![Role::Buyer]);
    let (status, _) = post_request(&token_other, &path, &json!({}), m.configure()).await.expect("Request failed");
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = post_request(&token, &path, &json!({}), m.configure()).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK, "{body}");
    let session: PaymentSessionResponse = serde_json::from_str(&body).unwrap();
    assert_eq!(session.amount, Money::from(15_000));

    m.gateway.complete(&session.reference, PaymentOutcome::Succeeded);
    let uri = format!("/payments/callback?reference={}", session.reference);
    let (status, location, _) = public_request(TestRequest::get().uri(&uri), m.configure()).await;
    assert_eq!(status, StatusCode::FOUND);
    let location = location.expect("redirect location");
    assert!(location.contains(&format!("registration_id={}", registration.id)), "{location}");
    assert!(location.contains("status=paid"), "{location}");
}

fn configure_with_failing_gateway(db: SqliteDatabase) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg: &mut ServiceConfig| {
        let mut gateway = MockGateway::new();
        gateway.expect_initialize().returning(|_| Err(GatewayError::Timeout));
        let sessions_api = PaymentSessionApi::new(db, gateway);
        cfg.service(IssueOrderPaymentRoute::<SqliteDatabase, MockGateway>::new()).app_data(web::Data::new(sessions_api));
    }
}

#[actix_web::test]
async fn gateway_outage_is_a_retryable_error() {
    let m = Marketplace::new().await;
    let order = checkout(&m, json!([{ "product_id": 1, "quantity": 1 }])).await;
    let token = issue_token(BUYER, vec![Role::Buyer]);
    let path = format!("/orders/{}/payment", order.id);
    let (status, body) = post_request(&token, &path, &json!({}), configure_with_failing_gateway(m.db.clone()))
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE, "{body}");
    // Nothing was recorded, so the buyer can try again straight away
    let session = open_session(&m, order.id).await;
    assert_eq!(session.amount, order.total);
}

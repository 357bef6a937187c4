use actix_web::{http::StatusCode, web, web::ServiceConfig};
use bazaar_common::Money;
use bazaar_order_engine::{
    db_types::{Order, OrderItem, OrderStatusType, PaymentSession, PaymentTarget, SessionStatus, ShippingSnapshot, TargetKind},
    OrderQueryApi,
};
use chrono::{Duration, TimeZone, Utc};
use log::debug;

use super::{
    helpers::{get_request, issue_token, sign, BUYER, OTHER_BUYER, SELLER_A},
    mocks::MockOrderManager,
};
use crate::{
    auth::{JwtClaims, Role},
    routes::{MyOrderByIdRoute, MyOrderPaymentsRoute, MyOrdersRoute},
};

#[actix_web::test]
async fn fetch_my_orders_no_token() {
    let _ = env_logger::try_init().ok();
    let err = get_request("", "/orders", configure).await.expect_err("Expected error");
    assert_eq!(err, "No access token was provided.");
}

#[actix_web::test]
async fn fetch_my_orders() {
    let _ = env_logger::try_init().ok();
    let token = issue_token(BUYER, vec![Role::Buyer]);
    let (status, body) = get_request(&token, "/orders", configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let orders: Vec<Order> = serde_json::from_str(&body).unwrap();
    assert_eq!(orders, orders_response());
}

#[actix_web::test]
async fn fetch_my_orders_invalid_sig() {
    let _ = env_logger::try_init().ok();
    let mut token = issue_token(BUYER, vec![Role::Buyer]);
    token.replace_range(token.len() - 10..token.len() - 5, "AAAAA");
    debug!("Calling /orders with invalid token {token}");
    let err = get_request(&token, "/orders", configure).await.expect_err("Expected error");
    assert!(err.starts_with("Access token is not valid."), "{err}");
}

#[actix_web::test]
async fn fetch_my_orders_expired_token() {
    let _ = env_logger::try_init().ok();
    let claims =
        JwtClaims { sub: BUYER, roles: vec![Role::Buyer], email: None, exp: (Utc::now() - Duration::hours(2)).timestamp() };
    let err = get_request(&sign(&claims), "/orders", configure).await.expect_err("Expected error");
    assert!(err.starts_with("Access token is not valid."), "{err}");
}

#[actix_web::test]
async fn fetch_my_orders_garbage_token() {
    let _ = env_logger::try_init().ok();
    let err = get_request("not.a.jwt", "/orders", configure).await.expect_err("Expected error");
    assert!(err.starts_with("Access token is not in the correct format."), "{err}");
}

#[actix_web::test]
async fn sellers_cannot_use_buyer_routes() {
    let _ = env_logger::try_init().ok();
    let token = issue_token(SELLER_A, vec![Role::Seller]);
    let err = get_request(&token, "/orders", configure).await.expect_err("Request should have failed");
    assert_eq!(err, "Insufficient Permissions. This action requires the buyer role");
}

#[actix_web::test]
async fn fetch_my_order_by_id() {
    let _ = env_logger::try_init().ok();
    let token = issue_token(BUYER, vec![Role::Buyer]);
    let (status, body) = get_request(&token, "/orders/1", configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let order: Order = serde_json::from_str(&body).unwrap();
    assert_eq!(order.id, 1);
    assert_eq!(order.items.len(), 1);
}

#[actix_web::test]
async fn someone_elses_order_is_not_found() {
    let _ = env_logger::try_init().ok();
    let token = issue_token(OTHER_BUYER, vec![Role::Buyer]);
    let (status, body) = get_request(&token, "/orders/1", configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, r#"{"error":"Order 1 does not exist"}"#);
}

#[actix_web::test]
async fn order_id_must_be_a_number() {
    let _ = env_logger::try_init().ok();
    let token = issue_token(BUYER, vec![Role::Buyer]);
    let (status, _) = get_request(&token, "/orders/first", configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn fetch_payment_history() {
    let _ = env_logger::try_init().ok();
    let token = issue_token(BUYER, vec![Role::Buyer]);
    let (status, body) = get_request(&token, "/orders/1/payments", configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let sessions: Vec<PaymentSession> = serde_json::from_str(&body).unwrap();
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[0].status, SessionStatus::Failed);
    assert_eq!(sessions[1].status, SessionStatus::Succeeded);
    let token = issue_token(OTHER_BUYER, vec![Role::Buyer]);
    let (status, _) = get_request(&token, "/orders/1/payments", configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::NOT_FOUND);
}

fn configure(cfg: &mut ServiceConfig) {
    let mut order_manager = MockOrderManager::new();
    order_manager.expect_fetch_orders_for_buyer().returning(|_| Ok(orders_response()));
    order_manager.expect_fetch_order().returning(|id| Ok(orders_response().into_iter().find(|o| o.id == id)));
    order_manager.expect_fetch_sessions_for_target().returning(|target| Ok(sessions_response(target)));
    let query_api = OrderQueryApi::new(order_manager);
    cfg.service(MyOrdersRoute::<MockOrderManager>::new())
        .service(MyOrderByIdRoute::<MockOrderManager>::new())
        .service(MyOrderPaymentsRoute::<MockOrderManager>::new())
        .app_data(web::Data::new(query_api));
}

// Mock response to `fetch_orders_for_buyer`
fn orders_response() -> Vec<Order> {
    let created_at = Utc.with_ymd_and_hms(2024, 2, 29, 13, 30, 0).unwrap();
    vec![
        Order {
            id: 1,
            buyer_id: BUYER,
            subtotal: Money::from(5_000),
            delivery_fee: Money::from(500),
            total: Money::from(5_500),
            currency: "NGN".to_string(),
            status: OrderStatusType::Paid,
            shipping: ShippingSnapshot { name: "Ada".into(), city: "Lagos".into(), ..Default::default() },
            payment_reference: Some("BZR-O1-abcdefghij".into()),
            payment_metadata: None,
            tracking_number: None,
            cancellation_reason: None,
            delivered_at: None,
            created_at,
            updated_at: created_at,
            items: vec![OrderItem {
                id: 1,
                order_id: 1,
                product_id: 1,
                seller_id: SELLER_A,
                quantity: 2,
                unit_price: Money::from(2_500),
            }],
        },
        Order {
            id: 2,
            buyer_id: BUYER,
            subtotal: Money::from(1_000),
            delivery_fee: Money::from(500),
            total: Money::from(1_500),
            currency: "NGN".to_string(),
            status: OrderStatusType::Cancelled,
            shipping: ShippingSnapshot::default(),
            payment_reference: None,
            payment_metadata: None,
            tracking_number: None,
            cancellation_reason: Some("Changed my mind".into()),
            delivered_at: None,
            created_at,
            updated_at: Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
            items: vec![],
        },
    ]
}

fn sessions_response(target: PaymentTarget) -> Vec<PaymentSession> {
    let created_at = Utc.with_ymd_and_hms(2024, 2, 29, 13, 35, 0).unwrap();
    let session = |id: i64, reference: &str, status: SessionStatus| PaymentSession {
        id,
        reference: reference.into(),
        target_kind: TargetKind::Order,
        target_id: target.id(),
        amount: Money::from(5_500),
        currency: "NGN".into(),
        status,
        authorization_url: Some(format!("https://checkout.gateway.test/{reference}")),
        created_at,
        updated_at: created_at,
    };
    vec![session(1, "BZR-O1-aaaaaaaaaa", SessionStatus::Failed), session(2, "BZR-O1-abcdefghij", SessionStatus::Succeeded)]
}

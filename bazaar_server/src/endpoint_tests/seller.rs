use actix_web::{http::StatusCode, test::TestRequest};
use bazaar_order_engine::db_types::{Order, OrderStatusType, PaymentOutcome};
use serde_json::json;

use super::helpers::{
    get_request,
    issue_token,
    patch_request,
    post_request,
    public_request,
    Marketplace,
    ADMIN,
    BUYER,
    SELLER_A,
    SELLER_B,
};
use crate::{auth::Role, data_objects::PaymentSessionResponse};

/// Checks out product 1 (seller A) and pays for it through the callback.
async fn paid_order(m: &Marketplace) -> Order {
    let token = issue_token(BUYER, vec![Role::Buyer]);
    let items = json!({ "items": [{ "product_id": 1, "quantity": 1 }] });
    let (status, body) = post_request(&token, "/orders", &items, m.configure()).await.expect("Request failed");
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let order: Order = serde_json::from_str(&body).unwrap();
    let path = format!("/orders/{}/payment", order.id);
    let (status, body) = post_request(&token, &path, &json!({}), m.configure()).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK, "{body}");
    let session: PaymentSessionResponse = serde_json::from_str(&body).unwrap();
    m.gateway.complete(&session.reference, PaymentOutcome::Succeeded);
    let uri = format!("/payments/callback?reference={}", session.reference);
    let (status, _, _) = public_request(TestRequest::get().uri(&uri), m.configure()).await;
    assert_eq!(status, StatusCode::FOUND);
    Order { status: OrderStatusType::Paid, ..order }
}

async fn move_order(m: &Marketplace, seller: i64, order_id: i64, body: serde_json::Value) -> (StatusCode, String) {
    let token = issue_token(seller, vec![Role::Seller]);
    let path = format!("/seller/orders/{order_id}/status");
    patch_request(&token, &path, &body, m.configure()).await.expect("Request failed")
}

#[actix_web::test]
async fn sellers_only_see_orders_with_their_products() {
    let m = Marketplace::new().await;
    let order = paid_order(&m).await;
    let token = issue_token(SELLER_A, vec![Role::Seller]);
    let (status, body) = get_request(&token, "/seller/orders", m.configure()).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let orders: Vec<Order> = serde_json::from_str(&body).unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].id, order.id);
    assert_eq!(orders[0].status, OrderStatusType::Paid);

    let token = issue_token(SELLER_B, vec![Role::Seller]);
    let (status, body) = get_request(&token, "/seller/orders", m.configure()).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "[]");
}

#[actix_web::test]
async fn buyers_cannot_use_seller_routes() {
    let m = Marketplace::new().await;
    let token = issue_token(BUYER, vec![Role::Buyer]);
    let err = get_request(&token, "/seller/orders", m.configure()).await.expect_err("Request should have failed");
    assert_eq!(err, "Insufficient Permissions. This action requires the seller role");
}

#[actix_web::test]
async fn fulfil_an_order() {
    let m = Marketplace::new().await;
    let order = paid_order(&m).await;

    let (status, body) = move_order(&m, SELLER_A, order.id, json!({ "status": "processing" })).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let (status, body) =
        move_order(&m, SELLER_A, order.id, json!({ "status": "shipped", "tracking_number": "GIG-55012" })).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let shipped: Order = serde_json::from_str(&body).unwrap();
    assert_eq!(shipped.status, OrderStatusType::Shipped);
    assert_eq!(shipped.tracking_number.as_deref(), Some("GIG-55012"));

    let (status, body) = move_order(&m, SELLER_A, order.id, json!({ "status": "delivered" })).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let delivered: Order = serde_json::from_str(&body).unwrap();
    assert!(delivered.delivered_at.is_some());

    // Delivered is terminal
    let (status, _) = move_order(&m, SELLER_A, order.id, json!({ "status": "cancelled" })).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[actix_web::test]
async fn sellers_cannot_touch_unpaid_or_foreign_orders() {
    let m = Marketplace::new().await;
    let token = issue_token(BUYER, vec![Role::Buyer]);
    let items = json!({ "items": [{ "product_id": 1, "quantity": 1 }] });
    let (_, body) = post_request(&token, "/orders", &items, m.configure()).await.expect("Request failed");
    let pending: Order = serde_json::from_str(&body).unwrap();

    let (status, _) = move_order(&m, SELLER_A, pending.id, json!({ "status": "processing" })).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = move_order(&m, SELLER_B, pending.id, json!({ "status": "cancelled" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = move_order(&m, SELLER_A, 4_040, json!({ "status": "processing" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let paid = paid_order(&m).await;
    let (status, _) = move_order(&m, SELLER_B, paid.id, json!({ "status": "processing" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn nobody_marks_orders_paid_by_hand() {
    let m = Marketplace::new().await;
    let token = issue_token(BUYER, vec![Role::Buyer]);
    let items = json!({ "items": [{ "product_id": 1, "quantity": 1 }] });
    let (_, body) = post_request(&token, "/orders", &items, m.configure()).await.expect("Request failed");
    let pending: Order = serde_json::from_str(&body).unwrap();

    let (status, _) = move_order(&m, SELLER_A, pending.id, json!({ "status": "paid" })).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let token = issue_token(ADMIN, vec![Role::Admin]);
    let path = format!("/admin/orders/{}/status", pending.id);
    let (status, _) = patch_request(&token, &path, &json!({ "status": "paid" }), m.configure())
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::CONFLICT);
}

#[actix_web::test]
async fn admins_can_cancel_any_order() {
    let m = Marketplace::new().await;
    let order = paid_order(&m).await;
    let path = format!("/admin/orders/{}/status", order.id);

    let token = issue_token(SELLER_A, vec![Role::Seller]);
    let err = patch_request(&token, &path, &json!({ "status": "cancelled" }), m.configure())
        .await
        .expect_err("Request should have failed");
    assert_eq!(err, "Insufficient Permissions. This action requires the admin role");

    let token = issue_token(ADMIN, vec![Role::Admin]);
    let (status, body) =
        patch_request(&token, &path, &json!({ "status": "cancelled", "reason": "Out of stock" }), m.configure())
            .await
            .expect("Request failed");
    assert_eq!(status, StatusCode::OK, "{body}");
    let cancelled: Order = serde_json::from_str(&body).unwrap();
    assert_eq!(cancelled.status, OrderStatusType::Cancelled);
    assert_eq!(cancelled.cancellation_reason.as_deref(), Some("Out of stock"));
}

#[actix_web::test]
async fn unknown_statuses_are_rejected() {
    let m = Marketplace::new().await;
    let order = paid_order(&m).await;
    let (status, body) = move_order(&m, SELLER_A, order.id, json!({ "status": "teleported" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.starts_with(r#"{"error":"Invalid request body."#), "{body}");
}

use std::str::FromStr;

use bazaar_common::Money;
use bazaar_order_engine::{
    db_types::{OrderStatusType, PaymentChannel, PaymentOutcome},
    order_objects::{Settlement, TransitionDetails},
};
use cucumber::{given, then, when};

use crate::{cucumber::MarketplaceWorld, support::EMAIL};

fn money(s: &str) -> Money {
    Money::from_str(s).expect("Not a valid amount")
}

#[given(expr = "seller {int} lists product {int} at {word}")]
async fn list_product(world: &mut MarketplaceWorld, seller_id: i64, product_id: i64, price: String) {
    world.system().catalog.add_product(product_id, seller_id, money(&price)).await;
}

#[when(expr = "the price of product {int} changes to {word}")]
async fn change_price(world: &mut MarketplaceWorld, product_id: i64, price: String) {
    world.system().catalog.set_price(product_id, money(&price)).await;
}

#[when(expr = "buyer {int} checks out {int} of product {int}")]
async fn checkout(world: &mut MarketplaceWorld, buyer_id: i64, quantity: i64, product_id: i64) {
    let order = world.system().checkout(buyer_id, &[(product_id, quantity)]).await;
    world.order = Some(order);
}

#[when(expr = "buyer {int} checks out {int} of product {int} and {int} of product {int}")]
async fn checkout_two_lines(
    world: &mut MarketplaceWorld,
    buyer_id: i64,
    qty_a: i64,
    product_a: i64,
    qty_b: i64,
    product_b: i64,
) {
    let order = world.system().checkout(buyer_id, &[(product_a, qty_a), (product_b, qty_b)]).await;
    world.order = Some(order);
}

#[when("the buyer requests a payment session")]
async fn request_session(world: &mut MarketplaceWorld) {
    let order = world.order().clone();
    let result = world.system().sessions.issue_for_order(order.buyer_id, order.id, EMAIL).await;
    match result {
        Ok(session) => world.session = Some(session),
        Err(e) => world.last_error = Some(e),
    }
}

#[when(expr = "the gateway reports the payment as {word}")]
async fn gateway_outcome(world: &mut MarketplaceWorld, outcome: String) {
    let outcome = match outcome.as_str() {
        "successful" => PaymentOutcome::Succeeded,
        "failed" => PaymentOutcome::Failed,
        s => panic!("Unknown payment outcome {s}"),
    };
    let reference = world.session().reference.clone();
    world.system().gateway.complete(&reference, outcome);
}

#[when(expr = "the {word} payment webhook arrives")]
async fn webhook_arrives(world: &mut MarketplaceWorld, kind: String) {
    let outcome = if kind == "success" { PaymentOutcome::Succeeded } else { PaymentOutcome::Failed };
    let reference = world.session().reference.clone();
    let (body, signature) = world.system().gateway.webhook(&reference, outcome);
    let result = world.system().reconciler.process_webhook(&body, &signature).await;
    world.last_result = Some(result.map(|r| r.expect("Webhook was ignored")));
}

#[when("a webhook arrives with a forged signature")]
async fn forged_webhook(world: &mut MarketplaceWorld) {
    let reference = world.session().reference.clone();
    let (body, _) = world.system().gateway.webhook(&reference, PaymentOutcome::Succeeded);
    let signature = bazaar_common::signature::calculate_signature(b"forged", &body).expect("signature");
    let result = world.system().reconciler.process_webhook(&body, &signature).await;
    world.last_result = Some(result.map(|r| r.expect("Webhook was ignored")));
}

#[when("the buyer returns through the payment callback")]
async fn callback(world: &mut MarketplaceWorld) {
    let reference = world.session().reference.clone();
    let result = world.system().reconciler.handle_callback(&reference).await;
    world.last_result = Some(result);
}

#[when("the app verifies the payment")]
async fn verify(world: &mut MarketplaceWorld) {
    let reference = world.session().reference.clone();
    let result = world.system().reconciler.verify(&reference, PaymentChannel::Verify).await;
    world.last_result = Some(result);
}

#[when(expr = "seller {int} marks the order as {word}")]
async fn seller_updates(world: &mut MarketplaceWorld, seller_id: i64, status: String) {
    seller_update(world, seller_id, status, TransitionDetails::default()).await;
}

#[when(expr = "seller {int} marks the order as shipped with tracking number {string}")]
async fn seller_ships(world: &mut MarketplaceWorld, seller_id: i64, tracking: String) {
    let details = TransitionDetails::default().with_tracking_number(tracking);
    seller_update(world, seller_id, "shipped".into(), details).await;
}

async fn seller_update(world: &mut MarketplaceWorld, seller_id: i64, status: String, details: TransitionDetails) {
    let status = OrderStatusType::from_str(&status).expect("Not a valid order status");
    let order_id = world.order().id;
    let result = world.system().fulfillment.update_status(seller_id, order_id, status, details).await;
    match result {
        Ok(order) => {
            world.order = Some(order);
            world.last_error = None;
        },
        Err(e) => world.last_error = Some(e),
    }
}

#[then(expr = "the order is {word} with a total of {word}")]
async fn order_status_and_total(world: &mut MarketplaceWorld, status: String, total: String) {
    let order = world.system().order(world.order().id).await;
    assert_eq!(order.status.to_string(), status);
    assert_eq!(order.total, money(&total));
}

#[then(expr = "the order is {word}")]
async fn order_status(world: &mut MarketplaceWorld, status: String) {
    let order = world.system().order(world.order().id).await;
    assert_eq!(order.status.to_string(), status);
}

#[then(expr = "the order line for product {int} is priced at {word}")]
async fn line_price(world: &mut MarketplaceWorld, product_id: i64, price: String) {
    let order = world.system().order(world.order().id).await;
    let line = order.items.iter().find(|i| i.product_id == product_id).expect("No such line");
    assert_eq!(line.unit_price, money(&price));
}

#[then(expr = "the session asks for {int} minor units")]
async fn session_amount(world: &mut MarketplaceWorld, amount: i64) {
    assert_eq!(world.session().amount, Money::from(amount));
}

#[then(expr = "the payment is {word}")]
async fn settlement(world: &mut MarketplaceWorld, expected: String) {
    let result = world.last_result.as_ref().expect("Nothing was reconciled");
    let settlement = result.as_ref().expect("Reconciliation failed").settlement;
    let expected = match expected.as_str() {
        "applied" => Settlement::Applied,
        "already_applied" => Settlement::AlreadyApplied,
        "failed" => Settlement::FailureRecorded,
        "unchanged" => Settlement::NoChange,
        s => panic!("Unknown settlement {s}"),
    };
    assert_eq!(settlement, expected);
}

#[then(expr = "the webhook is rejected as {word}")]
async fn webhook_rejected(world: &mut MarketplaceWorld, reason: String) {
    let result = world.last_result.as_ref().expect("Nothing was reconciled");
    let err = result.as_ref().expect_err("The webhook was accepted");
    assert_eq!(reason, "unauthenticated");
    assert!(matches!(err, bazaar_order_engine::traits::OrderFlowError::InvalidSignature));
}

#[then(expr = "the order paid notification was sent {int} time(s)")]
async fn paid_notifications(world: &mut MarketplaceWorld, count: usize) {
    world.system().events.settle().await;
    assert_eq!(world.system().events.paid_count(), count);
}

#[then(expr = "the order has tracking number {string}")]
async fn tracking_number(world: &mut MarketplaceWorld, tracking: String) {
    let order = world.system().order(world.order().id).await;
    assert_eq!(order.tracking_number.as_deref(), Some(tracking.as_str()));
}

#[then(expr = "the request is refused because {string}")]
async fn refused(world: &mut MarketplaceWorld, message: String) {
    let err = world.last_error.as_ref().expect("The request was not refused");
    assert!(err.to_string().contains(&message), "'{err}' does not mention '{message}'");
}

use actix_web::{
    body::MessageBody,
    http::{header, StatusCode},
    test,
    test::TestRequest,
    web::ServiceConfig,
    App,
};
use bazaar_common::Money;
use bazaar_order_engine::{
    events::EventProducers,
    test_utils::{prepare_env::new_test_db, FakeGateway, StaticCatalog},
    traits::FlatDeliveryFee,
    FulfillmentApi,
    OrderLedgerApi,
    OrderQueryApi,
    PaymentSessionApi,
    ReconciliationApi,
    RegistrationApi,
    SqliteDatabase,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use log::debug;
use serde::Serialize;

use crate::{
    auth::{JwtClaims, Role},
    config::{AuthConfig, ServerOptions},
    middleware::JwtMiddlewareFactory,
    routes::{
        json_config,
        AdminUpdateStatusRoute,
        CancelMyOrderRoute,
        CreateOrderRoute,
        CreateRegistrationRoute,
        IssueOrderPaymentRoute,
        IssueRegistrationPaymentRoute,
        MyOrderByIdRoute,
        MyOrderPaymentsRoute,
        MyOrdersRoute,
        PaymentCallbackRoute,
        PaymentWebhookRoute,
        SellerOrdersRoute,
        SellerUpdateStatusRoute,
        VerifyPaymentRoute,
    },
};

// DO NOT re-use this secret anywhere.
const TEST_JWT_SECRET: &str = "endpoint-tests-only-8f1c2a9d4e7b6035c1d2e3f4";

pub const BUYER: i64 = 1;
pub const OTHER_BUYER: i64 = 2;
pub const SELLER_A: i64 = 10;
pub const SELLER_B: i64 = 20;
pub const ADMIN: i64 = 99;

pub const REDIRECT_URL: &str = "https://app.bazaar.test/payments";

pub fn get_auth_config() -> AuthConfig {
    AuthConfig::new(TEST_JWT_SECRET).expect("test secret is long enough")
}

pub fn issue_token(user_id: i64, roles: Vec<Role>) -> String {
    let claims = JwtClaims {
        sub: user_id,
        roles,
        email: Some(format!("user{user_id}@bazaar.test")),
        exp: (Utc::now() + Duration::days(1)).timestamp(),
    };
    sign(&claims)
}

pub fn sign(claims: &JwtClaims) -> String {
    encode(&Header::default(), claims, &EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()))
        .expect("Failed to sign token")
}

pub async fn get_request<F>(token: &str, path: &str, configure: F) -> Result<(StatusCode, String), String>
where F: FnOnce(&mut ServiceConfig) {
    authenticated_request(token, TestRequest::get().uri(path), configure).await
}

pub async fn post_request<F, T>(token: &str, path: &str, body: &T, configure: F) -> Result<(StatusCode, String), String>
where
    F: FnOnce(&mut ServiceConfig),
    T: Serialize,
{
    authenticated_request(token, TestRequest::post().uri(path).set_json(body), configure).await
}

pub async fn patch_request<F, T>(token: &str, path: &str, body: &T, configure: F) -> Result<(StatusCode, String), String>
where
    F: FnOnce(&mut ServiceConfig),
    T: Serialize,
{
    authenticated_request(token, TestRequest::patch().uri(path).set_json(body), configure).await
}

/// Sends `req` through an app whose every route sits behind the access token middleware.
///
/// Errors raised by middleware (missing tokens, missing roles) come back as `Err` with the error message. Handler
/// errors are rendered into responses and come back as `Ok`.
pub async fn authenticated_request<F>(
    token: &str,
    mut req: TestRequest,
    configure: F,
) -> Result<(StatusCode, String), String>
where
    F: FnOnce(&mut ServiceConfig),
{
    if !token.is_empty() {
        req = req.insert_header((header::AUTHORIZATION, format!("Bearer {token}")));
    }
    let app = App::new().wrap(JwtMiddlewareFactory::new(&get_auth_config())).configure(configure);
    let service = test::init_service(app).await;
    debug!("Making request");
    let (_, res) = test::try_call_service(&service, req.to_request()).await.map_err(|e| e.to_string())?.into_parts();
    let status = res.status();
    let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
    Ok((status, body))
}

/// Sends `req` to an app without the access token middleware. Returns the status, the `Location` header and the body.
pub async fn public_request<F>(req: TestRequest, configure: F) -> (StatusCode, Option<String>, String)
where F: FnOnce(&mut ServiceConfig) {
    let app = App::new().configure(configure);
    let service = test::init_service(app).await;
    let res = test::call_service(&service, req.to_request()).await;
    let status = res.status();
    let location = res.headers().get(header::LOCATION).and_then(|v| v.to_str().ok()).map(String::from);
    let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
    (status, location, body)
}

/// A marketplace backed by a fresh sqlite database, an in-memory catalog and a scriptable gateway.
///
/// Product 1 (2,500) is sold by seller A and product 2 (1,000) by seller B. Delivery is a flat 500.
pub struct Marketplace {
    pub db: SqliteDatabase,
    pub catalog: StaticCatalog,
    pub gateway: FakeGateway,
}

impl Marketplace {
    pub async fn new() -> Self {
        let db = new_test_db().await;
        let catalog = StaticCatalog::new();
        catalog.add_product(1, SELLER_A, Money::from(2_500)).await;
        catalog.add_product(2, SELLER_B, Money::from(1_000)).await;
        Self { db, catalog, gateway: FakeGateway::default() }
    }

    pub fn configure(&self) -> impl FnOnce(&mut ServiceConfig) {
        let db = self.db.clone();
        let catalog = self.catalog.clone();
        let gateway = self.gateway.clone();
        move |cfg: &mut ServiceConfig| {
            let producers = EventProducers::default();
            let ledger_api = OrderLedgerApi::new(db.clone(), catalog, producers.clone())
                .with_delivery_policy(FlatDeliveryFee(Money::from(500)));
            let sessions_api = PaymentSessionApi::new(db.clone(), gateway.clone())
                .with_callback_url("https://api.bazaar.test/payments/callback");
            let reconciliation_api = ReconciliationApi::new(db.clone(), gateway, producers.clone());
            let fulfillment_api = FulfillmentApi::new(db.clone(), producers);
            let registration_api = RegistrationApi::new(db.clone(), Money::from(15_000));
            let options =
                ServerOptions { use_x_forwarded_for: true, use_forwarded: false, redirect_url: REDIRECT_URL.into() };
            cfg.app_data(actix_web::web::Data::new(ledger_api))
                .app_data(actix_web::web::Data::new(sessions_api))
                .app_data(actix_web::web::Data::new(reconciliation_api))
                .app_data(actix_web::web::Data::new(fulfillment_api))
                .app_data(actix_web::web::Data::new(registration_api))
                .app_data(actix_web::web::Data::new(OrderQueryApi::new(db)))
                .app_data(actix_web::web::Data::new(options))
                .app_data(json_config())
                .service(CreateOrderRoute::<SqliteDatabase, StaticCatalog>::new())
                .service(MyOrdersRoute::<SqliteDatabase>::new())
                .service(MyOrderByIdRoute::<SqliteDatabase>::new())
                .service(MyOrderPaymentsRoute::<SqliteDatabase>::new())
                .service(CancelMyOrderRoute::<SqliteDatabase, StaticCatalog>::new())
                .service(IssueOrderPaymentRoute::<SqliteDatabase, FakeGateway>::new())
                .service(CreateRegistrationRoute::<SqliteDatabase>::new())
                .service(IssueRegistrationPaymentRoute::<SqliteDatabase, FakeGateway>::new())
                .service(VerifyPaymentRoute::<SqliteDatabase, FakeGateway>::new())
                .service(PaymentCallbackRoute::<SqliteDatabase, FakeGateway>::new())
                .service(PaymentWebhookRoute::<SqliteDatabase, FakeGateway>::new())
                .service(SellerOrdersRoute::<SqliteDatabase>::new())
                .service(SellerUpdateStatusRoute::<SqliteDatabase>::new())
                .service(AdminUpdateStatusRoute::<SqliteDatabase>::new());
        }
    }
}

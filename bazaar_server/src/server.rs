use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use bazaar_order_engine::{
    events::{EventHandlers, EventProducers},
    traits::FlatDeliveryFee,
    FulfillmentApi,
    OrderLedgerApi,
    OrderQueryApi,
    PaymentSessionApi,
    ReconciliationApi,
    RegistrationApi,
    SqliteDatabase,
};
use log::*;

use crate::{
    config::{ServerConfig, ServerOptions},
    errors::ServerError,
    integrations::{catalog::HttpCatalog, gateway::GatewayAdapter},
    middleware::JwtMiddlewareFactory,
    notifier::Notifier,
    routes::{
        health,
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

const EVENT_BUFFER_SIZE: usize = 25;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    info!("🗃️ Database migrations are up to date");
    let notifier = Notifier::new(config.notification_url.clone());
    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, notifier.hooks());
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let srv = create_server_instance(config, db, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let gateway = GatewayAdapter::new(config.gateway.clone())
        .map_err(|e| ServerError::InitializeError(format!("Could not create the gateway client. {e}")))?;
    let catalog = HttpCatalog::new(&config.catalog_url)
        .map_err(|e| ServerError::InitializeError(format!("Could not create the catalog client. {e}")))?;
    let options = ServerOptions::from_config(&config);
    let srv = HttpServer::new(move || {
        let checkout = &config.checkout;
        let ledger_api = OrderLedgerApi::new(db.clone(), catalog.clone(), producers.clone())
            .with_delivery_policy(FlatDeliveryFee(checkout.delivery_fee))
            .with_currency(checkout.currency.as_str());
        let mut sessions_api = PaymentSessionApi::new(db.clone(), gateway.clone())
            .with_reference_prefix(checkout.reference_prefix.as_str())
            .with_gateway_timeout(config.gateway.timeout);
        if let Some(url) = &config.callback_url {
            sessions_api = sessions_api.with_callback_url(url.as_str());
        }
        let reconciliation_api = ReconciliationApi::new(db.clone(), gateway.clone(), producers.clone())
            .with_gateway_timeout(config.gateway.timeout);
        let fulfillment_api = FulfillmentApi::new(db.clone(), producers.clone());
        let registration_api = RegistrationApi::new(db.clone(), checkout.registration_fee);
        let query_api = OrderQueryApi::new(db.clone());
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("bazaar::access_log"))
            .app_data(web::Data::new(ledger_api))
            .app_data(web::Data::new(sessions_api))
            .app_data(web::Data::new(reconciliation_api))
            .app_data(web::Data::new(fulfillment_api))
            .app_data(web::Data::new(registration_api))
            .app_data(web::Data::new(query_api))
            .app_data(web::Data::new(options.clone()))
            .app_data(json_config());
        // Routes that require authentication
        let auth_scope = web::scope("/api")
            .wrap(JwtMiddlewareFactory::new(&config.auth))
            .service(CreateOrderRoute::<SqliteDatabase, HttpCatalog>::new())
            .service(MyOrdersRoute::<SqliteDatabase>::new())
            .service(MyOrderByIdRoute::<SqliteDatabase>::new())
            .service(MyOrderPaymentsRoute::<SqliteDatabase>::new())
            .service(CancelMyOrderRoute::<SqliteDatabase, HttpCatalog>::new())
            .service(IssueOrderPaymentRoute::<SqliteDatabase, GatewayAdapter>::new())
            .service(CreateRegistrationRoute::<SqliteDatabase>::new())
            .service(IssueRegistrationPaymentRoute::<SqliteDatabase, GatewayAdapter>::new())
            .service(VerifyPaymentRoute::<SqliteDatabase, GatewayAdapter>::new())
            .service(SellerOrdersRoute::<SqliteDatabase>::new())
            .service(SellerUpdateStatusRoute::<SqliteDatabase>::new())
            .service(AdminUpdateStatusRoute::<SqliteDatabase>::new());
        // The gateway and the buyer's browser cannot present an access token. Both of these re-verify with the
        // gateway or check a signature before anything is applied.
        app.service(health)
            .service(PaymentCallbackRoute::<SqliteDatabase, GatewayAdapter>::new())
            .service(PaymentWebhookRoute::<SqliteDatabase, GatewayAdapter>::new())
            .service(auth_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}

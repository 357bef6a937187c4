//! Request handler definitions
//!
//! Define each route and its handler here. Handlers that are more than a line or two should lean on the engine API and
//! keep only request decoding and response shaping here.
//!
//! All handlers are async. Every database and gateway call is awaited, so a slow gateway never blocks a worker
//! thread, and gateway calls are bounded by the engine's gateway timeout.
use actix_web::{get, http::header, web, HttpRequest, HttpResponse, Responder};
use bazaar_order_engine::{
    db_types::{PaymentChannel, PaymentTarget},
    traits::{
        CatalogPriceResolver,
        GatewayError,
        OrderFlowDatabase,
        OrderFlowError,
        OrderManagement,
        PaymentBackend,
        PaymentGateway,
    },
    FulfillmentApi,
    OrderLedgerApi,
    OrderQueryApi,
    PaymentSessionApi,
    ReconciliationApi,
    RegistrationApi,
};
use gateway_tools::WEBHOOK_SIGNATURE_HEADER;
use log::*;

use crate::{
    auth::{JwtClaims, Role},
    config::ServerOptions,
    data_objects::{
        CallbackParams,
        CancelOrderRequest,
        JsonResponse,
        NewOrderRequest,
        NewRegistrationRequest,
        PaymentSessionResponse,
        StatusUpdateRequest,
    },
    errors::ServerError,
    helpers::{get_remote_ip, redirect_with_params},
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro.
// Each trait bound becomes a generic parameter of the route, in the order given.
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ident),+ where requires [$($roles:expr),+]) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>)
                    .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:ident),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

/// Malformed JSON bodies are reported in the same `{"error": ...}` shape as every other error.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, req| {
        debug!("💻️ Rejected request body for {}. {err}", req.path());
        ServerError::InvalidRequestBody(err.to_string()).into()
    })
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(create_order => Post "/orders" impl OrderFlowDatabase, CatalogPriceResolver where requires [Role::Buyer]);
/// Checks out the buyer's cart.
///
/// The body carries product ids and quantities only. Prices come from the catalog, never from the client. Either the
/// whole order is created, or nothing is.
pub async fn create_order<B, C>(
    claims: JwtClaims,
    api: web::Data<OrderLedgerApi<B, C>>,
    body: web::Json<NewOrderRequest>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderFlowDatabase,
    C: CatalogPriceResolver,
{
    let NewOrderRequest { items, shipping } = body.into_inner();
    debug!("💻️ POST create order for buyer #{} with {} lines", claims.sub, items.len());
    let order = api.create_order(claims.user_id(), &items, shipping).await.map_err(|e| {
        debug!("💻️ Could not create order for buyer #{}. {e}", claims.sub);
        e
    })?;
    Ok(HttpResponse::Created().json(order))
}

route!(my_orders => Get "/orders" impl OrderManagement where requires [Role::Buyer]);
pub async fn my_orders<B: OrderManagement>(
    claims: JwtClaims,
    api: web::Data<OrderQueryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET my_orders for buyer #{}", claims.sub);
    let orders = api.orders_for_buyer(claims.user_id()).await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(my_order_by_id => Get "/orders/{id}" impl OrderManagement where requires [Role::Buyer]);
pub async fn my_order_by_id<B: OrderManagement>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<OrderQueryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ GET order #{order_id} for buyer #{}", claims.sub);
    let order = api.order_for_buyer(claims.user_id(), order_id).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(my_order_payments => Get "/orders/{id}/payments" impl OrderManagement where requires [Role::Buyer]);
/// The payment sessions that have been opened for one of the buyer's orders, oldest first.
pub async fn my_order_payments<B: OrderManagement>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<OrderQueryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ GET payment sessions for order #{order_id}");
    let order = api.order_for_buyer(claims.user_id(), order_id).await?;
    let sessions = api.sessions_for(PaymentTarget::Order(order.id)).await?;
    Ok(HttpResponse::Ok().json(sessions))
}

route!(cancel_my_order => Patch "/orders/{id}/cancel" impl OrderFlowDatabase, CatalogPriceResolver where requires [Role::Buyer]);
/// A buyer cancels one of their own orders. Only pending orders can be cancelled this way.
pub async fn cancel_my_order<B, C>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<OrderLedgerApi<B, C>>,
    body: Option<web::Json<CancelOrderRequest>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderFlowDatabase,
    C: CatalogPriceResolver,
{
    let order_id = path.into_inner();
    let reason = body.and_then(|b| b.into_inner().reason);
    debug!("💻️ PATCH cancel order #{order_id} for buyer #{}", claims.sub);
    let order = api.cancel_order(claims.user_id(), order_id, reason).await?;
    Ok(HttpResponse::Ok().json(order))
}

//----------------------------------------------   Payments  ----------------------------------------------------
route!(issue_order_payment => Post "/orders/{id}/payment" impl OrderFlowDatabase, PaymentGateway where requires [Role::Buyer]);
/// Opens a payment session for one of the buyer's orders and returns the hosted payment page to send the buyer to.
pub async fn issue_order_payment<B, G>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<PaymentSessionApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderFlowDatabase,
    G: PaymentGateway,
{
    let order_id = path.into_inner();
    debug!("💻️ POST payment session for order #{order_id}");
    let session = api.issue_for_order(claims.user_id(), order_id, claims.email()).await.map_err(|e| {
        info!("💻️ Could not open a payment session for order #{order_id}. {e}");
        e
    })?;
    Ok(HttpResponse::Ok().json(PaymentSessionResponse::from(session)))
}

route!(verify_payment => Get "/payments/verify/{reference}" impl PaymentBackend, PaymentGateway);
/// Asks the gateway for the outcome of a payment and applies it. Safe to call any number of times.
///
/// Only the payer (or an admin) can verify a reference. Anyone else is told it does not exist.
pub async fn verify_payment<B, G>(
    claims: JwtClaims,
    path: web::Path<String>,
    api: web::Data<ReconciliationApi<B, G>>,
    queries: web::Data<OrderQueryApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentBackend,
    G: PaymentGateway,
{
    let reference = path.into_inner();
    debug!("💻️ GET verify payment {reference}");
    let payer = queries.payer_for_reference(&reference).await?;
    if payer != Some(claims.user_id()) && !claims.has_role(Role::Admin) {
        debug!("💻️ User #{} asked to verify {reference}, which is not theirs", claims.sub);
        return Err(OrderFlowError::ReferenceNotFound(reference).into());
    }
    let result = api.verify(&reference, PaymentChannel::Verify).await?;
    Ok(HttpResponse::Ok().json(result))
}

route!(payment_callback => Get "/payments/callback" impl PaymentBackend, PaymentGateway);
/// The gateway sends the buyer here after the hosted payment page.
///
/// The query string is not proof of anything. The payment is re-verified with the gateway, and the buyer is then
/// redirected to the client app with the result.
pub async fn payment_callback<B, G>(
    params: web::Query<CallbackParams>,
    api: web::Data<ReconciliationApi<B, G>>,
    options: web::Data<ServerOptions>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentBackend,
    G: PaymentGateway,
{
    let reference = params
        .reference()
        .ok_or_else(|| ServerError::InvalidRequestPath("The callback carries no payment reference".to_string()))?
        .to_string();
    debug!("💻️ GET payment callback for {reference}");
    let mut query = vec![("reference", reference.clone())];
    match api.handle_callback(&reference).await {
        Ok(result) => {
            let key = match result.target {
                PaymentTarget::Order(_) => "order_id",
                PaymentTarget::Registration(_) => "registration_id",
            };
            query.push(("status", result.status));
            query.push((key, result.target.id().to_string()));
        },
        Err(OrderFlowError::Gateway(GatewayError::Incomplete(_))) => {
            info!("💻️ Buyer returned before payment {reference} was complete");
            query.push(("status", "pending".to_string()));
        },
        Err(OrderFlowError::ReferenceNotFound(_)) => {
            warn!("💻️ Callback for unknown reference {reference}");
            query.push(("status", "unknown".to_string()));
        },
        Err(e) => {
            warn!("💻️ Could not verify payment {reference} on callback. {e}");
            query.push(("status", "error".to_string()));
        },
    }
    let location = redirect_with_params(&options.redirect_url, &query);
    Ok(HttpResponse::Found().insert_header((header::LOCATION, location)).finish())
}

route!(payment_webhook => Post "/payments/webhook" impl PaymentBackend, PaymentGateway);
/// Receives signed payment notifications from the gateway.
///
/// The signature is checked over the raw body before anything else happens. The gateway retries anything that is not
/// a 2xx, so events that were applied, or that can never be applied (unknown references, unsupported event types), are
/// acknowledged with a 200. Forged requests get a 400, and transient failures a 5xx so that the gateway tries again.
pub async fn payment_webhook<B, G>(
    req: HttpRequest,
    body: web::Bytes,
    api: web::Data<ReconciliationApi<B, G>>,
    options: web::Data<ServerOptions>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentBackend,
    G: PaymentGateway,
{
    let peer = get_remote_ip(&req, options.use_x_forwarded_for, options.use_forwarded);
    info!("💻️ Payment webhook received from {peer:?} ({} bytes)", body.len());
    let signature = req.headers().get(WEBHOOK_SIGNATURE_HEADER).and_then(|v| v.to_str().ok()).ok_or_else(|| {
        warn!("💻️ Webhook from {peer:?} carries no signature. Rejecting it.");
        OrderFlowError::InvalidSignature
    })?;
    match api.process_webhook(&body, signature).await {
        Ok(Some(result)) => {
            info!("💻️ Webhook for {} applied: {:?}", result.reference, result.settlement);
            Ok(HttpResponse::Ok().json(result))
        },
        Ok(None) => Ok(HttpResponse::Ok().json(JsonResponse::success("Event ignored"))),
        Err(OrderFlowError::ReferenceNotFound(reference)) => {
            info!("💻️ Webhook for unknown reference {reference} acknowledged");
            Ok(HttpResponse::Ok().json(JsonResponse::success("Unknown reference")))
        },
        Err(e) => {
            warn!("💻️ Could not process webhook from {peer:?}. {e}");
            Err(e.into())
        },
    }
}

//----------------------------------------------   Registrations  ----------------------------------------------------
route!(create_registration => Post "/registrations" impl OrderFlowDatabase where requires [Role::Buyer]);
pub async fn create_registration<B: OrderFlowDatabase>(
    claims: JwtClaims,
    api: web::Data<RegistrationApi<B>>,
    body: web::Json<NewRegistrationRequest>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ POST registration for applicant #{}", claims.sub);
    let registration = api.register(claims.user_id(), &body.programme).await?;
    Ok(HttpResponse::Created().json(registration))
}

route!(issue_registration_payment => Post "/registrations/{id}/payment" impl OrderFlowDatabase, PaymentGateway where requires [Role::Buyer]);
pub async fn issue_registration_payment<B, G>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<PaymentSessionApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderFlowDatabase,
    G: PaymentGateway,
{
    let registration_id = path.into_inner();
    debug!("💻️ POST payment session for registration #{registration_id}");
    let session = api.issue_for_registration(claims.user_id(), registration_id, claims.email()).await?;
    Ok(HttpResponse::Ok().json(PaymentSessionResponse::from(session)))
}

//----------------------------------------------   Fulfilment  ----------------------------------------------------
route!(seller_orders => Get "/seller/orders" impl OrderFlowDatabase where requires [Role::Seller]);
/// Orders that contain at least one of the seller's products.
pub async fn seller_orders<B: OrderFlowDatabase>(
    claims: JwtClaims,
    api: web::Data<FulfillmentApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET orders for seller #{}", claims.sub);
    let orders = api.orders_for_seller(claims.user_id()).await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(seller_update_status => Patch "/seller/orders/{id}/status" impl OrderFlowDatabase where requires [Role::Seller]);
/// Moves an order along the fulfilment state machine. The seller must have at least one item in the order; otherwise
/// the order is reported as not found.
pub async fn seller_update_status<B: OrderFlowDatabase>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<FulfillmentApi<B>>,
    body: web::Json<StatusUpdateRequest>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ PATCH order #{order_id} to {} by seller #{}", body.status, claims.sub);
    let order = api.update_status(claims.user_id(), order_id, body.status, body.details()).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(admin_update_status => Patch "/admin/orders/{id}/status" impl OrderFlowDatabase where requires [Role::Admin]);
/// Administrative override for order status. The state machine still applies, and orders are still only ever marked
/// paid by payment reconciliation.
pub async fn admin_update_status<B: OrderFlowDatabase>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<FulfillmentApi<B>>,
    body: web::Json<StatusUpdateRequest>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    warn!("💻️ Admin #{} is moving order #{order_id} to {}", claims.sub, body.status);
    let order = api.admin_update_status(order_id, body.status, body.details()).await?;
    Ok(HttpResponse::Ok().json(order))
}

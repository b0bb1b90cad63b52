//! Request handlers for the gateway's HTTP surface.
//!
//! Handlers are generic over the ledger, merchant lookup and settlement relay backends, which actix cannot register
//! directly. The `route!` macro generates a small `XxxRoute<...>` service factory for each handler that pins down the
//! generic parameters.
//!
//! Handlers run on actix worker threads, one request at a time per worker. Never block inside a handler. Every call
//! to the merchant service, the ledger or the bank must be awaited.
use std::marker::PhantomData;

use actix_web::{
    dev::{AppService, HttpServiceFactory, Service},
    get,
    guard,
    web,
    HttpResponse,
    Resource,
    ResponseError,
};
use futures::future::{ok, Either};
use log::*;
use payment_engine::{
    db_types::PaymentId,
    ledger_objects::PaymentRecord,
    payment_objects::{NewPaymentRequest, SettlementCallback},
    LedgerManagement,
    MerchantLookup,
    PaymentFlowApi,
    SettlementRelay,
};

use crate::{
    auth::MerchantCredentials,
    config::{ServerOptions, SettlementCallbackConfig},
    data_objects::CallbackAck,
    errors::{AuthError, ServerError},
    helpers::get_remote_ip,
    middleware::{HmacMiddlewareFactory, SETTLEMENT_HMAC_HEADER},
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
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

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> HttpResponse {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Payments  ----------------------------------------------------
route!(create_payment => Post "/payment" impl LedgerManagement, MerchantLookup, SettlementRelay);
/// Route handler for new payments.
///
/// The merchant authenticates with HTTP Basic credentials and posts the charge as JSON. The reply carries the
/// gateway's payment id, the payment's status and the settlement processor's message.
///
/// A merchant over its rate budget gets `429 Too Many Requests`. The payment is still recorded, and its id is included
/// in the error body.
pub async fn create_payment<L, M, S>(
    credentials: MerchantCredentials,
    body: web::Json<NewPaymentRequest>,
    api: web::Data<PaymentFlowApi<L, M, S>>,
) -> Result<HttpResponse, ServerError>
where
    L: LedgerManagement,
    M: MerchantLookup,
    S: SettlementRelay,
{
    trace!("💻️ Received new payment request from {}", credentials.username);
    let merchant = credentials.authenticate(api.as_ref()).await?;
    let result = api.create_payment(&merchant, body.into_inner()).await?;
    debug!("💻️ Payment {} for merchant {} is {}", result.id, merchant.id, result.status);
    Ok(HttpResponse::Ok().json(result))
}

route!(read_payment => Get "/payment/{id}" impl LedgerManagement, MerchantLookup, SettlementRelay);
/// Route handler for reading back a payment.
///
/// Merchants may only read their own payments. Reads count against the merchant's rate budget.
pub async fn read_payment<L, M, S>(
    credentials: MerchantCredentials,
    path: web::Path<String>,
    api: web::Data<PaymentFlowApi<L, M, S>>,
) -> Result<HttpResponse, ServerError>
where
    L: LedgerManagement,
    M: MerchantLookup,
    S: SettlementRelay,
{
    let merchant = credentials.authenticate(api.as_ref()).await?;
    let id = path.into_inner().parse::<PaymentId>().map_err(|e| ServerError::InvalidRequestPath(e.to_string()))?;
    debug!("💻️ GET payment {id} for merchant {}", merchant.id);
    if !api.admit(&merchant.id).await {
        info!("💻️ Merchant {} is over its rate budget. Refusing to read {id}", merchant.id);
        return Err(ServerError::RateLimited(None));
    }
    let payment = api.fetch_payment_for_merchant(&id, &merchant.id).await?;
    Ok(HttpResponse::Ok().json(PaymentRecord::from(payment)))
}

//----------------------------------------------   Settlement  ----------------------------------------------------
/// Route handler for the settlement processor's callback.
///
/// The reply always carries `{"acknowledge": bool}`. Only a callback that was applied to the ledger (or repeats an
/// outcome that was already applied) is acknowledged.
pub async fn settlement_callback<L, M, S>(body: web::Bytes, api: web::Data<PaymentFlowApi<L, M, S>>) -> HttpResponse
where
    L: LedgerManagement,
    M: MerchantLookup,
    S: SettlementRelay,
{
    let callback = match serde_json::from_slice::<SettlementCallback>(&body) {
        Ok(callback) => callback,
        Err(e) => {
            warn!("💻️ Could not parse settlement callback. {e}");
            return HttpResponse::BadRequest().json(CallbackAck::rejected());
        },
    };
    trace!("💻️ Received settlement callback for {}", callback.id);
    match api.process_settlement_callback(callback).await {
        Ok(payment) => {
            debug!("💻️ Settlement callback applied. Payment {} is {}", payment.id, payment.status);
            HttpResponse::Ok().json(CallbackAck::acknowledged())
        },
        Err(e) => {
            warn!("💻️ Settlement callback was not applied. {e}");
            let status = ServerError::from(e).status_code();
            HttpResponse::build(status).json(CallbackAck::rejected())
        },
    }
}

/// The `PUT /payment` resource, restricted to the settlement processor.
///
/// Callers must pass the IP whitelist (if one is configured) and then the HMAC check (if enabled).
pub struct SettlementCallbackRoute<L, M, S> {
    config: SettlementCallbackConfig,
    options: ServerOptions,
    _api: PhantomData<fn() -> (L, M, S)>,
}

impl<L, M, S> SettlementCallbackRoute<L, M, S> {
    pub fn new(config: SettlementCallbackConfig, options: ServerOptions) -> Self {
        Self { config, options, _api: PhantomData }
    }
}

impl<L, M, S> HttpServiceFactory for SettlementCallbackRoute<L, M, S>
where
    L: LedgerManagement + 'static,
    M: MerchantLookup + 'static,
    S: SettlementRelay + 'static,
{
    fn register(self, config: &mut AppService) {
        let SettlementCallbackConfig { whitelist, hmac_secret, hmac_checks } = self.config;
        let ServerOptions { use_x_forwarded_for, use_forwarded } = self.options;
        let res = Resource::new("/payment")
            .name("settlement_callback")
            .guard(guard::Put())
            .wrap(HmacMiddlewareFactory::new(SETTLEMENT_HMAC_HEADER, hmac_secret, hmac_checks))
            .wrap_fn(move |req, srv| {
                let peer_ip = get_remote_ip(req.request(), use_x_forwarded_for, use_forwarded);
                let whitelisted = match (peer_ip, &whitelist) {
                    (Some(ip), Some(whitelist)) => {
                        trace!("💻️ Settlement callback from {ip}");
                        whitelist.contains(&ip)
                    },
                    (_, None) => true,
                    (None, Some(_)) => {
                        warn!("💻️ No IP address found for settlement callback, denying access.");
                        false
                    },
                };
                if whitelisted {
                    Either::Left(srv.call(req))
                } else {
                    warn!("💻️ Settlement callback from {peer_ip:?} is not whitelisted, denying access.");
                    Either::Right(ok(req.error_response(ServerError::AuthenticationError(AuthError::ForbiddenPeer))))
                }
            })
            .to(settlement_callback::<L, M, S>);
        HttpServiceFactory::register(res, config);
    }
}

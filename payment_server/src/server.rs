use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::*;
use payment_engine::{LedgerManagement, MemoryLedger, MerchantLookup, PaymentFlowApi, SettlementRelay};

use crate::{
    config::{ServerConfig, ServerOptions, SettlementCallbackConfig},
    errors::ServerError,
    eviction_worker::start_eviction_worker,
    integrations::{BankClient, MerchantServiceClient},
    routes::{health, CreatePaymentRoute, ReadPaymentRoute, SettlementCallbackRoute},
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let merchants = MerchantServiceClient::new(&config.merchant_service_url, config.merchant_timeout)
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let bank = BankClient::new(&config.bank_url, config.settlement_timeout)
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let api = PaymentFlowApi::new(MemoryLedger::new(), merchants, bank, config.flow_options());
    if let Some(max_idle) = config.limiter_idle_timeout {
        // Intentionally not awaited. The worker lives as long as the server.
        let _handle = start_eviction_worker(api.admission().clone(), max_idle);
    }
    let srv = create_server_instance(config, api)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance<L, M, S>(config: ServerConfig, api: PaymentFlowApi<L, M, S>) -> Result<Server, ServerError>
where
    L: LedgerManagement + Send + Sync + 'static,
    M: MerchantLookup + Send + Sync + 'static,
    S: SettlementRelay + Send + Sync + 'static,
{
    let api = web::Data::new(api);
    let options = ServerOptions::from_config(&config);
    let settlement = config.settlement.clone();
    info!("💻️ Merchant service: {}. Settlement processor: {}", config.merchant_service_url, config.bank_url);
    let srv = HttpServer::new(move || {
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("pg::access_log"))
            .app_data(api.clone())
            .configure(configure_routes::<L, M, S>(settlement.clone(), options))
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}

/// Registers every gateway route, plus the extractor configuration they rely on.
///
/// The `PaymentFlowApi<L, M, S>` must be supplied separately as app data.
pub fn configure_routes<L, M, S>(
    settlement: SettlementCallbackConfig,
    options: ServerOptions,
) -> impl FnOnce(&mut web::ServiceConfig)
where
    L: LedgerManagement + 'static,
    M: MerchantLookup + 'static,
    S: SettlementRelay + 'static,
{
    move |cfg| {
        let json_config = web::JsonConfig::default().error_handler(|err, _req| {
            debug!("💻️ Rejecting request with an invalid body. {err}");
            ServerError::InvalidRequestBody(err.to_string()).into()
        });
        let path_config = web::PathConfig::default()
            .error_handler(|err, _req| ServerError::InvalidRequestPath(err.to_string()).into());
        cfg.app_data(json_config)
            .app_data(path_config)
            .service(health)
            .service(CreatePaymentRoute::<L, M, S>::new())
            .service(ReadPaymentRoute::<L, M, S>::new())
            .service(SettlementCallbackRoute::<L, M, S>::new(settlement, options));
    }
}

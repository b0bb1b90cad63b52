use std::{env, net::IpAddr, time::Duration};

use log::*;
use payment_engine::{AdmissionPolicy, FlowOptions};
use pg_common::{helpers::parse_boolean_flag, Secret};

const DEFAULT_PG_HOST: &str = "127.0.0.1";
const DEFAULT_PG_PORT: u16 = 8080;
const DEFAULT_MERCHANT_SERVICE_URL: &str = "http://127.0.0.1:8081";
const DEFAULT_BANK_URL: &str = "http://127.0.0.1:8082";
const DEFAULT_MERCHANT_TIMEOUT: Duration = Duration::from_millis(2_000);
const DEFAULT_SETTLEMENT_TIMEOUT: Duration = Duration::from_millis(10_000);
const DEFAULT_LIMITER_IDLE_TIMEOUT: Duration = Duration::from_secs(15 * 60);

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Base URL of the merchant service, e.g. `http://merchants.internal:8081`
    pub merchant_service_url: String,
    /// Base URL of the settlement processor (bank)
    pub bank_url: String,
    pub merchant_timeout: Duration,
    pub settlement_timeout: Duration,
    pub admission_policy: AdmissionPolicy,
    /// Merchants whose rate limiter has not been used for this long are forgotten. `None` disables eviction.
    pub limiter_idle_timeout: Option<Duration>,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_forwarded: bool,
    pub settlement: SettlementCallbackConfig,
}

/// Protection for the settlement callback route, which only the bank may call.
#[derive(Clone, Debug, Default)]
pub struct SettlementCallbackConfig {
    /// If supplied, callbacks are only accepted from these addresses.
    /// To explicitly disable the whitelist, set this to "false", "none", or "0".
    pub whitelist: Option<Vec<IpAddr>>,
    pub hmac_secret: Secret<String>,
    pub hmac_checks: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_PG_HOST.to_string(),
            port: DEFAULT_PG_PORT,
            merchant_service_url: DEFAULT_MERCHANT_SERVICE_URL.to_string(),
            bank_url: DEFAULT_BANK_URL.to_string(),
            merchant_timeout: DEFAULT_MERCHANT_TIMEOUT,
            settlement_timeout: DEFAULT_SETTLEMENT_TIMEOUT,
            admission_policy: AdmissionPolicy::FailOpen,
            limiter_idle_timeout: Some(DEFAULT_LIMITER_IDLE_TIMEOUT),
            use_x_forwarded_for: false,
            use_forwarded: false,
            settlement: SettlementCallbackConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("PG_HOST").ok().unwrap_or_else(|| DEFAULT_PG_HOST.into());
        let port = env::var("PG_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!("🪛️ {s} is not a valid port for PG_PORT. {e} Using the default, {DEFAULT_PG_PORT}, instead.");
                    DEFAULT_PG_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_PG_PORT);
        let merchant_service_url = env::var("PG_MERCHANT_SERVICE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ PG_MERCHANT_SERVICE_URL is not set. Using the default, {DEFAULT_MERCHANT_SERVICE_URL}.");
            DEFAULT_MERCHANT_SERVICE_URL.to_string()
        });
        let bank_url = env::var("PG_BANK_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ PG_BANK_URL is not set. Using the default, {DEFAULT_BANK_URL}.");
            DEFAULT_BANK_URL.to_string()
        });
        let merchant_timeout = duration_from_env("PG_MERCHANT_TIMEOUT_MS", Duration::from_millis, DEFAULT_MERCHANT_TIMEOUT);
        let settlement_timeout =
            duration_from_env("PG_SETTLEMENT_TIMEOUT_MS", Duration::from_millis, DEFAULT_SETTLEMENT_TIMEOUT);
        let fail_open = parse_boolean_flag(env::var("PG_ADMISSION_FAIL_OPEN").ok(), true);
        let admission_policy = AdmissionPolicy::from_fail_open_flag(fail_open);
        if !fail_open {
            info!("🪛️ Admission control is fail-closed. Merchants are rejected while the merchant service is down.");
        }
        let limiter_idle_timeout =
            match duration_from_env("PG_LIMITER_IDLE_TIMEOUT", Duration::from_secs, DEFAULT_LIMITER_IDLE_TIMEOUT) {
                d if d.is_zero() => {
                    info!("🪛️ Rate limiter eviction is disabled.");
                    None
                },
                d => Some(d),
            };
        let use_x_forwarded_for = parse_boolean_flag(env::var("PG_USE_X_FORWARDED_FOR").ok(), false);
        let use_forwarded = parse_boolean_flag(env::var("PG_USE_FORWARDED").ok(), false);
        let settlement = SettlementCallbackConfig::from_env_or_defaults();
        Self {
            host,
            port,
            merchant_service_url,
            bank_url,
            merchant_timeout,
            settlement_timeout,
            admission_policy,
            limiter_idle_timeout,
            use_x_forwarded_for,
            use_forwarded,
            settlement,
        }
    }

    pub fn flow_options(&self) -> FlowOptions {
        FlowOptions {
            admission_policy: self.admission_policy,
            merchant_timeout: self.merchant_timeout,
            settlement_timeout: self.settlement_timeout,
        }
    }
}

impl SettlementCallbackConfig {
    pub fn from_env_or_defaults() -> Self {
        let hmac_secret = env::var("PG_SETTLEMENT_HMAC_SECRET").ok().unwrap_or_default();
        let hmac_checks = parse_boolean_flag(env::var("PG_SETTLEMENT_HMAC_CHECKS").ok(), !hmac_secret.is_empty());
        if hmac_checks && hmac_secret.is_empty() {
            error!(
                "🪛️ PG_SETTLEMENT_HMAC_CHECKS is on, but PG_SETTLEMENT_HMAC_SECRET is not set. Every settlement \
                 callback will be rejected."
            );
        }
        let whitelist = env::var("PG_SETTLEMENT_IP_WHITELIST").ok().and_then(|s| parse_whitelist(&s));
        match &whitelist {
            Some(whitelist) if whitelist.is_empty() => {
                warn!(
                    "🚨️ The settlement IP whitelist was configured, but is empty. The server will run, but won't \
                     accept any settlement callbacks."
                );
            },
            None => {
                info!("🪛️ No settlement IP whitelist is set. Only HMAC validation will be used.");
            },
            Some(v) => {
                let addrs = v.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(", ");
                info!("🪛️ Settlement IP whitelist: {addrs}");
            },
        }
        Self { whitelist, hmac_secret: Secret::new(hmac_secret), hmac_checks }
    }
}

/// Parses a comma-separated list of IP addresses. Invalid entries are skipped. `none`, `false` and `0` disable the
/// whitelist altogether.
pub fn parse_whitelist(s: &str) -> Option<Vec<IpAddr>> {
    if ["none", "false", "0"].contains(&s.trim().to_lowercase().as_str()) {
        info!(
            "🪛️ Settlement IP whitelist is disabled. If this is not what you want, set PG_SETTLEMENT_IP_WHITELIST to \
             a comma-separated list of IP addresses to enable it."
        );
        return None;
    }
    let ip_addrs = s
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| {
            s.parse()
                .map_err(|e| warn!("🪛️ Ignoring invalid IP address ({s}) in PG_SETTLEMENT_IP_WHITELIST: {e}"))
                .ok()
        })
        .collect::<Vec<IpAddr>>();
    Some(ip_addrs)
}

fn duration_from_env(var: &str, unit: fn(u64) -> Duration, default: Duration) -> Duration {
    env::var(var)
        .map_err(|_| debug!("🪛️ {var} is not set. Using the default value of {default:?}."))
        .and_then(|s| {
            s.trim()
                .parse::<u64>()
                .map(unit)
                .map_err(|e| warn!("🪛️ Invalid configuration value for {var}. {e}. Using {default:?} instead."))
        })
        .ok()
        .unwrap_or(default)
}

//-------------------------------------------------  ServerOptions  ----------------------------------------------------
/// A subset of the server configuration that is used to configure the server's behaviour. Generally we try to keep this
/// as small as possible, and exclude secrets to avoid passing sensitive information around the system.
#[derive(Clone, Copy, Debug, Default)]
pub struct ServerOptions {
    pub use_x_forwarded_for: bool,
    pub use_forwarded: bool,
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self { use_x_forwarded_for: config.use_x_forwarded_for, use_forwarded: config.use_forwarded }
    }
}

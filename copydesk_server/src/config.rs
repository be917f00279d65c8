use std::{env, io::Write, net::IpAddr};

use checkout_tools::CheckoutConfig as CheckoutApiConfig;
use chrono::Duration;
use cpd_common::Secret;
use log::*;
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use serde_json::json;
use tempfile::NamedTempFile;

use crate::errors::ServerError;

const DEFAULT_CPD_HOST: &str = "127.0.0.1";
const DEFAULT_CPD_PORT: u16 = 8360;
const DEFAULT_PENDING_PAYMENT_TIMEOUT: Duration = Duration::hours(72);

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub auth: AuthConfig,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather than
    /// the connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_forwarded: bool,
    /// The time an order may sit in `pending_payment` before the expiry sweep cancels it.
    pub pending_payment_timeout: Duration,
    /// Checkout provider configuration
    pub checkout_config: CheckoutServerConfig,
}

#[derive(Clone, Debug, Default)]
pub struct CheckoutServerConfig {
    pub api: CheckoutApiConfig,
    /// If true, webhook HMAC signatures are verified. Disable only in tests.
    pub hmac_checks: bool,
    /// If supplied, requests against /checkout endpoints will be checked against a whitelist of provider
    /// IP addresses. To explicitly disable the whitelist, set this to "false", "none", or "0".
    pub whitelist: Option<Vec<IpAddr>>,
    pub success_url: String,
    pub cancel_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_CPD_HOST.to_string(),
            port: DEFAULT_CPD_PORT,
            database_url: String::default(),
            auth: AuthConfig::default(),
            use_x_forwarded_for: false,
            use_forwarded: false,
            pending_payment_timeout: DEFAULT_PENDING_PAYMENT_TIMEOUT,
            checkout_config: CheckoutServerConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("CPD_HOST").ok().unwrap_or_else(|| DEFAULT_CPD_HOST.into());
        let port = env::var("CPD_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for CPD_PORT. {e} Using the default, {DEFAULT_CPD_PORT}, instead."
                    );
                    DEFAULT_CPD_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_CPD_PORT);
        let database_url = env::var("CPD_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ CPD_DATABASE_URL is not set. Please set it to the URL for the Copydesk database.");
            String::default()
        });
        let auth = AuthConfig::try_from_env().unwrap_or_else(|e| {
            warn!(
                "🪛️ Could not load the authentication configuration from environment variables. {e}. Reverting to \
                 the default configuration."
            );
            AuthConfig::default()
        });
        let checkout_config = CheckoutServerConfig::from_env_or_defaults();
        let use_x_forwarded_for =
            env::var("CPD_USE_X_FORWARDED_FOR").map(|s| &s == "1" || &s == "true").unwrap_or(false);
        let use_forwarded = env::var("CPD_USE_FORWARDED").map(|s| &s == "1" || &s == "true").unwrap_or(false);
        let pending_payment_timeout = configure_pending_payment_timeout();
        Self {
            host,
            port,
            database_url,
            auth,
            use_x_forwarded_for,
            use_forwarded,
            pending_payment_timeout,
            checkout_config,
        }
    }
}

impl CheckoutServerConfig {
    pub fn from_env_or_defaults() -> Self {
        let api = CheckoutApiConfig::new_from_env_or_default();
        let hmac_checks = env::var("CPD_CHECKOUT_HMAC_CHECKS").map(|s| &s != "0" && &s != "false").unwrap_or(true);
        let whitelist = env::var("CPD_CHECKOUT_IP_WHITELIST").ok().and_then(|s| {
            if ["none", "false", "0"].contains(&s.to_lowercase().as_str()) {
                info!(
                    "🪛️ Checkout IP whitelist is disabled. If this is not what you want, set \
                     CPD_CHECKOUT_IP_WHITELIST to a comma-separated list of IP addresses to enable it."
                );
                return None;
            }
            let ip_addrs = s
                .split(',')
                .filter_map(|s| {
                    s.parse()
                        .map_err(|e| {
                            warn!("🪛️ Ignoring invalid IP address ({s}) in CPD_CHECKOUT_IP_WHITELIST: {e}");
                            None::<IpAddr>
                        })
                        .ok()
                })
                .collect::<Vec<IpAddr>>();
            Some(ip_addrs)
        });
        match &whitelist {
            Some(whitelist) if whitelist.is_empty() => {
                warn!(
                    "🚨️ The checkout IP whitelist was configured, but is empty. The server will run, but won't \
                     authorise any incoming webhook requests."
                );
            },
            None => {
                info!("🪛️ No checkout IP whitelist is set. Only HMAC validation will be used.");
            },
            Some(v) => {
                let addrs = v.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(", ");
                info!("🪛️ Checkout IP whitelist: {addrs}");
            },
        }
        let success_url = env::var("CPD_CHECKOUT_SUCCESS_URL")
            .ok()
            .unwrap_or_else(|| "http://localhost:3000/order-success".to_string());
        let cancel_url = env::var("CPD_CHECKOUT_CANCEL_URL")
            .ok()
            .unwrap_or_else(|| "http://localhost:3000/order-details".to_string());
        Self { api, hmac_checks, whitelist, success_url, cancel_url }
    }
}

fn configure_pending_payment_timeout() -> Duration {
    env::var("CPD_PENDING_PAYMENT_TIMEOUT")
        .map_err(|_| {
            info!(
                "🪛️ CPD_PENDING_PAYMENT_TIMEOUT is not set. Using the default value of {} hrs.",
                DEFAULT_PENDING_PAYMENT_TIMEOUT.num_hours()
            )
        })
        .and_then(|s| {
            s.parse::<i64>()
                .map(Duration::hours)
                .map_err(|e| warn!("🪛️ Invalid configuration value for CPD_PENDING_PAYMENT_TIMEOUT. {e}"))
        })
        .ok()
        .unwrap_or(DEFAULT_PENDING_PAYMENT_TIMEOUT)
}

//-------------------------------------------------  AuthConfig  ------------------------------------------------------
#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// Secret used to sign and verify the access JWTs this server issues.
    pub jwt_secret: Secret<String>,
    /// Secret shared with the identity provider; login tokens presented to `/auth` must verify against it.
    pub idp_secret: Secret<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        let mut tmpfile = NamedTempFile::new().ok().and_then(|f| f.keep().ok());
        warn!(
            "🚨️🚨️🚨️ The JWT secrets have not been set. I'm using random values for this session. DO NOT operate on \
             production like this since you may lose access to data. 🚨️🚨️🚨️"
        );
        let jwt_secret = random_secret();
        let idp_secret = random_secret();
        match &mut tmpfile {
            Some((f, p)) => {
                let key_data = json!({
                    "jwt_secret": jwt_secret,
                    "idp_secret": idp_secret,
                })
                .to_string();
                match writeln!(f, "{key_data}") {
                    Ok(()) => warn!(
                        "🚨️🚨️🚨️ The JWT secrets for this session were written to {}. If this is a production \
                         instance, you are doing it wrong! Set the CPD_JWT_SECRET and CPD_IDP_SECRET environment \
                         variables instead. 🚨️🚨️🚨️",
                        p.to_str().unwrap_or("???")
                    ),
                    Err(e) => warn!("🪛️ Could not write the JWT secrets to the temporary file. {e}"),
                }
            },
            None => {
                warn!("🪛️ Could not create a temporary file to store the JWT secrets.");
            },
        }
        Self { jwt_secret: Secret::new(jwt_secret), idp_secret: Secret::new(idp_secret) }
    }
}

fn random_secret() -> String {
    thread_rng().sample_iter(&Alphanumeric).take(48).map(char::from).collect()
}

impl AuthConfig {
    pub fn try_from_env() -> Result<Self, ServerError> {
        let jwt_secret =
            env::var("CPD_JWT_SECRET").map_err(|e| ServerError::ConfigurationError(format!("{e} [CPD_JWT_SECRET]")))?;
        let idp_secret =
            env::var("CPD_IDP_SECRET").map_err(|e| ServerError::ConfigurationError(format!("{e} [CPD_IDP_SECRET]")))?;
        if jwt_secret.len() < 32 {
            return Err(ServerError::ConfigurationError(
                "CPD_JWT_SECRET must be at least 32 characters long.".to_string(),
            ));
        }
        Ok(Self { jwt_secret: Secret::new(jwt_secret), idp_secret: Secret::new(idp_secret) })
    }
}

//-------------------------------------------------  ServerOptions  ---------------------------------------------------
/// A subset of the server configuration that is used to configure the server's behaviour. Generally we try
/// to keep this as small as possible, and exclude secrets to avoid passing sensitive information around
/// the system.
#[derive(Clone, Debug)]
pub struct ServerOptions {
    pub use_x_forwarded_for: bool,
    pub use_forwarded: bool,
    pub success_url: String,
    pub cancel_url: String,
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            use_x_forwarded_for: config.use_x_forwarded_for,
            use_forwarded: config.use_forwarded,
            success_url: config.checkout_config.success_url.clone(),
            cancel_url: config.checkout_config.cancel_url.clone(),
        }
    }
}

use std::{env, sync::Arc};

#[derive(Clone, Debug)]
/// Configuration struct for the server.
///
/// Holds everything the booking gate and the payment flow need at runtime:
/// database and Stripe credentials, the base URLs used to build checkout
/// redirects, the hold window and the release retry policy.
pub struct Config {
    // environment
    pub environment: String, // development or production
    /// The URL of the database to connect to.
    pub database_url: String,
    /// The hostname or IP address the server will bind to.
    pub server_host: String,
    /// The port number the server will listen on.
    pub server_port: u16,
    /// The number of worker threads to spawn for handling requests.
    pub num_workers: usize,
    /// The allowed origin for CORS (Cross-Origin Resource Sharing).
    pub cors_allowed_origin: String,
    /// A boolean indicating whether console logging is enabled.
    pub console_logging_enabled: bool,
    // server to server api keys, the payment service MUST
    // send one of these to reach the booking gate
    pub service_api_keys: Vec<String>,
    // url to reach the trainer session gate
    pub trainer_service_url: String,
    /// Public frontend origin, the only accepted redirect target.
    pub domain: String,
    /// Public base URL of this payment service, used for success/cancel URLs.
    pub payment_service_base_url: String,
    /// Stripe secret key
    pub stripe_secret_key: String,
    /// Stripe webhook secret
    pub stripe_webhook_secret: String,
    pub payment: PaymentConfig,
}

#[derive(Clone, Debug)]
/// Knobs of the hold/checkout/release flow.
pub struct PaymentConfig {
    /// Platform cut of each session payment, in percent.
    pub application_fee_percent: i64,
    /// Lifetime of a Stripe Checkout Session.
    pub checkout_expiry_seconds: i64,
    /// Age after which a hold counts as released.
    pub hold_ttl_seconds: i64,
    /// ISO currency used when creating session prices.
    pub currency: String,
    /// How many times the release queue calls the gate before giving up.
    pub release_max_attempts: u32,
    /// Base delay between release attempts, multiplied by the attempt number.
    pub release_retry_delay_ms: u64,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        PaymentConfig {
            application_fee_percent: 10,
            checkout_expiry_seconds: 1860,
            hold_ttl_seconds: 1860,
            currency: "usd".to_string(),
            release_max_attempts: 3,
            release_retry_delay_ms: 500,
        }
    }
}

impl PaymentConfig {
    /// Reads the payment flow settings, falling back to `PaymentConfig::default()`
    /// for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = PaymentConfig::default();

        PaymentConfig {
            application_fee_percent: parse_or("APPLICATION_FEE_PERCENT", defaults.application_fee_percent),
            checkout_expiry_seconds: parse_or("CHECKOUT_EXPIRY_SECONDS", defaults.checkout_expiry_seconds),
            hold_ttl_seconds: parse_or("HOLD_TTL_SECONDS", defaults.hold_ttl_seconds),
            currency: env::var("CURRENCY")
                .map(|c| c.to_lowercase())
                .unwrap_or(defaults.currency),
            release_max_attempts: parse_or("RELEASE_MAX_ATTEMPTS", defaults.release_max_attempts),
            release_retry_delay_ms: parse_or("RELEASE_RETRY_DELAY_MS", defaults.release_retry_delay_ms),
        }
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Creates a new `Config` instance from environment variables.
    ///
    /// # Environment Variables
    ///
    /// Required:
    /// - `ENVIRONMENT`: `development` or `production`
    /// - `DATABASE_URL`: Connection string for the database
    /// - `TRAINER_SERVICE_URL`: Base URL of the booking gate
    /// - `DOMAIN`: Public frontend origin
    /// - `PAYMENT_SERVICE_BASE_URL`: Public base URL of this service
    /// - `STRIPE_SECRET_KEY`, `STRIPE_WEBHOOK_SECRET`
    ///
    /// Optional (with defaults):
    /// - `IP`: Server host (default: "127.0.0.1")
    /// - `PORT`: Server port (default: 8080)
    /// - `WORKERS`: Number of worker threads (default: 4)
    /// - `CORS_ALLOWED_ORIGIN`: Allowed CORS origin (default: "http://localhost:3000")
    /// - `ENABLE_CONSOLE_LOGGING`: Whether to enable console logging (default: true)
    /// - `SERVICE_API_KEYS`: Comma separated keys accepted by the gate (default: none, check disabled)
    /// - Payment flow settings, see `PaymentConfig::from_env`
    ///
    /// # Panics
    ///
    /// This function will panic if required environment variables are missing.
    pub fn from_env() -> Arc<Self> {
        dotenvy::dotenv().ok();

        Arc::new(Config {
            environment: env::var("ENVIRONMENT").expect("ENVIRONMENT must be set"),
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            server_host: env::var("IP").unwrap_or_else(|_| "127.0.0.1".to_string()),
            server_port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            num_workers: env::var("WORKERS")
                .unwrap_or_else(|_| "4".to_string())
                .parse()
                .unwrap_or(4),
            cors_allowed_origin: env::var("CORS_ALLOWED_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            console_logging_enabled: env::var("ENABLE_CONSOLE_LOGGING")
                .unwrap_or_else(|_| "true".to_string())
                .to_lowercase()
                == "true",
            service_api_keys: split_keys(&env::var("SERVICE_API_KEYS").unwrap_or_default()),
            trainer_service_url: trim_base(
                env::var("TRAINER_SERVICE_URL").expect("TRAINER_SERVICE_URL must be set"),
            ),
            domain: trim_base(env::var("DOMAIN").expect("DOMAIN must be set")),
            payment_service_base_url: trim_base(
                env::var("PAYMENT_SERVICE_BASE_URL")
                    .expect("PAYMENT_SERVICE_BASE_URL must be set"),
            ),
            stripe_secret_key: required("STRIPE_SECRET_KEY"),
            stripe_webhook_secret: required("STRIPE_WEBHOOK_SECRET"),
            payment: PaymentConfig::from_env(),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

/// Like `expect`, but a blank value counts as missing: an empty webhook
/// secret would otherwise reject every event.
fn required(key: &str) -> String {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| panic!("{} must be set", key))
}

fn split_keys(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn trim_base(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_keys_drops_blank_entries() {
        assert!(split_keys("").is_empty());
        assert!(split_keys(" , ").is_empty());
        assert_eq!(split_keys("a, b ,c"), vec!["a", "b", "c"]);
    }

    #[test]
    fn base_urls_lose_trailing_slash() {
        assert_eq!(trim_base("http://localhost:3000/".into()), "http://localhost:3000");
        assert_eq!(trim_base("http://x".into()), "http://x");
    }

    #[test]
    #[should_panic(expected = "FITNEST_UNSET_STRIPE_SECRET must be set")]
    fn missing_stripe_secret_is_fatal() {
        required("FITNEST_UNSET_STRIPE_SECRET");
    }

    #[test]
    fn payment_defaults_match_checkout_window() {
        let cfg = PaymentConfig::default();
        assert_eq!(cfg.checkout_expiry_seconds, 31 * 60);
        assert_eq!(cfg.hold_ttl_seconds, cfg.checkout_expiry_seconds);
        assert_eq!(cfg.application_fee_percent, 10);
    }
}

//! Waveguide gateway configuration.
//!
//! Configuration is loaded once at startup from environment variables. The
//! signing secret is held as a [`SecretString`] and redacted in Debug output.

use crate::auth::password::{MAX_BCRYPT_COST, MIN_BCRYPT_COST};
use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use common::secret::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Default server bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default token issuer.
pub const DEFAULT_JWT_ISSUER: &str = "waveguide-management-system";

/// Default token lifetime in seconds (24 hours).
pub const DEFAULT_JWT_TTL_SECONDS: i64 = 86_400;

/// Default rate limit in requests per hour per client.
pub const DEFAULT_RATE_LIMIT_REQUESTS_PER_HOUR: u32 = 100;

/// Default revocation sweep interval in seconds (1 hour).
pub const DEFAULT_REVOCATION_SWEEP_INTERVAL_SECONDS: u64 = 3_600;

/// Default bcrypt cost for stored password hashes.
pub const DEFAULT_BCRYPT_COST: u32 = 12;

/// Minimum signing secret length in bytes.
///
/// HS512 uses a 512-bit block, so shorter keys are rejected outright.
pub const MIN_JWT_SECRET_BYTES: usize = 64;

/// Gateway configuration.
#[derive(Clone)]
pub struct Config {
    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// HMAC-SHA-512 signing secret for identity tokens.
    pub jwt_secret: SecretString,

    /// Issuer written into and required on every token.
    pub jwt_issuer: String,

    /// Token time-to-live in seconds.
    pub jwt_ttl_seconds: i64,

    /// Tolerance for `iat` claims ahead of the local clock.
    pub jwt_clock_skew_seconds: i64,

    /// Per-client request budget; also the burst capacity.
    pub rate_limit_requests_per_hour: u32,

    /// Period of the revocation sweep and idle-bucket eviction tasks.
    pub revocation_sweep_interval_seconds: u64,

    /// bcrypt cost used when registering users.
    pub bcrypt_cost: u32,

    /// Seconds to keep serving after a shutdown signal (0 disables).
    pub drain_seconds: u64,
}

/// Custom Debug implementation that redacts the signing secret.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("jwt_secret", &"[REDACTED]")
            .field("jwt_issuer", &self.jwt_issuer)
            .field("jwt_ttl_seconds", &self.jwt_ttl_seconds)
            .field("jwt_clock_skew_seconds", &self.jwt_clock_skew_seconds)
            .field(
                "rate_limit_requests_per_hour",
                &self.rate_limit_requests_per_hour,
            )
            .field(
                "revocation_sweep_interval_seconds",
                &self.revocation_sweep_interval_seconds,
            )
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("drain_seconds", &self.drain_seconds)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid JWT secret: {0}")]
    InvalidJwtSecret(String),

    #[error("Invalid JWT issuer: {0}")]
    InvalidJwtIssuer(String),

    #[error("Invalid JWT TTL configuration: {0}")]
    InvalidJwtTtl(String),

    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),

    #[error("Invalid rate limit configuration: {0}")]
    InvalidRateLimit(String),

    #[error("Invalid sweep interval configuration: {0}")]
    InvalidSweepInterval(String),

    #[error("Invalid bcrypt cost configuration: {0}")]
    InvalidBcryptCost(String),

    #[error("Invalid drain period configuration: {0}")]
    InvalidDrainPeriod(String),
}

/// Parse an optional variable, falling back to `default` when unset.
fn parse_var<T>(
    vars: &HashMap<String, String>,
    name: &str,
    default: T,
    on_error: fn(String) -> ConfigError,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match vars.get(name) {
        Some(value_str) => value_str.trim().parse().map_err(|e| {
            on_error(format!(
                "{} must be a valid integer, got '{}': {}",
                name, value_str, e
            ))
        }),
        None => Ok(default),
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let jwt_secret = vars
            .get("JWT_SECRET")
            .ok_or_else(|| ConfigError::MissingEnvVar("JWT_SECRET".to_string()))?;

        if jwt_secret.len() < MIN_JWT_SECRET_BYTES {
            return Err(ConfigError::InvalidJwtSecret(format!(
                "JWT_SECRET must be at least {} bytes, got {}",
                MIN_JWT_SECRET_BYTES,
                jwt_secret.len()
            )));
        }
        let jwt_secret = SecretString::from(jwt_secret.as_str());

        let jwt_issuer = vars
            .get("JWT_ISSUER")
            .cloned()
            .unwrap_or_else(|| DEFAULT_JWT_ISSUER.to_string());

        if jwt_issuer.trim().is_empty() {
            return Err(ConfigError::InvalidJwtIssuer(
                "JWT_ISSUER must not be empty".to_string(),
            ));
        }

        let jwt_ttl_seconds = parse_var(
            vars,
            "JWT_TTL_SECONDS",
            DEFAULT_JWT_TTL_SECONDS,
            ConfigError::InvalidJwtTtl,
        )?;
        if jwt_ttl_seconds <= 0 {
            return Err(ConfigError::InvalidJwtTtl(format!(
                "JWT_TTL_SECONDS must be positive, got {}",
                jwt_ttl_seconds
            )));
        }

        // Safe cast: both clock skew constants are small second counts
        #[allow(clippy::cast_possible_wrap)]
        let jwt_clock_skew_seconds = parse_var(
            vars,
            "JWT_CLOCK_SKEW_SECONDS",
            DEFAULT_CLOCK_SKEW.as_secs() as i64,
            ConfigError::InvalidJwtClockSkew,
        )?;
        if jwt_clock_skew_seconds <= 0 {
            return Err(ConfigError::InvalidJwtClockSkew(format!(
                "JWT_CLOCK_SKEW_SECONDS must be positive, got {}",
                jwt_clock_skew_seconds
            )));
        }
        #[allow(clippy::cast_possible_wrap)]
        let max_clock_skew_seconds = MAX_CLOCK_SKEW.as_secs() as i64;
        if jwt_clock_skew_seconds > max_clock_skew_seconds {
            return Err(ConfigError::InvalidJwtClockSkew(format!(
                "JWT_CLOCK_SKEW_SECONDS must not exceed {} seconds, got {}",
                MAX_CLOCK_SKEW.as_secs(),
                jwt_clock_skew_seconds
            )));
        }

        let rate_limit_requests_per_hour = parse_var(
            vars,
            "RATE_LIMIT_REQUESTS_PER_HOUR",
            DEFAULT_RATE_LIMIT_REQUESTS_PER_HOUR,
            ConfigError::InvalidRateLimit,
        )?;
        if rate_limit_requests_per_hour == 0 {
            return Err(ConfigError::InvalidRateLimit(
                "RATE_LIMIT_REQUESTS_PER_HOUR must be greater than 0".to_string(),
            ));
        }

        let revocation_sweep_interval_seconds = parse_var(
            vars,
            "REVOCATION_SWEEP_INTERVAL_SECONDS",
            DEFAULT_REVOCATION_SWEEP_INTERVAL_SECONDS,
            ConfigError::InvalidSweepInterval,
        )?;
        if revocation_sweep_interval_seconds == 0 {
            return Err(ConfigError::InvalidSweepInterval(
                "REVOCATION_SWEEP_INTERVAL_SECONDS must be greater than 0".to_string(),
            ));
        }

        let bcrypt_cost = parse_var(
            vars,
            "BCRYPT_COST",
            DEFAULT_BCRYPT_COST,
            ConfigError::InvalidBcryptCost,
        )?;
        if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&bcrypt_cost) {
            return Err(ConfigError::InvalidBcryptCost(format!(
                "BCRYPT_COST must be between {} and {}, got {}",
                MIN_BCRYPT_COST, MAX_BCRYPT_COST, bcrypt_cost
            )));
        }

        let drain_seconds = parse_var(vars, "DRAIN_SECONDS", 0, ConfigError::InvalidDrainPeriod)?;

        Ok(Config {
            bind_address,
            jwt_secret,
            jwt_issuer,
            jwt_ttl_seconds,
            jwt_clock_skew_seconds,
            rate_limit_requests_per_hour,
            revocation_sweep_interval_seconds,
            bcrypt_cost,
            drain_seconds,
        })
    }

    /// Raw signing key bytes.
    pub fn jwt_secret_bytes(&self) -> &[u8] {
        self.jwt_secret.expose_secret().as_bytes()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn test_secret() -> String {
        "s".repeat(MIN_JWT_SECRET_BYTES)
    }

    fn base_vars() -> HashMap<String, String> {
        HashMap::from([("JWT_SECRET".to_string(), test_secret())])
    }

    #[test]
    fn test_from_vars_defaults() {
        let config = Config::from_vars(&base_vars()).expect("Config should load successfully");

        assert_eq!(config.bind_address, DEFAULT_BIND_ADDRESS);
        assert_eq!(config.jwt_issuer, "waveguide-management-system");
        assert_eq!(config.jwt_ttl_seconds, 86_400);
        assert_eq!(config.jwt_clock_skew_seconds, 300);
        assert_eq!(config.rate_limit_requests_per_hour, 100);
        assert_eq!(config.revocation_sweep_interval_seconds, 3_600);
        assert_eq!(config.bcrypt_cost, 12);
        assert_eq!(config.drain_seconds, 0);
        assert_eq!(config.jwt_secret_bytes().len(), MIN_JWT_SECRET_BYTES);
    }

    #[test]
    fn test_from_vars_custom_values() {
        let mut vars = base_vars();
        vars.insert("BIND_ADDRESS".to_string(), "127.0.0.1:9000".to_string());
        vars.insert("JWT_ISSUER".to_string(), "waveguide-test".to_string());
        vars.insert("JWT_TTL_SECONDS".to_string(), "3600".to_string());
        vars.insert("JWT_CLOCK_SKEW_SECONDS".to_string(), "60".to_string());
        vars.insert("RATE_LIMIT_REQUESTS_PER_HOUR".to_string(), "5".to_string());
        vars.insert(
            "REVOCATION_SWEEP_INTERVAL_SECONDS".to_string(),
            "60".to_string(),
        );
        vars.insert("BCRYPT_COST".to_string(), "4".to_string());
        vars.insert("DRAIN_SECONDS".to_string(), "10".to_string());

        let config = Config::from_vars(&vars).expect("Config should load successfully");

        assert_eq!(config.bind_address, "127.0.0.1:9000");
        assert_eq!(config.jwt_issuer, "waveguide-test");
        assert_eq!(config.jwt_ttl_seconds, 3_600);
        assert_eq!(config.jwt_clock_skew_seconds, 60);
        assert_eq!(config.rate_limit_requests_per_hour, 5);
        assert_eq!(config.revocation_sweep_interval_seconds, 60);
        assert_eq!(config.bcrypt_cost, 4);
        assert_eq!(config.drain_seconds, 10);
    }

    #[test]
    fn test_from_vars_missing_secret() {
        let result = Config::from_vars(&HashMap::new());
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(v)) if v == "JWT_SECRET"));
    }

    #[test]
    fn test_from_vars_secret_too_short() {
        let vars = HashMap::from([("JWT_SECRET".to_string(), "short".to_string())]);
        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidJwtSecret(msg)) if msg.contains("at least 64 bytes, got 5"))
        );
    }

    #[test]
    fn test_from_vars_empty_issuer() {
        let mut vars = base_vars();
        vars.insert("JWT_ISSUER".to_string(), "   ".to_string());
        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidJwtIssuer(_))
        ));
    }

    #[test]
    fn test_from_vars_rejects_non_positive_ttl() {
        for value in ["0", "-5"] {
            let mut vars = base_vars();
            vars.insert("JWT_TTL_SECONDS".to_string(), value.to_string());
            assert!(
                matches!(Config::from_vars(&vars), Err(ConfigError::InvalidJwtTtl(_))),
                "TTL {value} should be rejected"
            );
        }
    }

    #[test]
    fn test_from_vars_rejects_unparseable_ttl() {
        let mut vars = base_vars();
        vars.insert("JWT_TTL_SECONDS".to_string(), "one-hour".to_string());
        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidJwtTtl(msg)) if msg.contains("one-hour"))
        );
    }

    #[test]
    fn test_from_vars_clock_skew_bounds() {
        let mut vars = base_vars();
        vars.insert("JWT_CLOCK_SKEW_SECONDS".to_string(), "601".to_string());
        assert!(
            matches!(Config::from_vars(&vars), Err(ConfigError::InvalidJwtClockSkew(msg)) if msg.contains("must not exceed 600"))
        );

        vars.insert("JWT_CLOCK_SKEW_SECONDS".to_string(), "0".to_string());
        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidJwtClockSkew(_))
        ));

        vars.insert("JWT_CLOCK_SKEW_SECONDS".to_string(), "600".to_string());
        assert_eq!(Config::from_vars(&vars).unwrap().jwt_clock_skew_seconds, 600);
    }

    #[test]
    fn test_from_vars_rejects_zero_rate_limit() {
        let mut vars = base_vars();
        vars.insert("RATE_LIMIT_REQUESTS_PER_HOUR".to_string(), "0".to_string());
        assert!(
            matches!(Config::from_vars(&vars), Err(ConfigError::InvalidRateLimit(msg)) if msg.contains("greater than 0"))
        );

        vars.insert("RATE_LIMIT_REQUESTS_PER_HOUR".to_string(), "-1".to_string());
        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidRateLimit(_))
        ));
    }

    #[test]
    fn test_from_vars_rejects_zero_sweep_interval() {
        let mut vars = base_vars();
        vars.insert(
            "REVOCATION_SWEEP_INTERVAL_SECONDS".to_string(),
            "0".to_string(),
        );
        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidSweepInterval(_))
        ));
    }

    #[test]
    fn test_from_vars_bcrypt_cost_range() {
        for value in ["3", "32"] {
            let mut vars = base_vars();
            vars.insert("BCRYPT_COST".to_string(), value.to_string());
            assert!(matches!(
                Config::from_vars(&vars),
                Err(ConfigError::InvalidBcryptCost(_))
            ));
        }
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = Config::from_vars(&base_vars()).unwrap();
        let debug_str = format!("{:?}", config);

        assert!(debug_str.contains("[REDACTED]"));
        assert!(!debug_str.contains(&test_secret()));
    }
}

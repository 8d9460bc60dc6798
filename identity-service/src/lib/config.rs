use std::env;

use auth::PasswordRequirements;
use config::Config as ConfigBuilder;
use config::ConfigError;
use config::Environment;
use config::File;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub jwt: JwtConfig,
    #[serde(default)]
    pub password: PasswordRequirements,
    #[serde(default = "default_rate_limit")]
    pub rate_limit: Vec<RateLimitPolicy>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub http_port: u16,
    /// Mark the session and refresh cookies Secure. Disabled only for local
    /// development and the test harness.
    #[serde(default = "default_secure_cookies")]
    pub secure_cookies: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    #[serde(default = "default_access_token_minutes")]
    pub access_token_minutes: i64,
    #[serde(default = "default_refresh_token_days")]
    pub refresh_token_days: i64,
}

/// One rate-limit rule: requests per fixed window, applied to the first
/// matching path prefix, counted per client IP.
#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitPolicy {
    pub group: String,
    pub prefix: String,
    pub max_requests: u32,
    pub window_secs: u64,
}

fn default_secure_cookies() -> bool {
    true
}

fn default_access_token_minutes() -> i64 {
    15
}

fn default_refresh_token_days() -> i64 {
    7
}

fn default_rate_limit() -> Vec<RateLimitPolicy> {
    vec![
        RateLimitPolicy {
            group: "auth".to_string(),
            prefix: "/auth/login".to_string(),
            max_requests: 10,
            window_secs: 60,
        },
        RateLimitPolicy {
            group: "auth".to_string(),
            prefix: "/auth/refresh".to_string(),
            max_requests: 30,
            window_secs: 60,
        },
        RateLimitPolicy {
            group: "general".to_string(),
            prefix: "/".to_string(),
            max_requests: 300,
            window_secs: 60,
        },
    ]
}

impl Config {
    /// Load configuration from files with environment variable overrides
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (DATABASE__URL, JWT__SECRET, etc.)
    /// 2. Environment-specific config file (config/{environment}.toml)
    /// 3. Default config file (config/default.toml)
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let configuration = ConfigBuilder::builder()
            // Start with default configuration
            .add_source(File::with_name("config/default").required(false))
            // Layer on environment-specific configuration
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Layer on environment variables (with __ as separator)
            // Example: JWT__SECRET=... overrides jwt.secret
            .add_source(Environment::with_prefix("").separator("__"))
            .build()?;

        let config: Config = configuration.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }

    /// Reject values the deserializer accepts but the service cannot run
    /// with. A zero-width rate-limit window would divide by zero in the
    /// limiter's window arithmetic.
    fn validate(&self) -> Result<(), ConfigError> {
        for policy in &self.rate_limit {
            if policy.window_secs == 0 {
                return Err(ConfigError::Message(format!(
                    "rate_limit policy '{}' has window_secs = 0",
                    policy.group
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_rate_limit(policies: Vec<RateLimitPolicy>) -> Config {
        Config {
            database: DatabaseConfig {
                url: "postgres://localhost/batuara".to_string(),
            },
            server: ServerConfig {
                http_port: 8080,
                secure_cookies: true,
            },
            jwt: JwtConfig {
                secret: "a-signing-secret-of-at-least-32-bytes!".to_string(),
                issuer: "batuara-api".to_string(),
                audience: "batuara-clients".to_string(),
                access_token_minutes: 15,
                refresh_token_days: 7,
            },
            password: PasswordRequirements::default(),
            rate_limit: policies,
        }
    }

    #[test]
    fn default_rate_limit_policies_pass_validation() {
        let config = config_with_rate_limit(default_rate_limit());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_width_rate_limit_window_is_rejected() {
        let config = config_with_rate_limit(vec![RateLimitPolicy {
            group: "auth".to_string(),
            prefix: "/auth/login".to_string(),
            max_requests: 10,
            window_secs: 0,
        }]);

        let error = config.validate().unwrap_err();
        assert!(error.to_string().contains("window_secs"));
    }
}

//! Runtime configuration read from the process environment (`.env` via dotenvy).
//!
//! Third-party integrations (mail relay, media host, payment gateway) are
//! optional: their settings are `Some` only when every key they need is set.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
    #[error("unsupported database url scheme in {0:?} (expected a path or sled://)")]
    UnsupportedDatabaseUrl(String),
}

/// Deployment flavour. Controls log format and error detail in responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn is_production(self) -> bool {
        self == Environment::Production
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    /// Directory holding the sled database.
    pub path: PathBuf,
    pub connect_attempts: u32,
    pub retry_base_delay: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct IdentitySettings {
    /// Signs session tokens (HS256).
    pub secret_key: Option<String>,
    /// `whsec_`-prefixed secret for user sync webhooks.
    pub webhook_secret: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PaymentSettings {
    pub secret_key: Option<String>,
    pub webhook_secret: Option<String>,
    /// ISO currency code sent to the gateway, e.g. `usd`.
    pub currency_code: String,
}

#[derive(Debug, Clone)]
pub struct MediaSettings {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

#[derive(Debug, Clone)]
pub struct MailSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub sender: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub environment: Environment,
    pub database: DatabaseSettings,
    pub identity: IdentitySettings,
    pub payment: PaymentSettings,
    pub media: Option<MediaSettings>,
    pub mail: Option<MailSettings>,
    /// Symbol shown next to prices in confirmation mails.
    pub currency: String,
    pub cors_origin: Option<String>,
    pub log_dir: Option<PathBuf>,
    pub seed_owner_id: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let environment = match get("APP_ENV").as_deref() {
            Some("production") | Some("prod") => Environment::Production,
            Some("development") | Some("dev") | None => Environment::Development,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "APP_ENV",
                    reason: format!("unknown environment {other:?}"),
                })
            }
        };

        let database_url = get("DATABASE_URL").unwrap_or_else(|| "hoteluxe_data".to_string());
        let database_name = get("DATABASE_NAME").unwrap_or_else(|| "Hoteluxe".to_string());
        let database = DatabaseSettings {
            path: database_path(&database_url)?.join(database_name),
            connect_attempts: parse_or(get("DB_CONNECT_ATTEMPTS"), "DB_CONNECT_ATTEMPTS", 3)?,
            retry_base_delay: Duration::from_millis(parse_or(
                get("DB_RETRY_BASE_MS"),
                "DB_RETRY_BASE_MS",
                1000,
            )?),
        };
        if database.connect_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "DB_CONNECT_ATTEMPTS",
                reason: "must be at least 1".to_string(),
            });
        }

        let media = match (
            get("CLOUDINARY_CLOUD_NAME"),
            get("CLOUDINARY_API_KEY"),
            get("CLOUDINARY_API_SECRET"),
        ) {
            (Some(cloud_name), Some(api_key), Some(api_secret)) => Some(MediaSettings {
                cloud_name,
                api_key,
                api_secret,
            }),
            _ => None,
        };

        let mail = match (get("SMTP_HOST"), get("SMTP_USER"), get("SMTP_PASS")) {
            (Some(host), Some(username), Some(password)) => Some(MailSettings {
                host,
                port: parse_or(get("SMTP_PORT"), "SMTP_PORT", 587)?,
                sender: get("SENDER_EMAIL").unwrap_or_else(|| username.clone()),
                username,
                password,
            }),
            _ => None,
        };

        Ok(Self {
            port: parse_or(get("PORT"), "PORT", 3000)?,
            environment,
            database,
            identity: IdentitySettings {
                secret_key: get("CLERK_SECRET_KEY"),
                webhook_secret: get("CLERK_WEBHOOK_SECRET"),
            },
            payment: PaymentSettings {
                secret_key: get("STRIPE_SECRET_KEY"),
                webhook_secret: get("STRIPE_WEBHOOK_SECRET"),
                currency_code: get("PAYMENT_CURRENCY")
                    .unwrap_or_else(|| "usd".to_string())
                    .to_lowercase(),
            },
            media,
            mail,
            currency: get("CURRENCY").unwrap_or_else(|| "$".to_string()),
            cors_origin: get("CORS_ORIGIN"),
            log_dir: get("LOG_DIR").map(PathBuf::from),
            seed_owner_id: get("SEED_OWNER_ID"),
        })
    }
}

fn database_path(url: &str) -> Result<PathBuf, ConfigError> {
    if let Some(path) = url.strip_prefix("sled://") {
        return Ok(PathBuf::from(path));
    }
    if url.contains("://") {
        return Err(ConfigError::UnsupportedDatabaseUrl(url.to_string()));
    }
    Ok(PathBuf::from(url))
}

fn parse_or<T>(value: Option<String>, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_without_any_keys() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.database.path, PathBuf::from("hoteluxe_data").join("Hoteluxe"));
        assert_eq!(config.database.connect_attempts, 3);
        assert_eq!(config.currency, "$");
        assert_eq!(config.payment.currency_code, "usd");
        assert!(config.mail.is_none());
        assert!(config.media.is_none());
    }

    #[test]
    fn sled_scheme_is_stripped_and_other_schemes_rejected() {
        let config = config_from(&[("DATABASE_URL", "sled:///var/lib/hotel"), ("DATABASE_NAME", "Test")]).unwrap();
        assert_eq!(config.database.path, PathBuf::from("/var/lib/hotel/Test"));

        let err = config_from(&[("DATABASE_URL", "mongodb://localhost")]).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedDatabaseUrl(_)));
    }

    #[test]
    fn mail_requires_host_user_and_password() {
        let partial = config_from(&[("SMTP_HOST", "smtp.example.com"), ("SMTP_USER", "bot")]).unwrap();
        assert!(partial.mail.is_none());

        let full = config_from(&[
            ("SMTP_HOST", "smtp.example.com"),
            ("SMTP_USER", "bot"),
            ("SMTP_PASS", "secret"),
            ("SMTP_PORT", "2525"),
        ])
        .unwrap();
        let mail = full.mail.unwrap();
        assert_eq!(mail.port, 2525);
        assert_eq!(mail.sender, "bot");
    }

    #[test]
    fn bad_numbers_and_environments_are_reported() {
        assert!(matches!(
            config_from(&[("PORT", "eighty")]),
            Err(ConfigError::Invalid { key: "PORT", .. })
        ));
        assert!(matches!(
            config_from(&[("APP_ENV", "staging")]),
            Err(ConfigError::Invalid { key: "APP_ENV", .. })
        ));
        assert!(matches!(
            config_from(&[("DB_CONNECT_ATTEMPTS", "0")]),
            Err(ConfigError::Invalid { key: "DB_CONNECT_ATTEMPTS", .. })
        ));
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config = config_from(&[("CURRENCY", "  "), ("APP_ENV", "production")]).unwrap();
        assert_eq!(config.currency, "$");
        assert!(config.environment.is_production());
    }
}

//! Runtime configuration.
//!
//! Every flag falls back to an environment variable. A `.env` in the working directory is
//! loaded first, then the file named by `--env-file`, neither overriding variables that are
//! already set.

use crate::application::reconciler::CheckoutSettings;
use crate::error::{LoanLinkError, Result};
use clap::Parser;
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

const MISSING_URI_WARNING: &str =
    "WARNING: MONGODB_URI is not set. Records are kept in memory and lost on shutdown.";
#[cfg(not(feature = "storage-mongodb"))]
const FALLBACK_WARNING: &str = "WARNING: Persistent storage requested via MONGODB_URI, but 'storage-mongodb' feature is not enabled. Falling back to In-Memory storage.";

/// REST backend for the LoanLink peer-lending marketplace
#[derive(Parser, Debug, Clone)]
#[command(name = "loanlink", author, version, about, long_about = None)]
pub struct Config {
    /// Additional dotenv file to load before reading the environment
    #[arg(long)]
    pub env_file: Option<PathBuf>,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 5000)]
    pub port: u16,

    /// Interface to bind
    #[arg(long, env = "BIND_HOST", default_value = "0.0.0.0")]
    pub bind_host: String,

    /// MongoDB connection URI. Without it everything is kept in memory.
    #[arg(long, env = "MONGODB_URI", hide_env_values = true)]
    pub mongodb_uri: Option<String>,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "LoanLink")]
    pub mongodb_db: String,

    /// Secret key for the checkout provider (required)
    #[arg(long, env = "STRIPE_SECRET_KEY", hide_env_values = true)]
    pub stripe_secret_key: Option<String>,

    /// Base URL of the checkout provider's REST API
    #[arg(long, env = "STRIPE_API_BASE", default_value = "https://api.stripe.com")]
    pub stripe_api_base: String,

    /// Front-end origin the checkout page redirects back to
    #[arg(long, env = "CLIENT_DOMAIN", default_value = "http://localhost:5173")]
    pub client_domain: String,

    /// Currency for checkout line items
    #[arg(long, env = "CHECKOUT_CURRENCY", default_value = "usd")]
    pub checkout_currency: String,

    /// HS256 secret for bearer tokens (required)
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    /// Upper bound on a single checkout provider call, in seconds
    #[arg(long, env = "GATEWAY_TIMEOUT_SECS", default_value_t = 10)]
    pub gateway_timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

/// Where records are kept for this process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    InMemory { warning: Option<String> },
    #[cfg(feature = "storage-mongodb")]
    MongoDb { uri: String, database: String },
}

impl Config {
    /// Loads dotenv files and parses the process arguments, exiting on `--help` or bad flags.
    pub fn load() -> Result<Self> {
        Self::load_from(std::env::args_os())
    }

    pub fn load_from<I, T>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let _ = dotenvy::dotenv();
        let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
        let config = Self::parse_from(&args);
        match &config.env_file {
            Some(path) => {
                dotenvy::from_path(path).map_err(|e| {
                    LoanLinkError::ConfigError(format!(
                        "cannot load env file {}: {e}",
                        path.display()
                    ))
                })?;
                // Re-read so values from the file fill in unset flags.
                Ok(Self::parse_from(&args))
            }
            None => Ok(config),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.stripe_secret_key()?;
        self.jwt_secret()?;
        if self.gateway_timeout_secs == 0 {
            return Err(LoanLinkError::ConfigError(
                "GATEWAY_TIMEOUT_SECS must be at least 1".to_string(),
            ));
        }
        if self.checkout_currency.trim().is_empty() {
            return Err(LoanLinkError::ConfigError(
                "CHECKOUT_CURRENCY must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn stripe_secret_key(&self) -> Result<&str> {
        required(self.stripe_secret_key.as_deref(), "STRIPE_SECRET_KEY")
    }

    pub fn jwt_secret(&self) -> Result<&str> {
        required(self.jwt_secret.as_deref(), "JWT_SECRET")
    }

    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_secs(self.gateway_timeout_secs)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_host, self.port)
    }

    pub fn checkout_settings(&self) -> CheckoutSettings {
        let domain = self.client_domain.trim_end_matches('/');
        CheckoutSettings {
            currency: self.checkout_currency.trim().to_lowercase(),
            success_url: format!("{domain}/payment-success?session_id={{CHECKOUT_SESSION_ID}}"),
            cancel_url: format!("{domain}/payment-cancelled"),
            gateway_timeout: self.gateway_timeout(),
        }
    }

    pub fn storage_backend(&self) -> StorageBackend {
        let Some(uri) = self
            .mongodb_uri
            .as_deref()
            .map(str::trim)
            .filter(|uri| !uri.is_empty())
        else {
            return StorageBackend::InMemory {
                warning: Some(MISSING_URI_WARNING.to_string()),
            };
        };

        #[cfg(feature = "storage-mongodb")]
        {
            StorageBackend::MongoDb {
                uri: uri.to_string(),
                database: self.mongodb_db.clone(),
            }
        }
        #[cfg(not(feature = "storage-mongodb"))]
        {
            let _ = uri;
            StorageBackend::InMemory {
                warning: Some(FALLBACK_WARNING.to_string()),
            }
        }
    }
}

fn required<'a>(value: Option<&'a str>, name: &str) -> Result<&'a str> {
    match value.map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(LoanLinkError::ConfigError(format!("{name} is required"))),
    }
}

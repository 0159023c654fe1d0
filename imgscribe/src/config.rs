//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `IMGSCRIBE_CONFIG`
//! environment variable.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Plain environment names** - `PORT`, `REGION`, `BUCKET_NAME`, `ACCESS_KEY`, `SECRET_KEY`,
//!    `OPENAI_API_KEY`, `EMAIL`, `EMAIL_PASSWORD`, as used by existing deployments
//! 3. **Environment variables** - Variables prefixed with `IMGSCRIBE_` override everything above
//! 4. **DATABASE_URL** - Special case: selects an external database with that URL
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `IMGSCRIBE_DESCRIBER__DEFAULT_MODEL=gpt-4o-mini` sets the `describer.default_model` field.
//!
//! ## Usage
//!
//! ```no_run
//! use clap::Parser;
//! use imgscribe::config::{Args, Config};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let args = Args::parse();
//! let config = Config::load(&args)?;
//!
//! println!("Server will bind to {}:{}", config.host, config.port);
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration Structure
//!
//! - **Server**: `host`, `port`
//! - **Database**: `database.type` (`external` or `memory`), `database.url`, `database.pool`
//! - **Object storage**: `storage.bucket`, `storage.region`, credentials, optional endpoint
//! - **Describer**: `describer.api_key`, `describer.default_model`, `describer.prompt`
//! - **Authentication**: `auth.password`, `auth.otp.ttl`
//! - **Email**: `email.transport` (`smtp` or `file`; SMTP when unset and an SMTP username such as
//!   `EMAIL` is configured) and transport settings
//! - **HTTP**: `cors`, `limits.max_upload_bytes`
//! - **Sessions**: `uploads.session_ttl`, `uploads.max_sessions`
//! - **Telemetry**: `enable_otel_export`

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::{fmt, time::Duration};
use url::Url;

use crate::errors::Error;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "IMGSCRIBE_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
///
/// All fields have defaults defined in the `Default` implementation; credentials for the
/// external services have no usable default and are checked by [`Config::validate`].
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Set from `DATABASE_URL`; folded into `database` during [`Config::load`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
    /// Where description records and users are stored
    pub database: DatabaseConfig,
    /// Object storage bucket that receives uploaded images
    pub storage: StorageConfig,
    /// Vision model used to describe images
    pub describer: DescriberConfig,
    /// Password and OTP rules
    pub auth: AuthConfig,
    /// Outgoing mail for password reset OTPs
    pub email: EmailConfig,
    /// CORS configuration for browser clients
    pub cors: CorsConfig,
    /// Request size limits
    pub limits: LimitsConfig,
    /// Per-session "last upload" tracking
    pub uploads: UploadsConfig,
    /// Export traces over OTLP (configured via the standard OTEL_* environment variables)
    pub enable_otel_export: bool,
}

/// Individual pool configuration with all SQLx parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolSettings {
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of idle connections to maintain
    pub min_connections: u32,
    /// Maximum time to wait for a connection (seconds)
    pub acquire_timeout_secs: u64,
    /// Time before idle connections are closed (seconds, 0 = never)
    pub idle_timeout_secs: u64,
    /// Maximum lifetime of a connection (seconds, 0 = never)
    pub max_lifetime_secs: u64,
}

impl Default for PoolSettings {
    /// Production defaults: balanced for reliability and resource usage
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 0,
            acquire_timeout_secs: 30,
            idle_timeout_secs: 600,  // 10 minutes
            max_lifetime_secs: 1800, // 30 minutes
        }
    }
}

/// Database configuration - either an external PostgreSQL database or in-process memory.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DatabaseConfig {
    /// Use external PostgreSQL database
    External {
        /// Connection string for the database
        url: String,
        /// Connection pool settings
        #[serde(default)]
        pool: PoolSettings,
    },
    /// Keep everything in memory; data is lost on shutdown
    Memory,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig::External {
            url: "postgres://localhost:5432/imgscribe".to_string(),
            pool: PoolSettings::default(),
        }
    }
}

impl DatabaseConfig {
    /// Pool settings, if an external database is configured
    pub fn pool_settings(&self) -> Option<&PoolSettings> {
        match self {
            DatabaseConfig::External { pool, .. } => Some(pool),
            DatabaseConfig::Memory => None,
        }
    }
}

/// S3 (or S3-compatible) bucket configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Bucket that uploaded images are written to
    pub bucket: String,
    /// Bucket region, also used to build public URLs
    pub region: String,
    /// Static access key. When unset, the default AWS credential chain is used.
    pub access_key_id: Option<String>,
    /// Static secret key, required if `access_key_id` is set
    #[serde(skip_serializing)]
    pub secret_access_key: Option<String>,
    /// Custom endpoint for S3-compatible stores (MinIO, R2, ...)
    pub endpoint_url: Option<String>,
    /// Base for public object URLs. Defaults to `https://{bucket}.s3.{region}.amazonaws.com`.
    pub public_base_url: Option<Url>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            region: String::new(),
            access_key_id: None,
            secret_access_key: None,
            endpoint_url: None,
            public_base_url: None,
        }
    }
}

/// OpenAI-compatible vision model configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DescriberConfig {
    /// API key sent as a bearer token. Required.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Base URL of the API; `chat/completions` is resolved against it
    pub base_url: Url,
    /// Model used when a request does not name one
    pub default_model: String,
    /// Prompt sent alongside every image
    pub prompt: String,
    /// Timeout for a single describe call
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Reject describe requests that have no image URL instead of calling the model with an
    /// empty one
    pub require_image_url: bool,
}

impl Default for DescriberConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: Url::parse("https://api.openai.com/v1/").expect("static URL is valid"),
            default_model: "gpt-4o".to_string(),
            prompt: "What's in this image?".to_string(),
            timeout: Duration::from_secs(60),
            require_image_url: true,
        }
    }
}

/// Authentication configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    /// Password validation and hashing rules
    pub password: PasswordConfig,
    /// Password reset OTP rules
    pub otp: OtpConfig,
}

/// Password validation rules.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PasswordConfig {
    /// Minimum password length
    pub min_length: usize,
    /// Maximum password length
    pub max_length: usize,
    /// Argon2 memory cost in KiB (default: 19456 KiB = 19 MB, secure for production)
    pub argon2_memory_kib: u32,
    /// Argon2 iterations (default: 2, secure for production)
    pub argon2_iterations: u32,
    /// Argon2 parallelism (default: 1)
    pub argon2_parallelism: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            min_length: 8,
            max_length: 64,
            // Secure defaults for production (Argon2id RFC recommendations)
            argon2_memory_kib: 19456, // 19 MB
            argon2_iterations: 2,
            argon2_parallelism: 1,
        }
    }
}

/// Password reset OTP configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct OtpConfig {
    /// How long an issued OTP stays valid
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60 * 60), // 1 hour
        }
    }
}

/// Email configuration for password reset OTPs.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmailConfig {
    /// Which transport delivers mail. When unset, SMTP is used if an SMTP username is
    /// configured and the file transport otherwise; see [`EmailConfig::transport`].
    pub transport: Option<EmailTransport>,
    /// SMTP settings, used when `transport` is `smtp`
    pub smtp: SmtpConfig,
    /// Directory emails are written to when `transport` is `file`
    pub file_path: String,
    /// Sender address. Defaults to the SMTP username.
    pub from_email: Option<String>,
    /// Sender display name
    pub from_name: String,
}

/// Email transport selection - SMTP or file-based for development/testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailTransport {
    /// Send emails via SMTP server
    Smtp,
    /// Write emails to files
    File,
}

/// SMTP relay settings.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SmtpConfig {
    /// SMTP server hostname
    pub host: String,
    /// SMTP server port
    pub port: u16,
    /// SMTP authentication username
    pub username: String,
    /// SMTP authentication password
    #[serde(skip_serializing)]
    pub password: String,
    /// Use STARTTLS
    pub use_tls: bool,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            transport: None,
            smtp: SmtpConfig::default(),
            file_path: "./emails".to_string(),
            from_email: None,
            from_name: "imgscribe".to_string(),
        }
    }
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: "smtp.gmail.com".to_string(),
            port: 587,
            username: String::new(),
            password: String::new(),
            use_tls: true,
        }
    }
}

impl EmailConfig {
    /// The transport in effect: the explicit setting, else SMTP once credentials are present
    pub fn transport(&self) -> EmailTransport {
        self.transport.unwrap_or(if self.smtp.username.is_empty() {
            EmailTransport::File
        } else {
            EmailTransport::Smtp
        })
    }

    /// Sender address: explicit `from_email`, else the SMTP username
    pub fn sender(&self) -> &str {
        self.from_email.as_deref().unwrap_or(&self.smtp.username)
    }
}

/// CORS (Cross-Origin Resource Sharing) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    /// Allowed origins for CORS requests
    pub allowed_origins: Vec<CorsOrigin>,
    /// Allow credentials (cookies) in CORS requests
    pub allow_credentials: bool,
    /// Cache preflight requests for this many seconds
    pub max_age: Option<u64>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![CorsOrigin::Wildcard],
            allow_credentials: false,
            max_age: Some(3600), // Cache preflight for 1 hour
        }
    }
}

/// CORS origin specification.
///
/// Can be either a wildcard (`*`) to allow all origins, or a specific URL.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum CorsOrigin {
    /// Allow all origins (`*`)
    #[serde(deserialize_with = "parse_wildcard", serialize_with = "serialize_wildcard")]
    Wildcard,
    /// Specific origin URL (e.g., `https://app.example.com`)
    #[serde(deserialize_with = "parse_url")]
    Url(Url),
}

fn parse_wildcard<'de, D>(deserializer: D) -> Result<(), D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    if s == "*" {
        Ok(())
    } else {
        Err(serde::de::Error::custom("Expected '*'"))
    }
}

fn serialize_wildcard<S>(serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str("*")
}

fn parse_url<'de, D>(deserializer: D) -> Result<Url, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    Url::parse(&s).map_err(serde::de::Error::custom)
}

/// Request size limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    /// Maximum request body size in bytes, including image uploads
    pub max_upload_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: 50 * 1024 * 1024, // 50 MB
        }
    }
}

/// Bounds on the per-session "last uploaded image" slots.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct UploadsConfig {
    /// A session's slot is dropped after this long without an upload or describe
    #[serde(with = "humantime_serde")]
    pub session_ttl: Duration,
    /// Most sessions remembered at once; the least recently used are evicted first
    pub max_sessions: u64,
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            session_ttl: Duration::from_secs(60 * 60), // 1 hour
            max_sessions: 10_000,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 9000,
            database_url: None,
            database: DatabaseConfig::default(),
            storage: StorageConfig::default(),
            describer: DescriberConfig::default(),
            auth: AuthConfig::default(),
            email: EmailConfig::default(),
            cors: CorsConfig::default(),
            limits: LimitsConfig::default(),
            uploads: UploadsConfig::default(),
            enable_otel_export: false,
        }
    }
}

/// Marks a configured secret without printing it
fn redacted(secret: Option<&str>) -> Option<&'static str> {
    secret.map(|_| "<redacted>")
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &redacted(self.secret_access_key.as_deref()))
            .field("endpoint_url", &self.endpoint_url)
            .field("public_base_url", &self.public_base_url)
            .finish()
    }
}

impl fmt::Debug for DescriberConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DescriberConfig")
            .field("api_key", &redacted(self.api_key.as_deref()))
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .field("prompt", &self.prompt)
            .field("timeout", &self.timeout)
            .field("require_image_url", &self.require_image_url)
            .finish()
    }
}

impl fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &redacted(Some(&self.password).filter(|p| !p.is_empty()).map(String::as_str)))
            .field("use_tls", &self.use_tls)
            .finish()
    }
}

/// Plain (unprefixed) environment variable names and the config keys they set
const PLAIN_ENV_KEYS: &[(&str, &str)] = &[
    ("PORT", "port"),
    ("REGION", "storage.region"),
    ("BUCKET_NAME", "storage.bucket"),
    ("ACCESS_KEY", "storage.access_key_id"),
    ("SECRET_KEY", "storage.secret_access_key"),
    ("OPENAI_API_KEY", "describer.api_key"),
    ("EMAIL", "email.smtp.username"),
    ("EMAIL_PASSWORD", "email.smtp.password"),
];

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let mut config: Self = Self::figment(args).extract()?;

        // if database_url is set, use it (preserving existing pool settings)
        if let Some(url) = config.database_url.take() {
            let pool = config.database.pool_settings().cloned().unwrap_or_default();
            config.database = DatabaseConfig::External { url, pool };
        }

        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        if self.describer.api_key.as_deref().is_none_or(|k| k.trim().is_empty()) {
            return Err(Error::Internal {
                operation: "Config validation: describer.api_key is not set. \
                     Set OPENAI_API_KEY or IMGSCRIBE_DESCRIBER__API_KEY."
                    .to_string(),
            });
        }

        if self.describer.default_model.trim().is_empty() {
            return Err(Error::Internal {
                operation: "Config validation: describer.default_model cannot be empty".to_string(),
            });
        }

        if self.storage.bucket.trim().is_empty() {
            return Err(Error::Internal {
                operation: "Config validation: storage.bucket is not set. Set BUCKET_NAME or IMGSCRIBE_STORAGE__BUCKET.".to_string(),
            });
        }

        if self.storage.region.trim().is_empty() {
            return Err(Error::Internal {
                operation: "Config validation: storage.region is not set. Set REGION or IMGSCRIBE_STORAGE__REGION.".to_string(),
            });
        }

        if self.storage.access_key_id.is_some() != self.storage.secret_access_key.is_some() {
            return Err(Error::Internal {
                operation: "Config validation: storage.access_key_id and storage.secret_access_key must be set together".to_string(),
            });
        }

        if self.email.transport() == EmailTransport::Smtp && (self.email.smtp.username.is_empty() || self.email.smtp.password.is_empty())
        {
            return Err(Error::Internal {
                operation: "Config validation: SMTP transport requires email.smtp.username and email.smtp.password \
                     (EMAIL / EMAIL_PASSWORD)."
                    .to_string(),
            });
        }

        // Validate password requirements
        let password = &self.auth.password;
        if password.min_length < 1 {
            return Err(Error::Internal {
                operation: "Config validation: Invalid password configuration: min_length must be at least 1".to_string(),
            });
        }
        if password.min_length > password.max_length {
            return Err(Error::Internal {
                operation: format!(
                    "Config validation: Invalid password configuration: min_length ({}) cannot be greater than max_length ({})",
                    password.min_length, password.max_length
                ),
            });
        }

        if self.auth.otp.ttl.is_zero() {
            return Err(Error::Internal {
                operation: "Config validation: auth.otp.ttl must be greater than zero".to_string(),
            });
        }

        if self.uploads.session_ttl.is_zero() || self.uploads.max_sessions == 0 {
            return Err(Error::Internal {
                operation: "Config validation: uploads.session_ttl and uploads.max_sessions must be greater than zero".to_string(),
            });
        }

        if self.limits.max_upload_bytes == 0 {
            return Err(Error::Internal {
                operation: "Config validation: limits.max_upload_bytes cannot be 0".to_string(),
            });
        }

        // Validate that wildcard is not used with credentials
        let has_wildcard = self.cors.allowed_origins.iter().any(|origin| matches!(origin, CorsOrigin::Wildcard));
        if has_wildcard && self.cors.allow_credentials {
            return Err(Error::Internal {
                operation: "Config validation: CORS cannot use wildcard origin '*' with allow_credentials=true. Specify explicit origins."
                    .to_string(),
            });
        }

        Ok(())
    }

    pub fn figment(args: &Args) -> Figment {
        let mut figment = Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config));

        for &(var, key) in PLAIN_ENV_KEYS {
            figment = figment.merge(Env::raw().only(&[var]).map(move |_| key.into()));
        }

        figment
            .merge(Env::prefixed("IMGSCRIBE_").ignore(&["CONFIG"]).split("__"))
            .merge(Env::raw().only(&["DATABASE_URL"]))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    const MINIMAL: &str = r#"
storage:
  bucket: images
  region: eu-west-1
describer:
  api_key: sk-test
"#;

    fn args() -> Args {
        Args {
            config: "test.yaml".to_string(),
            validate: false,
        }
    }

    #[test]
    fn test_minimal_config_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file("test.yaml", MINIMAL)?;

            let config = Config::load(&args())?;

            assert_eq!(config.port, 9000);
            assert_eq!(config.storage.bucket, "images");
            assert_eq!(config.storage.region, "eu-west-1");
            assert_eq!(config.describer.default_model, "gpt-4o");
            assert_eq!(config.describer.prompt, "What's in this image?");
            assert!(config.describer.require_image_url);
            assert_eq!(config.auth.otp.ttl, Duration::from_secs(3600));
            assert_eq!(config.email.transport(), EmailTransport::File);
            assert_eq!(config.limits.max_upload_bytes, 50 * 1024 * 1024);
            assert_eq!(config.uploads.session_ttl, Duration::from_secs(3600));
            assert_eq!(config.uploads.max_sessions, 10_000);
            assert!(matches!(config.database, DatabaseConfig::External { .. }));

            Ok(())
        });
    }

    #[test]
    fn test_env_override() {
        Jail::expect_with(|jail| {
            jail.create_file("test.yaml", MINIMAL)?;

            jail.set_env("IMGSCRIBE_HOST", "127.0.0.1");
            jail.set_env("IMGSCRIBE_PORT", "8080");
            jail.set_env("IMGSCRIBE_DESCRIBER__DEFAULT_MODEL", "gpt-4o-mini");
            jail.set_env("IMGSCRIBE_AUTH__OTP__TTL", "15m");

            let config = Config::load(&args())?;

            assert_eq!(config.host, "127.0.0.1");
            assert_eq!(config.port, 8080);
            assert_eq!(config.describer.default_model, "gpt-4o-mini");
            assert_eq!(config.auth.otp.ttl, Duration::from_secs(15 * 60));

            Ok(())
        });
    }

    #[test]
    fn test_plain_env_names() {
        Jail::expect_with(|jail| {
            jail.create_file("test.yaml", "host: 0.0.0.0\n")?;

            jail.set_env("PORT", "9100");
            jail.set_env("REGION", "us-east-2");
            jail.set_env("BUCKET_NAME", "legacy-bucket");
            jail.set_env("ACCESS_KEY", "AKIAEXAMPLE");
            jail.set_env("SECRET_KEY", "secret");
            jail.set_env("OPENAI_API_KEY", "sk-legacy");
            jail.set_env("EMAIL", "sender@example.com");
            jail.set_env("EMAIL_PASSWORD", "app-password");

            let config = Config::load(&args())?;

            assert_eq!(config.port, 9100);
            assert_eq!(config.storage.region, "us-east-2");
            assert_eq!(config.storage.bucket, "legacy-bucket");
            assert_eq!(config.storage.access_key_id.as_deref(), Some("AKIAEXAMPLE"));
            assert_eq!(config.storage.secret_access_key.as_deref(), Some("secret"));
            assert_eq!(config.describer.api_key.as_deref(), Some("sk-legacy"));
            assert_eq!(config.email.smtp.username, "sender@example.com");
            assert_eq!(config.email.smtp.password, "app-password");
            assert_eq!(config.email.sender(), "sender@example.com");

            Ok(())
        });
    }

    #[test]
    fn test_email_credentials_select_smtp() {
        Jail::expect_with(|jail| {
            jail.create_file("test.yaml", MINIMAL)?;

            jail.set_env("EMAIL", "sender@gmail.com");
            jail.set_env("EMAIL_PASSWORD", "app-password");

            let config = Config::load(&args())?;
            assert_eq!(config.email.transport(), EmailTransport::Smtp);
            assert_eq!(config.email.smtp.host, "smtp.gmail.com");

            Ok(())
        });
    }

    #[test]
    fn test_explicit_file_transport_wins_over_credentials() {
        Jail::expect_with(|jail| {
            jail.create_file("test.yaml", &format!("{MINIMAL}email:\n  transport: file\n"))?;

            jail.set_env("EMAIL", "sender@gmail.com");
            jail.set_env("EMAIL_PASSWORD", "app-password");

            let config = Config::load(&args())?;
            assert_eq!(config.email.transport(), EmailTransport::File);

            Ok(())
        });
    }

    #[test]
    fn test_email_without_password_fails_validation() {
        Jail::expect_with(|jail| {
            jail.create_file("test.yaml", MINIMAL)?;

            jail.set_env("EMAIL", "sender@gmail.com");

            let err = Config::load(&args()).unwrap_err();
            assert!(err.to_string().contains("SMTP transport requires"), "{err}");

            Ok(())
        });
    }

    #[test]
    fn test_prefixed_env_beats_plain_env() {
        Jail::expect_with(|jail| {
            jail.create_file("test.yaml", MINIMAL)?;

            jail.set_env("PORT", "9100");
            jail.set_env("IMGSCRIBE_PORT", "9200");

            let config = Config::load(&args())?;
            assert_eq!(config.port, 9200);

            Ok(())
        });
    }

    #[test]
    fn test_database_url_selects_external_database() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
storage:
  bucket: images
  region: eu-west-1
describer:
  api_key: sk-test
database:
  type: memory
"#,
            )?;
            jail.set_env("DATABASE_URL", "postgres://db.internal/imgscribe");

            let config = Config::load(&args())?;

            match config.database {
                DatabaseConfig::External { url, pool } => {
                    assert_eq!(url, "postgres://db.internal/imgscribe");
                    assert_eq!(pool.max_connections, 10);
                }
                DatabaseConfig::Memory => panic!("expected external database"),
            }

            Ok(())
        });
    }

    #[test]
    fn test_memory_database() {
        Jail::expect_with(|jail| {
            jail.create_file("test.yaml", &format!("{MINIMAL}database:\n  type: memory\n"))?;

            let config = Config::load(&args())?;
            assert!(matches!(config.database, DatabaseConfig::Memory));
            assert!(config.database.pool_settings().is_none());

            Ok(())
        });
    }

    #[test]
    fn test_missing_api_key_fails_validation() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
storage:
  bucket: images
  region: eu-west-1
"#,
            )?;

            let err = Config::load(&args()).unwrap_err();
            assert!(err.to_string().contains("describer.api_key"), "{err}");

            Ok(())
        });
    }

    #[test]
    fn test_missing_bucket_fails_validation() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
storage:
  region: eu-west-1
describer:
  api_key: sk-test
"#,
            )?;

            let err = Config::load(&args()).unwrap_err();
            assert!(err.to_string().contains("storage.bucket"), "{err}");

            Ok(())
        });
    }

    #[test]
    fn test_smtp_requires_credentials() {
        Jail::expect_with(|jail| {
            jail.create_file("test.yaml", &format!("{MINIMAL}email:\n  transport: smtp\n"))?;

            let err = Config::load(&args()).unwrap_err();
            assert!(err.to_string().contains("SMTP transport requires"), "{err}");

            Ok(())
        });
    }

    #[test]
    fn test_debug_output_redacts_secrets() {
        let mut config = Config::default();
        config.describer.api_key = Some("sk-live-123".to_string());
        config.storage.access_key_id = Some("AKIAEXAMPLE".to_string());
        config.storage.secret_access_key = Some("s3-secret-456".to_string());
        config.email.smtp.username = "sender@example.com".to_string();
        config.email.smtp.password = "smtp-secret-789".to_string();

        let printed = format!("{config:#?}");

        for secret in ["sk-live-123", "s3-secret-456", "smtp-secret-789"] {
            assert!(!printed.contains(secret), "{secret} leaked into {printed}");
        }
        assert!(printed.contains("<redacted>"));
        assert!(printed.contains("AKIAEXAMPLE"));
        assert!(printed.contains("sender@example.com"));
    }

    #[test]
    fn test_half_configured_storage_credentials_rejected() {
        let mut config = Config::default();
        config.describer.api_key = Some("sk-test".to_string());
        config.storage.bucket = "images".to_string();
        config.storage.region = "eu-west-1".to_string();
        config.storage.access_key_id = Some("AKIA".to_string());

        assert!(config.validate().is_err());

        config.storage.secret_access_key = Some("secret".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_wildcard_cors_with_credentials_rejected() {
        let mut config = Config::default();
        config.describer.api_key = Some("sk-test".to_string());
        config.storage.bucket = "images".to_string();
        config.storage.region = "eu-west-1".to_string();
        config.cors.allow_credentials = true;

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("wildcard"));
    }

    #[test]
    fn test_password_bounds_validated() {
        let mut config = Config::default();
        config.describer.api_key = Some("sk-test".to_string());
        config.storage.bucket = "images".to_string();
        config.storage.region = "eu-west-1".to_string();
        config.auth.password.min_length = 100;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_uploads_section_parses_and_is_validated() {
        Jail::expect_with(|jail| {
            jail.create_file("test.yaml", &format!("{MINIMAL}uploads:\n  session_ttl: 15m\n  max_sessions: 250\n"))?;

            let config = Config::load(&args())?;
            assert_eq!(config.uploads.session_ttl, Duration::from_secs(15 * 60));
            assert_eq!(config.uploads.max_sessions, 250);

            jail.create_file("test.yaml", &format!("{MINIMAL}uploads:\n  max_sessions: 0\n"))?;
            let err = Config::load(&args()).unwrap_err();
            assert!(err.to_string().contains("uploads.max_sessions"), "{err}");

            Ok(())
        });
    }
}

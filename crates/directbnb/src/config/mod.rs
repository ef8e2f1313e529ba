use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use url::Url;

/// Upper bound for `VERIFICATION_TOKEN_TTL_HOURS`: one year.
pub const MAX_TOKEN_TTL_HOURS: u64 = 24 * 365;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub site: SiteConfig,
    pub stripe: StripeConfig,
    pub cloudflare: CloudflareConfig,
    pub scraper: ScraperConfig,
    pub theme: ThemeBuildConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let log_format = LogFormat::from_str(
            &env::var("APP_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string()),
        );

        let raw_site_url =
            env::var("SITE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
        let site_url = Url::parse(raw_site_url.trim()).map_err(|source| {
            ConfigError::InvalidSiteUrl {
                value: raw_site_url.clone(),
                source,
            }
        })?;

        let site = SiteConfig {
            site_url,
            admin_token: optional_var("ADMIN_API_TOKEN"),
            email_blacklist: env::var("EMAIL_BLACKLIST")
                .map(|raw| parse_list(&raw))
                .unwrap_or_default(),
            verification_token_ttl_hours: bounded_var(
                "VERIFICATION_TOKEN_TTL_HOURS",
                72,
                MAX_TOKEN_TTL_HOURS,
            )?,
        };

        let stripe = StripeConfig {
            secret_key: optional_var("STRIPE_SECRET_KEY"),
            webhook_secret: optional_var("STRIPE_WEBHOOK_SECRET"),
            api_base: env::var("STRIPE_API_BASE")
                .unwrap_or_else(|_| "https://api.stripe.com".to_string()),
            webhook_tolerance_secs: positive_var("STRIPE_WEBHOOK_TOLERANCE_SECS", 300)?,
            currency: optional_var("STRIPE_CURRENCY")
                .map(|value| value.to_ascii_lowercase())
                .unwrap_or_else(|| "eur".to_string()),
            timeout_secs: positive_var("STRIPE_TIMEOUT_SECS", 80)?,
        };

        let cloudflare = CloudflareConfig {
            account_id: optional_var("CLOUDFLARE_ACCOUNT_ID"),
            api_token: optional_var("CLOUDFLARE_API_TOKEN"),
            api_base: env::var("CLOUDFLARE_API_BASE")
                .unwrap_or_else(|_| "https://api.cloudflare.com/client/v4".to_string()),
            timeout_secs: positive_var("CLOUDFLARE_TIMEOUT_SECS", 300)?,
        };

        let scraper = ScraperConfig {
            endpoint: optional_var("SCRAPER_ENDPOINT"),
            proxy_url: optional_var("SCRAPE_PROXY_URL"),
            timeout_secs: positive_var("SCRAPER_TIMEOUT_SECS", 120)?,
        };

        let theme = ThemeBuildConfig {
            theme_dir: PathBuf::from(
                env::var("THEME_DIR").unwrap_or_else(|_| "../themes/theme-mountain".to_string()),
            ),
            build_command: env::var("THEME_BUILD_COMMAND")
                .unwrap_or_else(|_| "bun run build".to_string()),
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                format: log_format,
            },
            site,
            stripe,
            cloudflare,
            scraper,
            theme,
        })
    }
}

fn optional_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn positive_var(key: &'static str, default: u64) -> Result<u64, ConfigError> {
    match optional_var(key) {
        None => Ok(default),
        Some(raw) => match raw.parse::<u64>() {
            Ok(value) if value > 0 => Ok(value),
            _ => Err(ConfigError::InvalidNumber { key, value: raw }),
        },
    }
}

fn bounded_var(key: &'static str, default: u64, max: u64) -> Result<u64, ConfigError> {
    let value = positive_var(key, default)?;
    if value > max {
        return Err(ConfigError::OutOfRange { key, value, max });
    }
    Ok(value)
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|item| item.trim().to_ascii_lowercase())
        .filter(|item| !item.is_empty())
        .collect()
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Output flavour for the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Pretty,
}

impl LogFormat {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "pretty" => Self::Pretty,
            _ => Self::Compact,
        }
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub format: LogFormat,
}

/// Public facing site settings shared by emails, checkout redirects and access control.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    pub site_url: Url,
    pub admin_token: Option<String>,
    pub email_blacklist: Vec<String>,
    pub verification_token_ttl_hours: u64,
}

impl SiteConfig {
    /// Joins a site-relative path onto the configured public URL.
    pub fn absolute(&self, path: &str) -> String {
        let base = self.site_url.as_str().trim_end_matches('/');
        format!("{base}/{}", path.trim_start_matches('/'))
    }
}

#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub secret_key: Option<String>,
    pub webhook_secret: Option<String>,
    pub api_base: String,
    pub webhook_tolerance_secs: u64,
    /// Used for line items whose package carries no currency.
    pub currency: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct CloudflareConfig {
    pub account_id: Option<String>,
    pub api_token: Option<String>,
    pub api_base: String,
    /// Bounds every Pages API call, uploads included.
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct ScraperConfig {
    pub endpoint: Option<String>,
    pub proxy_url: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct ThemeBuildConfig {
    pub theme_dir: PathBuf,
    pub build_command: String,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost {
        source: std::net::AddrParseError,
    },
    InvalidSiteUrl {
        value: String,
        source: url::ParseError,
    },
    InvalidNumber {
        key: &'static str,
        value: String,
    },
    OutOfRange {
        key: &'static str,
        value: u64,
        max: u64,
    },
    Missing(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidSiteUrl { value, .. } => {
                write!(f, "SITE_URL '{value}' is not an absolute URL")
            }
            ConfigError::InvalidNumber { key, value } => {
                write!(f, "{key} must be a positive integer (found '{value}')")
            }
            ConfigError::OutOfRange { key, value, max } => {
                write!(f, "{key} must be at most {max} (found {value})")
            }
            ConfigError::Missing(key) => write!(f, "{key} must be set"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidSiteUrl { source, .. } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidNumber { .. }
            | ConfigError::OutOfRange { .. }
            | ConfigError::Missing(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for key in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "APP_LOG_FORMAT",
            "SITE_URL",
            "EMAIL_BLACKLIST",
            "VERIFICATION_TOKEN_TTL_HOURS",
            "STRIPE_WEBHOOK_TOLERANCE_SECS",
            "STRIPE_CURRENCY",
            "STRIPE_TIMEOUT_SECS",
            "CLOUDFLARE_TIMEOUT_SECS",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.telemetry.format, LogFormat::Compact);
        assert_eq!(config.site.verification_token_ttl_hours, 72);
        assert_eq!(config.stripe.webhook_tolerance_secs, 300);
        assert_eq!(config.stripe.currency, "eur");
        assert_eq!(config.stripe.timeout_secs, 80);
        assert_eq!(config.cloudflare.timeout_secs, 300);
        assert_eq!(config.scraper.timeout_secs, 120);
        assert!(config.site.email_blacklist.is_empty());
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        env::remove_var("APP_HOST");
    }

    #[test]
    fn parses_blacklist_and_rejects_zero_ttl() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("EMAIL_BLACKLIST", " Mailinator.com, ,tempmail.io");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(
            config.site.email_blacklist,
            vec!["mailinator.com".to_string(), "tempmail.io".to_string()]
        );

        env::set_var("VERIFICATION_TOKEN_TTL_HOURS", "0");
        match AppConfig::load() {
            Err(ConfigError::InvalidNumber { key, .. }) => {
                assert_eq!(key, "VERIFICATION_TOKEN_TTL_HOURS")
            }
            other => panic!("expected invalid number, got {other:?}"),
        }
        reset_env();
    }

    #[test]
    fn rejects_token_ttl_beyond_one_year() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("VERIFICATION_TOKEN_TTL_HOURS", "18446744073709551615");
        match AppConfig::load() {
            Err(ConfigError::OutOfRange { key, max, .. }) => {
                assert_eq!(key, "VERIFICATION_TOKEN_TTL_HOURS");
                assert_eq!(max, MAX_TOKEN_TTL_HOURS);
            }
            other => panic!("expected out of range, got {other:?}"),
        }

        env::set_var("VERIFICATION_TOKEN_TTL_HOURS", "8760");
        let config = AppConfig::load().expect("one year is accepted");
        assert_eq!(config.site.verification_token_ttl_hours, MAX_TOKEN_TTL_HOURS);
        reset_env();
    }

    #[test]
    fn absolute_joins_paths_without_double_slashes() {
        let site = SiteConfig {
            site_url: Url::parse("https://directbnb.example/").expect("url"),
            admin_token: None,
            email_blacklist: Vec::new(),
            verification_token_ttl_hours: 1,
        };
        assert_eq!(
            site.absolute("/users/verify-email/abc"),
            "https://directbnb.example/users/verify-email/abc"
        );
    }
}

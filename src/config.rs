/*
 * Responsibility
 * - 環境変数の読み込み (REDIS_URL, IdP 接続情報, ヘッダー名, CORS 許可など)
 * - 設定値のバリデーション (不足・不正なら起動失敗)
 * - lookup 関数経由でテスト可能にする (プロセス環境を書き換えない)
 */
use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use axum::http::HeaderName;

use crate::services::authz::{Decision, ExchangeStrategy, HeaderKeys, decision::reason};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeMode {
    Delegated,
    Simple,
    Disabled,
}

/// What to do when a check request carries no credential at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingCredentialPolicy {
    /// 401 / denied.
    Deny,
    /// 200 / ok, with no identity headers.
    Allow,
}

impl MissingCredentialPolicy {
    /// Decision for a request without an `Authorization` header. A header
    /// that is present, even blank, goes through the engine instead.
    pub fn decision(self) -> Decision {
        match self {
            Self::Deny => Decision::deny(reason::MISSING_HEADER),
            Self::Allow => Decision::allow_anonymous(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Clone)]
pub struct IdpConfig {
    pub issuer: String,
    pub client_id: String,
    pub client_secret: String,
    pub organization_id: String,
    pub admin_pat: String,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl fmt::Debug for IdpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdpConfig")
            .field("issuer", &self.issuer)
            .field("client_id", &self.client_id)
            .field("organization_id", &self.organization_id)
            .field("admin_pat_set", &!self.admin_pat.is_empty())
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,
    pub request_timeout: Duration,
    pub cors_allowed_origins: Vec<String>,

    pub redis_url: String,
    pub cache_ttl: Duration,
    pub cache_key_prefix: String,

    pub idp: IdpConfig,
    pub exchange_mode: ExchangeMode,
    pub missing_credential_policy: MissingCredentialPolicy,
    pub header_keys: HeaderKeys,

    pub log_level: String,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from `lookup`; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let require = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let port: u16 = parse_or(&get, "PORT", 8080)?;
        let addr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = AppEnv::parse(&get("APP_ENV").unwrap_or_else(|| "development".into()));

        let request_timeout = Duration::from_secs(positive(
            parse_or(&get, "REQUEST_TIMEOUT_SECONDS", 30)?,
            "REQUEST_TIMEOUT_SECONDS",
        )?);

        let cors_allowed_origins = get("CORS_ALLOWED_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        let redis_url = require("REDIS_URL")?;
        check_url(&redis_url, &["redis", "rediss"], "REDIS_URL")?;

        let cache_ttl = Duration::from_secs(positive(
            parse_or(&get, "CACHE_TTL_SECONDS", 300)?,
            "CACHE_TTL_SECONDS",
        )?);
        let cache_key_prefix = get("CACHE_KEY_PREFIX").unwrap_or_else(|| "authz:pat".into());

        let issuer = require("IDP_ISSUER")?;
        check_url(&issuer, &["http", "https"], "IDP_ISSUER")?;
        let idp = IdpConfig {
            issuer: issuer.trim_end_matches('/').to_string(),
            client_id: require("IDP_CLIENT_ID")?,
            client_secret: require("IDP_CLIENT_SECRET")?,
            organization_id: get("IDP_ORGANIZATION_ID").unwrap_or_default(),
            admin_pat: get("IDP_ADMIN_PAT").unwrap_or_default(),
            timeout: Duration::from_secs(positive(
                parse_or(&get, "IDP_TIMEOUT_SECONDS", 10)?,
                "IDP_TIMEOUT_SECONDS",
            )?),
            max_retries: parse_or(&get, "IDP_MAX_RETRIES", 2)?,
        };

        let exchange_mode = match get("EXCHANGE_MODE")
            .unwrap_or_else(|| "delegated".into())
            .to_ascii_lowercase()
            .as_str()
        {
            "delegated" => ExchangeMode::Delegated,
            "simple" => ExchangeMode::Simple,
            "disabled" => ExchangeMode::Disabled,
            _ => return Err(ConfigError::Invalid("EXCHANGE_MODE")),
        };
        if exchange_mode == ExchangeMode::Delegated && idp.admin_pat.is_empty() {
            return Err(ConfigError::Missing("IDP_ADMIN_PAT"));
        }

        let missing_credential_policy = match get("MISSING_CREDENTIAL_POLICY")
            .unwrap_or_else(|| "deny".into())
            .to_ascii_lowercase()
            .as_str()
        {
            "deny" => MissingCredentialPolicy::Deny,
            "allow" => MissingCredentialPolicy::Allow,
            _ => return Err(ConfigError::Invalid("MISSING_CREDENTIAL_POLICY")),
        };

        let defaults = HeaderKeys::default();
        let header_keys = HeaderKeys {
            user_id: header_key(&get, "HEADER_KEY_USER_ID", &defaults.user_id)?,
            user_email: header_key(&get, "HEADER_KEY_USER_EMAIL", &defaults.user_email)?,
            user_groups: header_key(&get, "HEADER_KEY_USER_GROUPS", &defaults.user_groups)?,
            user_preferred_username: header_key(
                &get,
                "HEADER_KEY_USER_PREFERRED_USERNAME",
                &defaults.user_preferred_username,
            )?,
            user_jwt: header_key(&get, "HEADER_KEY_USER_JWT", &defaults.user_jwt)?,
        };
        let distinct: HashSet<&str> = header_keys.names().into_iter().collect();
        if distinct.len() != header_keys.names().len() {
            return Err(ConfigError::Invalid("HEADER_KEY_*"));
        }

        let log_level = get("LOG_LEVEL").unwrap_or_else(|| "info".into());
        let log_format = match get("LOG_FORMAT")
            .unwrap_or_else(|| "pretty".into())
            .to_ascii_lowercase()
            .as_str()
        {
            "pretty" | "text" => LogFormat::Pretty,
            "json" => LogFormat::Json,
            _ => return Err(ConfigError::Invalid("LOG_FORMAT")),
        };

        Ok(Self {
            addr,
            app_env,
            request_timeout,
            cors_allowed_origins,
            redis_url,
            cache_ttl,
            cache_key_prefix,
            idp,
            exchange_mode,
            missing_credential_policy,
            header_keys,
            log_level,
            log_format,
        })
    }

    pub fn exchange_strategy(&self) -> ExchangeStrategy {
        match self.exchange_mode {
            ExchangeMode::Delegated => ExchangeStrategy::Delegated {
                actor_token: self.idp.admin_pat.clone(),
            },
            ExchangeMode::Simple => ExchangeStrategy::Simple,
            ExchangeMode::Disabled => ExchangeStrategy::Disabled,
        }
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}

fn positive(value: u64, key: &'static str) -> Result<u64, ConfigError> {
    if value == 0 {
        return Err(ConfigError::Invalid(key));
    }
    Ok(value)
}

fn check_url(raw: &str, schemes: &[&str], key: &'static str) -> Result<(), ConfigError> {
    let url = url::Url::parse(raw).map_err(|_| ConfigError::Invalid(key))?;
    if !schemes.contains(&url.scheme()) {
        return Err(ConfigError::Invalid(key));
    }
    Ok(())
}

/// Lower-cased, validated header name.
fn header_key<G>(get: &G, key: &'static str, default: &str) -> Result<String, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let raw = get(key).unwrap_or_else(|| default.to_string());
    HeaderName::from_bytes(raw.as_bytes())
        .map(|name| name.as_str().to_string())
        .map_err(|_| ConfigError::Invalid(key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("REDIS_URL", "redis://localhost:6379"),
            ("IDP_ISSUER", "https://idp.example.com/"),
            ("IDP_CLIENT_ID", "client"),
            ("IDP_CLIENT_SECRET", "secret"),
            ("IDP_ADMIN_PAT", "admin-pat"),
        ])
    }

    fn load(vars: &HashMap<&'static str, &'static str>) -> Result<Config, ConfigError> {
        Config::from_lookup(|k| vars.get(k).map(|v| v.to_string()))
    }

    #[test]
    fn applies_defaults() {
        let config = load(&base()).unwrap();

        assert_eq!(config.addr.port(), 8080);
        assert_eq!(config.app_env, AppEnv::Development);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.cache_ttl, Duration::from_secs(300));
        assert_eq!(config.cache_key_prefix, "authz:pat");
        assert_eq!(config.idp.issuer, "https://idp.example.com");
        assert_eq!(config.idp.max_retries, 2);
        assert_eq!(config.exchange_mode, ExchangeMode::Delegated);
        assert_eq!(config.missing_credential_policy, MissingCredentialPolicy::Deny);
        assert_eq!(config.header_keys, HeaderKeys::default());
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.cors_allowed_origins.is_empty());
        assert_eq!(
            config.exchange_strategy(),
            ExchangeStrategy::Delegated {
                actor_token: "admin-pat".into()
            }
        );
    }

    #[test]
    fn missing_required_values_fail() {
        for key in ["REDIS_URL", "IDP_ISSUER", "IDP_CLIENT_ID", "IDP_CLIENT_SECRET"] {
            let mut vars = base();
            vars.remove(key);
            assert!(
                matches!(load(&vars), Err(ConfigError::Missing(k)) if k == key),
                "{key}"
            );
        }
    }

    #[test]
    fn delegated_mode_requires_admin_pat() {
        let mut vars = base();
        vars.insert("IDP_ADMIN_PAT", "  ");

        assert!(matches!(
            load(&vars),
            Err(ConfigError::Missing("IDP_ADMIN_PAT"))
        ));

        vars.insert("EXCHANGE_MODE", "simple");
        let config = load(&vars).unwrap();
        assert_eq!(config.exchange_strategy(), ExchangeStrategy::Simple);
    }

    #[test]
    fn malformed_values_fail() {
        let cases = [
            ("PORT", "http"),
            ("CACHE_TTL_SECONDS", "0"),
            ("CACHE_TTL_SECONDS", "-5"),
            ("REDIS_URL", "localhost:6379"),
            ("IDP_ISSUER", "ftp://idp"),
            ("EXCHANGE_MODE", "magic"),
            ("MISSING_CREDENTIAL_POLICY", "maybe"),
            ("HEADER_KEY_USER_ID", "bad header"),
            ("LOG_FORMAT", "xml"),
        ];
        for (key, value) in cases {
            let mut vars = base();
            vars.insert(key, value);
            assert!(matches!(load(&vars), Err(ConfigError::Invalid(_))), "{key}={value}");
        }
    }

    #[test]
    fn header_keys_are_normalized_and_must_be_distinct() {
        let mut vars = base();
        vars.insert("HEADER_KEY_USER_ID", "X-Auth-User");
        assert_eq!(load(&vars).unwrap().header_keys.user_id, "x-auth-user");

        vars.insert("HEADER_KEY_USER_EMAIL", "x-auth-user");
        assert!(matches!(load(&vars), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn parses_overrides() {
        let mut vars = base();
        vars.extend([
            ("PORT", "9090"),
            ("APP_ENV", "prod"),
            ("CORS_ALLOWED_ORIGINS", "https://a.example, ,https://b.example"),
            ("MISSING_CREDENTIAL_POLICY", "allow"),
            ("EXCHANGE_MODE", "disabled"),
            ("LOG_FORMAT", "json"),
        ]);

        let config = load(&vars).unwrap();

        assert_eq!(config.addr.port(), 9090);
        assert!(config.app_env.is_production());
        assert_eq!(
            config.cors_allowed_origins,
            vec!["https://a.example", "https://b.example"]
        );
        assert_eq!(config.missing_credential_policy, MissingCredentialPolicy::Allow);
        assert_eq!(config.exchange_strategy(), ExchangeStrategy::Disabled);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn missing_credential_policy_decides_absent_header() {
        assert_eq!(
            MissingCredentialPolicy::Deny.decision(),
            Decision::deny("missing authorization header")
        );
        assert_eq!(
            MissingCredentialPolicy::Allow.decision(),
            Decision::allow_anonymous()
        );
    }
}

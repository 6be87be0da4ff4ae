//! # Configuration Management
//!
//! This module handles loading configuration from environment variables.
//! It uses the "12-factor app" methodology where configuration comes from the environment.
//!
//! ## Environment Variables
//! - `HOST`: Server bind address (default: 127.0.0.1)
//! - `PORT`: Server port (default: 3005)
//! - `DATABASE_URL`: SQLite database for credentials and HTTP sessions
//! - `SESSION_TTL_DAYS`: How long an HTTP session lives (default: 7)
//! - `RP_ID`: WebAuthn Relying Party ID (usually your domain)
//! - `RP_NAME`: Human-readable name for your service
//! - `RP_ORIGIN`: Expected origin, `scheme://host[:port]`, matched exactly
//! - `RP_ALGORITHMS`: Allowed key algorithms in preference order (`ES256,RS256`)
//! - `USER_VERIFICATION`: `required`, `preferred` or `discouraged`
//! - `CHALLENGE_LENGTH`: Challenge size in bytes (at least 16, default 64)
//! - `CEREMONY_TIMEOUT_MS`: Timeout hint handed to the browser (default 60000)
//! - `CEREMONY_TTL_SECS`: How long an issued challenge stays valid (default 300)
//! - `CHALLENGE_POLICY`: `single-attempt` or `retry-until-expiry`

use crate::codec::CoseAlgorithm;
use crate::error::ConfigError;
use anyhow::Result;
use serde::Serialize;
use std::env;
use std::str::FromStr;
use url::Url;

/// How strongly the relying party asks for user verification (PIN, biometric).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UserVerification {
    Required,
    Preferred,
    Discouraged,
}

impl FromStr for UserVerification {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "required" => Ok(UserVerification::Required),
            "preferred" => Ok(UserVerification::Preferred),
            "discouraged" => Ok(UserVerification::Discouraged),
            _ => Err(ConfigError::UnknownUserVerification(s.to_string())),
        }
    }
}

/// What happens to a pending challenge when verification fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengePolicy {
    /// The first verification attempt spends the challenge, pass or fail.
    SingleAttempt,
    /// Failed attempts may be retried until the challenge expires; only a
    /// successful ceremony spends it.
    RetryUntilExpiry,
}

impl FromStr for ChallengePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single-attempt" => Ok(ChallengePolicy::SingleAttempt),
            "retry-until-expiry" => Ok(ChallengePolicy::RetryUntilExpiry),
            _ => Err(ConfigError::UnknownChallengePolicy(s.to_string())),
        }
    }
}

/// Relying party settings shared by every ceremony.
///
/// Built once at startup, validated, then handed around as `Arc<RpConfig>`.
/// Nothing mutates it afterwards.
#[derive(Debug, Clone)]
pub struct RpConfig {
    /// Relying party id, e.g. "localhost" or "example.com"
    pub rp_id: String,

    /// Name shown by the browser during registration
    pub rp_name: String,

    /// Expected `clientData.origin`, serialized as `scheme://host[:port]`
    pub origin: String,

    /// Algorithms offered in `pubKeyCredParams`, in preference order
    pub algorithms: Vec<CoseAlgorithm>,

    pub user_verification: UserVerification,

    /// Random challenge size in bytes
    pub challenge_len: usize,

    /// Timeout hint for the browser, in milliseconds
    pub timeout_ms: u64,

    /// Lifetime of an issued challenge
    pub ceremony_ttl: chrono::Duration,

    pub challenge_policy: ChallengePolicy,
}

impl RpConfig {
    /// Settings with the defaults used by the demo deployment.
    pub fn new(rp_id: &str, rp_name: &str, origin: &str) -> Self {
        Self {
            rp_id: rp_id.to_string(),
            rp_name: rp_name.to_string(),
            origin: origin.to_string(),
            algorithms: vec![CoseAlgorithm::Es256, CoseAlgorithm::Rs256],
            user_verification: UserVerification::Required,
            challenge_len: 64,
            timeout_ms: 60_000,
            ceremony_ttl: chrono::Duration::minutes(5),
            challenge_policy: ChallengePolicy::SingleAttempt,
        }
    }

    /// Check the settings and normalise the origin.
    ///
    /// The origin must be a bare `scheme://host[:port]` and its host must be the
    /// relying party id or a subdomain of it.
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        if self.challenge_len < 16 {
            return Err(ConfigError::ChallengeTooShort(self.challenge_len));
        }
        if self.algorithms.is_empty() {
            return Err(ConfigError::NoAlgorithms);
        }
        // A zero TTL issues challenges that are already expired
        if self.ceremony_ttl <= chrono::Duration::zero() {
            return Err(ConfigError::InvalidCeremonyTtl(self.ceremony_ttl.num_seconds()));
        }

        let url = Url::parse(&self.origin)
            .map_err(|_| ConfigError::InvalidOrigin(self.origin.clone(), "not a URL"))?;
        if !matches!(url.scheme(), "https" | "http") {
            return Err(ConfigError::InvalidOrigin(
                self.origin.clone(),
                "scheme must be https or http",
            ));
        }
        if url.path() != "/" || url.query().is_some() || url.fragment().is_some() {
            return Err(ConfigError::InvalidOrigin(
                self.origin.clone(),
                "origin must not carry a path, query or fragment",
            ));
        }
        let host = url
            .host_str()
            .ok_or_else(|| ConfigError::InvalidOrigin(self.origin.clone(), "missing host"))?
            .to_string();
        if host != self.rp_id && !host.ends_with(&format!(".{}", self.rp_id)) {
            return Err(ConfigError::RpIdNotInOrigin {
                host,
                rp_id: self.rp_id.clone(),
            });
        }

        // Default ports are dropped, matching what browsers put in clientData.
        self.origin = url.origin().ascii_serialization();
        Ok(self)
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host/IP address to bind to
    pub host: String,

    /// Server port number
    pub port: u16,

    /// SQLite connection string, shared by the credential and session stores
    pub database_url: String,

    /// HTTP session lifetime in days
    pub session_ttl_days: i64,

    /// Relying party settings
    pub rp: RpConfig,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// 1. Loads variables from .env file (if present) using dotenvy
    /// 2. Reads each value, falling back to the demo defaults
    /// 3. Validates the relying party part
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut rp = RpConfig::new(
            &env::var("RP_ID").unwrap_or_else(|_| "localhost".to_string()),
            &env::var("RP_NAME").unwrap_or_else(|_| "WebAuthn Demo".to_string()),
            &env::var("RP_ORIGIN").unwrap_or_else(|_| "https://localhost:8000".to_string()),
        );

        if let Ok(list) = env::var("RP_ALGORITHMS") {
            rp.algorithms = parse_algorithms(&list)?;
        }
        if let Ok(uv) = env::var("USER_VERIFICATION") {
            rp.user_verification = uv.parse()?;
        }
        if let Ok(len) = env::var("CHALLENGE_LENGTH") {
            rp.challenge_len = len.parse()?;
        }
        if let Ok(ms) = env::var("CEREMONY_TIMEOUT_MS") {
            rp.timeout_ms = ms.parse()?;
        }
        if let Ok(secs) = env::var("CEREMONY_TTL_SECS") {
            let secs: i64 = secs.parse()?;
            rp.ceremony_ttl = chrono::Duration::try_seconds(secs)
                .ok_or(ConfigError::InvalidCeremonyTtl(secs))?;
        }
        if let Ok(policy) = env::var("CHALLENGE_POLICY") {
            rp.challenge_policy = policy.parse()?;
        }

        Ok(Config {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3005".to_string())
                .parse()?,
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:passkey.db?mode=rwc".to_string()),
            session_ttl_days: env::var("SESSION_TTL_DAYS")
                .unwrap_or_else(|_| "7".to_string())
                .parse()?,
            rp: rp.validate()?,
        })
    }

    /// Get the socket address to bind the server to, e.g. "127.0.0.1:3005"
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Parse a comma separated algorithm list such as `ES256,RS256` or `-7,-257`.
pub fn parse_algorithms(list: &str) -> Result<Vec<CoseAlgorithm>, ConfigError> {
    let mut out = Vec::new();
    for item in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let alg: CoseAlgorithm = item
            .parse()
            .map_err(|_| ConfigError::UnknownAlgorithm(item.to_string()))?;
        if !out.contains(&alg) {
            out.push(alg);
        }
    }
    if out.is_empty() {
        return Err(ConfigError::NoAlgorithms);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let rp = RpConfig::new("localhost", "WebAuthn Demo", "https://localhost:8000")
            .validate()
            .unwrap();
        assert_eq!(rp.origin, "https://localhost:8000");
        assert_eq!(rp.challenge_len, 64);
        assert_eq!(rp.algorithms, vec![CoseAlgorithm::Es256, CoseAlgorithm::Rs256]);
    }

    #[test]
    fn test_default_port_is_dropped_from_origin() {
        let rp = RpConfig::new("example.com", "x", "https://login.example.com:443")
            .validate()
            .unwrap();
        assert_eq!(rp.origin, "https://login.example.com");
    }

    #[test]
    fn test_short_challenge_rejected() {
        let mut rp = RpConfig::new("localhost", "x", "https://localhost");
        rp.challenge_len = 15;
        assert_eq!(rp.validate().unwrap_err(), ConfigError::ChallengeTooShort(15));
    }

    #[test]
    fn test_non_positive_ttl_rejected() {
        for secs in [0, -1, -300] {
            let mut rp = RpConfig::new("localhost", "x", "https://localhost");
            rp.ceremony_ttl = chrono::Duration::seconds(secs);
            assert_eq!(rp.validate().unwrap_err(), ConfigError::InvalidCeremonyTtl(secs));
        }

        let mut rp = RpConfig::new("localhost", "x", "https://localhost");
        rp.ceremony_ttl = chrono::Duration::seconds(1);
        assert!(rp.validate().is_ok());
    }

    #[test]
    fn test_origin_outside_rp_id_rejected() {
        let err = RpConfig::new("example.com", "x", "https://evil-example.com")
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::RpIdNotInOrigin { .. }));
    }

    #[test]
    fn test_origin_with_path_rejected() {
        let err = RpConfig::new("localhost", "x", "https://localhost:8000/wa")
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidOrigin(..)));
    }

    #[test]
    fn test_parse_algorithms() {
        assert_eq!(
            parse_algorithms("RS256, -7, RS256").unwrap(),
            vec![CoseAlgorithm::Rs256, CoseAlgorithm::Es256]
        );
        assert_eq!(
            parse_algorithms("EdDSA").unwrap_err(),
            ConfigError::UnknownAlgorithm("EdDSA".into())
        );
        assert_eq!(parse_algorithms(" , ").unwrap_err(), ConfigError::NoAlgorithms);
    }

    #[test]
    fn test_policy_and_uv_parse() {
        assert_eq!(
            "retry-until-expiry".parse::<ChallengePolicy>().unwrap(),
            ChallengePolicy::RetryUntilExpiry
        );
        assert_eq!(
            "Preferred".parse::<UserVerification>().unwrap(),
            UserVerification::Preferred
        );
    }
}

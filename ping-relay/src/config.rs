use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;
use url::Url;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_ERROR_BODY_BYTES: usize = 4096;
/// Upper bound for `ping.timeout_secs`: one hour.
pub const MAX_TIMEOUT_SECS: u64 = 3600;

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Ping timeout cannot be 0")]
    InvalidTimeout,

    #[error("Ping timeout of {0}s exceeds the maximum of {max}s", max = MAX_TIMEOUT_SECS)]
    TimeoutTooLarge(u64),

    #[error("Empty appservice id")]
    EmptyAppserviceId,

    #[error("Duplicate appservice id: {0}")]
    DuplicateAppservice(String),

    #[error("Empty token for appservice: {0}")]
    EmptyToken(String),

    #[error("as_token of appservice {0} is already used by another appservice")]
    DuplicateAsToken(String),
}

/// Ping relay configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Client-facing API listener
    #[serde(default)]
    pub listener: Listener,
    /// Listener for health and readiness probes
    #[serde(default = "Listener::default_admin")]
    pub admin_listener: Listener,
    #[serde(default)]
    pub ping: PingConfig,
    /// Registered appservices
    #[serde(default)]
    pub appservices: Vec<AppserviceRegistration>,
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        self.admin_listener.validate()?;
        self.ping.validate()?;

        let mut ids = HashSet::new();
        let mut as_tokens = HashSet::new();
        for appservice in &self.appservices {
            if appservice.id.is_empty() {
                return Err(ValidationError::EmptyAppserviceId);
            }

            if !ids.insert(&appservice.id) {
                return Err(ValidationError::DuplicateAppservice(appservice.id.clone()));
            }

            if appservice.as_token.is_empty() || appservice.hs_token.is_empty() {
                return Err(ValidationError::EmptyToken(appservice.id.clone()));
            }

            // The as_token is how callers are identified, so it must be unique.
            if !as_tokens.insert(&appservice.as_token) {
                return Err(ValidationError::DuplicateAsToken(appservice.id.clone()));
            }
        }

        Ok(())
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    pub host: String,
    pub port: u16,
}

impl Listener {
    fn default_admin() -> Self {
        Listener {
            host: "127.0.0.1".into(),
            port: 8009,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

impl Default for Listener {
    fn default() -> Self {
        Listener {
            host: "127.0.0.1".into(),
            port: 8008,
        }
    }
}

/// Settings for the outbound probe.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct PingConfig {
    /// Deadline covering connect, send and receipt of the response.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Upper bound on the appservice response body captured for `M_BAD_STATUS`.
    #[serde(default = "default_max_error_body_bytes")]
    pub max_error_body_bytes: usize,
}

impl PingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout);
        }
        if self.timeout_secs > MAX_TIMEOUT_SECS {
            return Err(ValidationError::TimeoutTooLarge(self.timeout_secs));
        }
        Ok(())
    }
}

impl Default for PingConfig {
    fn default() -> Self {
        PingConfig {
            timeout_secs: default_timeout_secs(),
            max_error_body_bytes: default_max_error_body_bytes(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_max_error_body_bytes() -> usize {
    DEFAULT_MAX_ERROR_BODY_BYTES
}

/// An appservice registration as known to the homeserver.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct AppserviceRegistration {
    pub id: String,
    /// Push URL. Appservices that only use the client API may leave it unset.
    pub url: Option<Url>,
    /// Token the appservice presents to the homeserver.
    pub as_token: String,
    /// Token the homeserver presents to the appservice.
    pub hs_token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_config() {
        let yaml = r#"
listener:
    host: "0.0.0.0"
    port: 8008
admin_listener:
    host: "127.0.0.1"
    port: 8009
ping:
    timeout_secs: 10
    max_error_body_bytes: 1024
appservices:
    - id: irc-bridge
      url: "http://127.0.0.1:9000"
      as_token: as_secret
      hs_token: hs_secret
    - id: bot
      as_token: bot_as_secret
      hs_token: bot_hs_secret
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_ok());

        assert_eq!(config.listener.host, "0.0.0.0");
        assert_eq!(config.ping.timeout(), Duration::from_secs(10));
        assert_eq!(config.ping.max_error_body_bytes, 1024);
        assert_eq!(config.appservices.len(), 2);
        assert_eq!(
            config.appservices[0].url,
            Some(Url::parse("http://127.0.0.1:9000").unwrap())
        );
        assert_eq!(config.appservices[1].url, None);
    }

    #[test]
    fn test_defaults() {
        let config: Config = serde_yaml::from_str("appservices: []").unwrap();
        assert_eq!(config.listener, Listener::default());
        assert_eq!(config.admin_listener.port, 8009);
        assert_eq!(config.ping.timeout_secs, 30);
        assert_eq!(config.ping.max_error_body_bytes, 4096);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_errors() {
        let base_config = Config {
            listener: Listener::default(),
            admin_listener: Listener::default_admin(),
            ping: PingConfig::default(),
            appservices: vec![AppserviceRegistration {
                id: "bridge".to_string(),
                url: None,
                as_token: "as".to_string(),
                hs_token: "hs".to_string(),
            }],
        };
        assert!(base_config.validate().is_ok());

        let mut config = base_config.clone();
        config.admin_listener.port = 0;
        assert_eq!(config.validate(), Err(ValidationError::InvalidPort));

        let mut config = base_config.clone();
        config.ping.timeout_secs = 0;
        assert_eq!(config.validate(), Err(ValidationError::InvalidTimeout));

        let mut config = base_config.clone();
        config.ping.timeout_secs = MAX_TIMEOUT_SECS;
        assert!(config.validate().is_ok());

        let mut config = base_config.clone();
        config.ping.timeout_secs = u64::MAX;
        assert_eq!(
            config.validate(),
            Err(ValidationError::TimeoutTooLarge(u64::MAX))
        );

        let mut config = base_config.clone();
        config.appservices[0].id = "".to_string();
        assert_eq!(config.validate(), Err(ValidationError::EmptyAppserviceId));

        let mut config = base_config.clone();
        let mut duplicate = config.appservices[0].clone();
        duplicate.as_token = "other".to_string();
        config.appservices.push(duplicate);
        assert_eq!(
            config.validate(),
            Err(ValidationError::DuplicateAppservice("bridge".to_string()))
        );

        let mut config = base_config.clone();
        config.appservices[0].hs_token = "".to_string();
        assert_eq!(
            config.validate(),
            Err(ValidationError::EmptyToken("bridge".to_string()))
        );

        let mut config = base_config;
        let mut second = config.appservices[0].clone();
        second.id = "second".to_string();
        config.appservices.push(second);
        assert_eq!(
            config.validate(),
            Err(ValidationError::DuplicateAsToken("second".to_string()))
        );
    }

    #[test]
    fn test_deserialization_errors() {
        // Invalid URL
        assert!(
            serde_yaml::from_str::<Config>(
                r#"
appservices: [{id: bridge, url: "not-a-url", as_token: a, hs_token: h}]
"#
            )
            .is_err()
        );

        // Missing token
        assert!(serde_yaml::from_str::<Config>("appservices: [{id: bridge, as_token: a}]").is_err());

        // Invalid timeout type
        assert!(serde_yaml::from_str::<Config>("ping: {timeout_secs: soon}").is_err());
    }
}

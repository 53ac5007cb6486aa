//! Relay server configuration

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Result};
use resonance_shared_config::{parse_env, parse_list_env, CommonConfig, Environment};

use crate::websocket::hub::{HubSettings, DEFAULT_OUTBOUND_BUFFER, DEFAULT_WRITE_TIMEOUT};
use crate::websocket::OriginPolicy;

/// Relay server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Common configuration shared with other services
    pub common: CommonConfig,

    /// CORS allowed origins (optional)
    pub cors_allowed_origins: Option<Vec<String>>,

    /// Origins allowed to open `/ws` (unset = any)
    pub ws_allowed_origins: Option<Vec<String>>,

    /// Per-write deadline during fan-out
    pub write_timeout: Duration,

    /// Outbound queue capacity per connection
    pub outbound_buffer: usize,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// `WS_WRITE_TIMEOUT_MS` and `WS_OUTBOUND_BUFFER` must be positive.
    pub fn from_env() -> Result<Self> {
        let common = CommonConfig::from_env()
            .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

        let write_timeout_ms = parse_env(
            "WS_WRITE_TIMEOUT_MS",
            DEFAULT_WRITE_TIMEOUT.as_millis() as u64,
        )
        .map_err(|e| anyhow::anyhow!("{}", e))?;
        if write_timeout_ms == 0 {
            bail!("WS_WRITE_TIMEOUT_MS must be greater than zero");
        }

        let outbound_buffer = parse_env("WS_OUTBOUND_BUFFER", DEFAULT_OUTBOUND_BUFFER)
            .map_err(|e| anyhow::anyhow!("{}", e))?;
        if outbound_buffer == 0 {
            bail!("WS_OUTBOUND_BUFFER must be greater than zero");
        }

        let ws_allowed_origins = parse_list_env("WS_ALLOWED_ORIGINS").filter(|o| !o.is_empty());
        if ws_allowed_origins.is_none() && common.environment.is_production() {
            tracing::warn!(
                "WS_ALLOWED_ORIGINS not set, accepting websocket upgrades from any origin"
            );
        }

        Ok(Self {
            common,
            cors_allowed_origins: parse_list_env("CORS_ORIGINS"),
            ws_allowed_origins,
            write_timeout: Duration::from_millis(write_timeout_ms),
            outbound_buffer,
        })
    }

    /// Fan-out tuning for the hub
    pub fn hub_settings(&self) -> HubSettings {
        HubSettings {
            write_timeout: self.write_timeout,
            outbound_buffer: self.outbound_buffer,
        }
    }

    /// Origin policy for websocket upgrades
    pub fn origin_policy(&self) -> OriginPolicy {
        match &self.ws_allowed_origins {
            Some(origins) => OriginPolicy::allow_list(origins),
            None => OriginPolicy::Any,
        }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        self.common.listen.socket_addr()
    }

    pub fn library_path(&self) -> &Path {
        &self.common.library.path
    }

    pub fn environment(&self) -> Environment {
        self.common.environment
    }

    pub fn is_production(&self) -> bool {
        self.common.environment.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to ensure tests that modify environment variables don't run in parallel
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const RELAY_VARS: &[&str] = &[
        "ENVIRONMENT",
        "PORT",
        "BIND_ADDR",
        "MUSIC_LIBRARY_PATH",
        "CORS_ORIGINS",
        "WS_ALLOWED_ORIGINS",
        "WS_WRITE_TIMEOUT_MS",
        "WS_OUTBOUND_BUFFER",
    ];

    /// Helper to temporarily set environment variables for a test
    struct EnvGuard {
        vars: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        /// Clear every relay variable, then apply `vars`
        fn new(vars: &[(&str, &str)]) -> Self {
            let mut saved: Vec<_> = RELAY_VARS
                .iter()
                .map(|k| {
                    let old = env::var(*k).ok();
                    env::remove_var(*k);
                    (k.to_string(), old)
                })
                .collect();
            for (k, v) in vars {
                if !RELAY_VARS.contains(k) {
                    saved.push((k.to_string(), env::var(*k).ok()));
                }
                env::set_var(*k, *v);
            }
            Self { vars: saved }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (k, v) in &self.vars {
                match v {
                    Some(val) => env::set_var(k, val),
                    None => env::remove_var(k),
                }
            }
        }
    }

    #[test]
    fn test_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let _guard = EnvGuard::new(&[]);

        let config = Config::from_env().unwrap();

        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:8080");
        assert_eq!(config.library_path(), Path::new("./music"));
        assert_eq!(config.hub_settings(), HubSettings::default());
        assert_eq!(config.origin_policy(), OriginPolicy::Any);
        assert!(config.cors_allowed_origins.is_none());
        assert!(!config.is_production());
    }

    #[test]
    fn test_overrides() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let _guard = EnvGuard::new(&[
            ("PORT", "9000"),
            ("MUSIC_LIBRARY_PATH", "/srv/music"),
            ("WS_WRITE_TIMEOUT_MS", "250"),
            ("WS_OUTBOUND_BUFFER", "8"),
            ("WS_ALLOWED_ORIGINS", "https://player.example, http://localhost:3000"),
            ("CORS_ORIGINS", "https://player.example"),
        ]);

        let config = Config::from_env().unwrap();

        assert_eq!(config.socket_addr().port(), 9000);
        assert_eq!(config.library_path(), Path::new("/srv/music"));
        assert_eq!(
            config.hub_settings(),
            HubSettings {
                write_timeout: Duration::from_millis(250),
                outbound_buffer: 8,
            }
        );
        assert!(config.origin_policy().allows(Some("http://localhost:3000")));
        assert!(!config.origin_policy().allows(Some("http://localhost:3001")));
        assert_eq!(
            config.cors_allowed_origins,
            Some(vec!["https://player.example".to_string()])
        );
    }

    #[test]
    fn test_zero_write_timeout_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let _guard = EnvGuard::new(&[("WS_WRITE_TIMEOUT_MS", "0")]);

        let err = Config::from_env().unwrap_err().to_string();
        assert!(err.contains("WS_WRITE_TIMEOUT_MS"));
    }

    #[test]
    fn test_zero_outbound_buffer_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let _guard = EnvGuard::new(&[("WS_OUTBOUND_BUFFER", "0")]);

        let err = Config::from_env().unwrap_err().to_string();
        assert!(err.contains("WS_OUTBOUND_BUFFER"));
    }

    #[test]
    fn test_non_numeric_write_timeout_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let _guard = EnvGuard::new(&[("WS_WRITE_TIMEOUT_MS", "soon")]);

        assert!(Config::from_env().is_err());
    }

    #[test]
    fn test_blank_ws_origins_means_any() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let _guard = EnvGuard::new(&[("WS_ALLOWED_ORIGINS", " , ")]);

        let config = Config::from_env().unwrap();
        assert_eq!(config.origin_policy(), OriginPolicy::Any);
    }

    #[test]
    fn test_production_environment() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let _guard = EnvGuard::new(&[("ENVIRONMENT", "production")]);

        let config = Config::from_env().unwrap();
        assert!(config.is_production());
        assert_eq!(config.environment(), Environment::Production);
    }
}

use std::fs;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

// Control plane configuration sourced from environment variables.
#[derive(Debug, Clone)]
pub struct ControlPlaneConfig {
    // HTTP bind address for the control plane API.
    pub bind_addr: SocketAddr,
    // Metrics HTTP bind address.
    pub metrics_bind: SocketAddr,
    // Path to the YAML file mapping bearer tokens to principals.
    pub auth_tokens_path: Option<String>,
    // Monitor lease duration; renewal happens one margin before expiry.
    pub lease_duration: Duration,
    pub lease_renew_margin: Duration,
    // How often the watcher supervisor rescans the controller table.
    pub supervisor_interval: Duration,
    // Watcher restart backoff bounds.
    pub backoff_base: Duration,
    pub backoff_max: Duration,
}

#[derive(Debug, Deserialize)]
struct ControlPlaneConfigOverride {
    bind_addr: Option<String>,
    metrics_bind: Option<String>,
    auth_tokens_path: Option<String>,
    lease_duration_secs: Option<u64>,
    lease_renew_margin_secs: Option<u64>,
    supervisor_interval_secs: Option<u64>,
}

fn env_duration(key: &str, default_secs: u64) -> Result<Duration> {
    match std::env::var(key) {
        Ok(raw) => {
            let secs: u64 = raw.parse().with_context(|| format!("parse {key}"))?;
            Ok(Duration::from_secs(secs))
        }
        Err(_) => Ok(Duration::from_secs(default_secs)),
    }
}

impl ControlPlaneConfig {
    pub fn from_env() -> Result<Self> {
        // Environment variables provide defaults for local development.
        let bind_addr = std::env::var("ARMADA_CP_BIND")
            .unwrap_or_else(|_| "0.0.0.0:17600".to_string())
            .parse()
            .with_context(|| "parse ARMADA_CP_BIND")?;
        let metrics_bind = std::env::var("ARMADA_METRICS_BIND")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse()
            .with_context(|| "parse ARMADA_METRICS_BIND")?;
        let auth_tokens_path = std::env::var("ARMADA_AUTH_TOKENS").ok();
        Ok(Self {
            bind_addr,
            metrics_bind,
            auth_tokens_path,
            lease_duration: env_duration("ARMADA_LEASE_DURATION_SECS", 60)?,
            lease_renew_margin: env_duration("ARMADA_LEASE_RENEW_MARGIN_SECS", 15)?,
            supervisor_interval: env_duration("ARMADA_SUPERVISOR_INTERVAL_SECS", 10)?,
            backoff_base: Duration::from_secs(1),
            backoff_max: Duration::from_secs(60),
        })
    }

    pub fn from_env_or_yaml() -> Result<Self> {
        let mut config = Self::from_env()?;
        if let Ok(path) = std::env::var("ARMADA_CP_CONFIG") {
            // YAML overrides allow ops-friendly config files.
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("read ARMADA_CP_CONFIG: {path}"))?;
            let override_cfg: ControlPlaneConfigOverride = serde_yaml::from_str(&contents)
                .with_context(|| "parse control plane config yaml")?;
            if let Some(value) = override_cfg.bind_addr {
                config.bind_addr = value.parse().with_context(|| "parse bind_addr")?;
            }
            if let Some(value) = override_cfg.metrics_bind {
                config.metrics_bind = value.parse().with_context(|| "parse metrics_bind")?;
            }
            if let Some(value) = override_cfg.auth_tokens_path {
                config.auth_tokens_path = Some(value);
            }
            if let Some(value) = override_cfg.lease_duration_secs {
                config.lease_duration = Duration::from_secs(value);
            }
            if let Some(value) = override_cfg.lease_renew_margin_secs {
                config.lease_renew_margin = Duration::from_secs(value);
            }
            if let Some(value) = override_cfg.supervisor_interval_secs {
                config.supervisor_interval = Duration::from_secs(value);
            }
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use tempfile::TempDir;

    // Helper to clear all Armada env vars
    fn clear_armada_env() {
        for (key, _) in env::vars() {
            if key.starts_with("ARMADA_") {
                unsafe {
                    env::remove_var(key);
                }
            }
        }
    }

    #[serial]
    #[test]
    fn from_env_uses_defaults() {
        clear_armada_env();
        let config = ControlPlaneConfig::from_env().expect("from_env");
        assert_eq!(config.bind_addr.to_string(), "0.0.0.0:17600");
        assert_eq!(config.metrics_bind.to_string(), "0.0.0.0:8080");
        assert_eq!(config.lease_duration, Duration::from_secs(60));
        assert!(config.lease_renew_margin < config.lease_duration);
    }

    #[serial]
    #[test]
    fn from_env_respects_env_vars() {
        clear_armada_env();
        unsafe {
            env::set_var("ARMADA_CP_BIND", "127.0.0.1:9600");
            env::set_var("ARMADA_LEASE_DURATION_SECS", "30");
        }
        let config = ControlPlaneConfig::from_env().expect("from_env");
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:9600");
        assert_eq!(config.lease_duration, Duration::from_secs(30));
        clear_armada_env();
    }

    #[serial]
    #[test]
    fn from_env_rejects_invalid_socket_addr() {
        clear_armada_env();
        unsafe {
            env::set_var("ARMADA_CP_BIND", "not-a-valid-address");
        }
        assert!(ControlPlaneConfig::from_env().is_err());
        clear_armada_env();
    }

    #[serial]
    #[test]
    fn from_env_or_yaml_overrides_with_valid_yaml() {
        clear_armada_env();
        let tmpdir = TempDir::new().unwrap();
        let config_path = tmpdir.path().join("config.yml");
        fs::write(
            &config_path,
            r#"
bind_addr: "127.0.0.1:7600"
lease_duration_secs: 120
"#,
        )
        .unwrap();
        unsafe {
            env::set_var("ARMADA_CP_CONFIG", config_path.to_str().unwrap());
        }
        let config = ControlPlaneConfig::from_env_or_yaml().expect("from_env_or_yaml");
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:7600");
        assert_eq!(config.lease_duration, Duration::from_secs(120));
        clear_armada_env();
    }

    #[serial]
    #[test]
    fn from_env_or_yaml_invalid_yaml_fails() {
        clear_armada_env();
        let tmpdir = TempDir::new().unwrap();
        let config_path = tmpdir.path().join("bad.yml");
        fs::write(&config_path, "this is not: valid: yaml:").unwrap();
        unsafe {
            env::set_var("ARMADA_CP_CONFIG", config_path.to_str().unwrap());
        }
        assert!(ControlPlaneConfig::from_env_or_yaml().is_err());
        clear_armada_env();
    }
}

// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::{bail, Context, Result};
use std::collections::BTreeSet;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Which namespaces a service attachment may target besides the deployment's own
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CrossNamespacePolicy {
    #[default]
    Deny,
    AllowList(BTreeSet<String>),
    AllowAll,
}

impl CrossNamespacePolicy {
    /// `*` allows every namespace, a comma separated list allows those namespaces,
    /// an empty value denies all cross-namespace references.
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value == "*" {
            return CrossNamespacePolicy::AllowAll;
        }
        let namespaces: BTreeSet<String> = value
            .split(',')
            .map(str::trim)
            .filter(|ns| !ns.is_empty())
            .map(str::to_string)
            .collect();
        if namespaces.is_empty() {
            CrossNamespacePolicy::Deny
        } else {
            CrossNamespacePolicy::AllowList(namespaces)
        }
    }

    pub fn allows(&self, namespace: &str) -> bool {
        match self {
            CrossNamespacePolicy::Deny => false,
            CrossNamespacePolicy::AllowList(allowed) => allowed.contains(namespace),
            CrossNamespacePolicy::AllowAll => true,
        }
    }
}

/// Certificate and key used to serve the admission webhook over TLS
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Operator configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub webhook_port: u16,
    pub tls: Option<TlsPaths>,
    /// Restrict template changes to status.availableUpgrades
    pub validate_upgrade_path: bool,
    pub cross_namespace: CrossNamespacePolicy,
    /// YAML file with provider registrations, built-in list when unset
    pub provider_catalog: Option<PathBuf>,
    pub requeue_interval: Duration,
    pub teardown_poll_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            webhook_port: 9443,
            tls: None,
            validate_upgrade_path: true,
            cross_namespace: CrossNamespacePolicy::Deny,
            provider_catalog: None,
            requeue_interval: Duration::from_secs(10),
            teardown_poll_interval: Duration::from_secs(5),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let webhook_port = match lookup("WEBHOOK_PORT") {
            Some(port) => port
                .parse()
                .with_context(|| format!("WEBHOOK_PORT is not a valid port: {}", port))?,
            None => defaults.webhook_port,
        };

        let tls = match (lookup("TLS_CERT_FILE"), lookup("TLS_KEY_FILE")) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: cert.into(),
                key: key.into(),
            }),
            (None, None) => None,
            _ => bail!("TLS_CERT_FILE and TLS_KEY_FILE must be set together"),
        };

        let validate_upgrade_path = match lookup("VALIDATE_CLUSTER_UPGRADE_PATH") {
            Some(v) => v.parse().with_context(|| {
                format!("VALIDATE_CLUSTER_UPGRADE_PATH is not a boolean: {}", v)
            })?,
            None => defaults.validate_upgrade_path,
        };

        let cross_namespace = lookup("ALLOWED_SERVICE_NAMESPACES")
            .map(|v| CrossNamespacePolicy::parse(&v))
            .unwrap_or_default();

        let requeue_interval = seconds(&lookup, "REQUEUE_INTERVAL_SECS")?
            .unwrap_or(defaults.requeue_interval);
        let teardown_poll_interval = seconds(&lookup, "TEARDOWN_POLL_SECS")?
            .unwrap_or(defaults.teardown_poll_interval);

        Ok(Config {
            webhook_port,
            tls,
            validate_upgrade_path,
            cross_namespace,
            provider_catalog: lookup("PROVIDER_CATALOG").map(PathBuf::from),
            requeue_interval,
            teardown_poll_interval,
        })
    }
}

fn seconds<F>(lookup: &F, key: &str) -> Result<Option<Duration>>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| {
            let secs = v
                .parse::<u64>()
                .with_context(|| format!("{} is not a number of seconds: {}", key, v))?;
            if secs == 0 {
                bail!("{} must be at least one second", key);
            }
            Ok(Duration::from_secs(secs))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_nothing_set() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.webhook_port, 9443);
        assert!(config.tls.is_none());
        assert!(config.validate_upgrade_path);
        assert_eq!(config.cross_namespace, CrossNamespacePolicy::Deny);
        assert_eq!(config.requeue_interval, Duration::from_secs(10));
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("WEBHOOK_PORT", "8443"),
            ("VALIDATE_CLUSTER_UPGRADE_PATH", "false"),
            ("ALLOWED_SERVICE_NAMESPACES", "kube-system, monitoring"),
            ("REQUEUE_INTERVAL_SECS", "30"),
            ("PROVIDER_CATALOG", "/etc/fleetgate/providers.yaml"),
        ]))
        .unwrap();

        assert_eq!(config.webhook_port, 8443);
        assert!(!config.validate_upgrade_path);
        assert!(config.cross_namespace.allows("monitoring"));
        assert!(!config.cross_namespace.allows("default"));
        assert_eq!(config.requeue_interval, Duration::from_secs(30));
        assert_eq!(
            config.provider_catalog,
            Some(PathBuf::from("/etc/fleetgate/providers.yaml"))
        );
    }

    #[test]
    fn test_tls_requires_both_files() {
        assert!(Config::from_lookup(lookup_from(&[("TLS_CERT_FILE", "/certs/tls.crt")])).is_err());

        let config = Config::from_lookup(lookup_from(&[
            ("TLS_CERT_FILE", "/certs/tls.crt"),
            ("TLS_KEY_FILE", "/certs/tls.key"),
        ]))
        .unwrap();
        assert_eq!(config.tls.unwrap().key, PathBuf::from("/certs/tls.key"));
    }

    #[test]
    fn test_invalid_port_is_an_error() {
        assert!(Config::from_lookup(lookup_from(&[("WEBHOOK_PORT", "https")])).is_err());
    }

    #[test]
    fn test_zero_interval_is_an_error() {
        assert!(Config::from_lookup(lookup_from(&[("REQUEUE_INTERVAL_SECS", "0")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("TEARDOWN_POLL_SECS", "0")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("TEARDOWN_POLL_SECS", "soon")])).is_err());
    }

    #[test]
    fn test_cross_namespace_policy_parse() {
        assert_eq!(CrossNamespacePolicy::parse("*"), CrossNamespacePolicy::AllowAll);
        assert_eq!(CrossNamespacePolicy::parse(" , "), CrossNamespacePolicy::Deny);
        assert!(CrossNamespacePolicy::AllowAll.allows("anything"));
        assert!(!CrossNamespacePolicy::Deny.allows("anything"));
    }
}

use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tracing::warn;

pub const DEFAULT_API_BASE: &str = "http://localhost:8001";

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct DashConfig {
    #[serde(default)]
    pub api: ApiConf,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ApiConf {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Timeout requête côté client. Sans lui, un transport qui pend
    /// accumule un tick en vol par intervalle.
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: Option<u64>,
}

impl Default for ApiConf {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_timeout_secs() -> Option<u64> {
    Some(10)
}

/// Charge la config YAML (chemin via GENIUS_DASH_CONFIG, défaut dash.yaml),
/// puis applique l'override d'environnement GENIUS_API_BASE. Fichier absent
/// ou invalide : config par défaut.
pub async fn load_config() -> DashConfig {
    let path = std::env::var("GENIUS_DASH_CONFIG").unwrap_or_else(|_| "dash.yaml".into());
    let mut cfg = if Path::new(&path).exists() {
        let txt = fs::read_to_string(&path).await.unwrap_or_default();
        if txt.trim().is_empty() {
            DashConfig::default()
        } else {
            serde_yaml::from_str(&txt).unwrap_or_else(|e| {
                warn!("config invalide ({path}): {e}");
                DashConfig::default()
            })
        }
    } else {
        DashConfig::default()
    };

    if let Ok(base) = std::env::var("GENIUS_API_BASE") {
        if !base.is_empty() {
            cfg.api.base_url = base;
        }
    }
    cfg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = DashConfig::default();
        assert_eq!(cfg.api.base_url, "http://localhost:8001");
        assert_eq!(cfg.api.request_timeout_secs, Some(10));
    }

    #[test]
    fn test_parse_partial_yaml() {
        let cfg: DashConfig = serde_yaml::from_str("api:\n  base_url: http://box:9000\n").unwrap();
        assert_eq!(cfg.api.base_url, "http://box:9000");
        assert_eq!(cfg.api.request_timeout_secs, Some(10));
    }

    #[test]
    fn test_parse_full_yaml() {
        let yaml = "api:\n  base_url: http://box:9000\n  request_timeout_secs: 3\n";
        let cfg: DashConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.api.request_timeout_secs, Some(3));
    }
}

use serde::Deserialize;

use crate::error::GrabResult;

/// Tunables for the engine. Every field has a default matching the live
/// site, so an override object only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Milliseconds between poll ticks.
    pub poll_interval_ms: u32,
    pub poll_attempts: u32,
    /// Backoff between attempts to find the host's native control.
    pub inject_interval_ms: u32,
    pub inject_attempts: u32,
    /// Id of the injected control; also the idempotency key.
    pub control_id: String,
    pub native_selector: String,
    pub viewer_selector: String,
    /// Selector for embedded model elements inside same-origin iframes.
    pub frame_model_selector: String,
    pub naming: Naming,
    pub log_level: String,
}

/// Inputs to the saved file name.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Naming {
    /// Brand suffix stripped from the page title.
    pub title_suffix: String,
    /// Product name used when the page has no title.
    pub fallback_name: String,
    pub extension: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            poll_attempts: 30,
            inject_interval_ms: 1000,
            inject_attempts: 15,
            control_id: "i-m-d-btn".into(),
            native_selector: ".pip-xr-button".into(),
            viewer_selector: "model-viewer".into(),
            frame_model_selector: "model-viewer, a-entity[gltf-model]".into(),
            naming: Naming::default(),
            log_level: "info".into(),
        }
    }
}

impl Default for Naming {
    fn default() -> Self {
        Self {
            title_suffix: " - IKEA".into(),
            fallback_name: "ikea_product".into(),
            extension: "glb".into(),
        }
    }
}

impl Config {
    pub fn from_json(text: &str) -> GrabResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Parsed `log_level`, `Info` when unrecognised.
    pub fn level(&self) -> log::Level {
        self.log_level.parse().unwrap_or(log::Level::Info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_override_keeps_defaults() {
        let cfg = Config::from_json(r#"{"pollAttempts": 5, "naming": {"fallbackName": "item"}}"#)
            .unwrap();
        assert_eq!(cfg.poll_attempts, 5);
        assert_eq!(cfg.poll_interval_ms, 500);
        assert_eq!(cfg.naming.fallback_name, "item");
        assert_eq!(cfg.naming.title_suffix, " - IKEA");
        assert_eq!(cfg.control_id, "i-m-d-btn");
    }

    #[test]
    fn bad_json_is_a_config_error() {
        assert!(matches!(
            Config::from_json("{pollAttempts:"),
            Err(crate::error::GrabError::Config(_))
        ));
    }

    #[test]
    fn level_parsing() {
        let mut cfg = Config::default();
        assert_eq!(cfg.level(), log::Level::Info);
        cfg.log_level = "debug".into();
        assert_eq!(cfg.level(), log::Level::Debug);
        cfg.log_level = "chatty".into();
        assert_eq!(cfg.level(), log::Level::Info);
    }
}

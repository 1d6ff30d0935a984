//! Configuration parsing
//!
//! TOML is the primary format, JSON is accepted.

use contracts::{ContractError, StreamerConfig};

/// Configuration file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML (recommended)
    Toml,
    Json,
}

impl ConfigFormat {
    /// Infer format from a file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

pub fn parse_toml(content: &str) -> Result<StreamerConfig, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

pub fn parse_json(content: &str) -> Result<StreamerConfig, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

pub fn parse(content: &str, format: ConfigFormat) -> Result<StreamerConfig, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{RadarColorMode, SelectionPolicy};

    #[test]
    fn test_empty_toml_uses_defaults() {
        let cfg = parse_toml("").unwrap();
        assert_eq!(cfg, StreamerConfig::default());
    }

    #[test]
    fn test_parse_toml_partial_sections() {
        let content = r#"
[sync]
max_staleness_ms = 100
policy = "nearest"

[encoder.radar]
color_mode = "rcs"
"#;
        let cfg = parse_toml(content).unwrap();
        assert_eq!(cfg.sync.max_staleness_ms, 100);
        assert_eq!(cfg.sync.policy, SelectionPolicy::Nearest);
        assert_eq!(cfg.encoder.radar.color_mode, RadarColorMode::Rcs);
        // untouched fields keep defaults
        assert_eq!(cfg.encoder.radar.max_points, 800);
        assert_eq!(cfg.server.port, 8765);
    }

    #[test]
    fn test_parse_json() {
        let content = r#"{"server": {"port": 9001}, "scene": {"end_of_scene": "loop"}}"#;
        let cfg = parse_json(content).unwrap();
        assert_eq!(cfg.server.port, 9001);
        assert_eq!(cfg.scene.end_of_scene, contracts::EndOfScene::Loop);
    }

    #[test]
    fn test_parse_invalid_toml() {
        let err = parse_toml("[sync\nmax_staleness_ms = ").unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));
    }

    #[test]
    fn test_unknown_enum_value_is_parse_error() {
        let err = parse_toml("[sync]\npolicy = \"latest\"").unwrap_err();
        assert!(err.to_string().contains("TOML parse error"));
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ConfigFormat::from_extension("TOML"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("json"), Some(ConfigFormat::Json));
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}

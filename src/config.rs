//! Configuration file handling.
//!
//! This module handles loading, validating and merging configuration from
//! `.astrochart.toml` files.

use crate::aspects::{DEFAULT_IGNORE_KEYWORDS, DEFAULT_ORB, OVERLAP_THRESHOLD};
use crate::models::BirthDefaults;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

/// Default configuration file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".astrochart.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Aspect detection settings.
    #[serde(default)]
    pub aspects: AspectConfig,

    /// Chart service settings.
    #[serde(default)]
    pub chart: ChartConfig,

    /// Display names for bodies, signs and houses.
    #[serde(default)]
    pub localization: LocalizationConfig,

    /// Narrative generation settings.
    #[serde(default)]
    pub narrative: NarrativeConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Origins allowed by CORS. `"*"` allows any origin.
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allowed_origins: default_allowed_origins(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_allowed_origins() -> Vec<String> {
    vec!["*".to_string()]
}

/// Aspect detection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AspectConfig {
    /// Tolerance in degrees around each exact aspect angle.
    #[serde(default = "default_orb")]
    pub orb: f64,

    /// Bodies whose name contains any of these are left out.
    #[serde(default = "default_ignore_keywords")]
    pub ignore_keywords: Vec<String>,
}

impl Default for AspectConfig {
    fn default() -> Self {
        Self {
            orb: default_orb(),
            ignore_keywords: default_ignore_keywords(),
        }
    }
}

fn default_orb() -> f64 {
    DEFAULT_ORB
}

fn default_ignore_keywords() -> Vec<String> {
    DEFAULT_IGNORE_KEYWORDS
        .iter()
        .map(|k| k.to_string())
        .collect()
}

/// Chart service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartConfig {
    /// Base URL of the chart computation service.
    #[serde(default = "default_service_url")]
    pub service_url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_chart_timeout")]
    pub timeout_seconds: u64,

    #[serde(default = "default_name")]
    pub default_name: String,

    #[serde(default = "default_city")]
    pub default_city: String,

    #[serde(default = "default_country")]
    pub default_country: String,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            service_url: default_service_url(),
            timeout_seconds: default_chart_timeout(),
            default_name: default_name(),
            default_city: default_city(),
            default_country: default_country(),
        }
    }
}

impl ChartConfig {
    pub fn birth_defaults(&self) -> BirthDefaults {
        BirthDefaults {
            name: self.default_name.clone(),
            city: self.default_city.clone(),
            country: self.default_country.clone(),
        }
    }
}

fn default_service_url() -> String {
    "http://localhost:8001".to_string()
}

fn default_chart_timeout() -> u64 {
    30
}

fn default_name() -> String {
    "Guest".to_string()
}

fn default_city() -> String {
    "Hong Kong".to_string()
}

fn default_country() -> String {
    "HK".to_string()
}

/// Display names, applied after aspect detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalizationConfig {
    /// Labels for houses 1 through 12.
    #[serde(default = "default_house_names")]
    pub house_names: Vec<String>,

    /// Canonical body name -> display name.
    #[serde(default = "default_display_names")]
    pub display_names: BTreeMap<String, String>,

    /// English sign name -> localized sign name.
    #[serde(default = "default_sign_names")]
    pub sign_names: BTreeMap<String, String>,
}

impl Default for LocalizationConfig {
    fn default() -> Self {
        Self {
            house_names: default_house_names(),
            display_names: default_display_names(),
            sign_names: default_sign_names(),
        }
    }
}

fn default_display_names() -> BTreeMap<String, String> {
    [("True_Node", "北交點")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn default_sign_names() -> BTreeMap<String, String> {
    [
        ("Aries", "白羊座"),
        ("Taurus", "金牛座"),
        ("Gemini", "雙子座"),
        ("Cancer", "巨蟹座"),
        ("Leo", "獅子座"),
        ("Virgo", "處女座"),
        ("Libra", "天秤座"),
        ("Scorpio", "天蠍座"),
        ("Sagittarius", "射手座"),
        ("Capricorn", "摩羯座"),
        ("Aquarius", "水瓶座"),
        ("Pisces", "雙魚座"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn default_house_names() -> Vec<String> {
    vec![
        "第一宮", "第二宮", "第三宮", "第四宮", "第五宮", "第六宮", "第七宮", "第八宮", "第九宮",
        "第十宮", "第十一宮", "第十二宮",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Which wire protocol a text-generation backend speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Gemini,
    Ollama,
}

/// One text-generation backend in the fallback chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    pub kind: BackendKind,

    /// Model identifier passed to the backend.
    pub model: String,

    /// Base URL. Defaults per backend kind when omitted.
    #[serde(default)]
    pub url: Option<String>,

    /// Environment variable holding the API key, if the backend needs one.
    #[serde(default)]
    pub api_key_env: Option<String>,
}

impl BackendConfig {
    pub fn base_url(&self) -> String {
        self.url.clone().unwrap_or_else(|| match self.kind {
            BackendKind::Gemini => "https://generativelanguage.googleapis.com".to_string(),
            BackendKind::Ollama => "http://localhost:11434".to_string(),
        })
    }
}

/// Narrative generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrativeConfig {
    /// Per-backend request timeout in seconds.
    #[serde(default = "default_narrative_timeout")]
    pub timeout_seconds: u64,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Backends tried in order until one succeeds.
    #[serde(default = "default_backends")]
    pub backends: Vec<BackendConfig>,
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_narrative_timeout(),
            temperature: default_temperature(),
            backends: default_backends(),
        }
    }
}

fn default_narrative_timeout() -> u64 {
    60
}

fn default_temperature() -> f32 {
    0.7
}

fn default_backends() -> Vec<BackendConfig> {
    ["gemma-3-27b-it", "gemini-2.0-flash"]
        .into_iter()
        .map(|model| BackendConfig {
            kind: BackendKind::Gemini,
            model: model.to_string(),
            url: None,
            api_key_env: Some("GEMINI_API_KEY".to_string()),
        })
        .collect()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// Only values given on the command line (or via `HOST`/`PORT`)
    /// replace what the file set.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref host) = args.host {
            self.server.host = host.clone();
        }
        if let Some(port) = args.port {
            self.server.port = port;
        }
        if let Some(orb) = args.orb {
            self.aspects.orb = orb;
        }
    }

    /// Check settings that would otherwise fail at request time.
    pub fn validate(&self) -> Result<()> {
        let orb = self.aspects.orb;
        if !orb.is_finite() || orb <= 0.0 {
            bail!("Aspect orb must be a positive number of degrees, got {}", orb);
        }
        if orb > OVERLAP_THRESHOLD {
            warn!(
                "Aspect orb {} exceeds {}: tolerance windows overlap and priority order decides ties",
                orb, OVERLAP_THRESHOLD
            );
        }

        if self.narrative.backends.is_empty() {
            bail!("At least one narrative backend must be configured");
        }

        if self.localization.house_names.len() != 12 {
            bail!(
                "Expected 12 house names, found {}",
                self.localization.house_names.len()
            );
        }

        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Args;
    use std::io::Write;

    fn make_args() -> Args {
        Args {
            host: None,
            port: None,
            config: None,
            orb: None,
            verbose: false,
            quiet: false,
            init_config: false,
        }
    }

    #[test]
    fn test_merge_with_args() {
        let mut config = Config::default();
        config.server.host = "10.0.0.5".to_string();
        config.server.port = 9000;
        config.aspects.orb = 6.0;

        // Absent flags keep the file values
        config.merge_with_args(&make_args());
        assert_eq!(config.server.host, "10.0.0.5");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.aspects.orb, 6.0);

        let mut args = make_args();
        args.orb = Some(10.0);
        config.merge_with_args(&args);
        assert_eq!(config.aspects.orb, 10.0);
        assert_eq!(config.server.host, "10.0.0.5");
        assert_eq!(config.server.port, 9000);

        args.host = Some("127.0.0.1".to_string());
        args.port = Some(8080);
        config.merge_with_args(&args);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.aspects.orb, 10.0);
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.aspects.orb, 8.0);
        assert!(config
            .aspects
            .ignore_keywords
            .contains(&"Chiron".to_string()));
        assert_eq!(config.chart.default_city, "Hong Kong");
        assert_eq!(config.narrative.backends.len(), 2);
        assert_eq!(config.narrative.backends[0].model, "gemma-3-27b-it");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[server]
port = 8080

[aspects]
orb = 6.5
ignore_keywords = ["House", "Lilith"]

[localization.display_names]
True_Node = "North Node"

[[narrative.backends]]
kind = "ollama"
model = "llama3.2:latest"
url = "http://ollama:11434"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.aspects.orb, 6.5);
        assert_eq!(config.aspects.ignore_keywords, vec!["House", "Lilith"]);
        assert_eq!(
            config.localization.display_names.get("True_Node"),
            Some(&"North Node".to_string())
        );
        assert_eq!(config.localization.sign_names.len(), 12);
        assert_eq!(config.narrative.backends.len(), 1);
        assert_eq!(config.narrative.backends[0].kind, BackendKind::Ollama);
        assert_eq!(config.narrative.backends[0].base_url(), "http://ollama:11434");
    }

    #[test]
    fn test_validate_rejects_bad_orb() {
        let mut config = Config::default();
        config.aspects.orb = 0.0;
        assert!(config.validate().is_err());

        config.aspects.orb = f64::NAN;
        assert!(config.validate().is_err());

        config.aspects.orb = 20.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_requires_backend() {
        let mut config = Config::default();
        config.narrative.backends.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[chart]\nservice_url = \"http://charts:9000\"").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.chart.service_url, "http://charts:9000");
        assert_eq!(config.chart.timeout_seconds, 30);
    }

    #[test]
    fn test_load_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[aspects]\norb = \"wide\"").unwrap();
        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[server]"));
        assert!(toml_str.contains("[aspects]"));
        assert!(toml_str.contains("narrative.backends"));

        let reparsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(reparsed.aspects.orb, 8.0);
    }
}

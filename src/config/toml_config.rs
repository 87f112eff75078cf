use crate::core::integration::Strategy;
use crate::core::relocator::RelocateMode;
use crate::core::sweep::SweepPhases;
use crate::utils::error::{PortalError, Result};
use crate::utils::validation::{validate_extensions, validate_positive_number, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;

static ENV_VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("env var pattern is valid"));

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PortalsConfig {
    pub build: BuildConfig,
    pub sweep: SweepConfig,
    pub transform: TransformConfig,
    pub live: LiveConfig,
    pub logging: LoggingConfig,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    pub strategy: Strategy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SweepConfig {
    pub extensions: Vec<String>,
    pub phases: SweepPhases,
    pub concurrency: usize,
    pub dry_run: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["html".to_string()],
            phases: SweepPhases::default(),
            concurrency: 8,
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransformConfig {
    pub extensions: Vec<String>,
    pub own_fragments: RelocateMode,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["astro".to_string()],
            own_fragments: RelocateMode::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LiveConfig {
    pub inject_in_dev: bool,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            inject_in_dev: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub verbose: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MonitoringConfig {
    pub enabled: bool,
}

impl PortalsConfig {
    /// Loads and parses a TOML configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(|source| PortalError::ReadError {
            path: path.as_ref().to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| PortalError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the environment value. Unset variables are kept verbatim.
    fn substitute_env_vars(content: &str) -> String {
        ENV_VAR_RE
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .into_owned()
    }

    pub fn validate_config(&self) -> Result<()> {
        validate_extensions("sweep.extensions", &self.sweep.extensions)?;
        validate_positive_number("sweep.concurrency", self.sweep.concurrency, 1)?;
        validate_extensions("transform.extensions", &self.transform.extensions)?;
        Ok(())
    }
}

impl Validate for PortalsConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = PortalsConfig::from_toml_str("").unwrap();
        assert_eq!(config, PortalsConfig::default());
        assert_eq!(config.sweep.extensions, vec!["html"]);
        assert_eq!(config.build.strategy, Strategy::Sweep);
        assert_eq!(config.sweep.phases, SweepPhases::TwoPhase);
        assert_eq!(config.transform.own_fragments, RelocateMode::Visible);
        assert!(config.live.inject_in_dev);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let toml_content = r#"
[build]
strategy = "streaming"

[sweep]
extensions = ["html", "htm"]
phases = "file-order"
concurrency = 2
dry_run = true

[transform]
extensions = ["astro", "md"]
own_fragments = "prior-only"

[live]
inject_in_dev = false

[logging]
format = "json"
verbose = true

[monitoring]
enabled = true
"#;

        let config = PortalsConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.build.strategy, Strategy::Streaming);
        assert_eq!(config.sweep.phases, SweepPhases::FileOrder);
        assert_eq!(config.sweep.concurrency, 2);
        assert!(config.sweep.dry_run);
        assert_eq!(config.transform.own_fragments, RelocateMode::PriorOnly);
        assert!(!config.live.inject_in_dev);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert!(config.monitoring.enabled);
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("PORTALS_TEST_EXTENSION", "xhtml");

        let config = PortalsConfig::from_toml_str(
            r#"
[sweep]
extensions = ["${PORTALS_TEST_EXTENSION}", "${PORTALS_TEST_UNSET_VAR}"]
"#,
        )
        .unwrap();
        assert_eq!(
            config.sweep.extensions,
            vec!["xhtml", "${PORTALS_TEST_UNSET_VAR}"]
        );

        std::env::remove_var("PORTALS_TEST_EXTENSION");
    }

    #[test]
    fn test_config_validation() {
        let config = PortalsConfig::from_toml_str("[sweep]\nconcurrency = 0\n").unwrap();
        assert!(config.validate().is_err());

        let config = PortalsConfig::from_toml_str("[transform]\nextensions = []\n").unwrap();
        assert!(matches!(
            config.validate(),
            Err(PortalError::MissingConfigError { .. })
        ));
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        assert!(PortalsConfig::from_toml_str("[sweep]\nextension = [\"html\"]\n").is_err());
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[sweep]\nconcurrency = 3\n")
            .unwrap();

        let config = PortalsConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.sweep.concurrency, 3);
    }
}

use std::path::Path;

use family_context::FamilyContextConfig;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};

/// Prefix of environment overrides, e.g. `FF__FAMILY_CONTEXT__DATA_DIR`.
pub const ENV_PREFIX: &str = "FF__";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub family_context: FamilyContextConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset and no `-v` is given.
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_owned(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Layered config: defaults, then the YAML file (if any), then `FF__*` env.
    #[must_use]
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// # Errors
    /// Returns a figment error for malformed or unknown settings.
    pub fn load(path: Option<&Path>) -> Result<Self, figment::Error> {
        let figment = Self::figment(path);
        Ok(Self {
            logging: figment.extract_inner("logging")?,
            family_context: FamilyContextConfig::from_figment(&figment)?,
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn write_yaml(dir: &tempfile::TempDir, body: &str) -> std::path::PathBuf {
        let path = dir.path().join("family-finance.yaml");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn defaults_without_file() {
        let cfg = AppConfig::load(None).unwrap();
        assert_eq!(cfg.logging, LoggingConfig::default());
        assert_eq!(cfg.family_context.registry_db_name, "gp-finance-registry");
    }

    #[test]
    fn yaml_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_yaml(
            &dir,
            "logging:\n  json: true\nfamily_context:\n  data_dir: /var/lib/ff\n  default_language: uk\n",
        );

        let cfg = AppConfig::load(Some(&path)).unwrap();
        assert!(cfg.logging.json);
        assert_eq!(cfg.logging.level, "warn");
        assert_eq!(cfg.family_context.data_dir, Path::new("/var/lib/ff"));
        assert_eq!(cfg.family_context.default_language, "uk");
        assert_eq!(cfg.family_context.max_name_length, 255);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_yaml(&dir, "family_context:\n  data_dri: ./x\n");
        assert!(AppConfig::load(Some(&path)).is_err());
    }
}

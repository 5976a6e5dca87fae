//! Mapper configuration
//!
//! Settings come from the environment (optionally seeded from a `.env`
//! file). Values that fail to parse fall back to their defaults.

use std::path::PathBuf;

use tracing::warn;

pub const SCHEMA_DIR_VAR: &str = "ATTR_MAPPER_SCHEMA_DIR";
pub const STRICT_DEFAULT_VAR: &str = "ATTR_MAPPER_STRICT_DEFAULT";

/// Settings for loading schemas
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapperConfig {
    /// Directory scanned for YAML schema documents
    pub schema_dir: Option<PathBuf>,
    /// `strict` for YAML attributes that don't declare it
    pub strict_by_default: bool,
}

impl MapperConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read settings from the process environment, loading `.env` first
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read settings through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let schema_dir = lookup(SCHEMA_DIR_VAR)
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        let strict_by_default = match lookup(STRICT_DEFAULT_VAR) {
            Some(raw) => parse_flag(&raw).unwrap_or_else(|| {
                warn!("Ignoring unparseable {}={:?}", STRICT_DEFAULT_VAR, raw);
                false
            }),
            None => false,
        };

        Self {
            schema_dir,
            strict_by_default,
        }
    }

    pub fn with_schema_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.schema_dir = Some(dir.into());
        self
    }

    pub fn with_strict_by_default(mut self, strict: bool) -> Self {
        self.strict_by_default = strict;
        self
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = MapperConfig::from_lookup(lookup(&[]));
        assert_eq!(config, MapperConfig::default());
    }

    #[test]
    fn test_reads_variables() {
        let config = MapperConfig::from_lookup(lookup(&[
            (SCHEMA_DIR_VAR, "/etc/schemas"),
            (STRICT_DEFAULT_VAR, "Yes"),
        ]));

        assert_eq!(config.schema_dir, Some(PathBuf::from("/etc/schemas")));
        assert!(config.strict_by_default);
    }

    #[test]
    fn test_bad_flag_falls_back() {
        let config = MapperConfig::from_lookup(lookup(&[
            (SCHEMA_DIR_VAR, "  "),
            (STRICT_DEFAULT_VAR, "sometimes"),
        ]));

        assert_eq!(config.schema_dir, None);
        assert!(!config.strict_by_default);
    }
}

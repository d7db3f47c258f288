use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use crate::errors::ConfigError;

// Configuration file names, tried in this order by `discover`
pub const TOML_CONFIG_FILE_NAME: &str = "injective.toml";
pub const JSON_CONFIG_FILE_NAME: &str = "injective.json";

/// Resolution configuration shared by a whole context lineage
///
/// All tables are optional; an empty table disables that resolution stage.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct InjectiveConfig {
    /// Symbolic prefix -> real prefix, matched by longest `/`-segment prefix
    #[serde(default)]
    pub paths: HashMap<String, String>,
    /// Logical group name -> ordered member names
    #[serde(default)]
    pub bundles: HashMap<String, Vec<String>>,
    /// Root for root-relative names (`/lib/util`)
    #[serde(default, alias = "basePath")]
    pub base_path: Option<String>,
    /// Entry points resolved by the CLI when no names are given
    #[serde(default, deserialize_with = "one_or_many")]
    pub main: Vec<String>,
}

impl InjectiveConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_path(mut self, symbol: impl Into<String>, real: impl Into<String>) -> Self {
        self.paths.insert(symbol.into(), real.into());
        self
    }

    pub fn with_bundle<I, S>(mut self, name: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bundles
            .insert(name.into(), members.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = Some(base_path.into());
        self
    }

    /// Parse a TOML document
    pub fn from_toml_str(source: &str, origin: &str) -> Result<Self, ConfigError> {
        toml::from_str(source).map_err(|e| ConfigError::TomlParse(origin.to_string(), e))
    }

    /// Parse a JSON document
    pub fn from_json_str(source: &str, origin: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(source).map_err(|e| ConfigError::JsonParse(origin.to_string(), e))
    }

    /// Load configuration from a `.toml` or `.json` file
    ///
    /// `base_path` is tilde-expanded and, when relative, anchored at the
    /// directory holding the config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let shown = path.display().to_string();
        let content =
            fs::read_to_string(path).map_err(|e| ConfigError::FileRead(shown.clone(), e))?;

        let mut config = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_str(&content, &shown)?,
            Some("json") => Self::from_json_str(&content, &shown)?,
            _ => return Err(ConfigError::UnsupportedFormat(shown)),
        };

        let anchor = path.parent().unwrap_or_else(|| Path::new("."));
        config.anchor_base_path(anchor);
        tracing::debug!(path = %shown, "Loaded injective config");
        Ok(config)
    }

    /// Look for `injective.toml`, then `injective.json`, in `dir`
    pub fn discover(dir: &Path) -> Result<Option<(PathBuf, Self)>, ConfigError> {
        for file_name in [TOML_CONFIG_FILE_NAME, JSON_CONFIG_FILE_NAME] {
            let candidate = dir.join(file_name);
            match fs::metadata(&candidate) {
                Ok(meta) if meta.is_file() => {
                    let config = Self::from_file(&candidate)?;
                    return Ok(Some((candidate, config)));
                }
                Ok(_) => continue,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(ConfigError::FileRead(candidate.display().to_string(), e)),
            }
        }
        Ok(None)
    }

    fn anchor_base_path(&mut self, anchor: &Path) {
        if let Some(base_path) = self.base_path.take() {
            let expanded = PathBuf::from(shellexpand::tilde(&base_path).as_ref());
            let anchored = if expanded.is_absolute() {
                expanded
            } else {
                anchor.join(expanded)
            };
            self.base_path = Some(anchored.to_string_lossy().into_owned());
        }
    }
}

/// `main` may be a single entry or a list of entries
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(entry) => vec![entry],
        OneOrMany::Many(entries) => entries,
    })
}

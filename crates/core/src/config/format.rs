//! Reading config sources and serializing config artifacts by extension.

use crate::{Error, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Extensions of sources that can be loaded and merged, in lookup order.
pub const SOURCE_EXTENSIONS: &[&str] = &["json", "toml", "yaml", "yml"];

/// Extensions of sources that can be copied or referenced, in lookup order.
pub const FILE_SOURCE_EXTENSIONS: &[&str] = &["js", "cjs", "mjs", "json", "toml", "yaml", "yml"];

/// On-disk representation of a config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// Pretty-printed JSON.
    Json,
    /// `module.exports = ...;`
    CommonJs,
    /// `export default ...;`
    EsModule,
    /// YAML document.
    Yaml,
    /// TOML document.
    Toml,
}

impl ConfigFormat {
    /// Format implied by `path`'s extension.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedFormat`] for a missing or unknown extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("json") => Ok(Self::Json),
            Some("js" | "cjs") => Ok(Self::CommonJs),
            Some("mjs") => Ok(Self::EsModule),
            Some("yaml" | "yml") => Ok(Self::Yaml),
            Some("toml") => Ok(Self::Toml),
            Some(other) => Err(unsupported(path, format!("unknown extension `.{other}`"))),
            None => Err(unsupported(path, "no file extension")),
        }
    }

    /// Whether the format is an executable module that can re-export another file.
    #[must_use]
    pub fn is_module(self) -> bool {
        matches!(self, Self::CommonJs | Self::EsModule)
    }
}

/// Load a config source into a JSON value.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or if its format
/// cannot be parsed without a JavaScript runtime.
pub fn load_config(path: &Path) -> Result<Value> {
    let format = ConfigFormat::from_path(path)?;
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::io(e, path.to_path_buf(), "read config"))?;
    parse_config(format, path, &content)
}

/// [`load_config`] for async callers; the file is read on the runtime.
///
/// # Errors
///
/// Same as [`load_config`].
pub async fn read_config(path: &Path) -> Result<Value> {
    let format = ConfigFormat::from_path(path)?;
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| Error::io(e, path.to_path_buf(), "read config"))?;
    parse_config(format, path, &content)
}

fn parse_config(format: ConfigFormat, path: &Path, content: &str) -> Result<Value> {
    match format {
        ConfigFormat::Json => serde_json::from_str(content).map_err(|source| Error::Json {
            source,
            path: path.to_path_buf(),
        }),
        ConfigFormat::Yaml => serde_yaml::from_str(content).map_err(|source| Error::Yaml {
            source,
            path: path.to_path_buf(),
        }),
        ConfigFormat::Toml => toml::from_str(content).map_err(|source| Error::Toml {
            source,
            path: path.to_path_buf(),
        }),
        ConfigFormat::CommonJs | ConfigFormat::EsModule => Err(unsupported(
            path,
            "module configs can be copied or referenced but not loaded",
        )),
    }
}

/// Serialize `config` for the file at `target`.
///
/// ```
/// use serde_json::json;
/// use std::path::Path;
/// use toolrig_core::config::format::format_config;
///
/// let out = format_config(&json!({"semi": true}), Path::new("prettier.config.js")).unwrap();
/// assert!(out.starts_with("module.exports = {"));
/// ```
///
/// # Errors
///
/// Returns an error for an unsupported extension or a value the target
/// format cannot represent.
pub fn format_config(config: &Value, target: &Path) -> Result<String> {
    let json = || {
        serde_json::to_string_pretty(config).map_err(|source| Error::Json {
            source,
            path: target.to_path_buf(),
        })
    };

    match ConfigFormat::from_path(target)? {
        ConfigFormat::Json => Ok(format!("{}\n", json()?)),
        ConfigFormat::CommonJs => Ok(format!("module.exports = {};\n", json()?)),
        ConfigFormat::EsModule => Ok(format!("export default {};\n", json()?)),
        ConfigFormat::Yaml => serde_yaml::to_string(config).map_err(|source| Error::Yaml {
            source,
            path: target.to_path_buf(),
        }),
        ConfigFormat::Toml => toml::to_string_pretty(config).map_err(|source| Error::TomlWrite {
            source,
            path: target.to_path_buf(),
        }),
    }
}

/// First existing `<dir>/<name>.<ext>`, trying `extensions` in order.
#[must_use]
pub fn find_source(dir: &Path, name: &str, extensions: &[&str]) -> Option<PathBuf> {
    source_candidates(dir, name, extensions)
        .into_iter()
        .find(|candidate| candidate.is_file())
}

/// Every path [`find_source`] checks.
#[must_use]
pub fn source_candidates(dir: &Path, name: &str, extensions: &[&str]) -> Vec<PathBuf> {
    extensions
        .iter()
        .map(|ext| dir.join(format!("{name}.{ext}")))
        .collect()
}

fn unsupported(path: &Path, reason: impl Into<String>) -> Error {
    Error::UnsupportedFormat {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

//! Config artifact resolution.
//!
//! Each driver gets at most one config file per package, produced by one of
//! four strategies:
//!
//! - `create` loads the module source, the local override and the config
//!   embedded in `package.json`, merges them and writes the result
//! - `copy` copies the resolved source file
//! - `reference` writes a stub module that re-exports the resolved source
//! - `none` produces nothing
//!
//! Every written path is recorded on the [`ExecutionContext`] so the execute
//! phase can point tools at it and cleanup can remove it.

pub mod format;
pub mod merge;

use crate::context::ExecutionContext;
use crate::driver::{ConfigStrategy, SharedDriver};
use crate::settings::ToolSettings;
use crate::{Error, Result};
use format::{ConfigFormat, FILE_SOURCE_EXTENSIONS, SOURCE_EXTENSIONS};
use serde_json::Value;
use std::path::{Component, Path, PathBuf};
use toolrig_workspaces::PackageManifest;

/// A config file materialized for one driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigArtifact {
    /// Owning driver.
    pub driver: String,
    /// Where the file was written.
    pub path: PathBuf,
    /// Strategy that produced it.
    pub strategy: ConfigStrategy,
}

/// Source files found for a driver.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigSources {
    /// Source in the config module.
    pub module: Option<PathBuf>,
    /// Local override under `.config/toolrig`.
    pub local: Option<PathBuf>,
    /// Every candidate that was checked.
    pub searched: Vec<PathBuf>,
}

impl ConfigSources {
    /// Find `driver`'s sources under the module and local config directories.
    ///
    /// The local directory is skipped when it is the module directory, so a
    /// `@local` module is only loaded once.
    #[must_use]
    pub fn locate(settings: &ToolSettings, root: &Path, driver: &str, extensions: &[&str]) -> Self {
        let module_dir = settings.module_config_dir(root);
        let local_dir = ToolSettings::local_config_dir(root);

        let mut searched = format::source_candidates(&module_dir, driver, extensions);
        let module = format::find_source(&module_dir, driver, extensions);

        let local = if local_dir == module_dir {
            None
        } else {
            searched.extend(format::source_candidates(&local_dir, driver, extensions));
            format::find_source(&local_dir, driver, extensions)
                .filter(|local| module.as_ref() != Some(local))
        };

        Self {
            module,
            local,
            searched,
        }
    }

    /// The single file to copy or reference: the local override wins.
    #[must_use]
    pub fn preferred(&self) -> Option<&Path> {
        self.local.as_deref().or(self.module.as_deref())
    }
}

/// Materialize `driver`'s config in `ctx.cwd`.
///
/// `strategy` overrides the driver's declared strategy. Returns `None` when
/// the strategy produces no file.
///
/// # Errors
///
/// Fails before writing anything if a copy or reference source is missing or
/// a reference target is not a module file. Load, format and write failures
/// are returned as they occur.
pub async fn resolve_config(
    ctx: &mut ExecutionContext,
    driver: &SharedDriver,
    settings: &ToolSettings,
    strategy: Option<ConfigStrategy>,
) -> Result<Option<ConfigArtifact>> {
    let metadata = driver.metadata();
    let strategy = strategy.unwrap_or(metadata.config_strategy);
    let name = metadata.name.clone();

    if strategy == ConfigStrategy::None {
        tracing::debug!(driver = %name, "Config strategy is none, skipping");
        return Ok(None);
    }

    ctx.env.extend(metadata.env.clone());
    let target = ctx.cwd.join(&metadata.config_name);

    match strategy {
        ConfigStrategy::Create => create_config(ctx, driver, settings, &target).await?,
        ConfigStrategy::Copy => copy_config(ctx, driver, settings, &target).await?,
        ConfigStrategy::Reference => reference_config(ctx, driver, settings, &target).await?,
        ConfigStrategy::None => return Ok(None),
    }

    ctx.add_config_path(&name, &target);
    crate::emit_config_file!(name, strategy, target.display());

    Ok(Some(ConfigArtifact {
        driver: name,
        path: target,
        strategy,
    }))
}

/// Load, merge and write every config source for `driver`.
async fn create_config(
    ctx: &ExecutionContext,
    driver: &SharedDriver,
    settings: &ToolSettings,
    target: &Path,
) -> Result<()> {
    let name = driver.name();
    let sources = ConfigSources::locate(settings, &ctx.root, name, SOURCE_EXTENSIONS);
    let mut loaded = Vec::new();

    if let Some(path) = &sources.module {
        let mut config = format::read_config(path).await?;
        driver.on_load_module_config(ctx, path, &mut config);
        crate::emit_config_loaded!(name, "module", path.display());
        loaded.push(config);
    }

    if let Some(path) = &sources.local {
        let mut config = format::read_config(path).await?;
        driver.on_load_module_config(ctx, path, &mut config);
        crate::emit_config_loaded!(name, "local", path.display());
        loaded.push(config);
    }

    let manifest_path = ctx.cwd.join("package.json");
    if let Some(manifest) = read_manifest(&manifest_path).await? {
        if let Some(embedded) = manifest.namespaced_config(name) {
            let mut config = embedded.clone();
            driver.on_load_package_config(ctx, &mut config);
            crate::emit_config_loaded!(name, "package", manifest_path.display());
            loaded.push(config);
        }
    }

    if loaded.is_empty() {
        tracing::warn!(driver = %name, "No config sources found, writing an empty config");
    }

    let count = loaded.len();
    let mut config = loaded
        .into_iter()
        .fold(Value::Object(serde_json::Map::new()), |prev, next| {
            driver.merge_config(prev, next)
        });
    driver.on_merge_config(ctx, &mut config);
    crate::emit_config_merged!(name, count);

    driver.on_create_config_file(ctx, target, &mut config);
    let content = driver.format_config(&config, target)?;
    tokio::fs::write(target, content)
        .await
        .map_err(|e| Error::io(e, target.to_path_buf(), "write config"))
}

/// The `package.json` at `path`, or `None` when there is none.
async fn read_manifest(path: &Path) -> Result<Option<PackageManifest>> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::io(e, path.to_path_buf(), "read package.json")),
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|source| Error::Json {
            source,
            path: path.to_path_buf(),
        })
}

/// Copy the resolved source file over `target`.
async fn copy_config(
    ctx: &ExecutionContext,
    driver: &SharedDriver,
    settings: &ToolSettings,
    target: &Path,
) -> Result<()> {
    let source = required_source(ctx, driver, settings)?;

    driver.on_copy_config_file(ctx, target, &source);
    tokio::fs::copy(&source, target)
        .await
        .map(|_| ())
        .map_err(|e| Error::io(e, target.to_path_buf(), "copy config"))
}

/// Write a stub at `target` that re-exports the resolved source file.
async fn reference_config(
    ctx: &ExecutionContext,
    driver: &SharedDriver,
    settings: &ToolSettings,
    target: &Path,
) -> Result<()> {
    let format = ConfigFormat::from_path(target)?;
    if !format.is_module() {
        return Err(Error::UnsupportedFormat {
            path: target.to_path_buf(),
            reason: "reference stubs need a .js, .cjs or .mjs config name".to_string(),
        });
    }

    let source = required_source(ctx, driver, settings)?;
    let from = target.parent().unwrap_or(&ctx.cwd);
    let stub = reference_stub(format, &relative_specifier(from, &source));

    driver.on_reference_config_file(ctx, target, &source);
    tokio::fs::write(target, stub)
        .await
        .map_err(|e| Error::io(e, target.to_path_buf(), "write config reference"))
}

fn required_source(
    ctx: &ExecutionContext,
    driver: &SharedDriver,
    settings: &ToolSettings,
) -> Result<PathBuf> {
    let sources = ConfigSources::locate(settings, &ctx.root, driver.name(), FILE_SOURCE_EXTENSIONS);
    sources
        .preferred()
        .map(Path::to_path_buf)
        .ok_or_else(|| Error::MissingConfigSource {
            driver: driver.name().to_string(),
            searched: sources.searched,
        })
}

fn reference_stub(format: ConfigFormat, specifier: &str) -> String {
    if format == ConfigFormat::EsModule {
        format!("export {{ default }} from '{specifier}';\n")
    } else {
        format!("module.exports = require('{specifier}');\n")
    }
}

/// Module specifier for `to` relative to the directory `from`, always
/// starting with `./` or `../` and using forward slashes.
#[must_use]
pub fn relative_specifier(from: &Path, to: &Path) -> String {
    let from: Vec<Component<'_>> = from.components().collect();
    let to: Vec<Component<'_>> = to.components().collect();
    let shared = from
        .iter()
        .zip(&to)
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<String> = vec!["..".to_string(); from.len() - shared];
    parts.extend(
        to[shared..]
            .iter()
            .map(|c| c.as_os_str().to_string_lossy().into_owned()),
    );

    let joined = parts.join("/");
    if joined.starts_with("..") {
        joined
    } else {
        format!("./{joined}")
    }
}

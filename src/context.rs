//! Explicit build-context configuration.
//!
//! Everything the resolver and the record writer need from the surrounding
//! build lives in [`BuildContext`] and is passed in by value or reference.
//! A context can be built in code or loaded from a TOML file:
//!
//! ```toml
//! [context]
//! registry_root = "build/dists"
//! default_api_level = 21
//! bootstrap = "sdl2"
//! archs = ["arm64-v8a"]
//! recipe_build_order = ["hostpython3", "python3"]
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Directory name under the platform data dir used when no root is given.
const DEFAULT_REGISTRY_SUBDIR: &str = "dist-resolver/dists";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildContext {
    /// Directory whose immediate children are distribution directories.
    pub registry_root: PathBuf,
    /// API level new distributions are built against.
    pub default_api_level: u32,
    pub bootstrap_name: String,
    /// Recipes in the order the build step compiled them.
    pub recipe_build_order: Vec<String>,
    /// Pure-language modules installed alongside the compiled recipes.
    pub python_modules: Vec<String>,
    /// Architectures the finished build actually produced.
    pub archs: Vec<String>,
    /// Whether the legacy setup.py packaging mode was used.
    pub use_setup_py: bool,
    pub hostpython: String,
    pub python_version: String,
}

impl BuildContext {
    pub fn new(registry_root: impl Into<PathBuf>, default_api_level: u32) -> Self {
        Self {
            registry_root: registry_root.into(),
            default_api_level,
            bootstrap_name: String::new(),
            recipe_build_order: Vec::new(),
            python_modules: Vec::new(),
            archs: Vec::new(),
            use_setup_py: false,
            hostpython: String::new(),
            python_version: String::new(),
        }
    }

    /// Load a context from a TOML file.
    ///
    /// A relative `registry_root` is resolved against the file's directory.
    /// When it is omitted, [`default_registry_root`] is used.
    pub fn load(config_path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(config_path)
            .with_context(|| format!("reading build context '{}'", config_path.display()))?;
        let parsed: ContextFileToml = toml::from_str(&raw)
            .with_context(|| format!("parsing build context '{}'", config_path.display()))?;
        let ctx = parsed.context;

        let registry_root = match ctx.registry_root {
            Some(root) if root.is_absolute() => root,
            Some(root) => config_path
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join(root),
            None => default_registry_root()?,
        };

        if ctx.default_api_level == 0 {
            bail!(
                "invalid build context '{}': default_api_level must be a positive integer",
                config_path.display()
            );
        }

        Ok(Self {
            registry_root,
            default_api_level: ctx.default_api_level,
            bootstrap_name: ctx.bootstrap.unwrap_or_default(),
            recipe_build_order: ctx.recipe_build_order.unwrap_or_default(),
            python_modules: ctx.python_modules.unwrap_or_default(),
            archs: ctx.archs.unwrap_or_default(),
            use_setup_py: ctx.use_setup_py.unwrap_or(false),
            hostpython: ctx.hostpython.unwrap_or_default(),
            python_version: ctx.python_version.unwrap_or_default(),
        })
    }

    /// Full recipe list recorded for a finished build.
    pub fn recorded_recipes(&self) -> Vec<String> {
        self.recipe_build_order
            .iter()
            .chain(self.python_modules.iter())
            .cloned()
            .collect()
    }
}

/// `<platform data dir>/dist-resolver/dists`.
pub fn default_registry_root() -> Result<PathBuf> {
    let Some(data_dir) = dirs::data_dir() else {
        bail!("no platform data directory available; pass an explicit registry root");
    };
    Ok(data_dir.join(DEFAULT_REGISTRY_SUBDIR))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ContextFileToml {
    context: ContextToml,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ContextToml {
    registry_root: Option<PathBuf>,
    default_api_level: u32,
    bootstrap: Option<String>,
    recipe_build_order: Option<Vec<String>>,
    python_modules: Option<Vec<String>>,
    archs: Option<Vec<String>>,
    use_setup_py: Option<bool>,
    hostpython: Option<String>,
    python_version: Option<String>,
}

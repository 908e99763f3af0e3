//! In-memory distribution descriptors.

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{DistError, Result};

/// Record facts that travel with a distribution but never take part in
/// matching. `None` means the record did not carry the field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetadataExtras {
    pub bootstrap: Option<String>,
    pub hostpython: Option<String>,
    pub python_version: Option<String>,
    pub use_setup_py: Option<bool>,
}

/// One distribution, either found on disk or pending a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Distribution {
    pub name: String,
    /// Always `<registry root>/<name>` for descriptors the resolver allocates.
    pub dist_dir: PathBuf,
    pub archs: Vec<String>,
    /// `None` when the record predates API level tracking.
    pub api_level: Option<u32>,
    /// Build order as recorded; compared as a set.
    pub recipes: Vec<String>,
    pub needs_build: bool,
    pub extras: MetadataExtras,
}

impl Distribution {
    /// A descriptor for a distribution that has not been built yet.
    pub fn pending(
        registry_root: &Path,
        name: impl Into<String>,
        archs: Vec<String>,
        recipes: Vec<String>,
        api_level: u32,
    ) -> Self {
        let name = name.into();
        Self {
            dist_dir: registry_root.join(&name),
            name,
            archs,
            api_level: Some(api_level),
            recipes,
            needs_build: true,
            extras: MetadataExtras::default(),
        }
    }

    /// True when every requested architecture was built into this dist.
    ///
    /// A descriptor without any recorded architectures never qualifies,
    /// not even for an empty request.
    pub fn has_all_archs(&self, archs: &[String]) -> bool {
        !self.archs.is_empty() && archs.iter().all(|arch| self.archs.contains(arch))
    }

    pub fn recipe_set(&self) -> BTreeSet<&str> {
        self.recipes.iter().map(String::as_str).collect()
    }

    pub fn folder_exists(&self) -> bool {
        self.dist_dir.exists()
    }

    /// Remove the distribution directory. Missing directories are ignored.
    pub fn delete(&self) -> Result<()> {
        if !self.dist_dir.exists() {
            return Ok(());
        }
        fs::remove_dir_all(&self.dist_dir).map_err(|err| {
            DistError::io(
                format!("removing distribution '{}'", self.dist_dir.display()),
                err,
            )
        })?;
        tracing::info!("Deleted distribution {} at {}", self.name, self.dist_dir.display());
        Ok(())
    }

    /// One-line human description used in listings.
    pub fn summary(&self) -> String {
        let api = self
            .api_level
            .map_or_else(|| "unknown".to_string(), |level| level.to_string());
        let archs = if self.archs.is_empty() {
            "UNKNOWN".to_string()
        } else {
            self.archs.join(", ")
        };
        format!(
            "{}: min API {}, includes recipes ({}), built for archs ({})",
            self.name,
            api,
            self.recipes.join(", "),
            archs
        )
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<Distribution: name {} with recipes ({})>",
            self.name,
            self.recipes.join(", ")
        )
    }
}

/// Emit one info line per distribution.
pub fn log_distributions<'a>(dists: impl IntoIterator<Item = &'a Distribution>) {
    for dist in dists {
        tracing::info!("\t{}", dist.summary());
    }
}

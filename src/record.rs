//! Persisted distribution metadata (`dist_info.json`).
//!
//! The record is the durable contract between builds. Readers accept the
//! exact field set below and tolerate missing optional fields:
//!
//! - no `ndk_api` → the descriptor gets an unknown API level and a warning
//! - no `archs` → the descriptor gets an empty architecture set
//! - no `recipes` → the descriptor gets an empty recipe list
//!
//! Writes replace the whole file through a temporary sibling and a rename.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::context::BuildContext;
use crate::descriptor::{Distribution, MetadataExtras};
use crate::error::{DistError, Result};

/// File name of the metadata record inside a distribution directory.
pub const RECORD_FILENAME: &str = "dist_info.json";

/// On-disk shape of the metadata record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistInfo {
    pub dist_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bootstrap: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archs: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ndk_api: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_setup_py: Option<bool>,
    #[serde(default)]
    pub recipes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostpython: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub python_version: Option<String>,
}

impl DistInfo {
    pub fn from_distribution(dist: &Distribution) -> Self {
        Self {
            dist_name: dist.name.clone(),
            bootstrap: dist.extras.bootstrap.clone(),
            archs: Some(dist.archs.clone()),
            ndk_api: dist.api_level,
            use_setup_py: dist.extras.use_setup_py,
            recipes: dist.recipes.clone(),
            hostpython: dist.extras.hostpython.clone(),
            python_version: dist.extras.python_version.clone(),
        }
    }

    /// Build a descriptor for an already-built distribution in `dist_dir`.
    pub fn into_distribution(self, dist_dir: &Path) -> Distribution {
        Distribution {
            name: self.dist_name,
            dist_dir: dist_dir.to_path_buf(),
            archs: self.archs.unwrap_or_default(),
            api_level: self.ndk_api,
            recipes: self.recipes,
            needs_build: false,
            extras: MetadataExtras {
                bootstrap: self.bootstrap,
                hostpython: self.hostpython,
                python_version: self.python_version,
                use_setup_py: self.use_setup_py,
            },
        }
    }
}

pub fn record_path(dist_dir: &Path) -> PathBuf {
    dist_dir.join(RECORD_FILENAME)
}

/// Read the raw record in `dist_dir`.
///
/// Returns `Ok(None)` when the directory has no record, and
/// [`DistError::MalformedRecord`] when one exists but cannot be used.
pub fn read_record(dist_dir: &Path) -> Result<Option<DistInfo>> {
    let path = record_path(dist_dir);
    if !path.is_file() {
        return Ok(None);
    }

    let bytes = fs::read(&path).map_err(|err| DistError::malformed(&path, err))?;
    let info: DistInfo =
        serde_json::from_slice(&bytes).map_err(|err| DistError::malformed(&path, err))?;

    if info.dist_name.trim().is_empty() {
        return Err(DistError::malformed(&path, "dist_name is empty"));
    }

    Ok(Some(info))
}

/// Write `info` into `dist_dir`, creating the directory if needed.
pub fn write_record(dist_dir: &Path, info: &DistInfo) -> Result<()> {
    fs::create_dir_all(dist_dir).map_err(|err| {
        DistError::io(
            format!("creating distribution directory '{}'", dist_dir.display()),
            err,
        )
    })?;

    let path = record_path(dist_dir);
    let tmp = dist_dir.join(format!(".{}.tmp", RECORD_FILENAME));
    let json = serde_json::to_vec_pretty(info)
        .map_err(|err| DistError::malformed(&path, err))?;

    fs::write(&tmp, json)
        .map_err(|err| DistError::io(format!("writing '{}'", tmp.display()), err))?;
    fs::rename(&tmp, &path).map_err(|err| {
        DistError::io(
            format!("renaming '{}' to '{}'", tmp.display(), path.display()),
            err,
        )
    })?;

    Ok(())
}

/// Load the descriptor stored in `dist_dir`, if it has a record.
pub fn load(dist_dir: &Path) -> Result<Option<Distribution>> {
    let Some(info) = read_record(dist_dir)? else {
        return Ok(None);
    };
    let dist = info.into_distribution(dist_dir);

    if dist.api_level.is_none() {
        tracing::warn!(
            "Distribution {} ({}) has been built with an unknown api target, \
             ignoring it, you might want to delete it",
            dist.name,
            dist.dist_dir.display()
        );
    }

    Ok(Some(dist))
}

/// Persist `dist` exactly as described. [`load`] is the inverse.
pub fn save(dist: &Distribution) -> Result<()> {
    write_record(&dist.dist_dir, &DistInfo::from_distribution(dist))
}

impl Distribution {
    /// Record the facts of a finished build and mark this dist as built.
    ///
    /// The context is authoritative for everything except the name: its
    /// API level, architectures, recipe build order plus pure-language
    /// modules, and tooling references replace whatever the descriptor
    /// carried while it was pending. A context with no architectures or no
    /// recipes keeps the descriptor's own list for that field and logs a
    /// warning. The descriptor is left untouched if the write fails.
    pub fn save_info(&mut self, ctx: &BuildContext) -> Result<()> {
        tracing::info!("Saving distribution info for {}", self.name);

        let mut finished = self.clone();
        if ctx.archs.is_empty() {
            tracing::warn!(
                "Build context has no architectures; recording {}'s requested archs ({})",
                self.name,
                self.archs.join(", ")
            );
        } else {
            finished.archs = ctx.archs.clone();
        }
        let recipes = ctx.recorded_recipes();
        if recipes.is_empty() {
            tracing::warn!(
                "Build context has no recipe build order; recording {}'s requested recipes ({})",
                self.name,
                self.recipes.join(", ")
            );
        } else {
            finished.recipes = recipes;
        }
        finished.api_level = Some(ctx.default_api_level);
        finished.extras = MetadataExtras {
            bootstrap: Some(ctx.bootstrap_name.clone()),
            hostpython: Some(ctx.hostpython.clone()),
            python_version: Some(ctx.python_version.clone()),
            use_setup_py: Some(ctx.use_setup_py),
        };
        finished.needs_build = false;

        save(&finished)?;
        *self = finished;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn full_dist(root: &Path) -> Distribution {
        Distribution {
            name: "bigapp".to_string(),
            dist_dir: root.join("bigapp"),
            archs: strings(&["arm64-v8a", "armeabi-v7a"]),
            api_level: Some(24),
            recipes: strings(&["hostpython3", "libffi", "openssl", "python3", "six"]),
            needs_build: false,
            extras: MetadataExtras {
                bootstrap: Some("sdl2".to_string()),
                hostpython: Some("/build/hostpython3/native-build/python3".to_string()),
                python_version: Some("3.11".to_string()),
                use_setup_py: Some(true),
            },
        }
    }

    #[test]
    fn save_then_load_preserves_every_field() {
        let tmp = TempDir::new().unwrap();
        let dist = full_dist(tmp.path());

        save(&dist).unwrap();
        let loaded = load(&dist.dist_dir).unwrap().unwrap();
        assert_eq!(loaded, dist);
    }

    #[test]
    fn save_then_load_keeps_absent_api_level_absent() {
        let tmp = TempDir::new().unwrap();
        let mut dist = full_dist(tmp.path());
        dist.api_level = None;

        save(&dist).unwrap();
        let raw = fs::read_to_string(record_path(&dist.dist_dir)).unwrap();
        assert!(!raw.contains("ndk_api"));

        let loaded = load(&dist.dist_dir).unwrap().unwrap();
        assert_eq!(loaded, dist);
        assert_eq!(loaded.api_level, None);
    }

    #[test]
    fn load_defaults_missing_optional_fields() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("legacy");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            record_path(&dir),
            r#"{"dist_name": "legacy", "recipes": ["python3"]}"#,
        )
        .unwrap();

        let dist = load(&dir).unwrap().unwrap();
        assert_eq!(dist.name, "legacy");
        assert!(dist.archs.is_empty());
        assert_eq!(dist.api_level, None);
        assert_eq!(dist.recipes, strings(&["python3"]));
        assert!(!dist.needs_build);
        assert_eq!(dist.extras, MetadataExtras::default());
    }

    #[test]
    fn load_without_record_is_none() {
        let tmp = TempDir::new().unwrap();
        assert!(load(tmp.path()).unwrap().is_none());
    }

    #[test]
    fn truncated_record_is_malformed() {
        let tmp = TempDir::new().unwrap();
        fs::write(record_path(tmp.path()), r#"{"dist_name": "half", "rec"#).unwrap();

        let err = load(tmp.path()).unwrap_err();
        assert!(matches!(err, DistError::MalformedRecord { .. }));
    }

    #[test]
    fn empty_name_is_malformed() {
        let tmp = TempDir::new().unwrap();
        fs::write(record_path(tmp.path()), r#"{"dist_name": "", "recipes": []}"#).unwrap();

        assert!(matches!(
            read_record(tmp.path()),
            Err(DistError::MalformedRecord { .. })
        ));
    }

    #[test]
    fn failed_save_info_leaves_descriptor_unchanged() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("blocker");
        fs::write(&blocker, b"not a directory").unwrap();
        let mut dist = Distribution::pending(
            &blocker,
            "fresh",
            strings(&["arm64-v8a"]),
            strings(&["python3"]),
            21,
        );
        let before = dist.clone();

        let mut ctx = BuildContext::new(&blocker, 23);
        ctx.archs = strings(&["x86_64"]);
        ctx.recipe_build_order = strings(&["hostpython3", "python3"]);

        assert!(dist.save_info(&ctx).is_err());
        assert_eq!(dist, before);
        assert!(dist.needs_build);
    }

    #[test]
    fn save_info_keeps_requested_lists_when_context_has_none() {
        let tmp = TempDir::new().unwrap();
        let mut dist = Distribution::pending(
            tmp.path(),
            "bare",
            strings(&["arm64-v8a"]),
            strings(&["python3"]),
            21,
        );
        let ctx = BuildContext::new(tmp.path(), 24);

        dist.save_info(&ctx).unwrap();
        let loaded = load(&dist.dist_dir).unwrap().unwrap();
        assert_eq!(loaded.archs, strings(&["arm64-v8a"]));
        assert_eq!(loaded.recipes, strings(&["python3"]));
        assert_eq!(loaded.api_level, Some(24));
    }

    #[test]
    fn save_info_takes_final_facts_from_context() {
        let tmp = TempDir::new().unwrap();
        let mut dist = Distribution::pending(
            tmp.path(),
            "fresh",
            strings(&["arm64-v8a"]),
            strings(&["python3"]),
            21,
        );

        let mut ctx = BuildContext::new(tmp.path(), 23);
        ctx.bootstrap_name = "webview".to_string();
        ctx.archs = strings(&["arm64-v8a", "x86_64"]);
        ctx.recipe_build_order = strings(&["hostpython3", "libffi", "python3"]);
        ctx.python_modules = strings(&["requests"]);
        ctx.hostpython = "/build/hostpython3".to_string();
        ctx.python_version = "3.11".to_string();

        dist.save_info(&ctx).unwrap();
        assert!(!dist.needs_build);

        let raw: serde_json::Value =
            serde_json::from_slice(&fs::read(record_path(&dist.dist_dir)).unwrap()).unwrap();
        assert_eq!(raw["dist_name"], "fresh");
        assert_eq!(raw["bootstrap"], "webview");
        assert_eq!(raw["ndk_api"], 23);
        assert_eq!(raw["use_setup_py"], false);
        assert_eq!(
            raw["recipes"],
            serde_json::json!(["hostpython3", "libffi", "python3", "requests"])
        );
        assert_eq!(raw["archs"], serde_json::json!(["arm64-v8a", "x86_64"]));

        let loaded = load(&dist.dist_dir).unwrap().unwrap();
        assert_eq!(loaded, dist);
    }
}

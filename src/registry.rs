//! Discovery of existing distributions under a registry root.

use std::fs;
use std::path::{Path, PathBuf};

use crate::descriptor::Distribution;
use crate::error::{DistError, Result};
use crate::record;

/// Prefix for generated distribution names.
pub const UNNAMED_DIST_PREFIX: &str = "unnamed_dist_";

/// Load every distribution found in the immediate subdirectories of
/// `registry_root`, sorted by name and then directory.
///
/// Subdirectories without a record are not distributions and are skipped.
/// A malformed record is reported and skipped without affecting the rest of
/// the scan. Extra roots are not supported yet and are rejected before any
/// directory is read.
pub fn scan(registry_root: &Path, extra_roots: &[PathBuf]) -> Result<Vec<Distribution>> {
    if !extra_roots.is_empty() {
        return Err(DistError::UnimplementedFeature {
            feature: format!(
                "scanning extra distribution directories ({})",
                extra_roots
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        });
    }

    if !registry_root.is_dir() {
        tracing::debug!(
            "Registry root {} does not exist; no distributions",
            registry_root.display()
        );
        return Ok(Vec::new());
    }

    let entries = fs::read_dir(registry_root).map_err(|err| {
        DistError::io(
            format!("reading registry root '{}'", registry_root.display()),
            err,
        )
    })?;

    let mut dists = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(
                    "Skipping unreadable entry under {}: {}",
                    registry_root.display(),
                    err
                );
                continue;
            }
        };
        let dist_dir = entry.path();
        if !dist_dir.is_dir() {
            continue;
        }
        let Some(dir_name) = dist_dir.file_name().and_then(|part| part.to_str()) else {
            continue;
        };
        if dir_name.starts_with('.') {
            continue;
        }

        match record::load(&dist_dir) {
            Ok(Some(dist)) => {
                if dist.name != dir_name {
                    tracing::warn!(
                        "Distribution {} lives in directory {}; name and directory differ",
                        dist.name,
                        dist_dir.display()
                    );
                }
                dists.push(dist);
            }
            Ok(None) => {
                tracing::debug!("{} has no distribution record, skipping", dist_dir.display());
            }
            Err(err) => {
                tracing::warn!("Ignoring distribution at {}: {}", dist_dir.display(), err);
            }
        }
    }

    dists.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.dist_dir.cmp(&b.dist_dir)));
    Ok(dists)
}

/// First `unnamed_dist_<n>` (n >= 1) with no entry under `registry_root`.
///
/// Any existing path counts as taken, whether or not it holds a valid
/// distribution.
pub fn next_unnamed_name(registry_root: &Path) -> String {
    let mut index = 1u32;
    loop {
        let name = format!("{}{}", UNNAMED_DIST_PREFIX, index);
        if !registry_root.join(&name).exists() {
            return name;
        }
        index += 1;
    }
}

/// Find an existing distribution by name.
pub fn find_by_name(registry_root: &Path, name: &str) -> Result<Option<Distribution>> {
    Ok(scan(registry_root, &[])?
        .into_iter()
        .find(|dist| dist.name == name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{record_path, save};
    use tempfile::TempDir;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn make_dist(root: &Path, name: &str, api: Option<u32>) -> Distribution {
        let mut dist = Distribution::pending(
            root,
            name,
            strings(&["arm64-v8a"]),
            strings(&["python3"]),
            21,
        );
        dist.api_level = api;
        dist.needs_build = false;
        save(&dist).unwrap();
        dist
    }

    #[test]
    fn scan_finds_records_and_skips_plain_dirs() {
        let tmp = TempDir::new().unwrap();
        make_dist(tmp.path(), "zeta", Some(21));
        make_dist(tmp.path(), "alpha", Some(24));
        fs::create_dir_all(tmp.path().join("not_a_dist/libs")).unwrap();
        fs::write(tmp.path().join("stray.txt"), b"x").unwrap();

        let dists = scan(tmp.path(), &[]).unwrap();
        let names: Vec<_> = dists.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
        assert!(dists.iter().all(|d| !d.needs_build));
    }

    #[test]
    fn scan_keeps_unknown_api_level() {
        let tmp = TempDir::new().unwrap();
        make_dist(tmp.path(), "old", None);

        let dists = scan(tmp.path(), &[]).unwrap();
        assert_eq!(dists.len(), 1);
        assert_eq!(dists[0].api_level, None);
    }

    #[test]
    fn scan_isolates_malformed_records() {
        let tmp = TempDir::new().unwrap();
        make_dist(tmp.path(), "good", Some(21));
        let broken = tmp.path().join("broken");
        fs::create_dir_all(&broken).unwrap();
        fs::write(record_path(&broken), b"{\"dist_name\": ").unwrap();

        let dists = scan(tmp.path(), &[]).unwrap();
        assert_eq!(dists.len(), 1);
        assert_eq!(dists[0].name, "good");
    }

    #[test]
    fn scan_missing_root_is_empty() {
        let tmp = TempDir::new().unwrap();
        assert!(scan(&tmp.path().join("nope"), &[]).unwrap().is_empty());
    }

    #[test]
    fn extra_roots_fail_fast() {
        let tmp = TempDir::new().unwrap();
        let err = scan(tmp.path(), &[tmp.path().join("more")]).unwrap_err();
        assert!(matches!(err, DistError::UnimplementedFeature { .. }));
    }

    #[test]
    fn unnamed_probe_skips_any_existing_path() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(next_unnamed_name(tmp.path()), "unnamed_dist_1");

        make_dist(tmp.path(), "unnamed_dist_1", Some(21));
        fs::create_dir_all(tmp.path().join("unnamed_dist_2")).unwrap();
        assert_eq!(next_unnamed_name(tmp.path()), "unnamed_dist_3");
    }

    #[test]
    fn find_by_name_matches_record_name() {
        let tmp = TempDir::new().unwrap();
        make_dist(tmp.path(), "mine", Some(21));

        assert!(find_by_name(tmp.path(), "mine").unwrap().is_some());
        assert!(find_by_name(tmp.path(), "other").unwrap().is_none());
    }
}

//! Choosing an existing distribution or describing a new one.
//!
//! Resolution runs in a fixed order:
//!
//! 1. When a name is requested, remember the first same-named dist that has
//!    every requested arch (the "folder match"). It decides later whether a
//!    new build may take over that directory.
//! 2. Keep dists with a known API level equal to the requested one (if any)
//!    that contain every requested recipe.
//! 3. Take the first survivor, in registry order, whose archs cover the
//!    request and whose recipes equal the request (or contain it, unless a
//!    perfect match is required). Forced builds never take a survivor.
//! 4. Otherwise fail on a folder match unless replacing is allowed.
//! 5. Otherwise allocate a pending dist under the registry root.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};

use crate::context::BuildContext;
use crate::descriptor::{log_distributions, Distribution};
use crate::error::{DistError, Result};
use crate::registry;

/// What the caller needs from a distribution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirements {
    pub name: Option<String>,
    pub archs: Vec<String>,
    pub recipes: Vec<String>,
    pub api_level: Option<u32>,
    /// Never reuse an existing dist.
    pub force_build: bool,
    /// Reject dists that carry recipes beyond the requested ones.
    pub require_perfect_match: bool,
    /// Let a new build replace a same-named incompatible dist.
    pub allow_replace: bool,
    pub extra_dist_dirs: Vec<PathBuf>,
}

impl Requirements {
    pub fn new(archs: Vec<String>) -> Self {
        Self {
            name: None,
            archs,
            recipes: Vec::new(),
            api_level: None,
            force_build: false,
            require_perfect_match: false,
            allow_replace: true,
            extra_dist_dirs: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_recipes(mut self, recipes: Vec<String>) -> Self {
        self.recipes = recipes;
        self
    }

    pub fn with_api_level(mut self, api_level: u32) -> Self {
        self.api_level = Some(api_level);
        self
    }

    pub fn force_build(mut self, force_build: bool) -> Self {
        self.force_build = force_build;
        self
    }

    pub fn require_perfect_match(mut self, require_perfect_match: bool) -> Self {
        self.require_perfect_match = require_perfect_match;
        self
    }

    pub fn allow_replace(mut self, allow_replace: bool) -> Self {
        self.allow_replace = allow_replace;
        self
    }

    pub fn with_extra_dist_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.extra_dist_dirs = dirs;
        self
    }

    /// Requested name, treating an empty string as no name.
    fn requested_name(&self) -> Option<&str> {
        self.name.as_deref().filter(|name| !name.is_empty())
    }

    fn recipe_set(&self) -> BTreeSet<&str> {
        self.recipes.iter().map(String::as_str).collect()
    }

    fn accepts_recipes(&self, dist: &Distribution) -> bool {
        let wanted = self.recipe_set();
        let have = dist.recipe_set();
        have == wanted || (!self.require_perfect_match && wanted.is_subset(&have))
    }
}

/// Scan the context's registry root and resolve `req` against it.
pub fn resolve(ctx: &BuildContext, req: &Requirements) -> Result<Distribution> {
    validate(req)?;
    let dists = registry::scan(&ctx.registry_root, &req.extra_dist_dirs)?;
    select_or_allocate(ctx, req, &dists)
}

/// Resolve `req` against already discovered `dists`, in the given order.
///
/// Only touches the filesystem to probe for an unused generated name.
pub fn resolve_among(
    ctx: &BuildContext,
    req: &Requirements,
    dists: &[Distribution],
) -> Result<Distribution> {
    validate(req)?;
    select_or_allocate(ctx, req, dists)
}

/// Requirements need at least one arch, and a requested name must be a
/// single directory directly under the registry root.
fn validate(req: &Requirements) -> Result<()> {
    if req.archs.is_empty() {
        return Err(DistError::InvalidRequirements {
            message: "at least one target architecture is required".to_string(),
        });
    }
    if let Some(name) = req.requested_name() {
        let mut components = Path::new(name).components();
        let single_normal = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );
        if !single_normal || name.contains(['/', '\\']) {
            return Err(DistError::InvalidRequirements {
                message: format!(
                    "distribution name '{}' must be a single directory name",
                    name
                ),
            });
        }
    }
    Ok(())
}

fn select_or_allocate(
    ctx: &BuildContext,
    req: &Requirements,
    dists: &[Distribution],
) -> Result<Distribution> {
    tracing::debug!(
        "All possible dists: [{}]",
        dists
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    );

    let folder_match = req.requested_name().and_then(|name| {
        dists
            .iter()
            .find(|dist| dist.name == name && dist.has_all_archs(&req.archs))
    });
    if let Some(existing) = folder_match {
        tracing::debug!("Dist matching name and arch: {}", existing);
    }

    let candidates: Vec<&Distribution> = dists
        .iter()
        .filter(|dist| meets_capabilities(dist, req))
        .collect();

    if candidates.is_empty() {
        tracing::info!("No existing dists meet the given requirements!");
    } else {
        tracing::info!("Of the existing distributions, the following meet the given requirements:");
        log_distributions(candidates.iter().copied());
    }

    for dist in &candidates {
        if req.force_build {
            tracing::debug!("Skipping {} due to forced build", dist.name);
            continue;
        }
        if req.api_level.is_some() && dist.api_level != req.api_level {
            tracing::debug!("Skipping {} due to API level mismatch", dist.name);
            continue;
        }
        if !dist.has_all_archs(&req.archs) {
            tracing::debug!("Skipping {} due to arch mismatch", dist.name);
            continue;
        }
        if req.accepts_recipes(dist) {
            tracing::info!("{} has compatible recipes, using this one", dist.name);
            return Ok((*dist).clone());
        }
        tracing::debug!(
            "Skipping {} due to recipes mismatch, expected ({}), actual ({})",
            dist.name,
            req.recipes.join(", "),
            dist.recipes.join(", ")
        );
    }

    if let Some(existing) = folder_match {
        if !req.allow_replace {
            return Err(DistError::NameConflict {
                name: existing.name.clone(),
                requested_recipes: req.recipes.join(", "),
                requested_api: describe_api(req.api_level),
                existing_recipes: existing.recipes.join(", "),
                existing_api: describe_api(existing.api_level),
            });
        }
        tracing::info!(
            "Replacing incompatible distribution {} at {}",
            existing.name,
            existing.dist_dir.display()
        );
    }

    ensure_unique_eligible(&candidates, req)?;

    Ok(allocate(ctx, req))
}

/// API level and recipe superset test, independent of archs and names.
fn meets_capabilities(dist: &Distribution, req: &Requirements) -> bool {
    let Some(level) = dist.api_level else {
        tracing::debug!("{} has an unknown API level, it cannot match", dist);
        return false;
    };
    if let Some(wanted) = req.api_level {
        if level != wanted {
            tracing::debug!(
                "{} failed to match API level, target {}, dist {}",
                dist,
                wanted,
                level
            );
            return false;
        }
    }
    if let Some(missing) = req.recipes.iter().find(|r| !dist.recipes.contains(r)) {
        tracing::debug!("{} missing recipe {}", dist, missing);
        return false;
    }
    true
}

/// Two descriptors sharing a name must never both satisfy a request.
fn ensure_unique_eligible(candidates: &[&Distribution], req: &Requirements) -> Result<()> {
    let mut by_name: BTreeMap<&str, Vec<&Distribution>> = BTreeMap::new();
    for dist in candidates
        .iter()
        .copied()
        .filter(|dist| dist.has_all_archs(&req.archs) && req.accepts_recipes(dist))
    {
        by_name.entry(dist.name.as_str()).or_default().push(dist);
    }

    match by_name.into_iter().find(|(_, dists)| dists.len() > 1) {
        Some((name, dists)) => Err(DistError::RegistryInvariantViolation {
            message: format!(
                "{} distributions named {} satisfy the same requirements: {}",
                dists.len(),
                name,
                dists
                    .iter()
                    .map(|d| d.dist_dir.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }),
        None => Ok(()),
    }
}

fn allocate(ctx: &BuildContext, req: &Requirements) -> Distribution {
    let name = match req.requested_name() {
        Some(name) => name.to_string(),
        None => registry::next_unnamed_name(&ctx.registry_root),
    };

    if let Some(wanted) = req.api_level {
        if wanted != ctx.default_api_level {
            tracing::warn!(
                "Requested API level {} differs from the build context's {}; \
                 the new distribution uses {}",
                wanted,
                ctx.default_api_level,
                ctx.default_api_level
            );
        }
    }

    let dist = Distribution::pending(
        &ctx.registry_root,
        name,
        req.archs.clone(),
        req.recipes.clone(),
        ctx.default_api_level,
    );
    tracing::info!("New distribution {} will be built at {}", dist.name, dist.dist_dir.display());
    dist
}

fn describe_api(level: Option<u32>) -> String {
    level.map_or_else(|| "unknown".to_string(), |level| level.to_string())
}

//! Error types for distribution resolution.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using the crate's [`DistError`].
pub type Result<T> = std::result::Result<T, DistError>;

#[derive(Error, Debug)]
pub enum DistError {
    /// A recognized extension point that is not supported yet.
    #[error("{feature} is not yet implemented")]
    UnimplementedFeature { feature: String },

    /// The caller's requirements cannot be resolved as given.
    #[error("invalid distribution requirements: {message}")]
    InvalidRequirements { message: String },

    /// A same-named distribution exists but does not satisfy the request.
    #[error(
        "asked for dist with name {name} with recipes ({requested_recipes}) and API level \
         {requested_api}, but a dist with this name already exists and has either \
         incompatible recipes ({existing_recipes}) or API level {existing_api}"
    )]
    NameConflict {
        name: String,
        requested_recipes: String,
        requested_api: String,
        existing_recipes: String,
        existing_api: String,
    },

    /// The registry holds descriptors that should never coexist.
    #[error("registry invariant violated: {message}")]
    RegistryInvariantViolation { message: String },

    /// A metadata record exists but could not be read or parsed.
    #[error("malformed distribution record '{}': {reason}", .path.display())]
    MalformedRecord { path: PathBuf, reason: String },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl DistError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn malformed(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::MalformedRecord {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

//! Distribution resolution for cross-compiled app builds.
//!
//! A *distribution* is a named directory under a registry root holding a
//! build for a specific set of architectures, a minimum platform API level,
//! and a set of recipes. Before building, a caller asks this crate whether
//! an existing distribution already satisfies its requirements, or what the
//! new one should be called and where it should live:
//!
//! - **Registry** - Scan a registry root and load each distribution's record
//! - **Resolver** - Match requirements against discovered distributions
//! - **Record** - Read and write `dist_info.json` inside a distribution
//!
//! # Architecture
//!
//! ```text
//! registry::scan ──► Vec<Distribution> ──► resolver::resolve_among ──► Distribution
//!      ▲                                        ▲                        │
//!      │                                        │                        ▼
//! record::load                            Requirements        (external build step)
//!                                                                        │
//!                                   record::save / save_info ◄───────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use dist_resolver::{resolve, BuildContext, Requirements};
//!
//! let ctx = BuildContext::new("/var/lib/dists", 21);
//! let req = Requirements::new(vec!["arm64-v8a".into()])
//!     .with_recipes(vec!["python3".into(), "openssl".into()])
//!     .with_api_level(21);
//!
//! let dist = resolve(&ctx, &req)?;
//! if dist.needs_build {
//!     // build into dist.dist_dir, then dist.save_info(&ctx)?
//! }
//! ```

pub mod context;
pub mod descriptor;
pub mod error;
pub mod record;
pub mod registry;
pub mod resolver;

pub use context::BuildContext;
pub use descriptor::{Distribution, MetadataExtras};
pub use error::{DistError, Result};
pub use resolver::{resolve, resolve_among, Requirements};

#![deny(unsafe_code)]
#![deny(missing_docs)]

//! Literal include/exclude rules.
//!
//! Rules come from `--exclude` options, a daemon module's `exclude`
//! setting, or the filter list a client sends before the file list. Each
//! pattern names a path, not a glob:
//!
//! - `/dir/file` matches only at the transfer root.
//! - `file` or `dir/file` matches those trailing components at any depth.
//! - a trailing `/` limits the rule to directories.
//!
//! ```
//! use std::path::Path;
//! use filters::{FilterRule, FilterSet};
//!
//! let set = FilterSet::from_rules([
//!     FilterRule::include("/build/keep"),
//!     FilterRule::exclude("build"),
//! ])
//! .expect("rules compile");
//! assert!(!set.allows(Path::new("src/build"), true));
//! assert!(set.allows(Path::new("src/main.rs"), false));
//! ```

use thiserror::Error;

mod rule;
mod set;

pub use rule::{FilterAction, FilterRule};
pub use set::FilterSet;

/// Errors raised while compiling rules.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum FilterError {
    /// The pattern is empty once anchors and trailing slashes are removed.
    #[error("filter pattern {0:?} is empty")]
    EmptyPattern(String),
}

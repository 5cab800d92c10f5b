//! Shared domain model for the metadata catalogue: object identity,
//! versioned tags, selectors, the search expression grammar, and the
//! taxonomy of errors the catalogue surfaces to callers (spec.md §3, §4.6,
//! §4.7, §7).

pub mod error;
pub mod model;
pub mod search;
pub mod selector;
pub mod tag_update;

pub use error::CatalogError;
pub use model::{ObjectType, Tag, TagAttributes, TagHeader};
pub use selector::{TagSelector, VersionSpec};
pub use tag_update::{TagUpdate, TagUpdateOp};

#[cfg(test)]
#[macro_use]
extern crate pretty_assertions;

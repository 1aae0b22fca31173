//! Memo based plan search.
//!
//! A query tree is inserted into the [`memo::Memo`], which groups
//! logically equivalent expressions. Rules bound by patterns add
//! alternatives to groups, and the search drives rule application
//! with a dependency-counted task scheduler.
pub mod bind;
pub mod error;
pub mod explain;
pub mod memo;
pub mod pattern;
pub mod rule;
pub mod search;
pub mod task;

pub use crate::memo::Memo;
pub use crate::search::{Search, SearchOptions, SearchStats};

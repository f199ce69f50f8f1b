//! Domain models for linemark.
//!
//! # Core Concepts
//!
//! - [`Tree`]: generic ordered tree. Children are owned by exactly one parent;
//!   parent links are lookup-only back-references.
//! - [`Mark`]: a named bookmark. A leaf points at a zero-based line in a
//!   workspace-relative file; a group holds other marks and carries an
//!   expansion state.
//! - [`MarkTree`]: a `Tree<Mark>` whose root is always a group with id
//!   [`ROOT_ID`].

mod mark;
mod tree;

pub use mark::*;
pub use tree::*;

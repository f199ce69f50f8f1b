//! Named, grouped line bookmarks.
//!
//! Marks live in an ordered tree under a synthetic root group, persist to a
//! JSON side file next to the workspace, and can be fuzzy-searched by name.

pub mod config;
pub mod error;
pub mod models;
pub mod notify;
pub mod render;
pub mod search;
pub mod service;
pub mod storage;
pub mod workspace;

pub use error::{DropNoOp, Error, Result};
pub use service::MarkService;

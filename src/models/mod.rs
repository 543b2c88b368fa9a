//! Data models
//!
//! This module contains all data structures used throughout dronehub:
//! - Content entities (Article, Component, Configuration, Flight)
//! - Component categories
//! - Comments and their parent reference
//! - Users and groups

mod article;
mod catalog;
mod category;
mod comment;
mod user;

pub use article::{Article, ContentKind, Visibility};
pub use catalog::{Component, Configuration, Flight};
pub use category::ComponentCategory;
pub use comment::{Comment, CommentParent, NewComment};
pub use user::{Group, User};

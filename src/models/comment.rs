//! Comment model
//!
//! One comment type serves all four commentable entities; the parent is a
//! tagged reference rather than four parallel comment schemas.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Article, Component, Configuration, ContentKind, Flight};

/// The entity a comment is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum CommentParent {
    Article(i64),
    Component(i64),
    Configuration(i64),
    Flight(i64),
}

impl CommentParent {
    pub fn kind(&self) -> ContentKind {
        match self {
            Self::Article(_) => ContentKind::Article,
            Self::Component(_) => ContentKind::Component,
            Self::Configuration(_) => ContentKind::Configuration,
            Self::Flight(_) => ContentKind::Flight,
        }
    }

    pub fn id(&self) -> i64 {
        match *self {
            Self::Article(id)
            | Self::Component(id)
            | Self::Configuration(id)
            | Self::Flight(id) => id,
        }
    }
}

impl From<&Article> for CommentParent {
    fn from(article: &Article) -> Self {
        Self::Article(article.id)
    }
}

impl From<&Component> for CommentParent {
    fn from(component: &Component) -> Self {
        Self::Component(component.id)
    }
}

impl From<&Configuration> for CommentParent {
    fn from(configuration: &Configuration) -> Self {
        Self::Configuration(configuration.id)
    }
}

impl From<&Flight> for CommentParent {
    fn from(flight: &Flight) -> Self {
        Self::Flight(flight.id)
    }
}

/// Persisted comment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub parent: CommentParent,
    pub author_id: i64,
    pub content: String,
    /// Visible to readers; false while pending moderation
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// Comment built from a submission, not yet persisted
#[derive(Debug, Clone, PartialEq)]
pub struct NewComment {
    pub parent: CommentParent,
    pub author_id: i64,
    pub content: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl NewComment {
    /// Inactive comment by `author_id` on `parent`
    pub fn new(parent: CommentParent, author_id: i64, content: String) -> Self {
        Self {
            parent,
            author_id,
            content,
            active: false,
            created_at: Utc::now(),
        }
    }
}

//! Article model
//!
//! This module provides:
//! - `ContentKind`, the four article-like entity types
//! - `Visibility`, the staff/private/superprivate restriction flags
//! - `Article`, the only entity allowed to carry those flags

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The four article-like entity types. Each one can receive comments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Article,
    Component,
    Configuration,
    Flight,
}

impl ContentKind {
    pub const ALL: [ContentKind; 4] = [
        ContentKind::Article,
        ContentKind::Component,
        ContentKind::Configuration,
        ContentKind::Flight,
    ];

    /// Column of the `comments` table referencing this kind
    pub fn comment_column(&self) -> &'static str {
        match self {
            Self::Article => "article_id",
            Self::Component => "component_id",
            Self::Configuration => "configuration_id",
            Self::Flight => "flight_id",
        }
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Article => write!(f, "article"),
            Self::Component => write!(f, "component"),
            Self::Configuration => write!(f, "configuration"),
            Self::Flight => write!(f, "flight"),
        }
    }
}

/// Restriction flags of an article. All false means public.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visibility {
    /// Reserved to staff members
    #[serde(default)]
    pub staff: bool,
    /// Reserved to authenticated members
    #[serde(default)]
    pub private: bool,
    /// Reserved to a restricted circle
    #[serde(default)]
    pub superprivate: bool,
}

impl Visibility {
    pub const PUBLIC: Visibility = Visibility {
        staff: false,
        private: false,
        superprivate: false,
    };
}

/// News article of the club
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    /// Unique identifier
    pub id: i64,
    pub title: String,
    /// Markdown body
    pub body: String,
    /// Author user ID
    pub author_id: Option<i64>,
    #[serde(default)]
    pub visibility: Visibility,
    /// Publication date
    pub created_at: DateTime<Utc>,
}

impl Article {
    /// Create a new article. The ID is assigned by the database.
    pub fn new(title: String, body: String, author_id: Option<i64>, visibility: Visibility) -> Self {
        Self {
            id: 0,
            title,
            body,
            author_id,
            visibility,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comment_columns_are_distinct() {
        let columns: std::collections::HashSet<_> =
            ContentKind::ALL.iter().map(|k| k.comment_column()).collect();
        assert_eq!(columns.len(), ContentKind::ALL.len());
        assert_eq!(ContentKind::Flight.to_string(), "flight");
    }

    #[test]
    fn test_visibility_defaults_to_public() {
        assert_eq!(Visibility::default(), Visibility::PUBLIC);
        let restricted = Visibility { private: true, ..Visibility::default() };
        assert_ne!(restricted, Visibility::PUBLIC);
    }
}

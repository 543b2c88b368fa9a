//! Services layer - Business logic
//!
//! - Comment moderation gate
//! - Read access to content for the presentation layer
//! - HTML fragments for categories and flight weather

pub mod comment;
pub mod content;
pub mod render;

pub use comment::{
    CommentForm, CommentService, CommentServiceError, FieldError, GroupModeratorCheck,
    ModeratorCheck, Submission,
};
pub use content::{ContentService, ContentServiceError, LATEST_ARTICLES};
pub use render::{render_all, render_meteo, render_name, render_on_board, CategoryBadge};

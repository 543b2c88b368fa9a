//! Comment service
//!
//! Implements the moderation gate for new comments:
//! - Validate the submitted form, re-presenting it with errors if invalid
//! - Bind the comment to its parent and author
//! - Publish immediately when the author belongs to the moderator group,
//!   otherwise hold it for review
//!
//! The same operation serves articles, components, configurations and
//! flights through [`CommentParent`].

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use crate::db::repositories::{CommentRepository, UserRepository};
use crate::models::{Comment, CommentParent, NewComment, User};

/// Error types for comment service operations
#[derive(Debug, thiserror::Error)]
pub enum CommentServiceError {
    /// Comment not found
    #[error("Comment not found: {0}")]
    NotFound(i64),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Capability test deciding whether a user's comments skip review
#[async_trait]
pub trait ModeratorCheck: Send + Sync {
    async fn is_moderator(&self, user: &User) -> anyhow::Result<bool>;
}

/// Moderators are the members of a named group
pub struct GroupModeratorCheck {
    users: Arc<dyn UserRepository>,
    group: String,
}

impl GroupModeratorCheck {
    pub fn new(users: Arc<dyn UserRepository>, group: impl Into<String>) -> Self {
        Self {
            users,
            group: group.into(),
        }
    }
}

#[async_trait]
impl ModeratorCheck for GroupModeratorCheck {
    async fn is_moderator(&self, user: &User) -> anyhow::Result<bool> {
        self.users.is_member(user.id, &self.group).await
    }
}

/// Submitted comment form
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommentForm {
    pub content: String,
}

impl CommentForm {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }

    /// Cleaned content, or the field errors
    fn clean(&self) -> Result<String, Vec<FieldError>> {
        let content = self.content.trim();
        if content.is_empty() {
            return Err(vec![FieldError {
                field: "content",
                message: "Ce champ est obligatoire.".to_string(),
            }]);
        }
        Ok(content.to_string())
    }
}

/// Validation error attached to one form field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// Outcome of a comment submission
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    /// Invalid input: nothing persisted, the form goes back to the user
    Rejected {
        form: CommentForm,
        errors: Vec<FieldError>,
    },
    /// Comment persisted, active or pending review
    Created(Comment),
}

/// Comment service
pub struct CommentService {
    repo: Arc<dyn CommentRepository>,
    moderators: Arc<dyn ModeratorCheck>,
}

impl CommentService {
    pub fn new(repo: Arc<dyn CommentRepository>, moderators: Arc<dyn ModeratorCheck>) -> Self {
        Self { repo, moderators }
    }

    /// Submit a comment by `user` on an existing `parent`
    pub async fn submit(
        &self,
        form: CommentForm,
        user: &User,
        parent: CommentParent,
    ) -> Result<Submission, CommentServiceError> {
        let content = match form.clean() {
            Ok(content) => content,
            Err(errors) => {
                debug!("Rejected comment form from {}", user.username);
                return Ok(Submission::Rejected { form, errors });
            }
        };

        let mut comment = NewComment::new(parent, user.id, content);
        if self.moderators.is_moderator(user).await? {
            comment.active = true;
        }

        let created = self.repo.create(&comment).await?;
        info!(
            "Comment {} by {} on {} {} ({})",
            created.id,
            user.username,
            parent.kind(),
            parent.id(),
            if created.active { "published" } else { "pending review" }
        );
        Ok(Submission::Created(created))
    }

    /// Publish a pending comment
    pub async fn approve(&self, id: i64) -> Result<(), CommentServiceError> {
        self.set_active(id, true).await
    }

    /// Hide a published comment
    pub async fn deactivate(&self, id: i64) -> Result<(), CommentServiceError> {
        self.set_active(id, false).await
    }

    async fn set_active(&self, id: i64, active: bool) -> Result<(), CommentServiceError> {
        if !self.repo.set_active(id, active).await? {
            return Err(CommentServiceError::NotFound(id));
        }
        Ok(())
    }

    /// Published comments of a parent, newest first
    pub async fn list_visible(&self, parent: CommentParent) -> Result<Vec<Comment>, CommentServiceError> {
        Ok(self.repo.list_visible(parent).await?)
    }

    /// Comments awaiting review
    pub async fn list_pending(&self) -> Result<Vec<Comment>, CommentServiceError> {
        Ok(self.repo.list_pending().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        ArticleRepository, ConfigurationRepository, FlightRepository, SqlxArticleRepository,
        SqlxCommentRepository, SqlxConfigurationRepository, SqlxFlightRepository,
        SqlxUserRepository,
    };
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use crate::models::{Article, Configuration, Flight, Visibility};
    use proptest::prelude::*;

    struct Fixture {
        pool: DynDatabasePool,
        service: CommentService,
        users: Arc<dyn UserRepository>,
        article: Article,
        flight: Flight,
    }

    async fn setup() -> Fixture {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let users = SqlxUserRepository::boxed(pool.clone());
        let article = SqlxArticleRepository::new(pool.clone())
            .create(&Article::new("Sortie du dimanche".into(), "".into(), None, Visibility::PUBLIC))
            .await
            .unwrap();
        let configuration = SqlxConfigurationRepository::new(pool.clone())
            .create(&Configuration::new("Quad".into(), "".into(), "1.0".into()))
            .await
            .unwrap();
        let flight = SqlxFlightRepository::new(pool.clone())
            .create(&Flight::new("Vol d'essai".into(), "".into(), configuration.id))
            .await
            .unwrap();

        let moderators = Arc::new(GroupModeratorCheck::new(users.clone(), "Moderateurs"));
        let service = CommentService::new(SqlxCommentRepository::boxed(pool.clone()), moderators);

        Fixture {
            pool,
            service,
            users,
            article,
            flight,
        }
    }

    async fn member(fx: &Fixture, username: &str, moderator: bool) -> User {
        let user = fx
            .users
            .create(&User::new(username, &format!("{}@example.com", username)))
            .await
            .unwrap();
        if moderator {
            let group = match fx.users.get_group_by_name("Moderateurs").await.unwrap() {
                Some(group) => group,
                None => fx.users.create_group("Moderateurs").await.unwrap(),
            };
            fx.users.add_to_group(user.id, group.id).await.unwrap();
        }
        user
    }

    async fn comment_count(pool: &DynDatabasePool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM comments")
            .fetch_one(pool.as_sqlite().unwrap())
            .await
            .unwrap()
    }

    fn created(submission: Submission) -> Comment {
        match submission {
            Submission::Created(comment) => comment,
            other => panic!("Expected a created comment, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_non_moderator_comment_on_flight_is_pending() {
        let fx = setup().await;
        let user = member(&fx, "visiteur", false).await;
        let parent = CommentParent::from(&fx.flight);

        let comment = created(
            fx.service
                .submit(CommentForm::new("Bon vol !"), &user, parent)
                .await
                .unwrap(),
        );

        assert!(!comment.active);
        assert_eq!(comment.parent, CommentParent::Flight(fx.flight.id));
        assert_eq!(comment.author_id, user.id);
        assert!(fx.service.list_visible(parent).await.unwrap().is_empty());
        assert_eq!(fx.service.list_pending().await.unwrap(), vec![comment]);
    }

    #[tokio::test]
    async fn test_moderator_comment_is_published() {
        let fx = setup().await;
        let modo = member(&fx, "modo", true).await;
        let parent = CommentParent::from(&fx.article);

        let comment = created(
            fx.service
                .submit(CommentForm::new("Rendez-vous à 10h"), &modo, parent)
                .await
                .unwrap(),
        );

        assert!(comment.active);
        assert_eq!(fx.service.list_visible(parent).await.unwrap(), vec![comment]);
    }

    #[tokio::test]
    async fn test_content_is_trimmed() {
        let fx = setup().await;
        let user = member(&fx, "pilote", false).await;

        let comment = created(
            fx.service
                .submit(CommentForm::new("  Joli vol  \n"), &user, CommentParent::from(&fx.flight))
                .await
                .unwrap(),
        );
        assert_eq!(comment.content, "Joli vol");
    }

    #[tokio::test]
    async fn test_approve_and_deactivate() {
        let fx = setup().await;
        let user = member(&fx, "pilote", false).await;
        let parent = CommentParent::from(&fx.article);
        let comment = created(
            fx.service
                .submit(CommentForm::new("Super"), &user, parent)
                .await
                .unwrap(),
        );

        fx.service.approve(comment.id).await.unwrap();
        assert_eq!(fx.service.list_visible(parent).await.unwrap().len(), 1);

        fx.service.deactivate(comment.id).await.unwrap();
        assert!(fx.service.list_visible(parent).await.unwrap().is_empty());

        assert!(matches!(
            fx.service.approve(4242).await,
            Err(CommentServiceError::NotFound(4242))
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        /// Publication state follows group membership, whatever the parent kind
        #[test]
        fn property_visibility_follows_membership(
            moderator in any::<bool>(),
            on_flight in any::<bool>(),
            content in "[a-zA-Z0-9 !]{0,20}[a-zA-Z0-9!]",
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let result: Result<(), TestCaseError> = rt.block_on(async {
                let fx = setup().await;
                let user = member(&fx, "auteur", moderator).await;
                let parent = if on_flight {
                    CommentParent::from(&fx.flight)
                } else {
                    CommentParent::from(&fx.article)
                };

                let comment = created(
                    fx.service.submit(CommentForm::new(content), &user, parent).await.unwrap(),
                );
                prop_assert_eq!(comment.active, moderator);
                prop_assert_eq!(comment.parent, parent);
                Ok(())
            });
            result?;
        }

        /// Blank content is rejected and never persisted
        #[test]
        fn property_blank_content_rejected(
            content in "[ \t\n]{0,10}",
            moderator in any::<bool>(),
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let result: Result<(), TestCaseError> = rt.block_on(async {
                let fx = setup().await;
                let user = member(&fx, "auteur", moderator).await;
                let form = CommentForm::new(content);

                let submission = fx
                    .service
                    .submit(form.clone(), &user, CommentParent::from(&fx.article))
                    .await
                    .unwrap();

                match submission {
                    Submission::Rejected { form: returned, errors } => {
                        prop_assert_eq!(returned, form);
                        prop_assert_eq!(errors.len(), 1);
                        prop_assert_eq!(errors[0].field, "content");
                    }
                    Submission::Created(_) => prop_assert!(false, "blank comment was created"),
                }
                prop_assert_eq!(comment_count(&fx.pool).await, 0);
                Ok(())
            });
            result?;
        }
    }
}

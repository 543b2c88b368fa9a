//! Content service
//!
//! Read access to the four content kinds for the presentation layer.

use std::sync::Arc;

use crate::db::repositories::{
    ArticleRepository, ComponentRepository, ConfigurationRepository, FlightRepository,
};
use crate::models::{Article, Component, Configuration, ContentKind, Flight, User};

/// Number of articles on the index page
pub const LATEST_ARTICLES: i64 = 15;

/// Error types for content service operations
#[derive(Debug, thiserror::Error)]
pub enum ContentServiceError {
    /// Entity not found
    #[error("{kind} not found: {id}")]
    NotFound { kind: ContentKind, id: i64 },

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Content service
pub struct ContentService {
    articles: Arc<dyn ArticleRepository>,
    components: Arc<dyn ComponentRepository>,
    configurations: Arc<dyn ConfigurationRepository>,
    flights: Arc<dyn FlightRepository>,
}

impl ContentService {
    pub fn new(
        articles: Arc<dyn ArticleRepository>,
        components: Arc<dyn ComponentRepository>,
        configurations: Arc<dyn ConfigurationRepository>,
        flights: Arc<dyn FlightRepository>,
    ) -> Self {
        Self {
            articles,
            components,
            configurations,
            flights,
        }
    }

    /// Newest articles for the index page. Anonymous readers get none.
    pub async fn latest_articles(
        &self,
        reader: Option<&User>,
    ) -> Result<Vec<Article>, ContentServiceError> {
        if reader.is_none() {
            return Ok(Vec::new());
        }
        Ok(self.articles.list_latest(LATEST_ARTICLES).await?)
    }

    pub async fn article(&self, id: i64) -> Result<Article, ContentServiceError> {
        self.articles
            .get_by_id(id)
            .await?
            .ok_or(ContentServiceError::NotFound {
                kind: ContentKind::Article,
                id,
            })
    }

    pub async fn component(&self, id: i64) -> Result<Component, ContentServiceError> {
        self.components
            .get_by_id(id)
            .await?
            .ok_or(ContentServiceError::NotFound {
                kind: ContentKind::Component,
                id,
            })
    }

    pub async fn configuration(&self, id: i64) -> Result<Configuration, ContentServiceError> {
        self.configurations
            .get_by_id(id)
            .await?
            .ok_or(ContentServiceError::NotFound {
                kind: ContentKind::Configuration,
                id,
            })
    }

    pub async fn flight(&self, id: i64) -> Result<Flight, ContentServiceError> {
        self.flights
            .get_by_id(id)
            .await?
            .ok_or(ContentServiceError::NotFound {
                kind: ContentKind::Flight,
                id,
            })
    }

    /// Component catalog, by category then title
    pub async fn components(&self) -> Result<Vec<Component>, ContentServiceError> {
        Ok(self.components.list().await?)
    }

    /// Configurations, highest version first
    pub async fn configurations(&self) -> Result<Vec<Configuration>, ContentServiceError> {
        Ok(self.configurations.list().await?)
    }

    /// Flight log, newest first
    pub async fn flights(&self) -> Result<Vec<Flight>, ContentServiceError> {
        Ok(self.flights.list().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        SqlxArticleRepository, SqlxComponentRepository, SqlxConfigurationRepository,
        SqlxFlightRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::Visibility;
    use chrono::{Duration, Utc};

    async fn setup() -> (ContentService, Arc<dyn ArticleRepository>) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let articles = SqlxArticleRepository::boxed(pool.clone());
        let service = ContentService::new(
            articles.clone(),
            SqlxComponentRepository::boxed(pool.clone()),
            SqlxConfigurationRepository::boxed(pool.clone()),
            SqlxFlightRepository::boxed(pool),
        );
        (service, articles)
    }

    #[tokio::test]
    async fn test_latest_articles_requires_reader() {
        let (service, articles) = setup().await;
        let now = Utc::now();
        for i in 0..20 {
            let mut article = Article::new(format!("Article {}", i), "".into(), None, Visibility::PUBLIC);
            article.created_at = now - Duration::hours(i);
            articles.create(&article).await.unwrap();
        }

        assert!(service.latest_articles(None).await.unwrap().is_empty());

        let reader = User::new("membre", "membre@example.com");
        let latest = service.latest_articles(Some(&reader)).await.unwrap();
        assert_eq!(latest.len(), LATEST_ARTICLES as usize);
        assert_eq!(latest[0].title, "Article 0");
    }

    #[tokio::test]
    async fn test_missing_entity_is_not_found() {
        let (service, _) = setup().await;

        let err = service.flight(7).await.unwrap_err();
        assert!(matches!(
            err,
            ContentServiceError::NotFound {
                kind: ContentKind::Flight,
                id: 7
            }
        ));
        assert_eq!(err.to_string(), "flight not found: 7");
        assert!(service.article(7).await.is_err());
    }
}

//! Export pass: read a whole store and describe it with natural keys only.

use anyhow::{Context, Result};
use std::collections::HashMap;
use tracing::{debug, info};

use super::dump::*;
use crate::db::repositories::{
    ArticleRepository, CategoryRepository, CommentRepository, ComponentRepository,
    ConfigurationRepository, FlightRepository, SqlxArticleRepository, SqlxCategoryRepository,
    SqlxCommentRepository, SqlxComponentRepository, SqlxConfigurationRepository,
    SqlxFlightRepository, SqlxUserRepository, UserRepository,
};
use crate::db::DynDatabasePool;
use crate::models::CommentParent;

/// Id to natural key maps of the exported store
#[derive(Default)]
struct KeyIndex {
    users: HashMap<i64, UserKey>,
    categories: HashMap<i64, CategoryKey>,
    articles: HashMap<i64, ArticleKey>,
    components: HashMap<i64, ComponentKey>,
    configurations: HashMap<i64, ConfigurationKey>,
    flights: HashMap<i64, FlightKey>,
}

fn lookup<K: Clone>(map: &HashMap<i64, K>, id: i64, what: &str) -> Result<K> {
    map.get(&id)
        .cloned()
        .with_context(|| format!("Dangling reference to {} {}", what, id))
}

impl KeyIndex {
    fn author(&self, id: Option<i64>) -> Result<Option<UserKey>> {
        id.map(|id| lookup(&self.users, id, "user")).transpose()
    }

    fn parent(&self, parent: CommentParent) -> Result<ParentKey> {
        Ok(match parent {
            CommentParent::Article(id) => ParentKey::Article(lookup(&self.articles, id, "article")?),
            CommentParent::Component(id) => {
                ParentKey::Component(lookup(&self.components, id, "component")?)
            }
            CommentParent::Configuration(id) => {
                ParentKey::Configuration(lookup(&self.configurations, id, "configuration")?)
            }
            CommentParent::Flight(id) => ParentKey::Flight(lookup(&self.flights, id, "flight")?),
        })
    }
}

/// Read every table of `source` into dump records, in dependency order.
pub async fn export(source: &DynDatabasePool) -> Result<Vec<DumpRecord>> {
    let users = SqlxUserRepository::new(source.clone());
    let mut index = KeyIndex::default();
    let mut records = Vec::new();

    for group in users.list_groups().await.context("Failed to read groups")? {
        records.push(DumpRecord::Group {
            natural_key: GroupKey(group.name),
            fields: GroupFields::default(),
        });
    }

    for user in users.list().await.context("Failed to read users")? {
        let groups = users
            .groups_of(user.id)
            .await?
            .into_iter()
            .map(|g| GroupKey(g.name))
            .collect();
        let key = UserKey(user.username);
        index.users.insert(user.id, key.clone());
        records.push(DumpRecord::User {
            natural_key: key,
            fields: UserFields {
                email: user.email,
                is_staff: user.is_staff,
                date_joined: user.created_at,
                groups,
            },
        });
    }

    let categories = SqlxCategoryRepository::new(source.clone())
        .list()
        .await
        .context("Failed to read component categories")?;
    for category in categories {
        let key = CategoryKey(category.name);
        index.categories.insert(category.id, key.clone());
        records.push(DumpRecord::ComponentCategory {
            natural_key: key,
            fields: CategoryFields {
                on_board: category.on_board,
            },
        });
    }

    let articles = SqlxArticleRepository::new(source.clone())
        .list()
        .await
        .context("Failed to read articles")?;
    for article in articles {
        let key = ArticleKey(article.title, article.created_at);
        index.articles.insert(article.id, key.clone());
        records.push(DumpRecord::Article {
            natural_key: key,
            fields: ArticleFields {
                body: article.body,
                author: index.author(article.author_id)?,
                staff: article.visibility.staff,
                private: article.visibility.private,
                superprivate: article.visibility.superprivate,
            },
        });
    }

    let components = SqlxComponentRepository::new(source.clone())
        .list()
        .await
        .context("Failed to read components")?;
    for component in components {
        let category = lookup(&index.categories, component.category_id, "component category")?;
        let key = ComponentKey(component.title, category);
        index.components.insert(component.id, key.clone());
        records.push(DumpRecord::Component {
            natural_key: key,
            fields: ComponentFields {
                body: component.body,
                author: index.author(component.author_id)?,
                date: component.created_at,
                specs: component.specs,
                datasheet: component.datasheet,
                photo: component.photo,
            },
        });
    }

    let configurations = SqlxConfigurationRepository::new(source.clone())
        .list()
        .await
        .context("Failed to read configurations")?;
    for configuration in configurations {
        let components = configuration
            .component_ids
            .iter()
            .map(|id| lookup(&index.components, *id, "component"))
            .collect::<Result<Vec<_>>>()?;
        let key = ConfigurationKey(configuration.title, configuration.version_number);
        index.configurations.insert(configuration.id, key.clone());
        records.push(DumpRecord::Configuration {
            natural_key: key,
            fields: ConfigurationFields {
                body: configuration.body,
                author: index.author(configuration.author_id)?,
                date: configuration.created_at,
                firmware_version: configuration.firmware_version,
                photo: configuration.photo,
                components,
            },
        });
    }

    let flights = SqlxFlightRepository::new(source.clone())
        .list()
        .await
        .context("Failed to read flights")?;
    for flight in flights {
        let configuration =
            lookup(&index.configurations, flight.configuration_id, "configuration")?;
        let key = FlightKey(flight.title, flight.created_at);
        index.flights.insert(flight.id, key.clone());
        records.push(DumpRecord::Flight {
            natural_key: key,
            fields: FlightFields {
                body: flight.body,
                author: index.author(flight.author_id)?,
                configuration,
                meteo: flight.meteo,
                datalog: flight.datalog,
                video: flight.video,
            },
        });
    }

    let comments = SqlxCommentRepository::new(source.clone())
        .list_all()
        .await
        .context("Failed to read comments")?;
    for comment in comments {
        let key = CommentKey {
            parent: index.parent(comment.parent)?,
            author: lookup(&index.users, comment.author_id, "user")?,
            date: comment.created_at,
        };
        records.push(DumpRecord::Comment {
            natural_key: key,
            fields: CommentFields {
                content: comment.content,
                active: comment.active,
            },
        });
    }

    for record in &records {
        debug!("Exported {} {}", record.model(), record.key_text());
    }
    info!("Exported {} records", records.len());
    Ok(records)
}

//! Load pass: insert dump records into the destination store.
//!
//! Records are inserted in dependency order inside one transaction. The
//! destination assigns its own ids; natural keys are resolved first against
//! records inserted by this load, then against rows already present.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::hash::Hash;
use tracing::{debug, info, warn};

use super::dump::*;
use super::{ImportError, ImportReport};
use crate::db::{json_to_text, on_tx, DynDatabasePool, LastInsertId, StoreTransaction};
use crate::models::ContentKind;

/// A bound query parameter
enum Param {
    Text(String),
    Time(DateTime<Utc>),
    Id(i64),
}

/// Run a single-column id lookup inside the transaction.
async fn lookup_id(
    tx: &mut StoreTransaction,
    sql: &str,
    params: &[Param],
) -> Result<Option<i64>, ImportError> {
    let id = on_tx!(tx, conn => {
        let mut query = sqlx::query_scalar::<_, i64>(sql);
        for param in params {
            query = match param {
                Param::Text(text) => query.bind(text.clone()),
                Param::Time(time) => query.bind(*time),
                Param::Id(id) => query.bind(*id),
            };
        }
        query.fetch_optional(&mut *conn).await?
    });
    Ok(id)
}

/// Natural key to destination id, for one model
struct KeyMap<K> {
    model: &'static str,
    loaded: HashMap<K, i64>,
}

impl<K: Eq + Hash + serde::Serialize> KeyMap<K> {
    fn new(model: &'static str) -> Self {
        Self {
            model,
            loaded: HashMap::new(),
        }
    }

    /// Fail if `key` was already loaded from this dump
    fn check_unique(&self, key: &K) -> Result<(), ImportError> {
        if self.loaded.contains_key(key) {
            return Err(ImportError::AmbiguousNaturalKey {
                model: self.model,
                key: key_text(key),
            });
        }
        Ok(())
    }

    fn conflict(&self, key: &K) -> ImportError {
        ImportError::NaturalKeyConflict {
            model: self.model,
            key: key_text(key),
        }
    }

    fn unresolved(&self, key: &K) -> ImportError {
        ImportError::UnresolvedNaturalKey {
            model: self.model,
            key: key_text(key),
        }
    }

    fn insert(&mut self, key: K, id: i64) {
        self.loaded.insert(key, id);
    }
}

struct Loader<'a> {
    tx: &'a mut StoreTransaction,
    groups: KeyMap<GroupKey>,
    users: KeyMap<UserKey>,
    categories: KeyMap<CategoryKey>,
    articles: KeyMap<ArticleKey>,
    components: KeyMap<ComponentKey>,
    configurations: KeyMap<ConfigurationKey>,
    flights: KeyMap<FlightKey>,
    comments: KeyMap<CommentKey>,
}

impl<'a> Loader<'a> {
    fn new(tx: &'a mut StoreTransaction) -> Self {
        Self {
            tx,
            groups: KeyMap::new("group"),
            users: KeyMap::new("user"),
            categories: KeyMap::new("component_category"),
            articles: KeyMap::new("article"),
            components: KeyMap::new("component"),
            configurations: KeyMap::new("configuration"),
            flights: KeyMap::new("flight"),
            comments: KeyMap::new("comment"),
        }
    }

    // Destination lookups

    async fn find_group(&mut self, key: &GroupKey) -> Result<Option<i64>, ImportError> {
        lookup_id(
            self.tx,
            "SELECT id FROM user_groups WHERE name = ?",
            &[Param::Text(key.0.clone())],
        )
        .await
    }

    async fn find_user(&mut self, key: &UserKey) -> Result<Option<i64>, ImportError> {
        lookup_id(
            self.tx,
            "SELECT id FROM users WHERE username = ?",
            &[Param::Text(key.0.clone())],
        )
        .await
    }

    async fn find_category(&mut self, key: &CategoryKey) -> Result<Option<i64>, ImportError> {
        lookup_id(
            self.tx,
            "SELECT id FROM component_categories WHERE name = ?",
            &[Param::Text(key.0.clone())],
        )
        .await
    }

    async fn find_article(&mut self, key: &ArticleKey) -> Result<Option<i64>, ImportError> {
        lookup_id(
            self.tx,
            "SELECT id FROM articles WHERE title = ? AND created_at = ?",
            &[Param::Text(key.0.clone()), Param::Time(key.1)],
        )
        .await
    }

    async fn find_component(&mut self, key: &ComponentKey) -> Result<Option<i64>, ImportError> {
        lookup_id(
            self.tx,
            r#"SELECT c.id FROM components c
               JOIN component_categories cat ON cat.id = c.category_id
               WHERE c.title = ? AND cat.name = ?"#,
            &[Param::Text(key.0.clone()), Param::Text((key.1).0.clone())],
        )
        .await
    }

    async fn find_configuration(
        &mut self,
        key: &ConfigurationKey,
    ) -> Result<Option<i64>, ImportError> {
        lookup_id(
            self.tx,
            "SELECT id FROM configurations WHERE title = ? AND version_number = ?",
            &[Param::Text(key.0.clone()), Param::Text(key.1.clone())],
        )
        .await
    }

    async fn find_flight(&mut self, key: &FlightKey) -> Result<Option<i64>, ImportError> {
        lookup_id(
            self.tx,
            "SELECT id FROM flights WHERE title = ? AND created_at = ?",
            &[Param::Text(key.0.clone()), Param::Time(key.1)],
        )
        .await
    }

    // Reference resolution: this load first, then the destination

    async fn group_id(&mut self, key: &GroupKey) -> Result<i64, ImportError> {
        if let Some(id) = self.groups.loaded.get(key) {
            return Ok(*id);
        }
        self.find_group(key).await?.ok_or_else(|| self.groups.unresolved(key))
    }

    async fn user_id(&mut self, key: &UserKey) -> Result<i64, ImportError> {
        if let Some(id) = self.users.loaded.get(key) {
            return Ok(*id);
        }
        self.find_user(key).await?.ok_or_else(|| self.users.unresolved(key))
    }

    async fn author_id(&mut self, key: Option<&UserKey>) -> Result<Option<i64>, ImportError> {
        match key {
            Some(key) => Ok(Some(self.user_id(key).await?)),
            None => Ok(None),
        }
    }

    async fn category_id(&mut self, key: &CategoryKey) -> Result<i64, ImportError> {
        if let Some(id) = self.categories.loaded.get(key) {
            return Ok(*id);
        }
        self.find_category(key)
            .await?
            .ok_or_else(|| self.categories.unresolved(key))
    }

    async fn article_id(&mut self, key: &ArticleKey) -> Result<i64, ImportError> {
        if let Some(id) = self.articles.loaded.get(key) {
            return Ok(*id);
        }
        self.find_article(key).await?.ok_or_else(|| self.articles.unresolved(key))
    }

    async fn component_id(&mut self, key: &ComponentKey) -> Result<i64, ImportError> {
        if let Some(id) = self.components.loaded.get(key) {
            return Ok(*id);
        }
        self.find_component(key)
            .await?
            .ok_or_else(|| self.components.unresolved(key))
    }

    async fn configuration_id(&mut self, key: &ConfigurationKey) -> Result<i64, ImportError> {
        if let Some(id) = self.configurations.loaded.get(key) {
            return Ok(*id);
        }
        self.find_configuration(key)
            .await?
            .ok_or_else(|| self.configurations.unresolved(key))
    }

    async fn flight_id(&mut self, key: &FlightKey) -> Result<i64, ImportError> {
        if let Some(id) = self.flights.loaded.get(key) {
            return Ok(*id);
        }
        self.find_flight(key).await?.ok_or_else(|| self.flights.unresolved(key))
    }

    async fn parent_id(&mut self, key: &ParentKey) -> Result<i64, ImportError> {
        match key {
            ParentKey::Article(k) => self.article_id(k).await,
            ParentKey::Component(k) => self.component_id(k).await,
            ParentKey::Configuration(k) => self.configuration_id(k).await,
            ParentKey::Flight(k) => self.flight_id(k).await,
        }
    }

    // Inserts

    async fn load(&mut self, record: DumpRecord) -> Result<(), ImportError> {
        debug!("Loading {} {}", record.model(), record.key_text());
        match record {
            DumpRecord::Group { natural_key, .. } => self.load_group(natural_key).await,
            DumpRecord::User { natural_key, fields } => self.load_user(natural_key, fields).await,
            DumpRecord::ComponentCategory {
                natural_key,
                fields,
            } => self.load_category(natural_key, fields).await,
            DumpRecord::Article {
                natural_key,
                fields,
            } => self.load_article(natural_key, fields).await,
            DumpRecord::Component {
                natural_key,
                fields,
            } => self.load_component(natural_key, fields).await,
            DumpRecord::Configuration {
                natural_key,
                fields,
            } => self.load_configuration(natural_key, fields).await,
            DumpRecord::Flight {
                natural_key,
                fields,
            } => self.load_flight(natural_key, fields).await,
            DumpRecord::Comment {
                natural_key,
                fields,
            } => self.load_comment(natural_key, fields).await,
        }
    }

    async fn load_group(&mut self, key: GroupKey) -> Result<(), ImportError> {
        self.groups.check_unique(&key)?;
        if self.find_group(&key).await?.is_some() {
            return Err(self.groups.conflict(&key));
        }

        let id = on_tx!(self.tx, conn => {
            sqlx::query("INSERT INTO user_groups (name) VALUES (?)")
                .bind(&key.0)
                .execute(&mut *conn)
                .await?
                .last_id()
        });
        self.groups.insert(key, id);
        Ok(())
    }

    async fn load_user(&mut self, key: UserKey, fields: UserFields) -> Result<(), ImportError> {
        self.users.check_unique(&key)?;
        if self.find_user(&key).await?.is_some() {
            return Err(self.users.conflict(&key));
        }

        let mut group_ids = Vec::with_capacity(fields.groups.len());
        for group in &fields.groups {
            group_ids.push(self.group_id(group).await?);
        }

        let id = on_tx!(self.tx, conn => {
            let id = sqlx::query(
                "INSERT INTO users (username, email, is_staff, created_at) VALUES (?, ?, ?, ?)",
            )
            .bind(&key.0)
            .bind(&fields.email)
            .bind(fields.is_staff)
            .bind(fields.date_joined)
            .execute(&mut *conn)
            .await?
            .last_id();

            for group_id in &group_ids {
                sqlx::query("INSERT INTO user_group_members (user_id, group_id) VALUES (?, ?)")
                    .bind(id)
                    .bind(*group_id)
                    .execute(&mut *conn)
                    .await?;
            }
            id
        });
        self.users.insert(key, id);
        Ok(())
    }

    async fn load_category(
        &mut self,
        key: CategoryKey,
        fields: CategoryFields,
    ) -> Result<(), ImportError> {
        self.categories.check_unique(&key)?;
        if self.find_category(&key).await?.is_some() {
            return Err(self.categories.conflict(&key));
        }

        let id = on_tx!(self.tx, conn => {
            sqlx::query("INSERT INTO component_categories (name, on_board) VALUES (?, ?)")
                .bind(&key.0)
                .bind(fields.on_board)
                .execute(&mut *conn)
                .await?
                .last_id()
        });
        self.categories.insert(key, id);
        Ok(())
    }

    async fn load_article(
        &mut self,
        key: ArticleKey,
        fields: ArticleFields,
    ) -> Result<(), ImportError> {
        self.articles.check_unique(&key)?;
        if self.find_article(&key).await?.is_some() {
            return Err(self.articles.conflict(&key));
        }
        let author_id = self.author_id(fields.author.as_ref()).await?;

        let id = on_tx!(self.tx, conn => {
            sqlx::query(
                r#"INSERT INTO articles (title, body, author_id, staff, private, superprivate, created_at)
                   VALUES (?, ?, ?, ?, ?, ?, ?)"#,
            )
            .bind(&key.0)
            .bind(&fields.body)
            .bind(author_id)
            .bind(fields.staff)
            .bind(fields.private)
            .bind(fields.superprivate)
            .bind(key.1)
            .execute(&mut *conn)
            .await?
            .last_id()
        });
        self.articles.insert(key, id);
        Ok(())
    }

    async fn load_component(
        &mut self,
        key: ComponentKey,
        fields: ComponentFields,
    ) -> Result<(), ImportError> {
        self.components.check_unique(&key)?;
        if self.find_component(&key).await?.is_some() {
            return Err(self.components.conflict(&key));
        }
        let category_id = self.category_id(&key.1).await?;
        let author_id = self.author_id(fields.author.as_ref()).await?;
        let specs = json_to_text(&fields.specs);

        let id = on_tx!(self.tx, conn => {
            sqlx::query(
                r#"INSERT INTO components
                   (title, body, author_id, category_id, specs, datasheet, photo,
                    staff, private, superprivate, created_at)
                   VALUES (?, ?, ?, ?, ?, ?, ?, false, false, false, ?)"#,
            )
            .bind(&key.0)
            .bind(&fields.body)
            .bind(author_id)
            .bind(category_id)
            .bind(&specs)
            .bind(&fields.datasheet)
            .bind(&fields.photo)
            .bind(fields.date)
            .execute(&mut *conn)
            .await?
            .last_id()
        });
        self.components.insert(key, id);
        Ok(())
    }

    async fn load_configuration(
        &mut self,
        key: ConfigurationKey,
        fields: ConfigurationFields,
    ) -> Result<(), ImportError> {
        self.configurations.check_unique(&key)?;
        if self.find_configuration(&key).await?.is_some() {
            return Err(self.configurations.conflict(&key));
        }
        let author_id = self.author_id(fields.author.as_ref()).await?;
        let mut component_ids = Vec::with_capacity(fields.components.len());
        for component in &fields.components {
            component_ids.push(self.component_id(component).await?);
        }

        let id = on_tx!(self.tx, conn => {
            let id = sqlx::query(
                r#"INSERT INTO configurations
                   (title, body, author_id, version_number, firmware_version, photo,
                    staff, private, superprivate, created_at)
                   VALUES (?, ?, ?, ?, ?, ?, false, false, false, ?)"#,
            )
            .bind(&key.0)
            .bind(&fields.body)
            .bind(author_id)
            .bind(&key.1)
            .bind(&fields.firmware_version)
            .bind(&fields.photo)
            .bind(fields.date)
            .execute(&mut *conn)
            .await?
            .last_id();

            for component_id in &component_ids {
                sqlx::query(
                    "INSERT INTO configuration_components (configuration_id, component_id) VALUES (?, ?)",
                )
                .bind(id)
                .bind(*component_id)
                .execute(&mut *conn)
                .await?;
            }
            id
        });
        self.configurations.insert(key, id);
        Ok(())
    }

    async fn load_flight(&mut self, key: FlightKey, fields: FlightFields) -> Result<(), ImportError> {
        self.flights.check_unique(&key)?;
        if self.find_flight(&key).await?.is_some() {
            return Err(self.flights.conflict(&key));
        }
        let author_id = self.author_id(fields.author.as_ref()).await?;
        let configuration_id = self.configuration_id(&fields.configuration).await?;
        let meteo = json_to_text(&fields.meteo);

        let id = on_tx!(self.tx, conn => {
            sqlx::query(
                r#"INSERT INTO flights
                   (title, body, author_id, configuration_id, meteo, datalog, video,
                    staff, private, superprivate, created_at)
                   VALUES (?, ?, ?, ?, ?, ?, ?, false, false, false, ?)"#,
            )
            .bind(&key.0)
            .bind(&fields.body)
            .bind(author_id)
            .bind(configuration_id)
            .bind(&meteo)
            .bind(&fields.datalog)
            .bind(&fields.video)
            .bind(key.1)
            .execute(&mut *conn)
            .await?
            .last_id()
        });
        self.flights.insert(key, id);
        Ok(())
    }

    async fn load_comment(
        &mut self,
        key: CommentKey,
        fields: CommentFields,
    ) -> Result<(), ImportError> {
        self.comments.check_unique(&key)?;
        let kind = key.parent.kind();
        let parent_id = self.parent_id(&key.parent).await?;
        let author_id = self.user_id(&key.author).await?;

        let existing = lookup_id(
            self.tx,
            &format!(
                "SELECT id FROM comments WHERE {} = ? AND author_id = ? AND created_at = ?",
                kind.comment_column()
            ),
            &[Param::Id(parent_id), Param::Id(author_id), Param::Time(key.date)],
        )
        .await?;
        if existing.is_some() {
            return Err(self.comments.conflict(&key));
        }

        let parents = ContentKind::ALL.map(|k| (k == kind).then_some(parent_id));
        let id = on_tx!(self.tx, conn => {
            sqlx::query(
                r#"INSERT INTO comments
                   (article_id, component_id, configuration_id, flight_id, author_id, content, active, created_at)
                   VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
            )
            .bind(parents[0])
            .bind(parents[1])
            .bind(parents[2])
            .bind(parents[3])
            .bind(author_id)
            .bind(&fields.content)
            .bind(fields.active)
            .bind(key.date)
            .execute(&mut *conn)
            .await?
            .last_id()
        });
        self.comments.insert(key, id);
        Ok(())
    }
}

/// Insert `records` into `destination` as one transaction.
///
/// Any failure rolls the whole load back; the destination is then left as
/// it was before the call.
pub async fn load(
    destination: &DynDatabasePool,
    mut records: Vec<DumpRecord>,
) -> Result<ImportReport, ImportError> {
    records.sort_by_key(DumpRecord::rank);

    let mut tx = StoreTransaction::begin(destination).await?;
    let mut report = ImportReport::default();

    let result = {
        let mut loader = Loader::new(&mut tx);
        let mut result = Ok(());
        for record in records {
            let model = record.model();
            if let Err(e) = loader.load(record).await {
                result = Err(e);
                break;
            }
            report.record(model);
        }
        result
    };

    match result {
        Ok(()) => {
            tx.commit().await?;
            info!("Loaded {} records", report.total());
            Ok(report)
        }
        Err(e) => {
            if let Err(rollback) = tx.rollback().await {
                warn!("Rollback after failed load also failed: {}", rollback);
            }
            Err(e)
        }
    }
}

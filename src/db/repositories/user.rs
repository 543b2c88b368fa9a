//! User repository
//!
//! Database operations for users, groups and group membership.
//!
//! This module provides:
//! - `UserRepository` trait defining the interface for user data access
//! - `SqlxUserRepository` implementing the trait for SQLite and MySQL

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::db::{on_pool, DynDatabasePool, LastInsertId};
use crate::models::{Group, User};

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a new user
    async fn create(&self, user: &User) -> Result<User>;

    /// Get user by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Get user by username
    async fn get_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Create a new group
    async fn create_group(&self, name: &str) -> Result<Group>;

    /// Get group by name
    async fn get_group_by_name(&self, name: &str) -> Result<Option<Group>>;

    /// Add a user to a group. Adding an existing member is a no-op.
    async fn add_to_group(&self, user_id: i64, group_id: i64) -> Result<()>;

    /// Check whether a user belongs to the named group
    async fn is_member(&self, user_id: i64, group_name: &str) -> Result<bool>;

    /// List the groups of a user
    async fn groups_of(&self, user_id: i64) -> Result<Vec<Group>>;

    /// All users, by ID
    async fn list(&self) -> Result<Vec<User>>;

    /// All groups, by name
    async fn list_groups(&self) -> Result<Vec<Group>>;
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    email: String,
    is_staff: bool,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            email: row.email,
            is_staff: row.is_staff,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct GroupRow {
    id: i64,
    name: String,
}

impl From<GroupRow> for Group {
    fn from(row: GroupRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
        }
    }
}

/// SQLx-based user repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        let id = on_pool!(self.pool, conn => {
            sqlx::query("INSERT INTO users (username, email, is_staff, created_at) VALUES (?, ?, ?, ?)")
                .bind(&user.username)
                .bind(&user.email)
                .bind(user.is_staff)
                .bind(user.created_at)
                .execute(conn)
                .await
                .with_context(|| format!("Failed to create user: {}", user.username))?
                .last_id()
        });

        Ok(User { id, ..user.clone() })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        let row = on_pool!(self.pool, conn => {
            sqlx::query_as::<_, UserRow>("SELECT id, username, email, is_staff, created_at FROM users WHERE id = ?")
                .bind(id)
                .fetch_optional(conn)
                .await?
        });
        Ok(row.map(User::from))
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let row = on_pool!(self.pool, conn => {
            sqlx::query_as::<_, UserRow>("SELECT id, username, email, is_staff, created_at FROM users WHERE username = ?")
                .bind(username)
                .fetch_optional(conn)
                .await?
        });
        Ok(row.map(User::from))
    }

    async fn create_group(&self, name: &str) -> Result<Group> {
        let id = on_pool!(self.pool, conn => {
            sqlx::query("INSERT INTO user_groups (name) VALUES (?)")
                .bind(name)
                .execute(conn)
                .await
                .with_context(|| format!("Failed to create group: {}", name))?
                .last_id()
        });
        Ok(Group {
            id,
            name: name.to_string(),
        })
    }

    async fn get_group_by_name(&self, name: &str) -> Result<Option<Group>> {
        let row = on_pool!(self.pool, conn => {
            sqlx::query_as::<_, GroupRow>("SELECT id, name FROM user_groups WHERE name = ?")
                .bind(name)
                .fetch_optional(conn)
                .await?
        });
        Ok(row.map(Group::from))
    }

    async fn add_to_group(&self, user_id: i64, group_id: i64) -> Result<()> {
        on_pool!(self.pool, conn => {
            let existing: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM user_group_members WHERE user_id = ? AND group_id = ?",
            )
            .bind(user_id)
            .bind(group_id)
            .fetch_one(conn)
            .await?;

            if existing == 0 {
                sqlx::query("INSERT INTO user_group_members (user_id, group_id) VALUES (?, ?)")
                    .bind(user_id)
                    .bind(group_id)
                    .execute(conn)
                    .await
                    .context("Failed to add group member")?;
            }
        });
        Ok(())
    }

    async fn is_member(&self, user_id: i64, group_name: &str) -> Result<bool> {
        let count: i64 = on_pool!(self.pool, conn => {
            sqlx::query_scalar(
                r#"SELECT COUNT(*) FROM user_group_members m
                   JOIN user_groups g ON g.id = m.group_id
                   WHERE m.user_id = ? AND g.name = ?"#,
            )
            .bind(user_id)
            .bind(group_name)
            .fetch_one(conn)
            .await?
        });
        Ok(count > 0)
    }

    async fn groups_of(&self, user_id: i64) -> Result<Vec<Group>> {
        let rows = on_pool!(self.pool, conn => {
            sqlx::query_as::<_, GroupRow>(
                r#"SELECT g.id, g.name FROM user_groups g
                   JOIN user_group_members m ON m.group_id = g.id
                   WHERE m.user_id = ?
                   ORDER BY g.name"#,
            )
            .bind(user_id)
            .fetch_all(conn)
            .await?
        });
        Ok(rows.into_iter().map(Group::from).collect())
    }

    async fn list(&self) -> Result<Vec<User>> {
        let rows = on_pool!(self.pool, conn => {
            sqlx::query_as::<_, UserRow>("SELECT id, username, email, is_staff, created_at FROM users ORDER BY id")
                .fetch_all(conn)
                .await?
        });
        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn list_groups(&self) -> Result<Vec<Group>> {
        let rows = on_pool!(self.pool, conn => {
            sqlx::query_as::<_, GroupRow>("SELECT id, name FROM user_groups ORDER BY name")
                .fetch_all(conn)
                .await?
        });
        Ok(rows.into_iter().map(Group::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> SqlxUserRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxUserRepository::new(pool)
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let repo = setup_test_repo().await;

        let created = repo
            .create(&User::new("pilote", "pilote@example.com"))
            .await
            .expect("Failed to create user");
        assert!(created.id > 0);

        let by_id = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(by_id.username, "pilote");

        let by_name = repo.get_by_username("pilote").await.unwrap().unwrap();
        assert_eq!(by_name.id, created.id);

        assert!(repo.get_by_username("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username_fails() {
        let repo = setup_test_repo().await;
        repo.create(&User::new("pilote", "a@example.com")).await.unwrap();

        let result = repo.create(&User::new("pilote", "b@example.com")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_group_membership() {
        let repo = setup_test_repo().await;
        let user = repo.create(&User::new("modo", "modo@example.com")).await.unwrap();
        let other = repo.create(&User::new("lambda", "lambda@example.com")).await.unwrap();
        let group = repo.create_group("Moderateurs").await.unwrap();

        repo.add_to_group(user.id, group.id).await.unwrap();
        // Second add is a no-op
        repo.add_to_group(user.id, group.id).await.unwrap();

        assert!(repo.is_member(user.id, "Moderateurs").await.unwrap());
        assert!(!repo.is_member(other.id, "Moderateurs").await.unwrap());
        assert!(!repo.is_member(user.id, "Autre").await.unwrap());

        let groups = repo.groups_of(user.id).await.unwrap();
        assert_eq!(groups, vec![group.clone()]);
        assert_eq!(repo.list_groups().await.unwrap(), vec![group]);
        assert_eq!(repo.list().await.unwrap().len(), 2);
    }
}

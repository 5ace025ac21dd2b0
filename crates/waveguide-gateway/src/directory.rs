//! User directory collaborator.
//!
//! The admission gate only guarantees a verified subject (the username).
//! Handlers that need a full user record resolve it here.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A registered user.
#[derive(Clone)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    /// bcrypt hash - redacted in Debug output.
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("password_hash", &"[REDACTED]")
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

/// Fields supplied when creating a user. The password is already hashed.
#[derive(Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("username is already taken")]
    UsernameTaken,

    #[error("email is already registered")]
    EmailTaken,

    #[error("user directory unavailable: {0}")]
    Unavailable(String),
}

/// Lookup and creation of users.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, DirectoryError>;

    /// Email comparison is case-insensitive.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DirectoryError>;

    /// Create a user with a fresh id.
    ///
    /// # Errors
    ///
    /// `UsernameTaken` / `EmailTaken` if either is already registered.
    async fn create(&self, new_user: NewUser) -> Result<User, DirectoryError>;
}

/// Process-local directory keyed by username.
#[derive(Default)]
pub struct InMemoryUserDirectory {
    users: RwLock<HashMap<String, User>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }
}

fn same_email(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, DirectoryError> {
        Ok(self.users.read().await.get(username).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DirectoryError> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|user| same_email(&user.email, email))
            .cloned())
    }

    async fn create(&self, new_user: NewUser) -> Result<User, DirectoryError> {
        // Uniqueness is checked and enforced under one write guard
        let mut users = self.users.write().await;

        if users.contains_key(&new_user.username) {
            return Err(DirectoryError::UsernameTaken);
        }
        if users
            .values()
            .any(|user| same_email(&user.email, &new_user.email))
        {
            return Err(DirectoryError::EmailTaken);
        }

        let user = User {
            id: Uuid::new_v4(),
            username: new_user.username,
            email: new_user.email,
            password_hash: new_user.password_hash,
            created_at: Utc::now(),
        };
        users.insert(user.username.clone(), user.clone());

        tracing::info!(target: "waveguide.directory", user_id = %user.id, "Created user");

        Ok(user)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: "$2b$04$placeholderplaceholderplaceholderplaceholde".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_then_find() {
        let directory = InMemoryUserDirectory::new();
        let created = directory
            .create(new_user("ada", "ada@example.com"))
            .await
            .unwrap();

        let by_name = directory.find_by_username("ada").await.unwrap().unwrap();
        assert_eq!(by_name.id, created.id);

        let by_email = directory
            .find_by_email("ADA@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_email.id, created.id);

        assert!(directory.find_by_username("grace").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username_and_email_rejected() {
        let directory = InMemoryUserDirectory::new();
        directory
            .create(new_user("ada", "ada@example.com"))
            .await
            .unwrap();

        assert_eq!(
            directory
                .create(new_user("ada", "other@example.com"))
                .await
                .unwrap_err(),
            DirectoryError::UsernameTaken
        );
        assert_eq!(
            directory
                .create(new_user("ada2", "Ada@Example.com"))
                .await
                .unwrap_err(),
            DirectoryError::EmailTaken
        );
        assert_eq!(directory.len().await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_creates_of_same_username() {
        let directory = Arc::new(InMemoryUserDirectory::new());

        let tasks: Vec<_> = (0..10)
            .map(|i| {
                let directory = Arc::clone(&directory);
                tokio::spawn(async move {
                    directory
                        .create(new_user("ada", &format!("ada{i}@example.com")))
                        .await
                })
            })
            .collect();

        let mut created = 0;
        for task in tasks {
            if task.await.unwrap().is_ok() {
                created += 1;
            }
        }

        assert_eq!(created, 1);
        assert_eq!(directory.len().await, 1);
    }

    #[test]
    fn test_user_debug_redacts_hash() {
        let user = User {
            id: Uuid::new_v4(),
            username: "ada".to_string(),
            email: "ada@example.com".to_string(),
            password_hash: "$2b$12$secrethash".to_string(),
            created_at: Utc::now(),
        };
        let debug_str = format!("{:?}", user);
        assert!(!debug_str.contains("secrethash"));
        assert!(!debug_str.contains("ada@example.com"));
    }
}

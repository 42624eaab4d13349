use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Role::Admin),
            "user" => Some(Role::User),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
}

/// In-memory user store handed to the handlers through `AppState`.
pub struct UserRepository {
    users: RwLock<Vec<User>>,
}

impl Default for UserRepository {
    fn default() -> Self {
        Self::seeded()
    }
}

impl UserRepository {
    pub fn new(users: Vec<User>) -> Self {
        Self {
            users: RwLock::new(users),
        }
    }

    pub fn seeded() -> Self {
        let seed = [
            (1, "John Doe", "john@example.com", Role::Admin),
            (2, "Jane Smith", "jane@example.com", Role::User),
            (3, "Bob Johnson", "bob@example.com", Role::User),
            (4, "Alice Brown", "alice@example.com", Role::User),
            (5, "Tom Lee", "tom@example.com", Role::Admin),
        ];
        Self::new(
            seed.into_iter()
                .map(|(id, name, email, role)| User {
                    id,
                    name: name.to_string(),
                    email: email.to_string(),
                    role,
                })
                .collect(),
        )
    }

    /// All users, optionally restricted to one role, in insertion order.
    pub async fn list(&self, role: Option<Role>) -> Vec<User> {
        let users = self.users.read().await;
        users
            .iter()
            .filter(|u| role.is_none_or(|r| u.role == r))
            .cloned()
            .collect()
    }

    /// Case-insensitive substring match on name or email.
    pub async fn search(&self, query: &str) -> Vec<User> {
        let keyword = query.to_lowercase();
        let users = self.users.read().await;
        users
            .iter()
            .filter(|u| u.name.to_lowercase().contains(&keyword) || u.email.to_lowercase().contains(&keyword))
            .cloned()
            .collect()
    }

    pub async fn get(&self, id: u64) -> Option<User> {
        self.users.read().await.iter().find(|u| u.id == id).cloned()
    }

    pub async fn create(&self, input: NewUser) -> User {
        let mut users = self.users.write().await;
        let id = users.iter().map(|u| u.id).max().unwrap_or(0) + 1;
        let user = User {
            id,
            name: input.name,
            email: input.email,
            role: input.role.unwrap_or(Role::User),
        };
        users.push(user.clone());
        user
    }

    pub async fn update(&self, id: u64, changes: UserChanges) -> AppResult<User> {
        let mut users = self.users.write().await;
        let user = users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| user_not_found(id))?;

        if let Some(name) = changes.name {
            user.name = name;
        }
        if let Some(email) = changes.email {
            user.email = email;
        }
        if let Some(role) = changes.role {
            user.role = role;
        }
        Ok(user.clone())
    }

    pub async fn delete(&self, id: u64) -> AppResult<User> {
        let mut users = self.users.write().await;
        let idx = users
            .iter()
            .position(|u| u.id == id)
            .ok_or_else(|| user_not_found(id))?;
        Ok(users.remove(idx))
    }
}

pub fn user_not_found(id: impl std::fmt::Display) -> AppError {
    AppError::NotFound(format!("User with ID {id} not found"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn filters_by_role() {
        let repo = UserRepository::seeded();
        let admins = repo.list(Some(Role::Admin)).await;
        assert_eq!(admins.iter().map(|u| u.id).collect::<Vec<_>>(), vec![1, 5]);
        assert_eq!(repo.list(None).await.len(), 5);
    }

    #[tokio::test]
    async fn ids_never_reuse_after_delete() {
        let repo = UserRepository::seeded();
        repo.delete(2).await.unwrap();

        let user = repo
            .create(NewUser {
                name: "New".into(),
                email: "new@example.com".into(),
                role: None,
            })
            .await;
        assert_eq!(user.id, 6);
        assert_eq!(user.role, Role::User);
    }

    #[tokio::test]
    async fn update_merges_only_given_fields() {
        let repo = UserRepository::seeded();
        let updated = repo
            .update(
                3,
                UserChanges {
                    role: Some(Role::Admin),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Bob Johnson");
        assert_eq!(updated.role, Role::Admin);

        assert!(matches!(
            repo.update(99, UserChanges::default()).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn search_matches_name_or_email() {
        let repo = UserRepository::seeded();
        assert_eq!(repo.search("JOHN").await.len(), 2);
        assert_eq!(repo.search("alice@").await[0].id, 4);
        assert!(repo.search("zzz").await.is_empty());
    }
}

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{Result as HashResult, SaltString, rand_core::OsRng},
};

use std::collections::HashSet;

use garde::Validate;
use mfd_types::claim::{Permission, UserClaim};
use serde::{Deserialize, Serialize};
use time::Date;
use tracing::{debug, warn};

use crate::{Error, Pool, error::Result};

fn hash_password(password: &str) -> HashResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)?
        .to_string();
    Ok(password_hash)
}

fn verify_password(password: &str, password_hash: &str) -> HashResult<bool> {
    let parsed_hash = PasswordHash::new(password_hash)?;
    let res = Argon2::default().verify_password(password.as_bytes(), &parsed_hash);
    if let Err(e) = res {
        debug!("Invalid password, error {e}");
    }
    Ok(res.is_ok())
}

fn is_valid_permission(permission: &str, _ctx: &()) -> garde::Result {
    permission
        .parse::<Permission>()
        .map_err(garde::Error::new)
        .map(|_| ())
}

#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
pub struct CreateUser {
    #[garde(length(min = 3, max = 150))]
    pub username: String,
    #[garde(email)]
    pub email: String,
    #[garde(length(min = 8, max = 255))]
    pub password: Option<String>,
    #[garde(skip)]
    #[serde(default)]
    pub superuser: bool,
    #[garde(inner(inner(custom(is_valid_permission))))]
    pub permissions: Option<Vec<String>>,
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct UserInt {
    id: i64,
    username: String,
    email: String,
    superuser: bool,
    permissions: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub superuser: bool,
    pub permissions: HashSet<Permission>,
}

impl From<UserInt> for User {
    fn from(value: UserInt) -> Self {
        let permissions = value
            .permissions
            .map(|s| {
                s.split(',')
                    .filter(|s| !s.is_empty())
                    .filter_map(|s| {
                        s.parse::<Permission>()
                            .inspect_err(|e| warn!("Ignoring stored permission: {e}"))
                            .ok()
                    })
                    .collect()
            })
            .unwrap_or_default();
        Self {
            id: value.id,
            username: value.username,
            email: value.email,
            superuser: value.superuser,
            permissions,
        }
    }
}

impl From<User> for UserClaim {
    fn from(value: User) -> Self {
        UserClaim {
            id: value.id,
            username: value.username,
            email: value.email,
            superuser: value.superuser,
            permissions: value.permissions,
        }
    }
}

/// Per user account extension, one row per user, created with the account.
#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct Profile {
    pub user_id: i64,
    pub bio: Option<String>,
    pub avatar: Option<String>,
    pub location: Option<String>,
    pub birth_date: Option<Date>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
pub struct UpdateProfile {
    #[garde(length(max = 5000))]
    pub bio: Option<String>,
    #[garde(length(max = 1024))]
    pub avatar: Option<String>,
    #[garde(length(max = 255))]
    pub location: Option<String>,
    #[garde(skip)]
    pub birth_date: Option<Date>,
}

pub type UserRepository = UserRepositoryImpl<Pool>;

pub struct UserRepositoryImpl<E> {
    executor: E,
}

impl<'c, E> UserRepositoryImpl<E>
where
    for<'a> &'a E: sqlx::Executor<'c, Database = crate::ChosenDB>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub async fn get(&self, id: i64) -> Result<User> {
        let user = sqlx::query_as::<_, UserInt>(
            "SELECT id, username, email, superuser, permissions FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.executor)
        .await?
        .ok_or_else(|| Error::RecordNotFound("User".to_string()))?;
        Ok(user.into())
    }

    pub async fn find_by_username(&self, username: &str) -> Result<User> {
        let user = sqlx::query_as::<_, UserInt>(
            "SELECT id, username, email, superuser, permissions FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.executor)
        .await?
        .ok_or_else(|| Error::RecordNotFound("User".to_string()))?;
        Ok(user.into())
    }

    pub async fn count(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.executor)
            .await?;
        Ok(count)
    }

    pub async fn check_password(&self, username: &str, password: &str) -> Result<User> {
        let (id, hashed_password): (i64, Option<String>) =
            sqlx::query_as("SELECT id, password FROM users WHERE username = ?")
                .bind(username)
                .fetch_one(&self.executor)
                .await
                .map_err(|e| {
                    debug!("User check error: {e}");
                    Error::InvalidCredentials
                })?;
        if let Some(hashed_password) = hashed_password {
            if verify_password(password, &hashed_password).unwrap_or(false) {
                return self.get(id).await;
            }
        }
        Err(Error::InvalidCredentials)
    }

    pub async fn get_profile(&self, user_id: i64) -> Result<Profile> {
        sqlx::query_as::<_, Profile>(
            "SELECT user_id, bio, avatar, location, birth_date FROM profile WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.executor)
        .await?
        .ok_or_else(|| Error::RecordNotFound("Profile".to_string()))
    }

    pub async fn update_profile(&self, user_id: i64, payload: UpdateProfile) -> Result<Profile> {
        let result = sqlx::query(
            "UPDATE profile SET bio = ?, avatar = ?, location = ?, birth_date = ? \
             WHERE user_id = ?",
        )
        .bind(&payload.bio)
        .bind(&payload.avatar)
        .bind(&payload.location)
        .bind(payload.birth_date)
        .bind(user_id)
        .execute(&self.executor)
        .await?;
        if result.rows_affected() == 0 {
            return Err(Error::RecordNotFound("Profile".to_string()));
        }
        self.get_profile(user_id).await
    }
}

// Account and its profile row are created in one transaction.
impl UserRepositoryImpl<Pool> {
    pub async fn create(&self, payload: CreateUser) -> Result<User> {
        let password = payload.password.map(|p| hash_password(&p)).transpose()?;
        let permissions = payload.permissions.map(|p| p.join(","));
        let mut tx = self.executor.begin().await?;
        let result = sqlx::query(
            "INSERT INTO users (username, email, password, superuser, permissions) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&payload.username)
        .bind(&payload.email)
        .bind(password)
        .bind(payload.superuser)
        .bind(permissions)
        .execute(&mut *tx)
        .await?;
        let id = result.last_insert_rowid();
        sqlx::query("INSERT INTO profile (user_id) VALUES (?)")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        self.get(id).await
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.executor)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::RecordNotFound("User".to_string()));
        }
        Ok(())
    }
}

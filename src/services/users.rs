use tracing::info;

use super::password::{hash_password_blocking, verify_password_blocking};
use super::ServiceError;
use crate::db::users::{self, UserChanges};
use crate::db::Database;
use crate::models::user::{UserCreate, UserRecord, UserUpdate};

const MIN_PASSWORD_LEN: usize = 8;
const MIN_USERNAME_LEN: usize = 3;
const WEAK_PASSWORDS: [&str; 4] = ["password", "123456", "qwerty", "admin"];

fn check_email(email: &str) -> Result<(), ServiceError> {
    if !email.contains('@') || !email.contains('.') {
        return Err(ServiceError::rule("Invalid email format"));
    }
    Ok(())
}

fn check_password(password: &str) -> Result<(), ServiceError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ServiceError::rule(
            "Password must be at least 8 characters long",
        ));
    }
    let lower = password.to_lowercase();
    if WEAK_PASSWORDS.contains(&lower.as_str()) {
        return Err(ServiceError::rule("Password is too weak"));
    }
    Ok(())
}

fn check_username(username: &str) -> Result<(), ServiceError> {
    if username.chars().count() < MIN_USERNAME_LEN {
        return Err(ServiceError::rule(
            "Username must be at least 3 characters long",
        ));
    }
    Ok(())
}

#[derive(Clone)]
pub struct UserService {
    db: Database,
}

impl UserService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn create_user(&self, input: &UserCreate) -> Result<UserRecord, ServiceError> {
        check_email(&input.email)?;
        check_password(&input.password)?;
        check_username(&input.username)?;

        if users::get_by_email(&self.db, &input.email).await?.is_some() {
            return Err(ServiceError::rule("Email already registered"));
        }
        if users::get_by_username(&self.db, &input.username)
            .await?
            .is_some()
        {
            return Err(ServiceError::rule("Username already taken"));
        }

        let hashed = hash_password_blocking(input.password.clone()).await?;
        let user = users::create(&self.db, &input.email, &input.username, &hashed).await?;
        info!("Registered user {} ({})", user.id, user.username);
        Ok(user)
    }

    /// Looks the login up as an email first, then as a username.
    pub async fn authenticate(
        &self,
        username_or_email: &str,
        password: &str,
    ) -> Result<Option<UserRecord>, ServiceError> {
        if username_or_email.is_empty() || password.is_empty() {
            return Ok(None);
        }

        let user = match users::get_by_email(&self.db, username_or_email).await? {
            Some(user) => Some(user),
            None => users::get_by_username(&self.db, username_or_email).await?,
        };

        let Some(user) = user else {
            return Ok(None);
        };
        let verified =
            verify_password_blocking(password.to_string(), user.hashed_password.clone()).await;
        Ok(verified.then_some(user))
    }

    pub async fn get_user(&self, user_id: i64) -> Result<Option<UserRecord>, ServiceError> {
        Ok(users::get(&self.db, user_id).await?)
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, ServiceError> {
        Ok(users::get_by_email(&self.db, email).await?)
    }

    /// `Ok(None)` when the user no longer exists.
    pub async fn update_user(
        &self,
        user_id: i64,
        input: &UserUpdate,
    ) -> Result<Option<UserRecord>, ServiceError> {
        let Some(current) = users::get(&self.db, user_id).await? else {
            return Ok(None);
        };

        if let Some(email) = &input.email {
            check_email(email)?;
            if *email != current.email && users::get_by_email(&self.db, email).await?.is_some() {
                return Err(ServiceError::rule("Email already registered"));
            }
        }
        if let Some(username) = &input.username {
            check_username(username)?;
            if *username != current.username
                && users::get_by_username(&self.db, username).await?.is_some()
            {
                return Err(ServiceError::rule("Username already taken"));
            }
        }
        if let Some(password) = &input.password {
            check_password(password)?;
        }

        let hashed_password = match &input.password {
            Some(password) => Some(hash_password_blocking(password.clone()).await?),
            None => None,
        };
        let changes = UserChanges {
            email: input.email.clone(),
            username: input.username.clone(),
            hashed_password,
        };
        Ok(users::update(&self.db, user_id, changes).await?)
    }

    pub async fn delete_user(&self, user_id: i64) -> Result<bool, ServiceError> {
        let deleted = users::delete(&self.db, user_id).await?;
        if deleted {
            info!("Deleted user {}", user_id);
        }
        Ok(deleted)
    }
}

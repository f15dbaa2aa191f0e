//! User repository and credential checks

use super::{exists, fetch_one, to_row, Store};
use crate::auth::PasswordHasher;
use crate::db::models::{
    profile_slug, user, LastLoginStamp, LastQuoteStamp, NewUser, PasswordChange, User, UserChanges,
};
use crate::errors::{AppError, Result};
use crate::metrics::record_auth_failure;
use crate::store::{eq, Select, StoreError};
use crate::validation::{
    validate_email, validate_name, validate_password, validate_phone, Validator,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
struct Credentials {
    id: Uuid,
    hashed_password: String,
}

#[derive(Debug, Deserialize)]
struct UserKey {
    id: Uuid,
}

fn duplicate_email(err: StoreError, email: &str) -> AppError {
    if err.violates(user::EMAIL_CONSTRAINT) {
        AppError::DuplicateEmail {
            email: email.to_string(),
        }
    } else {
        err.into()
    }
}

#[derive(Clone)]
pub struct UserRepository {
    store: Store,
    hasher: PasswordHasher,
}

impl UserRepository {
    pub fn new(store: Store, hasher: PasswordHasher) -> Self {
        Self { store, hasher }
    }

    /// Create an account, returning its id
    pub async fn insert(&self, name: &str, email: &str, password: &str) -> Result<Uuid> {
        let mut v = Validator::new();
        validate_name(&mut v, name);
        validate_email(&mut v, email);
        validate_password(&mut v, "password", password);
        v.into_result()?;

        let hashed = self.hasher.hash(password).await?;
        let now = Utc::now();
        let row = to_row(&NewUser {
            name,
            email,
            hashed_password: &hashed,
            profile_slug: profile_slug(name),
            created: now,
            updated: now,
        })?;

        let stored = self
            .store
            .insert(user::TABLE, row)
            .await
            .map_err(|e| duplicate_email(e, email))?;
        let UserKey { id } = serde_json::from_value(stored)?;

        info!(user_id = %id, "User created");
        Ok(id)
    }

    /// Check credentials and stamp `last_login`.
    ///
    /// An unknown email and a wrong password both give
    /// [`AppError::InvalidCredentials`], after the same amount of bcrypt work.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<Uuid> {
        let query = Select::from(user::TABLE)
            .columns(&["id", "hashed_password"])
            .eq("email", email);

        let rows = match self.store.select(&query).await {
            Ok(rows) => rows.decode::<Credentials>()?,
            Err(e) if e.is_no_rows() => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        if rows.len() > 1 {
            return Err(AppError::Inconsistent {
                message: format!("{} users share one email", rows.len()),
            });
        }

        let Some(creds) = rows.into_iter().next() else {
            self.hasher.verify_dummy(password).await;
            record_auth_failure("login");
            debug!("Login for unknown email");
            return Err(AppError::InvalidCredentials);
        };

        // a malformed stored hash is treated like a mismatch
        if !self
            .hasher
            .verify(password, &creds.hashed_password)
            .await
            .unwrap_or(false)
        {
            record_auth_failure("login");
            return Err(AppError::InvalidCredentials);
        }

        let stamp = to_row(&LastLoginStamp { last_login: Utc::now() })?;
        self.store
            .update(user::TABLE, &[eq("id", creds.id)], stamp)
            .await?;

        info!(user_id = %creds.id, "User authenticated");
        Ok(creds.id)
    }

    pub async fn exists(&self, id: Uuid) -> Result<bool> {
        exists(&self.store, user::TABLE, id).await
    }

    pub async fn get(&self, id: Uuid) -> Result<User> {
        fetch_one(&self.store, &Select::from(user::TABLE).eq("id", id), "user", id).await
    }

    pub async fn get_by_email(&self, email: &str) -> Result<User> {
        fetch_one(&self.store, &Select::from(user::TABLE).eq("email", email), "user", email).await
    }

    /// Look up a profile by its slug
    pub async fn get_by_url_name(&self, slug: &str) -> Result<User> {
        fetch_one(
            &self.store,
            &Select::from(user::TABLE).eq("profile_slug", slug),
            "user",
            slug,
        )
        .await
    }

    pub async fn get_id_by_url_name(&self, slug: &str) -> Result<Uuid> {
        let key: UserKey = fetch_one(
            &self.store,
            &Select::from(user::TABLE).columns(&["id"]).eq("profile_slug", slug),
            "user",
            slug,
        )
        .await?;
        Ok(key.id)
    }

    /// Update profile fields. A changed phone number clears its
    /// verification timestamp in the same write.
    pub async fn update(
        &self,
        id: Uuid,
        name: &str,
        email: &str,
        phone: Option<&str>,
    ) -> Result<()> {
        let phone = phone.filter(|p| !p.is_empty());

        let mut v = Validator::new();
        validate_name(&mut v, name);
        validate_email(&mut v, email);
        validate_phone(&mut v, phone.unwrap_or_default());
        v.into_result()?;

        let current = self.get(id).await?;
        let phone_changed = current.phone.as_deref().filter(|p| !p.is_empty()) != phone;

        let changes = to_row(&UserChanges {
            name,
            email,
            profile_slug: profile_slug(name),
            phone,
            phone_verified_at: phone_changed.then_some(None),
            updated: Utc::now(),
        })?;
        let updated = self
            .store
            .update(user::TABLE, &[eq("id", id)], changes)
            .await
            .map_err(|e| duplicate_email(e, email))?;
        if updated.is_empty() {
            return Err(AppError::not_found("user", id));
        }

        info!(user_id = %id, phone_changed, "User updated");
        Ok(())
    }

    /// Replace the password after verifying the current one. On any
    /// failure the stored hash is left unchanged.
    pub async fn change_password(
        &self,
        id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> Result<()> {
        let mut v = Validator::new();
        validate_password(&mut v, "newPassword", new_password);
        v.into_result()?;

        let user = self.get(id).await?;
        if !self
            .hasher
            .verify(current_password, &user.hashed_password)
            .await
            .unwrap_or(false)
        {
            record_auth_failure("change_password");
            return Err(AppError::InvalidCredentials);
        }

        let hashed = self.hasher.hash(new_password).await?;
        let change = to_row(&PasswordChange {
            hashed_password: &hashed,
            updated: Utc::now(),
        })?;
        self.store.update(user::TABLE, &[eq("id", id)], change).await?;

        info!(user_id = %id, "Password changed");
        Ok(())
    }

    /// Stamp `last_quote_added_at` with the current time
    pub async fn touch_last_quote_added(&self, id: Uuid) -> Result<()> {
        let stamp = to_row(&LastQuoteStamp {
            last_quote_added_at: Utc::now(),
        })?;
        let updated: Vec<Value> = self.store.update(user::TABLE, &[eq("id", id)], stamp).await?;
        if updated.is_empty() {
            return Err(AppError::not_found("user", id));
        }
        Ok(())
    }
}

//! Account policy engine.
//!
//! Registration, email activation, login/logout, and the password
//! reset/change flows. Activation and reset codes are single-use tokens
//! with an expiry, stored separately from the user row; issuing a new
//! token revokes outstanding ones of the same purpose.

use std::sync::Arc;

use chrono::{Duration, Utc};
use common::UserId;
use store::{AccountToken, Session, Store, TokenPurpose, User};
use uuid::Uuid;

use crate::authz::{AccessRule, Actor, authorize};
use crate::error::{DomainError, Result};
use crate::mailer::Mailer;

/// Minimum accepted password length.
pub const MIN_PASSWORD_LEN: usize = 6;

/// How long an activation code stays valid.
const ACTIVATION_TOKEN_TTL: Duration = Duration::hours(24);

/// How long a password-reset code stays valid.
const RESET_TOKEN_TTL: Duration = Duration::hours(1);

/// Input for [`AccountService::register`].
#[derive(Debug, Clone)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub password_confirm: String,
    pub first_name: String,
    pub last_name: String,
}

/// Public identity of a user, safe to return to callers.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct UserProfile {
    pub id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        UserProfile {
            id: user.id,
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
        }
    }
}

/// Service for account management.
pub struct AccountService<S> {
    store: S,
    mailer: Arc<dyn Mailer>,
}

impl<S: Store> AccountService<S> {
    /// Creates a new account service.
    pub fn new(store: S, mailer: Arc<dyn Mailer>) -> Self {
        Self { store, mailer }
    }

    /// Registers a new, inactive user and mails an activation code.
    ///
    /// Mail delivery is best-effort: registration succeeds even when the
    /// mail backend fails.
    #[tracing::instrument(skip_all, fields(email = %req.email))]
    pub async fn register(&self, req: RegisterRequest) -> Result<UserProfile> {
        if !req.email.contains('@') {
            return Err(DomainError::validation("email", "invalid email address"));
        }
        validate_new_password(&req.password, &req.password_confirm)?;
        if self.store.user_by_email(&req.email).await?.is_some() {
            return Err(DomainError::validation(
                "email",
                "this email is already registered",
            ));
        }

        let user = User {
            id: UserId::new(),
            email: req.email,
            password_hash: hash_password(&req.password)?,
            first_name: req.first_name,
            last_name: req.last_name,
            is_active: false,
            is_staff: false,
            created_at: Utc::now(),
        };
        self.store.insert_user(user.clone()).await?;

        let code = self
            .issue_token(user.id, TokenPurpose::Activation, ACTIVATION_TOKEN_TTL)
            .await?;
        self.send_best_effort(
            &user.email,
            "Account activation",
            &format!("Your activation code: {code}"),
        )
        .await;

        metrics::counter!("users_registered_total").increment(1);
        tracing::info!(user_id = %user.id, "user registered");
        Ok(UserProfile::from(&user))
    }

    /// Activates the account matching `email` and `code`.
    #[tracing::instrument(skip_all, fields(email))]
    pub async fn activate(&self, email: &str, code: &str) -> Result<()> {
        let user = self
            .store
            .user_by_email(email)
            .await?
            .ok_or_else(|| DomainError::not_found("user"))?;

        let token = self
            .store
            .token_by_value(code, TokenPurpose::Activation)
            .await?
            .filter(|t| t.user == user.id && t.is_usable(Utc::now()))
            .ok_or_else(|| DomainError::not_found("user"))?;

        self.store.set_user_active(user.id, true).await?;
        self.store.consume_token(&token.token).await?;
        tracing::info!(user_id = %user.id, "account activated");
        Ok(())
    }

    /// Logs a user in, issuing an opaque session token.
    #[tracing::instrument(skip_all, fields(email))]
    pub async fn login(&self, email: &str, password: &str) -> Result<String> {
        let user = self.store.user_by_email(email).await?;
        let user = match user {
            Some(ref u) if u.is_active && verify_password(password, &u.password_hash) => u,
            // One error for every failure mode: no hint whether the email
            // exists, is inactive, or the password was wrong.
            _ => {
                return Err(DomainError::Authentication(
                    "invalid email or password".to_string(),
                ));
            }
        };

        let token = opaque_token();
        self.store
            .insert_session(Session {
                token: token.clone(),
                user: user.id,
                created_at: Utc::now(),
            })
            .await?;
        tracing::info!(user_id = %user.id, "login");
        Ok(token)
    }

    /// Invalidates every session token of the actor. Idempotent.
    #[tracing::instrument(skip(self))]
    pub async fn logout(&self, actor: &Actor) -> Result<()> {
        authorize(actor, AccessRule::Authenticated)?;
        let user_id = actor.user_id().ok_or_else(|| {
            DomainError::Authentication("authentication required".to_string())
        })?;
        let removed = self.store.delete_sessions_for_user(user_id).await?;
        tracing::info!(%user_id, removed, "logout");
        Ok(())
    }

    /// Issues a password-reset code and mails it to the user.
    ///
    /// Outstanding reset codes are revoked first, so only the latest one
    /// works.
    #[tracing::instrument(skip_all, fields(email))]
    pub async fn request_password_reset(&self, email: &str) -> Result<()> {
        let user = self
            .store
            .user_by_email(email)
            .await?
            .ok_or_else(|| DomainError::not_found("user"))?;

        self.store
            .revoke_tokens_for_user(user.id, TokenPurpose::PasswordReset)
            .await?;
        let code = self
            .issue_token(user.id, TokenPurpose::PasswordReset, RESET_TOKEN_TTL)
            .await?;
        self.send_best_effort(
            &user.email,
            "Password restore",
            &format!("Code for restoring your password: {code}"),
        )
        .await;
        Ok(())
    }

    /// Sets a new password using a reset code. The code is consumed and can
    /// never be used again.
    #[tracing::instrument(skip_all)]
    pub async fn complete_password_reset(
        &self,
        code: &str,
        password: &str,
        password_confirm: &str,
    ) -> Result<()> {
        validate_new_password(password, password_confirm)?;

        let token = self
            .store
            .token_by_value(code, TokenPurpose::PasswordReset)
            .await?
            .filter(|t| t.is_usable(Utc::now()))
            .ok_or_else(|| {
                DomainError::validation("reset_code", "unknown, expired, or already used code")
            })?;

        let hash = hash_password(password)?;
        self.store.set_password_hash(token.user, &hash).await?;
        self.store.consume_token(&token.token).await?;
        tracing::info!(user_id = %token.user, "password reset completed");
        Ok(())
    }

    /// Replaces the actor's password after verifying the current one.
    #[tracing::instrument(skip_all)]
    pub async fn change_password(
        &self,
        actor: &Actor,
        old_password: &str,
        new_password: &str,
        new_password_confirm: &str,
    ) -> Result<()> {
        authorize(actor, AccessRule::Authenticated)?;
        let user_id = actor.user_id().ok_or_else(|| {
            DomainError::Authentication("authentication required".to_string())
        })?;
        let user = self
            .store
            .user_by_id(user_id)
            .await?
            .ok_or_else(|| DomainError::not_found("user"))?;

        if !verify_password(old_password, &user.password_hash) {
            return Err(DomainError::Authentication(
                "old password is incorrect".to_string(),
            ));
        }
        validate_new_password(new_password, new_password_confirm)?;

        let hash = hash_password(new_password)?;
        self.store.set_password_hash(user.id, &hash).await?;
        tracing::info!(%user_id, "password changed");
        Ok(())
    }

    async fn issue_token(
        &self,
        user: UserId,
        purpose: TokenPurpose,
        ttl: Duration,
    ) -> Result<String> {
        let now = Utc::now();
        let token = AccountToken {
            token: opaque_token(),
            user,
            purpose,
            created_at: now,
            expires_at: now + ttl,
            consumed: false,
        };
        self.store.insert_token(token.clone()).await?;
        Ok(token.token)
    }

    async fn send_best_effort(&self, to: &str, subject: &str, body: &str) {
        if let Err(e) = self.mailer.send(to, subject, body).await {
            tracing::warn!(%to, error = %e, "mail delivery failed");
        }
    }
}

/// Generates an opaque token value.
fn opaque_token() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Validates a candidate password pair: length and confirmation.
fn validate_new_password(password: &str, confirm: &str) -> Result<()> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(DomainError::validation(
            "password",
            format!("password must be at least {MIN_PASSWORD_LEN} characters"),
        ));
    }
    if password != confirm {
        return Err(DomainError::validation(
            "password_confirm",
            "passwords do not match",
        ));
    }
    Ok(())
}

fn hash_password(password: &str) -> Result<String> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST)
        .map_err(|e| DomainError::Internal(format!("password hashing failed: {e}")))
}

fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

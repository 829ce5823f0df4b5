//! Account operations: registration, login, email verification and
//! password reset by one-time code.
//!
//! Mail is sent on a detached task after the result is ready. A failed
//! delivery is logged by the dispatcher and never changes what the caller
//! gets back.

use serde::Serialize;
use std::sync::Arc;

use super::codes::{generate_code, OneTimeCodeStore};
use super::error::{AuthError, FieldError};
use super::password::PasswordHasher;
use super::requests::{
    check_password, present, present_secret, validate_registration, LoginRequest,
    RegisterRequest, ResetPasswordRequest,
};
use super::store::{NewUser, PublicUser, User, UserStore};
use super::tokens::{Claims, TokenService};
use super::verification::build_verification_url;
use crate::modules::config::{LinkConfig, ServiceConfig};
use crate::modules::email::mailer::{dispatch, Mailer};
use crate::modules::email::templates::{forgot_code_mail, verification_mail};
use crate::modules::utils::logging::log_auth_event;

/// An authenticated user together with a fresh access token
#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub user: PublicUser,
    pub token: String,
}

pub struct AuthService<S, M>
where
    S: UserStore,
    M: Mailer + ?Sized + 'static,
{
    users: Arc<S>,
    mailer: Arc<M>,
    hasher: PasswordHasher,
    tokens: TokenService,
    codes: Arc<OneTimeCodeStore>,
    link: LinkConfig,
}

impl<S, M> AuthService<S, M>
where
    S: UserStore,
    M: Mailer + ?Sized + 'static,
{
    pub fn new(config: &ServiceConfig, users: Arc<S>, mailer: Arc<M>) -> Self {
        let codes = match config.code_ttl {
            Some(ttl) => OneTimeCodeStore::with_ttl(ttl),
            None => OneTimeCodeStore::new(),
        };

        Self {
            users,
            mailer,
            hasher: PasswordHasher::new(config.hash_iterations),
            tokens: TokenService::new(&config.tokens),
            codes: Arc::new(codes),
            link: config.link.clone(),
        }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    pub fn codes(&self) -> &Arc<OneTimeCodeStore> {
        &self.codes
    }

    pub fn users(&self) -> &Arc<S> {
        &self.users
    }

    /// Create an unverified account and log it in
    pub async fn register(&self, req: RegisterRequest) -> Result<AuthSession, AuthError> {
        let valid = validate_registration(&req)?;
        let password_hash = self.hasher.hash(&valid.password)?;
        let username = valid.username.clone();

        let user = self
            .users
            .create(NewUser {
                username: valid.username,
                full_name: valid.full_name,
                email: valid.email,
                password_hash,
            })
            .await
            .map_err(|e| {
                log_auth_event("register", &username, false, Some(&e.to_string()));
                AuthError::from(e)
            })?;

        let token = self.tokens.issue_access(&user.username)?;
        log_auth_event("register", &user.username, true, None);

        Ok(AuthSession {
            user: user.to_public(),
            token,
        })
    }

    /// Check a username and password and hand out an access token
    pub async fn login(&self, req: LoginRequest) -> Result<AuthSession, AuthError> {
        let (Some(username), Some(password)) =
            (present(&req.username), present_secret(&req.password))
        else {
            return Err(AuthError::MissingParameters);
        };

        let user = self.find_user(username).await?;

        if !self.hasher.verify(password, &user.password_hash) {
            log_auth_event("login", username, false, Some("password mismatch"));
            return Err(AuthError::InvalidCredentials);
        }

        let token = self.tokens.issue_access(&user.username)?;
        log_auth_event("login", username, true, None);

        Ok(AuthSession {
            user: user.to_public(),
            token,
        })
    }

    /// Resolve a bearer access token to the user it was issued for
    pub async fn authenticate(&self, token: Option<&str>) -> Result<PublicUser, AuthError> {
        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingToken)?;

        let claims = self.tokens.verify_access(token)?;
        let user = self.find_user(&claims.username).await?;
        Ok(user.to_public())
    }

    /// Mail `current_user` a link that confirms their address
    pub async fn send_verification_mail(&self, current_user: &PublicUser) -> Result<(), AuthError> {
        let user = self.find_user(&current_user.username).await?;
        if user.verified {
            return Err(AuthError::AlreadyVerified);
        }

        let token = self.tokens.issue_verification(&user.username)?;
        let url = build_verification_url(&self.link, &token);
        let mail = verification_mail(&url, self.tokens.verification_ttl());

        log_auth_event("send_verification", &user.username, true, None);
        dispatch(Arc::clone(&self.mailer), user.email, mail.subject, mail.body);
        Ok(())
    }

    /// Mark the token's user as verified and return a fresh access token.
    ///
    /// Confirming an already verified user fails instead of succeeding again.
    pub async fn confirm_verification(&self, token: Option<&str>) -> Result<String, AuthError> {
        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingToken)?;

        let claims: Claims = self.tokens.verify_verification(token).map_err(|e| {
            log::warn!("Rejected verification token: {}", e);
            e
        })?;

        let mut user = self.find_user(&claims.username).await?;
        if user.verified {
            log_auth_event("confirm_verification", &user.username, false, Some("already verified"));
            return Err(AuthError::AlreadyVerified);
        }

        let access_token = self.tokens.issue_access(&user.username)?;
        user.set_verified(true);
        self.users.save(&user).await?;

        log_auth_event("confirm_verification", &user.username, true, None);
        Ok(access_token)
    }

    /// Issue a reset code for a verified user and mail it to them
    pub async fn send_forgot_code(&self, username: Option<&str>) -> Result<(), AuthError> {
        let username = username
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or(AuthError::MissingParameters)?;

        let user = self.find_user(username).await?;
        if !user.verified {
            log_auth_event("send_forgot_code", username, false, Some("email not verified"));
            return Err(AuthError::NotVerified);
        }

        let code = generate_code();
        self.codes.put(&user.username, &code);
        let mail = forgot_code_mail(&code);

        log_auth_event("send_forgot_code", &user.username, true, None);
        dispatch(Arc::clone(&self.mailer), user.email, mail.subject, mail.body);
        Ok(())
    }

    /// Set a new password if `forgot_code` matches the pending code.
    ///
    /// A wrong code is reported before a weak password. The code is spent
    /// only when the reset succeeds; otherwise it stays pending for a retry.
    pub async fn reset_password(&self, req: ResetPasswordRequest) -> Result<(), AuthError> {
        let (Some(username), Some(new_password), Some(code)) = (
            present(&req.username),
            present_secret(&req.new_password),
            present(&req.forgot_code),
        ) else {
            return Err(AuthError::MissingParameters);
        };

        let mut user = self.find_user(username).await?;

        if !self.codes.matches(&user.username, code) {
            log_auth_event("reset_password", username, false, Some("invalid forgot code"));
            return Err(AuthError::InvalidCode);
        }
        if let Some(err) = check_password(new_password) {
            log_auth_event("reset_password", username, false, Some("weak password"));
            return Err(AuthError::ValidationError(vec![FieldError::new(
                "newPassword",
                err.message,
            )]));
        }
        let password_hash = self.hasher.hash(new_password)?;

        // a concurrent reset may have spent the code since the check above
        let Some(pending) = self.codes.take_if_matches(&user.username, code) else {
            log_auth_event("reset_password", username, false, Some("forgot code already used"));
            return Err(AuthError::InvalidCode);
        };

        user.set_password_hash(password_hash);
        match self.users.save(&user).await {
            Ok(()) => {
                log_auth_event("reset_password", username, true, None);
                Ok(())
            }
            Err(e) => {
                if !self.codes.restore(&user.username, pending) {
                    log::debug!("Reset code was superseded while the reset was failing");
                }
                log_auth_event("reset_password", username, false, Some(&e.to_string()));
                Err(e.into())
            }
        }
    }

    async fn find_user(&self, username: &str) -> Result<User, AuthError> {
        self.users
            .find_by_username(username)
            .await?
            .ok_or(AuthError::NotFound)
    }
}

//! Registration, login and bearer-token checks.

use microblog_common::model::{
    Id,
    auth::{
        AuthToken, AuthTokenError, PasswordHash, PasswordHashError, PasswordHasher, TokenSigner,
    },
    user::{CreateUser, InvalidLoginError, User, UserLogin, UserMarker},
};
use microblog_db::{client::DbClient, storage::DbError};
use thiserror::Error;
use tokio::task::{JoinError, spawn_blocking};
use tracing::{debug, info};

pub type Result<T, E = CredentialError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error(transparent)]
    InvalidLoginFormat(#[from] InvalidLoginError),
    #[error("Login {0} is already taken")]
    DuplicateLogin(UserLogin),
    #[error("No user with login {0:?}")]
    UnknownLogin(String),
    #[error("Wrong password for {0}")]
    WrongPassword(UserLogin),
    #[error(transparent)]
    InvalidToken(#[from] AuthTokenError),
    #[error("Token subject {0} does not exist")]
    UnknownSubject(UserLogin),
    #[error(transparent)]
    Hash(#[from] PasswordHashError),
    #[error("Password hashing task failed: {0}")]
    HashTask(#[from] JoinError),
    #[error(transparent)]
    Database(DbError),
}

impl From<DbError> for CredentialError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::DuplicateLogin(login) => Self::DuplicateLogin(login),
            other => Self::Database(other),
        }
    }
}

#[derive(Clone, Debug)]
pub struct CredentialService {
    db: DbClient,
    hasher: PasswordHasher,
    signer: TokenSigner,
    /// Verified against when the login is unknown, so both failures cost one hash.
    decoy_hash: PasswordHash,
}

impl CredentialService {
    pub fn new(db: DbClient, hasher: PasswordHasher, signer: TokenSigner) -> Result<Self> {
        let decoy_hash = hasher.hash("decoy password")?;

        Ok(Self {
            db,
            hasher,
            signer,
            decoy_hash,
        })
    }

    /// Stores a new user. Nothing is written if any step fails.
    pub async fn register(&self, login: String, password: String) -> Result<Id<UserMarker>> {
        let login = UserLogin::new(login)?;

        // Cheap early answer; the insert below still enforces uniqueness.
        if self.db.fetch_user_by_login(&login).await?.is_some() {
            return Err(CredentialError::DuplicateLogin(login));
        }

        let hasher = self.hasher.clone();
        let password_hash = spawn_blocking(move || hasher.hash(&password)).await??;

        let user_id = self
            .db
            .create_user(&CreateUser {
                login: login.clone(),
                password_hash,
            })
            .await?;

        info!(%login, %user_id, "Registered user");
        Ok(user_id)
    }

    /// Checks the password and hands out a fresh token.
    ///
    /// Unknown logins still go through one password verification, so they
    /// take as long as a wrong password.
    pub async fn authenticate(&self, login: String, password: String) -> Result<AuthToken> {
        let user = match UserLogin::new(login.clone()) {
            Ok(valid) => self.db.fetch_user_by_login(&valid).await?,
            Err(_) => None,
        };

        let hasher = self.hasher.clone();
        let password_hash = user
            .as_ref()
            .map_or_else(|| self.decoy_hash.clone(), |user| user.password_hash.clone());
        let matches = spawn_blocking(move || hasher.verify(&password, &password_hash)).await??;

        let Some(user) = user else {
            return Err(CredentialError::UnknownLogin(login));
        };
        if !matches {
            return Err(CredentialError::WrongPassword(user.login));
        }

        debug!(login = %user.login, "Password verified");
        self.issue_token(&user)
    }

    pub fn issue_token(&self, user: &User) -> Result<AuthToken> {
        Ok(self.signer.issue(&user.login)?)
    }

    /// Resolves a bearer token to the user it was issued for.
    pub async fn verify_token(&self, token: &str) -> Result<User> {
        let claims = self.signer.verify(token)?;

        self.db
            .fetch_user_by_login(&claims.sub)
            .await?
            .ok_or(CredentialError::UnknownSubject(claims.sub))
    }
}

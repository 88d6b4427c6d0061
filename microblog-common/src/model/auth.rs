use crate::model::user::UserLogin;
use argon2::{
    Algorithm, Argon2, Params, PasswordHasher as _, PasswordVerifier as _, Version,
    password_hash::{self, SaltString},
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};
use thiserror::Error;
use time::{Duration, OffsetDateTime};

pub const PASSWORD_SALT_LEN: usize = 16;
pub const AUTH_TOKEN_LIFETIME: Duration = Duration::HOUR;

#[derive(Clone, Eq, PartialEq, Debug, Error)]
#[error("Hashing password failed: {0}")]
pub struct PasswordHashError(#[from] password_hash::Error);

#[derive(Clone, Eq, PartialEq, Debug, Error)]
#[error("Stored password hash is not a valid PHC string: {0}")]
pub struct InvalidPasswordHashError(password_hash::Error);

#[derive(Debug, Error)]
#[error("Auth token rejected: {0}")]
pub struct AuthTokenError(#[from] jsonwebtoken::errors::Error);

/// Salted argon2id hash in PHC string format.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct PasswordHash(String);

/// Hashes and verifies passwords with argon2id.
///
/// These calls are slow on purpose; async callers should run them on the
/// blocking pool.
#[derive(Clone, Debug, Default)]
pub struct PasswordHasher {
    params: Params,
}

/// JWT claims. `sub` is the login of the authenticated user.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize, Deserialize)]
pub struct Claims {
    pub sub: UserLogin,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Clone, Eq, PartialEq, Hash, Serialize)]
#[serde(transparent)]
pub struct AuthToken(String);

/// Signs and checks HS256 bearer tokens with a server-held secret.
#[derive(Clone)]
pub struct TokenSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    lifetime: Duration,
}

impl PasswordHash {
    pub fn new(phc: String) -> Result<Self, InvalidPasswordHashError> {
        argon2::PasswordHash::new(&phc).map_err(InvalidPasswordHashError)?;
        Ok(Self(phc))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Debug for PasswordHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PasswordHash").field(&"[redacted]").finish()
    }
}

impl PasswordHasher {
    #[must_use]
    pub fn new(params: Params) -> Self {
        Self { params }
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    pub fn hash(&self, password: &str) -> Result<PasswordHash, PasswordHashError> {
        let salt_bytes: [u8; PASSWORD_SALT_LEN] = rand::random();
        let salt = SaltString::encode_b64(&salt_bytes)?;

        let hash = self.argon2().hash_password(password.as_bytes(), &salt)?;

        Ok(PasswordHash(hash.to_string()))
    }

    /// `Ok(false)` means the password does not match. The comparison is constant-time.
    pub fn verify(&self, password: &str, hash: &PasswordHash) -> Result<bool, PasswordHashError> {
        let parsed = argon2::PasswordHash::new(&hash.0)?;

        match self.argon2().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}

impl AuthToken {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Debug for AuthToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("AuthToken").field(&"[redacted]").finish()
    }
}

impl TokenSigner {
    #[must_use]
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(jsonwebtoken::Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            lifetime: AUTH_TOKEN_LIFETIME,
        }
    }

    pub fn issue_at(
        &self,
        login: &UserLogin,
        issued_at: OffsetDateTime,
    ) -> Result<AuthToken, AuthTokenError> {
        let claims = Claims {
            sub: login.clone(),
            iat: issued_at.unix_timestamp(),
            exp: (issued_at + self.lifetime).unix_timestamp(),
        };

        let token = jsonwebtoken::encode(&Header::default(), &claims, &self.encoding_key)?;
        Ok(AuthToken(token))
    }

    pub fn issue(&self, login: &UserLogin) -> Result<AuthToken, AuthTokenError> {
        self.issue_at(login, OffsetDateTime::now_utc())
    }

    /// Checks signature and expiry. There is no revocation list.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthTokenError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        Ok(data.claims)
    }
}

impl Debug for TokenSigner {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("keys", &"[redacted]")
            .field("lifetime", &self.lifetime)
            .finish_non_exhaustive()
    }
}

impl AuthTokenError {
    #[must_use]
    pub fn is_expired(&self) -> bool {
        matches!(self.0.kind(), ErrorKind::ExpiredSignature)
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{
        auth::{AUTH_TOKEN_LIFETIME, PasswordHash, PasswordHasher, TokenSigner},
        user::UserLogin,
    };
    use argon2::Params;
    use time::{Duration, OffsetDateTime};

    fn cheap_hasher() -> PasswordHasher {
        PasswordHasher::new(Params::new(1024, 1, 1, None).unwrap())
    }

    fn alice() -> UserLogin {
        UserLogin::new("alice".to_owned()).unwrap()
    }

    #[test]
    fn password_verifies_against_own_hash_only() {
        let hasher = cheap_hasher();
        let hash = hasher.hash("hunter2").unwrap();

        assert!(hash.as_str().starts_with("$argon2id$"));
        assert!(!hash.as_str().contains("hunter2"));
        assert!(hasher.verify("hunter2", &hash).unwrap());
        assert!(!hasher.verify("hunter3", &hash).unwrap());
    }

    #[test]
    fn same_password_gets_different_salts() {
        let hasher = cheap_hasher();

        assert_ne!(hasher.hash("pw").unwrap(), hasher.hash("pw").unwrap());
    }

    #[test]
    fn stored_hash_must_be_phc() {
        assert!(PasswordHash::new("plaintext".to_owned()).is_err());

        let hash = cheap_hasher().hash("pw").unwrap();
        assert_eq!(PasswordHash::new(hash.as_str().to_owned()).unwrap(), hash);
        assert_eq!(format!("{hash:?}"), r#"PasswordHash("[redacted]")"#);
    }

    #[test]
    fn token_lives_one_hour() {
        let signer = TokenSigner::new(b"test secret");
        let token = signer.issue(&alice()).unwrap();

        let claims = signer.verify(token.as_str()).unwrap();

        assert_eq!(claims.sub, alice());
        assert_eq!(claims.exp - claims.iat, AUTH_TOKEN_LIFETIME.whole_seconds());
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn expired_token_is_rejected() {
        let signer = TokenSigner::new(b"test secret");
        let issued_at = OffsetDateTime::now_utc() - Duration::hours(2);
        let token = signer.issue_at(&alice(), issued_at).unwrap();

        let err = signer.verify(token.as_str()).unwrap_err();
        assert!(err.is_expired());
    }

    #[test]
    fn foreign_signature_is_rejected() {
        let token = TokenSigner::new(b"one secret").issue(&alice()).unwrap();

        let err = TokenSigner::new(b"another secret")
            .verify(token.as_str())
            .unwrap_err();
        assert!(!err.is_expired());
        assert!(TokenSigner::new(b"one secret").verify("garbage").is_err());
    }
}

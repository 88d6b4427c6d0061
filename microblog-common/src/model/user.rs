use crate::model::{Id, auth::PasswordHash};
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use std::fmt::{Display, Formatter};
use thiserror::Error;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct UserMarker;

/// A registered user. Has no `Serialize` impl so the hash never leaves the server.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct User {
    pub id: Id<UserMarker>,
    pub login: UserLogin,
    pub password_hash: PasswordHash,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct CreateUser {
    pub login: UserLogin,
    pub password_hash: PasswordHash,
}

/// Non-empty, lowercase ASCII letters only.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
#[serde(transparent)]
pub struct UserLogin(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The login must consist of lowercase latin letters only: {0:?}")]
pub struct InvalidLoginError(String);

impl UserLogin {
    pub fn new(login: String) -> Result<Self, InvalidLoginError> {
        if !login.is_empty() && login.bytes().all(|byte| byte.is_ascii_lowercase()) {
            Ok(UserLogin(login))
        } else {
            Err(InvalidLoginError(login))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Display for UserLogin {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for UserLogin {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        UserLogin::new(inner)
            .map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"UserLogin"))
    }
}

#[cfg(test)]
mod tests {
    use crate::model::user::UserLogin;

    #[test]
    fn accepts_lowercase_letters() {
        for login in ["alice", "b", "abcdefghijklmnopqrstuvwxyz"] {
            assert_eq!(UserLogin::new(login.to_owned()).unwrap().get(), login);
        }
    }

    #[test]
    fn rejects_everything_else() {
        for login in ["", "Alice", "bob1", "with space", "ümlaut", "snake_case", "dash-ed"] {
            assert!(UserLogin::new(login.to_owned()).is_err(), "{login:?}");
        }
    }
}

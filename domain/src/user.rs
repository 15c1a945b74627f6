use crate::{DomainError, UserId};
use serde::{Deserialize, Serialize};

/// A stored account. The password is kept as plain text and compared by equality.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub password: String,
}

impl User {
    pub fn verify_password(&self, candidate: &str) -> bool {
        self.password == candidate
    }
}

/// Data needed to create a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub password: String,
}

impl NewUser {
    pub fn into_user(self, id: UserId) -> User {
        User {
            id,
            username: self.username,
            password: self.password,
        }
    }
}

/// Public view of a user; never carries the password.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UserSummary {
    pub id: UserId,
    pub username: String,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
        }
    }
}

/// Login/signup body. Missing keys deserialize as empty and fail `validate`.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Credentials {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn validate(self) -> Result<NewUser, DomainError> {
        if self.username.is_empty() {
            return Err(DomainError::MissingField("username".to_string()));
        }
        if self.password.is_empty() {
            return Err(DomainError::MissingField("password".to_string()));
        }
        Ok(NewUser {
            username: self.username,
            password: self.password,
        })
    }
}

//! New-user record handed to the storage session.

/// A user row ready to persist. Carries the hashed credential only; the
/// plaintext never reaches a storage session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub phone_number: String,
    pub password_hash: String,
}

impl NewUser {
    pub fn new(
        username: impl Into<String>,
        phone_number: impl Into<String>,
        password_hash: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            phone_number: phone_number.into(),
            password_hash: password_hash.into(),
        }
    }
}

//! Credentials for the settings path.
//!
//! Obtaining a ticket is left to the caller; the list session only asks a
//! [`CredentialProvider`] for the current one each time settings are applied.

use std::time::Duration;

/// An authenticated principal and how long it stays valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    /// `user@REALM`.
    pub principal: String,
    pub lifetime: Duration,
}

impl Credential {
    pub fn new(principal: impl Into<String>, lifetime: Duration) -> Self {
        Self {
            principal: principal.into(),
            lifetime,
        }
    }

    pub fn user(&self) -> &str {
        self.principal
            .split_once('@')
            .map_or(self.principal.as_str(), |(user, _)| user)
    }

    pub fn realm(&self) -> Option<&str> {
        self.principal.split_once('@').map(|(_, realm)| realm)
    }

    pub fn is_expired(&self) -> bool {
        self.lifetime.is_zero()
    }

    /// Usable for settings in `realm`.
    pub fn is_valid_for(&self, realm: &str) -> bool {
        !self.is_expired() && self.realm() == Some(realm)
    }
}

/// Source of the current credential, if any.
pub trait CredentialProvider: Send + Sync {
    fn credential(&self) -> Option<Credential>;
}

/// Provider that never has a credential; settings stay disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCredentials;

impl CredentialProvider for NoCredentials {
    fn credential(&self) -> Option<Credential> {
        None
    }
}

impl<F> CredentialProvider for F
where
    F: Fn() -> Option<Credential> + Send + Sync,
{
    fn credential(&self) -> Option<Credential> {
        self()
    }
}

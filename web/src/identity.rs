//! Bearer credential resolution.
//!
//! Handlers never verify credentials themselves. They receive an
//! [`Identity`] resolved by an [`IdentityProvider`]; token formats, signature
//! checks and user synchronisation live behind that trait.
//!
//! [`StaticTokenIdentityProvider`] maps fixed tokens to identities and backs
//! development setups and tests.

use reportdesk_core::{RoleSet, UserId, Viewer};
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors from identity resolution.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// The credential is unknown, expired or malformed.
    #[error("Invalid token")]
    InvalidToken,

    /// The identity backend could not be reached.
    #[error("Identity provider unavailable: {0}")]
    Unavailable(String),

    /// Provider configuration could not be parsed.
    #[error("Invalid identity configuration: {0}")]
    Config(String),
}

/// A resolved caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Identity {
    /// Stable user id.
    pub user_id: UserId,
    /// Email address.
    pub email: String,
    /// Display name.
    pub name: String,
    /// Capability tags.
    pub roles: RoleSet,
}

impl Identity {
    /// The visibility-filter view of this identity.
    #[must_use]
    pub fn viewer(&self) -> Viewer {
        Viewer::new(self.user_id.clone(), self.roles.clone())
    }
}

/// Resolves bearer credentials to identities.
///
/// Dyn-compatible so it can be shared as `Arc<dyn IdentityProvider>`.
pub trait IdentityProvider: Send + Sync {
    /// Resolve a bearer token.
    ///
    /// # Errors
    ///
    /// [`IdentityError::InvalidToken`] for unknown credentials,
    /// [`IdentityError::Unavailable`] when the backend cannot answer.
    fn resolve(
        &self,
        token: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Identity, IdentityError>> + Send + '_>>;
}

/// Fixed token table.
///
/// # Example
///
/// ```
/// use reportdesk_web::identity::StaticTokenIdentityProvider;
///
/// let provider = StaticTokenIdentityProvider::parse(
///     "citizen-token=u1|u1@example.com|Uma|CITIZEN;staff-token=s1|s1@example.com|Sam|DEPARTMENT_STAFF+CITIZEN",
/// )
/// .unwrap();
/// assert_eq!(provider.len(), 2);
/// ```
#[derive(Clone, Debug, Default)]
pub struct StaticTokenIdentityProvider {
    tokens: HashMap<String, Identity>,
}

impl StaticTokenIdentityProvider {
    /// Empty table; every token is rejected.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `token` for `identity`.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>, identity: Identity) -> Self {
        self.tokens.insert(token.into(), identity);
        self
    }

    /// Parse `token=user_id|email|name|ROLE+ROLE` entries separated by `;`.
    ///
    /// Blank entries are skipped.
    ///
    /// # Errors
    ///
    /// [`IdentityError::Config`] for an entry without `=`, with the wrong
    /// number of fields, or with a blank token or user id.
    pub fn parse(table: &str) -> Result<Self, IdentityError> {
        let mut provider = Self::new();

        for entry in table.split(';').map(str::trim).filter(|e| !e.is_empty()) {
            let (token, fields) = entry
                .split_once('=')
                .ok_or_else(|| IdentityError::Config(format!("missing '=' in entry '{entry}'")))?;

            let parts: Vec<&str> = fields.split('|').map(str::trim).collect();
            let [user_id, email, name, roles] = parts.as_slice() else {
                return Err(IdentityError::Config(format!(
                    "expected user_id|email|name|roles for token '{}'",
                    token.trim()
                )));
            };

            let token = token.trim();
            if token.is_empty() || user_id.is_empty() {
                return Err(IdentityError::Config(format!(
                    "blank token or user id in entry '{entry}'"
                )));
            }

            provider = provider.with_token(
                token,
                Identity {
                    user_id: UserId::from(*user_id),
                    email: (*email).to_string(),
                    name: (*name).to_string(),
                    roles: roles.split('+').collect(),
                },
            );
        }

        Ok(provider)
    }

    /// Number of registered tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether no token is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl IdentityProvider for StaticTokenIdentityProvider {
    fn resolve(
        &self,
        token: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Identity, IdentityError>> + Send + '_>> {
        let result = self
            .tokens
            .get(token)
            .cloned()
            .ok_or(IdentityError::InvalidToken);
        Box::pin(async move { result })
    }
}

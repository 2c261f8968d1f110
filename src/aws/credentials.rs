//! Temporary credentials and the provider seam

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};

use crate::{Error, Result};

/// Short-lived signing credentials
pub struct Credentials {
    access_key_id: String,
    secret_access_key: SecretString,
    session_token: Option<SecretString>,
    expiration: Option<DateTime<Utc>>,
}

impl Credentials {
    #[must_use]
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: Option<String>,
        expiration: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: SecretString::from(secret_access_key.into()),
            session_token: session_token.map(SecretString::from),
            expiration,
        }
    }

    #[must_use]
    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    pub(crate) fn secret_access_key(&self) -> &str {
        self.secret_access_key.expose_secret()
    }

    pub(crate) fn session_token(&self) -> Option<&str> {
        self.session_token.as_ref().map(|t| t.expose_secret())
    }

    #[must_use]
    pub const fn expiration(&self) -> Option<DateTime<Utc>> {
        self.expiration
    }

    /// Whether the credentials are past their expiration at `now`
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration.is_some_and(|exp| exp <= now)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("expiration", &self.expiration)
            .finish_non_exhaustive()
    }
}

/// Source of temporary credentials for outbound calls
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Obtain fresh credentials, replacing any held ones
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Credential`] if the exchange fails
    async fn refresh(&self) -> Result<()>;

    /// Credentials from the last successful refresh
    fn credentials(&self) -> Option<Arc<Credentials>>;

    /// Held credentials, if present and not yet expired
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Credential`] if nothing was fetched or the
    /// held credentials have expired
    fn signing_credentials(&self) -> Result<Arc<Credentials>> {
        let credentials = self
            .credentials()
            .ok_or_else(|| Error::Credential("no credentials available".to_string()))?;
        if credentials.is_expired(Utc::now()) {
            return Err(Error::Credential("credentials have expired".to_string()));
        }
        Ok(credentials)
    }

    /// Whether [`Self::clear_cached_identity`] does anything
    fn supports_identity_reset(&self) -> bool {
        false
    }

    /// Forget the cached guest identity so the next refresh obtains a new one
    fn clear_cached_identity(&self) {}
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn debug_redacts_secrets() {
        let creds = Credentials::new("AKID", "very-secret", Some("token-value".into()), None);
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("AKID"));
        assert!(!rendered.contains("very-secret"));
        assert!(!rendered.contains("token-value"));
    }

    #[test]
    fn expiry() {
        let now = Utc::now();
        let creds = Credentials::new("AKID", "s", None, Some(now + Duration::minutes(5)));
        assert!(!creds.is_expired(now));
        assert!(creds.is_expired(now + Duration::minutes(6)));

        let forever = Credentials::new("AKID", "s", None, None);
        assert!(!forever.is_expired(now));
    }

    struct Held(Option<Arc<Credentials>>);

    #[async_trait]
    impl CredentialProvider for Held {
        async fn refresh(&self) -> Result<()> {
            Ok(())
        }

        fn credentials(&self) -> Option<Arc<Credentials>> {
            self.0.clone()
        }
    }

    #[test]
    fn signing_credentials_reject_missing_and_stale() {
        assert!(matches!(
            Held(None).signing_credentials(),
            Err(Error::Credential(_))
        ));

        let stale = Credentials::new("AKID", "s", None, Some(Utc::now() - Duration::minutes(1)));
        let err = Held(Some(Arc::new(stale))).signing_credentials().unwrap_err();
        assert!(err.to_string().contains("expired"));

        let fresh = Credentials::new("AKID", "s", None, Some(Utc::now() + Duration::hours(1)));
        let held = Held(Some(Arc::new(fresh))).signing_credentials().unwrap();
        assert_eq!(held.access_key_id(), "AKID");
    }
}

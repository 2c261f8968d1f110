//! Guest credentials from a Cognito identity pool

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{CredentialProvider, Credentials, describe_error, error_kind};
use crate::{Error, Result};

const TARGET_PREFIX: &str = "AWSCognitoIdentityService";
const CONTENT_TYPE_AMZ_JSON: &str = "application/x-amz-json-1.1";

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct GetIdRequest<'a> {
    identity_pool_id: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetIdResponse {
    identity_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct GetCredentialsRequest<'a> {
    identity_id: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetCredentialsResponse {
    credentials: CognitoCredentials,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CognitoCredentials {
    access_key_id: String,
    secret_key: String,
    session_token: Option<String>,
    /// Seconds since the epoch
    expiration: Option<f64>,
}

/// Failed identity pool call
struct CallFailure {
    /// Exception name from the error body
    kind: Option<String>,
    error: Error,
}

impl CallFailure {
    /// Whether the pool no longer accepts the identity id that was sent
    fn rejects_identity(&self) -> bool {
        matches!(
            self.kind.as_deref(),
            Some("NotAuthorizedException" | "ResourceNotFoundException")
        )
    }
}

impl From<Error> for CallFailure {
    fn from(error: Error) -> Self {
        Self { kind: None, error }
    }
}

impl From<CallFailure> for Error {
    fn from(failure: CallFailure) -> Self {
        failure.error
    }
}

/// Anonymous identity-pool credentials
///
/// The guest identity id is cached across refreshes; credentials are
/// fetched anew on every refresh.
pub struct CognitoCredentialProvider {
    client: reqwest::Client,
    endpoint: String,
    identity_pool_id: String,
    identity_id: Mutex<Option<String>>,
    credentials: Mutex<Option<Arc<Credentials>>>,
}

impl CognitoCredentialProvider {
    /// Create a provider for `identity_pool_id` served at `endpoint`
    ///
    /// # Errors
    ///
    /// Returns error if the identity pool id is empty
    pub fn new(endpoint: impl Into<String>, identity_pool_id: impl Into<String>) -> Result<Self> {
        let identity_pool_id = identity_pool_id.into();
        if identity_pool_id.is_empty() {
            return Err(Error::Config("identity pool id required".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            identity_pool_id,
            identity_id: Mutex::new(None),
            credentials: Mutex::new(None),
        })
    }

    /// Cached guest identity id, if one was obtained
    #[must_use]
    pub fn identity_id(&self) -> Option<String> {
        self.identity_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn identity(&self) -> Result<String> {
        if let Some(id) = self.identity_id() {
            return Ok(id);
        }

        let response: GetIdResponse = self
            .call(
                "GetId",
                &GetIdRequest {
                    identity_pool_id: &self.identity_pool_id,
                },
            )
            .await?;

        tracing::debug!(identity_id = %response.identity_id, "obtained guest identity");
        *self.identity_id.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(response.identity_id.clone());
        Ok(response.identity_id)
    }

    async fn call<Req, Resp>(
        &self,
        action: &str,
        body: &Req,
    ) -> std::result::Result<Resp, CallFailure>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let response = self
            .client
            .post(format!("{}/", self.endpoint))
            .header("X-Amz-Target", format!("{TARGET_PREFIX}.{action}"))
            .header(CONTENT_TYPE, CONTENT_TYPE_AMZ_JSON)
            .body(serde_json::to_vec(body).map_err(Error::from)?)
            .send()
            .await
            .map_err(|e| Error::Credential(format!("{action} request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CallFailure {
                kind: error_kind(&body),
                error: Error::Credential(format!(
                    "{action} failed: {}",
                    describe_error(status, &body)
                )),
            });
        }

        let parsed = response.json::<Resp>().await.map_err(|e| {
            Error::Credential(format!("{action} returned an invalid body: {e}"))
        })?;
        Ok(parsed)
    }
}

#[async_trait]
impl CredentialProvider for CognitoCredentialProvider {
    async fn refresh(&self) -> Result<()> {
        let identity_id = self.identity().await?;

        let response: GetCredentialsResponse = match self
            .call(
                "GetCredentialsForIdentity",
                &GetCredentialsRequest {
                    identity_id: &identity_id,
                },
            )
            .await
        {
            Ok(response) => response,
            Err(failure) => {
                // The next refresh asks the pool for a new identity
                if failure.rejects_identity() {
                    tracing::warn!(identity_id = %identity_id, "guest identity rejected, dropping it");
                    self.identity_id
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .take();
                }
                return Err(failure.into());
            }
        };

        let c = response.credentials;
        #[allow(clippy::cast_possible_truncation)]
        let expiration = c
            .expiration
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs as i64, 0));

        tracing::debug!(
            access_key_id = %c.access_key_id,
            expiration = ?expiration,
            "refreshed guest credentials"
        );

        let credentials = Credentials::new(c.access_key_id, c.secret_key, c.session_token, expiration);
        *self.credentials.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(credentials));
        Ok(())
    }

    fn credentials(&self) -> Option<Arc<Credentials>> {
        self.credentials
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn supports_identity_reset(&self) -> bool {
        true
    }

    fn clear_cached_identity(&self) {
        let previous = self
            .identity_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.credentials
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(id) = previous {
            tracing::debug!(identity_id = %id, "cleared cached guest identity");
        }
    }
}

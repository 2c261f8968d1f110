//! Polly `SynthesizeSpeech` backend

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use url::Url;

use super::tts::{Engine, OutputFormat, SpeechRequest, SpeechSynthesizer};
use crate::aws::sigv4::{self, Scope, SignableRequest};
use crate::aws::{CredentialProvider, describe_error};
use crate::{Error, Result};

const SIGNING_SERVICE: &str = "polly";

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct SynthesizeSpeechRequest<'a> {
    engine: Engine,
    output_format: OutputFormat,
    text: &'a str,
    voice_id: &'a str,
}

/// Speech synthesis through Polly
pub struct PollyClient {
    client: reqwest::Client,
    url: Url,
    region: String,
    credentials: Arc<dyn CredentialProvider>,
}

impl PollyClient {
    /// Create a client for the endpoint base URL
    ///
    /// # Errors
    ///
    /// Returns error if the endpoint is not a valid URL
    pub fn new(
        endpoint: &str,
        region: impl Into<String>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self> {
        let url = Url::parse(&format!("{endpoint}/v1/speech"))
            .map_err(|e| Error::Config(format!("invalid speech endpoint: {e}")))?;

        Ok(Self {
            client: reqwest::Client::new(),
            url,
            region: region.into(),
            credentials,
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for PollyClient {
    async fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>> {
        let credentials = self.credentials.signing_credentials()?;

        let body = serde_json::to_vec(&SynthesizeSpeechRequest {
            engine: request.engine,
            output_format: request.output_format,
            text: &request.text,
            voice_id: &request.voice_id,
        })?;

        let signed = sigv4::sign(
            &SignableRequest {
                method: "POST",
                url: &self.url,
                headers: &[("content-type", "application/json")],
                body: &body,
            },
            &credentials,
            Scope {
                region: &self.region,
                service: SIGNING_SERVICE,
            },
            Utc::now(),
        );

        let mut http = self
            .client
            .post(self.url.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        for (name, value) in signed {
            http = http.header(name, value);
        }

        let response = http
            .send()
            .await
            .map_err(|e| Error::Synthesis(format!("{} request failed: {e}", request.engine)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Synthesis(format!(
                "{} engine: {}",
                request.engine,
                describe_error(status, &body)
            )));
        }

        let audio = response.bytes().await?;
        tracing::debug!(
            engine = %request.engine,
            voice = %request.voice_id,
            bytes = audio.len(),
            "synthesized speech"
        );
        Ok(audio.to_vec())
    }
}

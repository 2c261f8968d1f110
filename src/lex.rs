//! Conversational client for Lex V2 bots
//!
//! Each utterance is sent with the persisted session token so the bot can
//! keep slot and intent state between turns. Context lives on the service.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::aws::sigv4::{self, Scope, SignableRequest};
use crate::aws::{CredentialProvider, describe_error};
use crate::config::BotConfig;
use crate::session::SessionToken;
use crate::{Error, Result};

/// Reply shown when the bot returns no messages
pub const FALLBACK_REPLY: &str = "(No tengo respuesta por ahora.)";

const SIGNING_SERVICE: &str = "lex";

/// Sends user utterances to a conversational service
#[async_trait]
pub trait ConversationClient: Send + Sync {
    /// Send one utterance within `session` and return the reply text
    ///
    /// # Errors
    ///
    /// Returns [`Error::Understanding`] if the call fails
    async fn send(&self, text: &str, session: &SessionToken) -> Result<String>;
}

#[derive(Serialize)]
struct RecognizeTextRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct RecognizeTextResponse {
    #[serde(default)]
    messages: Vec<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    content: Option<String>,
}

/// Join reply fragments with single spaces, in service order
///
/// Falls back to [`FALLBACK_REPLY`] when there is nothing to show.
#[must_use]
pub fn reply_text<I, S>(fragments: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let joined = fragments
        .into_iter()
        .map(|f| f.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(" ");

    if joined.is_empty() {
        FALLBACK_REPLY.to_string()
    } else {
        joined
    }
}

/// `RecognizeText` client
pub struct LexClient {
    client: reqwest::Client,
    endpoint: String,
    region: String,
    bot: BotConfig,
    credentials: Arc<dyn CredentialProvider>,
}

impl LexClient {
    #[must_use]
    pub fn new(
        endpoint: impl Into<String>,
        region: impl Into<String>,
        bot: BotConfig,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            region: region.into(),
            bot,
            credentials,
        }
    }

    fn url(&self, session: &SessionToken) -> Result<Url> {
        let path = [
            "bots",
            self.bot.bot_id.as_str(),
            "botAliases",
            self.bot.bot_alias_id.as_str(),
            "botLocales",
            self.bot.locale_id.as_str(),
            "sessions",
            session.as_str(),
            "text",
        ]
        .iter()
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/");

        Url::parse(&format!("{}/{path}", self.endpoint))
            .map_err(|e| Error::Config(format!("invalid conversation endpoint: {e}")))
    }
}

#[async_trait]
impl ConversationClient for LexClient {
    async fn send(&self, text: &str, session: &SessionToken) -> Result<String> {
        let credentials = self.credentials.signing_credentials()?;

        let url = self.url(session)?;
        let body = serde_json::to_vec(&RecognizeTextRequest { text })?;

        let signed = sigv4::sign(
            &SignableRequest {
                method: "POST",
                url: &url,
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

        tracing::debug!(
            bot_id = %self.bot.bot_id,
            locale = %self.bot.locale_id,
            session = %session,
            "sending utterance"
        );

        let mut request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        for (name, value) in signed {
            request = request.header(name, value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Understanding(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Understanding(describe_error(status, &body)));
        }

        let parsed: RecognizeTextResponse = response
            .json()
            .await
            .map_err(|e| Error::Understanding(format!("invalid response body: {e}")))?;

        tracing::debug!(fragments = parsed.messages.len(), "received reply");
        Ok(reply_text(
            parsed.messages.into_iter().filter_map(|m| m.content),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_fragments_in_order() {
        assert_eq!(
            reply_text(["Hola", "¿en qué ayudo?"]),
            "Hola ¿en qué ayudo?"
        );
    }

    #[test]
    fn empty_fragments_use_fallback() {
        assert_eq!(reply_text(Vec::<String>::new()), FALLBACK_REPLY);
    }

    #[test]
    fn single_fragment_unchanged() {
        assert_eq!(reply_text(["Listo."]), "Listo.");
    }

    #[test]
    fn response_without_messages_parses() {
        let parsed: RecognizeTextResponse =
            serde_json::from_str(r#"{"sessionId":"abc","sessionState":{}}"#).unwrap();
        assert!(parsed.messages.is_empty());
    }

    #[test]
    fn card_messages_have_no_content() {
        let parsed: RecognizeTextResponse = serde_json::from_str(
            r#"{"messages":[{"contentType":"ImageResponseCard","imageResponseCard":{}},{"content":"ok","contentType":"PlainText"}]}"#,
        )
        .unwrap();
        let text = reply_text(parsed.messages.into_iter().filter_map(|m| m.content));
        assert_eq!(text, "ok");
    }
}

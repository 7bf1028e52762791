use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::SlackConfig;
use crate::error::{Error, Result};
use crate::message::Attachment;
use crate::platform::{RichPoster, SessionInfo, SessionResolver};

/// Response of `rtm.start` / `rtm.connect`
#[derive(Debug, Deserialize)]
struct RtmStartResponse {
    ok: bool,
    #[serde(default)]
    error: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    #[serde(rename = "self")]
    self_info: Option<RtmSelf>,
}

#[derive(Debug, Deserialize)]
struct RtmSelf {
    id: String,
}

/// Slack Web API client covering session bootstrap and rich posting.
pub struct SlackApi {
    client: reqwest::Client,
    token: String,
    base_url: String,
    rtm_method: String,
}

impl SlackApi {
    pub fn new(config: &SlackConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            token: config.token.clone(),
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            rtm_method: config.rtm_method.clone(),
        }
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }
}

#[async_trait]
impl SessionResolver for SlackApi {
    async fn resolve_session(&self) -> Result<SessionInfo> {
        let url = self.url(&self.rtm_method);
        debug!("Requesting realtime session from {}", url);

        let response = self
            .client
            .get(&url)
            .query(&[("token", self.token.as_str())])
            .send()
            .await?;

        let status = response.status();
        if status.is_server_error() {
            return Err(Error::Unavailable(status.as_u16()));
        }
        if status != reqwest::StatusCode::OK {
            return Err(Error::Bootstrap(format!(
                "API request failed with code {}",
                status.as_u16()
            )));
        }

        let body: RtmStartResponse = response.json().await?;
        if !body.ok {
            return Err(Error::Bootstrap(format!("Slack error: {}", body.error)));
        }

        let self_id = body.self_info.map(|s| s.id).unwrap_or_default();
        if body.url.is_empty() || self_id.is_empty() {
            return Err(Error::Bootstrap(
                "response is missing the endpoint url or self id".to_string(),
            ));
        }

        info!("Realtime session resolved for bot user {}", self_id);
        Ok(SessionInfo {
            endpoint: body.url,
            self_id,
        })
    }
}

#[async_trait]
impl RichPoster for SlackApi {
    async fn post_rich_message(
        &self,
        channel: &str,
        text: &str,
        attachments: &[Attachment],
    ) -> Result<()> {
        let attachments = serde_json::to_string(attachments)?;
        let form = [
            ("token", self.token.as_str()),
            ("parse", "full"),
            ("channel", channel),
            ("text", text),
            ("attachments", attachments.as_str()),
        ];

        let response = self
            .client
            .post(self.url("chat.postMessage"))
            .form(&form)
            .send()
            .await?;

        // The body is not validated here; only transport failures are errors.
        let status = response.status();
        if !status.is_success() {
            warn!("chat.postMessage to {} returned {}", channel, status);
        }
        Ok(())
    }
}

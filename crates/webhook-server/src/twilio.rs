//! Twilio REST implementation of the telephony provider.
//!
//! A transfer is a live-call redirect: Twilio is told to fetch new
//! instructions for the held call from our transfer callback, which answers
//! with the connect plan for the destination.

use std::time::Duration;

use async_trait::async_trait;
use holdline_transfer_engine::{AttemptToken, CallId, CallInfo, ProviderError, TelephonyProvider, TransferRequest};
use reqwest::{Client, Response};
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::TwilioConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Subset of Twilio's call resource we read back
#[derive(Debug, Deserialize)]
struct CallResource {
    sid: String,
    status: String,
    #[serde(default)]
    from: Option<String>,
    #[serde(default)]
    to: Option<String>,
    /// Twilio reports duration as a string of seconds
    #[serde(default)]
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResource {
    #[serde(default)]
    code: Option<u32>,
    #[serde(default)]
    message: Option<String>,
}

pub struct TwilioProvider {
    client: Client,
    config: TwilioConfig,
}

impl TwilioProvider {
    pub fn new(config: TwilioConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("Failed to build HTTP client: {}", e)))?;

        info!(account_sid = %config.account_sid, api_base = %config.api_base, "☎️ Twilio provider configured");
        Ok(Self { client, config })
    }

    fn call_url(&self, call_id: &CallId) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Calls/{}.json",
            self.config.api_base.trim_end_matches('/'),
            self.config.account_sid,
            call_id
        )
    }

    async fn update_call(&self, call_id: &CallId, params: &[(&str, &str)]) -> Result<CallResource, ProviderError> {
        let response = self
            .client
            .post(self.call_url(call_id))
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(params)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        Self::read_call(response).await
    }

    async fn read_call(response: Response) -> Result<CallResource, ProviderError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<ErrorResource>(&body) {
                Ok(ErrorResource { code: Some(code), message: Some(message) }) => format!("{} (code {})", message, code),
                Ok(ErrorResource { message: Some(message), .. }) => message,
                _ => body,
            };
            return Err(ProviderError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<CallResource>()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))
    }
}

#[async_trait]
impl TelephonyProvider for TwilioProvider {
    async fn initiate_transfer(&self, request: &TransferRequest) -> Result<AttemptToken, ProviderError> {
        debug!(call_id = %request.call_id, destination = %request.destination, "redirecting call via Twilio");

        let call = self
            .update_call(&request.call_id, &[("Url", request.status_callback.as_str()), ("Method", "POST")])
            .await?;

        info!(call_id = %request.call_id, status = %call.status, attempt = request.attempt, "📤 Twilio accepted call redirect");
        Ok(AttemptToken(format!("{}#{}", call.sid, request.attempt)))
    }

    async fn fetch_call_info(&self, call_id: &CallId) -> Result<CallInfo, ProviderError> {
        let response = self
            .client
            .get(self.call_url(call_id))
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let call = Self::read_call(response).await?;
        Ok(CallInfo {
            call_id: CallId::new(call.sid),
            status: call.status,
            from: call.from,
            to: call.to,
            duration_secs: call.duration.and_then(|d| d.parse().ok()),
        })
    }

    /// Twilio only accepts `canceled` for calls that are still queued or
    /// ringing. A redirected call is in progress, so it has to be completed.
    async fn cancel_transfer(&self, call_id: &CallId) -> Result<(), ProviderError> {
        self.update_call(call_id, &[("Status", "completed")]).await?;
        info!(call_id = %call_id, "🛑 Twilio call completed to cancel transfer");
        Ok(())
    }
}

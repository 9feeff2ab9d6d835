use anyhow::anyhow;
use axum::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, error};

use crate::config::MailConfig;

/// Outbound mail is an external collaborator; the only thing this service
/// ever sends is the account-activation link.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_activation(
        &self,
        to: &str,
        name: &str,
        activation_url: &str,
    ) -> anyhow::Result<()>;
}

/// Delivers through an HTTP mail API (Mailgun-style JSON endpoint with a
/// bearer token).
pub struct HttpMailer {
    client: Client,
    config: MailConfig,
}

impl HttpMailer {
    pub fn new(config: MailConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send_activation(
        &self,
        to: &str,
        name: &str,
        activation_url: &str,
    ) -> anyhow::Result<()> {
        let payload = json!({
            "from": self.config.from,
            "to": to,
            "subject": "Activate your account",
            "text": format!(
                "Hello {name}, please click on the link to activate your account: {activation_url}"
            ),
        });

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_token)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body: Value = response.json().await.unwrap_or_default();
            let message = body["message"].as_str().unwrap_or_default();
            error!(%status, message, "mail api rejected activation email");
            return Err(anyhow!("mail api returned {status}: {message}"));
        }

        debug!(to, "activation email dispatched");
        Ok(())
    }
}

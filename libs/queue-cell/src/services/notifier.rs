use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error};

use shared_config::AppConfig;

use crate::QueueError;

pub const RESCHEDULE_TEMPLATE: &str = "appointment_reschedule_universal";

/// A pre-approved WhatsApp template with its body placeholders in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateMessage {
    pub template_name: String,
    pub recipient_number: String,
    pub placeholders: Vec<String>,
}

#[async_trait]
pub trait QueueNotifier: Send + Sync {
    async fn send_template(&self, message: &TemplateMessage) -> Result<Value, QueueError>;
}

/// Relays template messages to the WhatsApp gateway as flat JSON.
pub struct WhatsAppNotifier {
    client: Client,
    api_url: String,
    api_key: String,
}

impl WhatsAppNotifier {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            api_url: config.whatsapp_api_url.clone(),
            api_key: config.whatsapp_api_key.clone(),
        }
    }

    fn payload(message: &TemplateMessage) -> Value {
        json!({
            "recipient": format!("+91{}", message.recipient_number),
            "templateName": message.template_name,
            "language": "en_US",
            "templateData": {
                "body": { "placeholders": message.placeholders }
            }
        })
    }
}

#[async_trait]
impl QueueNotifier for WhatsAppNotifier {
    async fn send_template(&self, message: &TemplateMessage) -> Result<Value, QueueError> {
        debug!("Sending template {} to {}", message.template_name, message.recipient_number);

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", &self.api_key)
            .header("accept", "application/json")
            .json(&Self::payload(message))
            .send()
            .await
            .map_err(|e| QueueError::NotificationError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("WhatsApp gateway error ({}): {}", status, body);
            return Err(QueueError::NotificationError(format!("gateway returned {}: {}", status, body)));
        }

        // Some gateways answer with an empty body.
        let text = response
            .text()
            .await
            .map_err(|e| QueueError::NotificationError(e.to_string()))?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }
}

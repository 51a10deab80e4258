//! Requests sent to the administrators from the public pages: adding a
//! student to the roster, or a free-text support message.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared::{AdminRequest, AdminRequestResponse};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

pub const MIN_SUPPORT_MESSAGE_LEN: usize = 5;

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("Please enter both roll number and name")]
    MissingStudentDetails,
    #[error("Please enter a valid message (at least 5 characters)")]
    MessageTooShort,
    #[error("Error sending request: {0}")]
    Delivery(#[source] anyhow::Error),
}

/// Where outgoing requests are addressed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestsConfig {
    pub sender: String,
    pub recipients: Vec<String>,
}

impl Default for RequestsConfig {
    fn default() -> Self {
        Self {
            sender: "portal@localhost".to_string(),
            recipients: vec!["admin@localhost".to_string()],
        }
    }
}

/// A composed request ready for delivery
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    /// HTML body with user text escaped
    pub body: String,
}

#[async_trait]
pub trait RequestDelivery: Send + Sync {
    async fn deliver(&self, message: &OutgoingMessage) -> Result<()>;
}

/// Delivery that only writes the message to the log
#[derive(Debug, Default, Clone)]
pub struct LoggingDelivery;

#[async_trait]
impl RequestDelivery for LoggingDelivery {
    async fn deliver(&self, message: &OutgoingMessage) -> Result<()> {
        info!(
            "Request '{}' from {} to {}: {}",
            message.subject,
            message.from,
            message.to.join(", "),
            message.body
        );
        Ok(())
    }
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[derive(Clone)]
pub struct RequestService {
    config: RequestsConfig,
    delivery: Arc<dyn RequestDelivery>,
}

impl RequestService {
    pub fn new(config: RequestsConfig, delivery: Arc<dyn RequestDelivery>) -> Self {
        Self { config, delivery }
    }

    pub async fn submit(&self, request: AdminRequest) -> Result<AdminRequestResponse, RequestError> {
        let (message, confirmation) = self.compose(&request)?;
        info!("Sending admin request: {}", message.subject);

        if let Err(e) = self.delivery.deliver(&message).await {
            warn!("Failed to deliver admin request: {:?}", e);
            return Err(RequestError::Delivery(e));
        }

        Ok(AdminRequestResponse {
            success: true,
            message: confirmation.to_string(),
        })
    }

    fn compose(&self, request: &AdminRequest) -> Result<(OutgoingMessage, &'static str), RequestError> {
        let (subject, body, confirmation) = match request {
            AdminRequest::AddStudent { roll_number, name } => {
                let roll_number = roll_number.trim();
                let name = name.trim();
                if roll_number.is_empty() || name.is_empty() {
                    return Err(RequestError::MissingStudentDetails);
                }
                (
                    "New Student Add Request",
                    format!(
                        "<p><b>Type:</b> add_student</p><p><b>Roll Number:</b> {}</p><p><b>Name:</b> {}</p>",
                        escape_html(roll_number),
                        escape_html(name)
                    ),
                    "Request sent successfully!",
                )
            }
            AdminRequest::Support { message } => {
                let message = message.trim();
                if message.chars().count() < MIN_SUPPORT_MESSAGE_LEN {
                    return Err(RequestError::MessageTooShort);
                }
                (
                    "Student Contact Support Request",
                    format!(
                        "<p><b>Type:</b> support</p><p><b>Message:</b> {}</p>",
                        escape_html(message)
                    ),
                    "Support message sent!",
                )
            }
        };

        let message = OutgoingMessage {
            from: self.config.sender.clone(),
            to: self.config.recipients.clone(),
            subject: subject.to_string(),
            body,
        };
        Ok((message, confirmation))
    }
}

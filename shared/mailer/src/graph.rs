use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use base64::Engine;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::oauth::{SenderCredentials, TokenCache};
use crate::types::{InboxMessage, SendMailRequest, SendOutcome};

const SENT_ITEMS_VERIFY_RETRIES: u32 = 3;
const SENT_ITEMS_VERIFY_DELAY: Duration = Duration::from_secs(2);

/// Sends and reads mail for every registered sender mailbox via the
/// Microsoft Graph REST API, using client-credentials OAuth2 per
/// tenant.
pub struct GraphMailTransport {
    http: reqwest::Client,
    base_url: String,
    credentials: HashMap<String, SenderCredentials>,
    default_credentials: Option<SenderCredentials>,
    tokens: TokenCache,
}

impl GraphMailTransport {
    pub fn new(base_url: impl Into<String>, scope: impl Into<String>, credentials: Vec<SenderCredentials>) -> Self {
        Self::with_default(base_url, scope, credentials, None)
    }

    /// `default_credentials`, when set, backs every sender mailbox not
    /// present in `credentials` — the "plus a default fallback" triple
    /// from spec §6.
    pub fn with_default(
        base_url: impl Into<String>,
        scope: impl Into<String>,
        credentials: Vec<SenderCredentials>,
        default_credentials: Option<SenderCredentials>,
    ) -> Self {
        let credentials = credentials
            .into_iter()
            .map(|c| (c.sender_email.to_lowercase(), c))
            .collect();

        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            credentials,
            default_credentials,
            tokens: TokenCache::new(scope),
        }
    }

    fn credentials_for(&self, sender_email: &str) -> Result<SenderCredentials> {
        if let Some(creds) = self.credentials.get(&sender_email.to_lowercase()) {
            return Ok(creds.clone());
        }
        if let Some(default) = &self.default_credentials {
            return Ok(SenderCredentials { sender_email: sender_email.to_string(), ..default.clone() });
        }
        anyhow::bail!("no Graph API credentials configured for sender {sender_email}")
    }

    /// Sends one message and only reports `Sent` once the message is
    /// confirmed present in the sender's Sent Items folder.
    pub async fn send(&self, request: SendMailRequest) -> Result<SendOutcome> {
        let creds = self.credentials_for(&request.sender_email)?;
        let token = self.tokens.token_for(&creds).await?;

        let payload = build_send_payload(&request);
        let url = format!("{}/users/{}/sendMail", self.base_url, request.sender_email);

        info!(sender = %request.sender_email, to = ?request.to, "sending message via Graph API");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&token)
            .json(&payload)
            .timeout(Duration::from_secs(30))
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(err) if err.is_timeout() => {
                return Ok(SendOutcome::Failed {
                    error_message: "Graph API request timed out".to_string(),
                    http_status: Some(504),
                });
            }
            Err(err) => {
                return Ok(SendOutcome::Failed { error_message: err.to_string(), http_status: None });
            }
        };

        let status = response.status();
        if !(status == reqwest::StatusCode::ACCEPTED || status == reqwest::StatusCode::NO_CONTENT) {
            let body: Value = response.json().await.unwrap_or_default();
            let error_message = body
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
                .unwrap_or("unknown Graph API error")
                .to_string();
            error!(%status, %error_message, "Graph API rejected send");
            return Ok(SendOutcome::Failed { error_message, http_status: Some(status.as_u16()) });
        }

        match self.verify_sent(&request.sender_email, &request.subject, request.to.first()).await? {
            Some((message_id, conversation_id)) => Ok(SendOutcome::Sent { message_id, conversation_id }),
            None => {
                warn!(sender = %request.sender_email, "send accepted but not confirmed in Sent Items");
                Ok(SendOutcome::Failed {
                    error_message: "email accepted by Graph API but not confirmed in Sent Items".to_string(),
                    http_status: Some(422),
                })
            }
        }
    }

    /// Polls the Sent Items folder up to `SENT_ITEMS_VERIFY_RETRIES`
    /// times, two seconds apart, looking for a message matching
    /// subject and recipient.
    async fn verify_sent(
        &self,
        sender_email: &str,
        subject: &str,
        recipient: Option<&String>,
    ) -> Result<Option<(String, Option<String>)>> {
        let creds = self.credentials_for(sender_email)?;
        let token = self.tokens.token_for(&creds).await?;
        let url = format!("{}/users/{sender_email}/mailFolders/SentItems/messages", self.base_url);

        for attempt in 1..=SENT_ITEMS_VERIFY_RETRIES {
            let response = self
                .http
                .get(&url)
                .bearer_auth(&token)
                .query(&[
                    ("$select", "id,internetMessageId,conversationId,subject,toRecipients,sentDateTime"),
                    ("$orderby", "sentDateTime desc"),
                    ("$top", "20"),
                ])
                .send()
                .await
                .context("failed to query Sent Items")?;

            if response.status().is_success() {
                let body: Value = response.json().await.unwrap_or_default();
                if let Some(found) = find_matching_sent_message(&body, subject, recipient) {
                    return Ok(Some(found));
                }
            }

            if attempt < SENT_ITEMS_VERIFY_RETRIES {
                tokio::time::sleep(SENT_ITEMS_VERIFY_DELAY).await;
            }
        }

        Ok(None)
    }

    pub async fn fetch_inbox(&self, sender_email: &str, max_messages: usize) -> Result<Vec<InboxMessage>> {
        let creds = self.credentials_for(sender_email)?;
        let token = self.tokens.token_for(&creds).await?;

        let select_fields = "id,subject,from,receivedDateTime,internetMessageHeaders,body,bodyPreview";
        let url = format!("{}/users/{sender_email}/mailFolders/inbox/messages", self.base_url);

        let response = self
            .http
            .get(&url)
            .bearer_auth(&token)
            .query(&[
                ("$select", select_fields),
                ("$orderby", "receivedDateTime desc"),
                ("$top", &max_messages.min(50).to_string()),
            ])
            .send()
            .await
            .context("failed to fetch inbox messages")?;

        if !response.status().is_success() {
            anyhow::bail!("Graph API returned {} fetching inbox for {sender_email}", response.status());
        }

        let body: Value = response.json().await.context("invalid inbox response body")?;
        let messages = body.get("value").and_then(Value::as_array).cloned().unwrap_or_default();

        Ok(messages.iter().filter_map(parse_inbox_message).take(max_messages).collect())
    }
}

fn build_send_payload(request: &SendMailRequest) -> Value {
    let mut message = json!({
        "subject": request.subject,
        "body": { "contentType": "TEXT", "content": request.body },
        "toRecipients": request.to.iter().map(|addr| json!({ "emailAddress": { "address": addr } })).collect::<Vec<_>>(),
    });

    if !request.cc.is_empty() {
        message["ccRecipients"] =
            json!(request.cc.iter().map(|addr| json!({ "emailAddress": { "address": addr } })).collect::<Vec<_>>());
    }

    let mut headers = Vec::new();
    if let Some(in_reply_to) = &request.in_reply_to {
        headers.push(json!({ "name": "In-Reply-To", "value": in_reply_to }));
    }
    if let Some(references) = &request.references {
        headers.push(json!({ "name": "References", "value": references }));
    }
    if !headers.is_empty() {
        message["internetMessageHeaders"] = json!(headers);
    }

    if let Some(attachment) = &request.attachment {
        let content_b64 = base64::engine::general_purpose::STANDARD.encode(&attachment.content);
        message["attachments"] = json!([{
            "@odata.type": "#microsoft.graph.fileAttachment",
            "name": attachment.filename,
            "contentType": attachment.mimetype,
            "contentBytes": content_b64,
        }]);
    }

    json!({ "message": message, "saveToSentItems": true })
}

fn find_matching_sent_message(
    body: &Value,
    subject: &str,
    recipient: Option<&String>,
) -> Option<(String, Option<String>)> {
    let values = body.get("value").and_then(Value::as_array)?;
    values.iter().find_map(|msg| {
        let msg_subject = msg.get("subject").and_then(Value::as_str)?;
        if !msg_subject.eq_ignore_ascii_case(subject) {
            return None;
        }

        if let Some(recipient) = recipient {
            let matches_recipient = msg
                .get("toRecipients")
                .and_then(Value::as_array)
                .map(|recipients| {
                    recipients.iter().any(|r| {
                        r.get("emailAddress")
                            .and_then(|a| a.get("address"))
                            .and_then(Value::as_str)
                            .map(|addr| addr.eq_ignore_ascii_case(recipient))
                            .unwrap_or(false)
                    })
                })
                .unwrap_or(false);
            if !matches_recipient {
                return None;
            }
        }

        let message_id = msg.get("internetMessageId").and_then(Value::as_str)?.to_string();
        let conversation_id = msg.get("conversationId").and_then(Value::as_str).map(str::to_string);
        Some((message_id, conversation_id))
    })
}

fn parse_inbox_message(raw: &Value) -> Option<InboxMessage> {
    let message_id = raw.get("id").and_then(Value::as_str)?.to_string();
    let subject = raw.get("subject").and_then(Value::as_str).unwrap_or_default().to_string();
    let from_address = raw
        .get("from")
        .and_then(|f| f.get("emailAddress"))
        .and_then(|a| a.get("address"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let body = raw
        .get("body")
        .and_then(|b| b.get("content"))
        .and_then(Value::as_str)
        .or_else(|| raw.get("bodyPreview").and_then(Value::as_str))
        .unwrap_or_default()
        .to_string();
    let received_at = raw
        .get("receivedDateTime")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    let in_reply_to = raw.get("internetMessageHeaders").and_then(Value::as_array).and_then(|headers| {
        headers.iter().find_map(|h| {
            let name = h.get("name").and_then(Value::as_str)?;
            if name.eq_ignore_ascii_case("In-Reply-To") {
                h.get("value").and_then(Value::as_str).map(str::to_string)
            } else {
                None
            }
        })
    });

    Some(InboxMessage {
        message_id,
        conversation_id: raw.get("conversationId").and_then(Value::as_str).map(str::to_string),
        from_address,
        subject,
        body,
        received_at,
        in_reply_to,
    })
}

//! Inbound service hook payloads.
//!
//! The remote service sends a large JSON document per event. Only the
//! rendered message variants are needed to build a chat post, and every one
//! of them is optional: an event without any rendered text still produces a
//! post with a synthesized summary.

use serde::Deserialize;

/// Rendered forms of an event message.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventMessage {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub markdown: Option<String>,
}

/// A webhook callback body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub message: Option<EventMessage>,
    #[serde(default)]
    pub detailed_message: Option<EventMessage>,
}

impl WebhookEvent {
    pub fn parse(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }

    /// Text to post for this event.
    ///
    /// Preference order: detailed markdown, short markdown, short plain text,
    /// then a summary synthesized from the event type.
    pub fn summary(&self) -> String {
        let detailed = self
            .detailed_message
            .as_ref()
            .and_then(|m| non_empty(&m.markdown));
        let short = self
            .message
            .as_ref()
            .and_then(|m| non_empty(&m.markdown).or_else(|| non_empty(&m.text)));

        if let Some(text) = detailed.or(short) {
            return text.to_string();
        }

        match self.event_type.as_deref().map(str::trim) {
            Some(event_type) if !event_type.is_empty() => {
                format!("Received `{event_type}` event")
            }
            _ => "Received an event notification".to_string(),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

//! Out-of-band control messages from the page.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tether_core::{Error, MutationRecord};

use super::{Agent, Effect, Outcome};
use crate::fetch::resolve;

/// A control message, tagged on `type`.
///
/// ```json
/// {"type": "SKIP_WAITING"}
/// {"type": "GET_VERSION"}
/// {"type": "QUEUE_MUTATION", "url": "/api/posts", "method": "POST", "body": "{}"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    SkipWaiting,
    GetVersion,
    QueueMutation {
        url: String,
        #[serde(default = "default_method")]
        method: String,
        #[serde(default)]
        headers: BTreeMap<String, String>,
        #[serde(default)]
        body: Option<String>,
    },
}

fn default_method() -> String {
    "POST".into()
}

impl ControlMessage {
    /// Parse a message; unknown types are rejected.
    pub fn from_value(value: serde_json::Value) -> Result<Self, Error> {
        serde_json::from_value(value).map_err(|e| Error::InvalidInput(format!("control message: {e}")))
    }
}

impl std::str::FromStr for ControlMessage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_str(s).map_err(|e| Error::InvalidInput(format!("control message: {e}")))
    }
}

impl Agent {
    pub(crate) async fn on_message(&self, message: ControlMessage) -> Result<Outcome, Error> {
        match message {
            ControlMessage::SkipWaiting => Ok(Outcome::effect(Effect::SkipWaiting)),
            ControlMessage::GetVersion => Ok(Outcome::effect(Effect::Reply {
                message: json!({ "version": self.inner.generations.static_name() }),
            })),
            ControlMessage::QueueMutation { url, method, headers, body } => {
                let method = method.to_ascii_uppercase();
                if matches!(method.as_str(), "GET" | "HEAD") {
                    return Err(Error::InvalidInput(format!("{method} is not a mutation")));
                }

                let url = resolve(self.inner.classifier.origin(), &url)?;
                let record =
                    MutationRecord::new(url.as_str(), &method, headers.into_iter().collect(), body.map(String::into_bytes));
                let id = self.queue_mutation(record).await?;
                Ok(Outcome::effect(Effect::Reply { message: json!({ "queued": id }) }))
            }
        }
    }
}

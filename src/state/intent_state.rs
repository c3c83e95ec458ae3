use crate::error::Result;
use crate::state::post_init::PostInitializationHandler;
use async_trait::async_trait;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tauri::Emitter;
use tokio::sync::{Mutex, RwLock};
use url::Url;

pub const PROTOCOL_INTENT_EVENT: &str = "protocol-intent";

/// Action requested through the `prestij://` scheme, e.g.
/// `prestij://install/demo-mod`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolIntent {
    pub command: String,
    pub slug: String,
}

/// Parses a protocol link into an intent: the hostname is the command,
/// the first path segment the (percent-encoded) slug.
pub fn parse_protocol_url(raw: &str) -> Option<ProtocolIntent> {
    let url = Url::parse(raw).ok()?;
    if url.scheme() != "prestij" {
        return None;
    }

    let command = url.host_str()?.to_string();
    if command.is_empty() {
        return None;
    }

    let slug_segment = url.path_segments()?.find(|s| !s.is_empty())?;
    let slug = urlencoding::decode(slug_segment).ok()?.into_owned();

    Some(ProtocolIntent { command, slug })
}

/// Holding slot for protocol intents.
///
/// Links can arrive before the webview is ready (cold start through a
/// protocol click). Those are parked here and handed out exactly once
/// when the UI asks for them; intents arriving while the UI is live are
/// emitted directly.
pub struct IntentQueue {
    app_handle: RwLock<Option<Arc<tauri::AppHandle>>>,
    pending: Mutex<Option<ProtocolIntent>>,
}

impl IntentQueue {
    pub fn new() -> Self {
        Self {
            app_handle: RwLock::new(None),
            pending: Mutex::new(None),
        }
    }

    pub async fn submit(&self, intent: ProtocolIntent) {
        info!(
            "Protocol intent received: command='{}' slug='{}'",
            intent.command, intent.slug
        );

        let handle_guard = self.app_handle.read().await;
        match handle_guard.as_ref() {
            Some(app) => {
                if let Err(e) = app.emit(PROTOCOL_INTENT_EVENT, &intent) {
                    warn!("Failed to forward protocol intent to the UI: {}", e);
                }
            }
            None => {
                let mut pending = self.pending.lock().await;
                if let Some(previous) = pending.replace(intent) {
                    warn!(
                        "Replacing pending protocol intent '{}:{}' before the UI consumed it",
                        previous.command, previous.slug
                    );
                }
            }
        }
    }

    /// Hands out the parked intent, clearing the slot. Subsequent calls
    /// return None until a new intent arrives.
    pub async fn take_pending(&self) -> Option<ProtocolIntent> {
        self.pending.lock().await.take()
    }
}

impl Default for IntentQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PostInitializationHandler for IntentQueue {
    async fn on_state_ready(&self, app_handle: Arc<tauri::AppHandle>) -> Result<()> {
        let mut handle_guard = self.app_handle.write().await;
        *handle_guard = Some(app_handle);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_command_and_slug_from_protocol_links() {
        let intent = parse_protocol_url("prestij://install/demo-mod").unwrap();
        assert_eq!(intent.command, "install");
        assert_eq!(intent.slug, "demo-mod");

        let trailing = parse_protocol_url("prestij://open/demo-mod/").unwrap();
        assert_eq!(trailing.slug, "demo-mod");
    }

    #[test]
    fn decodes_percent_encoded_slugs() {
        let intent = parse_protocol_url("prestij://install/s%C3%BCper-mod").unwrap();
        assert_eq!(intent.slug, "süper-mod");
    }

    #[test]
    fn rejects_foreign_schemes_and_incomplete_links() {
        assert!(parse_protocol_url("https://install/demo-mod").is_none());
        assert!(parse_protocol_url("prestij://install").is_none());
        assert!(parse_protocol_url("prestij://").is_none());
        assert!(parse_protocol_url("not a url").is_none());
    }

    #[tokio::test]
    async fn pending_intent_is_flushed_exactly_once() {
        let queue = IntentQueue::new();

        queue
            .submit(ProtocolIntent {
                command: "install".to_string(),
                slug: "demo-mod".to_string(),
            })
            .await;

        let first = queue.take_pending().await;
        assert_eq!(
            first,
            Some(ProtocolIntent {
                command: "install".to_string(),
                slug: "demo-mod".to_string(),
            })
        );
        assert!(queue.take_pending().await.is_none());
    }

    #[tokio::test]
    async fn newer_pending_intent_replaces_the_older_one() {
        let queue = IntentQueue::new();

        queue
            .submit(ProtocolIntent {
                command: "install".to_string(),
                slug: "first".to_string(),
            })
            .await;
        queue
            .submit(ProtocolIntent {
                command: "install".to_string(),
                slug: "second".to_string(),
            })
            .await;

        assert_eq!(queue.take_pending().await.unwrap().slug, "second");
    }
}

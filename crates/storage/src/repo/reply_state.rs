use crate::json::{read_json, write_json_atomic};
use crate::{blocking, Store};
use domain::{DedupEntry, ReplyState, Result};
use serde_json::Value;
use tracing::warn;

/// 逐条解析，坏条目丢弃并记日志，不影响其余记录
fn parse_state(raw: Value) -> ReplyState {
    let mut state = ReplyState::default();

    match raw.get("last_checkpoint") {
        None | Some(Value::Null) => {}
        Some(Value::Number(n)) => {
            state.last_checkpoint = n.as_i64().and_then(|s| chrono::DateTime::from_timestamp(s, 0));
        }
        Some(other) => warn!("Ignoring malformed checkpoint in reply state: {}", other),
    }

    if let Some(Value::Object(answered)) = raw.get("answered") {
        for (id, entry) in answered {
            match serde_json::from_value::<DedupEntry>(entry.clone()) {
                Ok(e) => {
                    state.answered.insert(id.clone(), e);
                }
                Err(e) => warn!("Skipping malformed dedup entry {}: {}", id, e),
            }
        }
    }
    state
}

impl Store {
    pub async fn load_reply_state(&self) -> Result<ReplyState> {
        let _guard = self.reply_lock.lock().await;
        let path = self.paths.reply_state.clone();
        let raw = blocking(move || read_json::<Value>(&path)).await?;
        Ok(raw.map(parse_state).unwrap_or_default())
    }

    pub async fn save_reply_state(&self, state: &ReplyState) -> Result<()> {
        let _guard = self.reply_lock.lock().await;
        let path = self.paths.reply_state.clone();
        let state = state.clone();
        blocking(move || write_json_atomic(&path, &state)).await
    }
}

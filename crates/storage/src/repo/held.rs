use crate::json::{read_json_array, write_json_atomic};
use crate::{blocking, Store};
use domain::{Error, HeldReply, Result};

impl Store {
    /// 待人工审核的回复，追加写入
    pub async fn hold_reply(&self, held: HeldReply) -> Result<()> {
        let _guard = self.review_lock.lock().await;
        let path = self.paths.held_replies.clone();

        blocking(move || {
            let mut items = read_json_array(&path)?;
            let value = serde_json::to_value(&held)
                .map_err(|e| Error::Persistence(format!("serialize held reply: {}", e)))?;
            items.push(value);
            write_json_atomic(&path, &items)
        })
        .await
    }

    pub async fn load_held_replies(&self) -> Result<Vec<HeldReply>> {
        let path = self.paths.held_replies.clone();
        let items = blocking(move || read_json_array(&path)).await?;
        Ok(items
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect())
    }
}

use crate::json::{read_json_array, write_json_atomic};
use crate::{blocking, Store};
use domain::Result;
use serde_json::Value;

impl Store {
    /// 原始条目，校验交给调用方，坏条目也要能原样写回
    pub async fn load_queue(&self) -> Result<Vec<Value>> {
        let _guard = self.queue_lock.lock().await;
        let path = self.paths.queue.clone();
        blocking(move || read_json_array(&path)).await
    }

    pub async fn save_queue(&self, items: Vec<Value>) -> Result<()> {
        let _guard = self.queue_lock.lock().await;
        let path = self.paths.queue.clone();
        blocking(move || write_json_atomic(&path, &items)).await
    }
}

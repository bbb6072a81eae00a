use crate::json::{read_json_array, write_json_atomic};
use crate::{blocking, Store};
use chrono::{DateTime, FixedOffset};
use domain::{prompt::truncate_chars, Error, NewPost, Post, Result};
use serde_json::Value;

const SUMMARY_CHARS: usize = 120;

fn record_id(record: &Value) -> u64 {
    match record.get("id") {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

impl Store {
    /// 追加一篇文章。id 取现有最大 id + 1；文件里已有的记录原样保留
    pub async fn append_post(&self, new: NewPost, at: DateTime<FixedOffset>) -> Result<Post> {
        let _guard = self.posts_lock.lock().await;
        let path = self.paths.posts.clone();

        blocking(move || {
            let mut records = read_json_array(&path)?;
            let next_id = records.iter().map(record_id).max().unwrap_or(0) + 1;

            let post = Post {
                id: next_id,
                summary: truncate_chars(&new.content, SUMMARY_CHARS),
                title: new.title,
                content: new.content,
                author: new.author,
                published_at: at,
                source: new.source,
            };
            let value = serde_json::to_value(&post)
                .map_err(|e| Error::Persistence(format!("serialize post: {}", e)))?;
            records.push(value);

            write_json_atomic(&path, &records)?;
            Ok(post)
        })
        .await
    }

    /// 读出所有能识别的文章，无法识别的记录跳过
    pub async fn list_posts(&self) -> Result<Vec<Post>> {
        let path = self.paths.posts.clone();
        let records = blocking(move || read_json_array(&path)).await?;

        Ok(records
            .into_iter()
            .filter_map(|v| match serde_json::from_value::<Post>(v) {
                Ok(p) => Some(p),
                Err(e) => {
                    tracing::debug!("Skipping unrecognised post record: {}", e);
                    None
                }
            })
            .collect())
    }
}

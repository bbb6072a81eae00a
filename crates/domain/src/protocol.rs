//! 博客 API 的线上格式：`{code, data}` 信封，以及对 id / 时间戳的宽松解析。

use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub struct ApiEnvelope<T> {
    pub code: i64,
    #[serde(default = "Option::default")]
    pub data: Option<T>,
    #[serde(default, alias = "msg")]
    pub message: Option<String>,
}

impl<T> ApiEnvelope<T> {
    /// `code != 0` 视为业务失败
    pub fn into_result(self) -> Result<Option<T>> {
        if self.code != 0 {
            return Err(Error::Transport(format!(
                "api returned code {}: {}",
                self.code,
                self.message.unwrap_or_default()
            )));
        }
        Ok(self.data)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplyPayload {
    pub post_id: Option<String>,
    pub parent_id: String,
    pub author: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RemotePostPayload {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct RemotePostRecord {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub id: Option<String>,
}

fn value_to_string(v: Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(deserializer)?;
    value_to_string(v).ok_or_else(|| serde::de::Error::custom("expected string or number"))
}

pub fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<Value>::deserialize(deserializer)?;
    Ok(v.and_then(value_to_string))
}

/// 接受 unix 秒、RFC 3339（含 `Z`）或无时区的 ISO 时间（按 UTC）。解析不了就是 `None`。
pub fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<Value>::deserialize(deserializer)?;
    Ok(match v {
        Some(Value::Number(n)) => n.as_i64().and_then(|s| DateTime::from_timestamp(s, 0)),
        Some(Value::String(s)) => parse_utc(&s),
        _ => None,
    })
}

fn parse_utc(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|n| n.and_utc())
}

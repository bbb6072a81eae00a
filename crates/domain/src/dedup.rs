use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupEntry {
    #[serde(with = "chrono::serde::ts_seconds")]
    pub answered_at: DateTime<Utc>,
    /// 秒
    pub ttl: i64,
}

impl DedupEntry {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.answered_at) < Duration::seconds(self.ttl)
    }
}

/// 回复任务的持久化状态：检查点 + 已回复记录
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplyState {
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub last_checkpoint: Option<DateTime<Utc>>,
    #[serde(default)]
    pub answered: HashMap<String, DedupEntry>,
}

/// 带 TTL 的已回复评论集合。过期在读取时判定，写入时顺带压缩
#[derive(Debug, Clone)]
pub struct DedupCache {
    entries: HashMap<String, DedupEntry>,
    ttl_secs: i64,
    capacity: usize,
}

impl DedupCache {
    pub fn new(ttl_secs: i64, capacity: usize) -> Self {
        Self::from_entries(HashMap::new(), ttl_secs, capacity)
    }

    pub fn from_entries(entries: HashMap<String, DedupEntry>, ttl_secs: i64, capacity: usize) -> Self {
        Self {
            entries,
            ttl_secs: ttl_secs.max(0),
            capacity: capacity.max(1),
        }
    }

    pub fn has_answered(&self, comment_id: &str, now: DateTime<Utc>) -> bool {
        self.entries
            .get(comment_id)
            .map(|e| e.is_live(now))
            .unwrap_or(false)
    }

    pub fn mark_answered(&mut self, comment_id: &str, now: DateTime<Utc>) {
        self.entries.insert(
            comment_id.to_string(),
            DedupEntry {
                answered_at: now,
                ttl: self.ttl_secs,
            },
        );
        self.compact(now);
    }

    /// 只删除过期条目。容量只是提示值，未过期的记录一律保留
    pub fn compact(&mut self, now: DateTime<Utc>) {
        self.entries.retain(|_, e| e.is_live(now));
    }

    pub fn over_capacity(&self) -> bool {
        self.entries.len() > self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &HashMap<String, DedupEntry> {
        &self.entries
    }

    pub fn into_entries(self) -> HashMap<String, DedupEntry> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn ttl_boundary() {
        let mut cache = DedupCache::new(60, 100);
        cache.mark_answered("c1", t0());

        assert!(cache.has_answered("c1", t0()));
        assert!(cache.has_answered("c1", t0() + Duration::seconds(59)));
        assert!(!cache.has_answered("c1", t0() + Duration::seconds(60)));
        assert!(!cache.has_answered("c1", t0() + Duration::milliseconds(60_001)));
        assert!(!cache.has_answered("c2", t0()));
    }

    #[test]
    fn expired_entry_can_be_marked_again() {
        let mut cache = DedupCache::new(10, 100);
        cache.mark_answered("c1", t0());
        let later = t0() + Duration::seconds(30);
        assert!(!cache.has_answered("c1", later));

        cache.mark_answered("c1", later);
        assert!(cache.has_answered("c1", later + Duration::seconds(5)));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn live_entries_survive_over_capacity_inserts() {
        let mut cache = DedupCache::new(100, 2);
        cache.mark_answered("a", t0());
        cache.mark_answered("b", t0());
        cache.mark_answered("c", t0());

        assert_eq!(cache.len(), 3);
        assert!(cache.over_capacity());
        for id in ["a", "b", "c"] {
            assert!(cache.has_answered(id, t0() + Duration::seconds(99)));
        }

        // 过期后才会被压缩掉
        cache.mark_answered("d", t0() + Duration::seconds(100));
        assert_eq!(cache.entries().keys().collect::<Vec<_>>(), vec!["d"]);
        assert!(!cache.over_capacity());
    }

    #[test]
    fn entry_keeps_its_own_ttl() {
        let mut entries = HashMap::new();
        entries.insert(
            "c1".to_string(),
            DedupEntry {
                answered_at: t0(),
                ttl: 1000,
            },
        );
        let cache = DedupCache::from_entries(entries, 10, 100);
        assert!(cache.has_answered("c1", t0() + Duration::seconds(500)));
    }

    #[test]
    fn reply_state_file_shape() {
        let json = serde_json::json!({
            "last_checkpoint": 1_700_000_000,
            "answered": {"c1": {"answered_at": 1_700_000_100, "ttl": 86400}}
        });
        let state: ReplyState = serde_json::from_value(json).unwrap();
        assert_eq!(state.last_checkpoint, Some(t0()));
        assert_eq!(state.answered["c1"].ttl, 86400);

        let empty: ReplyState = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(empty.last_checkpoint.is_none());
    }
}

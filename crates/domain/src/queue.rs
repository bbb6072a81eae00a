//! 定时发布队列的出队规划。只做选择，不碰文件。

use crate::clock::Zone;
use crate::error::{Error, Result};
use crate::models::QueueEntry;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// 解析 `publish_at`。带偏移的按其偏移，不带的按调度时区
pub fn parse_publish_at(raw: &str, zone: Zone) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%:z") {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return zone.localize(naive);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .and_then(|naive| zone.localize(naive))
}

impl QueueEntry {
    pub fn from_value(value: &Value) -> Result<Self> {
        let entry: QueueEntry = serde_json::from_value(value.clone())
            .map_err(|e| Error::Validation(format!("malformed queue entry: {}", e)))?;
        if entry.title.trim().is_empty() || entry.content.trim().is_empty() {
            return Err(Error::Validation(
                "queue entry has empty title or content".to_string(),
            ));
        }
        Ok(entry)
    }

    /// `None` 表示立即到期
    pub fn publish_time(&self, zone: Zone) -> Option<DateTime<Utc>> {
        self.publish_at
            .as_deref()
            .and_then(|raw| parse_publish_at(raw, zone))
    }

    pub fn is_due(&self, now: DateTime<Utc>, zone: Zone) -> bool {
        self.publish_time(zone).map(|at| at <= now).unwrap_or(true)
    }
}

#[derive(Debug, Default)]
pub struct QueuePlan {
    /// 本轮要发布的条目（原队列下标, 条目），已按发布时间升序
    pub selected: Vec<(usize, QueueEntry)>,
    /// 已到期但超出本轮上限，留到下一轮
    pub deferred: usize,
    pub not_yet_due: usize,
    /// 坏条目原样留在队列里
    pub malformed: Vec<(usize, Error)>,
}

/// 划分到期/未到期，到期的按 `publish_at` 升序（缺失视为最早，相同时保持插入顺序），取前 `max_per_run` 条
pub fn plan_run(items: &[Value], now: DateTime<Utc>, zone: Zone, max_per_run: usize) -> QueuePlan {
    let mut plan = QueuePlan::default();
    let mut due: Vec<(Option<DateTime<Utc>>, usize, QueueEntry)> = Vec::new();

    for (idx, raw) in items.iter().enumerate() {
        match QueueEntry::from_value(raw) {
            Ok(entry) => {
                let at = entry.publish_time(zone);
                match at {
                    Some(t) if t > now => plan.not_yet_due += 1,
                    _ => due.push((at, idx, entry)),
                }
            }
            Err(e) => plan.malformed.push((idx, e)),
        }
    }

    // sort_by_key 是稳定排序
    due.sort_by_key(|(at, _, _)| *at);

    let cap = max_per_run.max(1);
    plan.deferred = due.len().saturating_sub(cap);
    plan.selected = due
        .into_iter()
        .take(cap)
        .map(|(_, idx, entry)| (idx, entry))
        .collect();
    plan
}

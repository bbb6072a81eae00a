use crate::json::{read_json, write_json_atomic};
use crate::{blocking, Store};
use chrono::NaiveDate;
use domain::Result;
use std::collections::BTreeMap;
use tracing::warn;

const DATE_FMT: &str = "%Y-%m-%d";

impl Store {
    /// 每日任务最后一次成功执行的日期 {task_id: date}
    pub async fn load_task_status(&self) -> Result<BTreeMap<String, NaiveDate>> {
        let _guard = self.status_lock.lock().await;
        let path = self.paths.task_status.clone();
        let raw = match blocking(move || read_json::<BTreeMap<String, String>>(&path)).await {
            Ok(raw) => raw.unwrap_or_default(),
            Err(e) => {
                // 状态文件损坏最多导致某个任务当天多跑一次
                warn!("Ignoring unreadable schedule status: {}", e);
                BTreeMap::new()
            }
        };

        Ok(raw
            .into_iter()
            .filter_map(|(id, date)| NaiveDate::parse_from_str(&date, DATE_FMT).ok().map(|d| (id, d)))
            .collect())
    }

    pub async fn mark_task_run(&self, task_id: &str, date: NaiveDate) -> Result<()> {
        let _guard = self.status_lock.lock().await;
        let path = self.paths.task_status.clone();
        let task_id = task_id.to_string();

        blocking(move || {
            let mut raw = read_json::<BTreeMap<String, String>>(&path)
                .ok()
                .flatten()
                .unwrap_or_default();
            raw.insert(task_id, date.format(DATE_FMT).to_string());
            write_json_atomic(&path, &raw)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use crate::{Store, StorePaths};
    use chrono::NaiveDate;

    #[tokio::test]
    async fn records_last_run_date_per_task() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(StorePaths::in_dir(dir.path())).unwrap();
        let d1 = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2024, 5, 2).unwrap();

        store.mark_task_run("a", d1).await.unwrap();
        store.mark_task_run("b", d1).await.unwrap();
        store.mark_task_run("a", d2).await.unwrap();

        let status = store.load_task_status().await.unwrap();
        assert_eq!(status.get("a"), Some(&d2));
        assert_eq!(status.get("b"), Some(&d1));
    }

    #[tokio::test]
    async fn corrupt_status_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let paths = StorePaths::in_dir(dir.path());
        std::fs::write(&paths.task_status, "{oops").unwrap();
        let store = Store::new(paths).unwrap();
        assert!(store.load_task_status().await.unwrap().is_empty());

        let d = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        store.mark_task_run("a", d).await.unwrap();
        assert_eq!(store.load_task_status().await.unwrap().len(), 1);
    }
}

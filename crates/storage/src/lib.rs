use domain::{Error, Result};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::sync::Mutex;

mod json;
mod repo;

/// 各数据集的文件位置
#[derive(Debug, Clone)]
pub struct StorePaths {
    pub posts: PathBuf,
    pub queue: PathBuf,
    pub reply_state: PathBuf,
    pub held_replies: PathBuf,
    pub task_status: PathBuf,
}

impl StorePaths {
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            posts: dir.join("posts.json"),
            queue: dir.join("scheduled_posts.json"),
            reply_state: dir.join("reply_state.json"),
            held_replies: dir.join("held_replies.json"),
            task_status: dir.join("schedule_status.json"),
        }
    }

    fn all(&self) -> [&PathBuf; 5] {
        [
            &self.posts,
            &self.queue,
            &self.reply_state,
            &self.held_replies,
            &self.task_status,
        ]
    }
}

/// JSON 状态仓库。唯一有写文件权限的组件，每个数据集一把锁，写入一律临时文件 + 替换
#[derive(Clone)]
pub struct Store {
    pub(crate) paths: Arc<StorePaths>,
    pub(crate) posts_lock: Arc<Mutex<()>>,
    pub(crate) queue_lock: Arc<Mutex<()>>,
    pub(crate) reply_lock: Arc<Mutex<()>>,
    pub(crate) review_lock: Arc<Mutex<()>>,
    pub(crate) status_lock: Arc<Mutex<()>>,
}

impl Store {
    pub fn new(paths: StorePaths) -> Result<Self> {
        for path in paths.all() {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    fs::create_dir_all(parent).map_err(|e| {
                        Error::Persistence(format!("create {}: {}", parent.display(), e))
                    })?;
                }
            }
        }
        tracing::debug!("State store ready: {:?}", paths);

        Ok(Self {
            paths: Arc::new(paths),
            posts_lock: Arc::new(Mutex::new(())),
            queue_lock: Arc::new(Mutex::new(())),
            reply_lock: Arc::new(Mutex::new(())),
            review_lock: Arc::new(Mutex::new(())),
            status_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }
}

/// 文件 IO 挪到阻塞线程池
pub(crate) async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Persistence(format!("blocking task failed: {}", e)))?
}

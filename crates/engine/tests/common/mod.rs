#![allow(dead_code)]

use adapter::{CommentSource, TextGenerator};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{Comment, Error, Result};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use storage::{Store, StorePaths};
use tempfile::TempDir;

pub fn at(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

pub fn temp_store() -> (TempDir, Store) {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::new(StorePaths::in_dir(dir.path())).unwrap();
    (dir, store)
}

pub fn comment(id: &str, body: &str, author: &str) -> Comment {
    Comment {
        id: id.into(),
        body: body.into(),
        author: author.into(),
        created_at: None,
        post_id: Some("1".into()),
        post_title: "Hello world".into(),
        post_summary: "A first post".into(),
    }
}

#[derive(Default)]
pub struct FakeSource {
    pub pending: Mutex<Vec<Comment>>,
    pub fail_fetch: AtomicBool,
    pub fail_submit: AtomicBool,
    pub since_seen: Mutex<Vec<DateTime<Utc>>>,
    pub submitted: Mutex<Vec<(String, String)>>,
}

impl FakeSource {
    pub fn with(comments: Vec<Comment>) -> Self {
        let source = Self::default();
        *source.pending.lock().unwrap() = comments;
        source
    }

    pub fn set_pending(&self, comments: Vec<Comment>) {
        *self.pending.lock().unwrap() = comments;
    }

    pub fn submitted(&self) -> Vec<(String, String)> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommentSource for FakeSource {
    async fn fetch_pending(&self, since: DateTime<Utc>) -> Result<Vec<Comment>> {
        self.since_seen.lock().unwrap().push(since);
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(Error::Transport("connection refused".into()));
        }
        Ok(self.pending.lock().unwrap().clone())
    }

    async fn submit_reply(&self, comment: &Comment, reply: &str) -> Result<()> {
        if self.fail_submit.load(Ordering::SeqCst) {
            return Err(Error::Transport("503".into()));
        }
        self.submitted
            .lock()
            .unwrap()
            .push((comment.id.clone(), reply.to_string()));
        Ok(())
    }
}

/// `reply` 为 `None` 时生成失败
pub struct FakeGenerator {
    pub reply: Mutex<Option<String>>,
    pub calls: AtomicUsize,
    pub prompts: Mutex<Vec<String>>,
}

impl FakeGenerator {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Mutex::new(Some(text.to_string())),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: Mutex::new(None),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn set_reply(&self, text: Option<&str>) {
        *self.reply.lock().unwrap() = text.map(str::to_string);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.reply
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| Error::Generation("model unavailable".into()))
    }
}

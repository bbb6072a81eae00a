mod common;

use adapter::StaticPolicyProvider;
use chrono::NaiveDate;
use common::{at, temp_store, FakeGenerator};
use domain::{Error, NewPost, PostSource, Zone};
use engine::{DailyTasks, Publisher, QueueProcessor, TaskKind, TaskSpec, TopicWriter};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use storage::{Store, StorePaths};
use tokio::sync::broadcast;

fn processor(store: &Store, max_per_run: usize) -> QueueProcessor {
    let (tx, _rx) = broadcast::channel(64);
    let publisher = Arc::new(Publisher::new(store.clone(), Zone::utc(), tx));
    QueueProcessor::new(store.clone(), publisher, Zone::utc(), max_per_run, "bot")
}

fn entry(title: &str, publish_at: Option<&str>) -> Value {
    match publish_at {
        Some(t) => json!({"title": title, "content": format!("{title} body"), "publish_at": t}),
        None => json!({"title": title, "content": format!("{title} body")}),
    }
}

fn titles(values: &[Value]) -> Vec<String> {
    values
        .iter()
        .map(|v| v["title"].as_str().unwrap_or_default().to_string())
        .collect()
}

#[tokio::test]
async fn publishes_at_most_the_cap_in_publish_at_order() {
    let (_dir, store) = temp_store();
    // hours 09,03,07,01,05,... all before noon
    let items: Vec<Value> = [9, 3, 7, 1, 5, 2, 8, 4, 6, 10]
        .iter()
        .map(|h| entry(&format!("p{h:02}"), Some(&format!("2024-05-01T{h:02}:00:00Z"))))
        .collect();
    store.save_queue(items).await.unwrap();

    let report = processor(&store, 3)
        .run_at(at("2024-05-01T12:00:00Z"))
        .await
        .unwrap();

    let published: Vec<&str> = report.published.iter().map(|p| p.title.as_str()).collect();
    assert_eq!(published, vec!["p01", "p02", "p03"]);
    assert_eq!(report.deferred, 7);

    let posts = store.list_posts().await.unwrap();
    assert_eq!(posts.iter().map(|p| p.id).collect::<Vec<_>>(), vec![1, 2, 3]);
    assert!(posts.iter().all(|p| p.source == PostSource::Schedule));

    let left = store.load_queue().await.unwrap();
    assert_eq!(left.len(), 7);
    assert_eq!(
        titles(&left),
        vec!["p09", "p07", "p05", "p08", "p04", "p06", "p10"]
    );
}

#[tokio::test]
async fn missing_or_unparsable_publish_at_goes_first() {
    let (_dir, store) = temp_store();
    store
        .save_queue(vec![
            entry("dated", Some("2024-05-01T08:00:00Z")),
            entry("garbage", Some("next tuesday")),
            entry("undated", None),
            entry("future", Some("2024-05-02T08:00:00Z")),
        ])
        .await
        .unwrap();

    let report = processor(&store, 2)
        .run_at(at("2024-05-01T12:00:00Z"))
        .await
        .unwrap();

    let published: Vec<&str> = report.published.iter().map(|p| p.title.as_str()).collect();
    assert_eq!(published, vec!["garbage", "undated"]);
    assert_eq!(report.not_yet_due, 1);
    assert_eq!(titles(&store.load_queue().await.unwrap()), vec!["dated", "future"]);
}

#[tokio::test]
async fn crash_between_append_and_queue_write_duplicates_but_never_loses() {
    let (_dir, store) = temp_store();
    store.save_queue(vec![entry("only", None)]).await.unwrap();

    // first run died right after the append
    store
        .append_post(
            NewPost {
                title: "only".into(),
                content: "only body".into(),
                author: "bot".into(),
                source: PostSource::Schedule,
            },
            at("2024-05-01T12:00:00Z").fixed_offset(),
        )
        .await
        .unwrap();
    assert_eq!(store.load_queue().await.unwrap().len(), 1);

    processor(&store, 1)
        .run_at(at("2024-05-01T12:01:00Z"))
        .await
        .unwrap();

    let posts = store.list_posts().await.unwrap();
    assert_eq!(posts.len(), 2);
    assert!(posts.iter().all(|p| p.title == "only"));
    assert!(store.load_queue().await.unwrap().is_empty());
}

#[tokio::test]
async fn failed_append_leaves_queue_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let mut paths = StorePaths::in_dir(dir.path());
    paths.posts = dir.path().join("posts_dir");
    std::fs::create_dir(&paths.posts).unwrap();
    let store = Store::new(paths).unwrap();

    let queue = vec![entry("a", None), entry("b", None)];
    store.save_queue(queue.clone()).await.unwrap();

    let err = processor(&store, 5)
        .run_at(at("2024-05-01T12:00:00Z"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Persistence(_)));
    assert_eq!(store.load_queue().await.unwrap(), queue);
}

#[tokio::test]
async fn malformed_entries_stay_in_the_queue() {
    let (_dir, store) = temp_store();
    let junk = json!("just a string");
    let empty = json!({"title": "", "content": "x"});
    store
        .save_queue(vec![junk.clone(), entry("ok", None), empty.clone()])
        .await
        .unwrap();

    let report = processor(&store, 5)
        .run_at(at("2024-05-01T12:00:00Z"))
        .await
        .unwrap();

    assert_eq!(report.published.len(), 1);
    assert_eq!(report.malformed, 2);
    assert_eq!(store.load_queue().await.unwrap(), vec![junk, empty]);
}

#[tokio::test]
async fn naive_publish_at_uses_the_schedule_zone() {
    let (_dir, store) = temp_store();
    store
        .save_queue(vec![entry("evening", Some("2024-05-01 20:00"))])
        .await
        .unwrap();
    let (tx, _rx) = broadcast::channel(4);
    let zone: Zone = "+08:00".parse().unwrap();
    let publisher = Arc::new(Publisher::new(store.clone(), zone, tx));
    let processor = QueueProcessor::new(store.clone(), publisher, zone, 1, "bot");

    // 20:00 +08:00 == 12:00Z
    let early = processor.run_at(at("2024-05-01T11:59:00Z")).await.unwrap();
    assert!(early.published.is_empty());

    let on_time = processor.run_at(at("2024-05-01T12:00:00Z")).await.unwrap();
    assert_eq!(on_time.published.len(), 1);
    assert_eq!(
        on_time.published[0].published_at.to_rfc3339(),
        "2024-05-01T20:00:00+08:00"
    );
}

#[tokio::test]
async fn daily_queue_task_runs_once_per_day() {
    let (_dir, store) = temp_store();
    store
        .save_queue(vec![entry("a", None), entry("b", None)])
        .await
        .unwrap();
    let task = TaskSpec {
        time: "10:00".into(),
        kind: TaskKind::Queue,
        topic: None,
    };
    let daily = DailyTasks::new(
        store.clone(),
        vec![task.clone()],
        Zone::utc(),
        Arc::new(processor(&store, 1)),
        None,
    );

    let early = daily.run_due_at(at("2024-05-01T09:59:00Z")).await.unwrap();
    assert!(early.ran.is_empty());

    let first = daily.run_due_at(at("2024-05-01T10:00:00Z")).await.unwrap();
    assert_eq!(first.published, 1);
    let status = store.load_task_status().await.unwrap();
    assert_eq!(status.get(&task.id()), NaiveDate::from_ymd_opt(2024, 5, 1).as_ref());

    let again = daily.run_due_at(at("2024-05-01T18:00:00Z")).await.unwrap();
    assert!(again.ran.is_empty());
    assert_eq!(store.load_queue().await.unwrap().len(), 1);

    let tomorrow = daily.run_due_at(at("2024-05-02T10:30:00Z")).await.unwrap();
    assert_eq!(tomorrow.published, 1);
}

#[tokio::test]
async fn topic_task_publishes_generated_post() {
    let (_dir, store) = temp_store();
    let (tx, _rx) = broadcast::channel(4);
    let publisher = Arc::new(Publisher::new(store.clone(), Zone::utc(), tx));
    let generator = Arc::new(FakeGenerator::replying(
        "Title: Puddles\nBody: It rained all day.\nThe cat stayed in.",
    ));
    let writer = TopicWriter::new(
        generator.clone(),
        Arc::new(StaticPolicyProvider::default()),
        publisher.clone(),
        Zone::utc(),
        300,
        Duration::from_secs(5),
        "bot",
    );
    let task = TaskSpec {
        time: "08:00".into(),
        kind: TaskKind::Topic,
        topic: Some("rain".into()),
    };
    let daily = DailyTasks::new(
        store.clone(),
        vec![task.clone()],
        Zone::utc(),
        Arc::new(QueueProcessor::new(store.clone(), publisher, Zone::utc(), 1, "bot")),
        Some(writer),
    );

    let report = daily.run_due_at(at("2024-05-01T08:00:00Z")).await.unwrap();
    assert_eq!(report.published, 1);

    let posts = store.list_posts().await.unwrap();
    assert_eq!(posts[0].title, "Puddles");
    assert_eq!(posts[0].content, "It rained all day.\nThe cat stayed in.");
    assert!(generator.prompts.lock().unwrap()[0].contains("\"rain\""));
}

#[tokio::test]
async fn failed_topic_task_is_not_recorded() {
    let (_dir, store) = temp_store();
    let (tx, _rx) = broadcast::channel(4);
    let publisher = Arc::new(Publisher::new(store.clone(), Zone::utc(), tx));
    let writer = TopicWriter::new(
        Arc::new(FakeGenerator::failing()),
        Arc::new(StaticPolicyProvider::default()),
        publisher.clone(),
        Zone::utc(),
        300,
        Duration::from_secs(5),
        "bot",
    );
    let daily = DailyTasks::new(
        store.clone(),
        vec![TaskSpec {
            time: "08:00".into(),
            kind: TaskKind::Topic,
            topic: Some("rain".into()),
        }],
        Zone::utc(),
        Arc::new(QueueProcessor::new(store.clone(), publisher, Zone::utc(), 1, "bot")),
        Some(writer),
    );

    let report = daily.run_due_at(at("2024-05-01T09:00:00Z")).await.unwrap();

    assert_eq!(report.failed.len(), 1);
    assert!(store.load_task_status().await.unwrap().is_empty());
    assert!(store.list_posts().await.unwrap().is_empty());
}

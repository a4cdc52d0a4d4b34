//! Shared helpers for DB-backed integration tests
//!
//! All tests here require a reachable PostgreSQL instance via DATABASE_URL
//! and are `#[ignore]`d so the default test run stays hermetic.

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio::sync::Mutex;

use colloquy_common::TableConfig;
use colloquy_conversations::{ConversationsRepositories, ConverseEvent, EventSink};

/// Event sink that records everything it receives, in publish order.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ConverseEvent>>,
}

impl RecordingSink {
    pub async fn events(&self) -> Vec<ConverseEvent> {
        self.events.lock().await.clone()
    }

    pub async fn event_names(&self) -> Vec<&'static str> {
        self.events
            .lock()
            .await
            .iter()
            .map(ConverseEvent::event_name)
            .collect()
    }

    pub async fn clear(&self) {
        self.events.lock().await.clear();
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn publish(&self, event: ConverseEvent) {
        self.events.lock().await.push(event);
    }
}

pub struct TestApp {
    pub pool: PgPool,
    pub repos: ConversationsRepositories,
    pub sink: Arc<RecordingSink>,
}

impl TestApp {
    pub async fn new() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let url = std::env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL is required for integration tests"))?;

        let pool = PgPoolOptions::new()
            .max_connections(8)
            .connect(&url)
            .await?;
        sqlx::migrate!("../../migrations").run(&pool).await?;

        let sink = Arc::new(RecordingSink::default());
        let repos =
            ConversationsRepositories::new(pool.clone(), TableConfig::default(), sink.clone());

        Ok(Self { pool, repos, sink })
    }
}

//! Configuration management following 12-factor app principles
//!
//! Runtime configuration is loaded from environment variables. Table names
//! are an explicit struct handed to the storage layer at construction time,
//! never global state.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;

/// Table names used by the storage layer.
///
/// Defaults match the shipped migrations; override when the tables would
/// conflict with existing ones in the host application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableConfig {
    pub conversations: String,
    pub messages: String,
    pub message_chunks: String,
    pub message_attachments: String,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            conversations: "conversations".to_string(),
            messages: "messages".to_string(),
            message_chunks: "message_chunks".to_string(),
            message_attachments: "message_attachments".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Database connection URL (PostgreSQL)
    pub database_url: String,

    /// Days to keep soft-deleted conversations before pruning.
    /// `None` disables automatic pruning.
    pub prune_after_days: Option<u32>,

    /// Runtime configuration
    pub log_level: String,

    /// Storage table names
    pub tables: TableConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if it exists

        let config = Self {
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL is required"))?,

            prune_after_days: match env::var("COLLOQUY_PRUNE_DAYS") {
                Ok(days) => Some(
                    days.parse()
                        .map_err(|_| anyhow::anyhow!("COLLOQUY_PRUNE_DAYS must be an integer"))?,
                ),
                Err(_) => None,
            },

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            tables: TableConfig::default(),
        };

        Ok(config)
    }
}

//! System monitoring: health/metrics snapshots and the log pipeline.
//!
//! Log entries are routed to per-category files (`logs/app.log`,
//! `logs/access.log`, `logs/error.log`, `logs/{management,frontend}/YYYYMMDD.log`)
//! and, for client-submitted entries, mirrored into the `system_logs` table.

use std::{
    path::{Path, PathBuf},
    time::Instant,
};

use chrono::{DateTime, NaiveDate, Utc};
use db::models::system_log::{CreateSystemLog, LogLevel, LogSource, SystemLog};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use strum_macros::{Display, EnumString};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::warn;
use ts_rs::TS;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("log file error: {0}")]
    File(#[from] std::io::Error),
    #[error("invalid log payload: {0}")]
    Validation(String),
}

/// File log categories and their on-disk layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display, TS)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LogCategory {
    App,
    Access,
    Error,
    Management,
    Frontend,
}

impl LogCategory {
    /// Path of the category's log file, relative to the logs root.
    /// The flat categories share one file; client categories get one
    /// file per day.
    pub fn relative_path(self, date: NaiveDate) -> PathBuf {
        match self {
            Self::App => PathBuf::from("app.log"),
            Self::Access => PathBuf::from("access.log"),
            Self::Error => PathBuf::from("error.log"),
            Self::Management => {
                PathBuf::from("management").join(format!("{}.log", date.format("%Y%m%d")))
            }
            Self::Frontend => {
                PathBuf::from("frontend").join(format!("{}.log", date.format("%Y%m%d")))
            }
        }
    }
}

impl From<LogSource> for LogCategory {
    fn from(source: LogSource) -> Self {
        match source {
            LogSource::Frontend => Self::Frontend,
            LogSource::Management => Self::Management,
        }
    }
}

/// Appends JSON lines to category-routed log files.
#[derive(Debug, Clone)]
pub struct LogRouter {
    root: PathBuf,
}

impl LogRouter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, category: LogCategory, date: NaiveDate) -> PathBuf {
        self.root.join(category.relative_path(date))
    }

    /// Append one JSON line to the category's file for today.
    pub async fn append<T: Serialize>(
        &self,
        category: LogCategory,
        entry: &T,
    ) -> Result<(), MonitorError> {
        let path = self.path_for(category, Utc::now().date_naive());
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut line = serde_json::to_string(entry)
            .map_err(|e| MonitorError::Validation(e.to_string()))?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(line.as_bytes()).await?;

        Ok(())
    }

    /// Append without surfacing failures to the caller. Log writes are
    /// fire-and-forget from the request handler's perspective.
    pub async fn append_best_effort<T: Serialize>(&self, category: LogCategory, entry: &T) {
        if let Err(e) = self.append(category, entry).await {
            warn!(category = %category, error = %e, "file log append failed");
        }
    }

    /// Last `limit` lines of the category's file for the given date.
    pub async fn tail(
        &self,
        category: LogCategory,
        date: NaiveDate,
        limit: usize,
    ) -> Result<Vec<String>, MonitorError> {
        let path = self.path_for(category, date);
        if !Path::new(&path).exists() {
            return Ok(Vec::new());
        }

        let content = tokio::fs::read_to_string(&path).await?;
        let lines: Vec<&str> = content.lines().collect();
        let start = lines.len().saturating_sub(limit);
        Ok(lines[start..].iter().map(|s| s.to_string()).collect())
    }
}

/// Client log submission from the React apps
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct LogIngestRequest {
    pub source: LogSource,
    #[serde(default = "default_log_type")]
    pub log_type: String,
    #[serde(default = "default_level")]
    pub level: LogLevel,
    pub message: String,
    pub context: Option<serde_json::Value>,
    pub route: Option<String>,
    pub user_id: Option<String>,
}

fn default_log_type() -> String {
    "log".to_string()
}

fn default_level() -> LogLevel {
    LogLevel::Info
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogQuery {
    pub source: Option<LogSource>,
    pub level: Option<LogLevel>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct HealthSnapshot {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub os: String,
    pub os_version: String,
    pub arch: String,
    pub pid: u32,
    pub uptime_seconds: u64,
    pub database_ok: bool,
    pub system_log_count: i64,
}

const DEFAULT_QUERY_LIMIT: i64 = 100;
const MAX_QUERY_LIMIT: i64 = 1000;

pub struct MonitorService;

impl MonitorService {
    /// Ingest a client log entry: append to the per-source file, then
    /// best-effort insert into `system_logs`. A DB failure does not
    /// fail the request once the payload validated.
    pub async fn ingest(
        pool: &SqlitePool,
        router: &LogRouter,
        request: LogIngestRequest,
        ip: Option<String>,
        user_agent: Option<String>,
    ) -> Result<(), MonitorError> {
        if request.message.trim().is_empty() {
            return Err(MonitorError::Validation("message must not be blank".into()));
        }

        router
            .append_best_effort(LogCategory::from(request.source), &request)
            .await;

        let record = CreateSystemLog {
            source: request.source,
            log_type: request.log_type,
            level: request.level,
            message: request.message,
            context: request.context.map(|v| v.to_string()),
            route: request.route,
            user_id: request.user_id,
            ip,
            user_agent,
        };

        if let Err(e) = SystemLog::create(pool, &record).await {
            warn!(error = %e, "system log insert failed");
        }

        Ok(())
    }

    pub async fn query_logs(
        pool: &SqlitePool,
        query: LogQuery,
    ) -> Result<Vec<SystemLog>, MonitorError> {
        let limit = query
            .limit
            .unwrap_or(DEFAULT_QUERY_LIMIT)
            .clamp(1, MAX_QUERY_LIMIT);

        Ok(SystemLog::find_filtered(
            pool,
            query.source,
            query.level,
            query.since,
            query.until,
            limit,
        )
        .await?)
    }

    pub fn health(started_at: Instant) -> HealthSnapshot {
        HealthSnapshot {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: started_at.elapsed().as_secs(),
        }
    }

    pub async fn metrics(
        pool: &SqlitePool,
        started_at: Instant,
    ) -> Result<MetricsSnapshot, MonitorError> {
        let info = os_info::get();

        let database_ok = sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(pool)
            .await
            .is_ok();

        let system_log_count = SystemLog::count(pool).await.unwrap_or(0);

        Ok(MetricsSnapshot {
            os: info.os_type().to_string(),
            os_version: info.version().to_string(),
            arch: info.architecture().unwrap_or("unknown").to_string(),
            pid: std::process::id(),
            uptime_seconds: started_at.elapsed().as_secs(),
            database_ok,
            system_log_count,
        })
    }
}

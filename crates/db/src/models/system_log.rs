use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

/// Which client app produced the log entry
#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, TS, EnumString, Display)]
#[sqlx(type_name = "log_source", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LogSource {
    Frontend,
    Management,
}

#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, TS, EnumString, Display)]
#[sqlx(type_name = "log_level", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct SystemLog {
    pub id: Uuid,
    pub source: LogSource,
    pub log_type: String,
    pub level: LogLevel,
    pub message: String,
    pub context: Option<String>,
    pub route: Option<String>,
    pub user_id: Option<String>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateSystemLog {
    pub source: LogSource,
    pub log_type: String,
    pub level: LogLevel,
    pub message: String,
    pub context: Option<String>,
    pub route: Option<String>,
    pub user_id: Option<String>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

const LOG_COLUMNS: &str =
    "id, source, log_type, level, message, context, route, user_id, ip, user_agent, created_at";

impl SystemLog {
    pub async fn create(pool: &SqlitePool, data: &CreateSystemLog) -> Result<Self, sqlx::Error> {
        let id = Uuid::new_v4();
        sqlx::query_as::<_, Self>(&format!(
            "INSERT INTO system_logs
                (id, source, log_type, level, message, context, route, user_id, ip, user_agent)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             RETURNING {LOG_COLUMNS}"
        ))
        .bind(id)
        .bind(data.source)
        .bind(&data.log_type)
        .bind(data.level)
        .bind(&data.message)
        .bind(&data.context)
        .bind(&data.route)
        .bind(&data.user_id)
        .bind(&data.ip)
        .bind(&data.user_agent)
        .fetch_one(pool)
        .await
    }

    pub async fn find_filtered(
        pool: &SqlitePool,
        source: Option<LogSource>,
        level: Option<LogLevel>,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(&format!(
            "SELECT {LOG_COLUMNS} FROM system_logs
             WHERE ($1 IS NULL OR source = $1)
               AND ($2 IS NULL OR level = $2)
               AND ($3 IS NULL OR created_at >= $3)
               AND ($4 IS NULL OR created_at <= $4)
             ORDER BY created_at DESC
             LIMIT $5"
        ))
        .bind(source)
        .bind(level)
        .bind(since)
        .bind(until)
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    pub async fn count(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM system_logs")
            .fetch_one(pool)
            .await
    }
}

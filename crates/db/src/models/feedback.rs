use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, Type, Serialize, Deserialize, PartialEq, TS, EnumString, Display)]
#[sqlx(type_name = "feedback_category", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FeedbackCategory {
    Suggestion,
    Bug,
    Other,
}

#[derive(Debug, Clone, Type, Serialize, Deserialize, PartialEq, TS, EnumString, Display)]
#[sqlx(type_name = "feedback_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FeedbackStatus {
    Pending,
    Viewed,
    Resolved,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub id: Uuid,
    pub title: Option<String>,
    pub content: String,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
    pub category: FeedbackCategory,
    pub status: FeedbackStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct CreateFeedback {
    pub title: Option<String>,
    pub content: String,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
    #[serde(default = "default_category")]
    pub category: FeedbackCategory,
}

fn default_category() -> FeedbackCategory {
    FeedbackCategory::Other
}

const FEEDBACK_COLUMNS: &str =
    "id, title, content, user_name, user_email, category, status, created_at, updated_at";

impl Feedback {
    pub async fn create(pool: &SqlitePool, data: &CreateFeedback) -> Result<Self, sqlx::Error> {
        let id = Uuid::new_v4();
        sqlx::query_as::<_, Self>(&format!(
            "INSERT INTO feedback (id, title, content, user_name, user_email, category)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {FEEDBACK_COLUMNS}"
        ))
        .bind(id)
        .bind(&data.title)
        .bind(&data.content)
        .bind(&data.user_name)
        .bind(&data.user_email)
        .bind(&data.category)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(&format!(
            "SELECT {FEEDBACK_COLUMNS} FROM feedback WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_filtered(
        pool: &SqlitePool,
        category: Option<FeedbackCategory>,
        status: Option<FeedbackStatus>,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(&format!(
            "SELECT {FEEDBACK_COLUMNS} FROM feedback
             WHERE ($1 IS NULL OR category = $1)
               AND ($2 IS NULL OR status = $2)
             ORDER BY created_at DESC
             LIMIT $3"
        ))
        .bind(category)
        .bind(status)
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    pub async fn update_status(
        pool: &SqlitePool,
        id: Uuid,
        status: FeedbackStatus,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(&format!(
            "UPDATE feedback SET status = $2, updated_at = datetime('now', 'subsec')
             WHERE id = $1
             RETURNING {FEEDBACK_COLUMNS}"
        ))
        .bind(id)
        .bind(status)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM feedback WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

//! Visitor feedback collection.

use db::models::feedback::{CreateFeedback, Feedback, FeedbackCategory, FeedbackStatus};
use serde::Deserialize;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum FeedbackError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("invalid feedback: {0}")]
    Validation(String),
    #[error("feedback not found: {0}")]
    NotFound(Uuid),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackQuery {
    pub category: Option<FeedbackCategory>,
    pub status: Option<FeedbackStatus>,
    pub limit: Option<i64>,
}

const DEFAULT_LIST_LIMIT: i64 = 50;
const MAX_LIST_LIMIT: i64 = 500;

pub struct FeedbackService;

impl FeedbackService {
    pub async fn submit(pool: &SqlitePool, data: CreateFeedback) -> Result<Feedback, FeedbackError> {
        if data.content.trim().is_empty() {
            return Err(FeedbackError::Validation("content must not be blank".into()));
        }
        if let Some(email) = &data.user_email {
            if !email.contains('@') {
                return Err(FeedbackError::Validation(format!(
                    "invalid email address: {email}"
                )));
            }
        }

        let feedback = Feedback::create(pool, &data).await?;
        info!(feedback_id = %feedback.id, category = %feedback.category, "feedback submitted");
        Ok(feedback)
    }

    pub async fn list(
        pool: &SqlitePool,
        query: FeedbackQuery,
    ) -> Result<Vec<Feedback>, FeedbackError> {
        let limit = query
            .limit
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .clamp(1, MAX_LIST_LIMIT);
        Ok(Feedback::find_filtered(pool, query.category, query.status, limit).await?)
    }

    pub async fn update_status(
        pool: &SqlitePool,
        id: Uuid,
        status: FeedbackStatus,
    ) -> Result<Feedback, FeedbackError> {
        Feedback::update_status(pool, id, status)
            .await?
            .ok_or(FeedbackError::NotFound(id))
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<(), FeedbackError> {
        let deleted = Feedback::delete(pool, id).await?;
        if deleted == 0 {
            return Err(FeedbackError::NotFound(id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(content: &str) -> CreateFeedback {
        CreateFeedback {
            title: None,
            content: content.to_string(),
            user_name: None,
            user_email: None,
            category: FeedbackCategory::Other,
        }
    }

    #[tokio::test]
    async fn submit_starts_pending() {
        let db = db::DBService::new_in_memory().await.unwrap();
        let feedback = FeedbackService::submit(&db.pool, submission("great article"))
            .await
            .unwrap();
        assert_eq!(feedback.status, FeedbackStatus::Pending);
    }

    #[tokio::test]
    async fn blank_content_is_rejected() {
        let db = db::DBService::new_in_memory().await.unwrap();
        let err = FeedbackService::submit(&db.pool, submission("  "))
            .await
            .unwrap_err();
        assert!(matches!(err, FeedbackError::Validation(_)));
    }

    #[tokio::test]
    async fn bad_email_is_rejected() {
        let db = db::DBService::new_in_memory().await.unwrap();
        let mut data = submission("hi");
        data.user_email = Some("not-an-email".to_string());
        let err = FeedbackService::submit(&db.pool, data).await.unwrap_err();
        assert!(matches!(err, FeedbackError::Validation(_)));
    }

    #[tokio::test]
    async fn list_filters_by_status() {
        let db = db::DBService::new_in_memory().await.unwrap();
        let pool = &db.pool;

        let first = FeedbackService::submit(pool, submission("one")).await.unwrap();
        FeedbackService::submit(pool, submission("two")).await.unwrap();

        FeedbackService::update_status(pool, first.id, FeedbackStatus::Resolved)
            .await
            .unwrap();

        let resolved = FeedbackService::list(
            pool,
            FeedbackQuery {
                category: None,
                status: Some(FeedbackStatus::Resolved),
                limit: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].id, first.id);
    }

    #[tokio::test]
    async fn delete_missing_is_not_found() {
        let db = db::DBService::new_in_memory().await.unwrap();
        let err = FeedbackService::delete(&db.pool, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, FeedbackError::NotFound(_)));
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

/// Kind of UI element a permission guards
#[derive(Debug, Clone, Type, Serialize, Deserialize, PartialEq, TS, EnumString, Display)]
#[sqlx(type_name = "permission_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PermissionType {
    Page,
    Button,
}

/// Permission row, self-referential tree via `parent_id`
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub permission_type: PermissionType,
    pub description: Option<String>,
    pub parent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct CreatePermission {
    pub name: String,
    pub code: String,
    #[serde(rename = "type", default = "default_permission_type")]
    pub permission_type: PermissionType,
    pub description: Option<String>,
    pub parent_id: Option<Uuid>,
}

fn default_permission_type() -> PermissionType {
    PermissionType::Page
}

#[derive(Debug, Clone, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePermission {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub permission_type: Option<PermissionType>,
    pub description: Option<String>,
    /// Omitted: keep the current parent. `null`: move to root.
    /// A value: reparent under it.
    #[serde(default, deserialize_with = "double_option")]
    pub parent_id: Option<Option<Uuid>>,
}

/// Distinguishes an omitted field (outer `None`) from an explicit JSON
/// `null` (`Some(None)`), which plain `Option<Option<T>>` cannot.
fn double_option<'de, D>(d: D) -> Result<Option<Option<Uuid>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::deserialize(d).map(Some)
}

const PERMISSION_COLUMNS: &str = r#"id, name, code, type, description, parent_id, created_at, updated_at"#;

impl Permission {
    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(&format!(
            "SELECT {PERMISSION_COLUMNS} FROM permissions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_code(pool: &SqlitePool, code: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(&format!(
            "SELECT {PERMISSION_COLUMNS} FROM permissions WHERE code = $1"
        ))
        .bind(code)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(&format!(
            "SELECT {PERMISSION_COLUMNS} FROM permissions ORDER BY code"
        ))
        .fetch_all(pool)
        .await
    }

    pub async fn create(pool: &SqlitePool, data: &CreatePermission) -> Result<Self, sqlx::Error> {
        let id = Uuid::new_v4();
        sqlx::query_as::<_, Self>(&format!(
            "INSERT INTO permissions (id, name, code, type, description, parent_id)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {PERMISSION_COLUMNS}"
        ))
        .bind(id)
        .bind(&data.name)
        .bind(&data.code)
        .bind(&data.permission_type)
        .bind(&data.description)
        .bind(data.parent_id)
        .fetch_one(pool)
        .await
    }

    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        data: &UpdatePermission,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(&format!(
            "UPDATE permissions SET
                name = COALESCE($2, name),
                type = COALESCE($3, type),
                description = COALESCE($4, description),
                parent_id = CASE WHEN $6 THEN $5 ELSE parent_id END,
                updated_at = datetime('now', 'subsec')
             WHERE id = $1
             RETURNING {PERMISSION_COLUMNS}"
        ))
        .bind(id)
        .bind(&data.name)
        .bind(&data.permission_type)
        .bind(&data.description)
        .bind(data.parent_id.flatten())
        .bind(data.parent_id.is_some())
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM permissions WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn count_children(pool: &SqlitePool, id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM permissions WHERE parent_id = $1")
            .bind(id)
            .fetch_one(pool)
            .await
    }

    /// Permission rows assigned to a role, via the join table.
    pub async fn find_by_role_id(pool: &SqlitePool, role_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            "SELECT p.id, p.name, p.code, p.type, p.description, p.parent_id, p.created_at, p.updated_at
             FROM permissions p
             JOIN role_permissions rp ON rp.permission_id = p.id
             WHERE rp.role_id = $1
             ORDER BY p.code",
        )
        .bind(role_id)
        .fetch_all(pool)
        .await
    }
}

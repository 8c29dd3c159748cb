use serde::Serialize;
use sqlx::{FromRow, PgPool};

use super::dto::{TaskPatch, TaskStatus};

/// Task record. `user_id` is written once at insert, always from the
/// authenticated caller, and every query below is scoped to it.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Task {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub status: TaskStatus,
}

impl Task {
    /// Tasks owned by `owner_id`, newest first, optionally filtered by status.
    pub async fn list_by_owner(
        db: &PgPool,
        owner_id: i64,
        status: Option<TaskStatus>,
    ) -> sqlx::Result<Vec<Task>> {
        match status {
            Some(status) => {
                sqlx::query_as::<_, Task>(
                    r#"
                    SELECT id, user_id, title, status
                    FROM tasks
                    WHERE user_id = $1 AND status = $2
                    ORDER BY id DESC
                    "#,
                )
                .bind(owner_id)
                .bind(status)
                .fetch_all(db)
                .await
            }
            None => {
                sqlx::query_as::<_, Task>(
                    r#"
                    SELECT id, user_id, title, status
                    FROM tasks
                    WHERE user_id = $1
                    ORDER BY id DESC
                    "#,
                )
                .bind(owner_id)
                .fetch_all(db)
                .await
            }
        }
    }

    /// The owner-scoped lookup: a task that exists but belongs to someone
    /// else comes back as `None`, same as a task that does not exist.
    pub async fn find_owned(db: &PgPool, owner_id: i64, task_id: i64) -> sqlx::Result<Option<Task>> {
        sqlx::query_as::<_, Task>(
            r#"
            SELECT id, user_id, title, status
            FROM tasks
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(task_id)
        .bind(owner_id)
        .fetch_optional(db)
        .await
    }

    /// Insert a task owned by `owner_id`. When status is omitted the column
    /// default 'pending' applies.
    pub async fn create(
        db: &PgPool,
        owner_id: i64,
        title: &str,
        status: Option<TaskStatus>,
    ) -> sqlx::Result<Task> {
        match status {
            Some(status) => {
                sqlx::query_as::<_, Task>(
                    r#"
                    INSERT INTO tasks (user_id, title, status)
                    VALUES ($1, $2, $3)
                    RETURNING id, user_id, title, status
                    "#,
                )
                .bind(owner_id)
                .bind(title)
                .bind(status)
                .fetch_one(db)
                .await
            }
            None => {
                sqlx::query_as::<_, Task>(
                    r#"
                    INSERT INTO tasks (user_id, title)
                    VALUES ($1, $2)
                    RETURNING id, user_id, title, status
                    "#,
                )
                .bind(owner_id)
                .bind(title)
                .fetch_one(db)
                .await
            }
        }
    }

    /// Partial update; COALESCE keeps columns the patch left out.
    pub async fn update_owned(
        db: &PgPool,
        owner_id: i64,
        task_id: i64,
        patch: &TaskPatch,
    ) -> sqlx::Result<Option<Task>> {
        sqlx::query_as::<_, Task>(
            r#"
            UPDATE tasks
            SET title = COALESCE($1, title),
                status = COALESCE($2, status)
            WHERE id = $3 AND user_id = $4
            RETURNING id, user_id, title, status
            "#,
        )
        .bind(patch.title.as_deref())
        .bind(patch.status)
        .bind(task_id)
        .bind(owner_id)
        .fetch_optional(db)
        .await
    }

    pub async fn delete_owned(db: &PgPool, owner_id: i64, task_id: i64) -> sqlx::Result<bool> {
        let res = sqlx::query("DELETE FROM tasks WHERE id = $1 AND user_id = $2")
            .bind(task_id)
            .bind(owner_id)
            .execute(db)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}

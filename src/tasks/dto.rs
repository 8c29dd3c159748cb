use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ApiError;

/// Task lifecycle state. All three states are mutually reachable by explicit
/// update; there is no enforced transition order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "task_status", rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
}

impl TaskStatus {
    pub const ALLOWED: &'static str = "pending, in_progress, completed";

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "in_progress" => Ok(TaskStatus::InProgress),
            "completed" => Ok(TaskStatus::Completed),
            _ => Err(ApiError::Validation(format!(
                "invalid status. allowed: {}",
                TaskStatus::ALLOWED
            ))),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListTasksParams {
    pub status: Option<String>,
}

/// Creation body. Status is validated by hand so an unknown value reports
/// 400 with the allowed list instead of a decode rejection. Any `user_id`
/// smuggled into the body is ignored; ownership comes from the token.
#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub title: Option<String>,
    pub status: Option<String>,
}

impl CreateTaskRequest {
    pub fn validated(self) -> Result<(String, Option<TaskStatus>), ApiError> {
        let title = self
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::Validation("title is required".into()))?;
        let status = self.status.as_deref().map(TaskStatus::from_str).transpose()?;
        Ok((title, status))
    }
}

/// Partial update body. Fields are tri-state: absent leaves the column
/// unchanged, an explicit JSON `null` is rejected (title cannot be cleared),
/// and a value replaces it.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateTaskRequest {
    #[serde(default, deserialize_with = "some_field")]
    pub title: Option<Option<String>>,
    #[serde(default, deserialize_with = "some_field")]
    pub status: Option<Option<String>>,
}

fn some_field<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(de).map(Some)
}

/// Validated patch handed to the repository. `None` means "leave unchanged".
#[derive(Debug, Clone)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub status: Option<TaskStatus>,
}

impl UpdateTaskRequest {
    pub fn into_patch(self) -> Result<TaskPatch, ApiError> {
        if self.title.is_none() && self.status.is_none() {
            return Err(ApiError::Validation("nothing to update".into()));
        }

        let title = match self.title {
            None => None,
            Some(t) => {
                let t = t.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
                Some(t.ok_or_else(|| {
                    ApiError::Validation("title must be a non-empty string".into())
                })?)
            }
        };

        let status = match self.status {
            None => None,
            Some(None) => {
                return Err(ApiError::Validation(format!(
                    "invalid status. allowed: {}",
                    TaskStatus::ALLOWED
                )))
            }
            Some(Some(s)) => Some(TaskStatus::from_str(&s)?),
        };

        Ok(TaskPatch { title, status })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_all_three_values() {
        assert_eq!("pending".parse::<TaskStatus>().unwrap(), TaskStatus::Pending);
        assert_eq!(
            "in_progress".parse::<TaskStatus>().unwrap(),
            TaskStatus::InProgress
        );
        assert_eq!(
            "completed".parse::<TaskStatus>().unwrap(),
            TaskStatus::Completed
        );
    }

    #[test]
    fn status_rejects_unknown_value() {
        let err = "done".parse::<TaskStatus>().unwrap_err();
        assert!(err.to_string().contains("invalid status"));
    }

    #[test]
    fn status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::InProgress).unwrap(),
            r#""in_progress""#
        );
    }

    #[test]
    fn create_requires_title() {
        let req: CreateTaskRequest = serde_json::from_str(r#"{"status":"pending"}"#).unwrap();
        assert!(req.validated().is_err());

        let req: CreateTaskRequest = serde_json::from_str(r#"{"title":"  "}"#).unwrap();
        assert!(req.validated().is_err());
    }

    #[test]
    fn create_ignores_body_user_id() {
        let req: CreateTaskRequest =
            serde_json::from_str(r#"{"title":"x","user_id":999}"#).unwrap();
        let (title, status) = req.validated().unwrap();
        assert_eq!(title, "x");
        assert!(status.is_none());
    }

    #[test]
    fn create_defaults_status_to_none() {
        let req: CreateTaskRequest = serde_json::from_str(r#"{"title":"Buy milk"}"#).unwrap();
        let (_, status) = req.validated().unwrap();
        assert!(status.is_none());
    }

    #[test]
    fn update_empty_body_is_nothing_to_update() {
        let req: UpdateTaskRequest = serde_json::from_str("{}").unwrap();
        let err = req.into_patch().unwrap_err();
        assert_eq!(err.to_string(), "nothing to update");
    }

    #[test]
    fn update_distinguishes_absent_from_null_title() {
        // Absent title with a status change is a valid partial update.
        let req: UpdateTaskRequest = serde_json::from_str(r#"{"status":"completed"}"#).unwrap();
        let patch = req.into_patch().unwrap();
        assert!(patch.title.is_none());
        assert_eq!(patch.status, Some(TaskStatus::Completed));

        // Explicit null tries to clear the title, which is not allowed.
        let req: UpdateTaskRequest = serde_json::from_str(r#"{"title":null}"#).unwrap();
        assert!(req.into_patch().is_err());
    }

    #[test]
    fn update_rejects_blank_title() {
        let req: UpdateTaskRequest = serde_json::from_str(r#"{"title":""}"#).unwrap();
        assert!(req.into_patch().is_err());
    }

    #[test]
    fn update_rejects_unknown_status() {
        let req: UpdateTaskRequest = serde_json::from_str(r#"{"status":"archived"}"#).unwrap();
        assert!(req.into_patch().is_err());

        let req: UpdateTaskRequest = serde_json::from_str(r#"{"status":null}"#).unwrap();
        assert!(req.into_patch().is_err());
    }

    #[test]
    fn update_title_only_leaves_status_unchanged() {
        let req: UpdateTaskRequest = serde_json::from_str(r#"{"title":"New"}"#).unwrap();
        let patch = req.into_patch().unwrap();
        assert_eq!(patch.title.as_deref(), Some("New"));
        assert!(patch.status.is_none());
    }
}

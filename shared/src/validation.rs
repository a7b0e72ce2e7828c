//! Input validation for task requests.
//!
//! Validation runs before anything touches the store and reports every
//! violation it finds, not just the first one.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{CreateTaskRequest, NewTask, TaskChanges, UpdateTaskRequest};

pub const TITLE_MAX_CHARS: usize = 255;
pub const DESCRIPTION_MAX_CHARS: usize = 1000;

/// A single rejected field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("validation failed: {}", summarize(.0))]
pub struct ValidationErrors(pub Vec<FieldViolation>);

impl ValidationErrors {
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self(vec![FieldViolation::new(field, message)])
    }

    pub fn violations(&self) -> &[FieldViolation] {
        &self.0
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.0.iter().any(|v| v.field == field)
    }
}

fn summarize(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(|v| v.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

fn check_title(title: &str, violations: &mut Vec<FieldViolation>) -> Option<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        violations.push(FieldViolation::new("title", "title must not be blank"));
        return None;
    }
    if trimmed.chars().count() > TITLE_MAX_CHARS {
        violations.push(FieldViolation::new(
            "title",
            format!("title must be at most {TITLE_MAX_CHARS} characters"),
        ));
        return None;
    }
    Some(trimmed.to_string())
}

fn check_description(description: Option<&str>, violations: &mut Vec<FieldViolation>) {
    if let Some(description) = description {
        if description.chars().count() > DESCRIPTION_MAX_CHARS {
            violations.push(FieldViolation::new(
                "description",
                format!("description must be at most {DESCRIPTION_MAX_CHARS} characters"),
            ));
        }
    }
}

/// Validates a create request, producing the task to insert.
pub fn validate_create(request: &CreateTaskRequest) -> Result<NewTask, ValidationErrors> {
    let mut violations = Vec::new();

    let title = match request.title.as_deref() {
        Some(title) => check_title(title, &mut violations),
        None => {
            violations.push(FieldViolation::new("title", "title is required"));
            None
        }
    };
    check_description(request.description.as_deref(), &mut violations);

    match title {
        Some(title) if violations.is_empty() => Ok(NewTask {
            title,
            description: request.description.clone(),
            status: request.status.unwrap_or_default(),
        }),
        _ => Err(ValidationErrors(violations)),
    }
}

/// Validates an update request. Omitted fields stay `None` in the result.
pub fn validate_update(request: &UpdateTaskRequest) -> Result<TaskChanges, ValidationErrors> {
    let mut violations = Vec::new();

    let title = request
        .title
        .as_deref()
        .and_then(|title| check_title(title, &mut violations));
    check_description(
        request.description.as_ref().and_then(Option::as_deref),
        &mut violations,
    );

    if !violations.is_empty() {
        return Err(ValidationErrors(violations));
    }

    Ok(TaskChanges {
        title,
        description: request.description.clone(),
        status: request.status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TaskStatus;

    fn create(title: Option<&str>) -> CreateTaskRequest {
        CreateTaskRequest {
            title: title.map(str::to_string),
            ..CreateTaskRequest::default()
        }
    }

    #[test]
    fn create_defaults_status_and_trims_title() {
        let task = validate_create(&create(Some("  Buy milk "))).unwrap();

        assert_eq!(task.title, "Buy milk");
        assert_eq!(task.status, TaskStatus::Todo);
        assert_eq!(task.description, None);
    }

    #[test]
    fn create_requires_title() {
        let err = validate_create(&create(None)).unwrap_err();
        assert_eq!(err, ValidationErrors::single("title", "title is required"));
    }

    #[test]
    fn create_rejects_blank_title() {
        for title in ["", "   ", "\t\n"] {
            let err = validate_create(&create(Some(title))).unwrap_err();
            assert_eq!(err.violations().len(), 1);
            assert_eq!(err.violations()[0].message, "title must not be blank");
        }
    }

    #[test]
    fn title_length_is_counted_in_characters() {
        let at_limit = "é".repeat(TITLE_MAX_CHARS);
        assert!(validate_create(&create(Some(&at_limit))).is_ok());

        let over = "a".repeat(TITLE_MAX_CHARS + 1);
        let err = validate_create(&create(Some(&over))).unwrap_err();
        assert!(err.has_field("title"));
    }

    #[test]
    fn create_reports_every_violation() {
        let request = CreateTaskRequest {
            title: Some(" ".to_string()),
            description: Some("x".repeat(DESCRIPTION_MAX_CHARS + 1)),
            status: None,
        };

        let err = validate_create(&request).unwrap_err();

        assert!(err.has_field("title"));
        assert!(err.has_field("description"));
        assert_eq!(
            err.to_string(),
            "validation failed: title must not be blank; description must be at most 1000 characters"
        );
    }

    #[test]
    fn update_accepts_empty_request() {
        let changes = validate_update(&UpdateTaskRequest::default()).unwrap();
        assert_eq!(changes, TaskChanges::default());
    }

    #[test]
    fn update_validates_supplied_title() {
        let request = UpdateTaskRequest {
            title: Some(String::new()),
            ..UpdateTaskRequest::default()
        };
        let err = validate_update(&request).unwrap_err();
        assert!(err.has_field("title"));
    }

    #[test]
    fn update_rejects_long_description() {
        let request = UpdateTaskRequest {
            description: Some(Some("x".repeat(DESCRIPTION_MAX_CHARS + 1))),
            ..UpdateTaskRequest::default()
        };
        let err = validate_update(&request).unwrap_err();
        assert_eq!(
            err,
            ValidationErrors::single(
                "description",
                "description must be at most 1000 characters"
            )
        );

        let at_limit = UpdateTaskRequest {
            description: Some(Some("x".repeat(DESCRIPTION_MAX_CHARS))),
            ..UpdateTaskRequest::default()
        };
        assert!(validate_update(&at_limit).is_ok());
    }

    #[test]
    fn update_passes_description_clear_through() {
        let request = UpdateTaskRequest {
            description: Some(None),
            ..UpdateTaskRequest::default()
        };
        let changes = validate_update(&request).unwrap();
        assert_eq!(changes.description, Some(None));
    }

    #[test]
    fn update_keeps_supplied_status() {
        let request = UpdateTaskRequest {
            status: Some(TaskStatus::InProgress),
            ..UpdateTaskRequest::default()
        };
        let changes = validate_update(&request).unwrap();
        assert_eq!(changes.status, Some(TaskStatus::InProgress));
        assert_eq!(changes.title, None);
    }
}

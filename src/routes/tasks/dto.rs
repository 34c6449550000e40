use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use super::model::{TaskPriority, TaskStatus};
use crate::error::{ApiError, FieldError};

const TITLE_MIN: usize = 3;
const TITLE_MAX: usize = 100;
const DESCRIPTION_MAX: usize = 1000;
const TAGS_MAX: usize = 10;
const TAG_LEN_MAX: usize = 30;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTask {
    pub title: String,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<NaiveDate>,
    pub tags: Option<Vec<String>>,
}

impl CreateTask {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = Vec::new();
        check_title(&self.title, &mut errors);
        if let Some(description) = &self.description {
            check_description(description, &mut errors);
        }
        if let Some(due_date) = self.due_date {
            check_due_date(due_date, today_utc(), &mut errors);
        }
        if let Some(tags) = &self.tags {
            check_tags(tags, &mut errors);
        }
        finish(errors)
    }
}

/// Partial update; only supplied fields are validated and applied.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTask {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<NaiveDate>,
    pub tags: Option<Vec<String>>,
}

impl UpdateTask {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = Vec::new();
        if let Some(title) = &self.title {
            check_title(title, &mut errors);
        }
        if let Some(description) = &self.description {
            check_description(description, &mut errors);
        }
        if let Some(due_date) = self.due_date {
            check_due_date(due_date, today_utc(), &mut errors);
        }
        if let Some(tags) = &self.tags {
            check_tags(tags, &mut errors);
        }
        finish(errors)
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub enum SortField {
    #[serde(rename = "createdAt")]
    CreatedAt,
    #[serde(rename = "dueDate")]
    DueDate,
    #[serde(rename = "priority")]
    Priority,
    #[serde(rename = "title")]
    Title,
}

impl SortField {
    pub fn column(self) -> &'static str {
        match self {
            SortField::CreatedAt => "created_at",
            SortField::DueDate => "due_date",
            SortField::Priority => "priority",
            SortField::Title => "title",
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn keyword(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTasksQuery {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub search: Option<String>,
    pub sort_by: Option<SortField>,
    pub sort_order: Option<SortOrder>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl ListTasksQuery {
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(10).clamp(1, 100)
    }

    pub fn sort(&self) -> (SortField, SortOrder) {
        (
            self.sort_by.unwrap_or(SortField::CreatedAt),
            self.sort_order.unwrap_or(SortOrder::Desc),
        )
    }
}

fn today_utc() -> NaiveDate {
    Utc::now().date_naive()
}

fn check_title(title: &str, errors: &mut Vec<FieldError>) {
    let len = title.trim().chars().count();
    if len < TITLE_MIN || len > TITLE_MAX {
        errors.push(FieldError::new(
            "title",
            format!("Title must be between {TITLE_MIN} and {TITLE_MAX} characters"),
        ));
    }
}

fn check_description(description: &str, errors: &mut Vec<FieldError>) {
    if description.chars().count() > DESCRIPTION_MAX {
        errors.push(FieldError::new(
            "description",
            format!("Description must be at most {DESCRIPTION_MAX} characters"),
        ));
    }
}

// Day granularity, resolved in UTC.
fn check_due_date(due_date: NaiveDate, today: NaiveDate, errors: &mut Vec<FieldError>) {
    if due_date < today {
        errors.push(FieldError::new("dueDate", "Due date must be today or later"));
    }
}

fn check_tags(tags: &[String], errors: &mut Vec<FieldError>) {
    if tags.len() > TAGS_MAX {
        errors.push(FieldError::new(
            "tags",
            format!("At most {TAGS_MAX} tags are allowed"),
        ));
        return;
    }
    if tags
        .iter()
        .any(|t| t.trim().is_empty() || t.chars().count() > TAG_LEN_MAX)
    {
        errors.push(FieldError::new(
            "tags",
            format!("Tags must be non-empty and at most {TAG_LEN_MAX} characters"),
        ));
    }
}

fn finish(errors: Vec<FieldError>) -> Result<(), ApiError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Validation(errors))
    }
}

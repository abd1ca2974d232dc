//! # Tasks & Complaints
//!
//! Simple admin workflows that sit beside the ledger.
//!
//! ```text
//! Complaint (open) ──submit──► follow-up Task (pending, due +2/+4/+7 days)
//!      │
//!      ├── in-progress
//!      └── resolve(resolution) ──► resolved ──► closed
//! ```

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::ledger::generate_record_id;
use crate::validation::{validate_name, validate_required, ValidationResult};

// =============================================================================
// Priority
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }

    /// Days until a complaint's follow-up task is due.
    pub fn follow_up_days(&self) -> i64 {
        match self {
            Priority::Critical => 2,
            Priority::High => 4,
            Priority::Medium | Priority::Low => 7,
        }
    }
}

// =============================================================================
// Task
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "kebab-case"))]
#[ts(export)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::Pending
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub status: TaskStatus,
    /// Driver uid the task is assigned to.
    pub assigned_to: Option<String>,
    #[ts(as = "String")]
    pub due_date: NaiveDate,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Overdue: due before today and not completed.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.status != TaskStatus::Completed && self.due_date < today
    }

    pub fn apply(&mut self, patch: TaskPatch, now: DateTime<Utc>) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(assigned_to) = patch.assigned_to {
            self.assigned_to = Some(assigned_to);
        }
        if let Some(due_date) = patch.due_date {
            self.due_date = due_date;
        }
        self.updated_at = now;
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Defaults to medium.
    pub priority: Option<Priority>,
    pub assigned_to: Option<String>,
    #[ts(as = "Option<String>")]
    pub due_date: Option<NaiveDate>,
}

impl NewTask {
    /// Title and due date are required.
    pub fn into_task(self, now: DateTime<Utc>) -> ValidationResult<Task> {
        validate_name("title", &self.title)?;
        let due_date = self.due_date.ok_or_else(|| ValidationError::required("dueDate"))?;
        Ok(Task {
            id: generate_record_id(),
            title: self.title.trim().to_string(),
            description: self.description,
            priority: self.priority.unwrap_or_default(),
            status: TaskStatus::Pending,
            assigned_to: self.assigned_to.filter(|s| !s.is_empty()),
            due_date,
            created_at: now,
            updated_at: now,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub status: Option<TaskStatus>,
    pub assigned_to: Option<String>,
    #[ts(as = "Option<String>")]
    pub due_date: Option<NaiveDate>,
}

// =============================================================================
// Complaint
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum ComplaintCategory {
    Equipment,
    Delivery,
    Safety,
    Customer,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "kebab-case"))]
#[ts(export)]
#[serde(rename_all = "kebab-case")]
pub enum ComplaintStatus {
    Open,
    InProgress,
    Resolved,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Complaint {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: ComplaintCategory,
    pub priority: Priority,
    pub status: ComplaintStatus,
    pub reported_by: String,
    pub reporter_name: String,
    pub branch_id: Option<String>,
    pub branch_name: String,
    pub oil_type_id: Option<String>,
    pub oil_type_name: String,
    pub photos: Vec<String>,
    pub resolution: Option<String>,
    #[ts(as = "Option<String>")]
    pub resolved_at: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct NewComplaint {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: ComplaintCategory,
    #[serde(default)]
    pub priority: Priority,
    pub reported_by: String,
    #[serde(default)]
    pub reporter_name: String,
    pub branch_id: Option<String>,
    #[serde(default)]
    pub branch_name: String,
    pub oil_type_id: Option<String>,
    #[serde(default)]
    pub oil_type_name: String,
    #[serde(default)]
    pub photos: Vec<String>,
}

impl NewComplaint {
    pub fn into_complaint(self, now: DateTime<Utc>) -> ValidationResult<Complaint> {
        validate_name("title", &self.title)?;
        validate_required("reportedBy", &self.reported_by)?;
        Ok(Complaint {
            id: generate_record_id(),
            title: self.title.trim().to_string(),
            description: self.description,
            category: self.category,
            priority: self.priority,
            status: ComplaintStatus::Open,
            reported_by: self.reported_by,
            reporter_name: self.reporter_name,
            branch_id: self.branch_id.filter(|s| !s.is_empty()),
            branch_name: self.branch_name,
            oil_type_id: self.oil_type_id.filter(|s| !s.is_empty()),
            oil_type_name: self.oil_type_name,
            photos: self.photos,
            resolution: None,
            resolved_at: None,
            created_at: now,
            updated_at: now,
        })
    }
}

impl Complaint {
    /// Admin task opened alongside a new complaint.
    pub fn follow_up_task(&self, now: DateTime<Utc>) -> NewTask {
        NewTask {
            title: format!("Complaint: {}", self.title),
            description: format!(
                "Priority: {} - {}",
                self.priority.as_str().to_uppercase(),
                self.description
            ),
            priority: Some(self.priority),
            assigned_to: None,
            due_date: Some((now + Duration::days(self.priority.follow_up_days())).date_naive()),
        }
    }

    /// Marks the complaint resolved. A resolution note is required.
    pub fn resolve(&mut self, resolution: &str, now: DateTime<Utc>) -> ValidationResult<()> {
        validate_required("resolution", resolution)?;
        self.resolution = Some(resolution.trim().to_string());
        self.status = ComplaintStatus::Resolved;
        self.resolved_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    pub fn set_status(&mut self, status: ComplaintStatus, now: DateTime<Utc>) {
        self.status = status;
        self.updated_at = now;
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

//! # Task & Complaint Repositories
//!
//! Plain CRUD. A new complaint and its follow-up task are written in one
//! SQLite transaction by [`ComplaintRepository::insert_with_task`].

use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use chrono::NaiveDate;
use oiltrack_core::workflow::{
    Complaint, ComplaintCategory, ComplaintStatus, Priority, Task, TaskStatus,
};

use super::{decode_json, decode_opt_ts, decode_ts, encode_json, encode_opt_ts, encode_ts};
use crate::error::{DbError, DbResult};
use crate::retry::RetryPolicy;

// =============================================================================
// Tasks
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct TaskRow {
    id: String,
    title: String,
    description: String,
    priority: Priority,
    status: TaskStatus,
    assigned_to: Option<String>,
    due_date: NaiveDate,
    created_at: String,
    updated_at: String,
}

impl TaskRow {
    fn into_task(self) -> DbResult<Task> {
        Ok(Task {
            created_at: decode_ts("Task", &self.id, &self.created_at)?,
            updated_at: decode_ts("Task", &self.id, &self.updated_at)?,
            id: self.id,
            title: self.title,
            description: self.description,
            priority: self.priority,
            status: self.status,
            assigned_to: self.assigned_to,
            due_date: self.due_date,
        })
    }
}

const SELECT_TASK: &str = r#"
    SELECT id, title, description, priority, status, assigned_to, due_date, created_at, updated_at
    FROM tasks
"#;

async fn insert_task(conn: &mut SqliteConnection, t: &Task) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO tasks (id, title, description, priority, status, assigned_to, due_date, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(&t.id)
    .bind(&t.title)
    .bind(&t.description)
    .bind(t.priority)
    .bind(t.status)
    .bind(&t.assigned_to)
    .bind(t.due_date)
    .bind(encode_ts(t.created_at))
    .bind(encode_ts(t.updated_at))
    .execute(conn)
    .await?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct TaskRepository {
    pool: SqlitePool,
    retry: RetryPolicy,
}

impl TaskRepository {
    pub fn new(pool: SqlitePool, retry: RetryPolicy) -> Self {
        TaskRepository { pool, retry }
    }

    /// All tasks by due date, soonest first.
    pub async fn list(&self) -> DbResult<Vec<Task>> {
        self.retry
            .run("list_tasks", || async move {
                let rows: Vec<TaskRow> =
                    sqlx::query_as(&format!("{SELECT_TASK} ORDER BY due_date, created_at"))
                        .fetch_all(&self.pool)
                        .await?;
                rows.into_iter().map(TaskRow::into_task).collect()
            })
            .await
    }

    /// Tasks assigned to one driver.
    pub async fn list_for_assignee(&self, uid: &str) -> DbResult<Vec<Task>> {
        self.retry
            .run("list_assigned_tasks", || async move {
                let rows: Vec<TaskRow> = sqlx::query_as(&format!(
                    "{SELECT_TASK} WHERE assigned_to = ?1 ORDER BY due_date, created_at"
                ))
                .bind(uid)
                .fetch_all(&self.pool)
                .await?;
                rows.into_iter().map(TaskRow::into_task).collect()
            })
            .await
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Task>> {
        self.retry
            .run("get_task", || async move {
                let row: Option<TaskRow> = sqlx::query_as(&format!("{SELECT_TASK} WHERE id = ?1"))
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await?;
                row.map(TaskRow::into_task).transpose()
            })
            .await
    }

    pub async fn insert(&self, task: &Task) -> DbResult<()> {
        self.retry
            .run("insert_task", || async move {
                let mut conn = self.pool.acquire().await?;
                insert_task(&mut conn, task).await?;
                debug!(id = %task.id, title = %task.title, "Inserted task");
                Ok(())
            })
            .await
    }

    pub async fn update(&self, task: &Task) -> DbResult<()> {
        self.retry
            .run("update_task", || async move {
                let result = sqlx::query(
                    r#"
                    UPDATE tasks
                    SET title = ?2, description = ?3, priority = ?4, status = ?5,
                        assigned_to = ?6, due_date = ?7, updated_at = ?8
                    WHERE id = ?1
                    "#,
                )
                .bind(&task.id)
                .bind(&task.title)
                .bind(&task.description)
                .bind(task.priority)
                .bind(task.status)
                .bind(&task.assigned_to)
                .bind(task.due_date)
                .bind(encode_ts(task.updated_at))
                .execute(&self.pool)
                .await?;
                if result.rows_affected() == 0 {
                    return Err(DbError::not_found("Task", &task.id));
                }
                Ok(())
            })
            .await
    }

    pub async fn delete(&self, id: &str) -> DbResult<()> {
        self.retry
            .run("delete_task", || async move {
                let result = sqlx::query("DELETE FROM tasks WHERE id = ?1")
                    .bind(id)
                    .execute(&self.pool)
                    .await?;
                if result.rows_affected() == 0 {
                    return Err(DbError::not_found("Task", id));
                }
                Ok(())
            })
            .await
    }
}

// =============================================================================
// Complaints
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ComplaintRow {
    id: String,
    title: String,
    description: String,
    category: ComplaintCategory,
    priority: Priority,
    status: ComplaintStatus,
    reported_by: String,
    reporter_name: String,
    branch_id: Option<String>,
    branch_name: String,
    oil_type_id: Option<String>,
    oil_type_name: String,
    photos: String,
    resolution: Option<String>,
    resolved_at: Option<String>,
    created_at: String,
    updated_at: String,
}

impl ComplaintRow {
    fn into_complaint(self) -> DbResult<Complaint> {
        let photos: Vec<String> = decode_json("Complaint", &self.id, &self.photos)?;
        Ok(Complaint {
            resolved_at: decode_opt_ts("Complaint", &self.id, self.resolved_at.as_deref())?,
            created_at: decode_ts("Complaint", &self.id, &self.created_at)?,
            updated_at: decode_ts("Complaint", &self.id, &self.updated_at)?,
            id: self.id,
            title: self.title,
            description: self.description,
            category: self.category,
            priority: self.priority,
            status: self.status,
            reported_by: self.reported_by,
            reporter_name: self.reporter_name,
            branch_id: self.branch_id,
            branch_name: self.branch_name,
            oil_type_id: self.oil_type_id,
            oil_type_name: self.oil_type_name,
            photos,
            resolution: self.resolution,
        })
    }
}

const SELECT_COMPLAINT: &str = r#"
    SELECT id, title, description, category, priority, status, reported_by, reporter_name,
           branch_id, branch_name, oil_type_id, oil_type_name, photos, resolution,
           resolved_at, created_at, updated_at
    FROM complaints
"#;

#[derive(Debug, Clone)]
pub struct ComplaintRepository {
    pool: SqlitePool,
    retry: RetryPolicy,
}

impl ComplaintRepository {
    pub fn new(pool: SqlitePool, retry: RetryPolicy) -> Self {
        ComplaintRepository { pool, retry }
    }

    /// All complaints, newest first.
    pub async fn list(&self) -> DbResult<Vec<Complaint>> {
        self.retry
            .run("list_complaints", || async move {
                let rows: Vec<ComplaintRow> = sqlx::query_as(&format!(
                    "{SELECT_COMPLAINT} ORDER BY created_at DESC, rowid DESC"
                ))
                .fetch_all(&self.pool)
                .await?;
                rows.into_iter().map(ComplaintRow::into_complaint).collect()
            })
            .await
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Complaint>> {
        self.retry
            .run("get_complaint", || async move {
                let row: Option<ComplaintRow> =
                    sqlx::query_as(&format!("{SELECT_COMPLAINT} WHERE id = ?1"))
                        .bind(id)
                        .fetch_optional(&self.pool)
                        .await?;
                row.map(ComplaintRow::into_complaint).transpose()
            })
            .await
    }

    /// Writes a complaint and its follow-up task together.
    pub async fn insert_with_task(&self, complaint: &Complaint, task: &Task) -> DbResult<()> {
        self.retry
            .run("insert_complaint", || self.insert_with_task_once(complaint, task))
            .await
    }

    async fn insert_with_task_once(&self, c: &Complaint, task: &Task) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO complaints (
                id, title, description, category, priority, status, reported_by,
                reporter_name, branch_id, branch_name, oil_type_id, oil_type_name, photos,
                resolution, resolved_at, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
            "#,
        )
        .bind(&c.id)
        .bind(&c.title)
        .bind(&c.description)
        .bind(c.category)
        .bind(c.priority)
        .bind(c.status)
        .bind(&c.reported_by)
        .bind(&c.reporter_name)
        .bind(&c.branch_id)
        .bind(&c.branch_name)
        .bind(&c.oil_type_id)
        .bind(&c.oil_type_name)
        .bind(encode_json(&c.photos)?)
        .bind(&c.resolution)
        .bind(encode_opt_ts(c.resolved_at))
        .bind(encode_ts(c.created_at))
        .bind(encode_ts(c.updated_at))
        .execute(&mut *tx)
        .await?;
        insert_task(&mut tx, task).await?;
        tx.commit().await?;

        info!(
            complaint_id = %c.id,
            task_id = %task.id,
            priority = c.priority.as_str(),
            "Complaint filed with follow-up task"
        );
        Ok(())
    }

    /// Persists status and resolution changes.
    pub async fn update(&self, c: &Complaint) -> DbResult<()> {
        self.retry
            .run("update_complaint", || async move {
                let result = sqlx::query(
                    r#"
                    UPDATE complaints
                    SET status = ?2, priority = ?3, resolution = ?4, resolved_at = ?5, updated_at = ?6
                    WHERE id = ?1
                    "#,
                )
                .bind(&c.id)
                .bind(c.status)
                .bind(c.priority)
                .bind(&c.resolution)
                .bind(encode_opt_ts(c.resolved_at))
                .bind(encode_ts(c.updated_at))
                .execute(&self.pool)
                .await?;
                if result.rows_affected() == 0 {
                    return Err(DbError::not_found("Complaint", &c.id));
                }
                Ok(())
            })
            .await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use oiltrack_core::workflow::{
        ComplaintCategory, ComplaintStatus, NewComplaint, NewTask, Priority, TaskStatus,
    };

    use crate::testing;

    #[tokio::test]
    async fn test_task_lifecycle() {
        let db = testing::db().await;
        let now = Utc::now();
        let mut task = NewTask {
            title: "Calibrate meter".into(),
            assigned_to: Some("d1".into()),
            due_date: Some(now.date_naive()),
            ..Default::default()
        }
        .into_task(now)
        .unwrap();
        db.tasks().insert(&task).await.unwrap();
        assert_eq!(db.tasks().list_for_assignee("d1").await.unwrap().len(), 1);

        task.status = TaskStatus::Completed;
        db.tasks().update(&task).await.unwrap();
        let stored = db.tasks().get(&task.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Completed);

        db.tasks().delete(&task.id).await.unwrap();
        assert!(db.tasks().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_complaint_with_follow_up() {
        let db = testing::db().await;
        let now = Utc::now();
        let mut complaint = NewComplaint {
            title: "Tank valve stuck".into(),
            description: "Valve at North will not open".into(),
            category: ComplaintCategory::Equipment,
            priority: Priority::Critical,
            reported_by: "d1".into(),
            reporter_name: "Ali".into(),
            branch_id: None,
            branch_name: String::new(),
            oil_type_id: None,
            oil_type_name: String::new(),
            photos: vec!["memory://complaint-photos/1.jpg".into()],
        }
        .into_complaint(now)
        .unwrap();
        let task = complaint.follow_up_task(now).into_task(now).unwrap();
        db.complaints().insert_with_task(&complaint, &task).await.unwrap();

        let tasks = db.tasks().list().await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "Complaint: Tank valve stuck");

        complaint.resolve("Valve replaced", Utc::now()).unwrap();
        db.complaints().update(&complaint).await.unwrap();
        let stored = db.complaints().get(&complaint.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ComplaintStatus::Resolved);
        assert_eq!(stored.resolution.as_deref(), Some("Valve replaced"));
        assert_eq!(stored.photos.len(), 1);
    }
}

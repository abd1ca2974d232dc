//! Tasks and complaints.
//!
//! A new complaint always opens a follow-up task for the admins; both rows
//! are written together or not at all.

use chrono::{NaiveDate, Utc};
use tracing::info;

use oiltrack_core::workflow::{
    Complaint, ComplaintStatus, NewComplaint, NewTask, Task, TaskPatch,
};

use crate::context::LedgerContext;
use crate::error::{LedgerError, LedgerResult};

pub struct WorkflowService<'a> {
    ctx: &'a LedgerContext,
}

impl<'a> WorkflowService<'a> {
    pub(crate) fn new(ctx: &'a LedgerContext) -> Self {
        WorkflowService { ctx }
    }

    // =========================================================================
    // Tasks
    // =========================================================================

    pub async fn create_task(&self, input: NewTask) -> LedgerResult<Task> {
        let task = input.into_task(Utc::now())?;
        self.ctx.db().tasks().insert(&task).await?;
        info!(id = %task.id, title = %task.title, "Task created");
        Ok(task)
    }

    pub async fn list_tasks(&self) -> LedgerResult<Vec<Task>> {
        Ok(self.ctx.db().tasks().list().await?)
    }

    /// Tasks assigned to one driver.
    pub async fn tasks_for(&self, uid: &str) -> LedgerResult<Vec<Task>> {
        Ok(self.ctx.db().tasks().list_for_assignee(uid).await?)
    }

    pub async fn get_task(&self, id: &str) -> LedgerResult<Task> {
        self.ctx
            .db()
            .tasks()
            .get(id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Task", id))
    }

    pub async fn update_task(&self, id: &str, patch: TaskPatch) -> LedgerResult<Task> {
        let mut task = self.get_task(id).await?;
        task.apply(patch, Utc::now());
        self.ctx.db().tasks().update(&task).await?;
        Ok(task)
    }

    pub async fn delete_task(&self, id: &str) -> LedgerResult<()> {
        Ok(self.ctx.db().tasks().delete(id).await?)
    }

    /// Unfinished tasks due before `today`.
    pub async fn overdue_tasks(&self, today: NaiveDate) -> LedgerResult<Vec<Task>> {
        Ok(self
            .list_tasks()
            .await?
            .into_iter()
            .filter(|t| t.is_overdue(today))
            .collect())
    }

    // =========================================================================
    // Complaints
    // =========================================================================

    /// Files a complaint and its follow-up task. The reporter defaults to the
    /// signed-in user.
    pub async fn submit_complaint(&self, mut input: NewComplaint) -> LedgerResult<(Complaint, Task)> {
        if input.reported_by.trim().is_empty() {
            input.reported_by = self.ctx.identity().user_or_anonymous();
        }
        let now = Utc::now();
        let complaint = input.into_complaint(now)?;
        let task = complaint.follow_up_task(now).into_task(now)?;

        self.ctx
            .db()
            .complaints()
            .insert_with_task(&complaint, &task)
            .await?;

        info!(
            complaint_id = %complaint.id,
            task_id = %task.id,
            priority = complaint.priority.as_str(),
            "Complaint filed"
        );
        Ok((complaint, task))
    }

    pub async fn list_complaints(&self) -> LedgerResult<Vec<Complaint>> {
        Ok(self.ctx.db().complaints().list().await?)
    }

    pub async fn get_complaint(&self, id: &str) -> LedgerResult<Complaint> {
        self.ctx
            .db()
            .complaints()
            .get(id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Complaint", id))
    }

    pub async fn resolve_complaint(&self, id: &str, resolution: &str) -> LedgerResult<Complaint> {
        let mut complaint = self.get_complaint(id).await?;
        complaint.resolve(resolution, Utc::now())?;
        self.ctx.db().complaints().update(&complaint).await?;
        info!(id, "Complaint resolved");
        Ok(complaint)
    }

    pub async fn set_complaint_status(
        &self,
        id: &str,
        status: ComplaintStatus,
    ) -> LedgerResult<Complaint> {
        let mut complaint = self.get_complaint(id).await?;
        complaint.set_status(status, Utc::now());
        self.ctx.db().complaints().update(&complaint).await?;
        Ok(complaint)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;
    use oiltrack_core::workflow::{ComplaintCategory, Priority, TaskStatus};
    use oiltrack_core::Role;

    use super::*;
    use crate::identity::StaticIdentity;
    use crate::testing;

    fn complaint(title: &str, priority: Priority) -> NewComplaint {
        NewComplaint {
            title: title.into(),
            description: "Hose coupling leaking".into(),
            category: ComplaintCategory::Equipment,
            priority,
            reported_by: String::new(),
            reporter_name: "Night shift".into(),
            branch_id: None,
            branch_name: String::new(),
            oil_type_id: None,
            oil_type_name: String::new(),
            photos: vec![],
        }
    }

    fn task(title: &str, due: NaiveDate, assignee: Option<&str>) -> NewTask {
        NewTask {
            title: title.into(),
            description: String::new(),
            priority: None,
            assigned_to: assignee.map(Into::into),
            due_date: Some(due),
        }
    }

    #[tokio::test]
    async fn test_task_lifecycle() {
        let (ctx, _) = testing::ctx().await;
        let today = Utc::now().date_naive();

        let created = ctx
            .workflow()
            .create_task(task("Calibrate meter", today, Some("drv-1")))
            .await
            .unwrap();
        assert_eq!(created.status, TaskStatus::Pending);
        assert_eq!(created.priority, Priority::Medium);
        ctx.workflow()
            .create_task(task("Inspect hoses", today, None))
            .await
            .unwrap();

        assert_eq!(ctx.workflow().tasks_for("drv-1").await.unwrap().len(), 1);

        let updated = ctx
            .workflow()
            .update_task(
                &created.id,
                TaskPatch {
                    status: Some(TaskStatus::Completed),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.status, TaskStatus::Completed);
        assert_eq!(updated.title, "Calibrate meter");

        ctx.workflow().delete_task(&created.id).await.unwrap();
        assert_eq!(ctx.workflow().list_tasks().await.unwrap().len(), 1);
        assert_eq!(
            ctx.workflow().get_task(&created.id).await.unwrap_err().code(),
            "NOT_FOUND"
        );
    }

    #[tokio::test]
    async fn test_task_requires_due_date() {
        let (ctx, _) = testing::ctx().await;
        let mut input = task("Refuel generator", Utc::now().date_naive(), None);
        input.due_date = None;
        let err = ctx.workflow().create_task(input).await.unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert!(ctx.workflow().list_tasks().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_overdue_tasks() {
        let (ctx, _) = testing::ctx().await;
        let today = Utc::now().date_naive();

        let late = ctx
            .workflow()
            .create_task(task("Late", today - Duration::days(2), None))
            .await
            .unwrap();
        let done = ctx
            .workflow()
            .create_task(task("Done", today - Duration::days(2), None))
            .await
            .unwrap();
        ctx.workflow()
            .create_task(task("Due today", today, None))
            .await
            .unwrap();
        ctx.workflow()
            .update_task(
                &done.id,
                TaskPatch {
                    status: Some(TaskStatus::Completed),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let overdue = ctx.workflow().overdue_tasks(today).await.unwrap();
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].id, late.id);
    }

    #[tokio::test]
    async fn test_complaint_opens_follow_up_task() {
        let (ctx, _) = testing::ctx().await;
        let ctx = ctx.with_identity(Arc::new(StaticIdentity::new("drv-3", Role::Driver)));

        let (filed, follow_up) = ctx
            .workflow()
            .submit_complaint(complaint("Leaking hose", Priority::Critical))
            .await
            .unwrap();
        assert_eq!(filed.reported_by, "drv-3");
        assert_eq!(filed.status, ComplaintStatus::Open);
        assert_eq!(follow_up.title, "Complaint: Leaking hose");
        assert_eq!(follow_up.priority, Priority::Critical);
        assert_eq!(
            follow_up.due_date,
            (filed.created_at + Duration::days(2)).date_naive()
        );

        assert_eq!(ctx.workflow().list_complaints().await.unwrap().len(), 1);
        assert_eq!(ctx.workflow().list_tasks().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_complaint_writes_nothing() {
        let (ctx, _) = testing::ctx().await;
        let err = ctx
            .workflow()
            .submit_complaint(complaint(" ", Priority::Low))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert!(ctx.workflow().list_complaints().await.unwrap().is_empty());
        assert!(ctx.workflow().list_tasks().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_and_status() {
        let (ctx, _) = testing::ctx().await;
        let (filed, _) = ctx
            .workflow()
            .submit_complaint(complaint("Wrong grade", Priority::High))
            .await
            .unwrap();
        assert_eq!(filed.reported_by, "anonymous");

        let progressing = ctx
            .workflow()
            .set_complaint_status(&filed.id, ComplaintStatus::InProgress)
            .await
            .unwrap();
        assert_eq!(progressing.status, ComplaintStatus::InProgress);

        let err = ctx
            .workflow()
            .resolve_complaint(&filed.id, "  ")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");

        let resolved = ctx
            .workflow()
            .resolve_complaint(&filed.id, "Tank flushed and refilled")
            .await
            .unwrap();
        assert_eq!(resolved.status, ComplaintStatus::Resolved);
        assert!(resolved.resolved_at.is_some());

        let stored = ctx.workflow().get_complaint(&filed.id).await.unwrap();
        assert_eq!(stored.resolution.as_deref(), Some("Tank flushed and refilled"));
    }
}

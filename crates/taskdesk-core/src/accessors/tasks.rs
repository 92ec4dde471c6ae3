use serde::Serialize;
use serde_json::Value;
use taskdesk_shared::{TaskCreate, TaskDto, TaskPatch};
use tracing::{debug, info, instrument};

use crate::client::{ApiClient, Method, Transport};
use crate::context::RequestContext;
use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskScope {
    #[default]
    All,
    Mine,
}

impl TaskScope {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "all" => Some(Self::All),
            "mine" | "my" => Some(Self::Mine),
            _ => None,
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            Self::All => "/tasks/",
            Self::Mine => "/tasks/my",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::All => "All Tasks",
            Self::Mine => "My Tasks",
        }
    }
}

pub fn validate_task_create(create: TaskCreate) -> Result<TaskCreate, ApiError> {
    let title = create.title.trim().to_string();
    if title.is_empty() {
        return Err(ApiError::Validation("Title is required".to_string()));
    }

    Ok(TaskCreate {
        title,
        description: create.description.trim().to_string(),
        assignee_id: create.assignee_id,
    })
}

pub fn validate_task_patch(patch: TaskPatch) -> Result<TaskPatch, ApiError> {
    if patch.is_empty() {
        return Err(ApiError::Validation("Nothing to update".to_string()));
    }

    let title = match patch.title {
        Some(title) => {
            let trimmed = title.trim().to_string();
            if trimmed.is_empty() {
                return Err(ApiError::Validation("Title is required".to_string()));
            }
            Some(trimmed)
        }
        None => None,
    };

    Ok(TaskPatch {
        title,
        description: patch.description.map(|d| d.trim().to_string()),
        ..patch
    })
}

impl<T: Transport> ApiClient<T> {
    #[instrument(skip(self, ctx))]
    pub async fn list_tasks(
        &self,
        ctx: &mut RequestContext,
        scope: TaskScope,
    ) -> Result<Vec<TaskDto>, ApiError> {
        let response = self.send(ctx, Method::Get, scope.path(), None).await?;
        if response.status != 200 {
            return Err(ApiError::Fetch(response.failure("Failed to fetch tasks")));
        }

        let tasks: Vec<TaskDto> = response.decode()?;
        debug!(count = tasks.len(), "fetched tasks");
        Ok(tasks)
    }

    #[instrument(skip(self, ctx))]
    pub async fn get_task(&self, ctx: &mut RequestContext, id: u64) -> Result<TaskDto, ApiError> {
        let response = self
            .send(ctx, Method::Get, &format!("/tasks/{id}"), None)
            .await?;
        if response.status != 200 {
            return Err(ApiError::NotFound(response.failure("Task not found")));
        }
        response.decode()
    }

    #[instrument(skip(self, ctx))]
    pub async fn create_task(
        &self,
        ctx: &mut RequestContext,
        create: TaskCreate,
    ) -> Result<TaskDto, ApiError> {
        let create = validate_task_create(create)?;
        let body = encode_body(create.body(self.unassigned_encoding()))?;

        let response = self.send(ctx, Method::Post, "/tasks", Some(body)).await?;
        if !matches!(response.status, 200 | 201) {
            return Err(ApiError::Save(response.failure("Failed to save task")));
        }

        let task: TaskDto = response.decode()?;
        info!(id = task.id, "task created");
        Ok(task)
    }

    #[instrument(skip(self, ctx))]
    pub async fn update_task(
        &self,
        ctx: &mut RequestContext,
        id: u64,
        patch: TaskPatch,
    ) -> Result<TaskDto, ApiError> {
        let patch = validate_task_patch(patch)?;
        self.patch_task(ctx, id, &patch, "Failed to edit task").await
    }

    /// Marks the task complete. Repeating the call is harmless: the API
    /// answers with the same completed task.
    #[instrument(skip(self, ctx))]
    pub async fn complete_task(
        &self,
        ctx: &mut RequestContext,
        id: u64,
    ) -> Result<TaskDto, ApiError> {
        self.patch_task(ctx, id, &TaskPatch::complete(), "Failed to complete task")
            .await
    }

    #[instrument(skip(self, ctx))]
    pub async fn delete_task(&self, ctx: &mut RequestContext, id: u64) -> Result<(), ApiError> {
        let response = self
            .send(ctx, Method::Delete, &format!("/tasks/{id}"), None)
            .await?;
        if response.status != 200 {
            return Err(ApiError::Delete(response.failure("Failed to delete task")));
        }

        info!(id, "task deleted");
        Ok(())
    }

    async fn patch_task(
        &self,
        ctx: &mut RequestContext,
        id: u64,
        patch: &TaskPatch,
        failure_message: &str,
    ) -> Result<TaskDto, ApiError> {
        let body = encode_body(patch.body(self.unassigned_encoding()))?;
        let response = self
            .send(ctx, Method::Patch, &format!("/tasks/{id}"), Some(body))
            .await?;
        if !matches!(response.status, 200 | 201) {
            return Err(ApiError::Save(response.failure(failure_message)));
        }

        let task: TaskDto = response.decode()?;
        info!(id = task.id, complete = task.is_complete, "task updated");
        Ok(task)
    }
}

fn encode_body<B: Serialize>(body: B) -> Result<Value, ApiError> {
    serde_json::to_value(body).map_err(|err| ApiError::Encode(err.to_string()))
}

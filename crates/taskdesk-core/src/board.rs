use std::future::Future;

use taskdesk_shared::{TaskCreate, TaskDto, TaskPatch};
use tracing::{debug, info, instrument, warn};

use crate::accessors::TaskScope;
use crate::client::{ApiClient, Transport};
use crate::context::RequestContext;
use crate::error::ApiError;
use crate::view_state::TaskListView;

/// The task operations a board needs. The API client is the production
/// implementation; tests hand the board a fake.
pub trait TaskActions {
    fn list(
        &self,
        ctx: &mut RequestContext,
        scope: TaskScope,
    ) -> impl Future<Output = Result<Vec<TaskDto>, ApiError>>;

    fn get(
        &self,
        ctx: &mut RequestContext,
        id: u64,
    ) -> impl Future<Output = Result<TaskDto, ApiError>>;

    fn create(
        &self,
        ctx: &mut RequestContext,
        create: TaskCreate,
    ) -> impl Future<Output = Result<TaskDto, ApiError>>;

    fn update(
        &self,
        ctx: &mut RequestContext,
        id: u64,
        patch: TaskPatch,
    ) -> impl Future<Output = Result<TaskDto, ApiError>>;

    fn delete(
        &self,
        ctx: &mut RequestContext,
        id: u64,
    ) -> impl Future<Output = Result<(), ApiError>>;

    fn complete(
        &self,
        ctx: &mut RequestContext,
        id: u64,
    ) -> impl Future<Output = Result<TaskDto, ApiError>>;
}

impl<T: Transport> TaskActions for ApiClient<T> {
    async fn list(
        &self,
        ctx: &mut RequestContext,
        scope: TaskScope,
    ) -> Result<Vec<TaskDto>, ApiError> {
        self.list_tasks(ctx, scope).await
    }

    async fn get(&self, ctx: &mut RequestContext, id: u64) -> Result<TaskDto, ApiError> {
        self.get_task(ctx, id).await
    }

    async fn create(
        &self,
        ctx: &mut RequestContext,
        create: TaskCreate,
    ) -> Result<TaskDto, ApiError> {
        self.create_task(ctx, create).await
    }

    async fn update(
        &self,
        ctx: &mut RequestContext,
        id: u64,
        patch: TaskPatch,
    ) -> Result<TaskDto, ApiError> {
        self.update_task(ctx, id, patch).await
    }

    async fn delete(&self, ctx: &mut RequestContext, id: u64) -> Result<(), ApiError> {
        self.delete_task(ctx, id).await
    }

    async fn complete(&self, ctx: &mut RequestContext, id: u64) -> Result<TaskDto, ApiError> {
        self.complete_task(ctx, id).await
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TaskAction {
    Create(TaskCreate),
    Update { id: u64, patch: TaskPatch },
    Delete(u64),
    Complete(u64),
}

impl TaskAction {
    pub fn control(&self) -> Control {
        match self {
            Self::Create(_) => Control::Create,
            Self::Update { .. } => Control::Update,
            Self::Delete(_) => Control::Delete,
            Self::Complete(_) => Control::Complete,
        }
    }

    /// Status line shown while the action is outstanding.
    pub fn progress(&self) -> String {
        match self {
            Self::Create(_) => "Creating task...".to_string(),
            Self::Update { id, .. } => format!("Updating task {id}..."),
            Self::Delete(id) => format!("Deleting task {id}..."),
            Self::Complete(id) => format!("Completing task {id}..."),
        }
    }

    fn target(&self) -> Option<u64> {
        match self {
            Self::Create(_) => None,
            Self::Update { id, .. } | Self::Delete(id) | Self::Complete(id) => Some(*id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Create,
    Update,
    Delete,
    Complete,
}

/// Per-control busy counts. Only the control that started an operation is
/// marked, and a second trigger of the same control stacks on the first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InFlight {
    creating: u32,
    updating: u32,
    deleting: u32,
    completing: u32,
}

impl InFlight {
    pub fn is_busy(&self, control: Control) -> bool {
        *self.count(control) > 0
    }

    pub fn any(&self) -> bool {
        self.creating + self.updating + self.deleting + self.completing > 0
    }

    fn count(&self, control: Control) -> &u32 {
        match control {
            Control::Create => &self.creating,
            Control::Update => &self.updating,
            Control::Delete => &self.deleting,
            Control::Complete => &self.completing,
        }
    }

    fn count_mut(&mut self, control: Control) -> &mut u32 {
        match control {
            Control::Create => &mut self.creating,
            Control::Update => &mut self.updating,
            Control::Delete => &mut self.deleting,
            Control::Complete => &mut self.completing,
        }
    }

    fn start(&mut self, control: Control) {
        *self.count_mut(control) += 1;
    }

    fn stop(&mut self, control: Control) {
        let count = self.count_mut(control);
        *count = count.saturating_sub(1);
    }
}

/// An action whose control is marked busy but which has not been sent yet.
/// Hand it back to [`TaskBoard::finish`] to run it.
#[derive(Debug)]
#[must_use = "a pending action keeps its control busy until finished"]
pub struct PendingAction {
    action: TaskAction,
}

impl PendingAction {
    pub fn action(&self) -> &TaskAction {
        &self.action
    }

    pub fn control(&self) -> Control {
        self.action.control()
    }
}

/// Which cached views a mutation made stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invalidation {
    Tasks,
    Task(u64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActionOutcome {
    /// The task as the API returned it; `None` after a delete.
    pub task: Option<TaskDto>,
    pub invalidations: Vec<Invalidation>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    pub id: u64,
    pub task: Option<TaskDto>,
    pub error: Option<String>,
}

/// Task views plus the selected task, kept in step with every mutation made
/// through [`TaskBoard::perform`].
pub struct TaskBoard<'a, A> {
    actions: &'a A,
    views: Vec<TaskListView>,
    selected: Option<Selection>,
    in_flight: InFlight,
}

impl<'a, A: TaskActions> TaskBoard<'a, A> {
    pub fn new(actions: &'a A) -> Self {
        Self {
            actions,
            views: Vec::new(),
            selected: None,
            in_flight: InFlight::default(),
        }
    }

    pub fn with_view(mut self, view: TaskListView) -> Self {
        self.views.push(view);
        self
    }

    pub fn view(&self, scope: TaskScope) -> Option<&TaskListView> {
        self.views.iter().find(|view| view.scope == scope)
    }

    pub fn selected(&self) -> Option<&Selection> {
        self.selected.as_ref()
    }

    pub fn in_flight(&self) -> InFlight {
        self.in_flight
    }

    /// Refetches every view. Failures stay in the views' state.
    #[instrument(skip(self, ctx))]
    pub async fn refresh(&mut self, ctx: &mut RequestContext) {
        self.invalidate(ctx, Invalidation::Tasks).await;
    }

    #[instrument(skip(self, ctx))]
    pub async fn select(&mut self, ctx: &mut RequestContext, id: u64) {
        self.selected = Some(Selection {
            id,
            ..Selection::default()
        });
        self.invalidate(ctx, Invalidation::Task(id)).await;
    }

    /// Runs `action` with its control marked busy, then refetches whatever
    /// the mutation invalidated. A failed action invalidates nothing.
    pub async fn perform(
        &mut self,
        ctx: &mut RequestContext,
        action: TaskAction,
    ) -> Result<ActionOutcome, ApiError> {
        let pending = self.begin(action);
        self.finish(ctx, pending).await
    }

    /// Marks the action's control busy. Other controls stay usable.
    pub fn begin(&mut self, action: TaskAction) -> PendingAction {
        let control = action.control();
        self.in_flight.start(control);
        debug!(?control, "control busy");
        PendingAction { action }
    }

    /// Sends a begun action, releases its control and refetches what the
    /// mutation invalidated.
    #[instrument(skip(self, ctx, pending), fields(control = ?pending.control()))]
    pub async fn finish(
        &mut self,
        ctx: &mut RequestContext,
        pending: PendingAction,
    ) -> Result<ActionOutcome, ApiError> {
        let control = pending.control();
        let target = pending.action.target();

        let result = match pending.action {
            TaskAction::Create(create) => self.actions.create(ctx, create).await.map(Some),
            TaskAction::Update { id, patch } => {
                self.actions.update(ctx, id, patch).await.map(Some)
            }
            TaskAction::Delete(id) => self.actions.delete(ctx, id).await.map(|()| None),
            TaskAction::Complete(id) => self.actions.complete(ctx, id).await.map(Some),
        };
        self.in_flight.stop(control);

        let task = result?;
        info!(?control, ?target, "task action succeeded");

        if control == Control::Delete
            && let Some(id) = target
            && self.selected.as_ref().is_some_and(|sel| sel.id == id)
        {
            debug!(id, "selected task deleted; clearing selection");
            self.selected = None;
        }

        let mut invalidations = vec![Invalidation::Tasks];
        if let Some(id) = target {
            invalidations.push(Invalidation::Task(id));
        }
        for event in &invalidations {
            self.invalidate(ctx, *event).await;
        }

        Ok(ActionOutcome {
            task,
            invalidations,
        })
    }

    /// Refetches the views `event` touches. Refetch failures are recorded in
    /// the affected view and do not propagate.
    pub async fn invalidate(&mut self, ctx: &mut RequestContext, event: Invalidation) {
        debug!(?event, "invalidation");
        match event {
            Invalidation::Tasks => {
                for view in &mut self.views {
                    if let Err(err) = view.refetch(self.actions, ctx).await {
                        warn!(scope = ?view.scope, error = %err, "task list refetch failed");
                    }
                }
            }
            Invalidation::Task(id) => {
                let Some(selection) = self.selected.as_mut().filter(|sel| sel.id == id) else {
                    return;
                };
                match self.actions.get(ctx, id).await {
                    Ok(task) => {
                        selection.task = Some(task);
                        selection.error = None;
                    }
                    Err(err) => {
                        warn!(id, error = %err, "selected task refetch failed");
                        selection.error = Some(err.to_string());
                    }
                }
            }
        }
    }
}

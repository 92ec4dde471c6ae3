use std::future::Future;

use taskdesk_shared::{TaskDto, UserDto};
use tracing::{debug, warn};

use crate::accessors::TaskScope;
use crate::board::TaskActions;
use crate::client::{ApiClient, Transport};
use crate::context::RequestContext;
use crate::error::ApiError;
use crate::filter::TaskFilter;
use crate::sort::SortState;

/// What a view shows at a given moment. An error and loaded rows are never
/// presented together.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Snapshot<'a, T> {
    Loading,
    Failed(&'a str),
    Ready(&'a [T]),
}

/// Cached rows of one view plus its loading flag and last error.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState<T> {
    items: Vec<T>,
    loading: bool,
    error: Option<String>,
}

impl<T> Default for ViewState<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            loading: false,
            error: None,
        }
    }
}

impl<T> ViewState<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn begin(&mut self) {
        self.loading = true;
        self.error = None;
    }

    /// Stores the outcome of a fetch. On failure the last-known rows stay in
    /// place and the error is handed back to the caller.
    pub fn settle(&mut self, result: Result<Vec<T>, ApiError>) -> Result<(), ApiError> {
        self.loading = false;
        match result {
            Ok(items) => {
                debug!(count = items.len(), "view refreshed");
                self.items = items;
                self.error = None;
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, kept = self.items.len(), "view refresh failed");
                self.error = Some(err.to_string());
                Err(err)
            }
        }
    }

    pub async fn refetch<F>(&mut self, fetch: F) -> Result<(), ApiError>
    where
        F: Future<Output = Result<Vec<T>, ApiError>>,
    {
        self.begin();
        self.settle(fetch.await)
    }

    pub fn snapshot(&self) -> Snapshot<'_, T> {
        if self.loading {
            Snapshot::Loading
        } else if let Some(error) = &self.error {
            Snapshot::Failed(error)
        } else {
            Snapshot::Ready(&self.items)
        }
    }
}

/// A task list as the user sees it: one scope, sorted and filtered.
#[derive(Debug, Clone, Default)]
pub struct TaskListView {
    pub scope: TaskScope,
    pub sort: SortState,
    pub filter: TaskFilter,
    state: ViewState<TaskDto>,
}

impl TaskListView {
    pub fn new(scope: TaskScope, sort: SortState, filter: TaskFilter) -> Self {
        Self {
            scope,
            sort,
            filter,
            state: ViewState::new(),
        }
    }

    pub fn state(&self) -> &ViewState<TaskDto> {
        &self.state
    }

    pub async fn refetch<A: TaskActions>(
        &mut self,
        actions: &A,
        ctx: &mut RequestContext,
    ) -> Result<(), ApiError> {
        let scope = self.scope;
        self.state.refetch(actions.list(ctx, scope)).await
    }

    /// Filtered rows in the current sort order.
    pub fn visible(&self) -> Vec<TaskDto> {
        let mut rows = self.filter.apply(self.state.items());
        self.sort.apply(&mut rows);
        rows
    }
}

#[derive(Debug, Clone, Default)]
pub struct UserListView {
    pub active_only: bool,
    state: ViewState<UserDto>,
}

impl UserListView {
    pub fn new(active_only: bool) -> Self {
        Self {
            active_only,
            state: ViewState::new(),
        }
    }

    pub fn state(&self) -> &ViewState<UserDto> {
        &self.state
    }

    pub async fn refetch<T: Transport>(
        &mut self,
        client: &ApiClient<T>,
        ctx: &mut RequestContext,
    ) -> Result<(), ApiError> {
        if self.active_only {
            self.state.refetch(client.list_active_users(ctx)).await
        } else {
            self.state.refetch(client.list_users(ctx)).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Failure;

    #[test]
    fn failure_keeps_last_known_items() {
        let mut view = ViewState::new();
        view.begin();
        assert_eq!(view.snapshot(), Snapshot::Loading);
        view.settle(Ok(vec![1, 2, 3])).unwrap();
        assert_eq!(view.snapshot(), Snapshot::Ready(&[1, 2, 3][..]));

        view.begin();
        let err = view
            .settle(Err(ApiError::Fetch(Failure::new(
                "Failed to fetch tasks",
                500,
                None,
            ))))
            .unwrap_err();

        assert!(matches!(err, ApiError::Fetch(_)));
        assert_eq!(view.snapshot(), Snapshot::Failed("Failed to fetch tasks"));
        assert_eq!(view.items(), &[1, 2, 3]);
        assert!(!view.is_loading());
    }

    #[test]
    fn begin_clears_previous_error() {
        let mut view: ViewState<u8> = ViewState::new();
        let _ = view.settle(Err(ApiError::Authentication));
        assert!(view.error().is_some());

        view.begin();
        assert_eq!(view.error(), None);
    }
}

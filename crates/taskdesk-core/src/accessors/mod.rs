//! Typed operations over the remote task and user resources. Each accessor
//! checks the status it expects and turns anything else into the matching
//! [`ApiError`](crate::error::ApiError) variant.

mod auth;
mod tasks;
mod users;

pub use auth::LoginPortal;
pub use tasks::{TaskScope, validate_task_create, validate_task_patch};
pub use users::{RegistrationForm, TaskDetails};

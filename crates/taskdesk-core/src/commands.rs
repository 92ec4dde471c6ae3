use std::io::{self, BufRead, IsTerminal};

use anyhow::{Context, anyhow, bail};
use taskdesk_shared::{TaskCreate, TaskPatch};
use tracing::{debug, info, instrument, warn};

use crate::accessors::{LoginPortal, RegistrationForm, TaskScope};
use crate::board::{TaskAction, TaskBoard};
use crate::cli::{Command, TasksArgs};
use crate::client::{ApiClient, Transport};
use crate::config::Config;
use crate::context::RequestContext;
use crate::filter::{AssigneeFilter, Completion, TaskFilter};
use crate::render::Renderer;
use crate::session::{Session, SessionStore};
use crate::sort::{SortColumn, SortDirection, SortState};
use crate::view_state::{TaskListView, UserListView};

pub const NOT_LOGGED_IN: &str = "not logged in; run `taskdesk login`";
pub const SESSION_EXPIRED: &str = "session expired; run `taskdesk login` again";

/// Runs one CLI command. Passwords are read from `input` when not given as
/// flags.
#[instrument(skip_all)]
pub async fn dispatch<T: Transport>(
    client: &ApiClient<T>,
    sessions: &SessionStore,
    cfg: &Config,
    renderer: &Renderer,
    command: Command,
    input: &mut dyn BufRead,
) -> anyhow::Result<()> {
    let session = sessions.load()?;
    debug!(
        command = command.name(),
        logged_in = session.is_some(),
        "dispatching command"
    );

    match command {
        Command::Login {
            username,
            admin,
            password,
        } => {
            let portal = if admin {
                LoginPortal::Admin
            } else {
                LoginPortal::User
            };
            let password = match password {
                Some(password) => password,
                None => read_secret(input, "Password")?,
            };
            cmd_login(client, sessions, portal, &username, &password).await
        }
        Command::Logout => cmd_logout(sessions),
        Command::Whoami => {
            let session = session.ok_or_else(|| anyhow!(NOT_LOGGED_IN))?;
            println!(
                "{} <{}> ({})",
                session.user_name,
                session.user_email,
                session.portal.as_str()
            );
            Ok(())
        }
        Command::Register { email, name, admin } => {
            let password = read_secret(input, "Password")?;
            let confirm_password = read_secret(input, "Confirm password")?;
            let form = RegistrationForm {
                email,
                name,
                password,
                confirm_password,
            };
            let mut ctx = session
                .as_ref()
                .map(Session::context)
                .unwrap_or_else(RequestContext::anonymous);
            let result = cmd_register(client, &mut ctx, form, admin).await;
            finish(sessions, &ctx, result)
        }
        protected => {
            let session = session.ok_or_else(|| anyhow!(NOT_LOGGED_IN))?;
            let mut ctx = session.context();
            let result = run_protected(client, cfg, renderer, &mut ctx, protected).await;
            finish(sessions, &ctx, result)
        }
    }
}

/// Drops the stored session when the API rejected its credential.
fn finish(
    sessions: &SessionStore,
    ctx: &RequestContext,
    result: anyhow::Result<()>,
) -> anyhow::Result<()> {
    if ctx.login_required() {
        sessions.clear()?;
        warn!("stored session rejected by the API and cleared");
        return Err(anyhow!(SESSION_EXPIRED));
    }
    result
}

async fn run_protected<T: Transport>(
    client: &ApiClient<T>,
    cfg: &Config,
    renderer: &Renderer,
    ctx: &mut RequestContext,
    command: Command,
) -> anyhow::Result<()> {
    match command {
        Command::Tasks(args) => cmd_tasks(client, cfg, renderer, ctx, args).await,
        Command::Show { id } => {
            let details = client.load_task_details(ctx, id).await?;
            renderer.print_task_details(&details)
        }
        Command::Add {
            title,
            description,
            assignee,
        } => {
            let action = TaskAction::Create(TaskCreate {
                title,
                description: description.unwrap_or_default(),
                assignee_id: assignee.and_then(|arg| arg.0),
            });
            cmd_mutate(client, cfg, renderer, ctx, action).await
        }
        Command::Edit {
            id,
            title,
            description,
            assignee,
            unassign,
        } => {
            let assignee_id = if unassign {
                Some(None)
            } else {
                assignee.map(|arg| arg.0)
            };
            let patch = TaskPatch {
                title,
                description,
                assignee_id,
                is_complete: None,
            };
            cmd_mutate(client, cfg, renderer, ctx, TaskAction::Update { id, patch }).await
        }
        Command::Done { id } => {
            cmd_mutate(client, cfg, renderer, ctx, TaskAction::Complete(id)).await
        }
        Command::Delete { id } => {
            cmd_mutate(client, cfg, renderer, ctx, TaskAction::Delete(id)).await
        }
        Command::Users { active } => cmd_users(client, renderer, ctx, active).await,
        Command::Activate { id } => cmd_set_active(client, renderer, ctx, id, true).await,
        Command::Deactivate { id } => cmd_set_active(client, renderer, ctx, id, false).await,
        Command::Login { .. } | Command::Logout | Command::Whoami | Command::Register { .. } => {
            bail!("command does not need a session")
        }
    }
}

#[instrument(skip(client, sessions, password))]
async fn cmd_login<T: Transport>(
    client: &ApiClient<T>,
    sessions: &SessionStore,
    portal: LoginPortal,
    username: &str,
    password: &str,
) -> anyhow::Result<()> {
    let mut ctx = RequestContext::anonymous();
    let credential = client.login(&mut ctx, portal, username, password).await?;

    let (name, email) = match client.current_user(&mut ctx).await {
        Ok(user) => (user.name, user.email),
        Err(err) => {
            warn!(error = %err, "could not load profile after login; using username");
            (username.to_string(), String::new())
        }
    };
    if ctx.login_required() {
        bail!("login succeeded but the API rejected the new token");
    }

    sessions.save(&Session::new(&credential, &name, email, portal))?;
    println!("Logged in as {name}.");
    Ok(())
}

fn cmd_logout(sessions: &SessionStore) -> anyhow::Result<()> {
    if sessions.clear()? {
        println!("Logged out.");
    } else {
        println!("No active session.");
    }
    Ok(())
}

#[instrument(skip(client, ctx, form))]
async fn cmd_register<T: Transport>(
    client: &ApiClient<T>,
    ctx: &mut RequestContext,
    form: RegistrationForm,
    admin: bool,
) -> anyhow::Result<()> {
    let registration = form.validate()?;
    let user = client.register_user(ctx, &registration, admin).await?;
    println!("Registered {} <{}>.", user.name, user.email);
    Ok(())
}

#[instrument(skip(client, cfg, renderer, ctx))]
async fn cmd_tasks<T: Transport>(
    client: &ApiClient<T>,
    cfg: &Config,
    renderer: &Renderer,
    ctx: &mut RequestContext,
    args: TasksArgs,
) -> anyhow::Result<()> {
    let view = tasks_view(cfg, &args)?;
    let scope = view.scope;
    let mut board = TaskBoard::new(client).with_view(view);
    board.refresh(ctx).await;

    let view = board
        .view(scope)
        .ok_or_else(|| anyhow!("task view missing after refresh"))?;
    if let Some(error) = view.state().error() {
        bail!("{error}");
    }
    renderer.print_task_view(view)
}

#[instrument(skip(client, cfg, renderer, ctx, action))]
async fn cmd_mutate<T: Transport>(
    client: &ApiClient<T>,
    cfg: &Config,
    renderer: &Renderer,
    ctx: &mut RequestContext,
    action: TaskAction,
) -> anyhow::Result<()> {
    let view = TaskListView::new(cfg.default_scope()?, cfg.default_sort(), TaskFilter::default());
    let scope = view.scope;
    let mut board = TaskBoard::new(client).with_view(view);

    let summary = match &action {
        TaskAction::Create(_) => None,
        TaskAction::Update { id, .. } => Some(format!("Updated task {id}.")),
        TaskAction::Delete(id) => Some(format!("Deleted task {id}.")),
        TaskAction::Complete(id) => Some(format!("Completed task {id}.")),
    };

    let pending = board.begin(action);
    renderer.print_busy(board.in_flight(), &pending)?;
    let outcome = board.finish(ctx, pending).await?;
    match (summary, &outcome.task) {
        (Some(summary), _) => println!("{summary}"),
        (None, Some(task)) => println!("Created task {}.", task.id),
        (None, None) => println!("Created task."),
    }
    info!(invalidations = ?outcome.invalidations, "mutation applied");

    if ctx.login_required() {
        return Ok(());
    }
    if let Some(view) = board.view(scope) {
        if let Some(error) = view.state().error() {
            warn!(error, "task list could not be refreshed");
            eprintln!("warning: {error}");
        } else {
            renderer.print_task_view(view)?;
        }
    }
    Ok(())
}

#[instrument(skip(client, renderer, ctx))]
async fn cmd_users<T: Transport>(
    client: &ApiClient<T>,
    renderer: &Renderer,
    ctx: &mut RequestContext,
    active_only: bool,
) -> anyhow::Result<()> {
    let mut view = UserListView::new(active_only);
    view.refetch(client, ctx).await?;
    renderer.print_user_table(view.state().items())
}

#[instrument(skip(client, renderer, ctx))]
async fn cmd_set_active<T: Transport>(
    client: &ApiClient<T>,
    renderer: &Renderer,
    ctx: &mut RequestContext,
    id: u64,
    active: bool,
) -> anyhow::Result<()> {
    client.set_user_active(ctx, id, active).await?;
    println!(
        "{} user {id}.",
        if active { "Activated" } else { "Deactivated" }
    );

    let mut view = UserListView::new(false);
    match view.refetch(client, ctx).await {
        Ok(()) => renderer.print_user_table(view.state().items()),
        Err(err) => {
            eprintln!("warning: {err}");
            Ok(())
        }
    }
}

/// The list view a `tasks` invocation asks for, on top of the configured
/// scope and sort.
pub fn tasks_view(cfg: &Config, args: &TasksArgs) -> anyhow::Result<TaskListView> {
    let scope = if args.mine {
        TaskScope::Mine
    } else if args.all {
        TaskScope::All
    } else {
        cfg.default_scope()?
    };

    let configured = cfg.default_sort();
    let sort = match args.sort.as_deref() {
        Some(raw) => {
            let column = SortColumn::parse(raw).unwrap_or_else(|| {
                warn!(column = raw, "unknown sort column; using id");
                SortColumn::Id
            });
            let direction = if args.desc {
                SortDirection::Descending
            } else {
                SortDirection::Ascending
            };
            SortState::new(column, direction)
        }
        None if args.desc => SortState::new(configured.column, SortDirection::Descending),
        None => configured,
    };

    let completion = if args.open {
        Completion::Open
    } else if args.done {
        Completion::Done
    } else {
        Completion::Any
    };
    let assignee = match args.assignee.as_deref() {
        Some(raw) => AssigneeFilter::parse(raw)
            .ok_or_else(|| anyhow!("invalid --assignee: {raw} (expected a user id or none)"))?,
        None => AssigneeFilter::Any,
    };

    Ok(TaskListView::new(
        scope,
        sort,
        TaskFilter {
            completion,
            assignee,
            query: args.query.clone(),
        },
    ))
}

fn read_secret(input: &mut dyn BufRead, prompt: &str) -> anyhow::Result<String> {
    if io::stdin().is_terminal() {
        eprint!("{prompt}: ");
    }
    let mut line = String::new();
    input
        .read_line(&mut line)
        .with_context(|| format!("failed reading {} from stdin", prompt.to_lowercase()))?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tasks_view_layers_flags_over_config() {
        let mut cfg = Config::default();
        cfg.apply_overrides([
            ("tasks.scope".to_string(), "mine".to_string()),
            ("tasks.sort".to_string(), "title".to_string()),
            ("tasks.order".to_string(), "desc".to_string()),
        ]);

        let from_config = tasks_view(&cfg, &TasksArgs::default()).unwrap();
        assert_eq!(from_config.scope, TaskScope::Mine);
        assert_eq!(
            from_config.sort,
            SortState::new(SortColumn::Title, SortDirection::Descending)
        );

        let flags = TasksArgs {
            all: true,
            sort: Some("bogus".to_string()),
            open: true,
            assignee: Some("none".to_string()),
            ..TasksArgs::default()
        };
        let view = tasks_view(&cfg, &flags).unwrap();
        assert_eq!(view.scope, TaskScope::All);
        assert_eq!(view.sort, SortState::default());
        assert_eq!(view.filter.completion, Completion::Open);
        assert_eq!(view.filter.assignee, AssigneeFilter::Unassigned);

        let bad = TasksArgs {
            assignee: Some("bob".to_string()),
            ..TasksArgs::default()
        };
        assert!(tasks_view(&cfg, &bad).is_err());
    }

    #[test]
    fn secrets_are_read_one_line_at_a_time() {
        let mut input = io::Cursor::new("hunter2\r\nsecond\n");
        assert_eq!(read_secret(&mut input, "Password").unwrap(), "hunter2");
        assert_eq!(read_secret(&mut input, "Confirm").unwrap(), "second");
        assert_eq!(read_secret(&mut input, "Extra").unwrap(), "");
    }
}

use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "taskdesk",
    version,
    about = "Taskdesk: command-line client for the task management API",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "taskdeskrc", global = true)]
    pub taskdeskrc: Option<PathBuf>,

    #[arg(long = "data", global = true)]
    pub data: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Log in and store the session
    Login {
        username: String,
        /// Use the administrator login
        #[arg(long)]
        admin: bool,
        /// Read from stdin when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// Show the logged-in user
    Whoami,
    /// List tasks
    Tasks(TasksArgs),
    /// Show one task with its assignee
    Show { id: u64 },
    /// Create a task
    Add {
        title: String,
        #[arg(long, short = 'd')]
        description: Option<String>,
        /// User id, or none / -1 for unassigned
        #[arg(long, value_parser = parse_assignee_arg, allow_negative_numbers = true)]
        assignee: Option<AssigneeArg>,
    },
    /// Change a task
    Edit {
        id: u64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long, short = 'd')]
        description: Option<String>,
        /// User id, or none / -1 for unassigned
        #[arg(
            long,
            conflicts_with = "unassign",
            value_parser = parse_assignee_arg,
            allow_negative_numbers = true
        )]
        assignee: Option<AssigneeArg>,
        #[arg(long)]
        unassign: bool,
    },
    /// Mark a task complete
    Done { id: u64 },
    /// Delete a task
    Delete { id: u64 },
    /// List users
    Users {
        #[arg(long)]
        active: bool,
    },
    Activate { id: u64 },
    Deactivate { id: u64 },
    /// Register a new user; password and confirmation are read from stdin
    Register {
        email: String,
        name: String,
        #[arg(long)]
        admin: bool,
    },
}

/// An `--assignee` value. `None` means unassigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssigneeArg(pub Option<u64>);

fn parse_assignee_arg(raw: &str) -> Result<AssigneeArg, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "none" | "unassigned" | "-1" => Ok(AssigneeArg(None)),
        other => other
            .parse::<u64>()
            .map(|id| AssigneeArg(Some(id)))
            .map_err(|_| format!("expected a user id or none, got {raw}")),
    }
}

impl Command {
    /// Subcommand name. Arguments can hold a password, so logs get this
    /// instead of the command itself.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Login { .. } => "login",
            Self::Logout => "logout",
            Self::Whoami => "whoami",
            Self::Tasks(_) => "tasks",
            Self::Show { .. } => "show",
            Self::Add { .. } => "add",
            Self::Edit { .. } => "edit",
            Self::Done { .. } => "done",
            Self::Delete { .. } => "delete",
            Self::Users { .. } => "users",
            Self::Activate { .. } => "activate",
            Self::Deactivate { .. } => "deactivate",
            Self::Register { .. } => "register",
        }
    }
}

#[derive(Args, Debug, Clone, Default, PartialEq)]
pub struct TasksArgs {
    /// Only tasks assigned to me
    #[arg(long)]
    pub mine: bool,
    /// Only tasks from every user, overriding tasks.scope
    #[arg(long, conflicts_with = "mine")]
    pub all: bool,
    /// id, title, description, assignee.name or is_complete
    #[arg(long)]
    pub sort: Option<String>,
    #[arg(long)]
    pub desc: bool,
    #[arg(long, conflicts_with = "done")]
    pub open: bool,
    #[arg(long)]
    pub done: bool,
    /// Case-insensitive match on title and description
    #[arg(long)]
    pub query: Option<String>,
    /// A user id, or `none` for unassigned tasks
    #[arg(long)]
    pub assignee: Option<String>,
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

/// Pulls positional `rc.key=value` / `rc.key:value` overrides out of the
/// argument list before clap sees it.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> anyhow::Result<PreprocessedArgs> {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut overrides: Vec<(String, String)> = Vec::new();

    let mut iter = raw.iter().cloned();
    if let Some(bin) = iter.next() {
        cleaned.push(bin);
    }

    for arg in iter {
        let s = arg.to_string_lossy();
        if let Some(rest) = s.strip_prefix("rc.") {
            let parsed = if let Some((k, v)) = rest.split_once('=') {
                Some((format!("rc.{k}"), v.to_string()))
            } else if let Some((k, v)) = rest.split_once(':') {
                Some((format!("rc.{k}"), v.to_string()))
            } else {
                None
            };

            if let Some((k, v)) = parsed {
                debug!(key = %k, value = %v, "captured positional rc override");
                overrides.push((k, v));
                continue;
            }
        }

        cleaned.push(arg);
    }

    Ok(PreprocessedArgs {
        cleaned_args: cleaned,
        rc_overrides: overrides,
    })
}

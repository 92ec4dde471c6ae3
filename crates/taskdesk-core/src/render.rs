use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;
use taskdesk_shared::{TaskDto, UserDto};
use unicode_width::UnicodeWidthStr;

use crate::accessors::TaskDetails;
use crate::board::{InFlight, PendingAction};
use crate::config::Config;
use crate::sort::{SortColumn, SortState};
use crate::view_state::{Snapshot, TaskListView};

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
    timezone: Tz,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self {
            color,
            timezone: cfg.display_timezone()?,
        })
    }

    pub fn plain(timezone: Tz) -> Self {
        Self {
            color: false,
            timezone,
        }
    }

    #[tracing::instrument(skip(self, view))]
    pub fn print_task_view(&self, view: &TaskListView) -> anyhow::Result<()> {
        self.write_task_view(io::stdout().lock(), view)
    }

    pub fn write_task_view<W: Write>(&self, mut out: W, view: &TaskListView) -> anyhow::Result<()> {
        match view.state().snapshot() {
            Snapshot::Loading => writeln!(out, "Loading...")?,
            Snapshot::Failed(message) => {
                writeln!(out, "{}", self.paint(&format!("error: {message}"), "31"))?
            }
            Snapshot::Ready(_) => {
                let rows = view.visible();
                writeln!(out, "{} ({})", view.scope.label(), rows.len())?;
                if rows.is_empty() {
                    writeln!(out, "No tasks.")?;
                } else {
                    self.write_task_table(&mut out, &rows, view.sort)?;
                }
            }
        }
        Ok(())
    }

    pub fn write_task_table<W: Write>(
        &self,
        out: W,
        tasks: &[TaskDto],
        sort: SortState,
    ) -> anyhow::Result<()> {
        let headers: Vec<String> = SortColumn::ALL
            .iter()
            .map(|column| match sort.arrow_for(*column) {
                Some(arrow) => format!("{} {arrow}", column.label()),
                None => column.label().to_string(),
            })
            .collect();

        let mut rows = Vec::with_capacity(tasks.len());
        for task in tasks {
            let id = self.paint(&task.id.to_string(), "33");
            let complete = if task.is_complete {
                self.paint("Yes", "32")
            } else {
                "No".to_string()
            };
            rows.push(vec![
                id,
                task.title.clone(),
                task.description.clone().unwrap_or_default(),
                assignee_cell(task),
                complete,
            ]);
        }

        write_table(out, headers, rows)
    }

    #[tracing::instrument(skip(self, details))]
    pub fn print_task_details(&self, details: &TaskDetails) -> anyhow::Result<()> {
        self.write_task_details(io::stdout().lock(), details)
    }

    pub fn write_task_details<W: Write>(
        &self,
        mut out: W,
        details: &TaskDetails,
    ) -> anyhow::Result<()> {
        let task = &details.task;
        writeln!(out, "id          {}", task.id)?;
        writeln!(out, "title       {}", task.title)?;
        writeln!(
            out,
            "description {}",
            task.description.as_deref().unwrap_or("No description")
        )?;
        writeln!(
            out,
            "status      {}",
            if task.is_complete {
                "Completed"
            } else {
                "Pending"
            }
        )?;
        writeln!(out, "assignee    {}", details.assignee_label())?;
        if let Some(creator) = &task.created_by {
            writeln!(out, "created by  {}", creator.name)?;
        }
        if let Some(created) = task.created_at.as_deref() {
            writeln!(out, "created     {}", self.timestamp(created))?;
        }
        if let Some(updated) = task.updated_at.as_deref() {
            writeln!(out, "updated     {}", self.timestamp(updated))?;
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, users))]
    pub fn print_user_table(&self, users: &[UserDto]) -> anyhow::Result<()> {
        self.write_user_table(io::stdout().lock(), users)
    }

    pub fn write_user_table<W: Write>(&self, mut out: W, users: &[UserDto]) -> anyhow::Result<()> {
        if users.is_empty() {
            writeln!(out, "No users.")?;
            return Ok(());
        }

        let headers: Vec<String> = ["ID", "Name", "Email", "Role", "Status"]
            .into_iter()
            .map(str::to_string)
            .collect();
        let rows: Vec<Vec<String>> = users
            .iter()
            .map(|user| {
                let role = if user.is_admin { "Admin" } else { "User" };
                let status = if user.is_active {
                    self.paint("Active", "32")
                } else {
                    self.paint("Inactive", "31")
                };
                vec![
                    self.paint(&user.id.to_string(), "33"),
                    user.name.clone(),
                    user.email.clone(),
                    role.to_string(),
                    status,
                ]
            })
            .collect();

        write_table(out, headers, rows)
    }

    /// Busy marker for a begun action, on stderr when it is a terminal.
    pub fn print_busy(&self, in_flight: InFlight, pending: &PendingAction) -> anyhow::Result<()> {
        if !io::stderr().is_terminal() {
            return Ok(());
        }
        self.write_busy(io::stderr().lock(), in_flight, pending)
    }

    pub fn write_busy<W: Write>(
        &self,
        mut out: W,
        in_flight: InFlight,
        pending: &PendingAction,
    ) -> anyhow::Result<()> {
        if in_flight.is_busy(pending.control()) {
            writeln!(out, "{}", self.paint(&pending.action().progress(), "2"))?;
        }
        Ok(())
    }

    /// Formats an API timestamp in the display timezone. Values without an
    /// offset are taken as UTC; unparseable values are shown as sent.
    pub fn timestamp(&self, raw: &str) -> String {
        let parsed = DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .or_else(|_| {
                NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").map(|dt| dt.and_utc())
            });
        match parsed {
            Ok(dt) => dt
                .with_timezone(&self.timezone)
                .format("%Y-%m-%d %H:%M %Z")
                .to_string(),
            Err(_) => raw.to_string(),
        }
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn assignee_cell(task: &TaskDto) -> String {
    match (task.assignee_name(), task.effective_assignee_id()) {
        (Some(name), _) if !name.is_empty() => name.to_string(),
        (_, Some(id)) => format!("User ID: {id}"),
        _ => "Unassigned".to_string(),
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for (header, width) in headers.iter().zip(&widths) {
        let padding = width.saturating_sub(UnicodeWidthStr::width(header.as_str()));
        write!(writer, "{header}{} ", " ".repeat(padding))?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (cell, width) in row.iter().zip(&widths) {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = width.saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

use taskdesk_shared::TaskDto;
use tracing::trace;

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
)]
pub enum Completion {
  #[default]
  Any,
  Open,
  Done
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
)]
pub enum AssigneeFilter {
  #[default]
  Any,
  Unassigned,
  User(u64)
}

impl AssigneeFilter {
  pub fn parse(
    raw: &str
  ) -> Option<Self> {
    let trimmed = raw.trim();
    match trimmed
      .to_ascii_lowercase()
      .as_str()
    {
      | "any" | "" => Some(Self::Any),
      | "none" | "unassigned" | "-1" => {
        Some(Self::Unassigned)
      }
      | _ => {
        trimmed
          .parse::<u64>()
          .ok()
          .map(Self::User)
      }
    }
  }
}

#[derive(
  Debug, Clone, Default, PartialEq, Eq,
)]
pub struct TaskFilter {
  pub completion: Completion,
  pub assignee:   AssigneeFilter,
  pub query:      Option<String>
}

impl TaskFilter {
  pub fn is_empty(&self) -> bool {
    self.completion == Completion::Any
      && self.assignee
        == AssigneeFilter::Any
      && self
        .query
        .as_deref()
        .map(str::trim)
        .is_none_or(str::is_empty)
  }

  pub fn matches(
    &self,
    task: &TaskDto
  ) -> bool {
    match self.completion {
      | Completion::Open
        if task.is_complete =>
      {
        return false;
      }
      | Completion::Done
        if !task.is_complete =>
      {
        return false;
      }
      | _ => {}
    }

    let assignee =
      task.effective_assignee_id();
    match self.assignee {
      | AssigneeFilter::Unassigned
        if assignee.is_some() =>
      {
        return false;
      }
      | AssigneeFilter::User(id)
        if assignee != Some(id) =>
      {
        return false;
      }
      | _ => {}
    }

    if let Some(query) =
      self.query.as_deref()
    {
      let q = query
        .trim()
        .to_ascii_lowercase();
      if !q.is_empty() {
        let in_title = task
          .title
          .to_ascii_lowercase()
          .contains(&q);
        let in_description = task
          .description
          .as_deref()
          .map(|d| {
            d.to_ascii_lowercase()
              .contains(&q)
          })
          .unwrap_or(false);
        if !in_title && !in_description
        {
          return false;
        }
      }
    }

    true
  }

  pub fn apply(
    &self,
    tasks: &[TaskDto]
  ) -> Vec<TaskDto> {
    let out: Vec<TaskDto> = tasks
      .iter()
      .filter(|task| self.matches(task))
      .cloned()
      .collect();
    trace!(
      before = tasks.len(),
      after = out.len(),
      "filtered tasks"
    );
    out
  }
}

#[cfg(test)]
mod tests {
  use taskdesk_shared::{
    TaskDto,
    UserRef
  };

  use super::*;

  fn task(
    id: u64,
    title: &str,
    description: Option<&str>
  ) -> TaskDto {
    TaskDto {
      id,
      title: title.to_string(),
      description: description
        .map(str::to_string),
      is_complete: false,
      assignee_id: None,
      creator_id: None,
      assignee: None,
      created_by: None,
      created_at: None,
      updated_at: None
    }
  }

  #[test]
  fn completion_and_query() {
    let mut done =
      task(1, "Deploy API", None);
    done.is_complete = true;
    let open = task(
      2,
      "Write notes",
      Some("Release DEPLOY checklist")
    );
    let tasks = vec![done, open];

    let open_only = TaskFilter {
      completion: Completion::Open,
      ..TaskFilter::default()
    };
    assert_eq!(
      open_only.apply(&tasks).len(),
      1
    );

    let query = TaskFilter {
      query: Some("deploy".to_string()),
      ..TaskFilter::default()
    };
    assert_eq!(query.apply(&tasks).len(), 2);

    let done_query = TaskFilter {
      completion: Completion::Done,
      query:      Some(
        "checklist".to_string()
      ),
      ..TaskFilter::default()
    };
    assert!(
      done_query.apply(&tasks).is_empty()
    );
  }

  #[test]
  fn assignee_uses_nested_relation_when_id_missing()
   {
    let mut nested =
      task(1, "a", None);
    nested.assignee = Some(UserRef {
      id:    4,
      name:  "Ana".to_string(),
      email: String::new()
    });
    let free = task(2, "b", None);
    let tasks = vec![nested, free];

    let mine = TaskFilter {
      assignee: AssigneeFilter::User(4),
      ..TaskFilter::default()
    };
    let unassigned = TaskFilter {
      assignee:
        AssigneeFilter::Unassigned,
      ..TaskFilter::default()
    };

    assert_eq!(mine.apply(&tasks)[0].id, 1);
    assert_eq!(
      unassigned.apply(&tasks)[0].id,
      2
    );
  }

  #[test]
  fn assignee_filter_parsing() {
    assert_eq!(
      AssigneeFilter::parse("none"),
      Some(AssigneeFilter::Unassigned)
    );
    assert_eq!(
      AssigneeFilter::parse("-1"),
      Some(AssigneeFilter::Unassigned)
    );
    assert_eq!(
      AssigneeFilter::parse("12"),
      Some(AssigneeFilter::User(12))
    );
    assert_eq!(
      AssigneeFilter::parse("bob"),
      None
    );
    assert!(
      TaskFilter::default().is_empty()
    );
  }
}

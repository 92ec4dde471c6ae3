use std::cmp::Ordering;

use taskdesk_shared::TaskDto;

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
)]
pub enum SortColumn {
  #[default]
  Id,
  Title,
  Description,
  AssigneeName,
  Complete
}

impl SortColumn {
  pub const ALL: [SortColumn; 5] = [
    SortColumn::Id,
    SortColumn::Title,
    SortColumn::Description,
    SortColumn::AssigneeName,
    SortColumn::Complete
  ];

  pub fn parse(
    token: &str
  ) -> Option<Self> {
    match token
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "id" => Some(Self::Id),
      | "title" => Some(Self::Title),
      | "description" => {
        Some(Self::Description)
      }
      | "assignee.name"
      | "assignee" => {
        Some(Self::AssigneeName)
      }
      | "is_complete" | "complete"
      | "done" => Some(Self::Complete),
      | _ => None
    }
  }

  pub fn key(&self) -> &'static str {
    match self {
      | Self::Id => "id",
      | Self::Title => "title",
      | Self::Description => {
        "description"
      }
      | Self::AssigneeName => {
        "assignee.name"
      }
      | Self::Complete => "is_complete"
    }
  }

  pub fn label(
    &self
  ) -> &'static str {
    match self {
      | Self::Id => "ID",
      | Self::Title => "Title",
      | Self::Description => {
        "Description"
      }
      | Self::AssigneeName => {
        "Assignee"
      }
      | Self::Complete => "Complete"
    }
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
)]
pub enum SortDirection {
  #[default]
  Ascending,
  Descending
}

impl SortDirection {
  pub fn parse(
    token: &str
  ) -> Option<Self> {
    match token
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "asc" | "ascending" => {
        Some(Self::Ascending)
      }
      | "desc" | "descending" => {
        Some(Self::Descending)
      }
      | _ => None
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      | Self::Ascending => "asc",
      | Self::Descending => "desc"
    }
  }

  pub fn toggled(self) -> Self {
    match self {
      | Self::Ascending => {
        Self::Descending
      }
      | Self::Descending => {
        Self::Ascending
      }
    }
  }

  pub fn arrow(&self) -> &'static str {
    match self {
      | Self::Ascending => "▲",
      | Self::Descending => "▼"
    }
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
)]
pub struct SortState {
  pub column:    SortColumn,
  pub direction: SortDirection
}

impl SortState {
  pub fn new(
    column: SortColumn,
    direction: SortDirection
  ) -> Self {
    Self {
      column,
      direction
    }
  }

  /// The state a click on `column`'s
  /// header leads to.
  pub fn next_for(
    &self,
    column: SortColumn
  ) -> SortState {
    if self.column == column {
      SortState::new(
        column,
        self.direction.toggled()
      )
    } else {
      SortState::new(
        column,
        SortDirection::Ascending
      )
    }
  }

  pub fn click(
    &mut self,
    column: SortColumn
  ) {
    *self = self.next_for(column);
  }

  pub fn arrow_for(
    &self,
    column: SortColumn
  ) -> Option<&'static str> {
    (self.column == column)
      .then(|| self.direction.arrow())
  }

  pub fn apply(
    &self,
    tasks: &mut [TaskDto]
  ) {
    sort_tasks(
      tasks,
      self.column,
      self.direction
    );
  }

  pub fn sorted(
    &self,
    tasks: &[TaskDto]
  ) -> Vec<TaskDto> {
    let mut out = tasks.to_vec();
    self.apply(&mut out);
    out
  }
}

/// Ordering key of one cell. Empty
/// (missing) values sort first, then
/// numbers, then text. Ids stay
/// integral so large ones never tie.
#[derive(Debug, Clone, PartialEq)]
enum SortKey<'a> {
  Empty,
  Integer(u64),
  Number(f64),
  Text(&'a str)
}

impl SortKey<'_> {
  fn rank(&self) -> u8 {
    match self {
      | SortKey::Empty => 0,
      | SortKey::Integer(_)
      | SortKey::Number(_) => 1,
      | SortKey::Text(_) => 2
    }
  }
}

fn text_key(raw: &str) -> SortKey<'_> {
  if raw.is_empty() {
    return SortKey::Empty;
  }
  match parse_numeric(raw) {
    | Some(value) => {
      SortKey::Number(value)
    }
    | None => SortKey::Text(raw)
  }
}

fn parse_numeric(
  raw: &str
) -> Option<f64> {
  let trimmed = raw.trim();
  let plausible = !trimmed.is_empty()
    && trimmed
      .bytes()
      .any(|b| b.is_ascii_digit())
    && trimmed.bytes().all(|b| {
      b.is_ascii_digit()
        || matches!(
          b,
          b'+' | b'-' | b'.' | b'e' | b'E'
        )
    });
  if !plausible {
    return None;
  }
  trimmed
    .parse::<f64>()
    .ok()
    .filter(|value| value.is_finite())
}

fn sort_key(
  task: &TaskDto,
  column: SortColumn
) -> SortKey<'_> {
  match column {
    | SortColumn::Id => {
      SortKey::Integer(task.id)
    }
    | SortColumn::Title => {
      text_key(&task.title)
    }
    | SortColumn::Description => {
      text_key(
        task
          .description
          .as_deref()
          .unwrap_or("")
      )
    }
    | SortColumn::AssigneeName => {
      text_key(
        task
          .assignee_name()
          .unwrap_or("")
      )
    }
    | SortColumn::Complete => {
      SortKey::Integer(u64::from(
        task.is_complete
      ))
    }
  }
}

fn compare_keys(
  a: &SortKey<'_>,
  b: &SortKey<'_>
) -> Ordering {
  match (a, b) {
    | (
      SortKey::Number(x),
      SortKey::Number(y)
    ) => {
      x.partial_cmp(y)
        .unwrap_or(Ordering::Equal)
    }
    | (
      SortKey::Integer(x),
      SortKey::Integer(y)
    ) => x.cmp(y),
    | (
      SortKey::Integer(x),
      SortKey::Number(y)
    ) => {
      (*x as f64)
        .partial_cmp(y)
        .unwrap_or(Ordering::Equal)
    }
    | (
      SortKey::Number(x),
      SortKey::Integer(y)
    ) => {
      x.partial_cmp(&(*y as f64))
        .unwrap_or(Ordering::Equal)
    }
    | (
      SortKey::Text(x),
      SortKey::Text(y)
    ) => x.as_bytes().cmp(y.as_bytes()),
    | _ => a.rank().cmp(&b.rank())
  }
}

pub fn compare_tasks(
  a: &TaskDto,
  b: &TaskDto,
  column: SortColumn,
  direction: SortDirection
) -> Ordering {
  let ordering = compare_keys(
    &sort_key(a, column),
    &sort_key(b, column)
  );
  match direction {
    | SortDirection::Ascending => {
      ordering
    }
    | SortDirection::Descending => {
      ordering.reverse()
    }
  }
}

/// Stable in-place sort; rows with
/// equal keys keep their relative
/// order in both directions.
pub fn sort_tasks(
  tasks: &mut [TaskDto],
  column: SortColumn,
  direction: SortDirection
) {
  tasks.sort_by(|a, b| {
    compare_tasks(
      a, b, column, direction
    )
  });
}

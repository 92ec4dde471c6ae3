use serde::{
  Deserialize,
  Serialize
};

/// Marker some API deployments use
/// in `assignee_id` for "no
/// assignee".
pub const UNASSIGNED_SENTINEL: i64 = -1;

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct UserRef {
  pub id:    u64,
  #[serde(default)]
  pub name:  String,
  #[serde(default)]
  pub email: String
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct TaskDto {
  pub id:          u64,
  pub title:       String,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub is_complete: bool,
  #[serde(
    default,
    deserialize_with = "assignee::deserialize"
  )]
  pub assignee_id: Option<u64>,
  #[serde(default)]
  pub creator_id:  Option<u64>,
  #[serde(default)]
  pub assignee:    Option<UserRef>,
  #[serde(default, alias = "creator")]
  pub created_by:  Option<UserRef>,
  #[serde(default)]
  pub created_at:  Option<String>,
  #[serde(default)]
  pub updated_at:  Option<String>
}

impl TaskDto {
  pub fn assignee_name(
    &self
  ) -> Option<&str> {
    self
      .assignee
      .as_ref()
      .map(|user| user.name.as_str())
  }

  /// The assignee id, taking the
  /// nested relation into account
  /// when only that was sent.
  pub fn effective_assignee_id(
    &self
  ) -> Option<u64> {
    self.assignee_id.or_else(|| {
      self
        .assignee
        .as_ref()
        .map(|user| user.id)
    })
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct UserDto {
  pub id:        u64,
  #[serde(default)]
  pub email:     String,
  #[serde(default)]
  pub name:      String,
  #[serde(default)]
  pub is_admin:  bool,
  #[serde(default = "default_active")]
  pub is_active: bool
}

fn default_active() -> bool {
  true
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
pub struct AccessToken {
  pub access_token: String,
  #[serde(default)]
  pub token_type:   Option<String>
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
pub struct UserRegistration {
  pub email:    String,
  pub name:     String,
  pub password: String
}

/// How an absent assignee is written
/// into outgoing task payloads.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
)]
pub enum UnassignedEncoding {
  #[default]
  Null,
  Sentinel
}

impl UnassignedEncoding {
  pub fn parse(
    raw: &str
  ) -> Option<Self> {
    match raw
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "null" | "none" => {
        Some(Self::Null)
      }
      | "sentinel" | "-1" => {
        Some(Self::Sentinel)
      }
      | _ => None
    }
  }
}

/// An outgoing assignee: the id, or
/// "none" spelled the way the API
/// deployment expects.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub struct EncodedAssignee {
  pub id:       Option<u64>,
  pub encoding: UnassignedEncoding
}

impl Serialize for EncodedAssignee {
  fn serialize<S>(
    &self,
    serializer: S
  ) -> Result<S::Ok, S::Error>
  where
    S: serde::Serializer
  {
    match (self.id, self.encoding) {
      | (Some(id), _) => {
        serializer.serialize_u64(id)
      }
      | (
        None,
        UnassignedEncoding::Null
      ) => serializer.serialize_none(),
      | (
        None,
        UnassignedEncoding::Sentinel
      ) => {
        serializer.serialize_i64(
          UNASSIGNED_SENTINEL
        )
      }
    }
  }
}

#[derive(
  Debug, Clone, PartialEq, Eq,
)]
pub struct TaskCreate {
  pub title:       String,
  pub description: String,
  pub assignee_id: Option<u64>
}

impl TaskCreate {
  pub fn body(
    &self,
    encoding: UnassignedEncoding
  ) -> TaskCreateBody<'_> {
    TaskCreateBody {
      title:       &self.title,
      description: &self.description,
      assignee_id: EncodedAssignee {
        id: self.assignee_id,
        encoding
      }
    }
  }
}

/// `POST /tasks` body. The assignee is
/// always sent.
#[derive(Debug, Serialize)]
pub struct TaskCreateBody<'a> {
  pub title:       &'a str,
  pub description: &'a str,
  pub assignee_id: EncodedAssignee
}

/// Partial update. `assignee_id:
/// Some(None)` clears the assignee.
#[derive(
  Debug, Clone, Default, PartialEq, Eq,
)]
pub struct TaskPatch {
  pub title:       Option<String>,
  pub description: Option<String>,
  pub assignee_id: Option<Option<u64>>,
  pub is_complete: Option<bool>
}

impl TaskPatch {
  pub fn complete() -> Self {
    Self {
      is_complete: Some(true),
      ..Self::default()
    }
  }

  pub fn is_empty(&self) -> bool {
    self.title.is_none()
      && self.description.is_none()
      && self.assignee_id.is_none()
      && self.is_complete.is_none()
  }

  pub fn body(
    &self,
    encoding: UnassignedEncoding
  ) -> TaskPatchBody<'_> {
    TaskPatchBody {
      title:       self.title.as_deref(),
      description: self
        .description
        .as_deref(),
      assignee_id: self.assignee_id.map(
        |id| EncodedAssignee {
          id,
          encoding
        }
      ),
      is_complete: self.is_complete
    }
  }
}

/// `PATCH /tasks/{id}` body; unset
/// fields are left out.
#[derive(Debug, Serialize)]
pub struct TaskPatchBody<'a> {
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub title:       Option<&'a str>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub description: Option<&'a str>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub assignee_id: Option<EncodedAssignee>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub is_complete: Option<bool>
}

pub mod assignee {
  use serde::{
    Deserialize,
    Deserializer
  };

  /// Reads `null`, a missing field
  /// or any negative id (the `-1`
  /// sentinel) as unassigned.
  pub fn deserialize<'de, D>(
    deserializer: D
  ) -> Result<Option<u64>, D::Error>
  where
    D: Deserializer<'de>
  {
    let raw =
      Option::<i64>::deserialize(
        deserializer
      )?;
    Ok(raw.and_then(|id| {
      u64::try_from(id).ok()
    }))
  }
}

use std::collections::HashMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};
use std::time::Duration;

use anyhow::{
  Context,
  anyhow,
  bail
};
use chrono_tz::Tz;
use taskdesk_shared::UnassignedEncoding;
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::accessors::TaskScope;
use crate::sort::{
  SortColumn,
  SortDirection,
  SortState
};

pub const DEFAULT_API_BASE_URL: &str =
  "http://localhost:8000";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Config {
  map:              HashMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    let mut map = HashMap::new();
    for (key, value) in [
      (
        "api.base_url",
        DEFAULT_API_BASE_URL
      ),
      ("api.timeout", "30"),
      ("api.unassigned", "null"),
      ("data.location", "~/.taskdesk"),
      ("color", "on"),
      ("tasks.scope", "all"),
      ("tasks.sort", "id"),
      ("tasks.order", "asc"),
      ("display.timezone", "UTC")
    ] {
      map.insert(
        key.to_string(),
        value.to_string()
      );
    }

    Self {
      map,
      loaded_files: vec![]
    }
  }
}

impl Config {
  #[tracing::instrument(skip(
    rc_override
  ))]
  pub fn load(
    rc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::default();

    let rc = resolve_rc_path(rc_override)?;
    if let Some(path) = rc {
      info!(rc = %path.display(), "loading taskdeskrc");
      cfg.load_file(
        &path,
        &mut Vec::new()
      )?;
    } else {
      warn!(
        "no taskdeskrc found; using \
         defaults"
      );
    }

    Ok(cfg)
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      debug!(key = %key, value = %v, "applying override");
      self.map.insert(key, v);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.map.get(key).cloned()
  }

  pub fn api_base_url(&self) -> String {
    self
      .get("api.base_url")
      .unwrap_or_else(|| {
        DEFAULT_API_BASE_URL.to_string()
      })
  }

  pub fn api_timeout(
    &self
  ) -> anyhow::Result<Duration> {
    let Some(raw) =
      self.get("api.timeout")
    else {
      return Ok(Duration::from_secs(
        DEFAULT_TIMEOUT_SECS
      ));
    };
    let secs = raw
      .trim()
      .parse::<u64>()
      .map_err(|_| {
        anyhow!(
          "invalid api.timeout: {raw}"
        )
      })?;
    Ok(Duration::from_secs(secs))
  }

  pub fn unassigned_encoding(
    &self
  ) -> anyhow::Result<UnassignedEncoding>
  {
    match self.get("api.unassigned") {
      | None => {
        Ok(UnassignedEncoding::default())
      }
      | Some(raw) => {
        UnassignedEncoding::parse(&raw)
          .ok_or_else(|| {
            anyhow!(
              "invalid api.unassigned: \
               {raw} (expected null or \
               sentinel)"
            )
          })
      }
    }
  }

  pub fn default_scope(
    &self
  ) -> anyhow::Result<TaskScope> {
    let raw = self
      .get("tasks.scope")
      .unwrap_or_else(|| {
        "all".to_string()
      });
    TaskScope::parse(&raw).ok_or_else(
      || {
        anyhow!(
          "invalid tasks.scope: {raw} \
           (expected all or mine)"
        )
      }
    )
  }

  /// Unknown names fall back to id /
  /// ascending, the same as an
  /// unrecognised header link.
  pub fn default_sort(
    &self
  ) -> SortState {
    let column = match self
      .get("tasks.sort")
    {
      | Some(raw) => {
        SortColumn::parse(&raw)
          .unwrap_or_else(|| {
            warn!(column = %raw, "unknown tasks.sort; using id");
            SortColumn::default()
          })
      }
      | None => SortColumn::default()
    };
    let direction = match self
      .get("tasks.order")
    {
      | Some(raw) => {
        SortDirection::parse(&raw)
          .unwrap_or_else(|| {
            warn!(order = %raw, "unknown tasks.order; using asc");
            SortDirection::default()
          })
      }
      | None => {
        SortDirection::default()
      }
    };
    SortState::new(column, direction)
  }

  pub fn display_timezone(
    &self
  ) -> anyhow::Result<Tz> {
    let raw = self
      .get("display.timezone")
      .unwrap_or_else(|| {
        "UTC".to_string()
      });
    raw.trim().parse::<Tz>().map_err(
      |_| {
        anyhow!(
          "invalid display.timezone: \
           {raw}"
        )
      }
    )
  }

  /// `active` is the chain of files
  /// currently being read; meeting one
  /// of them again is a cycle.
  #[tracing::instrument(skip(
    self, active
  ))]
  fn load_file(
    &mut self,
    path: &Path,
    active: &mut Vec<PathBuf>
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    let canonical =
      fs::canonicalize(&path)
        .unwrap_or_else(|_| {
          path.clone()
        });
    if active.contains(&canonical) {
      bail!(
        "include cycle at {}",
        path.display()
      );
    }

    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;

    self
      .loaded_files
      .push(path.clone());

    let base_dir = path
      .parent()
      .map(|p| p.to_path_buf())
      .unwrap_or_else(|| {
        PathBuf::from(".")
      });

    for (line_num, raw_line) in
      text.lines().enumerate()
    {
      let mut line = raw_line.trim();
      if line.is_empty()
        || line.starts_with('#')
      {
        continue;
      }

      if let Some((before, _)) =
        line.split_once('#')
      {
        line = before.trim();
      }

      if line.is_empty() {
        continue;
      }

      if let Some(include_rest) =
        line.strip_prefix("include ")
      {
        let include_path =
          resolve_include_path(
            &base_dir,
            include_rest.trim()
          )?;
        debug!(
            file = %path.display(),
            include = %include_path.display(),
            line = line_num + 1,
            "processing include"
        );

        if include_path.exists() {
          active.push(canonical.clone());
          let loaded = self.load_file(
            &include_path,
            active
          );
          active.pop();
          loaded?;
        } else {
          warn!(include = %include_path.display(), "include file does not exist; skipping");
        }
        continue;
      }

      let (k, v) = line
        .split_once('=')
        .ok_or_else(|| {
          anyhow!(
            "invalid config line \
             {}:{}: {}",
            path.display(),
            line_num + 1,
            raw_line
          )
        })?;

      let key = k.trim().to_string();
      let value = v.trim().to_string();
      trace!(key = %key, value = %value, "loaded config key");
      self.map.insert(key, value);
    }

    Ok(())
  }
}

#[tracing::instrument(skip(
  cfg,
  override_dir
))]
pub fn resolve_data_dir(
  cfg: &Config,
  override_dir: Option<&Path>
) -> anyhow::Result<PathBuf> {
  let dir = if let Some(path) =
    override_dir
  {
    path.to_path_buf()
  } else if let Some(cfg_value) =
    cfg.get("data.location")
  {
    expand_tilde(Path::new(&cfg_value))
  } else {
    default_data_dir()?
  };

  if !dir.exists() {
    info!(dir = %dir.display(), "creating data directory");
    fs::create_dir_all(&dir)
      .with_context(|| {
        format!(
          "failed to create {}",
          dir.display()
        )
      })?;
  }

  Ok(dir)
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_rc_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(rc_env) =
    std::env::var("TASKDESKRC")
  {
    if rc_env == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      rc_env
    )));
  }

  let home = dirs::home_dir()
    .ok_or_else(|| {
      anyhow!(
        "cannot determine home \
         directory"
      )
    })?;
  let candidate =
    home.join(".taskdeskrc");
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

fn default_data_dir()
-> anyhow::Result<PathBuf> {
  let home = dirs::home_dir()
    .ok_or_else(|| {
      anyhow!(
        "cannot determine home \
         directory"
      )
    })?;
  Ok(home.join(".taskdesk"))
}

fn resolve_include_path(
  base_dir: &Path,
  include: &str
) -> anyhow::Result<PathBuf> {
  if include.trim().is_empty() {
    return Err(anyhow!(
      "include path cannot be empty"
    ));
  }

  let raw = PathBuf::from(include);
  let expanded = expand_tilde(&raw);
  if expanded.is_absolute() {
    Ok(expanded)
  } else {
    Ok(base_dir.join(expanded))
  }
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use std::fs;
  use std::io;
  use std::sync::Arc;
  use std::time::Duration;

  use parking_lot::Mutex;
  use taskdesk_shared::UnassignedEncoding;
  use tempfile::tempdir;

  use super::Config;
  use crate::accessors::TaskScope;
  use crate::sort::{
    SortColumn,
    SortDirection,
    SortState
  };

  #[test]
  fn rc_file_with_include_and_overrides()
  {
    let dir = tempdir().unwrap();
    let extra = dir.path().join("extra.rc");
    fs::write(
      &extra,
      "api.unassigned = sentinel\n"
    )
    .unwrap();
    let rc = dir.path().join("taskdeskrc");
    fs::write(
      &rc,
      "# taskdesk\n\
       api.base_url = http://api.test:9000 # local\n\
       api.timeout=5\n\
       include extra.rc\n\
       tasks.sort = assignee.name\n"
    )
    .unwrap();

    let mut cfg =
      Config::load(Some(&rc)).unwrap();
    assert_eq!(cfg.loaded_files.len(), 2);
    assert_eq!(
      cfg.api_base_url(),
      "http://api.test:9000"
    );
    assert_eq!(
      cfg.api_timeout().unwrap(),
      Duration::from_secs(5)
    );
    assert_eq!(
      cfg.unassigned_encoding().unwrap(),
      UnassignedEncoding::Sentinel
    );
    assert_eq!(
      cfg.default_sort().column,
      SortColumn::AssigneeName
    );

    cfg.apply_overrides([(
      "rc.tasks.scope".to_string(),
      "mine".to_string()
    )]);
    assert_eq!(
      cfg.default_scope().unwrap(),
      TaskScope::Mine
    );
  }

  #[test]
  fn invalid_line_is_rejected() {
    let dir = tempdir().unwrap();
    let rc = dir.path().join("taskdeskrc");
    fs::write(&rc, "not a setting\n")
      .unwrap();

    let err =
      Config::load(Some(&rc)).unwrap_err();
    assert!(
      err
        .to_string()
        .contains("invalid config line")
    );
  }

  #[test]
  fn include_cycle_is_an_error() {
    let dir = tempdir().unwrap();
    let rc = dir.path().join("taskdeskrc");
    fs::write(&rc, "include taskdeskrc\n")
      .unwrap();

    let err =
      Config::load(Some(&rc)).unwrap_err();
    assert!(
      err
        .to_string()
        .contains("include cycle")
    );

    let a = dir.path().join("a.rc");
    let b = dir.path().join("b.rc");
    fs::write(&a, "color = off\ninclude b.rc\n")
      .unwrap();
    fs::write(&b, "include a.rc\n").unwrap();
    assert!(
      Config::load(Some(&a)).is_err()
    );
  }

  #[test]
  fn same_file_included_twice_is_not_a_cycle()
  {
    let dir = tempdir().unwrap();
    let common =
      dir.path().join("common.rc");
    fs::write(&common, "color = off\n")
      .unwrap();
    let rc = dir.path().join("taskdeskrc");
    fs::write(
      &rc,
      "include common.rc\n\
       include common.rc\n"
    )
    .unwrap();

    let cfg =
      Config::load(Some(&rc)).unwrap();
    assert_eq!(cfg.loaded_files.len(), 3);
    assert_eq!(
      cfg.get("color").as_deref(),
      Some("off")
    );
  }

  #[derive(Clone)]
  struct LogBuffer(Arc<Mutex<Vec<u8>>>);

  impl io::Write for LogBuffer {
    fn write(
      &mut self,
      buf: &[u8]
    ) -> io::Result<usize> {
      self.0.lock().extend_from_slice(buf);
      Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
      Ok(())
    }
  }

  #[test]
  fn unknown_sort_settings_warn_and_fall_back()
  {
    let logs = LogBuffer(Arc::new(
      Mutex::new(Vec::new())
    ));
    let writer = logs.clone();
    let subscriber =
      tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_max_level(
          tracing::Level::WARN
        )
        .with_ansi(false)
        .finish();

    let mut cfg = Config::default();
    cfg.apply_overrides([
      (
        "tasks.sort".to_string(),
        "priority".to_string()
      ),
      (
        "tasks.order".to_string(),
        "sideways".to_string()
      )
    ]);
    let sort =
      tracing::subscriber::with_default(
        subscriber,
        || cfg.default_sort()
      );

    assert_eq!(sort, SortState::default());
    let text =
      String::from_utf8(logs.0.lock().clone())
        .unwrap();
    assert!(text.contains("unknown tasks.sort"));
    assert!(text.contains("priority"));
    assert!(text.contains("unknown tasks.order"));
  }

  #[test]
  fn defaults_and_bad_values() {
    let mut cfg = Config::default();
    assert_eq!(
      cfg.default_sort().direction,
      SortDirection::Ascending
    );
    assert_eq!(
      cfg.display_timezone().unwrap(),
      chrono_tz::UTC
    );

    cfg.apply_overrides([
      (
        "tasks.sort".to_string(),
        "priority".to_string()
      ),
      (
        "api.timeout".to_string(),
        "soon".to_string()
      )
    ]);
    assert_eq!(
      cfg.default_sort().column,
      SortColumn::Id
    );
    assert!(cfg.api_timeout().is_err());
  }
}

use crate::domain::{Entry, MonthlyData, month_key, month_start};
use crate::error::{PlanError, Result};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const DATA_FILE: &str = "data.json";
const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Everything the model persists.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlanState {
    pub period_start: Option<NaiveDate>,
    pub window_offset: u32,
    pub months: BTreeMap<NaiveDate, MonthlyData>,
}

/// Durable home of a [`PlanState`].
///
/// Saves are full-state overwrites. Implementations must not partially apply
/// a failed save to what a later `load` returns.
pub trait PersistenceStore {
    fn load(&self) -> Result<PlanState>;
    fn save(&mut self, state: &PlanState) -> Result<()>;
    /// Copies the current durable state aside. `None` when there is nothing to copy.
    fn backup(&mut self) -> Result<Option<PathBuf>>;
}

/// Persisted layout. `E` is `Vec<Entry>` when writing; when reading, each
/// month's payload stays raw JSON until its key has been checked.
#[derive(Debug, Serialize, Deserialize)]
struct Document<E> {
    #[serde(default)]
    meta: Meta,
    #[serde(default = "BTreeMap::new")]
    entries: BTreeMap<String, E>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Meta {
    period_start: Option<NaiveDate>,
    #[serde(default)]
    window_offset: u32,
}

pub fn encode(state: &PlanState) -> Result<String> {
    let doc = Document {
        meta: Meta {
            period_start: state.period_start,
            window_offset: state.window_offset,
        },
        entries: state
            .months
            .iter()
            .map(|(month, md)| (month_key(*month), md.entries().to_vec()))
            .collect(),
    };
    Ok(serde_json::to_string_pretty(&doc)?)
}

/// Parses a persisted document.
///
/// Anything a hand edit can break is dropped with a warning instead of failing
/// the load: month keys that are not `YYYY-MM`, payloads that are not entry
/// arrays, entries that do not parse or validate, and entries filed under the
/// wrong month. A repeated (month, category, direction, kind) keeps the last
/// amount. `period_start` is moved to the first of its month.
pub fn decode(raw: &str) -> Result<PlanState> {
    let doc: Document<Value> = serde_json::from_str(raw)?;

    let mut months = BTreeMap::new();
    for (key, payload) in doc.entries {
        let Ok(month) = NaiveDate::parse_from_str(&format!("{key}-01"), "%Y-%m-%d") else {
            warn!(key = %key, "skipping malformed month key");
            continue;
        };
        let Value::Array(items) = payload else {
            warn!(key = %key, "skipping month whose entries are not a list");
            continue;
        };

        let mut md = MonthlyData::new(month);
        for item in items {
            let entry: Entry = match serde_json::from_value(item) {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(key = %key, "skipping unreadable entry: {err}");
                    continue;
                }
            };
            if let Err(err) = entry.validate() {
                warn!(key = %key, "skipping entry: {err}");
                continue;
            }
            if let Some(existing) = md.entries_mut().iter_mut().find(|e| e.same_slot(&entry)) {
                warn!(key = %key, category = %entry.category, "duplicate entry, keeping the last amount");
                existing.amount = entry.amount;
                continue;
            }
            if let Err(err) = md.add(entry) {
                warn!(key = %key, "skipping entry: {err}");
            }
        }
        months.insert(month, md);
    }

    Ok(PlanState {
        period_start: doc.meta.period_start.map(month_start),
        window_offset: doc.meta.window_offset,
        months,
    })
}

/// JSON file on disk, written atomically.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(DATA_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling `<stem>_backup_<timestamp>.json`, with a counter appended when
    /// a backup from the same second already exists.
    fn backup_path(&self) -> PathBuf {
        let stem = self
            .path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("data");
        let base = format!("{stem}_backup_{}", Local::now().format(BACKUP_TIMESTAMP_FORMAT));

        let mut target = self.path.with_file_name(format!("{base}.json"));
        let mut n = 1;
        while target.exists() {
            target = self.path.with_file_name(format!("{base}_{n}.json"));
            n += 1;
        }
        target
    }
}

impl PersistenceStore for JsonFileStore {
    fn load(&self) -> Result<PlanState> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no data file yet");
            return Ok(PlanState::default());
        }
        let raw = fs::read_to_string(&self.path).map_err(|e| {
            PlanError::persistence(format!("Failed to read {}", self.path.display()), e)
        })?;
        decode(&raw)
    }

    fn save(&mut self, state: &PlanState) -> Result<()> {
        let json = encode(state)?;
        atomic_write(&self.path, json.as_bytes())?;
        debug!(path = %self.path.display(), months = state.months.len(), "saved plan");
        Ok(())
    }

    fn backup(&mut self) -> Result<Option<PathBuf>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let target = self.backup_path();
        fs::copy(&self.path, &target).map_err(|e| {
            PlanError::persistence(
                format!(
                    "Failed to copy {} -> {}",
                    self.path.display(),
                    target.display()
                ),
                e,
            )
        })?;
        Ok(Some(target))
    }
}

fn atomic_write(path: &Path, contents: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent).map_err(|e| {
        PlanError::persistence(format!("Failed to create dir {}", parent.display()), e)
    })?;

    let tmp = parent.join(format!(
        ".{}.tmp",
        path.file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("finplan")
    ));

    {
        let mut f = fs::File::create(&tmp).map_err(|e| {
            PlanError::persistence(format!("Failed to create temp file {}", tmp.display()), e)
        })?;
        f.write_all(contents).map_err(|e| {
            PlanError::persistence(format!("Failed to write temp file {}", tmp.display()), e)
        })?;
        f.sync_all().map_err(|e| {
            PlanError::persistence(format!("Failed to sync temp file {}", tmp.display()), e)
        })?;
    }

    fs::rename(&tmp, path).map_err(|e| {
        PlanError::persistence(
            format!("Failed to rename {} -> {}", tmp.display(), path.display()),
            e,
        )
    })
}

/// In-memory store holding the encoded document, with failure injection.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    document: Option<String>,
    saves: usize,
    backups: Vec<String>,
    fail_saves: bool,
    fail_backups: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(raw: impl Into<String>) -> Self {
        Self {
            document: Some(raw.into()),
            ..Self::default()
        }
    }

    pub fn document(&self) -> Option<&str> {
        self.document.as_deref()
    }

    pub fn saves(&self) -> usize {
        self.saves
    }

    pub fn backups(&self) -> &[String] {
        &self.backups
    }

    pub fn set_fail_saves(&mut self, fail: bool) {
        self.fail_saves = fail;
    }

    pub fn set_fail_backups(&mut self, fail: bool) {
        self.fail_backups = fail;
    }
}

impl PersistenceStore for MemoryStore {
    fn load(&self) -> Result<PlanState> {
        match &self.document {
            Some(raw) => decode(raw),
            None => Ok(PlanState::default()),
        }
    }

    fn save(&mut self, state: &PlanState) -> Result<()> {
        if self.fail_saves {
            return Err(PlanError::persistence(
                "Failed to save plan",
                std::io::Error::other("save disabled"),
            ));
        }
        self.document = Some(encode(state)?);
        self.saves += 1;
        Ok(())
    }

    fn backup(&mut self) -> Result<Option<PathBuf>> {
        if self.fail_backups {
            return Err(PlanError::persistence(
                "Failed to back up plan",
                std::io::Error::other("backup disabled"),
            ));
        }
        let Some(doc) = self.document.clone() else {
            return Ok(None);
        };
        self.backups.push(doc);
        Ok(Some(PathBuf::from(format!(
            "memory-backup-{}",
            self.backups.len()
        ))))
    }
}

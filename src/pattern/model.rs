use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SequenceError {
    #[error("pattern index {index} out of range for {len} entries")]
    InvalidIndex { index: usize, len: usize },
    #[error("pattern list cannot be edited while the stopwatch is running")]
    EditWhileRunning,
}

/// One (duration, label) pair of the alarm sequence. Edits replace the
/// whole value; durations are never mutated mid-computation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternEntry {
    pub duration_ms: u64,
    pub label: String,
}

impl PatternEntry {
    pub fn new(duration_ms: u64, label: impl Into<String>) -> Self {
        Self {
            duration_ms,
            label: label.into(),
        }
    }

    pub fn from_hms(hours: u64, minutes: u64, seconds: u64, label: impl Into<String>) -> Self {
        Self::new((hours * 3_600 + minutes * 60 + seconds) * 1_000, label)
    }

    pub fn hms(&self) -> (u64, u64, u64) {
        let total_secs = self.duration_ms / 1_000;
        (total_secs / 3_600, (total_secs % 3_600) / 60, total_secs % 60)
    }
}

/// Ordered alarm entries plus the repeat flag. Insertion order is
/// semantic and never sorted. Any mutation invalidates schedule state
/// derived from this sequence; holders must recompute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternSequence {
    entries: Vec<PatternEntry>,
    repeat: bool,
}

impl Default for PatternSequence {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            repeat: true,
        }
    }
}

impl PatternSequence {
    pub fn new(entries: Vec<PatternEntry>, repeat: bool) -> Self {
        Self { entries, repeat }
    }

    pub fn entries(&self) -> &[PatternEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn repeat(&self) -> bool {
        self.repeat
    }

    pub fn set_repeat(&mut self, repeat: bool) {
        self.repeat = repeat;
    }

    pub fn total_cycle_ms(&self) -> u64 {
        self.entries.iter().map(|entry| entry.duration_ms).sum()
    }

    pub fn entry_at(&self, index: usize) -> Result<&PatternEntry, SequenceError> {
        self.entries.get(index).ok_or(SequenceError::InvalidIndex {
            index,
            len: self.entries.len(),
        })
    }

    pub fn push(&mut self, entry: PatternEntry) {
        self.entries.push(entry);
    }

    pub fn remove_at(&mut self, index: usize) -> Result<PatternEntry, SequenceError> {
        if index >= self.entries.len() {
            return Err(SequenceError::InvalidIndex {
                index,
                len: self.entries.len(),
            });
        }
        Ok(self.entries.remove(index))
    }

    pub fn update_at(&mut self, index: usize, entry: PatternEntry) -> Result<(), SequenceError> {
        match self.entries.get_mut(index) {
            Some(slot) => {
                *slot = entry;
                Ok(())
            }
            None => Err(SequenceError::InvalidIndex {
                index,
                len: self.entries.len(),
            }),
        }
    }

    pub fn move_entry(&mut self, from: usize, to: usize) -> Result<(), SequenceError> {
        let len = self.entries.len();
        if from >= len {
            return Err(SequenceError::InvalidIndex { index: from, len });
        }
        if to >= len {
            return Err(SequenceError::InvalidIndex { index: to, len });
        }
        let entry = self.entries.remove(from);
        self.entries.insert(to, entry);
        Ok(())
    }
}

/// Parsed pattern file. `repeat` is `None` for the legacy bare-array
/// form, which leaves the caller's current setting untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternFile {
    pub entries: Vec<PatternEntry>,
    pub repeat: Option<bool>,
}

pub fn load_pattern_file(path: &Path) -> Result<PatternFile> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("unable to read pattern file {}", path.display()))?;
    parse_pattern_file_text(&content)
}

/// Accepts `{ "repeat": bool, "patterns": [...] }` or a bare array of
/// entry objects. All-or-nothing: any invalid entry rejects the whole
/// file and no partial list is produced.
pub fn parse_pattern_file_text(content: &str) -> Result<PatternFile> {
    if content.trim().is_empty() {
        bail!("pattern file is empty");
    }
    let root = serde_json::from_str::<Value>(content).map_err(|err| {
        let line = err.line();
        let column = err.column();
        anyhow::anyhow!("invalid JSON at line {line}, column {column}: {err}")
    })?;

    let (repeat, raw_entries) = match root {
        Value::Array(items) => (None, items),
        Value::Object(mut fields) => {
            let repeat = match fields.get("repeat") {
                Some(Value::Bool(flag)) => Some(*flag),
                _ => None,
            };
            match fields.remove("patterns") {
                Some(Value::Array(items)) => (repeat, items),
                _ => bail!(
                    "unsupported pattern file shape; expected an array or an object with a \"patterns\" array"
                ),
            }
        }
        _ => bail!(
            "unsupported pattern file shape; expected an array or an object with a \"patterns\" array"
        ),
    };

    let mut entries = Vec::with_capacity(raw_entries.len());
    for (index, item) in raw_entries.into_iter().enumerate() {
        if !item.is_object() {
            bail!("pattern {index} is not an object");
        }
        let raw: PatternEntryFile = serde_json::from_value(item)?;
        if !raw.is_recognized() {
            bail!("pattern {index} has none of the hours/minutes/seconds/message fields");
        }
        entries.push(PatternEntry::from_hms(
            time_component(raw.hours.as_ref()),
            time_component(raw.minutes.as_ref()),
            time_component(raw.seconds.as_ref()),
            message_text(raw.message.as_ref()),
        ));
    }

    Ok(PatternFile { entries, repeat })
}

#[derive(Debug, Deserialize)]
struct PatternEntryFile {
    hours: Option<Value>,
    minutes: Option<Value>,
    seconds: Option<Value>,
    message: Option<Value>,
}

impl PatternEntryFile {
    fn is_recognized(&self) -> bool {
        self.hours.is_some()
            || self.minutes.is_some()
            || self.seconds.is_some()
            || self.message.is_some()
    }
}

// Legacy files carry time fields as zero-padded strings or numbers;
// anything non-numeric counts as 0.
fn time_component(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::Number(number)) => number.as_u64().unwrap_or(0),
        Some(Value::String(text)) => text.trim().parse::<u64>().unwrap_or(0),
        _ => 0,
    }
}

fn message_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(text)) => text.clone(),
        _ => String::new(),
    }
}

pub fn save_pattern_file(path: &Path, sequence: &PatternSequence) -> Result<()> {
    let patterns = sequence
        .entries()
        .iter()
        .map(|entry| {
            let (hours, minutes, seconds) = entry.hms();
            json!({
                "hours": format!("{hours:02}"),
                "minutes": format!("{minutes:02}"),
                "seconds": format!("{seconds:02}"),
                "message": entry.label,
            })
        })
        .collect::<Vec<_>>();
    let payload = json!({
        "repeat": sequence.repeat(),
        "patterns": patterns,
    });
    let text = serde_json::to_string_pretty(&payload)?;
    fs::write(path, format!("{text}\n"))
        .with_context(|| format!("unable to write pattern file {}", path.display()))?;
    Ok(())
}

pub fn export_file_name(date: NaiveDate) -> String {
    format!("SeagullWatch_{}.json", date.format("%Y-%m-%d"))
}

//! Append-only audit trail of decisions and faults
//!
//! [`JsonlAuditSink`] writes one JSON object per line to `decisions.jsonl`
//! and `faults.jsonl`. Appends are serialised by a mutex so match tasks can
//! share one sink. Each append is a small synchronous write made from the
//! calling task; a slow disk stalls that task's worker thread for the
//! duration of the write.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::fault::FaultEvent;

pub const DECISIONS_FILE: &str = "decisions.jsonl";
pub const FAULTS_FILE: &str = "faults.jsonl";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionMode {
    Single,
    Hybrid,
}

/// Why the chosen action won arbitration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rationale {
    Agreement,
    Fallback,
    AdvisoryUnavailable,
    SingleStrategy,
    /// Recovery replaced the decided action after a fault
    Substitute,
}

/// One decided turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub timestamp_ms: i64,
    pub match_id: String,
    pub turn: u32,
    pub mode: DecisionMode,
    pub strategy: String,
    pub search_action: Option<String>,
    pub search_confidence: Option<f64>,
    pub advisory_action: Option<String>,
    pub advisory_confidence: Option<f64>,
    pub chosen_action: String,
    pub rationale: Rationale,
    pub search_ms: u64,
    pub advisory_ms: Option<u64>,
    #[serde(default)]
    pub team_preview: bool,
}

pub trait AuditSink: Send + Sync {
    fn record_decision(&self, record: &DecisionRecord) -> Result<()>;

    fn record_fault(&self, fault: &FaultEvent) -> Result<()>;

    /// Every decision in append order
    fn decisions(&self) -> Result<Vec<DecisionRecord>>;

    fn faults(&self) -> Result<Vec<FaultEvent>>;

    fn latest_decision(&self) -> Result<Option<DecisionRecord>> {
        Ok(self.decisions()?.pop())
    }

    /// Last `n` decisions, oldest first
    fn recent_decisions(&self, n: usize) -> Result<Vec<DecisionRecord>> {
        let mut all = self.decisions()?;
        let start = all.len().saturating_sub(n);
        Ok(all.split_off(start))
    }

    fn decisions_for_match(&self, match_id: &str) -> Result<Vec<DecisionRecord>> {
        Ok(self
            .decisions()?
            .into_iter()
            .filter(|r| r.match_id == match_id)
            .collect())
    }
}

pub struct JsonlAuditSink {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl JsonlAuditSink {
    /// Open (creating if needed) the audit directory
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create audit directory {}", dir.display()))?;

        Ok(Self {
            dir,
            lock: Mutex::new(()),
        })
    }

    fn append<T: Serialize>(&self, file: &str, value: &T) -> Result<()> {
        let mut line = serde_json::to_string(value)?;
        line.push('\n');

        let path = self.dir.join(file);
        let _guard = self
            .lock
            .lock()
            .map_err(|_| anyhow!("Audit sink lock poisoned"))?;
        let mut out = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        out.write_all(line.as_bytes())?;
        Ok(())
    }

    fn read_all<T: DeserializeOwned>(&self, file: &str) -> Result<Vec<T>> {
        let path = self.dir.join(file);
        let _guard = self
            .lock
            .lock()
            .map_err(|_| anyhow!("Audit sink lock poisoned"))?;

        let input = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).with_context(|| format!("Failed to open {}", path.display())),
        };

        let mut out = Vec::new();
        for (number, line) in BufReader::new(input).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(value) => out.push(value),
                Err(e) => {
                    tracing::warn!(file = file, line = number + 1, error = %e, "Skipping corrupt audit line");
                }
            }
        }
        Ok(out)
    }
}

impl AuditSink for JsonlAuditSink {
    fn record_decision(&self, record: &DecisionRecord) -> Result<()> {
        self.append(DECISIONS_FILE, record)
    }

    fn record_fault(&self, fault: &FaultEvent) -> Result<()> {
        self.append(FAULTS_FILE, fault)
    }

    fn decisions(&self) -> Result<Vec<DecisionRecord>> {
        self.read_all(DECISIONS_FILE)
    }

    fn faults(&self) -> Result<Vec<FaultEvent>> {
        self.read_all(FAULTS_FILE)
    }
}

/// In-process sink, for tests and dry runs
#[derive(Default)]
pub struct MemoryAuditSink {
    decisions: Mutex<Vec<DecisionRecord>>,
    faults: Mutex<Vec<FaultEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record_decision(&self, record: &DecisionRecord) -> Result<()> {
        self.decisions
            .lock()
            .map_err(|_| anyhow!("Audit sink lock poisoned"))?
            .push(record.clone());
        Ok(())
    }

    fn record_fault(&self, fault: &FaultEvent) -> Result<()> {
        self.faults
            .lock()
            .map_err(|_| anyhow!("Audit sink lock poisoned"))?
            .push(fault.clone());
        Ok(())
    }

    fn decisions(&self) -> Result<Vec<DecisionRecord>> {
        self.decisions
            .lock()
            .map(|d| d.clone())
            .map_err(|_| anyhow!("Audit sink lock poisoned"))
    }

    fn faults(&self) -> Result<Vec<FaultEvent>> {
        self.faults
            .lock()
            .map(|f| f.clone())
            .map_err(|_| anyhow!("Audit sink lock poisoned"))
    }
}

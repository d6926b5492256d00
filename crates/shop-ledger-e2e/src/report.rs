//! JSONL journey report: one line per step, appended as the journey runs.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Passed,
    Failed,
}

/// A single journey step outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub timestamp: String,
    pub step: String,
    pub status: StepStatus,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl StepRecord {
    pub fn passed(step: &str, duration_ms: u64) -> Self {
        Self::new(step, StepStatus::Passed, duration_ms, None)
    }

    pub fn failed(step: &str, duration_ms: u64, detail: String) -> Self {
        Self::new(step, StepStatus::Failed, duration_ms, Some(detail))
    }

    fn new(step: &str, status: StepStatus, duration_ms: u64, detail: Option<String>) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            step: step.to_string(),
            status,
            duration_ms,
            detail,
        }
    }
}

/// Step records of one run, optionally mirrored to a JSONL file.
#[derive(Debug, Default)]
pub struct JourneyReport {
    steps: Vec<StepRecord>,
    file: Option<(File, PathBuf)>,
}

impl JourneyReport {
    /// A report that is only kept in memory.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open or create a JSONL report file; records are appended.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open journey report: {}", path.display()))?;

        Ok(Self {
            steps: Vec::new(),
            file: Some((file, path.to_path_buf())),
        })
    }

    /// Keep a record and append it to the file, if any. A failed write is
    /// logged and does not fail the journey.
    pub fn record(&mut self, record: StepRecord) {
        if let Some((file, path)) = self.file.as_mut() {
            let written = serde_json::to_string(&record)
                .map_err(anyhow::Error::from)
                .and_then(|json| writeln!(file, "{json}").map_err(anyhow::Error::from));
            if let Err(e) = written {
                tracing::warn!(path = %path.display(), "failed to write journey report: {e}");
            }
        }
        self.steps.push(record);
    }

    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    pub fn passed(&self) -> bool {
        self.steps.iter().all(|s| s.status == StepStatus::Passed)
    }

    pub fn failed_step(&self) -> Option<&StepRecord> {
        self.steps.iter().find(|s| s.status == StepStatus::Failed)
    }

    pub fn path(&self) -> Option<&Path> {
        self.file.as_ref().map(|(_, path)| path.as_path())
    }
}

//! Run reports
//!
//! A [`RunReport`] collects everything one audit run produced and is
//! rendered as pretty-printed JSON.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::attack::AttackAttempt;
use crate::error::{GatecrashError, ResultExt};
use crate::prober::ProbeResult;
use crate::session::{AuthMode, AuthResult};
use crate::target::TargetVariant;

/// Report metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Target base URL
    pub target: String,
    pub variant: TargetVariant,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Tool version
    pub version: String,
}

/// Summary counts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportSummary {
    pub probed: usize,
    /// Probe results per classification
    pub by_classification: BTreeMap<String, usize>,
    pub attempts: usize,
    pub successful_attempts: usize,
}

impl ReportSummary {
    pub fn from_results(probes: &[ProbeResult], attempts: &[AttackAttempt]) -> Self {
        let mut by_classification = BTreeMap::new();
        for probe in probes {
            *by_classification
                .entry(probe.classification.name().to_string())
                .or_insert(0) += 1;
        }

        Self {
            probed: probes.len(),
            by_classification,
            attempts: attempts.len(),
            successful_attempts: attempts.iter().filter(|a| a.outcome().is_success()).count(),
        }
    }
}

/// Complete record of one audit run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub metadata: ReportMetadata,
    pub summary: ReportSummary,
    /// Mode the session ended up in
    pub auth_mode: AuthMode,
    /// Login outcome, when credentials were hunted
    pub login: Option<AuthResult>,
    pub probes: Vec<ProbeResult>,
    pub attempts: Vec<AttackAttempt>,
    /// Structural weaknesses of the captured token
    pub token_notes: Vec<String>,
}

impl RunReport {
    pub fn new(target: &str, variant: TargetVariant, started_at: DateTime<Utc>) -> Self {
        Self {
            metadata: ReportMetadata {
                target: target.to_string(),
                variant,
                started_at,
                finished_at: started_at,
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            summary: ReportSummary::default(),
            auth_mode: AuthMode::None,
            login: None,
            probes: Vec::new(),
            attempts: Vec::new(),
            token_notes: Vec::new(),
        }
    }

    /// Stamp the finish time and recompute the summary
    pub fn finish(&mut self) {
        self.metadata.finished_at = Utc::now();
        self.summary = ReportSummary::from_results(&self.probes, &self.attempts);
    }

    pub fn to_json(&self) -> Result<String, GatecrashError> {
        serde_json::to_string_pretty(self).with_context("Failed to serialize report")
    }

    pub fn save(&self, path: &Path) -> Result<(), GatecrashError> {
        let json = self.to_json()?;
        std::fs::write(path, json).with_context(format!("Failed to write report to {}", path.display()))
    }
}

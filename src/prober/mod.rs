//! Concurrent endpoint discovery
//!
//! Candidate paths are fetched through the session with a bounded
//! fan-out and each response is classified on its own. Results come
//! back in completion order; each one carries its path.

mod classify;

pub use classify::{classify, ProbeClassification};

use std::path::{Path, PathBuf};

use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::app::ProberConfig;
use crate::http::SessionClient;
use crate::target::MarkerSet;

/// Snapshot of the response a classification was based on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    /// URL after redirects
    pub final_url: String,
    /// Page `<title>`
    pub title: Option<String>,
    /// Leading part of the body
    pub snapshot: String,
    /// Whether `snapshot` was cut short
    pub truncated: bool,
}

/// Outcome of one endpoint check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    /// Path as supplied by the caller
    pub path: String,
    /// Resolved request URL
    pub url: String,
    /// HTTP status, absent on transport failure
    pub status: Option<u16>,
    pub classification: ProbeClassification,
    pub evidence: Option<Evidence>,
    /// Transport failure cause
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl ProbeResult {
    pub fn is_accessible(&self) -> bool {
        self.classification == ProbeClassification::Accessible
    }
}

/// Cut `text` to at most `max_bytes`, backing off to a char boundary
fn truncate_at_char_boundary(text: &str, max_bytes: usize) -> (&str, bool) {
    if text.len() <= max_bytes {
        return (text, false);
    }
    let mut end = max_bytes;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    (&text[..end], true)
}

/// Fetches and classifies candidate endpoints
#[derive(Debug, Clone)]
pub struct EndpointProber {
    markers: MarkerSet,
    settings: ProberConfig,
}

impl EndpointProber {
    pub fn new(markers: MarkerSet, settings: ProberConfig) -> Self {
        Self { markers, settings }
    }

    /// Probe every path with at most `max_concurrent` requests in flight.
    ///
    /// Transport failures become `Unreachable` results. Dropping the
    /// returned future abandons the requests still outstanding.
    pub async fn probe(&self, client: &SessionClient, paths: &[String]) -> Vec<ProbeResult> {
        let limit = self.settings.max_concurrent.max(1);
        tracing::info!(paths = paths.len(), max_concurrent = limit, "Probing endpoints");

        let semaphore = Semaphore::new(limit);
        let gate = &semaphore;

        let mut pending: FuturesUnordered<_> = paths
            .iter()
            .map(move |path| async move {
                let _permit = gate.acquire().await.ok();
                self.probe_one(client, path).await
            })
            .collect();

        let mut results = Vec::with_capacity(paths.len());
        while let Some(result) = pending.next().await {
            results.push(result);
        }

        let accessible = results.iter().filter(|r| r.is_accessible()).count();
        tracing::info!(probed = results.len(), accessible, "Probe complete");
        results
    }

    async fn probe_one(&self, client: &SessionClient, path: &str) -> ProbeResult {
        let url = client
            .target()
            .resolve(path)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| path.to_string());

        match client.get(path, &[]).await {
            Ok(response) => {
                let body = response.body_text();
                let classification = classify(response.status, &body, &response.final_url, path, &self.markers);

                let evidence = if body.is_empty() {
                    None
                } else {
                    let (snapshot, truncated) = truncate_at_char_boundary(&body, self.settings.max_evidence_bytes);
                    Some(Evidence {
                        final_url: response.final_url.clone(),
                        title: response.title(),
                        snapshot: snapshot.to_string(),
                        truncated,
                    })
                };

                if classification == ProbeClassification::Accessible {
                    tracing::info!(path, status = response.status, "Accessible endpoint");
                } else {
                    tracing::debug!(path, status = response.status, %classification, "Endpoint classified");
                }

                ProbeResult {
                    path: path.to_string(),
                    url,
                    status: Some(response.status),
                    classification,
                    evidence,
                    error: None,
                    duration_ms: response.duration_ms,
                }
            }
            Err(e) => {
                tracing::warn!(path, error = %e, "Endpoint unreachable");
                ProbeResult {
                    path: path.to_string(),
                    url,
                    status: None,
                    classification: ProbeClassification::Unreachable,
                    evidence: None,
                    error: Some(e.to_string()),
                    duration_ms: 0,
                }
            }
        }
    }
}

/// Write the evidence of every accessible result to `dir`, one HTML
/// file per path. Existing files are never overwritten; a clashing name
/// gets a numeric suffix. Returns the files written.
pub fn save_loot(dir: &Path, results: &[ProbeResult]) -> std::io::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;

    let mut written = Vec::new();
    for result in results.iter().filter(|r| r.is_accessible()) {
        let Some(evidence) = &result.evidence else {
            continue;
        };
        let file = unused_file(dir, &loot_file_stem(&result.path));
        std::fs::write(&file, &evidence.snapshot)?;
        tracing::info!(path = %result.path, file = %file.display(), "Saved evidence");
        written.push(file);
    }
    Ok(written)
}

fn loot_file_stem(path: &str) -> String {
    let stem: String = path
        .trim_matches('/')
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
        .collect();
    if stem.is_empty() {
        "index".to_string()
    } else {
        stem
    }
}

/// First of `stem.html`, `stem-2.html`, ... not yet present in `dir`
fn unused_file(dir: &Path, stem: &str) -> PathBuf {
    let first = dir.join(format!("{}.html", stem));
    if !first.exists() {
        return first;
    }
    (2..)
        .map(|n| dir.join(format!("{}-{}.html", stem, n)))
        .find(|candidate| !candidate.exists())
        .unwrap_or(first)
}

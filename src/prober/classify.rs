//! Response classification
//!
//! One variant-agnostic function; the per-variant knowledge lives in
//! the [`MarkerSet`] it is given.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::target::MarkerSet;

/// Verdict for one probed endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeClassification {
    /// Privileged content was served to this session
    Accessible,
    /// The resource exists but access was denied (401/403)
    Protected,
    /// Not found, soft-404, or bounced to the login form
    Rejected,
    /// Status 200 with no marker matched, or an unexpected status
    Inconclusive,
    /// Transport failure, no response
    Unreachable,
}

impl ProbeClassification {
    pub fn all() -> &'static [ProbeClassification] {
        &[
            ProbeClassification::Accessible,
            ProbeClassification::Protected,
            ProbeClassification::Rejected,
            ProbeClassification::Inconclusive,
            ProbeClassification::Unreachable,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            ProbeClassification::Accessible => "accessible",
            ProbeClassification::Protected => "protected",
            ProbeClassification::Rejected => "rejected",
            ProbeClassification::Inconclusive => "inconclusive",
            ProbeClassification::Unreachable => "unreachable",
        }
    }

    /// Whether the endpoint is worth replaying forged artifacts against
    pub fn is_live(&self) -> bool {
        matches!(
            self,
            ProbeClassification::Accessible | ProbeClassification::Protected | ProbeClassification::Inconclusive
        )
    }
}

impl std::fmt::Display for ProbeClassification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

fn contains_any(haystack: &str, needles: &[String]) -> bool {
    needles
        .iter()
        .filter(|n| !n.is_empty())
        .any(|n| haystack.contains(&n.to_lowercase()))
}

/// Path and query of `final_url`; host names never count as markers
fn url_location(final_url: &str) -> String {
    match Url::parse(final_url) {
        Ok(url) => match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        },
        Err(_) => final_url.to_string(),
    }
}

/// Classify a response from its status, body, final URL and the path
/// that was requested. Deterministic; no state is carried between calls.
pub fn classify(
    status: u16,
    body: &str,
    final_url: &str,
    requested_path: &str,
    markers: &MarkerSet,
) -> ProbeClassification {
    match status {
        401 | 403 => return ProbeClassification::Protected,
        404 | 410 => return ProbeClassification::Rejected,
        200 => {}
        _ => return ProbeClassification::Inconclusive,
    }

    let body = body.to_lowercase();
    let location = url_location(final_url).to_lowercase();
    let requested_path = requested_path.to_lowercase();

    if contains_any(&body, &markers.negative_body) {
        return ProbeClassification::Rejected;
    }

    // Redirected to the login form
    let bounced = markers
        .login_url
        .iter()
        .filter(|m| !m.is_empty())
        .map(|m| m.to_lowercase())
        .any(|m| location.contains(&m) && !requested_path.contains(&m));
    if bounced {
        return ProbeClassification::Rejected;
    }

    if contains_any(&body, &markers.positive_body) || contains_any(&location, &markers.positive_url) {
        return ProbeClassification::Accessible;
    }

    ProbeClassification::Inconclusive
}

//! HTTP response types

use std::collections::HashMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// HTTP response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// HTTP status code
    pub status: u16,

    /// URL after redirects were followed
    pub final_url: String,

    /// Response headers, names lowercased
    pub headers: HashMap<String, String>,

    /// Raw `Set-Cookie` values, one per header line
    pub set_cookies: Vec<String>,

    /// Response body
    pub body: Vec<u8>,

    /// Response time in milliseconds
    pub duration_ms: u64,
}

impl Response {
    /// Get body as string
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }

    /// Get a specific header (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        let name_lower = name.to_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| k.to_lowercase() == name_lower)
            .map(|(_, v)| v.as_str())
    }

    /// Page `<title>`, trimmed
    pub fn title(&self) -> Option<String> {
        extract_title(&self.body_text())
    }
}

/// Extract the first `<title>` element of an HTML document
pub fn extract_title(html: &str) -> Option<String> {
    let re = Regex::new(r"(?is)<title[^>]*>(.*?)</title>").ok()?;
    re.captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|t| !t.is_empty())
}

impl Default for Response {
    fn default() -> Self {
        Self {
            status: 0,
            final_url: String::new(),
            headers: HashMap::new(),
            set_cookies: Vec::new(),
            body: Vec::new(),
            duration_ms: 0,
        }
    }
}

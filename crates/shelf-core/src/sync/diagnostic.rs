//! Human-readable summaries of failed remote responses
//!
//! The remote may answer a failure with structured JSON, an HTML error page
//! from a proxy, or plain text. Each is reduced to one short message.

use scraper::{Html, Selector};
use serde::Deserialize;

/// Longest diagnostic kept from an unstructured body
const MAX_DIAGNOSTIC_LEN: usize = 200;

/// Structured error body: `{"error": ..., "message": ..., "details": ...}`
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Option<serde_json::Value>,
}

impl ErrorBody {
    fn summary(self) -> Option<String> {
        let mut parts: Vec<String> = Vec::new();
        if let Some(error) = self.error.filter(|s| !s.trim().is_empty()) {
            parts.push(error.trim().to_string());
        }
        if let Some(message) = self.message.filter(|s| !s.trim().is_empty()) {
            parts.push(message.trim().to_string());
        }
        let mut summary = parts.join(": ");

        match self.details {
            None | Some(serde_json::Value::Null) => {}
            Some(serde_json::Value::String(details)) if !details.trim().is_empty() => {
                summary = join_details(summary, details.trim());
            }
            Some(serde_json::Value::String(_)) => {}
            Some(other) => summary = join_details(summary, &other.to_string()),
        }

        if summary.is_empty() {
            None
        } else {
            Some(summary)
        }
    }
}

fn join_details(summary: String, details: &str) -> String {
    if summary.is_empty() {
        details.to_string()
    } else {
        format!("{} ({})", summary, details)
    }
}

/// Describe a failed response body
///
/// Tries structured JSON first, then an HTML `<title>` or `<h1>`, then the
/// first non-empty line of the body, truncated.
pub fn describe_failure(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "empty response body".to_string();
    }

    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(trimmed) {
        if let Some(summary) = parsed.summary() {
            return truncate(&summary);
        }
    }

    if looks_like_html(trimmed) {
        if let Some(heading) = extract_html_heading(trimmed) {
            return truncate(&heading);
        }
    }

    describe_body(trimmed)
}

/// Short excerpt of an arbitrary body, used for unparseable success bodies
pub fn describe_body(body: &str) -> String {
    let first_line = body
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("");
    if first_line.is_empty() {
        return "empty response body".to_string();
    }
    truncate(first_line)
}

fn looks_like_html(body: &str) -> bool {
    let head: String = body.chars().take(256).collect::<String>().to_ascii_lowercase();
    head.contains("<html") || head.contains("<!doctype html") || head.contains("<title")
        || head.contains("<h1")
}

/// `<title>` text, falling back to the first `<h1>`
fn extract_html_heading(body: &str) -> Option<String> {
    let document = Html::parse_document(body);
    ["title", "h1"].iter().find_map(|css| {
        let selector = Selector::parse(css).ok()?;
        document
            .select(&selector)
            .next()
            .map(|el| el.text().collect::<Vec<_>>().join(" "))
            .map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|text| !text.is_empty())
    })
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= MAX_DIAGNOSTIC_LEN {
        return text.to_string();
    }
    let cut: String = text.chars().take(MAX_DIAGNOSTIC_LEN).collect();
    format!("{}...", cut)
}

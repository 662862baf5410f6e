//! Block page rendering from a cached HTML template.
//!
//! The template carries two literal placeholders, `{{ REASON }}` and
//! `{{ BLOCKED_URL }}`. Values are inserted verbatim: they come from the
//! request and are untrusted, but no escaping is applied here.

use arc_swap::ArcSwap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

pub const REASON_TOKEN: &str = "{{ REASON }}";
pub const BLOCKED_URL_TOKEN: &str = "{{ BLOCKED_URL }}";

const FALLBACK_TEMPLATE: &str = r#"<!DOCTYPE html>
<html><head><title>Access Denied</title></head>
<body><h1>403 Forbidden</h1>
<p>Access to {{ BLOCKED_URL }} was denied by A.R.G.U.S.</p>
<p>Reason: {{ REASON }}</p>
<p>Error: Custom block page template is missing.</p></body></html>
"#;

pub struct BlockPageRenderer {
    path: PathBuf,
    template: ArcSwap<String>,
}

impl BlockPageRenderer {
    /// Loads the template at `path`, falling back to a built-in page.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let template = read_template(&path);
        Self {
            path,
            template: ArcSwap::from_pointee(template),
        }
    }

    /// Uses `template` as-is, without a backing file.
    pub fn from_template(template: impl Into<String>) -> Self {
        Self {
            path: PathBuf::new(),
            template: ArcSwap::from_pointee(template.into()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-reads the template file on demand.
    pub fn reload(&self) {
        if self.path.as_os_str().is_empty() {
            return;
        }
        self.template.store(Arc::new(read_template(&self.path)));
    }

    pub fn template(&self) -> Arc<String> {
        self.template.load_full()
    }

    pub fn render(&self, reason: &str, blocked_url: &str) -> String {
        substitute(&self.template.load(), reason, blocked_url)
    }
}

fn read_template(path: &Path) -> String {
    match fs::read_to_string(path) {
        Ok(template) => {
            info!(
                "Successfully loaded block page template from: {}",
                path.display()
            );
            template
        }
        Err(e) => {
            error!(
                "Block page template not available at '{}': {}. Using a basic fallback block page.",
                path.display(),
                e
            );
            FALLBACK_TEMPLATE.to_string()
        }
    }
}

/// Single left-to-right pass: inserted values are never scanned for tokens.
fn substitute(template: &str, reason: &str, blocked_url: &str) -> String {
    let mut out = String::with_capacity(template.len() + reason.len() + blocked_url.len());
    let mut rest = template;

    loop {
        let next_reason = rest.find(REASON_TOKEN);
        let next_url = rest.find(BLOCKED_URL_TOKEN);

        let (idx, token, value) = match (next_reason, next_url) {
            (Some(r), Some(u)) if r < u => (r, REASON_TOKEN, reason),
            (_, Some(u)) => (u, BLOCKED_URL_TOKEN, blocked_url),
            (Some(r), None) => (r, REASON_TOKEN, reason),
            (None, None) => break,
        };

        out.push_str(&rest[..idx]);
        out.push_str(value);
        rest = &rest[idx + token.len()..];
    }

    out.push_str(rest);
    out
}

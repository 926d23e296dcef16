//! Job-Id Token Extraction
//!
//! Recovery heuristic for inbound messages from unknown phones: a `#`
//! followed by an alphanumeric run is treated as a job-id reference
//! (e.g. "please check #ORD77"). The first token wins.

use once_cell::sync::Lazy;
use regex::Regex;

static JOB_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"#([A-Za-z0-9][A-Za-z0-9_-]*)").expect("valid job token pattern"));

/// Extract the first `#token` job-id reference from a message body.
pub fn job_token(body: &str) -> Option<String> {
    JOB_TOKEN
        .captures(body)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

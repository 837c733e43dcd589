//! Deployment model naming
//!
//! Every (repository URL, branch) pair deploys into its own model. The name is
//! derived here so that every process resolves the same pair to the same model.

use sha2::{Digest, Sha256};

/// Number of hex digits of the fingerprint appended to model names
const FINGERPRINT_LEN: usize = 8;

/// Longest model name the controller accepts
pub const MAX_MODEL_NAME_LEN: usize = 63;

/// Resolves the model name for a repository URL and branch
///
/// The URL and branch are reduced to lowercase `[a-z0-9-]` slugs (scheme and
/// path separators and dots become `-`) and suffixed with a short SHA-256
/// fingerprint of the raw pair, so pairs whose slugs coincide still resolve to
/// different models. Long slugs are truncated so the whole name fits in
/// [`MAX_MODEL_NAME_LEN`] characters; the fingerprint is always kept.
///
/// ```
/// use slipway_core::domain::model_name;
///
/// let name = model_name("https://example.com/org/repo.git", "main");
/// assert!(name.starts_with("https-example-com-org-repo-git-main-"));
/// ```
pub fn model_name(url: &str, branch: &str) -> String {
    let mut name = [slug(url), slug(branch)]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-");

    // Slugs are ASCII, so byte truncation stays on a char boundary
    name.truncate(MAX_MODEL_NAME_LEN - FINGERPRINT_LEN - 1);
    while name.ends_with('-') {
        name.pop();
    }

    if !name.is_empty() {
        name.push('-');
    }
    name.push_str(&fingerprint(url, branch));
    name
}

fn slug(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            out.push(c);
        } else if !out.is_empty() && !out.ends_with('-') {
            out.push('-');
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

fn fingerprint(url: &str, branch: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hasher.update(b"\n");
    hasher.update(branch.as_bytes());
    let digest = hasher.finalize();

    let mut hex: String = digest.iter().map(|byte| format!("{:02x}", byte)).collect();
    hex.truncate(FINGERPRINT_LEN);
    hex
}

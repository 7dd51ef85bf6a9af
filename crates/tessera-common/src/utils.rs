//! Utility functions for Tessera
//!
//! Common helper functions used across the codebase.

use std::sync::LazyLock;

use rand::Rng;
use sha2::{Digest, Sha256};

/// Regex pattern for validating database and connection identifiers
static IDENTIFIER_PATTERN: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new("^[a-zA-Z][a-zA-Z0-9_]*$").expect("Invalid regex pattern"));

/// Length of the hex-encoded permission key
const PERMISSION_KEY_LEN: usize = 16;

/// Characters used for generated passwords
const PASSWORD_CHARSET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!@#$%^&*";

/// Validate a database or connection identifier.
///
/// Identifiers are interpolated into DDL statements (`CREATE DATABASE`),
/// so only a conservative character set is accepted: a leading letter
/// followed by alphanumerics and underscores.
///
/// # Examples
///
/// ```
/// use tessera_common::is_valid_identifier;
///
/// assert!(is_valid_identifier("client_42"));
/// assert!(!is_valid_identifier("42_client"));
/// assert!(!is_valid_identifier("db; DROP TABLE"));
/// ```
pub fn is_valid_identifier(name: &str) -> bool {
    !name.is_empty() && name.len() <= 64 && IDENTIFIER_PATTERN.is_match(name)
}

/// Derive a URL-safe slug from a display name.
///
/// Lowercases, maps runs of non-alphanumeric characters to single hyphens,
/// and trims leading/trailing hyphens.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_hyphen = true;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_hyphen = false;
        } else if !last_hyphen {
            slug.push('-');
            last_hyphen = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Deterministic permission key for a route name.
///
/// Stable across runs and hosts so that regenerating the permission
/// catalogue upserts the same rows instead of accumulating duplicates.
pub fn permission_key(route_name: &str) -> String {
    let digest = Sha256::digest(route_name.as_bytes());
    const_hex::encode(&digest[..PERMISSION_KEY_LEN / 2])
}

/// Generate a random password of the given length.
///
/// Used for first-use administrator accounts; the caller is expected to
/// hash it before persisting.
pub fn generate_password(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| {
            let idx = rng.random_range(0..PASSWORD_CHARSET.len());
            PASSWORD_CHARSET[idx] as char
        })
        .collect()
}

//! Recipient parsing.
//!
//! An address must pass a permissive shape test (`local@domain.tld`: no
//! whitespace, one `@`, a dot after it) and must also parse as a lettre
//! [`Address`]. Addresses failing either check are dropped here, before any
//! transport is opened.

use std::fmt;
use std::sync::LazyLock;

use lettre::Address;
use regex::Regex;

static EMAIL_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
});

/// Separators accepted between addresses.
const SEPARATORS: [char; 3] = [',', ';', '\n'];

/// Whether `candidate` looks like an email address the transport can
/// address a message to.
pub fn is_valid_email(candidate: &str) -> bool {
    EMAIL_SHAPE.is_match(candidate) && candidate.parse::<Address>().is_ok()
}

/// Split a free-text recipient field into valid addresses.
///
/// Order is preserved and duplicates are kept.
pub fn parse_recipients(raw: &str) -> Vec<String> {
    raw.split(SEPARATORS)
        .map(str::trim)
        .filter(|part| !part.is_empty() && is_valid_email(part))
        .map(str::to_string)
        .collect()
}

/// A non-empty list of syntactically valid recipient addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientList(Vec<String>);

impl RecipientList {
    /// Parse `raw`; `None` when no valid address remains.
    pub fn parse(raw: &str) -> Option<Self> {
        let addresses = parse_recipients(raw);
        if addresses.is_empty() {
            None
        } else {
            Some(Self(addresses))
        }
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for RecipientList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(", "))
    }
}

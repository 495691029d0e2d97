use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Canonical relationship tag for a non-assistant sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relationship {
    Mom,
    Dad,
    Other,
}

impl Relationship {
    pub fn label(self) -> &'static str {
        match self {
            Relationship::Mom => "mom",
            Relationship::Dad => "dad",
            Relationship::Other => "other",
        }
    }
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One known contact: any of the listed identifiers resolves to the
/// relationship, matched case-insensitively after trimming.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContactInfo {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    /// Display alias used in transcripts; falls back to the relationship
    /// label when unset.
    #[serde(default)]
    pub alias: Option<String>,
}

impl ContactInfo {
    fn matches(&self, key: &str) -> bool {
        [&self.email, &self.phone]
            .into_iter()
            .filter_map(|field| normalize(field.as_deref()))
            .any(|value| value == key)
    }
}

/// Static directory of known relationship contacts. The agent's own identity
/// never goes through this resolver; it is tagged assistant upstream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContactDirectory {
    #[serde(default)]
    pub mom: ContactInfo,
    #[serde(default)]
    pub dad: ContactInfo,
    /// Extra display aliases keyed by normalized identifier.
    #[serde(default)]
    pub aliases: HashMap<String, String>,
}

impl ContactDirectory {
    /// Resolve a raw sender identifier to a relationship tag and a display
    /// alias. Absence of a match is a normal outcome, never an error.
    pub fn resolve(&self, sender: &str) -> (Relationship, String) {
        let key = sender.trim().to_lowercase();

        if !key.is_empty() {
            for (contact, relationship) in [
                (&self.mom, Relationship::Mom),
                (&self.dad, Relationship::Dad),
            ] {
                if contact.matches(&key) {
                    let alias = contact
                        .alias
                        .clone()
                        .unwrap_or_else(|| relationship.label().to_string());
                    return (relationship, alias);
                }
            }
        }

        let alias = self.aliases.get(&key).cloned().unwrap_or_else(|| {
            if key.is_empty() {
                "Unknown".to_string()
            } else {
                sender.trim().to_string()
            }
        });
        (Relationship::Other, alias)
    }
}

fn normalize(value: Option<&str>) -> Option<String> {
    value
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
}

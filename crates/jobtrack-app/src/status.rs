// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Known application statuses and display-color resolution.
//!
//! Colors come from three places, highest precedence first: caller-supplied
//! [`ColorOverrides`] (server status table plus config), the static
//! [`JOB_STATUSES`] registry, and a small table of legacy fallbacks. Anything
//! left over renders gray.

use std::collections::BTreeMap;

pub const DEFAULT_STATUS_COLOR: &str = "#6B7280";
pub const DEFAULT_STATUS_NAME: &str = "Applied";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusDefinition {
    pub id: &'static str,
    pub name: &'static str,
    pub color: &'static str,
    pub description: &'static str,
}

pub const JOB_STATUSES: [StatusDefinition; 11] = [
    StatusDefinition {
        id: "applied",
        name: "Applied",
        color: "#3B82F6",
        description: "Application submitted",
    },
    StatusDefinition {
        id: "reviewing",
        name: "Reviewing",
        color: "#F59E0B",
        description: "Application under review",
    },
    StatusDefinition {
        id: "phone_screen",
        name: "Phone Screen",
        color: "#06B6D4",
        description: "Initial phone screening",
    },
    StatusDefinition {
        id: "interview",
        name: "Interview",
        color: "#10B981",
        description: "In interview process",
    },
    StatusDefinition {
        id: "technical",
        name: "Technical",
        color: "#8B5CF6",
        description: "Technical assessment or coding challenge",
    },
    StatusDefinition {
        id: "final_round",
        name: "Final Round",
        color: "#EC4899",
        description: "Final interview round",
    },
    StatusDefinition {
        id: "offer",
        name: "Offer",
        color: "#22C55E",
        description: "Job offer received",
    },
    StatusDefinition {
        id: "accepted",
        name: "Accepted",
        color: "#059669",
        description: "Offer accepted",
    },
    StatusDefinition {
        id: "rejected",
        name: "Rejected",
        color: "#EF4444",
        description: "Application rejected",
    },
    StatusDefinition {
        id: "withdrawn",
        name: "Withdrawn",
        color: "#F97316",
        description: "Application withdrawn by candidate",
    },
    StatusDefinition {
        id: "ghosted",
        name: "Ghosted",
        color: "#6B7280",
        description: "No response from employer",
    },
];

// Lowercase keys only.
const FALLBACK_COLORS: [(&str, &str); 8] = [
    ("applied", "#3b82f6"),
    ("interview", "#10b981"),
    ("offer", "#8b5cf6"),
    ("rejected", "#ef4444"),
    ("ghosted", "#6b7280"),
    ("reviewing", "#f59e0b"),
    ("oa", "#06b6d4"),
    ("pending", "#f59e0b"),
];

pub fn status_by_name(name: &str) -> Option<&'static StatusDefinition> {
    let folded = name.to_lowercase();
    JOB_STATUSES
        .iter()
        .find(|status| status.name.to_lowercase() == folded)
}

pub fn status_names() -> Vec<&'static str> {
    JOB_STATUSES.iter().map(|status| status.name).collect()
}

/// Menu position of a status, used for "status priority" ordering.
pub fn status_rank(name: &str) -> Option<usize> {
    let folded = name.to_lowercase();
    JOB_STATUSES
        .iter()
        .position(|status| status.name.to_lowercase() == folded)
}

pub fn is_hex_color(value: &str) -> bool {
    let Some(digits) = value.strip_prefix('#') else {
        return false;
    };
    matches!(digits.len(), 3 | 6) && digits.chars().all(|c| c.is_ascii_hexdigit())
}

/// Status name to color, matched without regard to case.
///
/// When several keys fold to the same name, lookups prefer the key that
/// equals the query exactly, then its lowercase form, then its title-case
/// form, then whichever key was inserted first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColorOverrides {
    entries: BTreeMap<String, Vec<(String, String)>>,
}

impl ColorOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false (and stores nothing) for a blank name or a color that is
    /// not `#RGB`/`#RRGGBB`.
    pub fn insert(&mut self, name: impl Into<String>, color: impl Into<String>) -> bool {
        let name = name.into();
        let color = color.into().trim().to_owned();
        if name.is_empty() || !is_hex_color(&color) {
            return false;
        }

        let slot = self.entries.entry(name.to_lowercase()).or_default();
        match slot.iter_mut().find(|(key, _)| *key == name) {
            Some(existing) => existing.1 = color,
            None => slot.push((name, color)),
        }
        true
    }

    /// Layers `other` on top of `self`; keys present in both take `other`'s color.
    pub fn merge(&mut self, other: &Self) {
        for slot in other.entries.values() {
            for (name, color) in slot {
                self.insert(name.clone(), color.clone());
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn get(&self, status: &str) -> Option<&str> {
        let slot = self.entries.get(&status.to_lowercase())?;
        let lower = status.to_lowercase();
        let title = title_case(status);
        [status, lower.as_str(), title.as_str()]
            .into_iter()
            .find_map(|wanted| slot.iter().find(|(key, _)| key == wanted))
            .or_else(|| slot.first())
            .map(|(_, color)| color.as_str())
    }
}

impl<K, V> FromIterator<(K, V)> for ColorOverrides
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut overrides = Self::new();
        for (name, color) in iter {
            overrides.insert(name, color);
        }
        overrides
    }
}

pub fn resolve_color<'a>(status: &str, overrides: &'a ColorOverrides) -> &'a str {
    if let Some(color) = overrides.get(status) {
        return color;
    }
    if let Some(definition) = status_by_name(status) {
        return definition.color;
    }
    let lower = status.to_lowercase();
    FALLBACK_COLORS
        .iter()
        .find(|(name, _)| *name == lower)
        .map_or(DEFAULT_STATUS_COLOR, |(_, color)| *color)
}

fn title_case(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

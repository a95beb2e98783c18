//! People cards: sectioned key/value records attached to people documents.
//!
//! A card is an ordered list of sections, each a category name with optional
//! `key=value` attributes and a row of values — the shape of a loosely
//! parsed contact card. Name resolution prefers the formatted-name section
//! over assembling name parts.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One section header: category plus `key=value` attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CardSection {
    pub category: String,
    pub attributes: BTreeMap<String, String>,
}

impl CardSection {
    /// Build from split header parts: first part is the category, remaining
    /// parts are `key=value` pairs (parts without `=` are ignored).
    pub fn from_parts(parts: &[&str]) -> Self {
        let mut section = CardSection::default();
        if let Some(first) = parts.first() {
            section.category = first.trim().to_lowercase();
        }
        for part in parts.iter().skip(1) {
            if let Some((key, value)) = part.split_once('=') {
                section
                    .attributes
                    .insert(key.trim().to_lowercase(), value.trim().to_string());
            }
        }
        section
    }

    pub fn label(&self) -> String {
        if self.attributes.is_empty() {
            return self.category.clone();
        }
        let attrs: Vec<String> = self
            .attributes
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        format!("{} ({})", self.category, attrs.join(", "))
    }
}

/// A person card: ordered (section, values) rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonCard {
    rows: Vec<(CardSection, Vec<String>)>,
}

impl PersonCard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, section: CardSection, values: Vec<String>) {
        let values = values.into_iter().map(|v| v.trim().to_string()).collect();
        self.rows.push((section, values));
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn contains_category(&self, category: &str) -> bool {
        self.rows.iter().any(|(s, _)| s.category == category)
    }

    /// Values of the first section with this category.
    pub fn row(&self, category: &str) -> &[String] {
        self.rows
            .iter()
            .find(|(s, _)| s.category == category)
            .map(|(_, v)| v.as_slice())
            .unwrap_or(&[])
    }

    /// Nth value of a category, if present and non-empty.
    pub fn get(&self, category: &str, index: usize) -> Option<&str> {
        self.row(category)
            .get(index)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Formatted name: `fn` if present, else `"<given> <family>"` from the
    /// `n` parts, else whichever part exists.
    pub fn full_name(&self) -> String {
        if let Some(formatted) = self.get("fn", 0) {
            return formatted.to_string();
        }
        match (self.get("n", 1), self.get("n", 0)) {
            (Some(given), Some(family)) => format!("{given} {family}"),
            (Some(given), None) => given.to_string(),
            (None, Some(family)) => family.to_string(),
            (None, None) => String::new(),
        }
    }

    pub fn first_name(&self) -> String {
        self.get("n", 1)
            .or_else(|| self.get("fn", 0))
            .unwrap_or_default()
            .to_string()
    }

    pub fn last_name(&self) -> String {
        self.get("n", 0).unwrap_or_default().to_string()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(CardSection, Vec<String>)> {
        self.rows.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card_with(rows: &[(&str, &[&str])]) -> PersonCard {
        let mut card = PersonCard::new();
        for (category, values) in rows {
            card.push(
                CardSection::from_parts(&[category]),
                values.iter().map(|v| v.to_string()).collect(),
            );
        }
        card
    }

    #[test]
    fn test_section_header_parsing() {
        let section = CardSection::from_parts(&[" TEL ", "type=home", "pref=1", "junk"]);
        assert_eq!(section.category, "tel");
        assert_eq!(section.attributes.get("type").map(String::as_str), Some("home"));
        assert_eq!(section.attributes.len(), 2);
        assert_eq!(section.label(), "tel (pref=1, type=home)");
    }

    #[test]
    fn test_full_name_prefers_formatted() {
        let card = card_with(&[("fn", &["Ada Lovelace"]), ("n", &["Lovelace", "Ada"])]);
        assert_eq!(card.full_name(), "Ada Lovelace");
    }

    #[test]
    fn test_full_name_from_parts() {
        let card = card_with(&[("n", &["Lovelace", "Ada"])]);
        assert_eq!(card.full_name(), "Ada Lovelace");
        assert_eq!(card.first_name(), "Ada");
        assert_eq!(card.last_name(), "Lovelace");

        let family_only = card_with(&[("n", &["Lovelace"])]);
        assert_eq!(family_only.full_name(), "Lovelace");
    }

    #[test]
    fn test_missing_rows_are_empty() {
        let card = PersonCard::new();
        assert_eq!(card.full_name(), "");
        assert!(card.row("tel").is_empty());
        assert_eq!(card.get("tel", 0), None);
    }
}

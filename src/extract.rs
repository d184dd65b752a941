// src/extract.rs

//! Typed extraction of command results from captured output.
//!
//! Two formats, matching what the subject prints with `-o`:
//! - `json`: one object, decoded with `serde_json`.
//! - `text`: `Label<whitespace>Value` lines, matched per line with fixed
//!   label patterns.

use std::fmt;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::Deserialize;

use crate::errors::{HarnessError, Result};
use crate::types::OutputFormat;

pub const ADDRESS_PATTERN: &str = r"Address\s+(?P<address>0x[^\n]+)";

static ADDRESS: LazyLock<LabelPattern> = LazyLock::new(|| {
    label_pattern("Address", ADDRESS_PATTERN, CaptureGroup::Name("address".into()))
});
static BALANCE: LazyLock<LabelPattern> = LazyLock::new(|| {
    label_pattern("Balance", r"^Balance\s+(?P<balance>\S+)", CaptureGroup::Name("balance".into()))
});
static KEY: LazyLock<LabelPattern> =
    LazyLock::new(|| label_pattern("Key", r"^Key\s+(?P<key>\S+)", CaptureGroup::Name("key".into())));
static CONTRACT: LazyLock<LabelPattern> = LazyLock::new(|| {
    label_pattern("Contract", r"^Contract\s+(?P<contract>\S+)", CaptureGroup::Name("contract".into()))
});

fn label_pattern(label: &str, pattern: &str, group: CaptureGroup) -> LabelPattern {
    LabelPattern::new(label, Regex::new(pattern).expect("built-in label pattern is valid"), group)
}

/// Domain fields projected out of a command's output.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ParsedResult {
    pub address: String,
    #[serde(default)]
    pub balance: Option<String>,
    #[serde(default)]
    pub keys: Vec<String>,
    #[serde(default)]
    pub contracts: Vec<String>,
}

impl ParsedResult {
    pub fn from_output(text: &str, format: OutputFormat) -> Result<Self> {
        match format {
            OutputFormat::Json => serde_json::from_str(text.trim())
                .map_err(|e| HarnessError::Decode(format!("invalid JSON result: {e}"))),
            OutputFormat::Text => Self::from_text(text),
        }
    }

    fn from_text(text: &str) -> Result<Self> {
        let address = ADDRESS.extract(text)?;
        let balance = match BALANCE.extract(text) {
            Ok(balance) => Some(balance),
            Err(HarnessError::PatternNotFound { .. }) => None,
            Err(e) => return Err(e),
        };

        Ok(ParsedResult {
            address,
            balance,
            keys: KEY.extract_all(text)?,
            contracts: CONTRACT.extract_all(text)?,
        })
    }
}

/// Which capture group of a [`LabelPattern`] holds the value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureGroup {
    Name(String),
    Index(usize),
}

impl fmt::Display for CaptureGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureGroup::Name(name) => write!(f, "'{name}'"),
            CaptureGroup::Index(idx) => write!(f, "#{idx}"),
        }
    }
}

/// A labelled-line pattern and the capture group holding its value.
#[derive(Debug, Clone)]
pub struct LabelPattern {
    label: String,
    regex: Regex,
    group: CaptureGroup,
}

impl LabelPattern {
    pub fn new(label: impl Into<String>, regex: Regex, group: CaptureGroup) -> Self {
        Self {
            label: label.into(),
            regex,
            group,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Value from the first matching line.
    pub fn extract(&self, text: &str) -> Result<String> {
        match text.lines().find_map(|line| self.regex.captures(line)) {
            Some(caps) => self.group_value(&caps),
            None => Err(HarnessError::PatternNotFound {
                label: self.label.clone(),
                output: text.to_string(),
            }),
        }
    }

    /// Values from every matching line, in order. No match is an empty list.
    pub fn extract_all(&self, text: &str) -> Result<Vec<String>> {
        text.lines()
            .filter_map(|line| self.regex.captures(line))
            .map(|caps| self.group_value(&caps))
            .collect()
    }

    /// The group must exist in the pattern and must have taken part in the
    /// match. `caps.len()` counts group 0, so valid indexes are `0..len`.
    fn group_value(&self, caps: &Captures<'_>) -> Result<String> {
        let found = match &self.group {
            CaptureGroup::Index(idx) if *idx >= caps.len() => None,
            CaptureGroup::Index(idx) => caps.get(*idx),
            CaptureGroup::Name(name) => caps.name(name),
        };

        found
            .map(|m| m.as_str().trim_end().to_string())
            .ok_or_else(|| HarnessError::CaptureGroupMissing {
                group: self.group.to_string(),
                available: caps.len(),
            })
    }
}

/// `0x` followed by at least one hex digit.
pub fn is_well_formed_address(s: &str) -> bool {
    match s.strip_prefix("0x") {
        Some(hex) => !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_extracts_address_from_label_line() {
        let parsed = ParsedResult::from_output("Address  0xABC123\n", OutputFormat::Text).unwrap();
        assert_eq!(parsed.address, "0xABC123");
        assert_eq!(parsed.balance, None);
        assert!(parsed.keys.is_empty());
    }

    #[test]
    fn text_extracts_all_labels() {
        let out = "Address\t 0x01cf0e2f2f715450\r\nBalance\t 0.00100000\nKey\t aa11\nKey\t bb22\nContract\t Hello\n";
        let parsed = ParsedResult::from_output(out, OutputFormat::Text).unwrap();
        assert_eq!(parsed.address, "0x01cf0e2f2f715450");
        assert_eq!(parsed.balance.as_deref(), Some("0.00100000"));
        assert_eq!(parsed.keys, vec!["aa11", "bb22"]);
        assert_eq!(parsed.contracts, vec!["Hello"]);
    }

    #[test]
    fn text_without_address_is_pattern_not_found() {
        let err = ParsedResult::from_output("Balance\t 1\n", OutputFormat::Text).unwrap_err();
        assert!(matches!(err, HarnessError::PatternNotFound { ref label, .. } if label == "Address"));
    }

    #[test]
    fn json_requires_address() {
        let err = ParsedResult::from_output(r#"{"balance":"1"}"#, OutputFormat::Json).unwrap_err();
        assert!(matches!(err, HarnessError::Decode(_)));

        let err = ParsedResult::from_output("not json", OutputFormat::Json).unwrap_err();
        assert!(matches!(err, HarnessError::Decode(_)));
    }

    #[test]
    fn index_past_capture_slice_is_an_error() {
        let pattern = LabelPattern::new(
            "Address",
            Regex::new(ADDRESS_PATTERN).unwrap(),
            CaptureGroup::Index(2),
        );
        let err = pattern.extract("Address 0x01").unwrap_err();
        assert!(matches!(
            err,
            HarnessError::CaptureGroupMissing { available: 2, .. }
        ));

        let pattern = LabelPattern::new(
            "Address",
            Regex::new(ADDRESS_PATTERN).unwrap(),
            CaptureGroup::Index(1),
        );
        assert_eq!(pattern.extract("Address 0x01").unwrap(), "0x01");
    }

    #[test]
    fn non_participating_group_is_an_error() {
        let pattern = LabelPattern::new(
            "Value",
            Regex::new(r"Value\s+(?:(?P<hex>0x\S+)|(?P<dec>\d+))").unwrap(),
            CaptureGroup::Name("hex".into()),
        );
        assert!(matches!(
            pattern.extract("Value 42"),
            Err(HarnessError::CaptureGroupMissing { .. })
        ));

        let unknown = LabelPattern::new(
            "Value",
            Regex::new(r"Value\s+(\d+)").unwrap(),
            CaptureGroup::Name("nope".into()),
        );
        assert!(unknown.extract("Value 42").is_err());
    }

    #[test]
    fn address_shape() {
        assert!(is_well_formed_address("0xf8d6e0586b0a20c7"));
        assert!(!is_well_formed_address("0x"));
        assert!(!is_well_formed_address("f8d6"));
        assert!(!is_well_formed_address("0xzz"));
    }
}

use regex::Regex;
use serde::Deserialize;

use crate::error::ConfigurationError;
use crate::string_array::StringArrayEncoding;

// -----------------------------------------------------------------------------
// Patterns
// -----------------------------------------------------------------------------

/// A caller-supplied string that matches either verbatim or as a regex.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "String")]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    pub fn new(source: impl Into<String>) -> Result<Self, ConfigurationError> {
        let source = source.into();
        let regex = Regex::new(&source).map_err(|e| ConfigurationError::InvalidPattern {
            pattern: source.clone(),
            message: e.to_string(),
        })?;
        Ok(Self { source, regex })
    }

    pub fn matches(&self, candidate: &str) -> bool {
        self.source == candidate || self.regex.is_match(candidate)
    }
}

impl TryFrom<String> for Pattern {
    type Error = ConfigurationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Pattern::new(value)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

pub fn any_match(patterns: &[Pattern], candidate: &str) -> bool {
    patterns.iter().any(|p| p.matches(candidate))
}

// -----------------------------------------------------------------------------
// Options
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ObfuscatorOptions {
    pub string_array: bool,
    pub string_array_threshold: f64,
    pub string_array_encoding: Vec<StringArrayEncoding>,
    pub reserved_strings: Vec<Pattern>,
    pub force_transform_strings: Vec<Pattern>,
    pub identifiers_prefix: String,
    pub reserved_names: Vec<Pattern>,
    pub rename_globals: bool,
    pub disable_console_output: bool,
    pub debug_protection: bool,
    pub seed: Option<u64>,
}

impl Default for ObfuscatorOptions {
    fn default() -> Self {
        Self {
            string_array: true,
            string_array_threshold: 0.75,
            string_array_encoding: vec![StringArrayEncoding::None],
            reserved_strings: vec![],
            force_transform_strings: vec![],
            identifiers_prefix: String::new(),
            reserved_names: vec![],
            rename_globals: false,
            disable_console_output: false,
            debug_protection: false,
            seed: None,
        }
    }
}

impl ObfuscatorOptions {
    /// Parse the JSON document a plugin host hands over. Unknown keys are ignored.
    pub fn from_json(json: &str) -> Result<Self, ConfigurationError> {
        let options: Self =
            serde_json::from_str(json).map_err(|e| ConfigurationError::Json(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let t = self.string_array_threshold;
        if !t.is_finite() || !(0.0..=1.0).contains(&t) {
            return Err(ConfigurationError::ThresholdOutOfRange(t));
        }
        if self.string_array && self.string_array_encoding.is_empty() {
            return Err(ConfigurationError::EmptyEncodingSet);
        }
        if !is_identifier_fragment(&self.identifiers_prefix) {
            return Err(ConfigurationError::InvalidPrefix(
                self.identifiers_prefix.clone(),
            ));
        }
        Ok(())
    }

    /// Configured encodings with duplicates removed, first occurrence wins.
    pub fn encodings(&self) -> Vec<StringArrayEncoding> {
        let mut out = Vec::with_capacity(self.string_array_encoding.len());
        for e in &self.string_array_encoding {
            if !out.contains(e) {
                out.push(*e);
            }
        }
        out
    }
}

fn is_identifier_fragment(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        None => true,
        Some(c) if c.is_ascii_digit() => false,
        Some(c) => is_ident_char(c) && chars.all(is_ident_char),
    }
}

fn is_ident_char(c: char) -> bool {
    c == '$' || c == '_' || c.is_alphanumeric()
}

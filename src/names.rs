//! Short, collision-free identifier generation.
//!
//! Candidates enumerate a mixed-radix numeral: the leading character comes
//! from `a-zA-Z` (52 symbols) and every following character from
//! `0-9a-zA-Z` (62 symbols). Anything reserved is skipped without reusing
//! its index.

use std::collections::HashSet;

use swc_core::ecma::atoms::Atom;

use crate::error::TransformError;
use crate::options::{any_match, Pattern};

const LEADING: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const TRAILING: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Consecutive rejected candidates tolerated before giving up.
const MAX_SKIPS: usize = 100_000;

const KEYWORDS: &[&str] = &[
    "abstract", "arguments", "await", "boolean", "break", "byte", "case", "catch", "char",
    "class", "const", "continue", "debugger", "default", "delete", "do", "double", "else",
    "enum", "eval", "export", "extends", "false", "final", "finally", "float", "for",
    "function", "goto", "if", "implements", "import", "in", "instanceof", "int", "interface",
    "let", "long", "native", "new", "null", "package", "private", "protected", "public",
    "return", "short", "static", "super", "switch", "synchronized", "this", "throw", "throws",
    "transient", "true", "try", "typeof", "var", "void", "volatile", "while", "with", "yield",
    "NaN", "Infinity", "undefined",
];

/// Candidate at unfiltered position `index`.
pub fn encode(index: usize) -> String {
    let mut rest = index;
    let mut width = 0u32;
    let mut block = LEADING.len();
    while rest >= block {
        rest -= block;
        width += 1;
        block *= TRAILING.len();
    }

    let mut tail = Vec::with_capacity(width as usize);
    for _ in 0..width {
        tail.push(TRAILING[rest % TRAILING.len()]);
        rest /= TRAILING.len();
    }

    let mut out = String::with_capacity(width as usize + 1);
    out.push(LEADING[rest] as char);
    out.extend(tail.iter().rev().map(|&b| b as char));
    out
}

pub struct MangledNameGenerator {
    local_index: usize,
    global_index: usize,
    prefix: String,
    caller_reserved: Vec<Pattern>,
    keywords: HashSet<&'static str>,
    preserved: HashSet<String>,
}

impl MangledNameGenerator {
    pub fn new(prefix: impl Into<String>, caller_reserved: Vec<Pattern>) -> Self {
        Self {
            local_index: 0,
            global_index: 0,
            prefix: prefix.into(),
            caller_reserved,
            keywords: KEYWORDS.iter().copied().collect(),
            preserved: HashSet::new(),
        }
    }

    /// Reserve a name that already exists in the program or in injected code.
    pub fn preserve_name(&mut self, name: &Atom) {
        self.preserved.insert(name.to_string());
    }

    pub fn is_reserved_by_caller(&self, name: &str) -> bool {
        any_match(&self.caller_reserved, name)
    }

    pub fn is_valid_identifier_name(&self, name: &str) -> bool {
        !self.keywords.contains(name)
            && !self.is_reserved_by_caller(name)
            && !self.preserved.contains(name)
    }

    pub fn generate_next(&mut self) -> Result<Atom, TransformError> {
        let mut skipped = 0;
        loop {
            let candidate = encode(self.local_index);
            self.local_index += 1;
            if self.is_valid_identifier_name(&candidate) {
                return Ok(self.emit(candidate));
            }
            skipped += 1;
            if skipped >= MAX_SKIPS {
                return Err(TransformError::NamesExhausted { skipped });
            }
        }
    }

    /// Same enumeration on an independent counter, with the configured prefix.
    pub fn generate_for_global_scope(&mut self) -> Result<Atom, TransformError> {
        let mut skipped = 0;
        loop {
            let candidate = format!("{}{}", self.prefix, encode(self.global_index));
            self.global_index += 1;
            if self.is_valid_identifier_name(&candidate) {
                return Ok(self.emit(candidate));
            }
            skipped += 1;
            if skipped >= MAX_SKIPS {
                return Err(TransformError::NamesExhausted { skipped });
            }
        }
    }

    fn emit(&mut self, name: String) -> Atom {
        let atom = Atom::from(name.as_str());
        self.preserved.insert(name);
        atom
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn take(g: &mut MangledNameGenerator, n: usize) -> Vec<String> {
        (0..n).map(|_| g.generate_next().unwrap().to_string()).collect()
    }

    #[test]
    fn encodes_mixed_radix_positions() {
        assert_eq!(encode(0), "a");
        assert_eq!(encode(25), "z");
        assert_eq!(encode(26), "A");
        assert_eq!(encode(51), "Z");
        assert_eq!(encode(52), "a0");
        assert_eq!(encode(62), "aa");
        assert_eq!(encode(261), "dn");
        assert_eq!(encode(262), "do");
        assert_eq!(encode(52 + 52 * 62 - 1), "ZZ");
        assert_eq!(encode(52 + 52 * 62), "a00");
    }

    #[test]
    fn first_calls_follow_the_canonical_sequence() {
        let mut g = MangledNameGenerator::new("", vec![]);
        let names = take(&mut g, 63);
        assert_eq!(names[0], "a");
        assert_eq!(names[25], "z");
        assert_eq!(names[26], "A");
        assert_eq!(names[51], "Z");
        assert_eq!(names[52], "a0");
        assert_eq!(names[62], "aa");
    }

    #[test]
    fn keyword_candidates_are_skipped() {
        let mut g = MangledNameGenerator::new("", vec![]);
        let names = take(&mut g, 263);
        assert_eq!(names[261], "dn");
        assert_eq!(names[262], "dp");
        assert!(!names.iter().any(|n| n == "do" || n == "if" || n == "in"));
    }

    #[test]
    fn never_repeats_within_a_run() {
        let mut g = MangledNameGenerator::new("", vec![]);
        let names = take(&mut g, 5000);
        let unique: HashSet<_> = names.iter().collect();
        assert_eq!(unique.len(), names.len());
    }

    #[test]
    fn global_names_use_prefix_and_own_counter() {
        let mut g = MangledNameGenerator::new("foo", vec![]);
        assert_eq!(&*g.generate_next().unwrap(), "a");
        assert_eq!(&*g.generate_for_global_scope().unwrap(), "fooa");
        assert_eq!(&*g.generate_for_global_scope().unwrap(), "foob");
        assert_eq!(&*g.generate_next().unwrap(), "b");
    }

    #[test]
    fn caller_reserved_exact_names_are_skipped() {
        let reserved = vec![Pattern::new("b").unwrap(), Pattern::new("c").unwrap()];
        let mut g = MangledNameGenerator::new("", reserved);
        assert_eq!(take(&mut g, 2), vec!["a", "d"]);
    }

    #[test]
    fn caller_reserved_regex_is_applied() {
        let mut g = MangledNameGenerator::new("", vec![Pattern::new("[b|c|d|e|f]").unwrap()]);
        assert_eq!(take(&mut g, 2), vec!["a", "g"]);
    }

    #[test]
    fn preserved_names_are_not_emitted() {
        let mut g = MangledNameGenerator::new("", vec![]);
        g.preserve_name(&"a".into());
        g.preserve_name(&"c".into());
        assert_eq!(take(&mut g, 2), vec!["b", "d"]);
        assert!(!g.is_valid_identifier_name("b"));
    }

    #[test]
    fn reports_exhaustion_when_everything_is_reserved() {
        let mut g = MangledNameGenerator::new("", vec![Pattern::new(".").unwrap()]);
        assert!(matches!(
            g.generate_next(),
            Err(TransformError::NamesExhausted { .. })
        ));
    }
}

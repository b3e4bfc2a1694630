use rand::Rng;

use crate::options::{any_match, ObfuscatorOptions, Pattern};
use crate::pipeline::LiteralPosition;

/// Literals this short (in UTF-16 code units) stay inline.
pub const SHORT_LITERAL_MAX: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    /// The grammar requires a literal here.
    Prohibited,
    /// Holds a lone surrogate that a UTF-8 array entry cannot carry.
    Unrepresentable,
    Forced,
    Reserved,
    TooShort,
    Sampled { included: bool },
}

impl Eligibility {
    pub fn includes(self) -> bool {
        matches!(self, Eligibility::Forced | Eligibility::Sampled { included: true })
    }
}

pub struct EligibilityPolicy<'a> {
    force: &'a [Pattern],
    reserved: &'a [Pattern],
    threshold: f64,
}

impl<'a> EligibilityPolicy<'a> {
    pub fn new(force: &'a [Pattern], reserved: &'a [Pattern], threshold: f64) -> Self {
        Self {
            force,
            reserved,
            threshold,
        }
    }

    pub fn from_options(options: &'a ObfuscatorOptions) -> Self {
        Self::new(
            &options.force_transform_strings,
            &options.reserved_strings,
            options.string_array_threshold,
        )
    }

    /// Draws from `rng` only when the outcome is left to the threshold.
    pub fn classify<R: Rng + ?Sized>(
        &self,
        value: &str,
        position: LiteralPosition,
        rng: &mut R,
    ) -> Eligibility {
        if position != LiteralPosition::Value {
            return Eligibility::Prohibited;
        }
        if has_lone_surrogate(value) {
            return Eligibility::Unrepresentable;
        }
        if any_match(self.force, value) {
            return Eligibility::Forced;
        }
        if any_match(self.reserved, value) {
            return Eligibility::Reserved;
        }
        if value.encode_utf16().count() <= SHORT_LITERAL_MAX {
            return Eligibility::TooShort;
        }
        Eligibility::Sampled {
            included: rng.gen::<f64>() < self.threshold,
        }
    }
}

/// The parser keeps an unpaired surrogate as its escape text (`\uD800`), or as
/// U+FFFD followed by the hex digits, since `str` cannot hold it.
fn has_lone_surrogate(value: &str) -> bool {
    let escaped = value.match_indices("\\u").any(|(at, _)| {
        let rest = &value[at + 2..];
        let hex = match rest.strip_prefix('{') {
            Some(braced) => braced.split('}').next(),
            None => rest.get(..4),
        };
        hex.is_some_and(is_surrogate_hex)
    });
    escaped
        || value.match_indices('\u{FFFD}').any(|(at, m)| {
            let start = at + m.len();
            value.get(start..start + 4).is_some_and(is_surrogate_hex)
        })
}

fn is_surrogate_hex(hex: &str) -> bool {
    u32::from_str_radix(hex, 16).is_ok_and(|c| (0xD800..=0xDFFF).contains(&c))
}

use std::collections::HashMap;

use rand::{
    distributions::{Alphanumeric, DistString},
    seq::SliceRandom,
    Rng,
};
use swc_core::ecma::atoms::Atom;

use super::encoding::StringArrayEncoding;

pub const RC4_KEY_LEN: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringArrayEntry {
    pub value: Atom,
    pub encoding: StringArrayEncoding,
    pub key: Option<String>,
    pub index: usize,
    /// What the emitted array holds for this entry.
    pub stored: String,
}

/// One entry per distinct value, indexed in first-registration order.
#[derive(Debug, Default)]
pub struct StringArrayRegistry {
    entries: Vec<StringArrayEntry>,
    by_value: HashMap<Atom, usize>,
}

impl StringArrayRegistry {
    /// Returns the entry for `value`, creating it on first sight. Encoding and key
    /// are rolled once per entry and reused by every later occurrence.
    pub fn register<R: Rng + ?Sized>(
        &mut self,
        value: &Atom,
        encodings: &[StringArrayEncoding],
        rng: &mut R,
    ) -> &StringArrayEntry {
        if let Some(&index) = self.by_value.get(value) {
            return &self.entries[index];
        }

        let encoding = encodings
            .choose(rng)
            .copied()
            .unwrap_or(StringArrayEncoding::None);
        let key = match encoding {
            StringArrayEncoding::Rc4 => Some(Alphanumeric.sample_string(rng, RC4_KEY_LEN)),
            _ => None,
        };
        let stored = encoding.encode(value, key.as_deref().unwrap_or_default());
        let index = self.entries.len();
        self.entries.push(StringArrayEntry {
            value: value.clone(),
            encoding,
            key,
            index,
            stored,
        });
        self.by_value.insert(value.clone(), index);
        &self.entries[index]
    }

    pub fn entries(&self) -> &[StringArrayEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// One flag digit per entry, in index order.
    pub fn flags(&self) -> String {
        self.entries.iter().map(|e| e.encoding.flag()).collect()
    }
}

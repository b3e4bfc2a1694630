use base64::{
    alphabet::Alphabet,
    engine::{general_purpose::PAD, GeneralPurpose},
    Engine as _,
};
use serde::Deserialize;

/// Base64 alphabet with the letter cases swapped; shared with the emitted decoder.
pub const ALPHABET: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789+/";

const CASE_SWAPPED: Alphabet = match Alphabet::new(ALPHABET) {
    Ok(alphabet) => alphabet,
    Err(_) => panic!("invalid base64 alphabet"),
};

const ENGINE: GeneralPurpose = GeneralPurpose::new(&CASE_SWAPPED, PAD);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StringArrayEncoding {
    None,
    Base64,
    Rc4,
}

impl StringArrayEncoding {
    /// Digit the decoder reads to pick a decoding path.
    pub fn flag(self) -> char {
        match self {
            StringArrayEncoding::None => '0',
            StringArrayEncoding::Base64 => '1',
            StringArrayEncoding::Rc4 => '2',
        }
    }

    /// Stored form of `value`. `key` is only read for RC4.
    pub fn encode(self, value: &str, key: &str) -> String {
        match self {
            StringArrayEncoding::None => value.to_string(),
            StringArrayEncoding::Base64 => base64(value.as_bytes()),
            StringArrayEncoding::Rc4 => base64(&rc4(key.as_bytes(), value.as_bytes())),
        }
    }
}

pub fn base64(bytes: &[u8]) -> String {
    ENGINE.encode(bytes)
}

pub fn rc4(key: &[u8], data: &[u8]) -> Vec<u8> {
    if key.is_empty() {
        return data.to_vec();
    }
    let mut s: [u8; 256] = std::array::from_fn(|i| i as u8);
    let mut j: u8 = 0;
    for i in 0..256 {
        j = j
            .wrapping_add(s[i])
            .wrapping_add(key[i % key.len()]);
        s.swap(i, j as usize);
    }

    let (mut i, mut j) = (0u8, 0u8);
    data.iter()
        .map(|&byte| {
            i = i.wrapping_add(1);
            j = j.wrapping_add(s[i as usize]);
            s.swap(i as usize, j as usize);
            let k = s[s[i as usize].wrapping_add(s[j as usize]) as usize];
            byte ^ k
        })
        .collect()
}

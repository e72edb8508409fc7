use std::fmt;

use serde::{Deserialize, Serialize};

const BASE36_DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Compact cache key derived from a post's author and text.
///
/// The digest is a 32-bit `h * 31 + c` rolling hash over the UTF-16 code units
/// of `author:text`, rendered as signed base 36. Keys written by the browser
/// extension hash the same way, so previously persisted caches stay valid.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn of(author: &str, text: &str) -> Self {
        let mut hash: i32 = 0;
        let units = author
            .encode_utf16()
            .chain(":".encode_utf16())
            .chain(text.encode_utf16());
        for unit in units {
            hash = hash
                .wrapping_shl(5)
                .wrapping_sub(hash)
                .wrapping_add(i32::from(unit));
        }
        Self(to_base36(hash))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Fingerprint {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn to_base36(value: i32) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut magnitude = value.unsigned_abs();
    let mut digits = Vec::with_capacity(8);
    while magnitude > 0 {
        digits.push(BASE36_DIGITS[(magnitude % 36) as usize]);
        magnitude /= 36;
    }
    if value < 0 {
        digits.push(b'-');
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}

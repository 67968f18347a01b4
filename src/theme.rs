//! Colors and the default ordinal color scale.

use crate::data_types::Key;
use crate::error::{ChartError, Result};
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 0xff }
    }

    /// Parses `#rrggbb` or `#rrggbbaa` (leading `#` optional).
    pub fn from_hex(hex: &str) -> Result<Self> {
        let digits = hex.trim().trim_start_matches('#');
        if !matches!(digits.len(), 6 | 8) || !digits.is_ascii() {
            return Err(ChartError::invalid(format!("malformed hex color `{hex}`")));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|_| ChartError::invalid(format!("malformed hex color `{hex}`")))
        };
        Ok(Self {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
            a: if digits.len() == 8 { channel(6)? } else { 0xff },
        })
    }

    pub fn to_hex(&self) -> String {
        if self.a == 0xff {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        Color::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}

/// Maps a color key (a point key or a layer name) to a color.
pub trait ColorScale: Send + Sync {
    fn color(&self, key: &Key) -> Color;

    /// Color `key` would get, without assigning it one.
    fn peek(&self, key: &Key) -> Color {
        self.color(key)
    }
}

pub const CATEGORY10: [Color; 10] = [
    Color::rgb(0x1f, 0x77, 0xb4),
    Color::rgb(0xff, 0x7f, 0x0e),
    Color::rgb(0x2c, 0xa0, 0x2c),
    Color::rgb(0xd6, 0x27, 0x28),
    Color::rgb(0x94, 0x67, 0xbd),
    Color::rgb(0x8c, 0x56, 0x4b),
    Color::rgb(0xe3, 0x77, 0xc2),
    Color::rgb(0x7f, 0x7f, 0x7f),
    Color::rgb(0xbc, 0xbd, 0x22),
    Color::rgb(0x17, 0xbe, 0xcf),
];

/// Ordinal scale with an implicit domain: keys get palette entries in the
/// order they are first requested, cycling when the palette runs out.
pub struct OrdinalColors {
    palette: Vec<Color>,
    domain: RwLock<IndexMap<Key, usize>>,
}

impl OrdinalColors {
    pub fn new(palette: Vec<Color>) -> Self {
        let palette = if palette.is_empty() {
            CATEGORY10.to_vec()
        } else {
            palette
        };
        Self {
            palette,
            domain: RwLock::new(IndexMap::new()),
        }
    }

    pub fn domain(&self) -> Vec<Key> {
        self.domain.read().keys().cloned().collect()
    }
}

impl Default for OrdinalColors {
    fn default() -> Self {
        Self::new(CATEGORY10.to_vec())
    }
}

impl ColorScale for OrdinalColors {
    fn color(&self, key: &Key) -> Color {
        if let Some(&idx) = self.domain.read().get(key) {
            return self.palette[idx % self.palette.len()];
        }
        let mut domain = self.domain.write();
        let next = domain.len();
        let idx = *domain.entry(key.clone()).or_insert(next);
        self.palette[idx % self.palette.len()]
    }

    fn peek(&self, key: &Key) -> Color {
        let domain = self.domain.read();
        let idx = domain.get(key).copied().unwrap_or(domain.len());
        self.palette[idx % self.palette.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_round_trip() {
        let c = Color::from_hex("#1f77b4").unwrap();
        assert_eq!(c, CATEGORY10[0]);
        assert_eq!(c.to_hex(), "#1f77b4");
        assert_eq!(Color::from_hex("ff000080").unwrap().a, 0x80);
        assert!(Color::from_hex("#12").is_err());
        assert!(Color::from_hex("#zzzzzz").is_err());
    }

    #[test]
    fn test_ordinal_assignment_is_first_seen() {
        let scale = OrdinalColors::default();
        let b = scale.color(&Key::from("b"));
        let a = scale.color(&Key::from("a"));
        assert_eq!(b, CATEGORY10[0]);
        assert_eq!(a, CATEGORY10[1]);
        assert_eq!(scale.color(&Key::from("b")), CATEGORY10[0]);
        assert_eq!(scale.domain(), vec![Key::from("b"), Key::from("a")]);
    }

    #[test]
    fn test_peek_does_not_assign() {
        let scale = OrdinalColors::default();
        scale.color(&Key::from("a"));
        assert_eq!(scale.peek(&Key::from("z")), CATEGORY10[1]);
        assert_eq!(scale.peek(&Key::from("a")), CATEGORY10[0]);
        assert_eq!(scale.domain(), vec![Key::from("a")]);
    }
}

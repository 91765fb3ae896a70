#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub enum Color {
    White,
    Blue,
    Black,
    Red,
    Green,
}

impl Color {
    pub const ALL: [Color; 5] = [
        Color::White,
        Color::Blue,
        Color::Black,
        Color::Red,
        Color::Green,
    ];
}

/// A set of colors represented as bitflags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct ColorSet(u8);

impl ColorSet {
    pub const COLORLESS: Self = Self(0);
    pub const WHITE: Self = Self(1 << 0);
    pub const BLUE: Self = Self(1 << 1);
    pub const BLACK: Self = Self(1 << 2);
    pub const RED: Self = Self(1 << 3);
    pub const GREEN: Self = Self(1 << 4);

    pub const fn new() -> Self {
        Self(0)
    }

    pub const fn from_color(color: Color) -> Self {
        match color {
            Color::White => Self::WHITE,
            Color::Blue => Self::BLUE,
            Color::Black => Self::BLACK,
            Color::Red => Self::RED,
            Color::Green => Self::GREEN,
        }
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, color: Color) -> bool {
        self.0 & Self::from_color(color).0 != 0
    }

    pub const fn union(self, other: ColorSet) -> ColorSet {
        Self(self.0 | other.0)
    }

    pub const fn intersection(self, other: ColorSet) -> ColorSet {
        Self(self.0 & other.0)
    }

    pub const fn difference(self, other: ColorSet) -> ColorSet {
        Self(self.0 & !other.0)
    }

    pub fn count(self) -> u32 {
        self.0.count_ones()
    }
}

impl From<Color> for ColorSet {
    fn from(color: Color) -> Self {
        Self::from_color(color)
    }
}

impl FromIterator<Color> for ColorSet {
    fn from_iter<I: IntoIterator<Item = Color>>(iter: I) -> Self {
        iter.into_iter()
            .fold(ColorSet::new(), |acc, c| acc.union(c.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_set_operations() {
        let rg: ColorSet = [Color::Red, Color::Green].into_iter().collect();
        assert!(rg.contains(Color::Red));
        assert!(!rg.contains(Color::Blue));
        assert_eq!(rg.count(), 2);
        assert_eq!(rg.difference(ColorSet::RED), ColorSet::GREEN);
        assert!(ColorSet::COLORLESS.is_empty());
    }
}

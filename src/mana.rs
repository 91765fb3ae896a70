use crate::color::Color;

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

/// A single mana symbol in a cost or a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub enum ManaSymbol {
    White,
    Blue,
    Black,
    Red,
    Green,
    Colorless,
    /// Generic mana {1}, {2}, etc.
    Generic(u8),
}

impl ManaSymbol {
    pub fn mana_value(&self) -> u32 {
        match self {
            ManaSymbol::Generic(n) => *n as u32,
            _ => 1,
        }
    }

    /// The color of a colored symbol.
    pub fn color(&self) -> Option<Color> {
        match self {
            ManaSymbol::White => Some(Color::White),
            ManaSymbol::Blue => Some(Color::Blue),
            ManaSymbol::Black => Some(Color::Black),
            ManaSymbol::Red => Some(Color::Red),
            ManaSymbol::Green => Some(Color::Green),
            ManaSymbol::Colorless | ManaSymbol::Generic(_) => None,
        }
    }

    pub fn from_color(color: Color) -> Self {
        match color {
            Color::White => ManaSymbol::White,
            Color::Blue => ManaSymbol::Blue,
            Color::Black => ManaSymbol::Black,
            Color::Red => ManaSymbol::Red,
            Color::Green => ManaSymbol::Green,
        }
    }
}

/// A mana cost as a flat list of symbols, e.g. `{2}{G}{G}`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct ManaCost {
    symbols: Vec<ManaSymbol>,
}

impl ManaCost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_symbols(symbols: Vec<ManaSymbol>) -> Self {
        Self { symbols }
    }

    /// Shorthand for `{N}` followed by colored pips.
    pub fn generic_plus(generic: u8, colored: &[ManaSymbol]) -> Self {
        let mut symbols = Vec::with_capacity(colored.len() + 1);
        if generic > 0 {
            symbols.push(ManaSymbol::Generic(generic));
        }
        symbols.extend_from_slice(colored);
        Self { symbols }
    }

    pub fn mana_value(&self) -> u32 {
        self.symbols.iter().map(ManaSymbol::mana_value).sum()
    }

    pub fn symbols(&self) -> &[ManaSymbol] {
        &self.symbols
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Format in oracle-style syntax (e.g., "{2}{W}{W}").
    pub fn to_oracle(&self) -> String {
        self.symbols
            .iter()
            .map(|s| match s {
                ManaSymbol::White => "{W}".to_string(),
                ManaSymbol::Blue => "{U}".to_string(),
                ManaSymbol::Black => "{B}".to_string(),
                ManaSymbol::Red => "{R}".to_string(),
                ManaSymbol::Green => "{G}".to_string(),
                ManaSymbol::Colorless => "{C}".to_string(),
                ManaSymbol::Generic(n) => format!("{{{n}}}"),
            })
            .collect()
    }
}

/// Mana pool tracking by color/type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct ManaPool {
    pub white: u32,
    pub blue: u32,
    pub black: u32,
    pub red: u32,
    pub green: u32,
    pub colorless: u32,
}

impl ManaPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds mana of the specified type. Generic symbols add colorless mana.
    pub fn add(&mut self, symbol: ManaSymbol, amount: u32) {
        *self.slot_mut(symbol) += amount;
    }

    /// Removes mana of the specified type. Returns true if successful.
    pub fn remove(&mut self, symbol: ManaSymbol, amount: u32) -> bool {
        let pool = self.slot_mut(symbol);
        if *pool >= amount {
            *pool -= amount;
            true
        } else {
            false
        }
    }

    pub fn amount(&self, symbol: ManaSymbol) -> u32 {
        match symbol {
            ManaSymbol::White => self.white,
            ManaSymbol::Blue => self.blue,
            ManaSymbol::Black => self.black,
            ManaSymbol::Red => self.red,
            ManaSymbol::Green => self.green,
            ManaSymbol::Colorless | ManaSymbol::Generic(_) => self.colorless,
        }
    }

    pub fn total(&self) -> u32 {
        self.white + self.blue + self.black + self.red + self.green + self.colorless
    }

    pub fn empty(&mut self) {
        *self = Self::default();
    }

    /// Pays a cost out of this pool.
    ///
    /// Colored and colorless pips are paid first, generic pips from whatever is
    /// left (colorless before colors). On failure the pool is left unchanged.
    pub fn pay(&mut self, cost: &ManaCost) -> Result<(), ManaShortfall> {
        let mut scratch = self.clone();
        let mut generic = 0u32;
        for symbol in cost.symbols() {
            match symbol {
                ManaSymbol::Generic(n) => generic += *n as u32,
                specific => {
                    if !scratch.remove(*specific, 1) {
                        return Err(ManaShortfall {
                            missing: *specific,
                            required: cost.clone(),
                        });
                    }
                }
            }
        }
        for symbol in [
            ManaSymbol::Colorless,
            ManaSymbol::White,
            ManaSymbol::Blue,
            ManaSymbol::Black,
            ManaSymbol::Red,
            ManaSymbol::Green,
        ] {
            if generic == 0 {
                break;
            }
            let take = scratch.amount(symbol).min(generic);
            scratch.remove(symbol, take);
            generic -= take;
        }
        if generic > 0 {
            return Err(ManaShortfall {
                missing: ManaSymbol::Generic(generic.min(u8::MAX as u32) as u8),
                required: cost.clone(),
            });
        }
        *self = scratch;
        Ok(())
    }

    fn slot_mut(&mut self, symbol: ManaSymbol) -> &mut u32 {
        match symbol {
            ManaSymbol::White => &mut self.white,
            ManaSymbol::Blue => &mut self.blue,
            ManaSymbol::Black => &mut self.black,
            ManaSymbol::Red => &mut self.red,
            ManaSymbol::Green => &mut self.green,
            ManaSymbol::Colorless | ManaSymbol::Generic(_) => &mut self.colorless,
        }
    }
}

/// The pool could not cover a cost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManaShortfall {
    pub missing: ManaSymbol,
    pub required: ManaCost,
}

impl std::fmt::Display for ManaShortfall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "cannot pay {}: not enough {:?}",
            self.required.to_oracle(),
            self.missing
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pay_colored_then_generic() {
        let mut pool = ManaPool::new();
        pool.add(ManaSymbol::Green, 2);
        pool.add(ManaSymbol::Red, 1);

        let cost = ManaCost::generic_plus(1, &[ManaSymbol::Green]);
        assert!(pool.pay(&cost).is_ok());
        assert_eq!(pool.total(), 1);
    }

    #[test]
    fn test_failed_payment_leaves_pool_untouched() {
        let mut pool = ManaPool::new();
        pool.add(ManaSymbol::Green, 1);
        let before = pool.clone();

        let cost = ManaCost::generic_plus(1, &[ManaSymbol::Green]);
        let err = pool.pay(&cost).unwrap_err();
        assert_eq!(err.missing, ManaSymbol::Generic(1));
        assert_eq!(pool, before);
    }

    #[test]
    fn test_oracle_format() {
        let cost = ManaCost::generic_plus(2, &[ManaSymbol::White, ManaSymbol::White]);
        assert_eq!(cost.to_oracle(), "{2}{W}{W}");
        assert_eq!(cost.mana_value(), 4);
    }
}

//! Printed and calculated characteristics of game objects.
//!
//! [`Characteristics`] are the printed values an object starts from. The
//! projector turns them into [`CalculatedCharacteristics`] by running every
//! continuous effect through the layer system.

use std::collections::BTreeSet;

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

use crate::color::ColorSet;
use crate::ids::PlayerId;
use crate::mana::ManaCost;
use crate::types::{CardType, Subtype, Supertype};

/// Keyword abilities the engine itself consults.
///
/// These are the capabilities answered by
/// [`ProjectedView::has_capability`](crate::projection::ProjectedView::has_capability).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub enum Keyword {
    Flying,
    Reach,
    Vigilance,
    Haste,
    Defender,
    Indestructible,
    Hexproof,
}

impl Keyword {
    pub fn name(self) -> &'static str {
        match self {
            Keyword::Flying => "Flying",
            Keyword::Reach => "Reach",
            Keyword::Vigilance => "Vigilance",
            Keyword::Haste => "Haste",
            Keyword::Defender => "Defender",
            Keyword::Indestructible => "Indestructible",
            Keyword::Hexproof => "Hexproof",
        }
    }
}

/// Printed characteristics of a card or token.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct Characteristics {
    pub name: String,
    pub mana_cost: Option<ManaCost>,
    /// Explicit color indicator; when `None` colors come from the mana cost.
    pub color_indicator: Option<ColorSet>,
    pub supertypes: Vec<Supertype>,
    pub card_types: Vec<CardType>,
    pub subtypes: Vec<Subtype>,
    pub power: Option<i32>,
    pub toughness: Option<i32>,
    /// Starting loyalty for planeswalkers.
    pub loyalty: Option<u32>,
    pub keywords: BTreeSet<Keyword>,
}

impl Characteristics {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Colors as printed: the color indicator if present, otherwise the colors
    /// of the mana symbols in the mana cost.
    pub fn colors(&self) -> ColorSet {
        if let Some(indicator) = self.color_indicator {
            return indicator;
        }
        let Some(cost) = &self.mana_cost else {
            return ColorSet::COLORLESS;
        };
        cost.symbols()
            .iter()
            .filter_map(|symbol| symbol.color())
            .collect()
    }

    pub fn has_card_type(&self, card_type: CardType) -> bool {
        self.card_types.contains(&card_type)
    }

    pub fn is_permanent(&self) -> bool {
        self.card_types.iter().any(|t| t.is_permanent_type())
    }
}

/// Characteristics after every applicable continuous effect has been applied.
///
/// Power and toughness are kept unclamped; a negative intermediate value can be
/// raised again by a later effect.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct CalculatedCharacteristics {
    pub name: String,
    pub mana_cost: Option<ManaCost>,
    pub colors: ColorSet,
    pub supertypes: Vec<Supertype>,
    pub card_types: Vec<CardType>,
    pub subtypes: Vec<Subtype>,
    pub power: Option<i32>,
    pub toughness: Option<i32>,
    pub loyalty: Option<u32>,
    pub keywords: BTreeSet<Keyword>,
    pub controller: PlayerId,
    /// Set by a layer 6 "loses all abilities" effect. Triggered, activated and
    /// static abilities printed on the object stop functioning.
    pub abilities_removed: bool,
}

impl CalculatedCharacteristics {
    pub fn from_printed(printed: &Characteristics, controller: PlayerId) -> Self {
        Self {
            name: printed.name.clone(),
            mana_cost: printed.mana_cost.clone(),
            colors: printed.colors(),
            supertypes: printed.supertypes.clone(),
            card_types: printed.card_types.clone(),
            subtypes: printed.subtypes.clone(),
            power: printed.power,
            toughness: printed.toughness,
            loyalty: printed.loyalty,
            keywords: printed.keywords.clone(),
            controller,
            abilities_removed: false,
        }
    }

    pub fn has_card_type(&self, card_type: CardType) -> bool {
        self.card_types.contains(&card_type)
    }

    pub fn has_subtype(&self, subtype: Subtype) -> bool {
        self.subtypes.contains(&subtype)
    }

    pub fn has_supertype(&self, supertype: Supertype) -> bool {
        self.supertypes.contains(&supertype)
    }

    pub fn is_creature(&self) -> bool {
        self.has_card_type(CardType::Creature)
    }

    pub fn is_legendary(&self) -> bool {
        self.has_supertype(Supertype::Legendary)
    }

    pub fn has_keyword(&self, keyword: Keyword) -> bool {
        self.keywords.contains(&keyword)
    }

    pub fn add_card_type(&mut self, card_type: CardType) {
        if !self.card_types.contains(&card_type) {
            self.card_types.push(card_type);
        }
    }

    pub fn add_subtype(&mut self, subtype: Subtype) {
        if !self.subtypes.contains(&subtype) {
            self.subtypes.push(subtype);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::mana::ManaSymbol;

    #[test]
    fn test_colors_from_mana_cost() {
        let mut chars = Characteristics::named("Llanowar Elves");
        chars.mana_cost = Some(ManaCost::from_symbols(vec![ManaSymbol::Green]));
        assert_eq!(chars.colors(), ColorSet::from(Color::Green));

        chars.color_indicator = Some(ColorSet::BLUE);
        assert_eq!(chars.colors(), ColorSet::BLUE);
    }

    #[test]
    fn test_calculated_starts_from_printed() {
        let mut chars = Characteristics::named("Grizzly Bears");
        chars.card_types = vec![CardType::Creature];
        chars.power = Some(2);
        chars.toughness = Some(2);

        let calc = CalculatedCharacteristics::from_printed(&chars, PlayerId::from_index(1));
        assert!(calc.is_creature());
        assert_eq!(calc.power, Some(2));
        assert_eq!(calc.controller, PlayerId::from_index(1));
        assert!(!calc.abilities_removed);
    }
}

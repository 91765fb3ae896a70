//! Card definitions and the catalog they are looked up in.
//!
//! The engine never parses rules text. Cards are described programmatically
//! with [`CardDefinitionBuilder`] and handed to the engine through a
//! [`CardCatalog`].

use std::collections::HashMap;

use crate::ability::{ActivatedAbility, StaticAbility, TargetSpec, TriggeredAbility};
use crate::characteristics::{Characteristics, Keyword};
use crate::color::ColorSet;
use crate::effect::Effect;
use crate::filter::ObjectFilter;
use crate::ids::CardId;
use crate::mana::ManaCost;
use crate::triggers::Trigger;
use crate::types::{CardType, Subtype, Supertype};

/// A complete card definition: printed characteristics plus abilities.
#[derive(Debug, Clone, PartialEq)]
pub struct CardDefinition {
    pub id: CardId,
    pub characteristics: Characteristics,
    pub static_abilities: Vec<StaticAbility>,
    pub activated_abilities: Vec<ActivatedAbility>,
    pub triggered_abilities: Vec<TriggeredAbility>,
    /// For instants and sorceries: what happens on resolution.
    pub spell_effects: Vec<Effect>,
    pub spell_targets: Vec<TargetSpec>,
    /// For Auras: what this card can enchant.
    pub enchant: Option<ObjectFilter>,
}

impl CardDefinition {
    pub fn name(&self) -> &str {
        &self.characteristics.name
    }

    pub fn is_creature(&self) -> bool {
        self.characteristics.has_card_type(CardType::Creature)
    }

    pub fn is_land(&self) -> bool {
        self.characteristics.has_card_type(CardType::Land)
    }

    pub fn is_permanent(&self) -> bool {
        self.characteristics.is_permanent()
    }
}

/// Where the engine's host looks cards up.
pub trait CardCatalog {
    fn get_card_definition(&self, id: CardId) -> Option<&CardDefinition>;

    fn find_by_name(&self, name: &str) -> Option<&CardDefinition>;
}

/// In-memory catalog.
#[derive(Debug, Clone, Default)]
pub struct CardRegistry {
    cards: HashMap<CardId, CardDefinition>,
    by_name: HashMap<String, CardId>,
}

impl CardRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a card, replacing any earlier definition with the same id.
    pub fn register(&mut self, def: CardDefinition) {
        self.by_name.insert(def.name().to_string(), def.id);
        self.cards.insert(def.id, def);
    }

    pub fn all(&self) -> impl Iterator<Item = &CardDefinition> {
        self.cards.values()
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn creatures(&self) -> impl Iterator<Item = &CardDefinition> {
        self.cards.values().filter(|c| c.is_creature())
    }

    pub fn lands(&self) -> impl Iterator<Item = &CardDefinition> {
        self.cards.values().filter(|c| c.is_land())
    }
}

impl CardCatalog for CardRegistry {
    fn get_card_definition(&self, id: CardId) -> Option<&CardDefinition> {
        self.cards.get(&id)
    }

    fn find_by_name(&self, name: &str) -> Option<&CardDefinition> {
        self.by_name.get(name).and_then(|id| self.cards.get(id))
    }
}

impl FromIterator<CardDefinition> for CardRegistry {
    fn from_iter<I: IntoIterator<Item = CardDefinition>>(iter: I) -> Self {
        let mut registry = Self::new();
        for def in iter {
            registry.register(def);
        }
        registry
    }
}

/// Builder for card definitions.
#[derive(Debug, Clone)]
pub struct CardDefinitionBuilder {
    def: CardDefinition,
}

impl CardDefinitionBuilder {
    pub fn new(id: CardId, name: impl Into<String>) -> Self {
        Self {
            def: CardDefinition {
                id,
                characteristics: Characteristics::named(name),
                static_abilities: Vec::new(),
                activated_abilities: Vec::new(),
                triggered_abilities: Vec::new(),
                spell_effects: Vec::new(),
                spell_targets: Vec::new(),
                enchant: None,
            },
        }
    }

    pub fn mana_cost(mut self, cost: ManaCost) -> Self {
        self.def.characteristics.mana_cost = Some(cost);
        self
    }

    pub fn color_indicator(mut self, colors: ColorSet) -> Self {
        self.def.characteristics.color_indicator = Some(colors);
        self
    }

    pub fn supertypes(mut self, supertypes: Vec<Supertype>) -> Self {
        self.def.characteristics.supertypes = supertypes;
        self
    }

    pub fn card_types(mut self, types: Vec<CardType>) -> Self {
        self.def.characteristics.card_types = types;
        self
    }

    pub fn subtypes(mut self, subtypes: Vec<Subtype>) -> Self {
        self.def.characteristics.subtypes = subtypes;
        self
    }

    pub fn power_toughness(mut self, power: i32, toughness: i32) -> Self {
        self.def.characteristics.power = Some(power);
        self.def.characteristics.toughness = Some(toughness);
        self
    }

    /// Starting loyalty for a planeswalker.
    pub fn loyalty(mut self, loyalty: u32) -> Self {
        self.def.characteristics.loyalty = Some(loyalty);
        self
    }

    pub fn keyword(mut self, keyword: Keyword) -> Self {
        self.def.characteristics.keywords.insert(keyword);
        self
    }

    pub fn flying(self) -> Self {
        self.keyword(Keyword::Flying)
    }

    pub fn reach(self) -> Self {
        self.keyword(Keyword::Reach)
    }

    pub fn vigilance(self) -> Self {
        self.keyword(Keyword::Vigilance)
    }

    pub fn haste(self) -> Self {
        self.keyword(Keyword::Haste)
    }

    pub fn defender(self) -> Self {
        self.keyword(Keyword::Defender)
    }

    pub fn indestructible(self) -> Self {
        self.keyword(Keyword::Indestructible)
    }

    pub fn hexproof(self) -> Self {
        self.keyword(Keyword::Hexproof)
    }

    pub fn static_ability(mut self, ability: StaticAbility) -> Self {
        self.def.static_abilities.push(ability);
        self
    }

    pub fn activated_ability(mut self, ability: ActivatedAbility) -> Self {
        self.def.activated_abilities.push(ability);
        self
    }

    pub fn triggered_ability(mut self, ability: TriggeredAbility) -> Self {
        self.def.triggered_abilities.push(ability);
        self
    }

    /// "When this enters the battlefield, ..."
    pub fn with_etb(self, effects: Vec<Effect>) -> Self {
        self.triggered_ability(TriggeredAbility::new(
            Trigger::this_enters_battlefield(),
            effects,
        ))
    }

    /// "When this dies, ..."
    pub fn with_dies_trigger(self, effects: Vec<Effect>) -> Self {
        self.triggered_ability(TriggeredAbility::new(Trigger::this_dies(), effects))
    }

    pub fn spell_effects(mut self, effects: Vec<Effect>) -> Self {
        self.def.spell_effects = effects;
        self
    }

    pub fn spell_target(mut self, spec: TargetSpec) -> Self {
        self.def.spell_targets.push(spec);
        self
    }

    /// Makes this an Aura that can enchant objects matching `filter`. Casting
    /// it targets what it will enchant.
    pub fn enchant(mut self, filter: ObjectFilter) -> Self {
        if !self.def.characteristics.subtypes.contains(&Subtype::Aura) {
            self.def.characteristics.subtypes.push(Subtype::Aura);
        }
        self.def.spell_targets = vec![TargetSpec::Object(filter.clone())];
        self.def.enchant = Some(filter);
        self
    }

    pub fn build(self) -> CardDefinition {
        self.def
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mana::ManaSymbol;

    fn bolt() -> CardDefinition {
        CardDefinitionBuilder::new(CardId::from_raw(2), "Lightning Bolt")
            .mana_cost(ManaCost::from_symbols(vec![ManaSymbol::Red]))
            .card_types(vec![CardType::Instant])
            .spell_target(TargetSpec::Any)
            .spell_effects(vec![Effect::deal_damage_to_target(3, 0)])
            .build()
    }

    #[test]
    fn test_registry_lookup_by_id_and_name() {
        let registry: CardRegistry = [crate::tests::fixtures::grizzly_bears(), bolt()]
            .into_iter()
            .collect();
        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.find_by_name("Lightning Bolt").map(|c| c.id),
            Some(CardId::from_raw(2))
        );
        let bolt = registry.get_card_definition(CardId::from_raw(2)).unwrap();
        assert!(!bolt.is_permanent());
        assert_eq!(registry.creatures().count(), 1);
        assert!(registry.find_by_name("Shock").is_none());
    }

    #[test]
    fn test_enchant_marks_card_as_aura() {
        let def = CardDefinitionBuilder::new(CardId::from_raw(3), "Holy Strength")
            .card_types(vec![CardType::Enchantment])
            .enchant(ObjectFilter::creature())
            .enchant(ObjectFilter::creature())
            .build();
        assert_eq!(def.characteristics.subtypes, vec![Subtype::Aura]);
        assert_eq!(def.spell_targets.len(), 1);
        assert!(def.enchant.is_some());
    }
}

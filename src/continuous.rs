//! Continuous effects and the effect registry.
//!
//! A continuous effect is data: which layer it sorts into, what it applies to,
//! when it was created and how long it lasts. The registry is a plain
//! insertion-ordered collection; all characteristic logic lives in
//! [`projection`](crate::projection) and [`dependency`](crate::dependency).

use std::fmt;
use std::sync::Arc;

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

use crate::characteristics::{CalculatedCharacteristics, Keyword};
use crate::color::ColorSet;
use crate::effect::{Until, UntilEvent};
use crate::error::InvariantFailure;
use crate::filter::ObjectFilter;
use crate::ids::{ObjectId, PlayerId};
use crate::types::{CardType, Subtype, Supertype};

/// Unique identifier for a continuous effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct ContinuousEffectId(pub u64);

impl ContinuousEffectId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

/// The seven layers of rule 613, in application order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub enum Layer {
    Copy,
    Control,
    Text,
    Type,
    Color,
    Ability,
    PowerToughness,
}

impl Layer {
    pub const ALL: [Layer; 7] = [
        Layer::Copy,
        Layer::Control,
        Layer::Text,
        Layer::Type,
        Layer::Color,
        Layer::Ability,
        Layer::PowerToughness,
    ];

    /// Layer number as printed in the comprehensive rules.
    pub fn number(self) -> u8 {
        self as u8 + 1
    }
}

/// Sublayers of layer 7, in application order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub enum PtSublayer {
    /// 7a: characteristic-defining abilities.
    CharacteristicDefining,
    /// 7b: effects that set power and/or toughness.
    Set,
    /// 7c: counters and effects that behave like them.
    Counters,
    /// 7d: effects that modify power and/or toughness.
    Modify,
    /// 7e: switching power and toughness.
    Switch,
}

impl PtSublayer {
    pub const ALL: [PtSublayer; 5] = [
        PtSublayer::CharacteristicDefining,
        PtSublayer::Set,
        PtSublayer::Counters,
        PtSublayer::Modify,
        PtSublayer::Switch,
    ];
}

/// A characteristic an effect can read or write. Used for declarative
/// dependency detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub enum Aspect {
    /// Every copiable value at once.
    Copiable,
    Controller,
    Text,
    Types,
    Colors,
    Abilities,
    PowerToughness,
}

impl Aspect {
    /// Whether writing `self` can change what a reader of `other` observes.
    pub fn overlaps(self, other: Aspect) -> bool {
        self == other
            || (self == Aspect::Copiable && other != Aspect::Controller)
            || (other == Aspect::Copiable && self != Aspect::Controller)
    }
}

/// What created a continuous effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectSourceType {
    /// A static ability of a permanent.
    StaticAbility,
    /// A resolved spell or ability.
    Resolution,
    /// A characteristic-defining ability (rule 604.3). Applies first in its layer.
    CharacteristicDefining,
}

/// What objects a continuous effect applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EffectTarget {
    Specific(ObjectId),
    /// The effect's own source.
    Source,
    /// Whatever the source is attached to (Auras, Equipment).
    AttachedToSource,
    AllPermanents,
    AllCreatures,
    Filter(ObjectFilter),
}

impl EffectTarget {
    /// Aspects read to decide applicability.
    pub fn read_aspects(&self) -> Vec<Aspect> {
        match self {
            EffectTarget::AllCreatures => vec![Aspect::Types],
            EffectTarget::Filter(filter) => filter.read_aspects(),
            _ => Vec::new(),
        }
    }
}

/// A power/toughness value that may depend on the game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Fixed(i32),
    /// Number of objects matching the filter, evaluated against the
    /// projection in progress.
    CountOf(ObjectFilter),
}

impl Value {
    pub fn read_aspects(&self) -> Vec<Aspect> {
        match self {
            Value::Fixed(_) => Vec::new(),
            Value::CountOf(filter) => filter.read_aspects(),
        }
    }
}

/// A caller-supplied characteristic transform. The projector only looks at
/// where it sorts, never at what it does.
#[derive(Clone)]
pub struct CustomModification {
    pub name: String,
    pub layer: Layer,
    pub sublayer: Option<PtSublayer>,
    pub writes: Vec<Aspect>,
    pub apply: Arc<dyn Fn(&mut CalculatedCharacteristics) + Send + Sync>,
}

impl CustomModification {
    pub fn new(
        name: impl Into<String>,
        layer: Layer,
        writes: Vec<Aspect>,
        apply: impl Fn(&mut CalculatedCharacteristics) + Send + Sync + 'static,
    ) -> Self {
        let sublayer = (layer == Layer::PowerToughness).then_some(PtSublayer::Modify);
        Self {
            name: name.into(),
            layer,
            sublayer,
            writes,
            apply: Arc::new(apply),
        }
    }

    pub fn in_sublayer(mut self, sublayer: PtSublayer) -> Self {
        self.sublayer = Some(sublayer);
        self
    }
}

impl fmt::Debug for CustomModification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomModification")
            .field("name", &self.name)
            .field("layer", &self.layer)
            .field("sublayer", &self.sublayer)
            .finish_non_exhaustive()
    }
}

impl PartialEq for CustomModification {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.apply, &other.apply)
    }
}

/// What a continuous effect changes.
#[derive(Debug, Clone, PartialEq)]
pub enum Modification {
    // Layer 1
    /// Copy the printed characteristics of another object.
    CopyOf(ObjectId),

    // Layer 2
    ChangeController(PlayerId),

    // Layer 4
    AddCardType(CardType),
    RemoveCardType(CardType),
    AddSubtype(Subtype),
    RemoveAllCreatureTypes,
    AddSupertype(Supertype),
    RemoveSupertype(Supertype),

    // Layer 5
    SetColors(ColorSet),
    AddColors(ColorSet),

    // Layer 6
    AddKeyword(Keyword),
    RemoveKeyword(Keyword),
    RemoveAllAbilities,

    // Layer 7
    SetPowerToughness { power: Value, toughness: Value },
    /// Behaves like counters: applies in sublayer 7c.
    CounterBonus { power: i32, toughness: i32 },
    ModifyPowerToughness { power: i32, toughness: i32 },
    SwitchPowerToughness,

    /// Any layer, including layer 3 text changes.
    Custom(CustomModification),
}

impl Modification {
    pub fn layer(&self) -> Layer {
        match self {
            Modification::CopyOf(_) => Layer::Copy,
            Modification::ChangeController(_) => Layer::Control,
            Modification::AddCardType(_)
            | Modification::RemoveCardType(_)
            | Modification::AddSubtype(_)
            | Modification::RemoveAllCreatureTypes
            | Modification::AddSupertype(_)
            | Modification::RemoveSupertype(_) => Layer::Type,
            Modification::SetColors(_) | Modification::AddColors(_) => Layer::Color,
            Modification::AddKeyword(_)
            | Modification::RemoveKeyword(_)
            | Modification::RemoveAllAbilities => Layer::Ability,
            Modification::SetPowerToughness { .. }
            | Modification::CounterBonus { .. }
            | Modification::ModifyPowerToughness { .. }
            | Modification::SwitchPowerToughness => Layer::PowerToughness,
            Modification::Custom(custom) => custom.layer,
        }
    }

    /// The layer 7 sublayer this modification sorts into, ignoring CDA status.
    pub fn pt_sublayer(&self) -> Option<PtSublayer> {
        match self {
            Modification::SetPowerToughness { .. } => Some(PtSublayer::Set),
            Modification::CounterBonus { .. } => Some(PtSublayer::Counters),
            Modification::ModifyPowerToughness { .. } => Some(PtSublayer::Modify),
            Modification::SwitchPowerToughness => Some(PtSublayer::Switch),
            Modification::Custom(custom) => custom.sublayer,
            _ => None,
        }
    }

    /// Aspects this modification changes.
    pub fn writes(&self) -> Vec<Aspect> {
        match self {
            Modification::Custom(custom) => custom.writes.clone(),
            Modification::CopyOf(_) => vec![Aspect::Copiable],
            other => match other.layer() {
                Layer::Copy => vec![Aspect::Copiable],
                Layer::Control => vec![Aspect::Controller],
                Layer::Text => vec![Aspect::Text],
                Layer::Type => vec![Aspect::Types],
                Layer::Color => vec![Aspect::Colors],
                Layer::Ability => vec![Aspect::Abilities],
                Layer::PowerToughness => vec![Aspect::PowerToughness],
            },
        }
    }

    /// Aspects this modification reads to work out what it does.
    pub fn reads(&self) -> Vec<Aspect> {
        match self {
            Modification::SetPowerToughness { power, toughness } => {
                let mut aspects = power.read_aspects();
                aspects.extend(toughness.read_aspects());
                aspects
            }
            Modification::CopyOf(_) => vec![Aspect::Copiable],
            _ => Vec::new(),
        }
    }
}

/// A continuous effect in the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct ContinuousEffect {
    pub id: ContinuousEffectId,
    pub source: ObjectId,
    pub controller: PlayerId,
    pub applies_to: EffectTarget,
    pub modification: Modification,
    /// Rule 613.7 timestamp. Assigned by the game when the effect is registered.
    pub timestamp: u64,
    pub duration: Until,
    pub source_type: EffectSourceType,
    /// Aspects the effect declares it reads, beyond what its modification and
    /// target already imply.
    pub reads: Vec<Aspect>,
}

impl ContinuousEffect {
    pub fn new(
        source: ObjectId,
        controller: PlayerId,
        applies_to: EffectTarget,
        modification: Modification,
    ) -> Self {
        Self {
            id: ContinuousEffectId(0),
            source,
            controller,
            applies_to,
            modification,
            timestamp: 0,
            duration: Until::Forever,
            source_type: EffectSourceType::Resolution,
            reads: Vec::new(),
        }
    }

    pub fn until(mut self, duration: Until) -> Self {
        self.duration = duration;
        self
    }

    pub fn from_static_ability(mut self) -> Self {
        self.source_type = EffectSourceType::StaticAbility;
        self.duration = Until::WhileSourcePresent;
        self
    }

    pub fn characteristic_defining(mut self) -> Self {
        self.source_type = EffectSourceType::CharacteristicDefining;
        self
    }

    pub fn reading(mut self, aspects: impl IntoIterator<Item = Aspect>) -> Self {
        self.reads.extend(aspects);
        self
    }

    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn is_characteristic_defining(&self) -> bool {
        self.source_type == EffectSourceType::CharacteristicDefining
    }

    pub fn layer(&self) -> Layer {
        self.modification.layer()
    }

    /// Sublayer within layer 7. CDAs always sort into 7a.
    pub fn sublayer(&self) -> Option<PtSublayer> {
        if self.layer() != Layer::PowerToughness {
            return None;
        }
        if self.is_characteristic_defining() {
            return Some(PtSublayer::CharacteristicDefining);
        }
        self.modification.pt_sublayer()
    }

    /// Everything this effect reads: declared aspects, its modification's
    /// inputs and its applicability filter.
    pub fn all_reads(&self) -> Vec<Aspect> {
        let mut aspects = self.reads.clone();
        aspects.extend(self.modification.reads());
        aspects.extend(self.applies_to.read_aspects());
        aspects.sort();
        aspects.dedup();
        aspects
    }

    /// Whether the effect names this object specifically.
    pub fn names_object(&self, object: ObjectId) -> bool {
        match &self.applies_to {
            EffectTarget::Specific(id) => *id == object,
            EffectTarget::Source => self.source == object,
            _ => false,
        }
    }
}

/// The registry of active continuous effects.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContinuousEffectManager {
    effects: Vec<ContinuousEffect>,
    next_id: u64,
    last_timestamp: u64,
}

impl ContinuousEffectManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an effect and assigns its id.
    ///
    /// Timestamps must be strictly increasing across the registry's lifetime.
    pub fn add_effect(
        &mut self,
        mut effect: ContinuousEffect,
    ) -> Result<ContinuousEffectId, InvariantFailure> {
        if effect.timestamp <= self.last_timestamp {
            return Err(InvariantFailure::NonMonotonicTimestamp {
                last: self.last_timestamp,
                got: effect.timestamp,
            });
        }
        self.next_id += 1;
        let id = ContinuousEffectId(self.next_id);
        effect.id = id;
        self.last_timestamp = effect.timestamp;
        self.effects.push(effect);
        Ok(id)
    }

    /// Removes every effect matching the predicate and returns them.
    pub fn remove_effects_where(
        &mut self,
        mut predicate: impl FnMut(&ContinuousEffect) -> bool,
    ) -> Vec<ContinuousEffect> {
        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.effects)
            .into_iter()
            .partition(|e| predicate(e));
        self.effects = kept;
        removed
    }

    pub fn all_effects(&self) -> &[ContinuousEffect] {
        &self.effects
    }

    pub fn get(&self, id: ContinuousEffectId) -> Option<&ContinuousEffect> {
        self.effects.iter().find(|e| e.id == id)
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Cleanup step: drop "until end of turn" effects.
    pub fn expire_end_of_turn(&mut self) -> usize {
        self.remove_effects_where(|e| e.duration == Until::EndOfTurn)
            .len()
    }

    pub fn expire_event(&mut self, event: &UntilEvent) -> usize {
        self.remove_effects_where(|e| matches!(&e.duration, Until::Event(ev) if ev == event))
            .len()
    }

    /// The source left the battlefield: its static-ability effects end.
    pub fn remove_effects_from_source(&mut self, source: ObjectId) -> usize {
        self.remove_effects_where(|e| e.source == source && e.duration == Until::WhileSourcePresent)
            .len()
    }

    /// The object left the battlefield: effects naming it specifically end.
    pub fn remove_effects_targeting(&mut self, object: ObjectId) -> usize {
        self.remove_effects_where(|e| e.names_object(object)).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pump(source: u64, timestamp: u64) -> ContinuousEffect {
        ContinuousEffect::new(
            ObjectId::from_raw(source),
            PlayerId::from_index(0),
            EffectTarget::Specific(ObjectId::from_raw(10)),
            Modification::ModifyPowerToughness {
                power: 1,
                toughness: 1,
            },
        )
        .with_timestamp(timestamp)
    }

    #[test]
    fn test_layer_order() {
        assert!(Layer::Copy < Layer::Control);
        assert!(Layer::Ability < Layer::PowerToughness);
        assert_eq!(Layer::PowerToughness.number(), 7);
        assert!(PtSublayer::Set < PtSublayer::Counters);
        assert!(PtSublayer::Counters < PtSublayer::Modify);
    }

    #[test]
    fn test_cda_sorts_into_7a() {
        let effect = ContinuousEffect::new(
            ObjectId::from_raw(1),
            PlayerId::from_index(0),
            EffectTarget::Source,
            Modification::SetPowerToughness {
                power: Value::Fixed(1),
                toughness: Value::Fixed(1),
            },
        )
        .characteristic_defining();
        assert_eq!(effect.sublayer(), Some(PtSublayer::CharacteristicDefining));
    }

    #[test]
    fn test_rejects_non_monotonic_timestamp() {
        let mut manager = ContinuousEffectManager::new();
        manager.add_effect(pump(1, 5)).unwrap();
        let err = manager.add_effect(pump(2, 5)).unwrap_err();
        assert_eq!(err, InvariantFailure::NonMonotonicTimestamp { last: 5, got: 5 });
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_expiry_by_duration() {
        let mut manager = ContinuousEffectManager::new();
        manager
            .add_effect(pump(1, 1).until(Until::EndOfTurn))
            .unwrap();
        manager
            .add_effect(pump(2, 2).until(Until::Event(UntilEvent::Named("x".into()))))
            .unwrap();
        manager.add_effect(pump(3, 3)).unwrap();

        assert_eq!(manager.expire_end_of_turn(), 1);
        assert_eq!(manager.expire_event(&UntilEvent::Named("y".into())), 0);
        assert_eq!(manager.expire_event(&UntilEvent::Named("x".into())), 1);
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_zone_change_removal() {
        let mut manager = ContinuousEffectManager::new();
        let lord = ContinuousEffect::new(
            ObjectId::from_raw(1),
            PlayerId::from_index(0),
            EffectTarget::AllCreatures,
            Modification::ModifyPowerToughness {
                power: 1,
                toughness: 1,
            },
        )
        .from_static_ability()
        .with_timestamp(1);
        manager.add_effect(lord).unwrap();
        manager.add_effect(pump(2, 2)).unwrap();

        // Object 10 leaving only drops the effect naming it.
        assert_eq!(manager.remove_effects_targeting(ObjectId::from_raw(10)), 1);
        assert_eq!(manager.remove_effects_from_source(ObjectId::from_raw(1)), 1);
        assert!(manager.is_empty());
    }

    #[test]
    fn test_copiable_overlaps_everything_but_control() {
        assert!(Aspect::Copiable.overlaps(Aspect::Types));
        assert!(Aspect::PowerToughness.overlaps(Aspect::Copiable));
        assert!(!Aspect::Copiable.overlaps(Aspect::Controller));
        assert!(!Aspect::Types.overlaps(Aspect::Colors));
    }
}

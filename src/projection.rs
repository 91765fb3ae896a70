//! Characteristic projection (rule 613).
//!
//! [`project`] is a pure function from the object store and the effect
//! registry to a [`ProjectedView`]. Nothing it computes is cached; callers
//! project again after every mutation.
//!
//! For each layer in order:
//! 1. Characteristic-defining effects, then all other effects. In layer 7 the
//!    sublayers run in the order 7a to 7e instead, with physical counters
//!    applied in 7c.
//! 2. Within each group, effects are ordered by
//!    [`sort_with_dependencies`](crate::dependency::sort_with_dependencies):
//!    dependencies first, timestamps as the tie-break.
//! 3. Each effect decides which objects it applies to against the
//!    characteristics as they stand at that point, then modifies them.

use std::collections::BTreeMap;

#[cfg(feature = "serialization")]
use serde::Serialize;
use tracing::trace;

use crate::ability::{ActivatedAbility, StaticAbility, TriggeredAbility};
use crate::characteristics::{CalculatedCharacteristics, Keyword};
use crate::continuous::{
    ContinuousEffect, ContinuousEffectId, ContinuousEffectManager, EffectSourceType, EffectTarget, Layer,
    Modification, PtSublayer, Value,
};
use crate::dependency::sort_with_dependencies;
use crate::error::EngineError;
use crate::filter::{FilterContext, ObjectFilter};
use crate::ids::{ObjectId, PlayerId};
use crate::object::CounterType;
use crate::store::ObjectStore;
use crate::types::CardType;
use crate::zone::Zone;

/// An object as it currently is, after every continuous effect.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize))]
pub struct ProjectedObject {
    pub id: ObjectId,
    pub owner: PlayerId,
    pub zone: Zone,
    pub characteristics: CalculatedCharacteristics,
    pub tapped: bool,
    pub damage: u32,
    pub counters: BTreeMap<CounterType, u32>,
    pub attached_to: Option<ObjectId>,
    pub is_token: bool,
    pub summoning_sick: bool,
    pub enchant: Option<ObjectFilter>,
    /// The copy effect that set this object's copiable values, if any.
    pub copy_effect: Option<ContinuousEffectId>,
    /// Static abilities the object has after copy effects. A copy's own
    /// printed static abilities stop applying.
    #[cfg_attr(feature = "serialization", serde(skip))]
    pub static_abilities: Vec<StaticAbility>,
    /// Activated abilities that can currently be activated. Empty once the
    /// object has lost all abilities.
    #[cfg_attr(feature = "serialization", serde(skip))]
    pub activated_abilities: Vec<ActivatedAbility>,
    /// Triggered abilities that currently function. Empty once the object
    /// has lost all abilities.
    #[cfg_attr(feature = "serialization", serde(skip))]
    pub triggered_abilities: Vec<TriggeredAbility>,
}

impl ProjectedObject {
    pub fn controller(&self) -> PlayerId {
        self.characteristics.controller
    }

    pub fn name(&self) -> &str {
        &self.characteristics.name
    }
}

/// Public per-player information.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize))]
pub struct PlayerView {
    pub id: PlayerId,
    pub name: String,
    pub life: i32,
    pub poison_counters: u32,
    pub has_lost: bool,
    pub library_size: usize,
    pub hand: Vec<ObjectId>,
    pub graveyard: Vec<ObjectId>,
}

/// The projected game: every object's current characteristics plus the
/// public zone and player information.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize))]
pub struct ProjectedView {
    objects: BTreeMap<ObjectId, ProjectedObject>,
    players: Vec<PlayerView>,
    battlefield: Vec<ObjectId>,
    exile: Vec<ObjectId>,
}

impl ProjectedView {
    pub fn object(&self, id: ObjectId) -> Option<&ProjectedObject> {
        self.objects.get(&id)
    }

    pub fn objects(&self) -> impl Iterator<Item = &ProjectedObject> {
        self.objects.values()
    }

    /// Permanents in the order they entered the battlefield.
    pub fn battlefield(&self) -> impl Iterator<Item = &ProjectedObject> {
        self.battlefield.iter().filter_map(|id| self.objects.get(id))
    }

    pub fn characteristics(&self, id: ObjectId) -> Option<&CalculatedCharacteristics> {
        self.object(id).map(|o| &o.characteristics)
    }

    /// Power after every effect. May be negative.
    pub fn power(&self, id: ObjectId) -> Option<i32> {
        self.characteristics(id)?.power
    }

    /// Toughness after every effect. May be negative.
    pub fn toughness(&self, id: ObjectId) -> Option<i32> {
        self.characteristics(id)?.toughness
    }

    /// Power as shown to players, clamped at zero.
    pub fn displayed_power(&self, id: ObjectId) -> Option<i32> {
        self.power(id).map(|p| p.max(0))
    }

    /// Toughness as shown to players, clamped at zero.
    pub fn displayed_toughness(&self, id: ObjectId) -> Option<i32> {
        self.toughness(id).map(|t| t.max(0))
    }

    pub fn controller(&self, id: ObjectId) -> Option<PlayerId> {
        self.characteristics(id).map(|c| c.controller)
    }

    /// Whether the object currently has the keyword ability.
    pub fn has_capability(&self, id: ObjectId, capability: Keyword) -> bool {
        self.characteristics(id)
            .is_some_and(|c| c.has_keyword(capability))
    }

    pub fn player(&self, id: PlayerId) -> Option<&PlayerView> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn players(&self) -> &[PlayerView] {
        &self.players
    }

    pub fn life(&self, player: PlayerId) -> Option<i32> {
        self.player(player).map(|p| p.life)
    }

    /// Contents of a zone. Per-player zones need an owner; the library is
    /// hidden and always comes back empty. Stack order is kept by the game
    /// state, not the view.
    pub fn zone_contents(&self, zone: Zone, owner: Option<PlayerId>) -> Vec<ObjectId> {
        match zone {
            Zone::Battlefield => self.battlefield.clone(),
            Zone::Exile => self.exile.clone(),
            Zone::Hand | Zone::Graveyard => owner
                .and_then(|p| self.player(p))
                .map(|p| {
                    if zone == Zone::Hand {
                        p.hand.clone()
                    } else {
                        p.graveyard.clone()
                    }
                })
                .unwrap_or_default(),
            Zone::Library => Vec::new(),
            Zone::Stack | Zone::Command => self
                .objects
                .values()
                .filter(|o| o.zone == zone)
                .map(|o| o.id)
                .collect(),
        }
    }

    pub fn objects_matching<'a>(
        &'a self,
        filter: &'a ObjectFilter,
        ctx: &'a FilterContext,
    ) -> impl Iterator<Item = &'a ProjectedObject> + 'a {
        self.objects.values().filter(move |o| filter.matches(o, ctx))
    }
}

/// Objects mid-projection, keyed by id.
pub(crate) type Working = BTreeMap<ObjectId, ProjectedObject>;

/// Project every object's characteristics through the layer system.
pub fn project(
    store: &ObjectStore,
    effects: &ContinuousEffectManager,
) -> Result<ProjectedView, EngineError> {
    let mut working: Working = store
        .objects()
        .map(|obj| {
            let projected = ProjectedObject {
                id: obj.id,
                owner: obj.owner,
                zone: obj.zone,
                characteristics: CalculatedCharacteristics::from_printed(
                    &obj.printed,
                    obj.controller,
                ),
                tapped: obj.tapped,
                damage: obj.damage,
                counters: obj.counters.clone(),
                attached_to: obj.attached_to,
                is_token: obj.is_token(),
                summoning_sick: obj.summoning_sick,
                enchant: obj.enchant.clone(),
                copy_effect: None,
                static_abilities: obj.static_abilities.clone(),
                activated_abilities: obj.activated_abilities.clone(),
                triggered_abilities: obj.triggered_abilities.clone(),
            };
            (obj.id, projected)
        })
        .collect();

    let registered = effects.all_effects();
    let copy_layer: Vec<&ContinuousEffect> = registered
        .iter()
        .filter(|e| e.layer() == Layer::Copy)
        .collect();
    apply_layer(Layer::Copy, &copy_layer, store, &mut working)?;

    // Past layer 1 a copy's static abilities come from what it copied.
    let copied_statics = copied_static_effects(registered, &working);
    let remaining: Vec<&ContinuousEffect> = registered
        .iter()
        .filter(|e| e.layer() != Layer::Copy && !replaced_by_copy(e, &working))
        .chain(copied_statics.iter())
        .collect();

    for layer in Layer::ALL.into_iter().filter(|&l| l != Layer::Copy) {
        let in_layer: Vec<&ContinuousEffect> = remaining
            .iter()
            .copied()
            .filter(|e| e.layer() == layer && is_active(e, layer, &working))
            .collect();
        apply_layer(layer, &in_layer, store, &mut working)?;
    }

    for obj in working.values_mut() {
        if obj.characteristics.abilities_removed {
            obj.activated_abilities.clear();
            obj.triggered_abilities.clear();
        }
    }

    let players = store
        .players()
        .iter()
        .map(|p| PlayerView {
            id: p.id,
            name: p.name.clone(),
            life: p.life,
            poison_counters: p.poison_counters,
            has_lost: p.has_lost,
            library_size: p.library.len(),
            hand: p.hand.clone(),
            graveyard: p.graveyard.clone(),
        })
        .collect();

    Ok(ProjectedView {
        objects: working,
        players,
        battlefield: store.battlefield().to_vec(),
        exile: store.exile().to_vec(),
    })
}

fn apply_layer(
    layer: Layer,
    in_layer: &[&ContinuousEffect],
    store: &ObjectStore,
    working: &mut Working,
) -> Result<(), EngineError> {
    if layer == Layer::PowerToughness {
        for sublayer in PtSublayer::ALL {
            if sublayer == PtSublayer::Counters {
                apply_physical_counters(working);
            }
            let group: Vec<&ContinuousEffect> = in_layer
                .iter()
                .copied()
                .filter(|e| e.sublayer() == Some(sublayer))
                .collect();
            apply_group(&group, layer, store, working)?;
        }
        return Ok(());
    }
    let (cda, rest): (Vec<&ContinuousEffect>, Vec<&ContinuousEffect>) = in_layer
        .iter()
        .copied()
        .partition(|e| e.is_characteristic_defining());
    apply_group(&cda, layer, store, working)?;
    apply_group(&rest, layer, store, working)
}

/// Effects generated by the static abilities a permanent gained from a copy
/// effect. They share that copy effect's id and timestamp.
fn copied_static_effects(registered: &[ContinuousEffect], working: &Working) -> Vec<ContinuousEffect> {
    let mut generated = Vec::new();
    for obj in working.values().filter(|o| o.zone == Zone::Battlefield) {
        let Some(copy) = obj
            .copy_effect
            .and_then(|id| registered.iter().find(|e| e.id == id))
        else {
            continue;
        };
        for ability in &obj.static_abilities {
            let mut effect = ability
                .to_effect(obj.id, obj.controller())
                .with_timestamp(copy.timestamp);
            effect.id = copy.id;
            generated.push(effect);
        }
    }
    generated
}

/// Registered effects of a permanent's own static abilities don't apply
/// while it is a copy of something else.
fn replaced_by_copy(effect: &ContinuousEffect, working: &Working) -> bool {
    effect.source_type != EffectSourceType::Resolution
        && working
            .get(&effect.source)
            .is_some_and(|src| src.copy_effect.is_some())
}

fn apply_group(
    group: &[&ContinuousEffect],
    layer: Layer,
    store: &ObjectStore,
    working: &mut Working,
) -> Result<(), EngineError> {
    if group.is_empty() {
        return Ok(());
    }
    let ordered = sort_with_dependencies(group, layer, store, working)?;
    for effect in ordered {
        let affected = affected_objects(effect, store, working);
        trace!(
            effect = effect.id.0,
            layer = layer.number(),
            count = affected.len(),
            "applying continuous effect"
        );
        for id in affected {
            apply_modification(effect, id, working);
        }
    }
    Ok(())
}

/// Effects from abilities stop applying in later layers once the source has
/// lost its abilities (rule 613.6).
fn is_active(effect: &ContinuousEffect, layer: Layer, working: &Working) -> bool {
    if effect.source_type == EffectSourceType::Resolution || layer <= Layer::Ability {
        return true;
    }
    working
        .get(&effect.source)
        .is_none_or(|src| !src.characteristics.abilities_removed)
}

/// Who "you" is for an effect: the current controller of a static ability's
/// source, or the player who created a resolved effect.
pub(crate) fn filter_context(effect: &ContinuousEffect, working: &Working) -> FilterContext {
    let you = match effect.source_type {
        EffectSourceType::Resolution => effect.controller,
        _ => working
            .get(&effect.source)
            .map_or(effect.controller, |src| src.characteristics.controller),
    };
    FilterContext::new(you, Some(effect.source))
}

/// The objects an effect applies to, judged against `working`.
pub(crate) fn affected_objects(
    effect: &ContinuousEffect,
    store: &ObjectStore,
    working: &Working,
) -> Vec<ObjectId> {
    match &effect.applies_to {
        EffectTarget::Specific(id) => working.contains_key(id).then_some(*id).into_iter().collect(),
        EffectTarget::Source => working
            .contains_key(&effect.source)
            .then_some(effect.source)
            .into_iter()
            .collect(),
        EffectTarget::AttachedToSource => store
            .get(effect.source)
            .filter(|src| src.zone == Zone::Battlefield)
            .and_then(|src| src.attached_to)
            .filter(|id| working.contains_key(id))
            .into_iter()
            .collect(),
        EffectTarget::AllPermanents => working
            .values()
            .filter(|o| o.zone == Zone::Battlefield)
            .map(|o| o.id)
            .collect(),
        EffectTarget::AllCreatures => working
            .values()
            .filter(|o| o.zone == Zone::Battlefield && o.characteristics.is_creature())
            .map(|o| o.id)
            .collect(),
        EffectTarget::Filter(filter) => {
            let ctx = filter_context(effect, working);
            working
                .values()
                .filter(|o| filter.matches(o, &ctx))
                .map(|o| o.id)
                .collect()
        }
    }
}

pub(crate) fn evaluate_value(value: &Value, ctx: &FilterContext, working: &Working) -> i32 {
    match value {
        Value::Fixed(n) => *n,
        Value::CountOf(filter) => working.values().filter(|o| filter.matches(o, ctx)).count() as i32,
    }
}

/// Copiable values of the original, taken before the copy is modified.
struct CopiedValues {
    characteristics: CalculatedCharacteristics,
    static_abilities: Vec<StaticAbility>,
    activated_abilities: Vec<ActivatedAbility>,
    triggered_abilities: Vec<TriggeredAbility>,
    enchant: Option<ObjectFilter>,
}

/// Apply one effect's modification to one object.
pub(crate) fn apply_modification(effect: &ContinuousEffect, id: ObjectId, working: &mut Working) {
    // Values that read other objects are computed before taking the mutable borrow.
    let copied = match &effect.modification {
        Modification::CopyOf(original) => working.get(original).map(|o| CopiedValues {
            characteristics: o.characteristics.clone(),
            static_abilities: o.static_abilities.clone(),
            activated_abilities: o.activated_abilities.clone(),
            triggered_abilities: o.triggered_abilities.clone(),
            enchant: o.enchant.clone(),
        }),
        _ => None,
    };
    let set_pt = match &effect.modification {
        Modification::SetPowerToughness { power, toughness } => {
            let ctx = filter_context(effect, working);
            Some((
                evaluate_value(power, &ctx, working),
                evaluate_value(toughness, &ctx, working),
            ))
        }
        _ => None,
    };

    let Some(obj) = working.get_mut(&id) else {
        return;
    };
    let chars = &mut obj.characteristics;

    match &effect.modification {
        Modification::CopyOf(_) => {
            if let Some(values) = copied {
                let controller = chars.controller;
                let abilities_removed = chars.abilities_removed;
                *chars = CalculatedCharacteristics {
                    controller,
                    abilities_removed,
                    ..values.characteristics
                };
                obj.static_abilities = values.static_abilities;
                obj.activated_abilities = values.activated_abilities;
                obj.triggered_abilities = values.triggered_abilities;
                obj.enchant = values.enchant;
                obj.copy_effect = Some(effect.id);
            }
        }
        Modification::ChangeController(player) => chars.controller = *player,
        Modification::AddCardType(card_type) => chars.add_card_type(*card_type),
        Modification::RemoveCardType(card_type) => chars.card_types.retain(|t| t != card_type),
        Modification::AddSubtype(subtype) => chars.add_subtype(*subtype),
        Modification::RemoveAllCreatureTypes => chars
            .subtypes
            .retain(|s| s.is_basic_land_type() || is_noncreature_subtype(*s)),
        Modification::AddSupertype(supertype) => {
            if !chars.supertypes.contains(supertype) {
                chars.supertypes.push(*supertype);
            }
        }
        Modification::RemoveSupertype(supertype) => chars.supertypes.retain(|s| s != supertype),
        Modification::SetColors(colors) => chars.colors = *colors,
        Modification::AddColors(colors) => chars.colors = chars.colors.union(*colors),
        Modification::AddKeyword(keyword) => {
            chars.keywords.insert(*keyword);
        }
        Modification::RemoveKeyword(keyword) => {
            chars.keywords.remove(keyword);
        }
        Modification::RemoveAllAbilities => {
            chars.keywords.clear();
            chars.abilities_removed = true;
        }
        Modification::SetPowerToughness { .. } => {
            if let Some((power, toughness)) = set_pt {
                chars.power = Some(power);
                chars.toughness = Some(toughness);
            }
        }
        Modification::CounterBonus { power, toughness }
        | Modification::ModifyPowerToughness { power, toughness } => {
            if let (Some(p), Some(t)) = (chars.power.as_mut(), chars.toughness.as_mut()) {
                *p += power;
                *t += toughness;
            }
        }
        Modification::SwitchPowerToughness => {
            if let (Some(p), Some(t)) = (chars.power, chars.toughness) {
                chars.power = Some(t);
                chars.toughness = Some(p);
            }
        }
        Modification::Custom(custom) => (custom.apply)(chars),
    }
}

fn is_noncreature_subtype(subtype: crate::types::Subtype) -> bool {
    use crate::types::Subtype;
    matches!(subtype, Subtype::Equipment | Subtype::Aura | Subtype::Saga)
}

/// +1/+1 and -1/-1 counters on creatures, sublayer 7c.
fn apply_physical_counters(working: &mut Working) {
    for obj in working.values_mut() {
        if obj.zone != Zone::Battlefield || !obj.characteristics.has_card_type(CardType::Creature) {
            continue;
        }
        let plus = obj.counters.get(&CounterType::PlusOnePlusOne).copied().unwrap_or(0) as i32;
        let minus = obj
            .counters
            .get(&CounterType::MinusOneMinusOne)
            .copied()
            .unwrap_or(0) as i32;
        if plus == minus {
            continue;
        }
        let chars = &mut obj.characteristics;
        if let (Some(p), Some(t)) = (chars.power.as_mut(), chars.toughness.as_mut()) {
            *p += plus - minus;
            *t += plus - minus;
        }
    }
}

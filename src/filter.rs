//! Object and player filters.
//!
//! Filters are always evaluated against projected characteristics, never
//! against printed ones, so "Elves you control" sees type-changing and
//! control-changing effects.

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

use crate::characteristics::Keyword;
use crate::color::ColorSet;
use crate::continuous::Aspect;
use crate::ids::{ObjectId, PlayerId};
use crate::projection::ProjectedObject;
use crate::types::{CardType, Subtype, Supertype};
use crate::zone::Zone;

/// Who a filter is evaluated on behalf of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterContext {
    pub you: PlayerId,
    pub source: Option<ObjectId>,
}

impl FilterContext {
    pub fn new(you: PlayerId, source: Option<ObjectId>) -> Self {
        Self { you, source }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub enum PlayerFilter {
    #[default]
    Any,
    You,
    Opponent,
    Specific(PlayerId),
}

impl PlayerFilter {
    pub fn matches(&self, player: PlayerId, ctx: &FilterContext) -> bool {
        match self {
            PlayerFilter::Any => true,
            PlayerFilter::You => player == ctx.you,
            PlayerFilter::Opponent => player != ctx.you,
            PlayerFilter::Specific(id) => player == *id,
        }
    }
}

/// Filter for selecting objects by their projected characteristics.
///
/// Empty lists mean "don't care"; non-empty lists match if any entry matches.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct ObjectFilter {
    pub zone: Option<Zone>,
    pub card_types: Vec<CardType>,
    pub excluded_card_types: Vec<CardType>,
    pub subtypes: Vec<Subtype>,
    pub supertypes: Vec<Supertype>,
    pub controller: Option<PlayerFilter>,
    pub colors: Option<ColorSet>,
    pub keywords: Vec<Keyword>,
    pub name: Option<String>,
    /// Excludes the filter's own source ("other Elves").
    pub other: bool,
    pub token: bool,
    pub nontoken: bool,
    pub tapped: bool,
    pub untapped: bool,
}

impl ObjectFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Any permanent on the battlefield.
    pub fn permanent() -> Self {
        Self {
            zone: Some(Zone::Battlefield),
            ..Self::default()
        }
    }

    pub fn creature() -> Self {
        Self::permanent().with_type(CardType::Creature)
    }

    pub fn with_type(mut self, card_type: CardType) -> Self {
        self.card_types.push(card_type);
        self
    }

    pub fn without_type(mut self, card_type: CardType) -> Self {
        self.excluded_card_types.push(card_type);
        self
    }

    pub fn with_subtype(mut self, subtype: Subtype) -> Self {
        self.subtypes.push(subtype);
        self
    }

    pub fn with_supertype(mut self, supertype: Supertype) -> Self {
        self.supertypes.push(supertype);
        self
    }

    pub fn with_keyword(mut self, keyword: Keyword) -> Self {
        self.keywords.push(keyword);
        self
    }

    pub fn with_colors(mut self, colors: ColorSet) -> Self {
        self.colors = Some(colors);
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn you_control(mut self) -> Self {
        self.controller = Some(PlayerFilter::You);
        self
    }

    pub fn opponent_controls(mut self) -> Self {
        self.controller = Some(PlayerFilter::Opponent);
        self
    }

    pub fn other(mut self) -> Self {
        self.other = true;
        self
    }

    pub fn untapped(mut self) -> Self {
        self.untapped = true;
        self
    }

    pub fn in_zone(mut self, zone: Zone) -> Self {
        self.zone = Some(zone);
        self
    }

    pub fn matches(&self, object: &ProjectedObject, ctx: &FilterContext) -> bool {
        let chars = &object.characteristics;

        if let Some(zone) = self.zone
            && object.zone != zone
        {
            return false;
        }

        if self.other && ctx.source == Some(object.id) {
            return false;
        }

        if !self.card_types.is_empty()
            && !self.card_types.iter().any(|t| chars.card_types.contains(t))
        {
            return false;
        }

        if self
            .excluded_card_types
            .iter()
            .any(|t| chars.card_types.contains(t))
        {
            return false;
        }

        if !self.subtypes.is_empty() && !self.subtypes.iter().any(|t| chars.subtypes.contains(t)) {
            return false;
        }

        if !self.supertypes.is_empty()
            && !self.supertypes.iter().any(|t| chars.supertypes.contains(t))
        {
            return false;
        }

        if let Some(controller) = &self.controller
            && !controller.matches(chars.controller, ctx)
        {
            return false;
        }

        if let Some(colors) = self.colors
            && chars.colors.intersection(colors).is_empty()
        {
            return false;
        }

        if !self.keywords.iter().all(|k| chars.keywords.contains(k)) {
            return false;
        }

        if let Some(name) = &self.name
            && chars.name != *name
        {
            return false;
        }

        if self.token && !object.is_token {
            return false;
        }
        if self.nontoken && object.is_token {
            return false;
        }
        if self.tapped && !object.tapped {
            return false;
        }
        if self.untapped && object.tapped {
            return false;
        }

        true
    }

    /// Characteristic aspects whose value decides whether this filter matches.
    pub fn read_aspects(&self) -> Vec<Aspect> {
        let mut aspects = Vec::new();
        if !self.card_types.is_empty()
            || !self.excluded_card_types.is_empty()
            || !self.subtypes.is_empty()
            || !self.supertypes.is_empty()
        {
            aspects.push(Aspect::Types);
        }
        if self.controller.is_some() {
            aspects.push(Aspect::Controller);
        }
        if self.colors.is_some() {
            aspects.push(Aspect::Colors);
        }
        if !self.keywords.is_empty() {
            aspects.push(Aspect::Abilities);
        }
        if self.name.is_some() {
            aspects.push(Aspect::Text);
        }
        aspects
    }

    /// Short human-readable description for decisions and logs.
    pub fn describe(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        if self.other {
            parts.push("other".to_string());
        }
        if self.tapped {
            parts.push("tapped".to_string());
        }
        if self.untapped {
            parts.push("untapped".to_string());
        }
        for supertype in &self.supertypes {
            parts.push(format!("{supertype:?}").to_lowercase());
        }
        for subtype in &self.subtypes {
            parts.push(format!("{subtype:?}"));
        }
        if self.card_types.is_empty() {
            parts.push("permanent".to_string());
        } else {
            let types: Vec<String> = self
                .card_types
                .iter()
                .map(|t| format!("{t:?}").to_lowercase())
                .collect();
            parts.push(types.join(" or "));
        }
        match self.controller {
            Some(PlayerFilter::You) => parts.push("you control".to_string()),
            Some(PlayerFilter::Opponent) => parts.push("an opponent controls".to_string()),
            _ => {}
        }
        parts.join(" ")
    }
}

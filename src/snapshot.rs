//! Last-known information.
//!
//! A snapshot freezes how an object looked in a projected view: after every
//! continuous effect, with its counters and controller at that moment. Stack
//! entries carry one for their source so an ability whose source has left the
//! battlefield can still resolve (rule 608.2h).

use std::collections::BTreeMap;

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

use crate::characteristics::CalculatedCharacteristics;
use crate::ids::{ObjectId, PlayerId};
use crate::object::CounterType;
use crate::projection::ProjectedObject;
use crate::zone::Zone;

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct ObjectSnapshot {
    pub object_id: ObjectId,
    pub owner: PlayerId,
    pub controller: PlayerId,
    pub zone: Zone,
    pub characteristics: CalculatedCharacteristics,
    pub counters: BTreeMap<CounterType, u32>,
    pub tapped: bool,
    pub damage: u32,
    pub attached_to: Option<ObjectId>,
    pub is_token: bool,
}

impl ObjectSnapshot {
    pub fn from_projected(obj: &ProjectedObject) -> Self {
        Self {
            object_id: obj.id,
            owner: obj.owner,
            controller: obj.characteristics.controller,
            zone: obj.zone,
            characteristics: obj.characteristics.clone(),
            counters: obj.counters.clone(),
            tapped: obj.tapped,
            damage: obj.damage,
            attached_to: obj.attached_to,
            is_token: obj.is_token,
        }
    }

    pub fn name(&self) -> &str {
        &self.characteristics.name
    }

    pub fn power(&self) -> Option<i32> {
        self.characteristics.power
    }

    pub fn toughness(&self) -> Option<i32> {
        self.characteristics.toughness
    }
}

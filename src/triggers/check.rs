//! Trigger collection and queue management.
//!
//! [`collect`] runs once per atomic mutation batch. It compares every raw event
//! of the batch against the triggered abilities of the permanents that could
//! see it and returns one [`TriggeredAbilityEntry`] per match.

use tracing::trace;

use crate::ability::TriggeredAbility;
use crate::game_event::GameEvent;
use crate::game_state::Target;
use crate::ids::{ObjectId, PlayerId};
use crate::projection::ProjectedView;
use crate::snapshot::ObjectSnapshot;

use super::matcher_trait::TriggerContext;

/// A triggered ability that needs to go on the stack.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggeredAbilityEntry {
    /// The source permanent that has the triggered ability.
    pub source: ObjectId,
    /// The controller of the triggered ability.
    pub controller: PlayerId,
    /// The triggered ability definition.
    pub ability: TriggeredAbility,
    /// The event that triggered this ability.
    pub event: GameEvent,
    /// How the source looked when the ability triggered.
    pub source_snapshot: ObjectSnapshot,
    /// Chosen when the ability is put on the stack.
    pub targets: Vec<Target>,
}

impl TriggeredAbilityEntry {
    pub fn description(&self) -> String {
        format!("{} ({})", self.ability.description(), self.source_snapshot.name())
    }
}

/// Queue of triggered abilities waiting to be put on the stack.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriggerQueue {
    /// Pending triggered abilities.
    pub entries: Vec<TriggeredAbilityEntry>,
}

impl TriggerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, entry: TriggeredAbilityEntry) {
        self.entries.push(entry);
    }

    pub fn extend(&mut self, entries: impl IntoIterator<Item = TriggeredAbilityEntry>) {
        self.entries.extend(entries);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Take all entries, leaving the queue empty.
    pub fn take_all(&mut self) -> Vec<TriggeredAbilityEntry> {
        std::mem::take(&mut self.entries)
    }

    /// Take every entry controlled by `player`, preserving their order.
    pub fn take_for_player(&mut self, player: PlayerId) -> Vec<TriggeredAbilityEntry> {
        let (taken, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.entries)
            .into_iter()
            .partition(|e| e.controller == player);
        self.entries = kept;
        taken
    }
}

/// Collect every triggered ability that fires for a batch of raw events.
///
/// Leaves-the-battlefield conditions look back in time: they are checked
/// against the permanents and abilities of `old_view`. Every other condition
/// is checked against `new_view`.
pub fn collect(
    old_view: &ProjectedView,
    new_view: &ProjectedView,
    events: &[GameEvent],
) -> Vec<TriggeredAbilityEntry> {
    let mut entries = Vec::new();

    for event in events {
        for (view, looks_back) in [(old_view, true), (new_view, false)] {
            for obj in view.battlefield() {
                for ability in &obj.triggered_abilities {
                    if ability.trigger.uses_snapshot() != looks_back {
                        continue;
                    }
                    let ctx = TriggerContext {
                        source_id: obj.id,
                        controller: obj.characteristics.controller,
                        old_view,
                        new_view,
                    };
                    if !ability.trigger.matches(event, &ctx) {
                        continue;
                    }
                    trace!(
                        source = %obj.id,
                        trigger = %ability.trigger.display(),
                        "ability triggered"
                    );
                    entries.push(TriggeredAbilityEntry {
                        source: obj.id,
                        controller: obj.characteristics.controller,
                        ability: ability.clone(),
                        event: event.clone(),
                        source_snapshot: ObjectSnapshot::from_projected(obj),
                        targets: Vec::new(),
                    });
                }
            }
        }
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::{Effect, PlayerRef};
    use crate::triggers::Trigger;

    fn entry(source: u64, controller: u8) -> TriggeredAbilityEntry {
        let ability = TriggeredAbility::new(
            Trigger::this_dies(),
            vec![Effect::GainLife {
                player: PlayerRef::You,
                amount: 1,
            }],
        );
        let snapshot = crate::tests::fixtures::snapshot_of("Doomed Traveler", source, controller);
        TriggeredAbilityEntry {
            source: ObjectId::from_raw(source),
            controller: PlayerId::from_index(controller),
            ability,
            event: GameEvent::PlayerLost {
                player: PlayerId::from_index(0),
            },
            source_snapshot: snapshot,
            targets: Vec::new(),
        }
    }

    #[test]
    fn test_take_for_player_preserves_order() {
        let mut queue = TriggerQueue::new();
        queue.add(entry(1, 0));
        queue.add(entry(2, 1));
        queue.add(entry(3, 0));

        let alice = queue.take_for_player(PlayerId::from_index(0));
        assert_eq!(
            alice.iter().map(|e| e.source.0).collect::<Vec<_>>(),
            vec![1, 3]
        );
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.take_all()[0].source, ObjectId::from_raw(2));
        assert!(queue.is_empty());
    }
}

//! Property tests for the projector.

use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use super::fixtures::{self, Table};
use crate::characteristics::Keyword;
use crate::continuous::{ContinuousEffect, ContinuousEffectId, EffectTarget, Layer, Modification, Value};
use crate::dependency::sort_with_dependencies;
use crate::ids::{ObjectId, PlayerId};
use crate::projection::Working;
use crate::types::Subtype;

fn modification(kind: u8, a: i8, b: i8) -> Modification {
    match kind % 6 {
        0 => Modification::ModifyPowerToughness {
            power: a as i32,
            toughness: b as i32,
        },
        1 => Modification::SetPowerToughness {
            power: Value::Fixed(a as i32),
            toughness: Value::Fixed(b as i32),
        },
        2 => Modification::SwitchPowerToughness,
        3 => Modification::AddSubtype(Subtype::Elf),
        4 => Modification::AddKeyword(Keyword::Flying),
        _ => Modification::RemoveAllAbilities,
    }
}

fn baseline(table: &Table) -> Working {
    table.project().objects().map(|o| (o.id, o.clone())).collect()
}

proptest! {
    #[test]
    fn prop_projection_is_pure(
        effects in prop::collection::vec((0u8..6, -5i8..6, -5i8..6, any::<bool>()), 0..10)
    ) {
        let mut table = Table::new();
        let bears = table.battlefield(0, fixtures::grizzly_bears());
        let elf = table.battlefield(1, fixtures::llanowar_elves());
        table.battlefield(0, fixtures::elf_lord());
        for (kind, a, b, on_elf) in effects {
            let target = if on_elf { elf } else { bears };
            table.effect(ContinuousEffect::new(
                target,
                PlayerId::from_index(0),
                EffectTarget::Specific(target),
                modification(kind, a, b),
            ));
        }
        let before = table.game.clone();
        let first = table.project();
        let second = table.project();
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(&table.game, &before);
    }

    #[test]
    fn prop_same_sublayer_sorts_by_timestamp(seed in any::<u64>(), values in prop::collection::vec(0i32..10, 2..6)) {
        let table = Table::new();
        let target = ObjectId::from_raw(1);
        let effects: Vec<ContinuousEffect> = values
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                let timestamp = i as u64 + 1;
                let mut e = ContinuousEffect::new(
                    target,
                    PlayerId::from_index(0),
                    EffectTarget::Specific(target),
                    Modification::SetPowerToughness {
                        power: Value::Fixed(v),
                        toughness: Value::Fixed(v),
                    },
                )
                .with_timestamp(timestamp);
                e.id = ContinuousEffectId(timestamp);
                e
            })
            .collect();
        let mut shuffled: Vec<&ContinuousEffect> = effects.iter().collect();
        shuffled.shuffle(&mut StdRng::seed_from_u64(seed));

        let sorted = sort_with_dependencies(
            &shuffled,
            Layer::PowerToughness,
            table.store(),
            &baseline(&table),
        )
        .unwrap();
        let order: Vec<u64> = sorted.iter().map(|e| e.timestamp).collect();
        let expected: Vec<u64> = (1..=effects.len() as u64).collect();
        prop_assert_eq!(order, expected);
    }

    #[test]
    fn prop_registry_timestamps_decide_setting_effects(
        seed in any::<u64>(),
        sets in prop::collection::vec(0i32..10, 1..6),
        pumps in prop::collection::vec(-2i32..3, 0..4),
    ) {
        let mut table = Table::new();
        let bears = table.battlefield(0, fixtures::grizzly_bears());
        let mut mods: Vec<Modification> = sets
            .iter()
            .map(|&v| Modification::SetPowerToughness {
                power: Value::Fixed(v),
                toughness: Value::Fixed(v),
            })
            .chain(pumps.iter().map(|&p| Modification::ModifyPowerToughness {
                power: p,
                toughness: 0,
            }))
            .collect();
        mods.shuffle(&mut StdRng::seed_from_u64(seed));

        let mut last_set = None;
        for m in mods {
            if let Modification::SetPowerToughness { power: Value::Fixed(v), .. } = &m {
                last_set = Some(*v);
            }
            table.effect(ContinuousEffect::new(
                bears,
                PlayerId::from_index(0),
                EffectTarget::Specific(bears),
                m,
            ));
        }

        // The newest setting effect wins; every pump applies on top of it.
        let set = last_set.unwrap_or(2);
        let pump: i32 = pumps.iter().sum();
        let view = table.project();
        prop_assert_eq!(view.power(bears), Some(set + pump));
        prop_assert_eq!(view.toughness(bears), Some(set));
    }

    #[test]
    fn prop_layers_ignore_creation_order(seed in any::<u64>(), set in 0i32..5, pump in 0i32..5) {
        let mut table = Table::new();
        let bears = table.battlefield(0, fixtures::grizzly_bears());
        let lord = table.battlefield(0, fixtures::elf_lord());
        let mut mods = vec![
            Modification::AddSubtype(Subtype::Elf),
            Modification::SetPowerToughness {
                power: Value::Fixed(set),
                toughness: Value::Fixed(set),
            },
            Modification::ModifyPowerToughness {
                power: pump,
                toughness: 0,
            },
        ];
        mods.shuffle(&mut StdRng::seed_from_u64(seed));
        for m in mods {
            table.effect(ContinuousEffect::new(
                lord,
                PlayerId::from_index(0),
                EffectTarget::Specific(bears),
                m,
            ));
        }

        // Type change, then setting, then the lord's anthem and the pump.
        let view = table.project();
        prop_assert_eq!(view.power(bears), Some(set + pump + 1));
        prop_assert_eq!(view.toughness(bears), Some(set + 1));
    }
}

#[test]
fn test_later_setting_effect_wins() {
    let mut table = Table::new();
    let bears = table.battlefield(0, fixtures::grizzly_bears());
    for value in [4, 1, 7] {
        table.effect(ContinuousEffect::new(
            bears,
            PlayerId::from_index(0),
            EffectTarget::Specific(bears),
            Modification::SetPowerToughness {
                power: Value::Fixed(value),
                toughness: Value::Fixed(value),
            },
        ));
    }
    assert_eq!(table.project().power(bears), Some(7));
}

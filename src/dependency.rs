//! Dependency ordering for continuous effects.
//!
//! Per MTG Rule 613.8, continuous effects in the same layer/sublayer that
//! depend on each other are applied in the order that handles the dependency,
//! regardless of their timestamps.
//!
//! A dependency exists if:
//! - The effects are in the same layer (or sublayer for Layer 7)
//! - Applying one effect would change whether the other applies, what it applies
//!   to, or what it does
//! - Neither effect is a characteristic-defining ability, or both are
//!
//! Detection is declarative first: every effect reports the aspects it reads,
//! every modification the aspects it writes. An overlap is a candidate; for
//! reads that come from an applicability filter or a computed value, the
//! candidate is confirmed by simulating the other effect on a copy of the
//! current characteristics.
//!
//! A dependency loop is reported as an invariant failure listing the effects
//! involved.

use std::collections::BTreeSet;

use crate::continuous::{Aspect, ContinuousEffect, Layer, Modification};
use crate::error::InvariantFailure;
use crate::projection::{Working, affected_objects, apply_modification, evaluate_value, filter_context};
use crate::ids::ObjectId;
use crate::store::ObjectStore;

/// Check if effect A depends on effect B, given the characteristics as they
/// stand before either is applied.
///
/// Returns true if B must be applied before A.
pub fn effect_depends_on(
    a: &ContinuousEffect,
    b: &ContinuousEffect,
    store: &ObjectStore,
    baseline: &Working,
) -> bool {
    // Rule 613.8: same layer, same sublayer, same CDA status.
    if a.layer() != b.layer()
        || a.sublayer() != b.sublayer()
        || a.is_characteristic_defining() != b.is_characteristic_defining()
    {
        return false;
    }

    if removal_depends_on_grant(&a.modification, &b.modification) {
        return true;
    }

    let writes = b.modification.writes();
    let overlaps =
        |reads: &[Aspect]| reads.iter().any(|r| writes.iter().any(|w| w.overlaps(*r)));

    // Explicit declarations are taken at their word.
    if overlaps(&a.reads) {
        return true;
    }

    let applicability = overlaps(&a.applies_to.read_aspects());
    let output = overlaps(&a.modification.reads());
    if !applicability && !output {
        return false;
    }

    let after = simulate(b, store, baseline);
    if applicability && affected_set(a, store, baseline) != affected_set(a, store, &after) {
        return true;
    }
    output && modification_inputs(a, baseline) != modification_inputs(a, &after)
}

/// Removing all abilities depends on any effect that adds abilities, so the
/// remover applies after the adders.
fn removal_depends_on_grant(a: &Modification, b: &Modification) -> bool {
    match (a, b) {
        (Modification::RemoveAllAbilities, Modification::AddKeyword(_)) => true,
        (Modification::RemoveAllAbilities, Modification::Custom(custom)) => {
            custom.layer == Layer::Ability
        }
        _ => false,
    }
}

fn simulate(b: &ContinuousEffect, store: &ObjectStore, baseline: &Working) -> Working {
    let mut after = baseline.clone();
    for id in affected_objects(b, store, baseline) {
        apply_modification(b, id, &mut after);
    }
    after
}

fn affected_set(effect: &ContinuousEffect, store: &ObjectStore, working: &Working) -> BTreeSet<ObjectId> {
    affected_objects(effect, store, working).into_iter().collect()
}

/// What the modification would compute from the rest of the game.
#[derive(Debug, PartialEq)]
enum Inputs {
    None,
    Values(i32, i32),
    Copied(Option<String>, Option<i32>, Option<i32>, Vec<crate::types::CardType>),
}

fn modification_inputs(effect: &ContinuousEffect, working: &Working) -> Inputs {
    match &effect.modification {
        Modification::SetPowerToughness { power, toughness } => {
            let ctx = filter_context(effect, working);
            Inputs::Values(
                evaluate_value(power, &ctx, working),
                evaluate_value(toughness, &ctx, working),
            )
        }
        Modification::CopyOf(original) => match working.get(original) {
            Some(o) => Inputs::Copied(
                Some(o.characteristics.name.clone()),
                o.characteristics.power,
                o.characteristics.toughness,
                o.characteristics.card_types.clone(),
            ),
            None => Inputs::Copied(None, None, None, Vec::new()),
        },
        _ => Inputs::None,
    }
}

/// Sort one layer/sublayer group considering dependencies.
///
/// Returns effects sorted so that if A depends on B, B comes before A. Among
/// effects that are free to go, the one with the earliest timestamp goes
/// first.
pub fn sort_with_dependencies<'a>(
    effects: &[&'a ContinuousEffect],
    layer: Layer,
    store: &ObjectStore,
    baseline: &Working,
) -> Result<Vec<&'a ContinuousEffect>, InvariantFailure> {
    let order_key = |e: &ContinuousEffect| (e.timestamp, e.id);

    if effects.len() <= 1 {
        return Ok(effects.to_vec());
    }

    // depends_on[i] contains effects that i depends on.
    // If A depends on B, B must come before A in the result.
    let n = effects.len();
    let mut depends_on: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); n];
    let mut has_any_dependency = false;
    for i in 0..n {
        for j in 0..n {
            if i != j && effect_depends_on(effects[i], effects[j], store, baseline) {
                depends_on[i].insert(j);
                has_any_dependency = true;
            }
        }
    }

    if !has_any_dependency {
        let mut sorted = effects.to_vec();
        sorted.sort_by_key(|e| order_key(*e));
        return Ok(sorted);
    }

    if has_cycle(&depends_on) {
        return Err(InvariantFailure::DependencyCycle {
            layer,
            dump: describe_cycle(effects, &depends_on),
        });
    }

    // in_degree[i] = number of effects that must come before i
    let mut in_degree: Vec<usize> = depends_on.iter().map(BTreeSet::len).collect();
    let mut depended_by: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (i, deps) in depends_on.iter().enumerate() {
        for &j in deps {
            depended_by[j].push(i);
        }
    }

    let mut result = Vec::with_capacity(n);
    let mut ready: Vec<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();

    // Sort ready queue so oldest timestamp is popped first.
    ready.sort_by_key(|&i| std::cmp::Reverse(order_key(effects[i])));

    while let Some(idx) = ready.pop() {
        result.push(effects[idx]);
        for &dependent in &depended_by[idx] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                ready.push(dependent);
            }
        }
        ready.sort_by_key(|&i| std::cmp::Reverse(order_key(effects[i])));
    }

    Ok(result)
}

/// Check if the dependency graph has a cycle.
fn has_cycle(dependencies: &[BTreeSet<usize>]) -> bool {
    let n = dependencies.len();
    let mut visited = vec![false; n];
    let mut in_stack = vec![false; n];

    fn dfs(
        node: usize,
        dependencies: &[BTreeSet<usize>],
        visited: &mut [bool],
        in_stack: &mut [bool],
    ) -> bool {
        visited[node] = true;
        in_stack[node] = true;

        for &dep in &dependencies[node] {
            if !visited[dep] {
                if dfs(dep, dependencies, visited, in_stack) {
                    return true;
                }
            } else if in_stack[dep] {
                return true;
            }
        }

        in_stack[node] = false;
        false
    }

    (0..n).any(|i| !visited[i] && dfs(i, dependencies, &mut visited, &mut in_stack))
}

/// One line per effect that sits on a dependency loop.
fn describe_cycle(effects: &[&ContinuousEffect], depends_on: &[BTreeSet<usize>]) -> String {
    // Peel off everything that can still be ordered; what remains is on or
    // behind a loop.
    let n = effects.len();
    let mut removed = vec![false; n];
    loop {
        let free: Vec<usize> = (0..n)
            .filter(|&i| !removed[i] && depends_on[i].iter().all(|&j| removed[j]))
            .collect();
        if free.is_empty() {
            break;
        }
        for i in free {
            removed[i] = true;
        }
    }

    (0..n)
        .filter(|&i| !removed[i])
        .map(|i| {
            let e = effects[i];
            let deps: Vec<String> = depends_on[i]
                .iter()
                .filter(|&&j| !removed[j])
                .map(|&j| effects[j].id.0.to_string())
                .collect();
            format!(
                "effect {} (source {}, timestamp {}, {:?}) depends on [{}]",
                e.id.0,
                e.source,
                e.timestamp,
                e.modification,
                deps.join(", ")
            )
        })
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::characteristics::Keyword;
    use crate::continuous::{Aspect, CustomModification, EffectTarget, Value};
    use crate::filter::ObjectFilter;
    use crate::ids::PlayerId;
    use crate::tests::fixtures::{self, Table};
    use crate::types::{CardType, Subtype};

    fn effect(
        source: ObjectId,
        applies_to: EffectTarget,
        modification: Modification,
        timestamp: u64,
    ) -> ContinuousEffect {
        let mut e = ContinuousEffect::new(source, PlayerId::from_index(0), applies_to, modification)
            .with_timestamp(timestamp);
        e.id = crate::continuous::ContinuousEffectId(timestamp);
        e
    }

    fn baseline(table: &Table) -> Working {
        let view = table.project();
        view.objects().map(|o| (o.id, o.clone())).collect()
    }

    #[test]
    fn test_different_layers_never_depend() {
        let table = Table::new();
        let src = ObjectId::from_raw(1);
        let a = effect(src, EffectTarget::AllCreatures, Modification::AddKeyword(Keyword::Flying), 1);
        let b = effect(src, EffectTarget::AllCreatures, Modification::AddCardType(CardType::Artifact), 2);
        assert!(!effect_depends_on(&a, &b, table.store(), &baseline(&table)));
    }

    #[test]
    fn test_remove_all_abilities_depends_on_grant() {
        let table = Table::new();
        let src = ObjectId::from_raw(1);
        let remove = effect(src, EffectTarget::AllCreatures, Modification::RemoveAllAbilities, 1);
        let grant = effect(src, EffectTarget::AllCreatures, Modification::AddKeyword(Keyword::Flying), 2);
        assert!(effect_depends_on(&remove, &grant, table.store(), &baseline(&table)));
        assert!(!effect_depends_on(&grant, &remove, table.store(), &baseline(&table)));

        let sorted =
            sort_with_dependencies(&[&remove, &grant], Layer::Ability, table.store(), &baseline(&table))
                .unwrap();
        assert_eq!(sorted[0].id, grant.id);
    }

    #[test]
    fn test_type_change_ordered_before_filter_reader() {
        // "All Elves are artifacts" (earlier) depends on "target creature is an
        // Elf" (later): the later one changes what the earlier one applies to.
        let mut table = Table::new();
        let bears = table.battlefield(0, fixtures::grizzly_bears());
        let artifacts = effect(
            bears,
            EffectTarget::Filter(ObjectFilter::permanent().with_subtype(Subtype::Elf)),
            Modification::AddCardType(CardType::Artifact),
            1,
        );
        let make_elf = effect(bears, EffectTarget::Specific(bears), Modification::AddSubtype(Subtype::Elf), 2);

        let base = baseline(&table);
        assert!(effect_depends_on(&artifacts, &make_elf, table.store(), &base));
        assert!(!effect_depends_on(&make_elf, &artifacts, table.store(), &base));

        let sorted = sort_with_dependencies(&[&artifacts, &make_elf], Layer::Type, table.store(), &base)
            .unwrap();
        assert_eq!(sorted[0].id, make_elf.id);
        assert_eq!(sorted[1].id, artifacts.id);
    }

    #[test]
    fn test_overlapping_aspects_without_real_change_do_not_depend() {
        // Both write and filter on types, but neither changes the other's set.
        let mut table = Table::new();
        table.battlefield(0, fixtures::grizzly_bears());
        let src = ObjectId::from_raw(99);
        let a = effect(src, EffectTarget::AllCreatures, Modification::AddSubtype(Subtype::Warrior), 1);
        let b = effect(src, EffectTarget::AllCreatures, Modification::AddSubtype(Subtype::Knight), 2);
        let base = baseline(&table);
        assert!(!effect_depends_on(&a, &b, table.store(), &base));
        assert!(!effect_depends_on(&b, &a, table.store(), &base));
    }

    #[test]
    fn test_count_value_depends_on_type_change() {
        let mut table = Table::new();
        let bears = table.battlefield(0, fixtures::grizzly_bears());
        let counting = effect(
            bears,
            EffectTarget::Source,
            Modification::SetPowerToughness {
                power: Value::CountOf(ObjectFilter::creature().with_subtype(Subtype::Elf)),
                toughness: Value::Fixed(1),
            },
            1,
        );
        // Same sublayer (7b), but it writes nothing the count reads.
        let other = effect(
            bears,
            EffectTarget::Source,
            Modification::SetPowerToughness {
                power: Value::Fixed(4),
                toughness: Value::Fixed(4),
            },
            2,
        );
        assert!(!effect_depends_on(&counting, &other, table.store(), &baseline(&table)));
    }

    #[test]
    fn test_declared_cycle_is_an_invariant_failure() {
        let table = Table::new();
        let src = ObjectId::from_raw(1);
        let custom = |name: &str| {
            Modification::Custom(CustomModification::new(name, Layer::Type, vec![Aspect::Types], |_| {}))
        };
        let a = effect(src, EffectTarget::AllPermanents, custom("a"), 1).reading([Aspect::Types]);
        let b = effect(src, EffectTarget::AllPermanents, custom("b"), 2).reading([Aspect::Types]);

        let err = sort_with_dependencies(&[&a, &b], Layer::Type, table.store(), &baseline(&table))
            .unwrap_err();
        match err {
            InvariantFailure::DependencyCycle { layer, dump } => {
                assert_eq!(layer, Layer::Type);
                assert!(dump.contains("effect 1"));
                assert!(dump.contains("effect 2"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_timestamp_order_without_dependencies() {
        let table = Table::new();
        let src = ObjectId::from_raw(1);
        let newer = effect(
            src,
            EffectTarget::AllCreatures,
            Modification::ModifyPowerToughness { power: 1, toughness: 1 },
            7,
        );
        let older = effect(
            src,
            EffectTarget::AllCreatures,
            Modification::ModifyPowerToughness { power: 2, toughness: 0 },
            3,
        );
        let sorted = sort_with_dependencies(
            &[&newer, &older],
            Layer::PowerToughness,
            table.store(),
            &baseline(&table),
        )
        .unwrap();
        assert_eq!(sorted[0].timestamp, 3);
        assert_eq!(sorted[1].timestamp, 7);
    }
}

//! Transformer scheduling.
//!
//! Given the active set for a stage (catalog order preserved), build the
//! ordered batches: every transformer lands in the batch one past its
//! deepest active dependency, and mutually independent transformers share a
//! batch so their visitors fuse into a single traversal.
//!
//! Dependencies are soft. A declared dependency on a transformer that is
//! not active for the stage is pruned, not an error. A dependency cycle
//! among active transformers is fatal and names the participants.

use crate::error::Error;
use crate::transformer::TransformerName;
use rustc_hash::FxHashMap;

/// One schedulable unit: a name plus its declared dependencies.
#[derive(Debug, Clone)]
pub struct Schedulable {
    pub name: TransformerName,
    pub deps: Vec<TransformerName>,
}

/// Build dependency-respecting batches over `items` (the active set, in
/// catalog order). Returns indices into `items`; batch order and in-batch
/// order are deterministic for a fixed input.
pub fn build_batches(items: &[Schedulable]) -> Result<Vec<Vec<usize>>, Error> {
    let index_of: FxHashMap<TransformerName, usize> =
        items.iter().enumerate().map(|(i, s)| (s.name, i)).collect();

    // Prune dependencies to the active set.
    let deps: Vec<Vec<usize>> = items
        .iter()
        .map(|s| s.deps.iter().filter_map(|d| index_of.get(d).copied()).collect())
        .collect();

    // level(i) = 1 + max(level of deps), computed by DFS with an on-stack
    // mark for cycle detection.
    const UNVISITED: u8 = 0;
    const ON_STACK: u8 = 1;
    const DONE: u8 = 2;

    fn level_of(
        i: usize,
        deps: &[Vec<usize>],
        state: &mut [u8],
        levels: &mut [usize],
        trail: &mut Vec<usize>,
    ) -> Result<usize, Vec<usize>> {
        match state[i] {
            DONE => return Ok(levels[i]),
            ON_STACK => {
                // The cycle is the trail suffix starting at `i`.
                let pos = trail.iter().position(|&t| t == i).unwrap_or(0);
                return Err(trail[pos..].to_vec());
            }
            _ => {}
        }
        state[i] = ON_STACK;
        trail.push(i);
        let mut level = 0;
        for &dep in &deps[i] {
            level = level.max(level_of(dep, deps, state, levels, trail)? + 1);
        }
        trail.pop();
        state[i] = DONE;
        levels[i] = level;
        Ok(level)
    }

    let mut state = vec![UNVISITED; items.len()];
    let mut levels = vec![0usize; items.len()];
    let mut max_level = 0;
    for i in 0..items.len() {
        let mut trail = Vec::new();
        match level_of(i, &deps, &mut state, &mut levels, &mut trail) {
            Ok(level) => max_level = max_level.max(level),
            Err(cycle) => {
                let mut participants: Vec<String> =
                    cycle.iter().map(|&i| items[i].name.to_string()).collect();
                participants.sort();
                return Err(Error::ScheduleCycle { participants });
            }
        }
    }

    // Batch k = everything at level k, in catalog order.
    let mut batches = vec![Vec::new(); if items.is_empty() { 0 } else { max_level + 1 }];
    for (i, &level) in levels.iter().enumerate() {
        batches[level].push(i);
    }
    Ok(batches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use TransformerName::*;

    fn item(name: TransformerName, deps: &[TransformerName]) -> Schedulable {
        Schedulable { name, deps: deps.to_vec() }
    }

    #[test]
    fn test_independent_transformers_share_a_batch() {
        let items = [item(Parentifier, &[]), item(EscapeSequenceEncoder, &[])];
        let batches = build_batches(&items).unwrap();
        assert_eq!(batches, vec![vec![0, 1]]);
    }

    #[test]
    fn test_dependency_splits_batches() {
        let items = [
            item(Parentifier, &[]),
            item(MemberAccessConverter, &[Parentifier]),
            item(LiteralConverter, &[MemberAccessConverter]),
        ];
        let batches = build_batches(&items).unwrap();
        assert_eq!(batches, vec![vec![0], vec![1], vec![2]]);
    }

    #[test]
    fn test_inactive_dependency_pruned() {
        // LiteralConverter depends on MemberAccessConverter, which is not in
        // the active set: the hint is dropped and one batch results.
        let items = [item(Parentifier, &[]), item(LiteralConverter, &[MemberAccessConverter])];
        let batches = build_batches(&items).unwrap();
        assert_eq!(batches, vec![vec![0, 1]]);
    }

    #[test]
    fn test_cycle_names_participants() {
        let items = [
            item(ExpressionStatementsMerger, &[VariableDeclarationsMerger]),
            item(VariableDeclarationsMerger, &[ExpressionStatementsMerger]),
        ];
        let err = build_batches(&items).unwrap_err();
        let Error::ScheduleCycle { participants } = err else {
            panic!("expected a cycle error");
        };
        assert_eq!(
            participants,
            vec!["expression-statements-merger".to_string(), "variable-declarations-merger".to_string()]
        );
    }

    #[test]
    fn test_deterministic_for_fixed_input() {
        let items = [
            item(Parentifier, &[]),
            item(ObfuscationGuards, &[Parentifier]),
            item(DeadCodeInjector, &[Parentifier]),
            item(StringArrayTransformer, &[Parentifier]),
        ];
        let first = build_batches(&items).unwrap();
        for _ in 0..8 {
            assert_eq!(build_batches(&items).unwrap(), first);
        }
        assert_eq!(first, vec![vec![0], vec![1, 2, 3]]);
    }

    #[test]
    fn test_empty_input() {
        assert!(build_batches(&[]).unwrap().is_empty());
    }
}

//! # Circular Path Finder
//!
//! Enumerates simple cycles of 2 to 4 hops over the pool graph, starting
//! and ending at a base token. The graph is an adjacency list over a
//! snapshot array taken before the search; cycles come back as pool-index
//! lists. Pool counts are small, so a plain DFS is the right tool; the
//! only requirement is determinism: identical input ordering must yield
//! an identical candidate list.

use std::collections::HashMap;
use std::sync::Arc;

use bigdecimal::BigDecimal;
use smallvec::SmallVec;
use tracing::debug;

use crate::types::{PoolSnapshot, TokenKey};

/// One circular route: the token sequence (`tokens[0] == tokens[n]`) and
/// the pool crossed on each hop, as indices into the search's snapshot
/// array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CyclePath {
    pub tokens: SmallVec<[TokenKey; 5]>,
    pub pool_indices: SmallVec<[usize; 4]>,
}

impl CyclePath {
    pub fn hop_count(&self) -> usize {
        self.pool_indices.len()
    }
}

/// Enumerates every ordered simple cycle of length 2..=`max_hops` from
/// `base` over pools whose global liquidity exceeds `min_liquidity`.
///
/// Rules: a 2-cycle must return through a different pool than it left
/// through; intermediate tokens are pairwise distinct and distinct from
/// the base; cycles differing only in pool choice on a hop are distinct.
pub fn find_circular_paths(
    base: &TokenKey,
    snapshots: &[Arc<PoolSnapshot>],
    max_hops: usize,
    min_liquidity: &BigDecimal,
) -> Vec<CyclePath> {
    let max_hops = max_hops.clamp(2, 4);

    // Adjacency in input order keeps the enumeration deterministic.
    let mut adjacency: HashMap<&TokenKey, Vec<(usize, &TokenKey)>> = HashMap::new();
    for (index, snapshot) in snapshots.iter().enumerate() {
        if &snapshot.liquidity <= min_liquidity {
            continue;
        }
        adjacency
            .entry(&snapshot.token0)
            .or_default()
            .push((index, &snapshot.token1));
        adjacency
            .entry(&snapshot.token1)
            .or_default()
            .push((index, &snapshot.token0));
    }

    let mut cycles = Vec::new();
    if !adjacency.contains_key(base) {
        debug!(target: "path_finder", base = %base, "Base token has no eligible pools");
        return cycles;
    }

    let mut token_trail: SmallVec<[TokenKey; 5]> = SmallVec::new();
    token_trail.push(base.clone());
    let mut pool_trail: SmallVec<[usize; 4]> = SmallVec::new();

    extend(
        base,
        base,
        &adjacency,
        max_hops,
        &mut token_trail,
        &mut pool_trail,
        &mut cycles,
    );

    debug!(
        target: "path_finder",
        base = %base,
        max_hops,
        pools = snapshots.len(),
        cycles = cycles.len(),
        "Cycle enumeration complete"
    );
    cycles
}

fn extend(
    base: &TokenKey,
    current: &TokenKey,
    adjacency: &HashMap<&TokenKey, Vec<(usize, &TokenKey)>>,
    max_hops: usize,
    token_trail: &mut SmallVec<[TokenKey; 5]>,
    pool_trail: &mut SmallVec<[usize; 4]>,
    cycles: &mut Vec<CyclePath>,
) {
    let Some(edges) = adjacency.get(current) else {
        return;
    };

    for &(pool_index, neighbor) in edges {
        if pool_trail.contains(&pool_index) {
            continue;
        }

        if neighbor == base {
            // Closing hop. A 1-hop "cycle" is a round trip through a
            // single pool, not a cycle.
            if pool_trail.len() + 1 >= 2 {
                let mut tokens = token_trail.clone();
                tokens.push(base.clone());
                let mut pool_indices = pool_trail.clone();
                pool_indices.push(pool_index);
                cycles.push(CyclePath { tokens, pool_indices });
            }
            continue;
        }

        if pool_trail.len() + 1 >= max_hops {
            continue;
        }
        if token_trail.iter().any(|t| t == neighbor) {
            continue;
        }

        token_trail.push(neighbor.clone());
        pool_trail.push(pool_index);
        extend(base, neighbor, adjacency, max_hops, token_trail, pool_trail, cycles);
        token_trail.pop();
        pool_trail.pop();
    }
}

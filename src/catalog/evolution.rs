//! Flattening of evolution lineage trees into display order.

use crate::pokeapi::{EvolutionEntry, EvolutionNode};
use crate::resource::IdResolver;

/// Flatten a lineage tree by pre-order depth-first traversal.
///
/// The base form comes first, then each branch in full before its next
/// sibling. Nodes without a species name or a resolvable id are skipped but
/// their children are still visited. Uses an explicit stack, so depth is not
/// bounded by the call stack.
pub fn flatten_evolution(root: &EvolutionNode, resolver: &IdResolver) -> Vec<EvolutionEntry> {
  let mut out = Vec::new();
  let mut stack = vec![root];

  while let Some(node) = stack.pop() {
    if let Some(species) = &node.species {
      if !species.name.is_empty() {
        if let Some(id) = resolver.resolve(&species.url) {
          out.push(EvolutionEntry {
            id,
            name: species.name.clone(),
          });
        }
      }
    }
    // Reverse so the first child is visited next
    stack.extend(node.children.iter().rev());
  }

  out
}

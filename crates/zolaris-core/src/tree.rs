//! Nested hierarchy documents built from flat entity rows.
//!
//! Trees are assembled bottom-up from an arena keyed by parent id, so deep
//! hierarchies never recurse on the call stack while being built.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::entity::Entity;

/// Nodes more than this many levels below the root are left out of a
/// materialised tree.
pub const MAX_TREE_DEPTH: u32 = 256;

/// An entity together with all of its descendants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityNode {
  #[serde(flatten)]
  pub entity:   Entity,
  pub children: Vec<EntityNode>,
}

impl EntityNode {
  /// Number of nodes in this tree, including `self`.
  pub fn node_count(&self) -> usize {
    let mut count = 0;
    let mut stack = vec![self];
    while let Some(node) = stack.pop() {
      count += 1;
      stack.extend(node.children.iter());
    }
    count
  }

  /// Ids of every node, breadth-first.
  #[cfg(test)]
  fn ids(&self) -> Vec<&str> {
    let mut out = Vec::new();
    let mut queue = std::collections::VecDeque::from([self]);
    while let Some(node) = queue.pop_front() {
      out.push(node.entity.entity_id.as_str());
      queue.extend(node.children.iter());
    }
    out
  }
}

/// Build the tree rooted at `root` from its flat list of `descendants`.
///
/// Sibling order follows the order of `descendants`. Rows that cannot be
/// attached under `root` (wrong parent chain, a depth other than their
/// parent's plus one, or deeper than [`MAX_TREE_DEPTH`]) are dropped along
/// with their subtrees.
pub fn assemble(root: Entity, descendants: Vec<Entity>) -> EntityNode {
  let root_depth = root.depth;
  let depths: HashMap<String, u32> = descendants
    .iter()
    .map(|e| (e.entity_id.clone(), e.depth))
    .chain([(root.entity_id.clone(), root_depth)])
    .collect();

  let mut rows: Vec<Entity> = descendants
    .into_iter()
    .filter(|e| {
      let parent_depth = e.parent_id.as_ref().and_then(|p| depths.get(p));
      e.entity_id != root.entity_id
        && e.depth > root_depth
        && e.depth - root_depth <= MAX_TREE_DEPTH
        && parent_depth.is_some_and(|&d| d + 1 == e.depth)
    })
    .collect();

  // Deepest first, so every node's children are complete before it is
  // attached to its own parent.
  rows.sort_by(|a, b| b.depth.cmp(&a.depth));

  let mut built: HashMap<String, Vec<EntityNode>> = HashMap::new();
  for entity in rows {
    let children = built.remove(&entity.entity_id).unwrap_or_default();
    let Some(parent_id) = entity.parent_id.clone() else {
      continue;
    };
    built
      .entry(parent_id)
      .or_default()
      .push(EntityNode { entity, children });
  }

  let children = built.remove(&root.entity_id).unwrap_or_default();
  EntityNode { entity: root, children }
}

//! C1: the slab-linked-list allocator (SPEC_FULL.md §4.1).
//!
//! The original monitor (`init_mem_link`/`add_link_mem` in `original_source/sm/enclave.c`)
//! carves raw memory pages into a manually-managed intrusive linked list of fixed-size slots,
//! because C has no growable container. Per SPEC_FULL.md §4.1's "Rust re-architecture" note,
//! this is re-expressed as a `Vec` of slab nodes, each node a fixed-capacity `Vec<Option<T>>` of
//! slots, growing by pushing a new node instead of asking the platform for another raw page and
//! linking it in by hand. `eid = node_index * SLAB_NODE_CAPACITY + offset` reproduces the
//! original's flat linear indexing scheme so callers can still treat an eid as a plain integer.

use alloc::vec::Vec;

use crate::config::SLAB_NODE_CAPACITY;
use crate::error::EnclaveError;

/// One fixed-capacity node of the slab list.
struct SlabNode<T> {
    slots: Vec<Option<T>>,
}

impl<T> SlabNode<T> {
    fn new() -> Self {
        let mut slots = Vec::with_capacity(SLAB_NODE_CAPACITY);
        slots.resize_with(SLAB_NODE_CAPACITY, || None);
        Self { slots }
    }
}

/// A growable slab of `T`, indexed by a stable integer id that survives insertion and removal
/// of other entries (SPEC_FULL.md §8's "unique eid" and "free/reuse" invariants).
pub struct SlabList<T> {
    nodes: Vec<SlabNode<T>>,
}

impl<T> SlabList<T> {
    /// An empty slab; the first [`SlabList::alloc`] call grows it by one node.
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Insert `value`, returning the id it was assigned. Reuses the lowest-numbered empty slot
    /// before growing; growth appends exactly one node (mirrors `add_link_mem` appending one
    /// page-backed node at a time rather than over-allocating).
    pub fn alloc(&mut self, value: T) -> Result<usize, EnclaveError> {
        for (node_idx, node) in self.nodes.iter_mut().enumerate() {
            if let Some(offset) = node.slots.iter().position(Option::is_none) {
                node.slots[offset] = Some(value);
                return Ok(node_idx * SLAB_NODE_CAPACITY + offset);
            }
        }
        let mut node = SlabNode::new();
        node.slots[0] = Some(value);
        self.nodes.push(node);
        Ok((self.nodes.len() - 1) * SLAB_NODE_CAPACITY)
    }

    /// Look up `id`, if it resolves to an occupied slot.
    pub fn get(&self, id: usize) -> Option<&T> {
        let (node_idx, offset) = (id / SLAB_NODE_CAPACITY, id % SLAB_NODE_CAPACITY);
        self.nodes.get(node_idx)?.slots.get(offset)?.as_ref()
    }

    /// Mutably look up `id`, if it resolves to an occupied slot.
    pub fn get_mut(&mut self, id: usize) -> Option<&mut T> {
        let (node_idx, offset) = (id / SLAB_NODE_CAPACITY, id % SLAB_NODE_CAPACITY);
        self.nodes.get_mut(node_idx)?.slots.get_mut(offset)?.as_mut()
    }

    /// Empty `id`'s slot, returning the value that was there, if any. The slot becomes eligible
    /// for reuse by a later [`SlabList::alloc`], but `id` itself is never handed out again while
    /// that particular slot stays occupied by something else (an `eid` always denotes the
    /// specific occupant it was issued for).
    pub fn free(&mut self, id: usize) -> Option<T> {
        let (node_idx, offset) = (id / SLAB_NODE_CAPACITY, id % SLAB_NODE_CAPACITY);
        self.nodes.get_mut(node_idx)?.slots.get_mut(offset)?.take()
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.nodes.iter().map(|n| n.slots.iter().filter(|s| s.is_some()).count()).sum()
    }

    /// `true` if no slot is occupied.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for SlabList<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_assigns_distinct_increasing_ids_within_a_node() {
        let mut slab = SlabList::new();
        let a = slab.alloc(1).unwrap();
        let b = slab.alloc(2).unwrap();
        assert_ne!(a, b);
        assert_eq!(slab.get(a), Some(&1));
        assert_eq!(slab.get(b), Some(&2));
    }

    #[test]
    fn free_then_alloc_reuses_the_slot() {
        let mut slab = SlabList::new();
        let a = slab.alloc(10).unwrap();
        assert_eq!(slab.free(a), Some(10));
        assert_eq!(slab.get(a), None);
        let b = slab.alloc(20).unwrap();
        assert_eq!(b, a);
        assert_eq!(slab.get(b), Some(&20));
    }

    #[test]
    fn growth_spans_a_second_node() {
        let mut slab = SlabList::new();
        let mut ids = Vec::new();
        for i in 0..(SLAB_NODE_CAPACITY + 1) {
            ids.push(slab.alloc(i).unwrap());
        }
        assert_eq!(slab.len(), SLAB_NODE_CAPACITY + 1);
        let last = *ids.last().unwrap();
        assert_eq!(last, SLAB_NODE_CAPACITY);
        assert_eq!(slab.get(last), Some(&SLAB_NODE_CAPACITY));
    }

    #[test]
    fn unknown_id_is_none() {
        let slab: SlabList<u32> = SlabList::new();
        assert_eq!(slab.get(0), None);
        assert_eq!(slab.get(999), None);
    }
}

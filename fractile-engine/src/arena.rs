/// Stable handle to a node slot. Carries the slot's generation so handles to
/// freed-and-reused slots are detectably stale instead of silently aliasing
/// the new occupant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(u32, u32);

impl NodeId {
    fn new(index: u32, generation: u32) -> Self {
        Self(index, generation)
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }

    fn generation(self) -> u32 {
        self.1
    }
}

/// Generational slot arena. Nodes live in a flat vector, freed slots are
/// recycled through a free list, and each reuse bumps the slot's generation.
pub struct Arena<T> {
    slots: Vec<Option<T>>,
    generations: Vec<u32>, // last generation per slot, persists across frees
    free: Vec<usize>,
    len: usize,
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            generations: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn insert(&mut self, value: T) -> NodeId {
        let (index, generation) = match self.free.pop() {
            Some(index) => {
                let generation = self.generations[index].saturating_add(1);
                self.generations[index] = generation;
                self.slots[index] = Some(value);
                (index, generation)
            }
            None => {
                self.slots.push(Some(value));
                self.generations.push(1);
                (self.slots.len() - 1, 1)
            }
        };
        self.len += 1;
        NodeId::new(index as u32, generation)
    }

    /// Free the slot behind `id`. Stale ids are a no-op returning `None`.
    pub fn remove(&mut self, id: NodeId) -> Option<T> {
        if !self.contains(id) {
            return None;
        }
        let value = self.slots[id.index()].take();
        self.free.push(id.index());
        self.len -= 1;
        value
    }

    /// True if `id` refers to a live node: the slot is occupied and the
    /// generation still matches.
    pub fn contains(&self, id: NodeId) -> bool {
        match self.slots.get(id.index()) {
            Some(Some(_)) => self.generations[id.index()] == id.generation(),
            _ => false,
        }
    }

    pub fn get(&self, id: NodeId) -> Option<&T> {
        if self.generations.get(id.index()) != Some(&id.generation()) {
            return None;
        }
        self.slots[id.index()].as_ref()
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut T> {
        if self.generations.get(id.index()) != Some(&id.generation()) {
            return None;
        }
        self.slots[id.index()].as_mut()
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ===== Basic slot management =====

    #[test]
    fn insert_then_get_returns_value() {
        let mut arena = Arena::new();
        let id = arena.insert(42);
        assert_eq!(arena.get(id), Some(&42));
        assert!(arena.contains(id));
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn removed_id_becomes_stale() {
        let mut arena = Arena::new();
        let id = arena.insert("tile");
        assert_eq!(arena.remove(id), Some("tile"));
        assert!(!arena.contains(id));
        assert_eq!(arena.get(id), None);
        assert_eq!(arena.remove(id), None);
        assert_eq!(arena.len(), 0);
    }

    // ===== Generational safety =====

    #[test]
    fn reused_slot_invalidates_old_id() {
        let mut arena = Arena::new();
        let a = arena.insert(1);
        arena.remove(a);
        let b = arena.insert(2);

        // Slot is recycled, so the index collides but generations differ.
        assert_eq!(a.index(), b.index());
        assert_ne!(a, b);
        assert_eq!(arena.get(a), None);
        assert_eq!(arena.get(b), Some(&2));
    }

    #[test]
    fn get_mut_respects_generation() {
        let mut arena = Arena::new();
        let a = arena.insert(10);
        arena.remove(a);
        let b = arena.insert(20);

        assert!(arena.get_mut(a).is_none());
        if let Some(v) = arena.get_mut(b) {
            *v += 1;
        }
        assert_eq!(arena.get(b), Some(&21));
    }

    #[test]
    fn len_tracks_live_nodes_across_reuse() {
        let mut arena = Arena::new();
        let ids: Vec<_> = (0..4).map(|i| arena.insert(i)).collect();
        assert_eq!(arena.len(), 4);

        arena.remove(ids[1]);
        arena.remove(ids[3]);
        assert_eq!(arena.len(), 2);

        arena.insert(99);
        assert_eq!(arena.len(), 3);
    }
}

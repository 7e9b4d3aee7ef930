use core::fmt;

use cranelift_entity::{EntityRef, PrimaryMap};

/// A typed arena of IR entities, addressed by stable handles of type `K`.
///
/// The arena has the following properties:
///
/// * Append-only allocation: every call to [Arena::alloc] produces a fresh handle, handles are
///   never reused for a different entity.
/// * Releasing an entity takes it out of the arena, and leaves a tombstone in its slot. Any
///   subsequent access through the released handle panics, rather than silently observing some
///   other entity.
/// * Storage is reclaimed in bulk when the arena itself is dropped, i.e. when the owning function
///   goes away. Tombstones are cheap (one `Option` discriminant), and passes are short-lived
///   relative to the lifetime of the function they operate on.
pub struct Arena<K: EntityRef, T> {
    slots: PrimaryMap<K, Option<T>>,
    live: usize,
}

impl<K: EntityRef, T> Default for Arena<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: EntityRef, T> Arena<K, T> {
    /// Create an empty arena with no allocated capacity
    pub fn new() -> Self {
        Self {
            slots: PrimaryMap::new(),
            live: 0,
        }
    }

    /// Allocate `item` in the arena, returning its handle
    pub fn alloc(&mut self, item: T) -> K {
        self.live += 1;
        self.slots.push(Some(item))
    }

    /// Take the entity identified by `key` out of the arena.
    ///
    /// # Panics
    ///
    /// Panics if `key` was never allocated by this arena, or has already been released.
    #[track_caller]
    pub fn release(&mut self, key: K) -> T {
        let item = self
            .slots
            .get_mut(key)
            .and_then(Option::take)
            .unwrap_or_else(|| panic!("cannot release {}: not a live entity", key.index()));
        self.live -= 1;
        item
    }

    /// Returns true if `key` refers to a live entity in this arena
    #[inline]
    pub fn contains(&self, key: K) -> bool {
        self.slots.get(key).is_some_and(Option::is_some)
    }

    /// Get a reference to the entity identified by `key`, if it is still live
    #[inline]
    pub fn try_get(&self, key: K) -> Option<&T> {
        self.slots.get(key).and_then(Option::as_ref)
    }

    /// Get a mutable reference to the entity identified by `key`, if it is still live
    #[inline]
    pub fn try_get_mut(&mut self, key: K) -> Option<&mut T> {
        self.slots.get_mut(key).and_then(Option::as_mut)
    }

    /// Get a reference to the entity identified by `key`.
    ///
    /// # Panics
    ///
    /// Panics if `key` does not refer to a live entity.
    #[track_caller]
    pub fn get(&self, key: K) -> &T {
        match self.try_get(key) {
            Some(item) => item,
            None => panic!("invalid entity reference {}: entity was released", key.index()),
        }
    }

    /// Get a mutable reference to the entity identified by `key`.
    ///
    /// # Panics
    ///
    /// Panics if `key` does not refer to a live entity.
    #[track_caller]
    pub fn get_mut(&mut self, key: K) -> &mut T {
        match self.try_get_mut(key) {
            Some(item) => item,
            None => panic!("invalid entity reference {}: entity was released", key.index()),
        }
    }

    /// The number of live entities in this arena
    #[inline]
    pub fn len(&self) -> usize {
        self.live
    }

    /// Returns true if there are no live entities in this arena
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// The number of handles ever allocated by this arena, live or not
    #[inline]
    pub fn capacity_used(&self) -> usize {
        self.slots.len()
    }

    /// Iterate over all live entities in allocation order
    pub fn iter(&self) -> impl Iterator<Item = (K, &T)> + '_ {
        self.slots.iter().filter_map(|(k, slot)| slot.as_ref().map(|item| (k, item)))
    }
}

impl<K: EntityRef, T> core::ops::Index<K> for Arena<K, T> {
    type Output = T;

    #[inline]
    #[track_caller]
    fn index(&self, key: K) -> &Self::Output {
        self.get(key)
    }
}

impl<K: EntityRef, T> core::ops::IndexMut<K> for Arena<K, T> {
    #[inline]
    #[track_caller]
    fn index_mut(&mut self, key: K) -> &mut Self::Output {
        self.get_mut(key)
    }
}

impl<K: EntityRef + fmt::Debug, T: fmt::Debug> fmt::Debug for Arena<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use cranelift_entity::entity_impl;

    use super::*;

    #[derive(Copy, Clone, PartialEq, Eq)]
    struct Key(u32);
    entity_impl!(Key, "key");

    #[test]
    fn arena_alloc_release() {
        let mut arena = Arena::<Key, &'static str>::new();
        assert!(arena.is_empty());

        let a = arena.alloc("a");
        let b = arena.alloc("b");
        let c = arena.alloc("c");
        assert_eq!(arena.len(), 3);
        assert_eq!(arena[b], "b");

        assert_eq!(arena.release(b), "b");
        assert_eq!(arena.len(), 2);
        assert!(!arena.contains(b));
        assert_eq!(arena.try_get(b), None);

        // Handles are never recycled
        let d = arena.alloc("d");
        assert_ne!(d, b);
        assert_eq!(arena.capacity_used(), 4);

        let live = arena.iter().map(|(k, v)| (k, *v)).collect::<Vec<_>>();
        assert_eq!(live, [(a, "a"), (c, "c"), (d, "d")]);
    }

    #[test]
    #[should_panic(expected = "entity was released")]
    fn arena_access_after_release() {
        let mut arena = Arena::<Key, u32>::new();
        let a = arena.alloc(1);
        arena.release(a);
        let _ = arena[a];
    }

    #[test]
    #[should_panic(expected = "not a live entity")]
    fn arena_double_release() {
        let mut arena = Arena::<Key, u32>::new();
        let a = arena.alloc(1);
        arena.release(a);
        arena.release(a);
    }
}

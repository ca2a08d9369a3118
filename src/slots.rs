/// Fixed-position storage where a vacated slot is handed out again before
/// the arena grows. Slot indices double as player numbers.
#[derive(Debug)]
pub struct SlotArena<T> {
    slots: Vec<Option<T>>,
}

impl<T> Default for SlotArena<T> {
    fn default() -> Self {
        Self { slots: Vec::new() }
    }
}

impl<T> SlotArena<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index the next insertion should use.
    pub fn vacant_slot(&self) -> usize {
        self.slots
            .iter()
            .position(Option::is_none)
            .unwrap_or(self.slots.len())
    }

    /// Places `value` at `index`, which must come from [`Self::vacant_slot`].
    pub fn insert_at(&mut self, index: usize, value: T) -> Option<T> {
        if index >= self.slots.len() {
            self.slots.resize_with(index + 1, || None);
        }
        self.slots[index].replace(value)
    }

    pub fn remove(&mut self, index: usize) -> Option<T> {
        self.slots.get_mut(index).and_then(Option::take)
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.slots.get_mut(index).and_then(Option::as_mut)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|value| (index, value)))
    }

    pub fn position(&self, mut predicate: impl FnMut(&T) -> bool) -> Option<usize> {
        self.iter().find(|(_, value)| predicate(value)).map(|(index, _)| index)
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push<T>(arena: &mut SlotArena<T>, value: T) -> usize {
        let index = arena.vacant_slot();
        assert!(arena.insert_at(index, value).is_none());
        index
    }

    #[test]
    fn vacated_slots_are_reused_first() {
        let mut arena = SlotArena::new();
        assert_eq!(push(&mut arena, "a"), 0);
        assert_eq!(push(&mut arena, "b"), 1);
        assert_eq!(push(&mut arena, "c"), 2);

        assert_eq!(arena.remove(1), Some("b"));
        assert_eq!(arena.vacant_slot(), 1);
        assert_eq!(push(&mut arena, "d"), 1);
        assert_eq!(push(&mut arena, "e"), 3);
        assert_eq!(arena.len(), 4);
    }

    #[test]
    fn removing_twice_is_harmless() {
        let mut arena = SlotArena::new();
        let index = push(&mut arena, 5);
        assert_eq!(arena.remove(index), Some(5));
        assert_eq!(arena.remove(index), None);
        assert_eq!(arena.remove(42), None);
        assert!(arena.is_empty());
        assert_eq!(arena.position(|v| *v == 5), None);
    }
}

use crate::ffi::FfEffect;
use crate::pairing::Handedness;
use std::collections::HashMap;

/// An uploaded effect and the ids each side's unit assigned to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectEntry {
    pub params: FfEffect,
    pub left: Option<i16>,
    pub right: Option<i16>,
}

impl EffectEntry {
    pub fn new(params: FfEffect) -> Self {
        Self {
            params,
            left: None,
            right: None,
        }
    }

    pub fn id(&self, side: Handedness) -> Option<i16> {
        match side {
            Handedness::Left => self.left,
            Handedness::Right => self.right,
        }
    }

    pub fn set_id(&mut self, side: Handedness, id: Option<i16>) {
        match side {
            Handedness::Left => self.left = id,
            Handedness::Right => self.right = id,
        }
    }
}

/// Virtual effect id -> per-side physical ids.
#[derive(Debug, Default)]
pub struct EffectMap {
    entries: HashMap<i16, EffectEntry>,
}

impl EffectMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: i16) -> Option<&EffectEntry> {
        self.entries.get(&id)
    }

    pub fn get_mut(&mut self, id: i16) -> Option<&mut EffectEntry> {
        self.entries.get_mut(&id)
    }

    pub fn insert(&mut self, id: i16, entry: EffectEntry) -> Option<EffectEntry> {
        self.entries.insert(id, entry)
    }

    pub fn remove(&mut self, id: i16) -> Option<EffectEntry> {
        self.entries.remove(&id)
    }

    /// Forgets `side`'s ids, which die with its unit.
    pub fn clear_side(&mut self, side: Handedness) {
        for entry in self.entries.values_mut() {
            entry.set_id(side, None);
        }
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (i16, &mut EffectEntry)> {
        self.entries.iter_mut().map(|(&id, entry)| (id, entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

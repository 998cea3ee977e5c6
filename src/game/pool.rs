//! Fixed-capacity actor arena over a generational slot map

use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Handle to a pooled actor; goes stale once the actor is removed
    pub struct ActorId;
}

/// Slot map capped at a fixed number of live actors
#[derive(Debug)]
pub struct ActorPool<T> {
    actors: SlotMap<ActorId, T>,
    capacity: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("actor pool exhausted (capacity {capacity})")]
    Exhausted { capacity: usize },
}

impl<T> ActorPool<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            actors: SlotMap::with_capacity_and_key(capacity),
            capacity,
        }
    }

    /// Take a free slot; fails instead of growing when every slot is live
    pub fn insert(&mut self, value: T) -> Result<ActorId, PoolError> {
        if self.actors.len() >= self.capacity {
            return Err(PoolError::Exhausted {
                capacity: self.capacity,
            });
        }
        Ok(self.actors.insert(value))
    }

    /// Remove a live actor. Stale ids return `None`, so removal happens once.
    pub fn remove(&mut self, id: ActorId) -> Option<T> {
        self.actors.remove(id)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.actors.len()
    }

    #[cfg(test)]
    pub fn get(&self, id: ActorId) -> Option<&T> {
        self.actors.get(id)
    }

    pub fn get_mut(&mut self, id: ActorId) -> Option<&mut T> {
        self.actors.get_mut(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ActorId, &T)> {
        self.actors.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (ActorId, &mut T)> {
        self.actors.iter_mut()
    }

    /// Snapshot of live ids, for loops that remove while iterating
    pub fn ids(&self) -> Vec<ActorId> {
        self.actors.keys().collect()
    }
}

// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Component identifiers, registry metadata, and component sets.

use std::fmt;
use std::marker::PhantomData;

use rustc_hash::FxHashMap;

/// Dense component identifier, assigned in registration order.
///
/// Ids are world-scoped: the same type registered in two worlds may receive
/// different ids. Id 0 is reserved for the null component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(pub(crate) u32);

impl ComponentId {
    /// The reserved null component (id 0, stride 0).
    pub const NULL: ComponentId = ComponentId(0);

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }

    /// Raw id value.
    pub fn id(self) -> u32 {
        self.0
    }
}

/// Typed registration handle.
///
/// Carries the component id together with the type it was registered as, so
/// the typed accessors can verify strides instead of trusting the caller.
/// The handle is only meaningful in the world that issued it.
pub struct ComponentHandle<T> {
    id: ComponentId,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ComponentHandle<T> {
    pub(crate) fn new(id: ComponentId) -> Self {
        Self {
            id,
            _marker: PhantomData,
        }
    }

    pub fn id(self) -> ComponentId {
        self.id
    }
}

impl<T> Clone for ComponentHandle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ComponentHandle<T> {}

impl<T> fmt::Debug for ComponentHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentHandle({})", self.id.0)
    }
}

impl<T> From<ComponentHandle<T>> for ComponentId {
    fn from(handle: ComponentHandle<T>) -> Self {
        handle.id
    }
}

/// Registry record for one component: display name, byte stride, and the
/// archetypes currently containing it.
#[derive(Debug)]
pub struct ComponentInfo {
    pub(crate) name: String,
    pub(crate) stride: usize,
    /// Ids of every archetype whose set contains this component.
    pub(crate) archetypes: Vec<usize>,
}

impl ComponentInfo {
    pub(crate) fn new(name: &str, stride: usize) -> Self {
        Self {
            name: name.to_string(),
            stride,
            archetypes: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Archetype ids containing this component, in creation order.
    pub fn archetypes(&self) -> &[usize] {
        &self.archetypes
    }
}

/// Set of component ids with stable ordinal positions.
///
/// The ordinal returned by [`get_index`](ComponentSet::get_index) for an id
/// never changes once the id is inserted, no matter how many insertions
/// follow. Archetype columns are laid out in ordinal order, so this
/// stability is what keeps column indices valid for the archetype's lifetime.
#[derive(Debug, Clone, Default)]
pub struct ComponentSet {
    ids: Vec<ComponentId>,
    ordinals: FxHashMap<ComponentId, usize>,
}

impl ComponentSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from a slice, silently deduplicating.
    pub fn from_ids(ids: &[ComponentId]) -> Self {
        let mut set = Self::new();
        for &id in ids {
            set.insert(id);
        }
        set
    }

    /// Insert `id` at the next ordinal. Returns false if already present.
    pub fn insert(&mut self, id: ComponentId) -> bool {
        if self.ordinals.contains_key(&id) {
            return false;
        }
        self.ordinals.insert(id, self.ids.len());
        self.ids.push(id);
        true
    }

    pub fn contains(&self, id: ComponentId) -> bool {
        self.ordinals.contains_key(&id)
    }

    /// Ordinal position of `id` within the set, if present.
    pub fn get_index(&self, id: ComponentId) -> Option<usize> {
        self.ordinals.get(&id).copied()
    }

    /// Id stored at `ordinal`.
    pub fn id_at(&self, ordinal: usize) -> ComponentId {
        self.ids[ordinal]
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Ids in ordinal order.
    pub fn iter(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.ids.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_lookup() {
        let mut set = ComponentSet::new();
        assert!(set.insert(ComponentId(3)));
        assert!(set.insert(ComponentId(1)));
        assert!(!set.insert(ComponentId(3)));

        assert_eq!(set.len(), 2);
        assert!(set.contains(ComponentId(1)));
        assert!(!set.contains(ComponentId(2)));
        assert_eq!(set.get_index(ComponentId(3)), Some(0));
        assert_eq!(set.get_index(ComponentId(1)), Some(1));
        assert_eq!(set.get_index(ComponentId(2)), None);
    }

    #[test]
    fn test_ordinals_stable_across_insertions() {
        let mut set = ComponentSet::new();
        set.insert(ComponentId(7));
        let before = set.get_index(ComponentId(7));
        for id in 0..100 {
            set.insert(ComponentId(id));
        }
        assert_eq!(set.get_index(ComponentId(7)), before);
    }

    #[test]
    fn test_from_ids_dedups() {
        let set = ComponentSet::from_ids(&[ComponentId(2), ComponentId(2), ComponentId(5)]);
        assert_eq!(set.len(), 2);
        assert_eq!(set.id_at(0), ComponentId(2));
        assert_eq!(set.id_at(1), ComponentId(5));
    }

    #[test]
    fn test_iteration_follows_ordinal_order() {
        let set = ComponentSet::from_ids(&[ComponentId(9), ComponentId(4), ComponentId(6)]);
        let ids: Vec<_> = set.iter().collect();
        assert_eq!(ids, vec![ComponentId(9), ComponentId(4), ComponentId(6)]);
    }
}

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

//! Archetype storage: one component set, one packed column per component,
//! and the dense entity list that keeps rows aligned across columns.

use rustc_hash::FxHashMap;

use crate::column::{Column, DEFAULT_CAPACITY};
use crate::component::{ComponentId, ComponentSet};
use crate::entity::Entity;

/// Cached transitions out of an archetype, keyed by the single component
/// whose addition or removal triggers the move.
///
/// Edges hold archetype ids, not references: ids survive growth of the
/// world's archetype array. The tables are populated lazily, on the first
/// transition along an edge; a missing entry means the move has not happened
/// yet, not that no target exists. Whenever `a.add[c] == b` holds,
/// `b.remove[c] == a` holds as well.
#[derive(Debug, Default)]
pub struct ArchetypeEdges {
    add: FxHashMap<ComponentId, usize>,
    remove: FxHashMap<ComponentId, usize>,
}

impl ArchetypeEdges {
    /// Archetype reached by adding `component`, if already traversed.
    pub fn add_target(&self, component: ComponentId) -> Option<usize> {
        self.add.get(&component).copied()
    }

    /// Archetype reached by removing `component`, if already traversed.
    pub fn remove_target(&self, component: ComponentId) -> Option<usize> {
        self.remove.get(&component).copied()
    }

    pub(crate) fn set_add_target(&mut self, component: ComponentId, archetype_id: usize) {
        self.add.insert(component, archetype_id);
    }

    pub(crate) fn set_remove_target(&mut self, component: ComponentId, archetype_id: usize) {
        self.remove.insert(component, archetype_id);
    }
}

/// Columnar storage shared by every entity carrying exactly one component set.
///
/// Columns are indexed by the set's ordinals; `entities[row]` names the
/// entity whose data lives at `row` in every column. All removal is
/// swap-remove, so rows are packed at all times.
pub struct Archetype {
    id: usize,
    set: ComponentSet,
    columns: Vec<Column>,
    entities: Vec<Entity>,
    pub(crate) edges: ArchetypeEdges,
}

impl Archetype {
    /// `strides[i]` must be the registered stride of `set.id_at(i)`.
    pub(crate) fn new(id: usize, set: ComponentSet, strides: &[usize]) -> Self {
        debug_assert_eq!(set.len(), strides.len());
        let columns = strides
            .iter()
            .map(|&stride| Column::with_capacity(DEFAULT_CAPACITY, stride))
            .collect();
        Self {
            id,
            set,
            columns,
            entities: Vec::new(),
            edges: ArchetypeEdges::default(),
        }
    }

    /// World-unique id; equal to this archetype's index in the world.
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn component_set(&self) -> &ComponentSet {
        &self.set
    }

    pub fn contains(&self, component: ComponentId) -> bool {
        self.set.contains(component)
    }

    /// Entity handles in row order.
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Number of entities (and rows in every column).
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Cached add/remove transition edges out of this archetype.
    pub fn edges(&self) -> &ArchetypeEdges {
        &self.edges
    }

    /// Column at a set ordinal.
    pub fn column(&self, ordinal: usize) -> &Column {
        &self.columns[ordinal]
    }

    pub fn column_for(&self, component: ComponentId) -> Option<&Column> {
        let ordinal = self.set.get_index(component)?;
        self.columns.get(ordinal)
    }

    pub(crate) fn column_for_mut(&mut self, component: ComponentId) -> Option<&mut Column> {
        let ordinal = self.set.get_index(component)?;
        self.columns.get_mut(ordinal)
    }

    /// Append an entity row. The caller is responsible for filling (or
    /// reserving) the columns for that row.
    pub(crate) fn push_entity(&mut self, entity: Entity) -> usize {
        let row = self.entities.len();
        self.entities.push(entity);
        row
    }

    /// Swap-remove `row` from the entity list, returning the entity that was
    /// moved into the vacated slot so the caller can repoint its record.
    pub(crate) fn swap_remove_entity(&mut self, row: usize) -> Option<Entity> {
        self.entities.swap_remove(row);
        if row < self.entities.len() {
            Some(self.entities[row])
        } else {
            None
        }
    }

    /// Move the column data of `row` into `dst`, swap-removing the source
    /// slots. Components absent from `dst`'s set are dropped on the floor,
    /// which is what makes component removal the same move as addition.
    ///
    /// Does not touch either archetype's entity list.
    pub(crate) fn move_row_to(&mut self, row: usize, dst: &mut Archetype) {
        for ordinal in 0..self.set.len() {
            let component = self.set.id_at(ordinal);
            if let Some(dst_ordinal) = dst.set.get_index(component) {
                let src_column = &self.columns[ordinal];
                dst.columns[dst_ordinal].push(src_column.bytes(row));
            }
            self.columns[ordinal].swap_remove(row);
        }
    }
}

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

//! World: owner of all ECS state - entity records, the component registry,
//! the archetype graph, queries, and the phased system lists.

use std::mem;
use std::ptr::NonNull;
#[cfg(debug_assertions)]
use std::time::Instant;

use ahash::AHashMap;
use smallvec::SmallVec;
use tracing::{debug, error};

use crate::archetype::Archetype;
use crate::column::COLUMN_ALIGN;
use crate::component::{ComponentHandle, ComponentId, ComponentInfo, ComponentSet};
use crate::entity::{Entity, EntityRecord};
use crate::error::{EcsError, Result};
use crate::query::{Iter, Query, QueryDesc, QueryId, QueryKey};
use crate::system::{Phase, System, SystemId, SystemStats};

/// Index of the empty archetype every fresh entity starts in.
const EMPTY_ARCHETYPE: usize = 0;

/// Central ECS world.
///
/// Owns every byte of component storage transitively. Single-threaded by
/// contract: no operation suspends, and no internal locking exists. Distinct
/// worlds are fully independent; nothing in the crate is process-global.
pub struct World {
    /// Entity records, indexed by entity handle.
    records: Vec<EntityRecord>,

    /// Component registry, indexed by component id. Entry 0 is the null
    /// component.
    components: Vec<ComponentInfo>,

    /// All archetypes; an archetype's id equals its index here. Entry 0 is
    /// the empty archetype.
    archetypes: Vec<Archetype>,

    /// All registered queries.
    queries: Vec<Query>,

    /// Reuse map from canonical query shape to query id.
    query_index: AHashMap<QueryKey, QueryId>,

    /// Hasher behind query fingerprints, stable for this world's lifetime.
    fingerprint_state: ahash::RandomState,

    /// Systems bucketed by phase, in registration order.
    systems: [Vec<System>; Phase::COUNT],
}

impl World {
    /// Create an empty world with the empty archetype and the null component
    /// pre-registered.
    pub fn new() -> Self {
        let mut world = Self {
            records: Vec::with_capacity(128),
            components: Vec::with_capacity(32),
            archetypes: Vec::with_capacity(32),
            queries: Vec::new(),
            query_index: AHashMap::new(),
            fingerprint_state: ahash::RandomState::new(),
            systems: std::array::from_fn(|_| Vec::new()),
        };

        // The empty archetype is always at index 0 and simplifies the
        // transition logic elsewhere.
        world
            .archetypes
            .push(Archetype::new(EMPTY_ARCHETYPE, ComponentSet::new(), &[]));

        // Component id 0 is the reserved null component.
        let _null = world.register_raw("null", 0);
        debug_assert_eq!(_null, ComponentId::NULL);

        world
    }

    // ========== Component registration ==========

    /// Register a component by display name and byte stride, returning its
    /// dense id. Stride 0 registers a tag component.
    pub fn register_raw(&mut self, name: &str, stride: usize) -> ComponentId {
        let id = ComponentId(self.components.len() as u32);
        self.components.push(ComponentInfo::new(name, stride));
        id
    }

    /// Register a component from a Rust type, returning a typed handle.
    ///
    /// `T: Copy` because storage is byte-copied between archetypes and never
    /// dropped per element. Zero-sized types register tags.
    pub fn register<T: Copy + 'static>(&mut self, name: &str) -> ComponentHandle<T> {
        assert!(
            mem::align_of::<T>() <= COLUMN_ALIGN,
            "component alignment above {COLUMN_ALIGN} is not supported"
        );
        ComponentHandle::new(self.register_raw(name, mem::size_of::<T>()))
    }

    /// Registry record for a component id.
    pub fn component_info(&self, component: ComponentId) -> Option<&ComponentInfo> {
        self.components.get(component.index())
    }

    // ========== Entities ==========

    /// Create an entity. It starts in the empty archetype with no components.
    pub fn spawn(&mut self) -> Entity {
        let entity = Entity::from_index(self.records.len());
        let row = self.archetypes[EMPTY_ARCHETYPE].push_entity(entity);
        self.records.push(EntityRecord {
            archetype_id: EMPTY_ARCHETYPE,
            row,
        });
        entity
    }

    /// Location of an entity, if the handle belongs to this world.
    pub fn record(&self, entity: Entity) -> Option<EntityRecord> {
        self.records.get(entity.index()).copied()
    }

    pub fn has_component(&self, entity: Entity, component: impl Into<ComponentId>) -> bool {
        let component = component.into();
        match self.records.get(entity.index()) {
            Some(record) => self.archetypes[record.archetype_id].contains(component),
            None => false,
        }
    }

    /// Add a component to an entity, reserving a zero-filled slot for it.
    ///
    /// Adding a component the entity already carries is a no-op. The entity
    /// transitions to the archetype for its extended component set, which is
    /// created on first demand.
    pub fn add_component(
        &mut self,
        entity: Entity,
        component: impl Into<ComponentId>,
    ) -> Result<()> {
        let component = component.into();
        let record = *self
            .records
            .get(entity.index())
            .ok_or(EcsError::EntityNotFound)?;
        if component.index() >= self.components.len() {
            return Err(EcsError::InvalidComponentId);
        }

        let src_id = record.archetype_id;
        if self.archetypes[src_id].contains(component) {
            return Ok(());
        }

        let dst_id = match self.archetypes[src_id].edges.add_target(component) {
            Some(id) => id,
            None => {
                let id = self.find_or_create_extended(src_id, component);
                self.archetypes[src_id].edges.set_add_target(component, id);
                self.archetypes[id].edges.set_remove_target(component, src_id);
                id
            }
        };

        self.move_entity(entity, dst_id);

        // The transition filled every carried-over column; the added
        // component's column still needs its row, cleared to zero.
        let dst = &mut self.archetypes[dst_id];
        debug_assert!(dst.contains(component));
        if let Some(column) = dst.column_for_mut(component) {
            column.push_zeroed();
        }
        Ok(())
    }

    /// Remove a component from an entity via the reverse transition.
    ///
    /// The removed component's bytes are discarded during the move; the
    /// entity lands in the archetype for its reduced set.
    pub fn remove_component(
        &mut self,
        entity: Entity,
        component: impl Into<ComponentId>,
    ) -> Result<()> {
        let component = component.into();
        let record = *self
            .records
            .get(entity.index())
            .ok_or(EcsError::EntityNotFound)?;

        let src_id = record.archetype_id;
        if !self.archetypes[src_id].contains(component) {
            return Err(EcsError::ComponentNotFound);
        }

        let dst_id = match self.archetypes[src_id].edges.remove_target(component) {
            Some(id) => id,
            None => {
                let id = self.find_or_create_reduced(src_id, component);
                self.archetypes[src_id].edges.set_remove_target(component, id);
                self.archetypes[id].edges.set_add_target(component, src_id);
                id
            }
        };

        self.move_entity(entity, dst_id);
        Ok(())
    }

    /// Copy `bytes` into the entity's slot for `component`, adding the
    /// component first if absent. `bytes.len()` must equal the registered
    /// stride.
    pub fn set_component_raw(
        &mut self,
        entity: Entity,
        component: impl Into<ComponentId>,
        bytes: &[u8],
    ) -> Result<()> {
        let component = component.into();
        let stride = self
            .components
            .get(component.index())
            .ok_or(EcsError::InvalidComponentId)?
            .stride;
        if bytes.len() != stride {
            return Err(EcsError::StrideMismatch {
                expected: stride,
                actual: bytes.len(),
            });
        }

        if !self.has_component(entity, component) {
            self.add_component(entity, component)?;
        }

        let record = self.records[entity.index()];
        let archetype = &mut self.archetypes[record.archetype_id];
        if let Some(column) = archetype.column_for_mut(component) {
            column.write(record.row, bytes);
        }
        Ok(())
    }

    /// Typed counterpart of [`set_component_raw`](World::set_component_raw).
    pub fn set<T: Copy + 'static>(
        &mut self,
        entity: Entity,
        handle: ComponentHandle<T>,
        value: T,
    ) -> Result<()> {
        if !self.has_component(entity, handle.id()) {
            self.add_component(entity, handle.id())?;
        }
        if mem::size_of::<T>() == 0 {
            return Ok(());
        }

        let record = self.records[entity.index()];
        let column = self.archetypes[record.archetype_id]
            .column_for_mut(handle.id())
            .ok_or(EcsError::ComponentNotFound)?;
        if column.stride() != mem::size_of::<T>() {
            return Err(EcsError::StrideMismatch {
                expected: column.stride(),
                actual: mem::size_of::<T>(),
            });
        }
        // SAFETY: the slot exists, the stride matches, and columns are
        // COLUMN_ALIGN-aligned (register() rejects stricter alignments).
        unsafe {
            column.slot_ptr_mut(record.row).cast::<T>().write(value);
        }
        Ok(())
    }

    /// Read a component. Logs an error and returns None when the entity does
    /// not carry it; use [`try_get`](World::try_get) to probe silently.
    pub fn get<T: Copy + 'static>(&self, entity: Entity, handle: ComponentHandle<T>) -> Option<&T> {
        let found = self.try_get(entity, handle);
        if found.is_none() {
            self.log_missing(entity, handle.id());
        }
        found
    }

    /// Read a component, returning None without logging when absent.
    pub fn try_get<T: Copy + 'static>(
        &self,
        entity: Entity,
        handle: ComponentHandle<T>,
    ) -> Option<&T> {
        let record = self.records.get(entity.index())?;
        let column = self.archetypes[record.archetype_id].column_for(handle.id())?;
        if column.stride() != mem::size_of::<T>() {
            return None;
        }
        if mem::size_of::<T>() == 0 {
            // Tag components store no bytes; hand back a well-defined
            // zero-sized value so has-gated code paths still work.
            return Some(unsafe { &*NonNull::<T>::dangling().as_ptr() });
        }
        // SAFETY: row bounds hold by the record invariant; alignment as in set().
        Some(unsafe { &*column.slot_ptr(record.row).cast::<T>() })
    }

    /// Mutable counterpart of [`get`](World::get).
    pub fn get_mut<T: Copy + 'static>(
        &mut self,
        entity: Entity,
        handle: ComponentHandle<T>,
    ) -> Option<&mut T> {
        // Probe immutably first so the failure path can log without holding
        // the mutable lookup's borrow.
        if self.try_get(entity, handle).is_none() {
            self.log_missing(entity, handle.id());
            return None;
        }
        self.try_get_mut(entity, handle)
    }

    /// Mutable read without logging.
    pub fn try_get_mut<T: Copy + 'static>(
        &mut self,
        entity: Entity,
        handle: ComponentHandle<T>,
    ) -> Option<&mut T> {
        let record = *self.records.get(entity.index())?;
        let column = self.archetypes[record.archetype_id].column_for_mut(handle.id())?;
        if column.stride() != mem::size_of::<T>() {
            return None;
        }
        if mem::size_of::<T>() == 0 {
            return Some(unsafe { &mut *NonNull::<T>::dangling().as_ptr() });
        }
        // SAFETY: see try_get().
        Some(unsafe { &mut *column.slot_ptr_mut(record.row).cast::<T>() })
    }

    /// Raw pointer to the entity's bytes for `component` (dynamic path).
    /// Logs an error and returns None when absent. For tag components the
    /// pointer is dangling but non-null.
    pub fn component_ptr(
        &mut self,
        entity: Entity,
        component: impl Into<ComponentId>,
    ) -> Option<NonNull<u8>> {
        let component = component.into();
        let found = self.try_component_ptr(entity, component);
        if found.is_none() {
            self.log_missing(entity, component);
        }
        found
    }

    /// Raw pointer without logging.
    pub fn try_component_ptr(
        &mut self,
        entity: Entity,
        component: impl Into<ComponentId>,
    ) -> Option<NonNull<u8>> {
        let component = component.into();
        let record = *self.records.get(entity.index())?;
        let column = self.archetypes[record.archetype_id].column_for_mut(component)?;
        NonNull::new(column.slot_ptr_mut(record.row))
    }

    // ========== Queries ==========

    /// Create a query, or return the id of an identical existing one.
    ///
    /// Duplicate ids inside the descriptor are deduplicated silently. A
    /// query with no includes matches every archetype lacking its excludes.
    pub fn query(&mut self, desc: &QueryDesc) -> QueryId {
        let key = QueryKey::from_desc(desc);
        if let Some(&id) = self.query_index.get(&key) {
            return id;
        }

        let fingerprint = self.fingerprint_state.hash_one(&key);
        let mut query = Query::new(&key, fingerprint);
        for archetype in &self.archetypes {
            if query.matches(archetype) {
                query.matched.push(archetype.id());
            }
        }

        let id = QueryId(self.queries.len() as u32);
        self.queries.push(query);
        self.query_index.insert(key, id);
        id
    }

    /// Registered query by id.
    pub fn get_query(&self, id: QueryId) -> Option<&Query> {
        self.queries.get(id.index())
    }

    /// Invoke `callback` once per matching archetype with a columnar view.
    ///
    /// Archetypes are visited in the query's match order (archetype creation
    /// order); rows within an archetype in ascending row order. Structural
    /// mutation from inside the callback is undefined and unsupported.
    pub fn query_iterate<F>(&mut self, id: QueryId, mut callback: F)
    where
        F: FnMut(&mut Iter<'_>),
    {
        let (matched, includes) = {
            let query = &self.queries[id.index()];
            (query.matched.clone(), query.includes.clone())
        };
        for archetype_id in matched {
            let mut view = Iter::for_archetype(&mut self.archetypes[archetype_id], &includes);
            callback(&mut view);
        }
    }

    // ========== Systems ==========

    /// Register a system: a query bound to `callback`, run during `phase`
    /// each tick. Reuses an identical existing query.
    pub fn add_system(
        &mut self,
        phase: Phase,
        desc: &QueryDesc,
        callback: impl FnMut(&mut Iter<'_>) + 'static,
        name: &str,
    ) -> SystemId {
        let query = self.query(desc);
        let bucket = &mut self.systems[phase.index()];
        let id = SystemId {
            phase,
            index: bucket.len() as u32,
        };
        bucket.push(System {
            query,
            callback: Box::new(callback),
            name: name.to_string(),
            #[cfg(debug_assertions)]
            stats: SystemStats::default(),
        });
        id
    }

    /// Run one tick: every phase in ascending order, every system within a
    /// phase in registration order.
    pub fn progress(&mut self) {
        for phase in Phase::ALL {
            let count = self.systems[phase.index()].len();
            for index in 0..count {
                self.run_system(phase, index);
            }
        }
    }

    /// Cumulative timing for a system. Debug builds only; release builds
    /// return None because the bookkeeping is compiled out.
    pub fn system_stats(&self, id: SystemId) -> Option<SystemStats> {
        #[cfg(debug_assertions)]
        {
            self.systems
                .get(id.phase.index())
                .and_then(|bucket| bucket.get(id.index as usize))
                .map(|system| system.stats)
        }
        #[cfg(not(debug_assertions))]
        {
            let _ = id;
            None
        }
    }

    // ========== Counters ==========

    pub fn entity_count(&self) -> usize {
        self.records.len()
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    pub fn archetype_count(&self) -> usize {
        self.archetypes.len()
    }

    pub fn query_count(&self) -> usize {
        self.queries.len()
    }

    /// Archetype by id.
    pub fn get_archetype(&self, id: usize) -> Option<&Archetype> {
        self.archetypes.get(id)
    }

    /// All archetypes, id order.
    pub fn archetypes(&self) -> &[Archetype] {
        &self.archetypes
    }

    // ========== Internals ==========

    fn run_system(&mut self, phase: Phase, index: usize) {
        #[cfg(feature = "profiling")]
        let span = {
            let system = &self.systems[phase.index()][index];
            tracing::info_span!("system", phase = ?phase, name = %system.name)
        };
        #[cfg(feature = "profiling")]
        let _guard = span.enter();

        #[cfg(debug_assertions)]
        let start = Instant::now();

        let query_id = self.systems[phase.index()][index].query;
        let (matched, includes) = {
            let query = &self.queries[query_id.index()];
            (query.matched.clone(), query.includes.clone())
        };

        // Callbacks and archetypes live in disjoint fields, so the callback
        // can be held across the archetype iteration.
        let (archetypes, systems) = (&mut self.archetypes, &mut self.systems);
        let system = &mut systems[phase.index()][index];
        for archetype_id in matched {
            let mut view = Iter::for_archetype(&mut archetypes[archetype_id], &includes);
            (system.callback)(&mut view);
        }

        #[cfg(debug_assertions)]
        {
            let system = &mut self.systems[phase.index()][index];
            system.stats.runtime += start.elapsed();
            system.stats.calls += 1;
        }
    }

    /// Move an entity's row from its current archetype to `dst_id`, keeping
    /// both archetypes packed and every record pointing at the right row.
    fn move_entity(&mut self, entity: Entity, dst_id: usize) {
        let record = self.records[entity.index()];
        let src_id = record.archetype_id;
        if src_id == dst_id {
            return;
        }
        let row = record.row;

        let (src, dst) = if src_id < dst_id {
            let (left, right) = self.archetypes.split_at_mut(dst_id);
            (&mut left[src_id], &mut right[0])
        } else {
            let (left, right) = self.archetypes.split_at_mut(src_id);
            (&mut right[0], &mut left[dst_id])
        };

        let new_row = dst.push_entity(entity);
        src.move_row_to(row, dst);

        // The swap-remove drags whichever entity was last in `src` into the
        // vacated row; that entity's record must be repointed or it will
        // resolve to someone else's data.
        let displaced = src.swap_remove_entity(row);

        self.records[entity.index()] = EntityRecord {
            archetype_id: dst_id,
            row: new_row,
        };
        if let Some(moved) = displaced {
            self.records[moved.index()].row = row;
        }
    }

    /// Find the archetype for `base`'s set plus `component`, creating it if
    /// no archetype with that exact set exists yet.
    fn find_or_create_extended(&mut self, base_id: usize, component: ComponentId) -> usize {
        let base_len = self.archetypes[base_id].component_set().len();

        // Candidates come from the component's own archetype list, so every
        // candidate already contains `component`.
        for &candidate_id in &self.components[component.index()].archetypes {
            let candidate_set = self.archetypes[candidate_id].component_set();
            if candidate_set.len() != base_len + 1 {
                continue;
            }
            debug_assert!(candidate_set.contains(component));
            if self.archetypes[base_id]
                .component_set()
                .iter()
                .all(|c| candidate_set.contains(c))
            {
                return candidate_id;
            }
        }

        let mut set = self.archetypes[base_id].component_set().clone();
        set.insert(component);
        self.create_archetype(set)
    }

    /// Find the archetype for `base`'s set minus `component`, creating it on
    /// demand. The empty archetype is never created twice.
    fn find_or_create_reduced(&mut self, base_id: usize, component: ComponentId) -> usize {
        let mut target = ComponentSet::new();
        for c in self.archetypes[base_id].component_set().iter() {
            if c != component {
                target.insert(c);
            }
        }
        if target.is_empty() {
            return EMPTY_ARCHETYPE;
        }

        let probe = target.id_at(0);
        for &candidate_id in &self.components[probe.index()].archetypes {
            let candidate_set = self.archetypes[candidate_id].component_set();
            if candidate_set.len() == target.len()
                && target.iter().all(|c| candidate_set.contains(c))
            {
                return candidate_id;
            }
        }

        self.create_archetype(target)
    }

    /// Insert a new archetype for `set`: build its columns in ordinal order,
    /// register it with every member component, and offer it to every
    /// existing query.
    fn create_archetype(&mut self, set: ComponentSet) -> usize {
        let id = self.archetypes.len();
        let strides: SmallVec<[usize; 8]> = set
            .iter()
            .map(|c| self.components[c.index()].stride)
            .collect();
        let archetype = Archetype::new(id, set, &strides);
        for component in archetype.component_set().iter() {
            self.components[component.index()].archetypes.push(id);
        }
        debug!(
            archetype_id = id,
            components = archetype.component_set().len(),
            "archetype created"
        );
        self.archetypes.push(archetype);

        for query in &mut self.queries {
            if query.matches(&self.archetypes[id]) {
                query.matched.push(id);
            }
        }
        id
    }

    fn log_missing(&self, entity: Entity, component: ComponentId) {
        let name = self
            .components
            .get(component.index())
            .map(|info| info.name.as_str())
            .unwrap_or("<unregistered>");
        error!(entity = entity.id(), component = name, "entity does not have component");
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for World {
    fn drop(&mut self) {
        // Shutdown diagnostics; storage itself is freed by the field drops.
        #[cfg(debug_assertions)]
        for (phase, bucket) in Phase::ALL.iter().zip(&self.systems) {
            for system in bucket {
                debug!(
                    phase = ?phase,
                    system = %system.name,
                    calls = system.stats.calls,
                    avg_ms = system.stats.average().as_secs_f64() * 1000.0,
                    "system timing"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_world_bootstraps_defaults() {
        let world = World::new();
        // Archetype 0 is the empty archetype; component 0 is the null component.
        assert_eq!(world.archetype_count(), 1);
        assert!(world.get_archetype(0).unwrap().component_set().is_empty());
        assert_eq!(world.component_count(), 1);
        assert_eq!(world.component_info(ComponentId::NULL).unwrap().stride(), 0);
    }

    #[test]
    fn test_spawn_lands_in_empty_archetype() {
        let mut world = World::new();
        let a = world.spawn();
        let b = world.spawn();

        assert_ne!(a, b);
        assert_eq!(world.record(a), Some(EntityRecord { archetype_id: 0, row: 0 }));
        assert_eq!(world.record(b), Some(EntityRecord { archetype_id: 0, row: 1 }));
        assert_eq!(world.get_archetype(0).unwrap().entities(), &[a, b]);
    }

    #[test]
    fn test_register_assigns_dense_ids() {
        let mut world = World::new();
        let first = world.register_raw("first", 4);
        let second = world.register_raw("second", 8);
        assert_eq!(first.id(), 1);
        assert_eq!(second.id(), 2);
        assert_eq!(world.component_info(second).unwrap().name(), "second");
    }
}

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

//! Queries: inclusion/exclusion filters over component sets, cached
//! archetype match lists, and the columnar view handed to callbacks.

use std::marker::PhantomData;
use std::mem;
use std::ptr::NonNull;
use std::slice;

use smallvec::SmallVec;

use crate::archetype::Archetype;
use crate::component::ComponentId;
use crate::entity::Entity;

/// Handle to a query registered with a [`World`](crate::world::World).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueryId(pub(crate) u32);

impl QueryId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Inclusion/exclusion pattern for creating a query.
///
/// The include order is significant: it is the ordinal order under which
/// callbacks address component arrays for the query's whole lifetime.
#[derive(Debug, Clone, Default)]
pub struct QueryDesc {
    pub(crate) includes: SmallVec<[ComponentId; 8]>,
    pub(crate) excludes: SmallVec<[ComponentId; 8]>,
}

impl QueryDesc {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `component` on matched archetypes.
    pub fn with(mut self, component: impl Into<ComponentId>) -> Self {
        self.includes.push(component.into());
        self
    }

    /// Reject archetypes carrying `component`.
    pub fn without(mut self, component: impl Into<ComponentId>) -> Self {
        self.excludes.push(component.into());
        self
    }
}

/// Canonical form of a [`QueryDesc`] used for fingerprinting and reuse.
///
/// Includes keep their user order (it defines callback ordinals); excludes
/// are order-insensitive and sort canonically. Duplicates are dropped
/// silently on both sides.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct QueryKey {
    pub(crate) includes: SmallVec<[ComponentId; 8]>,
    pub(crate) excludes: SmallVec<[ComponentId; 8]>,
}

impl QueryKey {
    pub(crate) fn from_desc(desc: &QueryDesc) -> Self {
        let mut includes: SmallVec<[ComponentId; 8]> = SmallVec::new();
        for &id in &desc.includes {
            if !includes.contains(&id) {
                includes.push(id);
            }
        }
        let mut excludes: SmallVec<[ComponentId; 8]> = SmallVec::new();
        for &id in &desc.excludes {
            if !excludes.contains(&id) {
                excludes.push(id);
            }
        }
        excludes.sort_unstable();
        Self { includes, excludes }
    }
}

/// A registered query: its id lists, a stable fingerprint, and the cached
/// list of matching archetypes.
///
/// The match list is maintained eagerly: every archetype the world creates
/// is offered to every live query, so iteration never rescans.
pub struct Query {
    pub(crate) includes: SmallVec<[ComponentId; 8]>,
    pub(crate) excludes: SmallVec<[ComponentId; 8]>,
    pub(crate) fingerprint: u64,
    /// Matching archetype ids, in archetype creation order.
    pub(crate) matched: Vec<usize>,
}

impl Query {
    pub(crate) fn new(key: &QueryKey, fingerprint: u64) -> Self {
        Self {
            includes: key.includes.clone(),
            excludes: key.excludes.clone(),
            fingerprint,
            matched: Vec::new(),
        }
    }

    /// True iff every include is in the archetype's set and no exclude is.
    pub fn matches(&self, archetype: &Archetype) -> bool {
        let set = archetype.component_set();
        self.includes.iter().all(|&c| set.contains(c))
            && self.excludes.iter().all(|&c| !set.contains(c))
    }

    pub fn includes(&self) -> &[ComponentId] {
        &self.includes
    }

    pub fn excludes(&self) -> &[ComponentId] {
        &self.excludes
    }

    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    /// Archetype ids this query currently matches.
    pub fn matched_archetypes(&self) -> &[usize] {
        &self.matched
    }
}

/// Columnar view over one matched archetype, handed to iteration callbacks.
///
/// Component arrays are addressed by the ordinal the component occupied in
/// the query's include list at creation time, not by component id. Rows run
/// from 0 to `count() - 1` and line up across all arrays and `entities()`.
///
/// The view is only valid for the duration of the callback; callbacks must
/// not stash pointers derived from it, and must not structurally mutate the
/// world (the view does not expose the world for exactly that reason).
pub struct Iter<'a> {
    archetype: NonNull<Archetype>,
    columns: SmallVec<[(*mut u8, usize); 8]>,
    count: usize,
    _marker: PhantomData<&'a mut Archetype>,
}

impl<'a> Iter<'a> {
    pub(crate) fn for_archetype(archetype: &'a mut Archetype, includes: &[ComponentId]) -> Self {
        let count = archetype.len();
        let mut columns: SmallVec<[(*mut u8, usize); 8]> = SmallVec::new();
        for &component in includes {
            let column = archetype
                .column_for_mut(component)
                .expect("archetype matched a query but lacks one of its components");
            columns.push((column.base_ptr_mut(), column.stride()));
        }
        Self {
            archetype: NonNull::from(archetype),
            columns,
            count,
            _marker: PhantomData,
        }
    }

    /// Number of entities (rows) in this archetype.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Number of component arrays, equal to the query's include count.
    pub fn component_count(&self) -> usize {
        self.columns.len()
    }

    /// Entity handles in row order.
    pub fn entities(&self) -> &[Entity] {
        // SAFETY: the view holds the exclusive archetype borrow for 'a.
        unsafe { self.archetype.as_ref().entities() }
    }

    /// Entity at `row`.
    pub fn entity(&self, row: usize) -> Entity {
        self.entities()[row]
    }

    /// Id of the archetype under iteration.
    pub fn archetype_id(&self) -> usize {
        // SAFETY: see entities().
        unsafe { self.archetype.as_ref().id() }
    }

    /// Packed component array at include ordinal `index`.
    ///
    /// Panics if `index` is out of range or `T`'s size does not match the
    /// component's registered stride. For tag components (stride 0) `T` must
    /// be zero-sized and the slice carries one element per row.
    pub fn slice<T: Copy + 'static>(&mut self, index: usize) -> &mut [T] {
        // SAFETY: `&mut self` guarantees no other slice from this view is live.
        unsafe { self.column_slice(index) }
    }

    /// Fetch several component arrays at once, tuple position `i` mapping to
    /// include ordinal `i`.
    ///
    /// ```ignore
    /// let (velocities, heights) = view.slices::<(Velocity, Height)>();
    /// ```
    pub fn slices<'i, C: IterColumns<'i>>(&'i mut self) -> C::Slices {
        C::fetch(self)
    }

    /// Raw base pointer of the column at include ordinal `index` (dynamic,
    /// byte-stride path). Dangling but non-null for tag components.
    pub fn column_ptr(&self, index: usize) -> *mut u8 {
        assert!(
            index < self.columns.len(),
            "component index {index} out of range for query with {} components",
            self.columns.len()
        );
        self.columns[index].0
    }

    /// Stride of the column at include ordinal `index`.
    pub fn column_stride(&self, index: usize) -> usize {
        assert!(
            index < self.columns.len(),
            "component index {index} out of range for query with {} components",
            self.columns.len()
        );
        self.columns[index].1
    }

    // # Safety
    // The caller must guarantee no live aliasing slice for ordinal `index`.
    unsafe fn column_slice<'s, T: Copy + 'static>(&self, index: usize) -> &'s mut [T] {
        assert!(
            index < self.columns.len(),
            "component index {index} out of range for query with {} components",
            self.columns.len()
        );
        let (ptr, stride) = self.columns[index];
        assert_eq!(
            stride,
            mem::size_of::<T>(),
            "component stride {stride} does not match {}",
            std::any::type_name::<T>()
        );
        if mem::size_of::<T>() == 0 {
            slice::from_raw_parts_mut(NonNull::<T>::dangling().as_ptr(), self.count)
        } else {
            debug_assert!(mem::align_of::<T>() <= crate::column::COLUMN_ALIGN);
            slice::from_raw_parts_mut(ptr.cast::<T>(), self.count)
        }
    }
}

/// Tuple-of-component-types lens for [`Iter::slices`].
///
/// Implemented for tuples up to eight components; tuple position maps to
/// include ordinal.
pub trait IterColumns<'i> {
    type Slices;

    fn fetch(iter: &'i mut Iter<'_>) -> Self::Slices;
}

macro_rules! impl_iter_columns {
    ($(($T:ident, $index:tt)),+) => {
        impl<'i, $($T: Copy + 'static),+> IterColumns<'i> for ($($T,)+) {
            type Slices = ($(&'i mut [$T],)+);

            fn fetch(iter: &'i mut Iter<'_>) -> Self::Slices {
                // SAFETY: tuple positions are distinct ordinals, and the
                // query's include list is deduplicated, so the slices are
                // disjoint columns.
                ($(unsafe { iter.column_slice::<$T>($index) },)+)
            }
        }
    };
}

impl_iter_columns!((A, 0));
impl_iter_columns!((A, 0), (B, 1));
impl_iter_columns!((A, 0), (B, 1), (C, 2));
impl_iter_columns!((A, 0), (B, 1), (C, 2), (D, 3));
impl_iter_columns!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4));
impl_iter_columns!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4), (F, 5));
impl_iter_columns!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4), (F, 5), (G, 6));
impl_iter_columns!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4), (F, 5), (G, 6), (H, 7));

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_key_dedups_and_sorts_excludes() {
        let desc = QueryDesc::new()
            .with(ComponentId(3))
            .with(ComponentId(1))
            .with(ComponentId(3))
            .without(ComponentId(9))
            .without(ComponentId(4))
            .without(ComponentId(9));
        let key = QueryKey::from_desc(&desc);
        assert_eq!(&key.includes[..], &[ComponentId(3), ComponentId(1)]);
        assert_eq!(&key.excludes[..], &[ComponentId(4), ComponentId(9)]);
    }

    #[test]
    fn test_key_preserves_include_order() {
        let forward = QueryKey::from_desc(&QueryDesc::new().with(ComponentId(1)).with(ComponentId(2)));
        let reversed = QueryKey::from_desc(&QueryDesc::new().with(ComponentId(2)).with(ComponentId(1)));
        // Ordinal positions differ, so these must not unify.
        assert_ne!(forward, reversed);
    }
}

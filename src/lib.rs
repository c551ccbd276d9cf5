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

//! Lattice ECS - archetype-based Entity Component System
//!
//! Entities are grouped by the exact set of components they carry; each
//! group (archetype) stores component data in packed columns. Adding or
//! removing a component moves an entity's row along a cached transition
//! edge to the neighbouring archetype. Queries match archetypes by
//! inclusion/exclusion sets, and systems bind queries to callbacks inside
//! fixed, totally-ordered phases.

pub mod archetype;
pub mod column;
pub mod component;
pub mod debug;
pub mod entity;
pub mod error;
pub mod query;
pub mod system;
pub mod world;

// Re-exports for convenience
pub use archetype::{Archetype, ArchetypeEdges};
pub use column::Column;
pub use component::{ComponentHandle, ComponentId, ComponentInfo, ComponentSet};
pub use entity::{Entity, EntityRecord};
pub use error::{EcsError, Result};
pub use query::{Iter, IterColumns, Query, QueryDesc, QueryId};
pub use system::{Phase, SystemId, SystemStats};
pub use world::World;

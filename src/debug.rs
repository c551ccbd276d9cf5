//! World inspection helpers for debugging.

use crate::entity::Entity;
use crate::world::World;

/// World inspector for debugging
pub struct WorldInspector;

impl WorldInspector {
    /// Get archetype summary
    pub fn archetype_summary(world: &World) -> Vec<ArchetypeInfo> {
        world
            .archetypes()
            .iter()
            .map(|archetype| {
                let components = archetype
                    .component_set()
                    .iter()
                    .map(|id| {
                        world
                            .component_info(id)
                            .map(|info| info.name().to_string())
                            .unwrap_or_else(|| format!("component#{}", id.id()))
                    })
                    .collect();
                let columns = archetype
                    .columns()
                    .iter()
                    .map(|column| ColumnInfo {
                        stride: column.stride(),
                        capacity: column.capacity(),
                    })
                    .collect();
                ArchetypeInfo {
                    id: archetype.id(),
                    components,
                    entity_count: archetype.len(),
                    columns,
                }
            })
            .collect()
    }

    /// Print world summary to console
    pub fn print_summary(world: &World) {
        println!("=== World Summary ===");
        println!("Entities: {}", world.entity_count());
        println!("Components: {}", world.component_count());
        println!("Archetypes: {}", world.archetype_count());
        println!("Queries: {}", world.query_count());

        println!("\n=== Archetypes ===");
        for info in Self::archetype_summary(world) {
            println!(
                "Archetype {}: {} entities, [{}]",
                info.id,
                info.entity_count,
                info.components.join(", ")
            );
        }
    }

    /// Dump one archetype: id, component set, row count, and per-column
    /// stride/capacity.
    pub fn print_archetype(world: &World, id: usize) {
        let Some(archetype) = world.get_archetype(id) else {
            println!("Archetype {id} not found");
            return;
        };
        println!("=== Archetype {id} ===");
        println!("Rows: {}", archetype.len());
        for (ordinal, component) in archetype.component_set().iter().enumerate() {
            let name = world
                .component_info(component)
                .map(|info| info.name().to_string())
                .unwrap_or_else(|| format!("component#{}", component.id()));
            let column = archetype.column(ordinal);
            println!(
                "  [{ordinal}] {name}: stride {} capacity {}",
                column.stride(),
                column.capacity()
            );
        }
    }

    /// Print entity details
    pub fn print_entity(world: &World, entity: Entity) {
        if let Some(record) = world.record(entity) {
            println!("=== {entity:?} ===");
            println!("Archetype: {}", record.archetype_id);
            println!("Row: {}", record.row);
            if let Some(archetype) = world.get_archetype(record.archetype_id) {
                println!("Components: {} types", archetype.component_set().len());
            }
        } else {
            println!("{entity:?} not found");
        }
    }
}

/// Archetype information for debugging
#[derive(Clone, Debug)]
pub struct ArchetypeInfo {
    pub id: usize,
    pub components: Vec<String>,
    pub entity_count: usize,
    pub columns: Vec<ColumnInfo>,
}

/// Column layout information for debugging
#[derive(Clone, Copy, Debug)]
pub struct ColumnInfo {
    pub stride: usize,
    pub capacity: usize,
}

use realm_core::{EntityId, SafeZone, Simulation, Vec3, WorldError};
use tracing::info;

pub(crate) const SAFE_ZONE_RADIUS: f32 = 4.0;

/// Hostile NPCs stay out of the plaza around the player's spawn.
pub(crate) fn safe_zone() -> SafeZone {
    SafeZone::new(Vec3::ZERO, SAFE_ZONE_RADIUS)
}

const PLACEMENTS: &[(&str, [f32; 3])] = &[
    ("prop.wall", [5.0, 0.0, 0.0]),
    ("prop.wall", [-7.0, 0.0, 2.0]),
    ("prop.crate", [-3.0, 0.0, 5.0]),
    ("prop.lamp", [-2.0, 0.0, -2.0]),
    ("prop.sign", [0.0, 0.0, -4.0]),
    ("prop.stall", [-5.0, 0.0, -3.0]),
    ("prop.gate", [0.0, 0.0, 9.0]),
    ("zone.trigger", [3.0, 0.0, -3.0]),
    ("npc.guard", [12.0, 0.0, -2.0]),
    ("npc.dummy", [1.0, 0.0, -6.0]),
    ("npc.villager", [-8.0, 0.0, -8.0]),
    ("npc.wanderer", [-6.0, 0.0, 8.0]),
    ("npc.companion", [2.0, 0.0, 2.0]),
    ("npc.rabbit", [7.0, 0.0, 5.0]),
];

/// Fills an empty world with the demo layout.
pub(crate) fn populate(sim: &mut Simulation) -> Result<Vec<EntityId>, WorldError> {
    let mut placed = Vec::with_capacity(PLACEMENTS.len());
    for (asset_id, [x, y, z]) in PLACEMENTS {
        placed.push(sim.place_entity(asset_id, Vec3::new(*x, *y, *z))?);
    }
    sim.set_safe_zone(Some(safe_zone()));
    info!(entity_count = placed.len(), "demo_world_populated");
    Ok(placed)
}

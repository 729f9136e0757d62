use std::collections::HashMap;
use std::fmt;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::components::{validate_components, Component, ComponentError};
use crate::content::ModelHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position, Euler rotation in radians, and non-uniform scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    pub fn yaw(&self) -> f32 {
        self.rotation.y
    }
}

#[derive(Debug, Clone)]
pub struct Entity {
    pub id: EntityId,
    pub asset_ref: String,
    pub transform: Transform,
    pub model: ModelHandle,
    components: Vec<Component>,
    revision: u64,
}

impl Entity {
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn enabled_components(&self) -> impl Iterator<Item = &Component> {
        self.components.iter().filter(|component| component.enabled)
    }

    /// Bumped every time the component list is replaced.
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorldError {
    #[error("unknown entity {0}")]
    UnknownEntity(EntityId),
    #[error("unknown asset '{0}'")]
    UnknownAsset(String),
    #[error("entity id {0} appears more than once")]
    DuplicateEntityId(EntityId),
    #[error("invalid components for entity {entity_id}: {source}")]
    InvalidComponents {
        entity_id: EntityId,
        #[source]
        source: ComponentError,
    },
}

#[derive(Debug, Default)]
pub struct EntityIdAllocator {
    next: u64,
}

impl EntityIdAllocator {
    pub fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }

    /// Ensures the next allocation is strictly greater than `id`.
    pub fn reserve_past(&mut self, id: EntityId) {
        if self.next <= id.0 {
            self.next = id.0.saturating_add(1);
        }
    }
}

/// Exclusive owner of every entity. Subsystems refer to entities by id only.
#[derive(Debug, Default)]
pub struct World {
    allocator: EntityIdAllocator,
    entities: Vec<Entity>,
    index: HashMap<EntityId, usize>,
}

impl World {
    pub fn spawn(
        &mut self,
        asset_ref: &str,
        transform: Transform,
        components: Vec<Component>,
    ) -> Result<EntityId, WorldError> {
        let id = self.allocator.allocate();
        validate_components(&components)
            .map_err(|source| WorldError::InvalidComponents { entity_id: id, source })?;
        self.push(Entity {
            id,
            asset_ref: asset_ref.to_string(),
            transform,
            model: ModelHandle::Placeholder,
            components,
            revision: 0,
        });
        Ok(id)
    }

    /// Inserts an entity that already carries an id, e.g. from a saved world.
    pub fn insert_loaded(
        &mut self,
        id: EntityId,
        asset_ref: &str,
        transform: Transform,
        components: Vec<Component>,
    ) -> Result<(), WorldError> {
        if self.index.contains_key(&id) {
            return Err(WorldError::DuplicateEntityId(id));
        }
        validate_components(&components)
            .map_err(|source| WorldError::InvalidComponents { entity_id: id, source })?;
        self.allocator.reserve_past(id);
        self.push(Entity {
            id,
            asset_ref: asset_ref.to_string(),
            transform,
            model: ModelHandle::Placeholder,
            components,
            revision: 0,
        });
        Ok(())
    }

    fn push(&mut self, entity: Entity) {
        self.index.insert(entity.id, self.entities.len());
        self.entities.push(entity);
    }

    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        let slot = self.index.remove(&id)?;
        let entity = self.entities.remove(slot);
        for (position, entity) in self.entities.iter().enumerate().skip(slot) {
            self.index.insert(entity.id, position);
        }
        Some(entity)
    }

    /// Drops every entity. Ids are never handed out again.
    pub fn clear(&mut self) {
        self.entities.clear();
        self.index.clear();
    }

    /// Replaces an entity's component list. On error the previous list stays.
    pub fn set_components(
        &mut self,
        id: EntityId,
        components: Vec<Component>,
    ) -> Result<(), WorldError> {
        let slot = *self.index.get(&id).ok_or(WorldError::UnknownEntity(id))?;
        validate_components(&components)
            .map_err(|source| WorldError::InvalidComponents { entity_id: id, source })?;
        let entity = &mut self.entities[slot];
        entity.components = components;
        entity.revision = entity.revision.saturating_add(1);
        Ok(())
    }

    pub fn set_model(&mut self, id: EntityId, model: ModelHandle) -> bool {
        match self.find_entity_mut(id) {
            Some(entity) => {
                entity.model = model;
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn find_entity(&self, id: EntityId) -> Option<&Entity> {
        self.index.get(&id).map(|slot| &self.entities[*slot])
    }

    pub fn find_entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        match self.index.get(&id) {
            Some(slot) => self.entities.get_mut(*slot),
            None => None,
        }
    }
}

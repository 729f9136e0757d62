use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use glam::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::app::{Component, Entity, EntityId, Transform, World};

use super::atomic_io::write_text_atomic;

pub const WORLD_SAVE_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("encode world json: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("parse world json at {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("world save version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: u32, actual: u32 },
    #[error("validation failed at {path}: {message}")]
    Invalid { path: String, message: String },
    #[error("world file io at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SavedVec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl SavedVec3 {
    fn from_vec3(value: Vec3) -> Self {
        Self {
            x: value.x,
            y: value.y,
            z: value.z,
        }
    }

    fn to_vec3(self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SavedTransform {
    pub position: SavedVec3,
    pub rotation: SavedVec3,
    pub scale: SavedVec3,
}

impl SavedTransform {
    pub fn from_transform(transform: &Transform) -> Self {
        Self {
            position: SavedVec3::from_vec3(transform.position),
            rotation: SavedVec3::from_vec3(transform.rotation),
            scale: SavedVec3::from_vec3(transform.scale),
        }
    }

    pub fn to_transform(self) -> Transform {
        Transform {
            position: self.position.to_vec3(),
            rotation: self.rotation.to_vec3(),
            scale: self.scale.to_vec3(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedEntity {
    pub id: EntityId,
    pub asset_ref: String,
    pub transform: SavedTransform,
    #[serde(default)]
    pub components: Vec<Component>,
}

impl SavedEntity {
    pub fn from_entity(entity: &Entity) -> Self {
        Self {
            id: entity.id,
            asset_ref: entity.asset_ref.clone(),
            transform: SavedTransform::from_transform(&entity.transform),
            components: entity.components().to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedWorld {
    pub version: u32,
    pub entities: Vec<SavedEntity>,
}

impl SavedWorld {
    pub fn from_world(world: &World) -> Self {
        Self {
            version: WORLD_SAVE_VERSION,
            entities: world.entities().iter().map(SavedEntity::from_entity).collect(),
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, SaveError> {
        serde_json::to_string_pretty(self).map_err(SaveError::Encode)
    }

    pub fn from_json(raw: &str) -> Result<Self, SaveError> {
        let mut deserializer = serde_json::Deserializer::from_str(raw);
        let saved = serde_path_to_error::deserialize::<_, SavedWorld>(&mut deserializer).map_err(
            |error| {
                let path = error.path().to_string();
                SaveError::Decode {
                    path,
                    source: error.into_inner(),
                }
            },
        )?;
        saved.validate()?;
        Ok(saved)
    }

    /// Structural checks that serde cannot express.
    pub fn validate(&self) -> Result<(), SaveError> {
        if self.version != WORLD_SAVE_VERSION {
            return Err(SaveError::VersionMismatch {
                expected: WORLD_SAVE_VERSION,
                actual: self.version,
            });
        }
        let mut seen = HashSet::with_capacity(self.entities.len());
        for (index, entity) in self.entities.iter().enumerate() {
            if !seen.insert(entity.id) {
                return Err(SaveError::Invalid {
                    path: format!("entities[{index}].id"),
                    message: format!("duplicate entity id {}", entity.id),
                });
            }
            let transform = &entity.transform;
            for (field, value) in [
                ("position", transform.position),
                ("rotation", transform.rotation),
                ("scale", transform.scale),
            ] {
                if !value.is_finite() {
                    return Err(SaveError::Invalid {
                        path: format!("entities[{index}].transform.{field}"),
                        message: "expected finite numbers".to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), SaveError> {
        let json = self.to_json_pretty()?;
        write_text_atomic(path, &json).map_err(|source| SaveError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load_from_path(path: &Path) -> Result<Self, SaveError> {
        let raw = fs::read_to_string(path).map_err(|source| SaveError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;
    use crate::app::{ColliderData, ComponentKind};

    fn sample() -> SavedWorld {
        SavedWorld {
            version: WORLD_SAVE_VERSION,
            entities: vec![SavedEntity {
                id: EntityId(7),
                asset_ref: "prop.wall".to_string(),
                transform: SavedTransform::from_transform(&Transform {
                    position: Vec3::new(1.0, 0.0, -2.5),
                    rotation: Vec3::new(0.0, 1.25, 0.0),
                    scale: Vec3::new(4.0, 2.0, 0.5),
                }),
                components: vec![Component::new(ComponentKind::Collider(ColliderData::default()))],
            }],
        }
    }

    #[test]
    fn json_uses_camel_case_entity_fields() {
        let json = sample().to_json_pretty().expect("encode");
        let value: serde_json::Value = serde_json::from_str(&json).expect("value");
        assert_eq!(value["entities"][0]["assetRef"], "prop.wall");
        assert_eq!(value["entities"][0]["id"], 7);
        assert_eq!(value["entities"][0]["components"][0]["type"], "collider");
    }

    #[test]
    fn decode_error_names_json_path() {
        let raw = json!({
            "version": 1,
            "entities": [{
                "id": 1,
                "assetRef": "prop.crate",
                "transform": {
                    "position": { "x": 0.0, "y": "up", "z": 0.0 },
                    "rotation": { "x": 0.0, "y": 0.0, "z": 0.0 },
                    "scale": { "x": 1.0, "y": 1.0, "z": 1.0 }
                }
            }]
        })
        .to_string();
        let err = SavedWorld::from_json(&raw).expect_err("bad y");
        match err {
            SaveError::Decode { path, .. } => {
                assert_eq!(path, "entities[0].transform.position.y")
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn version_mismatch_is_rejected() {
        let mut saved = sample();
        saved.version = WORLD_SAVE_VERSION + 1;
        let json = serde_json::to_string(&saved).expect("encode");
        assert!(matches!(
            SavedWorld::from_json(&json),
            Err(SaveError::VersionMismatch { .. })
        ));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut saved = sample();
        saved.entities.push(saved.entities[0].clone());
        match saved.validate() {
            Err(SaveError::Invalid { path, .. }) => assert_eq!(path, "entities[1].id"),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn save_and_load_through_disk() {
        let temp = TempDir::new().expect("temp");
        let path = temp.path().join("worlds").join("demo.world.json");
        let saved = sample();
        saved.save_to_path(&path).expect("save");
        let loaded = SavedWorld::load_from_path(&path).expect("load");
        assert_eq!(loaded, saved);

        let missing = SavedWorld::load_from_path(&temp.path().join("nope.json"));
        assert!(matches!(missing, Err(SaveError::Io { .. })));
    }
}

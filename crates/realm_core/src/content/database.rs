use std::collections::HashMap;

use crate::app::Component;

use super::assets::ModelInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AssetDefId(pub u32);

/// A placeable asset: its model description and the components a fresh
/// placement starts with.
#[derive(Debug, Clone)]
pub struct AssetDef {
    pub id: AssetDefId,
    pub asset_id: String,
    pub label: String,
    pub model: Option<ModelInfo>,
    pub components: Vec<Component>,
}

#[derive(Debug, Default, Clone)]
pub struct AssetCatalog {
    asset_defs: Vec<AssetDef>,
    asset_ids_by_name: HashMap<String, AssetDefId>,
}

impl AssetCatalog {
    /// Ids follow the order of `asset_defs`.
    pub fn from_asset_defs(mut asset_defs: Vec<AssetDef>) -> Self {
        let mut asset_ids_by_name = HashMap::with_capacity(asset_defs.len());
        for (idx, def) in asset_defs.iter_mut().enumerate() {
            let id = AssetDefId(idx as u32);
            def.id = id;
            asset_ids_by_name.insert(def.asset_id.clone(), id);
        }
        Self {
            asset_defs,
            asset_ids_by_name,
        }
    }

    pub fn asset_def_id_by_name(&self, name: &str) -> Option<AssetDefId> {
        self.asset_ids_by_name.get(name).copied()
    }

    pub fn asset_def(&self, id: AssetDefId) -> Option<&AssetDef> {
        self.asset_defs.get(id.0 as usize)
    }

    pub fn asset_def_by_name(&self, name: &str) -> Option<&AssetDef> {
        self.asset_def_id_by_name(name)
            .and_then(|id| self.asset_def(id))
    }

    pub fn asset_defs(&self) -> &[AssetDef] {
        &self.asset_defs
    }

    pub fn len(&self) -> usize {
        self.asset_defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.asset_defs.is_empty()
    }
}

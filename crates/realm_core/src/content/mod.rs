mod assets;
mod atomic_io;
mod catalog;
mod database;
mod save;

pub use assets::{
    model_from_catalog, resolve_animation_clip, AssetStore, CatalogModelLoader, CompletionSender,
    ModelHandle, ModelInfo, ModelLoadCompletion, ModelLoadError, ModelLoadRequest, ModelLoader,
    NullModelLoader,
};
pub use catalog::{
    load_catalog_from_path, parse_catalog, CatalogError, CatalogErrorCode, SourceLocation,
};
pub use database::{AssetCatalog, AssetDef, AssetDefId};
pub use save::{
    SaveError, SavedEntity, SavedTransform, SavedVec3, SavedWorld, WORLD_SAVE_VERSION,
};

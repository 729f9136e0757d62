use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;

use glam::Vec3;
use thiserror::Error;
use tracing::{debug, warn};

use crate::app::{EntityId, World};

use super::database::AssetCatalog;

/// What the simulation knows about a loaded model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInfo {
    /// Local-space bounding box size at unit scale.
    pub bounds: Vec3,
    pub animation_clips: Vec<String>,
}

impl ModelInfo {
    pub fn clip(&self, wanted: &str) -> Option<&str> {
        resolve_animation_clip(&self.animation_clips, wanted)
    }
}

/// Handle the simulation reads every tick. Loads swap it from `Placeholder`
/// to `Ready` or `Failed`; nothing ever waits on it.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ModelHandle {
    #[default]
    Placeholder,
    Ready(Arc<ModelInfo>),
    Failed,
}

impl ModelHandle {
    pub fn info(&self) -> Option<&ModelInfo> {
        match self {
            Self::Ready(info) => Some(info),
            _ => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

/// Exact name first, then a case-insensitive substring match.
pub fn resolve_animation_clip<'a>(clips: &'a [String], wanted: &str) -> Option<&'a str> {
    if wanted.is_empty() {
        return None;
    }
    if let Some(exact) = clips.iter().find(|clip| clip.as_str() == wanted) {
        return Some(exact.as_str());
    }
    let needle = wanted.to_ascii_lowercase();
    clips
        .iter()
        .find(|clip| clip.to_ascii_lowercase().contains(&needle))
        .map(String::as_str)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelLoadError {
    #[error("asset '{0}' is not in the catalog")]
    UnknownAsset(String),
    #[error("asset '{0}' has no model")]
    NoModel(String),
    #[error("model load failed for '{asset_ref}': {message}")]
    Backend { asset_ref: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelLoadRequest {
    pub entity_id: EntityId,
    pub asset_ref: String,
}

#[derive(Debug)]
pub struct ModelLoadCompletion {
    pub request: ModelLoadRequest,
    pub result: Result<ModelInfo, ModelLoadError>,
}

#[derive(Debug, Clone)]
pub struct CompletionSender {
    inner: Sender<ModelLoadCompletion>,
}

impl CompletionSender {
    /// Returns false when the store has been dropped.
    pub fn complete(
        &self,
        request: ModelLoadRequest,
        result: Result<ModelInfo, ModelLoadError>,
    ) -> bool {
        self.inner
            .send(ModelLoadCompletion { request, result })
            .is_ok()
    }
}

/// Backend that starts a model load. It may complete inline or hand the
/// sender to another thread; the store only observes the channel.
pub trait ModelLoader {
    fn request(&mut self, request: ModelLoadRequest, completion: CompletionSender);
}

/// Never completes; every entity stays on placeholder geometry.
#[derive(Debug, Default)]
pub struct NullModelLoader;

impl ModelLoader for NullModelLoader {
    fn request(&mut self, _request: ModelLoadRequest, _completion: CompletionSender) {}
}

/// Completes inline from the catalog's model descriptions.
#[derive(Debug, Clone)]
pub struct CatalogModelLoader {
    catalog: AssetCatalog,
}

impl CatalogModelLoader {
    pub fn new(catalog: AssetCatalog) -> Self {
        Self { catalog }
    }
}

impl ModelLoader for CatalogModelLoader {
    fn request(&mut self, request: ModelLoadRequest, completion: CompletionSender) {
        let result = model_from_catalog(&self.catalog, &request.asset_ref);
        completion.complete(request, result);
    }
}

pub fn model_from_catalog(
    catalog: &AssetCatalog,
    asset_ref: &str,
) -> Result<ModelInfo, ModelLoadError> {
    let def = catalog
        .asset_def_by_name(asset_ref)
        .ok_or_else(|| ModelLoadError::UnknownAsset(asset_ref.to_string()))?;
    def.model
        .clone()
        .ok_or_else(|| ModelLoadError::NoModel(asset_ref.to_string()))
}

/// Tracks outstanding model loads and swaps completed handles into the world.
pub struct AssetStore {
    loader: Box<dyn ModelLoader>,
    sender: Sender<ModelLoadCompletion>,
    receiver: Receiver<ModelLoadCompletion>,
    pending: HashMap<EntityId, String>,
}

impl std::fmt::Debug for AssetStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetStore")
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl Default for AssetStore {
    fn default() -> Self {
        Self::new(Box::new(NullModelLoader))
    }
}

impl AssetStore {
    pub fn new(loader: Box<dyn ModelLoader>) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            loader,
            sender,
            receiver,
            pending: HashMap::new(),
        }
    }

    pub fn set_loader(&mut self, loader: Box<dyn ModelLoader>) {
        self.loader = loader;
    }

    pub fn request_model(&mut self, entity_id: EntityId, asset_ref: &str) {
        self.pending.insert(entity_id, asset_ref.to_string());
        self.loader.request(
            ModelLoadRequest {
                entity_id,
                asset_ref: asset_ref.to_string(),
            },
            CompletionSender {
                inner: self.sender.clone(),
            },
        );
    }

    /// Completions for forgotten entities are dropped when they arrive.
    pub fn forget(&mut self, entity_id: EntityId) {
        self.pending.remove(&entity_id);
    }

    pub fn forget_all(&mut self) {
        self.pending.clear();
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Applies every completion that has arrived so far. Returns how many
    /// handles were swapped.
    pub fn poll(&mut self, world: &mut World) -> usize {
        let mut applied = 0usize;
        loop {
            let completion = match self.receiver.try_recv() {
                Ok(completion) => completion,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            };
            let entity_id = completion.request.entity_id;
            let is_current = self
                .pending
                .get(&entity_id)
                .is_some_and(|asset_ref| *asset_ref == completion.request.asset_ref);
            if !is_current {
                debug!(entity_id = entity_id.0, "stale_model_completion_ignored");
                continue;
            }
            self.pending.remove(&entity_id);

            let handle = match completion.result {
                Ok(info) => ModelHandle::Ready(Arc::new(info)),
                Err(error) => {
                    warn!(
                        entity_id = entity_id.0,
                        asset_ref = %completion.request.asset_ref,
                        error = %error,
                        "model_load_failed"
                    );
                    ModelHandle::Failed
                }
            };
            if world.set_model(entity_id, handle) {
                applied += 1;
            }
        }
        applied
    }
}

use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use realm_core::content::model_from_catalog;
use realm_core::{AssetCatalog, CompletionSender, ModelLoadRequest, ModelLoader};
use tracing::{debug, warn};

type LoadJob = (ModelLoadRequest, CompletionSender);

/// Resolves models from the catalog on a worker thread after a fixed delay,
/// so the simulation runs on placeholders for a few ticks.
pub(crate) struct ThreadedModelLoader {
    jobs: Option<Sender<LoadJob>>,
    worker: Option<JoinHandle<()>>,
}

impl ThreadedModelLoader {
    pub(crate) fn spawn(catalog: AssetCatalog, latency: Duration) -> std::io::Result<Self> {
        let (jobs, receiver) = mpsc::channel::<LoadJob>();
        let worker = thread::Builder::new()
            .name("model-loader".to_string())
            .spawn(move || {
                for (request, completion) in receiver {
                    if !latency.is_zero() {
                        thread::sleep(latency);
                    }
                    let result = model_from_catalog(&catalog, &request.asset_ref);
                    debug!(
                        entity_id = request.entity_id.0,
                        asset_ref = %request.asset_ref,
                        ok = result.is_ok(),
                        "model_load_finished"
                    );
                    if !completion.complete(request, result) {
                        break;
                    }
                }
            })?;
        Ok(Self {
            jobs: Some(jobs),
            worker: Some(worker),
        })
    }
}

impl ModelLoader for ThreadedModelLoader {
    fn request(&mut self, request: ModelLoadRequest, completion: CompletionSender) {
        let Some(jobs) = &self.jobs else {
            return;
        };
        if let Err(error) = jobs.send((request, completion)) {
            let (request, _) = error.0;
            warn!(asset_ref = %request.asset_ref, "model_loader_worker_gone");
        }
    }
}

impl Drop for ThreadedModelLoader {
    fn drop(&mut self) {
        self.jobs.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("model_loader_worker_panicked");
            }
        }
    }
}

//! Model loading for character and generative entities.
//!
//! Loads run on the editor's single thread: a `ModelSource` hands back a boxed,
//! non-`Send` future that the editor context awaits before mutating the entity.

use crate::skeleton::Skeleton;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::future::Future;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::rc::Rc;
use thiserror::Error;

pub mod skeletal;

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("model '{0}' not found")]
    NotFound(String),
    #[error("request for '{url}' failed with HTTP status {status}")]
    Http { url: String, status: u16 },
    #[error("transport error fetching '{url}': {message}")]
    Transport { url: String, message: String },
    #[error("failed to read '{}'", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse model '{url}': {message}")]
    Parse { url: String, message: String },
    #[error("load was cancelled")]
    Cancelled,
}

/// Result of a finished model fetch. A model without a skin loads fine and
/// simply carries no skeleton.
#[derive(Debug, Clone)]
pub struct ModelAsset {
    pub url: String,
    pub skeleton: Option<Skeleton>,
}

impl ModelAsset {
    pub fn new(url: impl Into<String>, skeleton: Option<Skeleton>) -> Self {
        Self { url: url.into(), skeleton }
    }
}

pub type LoadFuture = Pin<Box<dyn Future<Output = Result<ModelAsset, AssetError>>>>;

pub trait ModelSource {
    fn fetch(&self, url: &str) -> LoadFuture;
}

/// Shared flag set by `dispose`; loads observe it before and after their await.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Rc<Cell<bool>>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.get()
    }
}

pub fn cancellable(token: CancelToken, load: LoadFuture) -> LoadFuture {
    Box::pin(async move {
        if token.is_cancelled() {
            return Err(AssetError::Cancelled);
        }
        let result = load.await;
        if token.is_cancelled() {
            return Err(AssetError::Cancelled);
        }
        result
    })
}

/// Loads glTF/GLB models from disk, `file://` URLs, or `http(s)://`.
#[derive(Debug, Clone, Default)]
pub struct GltfModelSource {
    base_dir: Option<PathBuf>,
}

impl GltfModelSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Relative paths resolve against `base_dir`, usually the project's folder.
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self { base_dir: Some(base_dir.into()) }
    }

    fn resolve_path(&self, url: &str) -> PathBuf {
        let raw = url.strip_prefix("file://").unwrap_or(url);
        let path = Path::new(raw);
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl ModelSource for GltfModelSource {
    fn fetch(&self, url: &str) -> LoadFuture {
        let url = url.to_string();
        if url.starts_with("http://") || url.starts_with("https://") {
            return Box::pin(async move { fetch_remote(&url) });
        }
        let path = self.resolve_path(&url);
        Box::pin(async move {
            let skeleton = skeletal::load_skeleton_from_gltf(&path)?;
            Ok(ModelAsset { url, skeleton })
        })
    }
}

fn fetch_remote(url: &str) -> Result<ModelAsset, AssetError> {
    let response = ureq::get(url).call().map_err(|err| match err {
        ureq::Error::Status(404, _) => AssetError::NotFound(url.to_string()),
        ureq::Error::Status(status, _) => AssetError::Http { url: url.to_string(), status },
        ureq::Error::Transport(transport) => {
            AssetError::Transport { url: url.to_string(), message: transport.to_string() }
        }
    })?;
    let mut bytes = Vec::new();
    response
        .into_reader()
        .read_to_end(&mut bytes)
        .map_err(|err| AssetError::Transport { url: url.to_string(), message: err.to_string() })?;
    let (document, _, _) = gltf::import_slice(&bytes)
        .map_err(|err| AssetError::Parse { url: url.to_string(), message: err.to_string() })?;
    Ok(ModelAsset { url: url.to_string(), skeleton: skeletal::skeleton_from_document(&document, url) })
}

/// In-memory registry of models keyed by URL. Unregistered URLs fail with `NotFound`.
#[derive(Debug, Clone, Default)]
pub struct MemoryModelSource {
    models: Rc<RefCell<HashMap<String, ModelAsset>>>,
}

impl MemoryModelSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, url: impl Into<String>, skeleton: Option<Skeleton>) {
        let url = url.into();
        self.models.borrow_mut().insert(url.clone(), ModelAsset { url, skeleton });
    }

    pub fn remove(&self, url: &str) -> bool {
        self.models.borrow_mut().remove(url).is_some()
    }
}

impl ModelSource for MemoryModelSource {
    fn fetch(&self, url: &str) -> LoadFuture {
        let models = Rc::clone(&self.models);
        let url = url.to_string();
        Box::pin(async move {
            let found = models.borrow().get(&url).cloned();
            found.ok_or(AssetError::NotFound(url))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_source_reports_unknown_urls() {
        let source = MemoryModelSource::new();
        source.register("models/a.glb", None);
        let asset = pollster::block_on(source.fetch("models/a.glb")).expect("registered model");
        assert_eq!(asset.url, "models/a.glb");
        assert!(matches!(pollster::block_on(source.fetch("models/b.glb")), Err(AssetError::NotFound(_))));
    }

    #[test]
    fn cancelled_token_short_circuits_load() {
        let source = MemoryModelSource::new();
        source.register("models/a.glb", None);
        let token = CancelToken::new();
        let load = cancellable(token.clone(), source.fetch("models/a.glb"));
        token.cancel();
        assert!(matches!(pollster::block_on(load), Err(AssetError::Cancelled)));
    }

    #[test]
    fn missing_local_file_is_not_found() {
        let dir = tempfile::tempdir().expect("temp dir");
        let source = GltfModelSource::with_base_dir(dir.path());
        let result = pollster::block_on(source.fetch("missing.gltf"));
        assert!(matches!(result, Err(AssetError::NotFound(_))));
    }
}

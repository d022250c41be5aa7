use super::LoadState;
use crate::assets::{AssetError, CancelToken, ModelAsset};
use crate::graph::{MeshShape, NodeId, NodeKind, SceneGraph, SceneNode};
use chrono::{DateTime, Utc};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    #[default]
    Image,
    Model,
}

/// One generation result. Never edited after it is recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationLog {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub prompt: String,
    pub asset_type: AssetKind,
    pub file_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derived_from: Option<String>,
}

impl GenerationLog {
    pub fn new(asset_type: AssetKind, prompt: impl Into<String>, file_url: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            prompt: prompt.into(),
            asset_type,
            file_url: file_url.into(),
            derived_from: None,
        }
    }

    pub fn derived_from(mut self, parent: impl Into<String>) -> Self {
        self.derived_from = Some(parent.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerativeProps {
    #[serde(default)]
    pub asset_kind: AssetKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_url: Option<String>,
    #[serde(default)]
    pub generation_logs: Vec<GenerationLog>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_generation_id: Option<String>,
}

impl GenerativeProps {
    /// Log ids whose `derived_from` does not name an earlier log.
    pub fn dangling_lineage(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        let mut dangling = Vec::new();
        for log in &self.generation_logs {
            if let Some(parent) = &log.derived_from {
                if !seen.contains(parent.as_str()) {
                    dangling.push(log.id.as_str());
                }
            }
            seen.insert(log.id.as_str());
        }
        dangling
    }
}

#[derive(Debug)]
pub struct GenerativeEntity {
    props: GenerativeProps,
    preview: NodeId,
    current: Option<usize>,
    state: LoadState,
    token: Option<CancelToken>,
}

impl GenerativeEntity {
    pub(crate) fn new(props: GenerativeProps, root: NodeId, graph: &mut SceneGraph) -> Self {
        let preview = graph.add(
            SceneNode::new("generative_preview", NodeKind::Mesh(preview_shape(props.asset_kind))).pickable(true),
            Some(root),
        );
        let mut entity =
            Self { props: GenerativeProps::default(), preview, current: None, state: LoadState::Unloaded, token: None };
        entity.restore(props);
        entity
    }

    /// Takes over saved props, dropping broken lineage links and an unknown cursor.
    fn restore(&mut self, props: GenerativeProps) {
        let GenerativeProps { asset_kind, image_url, model_url, generation_logs, current_generation_id } = props;
        self.props.asset_kind = asset_kind;
        self.props.image_url = image_url;
        self.props.model_url = model_url;
        for log in generation_logs {
            self.push_log(log);
        }
        self.current = current_generation_id
            .and_then(|id| self.props.generation_logs.iter().position(|log| log.id == id))
            .or_else(|| self.props.generation_logs.len().checked_sub(1));
        self.sync_current_id();
    }

    pub fn props(&self) -> &GenerativeProps {
        &self.props
    }

    pub fn preview(&self) -> NodeId {
        self.preview
    }

    pub fn load_state(&self) -> LoadState {
        self.state
    }

    pub fn logs(&self) -> &[GenerationLog] {
        &self.props.generation_logs
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current_generation(&self) -> Option<&GenerationLog> {
        self.current.and_then(|index| self.props.generation_logs.get(index))
    }

    fn push_log(&mut self, mut log: GenerationLog) -> usize {
        if self.props.generation_logs.iter().any(|existing| existing.id == log.id) {
            warn!(target: "generative", log = %log.id, "duplicate generation log id; assigning a fresh one");
            log.id = uuid::Uuid::new_v4().to_string();
        }
        if let Some(parent) = &log.derived_from {
            if !self.props.generation_logs.iter().any(|existing| &existing.id == parent) {
                warn!(target: "generative", log = %log.id, parent = %parent, "dropping lineage to unknown generation");
                log.derived_from = None;
            }
        }
        self.props.generation_logs.push(log);
        self.props.generation_logs.len() - 1
    }

    /// Records a generation and makes it current.
    pub fn add_generation_log(&mut self, log: GenerationLog) -> &GenerationLog {
        let index = self.push_log(log);
        self.set_cursor(Some(index));
        &self.props.generation_logs[index]
    }

    pub fn apply_generated_image(&mut self, image_url: impl Into<String>, prompt: impl Into<String>) -> &GenerationLog {
        let mut log = GenerationLog::new(AssetKind::Image, prompt, image_url);
        log.derived_from = self.current_generation().map(|current| current.id.clone());
        self.add_generation_log(log)
    }

    /// Records a model generation. The model itself is fetched by the editor's next load pass.
    pub fn apply_generated_model(&mut self, model_url: impl Into<String>, prompt: impl Into<String>) -> &GenerationLog {
        let mut log = GenerationLog::new(AssetKind::Model, prompt, model_url);
        log.derived_from = self.current_generation().map(|current| current.id.clone());
        self.add_generation_log(log)
    }

    pub fn previous_generation(&mut self) -> Option<&GenerationLog> {
        let index = self.current?.checked_sub(1)?;
        self.set_cursor(Some(index));
        self.current_generation()
    }

    pub fn next_generation(&mut self) -> Option<&GenerationLog> {
        let index = self.current.map_or(0, |current| current + 1);
        if index >= self.props.generation_logs.len() {
            return None;
        }
        self.set_cursor(Some(index));
        self.current_generation()
    }

    pub fn go_to_generation(&mut self, id: &str) -> Option<&GenerationLog> {
        let index = self.props.generation_logs.iter().position(|log| log.id == id)?;
        self.set_cursor(Some(index));
        self.current_generation()
    }

    /// Moves the cursor and points the displayed asset at the selected log.
    /// Returns false for an out-of-range index.
    pub fn set_cursor(&mut self, index: Option<usize>) -> bool {
        if index.is_some_and(|index| index >= self.props.generation_logs.len()) {
            return false;
        }
        self.current = index;
        self.sync_current_id();
        let Some(log) = self.current_generation() else {
            return true;
        };
        let (asset_type, file_url) = (log.asset_type, log.file_url.clone());
        self.props.asset_kind = asset_type;
        match asset_type {
            AssetKind::Image => self.props.image_url = Some(file_url),
            AssetKind::Model => {
                if self.props.model_url.as_deref() != Some(file_url.as_str()) {
                    self.props.model_url = Some(file_url);
                    if self.state != LoadState::Disposed {
                        self.state = LoadState::Unloaded;
                    }
                }
            }
        }
        true
    }

    fn sync_current_id(&mut self) {
        self.props.current_generation_id = self.current_generation().map(|log| log.id.clone());
    }

    /// Ids from the current generation back to its oldest ancestor.
    pub fn lineage(&self) -> Vec<&str> {
        let mut chain = Vec::new();
        let mut cursor = self.current_generation();
        while let Some(log) = cursor {
            chain.push(log.id.as_str());
            cursor = log
                .derived_from
                .as_deref()
                .and_then(|parent| self.props.generation_logs.iter().find(|candidate| candidate.id == parent));
            if chain.len() > self.props.generation_logs.len() {
                break;
            }
        }
        chain
    }

    pub(crate) fn pending_model_url(&self) -> Option<&str> {
        if self.props.asset_kind != AssetKind::Model || self.state != LoadState::Unloaded {
            return None;
        }
        self.props.model_url.as_deref().filter(|url| !url.is_empty())
    }

    pub(crate) fn begin_loading(&mut self) -> CancelToken {
        if let Some(previous) = self.token.take() {
            previous.cancel();
        }
        let token = CancelToken::new();
        self.token = Some(token.clone());
        self.state = LoadState::Loading;
        token
    }

    pub(crate) fn complete_load(&mut self, result: Result<ModelAsset, AssetError>) {
        if self.state == LoadState::Disposed || self.token.as_ref().is_some_and(CancelToken::is_cancelled) {
            return;
        }
        self.token = None;
        match result {
            Ok(asset) => {
                info!(target: "generative", url = %asset.url, "generated model ready");
                self.state = LoadState::Ready { has_skeleton: asset.skeleton.is_some() };
            }
            Err(AssetError::Cancelled) => {}
            Err(err) => {
                warn!(target: "generative", "generated model failed to load: {err}");
                self.state = LoadState::Ready { has_skeleton: false };
            }
        }
    }

    pub(crate) fn dispose(&mut self) {
        if let Some(token) = self.token.take() {
            token.cancel();
        }
        self.state = LoadState::Disposed;
    }
}

fn preview_shape(kind: AssetKind) -> MeshShape {
    match kind {
        AssetKind::Image => MeshShape::Box { half_extents: Vec3::new(0.5, 0.5, 0.01) },
        AssetKind::Model => MeshShape::Box { half_extents: Vec3::splat(0.5) },
    }
}

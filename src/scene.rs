use crate::entity::{EntityId, EntityType, GenerativeProps};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

pub const PROJECT_VERSION: &str = "1.0";

/// Persisted project: every entity plus environment and render settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDocument {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub entities: Vec<SerializedEntity>,
    #[serde(default)]
    pub environment: EnvironmentSettings,
    #[serde(default)]
    pub render_settings: RenderSettings,
}

fn default_version() -> String {
    PROJECT_VERSION.to_string()
}

impl Default for ProjectDocument {
    fn default() -> Self {
        Self {
            version: default_version(),
            timestamp: Utc::now(),
            entities: Vec::new(),
            environment: EnvironmentSettings::default(),
            render_settings: RenderSettings::default(),
        }
    }
}

/// One entity as written to disk. `props` stays untyped until the factory
/// decodes it, so a single malformed payload cannot fail the whole document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedEntity {
    pub id: EntityId,
    #[serde(default)]
    pub name: String,
    pub entity_type: EntityType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub position: Vec3Data,
    #[serde(default)]
    pub rotation: Vec3Data,
    #[serde(default = "Vec3Data::one")]
    pub scaling: Vec3Data,
    #[serde(default)]
    pub props: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Vec3Data {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3Data {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    fn one() -> Self {
        Self::new(1.0, 1.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuatData {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl QuatData {
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite() && self.w.is_finite()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorData {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl ColorData {
    pub const WHITE: ColorData = ColorData { r: 1.0, g: 1.0, b: 1.0 };

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }
}

impl Default for ColorData {
    fn default() -> Self {
        Self::WHITE
    }
}

fn default_sun_direction() -> Vec3Data {
    let dir = glam::Vec3::new(-0.5, -1.0, 0.35).normalize();
    Vec3Data::from(dir)
}

const fn default_sun_intensity() -> f32 {
    1.0
}

const fn default_ambient_intensity() -> f32 {
    0.4
}

fn default_background() -> ColorData {
    ColorData::new(0.12, 0.12, 0.14)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SunSettings {
    #[serde(default)]
    pub color: ColorData,
    #[serde(default = "default_sun_intensity")]
    pub intensity: f32,
    #[serde(default = "default_sun_direction")]
    pub direction: Vec3Data,
    #[serde(default = "default_true")]
    pub shadows_enabled: bool,
}

impl Default for SunSettings {
    fn default() -> Self {
        Self {
            color: ColorData::WHITE,
            intensity: default_sun_intensity(),
            direction: default_sun_direction(),
            shadows_enabled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmbientSettings {
    #[serde(default)]
    pub color: ColorData,
    #[serde(default = "default_ambient_intensity")]
    pub intensity: f32,
}

impl Default for AmbientSettings {
    fn default() -> Self {
        Self { color: ColorData::WHITE, intensity: default_ambient_intensity() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AspectRatio {
    #[serde(rename = "16:9")]
    #[default]
    Widescreen,
    #[serde(rename = "4:3")]
    Standard,
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "3:2")]
    Photo,
    #[serde(rename = "9:16")]
    Portrait,
}

impl AspectRatio {
    pub fn value(self) -> f32 {
        match self {
            AspectRatio::Widescreen => 16.0 / 9.0,
            AspectRatio::Standard => 4.0 / 3.0,
            AspectRatio::Square => 1.0,
            AspectRatio::Photo => 3.0 / 2.0,
            AspectRatio::Portrait => 9.0 / 16.0,
        }
    }
}

const fn default_overlay_padding() -> f32 {
    10.0
}

const fn default_overlay_opacity() -> f32 {
    0.5
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatioOverlaySettings {
    #[serde(default)]
    pub visible: bool,
    #[serde(default)]
    pub ratio: AspectRatio,
    #[serde(default = "default_overlay_padding")]
    pub padding_percent: f32,
    #[serde(default)]
    pub offset_x: f32,
    #[serde(default)]
    pub offset_y: f32,
    #[serde(default = "default_overlay_opacity")]
    pub opacity: f32,
}

impl Default for RatioOverlaySettings {
    fn default() -> Self {
        Self {
            visible: false,
            ratio: AspectRatio::default(),
            padding_percent: default_overlay_padding(),
            offset_x: 0.0,
            offset_y: 0.0,
            opacity: default_overlay_opacity(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentSettings {
    #[serde(default)]
    pub sun: SunSettings,
    #[serde(default)]
    pub ambient: AmbientSettings,
    #[serde(default = "default_background")]
    pub background: ColorData,
    #[serde(default = "default_true")]
    pub grid_visible: bool,
    #[serde(default)]
    pub ratio_overlay: RatioOverlaySettings,
}

impl Default for EnvironmentSettings {
    fn default() -> Self {
        Self {
            sun: SunSettings::default(),
            ambient: AmbientSettings::default(),
            background: default_background(),
            grid_visible: true,
            ratio_overlay: RatioOverlaySettings::default(),
        }
    }
}

impl EnvironmentSettings {
    pub fn sanitized(mut self) -> Self {
        self.sun.intensity = self.sun.intensity.max(0.0);
        self.ambient.intensity = self.ambient.intensity.max(0.0);
        self.ratio_overlay.padding_percent = self.ratio_overlay.padding_percent.clamp(0.0, 50.0);
        self.ratio_overlay.opacity = self.ratio_overlay.opacity.clamp(0.0, 1.0);
        let direction = glam::Vec3::from(self.sun.direction);
        self.sun.direction = if direction.length_squared() > f32::EPSILON {
            Vec3Data::from(direction.normalize())
        } else {
            default_sun_direction()
        };
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RenderApi {
    #[default]
    Fal,
    Replicate,
    ComfyUi,
}

impl RenderApi {
    pub fn label(self) -> &'static str {
        match self {
            RenderApi::Fal => "fal.ai",
            RenderApi::Replicate => "Replicate",
            RenderApi::ComfyUi => "ComfyUI",
        }
    }
}

const fn default_lora_strength() -> f32 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoraSelection {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_lora_strength")]
    pub strength: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderLogEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub api: RenderApi,
    pub image_url: String,
}

const fn default_prompt_strength() -> f32 {
    0.9
}

const fn default_depth_strength() -> f32 {
    0.5
}

const fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderSettings {
    #[serde(default)]
    pub prompt: String,
    #[serde(default = "default_prompt_strength")]
    pub prompt_strength: f32,
    #[serde(default = "default_depth_strength")]
    pub depth_strength: f32,
    #[serde(default)]
    pub noise_strength: f32,
    #[serde(default)]
    pub seed: u64,
    #[serde(default = "default_true")]
    pub use_random_seed: bool,
    #[serde(default)]
    pub selected_api: RenderApi,
    #[serde(default)]
    pub selected_loras: Vec<LoraSelection>,
    #[serde(default)]
    pub render_log: Vec<RenderLogEntry>,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            prompt_strength: default_prompt_strength(),
            depth_strength: default_depth_strength(),
            noise_strength: 0.0,
            seed: 0,
            use_random_seed: true,
            selected_api: RenderApi::default(),
            selected_loras: Vec::new(),
            render_log: Vec::new(),
        }
    }
}

fn clamp_unit(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

impl RenderSettings {
    /// Strength values are fractions; anything outside 0–1 is clamped.
    pub fn sanitized(mut self) -> Self {
        self.prompt_strength = clamp_unit(self.prompt_strength);
        self.depth_strength = clamp_unit(self.depth_strength);
        self.noise_strength = clamp_unit(self.noise_strength);
        for lora in &mut self.selected_loras {
            lora.strength = if lora.strength.is_finite() { lora.strength.clamp(0.0, 2.0) } else { 1.0 };
        }
        self
    }

    pub fn out_of_range_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        let in_range = |v: f32| v.is_finite() && (0.0..=1.0).contains(&v);
        if !in_range(self.prompt_strength) {
            fields.push("promptStrength");
        }
        if !in_range(self.depth_strength) {
            fields.push("depthStrength");
        }
        if !in_range(self.noise_strength) {
            fields.push("noiseStrength");
        }
        fields
    }

    /// Picks a fresh seed when random seeding is on and returns the seed to use.
    pub fn next_seed<R: rand::Rng>(&mut self, rng: &mut R) -> u64 {
        if self.use_random_seed {
            self.seed = rng.gen_range(0..=u32::MAX as u64);
        }
        self.seed
    }

    pub fn log_render(&mut self, image_url: impl Into<String>) -> &RenderLogEntry {
        self.render_log.push(RenderLogEntry {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            prompt: self.prompt.clone(),
            seed: self.seed,
            api: self.selected_api,
            image_url: image_url.into(),
        });
        let last = self.render_log.len() - 1;
        &self.render_log[last]
    }
}

impl ProjectDocument {
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).with_context(|| format!("Reading project file {}", path.display()))?;
        let document = serde_json::from_slice::<ProjectDocument>(&bytes)
            .with_context(|| format!("Parsing project file {}", path.display()))?;
        Ok(document)
    }

    pub fn save_to_path(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Creating project directory {}", parent.display()))?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json.as_bytes()).with_context(|| format!("Writing project file {}", path.display()))?;
        Ok(())
    }

    /// Hash of everything except the version and save timestamp.
    pub fn content_hash(&self) -> Result<blake3::Hash, serde_json::Error> {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&serde_json::to_vec(&self.entities)?);
        hasher.update(&serde_json::to_vec(&self.environment)?);
        hasher.update(&serde_json::to_vec(&self.render_settings)?);
        Ok(hasher.finalize())
    }

    pub fn find_entity(&self, id: EntityId) -> Option<&SerializedEntity> {
        self.entities.iter().find(|entity| entity.id == id)
    }

    /// Structural problems a loader would silently repair.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        let mut ids = HashSet::with_capacity(self.entities.len());
        for entity in &self.entities {
            if !ids.insert(entity.id) {
                issues.push(format!("duplicate entity id '{}'", entity.id));
            }
            let transform_values = [
                entity.position.x,
                entity.position.y,
                entity.position.z,
                entity.rotation.x,
                entity.rotation.y,
                entity.rotation.z,
                entity.scaling.x,
                entity.scaling.y,
                entity.scaling.z,
            ];
            if transform_values.iter().any(|v| !v.is_finite()) {
                issues.push(format!("entity '{}' has a non-finite transform", entity.id));
            }
            if !entity.props.is_object() && !entity.props.is_null() {
                issues.push(format!("entity '{}' props are not an object", entity.id));
                continue;
            }
            if entity.entity_type == EntityType::Generative && entity.props.is_object() {
                match serde_json::from_value::<GenerativeProps>(entity.props.clone()) {
                    Ok(props) => {
                        for parent in props.dangling_lineage() {
                            issues.push(format!("entity '{}' derives from unknown generation '{parent}'", entity.id));
                        }
                    }
                    Err(err) => issues.push(format!("entity '{}' has unreadable generative props: {err}", entity.id)),
                }
            }
        }
        for field in self.render_settings.out_of_range_fields() {
            issues.push(format!("render setting '{field}' is outside 0-1"));
        }
        issues
    }
}

impl From<glam::Vec3> for Vec3Data {
    fn from(value: glam::Vec3) -> Self {
        Self { x: value.x, y: value.y, z: value.z }
    }
}

impl From<Vec3Data> for glam::Vec3 {
    fn from(value: Vec3Data) -> Self {
        glam::Vec3::new(value.x, value.y, value.z)
    }
}

impl From<glam::Quat> for QuatData {
    fn from(value: glam::Quat) -> Self {
        let v = value.normalize();
        Self { x: v.x, y: v.y, z: v.z, w: v.w }
    }
}

impl From<QuatData> for glam::Quat {
    fn from(value: QuatData) -> Self {
        glam::Quat::from_xyzw(value.x, value.y, value.z, value.w)
    }
}

impl From<glam::Vec3> for ColorData {
    fn from(value: glam::Vec3) -> Self {
        Self { r: value.x, g: value.y, b: value.z }
    }
}

impl From<ColorData> for glam::Vec3 {
    fn from(value: ColorData) -> Self {
        glam::Vec3::new(value.r, value.g, value.b)
    }
}

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::storage::StateStore;

/// Storage key for user-defined presets; built-ins never persist.
pub const CUSTOM_STYLES_STORAGE_KEY: &str = "customStyles";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StylePreset {
    pub id: String,
    pub name: String,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(rename = "isCustom", default)]
    pub is_custom: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum StyleCatalogError {
    #[error("Style '{0}' is built in and cannot be replaced")]
    BuiltIn(String),
    #[error(transparent)]
    Persist(#[from] anyhow::Error),
}

fn built_in(id: &str, name: &str, prompt: &str, icon: &str) -> StylePreset {
    StylePreset {
        id: id.to_string(),
        name: name.to_string(),
        prompt: prompt.to_string(),
        icon: Some(icon.to_string()),
        is_custom: false,
    }
}

/// The fixed presets every catalog starts from. Code-defined, never
/// persisted, never editable.
pub fn built_in_presets() -> Vec<StylePreset> {
    vec![
        built_in(
            "realistic",
            "Realistic",
            "highly detailed, realistic, 4k, high resolution, professional photography",
            "📸",
        ),
        built_in(
            "anime",
            "Anime",
            "anime style, vibrant colors, Studio Ghibli inspired, detailed illustration",
            "🎨",
        ),
        built_in(
            "digital-art",
            "Digital Art",
            "digital art, highly detailed, vibrant colors, professional illustration",
            "🖼️",
        ),
        built_in(
            "oil-painting",
            "Oil Painting",
            "oil painting, masterpiece, detailed brushstrokes, artistic, professional",
            "🎨",
        ),
        built_in(
            "watercolor",
            "Watercolor",
            "watercolor painting, soft colors, artistic, flowing, professional",
            "💧",
        ),
        built_in(
            "3d-render",
            "3D Render",
            "3D render, octane render, highly detailed, professional 3D modeling",
            "💫",
        ),
    ]
}

pub fn is_built_in_id(id: &str) -> bool {
    matches!(
        id,
        "realistic" | "anime" | "digital-art" | "oil-painting" | "watercolor" | "3d-render"
    )
}

/// Id for a newly created custom preset, in the form the client editor used.
pub fn new_custom_id() -> String {
    format!("custom-{}", Utc::now().timestamp_millis())
}

/// Built-in presets merged with the persisted custom subset. Only customs
/// can be created, edited, or deleted; built-ins are re-derived from code on
/// every load.
pub struct StyleCatalog {
    custom: Vec<StylePreset>,
    store: Arc<dyn StateStore>,
}

impl StyleCatalog {
    /// Reads the custom subset through the store; absent or unparseable
    /// state starts with built-ins only.
    pub fn load(store: Arc<dyn StateStore>) -> Self {
        let custom = match store.load(CUSTOM_STYLES_STORAGE_KEY) {
            Some(value) => match serde_json::from_value::<Vec<StylePreset>>(value) {
                Ok(mut presets) => {
                    for preset in &mut presets {
                        preset.is_custom = true;
                    }
                    presets
                }
                Err(err) => {
                    warn!("Stored custom styles failed to parse, starting empty: {err}");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };
        StyleCatalog { custom, store }
    }

    /// Built-ins first, then customs, the order the client renders.
    pub fn presets(&self) -> Vec<StylePreset> {
        let mut merged = built_in_presets();
        merged.extend(self.custom.iter().cloned());
        merged
    }

    pub fn custom_presets(&self) -> &[StylePreset] {
        &self.custom
    }

    /// Creates or updates a custom preset. A matching custom id is replaced
    /// in place, preserving its position; a new id appends. Built-in ids are
    /// rejected.
    pub fn save(&mut self, mut preset: StylePreset) -> Result<StylePreset, StyleCatalogError> {
        if is_built_in_id(&preset.id) {
            return Err(StyleCatalogError::BuiltIn(preset.id));
        }
        preset.is_custom = true;
        match self.custom.iter_mut().find(|entry| entry.id == preset.id) {
            Some(entry) => *entry = preset.clone(),
            None => self.custom.push(preset.clone()),
        }
        self.persist()?;
        Ok(preset)
    }

    /// Removes a custom preset by id. Built-in and unknown ids are a no-op;
    /// the return value reports whether an entry was removed.
    pub fn delete(&mut self, id: &str) -> Result<bool> {
        if is_built_in_id(id) {
            return Ok(false);
        }
        let before = self.custom.len();
        self.custom.retain(|entry| entry.id != id);
        if self.custom.len() == before {
            return Ok(false);
        }
        self.persist()?;
        Ok(true)
    }

    fn persist(&self) -> Result<()> {
        let value = serde_json::to_value(&self.custom)?;
        self.store.save(CUSTOM_STYLES_STORAGE_KEY, &value)
    }
}

//! Prompt presets: named instruction sets for the rewrite backend.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Immutable preset. Identity is `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptPreset {
    pub id: String,
    pub name: String,
    pub instructions: String,
}

impl PromptPreset {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        instructions: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            instructions: instructions.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PresetError {
    #[error("duplicate preset id '{0}'")]
    DuplicateId(String),

    #[error("preset id must not be empty")]
    EmptyId,

    #[error("unknown preset '{0}'")]
    Unknown(String),
}

/// Presets shipped with the app, in menu order.
pub fn builtin_presets() -> Vec<PromptPreset> {
    vec![
        PromptPreset::new(
            "lowercase-genz",
            "Lowercase Gen Z",
            "rewrite the text in all lowercase in EXTREMELY gen z slang. keep meaning. \
             do not add new facts. make it sound online, casual, and a little chaotic, \
             but still readable. you can use slang like 'fr', 'no cap', 'lowkey', \
             'highkey', 'ngl', 'idk', 'imo', 'literally', 'vibes', 'ate', 'slay', \
             'its giving', 'mid', 'bet', 'ok bestie', 'go off'. do not overdo emoji; \
             at most 1 emoji total.",
        ),
        PromptPreset::new(
            "prompt-writer",
            "Prompt Writer",
            "rewrite the text into a clear, concise prompt with good instructions, \
             constraints, and desired output. keep it natural and easy to paste into an \
             ai chat box.",
        ),
    ]
}

/// Used only when the catalog is somehow empty.
fn fallback_preset() -> PromptPreset {
    PromptPreset::new("default", "Default", "rewrite the text clearly.")
}

/// Validated set of presets: built-ins followed by user presets.
#[derive(Debug, Clone)]
pub struct PresetCatalog {
    presets: Vec<PromptPreset>,
}

impl PresetCatalog {
    /// Builds a catalog, rejecting empty or duplicate ids.
    pub fn new(presets: Vec<PromptPreset>) -> Result<Self, PresetError> {
        let mut seen = std::collections::HashSet::new();
        for preset in &presets {
            if preset.id.trim().is_empty() {
                return Err(PresetError::EmptyId);
            }
            if !seen.insert(preset.id.as_str()) {
                return Err(PresetError::DuplicateId(preset.id.clone()));
            }
        }
        Ok(Self { presets })
    }

    pub fn with_custom(custom: &[PromptPreset]) -> Result<Self, PresetError> {
        let mut presets = builtin_presets();
        presets.extend_from_slice(custom);
        Self::new(presets)
    }

    pub fn presets(&self) -> &[PromptPreset] {
        &self.presets
    }

    pub fn get(&self, id: &str) -> Option<&PromptPreset> {
        self.presets.iter().find(|preset| preset.id == id)
    }

    /// Strict lookup for explicit user choices.
    pub fn require(&self, id: &str) -> Result<&PromptPreset, PresetError> {
        self.get(id).ok_or_else(|| PresetError::Unknown(id.to_string()))
    }

    /// Resolves a persisted selection. Unknown or missing ids fall back to the
    /// first preset.
    pub fn resolve(&self, selected: Option<&str>) -> PromptPreset {
        let found = selected.and_then(|id| {
            let preset = self.get(id);
            if preset.is_none() {
                warn!(preset = id, "Unknown selected preset, using the first one");
            }
            preset
        });
        found
            .or_else(|| self.presets.first())
            .cloned()
            .unwrap_or_else(fallback_preset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_are_valid() {
        let catalog = PresetCatalog::with_custom(&[]).unwrap();
        assert_eq!(catalog.presets().len(), 2);
        assert_eq!(catalog.presets()[0].id, "lowercase-genz");
        assert_eq!(catalog.presets()[1].name, "Prompt Writer");
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let custom = [PromptPreset::new("prompt-writer", "Mine", "do it")];
        assert_eq!(
            PresetCatalog::with_custom(&custom).unwrap_err(),
            PresetError::DuplicateId("prompt-writer".to_string())
        );
    }

    #[test]
    fn test_empty_id_rejected() {
        let custom = [PromptPreset::new("  ", "Blank", "do it")];
        assert_eq!(
            PresetCatalog::with_custom(&custom).unwrap_err(),
            PresetError::EmptyId
        );
    }

    #[test]
    fn test_resolve_falls_back_to_first() {
        let catalog = PresetCatalog::with_custom(&[]).unwrap();
        assert_eq!(catalog.resolve(Some("prompt-writer")).id, "prompt-writer");
        assert_eq!(catalog.resolve(Some("gone")).id, "lowercase-genz");
        assert_eq!(catalog.resolve(None).id, "lowercase-genz");
    }

    #[test]
    fn test_empty_catalog_resolves_to_default() {
        let catalog = PresetCatalog::new(Vec::new()).unwrap();
        let preset = catalog.resolve(Some("anything"));
        assert_eq!(preset.instructions, "rewrite the text clearly.");
    }

    #[test]
    fn test_require_unknown() {
        let catalog = PresetCatalog::with_custom(&[]).unwrap();
        assert!(matches!(catalog.require("nope"), Err(PresetError::Unknown(_))));
    }
}

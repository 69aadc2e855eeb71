//! Recipe catalog
//!
//! Recipes are immutable reference data loaded once at startup, either from
//! the catalog embedded in the binary or from an external JSON file using the
//! same shape: `[{id, title, description, image, steps: [{id, text, prompt?}]}]`.

mod prompt;

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use prompt::{ELLIPSIS, derive_prompt};

use crate::{Error, Result};

/// Catalog compiled into the binary
const EMBEDDED_CATALOG: &str = include_str!("catalog.json");

/// One instruction unit within a recipe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// Sequence position as authored
    pub id: u32,
    /// Full instruction, spoken by the agent and sent as vision context
    pub text: String,
    /// Optional short instruction for the step pill
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

impl Step {
    /// Text shown in the step pill
    ///
    /// Uses the explicit prompt when it has content, otherwise derives one
    /// from the full instruction.
    #[must_use]
    pub fn display_prompt(&self) -> String {
        match self.prompt.as_deref().map(str::trim) {
            Some(prompt) if !prompt.is_empty() => prompt.to_string(),
            _ => derive_prompt(&self.text),
        }
    }
}

/// A recipe with its ordered steps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: String,
    pub title: String,
    pub description: String,
    /// Cover image reference (path or URL)
    pub image: String,
    pub steps: Vec<Step>,
}

/// Read-only, process-wide recipe catalog
#[derive(Debug, Clone)]
pub struct RecipeCatalog {
    recipes: Arc<[Arc<Recipe>]>,
}

impl RecipeCatalog {
    /// Load the catalog compiled into the binary
    ///
    /// # Errors
    ///
    /// Returns error if the embedded catalog fails validation
    pub fn embedded() -> Result<Self> {
        Self::from_json(EMBEDDED_CATALOG)
    }

    /// Load a catalog from an external JSON file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, parsed or validated
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let catalog = Self::from_json(&content)?;
        tracing::info!(path = %path.display(), recipes = catalog.len(), "loaded recipe catalog");
        Ok(catalog)
    }

    /// Load the external catalog when a path is configured, else the embedded one
    ///
    /// # Errors
    ///
    /// Returns error if the selected catalog cannot be loaded
    pub fn load(path: Option<&Path>) -> Result<Self> {
        path.map_or_else(Self::embedded, Self::from_file)
    }

    /// Parse and validate a catalog from JSON
    ///
    /// # Errors
    ///
    /// Returns error on malformed JSON, an empty catalog, duplicate ids or
    /// a recipe without steps
    pub fn from_json(json: &str) -> Result<Self> {
        let recipes: Vec<Recipe> = serde_json::from_str(json)?;
        Self::new(recipes)
    }

    /// Build a catalog from already-parsed recipes
    ///
    /// # Errors
    ///
    /// Returns error on an empty catalog, duplicate ids or a recipe without steps
    pub fn new(recipes: Vec<Recipe>) -> Result<Self> {
        if recipes.is_empty() {
            return Err(Error::Recipe("catalog contains no recipes".to_string()));
        }

        let mut seen = HashSet::new();
        for recipe in &recipes {
            if !seen.insert(recipe.id.as_str()) {
                return Err(Error::Recipe(format!("duplicate recipe id: {}", recipe.id)));
            }
            if recipe.steps.is_empty() {
                return Err(Error::Recipe(format!("recipe has no steps: {}", recipe.id)));
            }
        }

        Ok(Self {
            recipes: recipes.into_iter().map(Arc::new).collect(),
        })
    }

    /// Find a recipe by id
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<Recipe>> {
        self.recipes.iter().find(|r| r.id == id).cloned()
    }

    /// Find a recipe by id, falling back to the first recipe
    #[must_use]
    pub fn resolve(&self, id: &str) -> Arc<Recipe> {
        self.get(id).unwrap_or_else(|| {
            tracing::debug!(recipe_id = %id, "unknown recipe, using first in catalog");
            self.first()
        })
    }

    /// First recipe in catalog order
    #[must_use]
    pub fn first(&self) -> Arc<Recipe> {
        // construction guarantees at least one recipe
        Arc::clone(&self.recipes[0])
    }

    /// Iterate recipes in catalog order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Recipe>> {
        self.recipes.iter()
    }

    /// Number of recipes
    #[must_use]
    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    /// Always false for a constructed catalog
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(id: u32, text: &str, prompt: Option<&str>) -> Step {
        Step {
            id,
            text: text.to_string(),
            prompt: prompt.map(String::from),
        }
    }

    fn recipe(id: &str, steps: Vec<Step>) -> Recipe {
        Recipe {
            id: id.to_string(),
            title: format!("Recipe {id}"),
            description: "test".to_string(),
            image: "/img.png".to_string(),
            steps,
        }
    }

    #[test]
    fn embedded_catalog_is_valid() {
        let catalog = RecipeCatalog::embedded().unwrap();
        assert!(!catalog.is_empty());
        assert!(catalog.iter().all(|r| !r.steps.is_empty()));
    }

    #[test]
    fn display_prompt_prefers_explicit_prompt() {
        let s = step(1, "Slice the cucumber into thin, even rounds.", Some("  Slice thin "));
        assert_eq!(s.display_prompt(), "Slice thin");
    }

    #[test]
    fn display_prompt_derives_when_missing_or_blank() {
        let text = "Dice the onion finely and mince the garlic cloves.";
        let expected = "Dice the onion finely and mince the garlic cloves";
        assert_eq!(step(1, text, None).display_prompt(), expected);
        assert_eq!(step(1, text, Some("   ")).display_prompt(), expected);
    }

    #[test]
    fn rejects_empty_catalog() {
        assert!(matches!(RecipeCatalog::from_json("[]"), Err(Error::Recipe(_))));
    }

    #[test]
    fn rejects_duplicate_ids() {
        let result = RecipeCatalog::new(vec![
            recipe("eggs", vec![step(1, "Whisk", None)]),
            recipe("eggs", vec![step(1, "Whisk", None)]),
        ]);
        assert!(matches!(result, Err(Error::Recipe(msg)) if msg.contains("duplicate")));
    }

    #[test]
    fn rejects_recipe_without_steps() {
        let result = RecipeCatalog::new(vec![recipe("empty", vec![])]);
        assert!(matches!(result, Err(Error::Recipe(msg)) if msg.contains("no steps")));
    }

    #[test]
    fn resolve_falls_back_to_first_recipe() {
        let catalog = RecipeCatalog::new(vec![
            recipe("first", vec![step(1, "One", None)]),
            recipe("second", vec![step(1, "Two", None)]),
        ])
        .unwrap();

        assert_eq!(catalog.resolve("second").id, "second");
        assert_eq!(catalog.resolve("missing").id, "first");
        assert!(catalog.get("missing").is_none());
    }

    #[test]
    fn parses_external_format_with_optional_prompt() {
        let json = r#"[{
            "id": "toast",
            "title": "Toast",
            "description": "Bread, but warmer.",
            "image": "https://example.com/toast.png",
            "steps": [
                {"id": 1, "text": "Put the bread in the toaster.", "prompt": "Load toaster"},
                {"id": 2, "text": "Wait until golden."}
            ]
        }]"#;

        let catalog = RecipeCatalog::from_json(json).unwrap();
        let toast = catalog.get("toast").unwrap();
        assert_eq!(toast.steps.len(), 2);
        assert_eq!(toast.steps[0].prompt.as_deref(), Some("Load toaster"));
        assert!(toast.steps[1].prompt.is_none());
    }

    #[test]
    fn from_file_reads_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recipes.json");
        std::fs::write(
            &path,
            r#"[{"id":"tea","title":"Tea","description":"Hot.","image":"/tea.png","steps":[{"id":1,"text":"Boil water."}]}]"#,
        )
        .unwrap();

        let catalog = RecipeCatalog::load(Some(&path)).unwrap();
        assert_eq!(catalog.first().id, "tea");
    }
}

// src/recipe/mod.rs — Static recipe catalog

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::core::ports::RecipeCatalog;

const EMBEDDED_CATALOG: &str = include_str!("recipes.json");

/// An ordered list of step texts. Step numbers are 1-based everywhere
/// outside this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: String,
    pub title: String,
    pub steps: Vec<String>,
}

impl Recipe {
    /// Step count used for progression. A recipe with no steps still has one
    /// (empty) step so a session always has somewhere to stand.
    pub fn total_steps(&self) -> u32 {
        (self.steps.len() as u32).max(1)
    }

    /// Clamp a stored step number into `1..=total_steps()`.
    pub fn clamp_step(&self, step: i64) -> u32 {
        step.clamp(1, self.total_steps() as i64) as u32
    }

    /// Text of a 1-based step, clamped. Empty when the recipe has no steps.
    pub fn step_text(&self, step: u32) -> &str {
        let idx = self.clamp_step(step as i64) as usize - 1;
        self.steps.get(idx).map(String::as_str).unwrap_or("")
    }
}

/// Recipes loaded once at startup, looked up by id.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    recipes: Vec<Recipe>,
    by_id: HashMap<String, usize>,
}

impl Catalog {
    /// A repeated id replaces the earlier recipe in place.
    pub fn from_recipes(recipes: Vec<Recipe>) -> Self {
        let mut catalog = Self {
            recipes: Vec::with_capacity(recipes.len()),
            by_id: HashMap::with_capacity(recipes.len()),
        };
        for r in recipes {
            match catalog.by_id.get(&r.id) {
                Some(&i) => {
                    tracing::warn!("Duplicate recipe id '{}'; later entry wins", r.id);
                    catalog.recipes[i] = r;
                }
                None => {
                    catalog.by_id.insert(r.id.clone(), catalog.recipes.len());
                    catalog.recipes.push(r);
                }
            }
        }
        catalog
    }

    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let recipes: Vec<Recipe> = serde_json::from_str(json)?;
        Ok(Self::from_recipes(recipes))
    }

    /// The catalog compiled into the binary.
    pub fn embedded() -> anyhow::Result<Self> {
        Self::from_json(EMBEDDED_CATALOG)
    }

    /// Load from a JSON file, or the embedded catalog when no path is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(p) => {
                let content = std::fs::read_to_string(p)?;
                let catalog = Self::from_json(&content)?;
                tracing::info!("Loaded {} recipe(s) from {}", catalog.len(), p.display());
                Ok(catalog)
            }
            None => Self::embedded(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Recipe> {
        self.by_id.get(id).map(|&i| &self.recipes[i])
    }

    pub fn list(&self) -> &[Recipe] {
        &self.recipes
    }

    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }
}

impl RecipeCatalog for Catalog {
    fn get_recipe(&self, id: &str) -> Option<Recipe> {
        self.get(id).cloned()
    }
}

// src/cli/recipes.rs — Catalog listing

use crate::recipe::Catalog;

pub fn list_recipes(catalog: &Catalog) {
    if catalog.is_empty() {
        println!("No recipes in the catalog.");
        return;
    }

    let width = catalog
        .list()
        .iter()
        .map(|r| r.id.len())
        .max()
        .unwrap_or(0);

    for recipe in catalog.list() {
        println!(
            "  {:<width$}  {} ({} steps)",
            recipe.id,
            recipe.title,
            recipe.steps.len(),
        );
    }
}

// src/cli/transcript.rs — Print a stored session, step by step

use std::path::Path;

use crate::memory::Store;
use crate::recipe::Catalog;

pub async fn show_transcript(
    db_path: &Path,
    catalog: &Catalog,
    session_id: &str,
) -> anyhow::Result<()> {
    if !db_path.exists() {
        anyhow::bail!("No database found at: {}", db_path.display());
    }
    let store = Store::open(db_path)?;

    let session = store
        .get_session(session_id)?
        .ok_or_else(|| anyhow::anyhow!("Session '{session_id}' not found"))?;
    let recipe = catalog.get(&session.recipe_id);

    let title = recipe.map_or(session.recipe_id.as_str(), |r| r.title.as_str());
    println!("{title}  [{}]", session.id);
    println!("  user:    {}", session.user_id);
    println!("  started: {}", session.started_at.format("%Y-%m-%d %H:%M:%S"));
    match session.ended_at {
        Some(ended) => println!("  ended:   {}", ended.format("%Y-%m-%d %H:%M:%S")),
        None => println!("  ended:   (in progress, step {})", session.current_step),
    }

    let mut current_step = None;
    for turn in store.list_transcript(session_id)? {
        if current_step != Some(turn.step_id) {
            current_step = Some(turn.step_id);
            let text = recipe
                .map(|r| r.step_text(turn.step_id))
                .unwrap_or_default();
            println!();
            println!("Step {}: {text}", turn.step_id);
        }
        println!(
            "  {} {:>5}: {}",
            turn.created_at.format("%H:%M:%S"),
            turn.role,
            turn.text
        );
    }

    Ok(())
}

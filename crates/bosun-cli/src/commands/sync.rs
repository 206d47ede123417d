//! Sync command - reconcile repositories, then releases

use console::style;

use super::Session;
use crate::display::Progress;
use crate::error::Result;

/// Run the sync command
pub fn run(session: &Session) -> Result<()> {
    let mut progress = Progress::default();

    session.sync_repositories(&mut progress)?;
    let outcomes = session
        .releases()
        .sync(&session.config.charts, &mut progress)?;

    let changed = outcomes.iter().filter(|o| o.is_mutation()).count();
    eprintln!(
        "\n{} {} release(s) reconciled, {} changed",
        style("✓").green().bold(),
        outcomes.len(),
        changed
    );
    Ok(())
}

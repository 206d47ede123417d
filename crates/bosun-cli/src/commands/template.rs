//! Template command - render every present release locally

use super::Session;
use crate::display::Progress;
use crate::error::Result;

/// Run the template command
///
/// Repositories are synchronized first so chart references resolve.
pub fn run(session: &Session) -> Result<()> {
    let mut progress = Progress::default();

    session.sync_repositories(&mut progress)?;
    session
        .releases()
        .template(&session.config.charts, &mut progress)?;

    progress.finish_template();
    Ok(())
}

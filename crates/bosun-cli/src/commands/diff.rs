//! Diff command - preview upgrades through the helm-diff plugin

use super::Session;
use crate::display::Progress;
use crate::error::Result;

/// Run the diff command
pub fn run(session: &Session) -> Result<()> {
    session
        .releases()
        .diff(&session.config.charts, Progress::default())?;
    Ok(())
}

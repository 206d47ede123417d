//! Status command - show the helm status of every release

use super::Session;
use crate::display::Progress;
use crate::error::Result;

/// Run the status command
pub fn run(session: &Session) -> Result<()> {
    session
        .releases()
        .status(&session.config.charts, Progress::default())?;
    Ok(())
}

//! Information link
//!
//! The only outbound action: open an article about daily step targets in
//! the system browser. Nothing is read back.

use crate::error::TrackerError;
use std::process::Command;
use tracing::info;

/// Article opened by the info action
pub const INFO_URL: &str = "https://www.nationalgeographic.es/ciencia/2024/03/10-000-pasos-diarios-necesidad-real-explicacion-cientifica";

/// Opens URLs outside the tracker
pub trait LinkOpener {
    fn open(&self, url: &str) -> Result<(), TrackerError>;
}

/// Opens URLs with the platform's default browser
pub struct SystemBrowser;

impl SystemBrowser {
    fn command(url: &str) -> Command {
        if cfg!(target_os = "macos") {
            let mut cmd = Command::new("open");
            cmd.arg(url);
            cmd
        } else if cfg!(target_os = "windows") {
            let mut cmd = Command::new("cmd");
            cmd.args(["/C", "start", "", url]);
            cmd
        } else {
            let mut cmd = Command::new("xdg-open");
            cmd.arg(url);
            cmd
        }
    }
}

impl LinkOpener for SystemBrowser {
    fn open(&self, url: &str) -> Result<(), TrackerError> {
        let status = Self::command(url)
            .status()
            .map_err(|e| TrackerError::LinkError(e.to_string()))?;
        if !status.success() {
            return Err(TrackerError::LinkError(format!(
                "browser launcher exited with {}",
                status
            )));
        }
        Ok(())
    }
}

/// Open the information page with the given opener
pub fn open_info_link(opener: &dyn LinkOpener, url: &str) -> Result<(), TrackerError> {
    if !url.starts_with("https://") && !url.starts_with("http://") {
        return Err(TrackerError::LinkError(format!("not a web URL: {}", url)));
    }
    info!(url, "Opening info link");
    opener.open(url)
}

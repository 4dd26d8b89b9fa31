//! Flashing and running on a board through `probe-rs`.

use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result, bail};

/// Chip name as known to `probe-rs`.
pub const CHIP: &str = "STM32F072RBTx";

/// Flash `elf`, reset and stream its defmt logs until interrupted.
///
/// `probe-rs` decodes the RTT channel itself with the ELF's defmt table.
pub fn run(elf: &Path, probe: Option<&str>) -> Result<()> {
    let mut cmd = Command::new("probe-rs");
    cmd.arg("run").arg("--chip").arg(CHIP);

    if let Some(probe) = probe {
        cmd.arg("--probe").arg(probe);
    }

    let status = cmd
        .arg(elf)
        .status()
        .context("Failed to run probe-rs, is it installed?")?;

    if !status.success() {
        bail!("probe-rs exited with {status}");
    }
    Ok(())
}

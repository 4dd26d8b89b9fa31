//! Building the firmware binaries and running the host tests.

use std::fs;
use std::path::PathBuf;
use std::process::Command;

use anyhow::{Context, Result, bail};

/// Cortex-M0 target of the STM32F072.
pub const TARGET: &str = "thumbv6m-none-eabi";

/// Get the project root directory.
pub fn project_root() -> PathBuf {
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| std::env::current_dir().unwrap());

    // If we're in xtask/, go up one level.
    if manifest_dir.ends_with("xtask") {
        manifest_dir.parent().unwrap().to_path_buf()
    } else {
        manifest_dir
    }
}

/// Path of the ELF cargo produces for `variant`.
pub fn elf_path(variant: &str, release: bool) -> PathBuf {
    let profile = if release { "release" } else { "debug" };
    project_root()
        .join("target")
        .join(TARGET)
        .join(profile)
        .join("examples")
        .join(variant)
}

/// Build a firmware variant and return the path to the ELF.
pub fn build_variant(variant: &str, release: bool) -> Result<PathBuf> {
    let root = project_root();

    let mut cmd = Command::new("cargo");
    cmd.current_dir(root.join("firmware"))
        .env("DEFMT_LOG", "debug")
        .arg("build")
        .arg("--example")
        .arg(variant)
        .arg("--target")
        .arg(TARGET);

    if release {
        cmd.arg("--release");
    }

    let status = cmd.status().context("Failed to run cargo build")?;

    if !status.success() {
        bail!("cargo build of '{variant}' failed");
    }

    Ok(elf_path(variant, release))
}

/// Discover all firmware variants.
pub fn discover_variants() -> Result<Vec<String>> {
    let root = project_root();
    let examples_dir = root.join("firmware").join("examples");

    let mut variants = Vec::new();
    for entry in fs::read_dir(&examples_dir).context("Failed to read firmware examples")? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "rs") {
            if let Some(stem) = path.file_stem() {
                variants.push(stem.to_string_lossy().into_owned());
            }
        }
    }
    variants.sort();
    Ok(variants)
}

/// Run the library's unit tests on the host.
pub fn host_tests(filter: Option<&str>) -> Result<()> {
    let mut cmd = Command::new("cargo");
    cmd.current_dir(project_root())
        .arg("test")
        .arg("--package")
        .arg("dma-echo");

    if let Some(filter) = filter {
        cmd.arg("--").arg(filter);
    }

    let status = cmd.status().context("Failed to run cargo test")?;

    if !status.success() {
        bail!("host tests failed");
    }
    Ok(())
}

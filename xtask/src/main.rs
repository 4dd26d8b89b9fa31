mod build;
mod defmt;
mod probe;

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "xtask", about = "Build, flash and test tasks for dma-echo")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build firmware variants for the STM32F072
    Build {
        /// Only build this variant
        variant: Option<String>,

        /// Build in release mode
        #[arg(long)]
        release: bool,
    },

    /// Flash a variant and stream its logs via probe-rs
    Run {
        /// Name of the variant to run
        variant: String,

        /// Build in release mode
        #[arg(long)]
        release: bool,

        /// Probe selector passed to probe-rs
        #[arg(long)]
        probe: Option<String>,
    },

    /// Run the host tests and build every firmware variant
    Test {
        /// Only run host tests matching this filter
        filter: Option<String>,
    },

    /// Decode a raw defmt capture against a variant's ELF
    Decode {
        /// Name of the variant that produced the capture
        variant: String,

        /// File holding the raw frames
        capture: PathBuf,

        /// The capture came from a release build
        #[arg(long)]
        release: bool,
    },
}

fn select_variants(only: Option<String>) -> Result<Vec<String>> {
    let variants = build::discover_variants()?;
    let variants: Vec<_> = match only {
        Some(v) => variants.into_iter().filter(|name| *name == v).collect(),
        None => variants,
    };

    if variants.is_empty() {
        bail!("No firmware variants found");
    }
    Ok(variants)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { variant, release } => {
            for variant in select_variants(variant)? {
                println!("Building '{variant}'...");
                let elf = build::build_variant(&variant, release)?;
                println!("  {}", elf.display());
            }
        }

        Commands::Run {
            variant,
            release,
            probe,
        } => {
            println!("Building '{variant}'...");
            let elf = build::build_variant(&variant, release)?;
            println!("Flashing {}...", probe::CHIP);
            probe::run(&elf, probe.as_deref())?;
        }

        Commands::Test { filter } => {
            println!("=== Host tests ===");
            build::host_tests(filter.as_deref())?;

            let mut passed = 0;
            let mut failed = 0;

            for variant in select_variants(None)? {
                println!("\n=== Firmware: {variant} ===");
                match build::build_variant(&variant, false) {
                    Ok(_) => {
                        println!("  PASS");
                        passed += 1;
                    }
                    Err(e) => {
                        println!("  ERROR: {e}");
                        failed += 1;
                    }
                }
            }

            println!("\n=== Summary ===");
            println!("{passed} passed, {failed} failed");

            if failed > 0 {
                bail!("{failed} firmware build(s) failed");
            }
        }

        Commands::Decode {
            variant,
            capture,
            release,
        } => {
            let elf = build::elf_path(&variant, release);
            if !elf.exists() {
                bail!(
                    "{} does not exist, run `cargo xtask build {variant}` first",
                    elf.display()
                );
            }
            let raw = fs::read(&capture)
                .with_context(|| format!("Failed to read {}", capture.display()))?;
            print!("{}", defmt::decode_output(&elf, &raw)?);
        }
    }

    Ok(())
}

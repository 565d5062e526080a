use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ToolchainError {
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cargo build failed with {0}")]
    Build(ExitStatus),
    #[error("generated program failed with {0}")]
    Program(ExitStatus),
}

fn profile(release: bool) -> &'static str {
    if release { "release" } else { "debug" }
}

/// Path of the binary `cargo build` produces for the generated crate.
pub fn binary_path(out_dir: &Path, package_name: &str, release: bool) -> PathBuf {
    out_dir
        .join("target")
        .join(profile(release))
        .join(format!("{package_name}{}", std::env::consts::EXE_SUFFIX))
}

pub fn cargo_build(cargo: &str, out_dir: &Path, release: bool) -> Result<(), ToolchainError> {
    let manifest = out_dir.join("Cargo.toml");
    info!(
        event = "build_started",
        manifest = %manifest.display(),
        profile = profile(release),
        "building generated program"
    );

    let mut command = Command::new(cargo);
    command.arg("build").arg("--manifest-path").arg(&manifest);
    if release {
        command.arg("--release");
    }
    let status = command.status().map_err(|source| ToolchainError::Spawn {
        program: cargo.to_string(),
        source,
    })?;
    if !status.success() {
        return Err(ToolchainError::Build(status));
    }
    Ok(())
}

/// Run the built program with inherited stdio, so its output reaches the user directly.
pub fn run_program(binary: &Path, args: &[String]) -> Result<(), ToolchainError> {
    info!(binary = %binary.display(), args = ?args, "running generated program");
    let status = Command::new(binary)
        .args(args)
        .status()
        .map_err(|source| ToolchainError::Spawn {
            program: binary.display().to_string(),
            source,
        })?;
    if !status.success() {
        return Err(ToolchainError::Program(status));
    }
    Ok(())
}

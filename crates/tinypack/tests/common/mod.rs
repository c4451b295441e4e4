#![allow(dead_code)]

use std::{
    fs,
    path::{Path, PathBuf},
    process::Command,
};

use anyhow::{Context, Result, bail};

/// Whether a `node` binary can run bundles on this machine. When it cannot,
/// a skip notice naming `test` goes to stderr.
#[allow(clippy::print_stderr)]
pub fn node_available(test: &str) -> bool {
    let available = Command::new("node")
        .arg("--version")
        .output()
        .is_ok_and(|output| output.status.success());
    if !available {
        eprintln!("skipping bundle execution in `{test}`: node is not on PATH");
    }
    available
}

/// Run a script with node and return its stdout
pub fn run_node(script: &Path) -> Result<String> {
    let output = Command::new("node")
        .arg(script)
        .output()
        .with_context(|| format!("failed to run node on {}", script.display()))?;
    if !output.status.success() {
        bail!(
            "node exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr)
        );
    }
    Ok(String::from_utf8(output.stdout)?)
}

/// Write `files` (relative path, contents) under `root`
pub fn write_project(root: &Path, files: &[(&str, &str)]) -> Result<()> {
    for (relative, contents) in files {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
    }
    Ok(())
}

/// Canonical form of a temp path, the form the file index reports
pub fn canonical(path: &Path) -> Result<PathBuf> {
    Ok(path.canonicalize()?)
}

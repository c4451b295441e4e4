use std::{
    io::Write,
    path::{Component, Path, PathBuf},
    process::{Command, Stdio},
    thread,
};

use anyhow::{Context, Result, bail};

/// Lexically normalize a path: drop `.` segments and fold `..` into the
/// preceding component. Does not touch the file system and does not follow
/// symlinks; `..` at the root stays at the root.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(prefix) => normalized.push(prefix.as_os_str()),
            Component::RootDir => normalized.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() && !normalized.has_root() {
                    normalized.push("..");
                }
            }
            Component::Normal(part) => normalized.push(part),
        }
    }
    normalized
}

/// Make `path` absolute against the current working directory, then normalize it
pub fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return normalize_path(path);
    }
    match std::env::current_dir() {
        Ok(cwd) => normalize_path(&cwd.join(path)),
        Err(e) => {
            log::warn!("Cannot determine working directory: {e}");
            normalize_path(path)
        }
    }
}

/// Run an external filter: `input` goes to stdin, stdout comes back as the result.
///
/// `command[0]` is the program, the rest are its arguments. A non-zero exit
/// status is an error carrying the trimmed stderr.
pub fn run_filter(command: &[String], input: &str) -> Result<String> {
    let Some((program, args)) = command.split_first() else {
        bail!("empty command");
    };

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("failed to start '{program}'"))?;

    // stdin is fed from its own thread while stdout drains here
    let mut stdin = child
        .stdin
        .take()
        .context("child stdin was not captured")?;
    let input = input.to_owned();
    let writer = thread::spawn(move || stdin.write_all(input.as_bytes()));

    let output = child
        .wait_with_output()
        .with_context(|| format!("failed to wait for '{program}'"))?;
    match writer.join() {
        Ok(Ok(())) => {}
        // The filter may exit early on bad input; its status explains why
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
        Ok(Err(e)) => return Err(e).with_context(|| format!("failed to write to '{program}'")),
        Err(_) => bail!("stdin writer for '{program}' panicked"),
    }

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("'{program}' exited with {}: {}", output.status, stderr.trim());
    }
    String::from_utf8(output.stdout).with_context(|| format!("'{program}' printed invalid UTF-8"))
}

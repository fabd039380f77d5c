//! Sandbox-rooted path resolution.
//!
//! Canonicalizes a candidate path against a root directory and proves
//! containment even in the presence of symlinks or not-yet-existing leaves.
//! Everything in this crate that touches the filesystem goes through here.
//!
//! Two modes, one primitive:
//! - `must_exist = true`: the leaf itself is canonicalized and re-checked,
//!   which defeats a symlink planted inside the sandbox pointing outside it.
//! - `must_exist = false` (the caller is about to create the path): only the
//!   parent directory is canonicalized and re-checked, and the final path is
//!   rebuilt as `parent_real/<basename>`.
//!
//! A containment violation is reported as [`OpsError::SandboxEscape`]
//! (code `denied`), never coerced back into the root — callers may treat it
//! as a security event.

use std::path::{Component, Path, PathBuf};

use tokio::fs;

use crate::error::OpsError;

/// Resolve `candidate` against `root_dir` and prove the result stays inside.
///
/// With no candidate (or an empty one) the canonicalized root itself is
/// returned. Absolute candidates are taken as-is and still containment
/// checked; relative candidates are joined onto the canonicalized root.
pub async fn resolve_in_root(
    root_dir: &Path,
    candidate: Option<&str>,
    must_exist: bool,
) -> Result<PathBuf, OpsError> {
    if root_dir.as_os_str().is_empty() {
        return Err(OpsError::invalid(
            "root",
            "sandbox root must be a non-empty path",
        ));
    }
    let root_real = canonicalize(root_dir).await?;

    let candidate = match candidate {
        Some(c) if !c.is_empty() => c,
        _ => return Ok(root_real),
    };

    // Joining an absolute candidate replaces the root; containment is
    // enforced below either way.
    let joined = root_real.join(candidate);
    let resolved = normalize_lexical(&joined, candidate)?;
    ensure_contained(&root_real, &resolved, candidate)?;

    if must_exist {
        let real = canonicalize(&resolved).await?;
        ensure_contained(&root_real, &real, candidate)?;
        return Ok(real);
    }

    if resolved == root_real {
        return Ok(root_real);
    }

    let file_name = resolved
        .file_name()
        .map(|n| n.to_os_string())
        .ok_or_else(|| OpsError::invalid("path", "candidate has no final component"))?;
    let parent = resolved.parent().unwrap_or(&root_real);
    let parent_real = canonicalize(parent).await?;
    ensure_contained(&root_real, &parent_real, candidate)?;

    let rebuilt = parent_real.join(file_name);
    ensure_contained(&root_real, &rebuilt, candidate)?;
    Ok(rebuilt)
}

/// Does `path` exist inside `root`? Any resolution failure — missing file,
/// missing root, sandbox escape — reads as "does not exist".
pub async fn exists_in_root(root: &Path, path: &str) -> bool {
    resolve_in_root(root, Some(path), true).await.is_ok()
}

async fn canonicalize(path: &Path) -> Result<PathBuf, OpsError> {
    fs::canonicalize(path).await.map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            OpsError::PathNotFound {
                path: path.display().to_string(),
            }
        } else {
            OpsError::Io(err)
        }
    })
}

/// Resolve `.` and `..` components without touching the filesystem.
/// `..` that pops past the filesystem root is a traversal attempt.
fn normalize_lexical(path: &Path, candidate: &str) -> Result<PathBuf, OpsError> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(prefix) => out.push(prefix.as_os_str()),
            Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    return Err(OpsError::SandboxEscape {
                        path: candidate.to_string(),
                    });
                }
            }
            Component::Normal(value) => out.push(value),
        }
    }
    Ok(out)
}

fn ensure_contained(root: &Path, path: &Path, candidate: &str) -> Result<(), OpsError> {
    // Component-wise prefix check: `/root-evil` does not count as being
    // under `/root`.
    if path == root || path.starts_with(root) {
        return Ok(());
    }
    tracing::warn!(
        candidate,
        root = %root.display(),
        resolved = %path.display(),
        "path escapes sandbox root"
    );
    Err(OpsError::SandboxEscape {
        path: candidate.to_string(),
    })
}

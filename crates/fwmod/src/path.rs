//! Local directory computation
//!
//! Remote modules live under a shared libs directory, one directory per
//! name and version so several versions of one module can coexist. Local
//! modules resolve to their own absolute location.

use crate::descriptor::{ModuleDescriptor, ModuleKind, DEFAULT_REFERENCE};
use crate::error::{ModuleError, Result};
use std::path::{Component, Path, PathBuf};

/// Placeholder substituted by the version in a suffix template
pub const VERSION_PLACEHOLDER: &str = "${version}";

/// Template used when the descriptor does not provide one
pub const DEFAULT_SUFFIX_TEMPLATE: &str = "-${version}";

/// Suffix appended to a module's directory name for the given reference
///
/// The default template yields no suffix for `master`; a custom template is
/// always applied.
pub fn version_suffix(reference: &str, template: &str) -> String {
    let template = if template.is_empty() {
        if reference == DEFAULT_REFERENCE {
            return String::new();
        }
        DEFAULT_SUFFIX_TEMPLATE
    } else {
        template
    };

    template.replace(VERSION_PLACEHOLDER, &sanitize_component(reference))
}

/// Replace characters that would split a reference across path components
fn sanitize_component(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c => c,
        })
        .collect()
}

/// Name of the directory holding a remote module at `reference`
pub fn git_dir_name(name: &str, reference: &str, template: &str) -> String {
    format!("{}{}", name, version_suffix(reference, template))
}

/// Deterministic local directory of a module
pub fn local_dir(d: &ModuleDescriptor, libs_dir: &Path, default_version: &str) -> Result<PathBuf> {
    match d.kind() {
        ModuleKind::RemoteRepo => {
            let name = d.name()?;
            let reference = d.resolved_reference(default_version);
            Ok(libs_dir.join(git_dir_name(&name, &reference, &d.suffix_template)))
        }
        ModuleKind::Local => {
            if !d.location.is_empty() {
                absolute(Path::new(&d.location)).map_err(|e| ModuleError::InvalidLocation {
                    location: d.location.clone(),
                    reason: e.to_string(),
                })
            } else if !d.name.is_empty() {
                Ok(libs_dir.join(d.name()?))
            } else {
                Err(ModuleError::InvalidDescriptor(
                    "neither name nor location is specified".to_string(),
                ))
            }
        }
        ModuleKind::Invalid => Err(ModuleError::InvalidDescriptor(format!(
            "illegal module kind: {}",
            d.kind()
        ))),
    }
}

/// Absolute form of `path`, without requiring it to exist
pub fn absolute(path: &Path) -> std::io::Result<PathBuf> {
    if path.is_absolute() {
        return Ok(normalize(path));
    }
    Ok(normalize(&std::env::current_dir()?.join(path)))
}

/// Lexically normalize a path, dropping `.` and resolving `..`
pub fn normalize(path: &Path) -> PathBuf {
    let mut components = Vec::new();

    for component in path.components() {
        match component {
            Component::ParentDir => {
                if matches!(components.last(), Some(Component::Normal(_))) {
                    components.pop();
                }
            }
            Component::CurDir => {}
            _ => components.push(component),
        }
    }

    components.iter().collect()
}

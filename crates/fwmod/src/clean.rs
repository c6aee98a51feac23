//! Whether a module's local copy may be updated

use crate::descriptor::{ModuleDescriptor, ModuleKind};
use crate::error::{ModuleError, Result};
use crate::path::local_dir;
use crate::vcs::Vcs;
use std::io::ErrorKind;
use std::path::Path;

/// Whether the local copy of `d` is clean
///
/// A missing copy of a remote module is reported as not clean, so callers
/// always materialize it. Local modules are never clean: they are edited
/// outside of this tool and cannot be fetched by anyone else.
pub fn is_clean(
    d: &ModuleDescriptor,
    libs_dir: &Path,
    default_version: &str,
    vcs: &dyn Vcs,
) -> Result<bool> {
    match d.kind() {
        ModuleKind::RemoteRepo => {
            let dir = local_dir(d, libs_dir, default_version)?;

            match std::fs::metadata(&dir) {
                Ok(_) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
                Err(e) => return Err(ModuleError::io("stat", dir, e)),
            }

            Ok(vcs.is_clean(&dir, &d.resolved_reference(default_version))?)
        }
        ModuleKind::Local => Ok(false),
        ModuleKind::Invalid => Err(ModuleError::InvalidDescriptor(format!(
            "wrong module kind: {}",
            d.kind()
        ))),
    }
}

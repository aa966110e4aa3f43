//! Scratch directories for tests that touch real region files.

use std::ops::Deref;
use std::path::Path;

use tempfile::TempDir;

/// Deleted together with its contents when dropped.
pub struct Scratch {
    dir: TempDir,
}

impl Deref for Scratch {
    type Target = Path;

    fn deref(&self) -> &Path {
        self.dir.path()
    }
}

pub fn scratch_dir(label: &str) -> Scratch {
    let dir = tempfile::Builder::new()
        .prefix(&format!("region-shift-{label}-"))
        .tempdir()
        .expect("create scratch dir");
    Scratch { dir }
}

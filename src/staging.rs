use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Local;

static STAGE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A submission's source persisted for the worker to read
///
/// The file is removed exactly once: by [`StagedArtifact::cleanup`] or, on
/// any other exit path, when the artifact is dropped.
#[derive(Debug)]
pub struct StagedArtifact {
    path: PathBuf,
    removed: bool,
}

impl StagedArtifact {
    /// Writes `source` to a fresh, uniquely named file under `dir`
    ///
    /// The file is created with `create_new`, so an unlikely name collision
    /// fails instead of overwriting another request's submission.
    pub fn stage(dir: &Path, problem_id: &str, source: &str) -> std::io::Result<Self> {
        fs::create_dir_all(dir)?;

        let path = dir.join(format!(
            "Program{}_{}.py",
            sanitize(problem_id),
            unique_suffix()
        ));
        let mut file = OpenOptions::new().write(true).create_new(true).open(&path)?;

        let artifact = Self {
            path,
            removed: false,
        };
        file.write_all(source.as_bytes())?;
        file.flush()?;

        log::debug!("Staged submission at {}", artifact.path.display());
        Ok(artifact)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn cleanup(mut self) -> std::io::Result<()> {
        self.removed = true;
        fs::remove_file(&self.path)
    }
}

impl Drop for StagedArtifact {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        self.removed = true;
        if let Err(e) = fs::remove_file(&self.path) {
            log::warn!("Unable to remove staged submission {}: {e}", self.path.display());
        }
    }
}

/// Timestamp, sub-second clock, process-wide counter and a random component
pub fn unique_suffix() -> String {
    let now = Local::now();
    format!(
        "{}_{:09}_{}_{:08x}",
        now.format("%Y%m%d%H%M%S"),
        now.timestamp_subsec_nanos(),
        STAGE_COUNTER.fetch_add(1, Ordering::Relaxed),
        fastrand::u32(..)
    )
}

fn sanitize(problem_id: &str) -> String {
    problem_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

// Common test utilities for engine integration tests

use savelite::{Persistence, Settings};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Test fixture that owns a temporary persistence root
pub struct SaveFixture {
    #[allow(dead_code)]
    pub temp_dir: TempDir,
    pub root: PathBuf,
}

impl SaveFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let root = temp_dir.path().join("testing");

        Self { temp_dir, root }
    }

    /// Settings rooted in this fixture with the default profile and file name
    pub fn settings(&self) -> Settings {
        Settings::new()
            .with_root(&self.root)
            .with_file_name("save-game")
            .with_kdf_iterations(1_000)
            .with_worker_threads(2)
    }

    pub fn engine(&self) -> Persistence {
        self.engine_with(self.settings())
    }

    pub fn engine_with(&self, settings: Settings) -> Persistence {
        Persistence::new(settings).expect("Failed to create engine")
    }

    pub fn profile_dir(&self) -> PathBuf {
        self.root.join("default")
    }

    pub fn primary_path(&self) -> PathBuf {
        self.profile_dir().join("save-game.dat")
    }

    pub fn backup_path(&self, index: usize) -> PathBuf {
        self.profile_dir().join(format!("save-game.bkp.{}", index))
    }

    #[allow(dead_code)]
    pub fn list_files(&self) -> Vec<String> {
        let mut names: Vec<String> = match fs::read_dir(self.profile_dir()) {
            Ok(entries) => entries
                .filter_map(|entry| {
                    entry
                        .ok()
                        .and_then(|e| e.file_name().to_str().map(String::from))
                })
                .collect(),
            Err(_) => Vec::new(),
        };
        names.sort();
        names
    }
}

impl Default for SaveFixture {
    fn default() -> Self {
        Self::new()
    }
}

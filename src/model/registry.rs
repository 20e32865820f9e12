use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{
    model::config::{BundleConfig, DEFAULT_MODEL_TYPE},
    types::ModelBundle,
};

const CONFIG_EXTS: &[&str] = &["yaml"];
const CHECKPOINT_EXTS: &[&str] = &["ckpt", "chpt"];

/// Model bundles found under one directory, sorted by name.
#[derive(Clone, Debug, Default)]
pub struct ModelRegistry {
    bundles: Vec<ModelBundle>,
}

impl ModelRegistry {
    pub fn discover<P: AsRef<Path>>(root: P) -> Self {
        Self {
            bundles: discover(root.as_ref()),
        }
    }

    pub fn from_bundles(mut bundles: Vec<ModelBundle>) -> Self {
        bundles.sort_by(|a, b| a.name.cmp(&b.name));
        Self { bundles }
    }

    pub fn bundles(&self) -> &[ModelBundle] {
        &self.bundles
    }

    pub fn find(&self, name: &str) -> Option<&ModelBundle> {
        self.bundles.iter().find(|b| b.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }
}

/// Scans the immediate subdirectories of `root` for model bundles.
///
/// A subdirectory qualifies when it holds at least one config and one
/// checkpoint file. A missing `root` yields no bundles; a config that fails
/// to parse yields a bundle with no stems and the default model type.
pub fn discover(root: &Path) -> Vec<ModelBundle> {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("no model bundles under {}: {e}", root.display());
            return Vec::new();
        }
    };

    let mut dirs: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();

    dirs.iter().filter_map(|d| inspect_dir(d)).collect()
}

fn inspect_dir(dir: &Path) -> Option<ModelBundle> {
    let config_path = first_with_ext(dir, CONFIG_EXTS)?;
    let checkpoint_path = first_with_ext(dir, CHECKPOINT_EXTS)?;
    let name = dir.file_name()?.to_string_lossy().into_owned();

    let (stems, model_type) = match BundleConfig::load(&config_path) {
        Ok(cfg) => (cfg.stems(), cfg.model_type()),
        Err(e) => {
            log::warn!("failed to parse {}: {e}", config_path.display());
            (Vec::new(), DEFAULT_MODEL_TYPE.to_string())
        }
    };

    Some(ModelBundle {
        name,
        dir: dir.to_path_buf(),
        stems,
        model_type,
        config_path,
        checkpoint_path,
    })
}

/// Lexicographically first file in `dir` with one of `exts`.
fn first_with_ext(dir: &Path, exts: &[&str]) -> Option<PathBuf> {
    let mut matches: Vec<PathBuf> = fs::read_dir(dir)
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| exts.contains(&e))
        })
        .collect();
    matches.sort();
    matches.into_iter().next()
}

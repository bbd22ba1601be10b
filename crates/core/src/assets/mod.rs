use std::{
    collections::HashSet,
    env,
    path::{Path, PathBuf},
};

use crate::effects::{EffectChannel, EffectLevel};

/// Environment variable that overrides where bundled resources are looked up.
pub const RESOURCES_ENV: &str = "PHOSPHOR_RESOURCES";

/// Maps an effect channel at a given level to a shader asset on disk.
///
/// Implementations return `None` when no asset exists; the caller drops the
/// stage in that case.
pub trait ShaderAssetResolver: Send + Sync {
    fn resolve(&self, channel: EffectChannel, level: EffectLevel) -> Option<PathBuf>;
}

/// File name of the pre-rendered shader for `channel` at `level`.
pub fn shader_file_name(channel: EffectChannel, level: EffectLevel) -> String {
    format!("{}_{}.glsl", channel.asset_stem(), level)
}

/// Locates the bundled resource directory.
///
/// Lookup order: [`RESOURCES_ENV`], `resources/` beside the executable (or
/// `Contents/Resources/resources` inside a macOS bundle), then `./resources`.
pub fn resource_root() -> PathBuf {
    if let Some(root) = env::var_os(RESOURCES_ENV) {
        return PathBuf::from(root);
    }

    if let Some(exe_dir) = env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        let candidate = if cfg!(target_os = "macos") {
            exe_dir.join("..").join("Resources").join("resources")
        } else {
            exe_dir.join("resources")
        };
        if candidate.is_dir() {
            return candidate;
        }
    }

    PathBuf::from("resources")
}

/// Resolver backed by a directory of pre-rendered `.glsl` files.
#[derive(Debug, Clone)]
pub struct ShaderDirectory {
    root: PathBuf,
}

impl ShaderDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Shader directory inside the bundled resources.
    pub fn bundled() -> Self {
        Self::new(resource_root().join("shaders"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Levels of `channel` that currently have an asset on disk.
    pub fn available_levels(&self, channel: EffectChannel) -> Vec<EffectLevel> {
        EffectLevel::all()
            .filter(|level| self.resolve(channel, *level).is_some())
            .collect()
    }
}

impl ShaderAssetResolver for ShaderDirectory {
    fn resolve(&self, channel: EffectChannel, level: EffectLevel) -> Option<PathBuf> {
        let path = self.root.join(shader_file_name(channel, level));
        path.is_file().then_some(path)
    }
}

/// In-memory resolver for tests and headless runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryResolver {
    present: HashSet<(EffectChannel, EffectLevel)>,
}

impl MemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, channel: EffectChannel, level: EffectLevel) {
        self.present.insert((channel, level));
    }

    pub fn remove(&mut self, channel: EffectChannel, level: EffectLevel) {
        self.present.remove(&(channel, level));
    }

    /// Path this resolver reports for a present asset.
    pub fn path_for(channel: EffectChannel, level: EffectLevel) -> PathBuf {
        Path::new("memory").join(shader_file_name(channel, level))
    }
}

impl ShaderAssetResolver for MemoryResolver {
    fn resolve(&self, channel: EffectChannel, level: EffectLevel) -> Option<PathBuf> {
        self.present
            .contains(&(channel, level))
            .then(|| Self::path_for(channel, level))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_follow_channel_stems() {
        assert_eq!(
            shader_file_name(EffectChannel::Crt, EffectLevel::new(-3)),
            "crt_base_-3.glsl"
        );
        assert_eq!(
            shader_file_name(EffectChannel::Vhs, EffectLevel::new(0)),
            "vhs_noise_0.glsl"
        );
    }

    #[test]
    fn resolves_only_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("scanlines_2.glsl"), "//!HOOK MAIN").unwrap();
        let shaders = ShaderDirectory::new(dir.path());

        let found = shaders
            .resolve(EffectChannel::Scanlines, EffectLevel::new(2))
            .expect("asset should resolve");
        assert!(found.ends_with("scanlines_2.glsl"));
        assert!(shaders.resolve(EffectChannel::Scanlines, EffectLevel::new(3)).is_none());
        assert!(shaders.resolve(EffectChannel::Crt, EffectLevel::new(2)).is_none());
    }

    #[test]
    fn lists_available_levels() {
        let dir = tempfile::tempdir().unwrap();
        for level in [-5, 0, 5] {
            std::fs::write(dir.path().join(format!("crt_base_{level}.glsl")), "").unwrap();
        }
        let shaders = ShaderDirectory::new(dir.path());

        let levels: Vec<i8> = shaders
            .available_levels(EffectChannel::Crt)
            .into_iter()
            .map(EffectLevel::get)
            .collect();
        assert_eq!(levels, vec![-5, 0, 5]);
        assert!(shaders.available_levels(EffectChannel::Vhs).is_empty());
    }
}

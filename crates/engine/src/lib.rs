use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod activity_log;
pub mod app;
mod atomic_io;
pub mod map_store;
pub mod net;
pub mod settings;
pub mod tileset;

pub use activity_log::{ActivityLog, LogEntry, LogLevel, DEFAULT_LOG_LIMIT};
pub use app::{
    run_app, run_app_with_connector, AppError, AtlasError, ClientConfig, ClientSession,
    InputAction, RenderQueue, TileAtlas, TileGraphics, ViewTransform, Viewport, WaypointMapper,
    Zoom,
};
pub use map_store::{MapStore, PatchSummary, RoomMap, TileIndex};
pub use net::{
    Action, ConnectionListener, ConnectionState, Connector, Event, EventKind, ItemId,
    NetStatsSnapshot, PlayerProfile, PlayerStats, Reply, RequestId, RoomId,
    RpcClient, RpcOptions, Socket, TransportError, ViewportFrame, WireError, WsConnector,
};
pub use settings::{ClientSettings, SettingsError, SettingsStore};
pub use tileset::{parse_css_color, Manifest, TileRecord, TileSet};

pub const ROOT_ENV_VAR: &str = "ROGUE_CLIENT_ROOT";

const ASSETS_DIR: &str = "assets";
const CACHE_DIR: &str = "cache";

/// Where the client reads its bundled assets and keeps local state.
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub root: PathBuf,
    pub assets_dir: PathBuf,
    pub cache_dir: PathBuf,
}

impl AppPaths {
    fn under(root: PathBuf) -> Self {
        Self {
            assets_dir: root.join(ASSETS_DIR),
            cache_dir: root.join(CACHE_DIR),
            root,
        }
    }

    pub fn default_manifest(&self) -> PathBuf {
        self.assets_dir.join("manifest.json")
    }

    pub fn default_settings(&self) -> PathBuf {
        self.cache_dir.join("settings.json")
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("{env_var} points at {path}, which has no assets/ directory")]
    MissingAssets {
        path: PathBuf,
        env_var: &'static str,
    },
    #[error("no directory with an assets/ folder above {searched}; set {env_var} to the client root")]
    RootNotFound {
        searched: String,
        env_var: &'static str,
    },
    #[error("failed to create cache directory at {path}: {source}")]
    CreateCacheDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Picks the client root from `ROGUE_CLIENT_ROOT`, or the nearest directory
/// holding `assets/` above the working directory or the executable.
pub fn resolve_app_paths() -> Result<AppPaths, StartupError> {
    let root = match env::var_os(ROOT_ENV_VAR) {
        Some(value) => {
            let root = PathBuf::from(value);
            if !has_assets(&root) {
                return Err(StartupError::MissingAssets {
                    path: root,
                    env_var: ROOT_ENV_VAR,
                });
            }
            root
        }
        None => find_root(&search_starts())?,
    };

    let paths = AppPaths::under(root);
    fs::create_dir_all(&paths.cache_dir).map_err(|source| StartupError::CreateCacheDir {
        path: paths.cache_dir.clone(),
        source,
    })?;
    Ok(paths)
}

fn search_starts() -> Vec<PathBuf> {
    let exe_dir = env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf));
    env::current_dir().ok().into_iter().chain(exe_dir).collect()
}

fn find_root(starts: &[PathBuf]) -> Result<PathBuf, StartupError> {
    starts
        .iter()
        .flat_map(|start| start.ancestors())
        .find(|dir| has_assets(dir))
        .map(Path::to_path_buf)
        .ok_or_else(|| StartupError::RootNotFound {
            searched: starts
                .iter()
                .map(|dir| dir.display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
            env_var: ROOT_ENV_VAR,
        })
}

fn has_assets(dir: &Path) -> bool {
    dir.join(ASSETS_DIR).is_dir()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearest_ancestor_with_assets_is_the_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("assets")).expect("assets");
        let nested = dir.path().join("target").join("release");
        fs::create_dir_all(&nested).expect("nested");

        let root = find_root(&[nested]).expect("root");
        assert_eq!(root, dir.path());
    }

    #[test]
    fn later_starts_are_searched_when_earlier_ones_fail() {
        let empty = tempfile::tempdir().expect("tempdir");
        let bundle = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(bundle.path().join("assets")).expect("assets");

        let root = find_root(&[empty.path().to_path_buf(), bundle.path().to_path_buf()])
            .expect("root");
        assert_eq!(root, bundle.path());
    }

    #[test]
    fn no_starts_reports_root_not_found() {
        let error = find_root(&[]).expect_err("no root");
        assert!(matches!(error, StartupError::RootNotFound { .. }));
    }

    #[test]
    fn default_paths_live_under_assets_and_cache() {
        let paths = AppPaths::under(PathBuf::from("/srv/rogue"));
        assert_eq!(
            paths.default_manifest(),
            PathBuf::from("/srv/rogue/assets/manifest.json")
        );
        assert_eq!(
            paths.default_settings(),
            PathBuf::from("/srv/rogue/cache/settings.json")
        );
    }
}

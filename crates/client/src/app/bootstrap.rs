use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{SystemTime, UNIX_EPOCH};

use engine::{
    resolve_app_paths, AtlasError, ClientConfig, ClientSession, PlayerProfile, SettingsStore,
    StartupError, TileAtlas, TileGraphics, TileSet,
};
use thiserror::Error;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use super::manifest::{load_manifest, resolve_atlas_path, ManifestError};

const MANIFEST_ENV_VAR: &str = "ROGUE_MANIFEST";
const PLAYER_NAME_ENV_VAR: &str = "ROGUE_PLAYER_NAME";
const SETTINGS_ENV_VAR: &str = "ROGUE_SETTINGS";

pub(crate) struct AppWiring {
    pub(crate) config: ClientConfig,
    pub(crate) session: ClientSession,
}

#[derive(Debug, Error)]
enum BootstrapError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error("failed to load tile atlas: {0}")]
    Atlas(#[from] AtlasError),
}

pub(crate) fn build_app() -> Result<AppWiring, ExitCode> {
    init_tracing();
    info!("=== Rogue Client Startup ===");

    match load_session() {
        Ok(session) => Ok(AppWiring {
            config: ClientConfig::default(),
            session,
        }),
        Err(err) => {
            error!(error = %err, "startup_failed");
            Err(ExitCode::FAILURE)
        }
    }
}

fn load_session() -> Result<ClientSession, BootstrapError> {
    let paths = resolve_app_paths()?;
    info!(
        root = %paths.root.display(),
        assets_dir = %paths.assets_dir.display(),
        cache_dir = %paths.cache_dir.display(),
        "startup"
    );

    let manifest_path = path_from_env(MANIFEST_ENV_VAR).unwrap_or_else(|| paths.default_manifest());
    let manifest = load_manifest(&manifest_path)?;
    info!(
        path = %manifest_path.display(),
        tile_size = manifest.tileset.tilesize,
        tile_count = manifest.tileset.tilemap.len(),
        music_tracks = manifest.music.len(),
        server_age = ?manifest.server_age,
        players_online = ?manifest.num_players_online,
        "manifest_loaded"
    );

    let atlas_path = resolve_atlas_path(&manifest_path, &manifest.tiles_url)?;
    let atlas = TileAtlas::load(&atlas_path)?;
    info!(
        path = %atlas_path.display(),
        width = atlas.width(),
        height = atlas.height(),
        "atlas_loaded"
    );
    let graphics = TileGraphics::new(TileSet::from_spec(&manifest.tileset), atlas)?;

    let settings_path = path_from_env(SETTINGS_ENV_VAR).unwrap_or_else(|| paths.default_settings());
    let settings = SettingsStore::load_or_default(&settings_path);

    Ok(ClientSession {
        graphics,
        socket_url: manifest.socket_url,
        profile: PlayerProfile {
            name: player_name(read_env(PLAYER_NAME_ENV_VAR)),
        },
        settings,
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

/// Non-empty value of `var`, if any. Unreadable values warn and count as unset.
fn read_env(var: &'static str) -> Option<String> {
    match env::var(var) {
        Ok(value) => {
            let trimmed = value.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Err(env::VarError::NotPresent) => None,
        Err(err) => {
            warn!(env_var = var, error = %err, "unable to read env var; using default");
            None
        }
    }
}

fn path_from_env(var: &'static str) -> Option<PathBuf> {
    read_env(var).map(PathBuf::from)
}

fn player_name(configured: Option<String>) -> String {
    configured.unwrap_or_else(|| {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.subsec_millis())
            .unwrap_or_default();
        format!("Player-{suffix}")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_player_name_is_kept() {
        assert_eq!(player_name(Some("ada".to_string())), "ada");
    }

    #[test]
    fn default_player_name_has_numeric_suffix() {
        let name = player_name(None);
        let suffix = name.strip_prefix("Player-").expect("prefix");
        let number: u32 = suffix.parse().expect("numeric suffix");
        assert!(number < 1000);
    }
}

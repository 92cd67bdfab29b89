use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use engine::Manifest;
use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum ManifestError {
    #[error("failed to read manifest {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse manifest {path} at {field}: {source}")]
    Parse {
        path: PathBuf,
        field: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("tile atlas location {url} is remote; only local paths are supported")]
    RemoteAtlas { url: String },
    #[error("manifest has an empty tiles_url")]
    EmptyAtlasUrl,
}

pub(crate) fn load_manifest(path: &Path) -> Result<Manifest, ManifestError> {
    let raw = fs::read_to_string(path).map_err(|source| ManifestError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_manifest(&raw, path)
}

fn parse_manifest(raw: &str, path: &Path) -> Result<Manifest, ManifestError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize::<_, Manifest>(&mut deserializer).map_err(|error| {
        let field = match error.path().to_string() {
            field if field.is_empty() || field == "." => "<root>".to_string(),
            field => field,
        };
        ManifestError::Parse {
            path: path.to_path_buf(),
            field,
            source: error.into_inner(),
        }
    })
}

/// Resolves `tiles_url` against the manifest's directory. `file://` urls are
/// accepted; any other scheme is rejected.
pub(crate) fn resolve_atlas_path(
    manifest_path: &Path,
    tiles_url: &str,
) -> Result<PathBuf, ManifestError> {
    let trimmed = tiles_url.trim();
    if trimmed.is_empty() {
        return Err(ManifestError::EmptyAtlasUrl);
    }
    let local = match trimmed.strip_prefix("file://") {
        Some(rest) => rest,
        None if trimmed.contains("://") => {
            return Err(ManifestError::RemoteAtlas {
                url: trimmed.to_string(),
            })
        }
        None => trimmed,
    };

    let candidate = PathBuf::from(local);
    if candidate.is_absolute() {
        return Ok(candidate);
    }
    let base = manifest_path.parent().unwrap_or_else(|| Path::new("."));
    Ok(base.join(candidate))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r##"{
        "tileset": {"tilesize": 32, "tilemap": [[[0, 0], "#000"], [[1, 0], "rgb(10, 20, 30)"]]},
        "tiles_url": "tiles.png",
        "socket_url": "ws://localhost:8080/ws",
        "music": ["a.ogg"],
        "server_age": 12.5,
        "num_players_online": 3
    }"##;

    #[test]
    fn manifest_loads_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("manifest.json");
        fs::write(&path, SAMPLE).expect("write manifest");

        let manifest = load_manifest(&path).expect("manifest");
        assert_eq!(manifest.tileset.tilesize, 32);
        assert_eq!(manifest.tileset.tilemap.len(), 2);
        assert_eq!(manifest.socket_url, "ws://localhost:8080/ws");
        assert_eq!(manifest.num_players_online, Some(3));
    }

    #[test]
    fn parse_error_names_the_failing_field() {
        let raw = r#"{"tileset": {"tilesize": "big", "tilemap": []}, "tiles_url": "t.png", "socket_url": "ws://x"}"#;
        let error = parse_manifest(raw, Path::new("manifest.json")).expect_err("bad tilesize");
        match error {
            ManifestError::Parse { field, .. } => assert_eq!(field, "tileset.tilesize"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_manifest_is_a_read_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = load_manifest(&dir.path().join("absent.json"));
        assert!(matches!(result, Err(ManifestError::Read { .. })));
    }

    #[test]
    fn atlas_path_is_relative_to_manifest() {
        let resolved = resolve_atlas_path(Path::new("/srv/assets/manifest.json"), "img/tiles.png")
            .expect("resolved");
        assert_eq!(resolved, PathBuf::from("/srv/assets/img/tiles.png"));

        let file_url = resolve_atlas_path(Path::new("manifest.json"), "file:///opt/tiles.png")
            .expect("file url");
        assert_eq!(file_url, PathBuf::from("/opt/tiles.png"));
    }

    #[test]
    fn remote_atlas_is_rejected() {
        let result = resolve_atlas_path(Path::new("manifest.json"), "https://cdn/tiles.png");
        assert!(matches!(result, Err(ManifestError::RemoteAtlas { .. })));
        assert!(matches!(
            resolve_atlas_path(Path::new("manifest.json"), "  "),
            Err(ManifestError::EmptyAtlasUrl)
        ));
    }
}

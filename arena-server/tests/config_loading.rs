//! Config loading tests
//!
//! RON files on disk via tempfile, the shipped `config/server.ron`, and
//! content directories handed to the server.

use arena_core::logging::LogLevel;
use arena_core::{Content, MobCountMode};
use arena_server::config::{ConfigError, ServerConfig};
use std::path::Path;

// ============================================================================
// RON files
// ============================================================================

#[test]
fn partial_file_keeps_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("server.ron");
    std::fs::write(&path, "(tick_rate: 30, world: (pvp: true))").unwrap();

    let config = ServerConfig::load(&path).unwrap();
    assert_eq!(config.tick_rate, 30);
    assert!(config.world.pvp);
    assert_eq!(config.instances, ServerConfig::default().instances);
    assert_eq!(config.world.mob_count_mode, MobCountMode::MobsOnly);
}

#[test]
fn parse_error_names_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.ron");
    std::fs::write(&path, "(tick_rate: \"fast\")").unwrap();

    let err = ServerConfig::load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
    assert!(err.to_string().contains("broken.ron"));
}

#[test]
fn missing_file_is_a_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = ServerConfig::load(dir.path().join("absent.ron")).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
}

#[test]
fn shipped_config_parses() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/server.ron");
    let config = ServerConfig::load(&path).unwrap();
    assert!(config.validate().is_ok());
    assert_eq!(config.tick_rate, 25);
    assert_eq!(config.tracing.default_level, LogLevel::Info);
    assert!(config.content_dir.is_none());
}

#[test]
fn round_trips_through_ron() {
    let mut config = ServerConfig::default();
    config.instances = 3;
    config.world.mob_count_mode = MobCountMode::AllEntities;
    let text = ron::ser::to_string_pretty(&config, ron::ser::PrettyConfig::default()).unwrap();
    let parsed = ServerConfig::from_ron(&text, Path::new("inline")).unwrap();
    assert_eq!(parsed, config);
}

// ============================================================================
// Content directory
// ============================================================================

#[test]
fn content_dir_from_config_loads() {
    let dir = tempfile::tempdir().unwrap();
    let shipped = Path::new(env!("CARGO_MANIFEST_DIR")).join("../arena-core/content");
    for file in ["petals.json", "mobs.json", "zones.json", "world.json"] {
        std::fs::copy(shipped.join(file), dir.path().join(file)).unwrap();
    }

    let config_path = dir.path().join("server.ron");
    let ron = format!("(content_dir: Some({:?}))", dir.path().display().to_string());
    std::fs::write(&config_path, ron).unwrap();

    let config = ServerConfig::load(&config_path).unwrap();
    let content = Content::load_dir(config.content_dir.as_ref().unwrap()).unwrap();
    let builtin = Content::builtin().unwrap();
    assert_eq!(content.zones.len(), builtin.zones.len());
}

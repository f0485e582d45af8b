use std::sync::Mutex;

use super::*;

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// # Safety
/// Callers hold `ENV_LOCK` so no other test touches the environment.
unsafe fn clear_sketch_env() {
    unsafe {
        std::env::remove_var("SKETCH_CLIENT_ID");
        std::env::remove_var("SKETCH_REACTION_MS");
        std::env::remove_var("SKETCH_CURSOR_TTL_MS");
        std::env::remove_var("SKETCH_CHANNEL_CAPACITY");
        std::env::remove_var("SKETCH_RESOLUTION");
    }
}

#[test]
fn from_env_defaults() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe { clear_sketch_env() };

    let cfg = Config::from_env().unwrap();
    assert_eq!(cfg.reaction_window_ms, DEFAULT_REACTION_MS);
    assert_eq!(cfg.cursor_ttl_ms, DEFAULT_CURSOR_TTL_MS);
    assert_eq!(cfg.channel_capacity, DEFAULT_CHANNEL_CAPACITY);
    assert_eq!(cfg.resolution, ResolutionPolicy::LastWriteWins);
    assert_ne!(cfg.client_id, Config::from_env().unwrap().client_id);
}

#[test]
fn from_env_parses_overrides() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    let id = Uuid::new_v4();
    unsafe {
        clear_sketch_env();
        std::env::set_var("SKETCH_CLIENT_ID", id.to_string());
        std::env::set_var("SKETCH_REACTION_MS", "1500");
        std::env::set_var("SKETCH_CURSOR_TTL_MS", " 900 ");
        std::env::set_var("SKETCH_CHANNEL_CAPACITY", "16");
        std::env::set_var("SKETCH_RESOLUTION", "field_timestamps");
    }

    let cfg = Config::from_env().unwrap();
    assert_eq!(cfg.client_id, id);
    assert_eq!(cfg.reaction_window_ms, 1500);
    assert_eq!(cfg.cursor_ttl_ms, 900);
    assert_eq!(cfg.channel_capacity, 16);
    assert_eq!(cfg.resolution, ResolutionPolicy::FieldTimestamps);

    unsafe { clear_sketch_env() };
}

#[test]
fn malformed_numbers_fall_back_to_defaults() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_sketch_env();
        std::env::set_var("SKETCH_REACTION_MS", "soon");
        std::env::set_var("SKETCH_CHANNEL_CAPACITY", "-3");
    }

    let cfg = Config::from_env().unwrap();
    assert_eq!(cfg.reaction_window_ms, DEFAULT_REACTION_MS);
    assert_eq!(cfg.channel_capacity, DEFAULT_CHANNEL_CAPACITY);

    unsafe { clear_sketch_env() };
}

#[test]
fn malformed_client_id_and_policy_are_errors() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_sketch_env();
        std::env::set_var("SKETCH_CLIENT_ID", "not-a-uuid");
    }
    let err = Config::from_env().unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { var: "SKETCH_CLIENT_ID", .. }));
    assert_eq!(err.error_code(), "E_CONFIG_INVALID");

    unsafe {
        clear_sketch_env();
        std::env::set_var("SKETCH_RESOLUTION", "crdt");
    }
    assert!(matches!(Config::from_env(), Err(ConfigError::Invalid { var: "SKETCH_RESOLUTION", .. })));

    unsafe { clear_sketch_env() };
}

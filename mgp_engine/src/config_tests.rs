//! Unit tests for config.rs

use crate::config::{Config, ValidationStats};
use crate::device::{PresentMode, SampleCount};

#[test]
fn test_default_config_matches_frame_model() {
    let config = Config::default();
    assert_eq!(config.frames_in_flight, 3);
    assert_eq!(config.bindless_capacity, 65536);
    assert_eq!(config.max_sets_per_pool, 4092);
    assert!(config.initial_sets_per_pool <= config.max_sets_per_pool);
    assert_eq!(config.msaa_samples, SampleCount::S4);
    assert_eq!(config.present_mode, PresentMode::Fifo);
    assert!(config.pipeline_cache_path.is_none());
}

#[test]
fn test_config_struct_update_syntax() {
    let config = Config {
        frames_in_flight: 2,
        bindless_capacity: 128,
        ..Default::default()
    };
    assert_eq!(config.frames_in_flight, 2);
    assert_eq!(config.bindless_capacity, 128);
    assert_eq!(config.app_name, "mgp");
}

#[test]
fn test_validation_stats_total() {
    let stats = ValidationStats { errors: 1, warnings: 2, info: 3, verbose: 4 };
    assert_eq!(stats.total(), 10);
    assert!(stats.has_errors());
    assert!(!ValidationStats::default().has_errors());
}

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::viewer::{SessionConfig, SpreadMode, ViewerOptions};

pub const CURRENT_VERSION: u32 = 1;
const SETTINGS_FILENAME: &str = "config.yaml";
const POSITIONS_FILENAME: &str = "positions.json";
const APP_NAME: &str = "pageflip";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    #[serde(default = "default_lookahead")]
    pub lookahead: usize,

    #[serde(default = "default_workers")]
    pub workers: usize,

    #[serde(default = "default_commit_delay_ms")]
    pub commit_delay_ms: u64,

    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    #[serde(default = "default_resize_debounce_ms")]
    pub resize_debounce_ms: u64,

    #[serde(default = "default_page_padding")]
    pub page_padding: f32,

    #[serde(default = "default_device_pixel_ratio")]
    pub device_pixel_ratio: f32,

    #[serde(default = "default_spread")]
    pub spread: SpreadMode,

    #[serde(default = "default_viewport")]
    pub initial_viewport: Viewport,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Where reading positions are kept; defaults next to the config file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub positions_file: Option<PathBuf>,
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

fn default_cache_capacity() -> usize {
    crate::viewer::DEFAULT_CACHE_SIZE
}

fn default_lookahead() -> usize {
    crate::viewer::DEFAULT_LOOKAHEAD
}

fn default_workers() -> usize {
    crate::viewer::DEFAULT_WORKERS
}

fn default_commit_delay_ms() -> u64 {
    crate::viewer::DEFAULT_COMMIT_DELAY.as_millis() as u64
}

fn default_settle_delay_ms() -> u64 {
    crate::viewer::DEFAULT_SETTLE_DELAY.as_millis() as u64
}

fn default_resize_debounce_ms() -> u64 {
    crate::viewer::DEFAULT_RESIZE_DEBOUNCE.as_millis() as u64
}

fn default_page_padding() -> f32 {
    crate::viewer::DEFAULT_PAGE_PADDING
}

fn default_device_pixel_ratio() -> f32 {
    1.0
}

fn default_spread() -> SpreadMode {
    SpreadMode::TwoPage
}

fn default_viewport() -> Viewport {
    Viewport {
        width: 1280.0,
        height: 800.0,
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            cache_capacity: default_cache_capacity(),
            lookahead: default_lookahead(),
            workers: default_workers(),
            commit_delay_ms: default_commit_delay_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            resize_debounce_ms: default_resize_debounce_ms(),
            page_padding: default_page_padding(),
            device_pixel_ratio: default_device_pixel_ratio(),
            spread: default_spread(),
            initial_viewport: default_viewport(),
            log_level: default_log_level(),
            positions_file: None,
        }
    }
}

impl Settings {
    pub fn viewer_options(&self) -> ViewerOptions {
        ViewerOptions {
            session: SessionConfig {
                cache_capacity: self.cache_capacity.max(1),
                lookahead: self.lookahead,
                workers: self.workers.max(1),
                commit_delay: Duration::from_millis(self.commit_delay_ms),
                settle_delay: Duration::from_millis(self.settle_delay_ms),
            },
            resize_debounce: Duration::from_millis(self.resize_debounce_ms),
            page_padding: self.page_padding,
            device_pixel_ratio: self.device_pixel_ratio,
            spread: self.spread,
            initial_viewport: (self.initial_viewport.width, self.initial_viewport.height),
        }
    }

    pub fn log_level(&self) -> log::LevelFilter {
        self.log_level.parse().unwrap_or_else(|_| {
            warn!("Unknown log level {:?}, using info", self.log_level);
            log::LevelFilter::Info
        })
    }

    /// Positions file from the settings, else next to the config file
    pub fn positions_path(&self) -> Option<PathBuf> {
        self.positions_file
            .clone()
            .or_else(|| app_config_dir().map(|dir| dir.join(POSITIONS_FILENAME)))
    }
}

fn app_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|config| config.join(APP_NAME))
}

pub fn preferred_config_path() -> Option<PathBuf> {
    app_config_dir().map(|dir| dir.join(SETTINGS_FILENAME))
}

/// Load settings from `path`, or from the default location.
///
/// A missing default config file is created with defaults. Unreadable or
/// unparsable files fall back to defaults.
pub fn load_settings(path: Option<&Path>) -> Settings {
    if let Some(path) = path {
        return load_settings_from_path(path).unwrap_or_default();
    }

    let Some(path) = preferred_config_path() else {
        warn!("Could not determine config directory, using default settings");
        return Settings::default();
    };

    if path.exists() {
        load_settings_from_path(&path).unwrap_or_default()
    } else {
        info!("Settings file not found, creating with defaults at {path:?}");
        let settings = Settings::default();
        save_settings_to_file(&settings, &path);
        settings
    }
}

pub fn load_settings_from_path(path: &Path) -> Option<Settings> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            error!("Failed to read settings file {path:?}: {e}");
            return None;
        }
    };

    match serde_yaml::from_str::<Settings>(&content) {
        Ok(mut settings) => {
            debug!("Loaded settings from {path:?}");
            if settings.version < CURRENT_VERSION {
                migrate_settings(&mut settings);
                save_settings_to_file(&settings, path);
            }
            Some(settings)
        }
        Err(e) => {
            error!("Failed to parse settings file {path:?}: {e}");
            None
        }
    }
}

fn migrate_settings(settings: &mut Settings) {
    info!(
        "Migrating settings from v{} to v{}",
        settings.version, CURRENT_VERSION
    );

    // Future migrations go here:
    // if settings.version < 2 {
    //     migrate_v1_to_v2(settings);
    // }

    settings.version = CURRENT_VERSION;
}

pub fn save_settings_to_file(settings: &Settings, path: &Path) {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            if let Err(e) = fs::create_dir_all(parent) {
                error!("Failed to create config directory {parent:?}: {e}");
                return;
            }
        }
    }

    let content = match serde_yaml::to_string(settings) {
        Ok(content) => content,
        Err(e) => {
            error!("Failed to serialize settings: {e}");
            return;
        }
    };

    match fs::write(path, content) {
        Ok(()) => debug!("Saved settings to {path:?}"),
        Err(e) => error!("Failed to save settings to {path:?}: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_viewer_defaults() {
        let options = Settings::default().viewer_options();
        assert_eq!(options.session.cache_capacity, 10);
        assert_eq!(options.session.lookahead, 2);
        assert_eq!(options.session.commit_delay, Duration::from_millis(200));
        assert_eq!(options.session.settle_delay, Duration::from_millis(400));
        assert_eq!(options.resize_debounce, Duration::from_millis(150));
        assert_eq!(options.spread, SpreadMode::TwoPage);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "version: 1\ncache_capacity: 4\nspread: single\n").unwrap();

        let settings = load_settings(Some(&path));
        assert_eq!(settings.cache_capacity, 4);
        assert_eq!(settings.spread, SpreadMode::Single);
        assert_eq!(settings.lookahead, 2);
    }

    #[test]
    fn old_version_is_migrated_and_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "version: 0\nworkers: 3\n").unwrap();

        let settings = load_settings(Some(&path));
        assert_eq!(settings.version, CURRENT_VERSION);
        assert_eq!(settings.workers, 3);

        let reloaded = load_settings_from_path(&path).unwrap();
        assert_eq!(reloaded.version, CURRENT_VERSION);
    }

    #[test]
    fn broken_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "cache_capacity: [not a number\n").unwrap();

        assert_eq!(load_settings(Some(&path)), Settings::default());
    }

    #[test]
    fn save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");
        let settings = Settings {
            lookahead: 5,
            log_level: "debug".to_string(),
            ..Settings::default()
        };

        save_settings_to_file(&settings, &path);
        let reloaded = load_settings_from_path(&path).unwrap();
        assert_eq!(reloaded, settings);
        assert_eq!(reloaded.log_level(), log::LevelFilter::Debug);
    }
}

/// Launcher configuration
pub mod launcher;
pub use launcher::{
    load_launcher_config, resolve_launcher_config, LauncherConfig, LauncherOverrides,
    DEFAULT_CONFIG_FILE,
};

/// Configuration traits
pub mod traits;
pub use traits::{Configuration, MergeableConfiguration};

use std::path::PathBuf;

/// Common trait for configuration types
pub trait Configuration {
    /// Returns the file path where this configuration was loaded from
    /// (empty when built from defaults)
    fn config_path(&self) -> &PathBuf;

    /// Returns a string identifier for the configuration type
    fn config_type(&self) -> &str;

    /// Validates the configuration
    fn validate(&self) -> anyhow::Result<()>;
}

/// Trait for configurations that can be merged together
pub trait MergeableConfiguration<T> {
    /// Merges this configuration with another, with the other taking precedence
    fn merge_with(&self, other: &T) -> anyhow::Result<Self>
    where
        Self: Sized;
}

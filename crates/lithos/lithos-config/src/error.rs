#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read '{path}'")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config")]
    Parse(#[from] toml::de::Error),

    #[error("failed to read directory '{path}'")]
    ReadDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

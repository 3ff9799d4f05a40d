//! Configuration for database connections
//!
//! Provides a builder pattern for configuring a connection.

use crate::cipher::PaddingMode;

/// Configuration for a single database connection
#[derive(Clone)]
pub struct ConnectionConfig {
    /// MySQL database URL
    pub database_url: String,
    /// Raw key material for AES_ENCRYPT/AES_DECRYPT compatible encryption
    pub cipher_key: Option<Vec<u8>>,
    /// Whether prepared statements are cached per SQL text (default: true)
    pub cache_statements: bool,
    /// How padding is removed after decryption
    pub padding_mode: PaddingMode,
}

impl ConnectionConfig {
    /// Create a new configuration builder
    pub fn builder(database_url: impl Into<String>) -> ConnectionConfigBuilder {
        ConnectionConfigBuilder::new(database_url)
    }
}

// Key material stays out of debug output.
impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("database_url", &self.database_url)
            .field("cipher_key", &self.cipher_key.as_ref().map(|_| "<redacted>"))
            .field("cache_statements", &self.cache_statements)
            .field("padding_mode", &self.padding_mode)
            .finish()
    }
}

/// Builder for ConnectionConfig
#[derive(Debug)]
pub struct ConnectionConfigBuilder {
    config: ConnectionConfig,
}

impl ConnectionConfigBuilder {
    /// Create a new builder with the database URL
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            config: ConnectionConfig {
                database_url: database_url.into(),
                cipher_key: None,
                cache_statements: true,
                padding_mode: PaddingMode::default(),
            },
        }
    }

    /// Set the raw cipher key material (any length)
    pub fn cipher_key(mut self, key: impl AsRef<[u8]>) -> Self {
        self.config.cipher_key = Some(key.as_ref().to_vec());
        self
    }

    /// Enable or disable the prepared statement cache (default: true)
    pub fn cache_statements(mut self, enabled: bool) -> Self {
        self.config.cache_statements = enabled;
        self
    }

    /// Set the padding mode used by decryption (default: `PaddingMode::Compat`)
    pub fn padding_mode(mut self, mode: PaddingMode) -> Self {
        self.config.padding_mode = mode;
        self
    }

    /// Build the configuration
    pub fn build(self) -> ConnectionConfig {
        self.config
    }
}

//! Environment variable source: MIRROR__* prefix with __ separator

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::ConfigError;
use config::Environment;

/// Add environment variable overlay to builder.
/// `MIRROR__SCAN__CHUNK_SIZE=65536` sets `scan.chunk_size`.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let builder = builder.add_source(
        Environment::with_prefix("MIRROR")
            .separator("__")
            .try_parsing(true),
    );
    Ok(builder)
}

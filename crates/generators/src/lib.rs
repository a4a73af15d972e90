//! Line producers for the line-streaming server.
//!
//! ## Available Generators
//!
//! - **RandomWords**: lines of random lowercase words, e.g. `"kqoz bfeuaw tidr"`
//! - **JsonObjects**: one compact JSON object per line, e.g.
//!   `{"id":1,"user":"alice","action":"click","amount":12.5,"timestamp":1700000000000}`
//!
//! Both implement [`LineProducer`] and can be seeded for reproducible output.
//!
//! ## Example
//!
//! ```ignore
//! use linestream_generators::RandomWords;
//! use linestream_server::{LineStreamingServer, ServerConfig};
//!
//! let words = RandomWords::new().with_seed(42);
//! let server = LineStreamingServer::bind(ServerConfig::new(9999, 100), words).await?;
//! ```

mod json;
mod words;

pub use json::{Event, JsonObjects};
pub use linestream_server::LineProducer;
pub use words::RandomWords;

use thiserror::Error;

/// Errors that can occur while configuring or running a generator.
#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("Invalid {name} range: {min}..={max}")]
    InvalidRange {
        name: &'static str,
        min: usize,
        max: usize,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for generator operations.
pub type Result<T> = std::result::Result<T, GeneratorError>;

fn check_range(name: &'static str, min: usize, max: usize) -> Result<()> {
    if min == 0 || min > max {
        return Err(GeneratorError::InvalidRange { name, min, max });
    }
    Ok(())
}

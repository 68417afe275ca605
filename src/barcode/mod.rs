pub mod candidates;
pub mod checksum;
pub mod decoder;
pub mod recognizer;
pub mod render;
pub mod search;

pub use candidates::*;
pub use checksum::*;
pub use decoder::*;
pub use recognizer::*;
pub use render::*;
pub use search::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BarcodeError {
    #[error("Failed to decode image: {0}")]
    ImageDecode(String),

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("Recognition failed: {0}")]
    Recognition(#[from] RecognitionError),
}

/// Errors talking to the remote recognition service.
#[derive(Error, Debug)]
pub enum RecognitionError {
    #[error("Recognition service is not reachable at {0}")]
    Unreachable(String),

    #[error("Recognition request timed out after {0} seconds")]
    Timeout(u64),

    #[error("Recognition service returned an error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Could not parse recognition response: {0}")]
    ResponseParsing(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid recognition endpoint: '{0}'")]
    InvalidEndpoint(String),
}

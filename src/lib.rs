// glz: LZ77-family screen image compressor with a shared dictionary

pub mod config;
pub mod dictionary;
pub mod encoder;
pub mod error;
pub mod image;
pub mod pool;
pub mod usr;

// ── Version constants ─────────────────────────────────────────────────────────
pub const GLZ_VERSION_MAJOR: u32 = image::LZ_VERSION_MAJOR;
pub const GLZ_VERSION_MINOR: u32 = image::LZ_VERSION_MINOR;
pub const GLZ_VERSION_STRING: &str = "1.1";

/// Stream format version written in every header.
pub fn version_number() -> u32 {
    image::LZ_VERSION
}

pub fn version_string() -> &'static str {
    GLZ_VERSION_STRING
}

// ── Top-level re-exports ──────────────────────────────────────────────────────
pub use dictionary::{DictImage, EncodeLease, RestoreData, SharedDictionary};
pub use encoder::{max_encoded_size, EncodeRequest, Encoded, Encoder};
pub use error::GlzError;
pub use image::ImageType;
pub use pool::{EncodeJob, EncodeResult, EncodedImage, EncoderPool};
pub use usr::{EncoderUsr, ImageToken, LineChunk, NullUsr};

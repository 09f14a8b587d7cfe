//! Error type shared by the dictionary, the encoder and the encoder pool.
//!
//! Every variant is fatal for the operation that raised it: it is first
//! reported through [`EncoderUsr::error`](crate::usr::EncoderUsr::error) and
//! then returned to the caller.

use thiserror::Error;

use crate::image::ImageType;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GlzError {
    /// The image alone needs more pixels than the window can hold.
    #[error("image is bigger than window ({image_size} > {size_limit} pixels)")]
    ImageTooLarge { image_size: u64, size_limit: u32 },

    /// Requested window capacity exceeds the format's distance range.
    #[error("window size {0} exceeds the maximum window size")]
    WindowTooLarge(u32),

    #[error("invalid number of encoders: {0}")]
    InvalidEncoderCount(u32),

    #[error("encoder id {id} out of range (dictionary serves {max_encoders} encoders)")]
    EncoderIdOutOfRange { id: u32, max_encoders: u32 },

    /// `pre_encode` was called for an encoder id that is still encoding.
    #[error("encoder {0} is already encoding an image")]
    EncoderBusy(u32),

    #[error("stride {stride} does not fit {image_type:?} rows of width {width}")]
    InvalidStride { image_type: ImageType, width: u32, stride: u32 },

    #[error("unsupported image type {0}")]
    UnsupportedImageType(u8),

    #[error("image has no pixels")]
    EmptyImage,

    /// The scanline source ran dry before the image height was covered.
    #[error("more lines failed after {rows} of {height} rows")]
    MoreLinesFailed { rows: u32, height: u32 },

    /// A scanline chunk holds fewer bytes than its advertised line count.
    #[error("scanline chunk too short: {len} bytes for {num_lines} lines of stride {stride}")]
    ShortLines { len: usize, num_lines: u32, stride: u32 },

    #[error("overflow in image segments window")]
    SegmentsOverflow,

    /// The output budget ran out and the caller granted no more space.
    #[error("no more bytes in the output buffer")]
    OutputExhausted,

    #[error("encoder pool asked for {requested} workers but the dictionary serves {max_encoders}")]
    WorkerCountExceeded { requested: usize, max_encoders: u32 },

    #[error("invalid encoder pool queue size: {0}")]
    InvalidQueueSize(usize),

    #[error("failed to start encoder workers: {0}")]
    WorkerSpawn(String),

    #[error("encoder pool is shut down")]
    PoolClosed,
}

// usr.rs: Caller callbacks and the scanline chunks they hand over.
//
// An encoder talks to its embedder only through `EncoderUsr`: diagnostics,
// output growth, scanline pulling and eviction notices. Every method has a
// default so embedders implement only what they need.

use std::sync::Arc;

use crate::error::GlzError;

// ---------------------------------------------------------------------------
// Scanline chunks
// ---------------------------------------------------------------------------

/// A run of consecutive scanlines of one image.
///
/// The dictionary keeps a reference to `data` for as long as the lines stay
/// in the window, so sharing the buffer is enough; nothing is copied. Images
/// stored bottom-up hand their lines over from the last row to the first.
#[derive(Clone, Debug)]
pub struct LineChunk {
    pub data: Arc<[u8]>,
    pub num_lines: u32,
}

impl LineChunk {
    pub fn new(data: impl Into<Arc<[u8]>>, num_lines: u32) -> Self {
        LineChunk { data: data.into(), num_lines }
    }

    /// A chunk with no lines; the encoder then pulls everything through
    /// [`EncoderUsr::more_lines`].
    pub fn empty() -> Self {
        LineChunk { data: Arc::from(Vec::new()), num_lines: 0 }
    }
}

// ---------------------------------------------------------------------------
// Opaque image token
// ---------------------------------------------------------------------------

/// Caller-chosen identifier attached to an image when it enters the window
/// and handed back through [`EncoderUsr::free_image`] when it leaves.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ImageToken(pub u64);

// ---------------------------------------------------------------------------
// Callbacks
// ---------------------------------------------------------------------------

pub trait EncoderUsr: Send {
    /// Reports an unrecoverable condition. The failing call returns the same
    /// error right after this returns; embedders that cannot continue abort
    /// here.
    fn error(&mut self, err: &GlzError) {
        log::error!("glz: {err}");
    }

    fn warn(&mut self, msg: &str) {
        log::warn!("glz: {msg}");
    }

    fn info(&mut self, msg: &str) {
        log::info!("glz: {msg}");
    }

    /// Grants more output bytes once the current budget is used up.
    /// Returning 0 ends the encode with [`GlzError::OutputExhausted`].
    fn more_space(&mut self) -> usize {
        0
    }

    /// Hands over the next scanlines of the image being inserted. `None`, or
    /// a chunk without lines, ends the encode with
    /// [`GlzError::MoreLinesFailed`].
    fn more_lines(&mut self) -> Option<LineChunk> {
        None
    }

    /// Called when an image that is still alive drops out of the window.
    /// Runs under the dictionary lock and must not call back into it.
    fn free_image(&mut self, _image: ImageToken) {}
}

/// Callbacks that rely on every default: log diagnostics, never grow the
/// output, never supply extra lines, ignore evictions.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullUsr;

impl EncoderUsr for NullUsr {}

/// Reports `err` through `usr` and hands it back as an `Err`.
pub(crate) fn fatal<T>(usr: &mut dyn EncoderUsr, err: GlzError) -> Result<T, GlzError> {
    usr.error(&err);
    Err(err)
}

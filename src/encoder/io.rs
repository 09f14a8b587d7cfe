// io.rs: Output cursor for one encode.
//
// Appends to a caller-owned `Vec<u8>` within a byte budget. When the budget
// runs out the cursor asks `EncoderUsr::more_space` for more; a zero grant
// aborts the encode. The cursor also remembers where the current literal-run
// count byte sits so it can be patched or retracted later.

use crate::error::GlzError;
use crate::usr::{fatal, EncoderUsr};

pub(crate) struct OutputCursor<'o> {
    buf: &'o mut Vec<u8>,
    usr: &'o mut dyn EncoderUsr,
    start: usize,
    /// Absolute index in `buf` at which the current budget ends.
    limit: usize,
    last_copy: Option<usize>,
}

impl<'o> OutputCursor<'o> {
    pub(crate) fn new(buf: &'o mut Vec<u8>, budget: usize, usr: &'o mut dyn EncoderUsr) -> Self {
        let start = buf.len();
        buf.reserve(budget);
        OutputCursor { buf, usr, start, limit: start.saturating_add(budget), last_copy: None }
    }

    /// Bytes written by this cursor so far.
    #[inline]
    pub(crate) fn written(&self) -> usize {
        self.buf.len() - self.start
    }

    fn more_io_bytes(&mut self) -> Result<(), GlzError> {
        let granted = self.usr.more_space();
        if granted == 0 {
            return fatal(&mut *self.usr, GlzError::OutputExhausted);
        }
        self.buf.reserve(granted);
        self.limit = self.limit.saturating_add(granted);
        Ok(())
    }

    #[inline]
    pub(crate) fn encode(&mut self, byte: u8) -> Result<(), GlzError> {
        if self.buf.len() >= self.limit {
            self.more_io_bytes()?;
        }
        self.buf.push(byte);
        Ok(())
    }

    pub(crate) fn encode_32(&mut self, word: u32) -> Result<(), GlzError> {
        word.to_be_bytes().iter().try_for_each(|&b| self.encode(b))
    }

    pub(crate) fn encode_64(&mut self, word: u64) -> Result<(), GlzError> {
        word.to_be_bytes().iter().try_for_each(|&b| self.encode(b))
    }

    /// Opens a literal run: writes its count byte and remembers where.
    #[inline]
    pub(crate) fn encode_copy_count(&mut self, count: u8) -> Result<(), GlzError> {
        self.encode(count)?;
        self.last_copy = Some(self.buf.len() - 1);
        Ok(())
    }

    /// Rewrites the count byte of the open literal run.
    #[inline]
    pub(crate) fn update_copy_count(&mut self, count: u8) {
        if let Some(pos) = self.last_copy {
            self.buf[pos] = count;
        }
    }

    /// Retracts the count byte of a literal run that stayed empty. It is
    /// always the last byte written.
    #[inline]
    pub(crate) fn output_prev(&mut self) {
        debug_assert_eq!(self.last_copy, Some(self.buf.len() - 1));
        self.buf.pop();
        self.last_copy = None;
    }
}

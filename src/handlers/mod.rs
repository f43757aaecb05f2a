// Copyright 2015-2023 Swim Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Ready-made overflow and underflow handlers for the common recovery
//! patterns: refusing outright, draining the window into an
//! [`io::Write`] sink, and stepping through one large in-memory buffer
//! window by window.

use std::io;
use std::io::Write;

use crate::error::{PackError, UnpackError};
use crate::packer::OverflowHandler;
use crate::unpacker::UnderflowHandler;
use crate::window::{PackWindow, UnpackWindow};

#[cfg(test)]
mod tests;

/// Terminal handler for contexts without recovery.
///
/// Refuses every overflow with [`PackError::BufferOverflow`] and reports
/// every underflow as end of input, which the unpacker translates to the
/// boundary-appropriate exhaustion code.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHandler;

impl<'buf> OverflowHandler<'buf> for NoHandler {
    fn on_overflow(
        &mut self,
        _window: &mut PackWindow<'buf>,
        _requested: usize,
    ) -> Result<(), PackError> {
        Err(PackError::BufferOverflow)
    }
}

impl<'buf> UnderflowHandler<'buf> for NoHandler {
    fn on_underflow(
        &mut self,
        _window: &mut UnpackWindow<'buf>,
        _requested: usize,
    ) -> Result<(), UnpackError> {
        Err(UnpackError::EndOfInput)
    }
}

/// Overflow handler that drains the filled window into an [`io::Write`]
/// sink and rewinds, letting one fixed buffer carry a stream of any
/// length.
///
/// The packer always finishes with a tail still in the window; the caller
/// drains it with [`flush_tail`](FlushOverflow::flush_tail) after taking
/// the packer apart:
///
/// ```
/// use bufpack::handlers::FlushOverflow;
/// use bufpack::Packer;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut sink = Vec::new();
/// let mut buf = [0u8; 8];
/// let mut packer = Packer::with_handler(&mut buf, FlushOverflow::new(&mut sink))?;
/// for n in 0..100 {
///     packer.pack_unsigned(n)?;
/// }
/// let (mut window, mut handler) = packer.into_parts();
/// handler.flush_tail(&mut window)?;
/// drop(handler);
/// assert_eq!(sink.len(), 100);
/// # Ok(())
/// # }
/// ```
///
/// A sink failure is reported to the packer as
/// [`PackError::BufferOverflow`]; the underlying [`io::Error`] is parked
/// on the handler for inspection through
/// [`last_io_error`](FlushOverflow::last_io_error).
#[derive(Debug)]
pub struct FlushOverflow<W> {
    sink: W,
    last_io_error: Option<io::Error>,
}

impl<W: Write> FlushOverflow<W> {
    pub fn new(sink: W) -> Self {
        FlushOverflow {
            sink,
            last_io_error: None,
        }
    }

    /// The sink error behind the most recent refused overflow, if any.
    pub fn last_io_error(&self) -> Option<&io::Error> {
        self.last_io_error.as_ref()
    }

    pub fn sink(&self) -> &W {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut W {
        &mut self.sink
    }

    pub fn into_sink(self) -> W {
        self.sink
    }

    /// Drains a final window tail into the sink and rewinds the window.
    pub fn flush_tail(&mut self, window: &mut PackWindow<'_>) -> io::Result<()> {
        self.sink.write_all(window.filled())?;
        window.rewind();
        Ok(())
    }
}

impl<'buf, W: Write> OverflowHandler<'buf> for FlushOverflow<W> {
    fn on_overflow(
        &mut self,
        window: &mut PackWindow<'buf>,
        requested: usize,
    ) -> Result<(), PackError> {
        match self.sink.write_all(window.filled()) {
            Ok(()) => {
                window.rewind();
                if window.remaining() < requested {
                    // The buffer is too small for this one item even when
                    // empty.
                    Err(PackError::BufferOverflow)
                } else {
                    Ok(())
                }
            }
            Err(err) => {
                self.last_io_error = Some(err);
                Err(PackError::BufferOverflow)
            }
        }
    }
}

/// Underflow handler that serves successive windows of one larger buffer,
/// zero-copy.
///
/// Each refill exposes at least `grain` fresh bytes (more when a single
/// field needs more), so an unpacker can be driven through arbitrarily
/// small windows of a stream that is already in memory. Blob items borrow
/// from the shared source buffer and therefore survive refills.
///
/// Start the unpacker on an empty prefix of the source; the first demand
/// performs the first refill:
///
/// ```
/// use bufpack::handlers::SliceRefill;
/// use bufpack::{Item, Unpacker};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let stream = [0x92, 0xc3, 0xa2, 0x68, 0x69];
/// let mut unpacker =
///     Unpacker::with_handler(&stream[..0], SliceRefill::new(&stream, 2))?;
/// assert_eq!(unpacker.next()?, Item::Array(2));
/// assert_eq!(unpacker.next()?, Item::Boolean(true));
/// assert_eq!(unpacker.next()?, Item::Str(b"hi"));
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SliceRefill<'buf> {
    source: &'buf [u8],
    served: usize,
    grain: usize,
}

impl<'buf> SliceRefill<'buf> {
    pub fn new(source: &'buf [u8], grain: usize) -> Self {
        SliceRefill {
            source,
            served: 0,
            grain: grain.max(1),
        }
    }

    /// Bytes of the source handed out so far.
    pub fn served(&self) -> usize {
        self.served
    }
}

impl<'buf> UnderflowHandler<'buf> for SliceRefill<'buf> {
    fn on_underflow(
        &mut self,
        window: &mut UnpackWindow<'buf>,
        requested: usize,
    ) -> Result<(), UnpackError> {
        // The current window is always a slice of `source` ending at
        // `served`, so the unread suffix starts at this absolute offset.
        let consumed = self.served - window.remaining();
        let target = (consumed + requested).max(self.served + self.grain);
        let end = target.min(self.source.len());
        if end - consumed < requested {
            return Err(UnpackError::EndOfInput);
        }
        window.replace(&self.source[consumed..end]);
        self.served = end;
        Ok(())
    }
}

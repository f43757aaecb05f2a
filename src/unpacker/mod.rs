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

use std::str::Utf8Error;

use crate::endian;
use crate::error::UnpackError;
use crate::handlers::NoHandler;
use crate::marker::Marker;
use crate::window::UnpackWindow;


/// One decoded MessagePack item.
///
/// Array and map items are headers carrying only their counts; the
/// contained items follow as further [`Unpacker::next`] calls. Blob
/// payloads borrow directly from the underlying buffer without copying
/// and stay valid for as long as that buffer does.
///
/// Integers are classified by value, not by wire tag: any integer ≥ 0
/// decodes to [`Item::Unsigned`], even when a writer transmitted it in a
/// signed slot, so [`Item::Signed`] always holds a negative value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Item<'buf> {
    Nil,
    Boolean(bool),
    /// Any integer ≥ 0, whichever wire tag carried it.
    Unsigned(u64),
    /// Any integer < 0.
    Signed(i64),
    Float(f32),
    Double(f64),
    /// Array header carrying the element count.
    Array(u32),
    /// Map header carrying the pair count.
    Map(u32),
    /// String blob. UTF-8 is not validated; see [`Item::as_str`].
    Str(&'buf [u8]),
    /// Binary blob.
    Bin(&'buf [u8]),
    /// Extension blob with its signed 8-bit user type code. Codes with the
    /// high bit set read back negative, as the format specifies.
    Ext(i8, &'buf [u8]),
}

impl<'buf> Item<'buf> {
    /// Checked UTF-8 view of a string blob payload. Returns `None` for any
    /// other item kind.
    pub fn as_str(&self) -> Option<Result<&'buf str, Utf8Error>> {
        match self {
            Item::Str(data) => Some(std::str::from_utf8(data)),
            _ => None,
        }
    }
}

/// Called when a read needs more bytes than the window has left.
///
/// On success at least `requested` unread bytes must be available, usually
/// by replacing the window with a fresh one; a handler that replaces the
/// window carries any unread bytes over itself. Returning
/// [`UnpackError::EndOfInput`] reports that the source is exhausted, which
/// the unpacker translates to end-of-input at an item boundary and to
/// [`UnpackError::BufferUnderflow`] inside an item. Any other error
/// poisons the unpacker verbatim.
pub trait UnderflowHandler<'buf> {
    fn on_underflow(
        &mut self,
        window: &mut UnpackWindow<'buf>,
        requested: usize,
    ) -> Result<(), UnpackError>;
}

/// Streaming MessagePack decoder over a caller-supplied buffer.
///
/// [`next`](Unpacker::next) reads one item; [`skip`](Unpacker::skip)
/// advances over complete items without decoding them. When the window
/// runs out of bytes the underflow handler is consulted; without one,
/// exhaustion reports [`UnpackError::EndOfInput`] at an item boundary and
/// [`UnpackError::BufferUnderflow`] inside an item.
///
/// The first error is sticky: after any failure (end of input included)
/// every call returns [`UnpackError::Stopped`] without touching the
/// buffer, and the only recovery is to discard the unpacker.
#[derive(Debug)]
pub struct Unpacker<'buf, H = NoHandler> {
    window: UnpackWindow<'buf>,
    handler: H,
    state: Result<(), UnpackError>,
}

impl<'buf> Unpacker<'buf, NoHandler> {
    /// Creates an unpacker without underflow recovery; the buffer is the
    /// whole stream.
    pub fn new(buf: &'buf [u8]) -> Result<Self, UnpackError> {
        Unpacker::with_handler(buf, NoHandler)
    }
}

impl<'buf, H> Unpacker<'buf, H>
where
    H: UnderflowHandler<'buf>,
{
    /// Creates an unpacker that consults `handler` whenever the window
    /// runs out of bytes.
    pub fn with_handler(buf: &'buf [u8], handler: H) -> Result<Self, UnpackError> {
        if !endian::byte_order_ok() {
            return Err(UnpackError::WrongByteOrder);
        }
        Ok(Unpacker {
            window: UnpackWindow::new(buf),
            handler,
            state: Ok(()),
        })
    }

    /// Bytes consumed from the current window.
    pub fn position(&self) -> usize {
        self.window.position()
    }

    /// Bytes not yet consumed from the current window.
    pub fn remaining(&self) -> usize {
        self.window.remaining()
    }

    /// The first error this unpacker recorded, if any.
    pub fn status(&self) -> Result<(), UnpackError> {
        self.state
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    /// Releases the window and the handler.
    pub fn into_parts(self) -> (UnpackWindow<'buf>, H) {
        (self.window, self.handler)
    }

    /// Reads the next item from the stream.
    ///
    /// [`UnpackError::EndOfInput`] here means the stream terminated
    /// cleanly on an item boundary; a stream cut off inside an item
    /// reports [`UnpackError::BufferUnderflow`] instead.
    pub fn next(&mut self) -> Result<Item<'buf>, UnpackError> {
        self.live()?;
        self.demand(1, UnpackError::EndOfInput)?;
        let byte = self.window.take_byte();
        match Marker::from_u8(byte) {
            Marker::FixPos(value) => Ok(Item::Unsigned(value as u64)),
            Marker::FixMap(size) => Ok(Item::Map(size as u32)),
            Marker::FixArray(size) => Ok(Item::Array(size as u32)),
            Marker::FixStr(len) => Ok(Item::Str(self.take_blob(len as usize)?)),
            Marker::Nil => Ok(Item::Nil),
            Marker::Reserved => Err(self.fail(UnpackError::Malformed(byte))),
            Marker::False => Ok(Item::Boolean(false)),
            Marker::True => Ok(Item::Boolean(true)),
            Marker::Bin8 => {
                let len = self.len8()?;
                Ok(Item::Bin(self.take_blob(len)?))
            }
            Marker::Bin16 => {
                let len = self.len16()?;
                Ok(Item::Bin(self.take_blob(len)?))
            }
            Marker::Bin32 => {
                let len = self.len32()?;
                Ok(Item::Bin(self.take_blob(len)?))
            }
            Marker::Ext8 => {
                let len = self.len8()?;
                self.take_ext(len)
            }
            Marker::Ext16 => {
                let len = self.len16()?;
                self.take_ext(len)
            }
            Marker::Ext32 => {
                let len = self.len32()?;
                self.take_ext(len)
            }
            Marker::F32 => {
                self.demand(4, UnpackError::BufferUnderflow)?;
                let bits = endian::load_u32(self.window.take(4));
                Ok(Item::Float(f32::from_bits(bits)))
            }
            Marker::F64 => {
                self.demand(8, UnpackError::BufferUnderflow)?;
                let bits = endian::load_u64(self.window.take(8));
                Ok(Item::Double(f64::from_bits(bits)))
            }
            Marker::U8 => {
                self.demand(1, UnpackError::BufferUnderflow)?;
                Ok(Item::Unsigned(self.window.take_byte() as u64))
            }
            Marker::U16 => {
                self.demand(2, UnpackError::BufferUnderflow)?;
                Ok(Item::Unsigned(endian::load_u16(self.window.take(2)) as u64))
            }
            Marker::U32 => {
                self.demand(4, UnpackError::BufferUnderflow)?;
                Ok(Item::Unsigned(endian::load_u32(self.window.take(4)) as u64))
            }
            Marker::U64 => {
                self.demand(8, UnpackError::BufferUnderflow)?;
                Ok(Item::Unsigned(endian::load_u64(self.window.take(8))))
            }
            Marker::I8 => {
                self.demand(1, UnpackError::BufferUnderflow)?;
                Ok(int_item(self.window.take_byte() as i8 as i64))
            }
            Marker::I16 => {
                self.demand(2, UnpackError::BufferUnderflow)?;
                Ok(int_item(endian::load_u16(self.window.take(2)) as i16 as i64))
            }
            Marker::I32 => {
                self.demand(4, UnpackError::BufferUnderflow)?;
                Ok(int_item(endian::load_u32(self.window.take(4)) as i32 as i64))
            }
            Marker::I64 => {
                self.demand(8, UnpackError::BufferUnderflow)?;
                Ok(int_item(endian::load_u64(self.window.take(8)) as i64))
            }
            Marker::FixExt1 => self.take_ext(1),
            Marker::FixExt2 => self.take_ext(2),
            Marker::FixExt4 => self.take_ext(4),
            Marker::FixExt8 => self.take_ext(8),
            Marker::FixExt16 => self.take_ext(16),
            Marker::Str8 => {
                let len = self.len8()?;
                Ok(Item::Str(self.take_blob(len)?))
            }
            Marker::Str16 => {
                let len = self.len16()?;
                Ok(Item::Str(self.take_blob(len)?))
            }
            Marker::Str32 => {
                let len = self.len32()?;
                Ok(Item::Str(self.take_blob(len)?))
            }
            Marker::Array16 => Ok(Item::Array(self.len16()? as u32)),
            Marker::Array32 => Ok(Item::Array(self.len32()? as u32)),
            Marker::Map16 => Ok(Item::Map(self.len16()? as u32)),
            Marker::Map32 => Ok(Item::Map(self.len32()? as u32)),
            Marker::FixNeg(value) => Ok(Item::Signed(value as i64)),
        }
    }

    /// Advances over `count` complete items, including the contents of any
    /// composite items, without decoding them.
    ///
    /// Composite headers push their counts back onto the remaining total
    /// (twice the count for maps), so nesting of any depth is traversed
    /// with a single counter and no recursion.
    pub fn skip(&mut self, count: u64) -> Result<(), UnpackError> {
        self.live()?;
        let mut remaining = count;
        while remaining > 0 {
            remaining -= 1;
            self.demand(1, UnpackError::EndOfInput)?;
            let byte = self.window.take_byte();
            match Marker::from_u8(byte) {
                Marker::FixPos(_)
                | Marker::FixNeg(_)
                | Marker::Nil
                | Marker::False
                | Marker::True => {}
                Marker::U8 | Marker::I8 => self.skip_bytes(1)?,
                Marker::U16 | Marker::I16 | Marker::FixExt1 => self.skip_bytes(2)?,
                Marker::FixExt2 => self.skip_bytes(3)?,
                Marker::F32 | Marker::U32 | Marker::I32 => self.skip_bytes(4)?,
                Marker::FixExt4 => self.skip_bytes(5)?,
                Marker::F64 | Marker::U64 | Marker::I64 => self.skip_bytes(8)?,
                Marker::FixExt8 => self.skip_bytes(9)?,
                Marker::FixExt16 => self.skip_bytes(17)?,
                Marker::FixStr(len) => self.skip_bytes(len as usize)?,
                Marker::Str8 | Marker::Bin8 => {
                    let len = self.len8()?;
                    self.skip_bytes(len)?;
                }
                Marker::Str16 | Marker::Bin16 => {
                    let len = self.len16()?;
                    self.skip_bytes(len)?;
                }
                Marker::Str32 | Marker::Bin32 => {
                    let len = self.len32()?;
                    self.skip_bytes(len)?;
                }
                Marker::Ext8 => {
                    let len = self.len8()?;
                    self.skip_bytes(len + 1)?;
                }
                Marker::Ext16 => {
                    let len = self.len16()?;
                    self.skip_bytes(len + 1)?;
                }
                Marker::Ext32 => {
                    let len = self.len32()?;
                    self.skip_bytes(len + 1)?;
                }
                Marker::FixArray(size) => remaining += size as u64,
                Marker::FixMap(size) => remaining += 2 * size as u64,
                Marker::Array16 => remaining += self.len16()? as u64,
                Marker::Array32 => remaining += self.len32()? as u64,
                Marker::Map16 => remaining += 2 * self.len16()? as u64,
                Marker::Map32 => remaining += 2 * self.len32()? as u64,
                Marker::Reserved => return Err(self.fail(UnpackError::Malformed(byte))),
            }
        }
        Ok(())
    }

    fn live(&self) -> Result<(), UnpackError> {
        self.state.map_err(|_| UnpackError::Stopped)
    }

    fn fail(&mut self, err: UnpackError) -> UnpackError {
        self.state = Err(err);
        err
    }

    /// Ensures `needed` unread bytes, reporting `exhausted` when neither
    /// the window nor the handler can provide them. A handler reporting
    /// end of input is translated to `exhausted`, which is
    /// [`UnpackError::EndOfInput`] only at an item boundary.
    fn demand(&mut self, needed: usize, exhausted: UnpackError) -> Result<(), UnpackError> {
        if self.window.remaining() >= needed {
            return Ok(());
        }
        match self.handler.on_underflow(&mut self.window, needed) {
            Ok(()) if self.window.remaining() >= needed => Ok(()),
            Ok(()) => Err(self.fail(exhausted)),
            Err(UnpackError::EndOfInput) => Err(self.fail(exhausted)),
            Err(err) => Err(self.fail(err)),
        }
    }

    fn len8(&mut self) -> Result<usize, UnpackError> {
        self.demand(1, UnpackError::BufferUnderflow)?;
        Ok(self.window.take_byte() as usize)
    }

    fn len16(&mut self) -> Result<usize, UnpackError> {
        self.demand(2, UnpackError::BufferUnderflow)?;
        Ok(endian::load_u16(self.window.take(2)) as usize)
    }

    fn len32(&mut self) -> Result<usize, UnpackError> {
        self.demand(4, UnpackError::BufferUnderflow)?;
        Ok(endian::load_u32(self.window.take(4)) as usize)
    }

    fn take_blob(&mut self, len: usize) -> Result<&'buf [u8], UnpackError> {
        self.demand(len, UnpackError::BufferUnderflow)?;
        Ok(self.window.take(len))
    }

    /// Reads the signed type byte and then `len` payload bytes; both the
    /// ext and fixext forms put the type byte immediately before the
    /// payload.
    fn take_ext(&mut self, len: usize) -> Result<Item<'buf>, UnpackError> {
        self.demand(1, UnpackError::BufferUnderflow)?;
        let ext_type = self.window.take_byte() as i8;
        Ok(Item::Ext(ext_type, self.take_blob(len)?))
    }

    fn skip_bytes(&mut self, len: usize) -> Result<(), UnpackError> {
        self.demand(len, UnpackError::BufferUnderflow)?;
        self.window.take(len);
        Ok(())
    }
}

fn int_item<'buf>(value: i64) -> Item<'buf> {
    if value >= 0 {
        Item::Unsigned(value as u64)
    } else {
        Item::Signed(value)
    }
}

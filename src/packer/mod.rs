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

use crate::endian;
use crate::error::PackError;
use crate::handlers::NoHandler;
use crate::marker::Marker;
use crate::window::PackWindow;


/// Called when an item needs more room than the window has left.
///
/// On success the window must admit at least `requested` further bytes.
/// The usual strategies are draining the filled prefix and rewinding, or
/// replacing the buffer with a fresh one. Returning an error abandons the
/// item and poisons the packer with that code.
pub trait OverflowHandler<'buf> {
    fn on_overflow(
        &mut self,
        window: &mut PackWindow<'buf>,
        requested: usize,
    ) -> Result<(), PackError>;
}

/// Streaming MessagePack encoder over a caller-supplied buffer.
///
/// Each `pack_*` operation appends one item in the shortest legal encoding
/// for its value and advances the cursor; array and map operations write
/// only the header, and the caller emits exactly the announced number of
/// element items afterwards. When an item would not fit, the overflow
/// handler is consulted; without one the packer stops with
/// [`PackError::BufferOverflow`].
///
/// The first error is sticky: after any failure every call returns
/// [`PackError::Stopped`] without touching the buffer, and the only
/// recovery is to discard the packer.
#[derive(Debug)]
pub struct Packer<'buf, H = NoHandler> {
    window: PackWindow<'buf>,
    handler: H,
    state: Result<(), PackError>,
}

impl<'buf> Packer<'buf, NoHandler> {
    /// Creates a packer without overflow recovery; running out of room is
    /// fatal.
    pub fn new(buf: &'buf mut [u8]) -> Result<Self, PackError> {
        Packer::with_handler(buf, NoHandler)
    }
}

impl<'buf, H> Packer<'buf, H>
where
    H: OverflowHandler<'buf>,
{
    /// Creates a packer that consults `handler` whenever the window runs
    /// out of room.
    pub fn with_handler(buf: &'buf mut [u8], handler: H) -> Result<Self, PackError> {
        if !endian::byte_order_ok() {
            return Err(PackError::WrongByteOrder);
        }
        Ok(Packer {
            window: PackWindow::new(buf),
            handler,
            state: Ok(()),
        })
    }

    /// Bytes of encoded output in the current window.
    pub fn position(&self) -> usize {
        self.window.position()
    }

    /// The encoded prefix of the current window.
    pub fn filled(&self) -> &[u8] {
        self.window.filled()
    }

    /// The first error this packer recorded, if any.
    pub fn status(&self) -> Result<(), PackError> {
        self.state
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    /// Releases the window and the handler, e.g. to recover the buffer or
    /// flush a final tail through the handler's sink.
    pub fn into_parts(self) -> (PackWindow<'buf>, H) {
        (self.window, self.handler)
    }

    /// Packs an unsigned integer with the shortest encoding that fits.
    pub fn pack_unsigned(&mut self, value: u64) -> Result<(), PackError> {
        self.live()?;
        if value < 0x80 {
            self.write_marker(Marker::FixPos(value as u8))
        } else if value <= u8::MAX as u64 {
            self.write_u8_field(Marker::U8, value as u8)
        } else if value <= u16::MAX as u64 {
            self.write_u16_field(Marker::U16, value as u16)
        } else if value <= u32::MAX as u64 {
            self.write_u32_field(Marker::U32, value as u32)
        } else {
            self.write_u64_field(Marker::U64, value)
        }
    }

    /// Packs a signed integer. Non-negative values take the unsigned
    /// ladder, so the wire tag follows the value rather than the parameter
    /// type.
    pub fn pack_signed(&mut self, value: i64) -> Result<(), PackError> {
        self.live()?;
        if value >= 0 {
            return self.pack_unsigned(value as u64);
        }
        if value >= -32 {
            self.write_marker(Marker::FixNeg(value as i8))
        } else if value >= i8::MIN as i64 {
            self.write_u8_field(Marker::I8, value as u8)
        } else if value >= i16::MIN as i64 {
            self.write_u16_field(Marker::I16, value as u16)
        } else if value >= i32::MIN as i64 {
            self.write_u32_field(Marker::I32, value as u32)
        } else {
            self.write_u64_field(Marker::I64, value as u64)
        }
    }

    /// Packs a single-precision float as float 32, preserving the exact
    /// bit pattern.
    pub fn pack_float(&mut self, value: f32) -> Result<(), PackError> {
        self.live()?;
        self.write_u32_field(Marker::F32, value.to_bits())
    }

    /// Packs a double-precision float as float 64, preserving the exact
    /// bit pattern.
    pub fn pack_double(&mut self, value: f64) -> Result<(), PackError> {
        self.live()?;
        self.write_u64_field(Marker::F64, value.to_bits())
    }

    pub fn pack_nil(&mut self) -> Result<(), PackError> {
        self.live()?;
        self.write_marker(Marker::Nil)
    }

    pub fn pack_boolean(&mut self, value: bool) -> Result<(), PackError> {
        self.live()?;
        self.write_marker(if value { Marker::True } else { Marker::False })
    }

    /// Packs an array header announcing `size` elements. The elements are
    /// the next `size` items the caller packs; nesting is not tracked.
    pub fn pack_array_size(&mut self, size: u32) -> Result<(), PackError> {
        self.live()?;
        if size < 16 {
            self.write_marker(Marker::FixArray(size as u8))
        } else if size <= u16::MAX as u32 {
            self.write_u16_field(Marker::Array16, size as u16)
        } else {
            self.write_u32_field(Marker::Array32, size)
        }
    }

    /// Packs a map header announcing `size` key-value pairs, i.e.
    /// `2 * size` following items.
    pub fn pack_map_size(&mut self, size: u32) -> Result<(), PackError> {
        self.live()?;
        if size < 16 {
            self.write_marker(Marker::FixMap(size as u8))
        } else if size <= u16::MAX as u32 {
            self.write_u16_field(Marker::Map16, size as u16)
        } else {
            self.write_u32_field(Marker::Map32, size)
        }
    }

    /// Packs a string blob. The bytes are copied verbatim; MessagePack
    /// requires them to be UTF-8 and `&str` guarantees it.
    pub fn pack_str(&mut self, value: &str) -> Result<(), PackError> {
        self.live()?;
        let bytes = value.as_bytes();
        let len = self.blob_len(bytes)?;
        // Header and payload are reserved together so a successful header
        // write guarantees the payload fits.
        if len < 32 {
            self.reserve(bytes.len() + 1)?;
            self.window.push(Marker::FixStr(len as u8).to_u8());
        } else if len <= u8::MAX as u32 {
            self.reserve(bytes.len() + 2)?;
            self.window.push(Marker::Str8.to_u8());
            self.window.push(len as u8);
        } else if len <= u16::MAX as u32 {
            self.reserve(bytes.len() + 3)?;
            self.window.push(Marker::Str16.to_u8());
            self.window.put_u16(len as u16);
        } else {
            self.reserve(bytes.len() + 5)?;
            self.window.push(Marker::Str32.to_u8());
            self.window.put_u32(len);
        }
        self.window.put_slice(bytes);
        Ok(())
    }

    /// Packs a binary blob.
    pub fn pack_bin(&mut self, data: &[u8]) -> Result<(), PackError> {
        self.live()?;
        let len = self.blob_len(data)?;
        if len <= u8::MAX as u32 {
            self.reserve(data.len() + 2)?;
            self.window.push(Marker::Bin8.to_u8());
            self.window.push(len as u8);
        } else if len <= u16::MAX as u32 {
            self.reserve(data.len() + 3)?;
            self.window.push(Marker::Bin16.to_u8());
            self.window.put_u16(len as u16);
        } else {
            self.reserve(data.len() + 5)?;
            self.window.push(Marker::Bin32.to_u8());
            self.window.put_u32(len);
        }
        self.window.put_slice(data);
        Ok(())
    }

    /// Packs an extension blob under a signed 8-bit user type code.
    /// Payloads of exactly 1, 2, 4, 8 or 16 bytes take the fixext forms.
    pub fn pack_ext(&mut self, ext_type: i8, data: &[u8]) -> Result<(), PackError> {
        self.live()?;
        let len = self.blob_len(data)?;
        match len {
            1 => {
                self.reserve(3)?;
                self.window.push(Marker::FixExt1.to_u8());
            }
            2 => {
                self.reserve(4)?;
                self.window.push(Marker::FixExt2.to_u8());
            }
            4 => {
                self.reserve(6)?;
                self.window.push(Marker::FixExt4.to_u8());
            }
            8 => {
                self.reserve(10)?;
                self.window.push(Marker::FixExt8.to_u8());
            }
            16 => {
                self.reserve(18)?;
                self.window.push(Marker::FixExt16.to_u8());
            }
            _ => {
                if len <= u8::MAX as u32 {
                    self.reserve(data.len() + 3)?;
                    self.window.push(Marker::Ext8.to_u8());
                    self.window.push(len as u8);
                } else if len <= u16::MAX as u32 {
                    self.reserve(data.len() + 4)?;
                    self.window.push(Marker::Ext16.to_u8());
                    self.window.put_u16(len as u16);
                } else {
                    self.reserve(data.len() + 6)?;
                    self.window.push(Marker::Ext32.to_u8());
                    self.window.put_u32(len);
                }
            }
        }
        self.window.push(ext_type as u8);
        self.window.put_slice(data);
        Ok(())
    }

    fn live(&self) -> Result<(), PackError> {
        self.state.map_err(|_| PackError::Stopped)
    }

    fn fail(&mut self, err: PackError) -> PackError {
        self.state = Err(err);
        err
    }

    fn blob_len(&mut self, bytes: &[u8]) -> Result<u32, PackError> {
        blob_len(bytes.len()).map_err(|err| self.fail(err))
    }

    /// Ensures `needed` writable bytes, consulting the handler when the
    /// window is short. A handler that reports success without honoring
    /// the guarantee is treated as an overflow.
    fn reserve(&mut self, needed: usize) -> Result<(), PackError> {
        if self.window.remaining() >= needed {
            return Ok(());
        }
        match self.handler.on_overflow(&mut self.window, needed) {
            Ok(()) if self.window.remaining() >= needed => Ok(()),
            Ok(()) => Err(self.fail(PackError::BufferOverflow)),
            Err(err) => Err(self.fail(err)),
        }
    }

    fn write_marker(&mut self, marker: Marker) -> Result<(), PackError> {
        self.reserve(1)?;
        self.window.push(marker.to_u8());
        Ok(())
    }

    fn write_u8_field(&mut self, marker: Marker, field: u8) -> Result<(), PackError> {
        self.reserve(2)?;
        self.window.push(marker.to_u8());
        self.window.push(field);
        Ok(())
    }

    fn write_u16_field(&mut self, marker: Marker, field: u16) -> Result<(), PackError> {
        self.reserve(3)?;
        self.window.push(marker.to_u8());
        self.window.put_u16(field);
        Ok(())
    }

    fn write_u32_field(&mut self, marker: Marker, field: u32) -> Result<(), PackError> {
        self.reserve(5)?;
        self.window.push(marker.to_u8());
        self.window.put_u32(field);
        Ok(())
    }

    fn write_u64_field(&mut self, marker: Marker, field: u64) -> Result<(), PackError> {
        self.reserve(9)?;
        self.window.push(marker.to_u8());
        self.window.put_u64(field);
        Ok(())
    }
}

fn blob_len(len: usize) -> Result<u32, PackError> {
    u32::try_from(len).map_err(|_| PackError::TooLong(len))
}

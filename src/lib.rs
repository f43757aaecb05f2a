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

//! Streaming MessagePack codec over caller-supplied byte buffers.
//!
//! A [`Packer`] serializes primitive and composite items, one at a time,
//! into a borrowed buffer using the shortest legal encoding for each value.
//! An [`Unpacker`] deserializes the next [`Item`] out of a borrowed buffer,
//! borrowing string, binary and extension payloads directly from it without
//! copying. Both move a cursor strictly forward and never allocate.
//!
//! When a buffer runs out mid-stream, a caller-supplied handler (an
//! [`OverflowHandler`] on the pack side, an [`UnderflowHandler`] on the
//! unpack side) is given the chance to supply a fresh window, so a fixed
//! buffer can carry streams of any length. Without a handler, exhaustion is
//! fatal. The [`handlers`] module provides ready-made implementations for
//! the common recovery patterns.
//!
//! Composite items are announced by headers only: an array or map item
//! carries its element or pair count and the contained items follow as
//! further calls. [`Unpacker::skip`] advances over complete items,
//! contents included, without decoding them.
//!
//! # Examples
//!
//! ```
//! use bufpack::{Item, Packer, Unpacker};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut buf = [0u8; 64];
//!
//! let mut packer = Packer::new(&mut buf)?;
//! packer.pack_array_size(2)?;
//! packer.pack_str("answer")?;
//! packer.pack_unsigned(42)?;
//! let len = packer.position();
//!
//! let mut unpacker = Unpacker::new(&buf[..len])?;
//! assert_eq!(unpacker.next()?, Item::Array(2));
//! assert_eq!(unpacker.next()?, Item::Str(b"answer"));
//! assert_eq!(unpacker.next()?, Item::Unsigned(42));
//! # Ok(())
//! # }
//! ```

mod endian;
mod error;
mod marker;
mod window;

pub mod handlers;
mod packer;
mod unpacker;

pub use error::{PackError, UnpackError};
pub use handlers::NoHandler;
pub use marker::Marker;
pub use packer::{OverflowHandler, Packer};
pub use unpacker::{Item, UnderflowHandler, Unpacker};
pub use window::{PackWindow, UnpackWindow};

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

use thiserror::Error;

/// Packing can fail because the output window is exhausted, because a blob
/// exceeds what the wire format can express, or because the packer has
/// already failed.
///
/// The first error a packer observes is recorded; every call after that
/// returns [`PackError::Stopped`] without touching the buffer.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PackError {
    /// An item needed more room than the window had and no handler could
    /// make any.
    #[error("There is no room left in the output buffer.")]
    BufferOverflow,
    /// A blob had more bytes than a MessagePack length field can carry.
    #[error("{0} bytes is too long to encode as MessagePack.")]
    TooLong(usize),
    /// The packer recorded an earlier error and rejects further items.
    #[error("The packer has stopped after an earlier error.")]
    Stopped,
    /// The byte order self check failed on initialization.
    #[error("The byte order self check failed.")]
    WrongByteOrder,
}

/// Unpacking can fail because the input ended (cleanly or mid-item),
/// because the data is not valid MessagePack, or because the unpacker has
/// already failed.
///
/// [`UnpackError::EndOfInput`] and [`UnpackError::BufferUnderflow`] are
/// deliberately distinct: the former is reported only when the input ends
/// exactly on an item boundary and is the one legitimate way for a stream
/// to terminate; the latter means an item was cut short.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum UnpackError {
    /// The input ended at an item boundary.
    #[error("The input ended at an item boundary.")]
    EndOfInput,
    /// The input ended part way through an item.
    #[error("The input ended part way through an item.")]
    BufferUnderflow,
    /// An item started with a byte the format reserves.
    #[error("0x{0:02x} is not a valid item prefix.")]
    Malformed(u8),
    /// The unpacker recorded an earlier error and rejects further reads.
    #[error("The unpacker has stopped after an earlier error.")]
    Stopped,
    /// The byte order self check failed on initialization.
    #[error("The byte order self check failed.")]
    WrongByteOrder,
}

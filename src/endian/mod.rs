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

//! Big-endian load and store for the multi-byte fields of the wire format,
//! plus the byte-order self-check run at context initialization.

use byteorder::{BigEndian, ByteOrder};


pub(crate) fn store_u16(field: &mut [u8], value: u16) {
    BigEndian::write_u16(field, value);
}

pub(crate) fn store_u32(field: &mut [u8], value: u32) {
    BigEndian::write_u32(field, value);
}

pub(crate) fn store_u64(field: &mut [u8], value: u64) {
    BigEndian::write_u64(field, value);
}

pub(crate) fn load_u16(field: &[u8]) -> u16 {
    BigEndian::read_u16(field)
}

pub(crate) fn load_u32(field: &[u8]) -> u32 {
    BigEndian::read_u32(field)
}

pub(crate) fn load_u64(field: &[u8]) -> u64 {
    BigEndian::read_u64(field)
}

const CHECK_PATTERN: &[u8; 4] = b"1234";
const CHECK_VALUE: u32 = 0x3132_3334;

/// Writes the ASCII pattern `"1234"` through the store path and reads it
/// back through the load path, confirming both agree with the big-endian
/// interpretation. A mismatch means the encoding helpers were built with
/// the wrong byte-order assumptions; the caller refuses to construct a
/// context rather than corrupt the first item.
pub(crate) fn byte_order_ok() -> bool {
    let mut probe = [0u8; 4];
    store_u32(&mut probe, CHECK_VALUE);
    probe == *CHECK_PATTERN && load_u32(CHECK_PATTERN) == CHECK_VALUE
}

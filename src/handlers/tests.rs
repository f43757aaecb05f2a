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

use std::io;
use std::io::Write;

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{PackError, UnpackError};
use crate::handlers::{FlushOverflow, SliceRefill};
use crate::packer::{OverflowHandler, Packer};
use crate::unpacker::{Item, Unpacker};

fn pack_sequence<'buf, H>(packer: &mut Packer<'buf, H>) -> Result<(), PackError>
where
    H: OverflowHandler<'buf>,
{
    packer.pack_map_size(2)?;
    packer.pack_str("totals")?;
    packer.pack_array_size(3)?;
    packer.pack_unsigned(987654321)?;
    packer.pack_signed(-987654)?;
    packer.pack_double(2.5)?;
    packer.pack_str("flags")?;
    packer.pack_array_size(3)?;
    packer.pack_boolean(true)?;
    packer.pack_nil()?;
    packer.pack_ext(-4, &[0xde, 0xad])?;
    Ok(())
}

fn packed_whole(capacity: usize) -> Vec<u8> {
    let mut buf = vec![0u8; capacity];
    let mut packer = Packer::new(&mut buf).unwrap();
    pack_sequence(&mut packer).unwrap();
    let len = packer.position();
    buf[..len].to_vec()
}

#[test]
fn flush_overflow_matches_a_single_large_buffer() {
    let expected = packed_whole(4096);

    let mut buffer = BytesMut::new();
    let mut small = [0u8; 16];
    let handler = FlushOverflow::new((&mut buffer).writer());
    let mut packer = Packer::with_handler(&mut small, handler).unwrap();
    pack_sequence(&mut packer).unwrap();

    let (mut window, mut handler) = packer.into_parts();
    handler.flush_tail(&mut window).unwrap();
    drop(handler);

    assert_eq!(buffer.chunk(), expected.as_slice());
}

#[test]
fn flush_overflow_round_trips_through_the_unpacker() {
    let mut buffer = BytesMut::new();
    let mut small = [0u8; 8];
    let handler = FlushOverflow::new((&mut buffer).writer());
    let mut packer = Packer::with_handler(&mut small, handler).unwrap();
    for n in 0..1000u64 {
        packer.pack_unsigned(n * n).unwrap();
    }
    let (mut window, mut handler) = packer.into_parts();
    handler.flush_tail(&mut window).unwrap();
    drop(handler);

    let stream = buffer.chunk();
    let mut unpacker = Unpacker::new(stream).unwrap();
    for n in 0..1000u64 {
        assert_eq!(unpacker.next(), Ok(Item::Unsigned(n * n)));
    }
    assert_eq!(unpacker.next(), Err(UnpackError::EndOfInput));
}

struct FailWriter;

impl Write for FailWriter {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::from(io::ErrorKind::BrokenPipe))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn flush_overflow_reports_sink_failures() {
    let mut buf = [0u8; 4];
    let mut packer = Packer::with_handler(&mut buf, FlushOverflow::new(FailWriter)).unwrap();
    assert!(packer.pack_str("abc").is_ok());
    assert_eq!(packer.pack_nil(), Err(PackError::BufferOverflow));
    assert_eq!(
        packer.handler().last_io_error().map(|err| err.kind()),
        Some(io::ErrorKind::BrokenPipe)
    );
    assert_eq!(packer.pack_nil(), Err(PackError::Stopped));
}

#[test]
fn flush_overflow_cannot_fit_an_oversized_item() {
    let mut sink = Vec::new();
    let mut buf = [0u8; 4];
    let mut packer = Packer::with_handler(&mut buf, FlushOverflow::new(&mut sink)).unwrap();
    assert_eq!(
        packer.pack_str("too big to fit"),
        Err(PackError::BufferOverflow)
    );
    assert!(packer.handler().last_io_error().is_none());
}

#[test]
fn slice_refill_reads_the_same_items_at_every_grain() {
    let stream = packed_whole(512);

    let mut expected = Vec::new();
    let mut unpacker = Unpacker::new(&stream).unwrap();
    loop {
        match unpacker.next() {
            Ok(item) => expected.push(item),
            Err(UnpackError::EndOfInput) => break,
            Err(err) => panic!("unexpected error: {}", err),
        }
    }

    for grain in 1..=stream.len() {
        let handler = SliceRefill::new(&stream, grain);
        let mut unpacker = Unpacker::with_handler(&stream[..0], handler).unwrap();
        let mut items = Vec::new();
        loop {
            match unpacker.next() {
                Ok(item) => items.push(item),
                Err(UnpackError::EndOfInput) => break,
                Err(err) => panic!("grain {}: unexpected error: {}", grain, err),
            }
        }
        assert_eq!(items, expected, "grain {}", grain);
    }
}

#[test]
fn slice_refill_drives_skip() {
    let stream = packed_whole(512);
    for grain in [1, 2, 3, 7, 64] {
        let handler = SliceRefill::new(&stream, grain);
        let mut unpacker = Unpacker::with_handler(&stream[..0], handler).unwrap();
        // The sequence is one map followed by one trailing ext item.
        assert_eq!(unpacker.skip(2), Ok(()));
        assert_eq!(unpacker.handler().served(), stream.len());
        assert_eq!(unpacker.next(), Err(UnpackError::EndOfInput));
    }
}

#[test]
fn slice_refill_translates_exhaustion_by_boundary() {
    let empty: [u8; 0] = [];
    let mut unpacker =
        Unpacker::with_handler(&empty[..0], SliceRefill::new(&empty, 1)).unwrap();
    assert_eq!(unpacker.next(), Err(UnpackError::EndOfInput));

    let truncated = [0xcd, 0x01];
    let mut unpacker =
        Unpacker::with_handler(&truncated[..0], SliceRefill::new(&truncated, 1)).unwrap();
    assert_eq!(unpacker.next(), Err(UnpackError::BufferUnderflow));
}

#[test]
fn slice_refill_blobs_survive_later_refills() {
    let stream = [0xa2, 0x68, 0x69, 0xc4, 0x01, 0xaa, 0x07];
    let handler = SliceRefill::new(&stream, 1);
    let mut unpacker = Unpacker::with_handler(&stream[..0], handler).unwrap();

    let first = unpacker.next().unwrap();
    assert_eq!(unpacker.next(), Ok(Item::Bin(&[0xaa])));
    assert_eq!(unpacker.next(), Ok(Item::Unsigned(7)));

    match first {
        Item::Str(data) => {
            assert_eq!(data, b"hi");
            assert!(std::ptr::eq(data.as_ptr(), stream[1..].as_ptr()));
        }
        other => panic!("unexpected item: {:?}", other),
    }
}

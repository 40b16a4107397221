// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Property tests: every well-formed frame survives the encode/decode
//! round trip byte-for-byte, across the whole descriptor space and with
//! realistic FCS algorithms.

use crc::{Crc, CRC_16_IBM_SDLC, CRC_8_SMBUS};
use l2frame::{byte_reverse, Decoder, Event, FrameDesc, Packet};
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;

const CRC8: Crc<u8> = Crc::<u8>::new(&CRC_8_SMBUS);
const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_SDLC);

fn sum_fcs(data: &[u8], out: &mut [u8]) {
    let mut acc = 0u8;
    for &b in data {
        acc = acc.wrapping_add(b);
    }
    out.fill(0);
    out[0] = acc;
}

fn crc8_fcs(data: &[u8], out: &mut [u8]) {
    out[0] = CRC8.checksum(data);
}

fn crc16_fcs(data: &[u8], out: &mut [u8]) {
    out.copy_from_slice(&CRC16.checksum(data).to_le_bytes());
}

fn no_fcs(_data: &[u8], _out: &mut [u8]) {}

#[derive(Debug, Clone, Copy)]
struct Shape {
    preamble_len: u8,
    head_len: u8,
    len_bits: u8,
    fcs_pick: u8,
}

impl Shape {
    fn build(self) -> FrameDesc {
        let (fcs_len, fcs): (u8, l2frame::FcsFn) = match self.fcs_pick {
            0 => (0, no_fcs),
            1 => (1, sum_fcs),
            2 => (1, crc8_fcs),
            _ => (2, crc16_fcs),
        };
        FrameDesc::new(
            self.preamble_len,
            self.head_len,
            self.len_bits,
            fcs_len,
            fcs,
            byte_reverse,
            byte_reverse,
        )
    }
}

fn shape_strategy() -> impl Strategy<Value = Shape> {
    (1u8..=4, 1u8..=3)
        .prop_flat_map(|(preamble_len, head_len)| {
            let max_bits = 16.min(u32::from(head_len) * 8) as u8;
            (
                Just(preamble_len),
                Just(head_len),
                1..=max_bits,
                0u8..4,
            )
        })
        .prop_map(|(preamble_len, head_len, len_bits, fcs_pick)| Shape {
            preamble_len,
            head_len,
            len_bits,
            fcs_pick,
        })
}

/// A (shape, payload, usr) triple satisfying the encode preconditions.
fn frame_strategy() -> impl Strategy<Value = (Shape, Vec<u8>, u8)> {
    shape_strategy().prop_flat_map(|shape| {
        let desc = shape.build();
        let cap = desc.max_data_len().min(64);
        let usr_span = 1u16 << desc.usr_bits();
        (
            Just(shape),
            proptest::collection::vec(any::<u8>(), 0..=cap),
            (0..usr_span).prop_map(|u| u as u8),
        )
    })
}

proptest::proptest! {
    #[test]
    fn encode_decode_roundtrip((shape, data, usr) in frame_strategy()) {
        let desc = shape.build();
        let pkt = Packet { data: &data, usr };

        let mut wire = vec![0u8; desc.frame_len(data.len())];
        let written = desc.encode(&pkt, &mut wire).unwrap();
        prop_assert_eq!(written, wire.len());

        let mut rx =
            vec![0u8; desc.rx_buffer_len(desc.max_data_len().min(64))];
        let mut dec = Decoder::new(desc, &mut rx);
        let mut frames = 0;
        for (i, &b) in wire.iter().enumerate() {
            match dec.feed(b) {
                Event::Pending => {}
                Event::Frame { usr: got_usr, data: got } => {
                    frames += 1;
                    prop_assert_eq!(i, wire.len() - 1);
                    prop_assert_eq!(got_usr, usr);
                    prop_assert_eq!(got, &data[..]);
                }
                other => {
                    return Err(TestCaseError::fail(
                        format!("unexpected event {other:?} at byte {i}"),
                    ));
                }
            }
        }
        prop_assert_eq!(frames, 1);
    }

    #[test]
    fn garbage_prefix_costs_one_drop_each(
        (shape, data, usr) in frame_strategy(),
        prefix in proptest::collection::vec(
            any::<u8>().prop_filter("not sync", |&b| b != 0xAA),
            0..12,
        ),
    ) {
        let desc = shape.build();
        let pkt = Packet { data: &data, usr };
        let mut wire = prefix.clone();
        let mut frame = vec![0u8; desc.frame_len(data.len())];
        desc.encode(&pkt, &mut frame).unwrap();
        wire.extend(frame);

        let mut rx =
            vec![0u8; desc.rx_buffer_len(desc.max_data_len().min(64))];
        let mut dec = Decoder::new(desc, &mut rx);
        let mut drops = 0;
        let mut frames = 0;
        for &b in &wire {
            match dec.feed(b) {
                Event::DropSync => drops += 1,
                Event::Frame { data: got, .. } => {
                    frames += 1;
                    prop_assert_eq!(got, &data[..]);
                }
                Event::Pending => {}
                other => {
                    return Err(TestCaseError::fail(
                        format!("unexpected event {other:?}"),
                    ));
                }
            }
        }
        prop_assert_eq!(drops, prefix.len());
        prop_assert_eq!(frames, 1);
    }
}

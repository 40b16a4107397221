// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Framed layer-2 codec for byte-oriented serial links.
//!
//! Frames look like this on the wire:
//!
//! ```text
//!     || preamble || usr | len || payload || fcs ||
//! ```
//!
//! - The preamble is a run of [`PREAMBLE_BYTE`] marking frame start.
//! - The header is a big-endian integer whose low `len_bits` bits carry the
//!   payload length; the remaining high bits of its first byte carry `usr`,
//!   a small tag the link layer does not interpret.
//! - The trailer is a frame check sequence computed over the payload only.
//!
//! All field widths are configured per channel through a [`FrameDesc`],
//! which also carries the three caller-supplied hooks: the FCS algorithm
//! and the to/from network byte order swaps. The swaps are in-place byte
//! reversals on little-endian hosts ([`byte_reverse`]) and no-ops on
//! big-endian ones ([`no_swap`]); the codec itself is byte-order agnostic.
//!
//! Encoding is a one-shot operation into a caller buffer. Decoding is
//! streaming: a [`Decoder`] is fed one byte at a time (straight from a
//! UART ISR, a ring, or a slot buffer) and reports one [`Event`] per byte.
//! Garbage and corruption never wedge the decoder; every failure is a
//! local resynchronization that sends it back to hunting for a preamble.
//!
//! A decoded frame borrows the decoder's receive buffer, so the borrow
//! checker enforces the ownership rule that the payload must be consumed
//! before the next byte is fed.

#![cfg_attr(not(test), no_std)]

/// The sync byte; a frame starts with a configured number of these.
pub const PREAMBLE_BYTE: u8 = 0xAA;

/// Upper bound on the FCS width, sized for the scratch buffer the decoder
/// compares against. Wide enough for CRC-64.
pub const FCS_MAX: usize = 8;

/// FCS hook: computes a check sequence over `data`, filling `out`
/// completely. Must be pure and deterministic.
pub type FcsFn = fn(data: &[u8], out: &mut [u8]);

/// Byte order hook: converts a field between host and network order in
/// place. Must be an involution (`swap(swap(x)) == x`).
pub type SwapFn = fn(buf: &mut [u8]);

/// Host-to/from-network swap for little-endian hosts.
pub fn byte_reverse(buf: &mut [u8]) {
    buf.reverse();
}

/// Identity swap, for hosts whose native field layout already matches the
/// wire. The usr bits live in the wire's first header byte, so a channel
/// with a multi-byte header should pair nonzero usr with [`byte_reverse`].
pub fn no_swap(_buf: &mut [u8]) {}

/// Immutable per-channel frame layout description.
///
/// Construct with [`FrameDesc::new`], which checks the layout invariants
/// once so the hot paths don't have to.
#[derive(Copy, Clone, Debug)]
pub struct FrameDesc {
    preamble_len: u8,
    head_len: u8,
    len_bits: u8,
    fcs_len: u8,
    fcs: FcsFn,
    to_net: SwapFn,
    from_net: SwapFn,
}

impl FrameDesc {
    /// Creates a descriptor.
    ///
    /// # Panics
    ///
    /// Panics on a nonsensical layout: zero preamble or header, `len_bits`
    /// outside `1..=16`, a length field wider than the header, or an FCS
    /// wider than [`FCS_MAX`].
    pub fn new(
        preamble_len: u8,
        head_len: u8,
        len_bits: u8,
        fcs_len: u8,
        fcs: FcsFn,
        to_net: SwapFn,
        from_net: SwapFn,
    ) -> Self {
        assert!(preamble_len >= 1, "need at least one preamble byte");
        assert!(head_len >= 1, "need at least one header byte");
        assert!(
            (1..=16).contains(&len_bits),
            "length field must be 1..=16 bits"
        );
        assert!(
            usize::from(len_bits) <= usize::from(head_len) * 8,
            "length field wider than header"
        );
        assert!(usize::from(fcs_len) <= FCS_MAX, "FCS too wide");
        Self {
            preamble_len,
            head_len,
            len_bits,
            fcs_len,
            fcs,
            to_net,
            from_net,
        }
    }

    /// Number of usr bits packed into the header's first byte. Zero when
    /// the length field ends on a byte boundary, in which case usr is not
    /// transmitted at all.
    pub fn usr_bits(&self) -> u8 {
        (8 - self.len_bits % 8) % 8
    }

    /// Largest payload the length field can express.
    pub fn max_data_len(&self) -> usize {
        (1usize << self.len_bits) - 1
    }

    /// Total wire size of a frame carrying `data_len` payload bytes.
    pub fn frame_len(&self, data_len: usize) -> usize {
        usize::from(self.preamble_len)
            + usize::from(self.head_len)
            + data_len
            + usize::from(self.fcs_len)
    }

    /// Worst-case wire size of a frame on this channel.
    pub fn max_frame_len(&self) -> usize {
        self.frame_len(self.max_data_len())
    }

    /// Receive buffer size needed to decode a frame carrying `data_len`
    /// payload bytes. The header is parsed in place before the payload
    /// arrives, so the buffer holds whichever stage is larger.
    pub fn rx_buffer_len(&self, data_len: usize) -> usize {
        usize::from(self.head_len).max(data_len + usize::from(self.fcs_len))
    }

    fn len_bytes(&self) -> usize {
        (usize::from(self.len_bits) + 7) / 8
    }

    /// Encodes one frame into `out`, returning the number of bytes
    /// written.
    ///
    /// `usr` bits beyond what the header can carry are a caller bug; they
    /// trip a debug assertion and are masked off in release builds.
    pub fn encode(
        &self,
        pkt: &Packet<'_>,
        out: &mut [u8],
    ) -> Result<usize, EncodeError> {
        let data_len = pkt.data.len();
        if data_len > self.max_data_len() {
            return Err(EncodeError::PayloadTooLong);
        }
        let total = self.frame_len(data_len);
        if out.len() < total {
            return Err(EncodeError::BufferTooSmall);
        }

        let usr_bits = self.usr_bits();
        debug_assert!(
            u32::from(pkt.usr) < (1u32 << usr_bits),
            "usr value does not fit the header"
        );

        let n = usize::from(self.preamble_len);
        let h = usize::from(self.head_len);
        let f = usize::from(self.fcs_len);

        out[..n].fill(PREAMBLE_BYTE);

        {
            let head = &mut out[n..n + h];
            head.fill(0);
            let lb = self.len_bytes();
            head[..lb]
                .copy_from_slice(&(data_len as u16).to_le_bytes()[..lb]);
            (self.to_net)(head);
            if usr_bits > 0 {
                let keep = (1u8 << (8 - usr_bits)) - 1;
                let usr = pkt.usr & ((1u16 << usr_bits) - 1) as u8;
                head[0] = (head[0] & keep) | (usr << (8 - usr_bits));
            }
        }

        let data_at = n + h;
        out[data_at..data_at + data_len].copy_from_slice(pkt.data);

        let fcs_at = data_at + data_len;
        (self.fcs)(pkt.data, &mut out[fcs_at..fcs_at + f]);
        (self.to_net)(&mut out[fcs_at..fcs_at + f]);

        Ok(total)
    }
}

/// One frame's worth of application data.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Packet<'a> {
    pub data: &'a [u8],
    pub usr: u8,
}

/// Why an encode was refused. These indicate caller bugs, not link
/// conditions; fix the code rather than retrying.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EncodeError {
    /// Output buffer smaller than [`FrameDesc::frame_len`].
    BufferTooSmall,
    /// Payload longer than the length field can express.
    PayloadTooLong,
}

/// Outcome of feeding one byte to a [`Decoder`].
///
/// The `Frame` payload borrows the decoder's receive buffer and must be
/// consumed before the next byte is fed; the drop variants are local
/// resynchronization events after which feeding simply continues.
#[derive(Debug, PartialEq, Eq)]
pub enum Event<'a> {
    /// Mid-frame; feed more bytes.
    Pending,
    /// A complete frame passed its check.
    Frame { usr: u8, data: &'a [u8] },
    /// Byte was not a preamble byte while hunting for frame start.
    DropSync,
    /// Header declared a length beyond the field bound or beyond the
    /// receive buffer; the frame is abandoned.
    DropTooLong,
    /// Frame check mismatch; the frame is dropped whole.
    DropFcs,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Stage {
    Preamble,
    Head,
    Data,
    Fcs,
}

/// Streaming frame decoder.
///
/// Owns a caller-provided receive buffer for the duration of its life; see
/// [`FrameDesc::rx_buffer_len`] for sizing. The header is staged at the
/// start of the buffer, then overwritten by the payload once parsed, so
/// the payload handed out by [`Event::Frame`] always starts at offset 0.
pub struct Decoder<'b> {
    desc: FrameDesc,
    buf: &'b mut [u8],
    /// Write cursor within the current stage. Always within `buf`.
    next: usize,
    stage: Stage,
    data_len: usize,
    usr: u8,
}

impl<'b> Decoder<'b> {
    /// Creates a decoder hunting for a preamble.
    ///
    /// # Panics
    ///
    /// Panics if `buf` cannot even hold the header.
    pub fn new(desc: FrameDesc, buf: &'b mut [u8]) -> Self {
        assert!(
            buf.len() >= usize::from(desc.head_len),
            "receive buffer smaller than the frame header"
        );
        Self {
            desc,
            buf,
            next: 0,
            stage: Stage::Preamble,
            data_len: 0,
            usr: 0,
        }
    }

    /// Abandons any partially received frame and resumes preamble hunting.
    pub fn reset(&mut self) {
        self.next = 0;
        self.stage = Stage::Preamble;
    }

    /// Consumes one received byte and reports what happened.
    pub fn feed(&mut self, byte: u8) -> Event<'_> {
        match self.stage {
            Stage::Preamble => {
                if byte != PREAMBLE_BYTE {
                    self.next = 0;
                    return Event::DropSync;
                }
                self.next += 1;
                if self.next >= usize::from(self.desc.preamble_len) {
                    self.next = 0;
                    self.stage = Stage::Head;
                }
                Event::Pending
            }
            Stage::Head => {
                self.buf[self.next] = byte;
                self.next += 1;
                if self.next < usize::from(self.desc.head_len) {
                    return Event::Pending;
                }
                self.parse_head()
            }
            Stage::Data => {
                self.buf[self.next] = byte;
                self.next += 1;
                if self.next < self.data_len {
                    return Event::Pending;
                }
                if self.desc.fcs_len == 0 {
                    return self.finish(true);
                }
                // Keep the cursor: the FCS lands right after the payload.
                self.stage = Stage::Fcs;
                Event::Pending
            }
            Stage::Fcs => {
                self.buf[self.next] = byte;
                self.next += 1;
                let f = usize::from(self.desc.fcs_len);
                if self.next < self.data_len + f {
                    return Event::Pending;
                }
                let fcs_at = self.data_len;
                (self.desc.from_net)(&mut self.buf[fcs_at..fcs_at + f]);
                let mut expect = [0u8; FCS_MAX];
                (self.desc.fcs)(
                    &self.buf[..self.data_len],
                    &mut expect[..f],
                );
                let good = self.buf[fcs_at..fcs_at + f] == expect[..f];
                self.finish(good)
            }
        }
    }

    /// Parses a fully buffered header, deciding how the frame continues.
    fn parse_head(&mut self) -> Event<'_> {
        let h = usize::from(self.desc.head_len);
        let usr_bits = self.desc.usr_bits();

        let mut usr = 0;
        if usr_bits > 0 {
            usr = self.buf[0] >> (8 - usr_bits);
            self.buf[0] &= (1u8 << (8 - usr_bits)) - 1;
        }
        (self.desc.from_net)(&mut self.buf[..h]);

        let lb = self.desc.len_bytes();
        let mut le = [0u8; 2];
        le[..lb].copy_from_slice(&self.buf[..lb]);
        let data_len = usize::from(u16::from_le_bytes(le));

        self.next = 0;
        if data_len > self.desc.max_data_len()
            || data_len + usize::from(self.desc.fcs_len) > self.buf.len()
        {
            self.stage = Stage::Preamble;
            return Event::DropTooLong;
        }

        self.usr = usr;
        self.data_len = data_len;
        if data_len == 0 && self.desc.fcs_len == 0 {
            return self.finish(true);
        }
        self.stage = if data_len == 0 { Stage::Fcs } else { Stage::Data };
        Event::Pending
    }

    /// Terminal transition shared by the success and FCS-failure paths:
    /// rearm for the next frame and report this one.
    fn finish(&mut self, good: bool) -> Event<'_> {
        self.next = 0;
        self.stage = Stage::Preamble;
        if good {
            Event::Frame {
                usr: self.usr,
                data: &self.buf[..self.data_len],
            }
        } else {
            Event::DropFcs
        }
    }
}

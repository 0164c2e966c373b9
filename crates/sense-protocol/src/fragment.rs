//! Fragment encoding/decoding utilities.
//!
//! The radio link bounds each transmission unit (20 bytes by default), so a
//! message is split into ordered fragments. The first fragment carries the
//! total fragment count:
//!
//! ```text
//! first:      +---------+-------+-------------------+
//!             | seq = 0 | total | data...           |
//!             +---------+-------+-------------------+
//! following:  +-----+-----------------------+
//!             | seq | data...               |
//!             +-----+-----------------------+
//! ```
//!
//! Sequence numbers increase by one. Reassembly does not tolerate missing,
//! repeated, or reordered fragments.

use bytes::{BufMut, Bytes, BytesMut};

use crate::constants::*;
use crate::error::ProtocolError;

/// One bounded transmission unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    /// Raw fragment bytes, header included.
    pub payload: Bytes,
}

impl Fragment {
    /// Wrap raw fragment bytes received from the link.
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Fragment {
            payload: payload.into(),
        }
    }

    /// Sequence number of this fragment.
    pub fn seq(&self) -> Option<u8> {
        self.payload.first().copied()
    }

    /// Fragment length in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Whether the fragment is empty.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

impl AsRef<[u8]> for Fragment {
    fn as_ref(&self) -> &[u8] {
        &self.payload
    }
}

/// A codec for splitting and reassembling fragmented messages.
///
/// One codec handles one direction at a time; reassembly state covers a
/// single message in flight.
#[derive(Debug)]
pub struct FragmentCodec {
    /// Maximum bytes per fragment.
    unit_size: usize,
    /// Buffer for accumulating incoming data.
    buffer: BytesMut,
    /// Total fragments announced by the current message, 0 when idle.
    total: u8,
    /// Sequence number expected next.
    next_seq: u8,
}

impl Default for FragmentCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl FragmentCodec {
    /// Create a codec for the default 20-byte unit.
    pub fn new() -> Self {
        Self::with_unit_size(MAX_FRAGMENT_SIZE)
    }

    /// Create a codec for a negotiated unit size.
    ///
    /// Sizes too small to carry a header and one data byte are raised to
    /// that minimum.
    pub fn with_unit_size(unit_size: usize) -> Self {
        FragmentCodec {
            unit_size: unit_size.max(FIRST_FRAGMENT_HEADER + 1),
            buffer: BytesMut::with_capacity(unit_size * 4),
            total: 0,
            next_seq: 0,
        }
    }

    /// Get the unit size.
    pub fn unit_size(&self) -> usize {
        self.unit_size
    }

    /// Largest message that fits in [`MAX_FRAGMENTS`] fragments.
    pub fn max_message_len(&self) -> usize {
        (self.unit_size - FIRST_FRAGMENT_HEADER)
            + (MAX_FRAGMENTS - 1) * (self.unit_size - FRAGMENT_HEADER)
    }

    /// Split a message into ordered fragments.
    pub fn split(&self, message: &[u8]) -> Result<Vec<Fragment>, ProtocolError> {
        let max = self.max_message_len();
        if message.len() > max {
            return Err(ProtocolError::MessageTooLarge {
                max,
                actual: message.len(),
            });
        }

        let first_len = message.len().min(self.unit_size - FIRST_FRAGMENT_HEADER);
        let (head, rest) = message.split_at(first_len);
        let chunk = self.unit_size - FRAGMENT_HEADER;
        let total = 1 + rest.len().div_ceil(chunk);

        let mut fragments = Vec::with_capacity(total);

        let mut first = BytesMut::with_capacity(FIRST_FRAGMENT_HEADER + head.len());
        first.put_u8(0);
        first.put_u8(total as u8);
        first.put_slice(head);
        fragments.push(Fragment::new(first.freeze()));

        for (i, data) in rest.chunks(chunk).enumerate() {
            let mut frag = BytesMut::with_capacity(FRAGMENT_HEADER + data.len());
            frag.put_u8((i + 1) as u8);
            frag.put_slice(data);
            fragments.push(Fragment::new(frag.freeze()));
        }

        log::trace!("split {} bytes into {} fragments", message.len(), total);
        Ok(fragments)
    }

    /// Feed one received fragment.
    ///
    /// Returns `Ok(Some(message))` once the last fragment arrives, or
    /// `Ok(None)` if more fragments are needed. Any error resets the
    /// reassembly state.
    pub fn feed(&mut self, fragment: &[u8]) -> Result<Option<Vec<u8>>, ProtocolError> {
        match self.accept(fragment) {
            Ok(done) => Ok(done),
            Err(e) => {
                log::debug!("fragment rejected, resetting: {}", e);
                self.reset();
                Err(e)
            }
        }
    }

    fn accept(&mut self, fragment: &[u8]) -> Result<Option<Vec<u8>>, ProtocolError> {
        let Some((&seq, data)) = fragment.split_first() else {
            return Err(ProtocolError::InvalidEncoding("empty fragment".into()));
        };

        if seq != self.next_seq {
            return Err(ProtocolError::DataLostOrOutOfOrder {
                expected: self.next_seq,
                actual: seq,
            });
        }

        let data = if seq == 0 {
            let Some((&total, data)) = data.split_first() else {
                return Err(ProtocolError::InvalidEncoding(
                    "first fragment missing total".into(),
                ));
            };
            if total == 0 {
                return Err(ProtocolError::InvalidEncoding(
                    "fragment total is zero".into(),
                ));
            }
            self.total = total;
            data
        } else {
            data
        };

        self.buffer.extend_from_slice(data);
        log::trace!("fragment {}/{} ({} bytes)", seq + 1, self.total, data.len());

        if seq + 1 == self.total {
            let message = self.buffer.split().to_vec();
            self.reset();
            return Ok(Some(message));
        }

        self.next_seq = seq + 1;
        Ok(None)
    }

    /// Whether a message is partially reassembled.
    pub fn in_progress(&self) -> bool {
        self.total != 0
    }

    /// Get the number of buffered bytes.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Discard any partial message.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.total = 0;
        self.next_seq = 0;
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The internet checksum.
//!
//! [`Checksum`] is a rolling one's complement sum. It can be built up
//! from scratch or seeded from an existing header value and adjusted
//! incrementally as bytes are rewritten, which is how the rewriter
//! updates a header in O(1) rather than rescanning it (RFC 1071,
//! RFC 1624).
//!
//! One note on byte order: the checksum is not a logical integer, it
//! is a pair of bytes. Both the bytes being summed and the resulting
//! sum are treated as native-endian 16-bit words; because the input
//! is in network order, the sum written back to memory lands in
//! network order as well, on either endianness (RFC 1071 §1.B). Never
//! byte-swap a checksum field.

/// A checksum value as it sits in a header: the one's complement of
/// the one's complement sum.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct HeaderChecksum {
    inner: [u8; 2],
}

impl HeaderChecksum {
    /// Return the bytes of this header checksum.
    pub fn bytes(&self) -> [u8; 2] {
        self.inner
    }

    /// Wrap a pair of bytes which represent a header checksum.
    ///
    /// The "wrap" verbiage is meant to make it clear that the bytes
    /// have already had one's complement applied.
    pub fn wrap(hc: [u8; 2]) -> Self {
        Self { inner: hc }
    }
}

impl From<Checksum> for HeaderChecksum {
    /// Finalize the rolling checksum and put it into header form.
    fn from(mut csum: Checksum) -> HeaderChecksum {
        // Native-endian; see the module comment.
        Self { inner: (!csum.finalize()).to_ne_bytes() }
    }
}

impl From<HeaderChecksum> for Checksum {
    fn from(hc: HeaderChecksum) -> Self {
        // Native-endian; see the module comment.
        Self { sum: (!u16::from_ne_bytes(hc.bytes())) as u32 }
    }
}

/// A rolling one's complement sum.
///
/// Carries accumulate in the upper bits and are folded only when the
/// finalized value is needed.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Checksum {
    sum: u32,
}

impl Checksum {
    /// Compute a fresh sum over `bytes`.
    pub fn compute(bytes: &[u8]) -> Self {
        let mut csum = Self::default();
        csum.add_bytes(bytes);
        csum
    }

    /// Add the contents of `bytes` to the sum.
    pub fn add_bytes(&mut self, bytes: &[u8]) {
        let mut chunks = bytes.chunks_exact(2);
        for pair in &mut chunks {
            self.sum += u16::from_ne_bytes([pair[0], pair[1]]) as u32;
        }

        if let [last] = chunks.remainder() {
            self.sum += *last as u32;
        }
    }

    /// Subtract the contents of `bytes` from the sum.
    ///
    /// In one's complement arithmetic subtraction is addition of the
    /// complement, which keeps the rolling form additive-only.
    pub fn sub_bytes(&mut self, bytes: &[u8]) {
        let mut chunks = bytes.chunks_exact(2);
        for pair in &mut chunks {
            self.sum += (!u16::from_ne_bytes([pair[0], pair[1]])) as u32;
        }

        if let [last] = chunks.remainder() {
            self.sum += (!*last) as u32;
        }
    }

    /// Fold the accumulated carries and return the resulting sum.
    pub fn finalize(&mut self) -> u16 {
        while (self.sum >> 16) != 0 {
            self.sum = (self.sum >> 16) + (self.sum & 0xFFFF);
        }

        (self.sum & 0xFFFF) as u16
    }
}

impl From<u32> for Checksum {
    fn from(sum: u32) -> Self {
        Self { sum }
    }
}

impl core::ops::Add for Checksum {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self { sum: self.sum + other.sum }
    }
}

impl core::ops::AddAssign for Checksum {
    fn add_assign(&mut self, other: Self) {
        self.sum += other.sum
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! IPv4 headers.

use super::packet::FrameReader;
use super::packet::RawHeader;
use super::packet::ReadErr;
use core::fmt;
use core::fmt::Display;
pub use natlb_api::Ipv4Addr;
pub use natlb_api::Protocol;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;
use zerocopy::Ref;
use zerocopy::Unaligned;

pub const IPV4_HDR_LEN_MASK: u8 = 0x0F;
pub const IPV4_HDR_VER_MASK: u8 = 0xF0;
pub const IPV4_HDR_VER_SHIFT: u8 = 4;
pub const IPV4_VERSION: u8 = 4;

/// The header length, in 32-bit words, when no options are carried.
/// This pipeline refuses anything else.
pub const IPV4_HDR_WORDS_NO_OPTS: u8 = 5;

pub const IPV4_HDR_SZ: usize = Ipv4HdrRaw::SIZE;

/// Offsets of rewrite-relevant fields, relative to the start of the
/// header.
pub const IPV4_CSUM_OFFSET: usize = 10;
pub const IPV4_SRC_OFFSET: usize = 12;
pub const IPV4_DST_OFFSET: usize = 16;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Ipv4HdrError {
    BadVersion { vsn: u8 },
    OptionsPresent { hdr_len_words: u8 },
    ReadError(ReadErr),
}

impl From<ReadErr> for Ipv4HdrError {
    fn from(error: ReadErr) -> Self {
        Ipv4HdrError::ReadError(error)
    }
}

impl Display for Ipv4HdrError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::BadVersion { vsn } => write!(f, "bad IP version: {}", vsn),
            Self::OptionsPresent { hdr_len_words } => {
                write!(f, "IP options present (IHL {})", hdr_len_words)
            }
            Self::ReadError(e) => write!(f, "read error: {:?}", e),
        }
    }
}

/// A view onto the network header of a frame.
#[derive(Debug)]
pub struct Ipv4Hdr<'a> {
    bytes: Ref<&'a [u8], Ipv4HdrRaw>,
}

impl<'a> Ipv4Hdr<'a> {
    pub const SIZE: usize = Ipv4HdrRaw::SIZE;

    /// Parse the fixed header, verifying there is nothing beyond it.
    ///
    /// The IHL is in units of 32-bit words and must match the fixed
    /// header exactly; a header carrying options declares a larger
    /// value and is rejected rather than skipped.
    pub fn parse(rdr: &mut FrameReader<'a>) -> Result<Self, Ipv4HdrError> {
        let ip = Self { bytes: Ipv4HdrRaw::raw_zc(rdr)? };

        match ip.version() {
            IPV4_VERSION => {}
            vsn => return Err(Ipv4HdrError::BadVersion { vsn }),
        }

        let words = ip.hdr_len_words();
        if words != IPV4_HDR_WORDS_NO_OPTS {
            return Err(Ipv4HdrError::OptionsPresent { hdr_len_words: words });
        }

        Ok(ip)
    }

    /// Return the declared header length, in 32-bit words.
    #[inline]
    pub fn hdr_len_words(&self) -> u8 {
        self.bytes.ver_hdr_len & IPV4_HDR_LEN_MASK
    }

    /// Return the source address.
    #[inline]
    pub fn src(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.bytes.src)
    }

    /// Return the destination address.
    #[inline]
    pub fn dst(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.bytes.dst)
    }

    /// Return the transport protocol.
    #[inline]
    pub fn proto(&self) -> Protocol {
        Protocol::from(self.bytes.proto)
    }

    #[inline]
    pub fn csum(&self) -> [u8; 2] {
        self.bytes.csum
    }

    #[inline]
    pub fn ttl(&self) -> u8 {
        self.bytes.ttl
    }

    /// Return the value of the `Total Length` field.
    #[inline]
    pub fn total_len(&self) -> u16 {
        u16::from_be_bytes(self.bytes.total_len)
    }

    /// Return the reported IP version field from the packet.
    #[inline]
    pub fn version(&self) -> u8 {
        self.bytes.ver_hdr_len >> IPV4_HDR_VER_SHIFT
    }
}

/// Note: For now we keep this unaligned to be safe.
#[repr(C)]
#[derive(
    Clone, Debug, FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned,
)]
pub struct Ipv4HdrRaw {
    pub ver_hdr_len: u8,
    pub dscp_ecn: u8,
    pub total_len: [u8; 2],
    pub ident: [u8; 2],
    pub frag_and_flags: [u8; 2],
    pub ttl: u8,
    pub proto: u8,
    pub csum: [u8; 2],
    pub src: [u8; 4],
    pub dst: [u8; 4],
}

impl<'a> RawHeader<'a> for Ipv4HdrRaw {
    #[inline]
    fn raw_zc<'b>(
        rdr: &'b mut FrameReader<'a>,
    ) -> Result<Ref<&'a [u8], Self>, ReadErr> {
        let src = rdr.slice(Self::SIZE)?;
        Ref::from_bytes(src).map_err(|_| ReadErr::BadLayout)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[rustfmt::skip]
    fn tcp_hdr_bytes() -> [u8; 20] {
        [
            // version + IHL
            0x45,
            // DSCP + ECN
            0x00,
            // total length
            0x00, 0x3C,
            // ident
            0x0A, 0x66,
            // flags + frag offset
            0x40, 0x00,
            // TTL
            0x40,
            // protocol
            0x06,
            // checksum
            0x00, 0x00,
            // source
            0x0A, 0x00, 0x00, 0x05,
            // dest
            0xCB, 0x00, 0x71, 0x09,
        ]
    }

    #[test]
    fn parse_no_opts() {
        let bytes = tcp_hdr_bytes();
        let mut rdr = FrameReader::new(&bytes);
        let ip = Ipv4Hdr::parse(&mut rdr).unwrap();

        assert_eq!(ip.version(), 4);
        assert_eq!(ip.hdr_len_words(), 5);
        assert_eq!(ip.proto(), Protocol::TCP);
        assert_eq!(ip.src(), "10.0.0.5".parse().unwrap());
        assert_eq!(ip.dst(), "203.0.113.9".parse().unwrap());
        assert_eq!(ip.total_len(), 60);
    }

    #[test]
    fn reject_options() {
        let mut bytes = tcp_hdr_bytes();
        bytes[0] = 0x46;
        let mut rdr = FrameReader::new(&bytes);
        assert_eq!(
            Ipv4Hdr::parse(&mut rdr).unwrap_err(),
            Ipv4HdrError::OptionsPresent { hdr_len_words: 6 },
        );
    }

    #[test]
    fn reject_bad_version() {
        let mut bytes = tcp_hdr_bytes();
        bytes[0] = 0x65;
        let mut rdr = FrameReader::new(&bytes);
        assert_eq!(
            Ipv4Hdr::parse(&mut rdr).unwrap_err(),
            Ipv4HdrError::BadVersion { vsn: 6 },
        );
    }

    #[test]
    fn reject_short() {
        let bytes = [0x45u8; 19];
        let mut rdr = FrameReader::new(&bytes);
        assert_eq!(
            Ipv4Hdr::parse(&mut rdr).unwrap_err(),
            Ipv4HdrError::ReadError(ReadErr::NotEnoughBytes),
        );
    }
}

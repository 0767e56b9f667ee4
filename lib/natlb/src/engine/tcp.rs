// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! TCP headers.

use super::packet::FrameReader;
use super::packet::RawHeader;
use super::packet::ReadErr;
use bitflags::bitflags;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;
use zerocopy::Ref;
use zerocopy::Unaligned;

pub const TCP_HDR_OFFSET_MASK: u8 = 0xF0;
pub const TCP_HDR_OFFSET_SHIFT: u8 = 4;

pub const TCP_HDR_SZ: usize = TcpHdrRaw::SIZE;

/// Offset of the checksum field, relative to the start of the header.
pub const TCP_CSUM_OFFSET: usize = 16;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct TcpFlags: u8 {
        const FIN = 0x01;
        const SYN = 0x02;
        const RST = 0x04;
        const PSH = 0x08;
        const ACK = 0x10;
        const URG = 0x20;
        const ECE = 0x40;
        const CWR = 0x80;
    }
}

/// A view onto the transport header of a frame.
///
/// Only the fixed 20 bytes are mapped; options, if declared by the
/// data offset, are payload as far as this pipeline is concerned.
#[derive(Debug)]
pub struct TcpHdr<'a> {
    bytes: Ref<&'a [u8], TcpHdrRaw>,
}

impl<'a> TcpHdr<'a> {
    pub const SIZE: usize = TcpHdrRaw::SIZE;

    pub fn parse(rdr: &mut FrameReader<'a>) -> Result<Self, ReadErr> {
        Ok(Self { bytes: TcpHdrRaw::raw_zc(rdr)? })
    }

    /// Return the source port.
    #[inline]
    pub fn src_port(&self) -> u16 {
        u16::from_be_bytes(self.bytes.src_port)
    }

    /// Return the destination port.
    #[inline]
    pub fn dst_port(&self) -> u16 {
        u16::from_be_bytes(self.bytes.dst_port)
    }

    #[inline]
    pub fn flags(&self) -> TcpFlags {
        TcpFlags::from_bits_retain(self.bytes.flags)
    }

    #[inline]
    pub fn seq(&self) -> u32 {
        u32::from_be_bytes(self.bytes.seq)
    }

    #[inline]
    pub fn ack(&self) -> u32 {
        u32::from_be_bytes(self.bytes.ack)
    }

    #[inline]
    pub fn csum(&self) -> [u8; 2] {
        self.bytes.csum
    }

    /// Return the declared header length, in bytes.
    #[inline]
    pub fn hdr_len(&self) -> usize {
        let words =
            (self.bytes.offset & TCP_HDR_OFFSET_MASK) >> TCP_HDR_OFFSET_SHIFT;
        usize::from(words) * 4
    }
}

/// Note: For now we keep this unaligned to be safe.
#[repr(C)]
#[derive(
    Clone, Debug, FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned,
)]
pub struct TcpHdrRaw {
    pub src_port: [u8; 2],
    pub dst_port: [u8; 2],
    pub seq: [u8; 4],
    pub ack: [u8; 4],
    pub offset: u8,
    pub flags: u8,
    pub win: [u8; 2],
    pub csum: [u8; 2],
    pub urg: [u8; 2],
}

impl<'a> RawHeader<'a> for TcpHdrRaw {
    #[inline]
    fn raw_zc<'b>(
        rdr: &'b mut FrameReader<'a>,
    ) -> Result<Ref<&'a [u8], Self>, ReadErr> {
        let src = rdr.slice(Self::SIZE)?;
        Ref::from_bytes(src).map_err(|_| ReadErr::BadLayout)
    }
}

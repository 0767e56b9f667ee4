// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Ethernet frames.

use super::packet::FrameReader;
use super::packet::RawHeader;
use super::packet::ReadErr;
use core::fmt;
use core::fmt::Debug;
use core::fmt::Display;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;
use zerocopy::Ref;
use zerocopy::Unaligned;

pub const ETHER_TYPE_IPV4: u16 = 0x0800;
pub const ETHER_TYPE_ARP: u16 = 0x0806;
pub const ETHER_TYPE_IPV6: u16 = 0x86DD;

pub const ETHER_ADDR_LEN: usize = 6;
pub const ETHER_HDR_SZ: usize = EtherHdrRaw::SIZE;

#[derive(Clone, Copy, Eq, PartialEq)]
pub enum EtherType {
    Ipv4,
    Arp,
    Ipv6,
    Unknown(u16),
}

impl From<u16> for EtherType {
    fn from(raw: u16) -> Self {
        match raw {
            ETHER_TYPE_IPV4 => Self::Ipv4,
            ETHER_TYPE_ARP => Self::Arp,
            ETHER_TYPE_IPV6 => Self::Ipv6,
            _ => Self::Unknown(raw),
        }
    }
}

impl From<EtherType> for u16 {
    fn from(et: EtherType) -> Self {
        use EtherType::*;

        match et {
            Ipv4 => ETHER_TYPE_IPV4,
            Arp => ETHER_TYPE_ARP,
            Ipv6 => ETHER_TYPE_IPV6,
            Unknown(val) => val,
        }
    }
}

impl Display for EtherType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:04X}", u16::from(*self))
    }
}

/// We are never really interested in the internal representation of
/// [`EtherType`].
impl Debug for EtherType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{self}")
    }
}

/// A view onto the link-layer header of a frame.
#[derive(Debug)]
pub struct EtherHdr<'a> {
    bytes: Ref<&'a [u8], EtherHdrRaw>,
}

impl<'a> EtherHdr<'a> {
    pub const SIZE: usize = EtherHdrRaw::SIZE;

    pub fn parse(rdr: &mut FrameReader<'a>) -> Result<Self, ReadErr> {
        Ok(Self { bytes: EtherHdrRaw::raw_zc(rdr)? })
    }

    /// Return the declared type of the payload.
    #[inline]
    pub fn ether_type(&self) -> EtherType {
        EtherType::from(u16::from_be_bytes(self.bytes.ether_type))
    }

    #[inline]
    pub fn dst(&self) -> [u8; ETHER_ADDR_LEN] {
        self.bytes.dst
    }

    #[inline]
    pub fn src(&self) -> [u8; ETHER_ADDR_LEN] {
        self.bytes.src
    }
}

/// Note: For now we keep this unaligned to be safe.
#[repr(C)]
#[derive(
    Clone, Debug, FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned,
)]
pub struct EtherHdrRaw {
    pub dst: [u8; 6],
    pub src: [u8; 6],
    pub ether_type: [u8; 2],
}

impl<'a> RawHeader<'a> for EtherHdrRaw {
    #[inline]
    fn raw_zc<'b>(
        rdr: &'b mut FrameReader<'a>,
    ) -> Result<Ref<&'a [u8], Self>, ReadErr> {
        let src = rdr.slice(Self::SIZE)?;
        Ref::from_bytes(src).map_err(|_| ReadErr::BadLayout)
    }
}

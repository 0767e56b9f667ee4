// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! In-place address rewriting.
//!
//! Redirecting a flow means overwriting one 4-byte address field and
//! fixing up two checksums: the IP header checksum, and the TCP
//! checksum, which covers the address through the pseudo-header. Only
//! one field changes per call, so both sums are adjusted
//! incrementally (RFC 1624) instead of recomputed.
//!
//! The checksum fields are written before the address bytes. All
//! offsets are validated up front, so a frame is either rewritten
//! completely or not touched at all; a half-applied rewrite (address
//! flipped, checksum stale) cannot escape this module.

use super::checksum::Checksum;
use super::checksum::HeaderChecksum;
use super::ether::ETHER_HDR_SZ;
use super::ip4::IPV4_CSUM_OFFSET;
use super::ip4::IPV4_DST_OFFSET;
use super::ip4::IPV4_HDR_SZ;
use super::ip4::IPV4_SRC_OFFSET;
use super::ip4::Ipv4Addr;
use super::tcp::TCP_CSUM_OFFSET;
use core::fmt;
use core::fmt::Display;

/// Absolute offset of the IP header checksum within a frame.
pub const L3_CSUM_OFF: usize = ETHER_HDR_SZ + IPV4_CSUM_OFFSET;

/// Absolute offset of the TCP checksum within a frame.
pub const L4_CSUM_OFF: usize = ETHER_HDR_SZ + IPV4_HDR_SZ + TCP_CSUM_OFFSET;

const SRC_ADDR_OFF: usize = ETHER_HDR_SZ + IPV4_SRC_OFFSET;
const DST_ADDR_OFF: usize = ETHER_HDR_SZ + IPV4_DST_OFFSET;

/// Which address field of the network header to rewrite.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AddrField {
    Source,
    Destination,
}

impl AddrField {
    fn offset(self) -> usize {
        match self {
            Self::Source => SRC_ADDR_OFF,
            Self::Destination => DST_ADDR_OFF,
        }
    }
}

impl Display for AddrField {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Source => write!(f, "source"),
            Self::Destination => write!(f, "destination"),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RewriteError {
    /// The frame is too short to hold the field being updated.
    OutOfRange { offset: usize, frame_len: usize },
}

impl Display for RewriteError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::OutOfRange { offset, frame_len } => {
                write!(
                    f,
                    "field at offset {} outside frame of {} bytes",
                    offset, frame_len,
                )
            }
        }
    }
}

fn check_range(
    frame: &[u8],
    offset: usize,
    len: usize,
) -> Result<(), RewriteError> {
    if offset + len > frame.len() {
        return Err(RewriteError::OutOfRange { offset, frame_len: frame.len() });
    }

    Ok(())
}

fn csum_fixup(cur: [u8; 2], old: &[u8], new: &[u8]) -> [u8; 2] {
    let mut csum = Checksum::from(HeaderChecksum::wrap(cur));
    csum.sub_bytes(old);
    csum.add_bytes(new);
    HeaderChecksum::from(csum).bytes()
}

/// Replace one address field of `frame` with `new`, keeping both the
/// IP and TCP checksums valid.
///
/// `old` must be the value currently held by the field; the caller
/// just parsed it, so it is passed in rather than re-read.
pub fn rewrite_addr(
    frame: &mut [u8],
    field: AddrField,
    old: Ipv4Addr,
    new: Ipv4Addr,
) -> Result<(), RewriteError> {
    let addr_off = field.offset();

    // Validate every touched range before mutating anything.
    check_range(frame, addr_off, 4)?;
    check_range(frame, L3_CSUM_OFF, 2)?;
    check_range(frame, L4_CSUM_OFF, 2)?;

    let old_bytes = old.bytes();
    let new_bytes = new.bytes();

    // The address is part of the TCP pseudo-header, so the transport
    // checksum moves by the same delta as the IP one.
    let l4 = csum_fixup(
        [frame[L4_CSUM_OFF], frame[L4_CSUM_OFF + 1]],
        &old_bytes,
        &new_bytes,
    );
    frame[L4_CSUM_OFF..L4_CSUM_OFF + 2].copy_from_slice(&l4);

    let l3 = csum_fixup(
        [frame[L3_CSUM_OFF], frame[L3_CSUM_OFF + 1]],
        &old_bytes,
        &new_bytes,
    );
    frame[L3_CSUM_OFF..L3_CSUM_OFF + 2].copy_from_slice(&l3);

    frame[addr_off..addr_off + 4].copy_from_slice(&new_bytes);
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::engine::ip4::IPV4_DST_OFFSET;
    use crate::engine::ip4::IPV4_SRC_OFFSET;

    // Build a minimal SYN frame with correct IP and TCP checksums.
    fn syn_frame() -> Vec<u8> {
        let mut frame = vec![0u8; 54];
        // Ethertype IPv4.
        frame[12] = 0x08;
        // version + IHL, total length 40, TTL 64, proto TCP.
        frame[14] = 0x45;
        frame[16] = 0x00;
        frame[17] = 0x28;
        frame[22] = 0x40;
        frame[23] = 0x06;
        // 10.0.0.5 -> 203.0.113.9
        frame[26..30].copy_from_slice(&[10, 0, 0, 5]);
        frame[30..34].copy_from_slice(&[203, 0, 113, 9]);
        // Ports 51000 -> 8000, offset 5 words, SYN.
        frame[34..36].copy_from_slice(&51000u16.to_be_bytes());
        frame[36..38].copy_from_slice(&8000u16.to_be_bytes());
        frame[46] = 0x50;
        frame[47] = 0x02;

        let l3 = Checksum::compute(&frame[14..34]);
        frame[24..26].copy_from_slice(&HeaderChecksum::from(l3).bytes());

        let mut l4 = Checksum::compute(&frame[34..54]);
        // Pseudo-header: src, dst, zero+proto, TCP length.
        l4.add_bytes(&frame[26..34]);
        l4.add_bytes(&[0, 0x06]);
        l4.add_bytes(&20u16.to_be_bytes());
        frame[50..52].copy_from_slice(&HeaderChecksum::from(l4).bytes());

        frame
    }

    fn recompute_l3(frame: &[u8]) -> [u8; 2] {
        let mut hdr = [0u8; 20];
        hdr.copy_from_slice(&frame[14..34]);
        hdr[10] = 0;
        hdr[11] = 0;
        HeaderChecksum::from(Checksum::compute(&hdr)).bytes()
    }

    fn recompute_l4(frame: &[u8]) -> [u8; 2] {
        let mut tcp = [0u8; 20];
        tcp.copy_from_slice(&frame[34..54]);
        tcp[16] = 0;
        tcp[17] = 0;
        let mut csum = Checksum::compute(&tcp);
        csum.add_bytes(&frame[26..34]);
        csum.add_bytes(&[0, 0x06]);
        csum.add_bytes(&20u16.to_be_bytes());
        HeaderChecksum::from(csum).bytes()
    }

    #[test]
    fn incremental_matches_full_recompute() {
        let mut frame = syn_frame();
        let old: Ipv4Addr = "203.0.113.9".parse().unwrap();
        let new: Ipv4Addr = "198.51.100.7".parse().unwrap();

        rewrite_addr(&mut frame, AddrField::Destination, old, new).unwrap();

        assert_eq!(
            &frame[ETHER_HDR_SZ + IPV4_DST_OFFSET
                ..ETHER_HDR_SZ + IPV4_DST_OFFSET + 4],
            &new.bytes(),
        );
        assert_eq!(
            [frame[L3_CSUM_OFF], frame[L3_CSUM_OFF + 1]],
            recompute_l3(&frame),
        );
        assert_eq!(
            [frame[L4_CSUM_OFF], frame[L4_CSUM_OFF + 1]],
            recompute_l4(&frame),
        );
    }

    #[test]
    fn both_fields_in_sequence() {
        let mut frame = syn_frame();
        let old_dst: Ipv4Addr = "203.0.113.9".parse().unwrap();
        let backend: Ipv4Addr = "198.51.100.7".parse().unwrap();
        let old_src: Ipv4Addr = "10.0.0.5".parse().unwrap();
        let nat: Ipv4Addr = "172.17.0.1".parse().unwrap();

        rewrite_addr(&mut frame, AddrField::Destination, old_dst, backend)
            .unwrap();
        rewrite_addr(&mut frame, AddrField::Source, old_src, nat).unwrap();

        assert_eq!(
            &frame[ETHER_HDR_SZ + IPV4_SRC_OFFSET
                ..ETHER_HDR_SZ + IPV4_SRC_OFFSET + 4],
            &nat.bytes(),
        );
        assert_eq!(
            [frame[L3_CSUM_OFF], frame[L3_CSUM_OFF + 1]],
            recompute_l3(&frame),
        );
        assert_eq!(
            [frame[L4_CSUM_OFF], frame[L4_CSUM_OFF + 1]],
            recompute_l4(&frame),
        );
    }

    #[test]
    fn short_frame_left_untouched() {
        let full = syn_frame();

        // Long enough for the address but not the TCP checksum; the
        // frame must come back byte-identical.
        let mut short = full[..40].to_vec();
        let before = short.clone();
        let res = rewrite_addr(
            &mut short,
            AddrField::Destination,
            "203.0.113.9".parse().unwrap(),
            "198.51.100.7".parse().unwrap(),
        );
        assert_eq!(
            res.unwrap_err(),
            RewriteError::OutOfRange { offset: L4_CSUM_OFF, frame_len: 40 },
        );
        assert_eq!(short, before);
    }
}

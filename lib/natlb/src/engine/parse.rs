// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Frame classification.
//!
//! One pass over the fixed Ethernet/IPv4/TCP layout, producing the
//! flow tuple a frame belongs to or the reason it is of no interest.
//! Every failure here is terminal for the frame and fails open; the
//! distinction between the variants only matters for tracing.

use super::ether::EtherHdr;
use super::ether::EtherType;
use super::ip4::Ipv4Hdr;
use super::ip4::Ipv4HdrError;
use super::packet::FrameReader;
use super::packet::ReadErr;
use super::tcp::TcpFlags;
use super::tcp::TcpHdr;
use core::fmt;
use core::fmt::Display;
use natlb_api::Endpoint;
use natlb_api::FlowKey;
use natlb_api::Protocol;

/// Why a frame was left alone.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ClassifyErr {
    /// The buffer ended before a required header did.
    Truncated,

    /// A shape of traffic this pipeline does not handle: not IPv4,
    /// or an IPv4 header carrying options.
    UnsupportedForm,

    /// A perfectly fine packet that simply is not TCP. Not an error;
    /// it is just not a flow this pipeline acts on.
    NotApplicable,
}

impl Display for ClassifyErr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Truncated => write!(f, "truncated"),
            Self::UnsupportedForm => write!(f, "unsupported form"),
            Self::NotApplicable => write!(f, "not applicable"),
        }
    }
}

impl From<ReadErr> for ClassifyErr {
    fn from(_err: ReadErr) -> Self {
        ClassifyErr::Truncated
    }
}

impl From<Ipv4HdrError> for ClassifyErr {
    fn from(err: Ipv4HdrError) -> Self {
        match err {
            Ipv4HdrError::ReadError(_) => ClassifyErr::Truncated,
            Ipv4HdrError::BadVersion { .. }
            | Ipv4HdrError::OptionsPresent { .. } => {
                ClassifyErr::UnsupportedForm
            }
        }
    }
}

/// What classification learned about a frame.
#[derive(Clone, Copy, Debug)]
pub struct PacketInfo {
    /// The directional tuple, in host-comparable form.
    pub flow: FlowKey,

    /// TCP flags, for tracing.
    pub flags: TcpFlags,
}

/// Classify a single frame.
///
/// The headers sit at fixed offsets: link, then network at the link
/// header size, then transport behind the (option-free) network
/// header. Each is bounds-checked before it is touched.
pub fn parse_frame(frame: &[u8]) -> Result<PacketInfo, ClassifyErr> {
    let mut rdr = FrameReader::new(frame);

    let eth = EtherHdr::parse(&mut rdr)?;
    match eth.ether_type() {
        EtherType::Ipv4 => {}
        _ => return Err(ClassifyErr::UnsupportedForm),
    }

    let ip4 = Ipv4Hdr::parse(&mut rdr)?;
    if ip4.proto() != Protocol::TCP {
        return Err(ClassifyErr::NotApplicable);
    }

    let tcp = TcpHdr::parse(&mut rdr)?;

    Ok(PacketInfo {
        flow: FlowKey::new(
            Endpoint::new(ip4.src(), tcp.src_port()),
            Endpoint::new(ip4.dst(), tcp.dst_port()),
        ),
        flags: tcp.flags(),
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::engine::ether::ETHER_HDR_SZ;
    use crate::engine::ip4::IPV4_HDR_SZ;
    use crate::engine::tcp::TCP_HDR_SZ;

    // A hand-rolled SYN from 10.0.0.5:51000 to 203.0.113.9:8000.
    #[rustfmt::skip]
    fn syn_frame() -> Vec<u8> {
        vec![
            // ether dst
            0x78, 0x23, 0xae, 0x5d, 0x4f, 0x0d,
            // ether src
            0xa8, 0x40, 0x25, 0x00, 0x00, 0x63,
            // ethertype
            0x08, 0x00,
            // ip: version + IHL, DSCP
            0x45, 0x00,
            // total length (40)
            0x00, 0x28,
            // ident, flags
            0x00, 0x00, 0x40, 0x00,
            // TTL, proto (TCP)
            0x40, 0x06,
            // header checksum
            0x00, 0x00,
            // src 10.0.0.5
            0x0A, 0x00, 0x00, 0x05,
            // dst 203.0.113.9
            0xCB, 0x00, 0x71, 0x09,
            // tcp: ports 51000 -> 8000
            0xC7, 0x38, 0x1F, 0x40,
            // seq, ack
            0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00,
            // offset, flags (SYN)
            0x50, 0x02,
            // window, checksum, urg
            0xFF, 0xFF, 0x00, 0x00, 0x00, 0x00,
        ]
    }

    #[test]
    fn classify_syn() {
        let frame = syn_frame();
        let info = parse_frame(&frame).unwrap();

        assert_eq!(info.flow.src.addr, "10.0.0.5".parse().unwrap());
        assert_eq!(info.flow.src.port, 51000);
        assert_eq!(info.flow.dst.addr, "203.0.113.9".parse().unwrap());
        assert_eq!(info.flow.dst.port, 8000);
        assert_eq!(info.flags, TcpFlags::SYN);
    }

    #[test]
    fn truncated_at_every_stage() {
        let frame = syn_frame();
        let full = ETHER_HDR_SZ + IPV4_HDR_SZ + TCP_HDR_SZ;
        assert_eq!(frame.len(), full);

        for len in 0..full {
            assert_eq!(
                parse_frame(&frame[..len]).unwrap_err(),
                ClassifyErr::Truncated,
                "len {}",
                len,
            );
        }
    }

    #[test]
    fn non_ip_is_unsupported() {
        let mut frame = syn_frame();
        // ARP ethertype.
        frame[12] = 0x08;
        frame[13] = 0x06;
        assert_eq!(
            parse_frame(&frame).unwrap_err(),
            ClassifyErr::UnsupportedForm
        );
    }

    #[test]
    fn options_are_unsupported() {
        let mut frame = syn_frame();
        frame[14] = 0x46;
        assert_eq!(
            parse_frame(&frame).unwrap_err(),
            ClassifyErr::UnsupportedForm
        );
    }

    #[test]
    fn udp_is_not_applicable() {
        let mut frame = syn_frame();
        frame[23] = 0x11;
        assert_eq!(
            parse_frame(&frame).unwrap_err(),
            ClassifyErr::NotApplicable
        );
    }
}

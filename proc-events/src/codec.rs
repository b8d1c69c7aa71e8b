// Copyright 2021-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Bit-exact encode/decode of the connector wire format.
//!
//! Byte order is native throughout: the kernel connector protocol
//! does not byte-swap, and neither do we.

use crate::error::DecodeError;
use crate::event::{
    self, what, AckEvent, Event, ExecEvent, ExitEvent, ForkEvent, GidEvent, OtherEvent, SidEvent,
    UidEvent, CN_IDX_PROC, CN_MSG_LEN, CN_VAL_PROC, MIN_EVENT_DATAGRAM_LEN, NLMSGHDR_LEN,
    PROC_CN_MCAST_LISTEN, PROC_EVENT_HDR_LEN, SUBSCRIBE_MSG_LEN,
};

/// `nlmsg_type` the kernel uses on connector control and event datagrams.
pub const CONNECTOR_MSG_TYPE: u16 = libc::NLMSG_DONE as u16;

/// Builds the one-shot subscription control datagram (§4.2/§6 of
/// SPEC_FULL.md): `nlmsghdr` + `cn_msg` + a single `u32` LISTEN payload.
///
/// `pid` is the calling process id (used both as the socket's bound
/// port id and the `nlmsghdr.pid`/`nlmsghdr.seq`-adjacent field the
/// kernel expects to see echoed back).
pub fn encode_subscribe(pid: u32) -> [u8; SUBSCRIBE_MSG_LEN] {
    let mut buf = [0u8; SUBSCRIBE_MSG_LEN];

    // nlmsghdr
    buf[0..4].copy_from_slice(&(SUBSCRIBE_MSG_LEN as u32).to_ne_bytes());
    buf[4..6].copy_from_slice(&CONNECTOR_MSG_TYPE.to_ne_bytes());
    buf[6..8].copy_from_slice(&0u16.to_ne_bytes()); // flags
    buf[8..12].copy_from_slice(&0u32.to_ne_bytes()); // seq
    buf[12..16].copy_from_slice(&pid.to_ne_bytes());

    // cn_msg
    let cn = &mut buf[NLMSGHDR_LEN..NLMSGHDR_LEN + CN_MSG_LEN];
    cn[0..4].copy_from_slice(&CN_IDX_PROC.to_ne_bytes());
    cn[4..8].copy_from_slice(&CN_VAL_PROC.to_ne_bytes());
    cn[8..12].copy_from_slice(&0u32.to_ne_bytes()); // seq
    cn[12..16].copy_from_slice(&0u32.to_ne_bytes()); // ack
    cn[16..18].copy_from_slice(&4u16.to_ne_bytes()); // payload len
    cn[18..20].copy_from_slice(&0u16.to_ne_bytes()); // flags

    // payload: LISTEN
    buf[NLMSGHDR_LEN + CN_MSG_LEN..].copy_from_slice(&PROC_CN_MCAST_LISTEN.to_ne_bytes());

    buf
}

fn read_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_ne_bytes(buf[offset..offset + 4].try_into().unwrap())
}

fn read_u16(buf: &[u8], offset: usize) -> u16 {
    u16::from_ne_bytes(buf[offset..offset + 2].try_into().unwrap())
}

/// Decodes a single received datagram into an [`Event`].
///
/// Returns `Ok(None)` for a silent drop (not a connector message, or
/// an unrecognized event kind while `surface_unknown_kinds` is
/// `false`) and `Err` for the non-silent [`DecodeError`] kinds.
///
/// Validation follows SPEC_FULL.md §4.2's order exactly: length floor,
/// header type, connector idx/val, kind mapping, then payload-size
/// check for the mapped variant.
pub fn decode(data: &[u8], surface_unknown_kinds: bool) -> Result<Option<Event>, DecodeError> {
    if data.len() < MIN_EVENT_DATAGRAM_LEN {
        return Err(DecodeError::Short {
            got: data.len(),
            min: MIN_EVENT_DATAGRAM_LEN,
        });
    }

    let nlmsg_type = read_u16(data, 4);
    if nlmsg_type != CONNECTOR_MSG_TYPE {
        return Ok(None);
    }

    let cn_off = NLMSGHDR_LEN;
    let idx = read_u32(data, cn_off);
    let val = read_u32(data, cn_off + 4);
    if idx != CN_IDX_PROC || val != CN_VAL_PROC {
        return Ok(None);
    }

    let pe_off = cn_off + CN_MSG_LEN;
    let kind = read_u32(data, pe_off);
    // proc_event.cpu (data[pe_off+4..pe_off+8]) and .timestamp_ns
    // (data[pe_off+8..pe_off+16]) are part of the header but not
    // currently surfaced on any Event variant.
    let payload = &data[pe_off + PROC_EVENT_HDR_LEN..];

    decode_payload(kind, payload, surface_unknown_kinds)
}

fn decode_payload(
    kind: u32,
    payload: &[u8],
    surface_unknown_kinds: bool,
) -> Result<Option<Event>, DecodeError> {
    fn require(payload: &[u8], min: usize, kind: &'static str) -> Result<(), DecodeError> {
        if payload.len() < min {
            return Err(DecodeError::Truncated {
                kind,
                got: payload.len(),
                min,
            });
        }
        Ok(())
    }

    match kind {
        what::NONE => {
            require(payload, 4, "Ack")?;
            Ok(Some(Event::Ack(AckEvent {
                no: read_u32(payload, 0),
            })))
        }
        what::FORK => {
            require(payload, 16, "Fork")?;
            Ok(Some(Event::Fork(ForkEvent {
                parent_pid: read_u32(payload, 0),
                parent_tid: read_u32(payload, 4),
                child_pid: read_u32(payload, 8),
                child_tid: read_u32(payload, 12),
            })))
        }
        what::EXEC => {
            require(payload, 8, "Exec")?;
            Ok(Some(Event::Exec(ExecEvent {
                pid: read_u32(payload, 0),
                tid: read_u32(payload, 4),
            })))
        }
        what::UID => {
            require(payload, 16, "Uid")?;
            Ok(Some(Event::Uid(UidEvent {
                pid: read_u32(payload, 0),
                tid: read_u32(payload, 4),
                ruid: read_u32(payload, 8),
                euid: read_u32(payload, 12),
            })))
        }
        what::GID => {
            require(payload, 16, "Gid")?;
            Ok(Some(Event::Gid(GidEvent {
                pid: read_u32(payload, 0),
                tid: read_u32(payload, 4),
                rgid: read_u32(payload, 8),
                egid: read_u32(payload, 12),
            })))
        }
        what::SID => {
            require(payload, 8, "Sid")?;
            Ok(Some(Event::Sid(SidEvent {
                pid: read_u32(payload, 0),
                tid: read_u32(payload, 4),
            })))
        }
        what::EXIT => {
            require(payload, 16, "Exit")?;
            Ok(Some(Event::Exit(ExitEvent {
                pid: read_u32(payload, 0),
                tid: read_u32(payload, 4),
                code: read_u32(payload, 8),
                signal: read_u32(payload, 12),
            })))
        }
        _ => {
            if surface_unknown_kinds {
                Ok(Some(Event::Other(OtherEvent {
                    kind,
                    payload: payload.to_vec(),
                })))
            } else {
                Ok(None)
            }
        }
    }
}

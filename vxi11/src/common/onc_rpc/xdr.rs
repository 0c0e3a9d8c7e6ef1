//! RPC message types, see [RFC5531](https://datatracker.ietf.org/doc/html/rfc5531).
//!

use std::io::{Error, ErrorKind, Read, Result, Write};

use crate::common::xdr::prelude::*;

/// Only version of the RPC protocol in use
pub const RPC_VERSION: u32 = 2;

fn bad_discriminant(what: &str, discriminant: u32) -> Error {
    Error::new(
        ErrorKind::InvalidData,
        format!("invalid {} discriminant {}", what, discriminant),
    )
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RpcMessage {
    pub xid: u32,
    pub mtype: MsgType,
}

impl RpcMessage {
    /// Call message with `AUTH_NONE` credentials
    pub fn call(xid: u32, prog: u32, vers: u32, proc: u32) -> Self {
        Self {
            xid,
            mtype: MsgType::Call(Callbody {
                rpc_vers: RPC_VERSION,
                prog,
                vers,
                proc,
                cred: Default::default(),
                verf: Default::default(),
            }),
        }
    }

    pub fn reply(xid: u32, stat: ReplyStat) -> Self {
        Self {
            xid,
            mtype: MsgType::Reply(Replybody { stat }),
        }
    }

    /// Accepted reply with the given status
    pub fn accepted(xid: u32, stat: AcceptStat) -> Self {
        Self::reply(
            xid,
            ReplyStat::Accepted(AcceptedReply {
                verf: Default::default(),
                stat,
            }),
        )
    }
}

impl XdrEncode for RpcMessage {
    fn write_xdr<WR>(&self, writer: &mut WR) -> Result<()>
    where
        WR: Write,
    {
        self.xid.write_xdr(writer)?;
        self.mtype.write_xdr(writer)
    }
}

impl XdrDecode for RpcMessage {
    fn read_xdr<RD>(&mut self, reader: &mut RD) -> Result<()>
    where
        RD: Read,
    {
        self.xid.read_xdr(reader)?;
        self.mtype.read_xdr(reader)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MsgType {
    Call(Callbody),
    Reply(Replybody),
}

impl Default for MsgType {
    fn default() -> Self {
        Self::Call(Default::default())
    }
}

impl XdrEncode for MsgType {
    fn write_xdr<WR>(&self, writer: &mut WR) -> Result<()>
    where
        WR: Write,
    {
        match self {
            MsgType::Call(cb) => {
                0u32.write_xdr(writer)?;
                cb.write_xdr(writer)
            }
            MsgType::Reply(rb) => {
                1u32.write_xdr(writer)?;
                rb.write_xdr(writer)
            }
        }
    }
}

impl XdrDecode for MsgType {
    fn read_xdr<RD>(&mut self, reader: &mut RD) -> Result<()>
    where
        RD: Read,
    {
        *self = match reader.read_u32::<NetworkEndian>()? {
            0 => {
                let mut cb = Callbody::default();
                cb.read_xdr(reader)?;
                Self::Call(cb)
            }
            1 => {
                let mut rb = Replybody::default();
                rb.read_xdr(reader)?;
                Self::Reply(rb)
            }
            x => return Err(bad_discriminant("msg_type", x)),
        };
        Ok(())
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Callbody {
    pub rpc_vers: u32,
    pub prog: u32,
    pub vers: u32,
    pub proc: u32,
    pub cred: OpaqueAuth,
    pub verf: OpaqueAuth,
}

impl XdrEncode for Callbody {
    fn write_xdr<WR>(&self, writer: &mut WR) -> Result<()>
    where
        WR: Write,
    {
        self.rpc_vers.write_xdr(writer)?;
        self.prog.write_xdr(writer)?;
        self.vers.write_xdr(writer)?;
        self.proc.write_xdr(writer)?;
        self.cred.write_xdr(writer)?;
        self.verf.write_xdr(writer)
    }
}

impl XdrDecode for Callbody {
    fn read_xdr<RD>(&mut self, reader: &mut RD) -> Result<()>
    where
        RD: Read,
    {
        self.rpc_vers.read_xdr(reader)?;
        self.prog.read_xdr(reader)?;
        self.vers.read_xdr(reader)?;
        self.proc.read_xdr(reader)?;
        self.cred.read_xdr(reader)?;
        self.verf.read_xdr(reader)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Replybody {
    pub stat: ReplyStat,
}

impl XdrEncode for Replybody {
    fn write_xdr<WR>(&self, writer: &mut WR) -> Result<()>
    where
        WR: Write,
    {
        self.stat.write_xdr(writer)
    }
}

impl XdrDecode for Replybody {
    fn read_xdr<RD>(&mut self, reader: &mut RD) -> Result<()>
    where
        RD: Read,
    {
        self.stat.read_xdr(reader)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyStat {
    Accepted(AcceptedReply),
    Denied(RejectedReply),
}

impl Default for ReplyStat {
    fn default() -> Self {
        Self::Accepted(Default::default())
    }
}

impl XdrEncode for ReplyStat {
    fn write_xdr<WR>(&self, writer: &mut WR) -> Result<()>
    where
        WR: Write,
    {
        match self {
            ReplyStat::Accepted(accepted) => {
                0u32.write_xdr(writer)?;
                accepted.write_xdr(writer)
            }
            ReplyStat::Denied(rejected) => {
                1u32.write_xdr(writer)?;
                rejected.stat.write_xdr(writer)
            }
        }
    }
}

impl XdrDecode for ReplyStat {
    fn read_xdr<RD>(&mut self, reader: &mut RD) -> Result<()>
    where
        RD: Read,
    {
        *self = match reader.read_u32::<NetworkEndian>()? {
            0 => {
                let mut accepted = AcceptedReply::default();
                accepted.read_xdr(reader)?;
                Self::Accepted(accepted)
            }
            1 => {
                let mut rejected = RejectedReply::default();
                rejected.stat.read_xdr(reader)?;
                Self::Denied(rejected)
            }
            x => return Err(bad_discriminant("reply_stat", x)),
        };
        Ok(())
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AcceptedReply {
    pub verf: OpaqueAuth,
    pub stat: AcceptStat,
}

impl XdrEncode for AcceptedReply {
    fn write_xdr<WR>(&self, writer: &mut WR) -> Result<()>
    where
        WR: Write,
    {
        self.verf.write_xdr(writer)?;
        self.stat.write_xdr(writer)
    }
}

impl XdrDecode for AcceptedReply {
    fn read_xdr<RD>(&mut self, reader: &mut RD) -> Result<()>
    where
        RD: Read,
    {
        self.verf.read_xdr(reader)?;
        self.stat.read_xdr(reader)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MismatchInfo {
    pub low: u32,
    pub high: u32,
}

impl XdrEncode for MismatchInfo {
    fn write_xdr<WR>(&self, writer: &mut WR) -> Result<()>
    where
        WR: Write,
    {
        self.low.write_xdr(writer)?;
        self.high.write_xdr(writer)
    }
}

impl XdrDecode for MismatchInfo {
    fn read_xdr<RD>(&mut self, reader: &mut RD) -> Result<()>
    where
        RD: Read,
    {
        self.low.read_xdr(reader)?;
        self.high.read_xdr(reader)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum AcceptStat {
    #[default]
    Success,
    ProgUnavail,
    ProgMismatch(MismatchInfo),
    ProcUnavail,
    GarbageArgs,
    SystemErr,
}

impl XdrEncode for AcceptStat {
    fn write_xdr<WR>(&self, writer: &mut WR) -> Result<()>
    where
        WR: Write,
    {
        let discriminant: u32 = match self {
            AcceptStat::Success => 0,
            AcceptStat::ProgUnavail => 1,
            AcceptStat::ProgMismatch(_) => 2,
            AcceptStat::ProcUnavail => 3,
            AcceptStat::GarbageArgs => 4,
            AcceptStat::SystemErr => 5,
        };
        discriminant.write_xdr(writer)?;
        if let AcceptStat::ProgMismatch(mismatch) = self {
            mismatch.write_xdr(writer)?;
        }
        Ok(())
    }
}

impl XdrDecode for AcceptStat {
    fn read_xdr<RD>(&mut self, reader: &mut RD) -> Result<()>
    where
        RD: Read,
    {
        *self = match reader.read_u32::<NetworkEndian>()? {
            0 => Self::Success,
            1 => Self::ProgUnavail,
            2 => {
                let mut mismatch = MismatchInfo::default();
                mismatch.read_xdr(reader)?;
                Self::ProgMismatch(mismatch)
            }
            3 => Self::ProcUnavail,
            4 => Self::GarbageArgs,
            5 => Self::SystemErr,
            x => return Err(bad_discriminant("accept_stat", x)),
        };
        Ok(())
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RejectedReply {
    pub stat: RejectStat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectStat {
    RpcMismatch(MismatchInfo),
    AuthError(AuthStat),
}

impl Default for RejectStat {
    fn default() -> Self {
        Self::RpcMismatch(Default::default())
    }
}

impl XdrEncode for RejectStat {
    fn write_xdr<WR>(&self, writer: &mut WR) -> Result<()>
    where
        WR: Write,
    {
        match self {
            RejectStat::RpcMismatch(mismatch) => {
                0u32.write_xdr(writer)?;
                mismatch.write_xdr(writer)
            }
            RejectStat::AuthError(stat) => {
                1u32.write_xdr(writer)?;
                (*stat as u32).write_xdr(writer)
            }
        }
    }
}

impl XdrDecode for RejectStat {
    fn read_xdr<RD>(&mut self, reader: &mut RD) -> Result<()>
    where
        RD: Read,
    {
        *self = match reader.read_u32::<NetworkEndian>()? {
            0 => {
                let mut mismatch = MismatchInfo::default();
                mismatch.read_xdr(reader)?;
                Self::RpcMismatch(mismatch)
            }
            1 => Self::AuthError(AuthStat::from_u32(reader.read_u32::<NetworkEndian>()?)?),
            x => return Err(bad_discriminant("reject_stat", x)),
        };
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum AuthStat {
    Ok = 0,
    BadCred = 1,
    RejectedCred = 2,
    BadVerf = 3,
    RejectedVerf = 4,
    TooWeak = 5,
    InvalidResp = 6,
    Failed = 7,
}

impl AuthStat {
    fn from_u32(x: u32) -> Result<Self> {
        Ok(match x {
            0 => Self::Ok,
            1 => Self::BadCred,
            2 => Self::RejectedCred,
            3 => Self::BadVerf,
            4 => Self::RejectedVerf,
            5 => Self::TooWeak,
            6 => Self::InvalidResp,
            7 => Self::Failed,
            x => return Err(bad_discriminant("auth_stat", x)),
        })
    }
}

/// Authentication flavour. Only `AUTH_NONE` is ever sent.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum AuthFlavour {
    #[default]
    None,
    Sys,
    Short,
    Other(u32),
}

impl XdrEncode for AuthFlavour {
    fn write_xdr<WR>(&self, writer: &mut WR) -> Result<()>
    where
        WR: Write,
    {
        let discriminant = match self {
            AuthFlavour::None => 0,
            AuthFlavour::Sys => 1,
            AuthFlavour::Short => 2,
            AuthFlavour::Other(x) => *x,
        };
        discriminant.write_xdr(writer)
    }
}

impl XdrDecode for AuthFlavour {
    fn read_xdr<RD>(&mut self, reader: &mut RD) -> Result<()>
    where
        RD: Read,
    {
        *self = match reader.read_u32::<NetworkEndian>()? {
            0 => Self::None,
            1 => Self::Sys,
            2 => Self::Short,
            x => Self::Other(x),
        };
        Ok(())
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OpaqueAuth {
    pub flavour: AuthFlavour,
    pub body: Opaque,
}

impl XdrEncode for OpaqueAuth {
    fn write_xdr<WR>(&self, writer: &mut WR) -> Result<()>
    where
        WR: Write,
    {
        self.flavour.write_xdr(writer)?;
        self.body.write_xdr(writer)
    }
}

impl XdrDecode for OpaqueAuth {
    fn read_xdr<RD>(&mut self, reader: &mut RD) -> Result<()>
    where
        RD: Read,
    {
        self.flavour.read_xdr(reader)?;
        self.body.read_xdr(reader)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn call_header_layout() {
        let mut cursor = Cursor::new(Vec::new());
        RpcMessage::call(1, 0x0607AF, 1, 10)
            .write_xdr(&mut cursor)
            .unwrap();
        assert_eq!(
            cursor.get_ref()[..],
            [
                0, 0, 0, 1, // xid
                0, 0, 0, 0, // CALL
                0, 0, 0, 2, // rpcvers
                0, 6, 7, 0xaf, // prog
                0, 0, 0, 1, // vers
                0, 0, 0, 10, // proc
                0, 0, 0, 0, 0, 0, 0, 0, // cred
                0, 0, 0, 0, 0, 0, 0, 0, // verf
            ][..]
        );
    }

    #[test]
    fn decode_denied_reply() {
        let mut cursor = Cursor::new(Vec::new());
        RpcMessage::reply(
            9,
            ReplyStat::Denied(RejectedReply {
                stat: RejectStat::AuthError(AuthStat::TooWeak),
            }),
        )
        .write_xdr(&mut cursor)
        .unwrap();

        cursor.set_position(0);
        let mut msg = RpcMessage::default();
        msg.read_xdr(&mut cursor).unwrap();
        assert_eq!(msg.xid, 9);
        assert_eq!(
            msg.mtype,
            MsgType::Reply(Replybody {
                stat: ReplyStat::Denied(RejectedReply {
                    stat: RejectStat::AuthError(AuthStat::TooWeak)
                })
            })
        );
    }

    #[test]
    fn unknown_message_type() {
        let mut cursor = Cursor::new(b"\x00\x00\x00\x01\x00\x00\x00\x07");
        let mut msg = RpcMessage::default();
        assert_eq!(
            msg.read_xdr(&mut cursor).unwrap_err().kind(),
            ErrorKind::InvalidData
        );
    }
}

//! Basic types for XDR, see [RFC4506](https://datatracker.ietf.org/doc/html/rfc4506).
//!
//! Provides the following types:
//!
//! | XDR Type         | Rust type |
//! |------------------|-----------|
//! | integer          | i32       |
//! | unsigned integer | u32, u16  |
//! | Boolean          | bool      |
//! | opaque<>         | [Opaque]  |
//! | string<>         | String    |
//! | T ident<n>       | Vec<T>    |
//! | T *ident         | Option<T> |
//!
//! Enums and structures implement XdrEncode and XdrDecode by hand.
//!

use std::io::{Error, ErrorKind, Read, Result, Write};

use byteorder::{NetworkEndian, ReadBytesExt, WriteBytesExt};

fn padding(len: usize) -> usize {
    (4 - (len & 3)) & 3
}

fn read_padding<RD>(reader: &mut RD, len: usize) -> Result<()>
where
    RD: Read,
{
    let mut pad = [0u8; 3];
    reader.read_exact(&mut pad[..padding(len)])
}

fn write_padding<WR>(writer: &mut WR, len: usize) -> Result<()>
where
    WR: Write,
{
    writer.write_all(&[0u8; 3][..padding(len)])
}

pub trait XdrDecode {
    fn read_xdr<RD>(&mut self, reader: &mut RD) -> Result<()>
    where
        RD: Read;
}

pub trait XdrEncode {
    fn write_xdr<WR>(&self, writer: &mut WR) -> Result<()>
    where
        WR: Write;
}

impl XdrDecode for () {
    fn read_xdr<RD>(&mut self, _reader: &mut RD) -> Result<()>
    where
        RD: Read,
    {
        Ok(())
    }
}

impl XdrEncode for () {
    fn write_xdr<WR>(&self, _writer: &mut WR) -> Result<()>
    where
        WR: Write,
    {
        Ok(())
    }
}

// 4.1 Integer, 4.2 Unsigned Integer
macro_rules! xdr_word {
    ($ty:ty, $read:ident, $write:ident) => {
        impl XdrDecode for $ty {
            fn read_xdr<RD>(&mut self, reader: &mut RD) -> Result<()>
            where
                RD: Read,
            {
                *self = reader.$read::<NetworkEndian>()?;
                Ok(())
            }
        }

        impl XdrEncode for $ty {
            fn write_xdr<WR>(&self, writer: &mut WR) -> Result<()>
            where
                WR: Write,
            {
                writer.$write::<NetworkEndian>(*self)
            }
        }
    };
}

xdr_word!(i32, read_i32, write_i32);
xdr_word!(u32, read_u32, write_u32);

/// Ports travel as a full unsigned word, values above 65535 are rejected.
impl XdrDecode for u16 {
    fn read_xdr<RD>(&mut self, reader: &mut RD) -> Result<()>
    where
        RD: Read,
    {
        let word = reader.read_u32::<NetworkEndian>()?;
        *self = u16::try_from(word).map_err(|_| {
            Error::new(
                ErrorKind::InvalidData,
                format!("{} does not fit in 16 bits", word),
            )
        })?;
        Ok(())
    }
}

impl XdrEncode for u16 {
    fn write_xdr<WR>(&self, writer: &mut WR) -> Result<()>
    where
        WR: Write,
    {
        writer.write_u32::<NetworkEndian>(u32::from(*self))
    }
}

// 4.4 Booleans
impl XdrDecode for bool {
    fn read_xdr<RD>(&mut self, reader: &mut RD) -> Result<()>
    where
        RD: Read,
    {
        *self = match reader.read_i32::<NetworkEndian>()? {
            0 => false,
            1 => true,
            x => {
                return Err(Error::new(
                    ErrorKind::InvalidData,
                    format!("invalid boolean {}", x),
                ))
            }
        };
        Ok(())
    }
}

impl XdrEncode for bool {
    fn write_xdr<WR>(&self, writer: &mut WR) -> Result<()>
    where
        WR: Write,
    {
        writer.write_i32::<NetworkEndian>(i32::from(*self))
    }
}

// 4.10 Variable-Length Opaque Data
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Opaque(pub Vec<u8>);

impl XdrDecode for Opaque {
    fn read_xdr<RD>(&mut self, reader: &mut RD) -> Result<()>
    where
        RD: Read,
    {
        let len = reader.read_u32::<NetworkEndian>()? as usize;
        self.0.clear();
        reader.by_ref().take(len as u64).read_to_end(&mut self.0)?;
        if self.0.len() != len {
            return Err(ErrorKind::UnexpectedEof.into());
        }
        read_padding(reader, len)
    }
}

impl XdrEncode for Opaque {
    fn write_xdr<WR>(&self, writer: &mut WR) -> Result<()>
    where
        WR: Write,
    {
        writer.write_u32::<NetworkEndian>(self.0.len() as u32)?;
        writer.write_all(&self.0)?;
        write_padding(writer, self.0.len())
    }
}

// 4.11 String
impl XdrDecode for String {
    fn read_xdr<RD>(&mut self, reader: &mut RD) -> Result<()>
    where
        RD: Read,
    {
        let mut bytes = Opaque::default();
        bytes.read_xdr(reader)?;
        *self = String::from_utf8(bytes.0).map_err(|err| Error::new(ErrorKind::InvalidData, err))?;
        Ok(())
    }
}

impl XdrEncode for String {
    fn write_xdr<WR>(&self, writer: &mut WR) -> Result<()>
    where
        WR: Write,
    {
        self.as_str().write_xdr(writer)
    }
}

impl XdrEncode for &str {
    fn write_xdr<WR>(&self, writer: &mut WR) -> Result<()>
    where
        WR: Write,
    {
        writer.write_u32::<NetworkEndian>(self.len() as u32)?;
        writer.write_all(self.as_bytes())?;
        write_padding(writer, self.len())
    }
}

// 4.13 Variable-Length Array
impl<T: XdrDecode + Default> XdrDecode for Vec<T> {
    fn read_xdr<RD>(&mut self, reader: &mut RD) -> Result<()>
    where
        RD: Read,
    {
        let len = reader.read_u32::<NetworkEndian>()?;
        self.clear();
        for _ in 0..len {
            let mut x: T = Default::default();
            x.read_xdr(reader)?;
            self.push(x);
        }
        Ok(())
    }
}

impl<T: XdrEncode> XdrEncode for Vec<T> {
    fn write_xdr<WR>(&self, writer: &mut WR) -> Result<()>
    where
        WR: Write,
    {
        writer.write_u32::<NetworkEndian>(self.len() as u32)?;
        for x in self {
            x.write_xdr(writer)?;
        }
        Ok(())
    }
}

// 4.19 Optional data
impl<T: XdrDecode + Default> XdrDecode for Option<T> {
    fn read_xdr<RD>(&mut self, reader: &mut RD) -> Result<()>
    where
        RD: Read,
    {
        let mut follows = false;
        follows.read_xdr(reader)?;
        *self = if follows {
            let mut t: T = Default::default();
            t.read_xdr(reader)?;
            Some(t)
        } else {
            None
        };
        Ok(())
    }
}

impl<T: XdrEncode> XdrEncode for Option<T> {
    fn write_xdr<WR>(&self, writer: &mut WR) -> Result<()>
    where
        WR: Write,
    {
        self.is_some().write_xdr(writer)?;
        if let Some(t) = self {
            t.write_xdr(writer)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn integer_is_big_endian() {
        let mut cursor = Cursor::new(Vec::new());
        (-2i32).write_xdr(&mut cursor).unwrap();
        assert_eq!(cursor.get_ref()[..], b"\xff\xff\xff\xfe"[..]);

        let mut cursor = Cursor::new(b"\x00\x06\x07\xaf");
        let mut prog = 0u32;
        prog.read_xdr(&mut cursor).unwrap();
        assert_eq!(prog, 395183);
    }

    #[test]
    fn port_out_of_range() {
        let mut cursor = Cursor::new(b"\x00\x01\x00\x00");
        let mut port = 0u16;
        let err = port.read_xdr(&mut cursor).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);

        let mut cursor = Cursor::new(b"\x00\x00\x04\x01");
        port.read_xdr(&mut cursor).unwrap();
        assert_eq!(port, 1025);
    }

    #[test]
    fn boolean_rejects_garbage() {
        let mut cursor = Cursor::new(b"\x00\x00\x00\x02");
        let mut b = false;
        assert!(b.read_xdr(&mut cursor).is_err());
    }

    #[test]
    fn string_is_padded() {
        let mut cursor = Cursor::new(Vec::new());
        "inst0".write_xdr(&mut cursor).unwrap();
        assert_eq!(cursor.get_ref()[..], b"\x00\x00\x00\x05inst0\x00\x00\x00"[..]);

        let mut cursor = Cursor::new(b"\x00\x00\x00\x05inst0\x00\x00\x00\x00\x00\x00\x01");
        let mut s = String::new();
        s.read_xdr(&mut cursor).unwrap();
        assert_eq!(s, "inst0");
        // Reader must be positioned after the padding
        let mut next = 0u32;
        next.read_xdr(&mut cursor).unwrap();
        assert_eq!(next, 1);
    }

    #[test]
    fn truncated_opaque() {
        let mut cursor = Cursor::new(b"\x00\x00\x00\x04ab");
        let mut o = Opaque::default();
        let err = o.read_xdr(&mut cursor).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnexpectedEof);
    }

    #[test]
    fn optional_list() {
        let mut cursor = Cursor::new(Vec::new());
        Some(7u32).write_xdr(&mut cursor).unwrap();
        None::<u32>.write_xdr(&mut cursor).unwrap();
        assert_eq!(
            cursor.get_ref()[..],
            b"\x00\x00\x00\x01\x00\x00\x00\x07\x00\x00\x00\x00"[..]
        );
    }
}

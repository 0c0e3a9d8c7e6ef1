//! Record marking for RPC over stream transports, see RFC5531 section 11.

use std::io::{Error, ErrorKind, Result};

use byteorder::{ByteOrder, NetworkEndian};
use futures::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const LAST_FRAGMENT: u32 = 0x8000_0000;
const MAX_FRAGMENT: usize = 0x7FFF_FFFF;

/// Read one record, reassembling fragments. Records larger than `maxlen` are rejected.
pub async fn read_record<RD>(reader: &mut RD, maxlen: usize) -> Result<Vec<u8>>
where
    RD: AsyncRead + Unpin,
{
    let mut record = Vec::new();

    loop {
        let mut header = [0u8; 4];
        reader.read_exact(&mut header).await?;
        let header = NetworkEndian::read_u32(&header);
        let len = (header & !LAST_FRAGMENT) as usize;

        if record.len() + len > maxlen {
            return Err(Error::new(
                ErrorKind::InvalidData,
                format!("record exceeds {} bytes", maxlen),
            ));
        }

        let start = record.len();
        record.resize(start + len, 0);
        reader.read_exact(&mut record[start..]).await?;

        if header & LAST_FRAGMENT != 0 {
            break Ok(record);
        }
    }
}

/// Write `record` as one or more fragments and flush.
pub async fn write_record<WR>(writer: &mut WR, record: &[u8]) -> Result<()>
where
    WR: AsyncWrite + Unpin,
{
    let mut chunks = record.chunks(MAX_FRAGMENT).peekable();
    if chunks.peek().is_none() {
        writer.write_all(&LAST_FRAGMENT.to_be_bytes()).await?;
    }
    while let Some(chunk) = chunks.next() {
        let mut header = chunk.len() as u32;
        if chunks.peek().is_none() {
            header |= LAST_FRAGMENT;
        }
        writer.write_all(&header.to_be_bytes()).await?;
        writer.write_all(chunk).await?;
    }
    writer.flush().await
}

//! Delta container encoding.

use crate::engine::{EngineErrorCode, EngineOp};
use crate::error::{EngineError, EngineResult};

pub const MAGIC: &[u8; 4] = b"HPDL";
pub const VERSION: u32 = 1;

const OP_COPY: u8 = 0;
const OP_INSERT: u8 = 1;

/// One step of reconstructing the target from the source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Copy `len` bytes from the source starting at `offset`.
    Copy { offset: u64, len: u64 },
    /// Append literal bytes.
    Insert(Vec<u8>),
}

/// Fixed header preceding the compressed command stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeltaHeader {
    pub target_len: u64,
    pub target_crc32: u32,
}

impl DeltaHeader {
    pub fn for_target(target: &[u8]) -> Self {
        Self {
            target_len: target.len() as u64,
            target_crc32: crc32fast::hash(target),
        }
    }

    pub fn write(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(MAGIC);
        buf.extend_from_slice(&VERSION.to_be_bytes());
        encode_varint(buf, self.target_len);
        buf.extend_from_slice(&self.target_crc32.to_be_bytes());
    }

    /// Parse a header, returning it and the number of bytes consumed.
    pub fn read(data: &[u8]) -> EngineResult<(Self, usize)> {
        if data.len() < 8 {
            return Err(corrupt("truncated header"));
        }
        if &data[..4] != MAGIC {
            return Err(corrupt(format!("bad magic {:02x?}", &data[..4])));
        }
        let version = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
        if version != VERSION {
            return Err(corrupt(format!("unsupported delta version {version}")));
        }
        let (target_len, used) = decode_varint(&data[8..])?;
        let crc_start = 8 + used;
        let crc_bytes: [u8; 4] = data
            .get(crc_start..crc_start + 4)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| corrupt("truncated checksum"))?;
        Ok((
            Self {
                target_len,
                target_crc32: u32::from_be_bytes(crc_bytes),
            },
            crc_start + 4,
        ))
    }
}

pub fn encode_commands(commands: &[Command]) -> Vec<u8> {
    let mut buf = Vec::new();
    for command in commands {
        match command {
            Command::Copy { offset, len } => {
                buf.push(OP_COPY);
                encode_varint(&mut buf, *offset);
                encode_varint(&mut buf, *len);
            }
            Command::Insert(bytes) => {
                buf.push(OP_INSERT);
                encode_varint(&mut buf, bytes.len() as u64);
                buf.extend_from_slice(bytes);
            }
        }
    }
    buf
}

pub fn decode_commands(mut data: &[u8]) -> EngineResult<Vec<Command>> {
    let mut commands = Vec::new();
    while let Some((&op, rest)) = data.split_first() {
        data = rest;
        match op {
            OP_COPY => {
                let (offset, used) = decode_varint(data)?;
                data = &data[used..];
                let (len, used) = decode_varint(data)?;
                data = &data[used..];
                commands.push(Command::Copy { offset, len });
            }
            OP_INSERT => {
                let (len, used) = decode_varint(data)?;
                data = &data[used..];
                let len = usize::try_from(len).map_err(|_| corrupt("insert too large"))?;
                if data.len() < len {
                    return Err(corrupt("truncated insert"));
                }
                commands.push(Command::Insert(data[..len].to_vec()));
                data = &data[len..];
            }
            other => return Err(corrupt(format!("unknown command byte {other:#04x}"))),
        }
    }
    Ok(commands)
}

/// Encode a variable-length integer (7 bits per byte, little-endian groups).
pub(crate) fn encode_varint(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value > 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if value == 0 {
            break;
        }
    }
}

/// Decode a variable-length integer. Returns (value, bytes_consumed).
pub(crate) fn decode_varint(data: &[u8]) -> EngineResult<(u64, usize)> {
    let mut value: u64 = 0;
    let mut shift = 0;
    for (i, &byte) in data.iter().enumerate() {
        value |= ((byte & 0x7F) as u64) << shift;
        shift += 7;
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
        if shift >= 64 {
            return Err(corrupt("varint overflow"));
        }
    }
    Err(corrupt("truncated varint"))
}

fn corrupt(reason: impl Into<String>) -> EngineError {
    EngineError::failed(EngineOp::Apply, EngineErrorCode::CorruptPatch, reason)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varint_boundaries() {
        for value in [0u64, 1, 127, 128, 16_383, 16_384, u32::MAX as u64, u64::MAX] {
            let mut buf = Vec::new();
            encode_varint(&mut buf, value);
            assert_eq!(decode_varint(&buf).unwrap(), (value, buf.len()));
        }
        let mut buf = Vec::new();
        encode_varint(&mut buf, 300);
        assert_eq!(buf, vec![0xAC, 0x02]);
    }

    #[test]
    fn truncated_varint_is_corrupt() {
        let err = decode_varint(&[0x80, 0x80]).unwrap_err();
        assert_eq!(err.code(), EngineErrorCode::CorruptPatch);
    }

    #[test]
    fn header_roundtrip() {
        let header = DeltaHeader::for_target(b"target bytes");
        let mut buf = Vec::new();
        header.write(&mut buf);
        buf.extend_from_slice(b"rest");
        let (parsed, used) = DeltaHeader::read(&buf).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(&buf[used..], b"rest");
    }

    #[test]
    fn header_rejects_bad_magic_and_version() {
        let mut buf = Vec::new();
        DeltaHeader::for_target(b"x").write(&mut buf);
        let mut bad_magic = buf.clone();
        bad_magic[0] = b'Z';
        assert!(DeltaHeader::read(&bad_magic).is_err());

        let mut bad_version = buf;
        bad_version[7] = 2;
        let err = DeltaHeader::read(&bad_version).unwrap_err();
        assert!(err.to_string().contains("unsupported delta version"));
    }

    #[test]
    fn commands_decode_what_was_encoded() {
        let commands = vec![
            Command::Copy { offset: 0, len: 4096 },
            Command::Insert(b"inserted".to_vec()),
            Command::Copy { offset: 70_000, len: 12 },
        ];
        assert_eq!(decode_commands(&encode_commands(&commands)).unwrap(), commands);
    }

    #[test]
    fn unknown_and_truncated_commands_are_corrupt() {
        assert!(decode_commands(&[7]).is_err());
        assert!(decode_commands(&[OP_INSERT, 5, b'a']).is_err());
    }
}

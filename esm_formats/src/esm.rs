use std::io::Write;

use anyhow::{Context, Result, anyhow, ensure};
use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use encoding_rs::WINDOWS_1252;

pub const RECORD_HEADER_SIZE: usize = 16;
pub const SUBRECORD_HEADER_SIZE: usize = 8;

/// Four-character code naming a record or subrecord.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tag(pub [u8; 4]);

impl Tag {
    pub const TES3: Tag = Tag(*b"TES3");
    pub const DIAL: Tag = Tag(*b"DIAL");
    pub const INFO: Tag = Tag(*b"INFO");

    pub fn as_str(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }
}

#[derive(Debug, Clone)]
pub struct Subrecord<'a> {
    pub tag: Tag,
    pub data: &'a [u8],
}

impl<'a> Subrecord<'a> {
    /// Reads the payload as a NUL-terminated (or unterminated) string.
    pub fn zstring(&self) -> String {
        zstring(self.data)
    }

    pub fn u8(&self) -> Result<u8> {
        self.data
            .first()
            .copied()
            .ok_or_else(|| anyhow!("{} subrecord is empty", self.tag.as_str()))
    }

    pub fn i32(&self) -> Result<i32> {
        ensure!(
            self.data.len() >= 4,
            "{} subrecord holds {} bytes, expected 4",
            self.tag.as_str(),
            self.data.len()
        );
        Ok(LittleEndian::read_i32(&self.data[..4]))
    }
}

#[derive(Debug, Clone)]
pub struct Record<'a> {
    pub tag: Tag,
    pub header: u32,
    pub flags: u32,
    pub subrecords: Vec<Subrecord<'a>>,
}

impl<'a> Record<'a> {
    pub fn find(&self, tag: &[u8; 4]) -> Option<&Subrecord<'a>> {
        self.subrecords.iter().find(|sub| &sub.tag.0 == tag)
    }
}

/// Splits a plugin buffer into its top-level records.
pub fn read_records(bytes: &[u8]) -> Result<Vec<Record<'_>>> {
    let mut records = Vec::new();
    let mut offset = 0usize;
    while offset < bytes.len() {
        let index = records.len();
        let remaining = bytes.len() - offset;
        ensure!(
            remaining >= RECORD_HEADER_SIZE,
            "record {index} at 0x{offset:X} truncated inside its header"
        );
        let header = &bytes[offset..offset + RECORD_HEADER_SIZE];
        let tag = Tag(header[0..4].try_into()?);
        let size = LittleEndian::read_u32(&header[4..8]) as usize;
        let unknown = LittleEndian::read_u32(&header[8..12]);
        let flags = LittleEndian::read_u32(&header[12..16]);

        let start = offset + RECORD_HEADER_SIZE;
        let end = start
            .checked_add(size)
            .ok_or_else(|| anyhow!("record {index} size overflow"))?;
        ensure!(
            end <= bytes.len(),
            "record {index} ({}) at 0x{offset:X} extends beyond end of file",
            tag.as_str()
        );

        let subrecords = read_subrecords(&bytes[start..end])
            .with_context(|| format!("reading subrecords of record {index} ({})", tag.as_str()))?;
        records.push(Record {
            tag,
            header: unknown,
            flags,
            subrecords,
        });
        offset = end;
    }
    Ok(records)
}

fn read_subrecords(payload: &[u8]) -> Result<Vec<Subrecord<'_>>> {
    let mut subrecords = Vec::new();
    let mut offset = 0usize;
    while offset < payload.len() {
        ensure!(
            payload.len() - offset >= SUBRECORD_HEADER_SIZE,
            "subrecord header truncated at offset {offset}"
        );
        let tag = Tag(payload[offset..offset + 4].try_into()?);
        let size = LittleEndian::read_u32(&payload[offset + 4..offset + 8]) as usize;
        let start = offset + SUBRECORD_HEADER_SIZE;
        let end = start
            .checked_add(size)
            .ok_or_else(|| anyhow!("subrecord {} size overflow", tag.as_str()))?;
        ensure!(
            end <= payload.len(),
            "subrecord {} truncated: needs {size} bytes, {} left",
            tag.as_str(),
            payload.len() - start
        );
        subrecords.push(Subrecord {
            tag,
            data: &payload[start..end],
        });
        offset = end;
    }
    Ok(subrecords)
}

/// Content files store text as Windows-1252 single-byte strings.
pub fn zstring(data: &[u8]) -> String {
    let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
    WINDOWS_1252
        .decode_without_bom_handling(&data[..end])
        .0
        .into_owned()
}

/// Builds the byte image of a single record.
#[derive(Debug)]
pub struct RecordWriter {
    tag: Tag,
    flags: u32,
    payload: Vec<u8>,
}

impl RecordWriter {
    pub fn new(tag: Tag) -> Self {
        RecordWriter {
            tag,
            flags: 0,
            payload: Vec::new(),
        }
    }

    pub fn raw(&mut self, tag: &[u8; 4], data: &[u8]) -> Result<&mut Self> {
        let size = u32::try_from(data.len())
            .with_context(|| format!("{} subrecord too large", String::from_utf8_lossy(tag)))?;
        self.payload.write_all(tag)?;
        self.payload.write_u32::<LittleEndian>(size)?;
        self.payload.write_all(data)?;
        Ok(self)
    }

    /// Writes `value` followed by a terminating NUL.
    pub fn zstring(&mut self, tag: &[u8; 4], value: &str) -> Result<&mut Self> {
        let mut data = encode_text(value);
        data.push(0);
        self.raw(tag, &data)
    }

    /// Writes `value` without a terminator, as used for long text fields.
    pub fn string(&mut self, tag: &[u8; 4], value: &str) -> Result<&mut Self> {
        self.raw(tag, &encode_text(value))
    }

    pub fn i32(&mut self, tag: &[u8; 4], value: i32) -> Result<&mut Self> {
        self.raw(tag, &value.to_le_bytes())
    }

    pub fn finish(self, out: &mut Vec<u8>) -> Result<()> {
        let size = u32::try_from(self.payload.len())
            .with_context(|| format!("{} record too large", self.tag.as_str()))?;
        out.write_all(&self.tag.0)?;
        out.write_u32::<LittleEndian>(size)?;
        out.write_u32::<LittleEndian>(0)?;
        out.write_u32::<LittleEndian>(self.flags)?;
        out.write_all(&self.payload)?;
        Ok(())
    }
}

/// Encodes `value` as Windows-1252. Characters the codepage lacks become `?`.
pub fn encode_text(value: &str) -> Vec<u8> {
    let (bytes, _, unmappable) = WINDOWS_1252.encode(value);
    if !unmappable {
        return bytes.into_owned();
    }
    let mut buf = [0u8; 4];
    value
        .chars()
        .flat_map(|ch| {
            let (bytes, _, unmappable) = WINDOWS_1252.encode(ch.encode_utf8(&mut buf));
            if unmappable {
                vec![b'?']
            } else {
                bytes.into_owned()
            }
        })
        .collect()
}

/// Pads or truncates `value` to a fixed-width, NUL-filled field.
pub fn fixed_string(value: &str, width: usize) -> Vec<u8> {
    let mut bytes = encode_text(value);
    bytes.truncate(width);
    bytes.resize(width, 0);
    bytes
}

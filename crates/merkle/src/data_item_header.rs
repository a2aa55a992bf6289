//! ANS-104 data item header parsing (spec §4.1.2).
//!
//! Layout: 2-byte LE signature type, `signature_size` signature bytes,
//! `owner_size` owner bytes, a 1-byte target presence flag (+32 bytes if
//! set), a 1-byte anchor presence flag (+32 bytes if set), an 8-byte LE tag
//! count, an 8-byte LE tag bytes length, then that many bytes of Avro-encoded
//! `{name, value}` tag records. The payload starts immediately after.

use ario_gateway_primitives::{Id, SignatureType, Tag};

use crate::error::MerkleError;

#[derive(Debug, Clone, PartialEq)]
pub struct DataItemHeader {
    pub signature_type: u16,
    pub signature_offset: u64,
    pub signature_size: u64,
    pub owner_offset: u64,
    pub owner_size: u64,
    pub target: Option<Id>,
    pub anchor: Option<[u8; 32]>,
    pub tags: Vec<Tag>,
    /// Total header length in bytes; the payload starts right after it.
    pub header_size: u64,
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, field: &'static str, n: usize) -> Result<&'a [u8], MerkleError> {
        let end = self.pos.checked_add(n).ok_or(MerkleError::DataItemHeaderTruncated {
            field,
            need: n,
            have: self.bytes.len() - self.pos.min(self.bytes.len()),
        })?;
        if end > self.bytes.len() {
            return Err(MerkleError::DataItemHeaderTruncated {
                field,
                need: n,
                have: self.bytes.len() - self.pos,
            });
        }
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn take_u8(&mut self, field: &'static str) -> Result<u8, MerkleError> {
        Ok(self.take(field, 1)?[0])
    }

    fn take_u16_le(&mut self, field: &'static str) -> Result<u16, MerkleError> {
        let b = self.take(field, 2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn take_u64_le(&mut self, field: &'static str) -> Result<u64, MerkleError> {
        let b = self.take(field, 8)?;
        let mut arr = [0_u8; 8];
        arr.copy_from_slice(b);
        Ok(u64::from_le_bytes(arr))
    }
}

pub fn parse(bytes: &[u8]) -> Result<DataItemHeader, MerkleError> {
    let mut c = Cursor::new(bytes);

    let signature_type = c.take_u16_le("signature_type")?;
    let (signature_size, owner_size) = SignatureType(signature_type)
        .sizes()
        .ok_or(MerkleError::UnknownSignatureType(signature_type))?;

    let signature_offset = c.pos as u64;
    c.take("signature", signature_size as usize)?;

    let owner_offset = c.pos as u64;
    c.take("owner", owner_size as usize)?;

    let target_flag = c.take_u8("target_flag")?;
    let target = if target_flag == 1 {
        let b = c.take("target", 32)?;
        let mut arr = [0_u8; 32];
        arr.copy_from_slice(b);
        Some(Id::from_bytes(arr))
    } else {
        None
    };

    let anchor_flag = c.take_u8("anchor_flag")?;
    let anchor = if anchor_flag == 1 {
        let b = c.take("anchor", 32)?;
        let mut arr = [0_u8; 32];
        arr.copy_from_slice(b);
        Some(arr)
    } else {
        None
    };

    let tag_count = c.take_u64_le("tag_count")?;
    let tags_bytes_len = c.take_u64_le("tags_bytes_len")?;
    let tags_bytes = c.take("tags", tags_bytes_len as usize)?;
    let tags = decode_avro_tags(tags_bytes, tag_count)?;

    Ok(DataItemHeader {
        signature_type,
        signature_offset,
        signature_size,
        owner_offset,
        owner_size,
        target,
        anchor,
        tags,
        header_size: c.pos as u64,
    })
}

/// Decodes the Avro array-of-record encoding ANS-104 uses for tags: a
/// zig-zag varint block count (negative when followed by a byte-size
/// varint), that many `{name, value}` string pairs, repeated until a
/// terminating zero block count.
fn decode_avro_tags(bytes: &[u8], expected_count: u64) -> Result<Vec<Tag>, MerkleError> {
    let mut pos = 0_usize;
    let mut tags = Vec::new();

    loop {
        let (raw_count, n) = read_zigzag_varint(bytes, pos)?;
        pos += n;
        if raw_count == 0 {
            break;
        }
        let block_count = if raw_count < 0 {
            let (_block_size, n) = read_zigzag_varint(bytes, pos)?;
            pos += n;
            (-raw_count) as u64
        } else {
            raw_count as u64
        };

        for _ in 0..block_count {
            let (name, n) = read_avro_string(bytes, pos)?;
            pos += n;
            let (value, n) = read_avro_string(bytes, pos)?;
            pos += n;
            tags.push(Tag { name, value });
        }
    }

    if tags.len() as u64 != expected_count {
        return Err(MerkleError::MalformedTags(format!(
            "header declared {expected_count} tags, avro block decoded {}",
            tags.len()
        )));
    }
    Ok(tags)
}

fn read_zigzag_varint(bytes: &[u8], start: usize) -> Result<(i64, usize), MerkleError> {
    let mut result: u64 = 0;
    let mut shift = 0_u32;
    let mut pos = start;
    loop {
        let byte = *bytes
            .get(pos)
            .ok_or_else(|| MerkleError::MalformedTags("varint ran past end of buffer".into()))?;
        result |= u64::from(byte & 0x7f) << shift;
        pos += 1;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
        if shift >= 64 {
            return Err(MerkleError::MalformedTags("varint too long".into()));
        }
    }
    let zigzag = ((result >> 1) as i64) ^ -((result & 1) as i64);
    Ok((zigzag, pos - start))
}

fn read_avro_string(bytes: &[u8], start: usize) -> Result<(String, usize), MerkleError> {
    let (len, n) = read_zigzag_varint(bytes, start)?;
    let len = usize::try_from(len)
        .map_err(|_| MerkleError::MalformedTags("negative string length".into()))?;
    let data_start = start + n;
    let data_end = data_start
        .checked_add(len)
        .ok_or_else(|| MerkleError::MalformedTags("string length overflow".into()))?;
    let slice = bytes
        .get(data_start..data_end)
        .ok_or_else(|| MerkleError::MalformedTags("string ran past end of buffer".into()))?;
    let s = String::from_utf8(slice.to_vec())
        .map_err(|e| MerkleError::MalformedTags(format!("non-utf8 tag string: {e}")))?;
    Ok((s, n + len))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_zigzag_varint(value: i64, out: &mut Vec<u8>) {
        let mut zigzag = ((value << 1) ^ (value >> 63)) as u64;
        loop {
            let byte = (zigzag & 0x7f) as u8;
            zigzag >>= 7;
            if zigzag == 0 {
                out.push(byte);
                break;
            }
            out.push(byte | 0x80);
        }
    }

    fn encode_avro_string(s: &str, out: &mut Vec<u8>) {
        encode_zigzag_varint(s.len() as i64, out);
        out.extend_from_slice(s.as_bytes());
    }

    fn encode_tags(tags: &[(&str, &str)]) -> Vec<u8> {
        let mut out = Vec::new();
        if !tags.is_empty() {
            encode_zigzag_varint(tags.len() as i64, &mut out);
            for (name, value) in tags {
                encode_avro_string(name, &mut out);
                encode_avro_string(value, &mut out);
            }
        }
        encode_zigzag_varint(0, &mut out);
        out
    }

    fn build_header(tags: &[(&str, &str)]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&1_u16.to_le_bytes()); // Arweave RSA
        buf.extend(vec![0_u8; 512]); // signature
        buf.extend(vec![0_u8; 512]); // owner
        buf.push(0); // no target
        buf.push(0); // no anchor
        buf.extend_from_slice(&(tags.len() as u64).to_le_bytes());
        let tag_bytes = encode_tags(tags);
        buf.extend_from_slice(&(tag_bytes.len() as u64).to_le_bytes());
        buf.extend_from_slice(&tag_bytes);
        buf
    }

    #[test]
    fn parses_header_with_no_tags() {
        let buf = build_header(&[]);
        let header = parse(&buf).unwrap();
        assert_eq!(header.signature_type, 1);
        assert_eq!(header.signature_size, 512);
        assert_eq!(header.owner_size, 512);
        assert!(header.tags.is_empty());
        assert_eq!(header.header_size, buf.len() as u64);
    }

    #[test]
    fn round_trips_tags_through_avro_encoding() {
        let buf = build_header(&[("Content-Type", "text/plain"), ("App-Name", "gw")]);
        let header = parse(&buf).unwrap();
        assert_eq!(header.tags.len(), 2);
        assert_eq!(header.tags[0].name, "Content-Type");
        assert_eq!(header.tags[1].value, "gw");
    }

    #[test]
    fn rejects_unknown_signature_type() {
        let mut buf = build_header(&[]);
        buf[0..2].copy_from_slice(&9999_u16.to_le_bytes());
        assert!(matches!(
            parse(&buf),
            Err(MerkleError::UnknownSignatureType(9999))
        ));
    }

    #[test]
    fn rejects_truncated_owner_field() {
        let mut buf = build_header(&[]);
        buf.truncate(20);
        assert!(matches!(
            parse(&buf),
            Err(MerkleError::DataItemHeaderTruncated { .. })
        ));
    }
}

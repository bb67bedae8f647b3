//! DER `ECDSA-Sig-Value` (`SEQUENCE { INTEGER r, INTEGER s }`) to the fixed-width
//! `r || s` form the verification primitive consumes.

use super::CodecError;

const TAG_SEQUENCE: u8 = 0x30;
const TAG_INTEGER: u8 = 0x02;

/// Convert a DER signature into `2 * coordinate_width` big-endian bytes.
pub fn to_raw(der: &[u8], coordinate_width: usize) -> Result<Vec<u8>, CodecError> {
    let mut outer = Reader::new(der);
    let body = outer.tlv(TAG_SEQUENCE, "outer tag is not SEQUENCE")?;
    if !outer.is_empty() {
        return Err(CodecError::MalformedSignature("trailing bytes after SEQUENCE"));
    }

    let mut inner = Reader::new(body);
    let r = inner.tlv(TAG_INTEGER, "r is not an INTEGER")?;
    let s = inner.tlv(TAG_INTEGER, "s is not an INTEGER")?;
    if !inner.is_empty() {
        return Err(CodecError::MalformedSignature("trailing bytes inside SEQUENCE"));
    }

    let mut raw = vec![0u8; 2 * coordinate_width];
    let (r_out, s_out) = raw.split_at_mut(coordinate_width);
    place(r, r_out)?;
    place(s, s_out)?;
    Ok(raw)
}

/// Left-pad the unsigned magnitude of a DER INTEGER into `out`.
fn place(integer: &[u8], out: &mut [u8]) -> Result<(), CodecError> {
    let magnitude = unsigned_magnitude(integer)?;
    if magnitude.len() > out.len() {
        return Err(CodecError::MalformedSignature("integer wider than coordinate"));
    }
    let offset = out.len() - magnitude.len();
    out[offset..].copy_from_slice(magnitude);
    Ok(())
}

/// A leading 0x00 is present iff the next byte has its high bit set.
fn unsigned_magnitude(integer: &[u8]) -> Result<&[u8], CodecError> {
    match integer {
        [] => Err(CodecError::MalformedSignature("empty INTEGER")),
        [first, ..] if first & 0x80 != 0 => {
            Err(CodecError::MalformedSignature("negative INTEGER"))
        }
        [0x00, next, ..] if next & 0x80 == 0 => {
            Err(CodecError::MalformedSignature("INTEGER has redundant leading zero"))
        }
        [0x00, rest @ ..] if !rest.is_empty() => Ok(rest),
        _ => Ok(integer),
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos == self.buf.len()
    }

    fn byte(&mut self) -> Result<u8, CodecError> {
        let b = *self
            .buf
            .get(self.pos)
            .ok_or(CodecError::MalformedSignature("truncated"))?;
        self.pos += 1;
        Ok(b)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.buf.len())
            .ok_or(CodecError::MalformedSignature("length exceeds buffer"))?;
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    /// Short form, or the one-byte long form (0x81 nn) with nn >= 0x80.
    fn length(&mut self) -> Result<usize, CodecError> {
        match self.byte()? {
            short @ 0x00..=0x7f => Ok(short as usize),
            0x81 => {
                let len = self.byte()?;
                if len < 0x80 {
                    return Err(CodecError::MalformedSignature("non-minimal length"));
                }
                Ok(len as usize)
            }
            _ => Err(CodecError::MalformedSignature("unsupported length form")),
        }
    }

    fn tlv(&mut self, tag: u8, wrong_tag: &'static str) -> Result<&'a [u8], CodecError> {
        if self.byte()? != tag {
            return Err(CodecError::MalformedSignature(wrong_tag));
        }
        let len = self.length()?;
        self.take(len)
    }
}

use ciborium::value::Value;

use crate::config::AUTH_DATA_HEADER_LEN;

const RP_ID_HASH_LEN: usize = 32;
const AAGUID_LEN: usize = 16;

/// Flag byte of authenticatorData. Reserved bits are carried but never interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatorFlags(u8);

impl AuthenticatorFlags {
    pub const USER_PRESENT: u8 = 0x01;
    pub const USER_VERIFIED: u8 = 0x04;
    pub const ATTESTED_CREDENTIAL_DATA: u8 = 0x40;
    pub const EXTENSION_DATA: u8 = 0x80;

    pub fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn user_present(self) -> bool {
        self.0 & Self::USER_PRESENT != 0
    }

    pub fn user_verified(self) -> bool {
        self.0 & Self::USER_VERIFIED != 0
    }

    pub fn attested_credential_data(self) -> bool {
        self.0 & Self::ATTESTED_CREDENTIAL_DATA != 0
    }

    pub fn extension_data(self) -> bool {
        self.0 & Self::EXTENSION_DATA != 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatorData {
    pub rp_id_hash: [u8; RP_ID_HASH_LEN],
    pub flags: AuthenticatorFlags,
    /// signCount, big-endian on the wire.
    pub counter: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthDataError {
    #[error("buffer is {0} bytes, shorter than the 37-byte header")]
    TooShort(usize),
    #[error("truncated {0}")]
    Truncated(&'static str),
    #[error("invalid CBOR in {section}: {detail}")]
    Cbor { section: &'static str, detail: String },
    #[error("{0} unexpected trailing bytes")]
    TrailingBytes(usize),
}

/// Parse an assertion's authenticatorData.
///
/// Attested credential data and extension sections are skipped when their
/// flags announce them; their contents are not returned.
pub fn parse(bytes: &[u8]) -> Result<AuthenticatorData, AuthDataError> {
    if bytes.len() < AUTH_DATA_HEADER_LEN {
        return Err(AuthDataError::TooShort(bytes.len()));
    }
    let mut cur = Cursor::new(bytes);
    let rp_id_hash = cur.array::<RP_ID_HASH_LEN>("rpIdHash")?;
    let [flags] = cur.array::<1>("flags")?;
    let flags = AuthenticatorFlags(flags);
    let counter = u32::from_be_bytes(cur.array::<4>("signCount")?);

    if flags.attested_credential_data() {
        cur.take(AAGUID_LEN, "aaguid")?;
        let id_len = u16::from_be_bytes(cur.array::<2>("credentialIdLength")?) as usize;
        cur.take(id_len, "credentialId")?;
        cur.skip_cbor_item("credentialPublicKey")?;
    }
    if flags.extension_data() {
        let extensions = cur.skip_cbor_item("extensions")?;
        if !matches!(extensions, Value::Map(_)) {
            return Err(AuthDataError::Cbor {
                section: "extensions",
                detail: "expected map".into(),
            });
        }
    }
    if cur.remaining() != 0 {
        return Err(AuthDataError::TrailingBytes(cur.remaining()));
    }

    Ok(AuthenticatorData {
        rp_id_hash,
        flags,
        counter,
    })
}

/// Bounds-checked reader over an immutable slice.
struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize, what: &'static str) -> Result<&'a [u8], AuthDataError> {
        if n > self.remaining() {
            return Err(AuthDataError::Truncated(what));
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn array<const N: usize>(&mut self, what: &'static str) -> Result<[u8; N], AuthDataError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, what)?);
        Ok(out)
    }

    /// Consume exactly one CBOR data item.
    fn skip_cbor_item(&mut self, section: &'static str) -> Result<Value, AuthDataError> {
        let mut reader = std::io::Cursor::new(&self.buf[self.pos..]);
        let value: Value = ciborium::from_reader(&mut reader).map_err(|e| AuthDataError::Cbor {
            section,
            detail: e.to_string(),
        })?;
        self.pos += reader.position() as usize;
        Ok(value)
    }
}

use ciborium::value::Value;

use super::types::KeyError;

const COSE_KTY: i64 = 1;
const COSE_ALG: i64 = 3;
const COSE_CRV: i64 = -1;
const COSE_X: i64 = -2;
const COSE_Y: i64 = -3;

const KTY_EC2: i64 = 2;
const ALG_ES256: i64 = -7;
const CRV_P256: i64 = 1;

/// Encode P-256 coordinates as a COSE_Key map (kty=2, alg=-7, crv=1, x, y).
pub(crate) fn encode_p256(x: &[u8], y: &[u8]) -> Result<Vec<u8>, KeyError> {
    let map = Value::Map(vec![
        (Value::Integer(COSE_KTY.into()), Value::Integer(KTY_EC2.into())),
        (Value::Integer(COSE_ALG.into()), Value::Integer(ALG_ES256.into())),
        (Value::Integer(COSE_CRV.into()), Value::Integer(CRV_P256.into())),
        (Value::Integer(COSE_X.into()), Value::Bytes(x.to_vec())),
        (Value::Integer(COSE_Y.into()), Value::Bytes(y.to_vec())),
    ]);
    let mut buf = Vec::new();
    ciborium::into_writer(&map, &mut buf).map_err(|e| KeyError::Cose(e.to_string()))?;
    Ok(buf)
}

/// Decode an ES256 COSE_Key into its `(x, y)` coordinates.
pub(crate) fn decode_p256(bytes: &[u8]) -> Result<(Vec<u8>, Vec<u8>), KeyError> {
    let value: Value =
        ciborium::from_reader(bytes).map_err(|e| KeyError::Cose(e.to_string()))?;
    let Value::Map(map) = value else {
        return Err(KeyError::Cose("COSE key is not a map".into()));
    };

    let int = |label: i64| -> Option<i128> {
        match cose_get(&map, label)? {
            Value::Integer(i) => Some(i128::from(*i)),
            _ => None,
        }
    };
    if int(COSE_KTY) != Some(KTY_EC2.into()) {
        return Err(KeyError::Unsupported("key type"));
    }
    // alg is optional in a COSE_Key; when present it must be ES256
    if cose_get(&map, COSE_ALG).is_some() && int(COSE_ALG) != Some(ALG_ES256.into()) {
        return Err(KeyError::Unsupported("algorithm"));
    }
    if int(COSE_CRV) != Some(CRV_P256.into()) {
        return Err(KeyError::Unsupported("curve"));
    }

    let x = cose_bytes(&map, COSE_X).ok_or(KeyError::Cose("missing x coordinate".into()))?;
    let y = cose_bytes(&map, COSE_Y).ok_or(KeyError::Cose("missing y coordinate".into()))?;
    Ok((x.to_vec(), y.to_vec()))
}

fn cose_get(map: &[(Value, Value)], label: i64) -> Option<&Value> {
    let target = Value::Integer(label.into());
    map.iter().find(|(k, _)| k == &target).map(|(_, v)| v)
}

fn cose_bytes(map: &[(Value, Value)], label: i64) -> Option<&[u8]> {
    match cose_get(map, label)? {
        Value::Bytes(b) => Some(b),
        _ => None,
    }
}

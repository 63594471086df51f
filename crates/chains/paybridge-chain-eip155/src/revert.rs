//! Revert reason decoding for failed EVM calls.
//!
//! Nodes surface revert payloads in two shapes. Most put the ABI-encoded bytes in
//! the `data` member of the JSON-RPC error object; some only embed them in the
//! human-readable message, e.g. `execution reverted: 0x08c379a0...`. Extraction
//! tries the structured data first and the message second; selector dispatch then
//! works on the bytes alone, whichever strategy produced them.
//!
//! ```
//! use paybridge_chain_eip155::revert::decode_revert_reason;
//!
//! let decoded = decode_revert_reason("execution reverted: 0xdeadbeef01").unwrap();
//! assert_eq!(decoded.selector, "0xdeadbeef");
//!
//! assert!(decode_revert_reason("execution reverted").is_none());
//! ```

use alloy_sol_types::sol_data;
use alloy_sol_types::{Panic, Revert, SolError, SolType};
use alloy_transport::TransportError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

static HEX_PAYLOAD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"0x[0-9a-fA-F]+").expect("valid regex"));

/// An error that may carry a revert payload.
///
/// Every error can be scanned through its message. Error types that keep the
/// JSON-RPC `data` member around expose it through [`RevertError::error_data`].
pub trait RevertError: fmt::Display {
    fn error_data(&self) -> Option<serde_json::Value> {
        None
    }
}

impl RevertError for str {}

impl RevertError for String {}

impl RevertError for TransportError {
    fn error_data(&self) -> Option<serde_json::Value> {
        let payload = self.as_error_resp()?;
        let raw = payload.data.as_ref()?;
        serde_json::from_str(raw.get()).ok()
    }
}

/// A revert payload decoded for operators.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodedRevert {
    /// Full payload, `0x`-prefixed lower-case hex.
    pub raw_hex: String,
    /// First four bytes, `0x` followed by exactly 8 lower-case hex digits.
    pub selector: String,
    /// `Panic` or `Error` for the standard Solidity errors, empty otherwise.
    pub name: String,
    pub message: String,
    pub details: String,
}

/// Decodes the revert reason carried by `err`.
///
/// Returns `None` when no payload can be found or it is too short to hold a
/// selector. That is the plain "execution reverted" case, not a failure.
pub fn decode_revert_reason<E>(err: &E) -> Option<DecodedRevert>
where
    E: RevertError + ?Sized,
{
    let bytes = bytes_from_error_data(err).or_else(|| bytes_from_message(err))?;
    decode_revert_bytes(&bytes)
}

fn bytes_from_error_data<E: RevertError + ?Sized>(err: &E) -> Option<Vec<u8>> {
    let data = err.error_data()?;
    let hex_str = match &data {
        serde_json::Value::String(s) => s.as_str(),
        // Some nodes nest the payload one level deeper.
        serde_json::Value::Object(map) => map.get("data")?.as_str()?,
        _ => return None,
    };
    decode_hex(hex_str.strip_prefix("0x")?).filter(|bytes| !bytes.is_empty())
}

fn bytes_from_message<E: RevertError + ?Sized>(err: &E) -> Option<Vec<u8>> {
    let message = err.to_string();
    let found = HEX_PAYLOAD.find(&message)?;
    decode_hex(&found.as_str()[2..])
}

/// Decodes hex digits, dropping a trailing odd nibble.
fn decode_hex(digits: &str) -> Option<Vec<u8>> {
    let even = &digits[..digits.len() - digits.len() % 2];
    hex::decode(even).ok()
}

/// Dispatches on the selector of an ABI-encoded revert payload.
pub fn decode_revert_bytes(bytes: &[u8]) -> Option<DecodedRevert> {
    if bytes.len() < 4 {
        return None;
    }
    let mut decoded = DecodedRevert {
        raw_hex: format!("0x{}", hex::encode(bytes)),
        selector: format!("0x{}", hex::encode(&bytes[..4])),
        ..DecodedRevert::default()
    };

    if bytes[..4] == Panic::SELECTOR {
        decoded.name = "Panic".to_string();
        match Panic::abi_decode(bytes) {
            Ok(panic) => {
                decoded.message = format!("panic code: {}", panic.code);
                decoded.details = panic
                    .kind()
                    .map(|kind| kind.to_string())
                    .unwrap_or_else(|| format!("unknown panic code 0x{:x}", panic.code));
            }
            Err(_) => decoded.details = "truncated panic payload".to_string(),
        }
    } else {
        if bytes[..4] == Revert::SELECTOR {
            decoded.name = "Error".to_string();
        }
        decoded.message = abi_utf8_string(&bytes[4..]).unwrap_or_default();
    }

    Some(decoded)
}

/// Reads an ABI-encoded `string` argument, rejecting bodies that are not UTF-8.
fn abi_utf8_string(data: &[u8]) -> Option<String> {
    let body = <sol_data::Bytes as SolType>::abi_decode(data).ok()?;
    String::from_utf8(body.to_vec()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Bytes, U256};

    /// An error with structured data, the way JSON-RPC error payloads carry it.
    struct RpcErrorWithData {
        message: &'static str,
        data: serde_json::Value,
    }

    impl fmt::Display for RpcErrorWithData {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.message)
        }
    }

    impl RevertError for RpcErrorWithData {
        fn error_data(&self) -> Option<serde_json::Value> {
            Some(self.data.clone())
        }
    }

    fn panic_payload(code: u64) -> String {
        let encoded = Panic { code: U256::from(code) }.abi_encode();
        format!("0x{}", hex::encode(encoded))
    }

    fn error_string_payload(reason: &str) -> String {
        let encoded = Revert {
            reason: reason.to_string(),
        }
        .abi_encode();
        format!("0x{}", hex::encode(encoded))
    }

    #[test]
    fn test_panic_from_error_data() {
        let data = format!("0x4e487b71{:0>64}", "11");
        assert_eq!(data, panic_payload(17));
        let err = RpcErrorWithData {
            message: "execution reverted",
            data: serde_json::Value::String(data),
        };
        let decoded = decode_revert_reason(&err).unwrap();
        assert_eq!(decoded.name, "Panic");
        assert_eq!(decoded.message, "panic code: 17");
        assert_eq!(decoded.selector, "0x4e487b71");
        assert!(!decoded.details.is_empty());
    }

    #[test]
    fn test_unknown_selector_from_message() {
        let decoded = decode_revert_reason("execution reverted: 0xdeadbeef01").unwrap();
        assert_eq!(decoded.selector, "0xdeadbeef");
        assert_eq!(decoded.raw_hex, "0xdeadbeef01");
        assert_eq!(decoded.name, "");
        assert_eq!(decoded.message, "");
    }

    #[test]
    fn test_plain_revert_has_no_payload() {
        assert_eq!(decode_revert_reason("execution reverted"), None);
    }

    #[test]
    fn test_short_payload_is_undecodable() {
        assert_eq!(decode_revert_reason("execution reverted: 0xdead"), None);
        assert_eq!(decode_revert_bytes(&[0x4e, 0x48, 0x7b]), None);
    }

    #[test]
    fn test_error_string_from_data() {
        let err = RpcErrorWithData {
            message: "execution reverted",
            data: serde_json::Value::String(error_string_payload("Invalid signature order")),
        };
        let decoded = decode_revert_reason(&err).unwrap();
        assert_eq!(decoded.selector, "0x08c379a0");
        assert_eq!(decoded.name, "Error");
        assert_eq!(decoded.message, "Invalid signature order");
    }

    #[test]
    fn test_custom_selector_with_string_argument() {
        let mut bytes = vec![0xca, 0xfe, 0xba, 0xbe];
        bytes.extend(<sol_data::String as SolType>::abi_encode(&"route paused".to_string()));
        let decoded = decode_revert_bytes(&bytes).unwrap();
        assert_eq!(decoded.selector, "0xcafebabe");
        assert_eq!(decoded.name, "");
        assert_eq!(decoded.message, "route paused");
    }

    #[test]
    fn test_invalid_utf8_message_is_left_empty() {
        let body = <sol_data::Bytes as SolType>::abi_encode(&Bytes::from(vec![0xff, 0xfe]));
        for selector in [[0xca, 0xfe, 0xba, 0xbe], Revert::SELECTOR] {
            let mut bytes = selector.to_vec();
            bytes.extend_from_slice(&body);
            let decoded = decode_revert_bytes(&bytes).unwrap();
            assert_eq!(decoded.selector, format!("0x{}", hex::encode(selector)));
            assert_eq!(decoded.message, "");
        }
    }

    #[test]
    fn test_empty_data_falls_back_to_message() {
        let err = RpcErrorWithData {
            message: "execution reverted: 0xdeadbeef01",
            data: serde_json::Value::String("0x".into()),
        };
        let decoded = decode_revert_reason(&err).unwrap();
        assert_eq!(decoded.selector, "0xdeadbeef");
    }

    #[test]
    fn test_structured_data_wins_over_message() {
        let err = RpcErrorWithData {
            message: "execution reverted: 0xdeadbeef",
            data: serde_json::Value::String(panic_payload(0x12)),
        };
        let decoded = decode_revert_reason(&err).unwrap();
        assert_eq!(decoded.message, "panic code: 18");
    }

    #[test]
    fn test_non_hex_data_falls_back_to_message() {
        let err = RpcErrorWithData {
            message: "execution reverted: 0xdeadbeef",
            data: serde_json::Value::String("Reverted".into()),
        };
        let decoded = decode_revert_reason(&err).unwrap();
        assert_eq!(decoded.selector, "0xdeadbeef");
    }

    #[test]
    fn test_nested_data_object() {
        let err = RpcErrorWithData {
            message: "execution reverted",
            data: serde_json::json!({ "data": panic_payload(1) }),
        };
        let decoded = decode_revert_reason(&err).unwrap();
        assert_eq!(decoded.message, "panic code: 1");
    }

    #[test]
    fn test_selector_is_lower_case() {
        let decoded = decode_revert_reason("reverted with 0xDEADBEEF00").unwrap();
        assert_eq!(decoded.selector, "0xdeadbeef");
    }

    #[test]
    fn test_decoded_revert_json_shape() {
        let decoded = decode_revert_reason("execution reverted: 0xdeadbeef01").unwrap();
        let json = serde_json::to_value(&decoded).unwrap();
        assert_eq!(json["rawHex"], "0xdeadbeef01");
        assert_eq!(json["selector"], "0xdeadbeef");
        assert!(json.get("details").is_some());
    }
}

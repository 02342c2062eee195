use crate::decimal128::Decimal128;
use crate::kind::ColumnKind;
use crate::object_id::ObjectId;
use crate::timestamp::Timestamp;
use crate::value::{Mixed, Value};

/// Literal text prefixed this way decodes as base64 bytes (spec §4.1);
/// the prefix is what lets a `Binary` literal coexist in the same grammar
/// position as a quoted string.
const BASE64_PREFIX: &str = "b64:";

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum LiteralError {
    #[error("{text:?} is not a valid {kind:?} literal")]
    Malformed { text: String, kind: ColumnKind },
    #[error("{0:?} has no textual literal form")]
    NotLiteral(ColumnKind),
}

/// Parses `text` as a literal of `expected` kind (spec §4.1).
pub fn coerce_literal(text: &str, expected: ColumnKind) -> Result<Mixed, LiteralError> {
    let malformed = || LiteralError::Malformed {
        text: text.to_string(),
        kind: expected,
    };

    let value = match expected {
        ColumnKind::Int => Value::Int(parse_int(text).ok_or_else(malformed)?),
        ColumnKind::Bool => Value::Bool(match text {
            "true" | "TRUE" => true,
            "false" | "FALSE" => false,
            _ => return Err(malformed()),
        }),
        ColumnKind::Float => Value::Float(parse_symbolic_float(text).ok_or_else(malformed)? as f32),
        ColumnKind::Double => Value::Double(parse_symbolic_float(text).ok_or_else(malformed)?),
        ColumnKind::Decimal128 => Value::Decimal128(Decimal128::parse(text).ok_or_else(malformed)?),
        ColumnKind::Timestamp => Value::Timestamp(Timestamp::parse(text).ok_or_else(malformed)?),
        ColumnKind::ObjectId => Value::ObjectId(ObjectId::parse(text).ok_or_else(malformed)?),
        ColumnKind::Uuid => Value::Uuid(uuid::Uuid::parse_str(text).map_err(|_| malformed())?),
        ColumnKind::Binary => Value::Binary(decode_base64(text).ok_or_else(malformed)?),
        ColumnKind::String => {
            if let Some(bytes) = text.strip_prefix(BASE64_PREFIX).and_then(decode_base64_payload) {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            } else {
                Value::String(text.to_string())
            }
        }
        ColumnKind::Mixed => return coerce_mixed_literal(text),
        ColumnKind::Link | ColumnKind::BackLink => return Err(LiteralError::NotLiteral(expected)),
    };

    Ok(Mixed::Value(value))
}

// Mixed columns have no single expected kind, so the literal's own syntax
// picks a kind: base64 prefix -> Binary, otherwise try numeric forms
// before falling back to String, matching how a bare literal in a query
// predicate against a Mixed column is lowered (query crate leans on this
// same ordering when a Property resolves to Mixed).
fn coerce_mixed_literal(text: &str) -> Result<Mixed, LiteralError> {
    if text.eq_ignore_ascii_case("null") {
        return Ok(Mixed::Null);
    }
    if let Some(bytes) = text.strip_prefix(BASE64_PREFIX).and_then(decode_base64_payload) {
        return Ok(Mixed::Value(Value::Binary(bytes)));
    }
    if let Some(i) = parse_int(text) {
        return Ok(Mixed::Value(Value::Int(i)));
    }
    if let Some(f) = parse_symbolic_float(text) {
        return Ok(Mixed::Value(Value::Double(f)));
    }
    Ok(Mixed::Value(Value::String(text.to_string())))
}

fn parse_int(text: &str) -> Option<i64> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).ok();
    }
    if let Some(hex) = text.strip_prefix("-0x").or_else(|| text.strip_prefix("-0X")) {
        return i64::from_str_radix(hex, 16).ok().map(|v: i64| -v);
    }
    text.parse().ok()
}

fn parse_symbolic_float(text: &str) -> Option<f64> {
    if text.eq_ignore_ascii_case("nan") {
        return Some(f64::NAN);
    }
    if text.eq_ignore_ascii_case("+inf") {
        return Some(f64::INFINITY);
    }
    if text.eq_ignore_ascii_case("-inf") {
        return Some(f64::NEG_INFINITY);
    }
    text.parse().ok()
}

fn decode_base64(text: &str) -> Option<Vec<u8>> {
    text.strip_prefix(BASE64_PREFIX).and_then(decode_base64_payload)
}

fn decode_base64_payload(payload: &str) -> Option<Vec<u8>> {
    base64::decode(payload).ok()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_int_decimal_and_hex() {
        assert_eq!(coerce_literal("42", ColumnKind::Int), Ok(Mixed::Value(Value::Int(42))));
        assert_eq!(coerce_literal("0x2A", ColumnKind::Int), Ok(Mixed::Value(Value::Int(42))));
        assert_eq!(coerce_literal("-0x2A", ColumnKind::Int), Ok(Mixed::Value(Value::Int(-42))));
    }

    #[test]
    fn test_float_symbolic_constants() {
        let Mixed::Value(Value::Double(d)) = coerce_literal("nan", ColumnKind::Double).unwrap() else {
            panic!("expected double");
        };
        assert!(d.is_nan());

        assert_eq!(
            coerce_literal("+inf", ColumnKind::Double),
            Ok(Mixed::Value(Value::Double(f64::INFINITY)))
        );
    }

    #[test]
    fn test_timestamp_sign_rejected_bubbles_up() {
        assert!(coerce_literal("T5:-1", ColumnKind::Timestamp).is_err());
    }

    #[test]
    fn test_object_id_and_uuid() {
        assert!(coerce_literal(&"a".repeat(24), ColumnKind::ObjectId).is_ok());
        assert!(coerce_literal("not-an-object-id", ColumnKind::ObjectId).is_err());
        assert!(coerce_literal("3b241101-e2bb-4255-8caf-4136c566a962", ColumnKind::Uuid).is_ok());
    }

    #[test]
    fn test_binary_base64() {
        let encoded = "b64:aGVsbG8=";
        assert_eq!(
            coerce_literal(encoded, ColumnKind::Binary),
            Ok(Mixed::Value(Value::Binary(b"hello".to_vec())))
        );
        assert!(coerce_literal("not-base64", ColumnKind::Binary).is_err());
    }

    #[test]
    fn test_mixed_infers_kind_from_syntax() {
        assert_eq!(coerce_literal("null", ColumnKind::Mixed), Ok(Mixed::Null));
        assert_eq!(
            coerce_literal("42", ColumnKind::Mixed),
            Ok(Mixed::Value(Value::Int(42)))
        );
        assert_eq!(
            coerce_literal("hello", ColumnKind::Mixed),
            Ok(Mixed::Value(Value::String("hello".into())))
        );
    }
}

//! Field transcoding: raw legacy strings → typed V2 values.
//!
//! A single algorithm serves both record classes; the [`Policy`] decides what
//! happens to fields missing from the table. Primary objects are transcoded
//! `Strict` so a field added upstream must be classified before it can be
//! migrated. Sub-records use `Lenient` and pass unknown fields through as
//! strings.

use std::collections::BTreeMap;

use rekey_model::{FieldKind, FieldMap, FieldTable, V2Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    Strict,
    Lenient,
}

pub type V2FieldMap = BTreeMap<String, V2Value>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TranscodeError {
    #[error("unclassified fields: {}", .0.join(", "))]
    UnknownFields(Vec<String>),

    #[error("field `{field}`: `{value}` is not an integer")]
    InvalidInteger { field: String, value: String },

    #[error("field `{field}`: `{value}` is not a number")]
    InvalidFloat { field: String, value: String },
}

pub fn transcode(
    fields: &FieldMap,
    table: &FieldTable,
    policy: Policy,
) -> Result<V2FieldMap, TranscodeError> {
    if policy == Policy::Strict {
        let unknown: Vec<String> = fields
            .keys()
            .filter(|name| !table.contains(name))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(TranscodeError::UnknownFields(unknown));
        }
    }

    let mut out = V2FieldMap::new();
    for (name, raw) in fields {
        let kind = table.kind_of(name).unwrap_or(FieldKind::String);
        out.insert(name.clone(), coerce(name, raw, kind)?);
    }
    Ok(out)
}

pub fn coerce(field: &str, raw: &str, kind: FieldKind) -> Result<V2Value, TranscodeError> {
    if raw.is_empty() {
        return Ok(V2Value::Null);
    }
    match kind {
        FieldKind::String => Ok(V2Value::String(raw.to_string())),
        FieldKind::Boolean => Ok(V2Value::Boolean(matches!(raw, "true" | "1"))),
        FieldKind::Integer => {
            raw.trim()
                .parse::<i64>()
                .map(V2Value::Integer)
                .map_err(|_| TranscodeError::InvalidInteger {
                    field: field.to_string(),
                    value: raw.to_string(),
                })
        }
        FieldKind::Float => match raw.trim().parse::<f64>() {
            Ok(f) if f.is_finite() => Ok(V2Value::Float(f)),
            _ => Err(TranscodeError::InvalidFloat {
                field: field.to_string(),
                value: raw.to_string(),
            }),
        },
    }
}

/// Serialized V2 hash content, ready for encoding.
pub fn serialize(fields: &V2FieldMap) -> FieldMap {
    fields
        .iter()
        .map(|(k, v)| (k.clone(), v.to_serialized()))
        .collect()
}

/// Typed V2 hash content from a decoded V2 payload.
pub fn deserialize(fields: &FieldMap) -> V2FieldMap {
    fields
        .iter()
        .map(|(k, v)| (k.clone(), V2Value::from_serialized(v)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const TABLE: FieldTable = FieldTable(&[
        ("name", FieldKind::String),
        ("count", FieldKind::Integer),
        ("created", FieldKind::Float),
        ("verified", FieldKind::Boolean),
    ]);

    fn map(pairs: &[(&str, &str)]) -> FieldMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_strict_rejects_every_unknown_field() {
        let err = transcode(&map(&[("name", "a"), ("zeta", "1"), ("alpha", "2")]), &TABLE, Policy::Strict)
            .unwrap_err();
        assert_eq!(
            err,
            TranscodeError::UnknownFields(vec!["alpha".to_string(), "zeta".to_string()])
        );
    }

    #[test]
    fn test_lenient_passes_unknown_through_as_string() {
        let out = transcode(&map(&[("zeta", "12")]), &TABLE, Policy::Lenient).unwrap();
        assert_eq!(out["zeta"], V2Value::String("12".into()));
    }

    #[test]
    fn test_coercions() {
        let out = transcode(
            &map(&[
                ("name", "x"),
                ("count", "3"),
                ("created", "1000"),
                ("verified", "1"),
            ]),
            &TABLE,
            Policy::Strict,
        )
        .unwrap();
        assert_eq!(out["name"], V2Value::String("x".into()));
        assert_eq!(out["count"], V2Value::Integer(3));
        assert_eq!(out["created"], V2Value::Float(1000.0));
        assert_eq!(out["verified"], V2Value::Boolean(true));
    }

    #[test]
    fn test_boolean_only_true_or_one() {
        for raw in ["false", "0", "yes", "TRUE", "on"] {
            assert_eq!(
                coerce("f", raw, FieldKind::Boolean).unwrap(),
                V2Value::Boolean(false),
                "{raw}"
            );
        }
        assert_eq!(coerce("f", "true", FieldKind::Boolean).unwrap(), V2Value::Boolean(true));
    }

    #[test]
    fn test_empty_becomes_null_for_every_kind() {
        for kind in [FieldKind::String, FieldKind::Integer, FieldKind::Float, FieldKind::Boolean] {
            assert_eq!(coerce("f", "", kind).unwrap(), V2Value::Null);
        }
    }

    #[test]
    fn test_bad_numbers_name_the_field() {
        let err = coerce("created", "yesterday", FieldKind::Float).unwrap_err();
        assert!(err.to_string().contains("created"));
        let err = coerce("count", "1.5", FieldKind::Integer).unwrap_err();
        assert!(matches!(err, TranscodeError::InvalidInteger { .. }));
    }

    #[test]
    fn test_serialize_deserialize() {
        let out = transcode(&map(&[("name", "x"), ("created", "1000")]), &TABLE, Policy::Strict)
            .unwrap();
        let ser = serialize(&out);
        assert_eq!(ser["name"], "\"x\"");
        assert_eq!(ser["created"], "1000.0");
        assert_eq!(deserialize(&ser), out);
    }

    proptest! {
        #[test]
        fn legacy_integer_seconds_become_float_seconds(secs in 0i64..4_000_000_000) {
            let v = coerce("created", &secs.to_string(), FieldKind::Float).unwrap();
            prop_assert_eq!(v, V2Value::Float(secs as f64));
        }

        #[test]
        fn lenient_never_drops_fields(
            fields in prop::collection::btree_map("[a-z]{1,8}", "[a-z0-9]{0,8}", 0..12)
        ) {
            let out = transcode(&fields, &FieldTable(&[]), Policy::Lenient).unwrap();
            prop_assert_eq!(out.len(), fields.len());
        }
    }
}

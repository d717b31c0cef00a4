use serde::Serialize;
use serde_json::{Map, Value};

/// Attribute prefixes reserved by the canonical model. Keys carrying one of
/// these land in a dedicated bucket instead of the generic event params.
pub const TRAFFIC_SOURCE_PREFIX: &str = "_traffic_source_";
pub const PRIVACY_INFO_PREFIX: &str = "_privacy_info_";
pub const USER_LTV_PREFIX: &str = "_user_ltv_";

const NESTED_VALUE_KEY: &str = "value";

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    String,
    Number,
    Boolean,
    Object,
    Null,
}

/// Infer the semantic type of a single JSON leaf value. Arrays and objects
/// both classify as `Object`; callers typically skip `Null`.
pub fn classify(value: &Value) -> ValueType {
    match value {
        Value::Null => ValueType::Null,
        Value::Bool(_) => ValueType::Boolean,
        Value::Number(_) => ValueType::Number,
        Value::String(_) => ValueType::String,
        Value::Array(_) | Value::Object(_) => ValueType::Object,
    }
}

/// A value paired with its inferred type. The value is carried as text:
/// strings verbatim, everything else rendered as JSON.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct TypedValue {
    pub value: String,
    #[serde(rename = "type")]
    pub value_type: ValueType,
}

impl TypedValue {
    pub fn from_value(value: &Value) -> TypedValue {
        let text = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        TypedValue {
            value: text,
            value_type: classify(value),
        }
    }

    pub fn string(value: impl Into<String>) -> TypedValue {
        TypedValue {
            value: value.into(),
            value_type: ValueType::String,
        }
    }
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct BucketedAttr {
    pub name: String,
    #[serde(flatten)]
    pub value: TypedValue,
}

/// Retain the keys of `attrs` starting with `prefix`, strip the prefix and
/// classify the values. Iteration order of the map is preserved.
pub fn bucket(attrs: &Map<String, Value>, prefix: &str) -> Vec<BucketedAttr> {
    attrs
        .iter()
        .filter_map(|(name, value)| {
            let short_name = name.strip_prefix(prefix)?;
            Some(BucketedAttr {
                name: short_name.to_string(),
                value: TypedValue::from_value(value),
            })
        })
        .collect()
}

/// The four-way prefix partition of a flat attribute map. Buckets are
/// pairwise disjoint: prefixes are checked in the fixed order traffic
/// source, privacy info, lifetime value, then the default bucket, so a key
/// is never counted twice.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AttributeBuckets {
    pub traffic_source: Vec<BucketedAttr>,
    pub privacy_info: Vec<BucketedAttr>,
    pub user_ltv: Vec<BucketedAttr>,
    pub event_params: Vec<BucketedAttr>,
}

impl AttributeBuckets {
    pub fn partition(attrs: &Map<String, Value>) -> AttributeBuckets {
        let mut buckets = AttributeBuckets::default();
        for (name, value) in attrs {
            if let Some(short_name) = name.strip_prefix(TRAFFIC_SOURCE_PREFIX) {
                buckets.traffic_source.push(BucketedAttr {
                    name: short_name.to_string(),
                    value: TypedValue::from_value(value),
                });
            } else if let Some(short_name) = name.strip_prefix(PRIVACY_INFO_PREFIX) {
                buckets.privacy_info.push(BucketedAttr {
                    name: short_name.to_string(),
                    value: TypedValue::from_value(value),
                });
            } else if let Some(short_name) = name.strip_prefix(USER_LTV_PREFIX) {
                // Lifetime-value attributes wrap their payload in a nested
                // `value` field; entries without one are skipped outright
                // rather than bucketed with a null.
                match value.get(NESTED_VALUE_KEY) {
                    Some(inner) if !inner.is_null() => buckets.user_ltv.push(BucketedAttr {
                        name: short_name.to_string(),
                        value: TypedValue::from_value(inner),
                    }),
                    _ => tracing::debug!(attr = name.as_str(), "ltv attribute has no value, skipping"),
                }
            } else {
                buckets.event_params.push(BucketedAttr {
                    name: name.clone(),
                    value: TypedValue::from_value(value),
                });
            }
        }
        buckets
    }
}

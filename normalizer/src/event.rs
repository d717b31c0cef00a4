//! Vendor event model, parsed with an explicit two-phase peel: the decoded
//! document is first kept as a generic JSON map, then every known field is
//! removed into a typed slot and whatever remains becomes the dynamic bag.

use serde_json::{Map, Value};

use crate::api::NormalizeError;

#[derive(Clone, Debug, Default)]
pub struct RawEvent {
    pub event: Option<String>,
    pub distinct_id: Option<String>,
    pub anonymous_id: Option<String>,
    pub time: Option<i64>,
    pub properties: Option<RawProperties>,
    /// The untouched `properties` sub-object, re-serialized into the
    /// `properties` custom parameter of the canonical event.
    pub properties_raw: Option<Value>,
    pub items: Vec<RawItem>,
    /// Unknown top-level fields, in document order.
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default)]
pub struct RawProperties {
    pub os: Option<String>,
    pub os_version: Option<String>,
    pub browser_language: Option<String>,
    pub screen_width: Option<i64>,
    pub screen_height: Option<i64>,
    pub product_name: Option<String>,
    pub product_classify: Option<String>,
    pub referrer: Option<String>,
    pub referrer_title: Option<String>,
    pub url: Option<String>,
    pub latest_referrer: Option<String>,
    pub province: Option<String>,
    pub city: Option<String>,
    pub is_first_time: bool,
    pub event_duration: Option<i64>,
    pub user_id: Option<String>,
    pub user_name: Option<String>,
    pub test_user: Option<String>,
    pub age: Option<i64>,
    /// Unknown property fields, merged into the user-property bag.
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default)]
pub struct RawItem {
    pub item_id: Option<String>,
    pub item_name: Option<String>,
    pub price: Option<f64>,
    pub extra: Map<String, Value>,
}

/// Remove `key` and coerce it to text. Vendors are not consistent about
/// id fields being strings, so numbers are tolerated and stringified.
fn take_string(map: &mut Map<String, Value>, key: &str) -> Option<String> {
    match map.remove(key) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    }
}

fn take_i64(map: &mut Map<String, Value>, key: &str) -> Option<i64> {
    map.remove(key).and_then(|v| v.as_i64())
}

fn take_f64(map: &mut Map<String, Value>, key: &str) -> Option<f64> {
    map.remove(key).and_then(|v| v.as_f64())
}

fn take_bool(map: &mut Map<String, Value>, key: &str) -> bool {
    map.remove(key)
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

impl RawEvent {
    pub fn from_document(doc: &Value) -> Result<RawEvent, NormalizeError> {
        let mut map = doc
            .as_object()
            .ok_or_else(|| {
                NormalizeError::MappingError(String::from("document is not a json object"))
            })?
            .clone();

        let event = take_string(&mut map, "event");
        let distinct_id = take_string(&mut map, "distinct_id");
        let anonymous_id = take_string(&mut map, "anonymous_id");
        let time = take_i64(&mut map, "time");

        let properties_raw = map.remove("properties");
        let properties = match &properties_raw {
            None | Some(Value::Null) => None,
            Some(value) => Some(RawProperties::from_value(value)?),
        };

        let items = match map.remove("items") {
            Some(Value::Array(entries)) => entries
                .iter()
                .filter_map(|entry| match RawItem::from_value(entry) {
                    Some(item) => Some(item),
                    None => {
                        tracing::debug!("item entry is not a json object, skipping");
                        None
                    }
                })
                .collect(),
            _ => Vec::new(),
        };

        Ok(RawEvent {
            event,
            distinct_id,
            anonymous_id,
            time,
            properties,
            properties_raw: properties_raw.filter(|v| !v.is_null()),
            items,
            extra: map,
        })
    }

    pub fn is_first_visit(&self) -> bool {
        self.properties
            .as_ref()
            .map(|p| p.is_first_time)
            .unwrap_or(false)
    }
}

impl RawProperties {
    fn from_value(value: &Value) -> Result<RawProperties, NormalizeError> {
        let mut map = value
            .as_object()
            .ok_or_else(|| {
                NormalizeError::MappingError(String::from("properties is not a json object"))
            })?
            .clone();

        Ok(RawProperties {
            os: take_string(&mut map, "$os"),
            os_version: take_string(&mut map, "$os_version"),
            browser_language: take_string(&mut map, "$browser_language"),
            screen_width: take_i64(&mut map, "$screen_width"),
            screen_height: take_i64(&mut map, "$screen_height"),
            product_name: take_string(&mut map, "product_name"),
            product_classify: take_string(&mut map, "product_classify"),
            referrer: take_string(&mut map, "$referrer"),
            referrer_title: take_string(&mut map, "$referrer_title"),
            url: take_string(&mut map, "$url"),
            latest_referrer: take_string(&mut map, "$latest_referrer"),
            province: take_string(&mut map, "$province"),
            city: take_string(&mut map, "$city"),
            is_first_time: take_bool(&mut map, "$is_first_time"),
            event_duration: take_i64(&mut map, "$event_duration"),
            user_id: take_string(&mut map, "user_id"),
            user_name: take_string(&mut map, "user_name"),
            test_user: take_string(&mut map, "x_test_user"),
            age: take_i64(&mut map, "age"),
            extra: map,
        })
    }
}

impl RawItem {
    fn from_value(value: &Value) -> Option<RawItem> {
        let mut map = value.as_object()?.clone();
        Some(RawItem {
            item_id: take_string(&mut map, "item_id"),
            item_name: take_string(&mut map, "item_name"),
            price: take_f64(&mut map, "price"),
            extra: map,
        })
    }
}

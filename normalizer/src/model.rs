//! The canonical event/user/item records every vendor payload normalizes
//! into. Field names follow the downstream storage schema; optional fields
//! are omitted from the serialized output instead of being emitted as null.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

use crate::props::{BucketedAttr, TypedValue, ValueType};

#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct CanonicalEvent {
    pub event_id: String,
    pub event_name: String,
    pub event_timestamp_msec: i64,
    pub ingest_time_msec: i64,
    pub platform: String,
    pub app_id: String,
    pub project_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_pseudo_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_start_time_msec: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_view_page_referrer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_view_page_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_view_page_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_view_latest_referrer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_engagement_time_msec: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_mobile_brand_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_mobile_model_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_operating_system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_operating_system_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_system_language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_screen_width: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_screen_height: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_ua: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub geo_country: Option<String>,
    /// Result of the optional geo enrichment collaborator, stored verbatim.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geo: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub traffic_source_source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traffic_source_medium: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traffic_source_campaign: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traffic_source_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traffic_source_term: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traffic_source_campaign_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traffic_source_clid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traffic_source_clid_platform: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traffic_source_channel_group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traffic_source_category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_install_source: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub privacy_info: Vec<BucketedAttr>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub user_ltv: Vec<BucketedAttr>,

    pub custom_parameters: HashMap<String, TypedValue>,
    pub process_info: ProcessInfo,
}

#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct ProcessInfo {
    pub rid: String,
    pub ingest_time: String,
    pub input_file_name: String,
}

#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct CanonicalUser {
    pub app_id: String,
    pub event_timestamp_msec: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_pseudo_id: Option<String>,
    pub first_touch_time_msec: i64,
    pub first_visit_date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_referrer: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_traffic_source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_traffic_medium: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_traffic_campaign: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_traffic_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_traffic_term: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_traffic_campaign_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_traffic_clid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_traffic_clid_platform: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_traffic_channel_group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_traffic_category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_app_install_source: Option<String>,

    pub user_properties: HashMap<String, UserPropValue>,
    pub event_name: String,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct UserPropValue {
    pub value: String,
    #[serde(rename = "type")]
    pub value_type: ValueType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set_timestamp: Option<i64>,
}

impl UserPropValue {
    pub fn string(value: impl Into<String>) -> UserPropValue {
        UserPropValue {
            value: value.into(),
            value_type: ValueType::String,
            set_timestamp: None,
        }
    }

    pub fn from_typed(value: TypedValue) -> UserPropValue {
        UserPropValue {
            value: value.value,
            value_type: value.value_type,
            set_timestamp: None,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct CanonicalItem {
    pub app_id: String,
    pub event_timestamp_msec: i64,
    pub event_id: String,
    pub event_name: String,
    pub platform: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_pseudo_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub item_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    /// Omitted entirely when the vendor item carries no unknown fields.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_parameters: Option<HashMap<String, TypedValue>>,
}

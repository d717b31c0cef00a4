use std::collections::HashMap;
use std::sync::Arc;

use metrics::counter;
use once_cell::sync::Lazy;
use serde_json::{json, Value};

use crate::api::{NormalizeError, NormalizedBundle};
use crate::config::Config;
use crate::enrich::{Enrichment, TrafficSourceAnnotator, PARAM_KEY_IP, PARAM_KEY_LOCALE};
use crate::envelope::{decode_payload, decode_uri};
use crate::event::{RawEvent, RawProperties};
use crate::model::{
    CanonicalEvent, CanonicalItem, CanonicalUser, ProcessInfo, UserPropValue,
};
use crate::props::{AttributeBuckets, BucketedAttr, TypedValue, ValueType};
use crate::timefmt;

pub const EVENT_PAGE_VIEW: &str = "_page_view";
pub const EVENT_PROFILE_SET: &str = "_profile_set";
pub const EVENT_USER_ENGAGEMENT: &str = "_user_engagement";
pub const EVENT_CLICK: &str = "_click";
pub const EVENT_FIRST_OPEN: &str = "_first_open";

const FIRST_OPEN_ID_SUFFIX: &str = "-first-open";

/// Vendor event names with a canonical equivalent; anything else passes
/// through unchanged. Read-only after initialization.
static EVENT_NAME_MAP: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("page_view", EVENT_PAGE_VIEW),
        ("login", EVENT_PROFILE_SET),
        ("user_engagement", EVENT_USER_ENGAGEMENT),
        ("click", EVENT_CLICK),
    ])
});

/// Per-record processing context supplied by the execution framework.
/// `request_id` and `record_index` together must be unique within a batch to
/// keep derived event ids unique.
#[derive(Clone, Debug, Default)]
pub struct RecordContext {
    pub request_id: String,
    pub app_id: String,
    pub project_id: String,
    pub ingest_timestamp_ms: i64,
    pub ip: String,
    pub user_agent: String,
    pub input_file_name: String,
    pub record_index: usize,
}

/// The normalization engine. Explicitly constructed from an immutable
/// config, so concurrent per-record use needs no shared mutable state.
pub struct Normalizer {
    config: Config,
    geo_enrichment: Option<Arc<dyn Enrichment + Send + Sync>>,
    traffic_source: Option<Arc<dyn TrafficSourceAnnotator + Send + Sync>>,
}

impl Normalizer {
    pub fn new(config: Config) -> Normalizer {
        Normalizer {
            config,
            geo_enrichment: None,
            traffic_source: None,
        }
    }

    pub fn with_geo_enrichment(mut self, enrichment: Arc<dyn Enrichment + Send + Sync>) -> Self {
        self.geo_enrichment = Some(enrichment);
        self
    }

    pub fn with_traffic_source_annotator(
        mut self,
        annotator: Arc<dyn TrafficSourceAnnotator + Send + Sync>,
    ) -> Self {
        self.traffic_source = Some(annotator);
        self
    }

    /// Normalize one raw payload into a result bundle.
    ///
    /// Skippable input (blank payload, missing envelope data, malformed
    /// JSON, empty event name) yields an empty bundle. Mapping failures
    /// propagate so the caller can decide between dropping the record and
    /// failing the batch.
    pub fn normalize(
        &self,
        raw: &str,
        ctx: &RecordContext,
    ) -> Result<NormalizedBundle, NormalizeError> {
        match self.normalize_inner(raw, ctx) {
            Ok(bundle) => Ok(bundle),
            Err(err) if err.is_skippable() => {
                tracing::warn!(rid = ctx.request_id.as_str(), "skipping record: {}", err);
                counter!("normalizer_records_skipped_total", "cause" => skip_cause(&err))
                    .increment(1);
                Ok(NormalizedBundle::empty())
            }
            Err(err) => Err(err),
        }
    }

    fn normalize_inner(
        &self,
        raw: &str,
        ctx: &RecordContext,
    ) -> Result<NormalizedBundle, NormalizeError> {
        let doc = match decode_payload(raw)? {
            Value::Array(mut entries) => {
                if entries.is_empty() {
                    return Err(NormalizeError::EmptyPayload);
                }
                if entries.len() > 1 {
                    tracing::warn!(
                        rid = ctx.request_id.as_str(),
                        extra = entries.len() - 1,
                        "document list holds more than one event, keeping the first"
                    );
                }
                entries.swap_remove(0)
            }
            other => other,
        };

        let raw_event = RawEvent::from_document(&doc)?;
        if raw_event.event.as_deref().unwrap_or("").is_empty() {
            return Err(NormalizeError::MissingEventName);
        }

        let event = self.map_event(&raw_event, ctx)?;
        let events = expand(event, raw_event.is_first_visit());
        let user = map_user(&raw_event, &events[0]);
        let items = map_items(&raw_event, &events[0]);

        counter!("normalizer_events_emitted_total").increment(events.len() as u64);

        Ok(NormalizedBundle {
            events,
            user: Some(user),
            items,
        })
    }

    /// Map one decoded vendor event into the canonical event record.
    pub fn map_event(
        &self,
        raw: &RawEvent,
        ctx: &RecordContext,
    ) -> Result<CanonicalEvent, NormalizeError> {
        let props = raw.properties.as_ref().ok_or(NormalizeError::MissingProperties)?;

        let distinct_id = raw.distinct_id.clone().unwrap_or_default();
        let event_id = format!(
            "{}-{}-{}-x",
            ctx.request_id, ctx.record_index, distinct_id
        );

        let vendor_name = raw.event.clone().unwrap_or_default();
        let event_name = EVENT_NAME_MAP
            .get(vendor_name.as_str())
            .map(|name| (*name).to_string())
            .unwrap_or(vendor_name);

        let platform = match props.os.as_deref() {
            Some(os) if os.contains("Web") => "Web",
            Some(_) => "Mobile",
            None => "Web",
        };

        let buckets = AttributeBuckets::partition(&raw.extra);

        let mut custom_parameters: HashMap<String, TypedValue> = buckets
            .event_params
            .iter()
            .map(|attr| (attr.name.clone(), attr.value.clone()))
            .collect();

        custom_parameters.insert(
            String::from("distinct_id"),
            TypedValue::string(distinct_id.clone()),
        );
        custom_parameters.insert(
            String::from("screen_resolution"),
            TypedValue::string(format!(
                "{}x{}",
                props.screen_width.unwrap_or(0),
                props.screen_height.unwrap_or(0)
            )),
        );
        if let (Some(province), Some(city)) = (&props.province, &props.city) {
            // Serialized with the wrapper object included, matching the
            // downstream consumers of this parameter.
            let location = json!({"event_location": {"province": province, "city": city}});
            custom_parameters.insert(
                String::from("event_location"),
                TypedValue {
                    value: location.to_string(),
                    value_type: ValueType::Object,
                },
            );
        }
        if let Some(properties_raw) = &raw.properties_raw {
            custom_parameters.insert(
                String::from("properties"),
                TypedValue {
                    value: properties_raw.to_string(),
                    value_type: ValueType::Object,
                },
            );
        }

        let geo = match &self.geo_enrichment {
            Some(enrichment) => {
                let mut params = HashMap::new();
                params.insert(String::from(PARAM_KEY_IP), ctx.ip.clone());
                if let Some(language) = &props.browser_language {
                    params.insert(String::from(PARAM_KEY_LOCALE), language.clone());
                }
                Some(enrichment.enrich(&params)?)
            }
            None => None,
        };

        let mut event = CanonicalEvent {
            event_id,
            event_name,
            event_timestamp_msec: ctx.ingest_timestamp_ms,
            ingest_time_msec: ctx.ingest_timestamp_ms,
            platform: platform.to_string(),
            app_id: ctx.app_id.clone(),
            project_id: ctx.project_id.clone(),

            user_id: raw.anonymous_id.clone(),
            user_pseudo_id: raw.distinct_id.clone(),
            session_start_time_msec: raw.time,

            page_view_page_referrer: props.referrer.as_deref().map(decode_uri),
            page_view_page_title: props.referrer_title.as_deref().map(decode_uri),
            page_view_page_url: props.url.as_deref().map(decode_uri),
            page_view_latest_referrer: props.latest_referrer.as_deref().map(decode_uri),
            user_engagement_time_msec: props.event_duration,

            device_mobile_brand_name: props.product_name.clone(),
            device_mobile_model_name: props.product_classify.clone(),
            device_operating_system: props.os.clone(),
            device_operating_system_version: props.os_version.clone(),
            device_system_language: props.browser_language.clone(),
            device_screen_width: props.screen_width,
            device_screen_height: props.screen_height,
            device_ua: Some(ctx.user_agent.clone()),
            ip: Some(ctx.ip.clone()),

            // The vendor has no country field; the city value is what the
            // downstream schema stores here today.
            geo_country: props.city.clone(),
            geo,

            privacy_info: buckets.privacy_info,
            user_ltv: buckets.user_ltv,

            custom_parameters,
            process_info: ProcessInfo {
                rid: ctx.request_id.clone(),
                ingest_time: timefmt::to_iso8601(ctx.ingest_timestamp_ms),
                input_file_name: ctx.input_file_name.clone(),
            },
            ..CanonicalEvent::default()
        };

        apply_traffic_source(&mut event, &buckets.traffic_source);

        if self.config.disable_traffic_source_enrichment {
            tracing::debug!("traffic source enrichment is disabled");
        } else if let Some(annotator) = &self.traffic_source {
            annotator.annotate(&mut event)?;
        }

        Ok(event)
    }
}

/// Route vendor-supplied traffic-source attributes (already stripped of
/// their prefix) onto the scalar traffic fields of the event.
fn apply_traffic_source(event: &mut CanonicalEvent, attrs: &[BucketedAttr]) {
    for attr in attrs {
        let value = Some(attr.value.value.clone());
        match attr.name.as_str() {
            "source" => event.traffic_source_source = value,
            "medium" => event.traffic_source_medium = value,
            "campaign" => event.traffic_source_campaign = value,
            "content" => event.traffic_source_content = value,
            "term" => event.traffic_source_term = value,
            "campaign_id" => event.traffic_source_campaign_id = value,
            "clid" => event.traffic_source_clid = value,
            "clid_platform" => event.traffic_source_clid_platform = value,
            "channel_group" => event.traffic_source_channel_group = value,
            "category" => event.traffic_source_category = value,
            other => tracing::debug!(attr = other, "unknown traffic source attribute"),
        }
    }
}

/// Metric label for a skipped record.
fn skip_cause(err: &NormalizeError) -> &'static str {
    match err {
        NormalizeError::MissingEventName => "missing_event_name",
        NormalizeError::EmptyPayload => "empty_payload",
        NormalizeError::MissingEnvelopeData
        | NormalizeError::EnvelopeDecodingError(_)
        | NormalizeError::DocumentParsingError(_) => "undecodable",
        NormalizeError::MissingProperties | NormalizeError::MappingError(_) => "mapping",
    }
}

/// Fan out one mapped event into the list of events to emit. A first-visit
/// flag synthesizes an additional `_first_open` copy; only the name and id
/// differ from the original.
pub fn expand(event: CanonicalEvent, is_first_visit: bool) -> Vec<CanonicalEvent> {
    if !is_first_visit {
        return vec![event];
    }

    let mut first_open = event.clone();
    first_open.event_name = String::from(EVENT_FIRST_OPEN);
    first_open.event_id = format!("{}{}", event.event_id, FIRST_OPEN_ID_SUFFIX);
    counter!("normalizer_events_fanned_out_total").increment(1);
    vec![event, first_open]
}

/// Derive the canonical user from the source event plus the event that was
/// just built from it.
pub fn map_user(raw: &RawEvent, event: &CanonicalEvent) -> CanonicalUser {
    let empty = RawProperties::default();
    let props = raw.properties.as_ref().unwrap_or(&empty);

    let first_touch_time_msec = raw.time.unwrap_or(event.event_timestamp_msec);

    // Attribution fallback order is fixed: page referrer wins over the
    // latest referrer.
    let first_referrer = event
        .page_view_page_referrer
        .clone()
        .or_else(|| event.page_view_latest_referrer.clone());

    let mut user_properties: HashMap<String, UserPropValue> = HashMap::new();
    user_properties.insert(
        String::from("user_id"),
        UserPropValue::string(props.user_id.clone().unwrap_or_default()),
    );
    user_properties.insert(
        String::from("username"),
        UserPropValue::string(props.user_name.clone().unwrap_or_default()),
    );
    // firstName and lastName both read the vendor test-user field today;
    // upstream intent is unverifiable, so the duplication is kept as-is.
    user_properties.insert(
        String::from("firstName"),
        UserPropValue::string(props.test_user.clone().unwrap_or_default()),
    );
    user_properties.insert(
        String::from("lastName"),
        UserPropValue::string(props.test_user.clone().unwrap_or_default()),
    );
    user_properties.insert(
        String::from("age"),
        UserPropValue {
            value: props.age.unwrap_or(0).to_string(),
            value_type: ValueType::Number,
            set_timestamp: None,
        },
    );

    // Dynamic vendor properties are merged on top without overwrite
    // protection: on key collision the dynamic entry wins.
    user_properties.extend(props.extra.iter().map(|(name, value)| {
        (
            name.clone(),
            UserPropValue::from_typed(TypedValue::from_value(value)),
        )
    }));

    CanonicalUser {
        app_id: event.app_id.clone(),
        event_timestamp_msec: event.event_timestamp_msec,
        user_pseudo_id: event.user_pseudo_id.clone(),
        first_touch_time_msec,
        first_visit_date: timefmt::to_date(first_touch_time_msec),
        first_referrer,

        first_traffic_source: event.traffic_source_source.clone(),
        first_traffic_medium: event.traffic_source_medium.clone(),
        first_traffic_campaign: event.traffic_source_campaign.clone(),
        first_traffic_content: event.traffic_source_content.clone(),
        first_traffic_term: event.traffic_source_term.clone(),
        first_traffic_campaign_id: event.traffic_source_campaign_id.clone(),
        first_traffic_clid: event.traffic_source_clid.clone(),
        first_traffic_clid_platform: event.traffic_source_clid_platform.clone(),
        first_traffic_channel_group: event.traffic_source_channel_group.clone(),
        first_traffic_category: event.traffic_source_category.clone(),
        first_app_install_source: event.app_install_source.clone(),

        user_properties,
        event_name: event.event_name.clone(),
    }
}

/// Extract the line items of the vendor payload, stamping each with the
/// parent event's keys. Items without an id are dropped silently.
pub fn map_items(raw: &RawEvent, event: &CanonicalEvent) -> Vec<CanonicalItem> {
    raw.items
        .iter()
        .filter_map(|item| {
            let item_id = match item.item_id.as_deref() {
                None | Some("") => return None,
                Some(id) => id.to_string(),
            };
            let custom_parameters = if item.extra.is_empty() {
                None
            } else {
                Some(
                    item.extra
                        .iter()
                        .map(|(name, value)| (name.clone(), TypedValue::from_value(value)))
                        .collect(),
                )
            };
            Some(CanonicalItem {
                app_id: event.app_id.clone(),
                event_timestamp_msec: event.event_timestamp_msec,
                event_id: event.event_id.clone(),
                event_name: event.event_name.clone(),
                platform: event.platform.clone(),
                user_pseudo_id: event.user_pseudo_id.clone(),
                user_id: event.user_id.clone(),
                item_id,
                name: item.item_name.clone(),
                price: item.price,
                custom_parameters,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context() -> RecordContext {
        RecordContext {
            request_id: String::from("r1"),
            app_id: String::from("app1"),
            project_id: String::from("proj1"),
            ingest_timestamp_ms: 1_682_000_000_000,
            ip: String::from("203.0.113.7"),
            user_agent: String::from("Mozilla/5.0"),
            input_file_name: String::from("input.json"),
            record_index: 0,
        }
    }

    fn raw_event(doc: Value) -> RawEvent {
        RawEvent::from_document(&doc).unwrap()
    }

    #[test]
    fn map_event_derives_id_name_and_platform() {
        let raw = raw_event(json!({
            "event": "page_view",
            "distinct_id": "u1",
            "anonymous_id": "a1",
            "time": 1000,
            "properties": {"$os": "Web", "$url": "http%3A%2F%2Fx"}
        }));
        let normalizer = Normalizer::new(Config::default());
        let event = normalizer.map_event(&raw, &context()).unwrap();

        assert_eq!(event.event_id, "r1-0-u1-x");
        assert_eq!(event.event_name, EVENT_PAGE_VIEW);
        assert_eq!(event.platform, "Web");
        assert_eq!(event.page_view_page_url.as_deref(), Some("http://x"));
        assert_eq!(event.user_id.as_deref(), Some("a1"));
        assert_eq!(event.user_pseudo_id.as_deref(), Some("u1"));
        assert_eq!(event.session_start_time_msec, Some(1000));
        assert_eq!(event.process_info.rid, "r1");
        assert_eq!(event.process_info.input_file_name, "input.json");
    }

    #[test]
    fn unmapped_event_names_pass_through() {
        let raw = raw_event(json!({
            "event": "add_to_cart",
            "distinct_id": "u1",
            "properties": {"$os": "iOS"}
        }));
        let normalizer = Normalizer::new(Config::default());
        let event = normalizer.map_event(&raw, &context()).unwrap();
        assert_eq!(event.event_name, "add_to_cart");
        assert_eq!(event.platform, "Mobile");
    }

    #[test]
    fn platform_defaults_to_web_without_os() {
        let raw = raw_event(json!({
            "event": "e",
            "distinct_id": "u1",
            "properties": {}
        }));
        let normalizer = Normalizer::new(Config::default());
        let event = normalizer.map_event(&raw, &context()).unwrap();
        assert_eq!(event.platform, "Web");
    }

    #[test]
    fn custom_parameters_carry_synthetic_entries() {
        let raw = raw_event(json!({
            "event": "e",
            "distinct_id": "u1",
            "page_number": 3,
            "properties": {
                "$screen_width": 1920,
                "$screen_height": 1080,
                "$province": "Zhejiang",
                "$city": "Hangzhou"
            }
        }));
        let normalizer = Normalizer::new(Config::default());
        let event = normalizer.map_event(&raw, &context()).unwrap();

        assert_eq!(event.custom_parameters["distinct_id"].value, "u1");
        assert_eq!(
            event.custom_parameters["screen_resolution"].value,
            "1920x1080"
        );
        assert_eq!(event.custom_parameters["page_number"].value, "3");
        assert_eq!(
            event.custom_parameters["page_number"].value_type,
            ValueType::Number
        );

        let location: Value =
            serde_json::from_str(&event.custom_parameters["event_location"].value).unwrap();
        assert_eq!(
            location,
            json!({"event_location": {"province": "Zhejiang", "city": "Hangzhou"}})
        );

        let properties: Value =
            serde_json::from_str(&event.custom_parameters["properties"].value).unwrap();
        assert_eq!(properties["$screen_width"], 1920);

        assert_eq!(event.geo_country.as_deref(), Some("Hangzhou"));
    }

    #[test]
    fn event_location_needs_both_province_and_city() {
        let raw = raw_event(json!({
            "event": "e",
            "distinct_id": "u1",
            "properties": {"$city": "Hangzhou"}
        }));
        let normalizer = Normalizer::new(Config::default());
        let event = normalizer.map_event(&raw, &context()).unwrap();
        assert!(!event.custom_parameters.contains_key("event_location"));
    }

    #[test]
    fn prefixed_attributes_land_in_their_buckets() {
        let raw = raw_event(json!({
            "event": "e",
            "distinct_id": "u1",
            "_traffic_source_source": "google",
            "_traffic_source_medium": "cpc",
            "_privacy_info_ads_storage": "denied",
            "_user_ltv_revenue": {"value": 9.5},
            "plain_param": "kept",
            "properties": {}
        }));
        let normalizer = Normalizer::new(Config::default());
        let event = normalizer.map_event(&raw, &context()).unwrap();

        assert_eq!(event.traffic_source_source.as_deref(), Some("google"));
        assert_eq!(event.traffic_source_medium.as_deref(), Some("cpc"));
        assert_eq!(event.privacy_info.len(), 1);
        assert_eq!(event.privacy_info[0].name, "ads_storage");
        assert_eq!(event.user_ltv.len(), 1);
        assert_eq!(event.user_ltv[0].value.value, "9.5");
        assert!(event.custom_parameters.contains_key("plain_param"));
        assert!(!event.custom_parameters.contains_key("_traffic_source_source"));
    }

    #[test]
    fn missing_properties_is_a_mapping_error() {
        let raw = raw_event(json!({"event": "e", "distinct_id": "u1"}));
        let normalizer = Normalizer::new(Config::default());
        let err = normalizer.map_event(&raw, &context()).unwrap_err();
        assert!(matches!(err, NormalizeError::MissingProperties));
        assert!(!err.is_skippable());
    }

    #[test]
    fn expand_synthesizes_first_open() {
        let raw = raw_event(json!({
            "event": "page_view",
            "distinct_id": "u1",
            "properties": {"$is_first_time": true}
        }));
        let normalizer = Normalizer::new(Config::default());
        let event = normalizer.map_event(&raw, &context()).unwrap();
        let events = expand(event, raw.is_first_visit());

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_name, EVENT_PAGE_VIEW);
        assert_eq!(events[0].event_id, "r1-0-u1-x");
        assert_eq!(events[1].event_name, EVENT_FIRST_OPEN);
        assert_eq!(events[1].event_id, "r1-0-u1-x-first-open");

        // only the name and id differ
        let mut patched = events[1].clone();
        patched.event_name = events[0].event_name.clone();
        patched.event_id = events[0].event_id.clone();
        assert_eq!(patched, events[0]);
    }

    #[test]
    fn expand_without_flag_returns_one_event() {
        let raw = raw_event(json!({
            "event": "page_view",
            "distinct_id": "u1",
            "properties": {}
        }));
        let normalizer = Normalizer::new(Config::default());
        let event = normalizer.map_event(&raw, &context()).unwrap();
        let events = expand(event, raw.is_first_visit());
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn user_referrer_fallback_order() {
        let normalizer = Normalizer::new(Config::default());

        let raw = raw_event(json!({
            "event": "e",
            "distinct_id": "u1",
            "properties": {"$referrer": "http%3A%2F%2Fa", "$latest_referrer": "http%3A%2F%2Fb"}
        }));
        let event = normalizer.map_event(&raw, &context()).unwrap();
        let user = map_user(&raw, &event);
        assert_eq!(user.first_referrer.as_deref(), Some("http://a"));

        let raw = raw_event(json!({
            "event": "e",
            "distinct_id": "u1",
            "properties": {"$latest_referrer": "http%3A%2F%2Fb"}
        }));
        let event = normalizer.map_event(&raw, &context()).unwrap();
        let user = map_user(&raw, &event);
        assert_eq!(user.first_referrer.as_deref(), Some("http://b"));
    }

    #[test]
    fn user_first_touch_falls_back_to_event_time() {
        let normalizer = Normalizer::new(Config::default());
        let raw = raw_event(json!({
            "event": "e",
            "distinct_id": "u1",
            "properties": {}
        }));
        let event = normalizer.map_event(&raw, &context()).unwrap();
        let user = map_user(&raw, &event);
        assert_eq!(user.first_touch_time_msec, event.event_timestamp_msec);
        assert!(!user.first_visit_date.is_empty());
        assert_eq!(user.event_name, "e");
    }

    #[test]
    fn dynamic_user_properties_win_on_collision() {
        let normalizer = Normalizer::new(Config::default());
        let raw = raw_event(json!({
            "event": "e",
            "distinct_id": "u1",
            "properties": {
                "user_id": "known-id",
                "age": 30,
                "membership": "gold",
                "username": "from-dynamic"
            }
        }));
        let event = normalizer.map_event(&raw, &context()).unwrap();
        let user = map_user(&raw, &event);

        assert_eq!(user.user_properties["user_id"].value, "known-id");
        assert_eq!(user.user_properties["age"].value, "30");
        assert_eq!(user.user_properties["age"].value_type, ValueType::Number);
        assert_eq!(user.user_properties["membership"].value, "gold");
        // `username` is not a peeled key, so the dynamic entry overwrote the
        // known (empty) one.
        assert_eq!(user.user_properties["username"].value, "from-dynamic");
    }

    #[test]
    fn items_without_id_are_dropped() {
        let normalizer = Normalizer::new(Config::default());
        let raw = raw_event(json!({
            "event": "purchase",
            "distinct_id": "u1",
            "properties": {},
            "items": [
                {"item_id": "", "item_name": "no id"},
                {"item_id": "i2", "item_name": "kept", "price": 10.0, "color": "red"},
                {"item_name": "also no id"}
            ]
        }));
        let event = normalizer.map_event(&raw, &context()).unwrap();
        let items = map_items(&raw, &event);

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].item_id, "i2");
        assert_eq!(items[0].event_id, event.event_id);
        assert_eq!(items[0].price, Some(10.0));
        let params = items[0].custom_parameters.as_ref().unwrap();
        assert_eq!(params["color"].value, "red");
    }

    #[test]
    fn items_without_extra_fields_omit_the_bag() {
        let normalizer = Normalizer::new(Config::default());
        let raw = raw_event(json!({
            "event": "purchase",
            "distinct_id": "u1",
            "properties": {},
            "items": [{"item_id": "i1", "item_name": "plain", "price": 1.0}]
        }));
        let event = normalizer.map_event(&raw, &context()).unwrap();
        let items = map_items(&raw, &event);
        assert!(items[0].custom_parameters.is_none());
    }

    #[test]
    fn normalize_skips_blank_and_nameless_input() {
        let normalizer = Normalizer::new(Config::default());

        let bundle = normalizer.normalize("   ", &context()).unwrap();
        assert!(bundle.is_empty());

        let bundle = normalizer.normalize("crc=1&gzip=1", &context()).unwrap();
        assert!(bundle.is_empty());

        let bundle = normalizer
            .normalize(r#"{"distinct_id":"u1","properties":{}}"#, &context())
            .unwrap();
        assert!(bundle.is_empty());
    }

    #[test]
    fn array_document_keeps_only_the_first_event() {
        let normalizer = Normalizer::new(Config::default());
        let raw = json!([
            {"event": "page_view", "distinct_id": "u1", "properties": {"$os": "Web"}},
            {"event": "click", "distinct_id": "u2", "properties": {}}
        ]);
        let bundle = normalizer.normalize(&raw.to_string(), &context()).unwrap();

        assert_eq!(bundle.events.len(), 1);
        assert_eq!(bundle.events[0].event_name, EVENT_PAGE_VIEW);
        assert_eq!(bundle.events[0].user_pseudo_id.as_deref(), Some("u1"));
        assert_eq!(
            bundle.user.as_ref().unwrap().user_pseudo_id.as_deref(),
            Some("u1")
        );
    }

    #[test]
    fn empty_document_list_yields_empty_bundle() {
        let normalizer = Normalizer::new(Config::default());
        let bundle = normalizer.normalize("[]", &context()).unwrap();
        assert!(bundle.is_empty());
    }

    #[test]
    fn normalize_propagates_mapping_errors() {
        let normalizer = Normalizer::new(Config::default());
        let err = normalizer
            .normalize(r#"{"event":"e","distinct_id":"u1"}"#, &context())
            .unwrap_err();
        assert!(!err.is_skippable());
    }

    #[test]
    fn normalize_builds_a_full_bundle() {
        let normalizer = Normalizer::new(Config::default());
        let raw = json!({
            "event": "page_view",
            "distinct_id": "u1",
            "time": 1000,
            "properties": {"$os": "Web", "$url": "http://x", "$is_first_time": true},
            "items": [{"item_id": "i1"}]
        });
        let bundle = normalizer.normalize(&raw.to_string(), &context()).unwrap();

        assert_eq!(bundle.events.len(), 2);
        assert_eq!(bundle.items.len(), 1);
        let user = bundle.user.unwrap();
        assert_eq!(user.first_touch_time_msec, 1000);
        assert_eq!(user.user_pseudo_id.as_deref(), Some("u1"));
    }
}

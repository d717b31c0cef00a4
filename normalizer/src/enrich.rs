//! Contracts for the external enrichment collaborators. Lookups are
//! synchronous, blocking and idempotent; retry and timeout policy belongs
//! to the implementation or the caller, never to the normalizer.

use std::collections::HashMap;

use serde_json::Value;

use crate::api::NormalizeError;
use crate::model::CanonicalEvent;

pub const PARAM_KEY_IP: &str = "ip";
pub const PARAM_KEY_LOCALE: &str = "locale";

/// A key/value lookup returning a JSON object to merge into the output.
/// Implementations must be pure given the same parameters.
pub trait Enrichment {
    fn enrich(&self, params: &HashMap<String, String>) -> Result<Value, NormalizeError>;
}

/// Annotates the traffic-source fields of a freshly mapped event. Gated by
/// `Config::disable_traffic_source_enrichment`.
pub trait TrafficSourceAnnotator {
    fn annotate(&self, event: &mut CanonicalEvent) -> Result<(), NormalizeError>;
}

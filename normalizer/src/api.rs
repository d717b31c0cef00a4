use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::model::{CanonicalEvent, CanonicalItem, CanonicalUser};

#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("raw payload is empty")]
    EmptyPayload,
    #[error("no data= or data_list= field found in envelope")]
    MissingEnvelopeData,
    #[error("failed to decode envelope: {0}")]
    EnvelopeDecodingError(String),
    #[error("failed to parse document: {0}")]
    DocumentParsingError(#[from] serde_json::Error),

    #[error("event submitted with an empty event name")]
    MissingEventName,
    #[error("event has no properties object")]
    MissingProperties,
    #[error("failed to derive canonical fields: {0}")]
    MappingError(String),
}

impl NormalizeError {
    /// Skippable errors yield an empty bundle for the record and never abort
    /// the batch or stream. Mapping failures propagate: the caller decides
    /// whether to drop the record or fail.
    pub fn is_skippable(&self) -> bool {
        match self {
            NormalizeError::EmptyPayload
            | NormalizeError::MissingEnvelopeData
            | NormalizeError::EnvelopeDecodingError(_)
            | NormalizeError::DocumentParsingError(_)
            | NormalizeError::MissingEventName => true,

            NormalizeError::MissingProperties | NormalizeError::MappingError(_) => false,
        }
    }
}

/// The full output of normalizing one input record. An empty bundle is the
/// defined no-op result for blank or undecodable input, not an error.
#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct NormalizedBundle {
    pub events: Vec<CanonicalEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<CanonicalUser>,
    pub items: Vec<CanonicalItem>,
}

impl NormalizedBundle {
    pub fn empty() -> NormalizedBundle {
        NormalizedBundle::default()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.user.is_none() && self.items.is_empty()
    }
}

/// Best-effort record for streaming callers that report mapping failures on
/// the output stream instead of dropping them: the error message plus the
/// original raw data, so the failure stays visible downstream.
pub fn error_record(raw: &str, err: &NormalizeError) -> Value {
    json!({
        "error": err.to_string(),
        "data": raw,
    })
}

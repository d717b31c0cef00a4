use std::io::prelude::*;

use base64::Engine;
use flate2::read::GzDecoder;
use percent_encoding::percent_decode_str;
use serde_json::Value;

use crate::api::NormalizeError;

const DATA_LIST_KEY: &str = "data_list=";
const DATA_KEY: &str = "data=";

/// Decode one raw payload into a parsed JSON document.
///
/// Input that already looks like JSON text is parsed as-is. Anything else is
/// treated as a query-string envelope carrying base64 data (possibly
/// gzipped) under `data_list=` or `data=`.
pub fn decode_payload(raw: &str) -> Result<Value, NormalizeError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(NormalizeError::EmptyPayload);
    }

    if trimmed.starts_with('[') || trimmed.starts_with('{') {
        return serde_json::from_str(trimmed).map_err(|e| {
            tracing::error!(data = trimmed, "failed to parse literal json payload: {}", e);
            NormalizeError::from(e)
        });
    }

    let b64 = extract_envelope_data(trimmed)?;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(b64.as_bytes())
        .map_err(|e| {
            tracing::error!("failed to decode base64 envelope data: {}", e);
            NormalizeError::EnvelopeDecodingError(String::from("invalid base64 data"))
        })?;

    let text = inflate_if_needed(&bytes)?;
    serde_json::from_str(&text).map_err(|e| {
        tracing::error!(data = text.as_str(), "failed to parse envelope payload: {}", e);
        NormalizeError::from(e)
    })
}

/// Percent-decode a URL-ish vendor string (page url, referrer, title).
/// Values that fail to decode are passed through unchanged.
pub fn decode_uri(value: &str) -> String {
    match percent_decode_str(value).decode_utf8() {
        Ok(decoded) => decoded.into_owned(),
        Err(e) => {
            tracing::debug!(value, "failed to percent-decode value, keeping as-is: {}", e);
            value.to_string()
        }
    }
}

/// Scan the `&`-separated envelope fields in order and return the
/// percent-decoded value of the first `data_list=`/`data=` field.
fn extract_envelope_data(raw: &str) -> Result<String, NormalizeError> {
    for field in raw.split('&') {
        let value = if let Some(rest) = field.strip_prefix(DATA_LIST_KEY) {
            rest
        } else if let Some(rest) = field.strip_prefix(DATA_KEY) {
            rest
        } else {
            continue;
        };
        return percent_decode_str(value)
            .decode_utf8()
            .map(|decoded| decoded.into_owned())
            .map_err(|e| {
                tracing::error!("failed to percent-decode envelope data: {}", e);
                NormalizeError::EnvelopeDecodingError(String::from("invalid percent-encoding"))
            });
    }
    tracing::warn!(
        "no {} or {} field found in the input data",
        DATA_LIST_KEY,
        DATA_KEY
    );
    Err(NormalizeError::MissingEnvelopeData)
}

/// Bytes bracketed by a matching `[...]`/`{...}` pair are literal UTF-8 JSON
/// text; everything else is assumed to be a gzip stream.
fn inflate_if_needed(bytes: &[u8]) -> Result<String, NormalizeError> {
    let looks_like_json = matches!(
        (bytes.first(), bytes.last()),
        (Some(b'['), Some(b']')) | (Some(b'{'), Some(b'}'))
    );

    if looks_like_json {
        return String::from_utf8(bytes.to_vec()).map_err(|e| {
            tracing::error!("failed to decode envelope body: {}", e);
            NormalizeError::EnvelopeDecodingError(String::from("invalid utf-8 data"))
        });
    }

    let mut d = GzDecoder::new(bytes);
    let mut s = String::new();
    d.read_to_string(&mut s).map_err(|e| {
        tracing::error!("failed to decode gzip: {}", e);
        NormalizeError::EnvelopeDecodingError(String::from("invalid gzip data"))
    })?;
    Ok(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use serde_json::json;

    fn gzip(data: &str) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data.as_bytes()).unwrap();
        encoder.finish().unwrap()
    }

    fn b64(bytes: &[u8]) -> String {
        base64::engine::general_purpose::STANDARD.encode(bytes)
    }

    #[test]
    fn literal_json_is_parsed_directly() {
        let doc = decode_payload(r#"  {"event":"page_view"} "#).unwrap();
        assert_eq!(doc, json!({"event": "page_view"}));

        let doc = decode_payload(r#"[{"event":"a"}]"#).unwrap();
        assert!(doc.is_array());
    }

    #[test]
    fn gzip_envelope_round_trips() {
        let source = json!({"event": "click", "time": 1000});
        let raw = format!("crc=123&data={}", b64(&gzip(&source.to_string())));
        assert_eq!(decode_payload(&raw).unwrap(), source);

        let raw = format!("data_list={}", b64(&gzip(&source.to_string())));
        assert_eq!(decode_payload(&raw).unwrap(), source);
    }

    #[test]
    fn uncompressed_base64_is_sniffed_by_brackets() {
        let source = json!({"event": "click"});
        let raw = format!("data={}", b64(source.to_string().as_bytes()));
        assert_eq!(decode_payload(&raw).unwrap(), source);
    }

    #[test]
    fn percent_encoded_value_is_decoded_first() {
        let source = json!({"event": "click"});
        let encoded = b64(&gzip(&source.to_string()))
            .replace('+', "%2B")
            .replace('=', "%3D")
            .replace('/', "%2F");
        let raw = format!("data={encoded}");
        assert_eq!(decode_payload(&raw).unwrap(), source);
    }

    #[test]
    fn missing_data_key_is_skippable() {
        let err = decode_payload("gzip=1&crc=123").unwrap_err();
        assert!(matches!(err, NormalizeError::MissingEnvelopeData));
        assert!(err.is_skippable());
    }

    #[test]
    fn empty_payload_is_skippable() {
        let err = decode_payload("   ").unwrap_err();
        assert!(matches!(err, NormalizeError::EmptyPayload));
        assert!(err.is_skippable());
    }

    #[test]
    fn invalid_base64_is_skippable() {
        let err = decode_payload("data=!!!not-base64!!!").unwrap_err();
        assert!(matches!(err, NormalizeError::EnvelopeDecodingError(_)));
        assert!(err.is_skippable());
    }

    #[test]
    fn malformed_json_is_skippable() {
        let raw = format!(
            "data={}",
            base64::engine::general_purpose::STANDARD.encode(gzip("not json at all"))
        );
        let err = decode_payload(&raw).unwrap_err();
        assert!(matches!(err, NormalizeError::DocumentParsingError(_)));
        assert!(err.is_skippable());
    }
}

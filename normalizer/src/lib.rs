//! Normalizes heterogeneous vendor analytics payloads into the canonical
//! event/user/item model. The execution framework that feeds records in and
//! the sinks that persist the output live elsewhere; this crate is the pure
//! per-record transformation.

pub mod api;
pub mod config;
pub mod enrich;
pub mod envelope;
pub mod event;
pub mod model;
pub mod normalize;
pub mod props;
pub mod timefmt;

pub use api::{NormalizeError, NormalizedBundle};
pub use config::Config;
pub use normalize::{Normalizer, RecordContext};

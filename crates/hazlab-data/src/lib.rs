//! # hazlab-data
//!
//! Lazy, batched access to seismic hazard curves held in a remote hazard store.
//!
//! A hazard model is identified by a hazard id. Its curves are addressed by
//! string keys of the form `"{imt}:{location}:{selector}"`, where the selector
//! is either a zero-padded realization index (`00003`) or an aggregate label
//! (`mean`, `0.9`).
//!
//! ## Overview
//!
//! - [`LazyData`] is a read-only map from key to [`CurveValue`]. A lookup that
//!   misses fetches every curve for the same location and selector kind in one
//!   store query, so neighbouring lookups are served from memory.
//! - [`HazardData`] is the per-model facade: memoized metadata and logic trees
//!   plus the lazy curve cache.
//! - [`Archive`] stores aggregate curves for a set of locations as a local JSON
//!   file and answers queries from it.
//! - [`HttpHazardStore`] talks to a hazard store service over HTTP.
//!
//! ## Example
//!
//! ```no_run
//! use hazlab_data::{HazardData, HttpHazardStore, Selector};
//! use std::sync::Arc;
//!
//! let store = Arc::new(HttpHazardStore::new("https://hazard.example.org/api")?);
//! let model = HazardData::new("NSHM_v1.0.4", store);
//!
//! println!("vs30 = {}", model.vs30()?);
//! let curve = model.values("-41.300~174.780", "PGA", Selector::aggregate("mean"))?;
//! println!("{} levels", curve.len());
//! # Ok::<(), hazlab_data::HazardError>(())
//! ```

mod archive;
mod curve;
mod error;
mod hazard;
pub mod key;
pub mod lazy;
mod location;
pub mod metadata;
mod remote;
mod store;

pub use archive::{curve_from_records, Archive, ArchiveRecord, ARCHIVE_DIR_ENV};
pub use curve::{heaviest_realizations, nearest_realizations, return_period, CurveValue};
pub use error::{HazardError, StoreError};
pub use hazard::HazardData;
pub use key::{decode, encode, GroupKey, Key, RealizationIndex, Selector, SelectorKind};
pub use lazy::LazyData;
pub use location::{CodedLocation, DEFAULT_RESOLUTION, SITES};
pub use metadata::{HazardMetadata, LogicTree};
pub use remote::{HttpHazardStore, DEFAULT_TIMEOUT};
pub use store::{AggregateRecord, HazardStore, ImtValues, RealizationRecord};

/// Result type for hazard data operations.
pub type Result<T> = std::result::Result<T, HazardError>;

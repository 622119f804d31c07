//! The remote hazard store as seen by the cache.
//!
//! Implementations talk to whatever backs the hazard data; the cache only
//! relies on the three queries below. Each curve query returns every
//! intensity measure for the requested locations, which is what lets the
//! cache batch by location + selector.

use crate::metadata::HazardMetadata;
use crate::Result;
use serde::{Deserialize, Serialize};

/// One intensity measure's curve within a result record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImtValues {
    /// Intensity measure type.
    pub imt: String,
    /// Shaking levels.
    pub lvls: Vec<f64>,
    /// Annual probabilities of exceedance.
    pub vals: Vec<f64>,
}

/// Curves for a single realization at one location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealizationRecord {
    /// Location code.
    pub loc: String,
    /// Realization index.
    pub rlz: u32,
    /// One entry per intensity measure.
    pub values: Vec<ImtValues>,
}

/// Curves for a single aggregate statistic at one location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRecord {
    /// Location code.
    pub loc: String,
    /// Aggregate label, e.g. `mean` or `0.9`.
    pub agg: String,
    /// One entry per intensity measure.
    pub values: Vec<ImtValues>,
}

/// Query interface of a hazard store.
///
/// `vs30` and `imts` are optional filters; `None` means "all".
pub trait HazardStore: Send + Sync {
    /// Per-realization curves for `locations`.
    fn realization_curves(
        &self,
        hazard_id: &str,
        vs30: Option<u32>,
        locations: &[String],
        imts: Option<&[String]>,
    ) -> Result<Vec<RealizationRecord>>;

    /// Aggregate-statistic curves for `locations`.
    fn aggregate_curves(
        &self,
        hazard_id: &str,
        vs30: Option<u32>,
        locations: &[String],
        imts: Option<&[String]>,
    ) -> Result<Vec<AggregateRecord>>;

    /// Metadata records for the given hazard models. Models without a record
    /// are simply absent from the result.
    fn metadata(&self, hazard_ids: &[String]) -> Result<Vec<HazardMetadata>>;
}

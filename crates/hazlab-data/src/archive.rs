//! On-disk archive of aggregate hazard curves.
//!
//! Each hazard model and VS30 gets one JSON file, `{hazard_id}-{vs30}.json`,
//! holding a flat table of `(lat, lon, imt, agg, level, hazard)` rows. The
//! archive is filled from the store once and then filtered locally, so
//! repeated analyses do not go back to the store.

use crate::curve::CurveValue;
use crate::location::CodedLocation;
use crate::store::HazardStore;
use crate::{HazardError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming the archive directory.
pub const ARCHIVE_DIR_ENV: &str = "HAZARD_CURVE_ARCHIVE";

/// One point of one archived curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveRecord {
    /// Latitude as printed in the location code.
    pub lat: String,
    /// Longitude as printed in the location code.
    pub lon: String,
    /// Intensity measure type.
    pub imt: String,
    /// Aggregate label.
    pub agg: String,
    /// Shaking level.
    pub level: f64,
    /// Annual probability of exceedance.
    pub hazard: f64,
}

/// Contents of one archive file.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ArchiveFile {
    hazard_id: String,
    vs30: u32,
    created: DateTime<Utc>,
    records: Vec<ArchiveRecord>,
}

/// Directory of archived hazard curves.
#[derive(Debug, Clone)]
pub struct Archive {
    dir: PathBuf,
}

impl Archive {
    /// Use `dir` as the archive directory, creating it if needed.
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Use the directory named by `HAZARD_CURVE_ARCHIVE`, which must exist.
    pub fn from_env() -> Result<Self> {
        let dir = std::env::var_os(ARCHIVE_DIR_ENV)
            .map(PathBuf::from)
            .ok_or_else(|| HazardError::ArchiveDir(PathBuf::from(format!("${ARCHIVE_DIR_ENV}"))))?;
        if !dir.is_dir() {
            return Err(HazardError::ArchiveDir(dir));
        }
        Ok(Self { dir })
    }

    /// The archive directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the archive file for a model and VS30.
    pub fn filepath(&self, hazard_id: &str, vs30: u32) -> PathBuf {
        self.dir.join(format!("{hazard_id}-{vs30}.json"))
    }

    /// Returns true if the archive file exists.
    pub fn contains(&self, hazard_id: &str, vs30: u32) -> bool {
        self.filepath(hazard_id, vs30).exists()
    }

    /// Fetch every aggregate curve at `locations` and write the archive file.
    ///
    /// Returns the number of rows written.
    pub fn download(
        &self,
        store: &dyn HazardStore,
        hazard_id: &str,
        vs30: u32,
        locations: &[CodedLocation],
    ) -> Result<usize> {
        let codes: Vec<String> = locations.iter().map(CodedLocation::code).collect();
        info!(hazard_id, vs30, locations = codes.len(), "downloading hazard curves");

        let mut records = Vec::new();
        for (i, record) in store
            .aggregate_curves(hazard_id, Some(vs30), &codes, None)?
            .into_iter()
            .enumerate()
        {
            if i % 100 == 0 {
                debug!(record = i, "archiving store records");
            }
            let loc: CodedLocation = record.loc.parse()?;
            let (lat, lon) = (loc.lat_str(), loc.lon_str());
            for v in record.values {
                let curve = CurveValue::new(v.lvls, v.vals)?;
                records.extend(curve.points().map(|(level, hazard)| ArchiveRecord {
                    lat: lat.clone(),
                    lon: lon.clone(),
                    imt: v.imt.clone(),
                    agg: record.agg.clone(),
                    level,
                    hazard,
                }));
            }
        }

        let rows = records.len();
        let file = ArchiveFile {
            hazard_id: hazard_id.to_string(),
            vs30,
            created: Utc::now(),
            records,
        };
        let path = self.filepath(hazard_id, vs30);
        let mut writer = BufWriter::new(fs::File::create(&path)?);
        serde_json::to_writer(&mut writer, &file)?;
        writer.flush()?;

        info!(path = %path.display(), rows, "wrote hazard curve archive");
        Ok(rows)
    }

    /// Read archived rows matching the given locations, IMTs, and aggregates.
    pub fn load(
        &self,
        hazard_id: &str,
        vs30: u32,
        locations: &[CodedLocation],
        imts: &[String],
        aggs: &[String],
    ) -> Result<Vec<ArchiveRecord>> {
        let path = self.filepath(hazard_id, vs30);
        let reader = BufReader::new(fs::File::open(&path)?);
        let file: ArchiveFile = serde_json::from_reader(reader)?;
        debug!(
            path = %path.display(),
            created = %file.created,
            rows = file.records.len(),
            "read hazard curve archive"
        );

        let sites: HashSet<(String, String)> =
            locations.iter().map(|l| (l.lat_str(), l.lon_str())).collect();
        Ok(file
            .records
            .into_iter()
            .filter(|r| sites.contains(&(r.lat.clone(), r.lon.clone())))
            .filter(|r| imts.contains(&r.imt))
            .filter(|r| aggs.contains(&r.agg))
            .collect())
    }

    /// Load from the archive, downloading first if the file is missing or
    /// `force` is set.
    #[allow(clippy::too_many_arguments)]
    pub fn get_hazard(
        &self,
        store: &dyn HazardStore,
        hazard_id: &str,
        vs30: u32,
        locations: &[CodedLocation],
        imts: &[String],
        aggs: &[String],
        force: bool,
    ) -> Result<Vec<ArchiveRecord>> {
        if force || !self.contains(hazard_id, vs30) {
            self.download(store, hazard_id, vs30, locations)?;
        }
        self.load(hazard_id, vs30, locations, imts, aggs)
    }
}

/// Rebuild one curve from archived rows, levels ascending.
pub fn curve_from_records(
    records: &[ArchiveRecord],
    location: &CodedLocation,
    imt: &str,
    agg: &str,
) -> Option<CurveValue> {
    let (lat, lon) = (location.lat_str(), location.lon_str());
    let mut points: Vec<(f64, f64)> = records
        .iter()
        .filter(|r| r.lat == lat && r.lon == lon && r.imt == imt && r.agg == agg)
        .map(|r| (r.level, r.hazard))
        .collect();
    if points.is_empty() {
        return None;
    }
    points.sort_by(|a, b| a.0.total_cmp(&b.0));
    let (levels, values) = points.into_iter().unzip();
    Some(CurveValue { levels, values })
}

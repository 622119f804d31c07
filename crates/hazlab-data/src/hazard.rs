//! Per-model facade over the lazy curve cache and the metadata record.

use crate::curve::CurveValue;
use crate::key::{Key, Selector};
use crate::lazy::LazyData;
use crate::metadata::{HazardMetadata, LogicTree};
use crate::store::HazardStore;
use crate::{HazardError, Result};
use hazlab_metrics::{metric_defs, model_labels};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

/// A value computed at most once and retained for the owner's lifetime.
///
/// The lock is held while computing, so concurrent callers wait for the
/// first computation instead of repeating it. Errors are not retained.
struct Memo<T> {
    slot: Mutex<Option<Arc<T>>>,
}

impl<T> Default for Memo<T> {
    fn default() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }
}

impl<T> Memo<T> {
    fn get_or_try_init(&self, init: impl FnOnce() -> Result<T>) -> Result<Arc<T>> {
        let mut slot = self.slot.lock();
        if let Some(value) = slot.as_ref() {
            return Ok(Arc::clone(value));
        }
        let value = Arc::new(init()?);
        *slot = Some(Arc::clone(&value));
        Ok(value)
    }
}

/// Hazard curves and metadata for one hazard model.
///
/// Metadata is fetched from the store on first use and then kept for the
/// lifetime of the instance; every property reads the same record.
///
/// ```no_run
/// use hazlab_data::{HazardData, HttpHazardStore};
/// use std::sync::Arc;
///
/// let store = Arc::new(HttpHazardStore::new("https://hazard.example.org/api")?);
/// let hazard = HazardData::new("NSHM_v1.0.4", store);
/// let curve = hazard.values("-41.300~174.780", "PGA", "mean")?;
/// println!("{} levels, {} realizations", curve.len(), hazard.realization_count()?);
/// # Ok::<(), hazlab_data::HazardError>(())
/// ```
pub struct HazardData {
    hazard_id: String,
    store: Arc<dyn HazardStore>,
    data: LazyData,
    validate: bool,
    metadata: Memo<HazardMetadata>,
    realization_lt: Memo<LogicTree>,
    source_lt: Memo<LogicTree>,
    gsim_lt: Memo<LogicTree>,
}

impl std::fmt::Debug for HazardData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HazardData")
            .field("hazard_id", &self.hazard_id)
            .field("validate", &self.validate)
            .field("data", &self.data)
            .finish()
    }
}

impl HazardData {
    /// Create a facade for `hazard_id`. Nothing is fetched until first use.
    pub fn new(hazard_id: impl Into<String>, store: Arc<dyn HazardStore>) -> Self {
        let hazard_id = hazard_id.into();
        Self {
            data: LazyData::new(hazard_id.clone(), Arc::clone(&store)),
            hazard_id,
            store,
            validate: false,
            metadata: Memo::default(),
            realization_lt: Memo::default(),
            source_lt: Memo::default(),
            gsim_lt: Memo::default(),
        }
    }

    /// Restrict curve queries to one VS30.
    pub fn with_vs30(mut self, vs30: Option<u32>) -> Self {
        self.data = LazyData::new(self.hazard_id.clone(), Arc::clone(&self.store)).with_vs30(vs30);
        self
    }

    /// Check location and intensity measure against the metadata before
    /// looking up curves. Off by default: unknown combinations then surface
    /// as [`HazardError::KeyNotFound`] from the cache.
    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    /// Hazard model identifier.
    pub fn hazard_id(&self) -> &str {
        &self.hazard_id
    }

    /// The underlying curve cache.
    pub fn cache(&self) -> &LazyData {
        &self.data
    }

    /// The metadata record, fetched on first access.
    pub fn metadata(&self) -> Result<Arc<HazardMetadata>> {
        self.metadata.get_or_try_init(|| self.fetch_metadata())
    }

    /// Intensity measure types with curves.
    pub fn intensity_measure_types(&self) -> Result<Vec<String>> {
        Ok(self.metadata()?.intensity_measure_types.clone())
    }

    /// Site VS30 in m/s.
    pub fn vs30(&self) -> Result<u32> {
        Ok(self.metadata()?.vs30)
    }

    /// Aggregate statistic labels with curves.
    pub fn aggregate_labels(&self) -> Result<Vec<String>> {
        Ok(self.metadata()?.aggregate_labels.clone())
    }

    /// Parsed realization logic tree.
    pub fn realization_logic_tree(&self) -> Result<Arc<LogicTree>> {
        self.realization_lt
            .get_or_try_init(|| LogicTree::parse(&self.metadata()?.realization_lt))
    }

    /// Parsed source logic tree.
    pub fn source_logic_tree(&self) -> Result<Arc<LogicTree>> {
        self.source_lt
            .get_or_try_init(|| LogicTree::parse(&self.metadata()?.source_lt))
    }

    /// Parsed ground motion logic tree.
    pub fn gsim_logic_tree(&self) -> Result<Arc<LogicTree>> {
        self.gsim_lt
            .get_or_try_init(|| LogicTree::parse(&self.metadata()?.gsim_lt))
    }

    /// Hazard solution identifier.
    pub fn solution_id(&self) -> Result<String> {
        Ok(self.metadata()?.solution_id.clone())
    }

    /// Solution/VS30 range keys.
    pub fn hazsol_vs30_rk(&self) -> Result<Vec<String>> {
        Ok(self.metadata()?.hazsol_vs30_rk.clone())
    }

    /// Location codes with curves.
    pub fn locations(&self) -> Result<Vec<String>> {
        Ok(self.metadata()?.locations.clone())
    }

    /// Number of realizations: the length of the realization tree's weights.
    pub fn realization_count(&self) -> Result<usize> {
        self.realization_logic_tree()?.branch_count()
    }

    /// Curve at `location` for `imt` and a realization index or aggregate label.
    pub fn values(
        &self,
        location: &str,
        imt: &str,
        selector: impl Into<Selector>,
    ) -> Result<Arc<CurveValue>> {
        if self.validate {
            self.check_combination(location, imt)?;
        }
        let key = Key::new(imt, location, selector);
        self.data.get_key(&key)
    }

    /// Every realization's curve at `location` for `imt`, in index order.
    ///
    /// The first lookup fetches the whole realization group; the rest are
    /// served from the cache.
    pub fn realization_curves(
        &self,
        location: &str,
        imt: &str,
    ) -> Result<Vec<(u32, Arc<CurveValue>)>> {
        let count = realization_index_limit(self.realization_count()?)?;
        (0..count)
            .map(|rlz| self.values(location, imt, rlz).map(|curve| (rlz, curve)))
            .collect()
    }

    fn check_combination(&self, location: &str, imt: &str) -> Result<()> {
        let meta = self.metadata()?;
        if !meta.locations.iter().any(|l| l == location) {
            return Err(HazardError::UnknownLocation(location.to_string()));
        }
        if !meta.intensity_measure_types.iter().any(|i| i == imt) {
            return Err(HazardError::UnknownImt(imt.to_string()));
        }
        Ok(())
    }

    fn fetch_metadata(&self) -> Result<HazardMetadata> {
        debug!(hazard_id = %self.hazard_id, "fetching hazard metadata");
        let labels = model_labels(&self.hazard_id);
        metrics::counter!(metric_defs::METADATA_FETCHES.name, &labels).increment(1);

        let record = self
            .store
            .metadata(std::slice::from_ref(&self.hazard_id))?
            .into_iter()
            .find(|m| m.hazard_id == self.hazard_id)
            .ok_or_else(|| HazardError::MetadataNotFound {
                hazard_id: self.hazard_id.clone(),
            })?;

        info!(
            hazard_id = %self.hazard_id,
            vs30 = record.vs30,
            imts = record.intensity_measure_types.len(),
            locations = record.locations.len(),
            "loaded hazard metadata"
        );
        Ok(record)
    }
}

/// Upper bound of the realization indices for a tree with `count` branches.
fn realization_index_limit(count: usize) -> Result<u32> {
    u32::try_from(count).map_err(|_| {
        HazardError::LogicTree(format!("{count} realizations exceed the index range"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{AggregateRecord, ImtValues, RealizationRecord};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    const WLG: &str = "-41.300~174.780";

    #[derive(Default)]
    struct MetaStore {
        metadata_calls: AtomicUsize,
        curve_calls: AtomicUsize,
        missing: bool,
    }

    fn record() -> HazardMetadata {
        HazardMetadata {
            hazard_id: "SLT_TEST".into(),
            intensity_measure_types: vec!["PGA".into(), "SA(0.5)".into()],
            vs30: 400,
            aggregate_labels: vec!["mean".into()],
            realization_lt: "{'component': {0: 'a', 1: 'b', 2: 'c'}, \
                             'weight': {0: 0.2, 1: 0.3, 2: 0.5}}"
                .into(),
            source_lt: "{'branch': ['geodetic', 'geologic'], 'weight': [0.5, 0.5]}".into(),
            gsim_lt: "{'weight': [1.0]}".into(),
            solution_id: "SOL_1".into(),
            hazsol_vs30_rk: vec!["SOL_1:400".into()],
            locations: vec![WLG.into()],
        }
    }

    impl HazardStore for MetaStore {
        fn realization_curves(
            &self,
            _: &str,
            _: Option<u32>,
            locations: &[String],
            _: Option<&[String]>,
        ) -> Result<Vec<RealizationRecord>> {
            self.curve_calls.fetch_add(1, Ordering::SeqCst);
            Ok((0..3)
                .map(|rlz| RealizationRecord {
                    loc: locations[0].clone(),
                    rlz,
                    values: vec![ImtValues {
                        imt: "PGA".into(),
                        lvls: vec![0.1, 1.0],
                        vals: vec![0.1 / (rlz + 1) as f64, 0.001],
                    }],
                })
                .collect())
        }

        fn aggregate_curves(
            &self,
            _: &str,
            _: Option<u32>,
            _: &[String],
            _: Option<&[String]>,
        ) -> Result<Vec<AggregateRecord>> {
            self.curve_calls.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }

        fn metadata(&self, _: &[String]) -> Result<Vec<HazardMetadata>> {
            self.metadata_calls.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(10));
            if self.missing {
                Ok(Vec::new())
            } else {
                Ok(vec![record()])
            }
        }
    }

    #[test]
    fn test_properties_share_one_fetch() {
        let store = Arc::new(MetaStore::default());
        let hazard = HazardData::new("SLT_TEST", store.clone());

        assert_eq!(hazard.intensity_measure_types().unwrap(), vec!["PGA", "SA(0.5)"]);
        assert_eq!(hazard.vs30().unwrap(), 400);
        assert_eq!(hazard.aggregate_labels().unwrap(), vec!["mean"]);
        assert_eq!(hazard.solution_id().unwrap(), "SOL_1");
        assert_eq!(hazard.locations().unwrap(), vec![WLG]);
        assert_eq!(hazard.hazsol_vs30_rk().unwrap(), vec!["SOL_1:400"]);
        assert_eq!(hazard.realization_count().unwrap(), 3);
        assert_eq!(hazard.source_logic_tree().unwrap().branch_count().unwrap(), 2);
        assert_eq!(hazard.gsim_logic_tree().unwrap().weights().unwrap(), vec![1.0]);

        assert_eq!(store.metadata_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_parsed_tree_is_memoized() {
        let hazard = HazardData::new("SLT_TEST", Arc::new(MetaStore::default()));
        let a = hazard.realization_logic_tree().unwrap();
        let b = hazard.realization_logic_tree().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.weights().unwrap(), vec![0.2, 0.3, 0.5]);
    }

    #[test]
    fn test_concurrent_metadata_access_fetches_once() {
        let store = Arc::new(MetaStore::default());
        let hazard = Arc::new(HazardData::new("SLT_TEST", store.clone()));

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let hazard = Arc::clone(&hazard);
                thread::spawn(move || hazard.vs30().unwrap())
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), 400);
        }
        assert_eq!(store.metadata_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_missing_metadata() {
        let store = Arc::new(MetaStore {
            missing: true,
            ..Default::default()
        });
        let hazard = HazardData::new("SLT_TEST", store.clone());
        match hazard.vs30() {
            Err(HazardError::MetadataNotFound { hazard_id }) => assert_eq!(hazard_id, "SLT_TEST"),
            other => panic!("expected MetadataNotFound, got {other:?}"),
        }
        // Failures are not memoized.
        assert!(hazard.locations().is_err());
        assert_eq!(store.metadata_calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_values_skips_validation_by_default() {
        let store = Arc::new(MetaStore::default());
        let hazard = HazardData::new("SLT_TEST", store.clone());

        let curve = hazard.values(WLG, "PGA", 1u32).unwrap();
        assert_eq!(curve.values[0], 0.05);
        assert!(matches!(
            hazard.values("-36.870~174.770", "SA(0.5)", 0u32),
            Err(HazardError::KeyNotFound { .. })
        ));
        // No metadata needed for unchecked lookups.
        assert_eq!(store.metadata_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_validation_mode() {
        let store = Arc::new(MetaStore::default());
        let hazard = HazardData::new("SLT_TEST", store.clone()).with_validation(true);

        assert!(matches!(
            hazard.values("-36.870~174.770", "PGA", "mean"),
            Err(HazardError::UnknownLocation(_))
        ));
        assert!(matches!(
            hazard.values(WLG, "SA(3.0)", "mean"),
            Err(HazardError::UnknownImt(_))
        ));
        assert_eq!(store.curve_calls.load(Ordering::SeqCst), 0);
        assert!(hazard.values(WLG, "PGA", 0u32).is_ok());
    }

    #[test]
    fn test_realization_curves() {
        let store = Arc::new(MetaStore::default());
        let hazard = HazardData::new("SLT_TEST", store.clone());

        let curves = hazard.realization_curves(WLG, "PGA").unwrap();
        assert_eq!(curves.iter().map(|(i, _)| *i).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(store.curve_calls.load(Ordering::SeqCst), 1);
        assert_eq!(hazard.cache().len(), 3);
    }

    #[test]
    fn test_realization_index_limit() {
        assert_eq!(realization_index_limit(3).unwrap(), 3);
        assert_eq!(realization_index_limit(u32::MAX as usize).unwrap(), u32::MAX);
        #[cfg(target_pointer_width = "64")]
        assert!(matches!(
            realization_index_limit(u32::MAX as usize + 1),
            Err(HazardError::LogicTree(_))
        ));
    }
}

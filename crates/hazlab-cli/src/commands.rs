//! Command handlers.
//!
//! Each handler returns the JSON document the binary prints.

use crate::cli::{ArchiveCommand, ArchiveTarget, Command};
use crate::config::Config;
use crate::error::{CliError, Result};
use hazlab_data::{
    curve_from_records, return_period, Archive, CodedLocation, HazardData, HazardStore, Key,
    Selector,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

/// Shared state for command handlers.
pub struct Context {
    config: Config,
    store: Arc<dyn HazardStore>,
}

impl Context {
    pub fn new(config: Config, store: Arc<dyn HazardStore>) -> Self {
        Self { config, store }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn model(&self, hazard_id: &str) -> HazardData {
        HazardData::new(hazard_id, Arc::clone(&self.store)).with_vs30(self.config.vs30)
    }

    fn archive(&self) -> Result<Archive> {
        match &self.config.archive_dir {
            Some(dir) => Ok(Archive::new(dir)?),
            None => Ok(Archive::from_env()?),
        }
    }

    fn vs30(&self, flag: Option<u32>) -> Result<u32> {
        flag.or(self.config.vs30).ok_or(CliError::MissingSetting("vs30"))
    }
}

/// Run one command.
pub fn run(ctx: &Context, command: &Command) -> Result<Value> {
    match command {
        Command::Meta { hazard_id } => meta(ctx, hazard_id),
        Command::Curve {
            hazard_id,
            location,
            imt,
            selector,
            validate,
        } => curve(ctx, hazard_id, location, imt, selector, *validate),
        Command::Poe {
            hazard_id,
            location,
            imt,
            agg,
            poe,
            investigation_time,
        } => {
            let t = investigation_time.unwrap_or(ctx.config.investigation_time);
            shaking_at_poe(ctx, hazard_id, location, imt, agg, *poe, t)
        }
        Command::Archive(ArchiveCommand::Download(target)) => archive_download(ctx, target),
        Command::Archive(ArchiveCommand::Query {
            target,
            imts,
            aggs,
            force,
        }) => archive_query(ctx, target, imts, aggs, *force),
    }
}

fn meta(ctx: &Context, hazard_id: &str) -> Result<Value> {
    let model = ctx.model(hazard_id);
    let meta = model.metadata()?;
    Ok(json!({
        "hazard_id": meta.hazard_id,
        "solution_id": meta.solution_id,
        "vs30": meta.vs30,
        "imts": meta.intensity_measure_types,
        "aggs": meta.aggregate_labels,
        "locations": meta.locations.len(),
        "realizations": model.realization_count()?,
        "hazsol_vs30_rk": meta.hazsol_vs30_rk,
    }))
}

fn curve(
    ctx: &Context,
    hazard_id: &str,
    location: &str,
    imt: &str,
    selector: &str,
    validate: bool,
) -> Result<Value> {
    let location = location_code(location)?;
    let selector = Selector::parse(selector);
    let key = Key::new(imt, location.as_str(), selector.clone());

    let model = ctx.model(hazard_id).with_validation(validate);
    let curve = model.values(&location, imt, selector)?;
    Ok(json!({
        "key": key.to_string(),
        "levels": curve.levels,
        "values": curve.values,
    }))
}

#[allow(clippy::too_many_arguments)]
fn shaking_at_poe(
    ctx: &Context,
    hazard_id: &str,
    location: &str,
    imt: &str,
    agg: &str,
    poe: f64,
    investigation_time: f64,
) -> Result<Value> {
    let location = location_code(location)?;
    let curve = ctx.model(hazard_id).values(&location, imt, Selector::aggregate(agg))?;
    let level = curve.hazard_at_poe(poe, investigation_time);
    Ok(json!({
        "key": Key::new(imt, location.as_str(), Selector::aggregate(agg)).to_string(),
        "poe": poe,
        "investigation_time": investigation_time,
        "return_period": return_period(poe, investigation_time),
        "level": level,
    }))
}

fn archive_download(ctx: &Context, target: &ArchiveTarget) -> Result<Value> {
    let archive = ctx.archive()?;
    let vs30 = ctx.vs30(target.vs30)?;
    let locations = parse_locations(&target.locations)?;

    let rows = archive.download(ctx.store.as_ref(), &target.hazard_id, vs30, &locations)?;
    let path = archive.filepath(&target.hazard_id, vs30);
    info!(path = %path.display(), rows, "archive written");
    Ok(json!({ "path": path.display().to_string(), "rows": rows }))
}

fn archive_query(
    ctx: &Context,
    target: &ArchiveTarget,
    imts: &[String],
    aggs: &[String],
    force: bool,
) -> Result<Value> {
    let archive = ctx.archive()?;
    let vs30 = ctx.vs30(target.vs30)?;
    let locations = parse_locations(&target.locations)?;

    let rows = archive.get_hazard(
        ctx.store.as_ref(),
        &target.hazard_id,
        vs30,
        &locations,
        imts,
        aggs,
        force,
    )?;

    let mut curves = Vec::new();
    for location in &locations {
        for imt in imts {
            for agg in aggs {
                if let Some(curve) = curve_from_records(&rows, location, imt, agg) {
                    curves.push(json!({
                        "location": location.code(),
                        "imt": imt,
                        "agg": agg,
                        "levels": curve.levels,
                        "values": curve.values,
                    }));
                }
            }
        }
    }
    Ok(json!({ "rows": rows.len(), "curves": curves }))
}

/// Normalise a location argument to its code.
fn location_code(location: &str) -> Result<String> {
    Ok(location.parse::<CodedLocation>()?.code())
}

fn parse_locations(locations: &[String]) -> Result<Vec<CodedLocation>> {
    locations
        .iter()
        .map(|l| l.parse::<CodedLocation>().map_err(CliError::from))
        .collect()
}

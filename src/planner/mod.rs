//! # Dimension Planner
//!
//! Pure planning of analytics queries for one `(DataItemConfig, period)` pair.
//!
//! The planner builds the base dimension map from the data item, picks the heavy
//! dimension (`dx` when `paginateByData` is set, otherwise the largest, ties going
//! to the first key in map order) and either returns the map as a single query or
//! splits the heavy dimension into contiguous chunks of `pageSize`.
//!
//! `ATTRIBUTE_VALUES` items are planned once per attribute option, each resulting
//! map carrying a filter restricted to that option, so the job count multiplies by
//! the number of options.
//!
//! A job that already carries override dimensions is terminal: the override is used
//! verbatim and never paginated again.

pub mod pagination;

use thiserror::Error;

use crate::models::{DataItemConfig, DimensionKey, DimensionMap, RuntimeConfig};

pub use pagination::{chunk_items, page_count};

/// Fatal configuration problems; jobs hitting these are never retried
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlannerError {
    #[error("data item {data_item_id} is ATTRIBUTE_VALUES but has no attributeId")]
    MissingAttributeId { data_item_id: String },

    #[error("data item {data_item_id} is ATTRIBUTE_VALUES but has no attributeOptions")]
    MissingAttributeOptions { data_item_id: String },

    #[error("data item {data_item_id} has an empty mapping")]
    EmptyMapping { data_item_id: String },

    #[error("pageSize must be greater than zero")]
    InvalidPageSize,
}

/// Which system's identifiers the `dx` dimension uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimensionSpace {
    /// Mapping keys; used when reading from the source system
    Source,
    /// Mapping values; used when reading back from the destination (deletion, validation)
    Destination,
}

#[derive(Debug, Clone)]
pub struct PlanRequest<'a> {
    pub data_item: &'a DataItemConfig,
    pub period_id: &'a str,
    pub runtime: &'a RuntimeConfig,
    pub override_dimensions: Option<&'a DimensionMap>,
    pub space: DimensionSpace,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanVerdict {
    /// One query; no sub-jobs
    Single(DimensionMap),
    /// Fan out into one sub-job per map, each carrying it as its override
    Paginate {
        dimension: DimensionKey,
        chunks: Vec<DimensionMap>,
    },
}

impl PlanVerdict {
    pub fn job_count(&self) -> usize {
        match self {
            PlanVerdict::Single(_) => 1,
            PlanVerdict::Paginate { chunks, .. } => chunks.len(),
        }
    }
}

pub fn plan(request: &PlanRequest<'_>) -> Result<PlanVerdict, PlannerError> {
    if let Some(dimensions) = request.override_dimensions {
        return Ok(PlanVerdict::Single(dimensions.clone()));
    }

    if request.runtime.page_size == 0 {
        return Err(PlannerError::InvalidPageSize);
    }

    let base_maps = query_maps(
        request.data_item,
        request.period_id,
        request.runtime,
        request.space,
    )?;

    let page_size = request.runtime.page_size;
    let mut heavy_key = None;
    let mut chunks = Vec::new();

    for base in base_maps {
        let heavy = heavy_dimension(&base, request.runtime.paginate_by_data);
        let items = base.get(&heavy).map(<[String]>::to_vec).unwrap_or_default();

        if items.len() <= page_size {
            chunks.push(base);
        } else {
            for chunk in chunk_items(&items, page_size) {
                let mut map = base.clone();
                map.set(heavy.clone(), chunk);
                chunks.push(map);
            }
        }
        heavy_key.get_or_insert(heavy);
    }

    match (chunks.len(), heavy_key) {
        (1, _) | (_, None) => Ok(PlanVerdict::Single(chunks.pop().unwrap_or_default())),
        (_, Some(dimension)) => Ok(PlanVerdict::Paginate { dimension, chunks }),
    }
}

/// Unpaginated query maps for a data item: one per attribute option, or one for `DX_VALUES`
pub fn query_maps(
    data_item: &DataItemConfig,
    period_id: &str,
    runtime: &RuntimeConfig,
    space: DimensionSpace,
) -> Result<Vec<DimensionMap>, PlannerError> {
    validate_data_item(data_item)?;
    let base = base_dimensions(data_item, period_id, runtime, space);

    if !data_item.is_attribute() {
        return Ok(vec![base]);
    }

    let attribute = DimensionKey::Attribute(
        data_item
            .attribute_id
            .clone()
            .ok_or_else(|| PlannerError::MissingAttributeId {
                data_item_id: data_item.id.clone(),
            })?,
    );

    Ok(data_item
        .attribute_options
        .iter()
        .map(|option| {
            base.clone()
                .with_filter(attribute.clone(), vec![option.clone()])
        })
        .collect())
}

/// Base map in `dx`, `pe`, `ou` order with runtime org unit overrides applied
pub fn base_dimensions(
    data_item: &DataItemConfig,
    period_id: &str,
    runtime: &RuntimeConfig,
    space: DimensionSpace,
) -> DimensionMap {
    let data_ids = match space {
        DimensionSpace::Source => data_item.source_ids(),
        DimensionSpace::Destination => data_item.destination_ids(),
    };
    let parent = runtime
        .parent_org_unit_id
        .clone()
        .unwrap_or_else(|| data_item.parent_org_unit_id.clone());
    let level = runtime.org_unit_level.unwrap_or(data_item.org_unit_level);

    DimensionMap::new()
        .with(DimensionKey::Data, data_ids)
        .with(DimensionKey::Period, vec![period_id.to_string()])
        .with(DimensionKey::OrgUnit, vec![parent, format!("LEVEL-{level}")])
}

/// Dimension to split. `ou` is never a candidate: its `[parent, LEVEL-n]` pair is
/// one selector, and `LEVEL-n` alone would reach org units outside the parent.
pub fn heavy_dimension(map: &DimensionMap, paginate_by_data: bool) -> DimensionKey {
    if paginate_by_data {
        return DimensionKey::Data;
    }
    map.heaviest(|key| *key != DimensionKey::OrgUnit)
        .map(|d| d.key.clone())
        .unwrap_or(DimensionKey::Data)
}

pub fn validate_data_item(data_item: &DataItemConfig) -> Result<(), PlannerError> {
    if data_item.mapping.is_empty() {
        return Err(PlannerError::EmptyMapping {
            data_item_id: data_item.id.clone(),
        });
    }
    if data_item.is_attribute() {
        if data_item.attribute_id.as_deref().map_or(true, str::is_empty) {
            return Err(PlannerError::MissingAttributeId {
                data_item_id: data_item.id.clone(),
            });
        }
        if data_item.attribute_options.is_empty() {
            return Err(PlannerError::MissingAttributeOptions {
                data_item_id: data_item.id.clone(),
            });
        }
    }
    Ok(())
}

//! # Transform
//!
//! Analytics rows (`dx`, `pe`, `ou`, `value`) into destination data values.
//! A `dx` value may be a plain data element id or a `dataElement.categoryOptionCombo`
//! operand; operands are split into the two fields of the data value.

use std::time::Duration;

use thiserror::Error;

use crate::clients::{AnalyticsApi, AnalyticsResponse};
use crate::models::{DataItemConfig, DataValue, DimensionKey, DimensionMap};

use super::outcome::JobFailure;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    #[error("Analytics response has no '{column}' column")]
    MissingColumn { column: &'static str },
}

impl From<TransformError> for JobFailure {
    fn from(err: TransformError) -> Self {
        JobFailure::invalid_payload(err.to_string())
    }
}

/// Which id space the `dx` column of the rows is in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowIds {
    /// Source ids, translated through the item's mapping; unmapped rows are dropped
    Source,
    /// Already destination ids
    Destination,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transformed {
    pub values: Vec<DataValue>,
    /// Rows skipped because their item has no destination mapping
    pub dropped: usize,
}

pub fn to_data_values(
    data_item: &DataItemConfig,
    response: &AnalyticsResponse,
    ids: RowIds,
    attribute_option_combo: Option<&str>,
) -> Result<Transformed, TransformError> {
    let column = |name: &'static str| {
        response
            .column_index(name)
            .ok_or(TransformError::MissingColumn { column: name })
    };
    let dx = column("dx")?;
    let pe = column("pe")?;
    let ou = column("ou")?;
    let value = column("value")?;

    let mut values = Vec::with_capacity(response.rows.len());
    let mut dropped = 0;

    for row in &response.rows {
        let cell = |i: usize| row.get(i).map(String::as_str).unwrap_or_default();
        let item = match ids {
            RowIds::Destination => cell(dx),
            RowIds::Source => match data_item.destination_for(cell(dx)) {
                Some(destination) => destination,
                None => {
                    dropped += 1;
                    continue;
                }
            },
        };
        let (data_element, category_option_combo) = split_operand(item);

        values.push(DataValue {
            data_element: data_element.to_string(),
            period: cell(pe).to_string(),
            org_unit: cell(ou).to_string(),
            category_option_combo: category_option_combo.map(str::to_string),
            attribute_option_combo: attribute_option_combo.map(str::to_string),
            value: cell(value).to_string(),
        });
    }

    Ok(Transformed { values, dropped })
}

fn split_operand(id: &str) -> (&str, Option<&str>) {
    match id.split_once('.') {
        Some((element, combo)) if !combo.is_empty() => (element, Some(combo)),
        _ => (id, None),
    }
}

/// Attribute option combo for the single attribute option a query filters on.
///
/// `None` for `DX_VALUES` items. A filter without exactly one option, or an option
/// the destination cannot resolve, is a configuration failure.
pub async fn resolve_attribute_option_combo(
    api: &dyn AnalyticsApi,
    data_item: &DataItemConfig,
    dimensions: &DimensionMap,
    timeout: Duration,
) -> Result<Option<String>, JobFailure> {
    let Some(attribute_id) = data_item.attribute_id.as_deref().filter(|_| data_item.is_attribute())
    else {
        return Ok(None);
    };

    let option = match dimensions.filter(&DimensionKey::Attribute(attribute_id.to_string())) {
        Some([option]) => option,
        _ => {
            return Err(JobFailure::configuration(format!(
                "data item {} must filter on exactly one option of attribute {attribute_id}",
                data_item.id
            )))
        }
    };

    match api
        .resolve_attribute_option_combo(option, timeout)
        .await
        .map_err(|e| JobFailure::from_client(&e))?
    {
        Some(combo) => Ok(Some(combo)),
        None => Err(JobFailure::configuration(format!(
            "no attribute option combo found for category option {option}"
        ))),
    }
}

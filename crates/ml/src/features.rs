// Feature assembly: raw match records -> canonical numeric matrix

use ndarray::{s, Array2, ArrayView1, ArrayView2, Axis};
use std::sync::Arc;
use tracing::debug;

use tennis_models::{MatchRecord, PredictorError, Result};

use crate::artifacts::FittedArtifactBundle;
use crate::schema::{FeatureSchema, RawValue, BASE_FIELDS};

/// Fully numeric rows in canonical column order, ready for any registered model.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalFeatureMatrix {
    values: Array2<f64>,
}

impl CanonicalFeatureMatrix {
    pub fn rows(&self) -> usize {
        self.values.nrows()
    }

    pub fn width(&self) -> usize {
        self.values.ncols()
    }

    pub fn view(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    pub fn row(&self, index: usize) -> ArrayView1<'_, f64> {
        self.values.row(index)
    }

    pub fn into_inner(self) -> Array2<f64> {
        self.values
    }
}

/// Builds feature matrices from raw records using one fitted artifact bundle.
///
/// Inference and evaluation both go through this type so that the encoding
/// applied at serving time is exactly the one applied when scoring history.
#[derive(Debug, Clone)]
pub struct FeatureAssembler {
    bundle: Arc<FittedArtifactBundle>,
}

impl FeatureAssembler {
    pub fn new(bundle: Arc<FittedArtifactBundle>) -> Self {
        Self { bundle }
    }

    pub fn schema(&self) -> &FeatureSchema {
        self.bundle.schema()
    }

    pub fn bundle(&self) -> &FittedArtifactBundle {
        &self.bundle
    }

    /// Encodes, orders and imputes `records`. Any encoding error fails the whole call.
    pub fn assemble(&self, records: &[MatchRecord]) -> Result<CanonicalFeatureMatrix> {
        let mut values = raw_feature_matrix(records, &self.bundle)?;
        let filled = self.bundle.imputer().transform(&mut values)?;
        debug!(rows = records.len(), imputed_cells = filled, "assembled feature matrix");
        Ok(CanonicalFeatureMatrix { values })
    }

    pub fn assemble_one(&self, record: &MatchRecord) -> Result<CanonicalFeatureMatrix> {
        self.assemble(std::slice::from_ref(record))
    }
}

/// Encoded matrix before imputation; missing cells hold `NaN`.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn raw_feature_matrix(records: &[MatchRecord], bundle: &FittedArtifactBundle) -> Result<Array2<f64>> {
    let schema = bundle.schema();
    let surface = bundle.surface();
    let mut matrix = Array2::from_elem((records.len(), schema.width()), f64::NAN);
    let mut indicators = vec![0.0; surface.width()];

    for (mut row, record) in matrix.axis_iter_mut(Axis(0)).zip(records) {
        for field in BASE_FIELDS {
            row[field.position()] = match field.extract(record) {
                RawValue::Number(value) => value.unwrap_or(f64::NAN),
                RawValue::Label(None) => f64::NAN,
                RawValue::Label(Some(label)) => {
                    let codec = bundle.codec_for(field).ok_or_else(|| {
                        PredictorError::schema_mismatch(field.column_name(), "numeric value", "label")
                    })?;
                    codec.encode(label)? as f64
                }
            };
        }

        let label = record
            .surface
            .as_deref()
            .ok_or_else(|| PredictorError::missing_field("surface"))?;
        surface.encode_into(label, &mut indicators)?;
        row.slice_mut(s![schema.surface_offset()..])
            .iter_mut()
            .zip(&indicators)
            .for_each(|(cell, v)| *cell = *v);
    }

    Ok(matrix)
}

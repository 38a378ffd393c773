// Fitted categorical codecs and the mean imputer
//
// Missing cells are `f64::NAN` until the imputer runs.

use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::warn;

use tennis_models::{PredictorError, Result};

/// Label encoder: each fitted label maps to its index in the sorted vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CodecClasses")]
pub struct CategoricalCodec {
    field: String,
    classes: Vec<String>,
}

#[derive(Deserialize)]
struct CodecClasses {
    field: String,
    classes: Vec<String>,
}

impl TryFrom<CodecClasses> for CategoricalCodec {
    type Error = String;

    fn try_from(raw: CodecClasses) -> std::result::Result<Self, Self::Error> {
        ensure_sorted_unique(&raw.field, &raw.classes)?;
        Ok(Self {
            field: raw.field,
            classes: raw.classes,
        })
    }
}

impl CategoricalCodec {
    pub fn fit<I, S>(field: &str, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            field: field.to_string(),
            classes: sorted_vocabulary(labels),
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn encode(&self, label: &str) -> Result<usize> {
        self.classes
            .binary_search_by(|class| class.as_str().cmp(label))
            .map_err(|_| PredictorError::unknown_category(&self.field, label))
    }

    pub fn decode(&self, code: usize) -> Option<&str> {
        self.classes.get(code).map(String::as_str)
    }
}

/// Surface binarizer: one indicator column per fitted class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CodecClasses")]
pub struct MultiHotCodec {
    field: String,
    classes: Vec<String>,
}

impl TryFrom<CodecClasses> for MultiHotCodec {
    type Error = String;

    fn try_from(raw: CodecClasses) -> std::result::Result<Self, Self::Error> {
        ensure_sorted_unique(&raw.field, &raw.classes)?;
        Ok(Self {
            field: raw.field,
            classes: raw.classes,
        })
    }
}

impl MultiHotCodec {
    pub fn fit<I, S>(field: &str, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let classes = sorted_vocabulary(labels);
        if classes.is_empty() {
            warn!(field, "multi-hot codec fitted without any labels");
        }
        Self {
            field: field.to_string(),
            classes,
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn width(&self) -> usize {
        self.classes.len()
    }

    /// Writes the indicator vector for `label` into `out`, which must be `width()` long.
    pub fn encode_into(&self, label: &str, out: &mut [f64]) -> Result<()> {
        if out.len() != self.width() {
            return Err(PredictorError::schema_mismatch(
                format!("{} indicator columns", self.field),
                self.width(),
                out.len(),
            ));
        }
        let hot = self
            .classes
            .binary_search_by(|class| class.as_str().cmp(label))
            .map_err(|_| PredictorError::unknown_category(&self.field, label))?;
        for (i, cell) in out.iter_mut().enumerate() {
            *cell = if i == hot { 1.0 } else { 0.0 };
        }
        Ok(())
    }

    pub fn encode(&self, label: &str) -> Result<Vec<f64>> {
        let mut out = vec![0.0; self.width()];
        self.encode_into(label, &mut out)?;
        Ok(out)
    }

    /// Inverse of `encode` for a well-formed indicator vector.
    pub fn decode(&self, indicators: &[f64]) -> Option<&str> {
        if indicators.len() != self.width() {
            return None;
        }
        let mut hot = indicators.iter().enumerate().filter(|(_, v)| **v == 1.0);
        match (hot.next(), hot.next()) {
            (Some((i, _)), None) => Some(self.classes[i].as_str()),
            _ => None,
        }
    }
}

/// Per-column mean fill values in canonical column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Imputer {
    statistics: Vec<f64>,
}

impl Imputer {
    pub fn new(statistics: Vec<f64>) -> Result<Self> {
        if let Some(col) = statistics.iter().position(|v| !v.is_finite()) {
            return Err(PredictorError::InvalidArtifact {
                path: "imputer".to_string(),
                reason: format!("fill value for column {col} is not finite"),
            });
        }
        Ok(Self { statistics })
    }

    /// Column means over the non-missing cells. Columns with no observed
    /// value fall back to 0.
    #[allow(clippy::cast_precision_loss)]
    pub fn fit(matrix: ArrayView2<f64>) -> Self {
        let statistics = matrix
            .axis_iter(Axis(1))
            .enumerate()
            .map(|(col, column)| {
                let (sum, count) = column
                    .iter()
                    .filter(|v| !v.is_nan())
                    .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
                if count == 0 {
                    warn!(column = col, "no observed values while fitting imputer, using 0");
                    0.0
                } else {
                    sum / count as f64
                }
            })
            .collect();
        Self { statistics }
    }

    pub fn statistics(&self) -> &[f64] {
        &self.statistics
    }

    pub fn width(&self) -> usize {
        self.statistics.len()
    }

    /// Replaces every missing cell with its column's fill value and returns
    /// how many cells were filled.
    pub fn transform(&self, matrix: &mut Array2<f64>) -> Result<usize> {
        if matrix.ncols() != self.width() {
            return Err(PredictorError::schema_mismatch(
                "imputer input width",
                self.width(),
                matrix.ncols(),
            ));
        }
        let mut filled = 0;
        for (column, fill) in matrix.axis_iter_mut(Axis(1)).zip(&self.statistics) {
            for cell in column {
                if cell.is_nan() {
                    *cell = *fill;
                    filled += 1;
                }
            }
        }
        Ok(filled)
    }
}

fn sorted_vocabulary<I, S>(labels: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    labels
        .into_iter()
        .map(|l| l.as_ref().to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn ensure_sorted_unique(field: &str, classes: &[String]) -> std::result::Result<(), String> {
    if classes.windows(2).all(|w| w[0] < w[1]) {
        Ok(())
    } else {
        Err(format!("classes of {field} must be sorted and unique"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use proptest::prelude::*;

    #[test]
    fn test_codes_follow_sorted_order() {
        let codec = CategoricalCodec::fit("player_hand", ["R", "L", "U", "R", "A"]);
        assert_eq!(codec.classes(), ["A", "L", "R", "U"]);
        assert_eq!(codec.encode("A").unwrap(), 0);
        assert_eq!(codec.encode("R").unwrap(), 2);
        assert_eq!(codec.decode(3), Some("U"));
    }

    #[test]
    fn test_unknown_label_is_an_error() {
        let codec = CategoricalCodec::fit("round", ["F", "SF", "QF"]);
        match codec.encode("R256") {
            Err(PredictorError::UnknownCategory { field, label }) => {
                assert_eq!(field, "round");
                assert_eq!(label, "R256");
            }
            other => panic!("expected UnknownCategory, got {other:?}"),
        }
    }

    #[test]
    fn test_multi_hot_encoding() {
        let codec = MultiHotCodec::fit("surface", ["Hard", "Clay", "Grass", "Carpet"]);
        assert_eq!(codec.width(), 4);
        assert_eq!(codec.encode("Clay").unwrap(), vec![0.0, 1.0, 0.0, 0.0]);
        assert_eq!(codec.decode(&[0.0, 0.0, 0.0, 1.0]), Some("Hard"));
        assert!(matches!(
            codec.encode("Sand"),
            Err(PredictorError::UnknownCategory { .. })
        ));
    }

    #[test]
    fn test_codec_rejects_unsorted_artifact() {
        let json = r#"{"field": "round", "classes": ["SF", "F"]}"#;
        assert!(serde_json::from_str::<CategoricalCodec>(json).is_err());
        let json = r#"{"field": "round", "classes": ["F", "SF"]}"#;
        let codec: CategoricalCodec = serde_json::from_str(json).unwrap();
        assert_eq!(codec.encode("SF").unwrap(), 1);
    }

    #[test]
    fn test_imputer_fit_and_transform() {
        let training = array![[1.0, f64::NAN], [3.0, 4.0], [f64::NAN, 8.0]];
        let imputer = Imputer::fit(training.view());
        assert_eq!(imputer.statistics(), &[2.0, 6.0]);

        let mut input = array![[f64::NAN, 1.0], [5.0, f64::NAN]];
        let filled = imputer.transform(&mut input).unwrap();
        assert_eq!(filled, 2);
        assert_eq!(input, array![[2.0, 1.0], [5.0, 6.0]]);
    }

    #[test]
    fn test_imputer_leaves_complete_matrix_unchanged() {
        let imputer = Imputer::new(vec![9.0, 9.0]).unwrap();
        let mut input = array![[1.0, 2.0], [3.0, 4.0]];
        let original = input.clone();
        assert_eq!(imputer.transform(&mut input).unwrap(), 0);
        assert_eq!(input, original);
    }

    #[test]
    fn test_imputer_width_mismatch() {
        let imputer = Imputer::new(vec![0.0; 3]).unwrap();
        let mut input = Array2::<f64>::zeros((1, 2));
        assert!(matches!(
            imputer.transform(&mut input),
            Err(PredictorError::SchemaMismatch { .. })
        ));
    }

    proptest! {
        #[test]
        fn prop_encode_decode_round_trip(labels in prop::collection::vec("[A-Za-z0-9]{1,6}", 1..20)) {
            let codec = CategoricalCodec::fit("tourney_level", &labels);
            for label in &labels {
                let code = codec.encode(label).unwrap();
                prop_assert_eq!(codec.decode(code), Some(label.as_str()));
            }
            for (a, b) in labels.iter().zip(labels.iter().skip(1)) {
                if a != b {
                    prop_assert_ne!(codec.encode(a).unwrap(), codec.encode(b).unwrap());
                }
            }
        }

        #[test]
        fn prop_multi_hot_has_single_hot_cell(labels in prop::collection::vec("[A-Za-z]{1,8}", 1..10)) {
            let codec = MultiHotCodec::fit("surface", &labels);
            for label in &labels {
                let indicators = codec.encode(label).unwrap();
                prop_assert_eq!(indicators.iter().filter(|v| **v == 1.0).count(), 1);
                prop_assert_eq!(codec.decode(&indicators), Some(label.as_str()));
            }
        }
    }
}

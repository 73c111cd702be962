//! Per-type rendering rules.
//!
//! Every column is assigned a [`TypeCategory`] from its declared Arrow type. The
//! category selects a [`RenderRule`] that tells the query builder how to order
//! values (so min/max follow native numeric and temporal ordering rather than
//! string ordering) and how to measure their length. The same rule drives how
//! result cells are turned into bounded strings for the report.
//!
//! Rendered values are truncated to a fixed number of characters (Unicode
//! scalar values). Truncation never splits a multi-byte sequence and never
//! fails. Hex renderings of binary values are cut to whole bytes.
//!
//! Types without a dedicated rule (lists, structs, maps, unions) cannot be
//! cast to text inside the query engine. Their values are scanned and folded
//! into a [`RenderedValues`] summary on the client instead.

use std::collections::HashSet;

use arrow::array::{Array, AsArray};
use arrow::datatypes::DataType;
use arrow::util::display::{ArrayFormatter, FormatOptions};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::DEFAULT_MAX_VALUE_LENGTH;
use crate::error::{ProfileError, Result};
use crate::report::Diagnostic;

/// Normalized bucket a declared column type maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeCategory {
    Text,
    Numeric,
    Temporal,
    Boolean,
    Binary,
    Other,
}

impl TypeCategory {
    /// Maps an Arrow type to its category. Dictionaries take the category of
    /// their value type.
    pub fn of(data_type: &DataType) -> Self {
        match data_type {
            DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => Self::Text,
            DataType::Boolean => Self::Boolean,
            DataType::Binary
            | DataType::LargeBinary
            | DataType::BinaryView
            | DataType::FixedSizeBinary(_) => Self::Binary,
            DataType::Dictionary(_, value_type) => Self::of(value_type),
            dt if dt.is_numeric() => Self::Numeric,
            dt if dt.is_temporal() => Self::Temporal,
            _ => Self::Other,
        }
    }
}

/// Which ordering min/max are computed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderingBasis {
    /// The column's own ordering (numeric, temporal, lexical for text, bytewise
    /// for binary).
    Native,
    /// Lexical ordering of the rendered text, applied to scanned values.
    Rendered,
}

/// How the length of a value is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthMeasure {
    /// Character length of the text value itself.
    Characters,
    /// Character length of the value cast to text.
    CastCharacters,
    /// Length in bytes.
    Bytes,
    /// Character length of the rendered text of a scanned value.
    Rendered,
}

/// Rendering strategy for one declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderRule {
    pub category: TypeCategory,
    pub ordering: OrderingBasis,
    pub length: LengthMeasure,
}

impl RenderRule {
    /// The generic rule used for types without a dedicated one.
    pub const FALLBACK: RenderRule = RenderRule {
        category: TypeCategory::Other,
        ordering: OrderingBasis::Rendered,
        length: LengthMeasure::Rendered,
    };

    /// Whether values must be scanned and rendered on the client because the
    /// query engine cannot order or measure them.
    pub fn scans_values(&self) -> bool {
        self.ordering == OrderingBasis::Rendered
    }

    /// Whether measured lengths are capped at the rendering limit.
    ///
    /// Byte lengths describe the stored value, not its hex rendering, and are
    /// reported as-is.
    pub fn caps_length(&self) -> bool {
        self.length != LengthMeasure::Bytes
    }
}

/// Renders values into bounded strings and picks rules per declared type.
#[derive(Debug, Clone, Copy)]
pub struct ValueNormalizer {
    max_value_length: usize,
}

impl Default for ValueNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_VALUE_LENGTH)
    }
}

impl ValueNormalizer {
    pub fn new(max_value_length: usize) -> Self {
        Self { max_value_length }
    }

    pub fn max_value_length(&self) -> usize {
        self.max_value_length
    }

    /// Looks up the dedicated rule for a declared type.
    ///
    /// Returns [`ProfileError::UnsupportedType`] for types without one; use
    /// [`resolve`](Self::resolve) to get the fallback instead.
    pub fn rule_for(&self, data_type: &DataType) -> Result<RenderRule> {
        let category = TypeCategory::of(data_type);
        let is_dictionary = matches!(data_type, DataType::Dictionary(_, _));

        let length = match category {
            TypeCategory::Text if !is_dictionary => LengthMeasure::Characters,
            TypeCategory::Binary => LengthMeasure::Bytes,
            TypeCategory::Other => {
                return Err(ProfileError::UnsupportedType {
                    declared_type: data_type.to_string(),
                })
            }
            _ => LengthMeasure::CastCharacters,
        };

        Ok(RenderRule {
            category,
            ordering: OrderingBasis::Native,
            length,
        })
    }

    /// Returns the rule for a declared type, falling back to generic string
    /// coercion when there is no dedicated rule. The fallback is reported as a
    /// diagnostic so it can be noted on the column's record.
    pub fn resolve(&self, data_type: &DataType) -> (RenderRule, Option<Diagnostic>) {
        match self.rule_for(data_type) {
            Ok(rule) => (rule, None),
            Err(_) => (
                RenderRule::FALLBACK,
                Some(Diagnostic::RenderingFallback {
                    declared_type: data_type.to_string(),
                }),
            ),
        }
    }

    /// Renders one cell of an Arrow array. Returns `None` only for nulls.
    pub fn render(
        &self,
        array: &dyn Array,
        row: usize,
        rule: &RenderRule,
    ) -> Result<Option<String>> {
        if row >= array.len() {
            return Err(ProfileError::invalid_result(format!(
                "row {row} out of bounds for array of length {}",
                array.len()
            )));
        }
        if array.is_null(row) {
            return Ok(None);
        }

        let text = match (rule.category, binary_value(array, row)) {
            (TypeCategory::Binary, Some(bytes)) => {
                // Two hex digits per byte; never end on half a byte.
                let limit = self.max_value_length - self.max_value_length % 2;
                return Ok(Some(truncate(&hex::encode(bytes), limit)));
            }
            _ => display_value(array, row)?,
        };

        Ok(Some(self.truncate(&text)))
    }

    /// Length of a rendered value in characters, capped like the value itself.
    pub fn rendered_length(&self, rendered: &str) -> u64 {
        self.bound_length(rendered.chars().count() as u64, &RenderRule::FALLBACK)
    }

    /// Caps a measured length to what a rendered value can hold.
    pub fn bound_length(&self, length: u64, rule: &RenderRule) -> u64 {
        if rule.caps_length() {
            length.min(self.max_value_length as u64)
        } else {
            length
        }
    }

    /// Truncates to the configured limit.
    pub fn truncate(&self, value: &str) -> String {
        truncate(value, self.max_value_length)
    }
}

/// Keeps the first `max_chars` characters of `value`.
pub fn truncate(value: &str, max_chars: usize) -> String {
    match value.char_indices().nth(max_chars) {
        Some((idx, _)) => value[..idx].to_string(),
        None => value.to_string(),
    }
}

/// Distinct rendered texts of the non-null values of a scanned column.
///
/// Values are kept untruncated so ordering, distinctness and lengths reflect
/// the full rendering; truncation happens in [`summarize`](Self::summarize).
#[derive(Debug, Default)]
pub struct RenderedValues {
    distinct: HashSet<String>,
}

/// Statistics derived from a [`RenderedValues`] scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedSummary {
    pub distinct_count: u64,
    pub min_value: Option<String>,
    pub max_value: Option<String>,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub sample_value: Option<String>,
}

impl RenderedValues {
    /// Renders every non-null cell of `array` and records it.
    pub fn observe(&mut self, array: &dyn Array) -> Result<()> {
        let options = FormatOptions::default();
        let formatter = ArrayFormatter::try_new(array, &options)?;
        for row in 0..array.len() {
            if array.is_valid(row) {
                self.distinct.insert(formatter.value(row).to_string());
            }
        }
        Ok(())
    }

    pub fn distinct_count(&self) -> u64 {
        self.distinct.len() as u64
    }

    /// Folds the scanned values into bounded statistics.
    ///
    /// The sample is the value with the smallest SHA-256 digest, so repeated
    /// scans pick the same value without favouring either end of the range.
    pub fn summarize(&self, normalizer: &ValueNormalizer) -> RenderedSummary {
        let lengths = self.distinct.iter().map(|v| normalizer.rendered_length(v));

        RenderedSummary {
            distinct_count: self.distinct_count(),
            min_value: self.distinct.iter().min().map(|v| normalizer.truncate(v)),
            max_value: self.distinct.iter().max().map(|v| normalizer.truncate(v)),
            min_length: lengths.clone().min(),
            max_length: lengths.max(),
            sample_value: self
                .distinct
                .iter()
                .min_by_key(|v| Sha256::digest(v.as_bytes()).to_vec())
                .map(|v| normalizer.truncate(v)),
        }
    }
}

fn binary_value(array: &dyn Array, row: usize) -> Option<&[u8]> {
    if let Some(arr) = array.as_binary_opt::<i32>() {
        Some(arr.value(row))
    } else if let Some(arr) = array.as_binary_opt::<i64>() {
        Some(arr.value(row))
    } else if let Some(arr) = array.as_binary_view_opt() {
        Some(arr.value(row))
    } else {
        array.as_fixed_size_binary_opt().map(|arr| arr.value(row))
    }
}

fn display_value(array: &dyn Array, row: usize) -> Result<String> {
    let options = FormatOptions::default();
    let formatter = ArrayFormatter::try_new(array, &options)?;
    Ok(formatter.value(row).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{
        ArrayRef, BinaryArray, BooleanArray, Date32Array, Decimal128Array, Int32Array, Int64Array,
        ListArray, StringArray, StructArray,
    };
    use arrow::datatypes::{Field, Int32Type, TimeUnit};
    use std::sync::Arc;

    #[test]
    fn test_type_categories() {
        assert_eq!(TypeCategory::of(&DataType::Utf8), TypeCategory::Text);
        assert_eq!(TypeCategory::of(&DataType::Utf8View), TypeCategory::Text);
        assert_eq!(TypeCategory::of(&DataType::Int32), TypeCategory::Numeric);
        assert_eq!(TypeCategory::of(&DataType::UInt8), TypeCategory::Numeric);
        assert_eq!(
            TypeCategory::of(&DataType::Decimal128(10, 2)),
            TypeCategory::Numeric
        );
        assert_eq!(TypeCategory::of(&DataType::Float64), TypeCategory::Numeric);
        assert_eq!(TypeCategory::of(&DataType::Date32), TypeCategory::Temporal);
        assert_eq!(
            TypeCategory::of(&DataType::Timestamp(TimeUnit::Microsecond, None)),
            TypeCategory::Temporal
        );
        assert_eq!(TypeCategory::of(&DataType::Boolean), TypeCategory::Boolean);
        assert_eq!(
            TypeCategory::of(&DataType::FixedSizeBinary(16)),
            TypeCategory::Binary
        );
        assert_eq!(
            TypeCategory::of(&DataType::Dictionary(
                Box::new(DataType::Int32),
                Box::new(DataType::Utf8)
            )),
            TypeCategory::Text
        );
        assert_eq!(
            TypeCategory::of(&DataType::List(Arc::new(Field::new(
                "item",
                DataType::Int64,
                true
            )))),
            TypeCategory::Other
        );
        assert_eq!(TypeCategory::of(&DataType::Null), TypeCategory::Other);
    }

    #[test]
    fn test_rules_use_native_ordering() {
        let normalizer = ValueNormalizer::default();

        let rule = normalizer.rule_for(&DataType::Decimal128(5, 1)).unwrap();
        assert_eq!(rule.ordering, OrderingBasis::Native);
        assert_eq!(rule.length, LengthMeasure::CastCharacters);

        let rule = normalizer.rule_for(&DataType::Utf8).unwrap();
        assert_eq!(rule.length, LengthMeasure::Characters);

        let rule = normalizer.rule_for(&DataType::Binary).unwrap();
        assert_eq!(rule.length, LengthMeasure::Bytes);
        assert!(!rule.caps_length());
    }

    #[test]
    fn test_unsupported_type_falls_back() {
        let normalizer = ValueNormalizer::default();
        let list = DataType::List(Arc::new(Field::new("item", DataType::Int64, true)));

        assert!(matches!(
            normalizer.rule_for(&list),
            Err(ProfileError::UnsupportedType { .. })
        ));

        let (rule, diagnostic) = normalizer.resolve(&list);
        assert_eq!(rule, RenderRule::FALLBACK);
        assert!(rule.scans_values());
        assert!(matches!(
            diagnostic,
            Some(Diagnostic::RenderingFallback { .. })
        ));

        let (_, diagnostic) = normalizer.resolve(&DataType::Int64);
        assert!(diagnostic.is_none());
    }

    #[test]
    fn test_render_scalars() {
        let normalizer = ValueNormalizer::default();
        let numeric = normalizer.rule_for(&DataType::Int64).unwrap();

        let ints = Int64Array::from(vec![Some(42), None]);
        assert_eq!(
            normalizer.render(&ints, 0, &numeric).unwrap(),
            Some("42".to_string())
        );
        assert_eq!(normalizer.render(&ints, 1, &numeric).unwrap(), None);

        let decimals = Decimal128Array::from(vec![105, 200])
            .with_precision_and_scale(5, 1)
            .unwrap();
        assert_eq!(
            normalizer.render(&decimals, 0, &numeric).unwrap(),
            Some("10.5".to_string())
        );
        assert_eq!(
            normalizer.render(&decimals, 1, &numeric).unwrap(),
            Some("20.0".to_string())
        );

        let temporal = normalizer.rule_for(&DataType::Date32).unwrap();
        let dates = Date32Array::from(vec![19723]);
        assert_eq!(
            normalizer.render(&dates, 0, &temporal).unwrap(),
            Some("2024-01-01".to_string())
        );

        let boolean = normalizer.rule_for(&DataType::Boolean).unwrap();
        let flags = BooleanArray::from(vec![true]);
        assert_eq!(
            normalizer.render(&flags, 0, &boolean).unwrap(),
            Some("true".to_string())
        );
    }

    #[test]
    fn test_render_binary_as_hex() {
        let normalizer = ValueNormalizer::new(6);
        let rule = normalizer.rule_for(&DataType::Binary).unwrap();
        let blobs = BinaryArray::from(vec![&[0xde_u8, 0xad, 0xbe, 0xef][..]]);

        assert_eq!(
            normalizer.render(&blobs, 0, &rule).unwrap(),
            Some("deadbe".to_string())
        );
        assert_eq!(normalizer.bound_length(4, &rule), 4);

        let odd = ValueNormalizer::new(3);
        assert_eq!(odd.render(&blobs, 0, &rule).unwrap(), Some("de".to_string()));
        assert_eq!(
            ValueNormalizer::new(1).render(&blobs, 0, &rule).unwrap(),
            Some(String::new())
        );
    }

    #[test]
    fn test_rendered_values_summary() {
        let lists = ListArray::from_iter_primitive::<Int32Type, _, _>(vec![
            Some(vec![Some(1), Some(2)]),
            None,
            Some(vec![Some(3)]),
            Some(vec![Some(1), Some(2)]),
            Some(vec![Some(10), Some(20), Some(30)]),
        ]);

        let mut values = RenderedValues::default();
        values.observe(&lists).unwrap();
        let summary = values.summarize(&ValueNormalizer::new(8));

        assert_eq!(summary.distinct_count, 3);
        assert_eq!(summary.min_value.as_deref(), Some("[1, 2]"));
        assert_eq!(summary.max_value.as_deref(), Some("[3]"));
        assert_eq!(summary.min_length, Some(3));
        assert_eq!(summary.max_length, Some(8));
        let sample = summary.sample_value.unwrap();
        assert!(["[1, 2]", "[3]", "[10, 20,"].contains(&sample.as_str()));

        let again = {
            let mut values = RenderedValues::default();
            values.observe(&lists).unwrap();
            values.summarize(&ValueNormalizer::new(8))
        };
        assert_eq!(again.sample_value.as_deref(), Some(sample.as_str()));
    }

    #[test]
    fn test_rendered_values_of_structs() {
        let x: ArrayRef = Arc::new(Int32Array::from(vec![Some(1), Some(2), Some(1)]));
        let structs = StructArray::from(vec![(
            Arc::new(Field::new("x", DataType::Int32, true)),
            x,
        )]);

        let mut values = RenderedValues::default();
        values.observe(&structs).unwrap();
        let summary = values.summarize(&ValueNormalizer::default());

        assert_eq!(summary.distinct_count, 2);
        assert_eq!(summary.min_value.as_deref(), Some("{x: 1}"));
        assert_eq!(summary.max_value.as_deref(), Some("{x: 2}"));
    }

    #[test]
    fn test_empty_scan_summary() {
        let summary = RenderedValues::default().summarize(&ValueNormalizer::default());
        assert_eq!(summary, RenderedSummary::default());
    }

    #[test]
    fn test_render_fallback_list() {
        let normalizer = ValueNormalizer::default();
        let lists = ListArray::from_iter_primitive::<Int32Type, _, _>(vec![Some(vec![
            Some(1),
            Some(2),
        ])]);

        let rendered = normalizer
            .render(&lists, 0, &RenderRule::FALLBACK)
            .unwrap()
            .unwrap();
        assert_eq!(rendered, "[1, 2]");
    }

    #[test]
    fn test_render_out_of_bounds() {
        let normalizer = ValueNormalizer::default();
        let rule = normalizer.rule_for(&DataType::Utf8).unwrap();
        let strings = StringArray::from(vec!["a"]);
        assert!(normalizer.render(&strings, 3, &rule).is_err());
    }

    #[test]
    fn test_truncate_on_char_boundary() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello", 5), "hello");
        assert_eq!(truncate("hello", 3), "hel");
        assert_eq!(truncate("héllo wörld", 7), "héllo w");
        assert_eq!(truncate("日本語テキスト", 3), "日本語");
        assert_eq!(truncate("", 3), "");
    }

    #[test]
    fn test_render_truncates_text() {
        let normalizer = ValueNormalizer::new(4);
        let rule = normalizer.rule_for(&DataType::Utf8).unwrap();
        let strings = StringArray::from(vec!["ñandú salvaje"]);

        let rendered = normalizer.render(&strings, 0, &rule).unwrap().unwrap();
        assert_eq!(rendered, "ñand");
        assert_eq!(normalizer.rendered_length(&rendered), 4);
        assert_eq!(normalizer.rendered_length("ñandú salvaje"), 4);
        assert_eq!(normalizer.bound_length(13, &rule), 4);
    }
}

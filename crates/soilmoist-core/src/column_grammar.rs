use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// A known break in the underscore grammar: a unit token that itself contains
/// the separator. When a column's measure is `measure` and its fifth field is
/// `unit_head`, the trailing fields belong to the unit and the quantity column is
/// named `measure_units`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrammarException {
    pub measure: String,
    pub unit_head: String,
    pub measure_units: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnGrammar {
    pub separator: char,
    pub field_count: usize,
    pub identifier_columns: Vec<String>,
    pub exceptions: Vec<GrammarException>,
}

impl Default for ColumnGrammar {
    fn default() -> Self {
        Self {
            separator: '_',
            field_count: 5,
            identifier_columns: vec!["timestamp".to_string(), "source_file".to_string()],
            exceptions: vec![GrammarException {
                measure: "t".to_string(),
                unit_head: "(deg".to_string(),
                measure_units: "t_(deg_c)".to_string(),
            }],
        }
    }
}

/// Facets encoded in a measurement column name:
/// `<measure>_<treatment>_<depth>_<stat>_<units>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnName {
    pub column: String,
    pub measure: String,
    pub treatment: String,
    pub depth: String,
    pub stat: String,
    pub units: String,
    pub measure_units: String,
}

impl ColumnGrammar {
    /// Fields in a measurement column name, one per facet of [`ColumnName`].
    pub const FIELD_COUNT: usize = 5;

    pub fn is_identifier(&self, column: &str) -> bool {
        self.identifier_columns.iter().any(|id| id == column)
    }

    pub fn parse(&self, column: &str) -> Result<ColumnName> {
        let fields: Vec<&str> = column.split(self.separator).collect();
        let violation = || PipelineError::GrammarViolation {
            column: column.to_string(),
            expected: self.field_count,
            found: fields.len(),
        };

        if self.field_count != Self::FIELD_COUNT
            || fields.len() < self.field_count
            || fields.iter().any(|field| field.is_empty())
        {
            return Err(violation());
        }

        let unit_idx = self.field_count - 1;
        let measure = fields[0];
        let unit_head = fields[unit_idx];

        let exception = self.exceptions.iter().find(|exception| {
            measure.eq_ignore_ascii_case(&exception.measure)
                && unit_head.eq_ignore_ascii_case(&exception.unit_head)
        });

        // an exception unit spans at most one extra separator
        let (units, measure_units) = match (fields.len() - self.field_count, exception) {
            (0 | 1, Some(exception)) => (
                fields[unit_idx..].join(&self.separator.to_string()),
                exception.measure_units.clone(),
            ),
            (0, None) => (
                unit_head.to_string(),
                format!("{measure}{}{unit_head}", self.separator),
            ),
            _ => return Err(violation()),
        };

        Ok(ColumnName {
            column: column.to_string(),
            measure: measure.to_string(),
            treatment: fields[1].to_string(),
            depth: fields[2].to_string(),
            stat: fields[3].to_string(),
            units,
            measure_units,
        })
    }

    /// Decomposes every measurement column of a normalized table.
    pub fn describe_columns(&self, df: &DataFrame) -> Result<Vec<ColumnName>> {
        df.get_columns()
            .iter()
            .map(|column| column.name().as_str())
            .filter(|name| !self.is_identifier(name))
            .map(|name| self.parse(name))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::PolarsResult;

    #[test]
    fn parses_five_field_column() {
        let parsed = ColumnGrammar::default()
            .parse("vwc_ctrl_5cm_avg_(m^3/m^3)")
            .unwrap();
        assert_eq!(parsed.measure, "vwc");
        assert_eq!(parsed.treatment, "ctrl");
        assert_eq!(parsed.depth, "5cm");
        assert_eq!(parsed.stat, "avg");
        assert_eq!(parsed.units, "(m^3/m^3)");
        assert_eq!(parsed.measure_units, "vwc_(m^3/m^3)");
    }

    #[test]
    fn temperature_unit_with_separator_uses_exception() {
        let parsed = ColumnGrammar::default()
            .parse("t_ctrl_5cm_avg_(Deg_C)")
            .unwrap();
        assert_eq!(parsed.units, "(Deg_C)");
        assert_eq!(parsed.measure_units, "t_(deg_c)");
    }

    #[test]
    fn three_field_column_is_a_violation() {
        let err = ColumnGrammar::default().parse("foo_bar_baz").unwrap_err();
        assert!(matches!(
            err,
            PipelineError::GrammarViolation {
                expected: 5,
                found: 3,
                ..
            }
        ));
    }

    #[test]
    fn extra_fields_without_exception_are_a_violation() {
        let err = ColumnGrammar::default()
            .parse("ptemp_c_avg_panel_(deg_c)")
            .unwrap_err();
        assert!(matches!(err, PipelineError::GrammarViolation { found: 6, .. }));
    }

    #[test]
    fn exception_does_not_absorb_trailing_fields() {
        let grammar = ColumnGrammar::default();
        let err = grammar.parse("t_ctrl_5cm_avg_(deg_c)_junk_more").unwrap_err();
        assert!(matches!(err, PipelineError::GrammarViolation { found: 8, .. }));

        // the split "(deg" head alone is not a valid five-field unit
        let parsed = grammar.parse("t_ctrl_5cm_avg_(deg").unwrap();
        assert_eq!(parsed.measure_units, "t_(deg_c)");
    }

    #[test]
    fn mismatched_field_count_is_a_violation_not_a_panic() {
        let grammar = ColumnGrammar {
            field_count: 3,
            ..ColumnGrammar::default()
        };
        let err = grammar.parse("vwc_ctrl_(m^3/m^3)").unwrap_err();
        assert!(matches!(err, PipelineError::GrammarViolation { .. }));
    }

    #[test]
    fn describes_measurement_columns_only() -> PolarsResult<()> {
        let df = polars::df!(
            "timestamp" => [0i64],
            "vwc_ctrl_5cm_avg_(m^3/m^3)" => ["0.2"],
            "source_file" => ["a.dat"]
        )?;
        let columns = ColumnGrammar::default().describe_columns(&df).unwrap();
        assert_eq!(columns.len(), 1);
        assert_eq!(columns[0].measure_units, "vwc_(m^3/m^3)");
        Ok(())
    }

    #[test]
    fn empty_field_is_a_violation() {
        let err = ColumnGrammar::default()
            .parse("vwc__5cm_avg_(m^3/m^3)")
            .unwrap_err();
        assert!(matches!(err, PipelineError::GrammarViolation { .. }));
    }
}

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;

/// Lower bound a quantity column must respect for a reading to be physically
/// plausible. Readings at or below the bound of an exclusive rule come from a
/// sensor that was powered but not yet in the soil.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidityRule {
    pub column: String,
    pub min: f64,
    #[serde(default)]
    pub inclusive: bool,
}

impl ValidityRule {
    pub fn greater_than(column: impl Into<String>, min: f64) -> Self {
        Self {
            column: column.into(),
            min,
            inclusive: false,
        }
    }

    pub fn at_least(column: impl Into<String>, min: f64) -> Self {
        Self {
            column: column.into(),
            min,
            inclusive: true,
        }
    }

    pub fn accepts(&self, value: f64) -> bool {
        if self.inclusive {
            value >= self.min
        } else {
            value > self.min
        }
    }
}

/// Drops rows that break any rule whose column is present, then every row that
/// still holds a null.
pub fn apply_validity_filters(df: &DataFrame, rules: &[ValidityRule]) -> Result<DataFrame> {
    let mut keep = vec![true; df.height()];

    for rule in rules {
        let Ok(column) = df.column(&rule.column) else {
            continue;
        };
        let values = column.f64()?;
        let mut rejected = 0usize;
        for (idx, flag) in keep.iter_mut().enumerate() {
            if let Some(value) = values.get(idx) {
                if !rule.accepts(value) {
                    if *flag {
                        rejected += 1;
                    }
                    *flag = false;
                }
            }
        }
        if rejected > 0 {
            warn!(
                column = %rule.column,
                rejected,
                "Dropped physically implausible readings"
            );
        }
    }

    let mut incomplete = 0usize;
    for column in df.get_columns() {
        if column.null_count() == 0 {
            continue;
        }
        let nulls = column.as_materialized_series().is_null();
        for (idx, flag) in keep.iter_mut().enumerate() {
            if *flag && nulls.get(idx).unwrap_or(false) {
                incomplete += 1;
                *flag = false;
            }
        }
    }
    if incomplete > 0 {
        warn!(incomplete, "Dropped rows with missing values");
    }

    Ok(df.filter(&BooleanChunked::from_slice("keep".into(), &keep))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_positive_vwc_and_negative_ec() -> PolarsResult<()> {
        let df = df!(
            "vwc_(m^3/m^3)" => [Some(0.2), Some(0.0), Some(-0.1), Some(0.3), Some(0.25), None],
            "ec_(ds/m)" => [Some(0.0), Some(0.1), Some(0.1), Some(-0.01), Some(0.2), Some(0.1)]
        )?;
        let rules = [
            ValidityRule::greater_than("vwc_(m^3/m^3)", 0.0),
            ValidityRule::at_least("ec_(ds/m)", 0.0),
        ];

        let filtered = apply_validity_filters(&df, &rules).unwrap();
        let vwc = filtered.column("vwc_(m^3/m^3)")?.f64()?;
        assert_eq!(filtered.height(), 2);
        assert_eq!(vwc.get(0), Some(0.2));
        assert_eq!(vwc.get(1), Some(0.25));
        Ok(())
    }

    #[test]
    fn absent_rule_columns_are_ignored() -> PolarsResult<()> {
        let df = df!("t_(deg_c)" => [Some(-3.0), Some(12.0)])?;
        let rules = [ValidityRule::greater_than("vwc_(m^3/m^3)", 0.0)];
        let filtered = apply_validity_filters(&df, &rules).unwrap();
        assert_eq!(filtered.height(), 2);
        Ok(())
    }
}

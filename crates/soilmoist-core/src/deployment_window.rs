use chrono::NaiveDateTime;
use polars::prelude::*;
use tracing::warn;

use crate::error::Result;
use crate::validation::TIMESTAMP_COLUMN;

/// Period during which a site's sensors were physically in the ground. Both
/// bounds are inclusive; without a `start`, only the upper edge is enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeploymentWindow {
    pub start: Option<NaiveDateTime>,
    pub end: NaiveDateTime,
}

impl DeploymentWindow {
    pub fn contains_micros(&self, micros: i64) -> bool {
        let after_start = self
            .start
            .map(|start| micros >= start.and_utc().timestamp_micros())
            .unwrap_or(true);
        after_start && micros <= self.end.and_utc().timestamp_micros()
    }
}

pub fn apply_deployment_window(df: &DataFrame, window: &DeploymentWindow) -> Result<DataFrame> {
    let timestamps = df.column(TIMESTAMP_COLUMN)?.datetime()?;

    let keep: Vec<bool> = (0..df.height())
        .map(|idx| {
            timestamps
                .get(idx)
                .is_some_and(|micros| window.contains_micros(micros))
        })
        .collect();

    let filtered = df.filter(&BooleanChunked::from_slice("keep".into(), &keep))?;
    let dropped = df.height() - filtered.height();
    if dropped > 0 {
        warn!(
            dropped,
            end = %window.end,
            "Dropped readings outside the deployment window"
        );
    }
    Ok(filtered)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn micros(value: &str) -> i64 {
        NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
            .unwrap()
            .and_utc()
            .timestamp_micros()
    }

    fn frame(values: &[&str]) -> DataFrame {
        let ts = Series::new(
            TIMESTAMP_COLUMN.into(),
            values.iter().map(|v| micros(v)).collect::<Vec<_>>(),
        )
        .cast(&DataType::Datetime(TimeUnit::Microseconds, None))
        .unwrap();
        DataFrame::new(vec![ts.into()]).unwrap()
    }

    #[test]
    fn end_of_window_is_inclusive() {
        let window = DeploymentWindow {
            start: None,
            end: NaiveDateTime::parse_from_str("2024-10-11 23:59:59", "%Y-%m-%d %H:%M:%S")
                .unwrap(),
        };
        let df = frame(&[
            "2023-01-01 00:00:00",
            "2024-10-11 23:59:59",
            "2024-10-12 00:00:00",
        ]);
        let filtered = apply_deployment_window(&df, &window).unwrap();
        assert_eq!(filtered.height(), 2);
    }

    #[test]
    fn optional_start_bounds_the_window() {
        let window = DeploymentWindow {
            start: Some(
                NaiveDateTime::parse_from_str("2024-05-01 00:00:00", "%Y-%m-%d %H:%M:%S")
                    .unwrap(),
            ),
            end: NaiveDateTime::parse_from_str("2024-10-11 23:59:59", "%Y-%m-%d %H:%M:%S")
                .unwrap(),
        };
        let df = frame(&["2024-04-30 23:00:00", "2024-05-01 00:00:00"]);
        let filtered = apply_deployment_window(&df, &window).unwrap();
        assert_eq!(filtered.height(), 1);
    }
}

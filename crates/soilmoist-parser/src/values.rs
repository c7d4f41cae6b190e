use chrono::NaiveDateTime;

pub const DEFAULT_TIMESTAMP_FORMATS: &[&str] =
    &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"];

pub const DEFAULT_MISSING_TOKENS: &[&str] = &["", "NAN", "NA"];

/// True when a raw cell is absent or spells one of the missing-value tokens.
pub fn is_missing<S: AsRef<str>>(value: Option<&str>, tokens: &[S]) -> bool {
    match value {
        None => true,
        Some(raw) => {
            let trimmed = raw.trim();
            tokens
                .iter()
                .any(|token| trimmed.eq_ignore_ascii_case(token.as_ref().trim()))
        }
    }
}

pub fn parse_timestamp<S: AsRef<str>>(value: &str, formats: &[S]) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    formats
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt.as_ref()).ok())
}

/// Numeric coercion for measurement cells. Anything that does not parse as a
/// finite float becomes `None`.
pub fn parse_optional_f64(value: Option<&str>) -> Option<f64> {
    let trimmed = value?.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|parsed| parsed.is_finite())
}

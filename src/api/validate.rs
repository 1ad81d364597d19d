//! Checks applied before a request leaves the client.

use crate::api::types::ProcessingOptions;
use crate::error::ClientError;

pub const CSV_ONLY: &str = "Only CSV files are accepted";
pub const NOT_NUMERIC: &str = "Input values must be numeric.";
pub const SPLIT_TOO_LARGE: &str = "The sum of Training and Validation data ratios cannot exceed 100%.";
pub const KEEP_TWO_COLUMNS: &str =
    "At least one feature and one label column are necessary for the model to work.";

pub fn csv_file_name(name: &str) -> Result<(), ClientError> {
    if name.ends_with(".csv") {
        Ok(())
    } else {
        Err(ClientError::Validation(CSV_ONLY.into()))
    }
}

/// Validates training and validation fractions (0.6 means 60%).
pub fn split_ratios(train: f64, validation: f64) -> Result<(), ClientError> {
    if !train.is_finite() || !validation.is_finite() {
        return Err(ClientError::Validation(NOT_NUMERIC.into()));
    }
    if train + validation > 1.0 {
        return Err(ClientError::Validation(SPLIT_TOO_LARGE.into()));
    }
    Ok(())
}

/// Parses the percentage fields of the split form into fractions.
pub fn split_percentages(train: &str, validation: &str) -> Result<(f64, f64), ClientError> {
    let parse = |s: &str| {
        s.trim()
            .parse::<f64>()
            .map(|pct| pct / 100.0)
            .map_err(|_| ClientError::Validation(NOT_NUMERIC.into()))
    };
    let (train, validation) = (parse(train)?, parse(validation)?);
    split_ratios(train, validation)?;
    Ok((train, validation))
}

/// At least two columns (one feature, one label) must survive the drop.
pub fn drop_selection(available: usize, selected: usize) -> Result<(), ClientError> {
    if selected >= available || available - selected < 2 {
        return Err(ClientError::Validation(KEEP_TWO_COLUMNS.into()));
    }
    Ok(())
}

/// Returns false when nothing is selected; the caller skips the step.
pub fn processing_requested(options: &ProcessingOptions) -> bool {
    options.any_selected()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_csv_names_pass() {
        assert!(csv_file_name("iris.csv").is_ok());
        let err = csv_file_name("iris.xlsx").unwrap_err();
        assert_eq!(err.to_string(), CSV_ONLY);
    }

    #[test]
    fn split_sum_boundary() {
        assert!(split_ratios(0.6, 0.4).is_ok());
        assert_eq!(split_ratios(0.6, 0.5).unwrap_err().to_string(), SPLIT_TOO_LARGE);
        assert_eq!(split_ratios(f64::NAN, 0.2).unwrap_err().to_string(), NOT_NUMERIC);
    }

    #[test]
    fn split_form_values_are_percentages() {
        assert_eq!(split_percentages("60", " 20 ").unwrap(), (0.6, 0.2));
        assert!(split_percentages("sixty", "20").is_err());
        assert!(split_percentages("70", "40").is_err());
    }

    #[test]
    fn drop_keeps_two_columns() {
        assert!(drop_selection(5, 3).is_ok());
        assert!(drop_selection(5, 4).is_err());
        assert!(drop_selection(3, 3).is_err());
        assert!(drop_selection(1, 0).is_err());
    }
}

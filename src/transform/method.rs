//! Reductions applied to the values of an aggregation bucket.

use std::fmt;
use std::str::FromStr;

use crate::error::ConfigurationError;
use crate::timeseries::IntervalType;

/// Reduction applied to the present values of an aggregation bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Sum,
    Mean,
    Max,
    Min,
}

impl Method {
    /// Reduces `values`. Returns `None` for empty input.
    pub fn apply(&self, values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        let reduced = match self {
            Method::Sum => values.iter().sum::<f64>(),
            Method::Mean => values.iter().sum::<f64>() / values.len() as f64,
            Method::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Method::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
        };
        Some(reduced)
    }

    /// The interval type of a series produced by this reduction.
    pub fn interval_type(&self) -> IntervalType {
        match self {
            Method::Sum => IntervalType::Sum,
            Method::Mean => IntervalType::Average,
            Method::Max => IntervalType::Maximum,
            Method::Min => IntervalType::Minimum,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Sum => "sum",
            Method::Mean => "mean",
            Method::Max => "max",
            Method::Min => "min",
        }
    }
}

impl FromStr for Method {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sum" => Ok(Method::Sum),
            "mean" => Ok(Method::Mean),
            "max" => Ok(Method::Max),
            "min" => Ok(Method::Min),
            _ => Err(ConfigurationError::UnknownMethod(s.to_string())),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reductions() {
        let values = [1.5, -2.0, 4.5];
        assert_eq!(Method::Sum.apply(&values), Some(4.0));
        assert_eq!(Method::Max.apply(&values), Some(4.5));
        assert_eq!(Method::Min.apply(&values), Some(-2.0));
        let avg = Method::Mean.apply(&values).unwrap();
        assert!((avg - 4.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_reduces_to_none() {
        for method in [Method::Sum, Method::Mean, Method::Max, Method::Min] {
            assert_eq!(method.apply(&[]), None);
        }
    }

    #[test]
    fn test_parse_method_names() {
        assert_eq!("sum".parse::<Method>().unwrap(), Method::Sum);
        assert_eq!("mean".parse::<Method>().unwrap(), Method::Mean);
        assert_eq!("max".parse::<Method>().unwrap(), Method::Max);
        assert_eq!("min".parse::<Method>().unwrap(), Method::Min);
        assert_eq!(
            "median".parse::<Method>(),
            Err(ConfigurationError::UnknownMethod("median".into()))
        );
    }

    #[test]
    fn test_interval_type_of_result() {
        assert_eq!(Method::Mean.interval_type(), IntervalType::Average);
        assert_eq!(Method::Sum.interval_type(), IntervalType::Sum);
    }
}

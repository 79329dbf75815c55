use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProjectionError {
    #[error("invalid horizon: {reason} (current {current_age}, retirement {retirement_age}, life expectancy {life_expectancy})")]
    InvalidHorizon {
        current_age: u32,
        retirement_age: u32,
        life_expectancy: u32,
        reason: &'static str,
    },
    #[error("invalid {name}: {reason}")]
    InvalidInput { name: &'static str, reason: String },
    #[error("{name} is not a finite number")]
    NonFinite { name: &'static str },
}

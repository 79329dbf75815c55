use serde::Serialize;

use super::ProjectionError;

/// Scenario inputs. Rates are fractions, e.g. 0.06 for 6%.
#[derive(Debug, Clone, PartialEq)]
pub struct Inputs {
    pub current_age: u32,
    pub retirement_age: u32,
    pub life_expectancy: u32,
    pub monthly_expense: f64,
    pub inflation_rate: f64,
    pub pre_retirement_return: f64,
    pub post_retirement_return: f64,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Horizon {
    pub years_to_retirement: u32,
    pub years_post_retirement: u32,
}

impl Inputs {
    /// Checks the age ordering and value domains and returns the two horizon lengths.
    pub fn horizon(&self) -> Result<Horizon, ProjectionError> {
        let horizon_error = |reason| ProjectionError::InvalidHorizon {
            current_age: self.current_age,
            retirement_age: self.retirement_age,
            life_expectancy: self.life_expectancy,
            reason,
        };
        if self.retirement_age <= self.current_age {
            return Err(horizon_error("retirement age must be after current age"));
        }
        if self.life_expectancy <= self.retirement_age {
            return Err(horizon_error("life expectancy must be after retirement age"));
        }

        if !self.monthly_expense.is_finite() {
            return Err(ProjectionError::NonFinite {
                name: "monthly_expense",
            });
        }
        if self.monthly_expense <= 0.0 {
            return Err(ProjectionError::InvalidInput {
                name: "monthly_expense",
                reason: format!("must be > 0, got {}", self.monthly_expense),
            });
        }

        for (name, rate) in [
            ("inflation_rate", self.inflation_rate),
            ("pre_retirement_return", self.pre_retirement_return),
            ("post_retirement_return", self.post_retirement_return),
        ] {
            if !rate.is_finite() {
                return Err(ProjectionError::NonFinite { name });
            }
            if rate < 0.0 {
                return Err(ProjectionError::InvalidInput {
                    name,
                    reason: format!("must be >= 0, got {rate}"),
                });
            }
        }

        Ok(Horizon {
            years_to_retirement: self.retirement_age - self.current_age,
            years_post_retirement: self.life_expectancy - self.retirement_age,
        })
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FutureExpense {
    pub monthly: f64,
    pub annual: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Accumulation {
    /// Balance at the end of each working year.
    pub balances: Vec<f64>,
    /// `None` when there are no working years to spread contributions over.
    pub yearly_investment: Option<f64>,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgePoint {
    pub age: u32,
    pub balance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanResult {
    pub years_to_retirement: u32,
    pub years_post_retirement: u32,
    pub future_monthly_expense: f64,
    pub future_annual_expense: f64,
    pub required_corpus: f64,
    pub yearly_investment: f64,
    pub accumulation: Vec<AgePoint>,
    pub drawdown: Vec<AgePoint>,
    pub depletion_age: Option<u32>,
}

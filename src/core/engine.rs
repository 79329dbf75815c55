use super::types::{Accumulation, AgePoint, FutureExpense, Inputs, PlanResult};
use super::ProjectionError;

/// Rates closer to zero than this use the zero-growth limit of the annuity formulas.
const ZERO_RATE_EPS: f64 = 1e-9;
/// Drawdown balances within this fraction of the corpus count as exactly spent.
const DEPLETION_REL_TOL: f64 = 1e-9;

pub fn compute_future_expense(
    monthly_expense: f64,
    inflation_rate: f64,
    years_to_retirement: u32,
) -> FutureExpense {
    let monthly = monthly_expense * (1.0 + inflation_rate).powi(years_to_retirement as i32);
    FutureExpense {
        monthly,
        annual: monthly * 12.0,
    }
}

/// Present value of an ordinary annuity paying `future_annual_expense` for
/// `years_post_retirement` years, discounted at `post_retirement_return`.
pub fn compute_required_corpus(
    future_annual_expense: f64,
    post_retirement_return: f64,
    years_post_retirement: u32,
) -> f64 {
    let years = years_post_retirement as f64;
    if post_retirement_return.abs() < ZERO_RATE_EPS {
        return future_annual_expense * years;
    }

    let r = post_retirement_return;
    future_annual_expense * (1.0 - (1.0 + r).powf(-years)) / r
}

/// Constant yearly contribution that compounds to `corpus_needed`, together
/// with the end-of-year balances along the way.
pub fn accumulate_corpus_annual(
    corpus_needed: f64,
    pre_retirement_return: f64,
    years_to_retirement: u32,
) -> Accumulation {
    if years_to_retirement == 0 {
        return Accumulation {
            balances: Vec::new(),
            yearly_investment: None,
        };
    }

    let years = years_to_retirement as f64;
    let annuity_factor = if pre_retirement_return.abs() < ZERO_RATE_EPS {
        years
    } else {
        let p = pre_retirement_return;
        ((1.0 + p).powf(years) - 1.0) / p
    };
    let yearly_investment = corpus_needed / annuity_factor;

    Accumulation {
        balances: AccumulationBalances::new(
            yearly_investment,
            pre_retirement_return,
            years_to_retirement,
        )
        .collect(),
        yearly_investment: Some(yearly_investment),
    }
}

/// Balance path from retirement onwards. Negative values mean the corpus ran
/// out and are kept as-is.
pub fn compute_drawdown(
    required_corpus: f64,
    future_annual_expense: f64,
    post_retirement_return: f64,
    years_post_retirement: u32,
) -> Vec<f64> {
    DrawdownBalances::new(
        required_corpus,
        future_annual_expense,
        post_retirement_return,
        years_post_retirement,
    )
    .collect()
}

pub fn run_plan(inputs: &Inputs) -> Result<PlanResult, ProjectionError> {
    let horizon = inputs.horizon()?;

    let expense = compute_future_expense(
        inputs.monthly_expense,
        inputs.inflation_rate,
        horizon.years_to_retirement,
    );
    log::debug!(
        "future expense after {} years: monthly {:.2}, annual {:.2}",
        horizon.years_to_retirement,
        expense.monthly,
        expense.annual
    );

    let required_corpus = compute_required_corpus(
        expense.annual,
        inputs.post_retirement_return,
        horizon.years_post_retirement,
    );
    ensure_finite("required_corpus", required_corpus)?;
    log::debug!(
        "required corpus {:.2} for {} retired years",
        required_corpus,
        horizon.years_post_retirement
    );

    let accumulation = accumulate_corpus_annual(
        required_corpus,
        inputs.pre_retirement_return,
        horizon.years_to_retirement,
    );
    let yearly_investment = accumulation
        .yearly_investment
        .ok_or_else(|| ProjectionError::InvalidInput {
            name: "years_to_retirement",
            reason: "must be >= 1".to_string(),
        })?;
    ensure_finite("yearly_investment", yearly_investment)?;
    log::debug!("yearly investment {yearly_investment:.2}");

    let drawdown = compute_drawdown(
        required_corpus,
        expense.annual,
        inputs.post_retirement_return,
        horizon.years_post_retirement,
    );

    let accumulation = label_ages(inputs.current_age + 1, &accumulation.balances);
    let drawdown = label_ages(inputs.retirement_age, &drawdown);
    for point in accumulation.iter().chain(drawdown.iter()) {
        ensure_finite("balance", point.balance)?;
    }

    let tolerance = DEPLETION_REL_TOL * required_corpus.abs().max(1.0);
    let depletion_age = drawdown
        .iter()
        .find(|point| point.balance < -tolerance)
        .map(|point| point.age);
    if let Some(age) = depletion_age {
        log::info!("corpus depleted at age {age}");
    }

    Ok(PlanResult {
        years_to_retirement: horizon.years_to_retirement,
        years_post_retirement: horizon.years_post_retirement,
        future_monthly_expense: expense.monthly,
        future_annual_expense: expense.annual,
        required_corpus,
        yearly_investment,
        accumulation,
        drawdown,
        depletion_age,
    })
}

fn ensure_finite(name: &'static str, value: f64) -> Result<(), ProjectionError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ProjectionError::NonFinite { name })
    }
}

fn label_ages(first_age: u32, balances: &[f64]) -> Vec<AgePoint> {
    balances
        .iter()
        .zip(first_age..)
        .map(|(&balance, age)| AgePoint { age, balance })
        .collect()
}

/// End-of-year balances for a fixed contribution paid at the end of each year.
#[derive(Debug, Clone)]
pub struct AccumulationBalances {
    balance: f64,
    growth: f64,
    contribution: f64,
    remaining: u32,
}

impl AccumulationBalances {
    pub fn new(contribution: f64, rate: f64, years: u32) -> Self {
        Self {
            balance: 0.0,
            growth: 1.0 + rate,
            contribution,
            remaining: years,
        }
    }
}

impl Iterator for AccumulationBalances {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        self.balance = self.balance * self.growth + self.contribution;
        Some(self.balance)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.remaining as usize;
        (len, Some(len))
    }
}

impl ExactSizeIterator for AccumulationBalances {}

/// Starting balance followed by one balance per year of growth minus withdrawal.
#[derive(Debug, Clone)]
pub struct DrawdownBalances {
    balance: f64,
    growth: f64,
    withdrawal: f64,
    started: bool,
    remaining: u32,
}

impl DrawdownBalances {
    pub fn new(corpus: f64, withdrawal: f64, rate: f64, years: u32) -> Self {
        Self {
            balance: corpus,
            growth: 1.0 + rate,
            withdrawal,
            started: false,
            remaining: years,
        }
    }
}

impl Iterator for DrawdownBalances {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        if !self.started {
            self.started = true;
            return Some(self.balance);
        }
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        self.balance = self.balance * self.growth - self.withdrawal;
        Some(self.balance)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.remaining as usize + usize::from(!self.started);
        (len, Some(len))
    }
}

impl ExactSizeIterator for DrawdownBalances {}

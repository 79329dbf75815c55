mod engine;
mod error;
mod format;
mod types;

pub use engine::{
    AccumulationBalances, DrawdownBalances, accumulate_corpus_annual, compute_drawdown,
    compute_future_expense, compute_required_corpus, run_plan,
};
pub use error::ProjectionError;
pub use format::format_currency;
pub use types::{Accumulation, AgePoint, FutureExpense, Horizon, Inputs, PlanResult};

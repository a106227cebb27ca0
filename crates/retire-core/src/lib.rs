pub mod actions;
pub mod answers;
pub mod chat;
pub mod config;
pub mod convert;
pub mod currency;
pub mod dashboard;
pub mod field;
pub mod numeric;
pub mod persistence;
pub mod plan;
pub mod questions;
pub mod reducer;
pub mod state;
pub mod submission;

pub use actions::*;
pub use reducer::*;
pub use state::*;

pub use config::Config;
pub use currency::CurrencyCode;
pub use currency::CurrencyState;
pub use persistence::*;
pub use plan::CalculationRequest;
pub use plan::CanonicalPlan;

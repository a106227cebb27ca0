//! Wire and storage shapes for the calculation endpoint.
//!
//! The service owns the projection math; this crate only reads the fields it
//! renders. Everything else the service sends is kept in `extra` so a stored
//! or re-sent plan round-trips without loss.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanonicalPlan {
    pub target_net_worth: f64,
    pub projected_current_assets: f64,
    pub projected_savings: f64,
    pub projected_payouts: f64,
    pub total_projected_net_worth: f64,
    pub gap: f64,
    pub gap_percentage: f64,
    pub required_monthly_savings: f64,
    pub current_monthly_savings: f64,
    pub years_until_retirement: i64,
    pub months_until_retirement: i64,
    pub year_by_year: Vec<YearRow>,
    pub projection_end_age: i64,
    pub net_worth_at_projection_end: f64,
    pub depletion_age: Option<f64>,
    pub retirement_tax_rate: f64,
    pub pre_tax_retirement_income: f64,
    pub post_retirement_growth_rate: f64,
    pub max_sustainable_monthly_income: f64,
    pub max_sustainable_pre_tax_monthly_income: f64,
    pub income_goal_coverage_ratio: f64,
    pub inputs: PlanInputs,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CanonicalPlan {
    /// `gap` is projected minus target, so a negative gap is a shortfall.
    pub fn has_shortfall(&self) -> bool {
        self.gap < 0.0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct YearRow {
    pub year: i64,
    pub age: i64,
    pub current_assets: f64,
    pub savings_contributions: f64,
    pub payouts_value: f64,
    pub total_net_worth: f64,
    pub target_net_worth: f64,
    pub gap: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanInputs {
    pub ideal_retirement_income: f64,
    pub ideal_retirement_age: f64,
    pub withdrawal_rate: f64,
    pub current_age: f64,
    pub current_asset_values: f64,
    pub cagr: f64,
    pub monthly_savings: f64,
    pub payouts: Vec<PlanPayout>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanPayout {
    pub amount: f64,
    pub year: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Body of `POST /api/calculate`. Always in base currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationRequest {
    pub ideal_retirement_income: f64,
    pub ideal_retirement_age: i64,
    pub withdrawal_rate: f64,
    pub current_age: i64,
    pub current_asset_values: f64,
    pub cagr: f64,
    pub monthly_savings: f64,
    pub payouts: Vec<Payout>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Payout {
    pub amount: f64,
    pub year: i64,
}


#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::fixtures::sample_plan;
    use super::*;

    #[test]
    fn unknown_fields_survive_a_round_trip() {
        let plan = sample_plan();
        assert_eq!(plan.extra.get("scenario_id"), Some(&Value::from("baseline")));
        assert_eq!(
            plan.year_by_year[0].extra.get("phase"),
            Some(&Value::from("accumulation"))
        );

        let encoded = serde_json::to_value(&plan).expect("encode");
        assert_eq!(encoded["scenario_id"], Value::from("baseline"));
        let decoded: CanonicalPlan = serde_json::from_value(encoded).expect("decode");
        assert_eq!(decoded, plan);
    }

    #[test]
    fn missing_numeric_fields_default_to_zero() {
        let plan: CanonicalPlan =
            serde_json::from_str(r#"{"gap": 12.5, "inputs": {"cagr": 6}}"#).expect("plan");
        assert_eq!(plan.gap, 12.5);
        assert_eq!(plan.target_net_worth, 0.0);
        assert_eq!(plan.depletion_age, None);
        assert_eq!(plan.inputs.cagr, 6.0);
        assert!(plan.year_by_year.is_empty());
    }
}

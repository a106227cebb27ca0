//! Scales monetary plan fields between base and display currency.

use super::currency::is_usable_rate;
use super::plan::CanonicalPlan;
use super::plan::PlanInputs;
use super::plan::YearRow;

/// Non-finite or non-positive rates behave as 1.
pub fn effective_rate(rate: f64) -> f64 {
    if is_usable_rate(rate) {
        rate
    } else {
        1.0
    }
}

/// Display copy of `canonical` with every monetary field multiplied by `rate`.
pub fn convert(canonical: &CanonicalPlan, rate: f64) -> CanonicalPlan {
    let rate = effective_rate(rate);
    let mut display = canonical.clone();
    if rate == 1.0 {
        return display;
    }
    for field in plan_fields(&mut display) {
        *field *= rate;
    }
    for row in &mut display.year_by_year {
        for field in row_fields(row) {
            *field *= rate;
        }
    }
    scale_inputs(&mut display.inputs, rate);
    display
}

pub(crate) fn scale_inputs(inputs: &mut PlanInputs, factor: f64) {
    for field in input_fields(inputs) {
        *field *= factor;
    }
    for payout in &mut inputs.payouts {
        payout.amount *= factor;
    }
}

fn plan_fields(plan: &mut CanonicalPlan) -> [&mut f64; 12] {
    [
        &mut plan.target_net_worth,
        &mut plan.projected_current_assets,
        &mut plan.projected_savings,
        &mut plan.projected_payouts,
        &mut plan.total_projected_net_worth,
        &mut plan.gap,
        &mut plan.required_monthly_savings,
        &mut plan.current_monthly_savings,
        &mut plan.pre_tax_retirement_income,
        &mut plan.net_worth_at_projection_end,
        &mut plan.max_sustainable_monthly_income,
        &mut plan.max_sustainable_pre_tax_monthly_income,
    ]
}

fn row_fields(row: &mut YearRow) -> [&mut f64; 6] {
    [
        &mut row.current_assets,
        &mut row.savings_contributions,
        &mut row.payouts_value,
        &mut row.total_net_worth,
        &mut row.target_net_worth,
        &mut row.gap,
    ]
}

fn input_fields(inputs: &mut PlanInputs) -> [&mut f64; 3] {
    [
        &mut inputs.ideal_retirement_income,
        &mut inputs.current_asset_values,
        &mut inputs.monthly_savings,
    ]
}

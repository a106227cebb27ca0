//! Dashboard view model: everything the dashboard shows, derived from the
//! display plan and the active currency. Rebuilt whole on every change.

use super::currency::format_currency;
use super::currency::CurrencyCode;
use super::plan::CanonicalPlan;

pub const PROJECTION_COLUMNS: [&str; 7] = [
    "Age",
    "Current Assets",
    "Savings Growth",
    "Payouts",
    "Total Net Worth",
    "Target",
    "Gap",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Neutral,
    Positive,
    Negative,
}

impl Tone {
    pub fn for_amount(amount: f64) -> Self {
        if amount >= 0.0 {
            Self::Positive
        } else {
            Self::Negative
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryCard {
    pub title: &'static str,
    pub value: String,
    pub subtitle: String,
    pub tone: Tone,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BreakdownSlice {
    pub label: &'static str,
    pub amount: f64,
    pub formatted: String,
    /// Fraction of the positive total, 0.0 to 1.0.
    pub share: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentarySection {
    pub title: &'static str,
    pub intro: String,
    pub bullets: Vec<String>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    pub age: i64,
    pub cells: Vec<String>,
    pub gap_tone: Tone,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardView {
    pub currency: CurrencyCode,
    pub cards: Vec<SummaryCard>,
    /// `(age, projected)` and `(age, target)` points.
    pub projected_series: Vec<(f64, f64)>,
    pub target_series: Vec<(f64, f64)>,
    pub gap_series: Vec<(f64, f64)>,
    pub breakdown: Vec<BreakdownSlice>,
    pub commentary: Vec<CommentarySection>,
    pub rows: Vec<TableRow>,
}

impl DashboardView {
    pub fn value_bounds(&self) -> (f64, f64) {
        let values = self
            .projected_series
            .iter()
            .chain(self.target_series.iter())
            .map(|(_, value)| *value);
        bounds(values, true)
    }

    pub fn gap_bounds(&self) -> (f64, f64) {
        bounds(self.gap_series.iter().map(|(_, value)| *value), false)
    }

    pub fn age_bounds(&self) -> (f64, f64) {
        let first = self.projected_series.first().map_or(0.0, |(age, _)| *age);
        let last = self.projected_series.last().map_or(1.0, |(age, _)| *age);
        if last > first {
            (first, last)
        } else {
            (first, first + 1.0)
        }
    }
}

fn bounds(values: impl Iterator<Item = f64>, from_zero: bool) -> (f64, f64) {
    let mut min = if from_zero { 0.0 } else { f64::INFINITY };
    let mut max = f64::NEG_INFINITY;
    for value in values.filter(|value| value.is_finite()) {
        min = min.min(value);
        max = max.max(value);
    }
    if !min.is_finite() || !max.is_finite() {
        return (0.0, 1.0);
    }
    if max <= min {
        return (min, min + 1.0);
    }
    (min, max)
}

pub fn build_dashboard(display: &CanonicalPlan, currency: CurrencyCode) -> DashboardView {
    let money = |amount: f64| format_currency(amount, currency);
    DashboardView {
        currency,
        cards: summary_cards(display, currency),
        projected_series: display
            .year_by_year
            .iter()
            .map(|row| (row.year as f64, row.total_net_worth))
            .collect(),
        target_series: display
            .year_by_year
            .iter()
            .map(|row| (row.year as f64, row.target_net_worth))
            .collect(),
        gap_series: display
            .year_by_year
            .iter()
            .map(|row| (row.year as f64, row.gap))
            .collect(),
        breakdown: breakdown(display, currency),
        commentary: commentary(display, currency),
        rows: display
            .year_by_year
            .iter()
            .map(|row| TableRow {
                age: row.age,
                cells: vec![
                    row.age.to_string(),
                    money(row.current_assets),
                    money(row.savings_contributions),
                    money(row.payouts_value),
                    money(row.total_net_worth),
                    money(row.target_net_worth),
                    money(row.gap),
                ],
                gap_tone: Tone::for_amount(row.gap),
            })
            .collect(),
    }
}

fn summary_cards(plan: &CanonicalPlan, currency: CurrencyCode) -> Vec<SummaryCard> {
    let gap_label = if plan.has_shortfall() { "Shortfall" } else { "Surplus" };
    vec![
        SummaryCard {
            title: "Target Net Worth",
            value: format_currency(plan.target_net_worth, currency),
            subtitle: "Required at retirement".to_string(),
            tone: Tone::Neutral,
        },
        SummaryCard {
            title: "Projected Net Worth",
            value: format_currency(plan.total_projected_net_worth, currency),
            subtitle: format!("In {} years", plan.years_until_retirement),
            tone: Tone::Neutral,
        },
        SummaryCard {
            title: "Gap",
            value: format_currency(plan.gap, currency),
            subtitle: gap_label.to_string(),
            tone: Tone::for_amount(plan.gap),
        },
        SummaryCard {
            title: "Current Monthly Savings",
            value: format_currency(plan.current_monthly_savings, currency),
            subtitle: "Your current rate".to_string(),
            tone: Tone::Neutral,
        },
    ]
}

fn breakdown(plan: &CanonicalPlan, currency: CurrencyCode) -> Vec<BreakdownSlice> {
    let parts = [
        ("Current Assets", plan.projected_current_assets),
        ("Savings Growth", plan.projected_savings),
        ("Payouts", plan.projected_payouts),
    ];
    let total: f64 = parts.iter().map(|(_, amount)| amount.max(0.0)).sum();
    parts
        .into_iter()
        .map(|(label, amount)| BreakdownSlice {
            label,
            amount,
            formatted: format_currency(amount, currency),
            share: if total > 0.0 {
                amount.max(0.0) / total
            } else {
                0.0
            },
        })
        .collect()
}

fn commentary(plan: &CanonicalPlan, currency: CurrencyCode) -> Vec<CommentarySection> {
    let money = |amount: f64| format_currency(amount, currency);
    let inputs = &plan.inputs;
    let gap = plan.gap;
    let additional_monthly = plan.required_monthly_savings - plan.current_monthly_savings;

    let status = CommentarySection {
        title: "Current Status",
        intro: format!(
            "Based on your current financial situation, you are projected to have {} at retirement age {}, which is {} {} your target of {}.",
            money(plan.total_projected_net_worth),
            inputs.ideal_retirement_age,
            money(gap.abs()),
            if gap >= 0.0 { "more than" } else { "less than" },
            money(plan.target_net_worth),
        ),
        bullets: Vec::new(),
        note: None,
    };

    let analysis = if plan.has_shortfall() {
        CommentarySection {
            title: "Gap Analysis",
            intro: format!(
                "You have a shortfall of {} ({:.1}% below target). To close this gap, you need to:",
                money(gap.abs()),
                plan.gap_percentage.abs()
            ),
            bullets: vec![
                format!(
                    "Increase your monthly savings from {} to {} (an additional {} per month)",
                    money(plan.current_monthly_savings),
                    money(plan.required_monthly_savings),
                    money(additional_monthly)
                ),
                format!(
                    "Or reduce your retirement income goal by approximately {} per month",
                    money(inputs.ideal_retirement_income * plan.gap_percentage.abs() / 100.0)
                ),
                "Or delay retirement by a few years to allow more time for growth".to_string(),
            ],
            note: None,
        }
    } else {
        CommentarySection {
            title: "Gap Analysis",
            intro: format!(
                "Great news! You're on track to exceed your retirement goal by {} ({:.1}% above target). You may consider:",
                money(gap),
                plan.gap_percentage
            ),
            bullets: vec![
                "Retiring earlier than planned".to_string(),
                "Increasing your retirement lifestyle goals".to_string(),
                "Reducing your current savings rate if desired".to_string(),
            ],
            note: None,
        }
    };

    let mut recommendations = if plan.has_shortfall() {
        vec![
            format!(
                "Increase Savings: Try to save an additional {} per month. This could come from reducing expenses or increasing income.",
                money(additional_monthly)
            ),
            "Review Expenses: Look for opportunities to reduce discretionary spending and redirect those funds to retirement savings.".to_string(),
            "Consider Side Income: Additional income streams can significantly accelerate your retirement savings.".to_string(),
        ]
    } else {
        vec![
            format!(
                "Maintain Current Savings Rate: You're on track! Continue saving at your current rate of {} per month.",
                money(plan.current_monthly_savings)
            ),
            "Consider Early Retirement: With your current trajectory, you may be able to retire earlier than planned.".to_string(),
        ]
    };
    recommendations.push(
        "Review Annually: Revisit this plan annually to adjust for changes in income, expenses, or goals.".to_string(),
    );
    recommendations.push(format!(
        "Diversify Investments: Ensure your portfolio is well-diversified to achieve your assumed {:.1}% annual growth rate.",
        inputs.cagr
    ));

    let assumptions = CommentarySection {
        title: "Important Assumptions",
        intro: "This plan is based on the following assumptions:".to_string(),
        bullets: vec![
            format!("Annual growth rate (CAGR) of {:.1}%", inputs.cagr),
            format!("Withdrawal rate of {:.1}% annually", inputs.withdrawal_rate),
            format!(
                "Canadian tax rates applied to retirement income (effective rate: {:.1}%)",
                plan.retirement_tax_rate
            ),
            "Monthly savings contributions invested immediately".to_string(),
            "All investments compound monthly".to_string(),
        ],
        note: Some(
            "Note: Actual results may vary based on market conditions, tax law changes, and other factors. This is a projection tool and should not be considered as financial advice."
                .to_string(),
        ),
    };

    vec![
        status,
        analysis,
        CommentarySection {
            title: "Recommendations",
            intro: "Based on your plan, here are some actionable steps:".to_string(),
            bullets: recommendations,
            note: None,
        },
        assumptions,
    ]
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::convert::convert;
    use crate::plan::fixtures::sample_plan;

    #[test]
    fn cards_follow_gap_sign() {
        let view = build_dashboard(&sample_plan(), CurrencyCode::Cad);
        let titles: Vec<&str> = view.cards.iter().map(|card| card.title).collect();
        assert_eq!(
            titles,
            vec![
                "Target Net Worth",
                "Projected Net Worth",
                "Gap",
                "Current Monthly Savings"
            ]
        );
        assert_eq!(view.cards[1].subtitle, "In 30 years");
        assert_eq!(view.cards[2].value, "-$100,000");
        assert_eq!(view.cards[2].subtitle, "Shortfall");
        assert_eq!(view.cards[2].tone, Tone::Negative);

        let mut plan = sample_plan();
        plan.gap = 0.0;
        let view = build_dashboard(&plan, CurrencyCode::Cad);
        assert_eq!(view.cards[2].subtitle, "Surplus");
        assert_eq!(view.cards[2].tone, Tone::Positive);
    }

    #[test]
    fn view_uses_display_currency() {
        let display = convert(&sample_plan(), 0.74);
        let view = build_dashboard(&display, CurrencyCode::Usd);
        assert_eq!(view.cards[2].value, "-US$74,000");
        assert_eq!(view.rows[1].cells[6], "-US$74,000");
        assert_eq!(view.rows[1].cells[0], "65");
        assert_eq!(view.rows.len(), 2);
    }

    #[test]
    fn breakdown_shares_sum_to_one() {
        let view = build_dashboard(&sample_plan(), CurrencyCode::Cad);
        let labels: Vec<&str> = view.breakdown.iter().map(|slice| slice.label).collect();
        assert_eq!(labels, vec!["Current Assets", "Savings Growth", "Payouts"]);
        let total: f64 = view.breakdown.iter().map(|slice| slice.share).sum();
        assert!((total - 1.0).abs() < 1e-9);

        let view = build_dashboard(&CanonicalPlan::default(), CurrencyCode::Cad);
        assert!(view.breakdown.iter().all(|slice| slice.share == 0.0));
    }

    #[test]
    fn commentary_switches_on_shortfall() {
        let view = build_dashboard(&sample_plan(), CurrencyCode::Cad);
        let titles: Vec<&str> = view.commentary.iter().map(|section| section.title).collect();
        assert_eq!(
            titles,
            vec![
                "Current Status",
                "Gap Analysis",
                "Recommendations",
                "Important Assumptions"
            ]
        );
        assert!(view.commentary[1].intro.starts_with("You have a shortfall of $100,000 (6.7% below"));
        assert_eq!(view.commentary[1].bullets.len(), 3);
        assert_eq!(view.commentary[2].bullets.len(), 5);

        let mut plan = sample_plan();
        plan.gap = 25_000.0;
        plan.gap_percentage = 1.7;
        let view = build_dashboard(&plan, CurrencyCode::Cad);
        assert!(view.commentary[1].intro.starts_with("Great news!"));
        assert_eq!(view.commentary[2].bullets.len(), 4);
    }

    #[test]
    fn chart_bounds_cover_series() {
        let view = build_dashboard(&sample_plan(), CurrencyCode::Cad);
        assert_eq!(view.age_bounds(), (35.0, 65.0));
        assert_eq!(view.value_bounds(), (0.0, 1_500_000.0));
        assert_eq!(view.gap_bounds(), (-1_400_000.0, -100_000.0));

        let empty = build_dashboard(&CanonicalPlan::default(), CurrencyCode::Cad);
        assert_eq!(empty.age_bounds(), (0.0, 1.0));
        assert_eq!(empty.value_bounds(), (0.0, 1.0));
    }
}

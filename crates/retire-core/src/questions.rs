use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionId {
    IdealRetirementIncome,
    IdealRetirementAge,
    WithdrawalRate,
    CurrentAge,
    CurrentAssetValues,
    Cagr,
    MonthlySavings,
    Payouts,
}

impl QuestionId {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::IdealRetirementIncome => "ideal_retirement_income",
            Self::IdealRetirementAge => "ideal_retirement_age",
            Self::WithdrawalRate => "withdrawal_rate",
            Self::CurrentAge => "current_age",
            Self::CurrentAssetValues => "current_asset_values",
            Self::Cagr => "cagr",
            Self::MonthlySavings => "monthly_savings",
            Self::Payouts => "payouts",
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        QUESTIONS
            .iter()
            .map(|spec| spec.id)
            .find(|id| id.as_str() == input)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionKind {
    Number,
    Payouts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affix {
    None,
    CurrencyPrefix,
    PercentSuffix,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuestionSpec {
    pub id: QuestionId,
    pub title: &'static str,
    pub description: &'static str,
    pub kind: QuestionKind,
    pub affix: Affix,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub step: Option<f64>,
    pub required: bool,
}

impl QuestionSpec {
    pub fn formats_with_commas(&self) -> bool {
        self.affix == Affix::CurrencyPrefix
    }
}

pub const QUESTIONS: [QuestionSpec; 8] = [
    QuestionSpec {
        id: QuestionId::IdealRetirementIncome,
        title: "What is your ideal monthly retirement income?",
        description: "This is the disposable income you'd like to have each month during retirement (after taxes).",
        kind: QuestionKind::Number,
        affix: Affix::CurrencyPrefix,
        min: None,
        max: None,
        step: None,
        required: true,
    },
    QuestionSpec {
        id: QuestionId::IdealRetirementAge,
        title: "At what age would you like to retire?",
        description: "Enter your target retirement age.",
        kind: QuestionKind::Number,
        affix: Affix::None,
        min: Some(1.0),
        max: Some(100.0),
        step: None,
        required: true,
    },
    QuestionSpec {
        id: QuestionId::WithdrawalRate,
        title: "What withdrawal rate would you like to use?",
        description: "This is the percentage of your net worth you plan to withdraw annually. A common rate is 4%.",
        kind: QuestionKind::Number,
        affix: Affix::PercentSuffix,
        min: Some(0.1),
        max: Some(10.0),
        step: Some(0.1),
        required: true,
    },
    QuestionSpec {
        id: QuestionId::CurrentAge,
        title: "What is your current age?",
        description: "Enter your current age.",
        kind: QuestionKind::Number,
        affix: Affix::None,
        min: Some(1.0),
        max: Some(100.0),
        step: None,
        required: true,
    },
    QuestionSpec {
        id: QuestionId::CurrentAssetValues,
        title: "What is your current total asset value?",
        description: "Enter the total value of all your current investments and savings.",
        kind: QuestionKind::Number,
        affix: Affix::CurrencyPrefix,
        min: None,
        max: None,
        step: None,
        required: true,
    },
    QuestionSpec {
        id: QuestionId::Cagr,
        title: "What annual growth rate do you expect?",
        description: "Enter your expected Compound Annual Growth Rate (CAGR) as a percentage. A typical range is 5-8%.",
        kind: QuestionKind::Number,
        affix: Affix::PercentSuffix,
        min: Some(-100.0),
        max: Some(100.0),
        step: Some(0.1),
        required: true,
    },
    QuestionSpec {
        id: QuestionId::MonthlySavings,
        title: "How much do you save for retirement each month?",
        description: "Enter the amount you currently save for retirement each month.",
        kind: QuestionKind::Number,
        affix: Affix::CurrencyPrefix,
        min: None,
        max: None,
        step: None,
        required: true,
    },
    QuestionSpec {
        id: QuestionId::Payouts,
        title: "Do you expect any one-time inheritances or equity payouts?",
        description: "Add any expected one-time payments you'll receive in the future. Enter the age at which you'll receive each payout.",
        kind: QuestionKind::Payouts,
        affix: Affix::None,
        min: None,
        max: None,
        step: None,
        required: false,
    },
];

pub fn question(index: usize) -> Option<&'static QuestionSpec> {
    QUESTIONS.get(index)
}

pub fn question_spec(id: QuestionId) -> &'static QuestionSpec {
    match id {
        QuestionId::IdealRetirementIncome => &QUESTIONS[0],
        QuestionId::IdealRetirementAge => &QUESTIONS[1],
        QuestionId::WithdrawalRate => &QUESTIONS[2],
        QuestionId::CurrentAge => &QUESTIONS[3],
        QuestionId::CurrentAssetValues => &QUESTIONS[4],
        QuestionId::Cagr => &QUESTIONS[5],
        QuestionId::MonthlySavings => &QUESTIONS[6],
        QuestionId::Payouts => &QUESTIONS[7],
    }
}

pub fn question_index(id: QuestionId) -> usize {
    QUESTIONS
        .iter()
        .position(|spec| spec.id == id)
        .unwrap_or(0)
}

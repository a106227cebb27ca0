use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use serde::Serialize;

use super::answers::validate;
use super::answers::Answers;
use super::answers::PayoutDraft;
use super::currency::is_usable_rate;
use super::numeric::parse_number;
use super::numeric::parse_whole;
use super::plan::CalculationRequest;
use super::plan::Payout;
use super::questions::QuestionId;
use super::questions::QUESTIONS;

/// Error code the calculation endpoint sends for a payout at or after the
/// retirement age.
pub const PAYOUT_AFTER_RETIREMENT_CODE: &str = "payout_after_retirement";

pub const PAYOUT_CONFLICT_MESSAGE: &str =
    "Payouts must happen before your retirement age. Adjust the payout age and try again.";

pub const SUBMISSION_FAILED_HEADLINE: &str = "We ran into an issue preparing your dashboard.";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SubmissionError {
    #[error("{question}: {message}")]
    InvalidAnswer {
        question: &'static str,
        message: String,
    },
}

pub fn sanitize_payouts(drafts: &[PayoutDraft]) -> Vec<Payout> {
    drafts
        .iter()
        .filter(|draft| !draft.is_blank())
        .filter_map(|draft| {
            let amount = parse_number(&draft.amount)?;
            let year = parse_whole(&draft.year)?;
            Some(Payout { amount, year })
        })
        .collect()
}

/// Typed payload for a complete answer set, in the currency it was entered in.
pub fn build_request(answers: &Answers) -> Result<CalculationRequest, SubmissionError> {
    for spec in QUESTIONS.iter() {
        validate(spec.id, answers).map_err(|err| SubmissionError::InvalidAnswer {
            question: spec.id.as_str(),
            message: err.message(),
        })?;
    }
    let number = |id: QuestionId| {
        answers
            .number(id)
            .ok_or_else(|| SubmissionError::InvalidAnswer {
                question: id.as_str(),
                message: "Enter a number".to_string(),
            })
    };
    let whole = |id: QuestionId| {
        answers
            .whole(id)
            .ok_or_else(|| SubmissionError::InvalidAnswer {
                question: id.as_str(),
                message: "Enter a whole number".to_string(),
            })
    };

    Ok(CalculationRequest {
        ideal_retirement_income: number(QuestionId::IdealRetirementIncome)?,
        ideal_retirement_age: whole(QuestionId::IdealRetirementAge)?,
        withdrawal_rate: number(QuestionId::WithdrawalRate)?,
        current_age: whole(QuestionId::CurrentAge)?,
        current_asset_values: number(QuestionId::CurrentAssetValues)?,
        cagr: number(QuestionId::Cagr)?,
        monthly_savings: number(QuestionId::MonthlySavings)?,
        payouts: sanitize_payouts(answers.payouts()),
    })
}

/// Divides the currency fields by `rate`. Identity for rate 1 or an unusable rate.
pub fn to_base_currency(mut request: CalculationRequest, rate: f64) -> CalculationRequest {
    if !is_usable_rate(rate) || rate == 1.0 {
        return request;
    }
    request.ideal_retirement_income /= rate;
    request.current_asset_values /= rate;
    request.monthly_savings /= rate;
    for payout in &mut request.payouts {
        payout.amount /= rate;
    }
    request
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CalculationFailure {
    PayoutAfterRetirement { message: String },
    Rejected { message: String },
    Network { message: String },
}

impl CalculationFailure {
    pub fn message(&self) -> &str {
        match self {
            Self::PayoutAfterRetirement { message }
            | Self::Rejected { message }
            | Self::Network { message } => message.as_str(),
        }
    }

    pub fn is_payout_conflict(&self) -> bool {
        matches!(self, Self::PayoutAfterRetirement { .. })
    }
}

static PAYOUT_CONFLICT_PATTERN: OnceLock<Option<Regex>> = OnceLock::new();

fn looks_like_payout_conflict(message: &str) -> bool {
    PAYOUT_CONFLICT_PATTERN
        .get_or_init(|| {
            Regex::new(r"(?i)payout.*\b(after|beyond|past|exceeds?)\b.*retire").ok()
        })
        .as_ref()
        .is_some_and(|re| re.is_match(message))
}

/// A structured `code` decides when present; the message is only matched
/// against when the endpoint sent no code at all.
pub fn classify_failure(code: Option<&str>, message: &str) -> CalculationFailure {
    let message = if message.trim().is_empty() {
        "Server error".to_string()
    } else {
        message.trim().to_string()
    };
    let conflict = match code {
        Some(code) => code == PAYOUT_AFTER_RETIREMENT_CODE,
        None => looks_like_payout_conflict(&message),
    };
    if conflict {
        CalculationFailure::PayoutAfterRetirement { message }
    } else {
        CalculationFailure::Rejected { message }
    }
}

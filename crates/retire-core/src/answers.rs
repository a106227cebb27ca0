use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use super::numeric::parse_number;
use super::numeric::parse_whole;
use super::numeric::sanitize_number;
use super::questions::question_spec;
use super::questions::QuestionId;
use super::questions::QuestionKind;
use super::questions::QuestionSpec;
use super::questions::QUESTIONS;

/// A payout row as typed: both fields are raw, separator-free strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutDraft {
    #[serde(default, deserialize_with = "de_raw_string")]
    pub amount: String,
    #[serde(default, deserialize_with = "de_raw_string")]
    pub year: String,
}

impl PayoutDraft {
    pub fn is_blank(&self) -> bool {
        self.amount.trim().is_empty() && self.year.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Text(#[serde(deserialize_with = "de_raw_string")] String),
    Payouts(Vec<PayoutDraft>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Answers {
    values: BTreeMap<QuestionId, AnswerValue>,
}

impl Answers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self, id: QuestionId) -> &str {
        match self.values.get(&id) {
            Some(AnswerValue::Text(value)) => value.as_str(),
            _ => "",
        }
    }

    /// Answered means a non-blank text value was entered.
    pub fn is_answered(&self, id: QuestionId) -> bool {
        !self.text(id).trim().is_empty()
    }

    pub fn set_text(&mut self, id: QuestionId, value: impl Into<String>) {
        self.values.insert(id, AnswerValue::Text(value.into()));
    }

    pub fn payouts(&self) -> &[PayoutDraft] {
        match self.values.get(&QuestionId::Payouts) {
            Some(AnswerValue::Payouts(payouts)) => payouts.as_slice(),
            _ => &[],
        }
    }

    pub fn payouts_mut(&mut self) -> &mut Vec<PayoutDraft> {
        let entry = self
            .values
            .entry(QuestionId::Payouts)
            .or_insert_with(|| AnswerValue::Payouts(Vec::new()));
        if !matches!(entry, AnswerValue::Payouts(_)) {
            *entry = AnswerValue::Payouts(Vec::new());
        }
        match entry {
            AnswerValue::Payouts(payouts) => payouts,
            AnswerValue::Text(_) => unreachable!("payouts entry normalised above"),
        }
    }

    pub fn number(&self, id: QuestionId) -> Option<f64> {
        parse_number(self.text(id))
    }

    pub fn whole(&self, id: QuestionId) -> Option<i64> {
        parse_whole(self.text(id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldError {
    Required,
    NotANumber,
    BelowMin(f64),
    AboveMax(f64),
    CurrentAgeNotBelowRetirement,
    RetirementAgeNotAboveCurrent,
}

impl FieldError {
    pub fn message(self) -> String {
        match self {
            Self::Required => "This field is required".to_string(),
            Self::NotANumber => "Enter a number".to_string(),
            Self::BelowMin(min) => format!("Must be at least {min}"),
            Self::AboveMax(max) => format!("Must be at most {max}"),
            Self::CurrentAgeNotBelowRetirement => {
                "Current age must be less than retirement age".to_string()
            }
            Self::RetirementAgeNotAboveCurrent => {
                "Retirement age must be greater than current age".to_string()
            }
        }
    }
}

pub fn validate_question(spec: &QuestionSpec, answers: &Answers) -> Result<(), FieldError> {
    if spec.kind == QuestionKind::Payouts || !spec.required {
        return Ok(());
    }
    let raw = sanitize_number(answers.text(spec.id));
    if raw.is_empty() {
        return Err(FieldError::Required);
    }
    let value = parse_number(&raw).ok_or(FieldError::NotANumber)?;
    if let Some(min) = spec.min {
        if value < min {
            return Err(FieldError::BelowMin(min));
        }
    }
    if let Some(max) = spec.max {
        if value > max {
            return Err(FieldError::AboveMax(max));
        }
    }

    match spec.id {
        QuestionId::CurrentAge => {
            if let Some(retirement_age) = answers.whole(QuestionId::IdealRetirementAge) {
                if value >= retirement_age as f64 {
                    return Err(FieldError::CurrentAgeNotBelowRetirement);
                }
            }
        }
        QuestionId::IdealRetirementAge => {
            if let Some(current_age) = answers.whole(QuestionId::CurrentAge) {
                if value <= current_age as f64 {
                    return Err(FieldError::RetirementAgeNotAboveCurrent);
                }
            }
        }
        _ => {}
    }
    Ok(())
}

pub fn validate(id: QuestionId, answers: &Answers) -> Result<(), FieldError> {
    validate_question(question_spec(id), answers)
}

/// Errors for every answered field; unanswered fields are not reported.
pub fn field_errors(answers: &Answers) -> BTreeMap<QuestionId, FieldError> {
    QUESTIONS
        .iter()
        .filter(|spec| answers.is_answered(spec.id))
        .filter_map(|spec| {
            validate_question(spec, answers)
                .err()
                .map(|err| (spec.id, err))
        })
        .collect()
}

fn de_raw_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::String(text) => Ok(sanitize_number(&text)),
        serde_json::Value::Number(number) => Ok(number.to_string()),
        serde_json::Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string or number, got {other}"
        ))),
    }
}

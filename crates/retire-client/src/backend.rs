use reqwest::blocking::Client;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderValue;
use reqwest::header::CONTENT_TYPE;
use reqwest::Url;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use tracing::warn;

use retire_core::chat::ChatFailure;
use retire_core::plan::CalculationRequest;
use retire_core::plan::CanonicalPlan;
use retire_core::submission::classify_failure;
use retire_core::submission::CalculationFailure;

use crate::contracts::ChatReply;
use crate::contracts::ChatRequest;
use crate::contracts::ErrorBody;
use crate::contracts::CALCULATE_PATH;
use crate::contracts::CHAT_PATH;

pub const SERVER_ERROR: &str = "Server error";
pub const UNKNOWN_ERROR: &str = "An unknown error occurred";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("invalid base url {url}: {message}")]
    InvalidBaseUrl { url: String, message: String },
    #[error("failed to build HTTP client: {0}")]
    Client(String),
    #[error("request to {endpoint} failed: {message}")]
    Network { endpoint: String, message: String },
    #[error("{message} (status {status})")]
    Rejected {
        status: u16,
        code: Option<String>,
        message: String,
    },
    #[error("undecodable response: {0}")]
    Decode(String),
}

impl From<BackendError> for CalculationFailure {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Rejected { code, message, .. } => {
                classify_failure(code.as_deref(), &message)
            }
            BackendError::Network { message, .. } => CalculationFailure::Network { message },
            BackendError::InvalidBaseUrl { .. } | BackendError::Client(_) => {
                CalculationFailure::Network {
                    message: err.to_string(),
                }
            }
            BackendError::Decode(_) => CalculationFailure::Rejected {
                message: UNKNOWN_ERROR.to_string(),
            },
        }
    }
}

impl From<BackendError> for ChatFailure {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Rejected { message, .. } => ChatFailure::Rejected {
                error: Some(message),
            },
            BackendError::Decode(_) => ChatFailure::Rejected { error: None },
            BackendError::Network { .. }
            | BackendError::InvalidBaseUrl { .. }
            | BackendError::Client(_) => ChatFailure::Network,
        }
    }
}

/// The two server endpoints the planner talks to.
pub trait PlanningBackend: Send + Sync {
    fn calculate(&self, request: &CalculationRequest) -> Result<CanonicalPlan, BackendError>;

    /// Sends `message` with the plan as the user currently sees it.
    fn chat(&self, message: &str, plan: &CanonicalPlan) -> Result<String, BackendError>;
}

#[derive(Debug, Clone)]
pub struct HttpBackend {
    http: Client,
    base_url: Url,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> Result<Self, BackendError> {
        let base_url = normalize_base_url(base_url)?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let http = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|err| BackendError::Client(err.to_string()))?;

        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, BackendError> {
        self.base_url
            .join(path)
            .map_err(|err| BackendError::InvalidBaseUrl {
                url: self.base_url.to_string(),
                message: err.to_string(),
            })
    }

    fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<(u16, String), BackendError> {
        let endpoint = self.endpoint(path)?;
        let network = |err: reqwest::Error| BackendError::Network {
            endpoint: endpoint.to_string(),
            message: err.to_string(),
        };
        let response = self
            .http
            .post(endpoint.clone())
            .json(body)
            .send()
            .map_err(network)?;
        let status = response.status().as_u16();
        let text = response.text().map_err(network)?;
        debug!(%endpoint, status, bytes = text.len(), "endpoint replied");
        Ok((status, text))
    }
}

impl PlanningBackend for HttpBackend {
    fn calculate(&self, request: &CalculationRequest) -> Result<CanonicalPlan, BackendError> {
        let (status, body) = self.post(CALCULATE_PATH, request)?;
        parse_calculation_response(status, &body).inspect_err(|err| {
            warn!(status, error = %err, "calculation rejected");
        })
    }

    fn chat(&self, message: &str, plan: &CanonicalPlan) -> Result<String, BackendError> {
        let request = ChatRequest {
            message,
            plan_data: plan,
        };
        let (status, body) = self.post(CHAT_PATH, &request)?;
        parse_chat_response(status, &body)
    }
}

/// Parses `raw` and makes sure it ends in `/` so endpoint paths join under it.
pub fn normalize_base_url(raw: &str) -> Result<Url, BackendError> {
    let trimmed = raw.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };
    let url = Url::parse(&with_slash).map_err(|err| BackendError::InvalidBaseUrl {
        url: raw.to_string(),
        message: err.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(BackendError::InvalidBaseUrl {
            url: raw.to_string(),
            message: format!("unsupported scheme '{other}'"),
        }),
    }
}

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

fn error_body(value: &Value) -> ErrorBody {
    serde_json::from_value(value.clone()).unwrap_or_default()
}

/// A non-2xx status or an `error` field rejects the calculation; anything else
/// must decode as a plan.
pub fn parse_calculation_response(status: u16, body: &str) -> Result<CanonicalPlan, BackendError> {
    let value = match serde_json::from_str::<Value>(body) {
        Ok(value) => value,
        Err(err) if is_success(status) => return Err(BackendError::Decode(err.to_string())),
        Err(_) => {
            return Err(BackendError::Rejected {
                status,
                code: None,
                message: SERVER_ERROR.to_string(),
            })
        }
    };
    let envelope = error_body(&value);
    if !is_success(status) || envelope.error.is_some() {
        return Err(BackendError::Rejected {
            status,
            code: envelope.code,
            message: envelope
                .error
                .filter(|error| !error.trim().is_empty())
                .unwrap_or_else(|| SERVER_ERROR.to_string()),
        });
    }
    if !value.is_object() {
        return Err(BackendError::Decode("expected a JSON object".to_string()));
    }
    serde_json::from_value(value).map_err(|err| BackendError::Decode(err.to_string()))
}

/// Returns the reply text, or the server's `error` as a rejection.
pub fn parse_chat_response(status: u16, body: &str) -> Result<String, BackendError> {
    let reply = match serde_json::from_str::<ChatReply>(body) {
        Ok(reply) => reply,
        Err(err) if is_success(status) => return Err(BackendError::Decode(err.to_string())),
        Err(_) => ChatReply::default(),
    };
    if is_success(status) {
        if let Some(response) = reply.response {
            return Ok(response);
        }
    }
    match reply.error {
        Some(message) => Err(BackendError::Rejected {
            status,
            code: None,
            message,
        }),
        None if is_success(status) => Err(BackendError::Decode(
            "reply carried neither response nor error".to_string(),
        )),
        None => Err(BackendError::Rejected {
            status,
            code: None,
            message: String::new(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use retire_core::chat::ChatFailure;
    use retire_core::submission::CalculationFailure;
    use serde_json::json;

    use super::normalize_base_url;
    use super::parse_calculation_response;
    use super::parse_chat_response;
    use super::BackendError;
    use super::HttpBackend;
    use super::SERVER_ERROR;
    use super::UNKNOWN_ERROR;
    use crate::contracts::CALCULATE_PATH;
    use crate::contracts::CHAT_PATH;
    use pretty_assertions::assert_eq;

    #[test]
    fn base_url_gains_a_trailing_slash() {
        let url = normalize_base_url("http://127.0.0.1:5001/planner").expect("url");
        assert_eq!(url.as_str(), "http://127.0.0.1:5001/planner/");
        assert_eq!(
            url.join(CALCULATE_PATH).expect("join").as_str(),
            "http://127.0.0.1:5001/planner/api/calculate"
        );

        let backend = HttpBackend::new("http://127.0.0.1:5001").expect("backend");
        assert_eq!(
            backend.endpoint(CHAT_PATH).expect("join").as_str(),
            "http://127.0.0.1:5001/api/chat"
        );
    }

    #[test]
    fn non_http_base_urls_are_refused() {
        assert!(matches!(
            normalize_base_url("ftp://example.org"),
            Err(BackendError::InvalidBaseUrl { .. })
        ));
        assert!(matches!(
            normalize_base_url("not a url"),
            Err(BackendError::InvalidBaseUrl { .. })
        ));
    }

    #[test]
    fn calculation_plan_keeps_unknown_fields() {
        let body = json!({
            "target_net_worth": 1500000.0,
            "gap": -250000.0,
            "years_until_retirement": 30,
            "year_by_year": [{"year": 35, "age": 35, "gap": -1500000.0, "note": "x"}],
            "inputs": {"current_age": 35, "payouts": []},
            "scenario": {"id": 4}
        })
        .to_string();
        let plan = parse_calculation_response(200, &body).expect("plan");
        assert_eq!(plan.gap, -250000.0);
        assert_eq!(plan.years_until_retirement, 30);
        assert_eq!(plan.year_by_year[0].age, 35);
        assert_eq!(plan.extra.get("scenario"), Some(&json!({"id": 4})));
        assert_eq!(plan.year_by_year[0].extra.get("note"), Some(&json!("x")));
    }

    #[test]
    fn error_envelopes_are_rejections() {
        let err = parse_calculation_response(
            400,
            r#"{"error":"Payout year must be before retirement","code":"payout_after_retirement"}"#,
        )
        .expect_err("rejected");
        assert_eq!(
            err,
            BackendError::Rejected {
                status: 400,
                code: Some("payout_after_retirement".to_string()),
                message: "Payout year must be before retirement".to_string(),
            }
        );
        assert!(CalculationFailure::from(err).is_payout_conflict());

        let err = parse_calculation_response(200, r#"{"error":"bad input"}"#).expect_err("embedded");
        assert_eq!(
            CalculationFailure::from(err),
            CalculationFailure::Rejected {
                message: "bad input".to_string()
            }
        );

        let err = parse_calculation_response(502, "<html>Bad Gateway</html>").expect_err("html");
        assert_eq!(
            CalculationFailure::from(err),
            CalculationFailure::Rejected {
                message: SERVER_ERROR.to_string()
            }
        );
    }

    #[test]
    fn undecodable_success_is_an_unknown_error() {
        let err = parse_calculation_response(200, "[1,2]").expect_err("array");
        assert!(matches!(err, BackendError::Decode(_)));
        assert_eq!(
            CalculationFailure::from(err),
            CalculationFailure::Rejected {
                message: UNKNOWN_ERROR.to_string()
            }
        );
    }

    #[test]
    fn chat_reply_and_error_shapes() {
        assert_eq!(
            parse_chat_response(200, r###"{"response":"## Outlook\n- save more"}"###).expect("reply"),
            "## Outlook\n- save more"
        );

        let err = parse_chat_response(500, r#"{"error":"Model unavailable","details":{"retry":true}}"#)
            .expect_err("error");
        assert_eq!(
            ChatFailure::from(err),
            ChatFailure::Rejected {
                error: Some("Model unavailable".to_string())
            }
        );

        let err = parse_chat_response(200, "{}").expect_err("empty");
        assert_eq!(ChatFailure::from(err), ChatFailure::Rejected { error: None });

        let err = parse_chat_response(503, "").expect_err("blank");
        assert_eq!(ChatFailure::from(err).reply_text(), "Something went wrong.");
    }

    #[test]
    fn transport_errors_map_to_network_failures() {
        let err = BackendError::Network {
            endpoint: "http://127.0.0.1:5001/api/chat".to_string(),
            message: "connection refused".to_string(),
        };
        assert_eq!(ChatFailure::from(err.clone()), ChatFailure::Network);
        assert_eq!(
            CalculationFailure::from(err),
            CalculationFailure::Network {
                message: "connection refused".to_string()
            }
        );
    }
}

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::core::error::{KeySweepError, Result};
use crate::core::results::{Classification, KeyFacts};
use crate::core::traits::KeyValidator;
use crate::utils::{HttpClient, HttpResponse};

#[derive(Debug, Deserialize)]
struct CreditsResponse {
    data: CreditsData,
}

#[derive(Debug, Deserialize)]
struct CreditsData {
    total_credits: f64,
    total_usage: f64,
}

/// Validates `sk-or-v1-` keys against the OpenRouter credits endpoint. A 200
/// is a definitive live key; 401 and 403 are definitive Invalid. Rate
/// limiting and server errors are not a verdict on the key.
pub struct OpenRouterValidator {
    base_url: String,
    rate_limit: Duration,
}

impl OpenRouterValidator {
    pub fn new(rate_limit: Duration) -> Self {
        Self {
            base_url: "https://openrouter.ai".to_string(),
            rate_limit,
        }
    }
}

#[async_trait]
impl KeyValidator for OpenRouterValidator {
    async fn validate(&self, key: &str) -> Result<Classification> {
        let url = format!("{}/api/v1/credits", self.base_url);
        let key = key.to_string();
        let response = tokio::task::spawn_blocking(move || {
            let client = HttpClient::new();
            let auth = format!("Bearer {}", key);
            client.get(&url, &[("Authorization", auth.as_str())])
        })
        .await
        .map_err(|e| KeySweepError::Unknown(format!("task join error: {}", e)))??;

        classify_credits(&response)
    }

    fn rate_limit(&self) -> Duration {
        self.rate_limit
    }
}

fn classify_credits(response: &HttpResponse) -> Result<Classification> {
    match response.status_code {
        200 => {
            // A 200 with an unparseable body is still a live key.
            let remaining = response
                .json::<CreditsResponse>()
                .ok()
                .map(|c| c.data.total_credits - c.data.total_usage);
            Ok(Classification::Valid(KeyFacts {
                gpt4_allowed: true,
                plan: None,
                hard_limit_usd: remaining,
                has_payment_method: None,
                access_until: None,
            }))
        }
        401 => Ok(Classification::Invalid {
            reason: "unauthorized: key revoked or malformed".to_string(),
        }),
        403 => Ok(Classification::Invalid {
            reason: "forbidden: key lacks required permissions".to_string(),
        }),
        429 => Err(KeySweepError::RateLimit(
            "credits lookup rate limited".to_string(),
        )),
        status => Err(KeySweepError::ValidationFailed(format!(
            "credits lookup returned HTTP {}",
            status
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status_code: u16, body: &[u8]) -> HttpResponse {
        HttpResponse {
            status_code,
            body: body.to_vec(),
        }
    }

    #[test]
    fn test_credits_200_is_valid_with_remaining_balance() {
        let r = response(
            200,
            br#"{"data":{"total_credits":50.0,"total_usage":12.5}}"#,
        );
        match classify_credits(&r).unwrap() {
            Classification::Valid(facts) => {
                assert_eq!(facts.hard_limit_usd, Some(37.5));
                assert!(facts.gpt4_allowed);
            }
            Classification::Invalid { .. } => panic!("200 must be valid"),
        }
    }

    #[test]
    fn test_credits_200_with_unparseable_body_is_still_valid() {
        let r = response(200, b"not json");
        match classify_credits(&r).unwrap() {
            Classification::Valid(facts) => assert!(facts.hard_limit_usd.is_none()),
            Classification::Invalid { .. } => panic!("200 must be valid"),
        }
    }

    #[test]
    fn test_credits_401_and_403_are_invalid() {
        for status in [401, 403] {
            assert!(matches!(
                classify_credits(&response(status, b"")).unwrap(),
                Classification::Invalid { .. }
            ));
        }
    }

    #[test]
    fn test_credits_429_is_rate_limit_not_a_verdict() {
        let err = classify_credits(&response(429, b"")).unwrap_err();
        assert!(matches!(err, KeySweepError::RateLimit(_)));
    }

    #[test]
    fn test_credits_server_error_is_transient() {
        let err = classify_credits(&response(500, b"")).unwrap_err();
        assert!(matches!(err, KeySweepError::ValidationFailed(_)));
    }
}

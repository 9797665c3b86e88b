use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use std::time::Duration;

use crate::core::error::{KeySweepError, Result};
use crate::core::results::{Classification, KeyFacts};
use crate::core::traits::KeyValidator;
use crate::utils::{HttpClient, HttpResponse};

#[derive(Debug, Deserialize)]
struct SubscriptionResponse {
    #[serde(default)]
    access_until: Option<f64>,
    #[serde(default)]
    hard_limit_usd: Option<f64>,
    #[serde(default)]
    system_hard_limit_usd: Option<f64>,
    #[serde(default)]
    plan: Option<Plan>,
    #[serde(default)]
    has_payment_method: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct Plan {
    id: String,
}

/// Outcome of the capability probe.
enum Probe {
    Revoked,
    Usable { gpt4_allowed: bool },
}

/// Validates a key in two steps: a capability probe against the gpt-4 model
/// endpoint, then the billing subscription lookup. Only a definitive answer
/// from the provider produces a classification; transport trouble is an
/// `Err` so the caller can retry the key on a later run. Persistence is the
/// caller's job.
pub struct OpenAiValidator {
    base_url: String,
    rate_limit: Duration,
}

impl OpenAiValidator {
    pub fn new(rate_limit: Duration) -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            rate_limit,
        }
    }

    async fn get(&self, path: &str, key: &str) -> Result<HttpResponse> {
        let url = format!("{}{}", self.base_url, path);
        let key = key.to_string();
        tokio::task::spawn_blocking(move || {
            let client = HttpClient::new();
            let auth = format!("Bearer {}", key);
            client.get(
                &url,
                &[
                    ("Authorization", auth.as_str()),
                    ("Content-Type", "application/json"),
                ],
            )
        })
        .await
        .map_err(|e| KeySweepError::Unknown(format!("task join error: {}", e)))?
    }
}

#[async_trait]
impl KeyValidator for OpenAiValidator {
    async fn validate(&self, key: &str) -> Result<Classification> {
        let probe = self.get("/v1/models/gpt-4", key).await?;
        let gpt4_allowed = match classify_probe(probe.status_code) {
            Probe::Revoked => {
                return Ok(Classification::Invalid {
                    reason: "unauthorized: key revoked or malformed".to_string(),
                })
            }
            Probe::Usable { gpt4_allowed } => gpt4_allowed,
        };

        let billing = self.get("/v1/dashboard/billing/subscription", key).await?;
        if billing.status_code == 401 {
            return Ok(Classification::Invalid {
                reason: "unauthorized on billing lookup".to_string(),
            });
        }
        if !billing.is_success() {
            // Not a verdict on the key; let a later run try again.
            return Err(KeySweepError::ValidationFailed(format!(
                "billing lookup returned HTTP {}",
                billing.status_code
            )));
        }

        let subscription: SubscriptionResponse = billing.json()?;
        Ok(classify_subscription(gpt4_allowed, subscription, Utc::now()))
    }

    fn rate_limit(&self) -> Duration {
        self.rate_limit
    }
}

fn classify_probe(status: u16) -> Probe {
    if status == 401 {
        return Probe::Revoked;
    }
    // Anything but a 404 on the model endpoint means the key can reach it.
    Probe::Usable {
        gpt4_allowed: status != 404,
    }
}

fn classify_subscription(
    gpt4_allowed: bool,
    subscription: SubscriptionResponse,
    now: DateTime<Utc>,
) -> Classification {
    let access_until = subscription.access_until.and_then(epoch_to_datetime);
    if let Some(expiry) = access_until {
        if expiry < now {
            return Classification::Invalid {
                reason: "subscription expired".to_string(),
            };
        }
    }

    Classification::Valid(KeyFacts {
        gpt4_allowed,
        plan: subscription.plan.map(|p| p.id),
        hard_limit_usd: subscription
            .hard_limit_usd
            .or(subscription.system_hard_limit_usd),
        has_payment_method: subscription.has_payment_method,
        access_until,
    })
}

fn epoch_to_datetime(secs: f64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs as i64, 0).single()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn subscription(access_until: Option<DateTime<Utc>>) -> SubscriptionResponse {
        SubscriptionResponse {
            access_until: access_until.map(|t| t.timestamp() as f64),
            hard_limit_usd: Some(120.0),
            system_hard_limit_usd: Some(100.0),
            plan: Some(Plan {
                id: "payg".to_string(),
            }),
            has_payment_method: Some(true),
        }
    }

    #[test]
    fn test_probe_401_is_revoked() {
        assert!(matches!(classify_probe(401), Probe::Revoked));
    }

    #[test]
    fn test_probe_404_is_usable_without_gpt4() {
        match classify_probe(404) {
            Probe::Usable { gpt4_allowed } => assert!(!gpt4_allowed),
            Probe::Revoked => panic!("404 must not mean revoked"),
        }
    }

    #[test]
    fn test_probe_200_is_usable_with_gpt4() {
        match classify_probe(200) {
            Probe::Usable { gpt4_allowed } => assert!(gpt4_allowed),
            Probe::Revoked => panic!("200 must not mean revoked"),
        }
    }

    #[test]
    fn test_expired_subscription_is_invalid_despite_probe() {
        let now = Utc::now();
        let expired = subscription(Some(now - ChronoDuration::days(1)));
        assert!(matches!(
            classify_subscription(true, expired, now),
            Classification::Invalid { .. }
        ));
    }

    #[test]
    fn test_active_subscription_is_valid() {
        let now = Utc::now();
        let active = subscription(Some(now + ChronoDuration::days(30)));
        match classify_subscription(false, active, now) {
            Classification::Valid(facts) => {
                assert!(!facts.gpt4_allowed);
                assert_eq!(facts.plan.as_deref(), Some("payg"));
                assert_eq!(facts.hard_limit_usd, Some(120.0));
                assert_eq!(facts.has_payment_method, Some(true));
            }
            Classification::Invalid { .. } => panic!("active subscription must be valid"),
        }
    }

    #[test]
    fn test_limit_falls_back_to_system_wide_default() {
        let now = Utc::now();
        let mut sub = subscription(None);
        sub.hard_limit_usd = None;
        match classify_subscription(true, sub, now) {
            Classification::Valid(facts) => assert_eq!(facts.hard_limit_usd, Some(100.0)),
            Classification::Invalid { .. } => panic!("expected valid"),
        }
    }

    #[test]
    fn test_missing_expiry_does_not_invalidate() {
        let now = Utc::now();
        match classify_subscription(true, subscription(None), now) {
            Classification::Valid(facts) => assert!(facts.access_until.is_none()),
            Classification::Invalid { .. } => panic!("expected valid"),
        }
    }
}

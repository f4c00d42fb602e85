//! Heuristic risk scoring for agent-initiated payments, with an optional
//! fail-open semantic second opinion.

use crate::classifier::{
    classify_with_timeout, report_provider_error, Classifier, ErrorCallback, ProviderError,
    DEFAULT_CLASSIFIER_TIMEOUT,
};
use crate::types::Classification;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// At or above this heuristic score the classifier is never consulted.
pub const SHORT_CIRCUIT_SCORE: f64 = 0.7;
pub const BLOCK_THRESHOLD: f64 = 0.5;
pub const DEEP_SCAN_PENALTY: f64 = 0.4;

const KNOWN_BAD_WEIGHT: f64 = 0.5;
const LOW_REPUTATION_WEIGHT: f64 = 0.3;
const HIGH_VALUE_WEIGHT: f64 = 0.15;
const SHORT_DESCRIPTION_WEIGHT: f64 = 0.1;
const ZERO_ADDRESS_WEIGHT: f64 = 0.5;
const MIN_DESCRIPTION_CHARS: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementMeta {
    pub recipient: String,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub counterparty_reputation: Option<f64>,
    #[serde(default)]
    pub service_description: Option<String>,
}

#[derive(Clone)]
pub struct SettlementOptions {
    /// Compared case-insensitively against the recipient.
    pub known_bad_recipients: Vec<String>,
    pub low_reputation_threshold: f64,
    pub high_value_threshold: f64,
    pub deep_scan: bool,
    pub classifier: Option<Arc<dyn Classifier>>,
    pub on_error: Option<ErrorCallback>,
    pub timeout: Duration,
}

impl Default for SettlementOptions {
    fn default() -> Self {
        Self {
            known_bad_recipients: Vec::new(),
            low_reputation_threshold: 0.3,
            high_value_threshold: 500.0,
            deep_scan: false,
            classifier: None,
            on_error: None,
            timeout: DEFAULT_CLASSIFIER_TIMEOUT,
        }
    }
}

impl fmt::Debug for SettlementOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettlementOptions")
            .field("known_bad_recipients", &self.known_bad_recipients.len())
            .field("low_reputation_threshold", &self.low_reputation_threshold)
            .field("high_value_threshold", &self.high_value_threshold)
            .field("deep_scan", &self.deep_scan)
            .field("classifier", &self.classifier.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    pub classification: Classification,
    pub reasoning: String,
    pub risk_score: f64,
    pub risk_factors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_error: Option<String>,
}

impl RiskAssessment {
    pub fn is_blocked(&self) -> bool {
        self.classification.is_block()
    }
}

fn capped(score: f64) -> f64 {
    // Rounded so additive weights print cleanly.
    (score.min(1.0) * 1e4).round() / 1e4
}

/// Heuristic score and the factors that contributed to it, in evaluation order.
pub fn heuristic_score(meta: &SettlementMeta, options: &SettlementOptions) -> (f64, Vec<String>) {
    let mut score = 0.0;
    let mut factors = Vec::new();
    let recipient = meta.recipient.trim();

    if options
        .known_bad_recipients
        .iter()
        .any(|bad| bad.trim().eq_ignore_ascii_case(recipient))
    {
        score += KNOWN_BAD_WEIGHT;
        factors.push("recipient is on the known-bad list".to_string());
    }

    if let Some(rep) = meta.counterparty_reputation {
        if rep < options.low_reputation_threshold {
            score += LOW_REPUTATION_WEIGHT;
            factors.push(format!(
                "counterparty reputation {rep} is below {}",
                options.low_reputation_threshold
            ));
        }
    }

    if let Some(amount) = meta.amount {
        if amount > options.high_value_threshold {
            score += HIGH_VALUE_WEIGHT;
            factors.push(format!(
                "amount {amount} exceeds high-value threshold {}",
                options.high_value_threshold
            ));
        }
    }

    let description_len = meta
        .service_description
        .as_deref()
        .map_or(0, |d| d.trim().chars().count());
    if description_len < MIN_DESCRIPTION_CHARS {
        score += SHORT_DESCRIPTION_WEIGHT;
        factors.push("service description is missing or too short".to_string());
    }

    if recipient.eq_ignore_ascii_case(ZERO_ADDRESS) {
        score += ZERO_ADDRESS_WEIGHT;
        factors.push("recipient is the zero address".to_string());
    }

    (capped(score), factors)
}

fn describe(meta: &SettlementMeta, score: f64, factors: &[String]) -> String {
    let amount = match (meta.amount, meta.currency.as_deref()) {
        (Some(a), Some(c)) => format!("{a} {c}"),
        (Some(a), None) => a.to_string(),
        (None, _) => "unspecified".to_string(),
    };
    let reputation = meta
        .counterparty_reputation
        .map_or_else(|| "unknown".to_string(), |r| r.to_string());
    format!(
        "An autonomous agent wants to settle a payment.\n\
         Recipient: {}\n\
         Amount: {}\n\
         Counterparty reputation (0-1): {}\n\
         Service description: {}\n\
         Heuristic risk score: {} ({})\n\
         Classify as block if this payment looks fraudulent or manipulated.",
        meta.recipient,
        amount,
        reputation,
        meta.service_description.as_deref().unwrap_or("(none)"),
        score,
        if factors.is_empty() {
            "no factors".to_string()
        } else {
            factors.join("; ")
        }
    )
}

fn heuristic_reason(factors: &[String]) -> String {
    if factors.is_empty() {
        "No risk factors detected".to_string()
    } else {
        format!("Risk factors: {}", factors.join("; "))
    }
}

fn decide(score: f64) -> Classification {
    if score >= BLOCK_THRESHOLD {
        Classification::Block
    } else {
        Classification::Pass
    }
}

pub async fn settlement_guard(
    meta: &SettlementMeta,
    options: &SettlementOptions,
) -> RiskAssessment {
    let (score, factors) = heuristic_score(meta, options);

    if score >= SHORT_CIRCUIT_SCORE {
        tracing::warn!(
            event = "settlement_block",
            risk_score = score,
            factors = factors.len(),
            "high-risk settlement blocked by heuristics"
        );
        return RiskAssessment {
            classification: Classification::Block,
            reasoning: format!("High risk: {}", factors.join("; ")),
            risk_score: score,
            risk_factors: factors,
            provider_error: None,
        };
    }

    let mut provider_error: Option<ProviderError> = None;
    if options.deep_scan {
        if let Some(classifier) = options.classifier.as_deref() {
            let prompt = describe(meta, score, &factors);
            match classify_with_timeout(classifier, &prompt, options.timeout).await {
                Ok(verdict) => {
                    let combined = if verdict.classification.is_block() {
                        capped(score + DEEP_SCAN_PENALTY)
                    } else {
                        score
                    };
                    let classification = decide(combined);
                    log_decision(classification, combined);
                    let reasoning = if verdict.reasoning.is_empty() {
                        heuristic_reason(&factors)
                    } else {
                        verdict.reasoning
                    };
                    return RiskAssessment {
                        classification,
                        reasoning,
                        risk_score: combined,
                        risk_factors: factors,
                        provider_error: None,
                    };
                }
                Err(e) => {
                    report_provider_error("settlement", &e, options.on_error.as_ref());
                    provider_error = Some(e);
                }
            }
        }
    }

    let classification = decide(score);
    log_decision(classification, score);
    RiskAssessment {
        classification,
        reasoning: heuristic_reason(&factors),
        risk_score: score,
        risk_factors: factors,
        provider_error: provider_error.map(|e| e.to_string()),
    }
}

fn log_decision(classification: Classification, score: f64) {
    if classification.is_block() {
        tracing::warn!(event = "settlement_block", risk_score = score, "settlement blocked");
    } else {
        tracing::debug!(event = "settlement_pass", risk_score = score, "settlement allowed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::ClassifierVerdict;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingClassifier {
        calls: AtomicUsize,
        verdict: Result<ClassifierVerdict, ProviderError>,
    }

    impl CountingClassifier {
        fn new(verdict: Result<ClassifierVerdict, ProviderError>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                verdict,
            })
        }
    }

    #[async_trait]
    impl Classifier for CountingClassifier {
        async fn classify(&self, _text: &str) -> Result<ClassifierVerdict, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.verdict.clone()
        }
    }

    fn benign() -> SettlementMeta {
        SettlementMeta {
            recipient: "0x52908400098527886E0F7030069857D2E4169EE7".into(),
            amount: Some(25.0),
            currency: Some("USDC".into()),
            counterparty_reputation: Some(0.9),
            service_description: Some("Monthly API subscription".into()),
        }
    }

    fn deep(classifier: Arc<CountingClassifier>) -> SettlementOptions {
        SettlementOptions {
            deep_scan: true,
            classifier: Some(classifier),
            ..SettlementOptions::default()
        }
    }

    #[tokio::test]
    async fn benign_payment_passes() {
        let r = settlement_guard(&benign(), &SettlementOptions::default()).await;
        assert_eq!(r.classification, Classification::Pass);
        assert_eq!(r.risk_score, 0.0);
        assert!(r.risk_factors.is_empty());
    }

    #[tokio::test]
    async fn zero_address_always_blocks() {
        let meta = SettlementMeta {
            recipient: ZERO_ADDRESS.into(),
            ..benign()
        };
        let r = settlement_guard(&meta, &SettlementOptions::default()).await;
        assert!(r.is_blocked());
        assert_eq!(r.risk_score, 0.5);
        assert!(r.risk_factors.iter().any(|f| f.contains("zero address")));

        // A passing second opinion cannot rescue it
        let classifier = CountingClassifier::new(Ok(ClassifierVerdict::pass("looks fine")));
        let r = settlement_guard(&meta, &deep(classifier.clone())).await;
        assert!(r.is_blocked());
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn high_score_short_circuits_classifier() {
        let meta = SettlementMeta {
            recipient: ZERO_ADDRESS.into(),
            amount: Some(10.0),
            currency: None,
            counterparty_reputation: Some(0.1),
            service_description: Some("pay".into()),
        };
        let classifier = CountingClassifier::new(Ok(ClassifierVerdict::pass("fine")));
        let r = settlement_guard(&meta, &deep(classifier.clone())).await;
        assert!(r.is_blocked());
        assert!(r.risk_score >= SHORT_CIRCUIT_SCORE);
        assert_eq!(r.risk_factors.len(), 3);
        assert!(r.reasoning.starts_with("High risk: "));
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn known_bad_is_case_insensitive() {
        let options = SettlementOptions {
            known_bad_recipients: vec!["0xABCDEF0000000000000000000000000000000001".into()],
            ..SettlementOptions::default()
        };
        let meta = SettlementMeta {
            recipient: "0xabcdef0000000000000000000000000000000001".into(),
            ..benign()
        };
        let (score, factors) = heuristic_score(&meta, &options);
        assert_eq!(score, 0.5);
        assert_eq!(factors, vec!["recipient is on the known-bad list".to_string()]);
    }

    #[tokio::test]
    async fn classifier_block_adds_penalty() {
        let meta = SettlementMeta {
            amount: Some(900.0),
            ..benign()
        };
        let classifier = CountingClassifier::new(Ok(ClassifierVerdict::block(
            "recipient impersonates a known vendor",
        )));
        let r = settlement_guard(&meta, &deep(classifier)).await;
        assert_eq!(r.risk_score, 0.55);
        assert!(r.is_blocked());
        assert_eq!(r.reasoning, "recipient impersonates a known vendor");
    }

    #[tokio::test]
    async fn classifier_failure_falls_back_to_heuristics() {
        let reported = Arc::new(AtomicUsize::new(0));
        let seen = reported.clone();
        let classifier = CountingClassifier::new(Err(ProviderError::Transport("503".into())));
        let options = SettlementOptions {
            on_error: Some(Arc::new(move |_e: &ProviderError| {
                seen.fetch_add(1, Ordering::SeqCst);
            })),
            ..deep(classifier)
        };
        let meta = SettlementMeta {
            service_description: None,
            ..benign()
        };
        let r = settlement_guard(&meta, &options).await;
        assert_eq!(r.classification, Classification::Pass);
        assert_eq!(r.risk_score, 0.1);
        assert!(r.provider_error.unwrap().contains("503"));
        assert_eq!(reported.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn meta_deserializes_camel_case() {
        let meta: SettlementMeta = serde_json::from_str(
            r#"{"recipient":"0x1","amount":12.5,"counterpartyReputation":0.4,"serviceDescription":"GPU rental hours"}"#,
        )
        .unwrap();
        assert_eq!(meta.counterparty_reputation, Some(0.4));
        assert!(meta.currency.is_none());
    }
}

//! Sentiment classifier boundary: provider abstraction + bounded batch calls.
//!
//! The classifier is an external collaborator. Every provider returns
//! `Option<SentimentLabel>`: `None` means the call failed or the client is
//! disabled, and callers count the fragment as neutral instead of aborting
//! the product's metrics computation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::config::ClassifierConfig;
use crate::model::SentimentLabel;

/// Trait object used by the metrics calculator and tests.
#[async_trait]
pub trait SentimentClassifier: Send + Sync {
    /// Classify one text fragment. `None` on failure; never panics.
    async fn classify(&self, text: &str) -> Option<SentimentLabel>;
    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

pub type SharedClassifier = Arc<dyn SentimentClassifier>;

/// Factory: build a classifier according to config and environment.
///
/// * If `CLASSIFIER_TEST_MODE=mock`, returns the deterministic mock.
/// * Else if `config.enabled == false`, returns the neutral client.
/// * Else builds the configured provider wrapped with the concurrency bound.
pub fn build_classifier(config: &ClassifierConfig) -> SharedClassifier {
    if std::env::var("CLASSIFIER_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        return Arc::new(BoundedClassifier::new(
            MockClassifier,
            config.max_in_flight,
        ));
    }

    if !config.enabled {
        return Arc::new(NeutralClassifier);
    }

    match config.provider.as_deref() {
        Some(p) if p.eq_ignore_ascii_case("openai") => Arc::new(BoundedClassifier::new(
            HttpClassifier::new(None),
            config.max_in_flight,
        )),
        _ => Arc::new(NeutralClassifier),
    }
}

/// Classify many fragments concurrently, matching results back to their
/// originating index. The actual in-flight bound lives in the classifier
/// (see `BoundedClassifier`), so this helper only fans out and re-orders.
/// A failed task leaves `None` at its slot.
pub async fn classify_all(
    classifier: &SharedClassifier,
    texts: Vec<String>,
) -> Vec<Option<SentimentLabel>> {
    let mut out = vec![None; texts.len()];
    let mut tasks = JoinSet::new();
    for (idx, text) in texts.into_iter().enumerate() {
        let classifier = Arc::clone(classifier);
        tasks.spawn(async move {
            counter!("classifier_calls_total").increment(1);
            let label = classifier.classify(&text).await;
            if label.is_none() {
                counter!("classifier_failures_total").increment(1);
            }
            (idx, label)
        });
    }
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((idx, label)) => out[idx] = label,
            Err(e) => tracing::warn!(error = ?e, "classification task aborted"),
        }
    }
    out
}

// ------------------------------------------------------------
// Providers
// ------------------------------------------------------------

/// Always `None`; used when classification is disabled. Absent labels are
/// counted as neutral downstream, so a disabled classifier degrades to the
/// 0.5 sentiment default rather than skewing scores negative.
pub struct NeutralClassifier;

#[async_trait]
impl SentimentClassifier for NeutralClassifier {
    async fn classify(&self, _text: &str) -> Option<SentimentLabel> {
        None
    }
    fn provider_name(&self) -> &'static str {
        "disabled"
    }
}

/// Deterministic keyword mock for tests and local runs.
pub struct MockClassifier;

const POSITIVE_CUES: [&str; 6] = ["love", "great", "excellent", "amazing", "fantastic", "helpful"];
const NEGATIVE_CUES: [&str; 6] = ["hate", "terrible", "awful", "broken", "useless", "frustrating"];

#[async_trait]
impl SentimentClassifier for MockClassifier {
    async fn classify(&self, text: &str) -> Option<SentimentLabel> {
        let lowered = text.to_ascii_lowercase();
        if POSITIVE_CUES.iter().any(|c| lowered.contains(c)) {
            Some(SentimentLabel::Positive)
        } else if NEGATIVE_CUES.iter().any(|c| lowered.contains(c)) {
            Some(SentimentLabel::Negative)
        } else {
            Some(SentimentLabel::Neutral)
        }
    }
    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// Remote provider (Chat Completions API). Requires `SENTIMENT_API_KEY`.
pub struct HttpClassifier {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl HttpClassifier {
    /// `model_override`: pass Some("gpt-4o-mini") to override the default.
    pub fn new(model_override: Option<&str>) -> Self {
        let api_key = std::env::var("SENTIMENT_API_KEY").unwrap_or_default();
        let http = reqwest::Client::builder()
            .user_agent("product-ranking-engine/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(10))
            .build()
            .expect("reqwest client");
        let model = model_override.unwrap_or("gpt-4o-mini").to_string();
        Self {
            http,
            api_key,
            model,
        }
    }
}

#[async_trait]
impl SentimentClassifier for HttpClassifier {
    async fn classify(&self, text: &str) -> Option<SentimentLabel> {
        if self.api_key.is_empty() {
            return None;
        }

        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
            max_tokens: u32,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: String,
        }

        let sys = "You classify customer feedback sentiment. Reply with exactly one word: positive, neutral, or negative.";
        let req = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: sys,
                },
                Msg {
                    role: "user",
                    content: text,
                },
            ],
            temperature: 0.0,
            max_tokens: 4,
        };

        let resp = self
            .http
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .ok()?;
        if !resp.status().is_success() {
            return None;
        }
        let body: Resp = resp.json().await.ok()?;
        let content = body.choices.first()?.message.content.trim().to_ascii_lowercase();
        parse_label(&content)
    }
    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

fn parse_label(word: &str) -> Option<SentimentLabel> {
    if word.starts_with("positive") {
        Some(SentimentLabel::Positive)
    } else if word.starts_with("negative") {
        Some(SentimentLabel::Negative)
    } else if word.starts_with("neutral") {
        Some(SentimentLabel::Neutral)
    } else {
        None
    }
}

// ------------------------------------------------------------
// Concurrency bound
// ------------------------------------------------------------

/// Wrapper enforcing a global in-flight limit on the wrapped provider, so a
/// burst of feedback texts cannot flood a rate-limited external service.
pub struct BoundedClassifier<C> {
    inner: C,
    limit: Arc<Semaphore>,
}

impl<C: SentimentClassifier> BoundedClassifier<C> {
    pub fn new(inner: C, max_in_flight: usize) -> Self {
        Self {
            inner,
            limit: Arc::new(Semaphore::new(max_in_flight.max(1))),
        }
    }
}

#[async_trait]
impl<C: SentimentClassifier> SentimentClassifier for BoundedClassifier<C> {
    async fn classify(&self, text: &str) -> Option<SentimentLabel> {
        let _permit = self.limit.acquire().await.ok()?;
        self.inner.classify(text).await
    }
    fn provider_name(&self) -> &'static str {
        self.inner.provider_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_is_deterministic_on_cue_words() {
        let c = MockClassifier;
        assert_eq!(
            c.classify("I love the new dashboard").await,
            Some(SentimentLabel::Positive)
        );
        assert_eq!(
            c.classify("export is broken again").await,
            Some(SentimentLabel::Negative)
        );
        assert_eq!(
            c.classify("it exists, I suppose").await,
            Some(SentimentLabel::Neutral)
        );
    }

    #[tokio::test]
    async fn classify_all_preserves_input_order() {
        let classifier: SharedClassifier = Arc::new(MockClassifier);
        let labels = classify_all(
            &classifier,
            vec![
                "terrible latency".to_string(),
                "great support team".to_string(),
                "fine".to_string(),
            ],
        )
        .await;
        assert_eq!(
            labels,
            vec![
                Some(SentimentLabel::Negative),
                Some(SentimentLabel::Positive),
                Some(SentimentLabel::Neutral),
            ]
        );
    }

    #[tokio::test]
    async fn bounded_wrapper_passes_through_results() {
        let bounded = BoundedClassifier::new(MockClassifier, 2);
        assert_eq!(
            bounded.classify("amazing release").await,
            Some(SentimentLabel::Positive)
        );
        assert_eq!(bounded.provider_name(), "mock");
    }

    #[tokio::test]
    async fn neutral_client_returns_none() {
        assert_eq!(NeutralClassifier.classify("anything").await, None);
    }

    #[test]
    fn label_parsing_tolerates_punctuation() {
        assert_eq!(parse_label("positive."), Some(SentimentLabel::Positive));
        assert_eq!(parse_label("negative!"), Some(SentimentLabel::Negative));
        assert_eq!(parse_label("sideways"), None);
    }
}

//! AI orchestration client.
//!
//! Wraps a [`GenerativeProvider`] behind the retry executor and owns the
//! sequential-gating rule for multi-step turnaround generation: the
//! upstream quota is shared and low, so viewpoint calls are serialized
//! with a fixed cool-down between them, never parallelized.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::ai::provider::{GeminiProvider, GenerativeProvider};
use crate::ai::retry::{RetryExecutor, Sleep, TokioSleep};
use crate::config::AiConfig;
use crate::error::AiError;
use crate::models::{
    ClassificationRecord, ClothingItem, OutfitSuggestion, Profile, TryOnImageSet, Viewpoint,
};

/// Cool-down between successful viewpoint generations, on top of any
/// retry backoff inside an individual call.
pub const TURNAROUND_PAUSE: Duration = Duration::from_millis(4_000);

/// Client for classification, outfit suggestions and try-on generation.
pub struct AiClient {
    provider: Arc<dyn GenerativeProvider>,
    executor: RetryExecutor,
    sleep: Arc<dyn Sleep>,
}

impl AiClient {
    pub fn from_config(config: &AiConfig) -> Self {
        Self::with_provider(Arc::new(GeminiProvider::from_config(config)))
    }

    pub fn with_provider(provider: Arc<dyn GenerativeProvider>) -> Self {
        Self::with_provider_and_sleep(provider, Arc::new(TokioSleep))
    }

    /// Full injection point: tests pass a recording sleep here so both the
    /// retry backoff and the inter-step pause run without real timers.
    pub fn with_provider_and_sleep(
        provider: Arc<dyn GenerativeProvider>,
        sleep: Arc<dyn Sleep>,
    ) -> Self {
        Self {
            provider,
            executor: RetryExecutor::with_sleep(sleep.clone()),
            sleep,
        }
    }

    /// Whether the underlying provider has credentials.
    pub fn is_configured(&self) -> bool {
        self.provider.is_configured()
    }

    /// Classify one garment image (base64 payload).
    ///
    /// `NotConfigured` keeps its kind so callers can branch into manual
    /// entry without treating it as a hard failure.
    pub async fn classify(
        &self,
        image: &str,
        cancel: &CancellationToken,
    ) -> Result<ClassificationRecord, AiError> {
        self.executor
            .execute(cancel, || self.provider.classify(image))
            .await
    }

    /// Classification with the manual-entry fallback folded in: a missing
    /// API key yields the empty record instead of an error.
    pub async fn classify_or_default(
        &self,
        image: &str,
        cancel: &CancellationToken,
    ) -> Result<ClassificationRecord, AiError> {
        match self.classify(image, cancel).await {
            Err(AiError::NotConfigured) => {
                tracing::info!("AI not configured, returning empty record for manual entry");
                Ok(ClassificationRecord::default())
            }
            other => other,
        }
    }

    /// Ask the stylist for an outfit. Degrades to a canned message rather
    /// than failing: suggestions are advisory, not load-bearing.
    pub async fn suggest_outfit(
        &self,
        profile: &Profile,
        inventory: &[ClothingItem],
        occasion: &str,
        cancel: &CancellationToken,
    ) -> Result<OutfitSuggestion, AiError> {
        let result = self
            .executor
            .execute(cancel, || {
                self.provider.suggest_outfit(profile, inventory, occasion)
            })
            .await;

        match result {
            Ok(suggestion) => Ok(suggestion),
            Err(AiError::Cancelled) => Err(AiError::Cancelled),
            Err(AiError::NotConfigured) => Ok(OutfitSuggestion {
                suggestion: "The AI stylist is offline. Add an API key to enable suggestions."
                    .to_string(),
                recommended_item_ids: Vec::new(),
            }),
            Err(err) => {
                tracing::warn!(error = %err, "outfit suggestion failed");
                Ok(OutfitSuggestion {
                    suggestion:
                        "I couldn't generate a suggestion right now due to high traffic. \
                         Try again in a moment!"
                            .to_string(),
                    recommended_item_ids: Vec::new(),
                })
            }
        }
    }

    /// Generate the four-viewpoint turnaround for an outfit, strictly
    /// sequentially: front, left, right, back, with a fixed cool-down
    /// after each successful generation.
    ///
    /// The first unrecoverable failure aborts the whole batch; completed
    /// viewpoints are discarded and the terminal error is returned. A
    /// retry by the caller starts over from the front view.
    pub async fn generate_turnaround(
        &self,
        reference: &str,
        items: &[ClothingItem],
        cancel: &CancellationToken,
    ) -> Result<TryOnImageSet, AiError> {
        let mut rendered: Vec<String> = Vec::with_capacity(Viewpoint::ALL.len());

        for (step, viewpoint) in Viewpoint::ALL.into_iter().enumerate() {
            if step > 0 {
                // Cool-down between steps, independent of retry backoff.
                tokio::select! {
                    _ = cancel.cancelled() => return Err(AiError::Cancelled),
                    _ = self.sleep.sleep(TURNAROUND_PAUSE) => {}
                }
            }

            let image = self
                .executor
                .execute(cancel, || {
                    self.provider.generate_view(reference, items, viewpoint)
                })
                .await
                .map_err(|err| {
                    tracing::warn!(
                        %viewpoint,
                        error = %err,
                        "viewpoint generation failed, aborting turnaround"
                    );
                    err
                })?;

            tracing::debug!(%viewpoint, "viewpoint generated");
            rendered.push(image);
        }

        let [front, left, right, back]: [String; 4] = rendered
            .try_into()
            .map_err(|_| AiError::InvalidResponse("incomplete turnaround batch".into()))?;

        Ok(TryOnImageSet {
            front,
            left,
            right,
            back,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::retry::tests::RecordingSleep;
    use crate::models::{ClothingCategory, Gender};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Scripted provider: records viewpoint order and fails on demand.
    #[derive(Default)]
    struct ScriptedProvider {
        configured: bool,
        calls: Mutex<Vec<Viewpoint>>,
        /// 1-based call index that should fail, with the error to return.
        fail_on: Option<(u32, AiError)>,
        call_count: AtomicU32,
        /// Number of leading calls that rate-limit before succeeding.
        rate_limit_first: u32,
    }

    impl ScriptedProvider {
        fn configured() -> Self {
            Self {
                configured: true,
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl GenerativeProvider for ScriptedProvider {
        async fn classify(&self, _image: &str) -> Result<ClassificationRecord, AiError> {
            if !self.configured {
                return Err(AiError::NotConfigured);
            }
            Ok(ClassificationRecord {
                category: Some(ClothingCategory::Top),
                color: "Navy".to_string(),
                style: "Minimalist".to_string(),
                material: "Cotton".to_string(),
                description: "A navy top".to_string(),
            })
        }

        async fn generate_view(
            &self,
            _reference: &str,
            _items: &[ClothingItem],
            viewpoint: Viewpoint,
        ) -> Result<String, AiError> {
            if !self.configured {
                return Err(AiError::NotConfigured);
            }
            let call = self.call_count.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.rate_limit_first {
                return Err(AiError::RateLimited("HTTP 429".into()));
            }
            if let Some((fail_call, err)) = &self.fail_on {
                if call == *fail_call {
                    return Err(err.clone());
                }
            }
            self.calls.lock().unwrap().push(viewpoint);
            Ok(format!("image-{viewpoint}"))
        }

        async fn suggest_outfit(
            &self,
            _profile: &Profile,
            _inventory: &[ClothingItem],
            _occasion: &str,
        ) -> Result<OutfitSuggestion, AiError> {
            if !self.configured {
                return Err(AiError::NotConfigured);
            }
            Ok(OutfitSuggestion {
                suggestion: "Wear the navy top.".to_string(),
                recommended_item_ids: vec!["item-1".to_string()],
            })
        }

        fn is_configured(&self) -> bool {
            self.configured
        }

        fn provider_name(&self) -> &'static str {
            "scripted"
        }
    }

    fn profile() -> Profile {
        Profile {
            name: "Ada".to_string(),
            gender: Gender::Female,
            height_cm: 170,
            weight_kg: 60,
            skin_tone: "Warm Olive".to_string(),
            skin_tone_hex: "#b08d57".to_string(),
            style_preference: None,
            body_photo: None,
        }
    }

    #[tokio::test]
    async fn test_turnaround_runs_viewpoints_in_order_with_pauses() {
        let provider = Arc::new(ScriptedProvider::configured());
        let sleep = Arc::new(RecordingSleep::default());
        let client = AiClient::with_provider_and_sleep(provider.clone(), sleep.clone());
        let cancel = CancellationToken::new();

        let set = client
            .generate_turnaround("cmVm", &[], &cancel)
            .await
            .unwrap();

        assert_eq!(set.front, "image-front");
        assert_eq!(set.back, "image-back");
        assert_eq!(*provider.calls.lock().unwrap(), Viewpoint::ALL.to_vec());
        // Three cool-downs between four steps, no retry backoff.
        assert_eq!(sleep.requested_ms(), vec![4000, 4000, 4000]);
    }

    #[tokio::test]
    async fn test_turnaround_aborts_on_third_viewpoint_failure() {
        let provider = Arc::new(ScriptedProvider {
            configured: true,
            fail_on: Some((3, AiError::Remote("image blocked".into()))),
            ..Default::default()
        });
        let sleep = Arc::new(RecordingSleep::default());
        let client = AiClient::with_provider_and_sleep(provider.clone(), sleep.clone());
        let cancel = CancellationToken::new();

        let result = client.generate_turnaround("cmVm", &[], &cancel).await;

        assert_eq!(result, Err(AiError::Remote("image blocked".into())));
        // Only the two completed viewpoints ever rendered, and the caller
        // gets no partial set to persist.
        assert_eq!(
            *provider.calls.lock().unwrap(),
            vec![Viewpoint::Front, Viewpoint::Left]
        );
    }

    #[tokio::test]
    async fn test_turnaround_absorbs_rate_limit_inside_one_step() {
        let provider = Arc::new(ScriptedProvider {
            configured: true,
            rate_limit_first: 1,
            ..Default::default()
        });
        let sleep = Arc::new(RecordingSleep::default());
        let client = AiClient::with_provider_and_sleep(provider, sleep.clone());
        let cancel = CancellationToken::new();

        client
            .generate_turnaround("cmVm", &[], &cancel)
            .await
            .unwrap();

        // One backoff wait inside the front step, then the three pauses.
        assert_eq!(sleep.requested_ms(), vec![5000, 4000, 4000, 4000]);
    }

    #[tokio::test]
    async fn test_turnaround_cancelled_during_pause() {
        // A sleep that cancels the token when the pause is requested, so
        // the select observes cancellation before the next call.
        struct CancellingSleep {
            cancel: CancellationToken,
        }

        #[async_trait]
        impl Sleep for CancellingSleep {
            async fn sleep(&self, _duration: Duration) {
                self.cancel.cancel();
                // Yield so the cancelled branch is observable.
                std::future::pending::<()>().await;
            }
        }

        let cancel = CancellationToken::new();
        let provider = Arc::new(ScriptedProvider::configured());
        let client = AiClient::with_provider_and_sleep(
            provider.clone(),
            Arc::new(CancellingSleep {
                cancel: cancel.clone(),
            }),
        );

        let result = client.generate_turnaround("cmVm", &[], &cancel).await;

        assert_eq!(result, Err(AiError::Cancelled));
        assert_eq!(*provider.calls.lock().unwrap(), vec![Viewpoint::Front]);
    }

    #[tokio::test]
    async fn test_classify_or_default_falls_back_when_unconfigured() {
        let client = AiClient::with_provider(Arc::new(ScriptedProvider::default()));
        let cancel = CancellationToken::new();

        assert_eq!(
            client.classify("QUJD", &cancel).await,
            Err(AiError::NotConfigured)
        );

        let record = client.classify_or_default("QUJD", &cancel).await.unwrap();
        assert_eq!(record, ClassificationRecord::default());
    }

    #[tokio::test]
    async fn test_suggest_outfit_degrades_to_offline_message() {
        let client = AiClient::with_provider(Arc::new(ScriptedProvider::default()));
        let cancel = CancellationToken::new();

        let suggestion = client
            .suggest_outfit(&profile(), &[], "gallery opening", &cancel)
            .await
            .unwrap();

        assert!(suggestion.suggestion.contains("offline"));
        assert!(suggestion.recommended_item_ids.is_empty());
    }

    #[tokio::test]
    async fn test_suggest_outfit_passes_through_on_success() {
        let client = AiClient::with_provider(Arc::new(ScriptedProvider::configured()));
        let cancel = CancellationToken::new();

        let suggestion = client
            .suggest_outfit(&profile(), &[], "gallery opening", &cancel)
            .await
            .unwrap();

        assert_eq!(suggestion.recommended_item_ids, vec!["item-1"]);
    }
}

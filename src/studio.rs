//! Studio features beyond sketch-to-artifact generation: design variations,
//! pre-order simulation, factory chat and market news.

use chrono::Utc;
use futures::future::join_all;
use serde::Deserialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::gemini::{ImageRequest, PromptPart, StructuredRequest, TextRequest};
use crate::models::{
    ChatMessage, ImagePayload, Lang, MarketReaction, NewsArticle, NewsRegion, TechPackMeta, Variation, VariationRequest,
};
use crate::orchestrator::{Orchestrator, OrchestratorError};
use crate::prompts;

const VARIATION_COUNT: usize = 3;

impl Orchestrator {
    /// Three independent variations of a sketch. Failed ones are dropped.
    pub async fn generate_variations(&self, req: &VariationRequest) -> Result<Vec<Variation>, OrchestratorError> {
        self.ensure_configured()?;
        let base = ImagePayload::parse(&req.base_image).map_err(OrchestratorError::InvalidImage)?;
        let reference = req
            .reference_image
            .as_deref()
            .map(ImagePayload::parse)
            .transpose()
            .map_err(|e| OrchestratorError::InvalidImage(format!("reference image: {e}")))?;
        let focus = req.axes.first().cloned().unwrap_or_else(|| "Design".to_string());

        let attempts = (0..VARIATION_COUNT).map(|idx| {
            let mut parts = vec![
                PromptPart::Text(prompts::variation_prompt(idx, &req.axes, req.intensity, reference.is_some())),
                PromptPart::Image(base.clone()),
            ];
            if let Some(reference) = &reference {
                parts.push(PromptPart::Image(reference.clone()));
            }
            async move { (idx, self.ai().generate_image(ImageRequest { parts, aspect_ratio: "3:4".into() }).await) }
        });

        let variations: Vec<Variation> = join_all(attempts)
            .await
            .into_iter()
            .filter_map(|(idx, res)| match res {
                Ok(image) if !image.is_empty() => Some(Variation {
                    id: Uuid::new_v4(),
                    thumbnail: image.to_data_url(),
                    title: format!("Variation {}: {} Focus", idx + 1, focus),
                    tags: req.axes.clone(),
                    note: "AI Generated".to_string(),
                }),
                Ok(_) => None,
                Err(e) => {
                    warn!("❌ Variation {} failed: {}", idx + 1, e);
                    None
                }
            })
            .collect();

        info!("✅ Generated {}/{} variations", variations.len(), VARIATION_COUNT);
        Ok(variations)
    }

    pub async fn simulate_market_reaction(
        &self,
        image: &str,
        meta: &TechPackMeta,
    ) -> Result<MarketReaction, OrchestratorError> {
        self.ensure_configured()?;
        let image = ImagePayload::parse(image).map_err(OrchestratorError::InvalidImage)?;
        let text = self
            .ai()
            .generate_structured(StructuredRequest {
                parts: vec![PromptPart::Image(image), PromptPart::Text(prompts::market_reaction_prompt(meta))],
                schema: prompts::market_reaction_schema(),
                system_instruction: None,
                temperature: None,
                google_search: false,
            })
            .await?;
        serde_json::from_str(text.trim())
            .map_err(|e| OrchestratorError::Ai(crate::gemini::AiError::Decode(format!("market reaction: {e}"))))
    }

    /// Short factory-manager reply. Falls back to a canned acknowledgement when the model gives nothing.
    pub async fn factory_response(
        &self,
        history: &[ChatMessage],
        meta: &TechPackMeta,
        lang: Lang,
    ) -> Result<String, OrchestratorError> {
        self.ensure_configured()?;
        let prompt = prompts::factory_chat_prompt(history, meta, lang);
        let reply = match self.ai().generate_text(TextRequest { prompt }).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => String::new(),
            Err(e) => {
                warn!("❌ Factory reply failed: {}", e);
                String::new()
            }
        };
        if reply.is_empty() {
            return Ok(lang
                .pick("확인했습니다. 수정 진행하겠습니다.", "Received. Will proceed with corrections.")
                .to_string());
        }
        Ok(reply)
    }

    /// Search-grounded news digest. An unparseable answer yields no articles.
    pub async fn fashion_news(&self, lang: Lang, region: NewsRegion) -> Result<Vec<NewsArticle>, OrchestratorError> {
        self.ensure_configured()?;
        let text = self
            .ai()
            .generate_structured(StructuredRequest {
                parts: vec![PromptPart::Text(prompts::news_prompt(lang, region))],
                schema: prompts::news_schema(),
                system_instruction: Some(prompts::NEWS_SYSTEM_PROMPT.to_string()),
                temperature: None,
                google_search: true,
            })
            .await?;

        #[derive(Deserialize, Default)]
        #[serde(default)]
        struct NewsEnvelope {
            articles: Vec<NewsArticle>,
        }

        match serde_json::from_str::<NewsEnvelope>(text.trim()) {
            Ok(envelope) => Ok(envelope.articles.into_iter().map(normalize_article).collect()),
            Err(e) => {
                error!("Failed to parse news JSON: {}", e);
                Ok(Vec::new())
            }
        }
    }
}

fn normalize_article(mut article: NewsArticle) -> NewsArticle {
    if article.source.trim().is_empty() {
        article.source = source_from_url(&article.url).unwrap_or_else(|| "google.com".to_string());
    }
    if article.date.trim().is_empty() {
        article.date = Utc::now().format("%Y-%m-%d").to_string();
    }
    if article.summary.trim().is_empty() {
        article.summary = "No analysis available.".to_string();
    }
    article.thumbnail = article.thumbnail.filter(|t| t.starts_with("http://") || t.starts_with("https://"));
    article
}

fn source_from_url(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(host.strip_prefix("www.").unwrap_or(host).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::{AiError, GenerativeAi};
    use crate::models::{ChatMessageKind, ChatSender, TEST_PNG_B64};
    use crate::orchestrator::OrchestratorSettings;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Default)]
    struct ScriptedAi {
        structured: Mutex<Option<String>>,
        text: Mutex<Option<String>>,
        image_calls: AtomicUsize,
        /// Image calls whose 1-based number is listed here fail.
        failing_images: Vec<usize>,
        search_requested: Mutex<Option<bool>>,
    }

    #[async_trait]
    impl GenerativeAi for ScriptedAi {
        async fn generate_structured(&self, req: StructuredRequest) -> Result<String, AiError> {
            *self.search_requested.lock() = Some(req.google_search);
            self.structured.lock().clone().ok_or(AiError::EmptyResponse)
        }

        async fn generate_image(&self, _req: ImageRequest) -> Result<ImagePayload, AiError> {
            let n = self.image_calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.failing_images.contains(&n) {
                Err(AiError::NoImage)
            } else {
                Ok(ImagePayload::new("dmFy", "image/png"))
            }
        }

        async fn generate_text(&self, _req: TextRequest) -> Result<String, AiError> {
            self.text.lock().clone().ok_or(AiError::Http("reset".into()))
        }
    }

    fn studio(ai: Arc<ScriptedAi>) -> Orchestrator {
        Orchestrator::new(ai, OrchestratorSettings { credential_present: true, branch_timeout: Duration::from_secs(5) })
    }

    #[tokio::test]
    async fn variations_drop_failed_attempts() {
        let ai = Arc::new(ScriptedAi { failing_images: vec![2], ..Default::default() });
        let req = VariationRequest {
            base_image: TEST_PNG_B64.into(),
            axes: vec!["Color".into(), "Silhouette".into()],
            intensity: 4,
            reference_image: None,
        };
        let variations = studio(ai.clone()).generate_variations(&req).await.unwrap();

        assert_eq!(ai.image_calls.load(Ordering::SeqCst), 3);
        assert_eq!(variations.len(), 2);
        assert!(variations.iter().all(|v| v.title.ends_with(": Color Focus")));
        assert!(variations.iter().all(|v| v.thumbnail == "data:image/png;base64,dmFy"));
        assert_eq!(variations[0].tags, vec!["Color".to_string(), "Silhouette".to_string()]);
    }

    #[tokio::test]
    async fn variations_require_credential() {
        let ai = Arc::new(ScriptedAi::default());
        let orch = Orchestrator::new(
            ai.clone(),
            OrchestratorSettings { credential_present: false, branch_timeout: Duration::from_secs(5) },
        );
        let req = VariationRequest { base_image: TEST_PNG_B64.into(), axes: vec![], intensity: 3, reference_image: None };
        assert!(matches!(orch.generate_variations(&req).await, Err(OrchestratorError::Configuration(_))));
        assert_eq!(ai.image_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn market_reaction_decodes_schema() {
        let ai = Arc::new(ScriptedAi::default());
        *ai.structured.lock() = Some(
            r#"{"fundingRate":120,"backers":340,"chips":["clean"],"feedback":{"praise":"fit"},"demographics":[{"label":"18-24","percent":60}]}"#
                .into(),
        );
        let reaction = studio(ai).simulate_market_reaction(TEST_PNG_B64, &TechPackMeta::default()).await.unwrap();
        assert_eq!(reaction.funding_rate, 120);
        assert_eq!(reaction.backers, 340);
        assert_eq!(reaction.feedback.praise, "fit");
        assert_eq!(reaction.demographics[0].percent, 60);
    }

    #[tokio::test]
    async fn market_reaction_rejects_bad_json() {
        let ai = Arc::new(ScriptedAi::default());
        *ai.structured.lock() = Some("no idea".into());
        let err = studio(ai).simulate_market_reaction(TEST_PNG_B64, &TechPackMeta::default()).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::Ai(AiError::Decode(_))));
    }

    #[tokio::test]
    async fn factory_reply_falls_back_when_model_fails() {
        let history = vec![ChatMessage {
            sender: ChatSender::User,
            text: "When is the sample ready?".into(),
            kind: ChatMessageKind::Text,
            qc_data: None,
        }];
        let ai = Arc::new(ScriptedAi::default());
        let reply = studio(ai.clone()).factory_response(&history, &TechPackMeta::default(), Lang::Ko).await.unwrap();
        assert_eq!(reply, "확인했습니다. 수정 진행하겠습니다.");

        *ai.text.lock() = Some("  Next Friday.  ".into());
        let reply = studio(ai).factory_response(&history, &TechPackMeta::default(), Lang::En).await.unwrap();
        assert_eq!(reply, "Next Friday.");
    }

    #[tokio::test]
    async fn news_articles_are_normalized() {
        let ai = Arc::new(ScriptedAi::default());
        *ai.structured.lock() = Some(
            r#"{"articles":[{"title":"Drop","url":"https://www.hypebeast.com/x","thumbnail":"not-a-url"},
                            {"title":"Show","url":"https://vogue.com/y","source":"Vogue","date":"2025-01-01","summary":"Big."}]}"#
                .into(),
        );
        let articles = studio(ai.clone()).fashion_news(Lang::En, NewsRegion::NewDrops).await.unwrap();

        assert_eq!(*ai.search_requested.lock(), Some(true));
        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].source, "hypebeast.com");
        assert_eq!(articles[0].summary, "No analysis available.");
        assert!(!articles[0].date.is_empty());
        assert!(articles[0].thumbnail.is_none());
        assert_eq!(articles[1].source, "Vogue");
        assert_eq!(articles[1].date, "2025-01-01");
    }

    #[tokio::test]
    async fn unparseable_news_is_empty() {
        let ai = Arc::new(ScriptedAi::default());
        *ai.structured.lock() = Some("<html>".into());
        let articles = studio(ai).fashion_news(Lang::En, NewsRegion::Global).await.unwrap();
        assert!(articles.is_empty());
    }
}

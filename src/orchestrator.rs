//! Sketch-to-artifact generation.
//!
//! A tool selector picks a fixed subset of branches (tech pack document, flat
//! sketch, styled photo). The selected branches run concurrently, each under its
//! own deadline, and every branch settles into a [`BranchOutcome`]. Failed
//! branches simply leave their field out of the [`GenerationResult`]; only a
//! missing credential fails the whole request.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::gemini::{AiError, GenerativeAi, ImageRequest, PromptPart, StructuredRequest};
use crate::models::{
    BranchKind, GenerationRequest, GenerationResult, ImagePayload, Lang, PreviewOptions, TechPack, TechPackMeta,
    ToolAction, ToolSelector,
};
use crate::prompts;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("invalid image: {0}")]
    InvalidImage(String),
    #[error(transparent)]
    Ai(#[from] AiError),
}

#[derive(Debug, Error)]
pub enum BranchError {
    #[error(transparent)]
    Ai(#[from] AiError),
    #[error("response did not match the tech pack schema: {0}")]
    Validation(String),
    #[error("response contained no image")]
    MissingImage,
    #[error("invalid input image: {0}")]
    InvalidInput(String),
    #[error("branch timed out after {0:?}")]
    TimedOut(Duration),
}

/// Settled result of one branch.
#[derive(Debug)]
pub enum BranchOutcome {
    Document(Result<TechPack, BranchError>),
    FlatSketch(Result<ImagePayload, BranchError>),
    StyledPhoto(Result<ImagePayload, BranchError>),
}

impl BranchOutcome {
    pub fn failed(kind: BranchKind, error: BranchError) -> Self {
        match kind {
            BranchKind::Document => BranchOutcome::Document(Err(error)),
            BranchKind::FlatSketch => BranchOutcome::FlatSketch(Err(error)),
            BranchKind::StyledPhoto => BranchOutcome::StyledPhoto(Err(error)),
        }
    }

    pub fn kind(&self) -> BranchKind {
        match self {
            BranchOutcome::Document(_) => BranchKind::Document,
            BranchOutcome::FlatSketch(_) => BranchKind::FlatSketch,
            BranchOutcome::StyledPhoto(_) => BranchKind::StyledPhoto,
        }
    }

    pub fn error(&self) -> Option<&BranchError> {
        match self {
            BranchOutcome::Document(r) => r.as_ref().err(),
            BranchOutcome::FlatSketch(r) | BranchOutcome::StyledPhoto(r) => r.as_ref().err(),
        }
    }
}

/// Branches a tool runs. Unknown selectors run nothing.
pub fn select_branches(tool: ToolSelector) -> BTreeSet<BranchKind> {
    use BranchKind::*;
    let kinds: &[BranchKind] = match tool {
        ToolSelector::AiPack => &[Document, FlatSketch, StyledPhoto],
        ToolSelector::ProTechpack => &[Document],
        ToolSelector::ClothOnlyFlat | ToolSelector::RealFlat => &[FlatSketch],
        ToolSelector::FitPreview | ToolSelector::MaterialEnhance => &[StyledPhoto],
        ToolSelector::Unknown => &[],
    };
    kinds.iter().copied().collect()
}

/// Decoded inputs shared read-only by every branch of one request.
#[derive(Debug, Clone)]
pub struct BranchContext {
    pub image: ImagePayload,
    pub swatch: Option<ImagePayload>,
    pub options: PreviewOptions,
    pub meta: Option<TechPackMeta>,
}

impl BranchContext {
    /// Fails only on an undecodable base image. A bad top swatch is dropped.
    pub fn from_request(req: &GenerationRequest) -> Result<Self, String> {
        let image = ImagePayload::parse(&req.image)?;
        let swatch = req.top_swatches.first().and_then(|s| match ImagePayload::parse(s) {
            Ok(swatch) => Some(swatch),
            Err(e) => {
                warn!("⚠️ Ignoring undecodable top swatch: {e}");
                None
            }
        });
        Ok(Self { image, swatch, options: req.options.clone(), meta: req.meta.clone() })
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub credential_present: bool,
    pub branch_timeout: Duration,
}

impl From<&AppConfig> for OrchestratorSettings {
    fn from(config: &AppConfig) -> Self {
        Self { credential_present: config.api_key.is_some(), branch_timeout: config.branch_timeout }
    }
}

pub struct Orchestrator {
    ai: Arc<dyn GenerativeAi>,
    settings: OrchestratorSettings,
}

impl Orchestrator {
    pub fn new(ai: Arc<dyn GenerativeAi>, settings: OrchestratorSettings) -> Self {
        Self { ai, settings }
    }

    pub fn ai(&self) -> &Arc<dyn GenerativeAi> {
        &self.ai
    }

    pub fn ensure_configured(&self) -> Result<(), OrchestratorError> {
        if self.settings.credential_present {
            Ok(())
        } else {
            Err(OrchestratorError::Configuration("API Key missing".into()))
        }
    }

    pub async fn process(&self, req: &GenerationRequest) -> Result<GenerationResult, OrchestratorError> {
        let lang = req.options.lang;
        if req.action == ToolAction::SendConfirmation {
            return Ok(GenerationResult {
                ui_message: lang.pick("발송 완료", "Sent successfully").to_string(),
                ..Default::default()
            });
        }
        self.ensure_configured()?;

        let branches = select_branches(req.tool);
        info!(
            "🎯 Tool {:?} selected {} branch(es): {:?} ({} top / {} bottom swatches)",
            req.tool,
            branches.len(),
            branches,
            req.top_swatches.len(),
            req.bottom_swatches.len()
        );

        if branches.is_empty() {
            return Ok(aggregate(Vec::new(), lang, req.meta.as_ref()));
        }

        let outcomes = match BranchContext::from_request(req) {
            Ok(ctx) => self.dispatch(&branches, &ctx).await,
            Err(reason) => {
                warn!("❌ Base image rejected, failing {} branch(es): {reason}", branches.len());
                branches
                    .iter()
                    .map(|&kind| BranchOutcome::failed(kind, BranchError::InvalidInput(reason.clone())))
                    .collect()
            }
        };
        let result = aggregate(outcomes, lang, req.meta.as_ref());
        if result.is_empty() {
            warn!("⚠️ Every selected branch failed for tool {:?}", req.tool);
        }
        Ok(result)
    }

    /// Runs all branches concurrently and waits for every one of them to settle.
    pub async fn dispatch(&self, branches: &BTreeSet<BranchKind>, ctx: &BranchContext) -> Vec<BranchOutcome> {
        join_all(branches.iter().map(|&kind| self.run_branch(kind, ctx))).await
    }

    async fn run_branch(&self, kind: BranchKind, ctx: &BranchContext) -> BranchOutcome {
        let started = Instant::now();
        let deadline = self.settings.branch_timeout;
        let outcome = match kind {
            BranchKind::Document => BranchOutcome::Document(with_deadline(deadline, self.document_branch(ctx)).await),
            BranchKind::FlatSketch => {
                BranchOutcome::FlatSketch(with_deadline(deadline, self.flat_sketch_branch(ctx)).await)
            }
            BranchKind::StyledPhoto => {
                BranchOutcome::StyledPhoto(with_deadline(deadline, self.styled_photo_branch(ctx)).await)
            }
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match outcome.error() {
            None => info!(branch = ?outcome.kind(), elapsed_ms, "✅ Branch settled"),
            Some(e) => warn!(branch = ?outcome.kind(), elapsed_ms, error = %e, "❌ Branch failed"),
        }
        outcome
    }

    async fn document_branch(&self, ctx: &BranchContext) -> Result<TechPack, BranchError> {
        let text = self
            .ai
            .generate_structured(StructuredRequest {
                parts: vec![
                    PromptPart::Image(ctx.image.clone()),
                    PromptPart::Text(prompts::techpack_user_prompt(&ctx.options, ctx.meta.as_ref())),
                ],
                schema: prompts::techpack_schema(),
                system_instruction: Some(prompts::techpack_system_prompt(ctx.options.lang)),
                temperature: Some(0.1),
                google_search: false,
            })
            .await?;
        decode_tech_pack(&text)
    }

    async fn flat_sketch_branch(&self, ctx: &BranchContext) -> Result<ImagePayload, BranchError> {
        let req = ImageRequest {
            parts: vec![PromptPart::Text(prompts::flat_sketch_prompt(&ctx.options)), PromptPart::Image(ctx.image.clone())],
            aspect_ratio: "4:3".into(),
        };
        image_result(self.ai.generate_image(req).await)
    }

    async fn styled_photo_branch(&self, ctx: &BranchContext) -> Result<ImagePayload, BranchError> {
        let mut parts =
            vec![PromptPart::Text(prompts::styled_photo_prompt(&ctx.options)), PromptPart::Image(ctx.image.clone())];
        if let Some(swatch) = &ctx.swatch {
            parts.push(PromptPart::Image(swatch.clone()));
        }
        image_result(self.ai.generate_image(ImageRequest { parts, aspect_ratio: "3:4".into() }).await)
    }
}

async fn with_deadline<T, F>(deadline: Duration, fut: F) -> Result<T, BranchError>
where
    F: std::future::Future<Output = Result<T, BranchError>>,
{
    tokio::time::timeout(deadline, fut)
        .await
        .unwrap_or(Err(BranchError::TimedOut(deadline)))
}

fn image_result(res: Result<ImagePayload, AiError>) -> Result<ImagePayload, BranchError> {
    match res {
        Ok(image) if image.is_empty() => Err(BranchError::MissingImage),
        Ok(image) => Ok(image),
        Err(AiError::NoImage) => Err(BranchError::MissingImage),
        Err(e) => Err(e.into()),
    }
}

/// Models occasionally wrap JSON mode output in a markdown fence.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}

pub fn decode_tech_pack(text: &str) -> Result<TechPack, BranchError> {
    serde_json::from_str(strip_code_fence(text)).map_err(|e| BranchError::Validation(e.to_string()))
}

/// Merges settled outcomes. Never fails; failed or empty branches leave their field absent.
pub fn aggregate<I>(outcomes: I, lang: Lang, meta: Option<&TechPackMeta>) -> GenerationResult
where
    I: IntoIterator<Item = BranchOutcome>,
{
    let mut result = GenerationResult {
        ui_message: lang.pick("생성 완료", "Complete").to_string(),
        ..Default::default()
    };
    for outcome in outcomes {
        match outcome {
            BranchOutcome::FlatSketch(Ok(img)) if !img.is_empty() => result.image_url = Some(img.to_data_url()),
            BranchOutcome::StyledPhoto(Ok(img)) if !img.is_empty() => result.image_url2 = Some(img.to_data_url()),
            BranchOutcome::Document(Ok(pack)) if !pack.docs.is_empty() => {
                result.text = Some(summarize(&pack, meta));
                result.tech_pack_data = Some(pack);
            }
            _ => {}
        }
    }
    result
}

/// One line per garment part naming its main fabric and stitching.
pub fn summarize(pack: &TechPack, meta: Option<&TechPackMeta>) -> String {
    /// Collapses all whitespace runs, line breaks included, into single spaces.
    fn present(value: Option<&str>) -> Option<String> {
        value.map(|v| v.split_whitespace().collect::<Vec<_>>().join(" ")).filter(|v| !v.is_empty())
    }
    let item = present(meta.map(|m| m.item_name.as_str())).unwrap_or_else(|| "Item".into());
    pack.docs
        .iter()
        .map(|doc| {
            let part = present(doc.part.as_deref()).unwrap_or_else(|| "N/A".into());
            let fabric =
                present(doc.materials.as_ref().and_then(|m| m.main_fabric.as_deref())).unwrap_or_else(|| "N/A".into());
            let stitching =
                present(doc.details.as_ref().and_then(|d| d.stitching.as_deref())).unwrap_or_else(|| "N/A".into());
            format!("[{part}] {item} | Main Fabric: {fabric} | Construction: {stitching}")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

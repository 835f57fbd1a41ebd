use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use uuid::Uuid;

// --- Tool routing ---

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ToolSelector {
    AiPack,
    ProTechpack,
    ClothOnlyFlat,
    RealFlat,
    FitPreview,
    MaterialEnhance,
    /// Any selector this build doesn't know about. Routes to no branches.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BranchKind {
    Document,
    FlatSketch,
    StyledPhoto,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ToolAction {
    #[default]
    Generate,
    SendConfirmation,
}

// --- Options & metadata ---

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemType {
    #[default]
    Top,
    Bottom,
    Dress,
    Jeans,
    Setup,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Top => "TOP",
            ItemType::Bottom => "BOTTOM",
            ItemType::Dress => "DRESS",
            ItemType::Jeans => "JEANS",
            ItemType::Setup => "SETUP",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Lang {
    Ko,
    #[default]
    En,
}

impl Lang {
    pub fn pick<'a>(&self, ko: &'a str, en: &'a str) -> &'a str {
        match self {
            Lang::Ko => ko,
            Lang::En => en,
        }
    }
}

#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelMeasurements {
    pub height: Option<String>,
    pub weight: Option<String>,
    pub chest: Option<String>,
    pub waist: Option<String>,
    pub hip: Option<String>,
    pub shoulder: Option<String>,
    pub arm_length: Option<String>,
    pub inseam: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PreviewOptions {
    pub item_type: ItemType,
    pub lang: Lang,
    pub fit: String,
    pub length: String,
    pub measurements: Option<ModelMeasurements>,
}

impl Default for PreviewOptions {
    fn default() -> Self {
        Self {
            item_type: ItemType::default(),
            lang: Lang::default(),
            fit: "regular".to_string(),
            length: "basic".to_string(),
            measurements: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct TechPackMeta {
    pub brand_name: String,
    pub item_name: String,
    pub style_no: String,
    pub season: String,
    pub request_date: String,
    pub due_date: String,
    pub quantity: String,
    pub size_label: String,
    pub requester: String,
    pub manager: String,
    pub additional_notes: String,
}

// --- Image payloads ---

/// A base64-encoded image together with its MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub data: String,
    pub mime_type: String,
}

impl ImagePayload {
    pub fn new(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self { data: data.into(), mime_type: mime_type.into() }
    }

    /// Accepts raw base64 or a `data:` URL. The MIME type is sniffed from the decoded bytes.
    pub fn parse(input: &str) -> Result<Self, String> {
        let trimmed = input.trim();
        let data = match trimmed.split_once(";base64,") {
            Some((prefix, rest)) if prefix.starts_with("data:") => rest,
            _ => trimmed,
        };
        if data.is_empty() {
            return Err("image payload is empty".to_string());
        }
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(data)
            .map_err(|e| format!("image payload is not valid base64: {e}"))?;
        let mime_type = image::guess_format(&bytes)
            .map(|f| f.to_mime_type())
            .unwrap_or("image/png");
        Ok(Self::new(data, mime_type))
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

// --- Generation request / result ---

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub tool: ToolSelector,
    /// Base sketch, base64 or data URL.
    pub image: String,
    #[serde(default)]
    pub options: PreviewOptions,
    #[serde(default)]
    pub top_swatches: Vec<String>,
    #[serde(default)]
    pub bottom_swatches: Vec<String>,
    #[serde(default)]
    pub meta: Option<TechPackMeta>,
    #[serde(default)]
    pub action: ToolAction,
}

#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    /// Flat sketch.
    pub image_url: Option<String>,
    /// Styled photo.
    pub image_url2: Option<String>,
    pub text: Option<String>,
    pub tech_pack_data: Option<TechPack>,
    pub ui_message: String,
}

impl GenerationResult {
    pub fn is_empty(&self) -> bool {
        self.image_url.is_none() && self.image_url2.is_none() && self.tech_pack_data.is_none()
    }
}

// --- Tech pack document ---

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct TechPack {
    pub docs: Vec<TechPackDoc>,
}

#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct TechPackDoc {
    /// TOP, BOTTOM, DRESS or SETUP.
    pub part: Option<String>,
    pub details: Option<ConstructionDetails>,
    pub measurement: Option<GarmentMeasurement>,
    pub materials: Option<Materials>,
    pub design_summary: Vec<String>,
    pub factory_recommendations: Vec<FactoryRecommendation>,
    pub source_measurements: Option<SourceMeasurements>,
}

#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ConstructionDetails {
    pub stitching: Option<String>,
    pub seam_finishing: Option<String>,
    pub pocket_construction: Option<String>,
    pub neck: Option<String>,
    pub closure: Option<String>,
    pub hem: Option<String>,
    pub etc: Option<String>,
}

/// Finished garment points of measure.
#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct GarmentMeasurement {
    pub total_length: Option<String>,
    pub shoulder_width: Option<String>,
    pub chest_width: Option<String>,
    pub waist_width: Option<String>,
    pub hem_width: Option<String>,
    pub sleeve_length: Option<String>,
    pub armhole: Option<String>,
    pub cuff_opening: Option<String>,
    pub neck_width: Option<String>,
    pub front_drop: Option<String>,
    pub hip_width: Option<String>,
    pub thigh_width: Option<String>,
    pub knee_width: Option<String>,
    pub front_rise: Option<String>,
    pub back_rise: Option<String>,
    pub inseam: Option<String>,
    pub outseam: Option<String>,
    pub leg_opening: Option<String>,
}

impl GarmentMeasurement {
    /// Labelled values that are present, in schema order.
    pub fn entries(&self) -> Vec<(&'static str, &str)> {
        let fields: [(&'static str, &Option<String>); 18] = [
            ("Total Length", &self.total_length),
            ("Shoulder Width", &self.shoulder_width),
            ("Chest Width", &self.chest_width),
            ("Waist Width", &self.waist_width),
            ("Hem Width", &self.hem_width),
            ("Sleeve Length", &self.sleeve_length),
            ("Armhole", &self.armhole),
            ("Cuff Opening", &self.cuff_opening),
            ("Neck Width", &self.neck_width),
            ("Front Drop", &self.front_drop),
            ("Hip Width", &self.hip_width),
            ("Thigh Width", &self.thigh_width),
            ("Knee Width", &self.knee_width),
            ("Front Rise", &self.front_rise),
            ("Back Rise", &self.back_rise),
            ("Inseam", &self.inseam),
            ("Outseam", &self.outseam),
            ("Leg Opening", &self.leg_opening),
        ];
        fields
            .into_iter()
            .filter_map(|(label, value)| value.as_deref().filter(|v| !v.is_empty()).map(|v| (label, v)))
            .collect()
    }
}

#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Materials {
    pub main_fabric: Option<String>,
    pub composition: Option<String>,
    pub sub_material: Option<String>,
}

#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct FactoryRecommendation {
    pub name: Option<String>,
    pub location: Option<String>,
    pub reason: Option<String>,
}

#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SourceMeasurements {
    pub height: Option<String>,
    pub chest: Option<String>,
    pub waist: Option<String>,
    pub shoulder: Option<String>,
}

// --- Persistence ---

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRecord {
    pub meta: TechPackMeta,
    pub result: GenerationResult,
    pub created_at: DateTime<Utc>,
}

// --- Design variations ---

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct VariationRequest {
    pub base_image: String,
    pub axes: Vec<String>,
    #[serde(default = "default_intensity")]
    pub intensity: u8,
    #[serde(default)]
    pub reference_image: Option<String>,
}

fn default_intensity() -> u8 {
    3
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Variation {
    pub id: Uuid,
    pub thumbnail: String,
    pub title: String,
    pub tags: Vec<String>,
    pub note: String,
}

// --- Market simulation ---

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct MarketReactionRequest {
    pub image: String,
    #[serde(default)]
    pub meta: TechPackMeta,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct MarketReaction {
    pub funding_rate: i64,
    pub current_amount: i64,
    pub target_amount: i64,
    pub backers: i64,
    pub chips: Vec<String>,
    pub feedback: MarketFeedback,
    pub demographics: Vec<Demographic>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct MarketFeedback {
    pub complaint: String,
    pub praise: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Demographic {
    pub label: String,
    pub percent: i64,
}

// --- Factory chat ---

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChatSender {
    User,
    Factory,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChatMessageKind {
    #[default]
    Text,
    QcReport,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QcReport {
    pub sample_round: String,
    #[serde(default)]
    pub corrections: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub sender: ChatSender,
    #[serde(default)]
    pub text: String,
    #[serde(default, rename = "type")]
    pub kind: ChatMessageKind,
    #[serde(default)]
    pub qc_data: Option<QcReport>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct FactoryChatRequest {
    pub history: Vec<ChatMessage>,
    #[serde(default)]
    pub meta: TechPackMeta,
    #[serde(default)]
    pub lang: Lang,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FactoryChatResponse {
    pub reply: String,
}

// --- News ---

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NewsRegion {
    #[default]
    Global,
    Europe,
    Usa,
    Korea,
    NewDrops,
}

#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct NewsArticle {
    pub title: String,
    pub summary: String,
    pub url: String,
    pub source: String,
    pub date: String,
    pub thumbnail: Option<String>,
    pub features: Option<Vec<String>>,
}

/// 1x1 PNG used by tests across the crate.
#[cfg(test)]
pub(crate) const TEST_PNG_B64: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PNG_B64: &str = TEST_PNG_B64;

    #[test]
    fn unknown_tool_selector_decodes_to_unknown() {
        let tool: ToolSelector = serde_json::from_str("\"MOOD_BOARD\"").unwrap();
        assert_eq!(tool, ToolSelector::Unknown);
        let tool: ToolSelector = serde_json::from_str("\"PRO_TECHPACK\"").unwrap();
        assert_eq!(tool, ToolSelector::ProTechpack);
    }

    #[test]
    fn image_payload_strips_data_url_and_sniffs_png() {
        let img = ImagePayload::parse(&format!("data:image/jpeg;base64,{PNG_B64}")).unwrap();
        assert_eq!(img.data, PNG_B64);
        assert_eq!(img.mime_type, "image/png");
        assert_eq!(img.to_data_url(), format!("data:image/png;base64,{PNG_B64}"));
    }

    #[test]
    fn image_payload_rejects_garbage() {
        assert!(ImagePayload::parse("not base64 at all!!").is_err());
        assert!(ImagePayload::parse("   ").is_err());
    }

    #[test]
    fn unrecognised_bytes_default_to_png() {
        let img = ImagePayload::parse("aGVsbG8=").unwrap();
        assert_eq!(img.mime_type, "image/png");
    }

    #[test]
    fn generation_request_fills_defaults() {
        let req: GenerationRequest = serde_json::from_value(serde_json::json!({
            "tool": "AI_PACK",
            "image": PNG_B64,
        }))
        .unwrap();
        assert_eq!(req.action, ToolAction::Generate);
        assert_eq!(req.options, PreviewOptions::default());
        assert!(req.meta.is_none());
        assert!(req.top_swatches.is_empty());
    }

    #[test]
    fn empty_result_serializes_without_artifacts() {
        let result = GenerationResult { ui_message: "Complete".into(), ..Default::default() };
        assert_eq!(serde_json::to_value(&result).unwrap(), serde_json::json!({ "uiMessage": "Complete" }));
        assert!(result.is_empty());
    }

    #[test]
    fn tech_pack_tolerates_partial_docs() {
        let pack: TechPack = serde_json::from_value(serde_json::json!({
            "docs": [{ "part": "TOP", "materials": { "mainFabric": "Cotton twill" } }]
        }))
        .unwrap();
        let doc = &pack.docs[0];
        assert_eq!(doc.part.as_deref(), Some("TOP"));
        assert_eq!(doc.materials.as_ref().and_then(|m| m.main_fabric.as_deref()), Some("Cotton twill"));
        assert!(doc.details.is_none());
        assert!(doc.factory_recommendations.is_empty());
    }

    #[test]
    fn measurement_entries_skip_blank_values() {
        let m = GarmentMeasurement {
            total_length: Some("72cm".into()),
            chest_width: Some(String::new()),
            inseam: Some("80cm".into()),
            ..Default::default()
        };
        assert_eq!(m.entries(), vec![("Total Length", "72cm"), ("Inseam", "80cm")]);
    }
}

//! Prompt text and response schemas sent to the generation model.

use serde_json::{json, Value};

use crate::models::{ChatMessage, ChatMessageKind, ChatSender, ItemType, Lang, NewsRegion, PreviewOptions, TechPackMeta};

/// Tech pack response schema, in the Gemini `responseSchema` dialect.
pub fn techpack_schema() -> Value {
    let s = || json!({ "type": "STRING" });
    json!({
        "type": "OBJECT",
        "properties": {
            "docs": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "part": { "type": "STRING", "description": "TOP, BOTTOM, DRESS, or SETUP" },
                        "details": {
                            "type": "OBJECT",
                            "properties": {
                                "stitching": s(), "seamFinishing": s(), "pocketConstruction": s(),
                                "neck": s(), "closure": s(), "hem": s(), "etc": s()
                            }
                        },
                        "measurement": {
                            "type": "OBJECT",
                            "description": "Finished garment measurements (Points of Measure)",
                            "properties": {
                                "totalLength": s(), "shoulderWidth": s(), "chestWidth": s(), "waistWidth": s(),
                                "hemWidth": s(), "sleeveLength": s(), "armhole": s(), "cuffOpening": s(),
                                "neckWidth": s(), "frontDrop": s(),
                                "hipWidth": s(), "thighWidth": s(), "kneeWidth": s(), "frontRise": s(),
                                "backRise": s(), "inseam": s(), "outseam": s(), "legOpening": s()
                            }
                        },
                        "materials": {
                            "type": "OBJECT",
                            "properties": { "mainFabric": s(), "composition": s(), "subMaterial": s() }
                        },
                        "designSummary": { "type": "ARRAY", "items": s() },
                        "factoryRecommendations": {
                            "type": "ARRAY",
                            "items": {
                                "type": "OBJECT",
                                "properties": { "name": s(), "location": s(), "reason": s() }
                            }
                        },
                        "sourceMeasurements": {
                            "type": "OBJECT",
                            "properties": { "height": s(), "chest": s(), "waist": s(), "shoulder": s() }
                        }
                    }
                }
            }
        }
    })
}

pub fn market_reaction_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "fundingRate": { "type": "INTEGER", "description": "Predicted funding/pre-order percentage goal reached (e.g. 120, 85)" },
            "currentAmount": { "type": "INTEGER", "description": "Simulated sales amount in dollars" },
            "targetAmount": { "type": "INTEGER", "description": "Target sales goal" },
            "backers": { "type": "INTEGER", "description": "Number of people who pre-ordered" },
            "chips": { "type": "ARRAY", "items": { "type": "STRING" } },
            "feedback": {
                "type": "OBJECT",
                "properties": { "complaint": { "type": "STRING" }, "praise": { "type": "STRING" } }
            },
            "demographics": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": { "label": { "type": "STRING" }, "percent": { "type": "INTEGER" } }
                }
            }
        }
    })
}

pub fn news_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "articles": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "title": { "type": "STRING" },
                        "url": { "type": "STRING" },
                        "source": { "type": "STRING" },
                        "date": { "type": "STRING" },
                        "summary": { "type": "STRING", "description": "A comprehensive 3-4 sentence professional intelligence report." },
                        "features": { "type": "ARRAY", "items": { "type": "STRING" } },
                        "thumbnail": { "type": "STRING", "description": "A valid image URL for the product/article if found." }
                    }
                }
            }
        }
    })
}

fn language_name(lang: Lang) -> &'static str {
    lang.pick("Korean", "English")
}

fn or_default<'a>(value: Option<&'a str>, fallback: &'a str) -> &'a str {
    value.filter(|v| !v.trim().is_empty()).unwrap_or(fallback)
}

pub fn techpack_user_prompt(options: &PreviewOptions, meta: Option<&TechPackMeta>) -> String {
    let item_name = or_default(meta.map(|m| m.item_name.as_str()), "this design");
    let notes = or_default(meta.map(|m| m.additional_notes.as_str()), "None");
    let measurements = options
        .measurements
        .as_ref()
        .and_then(|m| serde_json::to_string(m).ok())
        .unwrap_or_else(|| "not provided".to_string());
    format!(
        "Create a professional technical package for: {item_name}.\n\
         Item Type: {item}. Fit: {fit}. Length: {length}.\n\n\
         [CRITICAL INPUTS]\n\
         Body Measurements (Human): {measurements}\n\n\
         [TASK]\n\
         1. Analyze the body measurements.\n\
         2. Calculate the \"Finished Garment Measurements\" (POM) by adding appropriate ease/allowance based on the \"{fit}\" fit (e.g., Oversized needs large chest allowance).\n\
         3. Fill the measurement object with specific manufacturing specs (e.g. Front Rise, Thigh for bottoms; Armhole, Cuff for tops).\n\n\
         Additional Notes: {notes}.",
        item = options.item_type.as_str(),
        fit = options.fit,
        length = options.length,
    )
}

pub fn techpack_system_prompt(lang: Lang) -> String {
    format!(
        "You are an expert Technical Designer and Pattern Maker.\n\
         Output strict JSON.\n\
         Language: {}.\n\
         Your goal is to provide ready-to-use factory specifications.\n\
         Ensure 'measurement' values are numbers with units (e.g. \"72cm\") representing the CLOTHES, not the body.",
        language_name(lang)
    )
}

/// Front and back technical line art.
pub fn flat_sketch_prompt(options: &PreviewOptions) -> String {
    let item = options.item_type.as_str();
    match options.lang {
        Lang::Ko => format!(
            "전문 의류 도식화(Technical Flat). {item}. 앞면(Front)과 뒷면(Back)을 나란히 배치. 흑백 라인 아트(Line art only). 명암 없음. 깨끗한 흰색 배경. 디테일한 봉제선 표시."
        ),
        Lang::En => format!(
            "Professional Fashion Technical Flat Sketch of {item}. SHOW BOTH FRONT VIEW AND BACK VIEW SIDE-BY-SIDE. Black and white line art only. No shading. Clean white background. Detailed stitching lines."
        ),
    }
}

pub fn styled_photo_prompt(options: &PreviewOptions) -> String {
    let framing = match options.item_type {
        ItemType::Top => "Upper body close-up fashion photography, focus on the top garment, professional studio lighting.",
        ItemType::Bottom | ItemType::Jeans => "Lower body fashion photography, waist down, focus on trousers/skirt.",
        ItemType::Dress | ItemType::Setup => "Full body fashion photography, professional studio lighting.",
    };
    match options.lang {
        Lang::Ko => format!("리얼리스틱 스튜디오 패션 촬영물 생성. {framing}"),
        Lang::En => format!("Realistic studio fashion photography creation. {framing}"),
    }
}

pub fn variation_prompt(index: usize, axes: &[String], intensity: u8, with_reference: bool) -> String {
    let mut prompt = format!(
        "Fashion Design Sketch Variation {}. Based on the input sketch, creatively alter the following attributes: {}. \
         Creativity Intensity: {}/5. Keep the core identity but explore new possibilities. Output a high-quality fashion sketch/render.",
        index + 1,
        axes.join(", "),
        intensity.clamp(1, 5),
    );
    if with_reference {
        prompt.push_str(" Incorporate style/texture from the reference image.");
    }
    prompt
}

pub fn market_reaction_prompt(meta: &TechPackMeta) -> String {
    format!(
        "Simulate a Pre-order / Crowdfunding campaign for: {}.\n\
         Target audience: Fashion forward Gen Z.\n\
         Predict funding success rate, backer count, and sales volume.\n\
         Provide demographic breakdown.",
        or_default(Some(meta.item_name.as_str()), "this design")
    )
}

pub fn factory_chat_prompt(history: &[ChatMessage], meta: &TechPackMeta, lang: Lang) -> String {
    let conversation = history
        .iter()
        .map(|m| match (m.kind, &m.qc_data) {
            (ChatMessageKind::QcReport, Some(qc)) => format!(
                "[USER SENT QC REPORT]: Round {}, Corrections: {}",
                qc.sample_round,
                qc.corrections.join(", ")
            ),
            _ => {
                let sender = match m.sender {
                    ChatSender::User => "USER",
                    ChatSender::Factory => "FACTORY",
                };
                format!("{sender}: {}", m.text)
            }
        })
        .collect::<Vec<_>>()
        .join("\n");

    let last_is_qc = history.last().is_some_and(|m| m.kind == ChatMessageKind::QcReport);
    let task = if last_is_qc {
        "- THE USER JUST SENT A QC/CORRECTION REPORT. Acknowledge receipt immediately.\n\
         - Confirm you will apply the corrections (mention specific corrections like \"fixing the sleeve length\" or \"adjusting color\").\n\
         - Estimate when the NEXT sample (or final production) will be ready."
    } else {
        "- If they ask about cost/MOQ, give realistic estimates.\n\
         - If they ask about timeline, mention current busy season."
    };
    let language = lang.pick(
        "Korean (Natural business messenger tone, e.g. \"네 사장님,\" \"수정해서 다시 올릴게요.\")",
        "English (Business casual)",
    );

    format!(
        "You are an experienced Garment Factory Manager in Seoul (Dongdaemun) or Vietnam.\n\
         Your tone is professional but busy, practical, and helpful. You want to secure the order but are realistic about timelines and costs.\n\n\
         [Current Tech Pack Context]\n\
         Item: {}\nBrand: {}\nQuantity: {}\nDue Date: {}\nMaterials: Based on conversation.\n\n\
         [Conversation History]\n{conversation}\n\n\
         [Task]\nRespond to the last USER message.\n{task}\n\
         - Keep response short (1-2 sentences), like a text message.\n\
         - Language: {language}.",
        meta.item_name, meta.brand_name, meta.quantity, meta.due_date,
    )
}

pub fn news_prompt(lang: Lang, region: NewsRegion) -> String {
    let focus = match region {
        NewsRegion::Europe => "Focus on European fashion luxury markets (Paris, Milan, London, Berlin).",
        NewsRegion::Usa => "Focus on the US fashion market (NYC, LA, Streetwear, Techwear innovations).",
        NewsRegion::Korea => "Focus on South Korean fashion (K-Fashion trends, Dongdaemun industry, KR designers).",
        NewsRegion::NewDrops => "Focus EXCLUSIVELY on specific NEW PRODUCT RELEASES (Drops) from famous brands (e.g. Balenciaga, Nike, Supreme, Gentle Monster, Arc'teryx) released in the last 7 days. Find 4 distinct items.",
        NewsRegion::Global => "Provide global fashion industry trends and major announcements.",
    };
    let drops = if region == NewsRegion::NewDrops {
        "\n[SPECIAL INSTRUCTION FOR NEW DROPS]\n\
         1. 'title' should be the Product Name + Brand.\n\
         2. 'features' array MUST include exactly these 3 elements in order if found:\n\
            - \"Price: [Amount]\"\n\
            - \"Finishing: [Method]\"\n\
            - \"Detail: [Key Feature]\"\n\
         3. 'thumbnail': ONLY include if you find a valid, direct HTTP URL to an image. If uncertain or none found, leave empty or null. Do not hallucinate URLs.\n"
    } else {
        ""
    };
    format!(
        "Find top 4 most significant fashion industry news articles/products for today.\n\
         Target Region/Topic: {focus}\n\n\
         [OUTPUT INSTRUCTION]\n\
         For each article found, generate a JSON object matching the schema.\n\
         **CRITICAL: The 'summary' field MUST be a detailed Intelligence Report (approx 80-100 words).**\n\
         - Explain the context, key details, and strategic impact.\n\
         - Language: {}.\n{drops}",
        language_name(lang)
    )
}

pub const NEWS_SYSTEM_PROMPT: &str = "You are a Senior Fashion Market Intelligence Analyst. \
Your goal is to provide deep, actionable insights. \
For 'New Drops', focus on product specifications (Price, Finishing, Material). \
Always output valid JSON.";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ModelMeasurements, QcReport};

    #[test]
    fn techpack_prompt_uses_meta_and_measurements() {
        let options = PreviewOptions {
            fit: "oversized".into(),
            measurements: Some(ModelMeasurements { chest: Some("92".into()), ..Default::default() }),
            ..Default::default()
        };
        let meta = TechPackMeta { item_name: "Boxy Jacket".into(), ..Default::default() };
        let prompt = techpack_user_prompt(&options, Some(&meta));
        assert!(prompt.contains("technical package for: Boxy Jacket."));
        assert!(prompt.contains("Fit: oversized."));
        assert!(prompt.contains(r#"{"chest":"92"}"#));
        assert!(prompt.contains("Additional Notes: None."));
    }

    #[test]
    fn techpack_prompt_without_meta() {
        let prompt = techpack_user_prompt(&PreviewOptions::default(), None);
        assert!(prompt.contains("for: this design."));
        assert!(prompt.contains("Body Measurements (Human): not provided"));
    }

    #[test]
    fn system_prompt_follows_language() {
        assert!(techpack_system_prompt(Lang::Ko).contains("Language: Korean."));
        assert!(techpack_system_prompt(Lang::En).contains("Language: English."));
    }

    #[test]
    fn styled_photo_framing_depends_on_item() {
        let mut options = PreviewOptions { item_type: ItemType::Jeans, ..Default::default() };
        assert!(styled_photo_prompt(&options).contains("waist down"));
        options.item_type = ItemType::Top;
        assert!(styled_photo_prompt(&options).contains("Upper body"));
        options.item_type = ItemType::Dress;
        options.lang = Lang::Ko;
        let prompt = styled_photo_prompt(&options);
        assert!(prompt.starts_with("리얼리스틱"));
        assert!(prompt.contains("Full body"));
    }

    #[test]
    fn flat_prompt_names_item() {
        let options = PreviewOptions { item_type: ItemType::Setup, ..Default::default() };
        assert!(flat_sketch_prompt(&options).contains("Flat Sketch of SETUP"));
    }

    #[test]
    fn factory_prompt_renders_qc_reports() {
        let history = vec![
            ChatMessage { sender: ChatSender::User, text: "Hi, MOQ?".into(), kind: ChatMessageKind::Text, qc_data: None },
            ChatMessage {
                sender: ChatSender::User,
                text: String::new(),
                kind: ChatMessageKind::QcReport,
                qc_data: Some(QcReport { sample_round: "1st Sample".into(), corrections: vec!["sleeve +2cm".into(), "darker navy".into()] }),
            },
        ];
        let prompt = factory_chat_prompt(&history, &TechPackMeta::default(), Lang::En);
        assert!(prompt.contains("USER: Hi, MOQ?"));
        assert!(prompt.contains("[USER SENT QC REPORT]: Round 1st Sample, Corrections: sleeve +2cm, darker navy"));
        assert!(prompt.contains("JUST SENT A QC/CORRECTION REPORT"));
    }

    #[test]
    fn news_prompt_adds_drop_instructions_only_for_drops() {
        assert!(news_prompt(Lang::En, NewsRegion::NewDrops).contains("SPECIAL INSTRUCTION FOR NEW DROPS"));
        assert!(!news_prompt(Lang::En, NewsRegion::Korea).contains("SPECIAL INSTRUCTION"));
    }

    #[test]
    fn schema_lists_docs_array() {
        let schema = techpack_schema();
        assert_eq!(schema["properties"]["docs"]["type"], "ARRAY");
        assert_eq!(schema["properties"]["docs"]["items"]["properties"]["materials"]["properties"]["mainFabric"]["type"], "STRING");
    }
}

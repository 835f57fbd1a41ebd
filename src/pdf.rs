use crate::models::{ProjectRecord, TechPackDoc, TechPackMeta};
use printpdf::*;
use std::io::BufWriter;

const LINE_MM: f32 = 6.0;
const BOTTOM_MARGIN_MM: f32 = 20.0;

/// Text-only tech pack, one page per garment part. Images are not embedded.
pub fn generate_pdf(record: &ProjectRecord) -> Result<Vec<u8>, printpdf::Error> {
    let meta = &record.meta;
    let title = format!("Tech Pack: {}", truncate(non_empty(&meta.item_name, "Untitled"), 48));
    let (doc, first_page, first_layer) = PdfDocument::new(title, Mm(210.0), Mm(297.0), "Cover");
    let font = doc.add_builtin_font(BuiltinFont::Helvetica)?;
    let bold = doc.add_builtin_font(BuiltinFont::HelveticaBold)?;

    let cover = doc.get_page(first_page).get_layer(first_layer);
    cover.use_text("Technical Package", 20.0, Mm(15.0), Mm(275.0), &bold);
    let mut y = 260.0;
    for line in meta_lines(meta) {
        cover.use_text(truncate(&line, 140), 11.0, Mm(15.0), Mm(y), &font);
        y -= LINE_MM;
    }
    if let Some(text) = &record.result.text {
        y -= LINE_MM;
        for line in text.lines() {
            cover.use_text(truncate(line, 140), 9.0, Mm(15.0), Mm(y), &font);
            y -= LINE_MM;
        }
    }
    cover.use_text("(Images not embedded in PDF export)", 8.0, Mm(15.0), Mm(BOTTOM_MARGIN_MM), &font);

    let docs = record.result.tech_pack_data.as_ref().map(|p| p.docs.as_slice()).unwrap_or_default();
    for part in docs {
        let name = part.part.as_deref().unwrap_or("PART");
        let (page, layer) = doc.add_page(Mm(210.0), Mm(297.0), name);
        let layer_ref = doc.get_page(page).get_layer(layer);
        layer_ref.use_text(format!("{name} TECH PACK"), 16.0, Mm(15.0), Mm(275.0), &bold);
        let mut y = 262.0;
        for line in part_lines(part) {
            if y < BOTTOM_MARGIN_MM {
                break;
            }
            layer_ref.use_text(truncate(&line, 150), 9.0, Mm(15.0), Mm(y), &font);
            y -= LINE_MM;
        }
    }

    let mut buf: Vec<u8> = Vec::new();
    {
        let mut writer = BufWriter::new(&mut buf);
        doc.save(&mut writer)?;
    }
    Ok(buf)
}

fn meta_lines(meta: &TechPackMeta) -> Vec<String> {
    [
        ("Brand", &meta.brand_name),
        ("Item", &meta.item_name),
        ("Style No.", &meta.style_no),
        ("Season", &meta.season),
        ("Request Date", &meta.request_date),
        ("Due Date", &meta.due_date),
        ("Quantity", &meta.quantity),
        ("Size", &meta.size_label),
        ("Requester", &meta.requester),
        ("Manager", &meta.manager),
        ("Notes", &meta.additional_notes),
    ]
    .into_iter()
    .filter(|(_, v)| !v.trim().is_empty())
    .map(|(k, v)| format!("{k}: {v}"))
    .collect()
}

fn part_lines(part: &TechPackDoc) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(m) = &part.materials {
        lines.push("MATERIALS".to_string());
        for (label, value) in [("Main Fabric", &m.main_fabric), ("Composition", &m.composition), ("Sub Material", &m.sub_material)] {
            if let Some(v) = value {
                lines.push(format!("  {label}: {v}"));
            }
        }
    }
    if let Some(d) = &part.details {
        lines.push("CONSTRUCTION".to_string());
        for (label, value) in [
            ("Stitching", &d.stitching),
            ("Seam Finishing", &d.seam_finishing),
            ("Pocket", &d.pocket_construction),
            ("Neck", &d.neck),
            ("Closure", &d.closure),
            ("Hem", &d.hem),
            ("Etc", &d.etc),
        ] {
            if let Some(v) = value {
                lines.push(format!("  {label}: {v}"));
            }
        }
    }
    if let Some(m) = &part.measurement {
        lines.push("MEASUREMENTS (FINISHED GARMENT)".to_string());
        lines.extend(m.entries().into_iter().map(|(label, v)| format!("  {label}: {v}")));
    }
    if !part.design_summary.is_empty() {
        lines.push("DESIGN SUMMARY".to_string());
        lines.extend(part.design_summary.iter().map(|s| format!("  - {s}")));
    }
    if !part.factory_recommendations.is_empty() {
        lines.push("RECOMMENDED FACTORIES".to_string());
        for f in &part.factory_recommendations {
            lines.push(format!(
                "  {} ({}): {}",
                f.name.as_deref().unwrap_or("?"),
                f.location.as_deref().unwrap_or("?"),
                f.reason.as_deref().unwrap_or("")
            ));
        }
    }
    lines
}

fn non_empty<'a>(s: &'a str, fallback: &'a str) -> &'a str {
    if s.trim().is_empty() { fallback } else { s }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        format!("{}…", s.chars().take(max).collect::<String>())
    }
}

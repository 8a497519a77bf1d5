use chrono::NaiveDate;
use image::GenericImageView;
use lookup_report::fonts;
use lookup_report::{
    OutputFormat, Record, RenderError, RenderReport, ReportBuilder, ReportConfig, ReportContent,
    ReportType,
};
use serde_json::json;
use sha2::{Digest, Sha256};

const SKIP_HINT: &str =
    "bundled fonts missing. Set LOOKUP_REPORT_FONTS_DIR or copy assets/fonts next to the binary.";

fn salary_records(count: usize) -> Vec<Record> {
    (0..count)
        .map(|n| {
            Record::from(json!({
                "empresa": format!("EMPRESA DE SERVICIOS GENERALES NUMERO {n} S.A.C."),
                "sueldo": 1500 + n * 10,
                "periodo": format!("2024-{:02}", n % 12 + 1),
                "situacion": if n % 3 == 0 { "ACTIVO" } else { "BAJA" }
            }))
        })
        .collect()
}

fn render(records: &[Record], format: OutputFormat) -> Option<Vec<u8>> {
    if !fonts::default_fonts_available() {
        return None;
    }

    let renderer = ReportBuilder::new().build().expect("build renderer");
    let content = ReportContent {
        subject: "12345678",
        report_type: ReportType::Salary,
        generated_on: NaiveDate::from_ymd_opt(2024, 5, 1).expect("valid date"),
        quantity: records.len() as u64,
        records,
    };
    Some(renderer.render(&content, format).expect("render report"))
}

/// Blanks out the values printpdf derives from the clock or a random source.
fn scrub_pdf(bytes: &[u8]) -> Vec<u8> {
    const VOLATILE: [(&[u8], u8); 4] = [
        (b"/CreationDate(", b')'),
        (b"/ModDate(", b')'),
        (b"/ID[", b']'),
        (b"/Producer(", b')'),
    ];
    const VOLATILE_XML: [(&[u8], &[u8]); 5] = [
        (b"<xmp:CreateDate>", b"</xmp:CreateDate>"),
        (b"<xmp:ModifyDate>", b"</xmp:ModifyDate>"),
        (b"<xmp:MetadataDate>", b"</xmp:MetadataDate>"),
        (b"<xmpMM:DocumentID>", b"</xmpMM:DocumentID>"),
        (b"<xmpMM:InstanceID>", b"</xmpMM:InstanceID>"),
    ];

    fn find(data: &[u8], needle: &[u8], from: usize) -> Option<usize> {
        data.get(from..)?
            .windows(needle.len())
            .position(|window| window == needle)
            .map(|pos| from + pos)
    }

    fn blank(data: &mut [u8], start: usize, end: usize) {
        for byte in &mut data[start..end] {
            if !matches!(*byte, b'<' | b'>' | b'/' | b' ' | b'\n' | b'\r' | b'\t') {
                *byte = b'0';
            }
        }
    }

    let mut data = bytes.to_vec();
    for (tag, terminator) in VOLATILE {
        let mut offset = 0;
        while let Some(start) = find(&data, tag, offset) {
            let start = start + tag.len();
            let Some(len) = data[start..].iter().position(|byte| *byte == terminator) else {
                break;
            };
            blank(&mut data, start, start + len);
            offset = start + len;
        }
    }
    for (open, close) in VOLATILE_XML {
        let mut offset = 0;
        while let Some(start) = find(&data, open, offset) {
            let start = start + open.len();
            let Some(end) = find(&data, close, start) else {
                break;
            };
            blank(&mut data, start, end);
            offset = end + close.len();
        }
    }
    data
}

fn normalized_hash(bytes: &[u8]) -> [u8; 32] {
    Sha256::digest(scrub_pdf(bytes)).into()
}

/// Number of paths filled with `rgb` (0-255 channels) on the first page.
fn fills_with_color(bytes: &[u8], rgb: [u8; 3]) -> usize {
    let doc = lopdf::Document::load_mem(bytes).expect("parse rendered pdf");
    let first = *doc.get_pages().values().next().expect("at least one page");
    let content = doc
        .get_and_decode_page_content(first)
        .expect("decode page content");

    let wanted: Vec<f32> = rgb.iter().map(|channel| f32::from(*channel) / 255.0).collect();
    let mut current_is_wanted = false;
    let mut fills = 0;
    for operation in &content.operations {
        match operation.operator.as_str() {
            "rg" => {
                current_is_wanted = operation.operands.len() == 3
                    && operation
                        .operands
                        .iter()
                        .zip(&wanted)
                        .all(|(operand, want)| {
                            operand
                                .as_float()
                                .map_or(false, |value| (value - want).abs() < 0.002)
                        });
            }
            "f" | "f*" | "b" | "B" if current_is_wanted => fills += 1,
            _ => {}
        }
    }
    fills
}

fn page_count(bytes: &[u8]) -> usize {
    lopdf::Document::load_mem(bytes)
        .expect("parse rendered pdf")
        .get_pages()
        .len()
}

#[test]
fn renders_a_pdf_document() {
    let Some(bytes) = render(&salary_records(3), OutputFormat::Pdf) else {
        eprintln!("Skipping renders_a_pdf_document: {SKIP_HINT}");
        return;
    };
    assert!(bytes.starts_with(b"%PDF"));
    assert_eq!(page_count(&bytes), 1);
}

#[test]
fn striped_rows_are_filled_in_the_pdf() {
    let Some(bytes) = render(&salary_records(4), OutputFormat::Pdf) else {
        eprintln!("Skipping striped_rows_are_filled_in_the_pdf: {SKIP_HINT}");
        return;
    };
    let palette = lookup_report::config::Palette::default();
    let stripe = [palette.stripe.r, palette.stripe.g, palette.stripe.b];
    let band = [palette.band.r, palette.band.g, palette.band.b];

    // Blocks 0 and 2 carry the zebra stripe.
    assert_eq!(fills_with_color(&bytes, stripe), 2);
    assert!(fills_with_color(&bytes, band) >= 1);
}

#[test]
fn oversized_png_canvas_is_refused() {
    if !fonts::default_fonts_available() {
        eprintln!("Skipping oversized_png_canvas_is_refused: {SKIP_HINT}");
        return;
    }
    let mut config = ReportConfig::default();
    config.raster.max_height = 2_000;
    let renderer = ReportBuilder::new()
        .with_config(config)
        .build()
        .expect("build renderer");
    let records = salary_records(80);
    let content = ReportContent {
        subject: "12345678",
        report_type: ReportType::Salary,
        generated_on: NaiveDate::from_ymd_opt(2024, 5, 1).expect("valid date"),
        quantity: records.len() as u64,
        records: &records,
    };

    match renderer.render(&content, OutputFormat::Png) {
        Err(RenderError::CanvasTooLarge { height, limit }) => {
            assert_eq!(limit, 2_000);
            assert!(height > limit);
        }
        other => panic!("expected CanvasTooLarge, got {:?}", other.map(|bytes| bytes.len())),
    }
}

#[test]
fn empty_result_still_renders_a_valid_document() {
    let Some(bytes) = render(&[], OutputFormat::Pdf) else {
        eprintln!("Skipping empty_result_still_renders_a_valid_document: {SKIP_HINT}");
        return;
    };
    assert_eq!(page_count(&bytes), 1);
}

#[test]
fn many_records_span_several_pages() {
    let Some(bytes) = render(&salary_records(60), OutputFormat::Pdf) else {
        eprintln!("Skipping many_records_span_several_pages: {SKIP_HINT}");
        return;
    };
    assert!(page_count(&bytes) >= 4);
}

#[test]
fn rendering_is_deterministic() {
    let records = salary_records(25);
    let Some(first) = render(&records, OutputFormat::Pdf) else {
        eprintln!("Skipping rendering_is_deterministic: {SKIP_HINT}");
        return;
    };
    let second = render(&records, OutputFormat::Pdf).expect("fonts were available");
    assert_eq!(normalized_hash(&first), normalized_hash(&second));
}

#[test]
fn png_output_is_one_image_that_grows_with_content() {
    let Some(short) = render(&salary_records(2), OutputFormat::Png) else {
        eprintln!("Skipping png_output_is_one_image_that_grows_with_content: {SKIP_HINT}");
        return;
    };
    let long = render(&salary_records(30), OutputFormat::Png).expect("fonts were available");

    let short = image::load_from_memory(&short).expect("decode short png");
    let long = image::load_from_memory(&long).expect("decode long png");
    assert_eq!(short.width(), long.width());
    assert!(long.height() > short.height());
}

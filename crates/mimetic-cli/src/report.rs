//! JSON and PDF report writers.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use mimetic_core::ResultRecord;
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, Pt};
use serde::Serialize;
use serde_json::ser::{Formatter, PrettyFormatter};

use crate::patient::Patient;

pub const REPORT_TITLE: &str = "Facial Paralysis Detection Report";

/// US letter, in points.
const PAGE_WIDTH: f32 = 612.0;
const PAGE_HEIGHT: f32 = 792.0;
const BOTTOM_MARGIN: f32 = 50.0;
const LINE_STEP: f32 = 20.0;

/// Everything rendered into the PDF.
pub struct Report<'a> {
    pub patient: &'a Patient,
    /// `YYYY-mm-dd HH:MM:SS`, local time of the session start.
    pub timestamp: &'a str,
    pub records: &'a [ResultRecord],
}

/// `<dir>/<name>_paralysis_report.json` and `.pdf`.
pub fn report_paths(output_dir: &Path, patient_name: &str) -> (PathBuf, PathBuf) {
    let stem = format!("{patient_name}_paralysis_report");
    (
        output_dir.join(format!("{stem}.json")),
        output_dir.join(format!("{stem}.pdf")),
    )
}

/// Write the records as a pretty-printed JSON array (4-space indent).
pub fn write_json(path: &Path, records: &[ResultRecord]) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    let formatter = ReportFormatter(PrettyFormatter::with_indent(b"    "));
    let mut ser = serde_json::Serializer::with_formatter(&mut writer, formatter);
    records
        .serialize(&mut ser)
        .with_context(|| format!("failed to encode {}", path.display()))?;
    writer.flush()?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Font {
    Regular,
    Bold,
}

/// One positioned text run, coordinates in points from the bottom-left.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub font: Font,
    pub size: f32,
}

impl TextLine {
    fn new(text: String, x: f32, y: f32, font: Font, size: f32) -> Self {
        Self {
            text,
            x,
            y,
            font,
            size,
        }
    }
}

/// A float as Python's `repr` writes it: shortest round-trip digits,
/// positional for exponents -4..16 (always with a fractional part),
/// scientific with a signed two-digit exponent otherwise. `100.0`, `85.71`,
/// `0.0001`, `1e-05`.
pub fn python_float(value: f64) -> String {
    if value == 0.0 {
        return if value.is_sign_negative() { "-0.0" } else { "0.0" }.to_string();
    }
    if !value.is_finite() {
        return value.to_string();
    }

    let sci = format!("{value:e}");
    let (mantissa, exp) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    let (sign, mantissa) = match mantissa.strip_prefix('-') {
        Some(m) => ("-", m),
        None => ("", mantissa),
    };
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();

    if (-4..16).contains(&exp) {
        let point = exp + 1;
        if point <= 0 {
            let zeros = "0".repeat(point.unsigned_abs() as usize);
            return format!("{sign}0.{zeros}{digits}");
        }
        let point = point as usize;
        if digits.len() <= point {
            let zeros = "0".repeat(point - digits.len());
            format!("{sign}{digits}{zeros}.0")
        } else {
            format!("{sign}{}.{}", &digits[..point], &digits[point..])
        }
    } else {
        let (first, rest) = digits.split_at(1);
        let fraction = if rest.is_empty() {
            String::new()
        } else {
            format!(".{rest}")
        };
        let exp_sign = if exp < 0 { '-' } else { '+' };
        format!("{sign}{first}{fraction}e{exp_sign}{:02}", exp.unsigned_abs())
    }
}

/// Pretty printer with a 4-space indent whose numbers match Python's
/// `json.dump(..., indent=4)`.
struct ReportFormatter<'a>(PrettyFormatter<'a>);

impl Formatter for ReportFormatter<'_> {
    fn write_f64<W: ?Sized + io::Write>(&mut self, writer: &mut W, value: f64) -> io::Result<()> {
        writer.write_all(python_float(value).as_bytes())
    }

    fn begin_array<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.begin_array(writer)
    }

    fn end_array<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.end_array(writer)
    }

    fn begin_array_value<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        self.0.begin_array_value(writer, first)
    }

    fn end_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.end_array_value(writer)
    }

    fn begin_object<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.begin_object(writer)
    }

    fn end_object<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.end_object(writer)
    }

    fn begin_object_key<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        self.0.begin_object_key(writer, first)
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.begin_object_value(writer)
    }

    fn end_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.end_object_value(writer)
    }
}

pub fn record_line(record: &ResultRecord) -> String {
    format!(
        "{} ({}): Activation = {}% - {}",
        record.expression,
        record.muscle,
        python_float(record.activation_percent),
        record.status
    )
}

/// Lay the report out into pages of positioned text.
pub fn layout(report: &Report<'_>) -> Vec<Vec<TextLine>> {
    let h = PAGE_HEIGHT;
    let mut page = vec![
        TextLine::new(REPORT_TITLE.to_string(), 100.0, h - 50.0, Font::Bold, 16.0),
        TextLine::new(
            format!("Patient: {}", report.patient.name),
            50.0,
            h - 80.0,
            Font::Regular,
            12.0,
        ),
        TextLine::new(
            format!("Age: {}", report.patient.age),
            50.0,
            h - 100.0,
            Font::Regular,
            12.0,
        ),
        TextLine::new(
            format!("Gender: {}", report.patient.gender),
            300.0,
            h - 100.0,
            Font::Regular,
            12.0,
        ),
        TextLine::new(
            format!("Date: {}", report.timestamp),
            300.0,
            h - 80.0,
            Font::Regular,
            12.0,
        ),
    ];
    let mut pages = Vec::new();
    let mut y = h - 110.0;

    for record in report.records {
        if y < BOTTOM_MARGIN {
            pages.push(std::mem::take(&mut page));
            y = h - 50.0;
        }
        page.push(TextLine::new(record_line(record), 50.0, y, Font::Regular, 12.0));
        y -= LINE_STEP;
    }

    pages.push(page);
    pages
}

fn pt(value: f32) -> Mm {
    Mm::from(Pt(value))
}

/// Render the report to a US-letter PDF using the built-in Helvetica faces.
pub fn write_pdf(path: &Path, report: &Report<'_>) -> Result<()> {
    let pages = layout(report);
    let (doc, first_page, first_layer) =
        PdfDocument::new(REPORT_TITLE, pt(PAGE_WIDTH), pt(PAGE_HEIGHT), "Layer 1");

    let regular = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| anyhow!("failed to load Helvetica: {e}"))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| anyhow!("failed to load Helvetica-Bold: {e}"))?;

    for (i, lines) in pages.iter().enumerate() {
        let (page, layer) = if i == 0 {
            (first_page, first_layer)
        } else {
            doc.add_page(pt(PAGE_WIDTH), pt(PAGE_HEIGHT), "Layer 1")
        };
        let layer = doc.get_page(page).get_layer(layer);
        for line in lines {
            let font: &IndirectFontRef = match line.font {
                Font::Regular => &regular,
                Font::Bold => &bold,
            };
            layer.use_text(
                line.text.clone(),
                line.size,
                pt(line.x),
                pt(line.y),
                font,
            );
        }
    }

    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    doc.save(&mut BufWriter::new(file))
        .map_err(|e| anyhow!("failed to write {}: {e}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mimetic_core::Status;

    fn patient() -> Patient {
        Patient {
            name: "Jane Doe".into(),
            age: "42".into(),
            gender: "F".into(),
        }
    }

    fn record(expression: &str, percent: f64, status: Status) -> ResultRecord {
        ResultRecord {
            expression: expression.into(),
            muscle: "Zygomaticus major / minor".into(),
            activation_percent: percent,
            status,
            measured_value: 0.04123,
            expected_threshold: 0.03,
        }
    }

    #[test]
    fn test_report_paths() {
        let (json, pdf) = report_paths(Path::new("/srv/out"), "Jane Doe");
        assert_eq!(json, PathBuf::from("/srv/out/Jane Doe_paralysis_report.json"));
        assert_eq!(pdf, PathBuf::from("/srv/out/Jane Doe_paralysis_report.pdf"));
    }

    #[test]
    fn test_python_float() {
        assert_eq!(python_float(100.0), "100.0");
        assert_eq!(python_float(0.0), "0.0");
        assert_eq!(python_float(85.71), "85.71");
        assert_eq!(python_float(57.1), "57.1");
        assert_eq!(python_float(0.03), "0.03");
        assert_eq!(python_float(0.0001), "0.0001");
        assert_eq!(python_float(0.00001), "1e-05");
        assert_eq!(python_float(0.00012), "0.00012");
        assert_eq!(python_float(1.5e-7), "1.5e-07");
        assert_eq!(python_float(1e16), "1e+16");
        assert_eq!(python_float(-0.5), "-0.5");
    }

    #[test]
    fn test_record_line() {
        let line = record_line(&record("Smiling", 85.71, Status::Active));
        assert_eq!(
            line,
            "Smiling (Zygomaticus major / minor): Activation = 85.71% - Active"
        );
    }

    #[test]
    fn test_json_round_trip_and_indent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let records = vec![
            record("Smiling", 85.71, Status::Active),
            record("Pouting", 0.0, Status::Paralyzed),
        ];
        write_json(&path, &records).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("[\n    {\n        \"expression\": \"Smiling\""));
        assert!(text.contains("\"activation_percent\": 85.71,"));
        assert!(text.contains("\"activation_percent\": 0.0,"));
        let back: Vec<ResultRecord> = serde_json::from_str(&text).unwrap();
        assert_eq!(back, records);
    }

    #[test]
    fn test_json_small_values_use_python_exponent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let mut small = record("Pouting", 0.0, Status::Paralyzed);
        small.measured_value = 0.00001;
        write_json(&path, &[small.clone()]).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"measured_value\": 1e-05,"), "{text}");
        let back: Vec<ResultRecord> = serde_json::from_str(&text).unwrap();
        assert_eq!(back, vec![small]);
    }

    #[test]
    fn test_layout_header_positions() {
        let p = patient();
        let records = vec![record("Smiling", 100.0, Status::Active)];
        let pages = layout(&Report {
            patient: &p,
            timestamp: "2026-10-19 09:30:00",
            records: &records,
        });
        assert_eq!(pages.len(), 1);
        let page = &pages[0];
        assert_eq!(page[0].text, REPORT_TITLE);
        assert_eq!((page[0].x, page[0].y, page[0].font), (100.0, 742.0, Font::Bold));
        assert!(page
            .iter()
            .any(|l| l.text == "Date: 2026-10-19 09:30:00" && l.x == 300.0 && l.y == 712.0));
        assert!(page.iter().any(|l| l.text == "Gender: F" && l.y == 692.0));
        let last = page.last().unwrap();
        assert_eq!(last.y, 682.0);
        assert!(last.text.ends_with("Activation = 100.0% - Active"));
    }

    #[test]
    fn test_layout_paginates_long_reports() {
        let p = patient();
        // 682 down to 62 fits 32 lines; the 33rd starts a new page.
        let records: Vec<_> = (0..40)
            .map(|i| record(&format!("Expression {i}"), 50.0, Status::Active))
            .collect();
        let pages = layout(&Report {
            patient: &p,
            timestamp: "2026-10-19 09:30:00",
            records: &records,
        });
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].len(), 5 + 32);
        assert_eq!(pages[1].len(), 8);
        assert_eq!(pages[1][0].y, 742.0);
        assert!(pages.iter().flatten().all(|l| l.y >= BOTTOM_MARGIN));
    }

    #[test]
    fn test_write_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.pdf");
        let p = patient();
        let records = vec![record("Smiling", 85.71, Status::Active)];
        write_pdf(
            &path,
            &Report {
                patient: &p,
                timestamp: "2026-10-19 09:30:00",
                records: &records,
            },
        )
        .unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
    }
}

//! `mimetic assess` and `mimetic replay`: run the expression battery and
//! write the reports.

use std::fs;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use mimetic_core::session::SessionConfig;
use mimetic_core::{
    run_session, LandmarkSource, RecordedSource, RecordingSource, SessionOutcome, SessionUi,
    EXPRESSIONS,
};

use crate::config::Config;
use crate::live::CameraSource;
use crate::patient::Patient;
use crate::report::{self, Report};
use crate::speech::Speaker;
use crate::terminal::{ConsoleUi, TerminalUi};

/// Paths of the written reports.
#[derive(Debug)]
pub struct ReportFiles {
    pub json: PathBuf,
    pub pdf: PathBuf,
    /// Set when capture stopped early because the frame source failed.
    pub source_error: Option<String>,
}

pub fn run_live(config: &Config, patient: &Patient, record: Option<&Path>) -> Result<ReportFiles> {
    let timestamp = session_timestamp();
    fs::create_dir_all(&config.output_dir)
        .with_context(|| format!("failed to create {}", config.output_dir.display()))?;

    let source = CameraSource::open(config).context("failed to start live capture")?;
    let speaker = Speaker::new(&config.speech_command, config.speech_enabled);
    let mut ui = TerminalUi::new(speaker).context("failed to enter raw terminal mode")?;

    let outcome = match record {
        Some(path) => {
            let file = fs::File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            tracing::info!(path = %path.display(), "recording landmarks");
            let mut tee = RecordingSource::new(source, BufWriter::new(file));
            let outcome = run(config, &mut tee, &mut ui);
            let (source, mut writer) = tee.into_parts();
            if let Err(e) = writer.flush() {
                tracing::warn!(path = %path.display(), error = %e, "recording incomplete");
            }
            tracing::info!(
                face_rate = source.face_rate(),
                bad_frames = source.bad_frames(),
                "camera session finished"
            );
            outcome
        }
        None => {
            let mut source = source;
            let outcome = run(config, &mut source, &mut ui);
            tracing::info!(
                face_rate = source.face_rate(),
                bad_frames = source.bad_frames(),
                "camera session finished"
            );
            outcome
        }
    };
    drop(ui);

    write_reports(config, patient, &timestamp, &outcome)
}

pub fn run_replay(config: &Config, patient: &Patient, recording: &Path) -> Result<ReportFiles> {
    let timestamp = session_timestamp();
    fs::create_dir_all(&config.output_dir)
        .with_context(|| format!("failed to create {}", config.output_dir.display()))?;

    let file = fs::File::open(recording)
        .with_context(|| format!("failed to open {}", recording.display()))?;
    let mut source = RecordedSource::new(BufReader::new(file));
    let mut ui = ConsoleUi::new(Speaker::new(&config.speech_command, config.speech_enabled));

    let outcome = run(config, &mut source, &mut ui);
    write_reports(config, patient, &timestamp, &outcome)
}

fn run<S: LandmarkSource, U: SessionUi>(config: &Config, source: &mut S, ui: &mut U) -> SessionOutcome {
    let session = SessionConfig {
        expression_duration: config.expression_duration(),
    };
    let outcome = run_session(&EXPRESSIONS, source, ui, &session);
    tracing::info!(
        records = outcome.records.len(),
        skipped = outcome.skipped.len(),
        aborted = outcome.aborted,
        stream_ended = outcome.stream_ended,
        metric_errors = outcome.metric_errors,
        "session finished"
    );
    outcome
}

fn session_timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

pub fn write_reports(
    config: &Config,
    patient: &Patient,
    timestamp: &str,
    outcome: &SessionOutcome,
) -> Result<ReportFiles> {
    let (json, pdf) = report::report_paths(&config.output_dir, &patient.name);

    report::write_json(&json, &outcome.records)?;
    report::write_pdf(
        &pdf,
        &Report {
            patient,
            timestamp,
            records: &outcome.records,
        },
    )?;
    tracing::info!(json = %json.display(), pdf = %pdf.display(), "reports written");

    Ok(ReportFiles {
        json,
        pdf,
        source_error: outcome.source_error.clone(),
    })
}

/// Print the session summary to stdout.
pub fn print_summary(files: &ReportFiles, out: &mut impl io::Write) -> io::Result<()> {
    writeln!(out)?;
    if let Some(error) = &files.source_error {
        writeln!(out, "Capture stopped early ({error}); remaining expressions have no frames.")?;
    }
    writeln!(out, "PDF and JSON reports generated successfully.")?;
    writeln!(out, "  {}", files.json.display())?;
    writeln!(out, "  {}", files.pdf.display())
}

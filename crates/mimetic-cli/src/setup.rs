//! `mimetic setup`: downloads the face mesh model and pins its digest.

use anyhow::{bail, Context, Result};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use mimetic_models::{sha256_file_hex, write_digest, FACE_LANDMARK_MODEL};

/// Determine the model directory.
///
/// When running as root (UID 0), defaults to `/var/lib/mimetic/models` (system-wide).
/// Otherwise defaults to `$XDG_DATA_HOME/mimetic/models` (~/.local/share/mimetic/models).
fn default_model_dir() -> PathBuf {
    if is_root() {
        PathBuf::from("/var/lib/mimetic/models")
    } else {
        let data_home = std::env::var("XDG_DATA_HOME").unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            format!("{home}/.local/share")
        });
        PathBuf::from(data_home).join("mimetic/models")
    }
}

fn is_root() -> bool {
    // SAFETY: geteuid is always safe to call.
    unsafe { libc::geteuid() == 0 }
}

/// Download `url` to `dest` with progress output.
fn download(url: &str, dest: &Path) -> Result<()> {
    println!("  downloading {url}...");

    let resp = ureq::get(url)
        .call()
        .with_context(|| format!("failed to download {url}"))?;

    let content_length = resp
        .headers()
        .get("Content-Length")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    let mut reader = resp.into_body().into_reader();
    let mut file =
        fs::File::create(dest).with_context(|| format!("failed to create {}", dest.display()))?;

    let mut buf = [0u8; 65536];
    let mut total: u64 = 0;
    let mut last_pct: u64 = 0;

    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n])?;
        total += n as u64;

        // Print progress every 10%
        if let Some(len) = content_length.filter(|&l| l > 0) {
            let pct = (total * 100) / len;
            if pct / 10 > last_pct / 10 {
                print!("  {pct}%\r");
                io::stdout().flush().ok();
                last_pct = pct;
            }
        }
    }

    file.flush()?;
    println!("  {total} bytes written");
    Ok(())
}

/// Check a downloaded `.part` file against the expected digest (if any),
/// move it into place at `dest` and pin its digest. On a mismatch the
/// `.part` file is removed and `dest` is left untouched.
pub fn pin_model(part: &Path, dest: &Path, expected_sha256: Option<&str>) -> Result<String> {
    print!("  computing checksum... ");
    io::stdout().flush().ok();
    let digest = sha256_file_hex(part)?;

    if let Some(expected) = expected_sha256 {
        if !digest.eq_ignore_ascii_case(expected.trim()) {
            fs::remove_file(part).ok();
            bail!(
                "checksum mismatch for {}:\n  expected: {}\n  got:      {}",
                dest.display(),
                expected,
                digest
            );
        }
        println!("ok");
    } else {
        println!("{digest} (unverified, pinned)");
    }

    // Atomic rename
    fs::rename(part, dest).with_context(|| {
        format!(
            "failed to rename {} -> {}",
            part.display(),
            dest.display()
        )
    })?;
    write_digest(dest, &digest)?;
    Ok(digest)
}

/// Run the setup command: download, verify and pin the face mesh model.
pub fn run(url: &str, sha256: Option<&str>, model_dir: Option<PathBuf>) -> Result<()> {
    let dir = model_dir.unwrap_or_else(default_model_dir);

    println!("Model directory: {}", dir.display());

    fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create directory {}", dir.display()))?;

    let dest = dir.join(FACE_LANDMARK_MODEL);
    if dest.exists() {
        if let Some(expected) = sha256 {
            match sha256_file_hex(&dest) {
                Ok(digest) if digest.eq_ignore_ascii_case(expected.trim()) => {
                    write_digest(&dest, &digest)?;
                    println!("  {FACE_LANDMARK_MODEL} already present (checksum ok)");
                    return Ok(());
                }
                Ok(_) => println!(
                    "  {FACE_LANDMARK_MODEL} exists but checksum differs, re-downloading"
                ),
                Err(_) => {
                    println!("  {FACE_LANDMARK_MODEL} exists but unreadable, re-downloading")
                }
            }
        }
    }

    let part = dest.with_extension("onnx.part");
    download(url, &part)?;
    pin_model(&part, &dest, sha256)?;

    println!();
    println!("Setup complete: {} installed.", dest.display());
    Ok(())
}

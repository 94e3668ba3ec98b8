use sha2::{Digest, Sha256};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Model file descriptor: expected filename, purpose, network input size.
pub struct ModelFile {
    pub name: &'static str,
    pub description: &'static str,
    pub input_size: u32,
}

/// Models required for an assessment. Each is pinned by a `<name>.sha256`
/// sidecar written when the model is installed.
pub const MODELS: &[ModelFile] = &[ModelFile {
    name: "face_landmark.onnx",
    description: "MediaPipe face mesh (468/478 landmarks)",
    input_size: 192,
}];

pub const FACE_LANDMARK_MODEL: &str = "face_landmark.onnx";

#[derive(Error, Debug)]
pub enum ModelIntegrityError {
    #[error("model file not found: {name} ({path})")]
    MissingModel { name: &'static str, path: PathBuf },

    #[error("digest file not found for {name} ({path}); reinstall with `mimetic setup`")]
    MissingDigest { name: &'static str, path: PathBuf },

    #[error("malformed digest file {path}")]
    MalformedDigest { path: PathBuf },

    #[error("failed to open model file: {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read model file: {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write digest file: {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "model checksum mismatch for {name} ({path})\n  expected: {expected}\n  got:      {got}"
    )]
    ChecksumMismatch {
        name: &'static str,
        path: PathBuf,
        expected: String,
        got: String,
    },
}

/// Compute SHA-256 hex digest of a file.
pub fn sha256_file_hex(path: &Path) -> Result<String, ModelIntegrityError> {
    let mut file = fs::File::open(path).map_err(|source| ModelIntegrityError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];

    loop {
        let n = file
            .read(&mut buf)
            .map_err(|source| ModelIntegrityError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

pub fn verify_file_sha256(
    name: &'static str,
    path: &Path,
    expected_sha256: &str,
) -> Result<(), ModelIntegrityError> {
    if !path.exists() {
        return Err(ModelIntegrityError::MissingModel {
            name,
            path: path.to_path_buf(),
        });
    }

    let digest = sha256_file_hex(path)?;
    if !digest.eq_ignore_ascii_case(expected_sha256) {
        return Err(ModelIntegrityError::ChecksumMismatch {
            name,
            path: path.to_path_buf(),
            expected: expected_sha256.to_string(),
            got: digest,
        });
    }

    Ok(())
}

/// Path of the digest sidecar for a model file (`face_landmark.onnx.sha256`).
pub fn digest_path(model_path: &Path) -> PathBuf {
    let mut name = model_path.as_os_str().to_owned();
    name.push(".sha256");
    PathBuf::from(name)
}

/// Read the expected digest from a sidecar. Accepts a bare hex digest or
/// `sha256sum` output (`<hex>  <filename>`).
pub fn read_digest(name: &'static str, model_path: &Path) -> Result<String, ModelIntegrityError> {
    let path = digest_path(model_path);
    let contents = match fs::read_to_string(&path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ModelIntegrityError::MissingDigest { name, path });
        }
        Err(source) => return Err(ModelIntegrityError::Read { path, source }),
    };

    let digest = contents.split_whitespace().next().unwrap_or_default();
    if digest.len() != 64 || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ModelIntegrityError::MalformedDigest { path });
    }
    Ok(digest.to_ascii_lowercase())
}

/// Record the digest of an installed model next to it.
pub fn write_digest(model_path: &Path, digest: &str) -> Result<(), ModelIntegrityError> {
    let path = digest_path(model_path);
    let file_name = model_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    fs::write(&path, format!("{digest}  {file_name}\n"))
        .map_err(|source| ModelIntegrityError::Write { path, source })
}

pub fn verify_models_dir(model_dir: &Path) -> Result<(), ModelIntegrityError> {
    for model in MODELS {
        let path = model_dir.join(model.name);
        if !path.exists() {
            return Err(ModelIntegrityError::MissingModel {
                name: model.name,
                path,
            });
        }
        let expected = read_digest(model.name, &path)?;
        verify_file_sha256(model.name, &path, &expected)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "mimetic-models-test-{tag}-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ))
    }

    #[test]
    fn verify_file_sha256_rejects_missing() {
        let path = scratch_dir("missing").join("nope.onnx");

        let err = verify_file_sha256("nope.onnx", &path, "00").unwrap_err();
        assert!(matches!(err, ModelIntegrityError::MissingModel { .. }));
    }

    #[test]
    fn verify_file_sha256_rejects_mismatch() {
        let dir = scratch_dir("mismatch");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("model.onnx");
        fs::write(&path, b"hello").unwrap();

        let err = verify_file_sha256("model.onnx", &path, "00").unwrap_err();
        assert!(matches!(err, ModelIntegrityError::ChecksumMismatch { .. }));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn sha256_file_hex_known_digest() {
        let dir = scratch_dir("known");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("model.onnx");
        fs::write(&path, b"hello").unwrap();

        assert_eq!(
            sha256_file_hex(&path).unwrap(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn digest_sidecar_round_trip() {
        let dir = scratch_dir("sidecar");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(FACE_LANDMARK_MODEL);
        fs::write(&path, b"weights").unwrap();

        let digest = sha256_file_hex(&path).unwrap();
        write_digest(&path, &digest).unwrap();
        assert_eq!(digest_path(&path), dir.join("face_landmark.onnx.sha256"));
        assert_eq!(read_digest(FACE_LANDMARK_MODEL, &path).unwrap(), digest);
        verify_models_dir(&dir).unwrap();

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn verify_models_dir_detects_tampering() {
        let dir = scratch_dir("tamper");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(FACE_LANDMARK_MODEL);
        fs::write(&path, b"weights").unwrap();
        write_digest(&path, &sha256_file_hex(&path).unwrap()).unwrap();
        fs::write(&path, b"other weights").unwrap();

        let err = verify_models_dir(&dir).unwrap_err();
        assert!(matches!(err, ModelIntegrityError::ChecksumMismatch { .. }));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn verify_models_dir_requires_digest() {
        let dir = scratch_dir("nodigest");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(FACE_LANDMARK_MODEL), b"weights").unwrap();

        let err = verify_models_dir(&dir).unwrap_err();
        assert!(matches!(err, ModelIntegrityError::MissingDigest { .. }));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn read_digest_rejects_garbage() {
        let dir = scratch_dir("garbage");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(FACE_LANDMARK_MODEL);
        fs::write(digest_path(&path), "not-a-digest\n").unwrap();

        let err = read_digest(FACE_LANDMARK_MODEL, &path).unwrap_err();
        assert!(matches!(err, ModelIntegrityError::MalformedDigest { .. }));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn verify_models_dir_reports_missing() {
        let err = verify_models_dir(&scratch_dir("dir-missing")).unwrap_err();
        assert!(matches!(err, ModelIntegrityError::MissingModel { .. }));
    }
}

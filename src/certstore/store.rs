//! Durable credential store backed by a filesystem directory.

use super::bundle::{open_bundle, Credential};
use super::metadata::{CertificateSummary, CredentialRecord};
use crate::error::{Error, Result};
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const BUNDLE_FILENAME: &str = "institutional.pfx";
const RECORD_FILENAME: &str = "credential.json";

/// Single source of truth for the institutional signing credential.
///
/// The storage directory is injected at construction so deployments and
/// tests choose their own location. Mutating operations (`configure`,
/// `revoke`) are serialized through an internal mutex and every file write
/// goes through write-temp-then-rename, so readers never observe a
/// half-written bundle or record.
pub struct CertificateStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl std::fmt::Debug for CertificateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateStore").field("dir", &self.dir).finish()
    }
}

impl CertificateStore {
    /// Create a store rooted at `dir`, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    /// The storage directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn bundle_path(&self) -> PathBuf {
        self.dir.join(BUNDLE_FILENAME)
    }

    fn record_path(&self) -> PathBuf {
        self.dir.join(RECORD_FILENAME)
    }

    /// Validate and persist an uploaded PKCS#12 bundle.
    ///
    /// The bundle is fully opened with the given passphrase before anything
    /// touches disk, so a wrong passphrase, a corrupt structure, or a
    /// bundle without a key entry never destroys a working credential.
    /// On success the previous credential (if any) is replaced.
    pub fn configure(&self, bundle: &[u8], passphrase: &str) -> Result<CertificateSummary> {
        let credential = open_bundle(bundle, passphrase)?;
        let record = CredentialRecord::from_leaf(credential.leaf(), passphrase)?;
        let json = serde_json::to_vec_pretty(&record)
            .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;

        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        write_atomic(&self.bundle_path(), bundle)?;
        write_atomic(&self.record_path(), &json)?;

        let summary = record.summary_at(Utc::now());
        log::info!(
            "signing credential configured: subject CN {:?}, expires {}",
            summary.subject_common_name,
            summary.not_after
        );
        Ok(summary)
    }

    /// Current credential status, or `None` when nothing is configured.
    ///
    /// Unreadable or unparseable persisted state also reports `None` (with
    /// a warning) instead of an error: the admin surface treats both the
    /// same way, by asking for a fresh upload.
    pub fn status(&self) -> Option<CertificateSummary> {
        if !self.bundle_path().exists() || !self.record_path().exists() {
            return None;
        }
        match self.read_record() {
            Ok(record) => Some(record.summary_at(Utc::now())),
            Err(e) => {
                log::warn!("credential metadata unreadable, reporting absent: {}", e);
                None
            },
        }
    }

    /// Delete all persisted credential material. Revoking an absent
    /// credential is a no-op, not an error.
    pub fn revoke(&self) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        // Bundle first: the existence probe turns false before the record goes
        remove_if_exists(&self.bundle_path())?;
        remove_if_exists(&self.record_path())?;
        log::info!("signing credential revoked");
        Ok(())
    }

    /// Cheap existence probe used on hot paths before attempting a sign.
    /// Does NOT re-validate the passphrase or re-parse the chain; the
    /// validating accessor is [`load_credential`](Self::load_credential).
    pub fn has_valid_credential(&self) -> bool {
        self.bundle_path().exists()
    }

    /// Re-open the persisted bundle with the persisted passphrase and
    /// re-derive key + chain. Called on every signing operation; the
    /// decrypted key lives only as long as the returned [`Credential`].
    pub fn load_credential(&self) -> Result<Credential> {
        if !self.has_valid_credential() {
            return Err(Error::NotConfigured);
        }
        let record = self.read_record().map_err(|e| {
            log::warn!("credential record unreadable during load: {}", e);
            Error::NotConfigured
        })?;
        let bundle = fs::read(self.bundle_path())?;
        open_bundle(&bundle, &record.passphrase)
    }

    fn read_record(&self) -> Result<CredentialRecord> {
        let bytes = fs::read(self.record_path())?;
        serde_json::from_slice(&bytes)
            .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
    }
}

/// Write via a temporary file in the same directory, then rename into
/// place, so concurrent readers see the old or the new content and never
/// a partial write.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

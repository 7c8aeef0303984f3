use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::pipeline::GeneratedReport;

const MANIFEST_ENTRY: &str = "manifest.json";
const REPORTS_DIR: &str = "reports";
pub const BUNDLE_FORMAT_V1: &str = "srsd-reports-v1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub path: String,
    pub group: String,
    pub layout: String,
    pub sha256: String,
    pub bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub format: String,
    pub app_version: String,
    pub exported_at: String,
    pub run_id: String,
    pub entries: Vec<ManifestEntry>,
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// One zip holding every report of a run under `reports/` plus a manifest.
pub fn export_report_bundle(
    reports: &[GeneratedReport],
    out_path: &Path,
    run_id: &str,
) -> anyhow::Result<Manifest> {
    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }
    let out_file = File::create(out_path).with_context(|| {
        format!(
            "failed to create output file {}",
            out_path.to_string_lossy()
        )
    })?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut entries = Vec::with_capacity(reports.len());
    for report in reports {
        let bytes = report
            .document
            .to_xlsx_bytes()
            .with_context(|| format!("failed to build {}", report.file_name))?;
        let path = format!("{}/{}", REPORTS_DIR, report.file_name);
        zip.start_file(path.as_str(), opts)
            .with_context(|| format!("failed to start entry {}", path))?;
        zip.write_all(&bytes)
            .with_context(|| format!("failed to write entry {}", path))?;
        entries.push(ManifestEntry {
            sha256: sha256_hex(&bytes),
            bytes: bytes.len() as u64,
            path,
            group: report.group.clone(),
            layout: report.layout.clone(),
        });
    }

    let manifest = Manifest {
        format: BUNDLE_FORMAT_V1.to_string(),
        app_version: env!("CARGO_PKG_VERSION").to_string(),
        exported_at: chrono::Utc::now().to_rfc3339(),
        run_id: run_id.to_string(),
        entries,
    };
    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;

    zip.finish().context("failed to finalize zip bundle")?;
    Ok(manifest)
}

/// Reads the manifest and checks every listed entry against its checksum.
pub fn read_manifest(in_path: &Path) -> anyhow::Result<Manifest> {
    let in_file = File::open(in_path)
        .with_context(|| format!("failed to open bundle {}", in_path.to_string_lossy()))?;
    let mut archive = ZipArchive::new(in_file).context("invalid zip archive")?;

    let mut manifest_text = String::new();
    archive
        .by_name(MANIFEST_ENTRY)
        .context("bundle missing manifest.json")?
        .read_to_string(&mut manifest_text)
        .context("failed to read manifest.json")?;
    let manifest: Manifest =
        serde_json::from_str(&manifest_text).context("manifest.json is invalid")?;
    if manifest.format != BUNDLE_FORMAT_V1 {
        return Err(anyhow!("unsupported bundle format: {}", manifest.format));
    }

    for entry in &manifest.entries {
        let mut bytes = Vec::new();
        archive
            .by_name(&entry.path)
            .with_context(|| format!("bundle missing {}", entry.path))?
            .read_to_end(&mut bytes)
            .with_context(|| format!("failed to read {}", entry.path))?;
        if sha256_hex(&bytes) != entry.sha256 {
            return Err(anyhow!("checksum mismatch for {}", entry.path));
        }
    }
    Ok(manifest)
}

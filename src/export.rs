use crate::model::Teacher;
use anyhow::Context;
use serde_json::json;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

const MANIFEST_ENTRY: &str = "manifest.json";
const FACULTY_ENTRY: &str = "faculty.csv";
const CERTIFICATES_ENTRY: &str = "certificates.csv";
pub const EXPORT_FORMAT_V1: &str = "certboard-leaderboard-v1";

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub export_format: String,
    pub entry_count: usize,
    pub faculty_rows: usize,
    pub certificate_rows: usize,
}

pub fn csv_quote(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

pub fn faculty_csv(teachers: &[Teacher]) -> String {
    let mut csv = String::from("Name,Email,Department,Contact Number,Total Points,Certifications\n");
    for t in teachers {
        let cert_names: Vec<&str> = t.certifications.iter().map(|c| c.name.as_str()).collect();
        csv.push_str(&format!(
            "{},{},{},{},{},{}\n",
            csv_quote(&t.name),
            csv_quote(&t.email),
            csv_quote(&t.department),
            csv_quote(&t.contact_number),
            t.total_points,
            csv_quote(&cert_names.join(", "))
        ));
    }
    csv
}

pub fn certificates_csv(teachers: &[Teacher]) -> (String, usize) {
    let mut csv = String::from(
        "Faculty Name,Faculty Email,Department,Certificate,Issuing Organization,Issue Date,Type,Points,Credential ID,Credential URL\n",
    );
    let mut rows = 0usize;
    for t in teachers {
        for c in &t.certifications {
            rows += 1;
            csv.push_str(&format!(
                "{},{},{},{},{},{},{},{},{},{}\n",
                csv_quote(&t.name),
                csv_quote(&t.email),
                csv_quote(&t.department),
                csv_quote(&c.name),
                csv_quote(&c.issuing_organization),
                csv_quote(&c.issue_date),
                csv_quote(&c.cert_type),
                c.points,
                csv_quote(c.credential_id.as_deref().unwrap_or("")),
                csv_quote(c.credential_url.as_deref().unwrap_or(""))
            ));
        }
    }
    (csv, rows)
}

/// Writes the admin leaderboard bundle: manifest plus two CSV sheets.
pub fn export_leaderboard_bundle(teachers: &[Teacher], out_path: &Path) -> anyhow::Result<ExportSummary> {
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

    let (certificates, certificate_rows) = certificates_csv(teachers);
    let manifest = json!({
        "format": EXPORT_FORMAT_V1,
        "version": 1,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "exportedAt": crate::model::now_ts(),
        "facultyCount": teachers.len(),
        "certificateCount": certificate_rows,
    });
    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;

    zip.start_file(FACULTY_ENTRY, opts)
        .context("failed to start faculty entry")?;
    zip.write_all(faculty_csv(teachers).as_bytes())
        .context("failed to write faculty entry")?;

    zip.start_file(CERTIFICATES_ENTRY, opts)
        .context("failed to start certificates entry")?;
    zip.write_all(certificates.as_bytes())
        .context("failed to write certificates entry")?;

    zip.finish().context("failed to finalize zip bundle")?;

    Ok(ExportSummary {
        export_format: EXPORT_FORMAT_V1.to_string(),
        entry_count: 3,
        faculty_rows: teachers.len(),
        certificate_rows,
    })
}

//! Inspect command implementation.

use crate::Format;
use serde::Serialize;
use std::path::Path;
use usagelog_codec::{unpack, Section, Snapshot, Ticks};

/// Payload inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Payload path.
    pub path: String,
    /// Payload size in bytes.
    pub size: usize,
    /// Record count per section, in wire order.
    pub sections: Vec<SectionStats>,
    /// Total records across sections.
    pub total_records: usize,
    /// Earliest fact timestamp, if any facts are present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub earliest: Option<String>,
    /// Latest fact timestamp, if any facts are present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest: Option<String>,
    /// Total time spent across feature entries.
    pub time_spent: f64,
}

/// Record count of a single section.
#[derive(Debug, Serialize)]
pub struct SectionStats {
    /// Section name.
    pub name: &'static str,
    /// Number of records.
    pub records: usize,
}

/// Runs the inspect command.
pub fn run(path: &Path, format: Format) -> Result<(), Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("No payload found at {}", path.display()).into());
    }
    let bytes = std::fs::read(path)?;
    let snapshot = unpack(&bytes)?;
    let result = summarize(path, bytes.len(), &snapshot);

    match format {
        Format::Json => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Format::Text => {
            print_text_output(&result);
        }
    }

    Ok(())
}

fn summarize(path: &Path, size: usize, snapshot: &Snapshot) -> InspectResult {
    let stamps: Vec<Ticks> = snapshot
        .feature_entries
        .iter()
        .map(|e| e.created_at)
        .chain(snapshot.feature_exception_entries.iter().map(|e| e.created_at))
        .collect();

    InspectResult {
        path: path.display().to_string(),
        size,
        sections: Section::ALL
            .iter()
            .map(|section| SectionStats {
                name: section.name(),
                records: snapshot.section_len(*section),
            })
            .collect(),
        total_records: snapshot.total_records(),
        earliest: stamps.iter().min().map(ToString::to_string),
        latest: stamps.iter().max().map(ToString::to_string),
        time_spent: snapshot.feature_entries.iter().map(|e| e.time_spent).sum(),
    }
}

fn print_text_output(result: &InspectResult) {
    println!("Usagelog Payload Inspection");
    println!("===========================");
    println!();
    println!("Path: {}", result.path);
    println!("Size: {} bytes", result.size);
    println!();
    println!("Sections:");
    for section in &result.sections {
        println!("  {:<24} {:>6}", section.name, section.records);
    }
    println!("  {:<24} {:>6}", "Total", result.total_records);

    if let (Some(earliest), Some(latest)) = (&result.earliest, &result.latest) {
        println!();
        println!("Activity:");
        println!("  From:       {earliest}");
        println!("  To:         {latest}");
        println!("  Time spent: {:.1}", result.time_spent);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use usagelog_testkit::{sample_snapshot, snapshot_with_facts};

    #[test]
    fn summary_counts_sections() {
        let result = summarize(Path::new("device.bin"), 10, &sample_snapshot());
        assert_eq!(result.sections.len(), 7);
        assert_eq!(result.sections[0].name, Section::Contexts.name());
        assert_eq!(result.total_records, 7);
        assert_eq!(result.time_spent, 12.5);
        assert!(result.earliest.is_some());
    }

    #[test]
    fn summary_without_facts_has_no_range() {
        let mut snapshot = snapshot_with_facts(0);
        snapshot.feature_exception_entries.clear();
        let result = summarize(Path::new("device.bin"), 10, &snapshot);
        assert!(result.earliest.is_none());
        assert!(result.latest.is_none());
    }

    #[test]
    fn summary_serializes() {
        let result = summarize(Path::new("device.bin"), 10, &snapshot_with_facts(3));
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"total_records\""));
    }

    #[test]
    fn rejects_corrupt_payload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("device.bin");
        std::fs::write(&path, [1u8, 0, 5]).unwrap();
        assert!(run(&path, Format::Text).is_err());
    }
}

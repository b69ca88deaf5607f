//! Pack command implementation.

use std::path::Path;
use usagelog_codec::{pack, Snapshot};

/// Packs the JSON snapshot at `input` into a wire payload at `output`.
pub fn run(input: &Path, output: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let json = std::fs::read_to_string(input)?;
    let snapshot: Snapshot = serde_json::from_str(&json)?;
    let bytes = pack(&snapshot)?;
    std::fs::write(output, &bytes)?;

    tracing::info!(
        records = snapshot.total_records(),
        bytes = bytes.len(),
        "payload written"
    );
    println!(
        "Packed {} records ({} bytes) into {}",
        snapshot.total_records(),
        bytes.len(),
        output.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use usagelog_codec::unpack;
    use usagelog_testkit::{sample_snapshot, sample_snapshot_json};

    #[test]
    fn packs_json_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("snapshot.json");
        let output = dir.path().join("device.bin");
        std::fs::write(&input, sample_snapshot_json()).unwrap();

        run(&input, &output).unwrap();

        let bytes = std::fs::read(&output).unwrap();
        assert_eq!(unpack(&bytes).unwrap(), sample_snapshot());
    }

    #[test]
    fn rejects_unrepresentable_text() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("snapshot.json");
        let output = dir.path().join("device.bin");

        let mut snapshot = sample_snapshot();
        snapshot.contexts[0].name = "Agenda \u{2603}".into();
        std::fs::write(&input, serde_json::to_string(&snapshot).unwrap()).unwrap();

        assert!(run(&input, &output).is_err());
        assert!(!output.exists());
    }
}

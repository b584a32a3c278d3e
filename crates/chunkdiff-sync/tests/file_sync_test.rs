//! File-level compare and synchronize against a temp directory.

use chunkdiff_core::{ChunkdiffConfig, ErrorKind};
use chunkdiff_sync::{chunk_file, compare_files, synchronize_file, WireComparison};
use std::path::Path;

fn write(dir: &Path, name: &str, data: &[u8]) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, data).unwrap();
    path
}

fn sample_text(lines: usize) -> Vec<u8> {
    (0..lines)
        .flat_map(|i| format!("{i:05} the value is {}\n", i * 31 % 97).into_bytes())
        .collect()
}

#[test]
fn compare_then_sync_reproduces_new_file() {
    let tmp = tempfile::tempdir().unwrap();
    let old_data: Vec<u8> = (0u32..50_000).map(|i| (i.wrapping_mul(2654435761) >> 13) as u8).collect();
    let mut new_data = old_data.clone();
    new_data[20_000..20_010].copy_from_slice(b"0123456789");
    new_data.extend_from_slice(b"appended tail");

    let old = write(tmp.path(), "old.bin", &old_data);
    let new = write(tmp.path(), "new.bin", &new_data);
    let plan_path = tmp.path().join("plan.json");
    let out = tmp.path().join("out.bin");

    let config = ChunkdiffConfig::default();
    let comparison = compare_files(&old, &new, &config).unwrap();
    assert!(comparison.diff.stats.unchanged > 0);
    // 50 KB picks the 1 KiB tier
    assert!(comparison.new.chunks().iter().all(|c| c.size <= 2048));

    let json = serde_json::to_vec_pretty(&comparison.to_wire()).unwrap();
    std::fs::write(&plan_path, json).unwrap();

    let written = synchronize_file(&old, &plan_path, &out).unwrap();
    assert_eq!(written, new_data.len() as u64);
    assert_eq!(std::fs::read(&out).unwrap(), new_data);
}

#[test]
fn sync_accepts_bare_plan_and_operation_list() {
    let tmp = tempfile::tempdir().unwrap();
    let old = write(tmp.path(), "old.txt", b"hello world\n");
    let new = write(tmp.path(), "new.txt", b"hello there world\n");

    let comparison = compare_files(&old, &new, &ChunkdiffConfig::default()).unwrap();
    let plan = comparison.plan.to_wire();

    let plan_path = write(tmp.path(), "plan.json", &serde_json::to_vec(&plan).unwrap());
    let ops_path = write(
        tmp.path(),
        "ops.json",
        &serde_json::to_vec(&plan.operations).unwrap(),
    );

    for (doc, out) in [(&plan_path, "a.txt"), (&ops_path, "b.txt")] {
        let out = tmp.path().join(out);
        synchronize_file(&old, doc, &out).unwrap();
        assert_eq!(std::fs::read(&out).unwrap(), b"hello there world\n");
    }
}

#[test]
fn small_text_files_use_line_mode() {
    let tmp = tempfile::tempdir().unwrap();
    let old = write(tmp.path(), "old.md", &sample_text(20));
    let mut edited = sample_text(20);
    edited.splice(0..0, b"# heading\n".iter().copied());
    let new = write(tmp.path(), "new.md", &edited);

    let comparison = compare_files(&old, &new, &ChunkdiffConfig::default()).unwrap();
    assert_eq!(comparison.new.len(), 21);
    assert!(comparison.new.chunks().iter().all(|c| c.data.ends_with(b"\n")));
    assert_eq!(comparison.diff.stats.unchanged, 20);
    assert_eq!(comparison.diff.added.len(), 1);
}

#[test]
fn wire_comparison_round_trips_through_json() {
    let tmp = tempfile::tempdir().unwrap();
    let old = write(tmp.path(), "a.bin", b"AAAABBBB");
    let new = write(tmp.path(), "b.bin", b"AAAAXBBBB");

    let wire = compare_files(&old, &new, &ChunkdiffConfig::default())
        .unwrap()
        .to_wire();
    let json = serde_json::to_string(&wire).unwrap();
    let parsed: WireComparison = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, wire);
    assert_eq!(parsed.sync_plan.operations[0].kind, "MODIFY");
    assert_eq!(parsed.diff_report.summary.modified, 1);
}

#[test]
fn missing_input_is_not_found() {
    let tmp = tempfile::tempdir().unwrap();
    let new = write(tmp.path(), "new.bin", b"data");
    let err = compare_files(&tmp.path().join("nope.bin"), &new, &ChunkdiffConfig::default())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn empty_input_respects_allow_empty() {
    let tmp = tempfile::tempdir().unwrap();
    let old = write(tmp.path(), "old.bin", b"");
    let new = write(tmp.path(), "new.bin", b"hello");

    let mut config = ChunkdiffConfig::default();
    let comparison = compare_files(&old, &new, &config).unwrap();
    assert_eq!(comparison.diff.added.len(), 1);

    config.compare.allow_empty = false;
    let err = compare_files(&old, &new, &config).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EmptyInput);
    let err = chunk_file(&old, &config).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EmptyInput);
}

#[test]
fn empty_new_file_is_rejected_when_disallowed() {
    let tmp = tempfile::tempdir().unwrap();
    let old = write(tmp.path(), "old.txt", b"hello\n");
    let new = write(tmp.path(), "new.txt", b"");

    let mut config = ChunkdiffConfig::default();
    let comparison = compare_files(&old, &new, &config).unwrap();
    assert!(comparison.new.is_empty());
    assert_eq!(comparison.plan.new_size, 0);
    assert_eq!(comparison.old.source, old.display().to_string());
    assert_eq!(comparison.new.source, new.display().to_string());

    config.compare.allow_empty = false;
    let err = compare_files(&old, &new, &config).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EmptyInput);
    assert!(err.to_string().contains("new.txt"));
}

#[test]
fn failed_sync_leaves_output_untouched() {
    let tmp = tempfile::tempdir().unwrap();
    let old = write(tmp.path(), "old.bin", b"hello");
    let out = write(tmp.path(), "out.bin", b"previous contents");
    let plan = write(
        tmp.path(),
        "plan.json",
        br#"[{"type":"ADD","offset":0,"size":2,"data":"aGk="},{"type":"SPLICE","offset":2,"size":1}]"#,
    );

    let err = synchronize_file(&old, &plan, &out).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownOperation);
    assert_eq!(std::fs::read(&out).unwrap(), b"previous contents");
    // No stray temp files next to the output
    assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 3);
}

#[test]
fn unparseable_plan_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let old = write(tmp.path(), "old.bin", b"hello");
    let plan = write(tmp.path(), "plan.json", b"{\"sync\": true}");
    let err = synchronize_file(&old, &plan, &tmp.path().join("out.bin")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Other);
    assert!(!tmp.path().join("out.bin").exists());
}

#[test]
fn chunk_file_partitions_file() {
    let tmp = tempfile::tempdir().unwrap();
    let data: Vec<u8> = (0u32..10_000).map(|i| (i * 7 % 251) as u8).collect();
    let path = write(tmp.path(), "data.bin", &data);

    let map = chunk_file(&path, &ChunkdiffConfig::default()).unwrap();
    assert_eq!(map.file_size(), 10_000);
    map.validate().unwrap();
    let rebuilt: Vec<u8> = map.chunks().iter().flat_map(|c| c.data.iter().copied()).collect();
    assert_eq!(rebuilt, data);
}

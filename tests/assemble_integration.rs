//! Integration tests for the assembly stage using a scripted fake converter.
//!
//! The fake tool mimics the real converter's argument contract (the concat
//! list arrives after `-i`, the output path is the final argument) and its
//! `-progress -` key=value output stream.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use confdl_core::{AssembleError, Assembler, ProgressLine};
use tempfile::TempDir;

/// Writes an executable fake converter script.
///
/// The script emits progress markers, copies its concat list to
/// `capture_to` so tests can inspect the invocation, and exits with
/// `exit_code`. Like the real tool it starts writing its output file
/// before it knows whether the run will succeed, so a failing run leaves
/// truncated bytes at its output argument.
fn fake_converter(dir: &Path, exit_code: i32, capture_to: &Path) -> PathBuf {
    let script = dir.join("fake-ffmpeg");
    let body = format!(
        r#"#!/bin/sh
prev=""
list=""
for arg in "$@"; do
    if [ "$prev" = "-i" ]; then list="$arg"; fi
    prev="$arg"
    out="$arg"
done
cp "$list" "{capture}"
printf 'truncated-bytes' > "$out"
echo "bitrate= 256.0kbits/s"
echo "total_size=512"
echo "progress=continue"
echo "progress=end"
if [ "{code}" -eq 0 ]; then printf 'converted-media' > "$out"; fi
exit {code}
"#,
        capture = capture_to.display(),
        code = exit_code
    );
    std::fs::write(&script, body).expect("should write fake converter");
    let mut perms = std::fs::metadata(&script)
        .expect("should stat script")
        .permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&script, perms).expect("should chmod script");
    script
}

/// Lays out a temp segment directory with files in playlist order.
fn seed_segments(temp_dir: &Path, names: &[&str]) -> Vec<PathBuf> {
    let video_dir = temp_dir.join("video");
    std::fs::create_dir_all(&video_dir).expect("should create video dir");
    names
        .iter()
        .map(|name| {
            let path = video_dir.join(name);
            std::fs::write(&path, name.as_bytes()).expect("should write segment");
            path
        })
        .collect()
}

#[tokio::test]
async fn test_successful_assembly_removes_temp_directory() {
    let workspace = TempDir::new().expect("failed to create temp dir");
    let temp_dir = workspace.path().join("out.mp4.part");
    let segments = seed_segments(&temp_dir, &["seg0.ts", "seg1.ts"]);
    let output = workspace.path().join("out.mp4");
    let capture = workspace.path().join("captured-list.txt");
    let tool = fake_converter(workspace.path(), 0, &capture);

    Assembler::with_tool(&tool)
        .assemble(&segments, &temp_dir, &output, &ProgressLine::hidden())
        .await
        .expect("assembly should succeed");

    assert_eq!(
        std::fs::read(&output).expect("should read output"),
        b"converted-media",
        "destination must hold the finished conversion"
    );
    assert!(
        !temp_dir.exists(),
        "temp segment directory must be removed on success"
    );
}

#[tokio::test]
async fn test_failed_assembly_preserves_temp_directory() {
    let workspace = TempDir::new().expect("failed to create temp dir");
    let temp_dir = workspace.path().join("out.mp4.part");
    let segments = seed_segments(&temp_dir, &["seg0.ts", "seg1.ts"]);
    let output = workspace.path().join("out.mp4");
    let capture = workspace.path().join("captured-list.txt");
    let tool = fake_converter(workspace.path(), 1, &capture);

    let result = Assembler::with_tool(&tool)
        .assemble(&segments, &temp_dir, &output, &ProgressLine::hidden())
        .await;

    assert!(matches!(
        result,
        Err(AssembleError::ConversionFailed { .. })
    ));
    assert!(
        temp_dir.exists(),
        "temp directory must be preserved for diagnosis"
    );
    for segment in &segments {
        assert!(segment.exists(), "fetched segments must survive a failure");
    }
    // The converter got partway through writing before it died; those bytes
    // must stay inside the temp dir, never at the destination path.
    assert!(
        !output.exists(),
        "destination path must stay absent when conversion fails"
    );
    assert_eq!(
        std::fs::read(temp_dir.join("out.mp4")).expect("should read staged file"),
        b"truncated-bytes",
        "partial converter output stays staged in the temp dir"
    );
}

#[tokio::test]
async fn test_concat_list_preserves_playlist_order() {
    let workspace = TempDir::new().expect("failed to create temp dir");
    let temp_dir = workspace.path().join("out.mp4.part");
    // Names chosen so lexicographic order differs from playlist order.
    let segments = seed_segments(&temp_dir, &["seg10.ts", "seg2.ts", "seg1.ts"]);
    let output = workspace.path().join("out.mp4");
    let capture = workspace.path().join("captured-list.txt");
    let tool = fake_converter(workspace.path(), 0, &capture);

    Assembler::with_tool(&tool)
        .assemble(&segments, &temp_dir, &output, &ProgressLine::hidden())
        .await
        .expect("assembly should succeed");

    let list = std::fs::read_to_string(&capture).expect("should read captured list");
    let listed: Vec<&str> = list
        .lines()
        .map(|line| {
            line.trim_start_matches("file '")
                .trim_end_matches('\'')
                .rsplit('/')
                .next()
                .unwrap_or(line)
        })
        .collect();
    assert_eq!(
        listed,
        vec!["seg10.ts", "seg2.ts", "seg1.ts"],
        "concat list must follow playlist order exactly"
    );
}

#[tokio::test]
async fn test_missing_tool_is_reported_not_fatal() {
    let error = Assembler::with_tool("/nonexistent/converter")
        .assemble(
            &[],
            Path::new("/nonexistent/tmp"),
            Path::new("/nonexistent/out.mp4"),
            &ProgressLine::hidden(),
        )
        .await
        .expect_err("spawn must fail");

    // An unlocatable tool surfaces as a subprocess error here; the
    // pipeline's Assembler::locate() catches the common case up front.
    assert!(matches!(
        error,
        AssembleError::Subprocess { .. } | AssembleError::Io { .. }
    ));
}

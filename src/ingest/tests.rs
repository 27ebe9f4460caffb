use super::*;
use crate::ErrorKind;
use crate::chunking::SplitStrategy;
use std::fs;
use tempfile::TempDir;

#[test]
fn single_text_file() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    fs::write(
        temp_dir.path().join("test.txt"),
        "This is a test text file.\nIt has multiple lines.\n",
    )
    .expect("should write test file");

    let chunks = process_files(temp_dir.path(), &ChunkingConfig::default())
        .expect("should process directory");

    assert!(!chunks.is_empty());
    assert!(
        chunks
            .iter()
            .any(|c| c.text.contains("This is a test text file."))
    );
    assert_eq!(chunks[0].source, temp_dir.path().join("test.txt"));
}

#[test]
fn chunk_ids_are_ordinal_across_files() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    fs::write(
        temp_dir.path().join("a.txt"),
        "First file sentence one. First file sentence two.",
    )
    .expect("should write a.txt");
    fs::write(temp_dir.path().join("b.txt"), "Second file.").expect("should write b.txt");

    let config = ChunkingConfig {
        max_length: 30,
        chunk_overlap: 0,
        strategy: SplitStrategy::Separator,
        recursive: false,
    };
    let chunks = process_files(temp_dir.path(), &config).expect("should process directory");

    assert_eq!(chunks.len(), 3);
    assert_eq!(
        chunks.iter().map(|c| c.id).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
    assert_eq!(chunks[2].text, "Second file.");
    assert_eq!(chunks[2].source, temp_dir.path().join("b.txt"));
}

#[test]
fn unsupported_and_empty_files_are_skipped() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    fs::write(temp_dir.path().join("table.csv"), "a,b").expect("should write csv");
    fs::write(temp_dir.path().join("empty.txt"), "   ").expect("should write empty");

    let chunks = process_files(temp_dir.path(), &ChunkingConfig::default())
        .expect("should process directory");
    assert!(chunks.is_empty());
}

#[test]
fn recursion_follows_config() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let nested = temp_dir.path().join("nested");
    fs::create_dir(&nested).expect("should create nested dir");
    fs::write(nested.join("deep.txt"), "Deep content.").expect("should write deep.txt");

    let flat = process_files(temp_dir.path(), &ChunkingConfig::default())
        .expect("should process directory");
    assert!(flat.is_empty());

    let config = ChunkingConfig {
        recursive: true,
        ..ChunkingConfig::default()
    };
    let deep = process_files(temp_dir.path(), &config).expect("should process directory");
    assert_eq!(deep.len(), 1);
    assert_eq!(deep[0].text, "Deep content.");
}

#[test]
fn missing_directory_is_not_found() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let err = process_files(&temp_dir.path().join("missing"), &ChunkingConfig::default())
        .expect_err("missing directory should fail");
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

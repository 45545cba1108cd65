// Integration tests for load, flush and delete

mod common;

use common::SaveFixture;
use savelite::{CompressionMethod, EncryptionMethod, Error, ErrorKind, Settings};
use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Character {
    name: String,
    level: u32,
    inventory: Vec<String>,
}

fn hero() -> Character {
    Character {
        name: "Aria".to_string(),
        level: 12,
        inventory: vec!["bow".to_string(), "lantern".to_string()],
    }
}

#[test]
fn test_flush_load_delete_scenario() {
    let fixture = SaveFixture::new();
    let saves = fixture.engine();

    saves.write("test", "my-test-value").unwrap();

    let flush = saves.flush().wait().unwrap();
    assert!(flush.problem.is_none());
    assert_eq!(flush.backup_count, 0);
    assert_eq!(flush.backup_index, None);

    // Plain settings store raw JSON
    assert_eq!(
        fs::read_to_string(fixture.primary_path()).unwrap(),
        r#"{"test":"my-test-value"}"#
    );

    saves.remove("test").unwrap();
    let load = saves.load(false, false).wait().unwrap();
    assert!(load.is_success());
    assert_eq!(load.backup_index, None);
    assert!(!load.not_found);
    assert!(!load.empty_file);
    assert_eq!(saves.read::<String>("test").unwrap(), "my-test-value");

    let delete = saves.delete().wait().unwrap();
    assert!(delete.is_success());
    assert!(!fixture.primary_path().exists());

    let load = saves.load(false, false).wait().unwrap();
    assert!(load.not_found);
    assert_eq!(load.problem.unwrap().kind(), ErrorKind::FileAccess);
}

#[test]
fn test_load_missing_root_does_not_create_directory() {
    let fixture = SaveFixture::new();
    let saves = fixture.engine();

    let report = saves.load(false, true).wait().unwrap();
    assert!(report.is_success());
    assert!(report.not_found);
    assert_eq!(report.backup_count, 0);
    assert!(!fixture.root.exists());
    assert!(!saves.is_loaded());
}

#[test]
fn test_load_missing_keeps_previous_document() {
    let fixture = SaveFixture::new();
    let saves = fixture.engine();
    saves.write("keep", &1).unwrap();

    let report = saves.load(false, true).wait().unwrap();
    assert!(report.is_success());
    assert_eq!(saves.read::<i32>("keep").unwrap(), 1);
}

#[test]
fn test_empty_file_policy() {
    let fixture = SaveFixture::new();
    fs::create_dir_all(fixture.profile_dir()).unwrap();
    fs::write(fixture.primary_path(), "").unwrap();

    let saves = fixture.engine();
    saves.write("stale", &true).unwrap();

    let strict = saves.load(false, false).wait().unwrap();
    assert!(strict.empty_file);
    assert!(matches!(strict.problem, Some(Error::EmptyFile { .. })));
    // Failed load leaves the document untouched
    assert!(saves.has("stale"));

    let lenient = saves.load(true, false).wait().unwrap();
    assert!(lenient.is_success());
    assert!(lenient.empty_file);
    assert!(!saves.has("stale"));
    assert!(saves.is_loaded());
}

#[test]
fn test_corrupt_file_reports_deserialization() {
    let fixture = SaveFixture::new();
    fs::create_dir_all(fixture.profile_dir()).unwrap();
    fs::write(fixture.primary_path(), "{ this is not json").unwrap();

    let saves = fixture.engine();
    saves.write("before", "corruption").unwrap();

    let report = saves.load(true, true).wait().unwrap();
    let problem = report.problem.expect("expected a problem");
    assert_eq!(problem.kind(), ErrorKind::Deserialization);
    assert_eq!(saves.read::<String>("before").unwrap(), "corruption");
}

#[test]
fn test_non_utf8_file_reports_deserialization() {
    let fixture = SaveFixture::new();
    fs::create_dir_all(fixture.profile_dir()).unwrap();
    fs::write(fixture.primary_path(), [0xff, 0xfe, 0x00]).unwrap();

    let saves = fixture.engine();
    let report = saves.load(true, true).wait().unwrap();
    assert!(!report.not_found);
    assert!(!report.empty_file);
    assert_eq!(
        report.problem.expect("expected a problem").kind(),
        ErrorKind::Deserialization
    );
    assert!(!saves.is_loaded());
}

#[test]
fn test_whitespace_file_is_parsed_not_empty() {
    let fixture = SaveFixture::new();
    fs::create_dir_all(fixture.profile_dir()).unwrap();
    fs::write(fixture.primary_path(), "  \n\t").unwrap();

    let saves = fixture.engine();
    let report = saves.load(true, false).wait().unwrap();
    assert!(!report.empty_file);
    assert_eq!(
        report.problem.expect("expected a problem").kind(),
        ErrorKind::Deserialization
    );

    // Surrounding whitespace around a real document is fine
    fs::write(fixture.primary_path(), "\n{\"k\": 1}\n").unwrap();
    let report = saves.load(false, false).wait().unwrap();
    assert!(report.is_success());
    assert_eq!(saves.read::<i32>("k").unwrap(), 1);
}

#[test]
fn test_roundtrip_every_pipeline() {
    let pipelines = [
        (CompressionMethod::None, EncryptionMethod::None),
        (CompressionMethod::GZip, EncryptionMethod::None),
        (CompressionMethod::None, EncryptionMethod::Aes),
        (CompressionMethod::GZip, EncryptionMethod::Aes),
    ];

    for (compression, encryption) in pipelines {
        let fixture = SaveFixture::new();
        let settings = fixture
            .settings()
            .with_compression(compression)
            .with_encryption(encryption)
            .with_passphrase("roundtrip")
            .with_max_backups(1);

        let writer = fixture.engine_with(settings.clone());
        writer.write("hero", &hero()).unwrap();
        writer.write("gold", &1234u64).unwrap();
        assert!(writer.flush().wait().unwrap().is_success());
        let written = writer.snapshot().unwrap();

        let reader = fixture.engine_with(settings);
        let report = reader.load(false, false).wait().unwrap();
        assert!(report.is_success(), "{:?}/{:?}: {:?}", compression, encryption, report);
        assert_eq!(reader.snapshot().unwrap(), written);
        assert_eq!(reader.read::<Character>("hero").unwrap(), hero());
    }
}

#[test]
fn test_encrypted_file_hides_content() {
    let fixture = SaveFixture::new();
    let settings = fixture
        .settings()
        .with_compression(CompressionMethod::GZip)
        .with_encryption(EncryptionMethod::Aes)
        .with_passphrase("s3cret");
    let saves = fixture.engine_with(settings.clone());

    saves.write("secret", "buried treasure").unwrap();
    assert!(saves.flush().wait().unwrap().is_success());

    let stored = fs::read_to_string(fixture.primary_path()).unwrap();
    assert!(!stored.contains("buried"));

    let wrong = fixture.engine_with(settings.with_passphrase("guess"));
    let report = wrong.load(false, false).wait().unwrap();
    assert_eq!(report.problem.unwrap().kind(), ErrorKind::Deserialization);
}

#[test]
fn test_delete_missing_primary_is_an_error() {
    let fixture = SaveFixture::new();
    let saves = fixture.engine();

    let report = saves.delete().wait().unwrap();
    let problem = report.problem.expect("expected a problem");
    assert_eq!(problem.kind(), ErrorKind::Deletion);
    assert!(matches!(
        problem,
        Error::DeletionFailed { ref source } if source.is_not_found()
    ));
}

#[test]
fn test_settings_file_drives_engine() {
    let fixture = SaveFixture::new();
    fs::create_dir_all(&fixture.root).unwrap();
    let config = fixture.root.join("settings.json");
    fs::write(
        &config,
        format!(
            r#"{{"persistence_root": {:?}, "persistence_profile": "carol", "compression_method": "GZip"}}"#,
            fixture.root.to_string_lossy()
        ),
    )
    .unwrap();

    let settings = Settings::from_json_file(&config).unwrap();
    let saves = fixture.engine_with(settings);
    saves.write("x", &1).unwrap();
    assert!(saves.flush().wait().unwrap().is_success());
    assert!(fixture.root.join("carol/save-game.dat").exists());
}

#[test]
fn test_concurrent_flushes_and_loads() {
    let fixture = SaveFixture::new();
    let saves = fixture.engine_with(fixture.settings().with_worker_threads(4));

    for i in 0..10 {
        saves.write(&format!("key{}", i), &i).unwrap();
    }
    assert!(saves.flush().wait().unwrap().is_success());

    let flushes: Vec<_> = (0..8).map(|_| saves.flush()).collect();
    let loads: Vec<_> = (0..8).map(|_| saves.load(false, false)).collect();

    for flush in flushes {
        assert!(flush.wait().unwrap().is_success());
    }
    for load in loads {
        assert!(load.wait().unwrap().is_success());
    }

    for i in 0..10 {
        assert_eq!(saves.read::<i32>(&format!("key{}", i)).unwrap(), i);
    }
}

// Integration tests for backup rotation, backup loads and deletion

mod common;

use common::SaveFixture;
use savelite::{BackupRotation, Error, ErrorKind, OperationKind};
use std::fs;

#[test]
fn test_flush_writes_identical_backups() {
    let fixture = SaveFixture::new();
    let saves = fixture.engine_with(fixture.settings().with_max_backups(3));

    saves.write("coins", &99).unwrap();
    let report = saves.flush().wait().unwrap();
    assert!(report.is_success());
    assert_eq!(report.backup_count, 3);
    assert_eq!(report.backup_index, None);

    let primary = fs::read(fixture.primary_path()).unwrap();
    for index in 0..3 {
        assert_eq!(fs::read(fixture.backup_path(index)).unwrap(), primary);
    }
    assert!(!fixture.backup_path(3).exists());
}

#[test]
fn test_no_backups_when_disabled() {
    let fixture = SaveFixture::new();
    let saves = fixture.engine();

    saves.write("a", &1).unwrap();
    saves.flush().wait().unwrap();
    assert_eq!(fixture.list_files(), vec!["save-game.dat".to_string()]);
    assert_eq!(saves.backup_count().unwrap(), 0);
}

#[test]
fn test_delete_backup_out_of_range() {
    let fixture = SaveFixture::new();
    let saves = fixture.engine_with(fixture.settings().with_max_backups(2));
    saves.write("a", &1).unwrap();
    saves.flush().wait().unwrap();
    let before = fixture.list_files();

    let report = saves.delete_backup(2).wait().unwrap();
    assert_eq!(report.operation, OperationKind::DeleteBackup);
    assert_eq!(report.backup_index, Some(2));
    assert_eq!(report.backup_count, 2);
    let problem = report.problem.expect("expected a problem");
    assert_eq!(problem.kind(), ErrorKind::InvalidIndex);
    assert!(matches!(
        problem,
        Error::InvalidBackupIndex { index: 2, count: 2 }
    ));

    assert_eq!(fixture.list_files(), before);
}

#[test]
fn test_delete_backup_in_range() {
    let fixture = SaveFixture::new();
    let saves = fixture.engine_with(fixture.settings().with_max_backups(2));
    saves.write("a", &1).unwrap();
    saves.flush().wait().unwrap();

    let report = saves.delete_backup(1).wait().unwrap();
    assert!(report.is_success());
    assert_eq!(report.backup_count, 1);
    assert!(!fixture.backup_path(1).exists());
    assert!(fixture.backup_path(0).exists());
}

#[test]
fn test_load_backup_without_backups() {
    let fixture = SaveFixture::new();
    let saves = fixture.engine_with(fixture.settings().with_max_backups(2));

    let report = saves.load_backup(false, false).wait().unwrap();
    assert_eq!(report.operation, OperationKind::LoadBackup);
    assert_eq!(report.backup_count, 0);
    assert_eq!(report.backup_index, Some(0));
    let problem = report.problem.expect("expected a problem");
    assert_eq!(problem.kind(), ErrorKind::BackupOperation);
    assert!(matches!(problem, Error::NoBackups));
}

#[test]
fn test_load_backup_recovers_from_corrupt_primary() {
    let fixture = SaveFixture::new();
    let saves = fixture.engine_with(fixture.settings().with_max_backups(2));
    saves.write("progress", "chapter-4").unwrap();
    saves.flush().wait().unwrap();

    fs::write(fixture.primary_path(), "garbage").unwrap();
    let primary = saves.load(false, false).wait().unwrap();
    assert_eq!(primary.problem.unwrap().kind(), ErrorKind::Deserialization);

    saves.remove("progress").unwrap();
    let report = saves.load_backup(false, false).wait().unwrap();
    assert!(report.is_success());
    // Mirror rotation scans from the highest slot
    assert_eq!(report.backup_index, Some(1));
    assert_eq!(saves.read::<String>("progress").unwrap(), "chapter-4");
}

#[test]
fn test_load_backup_skips_corrupt_slots() {
    let fixture = SaveFixture::new();
    let saves = fixture.engine_with(fixture.settings().with_max_backups(3));
    saves.write("hp", &30).unwrap();
    saves.flush().wait().unwrap();

    fs::write(fixture.backup_path(2), "not json").unwrap();
    fs::write(fixture.backup_path(1), "").unwrap();

    let report = saves.load_backup(false, false).wait().unwrap();
    assert!(report.is_success());
    assert_eq!(report.backup_index, Some(0));
    assert_eq!(report.backup_count, 3);
    assert_eq!(saves.read::<i32>("hp").unwrap(), 30);
}

#[test]
fn test_load_backup_exhausted() {
    let fixture = SaveFixture::new();
    let saves = fixture.engine_with(fixture.settings().with_max_backups(2));
    saves.write("hp", &30).unwrap();
    saves.flush().wait().unwrap();

    fs::write(fixture.backup_path(0), "{").unwrap();
    fs::write(fixture.backup_path(1), "[1, 2").unwrap();

    let report = saves.load_backup(false, false).wait().unwrap();
    assert_eq!(report.backup_count, 2);
    assert_eq!(report.backup_index, Some(0));
    let problem = report.problem.expect("expected a problem");
    assert_eq!(problem.kind(), ErrorKind::BackupOperation);
    match problem {
        Error::BackupsExhausted { attempts, last } => {
            assert_eq!(attempts, 2);
            assert_eq!(last.kind(), ErrorKind::Deserialization);
        }
        other => panic!("unexpected problem: {other}"),
    }
}

#[test]
fn test_shift_rotation_keeps_history() {
    let fixture = SaveFixture::new();
    let saves = fixture.engine_with(
        fixture
            .settings()
            .with_max_backups(2)
            .with_rotation(BackupRotation::Shift),
    );

    for turn in 1..=3 {
        saves.write("turn", &turn).unwrap();
        let report = saves.flush().wait().unwrap();
        assert!(report.is_success());
    }

    assert_eq!(saves.backup_count().unwrap(), 2);
    assert_eq!(
        fs::read_to_string(fixture.backup_path(0)).unwrap(),
        r#"{"turn":3}"#
    );
    assert_eq!(
        fs::read_to_string(fixture.backup_path(1)).unwrap(),
        r#"{"turn":2}"#
    );

    // Shift rotation scans from the newest slot
    let report = saves.load_backup(false, false).wait().unwrap();
    assert_eq!(report.backup_index, Some(0));
    assert_eq!(saves.read::<i32>("turn").unwrap(), 3);
}

#[test]
fn test_purge_removes_everything() {
    let fixture = SaveFixture::new();
    let saves = fixture.engine_with(fixture.settings().with_max_backups(3));
    saves.write("a", &1).unwrap();
    saves.flush().wait().unwrap();

    let reports = saves.purge().wait().unwrap();
    assert_eq!(reports.len(), 4);
    assert_eq!(reports[0].operation, OperationKind::Delete);
    let order: Vec<_> = reports[1..].iter().map(|r| r.backup_index).collect();
    assert_eq!(order, vec![Some(2), Some(1), Some(0)]);
    assert!(reports.iter().all(|r| r.is_success()));

    assert!(fixture.list_files().is_empty());
    assert_eq!(reports[3].backup_count, 0);
}

#[test]
fn test_shrinking_max_backups_drops_stale_slots() {
    let fixture = SaveFixture::new();
    let saves = fixture.engine_with(fixture.settings().with_max_backups(3));
    saves.write("gold", &1).unwrap();
    saves.flush().wait().unwrap();

    saves.set_max_backups(1).unwrap();
    saves.write("gold", &500).unwrap();
    let report = saves.flush().wait().unwrap();
    assert!(report.is_success());
    assert_eq!(report.backup_count, 1);
    assert!(fixture.backup_path(0).exists());
    assert!(!fixture.backup_path(1).exists());
    assert!(!fixture.backup_path(2).exists());

    // Recovery must come from the fresh slot, not an older copy
    fs::write(fixture.primary_path(), "garbage").unwrap();
    let report = saves.load_backup(false, false).wait().unwrap();
    assert!(report.is_success());
    assert_eq!(report.backup_index, Some(0));
    assert_eq!(saves.read::<i32>("gold").unwrap(), 500);

    let report = saves.delete_backup(2).wait().unwrap();
    assert_eq!(report.problem.unwrap().kind(), ErrorKind::InvalidIndex);
}

#[test]
fn test_stale_slots_outside_limit_are_ignored() {
    let fixture = SaveFixture::new();
    let saves = fixture.engine_with(fixture.settings().with_max_backups(1));
    saves.write("gold", &7).unwrap();
    saves.flush().wait().unwrap();

    // A leftover from an earlier, larger limit
    fs::write(fixture.backup_path(4), r#"{"gold":1}"#).unwrap();
    assert_eq!(saves.backup_count().unwrap(), 1);

    let report = saves.load_backup(false, false).wait().unwrap();
    assert_eq!(report.backup_index, Some(0));
    assert_eq!(saves.read::<i32>("gold").unwrap(), 7);

    saves.flush().wait().unwrap();
    assert!(!fixture.backup_path(4).exists());
}

#[test]
fn test_purge_with_gap_in_backups() {
    let fixture = SaveFixture::new();
    let saves = fixture.engine_with(fixture.settings().with_max_backups(3));
    saves.write("a", &1).unwrap();
    saves.flush().wait().unwrap();
    assert!(saves.delete_backup(1).wait().unwrap().is_success());

    let reports = saves.purge().wait().unwrap();
    assert_eq!(reports.len(), 3);
    let order: Vec<_> = reports[1..].iter().map(|r| r.backup_index).collect();
    assert_eq!(order, vec![Some(2), Some(0)]);
    assert!(reports.iter().all(|r| r.is_success()));
    assert!(fixture.list_files().is_empty());
}

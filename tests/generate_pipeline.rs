mod common;

use std::fs;
use std::path::PathBuf;

use tempfile::tempdir;

use common::{call_log, FakeAllocator, FakeFormatter, FakeMounts, NoSymlinkWriter};
use ntfs_fixture::building::populate::StdFileWriter;
use ntfs_fixture::{generate, verify_tree, Collaborators, FixtureError, GeneratorConfig};

fn config_in(dir: &std::path::Path) -> GeneratorConfig {
    let mut cfg = GeneratorConfig::default();
    cfg.image.output = dir.join("test_data").join("ntfs.raw");
    cfg.mount.mount_point = Some(dir.join("mnt"));
    cfg.mount.unmount_retry_delay_ms = 0;
    cfg
}

#[cfg(unix)]
#[test]
fn runs_every_step_in_order_and_populates_the_volume() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempdir()?;
    let cfg = config_in(tmp.path());
    let log = call_log();
    let allocator = FakeAllocator { log: log.clone() };
    let formatter = FakeFormatter { log: log.clone(), fail: false };
    let mounts = FakeMounts { log: log.clone(), ..FakeMounts::default() };

    let summary = generate(
        &cfg,
        &Collaborators {
            allocator: &allocator,
            formatter: &formatter,
            mounts: &mounts,
            writer: &StdFileWriter,
        },
    )?;

    assert_eq!(
        *log.borrow(),
        vec!["allocate", "format ntfs_test", "mount ReadWrite", "unmount"]
    );
    assert_eq!(summary.entries_written, 5);
    assert_eq!(summary.sector_count, 8192);
    assert_eq!(summary.image, tmp.path().join("test_data/ntfs.raw"));
    assert_eq!(fs::metadata(&summary.image)?.len(), 4_194_304);
    assert!(!mounts.mounted.get());

    // the fake mount point doubles as the volume root
    assert!(verify_tree(&tmp.path().join("mnt"))?.is_empty());
    Ok(())
}

#[cfg(unix)]
#[test]
fn reruns_produce_the_same_content() -> Result<(), Box<dyn std::error::Error>> {
    let first = tempdir()?;
    let second = tempdir()?;
    for dir in [first.path(), second.path()] {
        let log = call_log();
        let mounts = FakeMounts { log: log.clone(), ..FakeMounts::default() };
        generate(
            &config_in(dir),
            &Collaborators {
                allocator: &FakeAllocator { log: log.clone() },
                formatter: &FakeFormatter { log: log.clone(), fail: false },
                mounts: &mounts,
                writer: &StdFileWriter,
            },
        )?;
    }
    for rel in ["a_directory/a_file", "a_directory/another_file", "passwords.txt"] {
        assert_eq!(
            fs::read(first.path().join("mnt").join(rel))?,
            fs::read(second.path().join("mnt").join(rel))?
        );
    }
    Ok(())
}

#[test]
fn denied_mount_stops_before_writing_and_leaves_nothing_mounted() {
    let tmp = tempdir().unwrap();
    let mut cfg = config_in(tmp.path());
    cfg.mount.mount_point = None;
    let log = call_log();
    let mounts = FakeMounts {
        log: log.clone(),
        deny_mount: true,
        ..FakeMounts::default()
    };

    let err = generate(
        &cfg,
        &Collaborators {
            allocator: &FakeAllocator { log: log.clone() },
            formatter: &FakeFormatter { log: log.clone(), fail: false },
            mounts: &mounts,
            writer: &StdFileWriter,
        },
    )
    .unwrap_err();

    assert!(matches!(err, FixtureError::Mount { .. }), "{err:?}");
    assert_eq!(err.exit_code(), 1);
    assert_eq!(log.borrow().last().map(String::as_str), Some("mount ReadWrite"));
    assert!(!mounts.mounted.get());
    // the image itself is not cleaned up
    assert!(cfg.image.output.exists());
}

#[test]
fn format_failure_aborts_before_mounting() {
    let tmp = tempdir().unwrap();
    let cfg = config_in(tmp.path());
    let log = call_log();
    let mounts = FakeMounts { log: log.clone(), ..FakeMounts::default() };

    let err = generate(
        &cfg,
        &Collaborators {
            allocator: &FakeAllocator { log: log.clone() },
            formatter: &FakeFormatter { log: log.clone(), fail: true },
            mounts: &mounts,
            writer: &StdFileWriter,
        },
    )
    .unwrap_err();

    assert!(matches!(err, FixtureError::Format { .. }));
    assert_eq!(*log.borrow(), vec!["allocate", "format ntfs_test"]);
    assert!(!tmp.path().join("mnt").exists());
}

#[test]
fn write_failure_still_unmounts() {
    let tmp = tempdir().unwrap();
    let cfg = config_in(tmp.path());
    let log = call_log();
    let mounts = FakeMounts { log: log.clone(), ..FakeMounts::default() };

    let err = generate(
        &cfg,
        &Collaborators {
            allocator: &FakeAllocator { log: log.clone() },
            formatter: &FakeFormatter { log: log.clone(), fail: false },
            mounts: &mounts,
            writer: &NoSymlinkWriter,
        },
    )
    .unwrap_err();

    match &err {
        FixtureError::Write { path, .. } => assert_eq!(path, &PathBuf::from("a_link")),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(log.borrow().last().map(String::as_str), Some("unmount"));
    assert!(!mounts.mounted.get());
    // everything before the link was written
    assert!(tmp.path().join("mnt/passwords.txt").is_file());
}

#[cfg(unix)]
#[test]
fn busy_unmount_is_retried() {
    let tmp = tempdir().unwrap();
    let cfg = config_in(tmp.path());
    let log = call_log();
    let mounts = FakeMounts {
        log: log.clone(),
        busy_unmounts: 2.into(),
        ..FakeMounts::default()
    };

    generate(
        &cfg,
        &Collaborators {
            allocator: &FakeAllocator { log: log.clone() },
            formatter: &FakeFormatter { log: log.clone(), fail: false },
            mounts: &mounts,
            writer: &StdFileWriter,
        },
    )
    .expect("third unmount attempt succeeds");

    let unmounts = log.borrow().iter().filter(|c| *c == "unmount").count();
    assert_eq!(unmounts, 3);
    assert!(!mounts.mounted.get());
}

#[cfg(unix)]
#[test]
fn unmount_that_never_succeeds_is_an_unmount_error() {
    let tmp = tempdir().unwrap();
    let mut cfg = config_in(tmp.path());
    cfg.mount.unmount_attempts = 2;
    let log = call_log();
    let mounts = FakeMounts {
        log: log.clone(),
        busy_unmounts: 10.into(),
        ..FakeMounts::default()
    };

    let err = generate(
        &cfg,
        &Collaborators {
            allocator: &FakeAllocator { log: log.clone() },
            formatter: &FakeFormatter { log: log.clone(), fail: false },
            mounts: &mounts,
            writer: &StdFileWriter,
        },
    )
    .unwrap_err();

    assert!(matches!(err, FixtureError::Unmount { .. }), "{err:?}");
    assert!(mounts.mounted.get());
}

#[test]
fn failed_unmount_while_unwinding_keeps_the_write_error() {
    let tmp = tempdir().unwrap();
    let mut cfg = config_in(tmp.path());
    cfg.mount.unmount_attempts = 2;
    let log = call_log();
    let mounts = FakeMounts {
        log: log.clone(),
        busy_unmounts: 10.into(),
        ..FakeMounts::default()
    };

    let err = generate(
        &cfg,
        &Collaborators {
            allocator: &FakeAllocator { log: log.clone() },
            formatter: &FakeFormatter { log: log.clone(), fail: false },
            mounts: &mounts,
            writer: &NoSymlinkWriter,
        },
    )
    .unwrap_err();

    // the write error wins; the guard still tried to unmount while unwinding
    assert!(matches!(err, FixtureError::Write { .. }));
    let unmounts = log.borrow().iter().filter(|c| *c == "unmount").count();
    assert_eq!(unmounts, 2);
}

#[test]
fn invalid_config_runs_no_tools() {
    let tmp = tempdir().unwrap();
    let mut cfg = config_in(tmp.path());
    cfg.image.sector_size = 3000;
    let log = call_log();
    let mounts = FakeMounts { log: log.clone(), ..FakeMounts::default() };

    let err = generate(
        &cfg,
        &Collaborators {
            allocator: &FakeAllocator { log: log.clone() },
            formatter: &FakeFormatter { log: log.clone(), fail: false },
            mounts: &mounts,
            writer: &StdFileWriter,
        },
    )
    .unwrap_err();
    assert!(matches!(err, FixtureError::Config(_)));
    assert!(log.borrow().is_empty());
}

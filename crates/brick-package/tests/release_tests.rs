mod common;

use brick_package::release::{ChangelogStatus, PublishStatus};
use brick_package::*;
use common::*;
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::fs;

fn adder_with_unstable_mux(sandbox: &Sandbox) -> std::path::PathBuf {
    sandbox.block(&BlockSpec {
        files: &[("mux.vhd", MUX_VHD)],
        ..BlockSpec::new("logic", "mux")
    });
    sandbox.block(&BlockSpec {
        files: &[("adder.vhd", ADDER_VHD)],
        ..BlockSpec::new("arith", "adder")
    })
}

#[test]
fn test_unstable_requirement_fails_dry_run() {
    let sandbox = Sandbox::new();
    let dir = adder_with_unstable_mux(&sandbox);
    let mut ws = sandbox.load();

    let options = ReleaseOptions {
        dry_run: true,
        ..ReleaseOptions::new(NextVersion::Bump(Bump::Minor))
    };
    let report = ws.release(&downloaded("arith", "adder"), &options).unwrap();

    assert!(!report.passed);
    assert_eq!(report.version, Version::new(0, 1, 0));
    assert_eq!(report.requirements.len(), 1);
    assert!(report.requirements[0].is_unstable());
    assert!(report.to_string().ends_with("Dry run: FAILED"));

    // nothing was written
    assert!(sandbox.vcs.tags_of(&dir).is_empty());
    assert!(BlockMetadata::load(&dir).unwrap().requires().is_empty());
}

#[test]
fn test_unstable_requirement_blocks_release() {
    let sandbox = Sandbox::new();
    let dir = adder_with_unstable_mux(&sandbox);
    let mut ws = sandbox.load();

    let err = ws
        .release(
            &downloaded("arith", "adder"),
            &ReleaseOptions::new(NextVersion::Bump(Bump::Minor)),
        )
        .unwrap_err();
    assert!(matches!(err, PackageError::UnstableRequirement(_)));
    assert!(sandbox.vcs.tags_of(&dir).is_empty());
    assert!(sandbox.vcs.log().iter().all(|l| !l.starts_with("commit")));
}

#[test]
fn test_release_with_stable_requirement() {
    let sandbox = Sandbox::new();
    let mux = sandbox.block(&BlockSpec {
        files: &[("mux.vhd", MUX_VHD)],
        ..BlockSpec::new("logic", "mux")
    });
    sandbox.release_as(&mux, "1.0.0");
    let adder = sandbox.block(&BlockSpec {
        files: &[("adder.vhd", ADDER_VHD), ("CHANGELOG.md", "first\n")],
        ..BlockSpec::new("arith", "adder")
    });

    let mut ws = sandbox.load();
    ws.install(&downloaded("logic", "mux")).unwrap();

    let options = ReleaseOptions {
        no_install: true,
        ..ReleaseOptions::new(NextVersion::Exact(Version::new(0, 2, 0)))
    };
    let report = ws.release(&downloaded("arith", "adder"), &options).unwrap();

    assert!(report.passed);
    assert_eq!(report.tag, "v0.2.0-brick");
    assert_eq!(report.message, "Releases version v0.2.0");
    assert_eq!(report.publish, PublishStatus::NotApplicable);
    assert_eq!(
        report.changelog,
        ChangelogStatus::Found(adder.join("CHANGELOG.md"))
    );
    assert_eq!(
        report.requirements.iter().map(|r| r.to_string()).collect::<Vec<_>>(),
        vec!["logic.mux(latest@v1.0.0)"]
    );

    let meta = BlockMetadata::load(&adder).unwrap();
    assert_eq!(meta.version(), Version::new(0, 2, 0));
    assert_eq!(meta.requires().len(), 1);
    assert_eq!(sandbox.vcs.tags_of(&adder), vec!["v0.2.0-brick"]);
    assert_eq!(
        fs::read_to_string(adder.join("CHANGELOG.md")).unwrap(),
        "v0.2.0\n\nfirst\n"
    );
    assert!(sandbox
        .vcs
        .log()
        .contains(&"commit adder Releases version v0.2.0".to_string()));
    assert!(ws.registry.get(&installed("arith", "adder")).is_none());
}

#[test]
fn test_release_installs_new_version() {
    let sandbox = Sandbox::new();
    let dir = sandbox.block(&BlockSpec {
        files: &[("adder.vhd", PLAIN_ADDER_VHD)],
        ..BlockSpec::new("arith", "adder")
    });
    sandbox.release_as(&dir, "1.0.0");
    let mut ws = sandbox.load();

    let options = ReleaseOptions {
        only_meta: true,
        message: Some("Bump".into()),
        ..ReleaseOptions::new(NextVersion::Bump(Bump::Patch))
    };
    let report = ws.release(&downloaded("arith", "adder"), &options).unwrap();
    assert_eq!(report.version, Version::new(1, 0, 1));
    assert!(sandbox.vcs.log().contains(&"add adder Block.toml".to_string()));

    let latest = ws.record(&installed("arith", "adder")).unwrap();
    assert_eq!(latest.version(), Version::new(1, 0, 1));
}

#[rstest]
#[case::same(Version::new(1, 0, 0))]
#[case::lower(Version::new(0, 9, 9))]
fn test_version_must_increase(#[case] requested: Version) {
    let sandbox = Sandbox::new();
    let dir = sandbox.block(&BlockSpec::new("arith", "adder"));
    sandbox.release_as(&dir, "1.0.0");
    let mut ws = sandbox.load();

    let err = ws
        .release(
            &downloaded("arith", "adder"),
            &ReleaseOptions::new(NextVersion::Exact(requested)),
        )
        .unwrap_err();
    match err {
        PackageError::VersionNotIncreasing { highest, .. } => {
            assert_eq!(highest, Version::new(1, 0, 0))
        }
        other => panic!("unexpected: {:?}", other),
    }
}

#[rstest]
#[case::read_only(false, true, true)]
#[case::behind(true, false, true)]
#[case::offline(true, true, false)]
fn test_repository_preconditions(
    #[case] writable: bool,
    #[case] up_to_date: bool,
    #[case] reachable: bool,
) {
    let sandbox = Sandbox::new();
    sandbox.block(&BlockSpec::new("arith", "adder"));
    {
        let mut world = sandbox.vcs.world.borrow_mut();
        world.writable = writable;
        world.up_to_date = up_to_date;
        world.reachable = reachable;
    }
    let mut ws = sandbox.load();

    let err = ws
        .release(
            &downloaded("arith", "adder"),
            &ReleaseOptions::new(NextVersion::Bump(Bump::Major)),
        )
        .unwrap_err();
    let expected = match (writable, up_to_date, reachable) {
        (false, _, _) => matches!(err, PackageError::WritePermission(_)),
        (_, _, false) => matches!(err, PackageError::RemoteUnreachable(_)),
        _ => matches!(err, PackageError::OutOfSync(_)),
    };
    assert!(expected, "unexpected error: {:?}", err);
}

#[test]
fn test_release_publishes_to_vendor() {
    let mut sandbox = Sandbox::new();
    let vendor_root = sandbox.vendor("acme", &[]);
    let dir = sandbox.block(&BlockSpec {
        vendor: "acme",
        files: &[("adder.vhd", PLAIN_ADDER_VHD)],
        ..BlockSpec::new("arith", "adder")
    });
    sandbox
        .vcs
        .world
        .borrow_mut()
        .remote_of
        .insert(dir.clone(), "https://example.com/adder.git".into());
    sandbox.release_as(&dir, "1.0.0");

    let mut ws = sandbox.load();
    let dry = ReleaseOptions {
        dry_run: true,
        ..ReleaseOptions::new(NextVersion::Bump(Bump::Minor))
    };
    let id = ws.find("arith.adder").unwrap();
    let block = BlockRef::new(&id, Level::Downloaded);
    let report = ws.release(&block, &dry).unwrap();
    assert_eq!(report.publish, PublishStatus::Passed);
    assert!(report.passed);
    assert!(!vendor_root.join("arith/adder").exists());

    let real = ReleaseOptions {
        no_install: true,
        ..ReleaseOptions::new(NextVersion::Bump(Bump::Minor))
    };
    ws.release(&block, &real).unwrap();

    let listing = BlockMetadata::load(&vendor_root.join("arith/adder")).unwrap();
    assert_eq!(
        listing.block.versions,
        Some(vec!["1.1.0".to_string(), "1.0.0".to_string()])
    );
    assert!(sandbox
        .vcs
        .log()
        .contains(&"commit acme Publishes acme.arith.adder version v1.1.0".to_string()));
    let available = ws.record(&BlockRef::new(&id, Level::Available)).unwrap();
    assert_eq!(available.version(), Version::new(1, 1, 0));
}

#[test]
fn test_unconfigured_vendor_fails_publish() {
    let sandbox = Sandbox::new();
    let dir = sandbox.block(&BlockSpec {
        vendor: "ghost",
        files: &[("adder.vhd", PLAIN_ADDER_VHD)],
        ..BlockSpec::new("arith", "adder")
    });
    sandbox.release_as(&dir, "1.0.0");

    let mut ws = sandbox.load();
    let dry = ReleaseOptions {
        dry_run: true,
        ..ReleaseOptions::new(NextVersion::Bump(Bump::Minor))
    };
    let id = ws.find("arith.adder").unwrap();
    let report = ws.release(&BlockRef::new(&id, Level::Downloaded), &dry).unwrap();
    assert_eq!(report.publish, PublishStatus::Failed);
    assert!(!report.passed);
    assert!(report.to_string().contains("Publish to vendor: FAILED"));
}

#[test]
fn test_stability_without_requirements() {
    let sandbox = Sandbox::new();
    let ws = sandbox.load();
    assert!(ws.check_stability(&[]));
}

#[test]
fn test_stability_follows_pins() {
    let sandbox = Sandbox::new();
    let mux = sandbox.block(&BlockSpec {
        files: &[("mux.vhd", MUX_VHD)],
        ..BlockSpec::new("logic", "mux")
    });
    sandbox.release_as(&mux, "1.0.0");
    let mut ws = sandbox.load();

    let pinned: Requirement = "logic.mux(v1@v1.0.0)".parse().unwrap();
    assert!(!ws.check_stability(&[pinned.clone()]));

    ws.install(&downloaded("logic", "mux")).unwrap();
    assert!(!ws.check_stability(&[pinned.clone()]));

    ws.install_version(&key("logic", "mux"), Version::new(1, 0, 0)).unwrap();
    assert!(ws.check_stability(&[pinned]));
}

fn cached_mux_requiring(sandbox: &Sandbox, requires: &[&str]) -> Workspace {
    let mux = sandbox.block(&BlockSpec {
        requires,
        files: &[("mux.vhd", MUX_VHD)],
        ..BlockSpec::new("logic", "mux")
    });
    sandbox.release_as(&mux, "1.0.0");
    let mut ws = sandbox.load();
    ws.install(&downloaded("logic", "mux")).unwrap();
    ws
}

#[test]
fn test_stability_follows_transitive_requirements() {
    let sandbox = Sandbox::new();
    let ws = cached_mux_requiring(&sandbox, &["logic.inv(unstable@v0.0.0)"]);

    let direct: Requirement = "logic.mux(latest@v1.0.0)".parse().unwrap();
    assert!(!direct.is_unstable());
    assert!(!ws.check_stability(&[direct]));
}

#[test]
fn test_stability_with_stable_transitive_requirements() {
    let sandbox = Sandbox::new();
    let inv = sandbox.block(&BlockSpec {
        files: &[("inv.vhd", "entity inv is\nend entity;\n")],
        ..BlockSpec::new("logic", "inv")
    });
    sandbox.release_as(&inv, "1.0.0");
    let ws = cached_mux_requiring(&sandbox, &["logic.inv(latest@v1.0.0)"]);
    assert!(ws.record(&installed("logic", "inv")).is_ok());

    let direct: Requirement = "logic.mux(latest@v1.0.0)".parse().unwrap();
    assert!(ws.check_stability(&[direct]));
}

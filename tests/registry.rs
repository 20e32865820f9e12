mod common;

use std::fs;

use common::{make_bundle, CINEMATIC_CONFIG};
use tempfile::tempdir;
use wav2midi_core::ModelRegistry;

#[test]
fn missing_root_yields_no_bundles() {
    let tmp = tempdir().unwrap();
    let registry = ModelRegistry::discover(tmp.path().join("nowhere"));
    assert!(registry.is_empty());
}

#[test]
fn bundles_are_sorted_and_parsed() {
    let tmp = tempdir().unwrap();
    make_bundle(tmp.path(), "zeta", CINEMATIC_CONFIG);
    make_bundle(
        tmp.path(),
        "alpha",
        "model_type: bandit_v1\nmodel:\n  stems: [speech, music, sfx]\n",
    );
    // Loose files next to bundles are ignored.
    fs::write(tmp.path().join("README.txt"), b"x").unwrap();

    let registry = ModelRegistry::discover(tmp.path());
    let names: Vec<&str> = registry.bundles().iter().map(|b| b.name.as_str()).collect();
    assert_eq!(names, vec!["alpha", "zeta"]);

    let alpha = registry.find("alpha").unwrap();
    assert_eq!(alpha.stems, vec!["speech", "music", "sfx"]);
    assert_eq!(alpha.model_type, "bandit_v1");

    let zeta = registry.find("zeta").unwrap();
    assert_eq!(zeta.stems, vec!["speech", "music", "effects"]);
    assert_eq!(zeta.model_type, "bandit_v2");
    assert_eq!(zeta.dir, tmp.path().join("zeta"));
    assert!(registry.find("gamma").is_none());
}

#[test]
fn bundle_needs_config_and_checkpoint() {
    let tmp = tempdir().unwrap();
    let no_ckpt = tmp.path().join("no_ckpt");
    fs::create_dir_all(&no_ckpt).unwrap();
    fs::write(no_ckpt.join("config.yaml"), CINEMATIC_CONFIG).unwrap();

    let no_cfg = tmp.path().join("no_cfg");
    fs::create_dir_all(&no_cfg).unwrap();
    fs::write(no_cfg.join("model.ckpt"), b"w").unwrap();

    let chpt = tmp.path().join("chpt");
    fs::create_dir_all(&chpt).unwrap();
    fs::write(chpt.join("config.yaml"), CINEMATIC_CONFIG).unwrap();
    fs::write(chpt.join("weights.chpt"), b"w").unwrap();

    let registry = ModelRegistry::discover(tmp.path());
    let names: Vec<&str> = registry.bundles().iter().map(|b| b.name.as_str()).collect();
    assert_eq!(names, vec!["chpt"]);
    assert_eq!(
        registry.bundles()[0].checkpoint_path,
        chpt.join("weights.chpt")
    );
}

#[test]
fn first_config_and_checkpoint_win() {
    let tmp = tempdir().unwrap();
    let dir = make_bundle(tmp.path(), "multi", CINEMATIC_CONFIG);
    fs::write(dir.join("a_config.yaml"), "model:\n  stems: [one]\n").unwrap();
    fs::write(dir.join("a_model.ckpt"), b"w").unwrap();

    let registry = ModelRegistry::discover(tmp.path());
    let bundle = registry.find("multi").unwrap();
    assert_eq!(bundle.config_path, dir.join("a_config.yaml"));
    assert_eq!(bundle.checkpoint_path, dir.join("a_model.ckpt"));
    assert_eq!(bundle.stems, vec!["one"]);
}

#[test]
fn unreadable_configs_still_list_the_bundle() {
    let tmp = tempdir().unwrap();
    make_bundle(tmp.path(), "broken", "training: [speech, music\n");
    make_bundle(tmp.path(), "bare", "name: something\n");

    let registry = ModelRegistry::discover(tmp.path());

    let broken = registry.find("broken").unwrap();
    assert!(broken.stems.is_empty());
    assert_eq!(broken.model_type, "bandit");

    let bare = registry.find("bare").unwrap();
    assert!(bare.stems.is_empty());
    assert_eq!(bare.model_type, "bandit");
}

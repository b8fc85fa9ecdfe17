use super::*;

#[test]
fn defaults_are_valid() {
    let cfg = ForgeConfig::default();
    cfg.validate().unwrap();
    assert_eq!(cfg.extract.batch_size, 4);
    assert_eq!(cfg.cache.capacity, 50);
    assert_eq!(cfg.cache.fingerprint, FingerprintMode::Content);
}

#[test]
fn partial_json_keeps_defaults_for_missing_keys() {
    let cfg: ForgeConfig =
        serde_json::from_str(r#"{ "gif": { "width": 320 }, "debounce": { "window_ms": 50 } }"#)
            .unwrap();
    assert_eq!(cfg.gif.width, 320);
    assert_eq!(cfg.gif.fps, GifOpts::default().fps);
    assert_eq!(cfg.debounce.window(), Duration::from_millis(50));
    assert_eq!(cfg.extract, ExtractOpts::default());
}

#[test]
fn max_wait_never_shorter_than_window() {
    let d = DebounceOpts {
        window_ms: 500,
        max_wait_ms: 100,
    };
    assert_eq!(d.max_wait(), Duration::from_millis(500));
}

#[test]
fn validate_rejects_degenerate_values() {
    let mut cfg = ForgeConfig::default();
    cfg.extract.fps = 0.0;
    assert!(cfg.validate().is_err());

    let mut cfg = ForgeConfig::default();
    cfg.extract.batch_size = 0;
    assert!(cfg.validate().is_err());

    let mut cfg = ForgeConfig::default();
    cfg.annotation.ghost_opacity = 1.5;
    assert!(cfg.validate().is_err());

    let mut cfg = ForgeConfig::default();
    cfg.extract.target_width = Some(0);
    assert!(cfg.validate().is_err());
}

#[test]
fn json_file_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gifforge.json");
    let mut cfg = ForgeConfig::default();
    cfg.extract.fps = 12.5;
    cfg.annotation.default_color = Rgba8::rgb(0, 255, 0);
    std::fs::write(&path, serde_json::to_vec_pretty(&cfg).unwrap()).unwrap();

    let loaded = ForgeConfig::from_json_file(&path).unwrap();
    assert_eq!(loaded.extract.fps, 12.5);
    assert_eq!(loaded.annotation.default_color, Rgba8::rgb(0, 255, 0));
}

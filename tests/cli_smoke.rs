use std::path::PathBuf;

fn exe() -> PathBuf {
    std::env::var_os("CARGO_BIN_EXE_roomlight")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            let mut p = PathBuf::from("target").join("debug");
            p.push(if cfg!(windows) {
                "roomlight.exe"
            } else {
                "roomlight"
            });
            p
        })
}

fn scratch(name: &str) -> PathBuf {
    let dir = PathBuf::from("target").join("cli_smoke").join(name);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn cli_frame_writes_png() {
    let dir = scratch("frame");
    let out_path = dir.join("room.png");
    let _ = std::fs::remove_file(&out_path);

    let out_arg = out_path.to_string_lossy().to_string();
    let status = std::process::Command::new(exe())
        .args(["frame", "--toggle-at", "0", "--system", "light", "--at", "900", "--out"])
        .arg(out_arg.as_str())
        .status()
        .unwrap();

    assert!(status.success());
    let img = image::open(&out_path).unwrap();
    assert_eq!((img.width(), img.height()), (240, 240));
}

#[test]
fn cli_simulate_prints_timeline() {
    let output = std::process::Command::new(exe())
        .args(["simulate", "--toggle-at", "0,1000", "--system", "dark", "--until", "4000"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["final"]["theme"], "light");
    assert_eq!(report["final"]["state"], "idle");
    assert_eq!(report["excursions"], 1);
    let kinds: Vec<&str> = report["timeline"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|e| e["kind"].as_str())
        .collect();
    assert!(kinds.contains(&"commit"));
    assert!(kinds.contains(&"toggle_ignored"));
}

#[test]
fn cli_theme_set_show_reset() {
    let dir = scratch("theme");
    let prefs = dir.join("prefs.json");
    let _ = std::fs::remove_file(&prefs);
    let config = dir.join("config.json");
    std::fs::write(
        &config,
        serde_json::json!({ "preference_path": prefs }).to_string(),
    )
    .unwrap();
    let config_arg = config.to_string_lossy().to_string();

    let run = |args: &[&str]| {
        let out = std::process::Command::new(exe())
            .args(["--config", config_arg.as_str()])
            .args(args)
            .output()
            .unwrap();
        assert!(out.status.success(), "{args:?}");
        String::from_utf8(out.stdout).unwrap()
    };

    assert_eq!(run(&["theme", "set", "dark"]).trim(), "dark");
    let shown: serde_json::Value =
        serde_json::from_str(&run(&["theme", "show", "--system", "light"])).unwrap();
    assert_eq!(shown["stored"], "dark");
    assert_eq!(shown["resolved"], "dark");

    run(&["theme", "reset"]);
    let shown: serde_json::Value =
        serde_json::from_str(&run(&["theme", "show", "--system", "light"])).unwrap();
    assert!(shown["stored"].is_null());
    assert_eq!(shown["resolved"], "light");
}

use std::fs;
use std::process::Command;

use anyhow::{Context, Result};
use esm_formats::{DialInfo, Dialogue, DialogueType, PluginWriter, RefId};
use tempfile::tempdir;

#[test]
fn skeleton_action_prints_selected_model() -> Result<()> {
    let output = Command::new(env!("CARGO_BIN_EXE_esm_engine"))
        .args(["--skeleton", "--first-person", "--beast", "--suffix", "_x"])
        .output()
        .context("running esm_engine --skeleton")?;
    assert!(output.status.success(), "esm_engine exited with {:?}", output.status);

    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<_> = stdout.lines().collect();
    assert_eq!(
        lines,
        vec!["meshes/base_animkna.1st.nif", "meshes/base_animkna.1st_x.nif"]
    );
    Ok(())
}

#[test]
fn skeleton_action_honours_settings_file() -> Result<()> {
    let dir = tempdir()?;
    let settings = dir.path().join("settings.json");
    fs::write(&settings, r#"{ "models": { "wolfskin": "meshes/custom/wolf.nif" } }"#)?;

    let output = Command::new(env!("CARGO_BIN_EXE_esm_engine"))
        .arg("--skeleton")
        .arg("--werewolf")
        .arg("--settings")
        .arg(&settings)
        .output()
        .context("running esm_engine --skeleton with settings")?;
    assert!(output.status.success(), "esm_engine exited with {:?}", output.status);
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        "meshes/custom/wolf.nif"
    );
    Ok(())
}

#[test]
fn script_action_prints_through_logger() -> Result<()> {
    let dir = tempdir()?;
    let plugin = dir.path().join("voice.esp");
    let mut voice = Dialogue::new("Hello", DialogueType::Voice);
    voice.infos.push(DialInfo {
        id: RefId::string("v1"),
        response: "Greetings.".to_string(),
        ..DialInfo::default()
    });
    let mut writer = PluginWriter::default();
    writer.push(voice);
    writer.write_to(&plugin)?;

    let script = dir.path().join("report.lua");
    fs::write(
        &script,
        "print('voices=' .. #core.dialogue.voice.records)\n\
         print(core.dialogue.voice.records[1])\n",
    )?;

    let output = Command::new(env!("CARGO_BIN_EXE_esm_engine"))
        .arg("--plugin")
        .arg(&plugin)
        .arg("--script")
        .arg(&script)
        .env("RUST_LOG", "info")
        .output()
        .context("running esm_engine --script")?;

    let mut transcript = String::from_utf8_lossy(&output.stdout).to_string();
    transcript.push_str(&String::from_utf8_lossy(&output.stderr));
    assert!(output.status.success(), "esm_engine failed: {transcript}");
    assert!(transcript.contains("voices=1"), "missing count: {transcript}");
    assert!(
        transcript.contains("ESM3_Dialogue[\"Hello\"]"),
        "missing record name: {transcript}"
    );
    Ok(())
}

#[test]
fn invalid_flag_combination_fails() -> Result<()> {
    let output = Command::new(env!("CARGO_BIN_EXE_esm_engine"))
        .arg("--werewolf")
        .output()
        .context("running esm_engine with a stray trait flag")?;
    assert!(!output.status.success());
    Ok(())
}

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use anyhow::{Context, Result};
use esm_formats::{
    DialInfo, Dialogue, DialogueType, PluginFile, PluginHeader, PluginWriter, RefId,
};
use tempfile::tempdir;

fn write_plugin(path: &Path) -> Result<Vec<Dialogue>> {
    let mut topic = Dialogue::new("Background", DialogueType::Topic);
    topic.infos.push(DialInfo {
        id: RefId::string("b1"),
        actor: RefId::string("fargoth"),
        response: "I don\u{2019}t know\u{2026}".to_string(),
        ..DialInfo::default()
    });
    let mut greeting = Dialogue::new("Greeting 0", DialogueType::Greeting);
    greeting.infos.push(DialInfo {
        id: RefId::string("g1"),
        response: "Hello, outlander.".to_string(),
        ..DialInfo::default()
    });

    let mut writer = PluginWriter::new(PluginHeader {
        author: "dial_dump tests".to_string(),
        masters: vec!["Morrowind.esm".to_string()],
        ..PluginHeader::default()
    });
    writer.push(topic.clone()).push(greeting.clone());
    writer.write_to(path)?;
    Ok(vec![topic, greeting])
}

fn run(args: &[&Path]) -> Result<Output> {
    Command::new(env!("CARGO_BIN_EXE_dial_dump"))
        .args(args)
        .output()
        .context("running dial_dump")
}

fn transcript(output: &Output) -> String {
    let mut text = String::from_utf8_lossy(&output.stdout).to_string();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    text
}

#[test]
fn json_dump_lists_every_dialogue() -> Result<()> {
    let dir = tempdir()?;
    let plugin = dir.path().join("Dialogue.esp");
    write_plugin(&plugin)?;
    let json = dir.path().join("dump.json");

    let output = run(&[
        Path::new("--plugin"),
        plugin.as_path(),
        Path::new("--json"),
        json.as_path(),
    ])?;
    let text = transcript(&output);
    assert!(output.status.success(), "dial_dump failed: {text}");
    assert!(text.contains("Saved dialogue dump to"), "{text}");

    let raw = fs::read_to_string(&json).context("reading JSON dump")?;
    let dump: serde_json::Value = serde_json::from_str(&raw)?;
    let dialogues = dump[0]["dialogues"]
        .as_array()
        .context("dump has no dialogues array")?;
    assert_eq!(dialogues.len(), 2);
    assert_eq!(dialogues[0]["string_id"], "Background");
    assert_eq!(dialogues[0]["infos"][0]["response"], "I don\u{2019}t know\u{2026}");
    assert_eq!(dump[0]["header"]["masters"][0], "Morrowind.esm");
    Ok(())
}

#[test]
fn rewrite_reproduces_the_dialogues() -> Result<()> {
    let dir = tempdir()?;
    let plugin = dir.path().join("Dialogue.esp");
    let written = write_plugin(&plugin)?;
    let copy = dir.path().join("Copy.esp");

    let output = run(&[
        Path::new("--plugin"),
        plugin.as_path(),
        Path::new("--rewrite"),
        copy.as_path(),
    ])?;
    let text = transcript(&output);
    assert!(output.status.success(), "dial_dump failed: {text}");
    assert!(text.contains("Re-encoded 2 dialogues to"), "{text}");

    let reread = PluginFile::open(&copy)?;
    assert_eq!(reread.dialogues, written);
    assert_eq!(reread.header.masters, vec!["Morrowind.esm".to_string()]);
    let bytes = fs::read(&copy)?;
    assert!(
        bytes.windows(4).any(|window| window == b"n\x92t "),
        "text should be stored as Windows-1252"
    );
    Ok(())
}

#[test]
fn root_scan_finds_nested_plugins_only() -> Result<()> {
    let dir = tempdir()?;
    let nested = dir.path().join("Data Files").join("mods");
    fs::create_dir_all(&nested)?;
    write_plugin(&dir.path().join("Data Files").join("Base.ESM"))?;
    write_plugin(&nested.join("Patch.omwaddon"))?;
    fs::write(nested.join("readme.txt"), "not a plugin")?;

    let output = run(&[Path::new("--root"), dir.path()])?;
    let text = transcript(&output);
    assert!(output.status.success(), "dial_dump failed: {text}");
    let summaries: Vec<_> = text
        .lines()
        .filter(|line| line.contains("dialogues,"))
        .collect();
    assert_eq!(summaries.len(), 2, "{text}");
    assert!(summaries[0].starts_with("Base.ESM (v1.30, 1 masters): 2 dialogues, 2 infos"));
    assert!(summaries[1].starts_with("Patch.omwaddon"));
    assert!(!text.contains("readme"), "{text}");
    Ok(())
}

#[test]
fn rewrite_refuses_several_plugins() -> Result<()> {
    let dir = tempdir()?;
    let first = dir.path().join("A.esp");
    let second = dir.path().join("B.esp");
    write_plugin(&first)?;
    write_plugin(&second)?;
    let out = dir.path().join("out.esp");

    let output = run(&[
        Path::new("--plugin"),
        first.as_path(),
        Path::new("--plugin"),
        second.as_path(),
        Path::new("--rewrite"),
        out.as_path(),
    ])?;
    assert!(!output.status.success());
    assert!(transcript(&output).contains("exactly one plugin"));
    assert!(!out.exists());
    Ok(())
}

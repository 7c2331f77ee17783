use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use esm_formats::{DialogueType, PluginFile, PluginWriter};
use walkdir::WalkDir;

const PLUGIN_EXTENSIONS: [&str; 3] = ["esm", "esp", "omwaddon"];

#[derive(Parser, Debug)]
#[command(about = "Summarise the dialogue records of ESM3 content files", version)]
struct Args {
    /// Plugin to read (may be passed multiple times)
    #[arg(long = "plugin", value_name = "PATH", conflicts_with = "root")]
    plugins: Vec<PathBuf>,

    /// Directory scanned recursively for .esm/.esp/.omwaddon files when --plugin is not used
    #[arg(long = "root", value_name = "DIR", conflicts_with = "plugins")]
    root: Option<PathBuf>,

    /// Write every decoded dialogue as JSON to this path
    #[arg(long, value_name = "PATH")]
    json: Option<PathBuf>,

    /// Re-encode the dialogue records of a single plugin into this path
    #[arg(long, value_name = "PATH")]
    rewrite: Option<PathBuf>,

    /// List every dialogue id instead of per-type counts
    #[arg(long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let paths = resolve_plugin_paths(&args);
    if paths.is_empty() {
        bail!("no plugins to read");
    }
    if args.rewrite.is_some() && paths.len() != 1 {
        bail!("--rewrite expects exactly one plugin, got {}", paths.len());
    }

    let mut plugins = Vec::with_capacity(paths.len());
    for path in &paths {
        let plugin = PluginFile::open(path)?;
        describe_plugin(&plugin, args.verbose);
        plugins.push(plugin);
    }

    if let Some(path) = args.json.as_ref() {
        let json = serde_json::to_string_pretty(&plugins)
            .context("serializing dialogue dump to JSON")?;
        fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        println!("Saved dialogue dump to {}", path.display());
    }

    if let (Some(path), Some(plugin)) = (args.rewrite.as_ref(), plugins.first()) {
        let mut writer = PluginWriter::new(plugin.header.clone());
        for dialogue in &plugin.dialogues {
            writer.push(dialogue.clone());
        }
        writer.write_to(path)?;
        println!("Re-encoded {} dialogues to {}", plugin.dialogues.len(), path.display());
    }

    Ok(())
}

fn resolve_plugin_paths(args: &Args) -> Vec<PathBuf> {
    if !args.plugins.is_empty() {
        return args.plugins.clone();
    }
    let Some(root) = args.root.as_ref() else {
        return Vec::new();
    };
    let mut paths: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|res| res.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| {
                    PLUGIN_EXTENSIONS
                        .iter()
                        .any(|known| ext.eq_ignore_ascii_case(known))
                })
                .unwrap_or(false)
        })
        .map(|entry| entry.into_path())
        .collect();
    paths.sort();
    paths
}

fn describe_plugin(plugin: &PluginFile, verbose: bool) {
    println!(
        "{} (v{:.2}, {} masters): {} dialogues, {} infos, {} other records",
        plugin.name(),
        plugin.header.version,
        plugin.header.masters.len(),
        plugin.dialogues.len(),
        plugin.info_count(),
        plugin.skipped_records
    );

    if verbose {
        for dialogue in &plugin.dialogues {
            let marker = if dialogue.deleted { " (deleted)" } else { "" };
            println!(
                "  {kind:<10} {id:<40} {count:>5} infos{marker}",
                kind = dialogue.kind.label(),
                id = dialogue.id.to_debug_string(),
                count = dialogue.infos.len(),
            );
        }
        return;
    }

    let mut counts: BTreeMap<i32, (DialogueType, usize)> = BTreeMap::new();
    for dialogue in &plugin.dialogues {
        counts
            .entry(dialogue.kind.as_raw())
            .or_insert((dialogue.kind, 0))
            .1 += 1;
    }
    for (kind, count) in counts.values() {
        println!("  {:<10} {count:>6}", kind.label());
    }
}

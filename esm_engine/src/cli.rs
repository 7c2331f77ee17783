use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    about = "Loads ESM3 dialogue records and exposes them to Lua scripts",
    version
)]
pub struct Args {
    /// Content file to load (repeat in load order)
    #[arg(long = "plugin", value_name = "PATH")]
    pub plugins: Vec<PathBuf>,

    /// Data directory indexed for resource lookups (may repeat)
    #[arg(long = "data", value_name = "DIR")]
    pub data_dirs: Vec<PathBuf>,

    /// JSON settings file overriding the default model paths
    #[arg(long)]
    pub settings: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long)]
    pub verbose: bool,

    /// Lua script to run with `core.dialogue` installed
    #[arg(long, value_name = "PATH", conflicts_with = "skeleton")]
    pub script: Option<PathBuf>,

    /// Print the skeleton model chosen for the given actor traits
    #[arg(long)]
    pub skeleton: bool,

    /// Select the first-person skeleton (with --skeleton)
    #[arg(long)]
    pub first_person: bool,

    /// Actor is female (with --skeleton)
    #[arg(long)]
    pub female: bool,

    /// Actor belongs to a beast race (with --skeleton)
    #[arg(long)]
    pub beast: bool,

    /// Actor is in werewolf form (with --skeleton)
    #[arg(long)]
    pub werewolf: bool,

    /// Also print the skeleton path with this suffix inserted before its extension
    #[arg(long, value_name = "SUFFIX")]
    pub suffix: Option<String>,
}

#[derive(Debug)]
pub enum Command {
    RunScript(ScriptArgs),
    Skeleton(SkeletonArgs),
    Summary(SummaryArgs),
}

#[derive(Debug)]
pub struct ScriptArgs {
    pub plugins: Vec<PathBuf>,
    pub data_dirs: Vec<PathBuf>,
    pub script: PathBuf,
}

#[derive(Debug)]
pub struct SkeletonArgs {
    pub settings: Option<PathBuf>,
    pub first_person: bool,
    pub female: bool,
    pub beast: bool,
    pub werewolf: bool,
    pub suffix: Option<String>,
}

#[derive(Debug)]
pub struct SummaryArgs {
    pub plugins: Vec<PathBuf>,
}

pub fn parse() -> Result<(Command, bool)> {
    let args = Args::parse();
    let verbose = args.verbose;
    Ok((args.into_command()?, verbose))
}

impl Args {
    pub fn into_command(self) -> Result<Command> {
        let uses_traits = self.first_person || self.female || self.beast || self.werewolf;
        if !self.skeleton && (uses_traits || self.suffix.is_some()) {
            bail!("--first-person/--female/--beast/--werewolf/--suffix require --skeleton");
        }

        if self.skeleton {
            if !self.plugins.is_empty() {
                bail!("--skeleton does not read content files; drop --plugin");
            }
            if !self.data_dirs.is_empty() {
                bail!("--skeleton does not read data directories; drop --data");
            }
            return Ok(Command::Skeleton(SkeletonArgs {
                settings: self.settings,
                first_person: self.first_person,
                female: self.female,
                beast: self.beast,
                werewolf: self.werewolf,
                suffix: self.suffix,
            }));
        }

        if let Some(script) = self.script {
            if self.settings.is_some() {
                bail!("--settings only applies to --skeleton");
            }
            return Ok(Command::RunScript(ScriptArgs {
                plugins: self.plugins,
                data_dirs: self.data_dirs,
                script,
            }));
        }

        if self.plugins.is_empty() {
            bail!("nothing to do: pass --plugin, --script or --skeleton");
        }
        if !self.data_dirs.is_empty() || self.settings.is_some() {
            bail!("the record summary only reads --plugin; --data and --settings need an action");
        }
        Ok(Command::Summary(SummaryArgs {
            plugins: self.plugins,
        }))
    }
}

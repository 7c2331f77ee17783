use std::rc::Rc;

use anyhow::{Context, Result};
use esm_engine::actor_util::{
    add_suffix_before_extension, get_actor_skeleton, is_default_actor_skeleton,
};
use esm_engine::vfs::{DirectoryVfs, Vfs};
use esm_engine::{DialogueStore, LuaContext, LuaHost, Settings};
use esm_formats::DialogueType;

mod cli;
use cli::{Command, ScriptArgs, SkeletonArgs, SummaryArgs};

fn main() -> Result<()> {
    let (command, verbose) = cli::parse()?;
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match command {
        Command::RunScript(args) => run_script(args),
        Command::Skeleton(args) => print_skeleton(args),
        Command::Summary(args) => print_summary(args),
    }
}

fn run_script(args: ScriptArgs) -> Result<()> {
    let store = DialogueStore::load(&args.plugins)?;
    let vfs: Option<Rc<dyn Vfs>> = if args.data_dirs.is_empty() {
        None
    } else {
        let vfs = DirectoryVfs::from_roots(&args.data_dirs).context("indexing data directories")?;
        log::info!("indexed {} resource files", vfs.len());
        Some(Rc::new(vfs))
    };
    let host = LuaHost::new(LuaContext::new(Rc::new(store), vfs))?;
    host.run_file(&args.script)
}

fn print_skeleton(args: SkeletonArgs) -> Result<()> {
    let settings = Settings::from_json_file(args.settings.as_deref())?;
    let skeleton = get_actor_skeleton(
        &settings.models,
        args.first_person,
        args.female,
        args.beast,
        args.werewolf,
    );
    println!("{skeleton}");
    if let Some(suffix) = args.suffix.as_deref() {
        println!("{}", add_suffix_before_extension(skeleton, suffix));
    }
    log::debug!(
        "{skeleton} is {}a default skeleton",
        if is_default_actor_skeleton(&settings.models, skeleton) {
            ""
        } else {
            "not "
        }
    );
    Ok(())
}

fn print_summary(args: SummaryArgs) -> Result<()> {
    let store = DialogueStore::load(&args.plugins)?;
    println!("{} dialogue records after merging", store.len());
    let counts = store.counts_by_type();
    for kind in DialogueType::ALL {
        let count = counts.get(&kind.as_raw()).copied().unwrap_or(0);
        println!("  {:<10} {count:>6}", kind.label());
    }
    if let Some(unknown) = counts.get(&DialogueType::Unknown.as_raw()) {
        println!("  {:<10} {unknown:>6}", DialogueType::Unknown.label());
    }
    Ok(())
}

//! Firmware module materializer (fwmod)

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use fwmod::{Config, Manifest, Materializer, ModuleDescriptor, SystemGit};
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fwmod")]
#[command(about = "Fetch and update firmware libs and modules", long_about = None)]
#[command(version)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Clone or update every module declared in a manifest
    Sync(CommonArgs),
    /// Print the local directory of every declared module
    Path(CommonArgs),
    /// Report whether each module's local copy is clean
    Status(CommonArgs),
}

#[derive(Args)]
struct CommonArgs {
    /// App manifest (YAML, or JSON with a .json extension)
    manifest: PathBuf,

    /// Config file (defaults to ~/.fwmod/config.toml if present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for cloned libs
    #[arg(long)]
    libs_dir: Option<PathBuf>,

    /// Version for modules that do not request one
    #[arg(long)]
    default_version: Option<String>,

    /// Shallow clone depth (0 for full clones)
    #[arg(long)]
    depth: Option<u32>,

    /// Seconds between pulls of the same branch
    #[arg(long)]
    pull_interval: Option<u64>,

    /// Never wipe and reclone a module that fails to update
    #[arg(long)]
    no_retry: bool,
}

impl CommonArgs {
    fn config(&self) -> anyhow::Result<Config> {
        let mut config = Config::load(self.config.as_deref()).context("Failed to load config")?;
        if let Some(dir) = &self.libs_dir {
            config.libs_dir = dir.clone();
        }
        if let Some(version) = &self.default_version {
            config.default_version = version.clone();
        }
        if let Some(depth) = self.depth {
            config.clone_depth = depth;
        }
        if let Some(secs) = self.pull_interval {
            config.pull_interval_secs = secs;
        }
        if self.no_retry {
            config.destructive_retry = false;
        }
        Ok(config)
    }

    fn load(&self) -> anyhow::Result<(Manifest, Materializer<SystemGit>)> {
        let config = self.config()?;
        let manifest = Manifest::from_file(&self.manifest)
            .with_context(|| format!("Failed to load {}", self.manifest.display()))?;
        let materializer = Materializer::new(SystemGit::new(), &config.libs_dir)
            .with_default_version(&config.default_version)
            .with_options(config.sync_options());
        Ok((manifest, materializer))
    }
}

/// Module name, or its location when no name can be derived
fn display_name(d: &ModuleDescriptor) -> String {
    d.name().unwrap_or_else(|_| d.location.clone())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Sync(args) => {
            let (manifest, mut materializer) = args.load()?;
            let mut failed = 0;

            // Modules are independent: one failure does not stop the others.
            for (role, d) in manifest.dependencies() {
                match materializer.prepare_local_dir(d) {
                    Ok(dir) => println!("{}\t{}", display_name(d), dir.display()),
                    Err(e) => {
                        error!("{} {:?}: {}", role, d.location, e);
                        failed += 1;
                    }
                }
            }

            if failed > 0 {
                bail!("{} module(s) failed to sync", failed);
            }
        }
        Commands::Path(args) => {
            let (manifest, materializer) = args.load()?;
            for (_, d) in manifest.dependencies() {
                let dir = materializer
                    .local_dir(d)
                    .with_context(|| format!("Cannot resolve {:?}", d.location))?;
                println!("{}\t{}", display_name(d), dir.display());
            }
        }
        Commands::Status(args) => {
            let (manifest, materializer) = args.load()?;
            for (_, d) in manifest.dependencies() {
                let clean = materializer
                    .is_clean(d)
                    .with_context(|| format!("Cannot check {:?}", d.location))?;
                println!("{}\t{}", display_name(d), if clean { "clean" } else { "dirty" });
            }
        }
    }

    Ok(())
}

//! sod CLI - digest-tracking revision control

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use sod::ops::{self, StatusReport};
use sod::{format, DeltaStatus, Repo};

#[derive(Parser)]
#[command(name = "sod")]
#[command(about = "digest-tracking revision control for large, opaque files")]
#[command(version)]
struct Cli {
    /// repository path
    #[arg(short, long, default_value = ".")]
    repo: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// initialize a new repository
    Init {
        /// path to create repository at
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// show staged and unstaged changes
    Status {
        /// force digest recomputation instead of trusting the xattr cache
        #[arg(long)]
        rehash: bool,

        /// list ignored paths instead of staged/unstaged changes
        #[arg(long)]
        ignored: bool,
    },

    /// stage one or more paths
    Add {
        /// paths to stage
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// unstage a path, restoring it to HEAD's tree
    Reset {
        /// path to unstage
        path: PathBuf,
    },

    /// commit the staged index
    Commit {
        /// commit message
        #[arg(short, long)]
        message: String,

        /// skip firing the snapshot hook
        #[arg(long)]
        no_snapshot: bool,
    },

    /// show commit history
    Log {
        /// revision to start from
        #[arg(default_value = "HEAD")]
        revision: String,
    },

    /// show changes between revisions, or the index and a revision
    Diff {
        /// old revision (defaults to HEAD when one revision is given)
        old: Option<String>,

        /// new revision (if absent, diffs the staged index against `old`)
        new: Option<String>,

        /// emit the raw diff format instead of the status/log text format
        #[arg(long)]
        raw: bool,

        /// null-terminate raw diff fields instead of tab/newline
        #[arg(long)]
        null_terminated: bool,
    },

    /// manage auxiliary data stores
    Aux {
        #[command(subcommand)]
        command: AuxCommand,
    },

    /// recover a file's real content from an auxiliary store
    Restore {
        /// path to restore
        path: PathBuf,

        /// revision to restore from (defaults to HEAD)
        #[arg(long)]
        revision: Option<String>,

        /// restrict the search to a single auxiliary store
        #[arg(long)]
        store: Option<String>,
    },

    /// get, set, or list configuration values
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand)]
enum AuxCommand {
    /// list declared auxiliary stores
    List,
    /// declare a new auxiliary store
    Add {
        name: String,
        store_type: String,
        url: String,
    },
    /// remove a declared auxiliary store
    Remove { name: String },
    /// refresh snapshot refs for one or more stores, or all if none given
    Update { names: Vec<String> },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// print a configuration value
    Get { key: String },
    /// set a configuration value
    Set { key: String, value: String },
    /// list every configuration key/value pair
    List,
}

fn main() -> ExitCode {
    #[cfg(feature = "cli")]
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("error: {e}");
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn run(cli: Cli) -> sod::Result<()> {
    match cli.command {
        Commands::Init { path } => {
            Repo::init(&path)?;
            println!("initialized sod repository at {}", path.display());
        }

        Commands::Status { rehash, ignored } => {
            let repo = Repo::open(&cli.repo)?;

            if ignored {
                for path in ops::status_ignored(&repo) {
                    print_ignored_line(&path.display().to_string());
                }
            } else {
                let index = ops::load_index(&repo)?;
                let StatusReport { staged, unstaged } = ops::status(&repo, &index, rehash)?;

                for delta in &staged {
                    print!("{}", format::format_status_line(&repo, delta, true)?);
                }
                for delta in &unstaged {
                    print!("{}", format::format_status_line(&repo, delta, true)?);
                }
            }
        }

        Commands::Add { paths } => {
            let repo = Repo::open(&cli.repo)?;
            let mut index = ops::load_index(&repo)?;

            let abs_paths: sod::Result<Vec<PathBuf>> = paths
                .iter()
                .map(|p| std::fs::canonicalize(p).map_err(|source| sod::Error::Io { path: p.clone(), source }))
                .collect();
            ops::add(&repo, &mut index, &abs_paths?)?;

            ops::save_index(&repo, &index)?;
        }

        Commands::Reset { path } => {
            let repo = Repo::open(&cli.repo)?;
            let mut index = ops::load_index(&repo)?;

            let abs_path = std::fs::canonicalize(&path).map_err(|source| sod::Error::Io { path: path.clone(), source })?;
            let rel = repo.relpath(&abs_path)?;
            ops::reset(&repo, &mut index, &rel)?;

            ops::save_index(&repo, &index)?;
        }

        Commands::Commit { message, no_snapshot } => {
            let repo = Repo::open(&cli.repo)?;
            let index = ops::load_index(&repo)?;
            let commit = ops::commit(&repo, &index, &message, no_snapshot)?;
            println!("{}", sod::write_commit(&repo, &commit)?);
        }

        Commands::Log { revision } => {
            let repo = Repo::open(&cli.repo)?;
            let tip = sod::resolve_revision(&repo, &revision)?;

            for entry in ops::log(&repo, tip)? {
                println!("commit {}", entry.hash);
                println!("Author: {} <{}>", entry.commit.author.name, entry.commit.author.email);
                for snapshot in &entry.matching_snapshots {
                    println!("Snapshot: {}", snapshot.name());
                }
                println!();
                println!("    {}", entry.commit.message);
                println!();
                for delta in &entry.diff_to_parent {
                    print!("{}", format::format_status_line(&repo, delta, true)?);
                }
                println!();
            }
        }

        Commands::Diff { old, new, raw, null_terminated } => {
            let repo = Repo::open(&cli.repo)?;

            let deltas = match (old, new) {
                (Some(old), Some(new)) => ops::diff_revisions(&repo, &old, &new)?,
                (Some(single), None) => {
                    let index = ops::load_index(&repo)?;
                    ops::diff_index(&repo, &index, &single)?
                }
                (None, _) => {
                    let index = ops::load_index(&repo)?;
                    ops::diff_index(&repo, &index, "HEAD")?
                }
            };

            for delta in &deltas {
                if raw {
                    print!("{}", format::format_raw_diff_line(&repo, delta, true, null_terminated)?);
                } else {
                    print!("{}", format::format_status_line(&repo, delta, true)?);
                }
            }
        }

        Commands::Aux { command } => match command {
            AuxCommand::List => {
                let repo = Repo::open(&cli.repo)?;
                for name in repo.config().aux_store_names() {
                    let store_type = repo.config().aux_store_type(&name).unwrap_or("");
                    let url = repo.config().aux_store_url(&name).unwrap_or("");
                    println!("{name}\t{store_type}\t{url}");
                }
            }
            AuxCommand::Add { name, store_type, url } => {
                let mut repo = Repo::open(&cli.repo)?;
                sod::aux::create(&mut repo, &name, &store_type, &url)?;
            }
            AuxCommand::Remove { name } => {
                let mut repo = Repo::open(&cli.repo)?;
                sod::aux::delete(&mut repo, &name)?;
            }
            AuxCommand::Update { names } => {
                let repo = Repo::open(&cli.repo)?;
                sod::aux::update(&repo, &names)?;
            }
        },

        Commands::Restore { path, revision, store } => {
            let repo = Repo::open(&cli.repo)?;
            let abs_path = cli.repo.join(&path).canonicalize().unwrap_or_else(|_| cli.repo.join(&path));
            sod::restore(&repo, &abs_path, revision.as_deref(), store.as_deref())?;
        }

        Commands::Config { command } => match command {
            ConfigCommand::Get { key } => {
                let repo = Repo::open(&cli.repo)?;
                if let Some(value) = ops::config_get(&repo, &key)? {
                    println!("{value}");
                }
            }
            ConfigCommand::Set { key, value } => {
                let mut repo = Repo::open(&cli.repo)?;
                ops::config_set(&mut repo, &key, &value)?;
            }
            ConfigCommand::List => {
                let repo = Repo::open(&cli.repo)?;
                for (key, value) in ops::config_list(&repo) {
                    println!("{key}={value}");
                }
            }
        },
    }

    Ok(())
}

fn print_ignored_line(path: &str) {
    let width = DeltaStatus::max_name_width() + 1;
    let status_col = format!("{:>width$}", format!("{}:", DeltaStatus::Ignored.name()), width = width);
    println!("  {status_col}  {:<10}  {path}", "-");
}

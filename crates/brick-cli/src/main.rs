use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod git;
mod prompt;

use commands::Session;

/// Package manager for reusable HDL blocks.
///
/// Installs released blocks into a versioned cache, releases working
/// copies with stable requirements, and exports ordered build recipes.
///
/// EXAMPLES:
///     brick install arith.adder            Install the latest release
///     brick install arith.adder --ver v1.2.0
///     brick release minor --dry-run        Check a release without writing
///     brick export --top adder_tb          Write build/recipe
///     brick config general.editor code     Change a setting
///
/// ENVIRONMENT VARIABLES:
///     BRICK_HOME        Settings directory (default ~/.brickyard)
///     BRICK_LOG         Log filter, e.g. 'debug' or 'brick_package=trace'
///     BRICK_EDITOR, BRICK_AUTHOR, BRICK_MULTI_DEVELOP,
///     BRICK_WORKSPACE, BRICK_CACHE   Override settings
///     NO_COLOR          Disable colored output
#[derive(Parser)]
#[command(name = "brick")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Show debug output
    #[arg(long, short = 'v', global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only show warnings and errors
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    /// Answer yes to every confirmation
    #[arg(long, short = 'y', global = true)]
    yes: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install a block into the cache
    ///
    /// Without --ver the latest release is installed; with it the release
    /// is pinned as vX, vX.Y and vX.Y.Z copies. Requirements are installed
    /// too.
    #[command(visible_alias = "i")]
    Install {
        /// Block title: [vendor.]library.name
        block: String,
        /// Release to pin, e.g. v1.2.0
        #[arg(id = "ver", long = "ver")]
        version: Option<String>,
    },

    /// Remove installed copies of a block from the cache
    Uninstall {
        /// Block title: [vendor.]library.name
        block: String,
        /// Only pins starting with this version (v1, v1.2 or v1.2.3)
        #[arg(id = "ver", long = "ver")]
        version: Option<String>,
    },

    /// Release the block in the current directory
    ///
    /// Checks the repository, records requirements, tags vX.Y.Z and
    /// pushes. A dry run performs the checks and prints the report only.
    Release {
        /// major, minor, patch or an explicit vX.Y.Z
        next: String,
        /// Commit message (default: "Releases version vX.Y.Z")
        #[arg(long, short = 'm')]
        message: Option<String>,
        /// Run every check without writing anything
        #[arg(long)]
        dry_run: bool,
        /// Commit only Block.toml and the changelog
        #[arg(long)]
        only_meta: bool,
        /// Do not install the new release into the cache
        #[arg(long)]
        no_install: bool,
        /// Do not touch the changelog
        #[arg(long)]
        skip_changelog: bool,
    },

    /// Write the build recipe for the block in the current directory
    Export {
        /// Top-level unit or testbench
        #[arg(long)]
        top: Option<String>,
    },

    /// List every known block and its copies
    #[command(visible_alias = "ls")]
    List,

    /// Delete a block's working copy
    Remove {
        /// Block title: [vendor.]library.name
        block: String,
    },

    /// Show or change global settings
    ///
    /// EXAMPLES:
    ///     brick config --list
    ///     brick config general.tag-suffix
    ///     brick config sources.vhdl vhd,vhdl
    Config {
        /// Print every setting
        #[arg(long)]
        list: bool,
        /// Dotted key, e.g. general.editor
        key: Option<String>,
        /// New value; empty clears the key
        value: Option<String>,
    },
}

fn init_logging(verbose: bool, quiet: bool) {
    let default = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_env("BRICK_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    if config::no_color() {
        colored::control::set_override(false);
    }
    init_logging(cli.verbose, cli.quiet);

    let session = Session {
        config: config::load()?,
        assume_yes: cli.yes,
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Install { block, version } => {
            commands::install::run(commands::install::InstallArgs { block, version }, &session)?;
        }
        Commands::Uninstall { block, version } => {
            let args = commands::uninstall::UninstallArgs { block, version };
            commands::uninstall::run(args, &session)?;
        }
        Commands::Release {
            next,
            message,
            dry_run,
            only_meta,
            no_install,
            skip_changelog,
        } => {
            let args = commands::release::ReleaseArgs {
                next,
                message,
                dry_run,
                only_meta,
                no_install,
                skip_changelog,
            };
            commands::release::run(args, &session)?;
        }
        Commands::Export { top } => {
            commands::export::run(commands::export::ExportArgs { top }, &session)?;
        }
        Commands::List => commands::list::run(&session)?,
        Commands::Remove { block } => {
            commands::remove::run(commands::remove::RemoveArgs { block }, &session)?;
        }
        Commands::Config { list, key, value } => {
            let args = commands::config::ConfigArgs { list, key, value };
            commands::config::run(args, &session)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_release_flags() {
        let cli = Cli::try_parse_from([
            "brick", "-q", "release", "v1.2.0", "-m", "msg", "--dry-run", "--only-meta",
        ])
        .unwrap();
        assert!(cli.quiet);
        match cli.command {
            Commands::Release {
                next,
                message,
                dry_run,
                only_meta,
                no_install,
                ..
            } => {
                assert_eq!(next, "v1.2.0");
                assert_eq!(message.as_deref(), Some("msg"));
                assert!(dry_run && only_meta && !no_install);
            }
            _ => panic!("expected release"),
        }
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["brick", "-v", "-q", "list"]).is_err());
    }
}

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use crate::client::presenter::{render_import, render_validation};
use crate::client::{CandidateFile, ImportApi, ImportWorkflow, TracingNotifier};

pub const DEFAULT_SERVER_URL: &str = "http://localhost:8080";

#[derive(Parser, Debug)]
#[command(name = "onspot-api", version, about = "OnSpot talent CSV import service and client")]
pub struct Cli {
    /// Base URL of the import service, used by the client commands
    #[arg(long, global = true, env = "ONSPOT_API_URL", default_value = DEFAULT_SERVER_URL)]
    pub server: String,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Run the HTTP service (default)
    Serve,
    /// Check a CSV file without importing anything
    Validate {
        file: PathBuf,

        /// List every row error instead of the first few
        #[arg(long, default_value_t = false)]
        all_errors: bool,
    },
    /// Validate, then import a CSV file
    Import {
        file: PathBuf,

        /// Leave out rows whose email already belongs to a user
        #[arg(long, default_value_t = false)]
        skip_duplicates: bool,
    },
    /// Download the blank import template
    Template {
        /// Directory the template is saved into
        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,
    },
}

impl Cli {
    pub fn command(&self) -> &Commands {
        self.command.as_ref().unwrap_or(&Commands::Serve)
    }
}

/// Runs one of the client subcommands against `server`.
pub async fn run_client_command(server: &str, command: &Commands) -> Result<()> {
    let api = ImportApi::new(server)?;
    let mut workflow = ImportWorkflow::new(api, TracingNotifier);

    match command {
        Commands::Serve => bail!("serve is not a client command"),
        Commands::Template { out_dir } => {
            let path = workflow
                .download_template(out_dir)
                .await
                .context("template download failed")?;
            println!("Saved {}", path.display());
        }
        Commands::Validate { file, all_errors } => {
            workflow.select_files(vec![load(file).await?])?;
            let report = workflow.validate().await?;
            print!("{}", render_validation(report, *all_errors)?);
        }
        Commands::Import {
            file,
            skip_duplicates,
        } => {
            workflow.select_files(vec![load(file).await?])?;
            workflow.set_skip_duplicates(*skip_duplicates);
            let report = workflow.validate().await?;
            print!("{}", render_validation(report, false)?);
            if !workflow.can_import() {
                bail!("nothing to import: no valid rows in {}", file.display());
            }
            let result = workflow.import().await?;
            print!("{}", render_import(result));
        }
    }
    Ok(())
}

async fn load(path: &Path) -> Result<CandidateFile> {
    CandidateFile::from_path(path)
        .await
        .with_context(|| format!("could not read {}", path.display()))
}

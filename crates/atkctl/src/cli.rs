use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::commands;

/// ATK CLI - list, describe and invoke agent tools
#[derive(Parser, Debug)]
#[command(name = "atkctl")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Toolbox configuration file
    #[arg(long, short = 'c', global = true, env = "ATK_CONFIG", default_value = "toolbox.yaml")]
    pub config: PathBuf,

    /// Enable debug logging (overrides RUST_LOG)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the tools the toolbox provides
    List {
        /// Output format (wide, json, name)
        #[arg(short, long, default_value = "wide")]
        output: String,
    },

    /// Show a tool's definition, parameter schema and failure contract
    Describe {
        /// Tool name (e.g. slack_post_message)
        tool: String,

        /// Output format (yaml, json)
        #[arg(short, long, default_value = "yaml")]
        output: String,
    },

    /// Invoke a tool and print its result
    Invoke {
        /// Tool name
        tool: String,

        /// Arguments as a JSON object
        #[arg(short, long)]
        args: Option<String>,

        /// Read arguments from a JSON or YAML file
        #[arg(long, conflicts_with = "args")]
        args_file: Option<PathBuf>,

        /// Output format (json, yaml)
        #[arg(short, long, default_value = "json")]
        output: String,
    },

    /// Load and validate the toolbox
    Validate,
}

impl Cli {
    pub async fn execute(self) -> anyhow::Result<ExitCode> {
        match self.command {
            Commands::List { output } => {
                commands::list::execute(&self.config, &output)?;
                Ok(ExitCode::SUCCESS)
            }
            Commands::Describe { tool, output } => {
                commands::describe::execute(&self.config, &tool, &output)?;
                Ok(ExitCode::SUCCESS)
            }
            Commands::Invoke {
                tool,
                args,
                args_file,
                output,
            } => {
                let succeeded = commands::invoke::execute(
                    &self.config,
                    &tool,
                    args.as_deref(),
                    args_file.as_deref(),
                    &output,
                )
                .await?;
                Ok(if succeeded {
                    ExitCode::SUCCESS
                } else {
                    ExitCode::FAILURE
                })
            }
            Commands::Validate => {
                commands::validate::execute(&self.config)?;
                Ok(ExitCode::SUCCESS)
            }
        }
    }
}

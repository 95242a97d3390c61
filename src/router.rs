//! Command routing logic for CLI

use anyhow::Result;

use crate::args::{Cli, Commands};
use crate::commands;

/// Route CLI commands to their respective handlers
pub async fn route(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run {
            config,
            tasks,
            sample_size,
            workers,
            run_dir,
            data_dir,
            format,
        } => {
            commands::run::execute(commands::run::RunArgs {
                config,
                tasks,
                sample_size,
                workers,
                run_dir,
                data_dir,
                format: format.into(),
            })
            .await
        }
        Commands::Resume {
            run_dir,
            config,
            task,
            offset,
            data_dir,
            format,
        } => {
            commands::resume::execute(commands::resume::ResumeArgs {
                run_dir,
                config,
                task,
                offset,
                data_dir,
                format: format.into(),
            })
            .await
        }
        Commands::Rescore {
            input,
            config,
            write,
            format,
        } => commands::rescore::execute(&input, config.as_deref(), write, format.into()).await,
        Commands::Report { input, format } => commands::report::execute(&input, format.into()).await,
        Commands::Checkpoints { run_dir, task } => {
            commands::checkpoints::execute(&run_dir, task).await
        }
    }
}

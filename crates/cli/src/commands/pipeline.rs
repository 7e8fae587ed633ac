// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pipeline commands. Definitions are supplied as JSON files (or `-`
//! for stdin) matching the wire `Pipeline` shape.

use crate::client::DaemonClient;
use crate::output::{print_json, OutputFormat};
use anyhow::{bail, Context, Result};
use clap::Subcommand;
use flo_core::Pipeline;
use flo_wire::{Request, Response};
use std::io::Read;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum PipelineCommand {
    /// Create (or replace) a pipeline from a JSON definition
    Create {
        /// Path to the definition, `-` for stdin
        file: PathBuf,
    },

    /// One pipeline by id
    Get { id: String },

    /// Every registered pipeline
    List,

    /// Delete a pipeline by id
    Delete { id: String },

    /// Run a pipeline with the given input
    Execute {
        id: String,
        /// JSON input (defaults to null)
        #[arg(long)]
        input: Option<String>,
    },

    /// One execution record by id
    Execution { id: String },

    /// Every retained execution record
    Executions,
}

fn load_pipeline(path: &PathBuf) -> Result<Pipeline> {
    let content = if path.as_os_str() == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("read pipeline from stdin")?;
        buffer
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("read pipeline from {}", path.display()))?
    };
    serde_json::from_str(&content).context("parse pipeline definition")
}

pub async fn run(
    client: &DaemonClient,
    command: PipelineCommand,
    output: OutputFormat,
) -> Result<()> {
    match command {
        PipelineCommand::Create { file } => {
            let pipeline = load_pipeline(&file)?;
            let response = client.request(Request::CreatePipeline { pipeline }).await?;
            let Response::Pipeline { pipeline } = response else {
                bail!("unexpected response: {response:?}");
            };
            match output {
                OutputFormat::Json => print_json(&pipeline),
                OutputFormat::Text => {
                    println!("{} ({} steps)", pipeline.id, pipeline.steps.len());
                    Ok(())
                }
            }
        }

        PipelineCommand::Get { id } => {
            let response = client.request(Request::GetPipeline { id }).await?;
            let Response::Pipeline { pipeline } = response else {
                bail!("unexpected response: {response:?}");
            };
            print_json(&pipeline)
        }

        PipelineCommand::List => {
            let response = client.request(Request::ListPipelines).await?;
            let Response::Pipelines { pipelines } = response else {
                bail!("unexpected response: {response:?}");
            };
            match output {
                OutputFormat::Json => print_json(&pipelines),
                OutputFormat::Text => {
                    for pipeline in &pipelines {
                        println!("{:<20} {:<3} steps  {}", pipeline.id, pipeline.steps.len(), pipeline.description);
                    }
                    Ok(())
                }
            }
        }

        PipelineCommand::Delete { id } => {
            client.request(Request::DeletePipeline { id }).await?;
            println!("ok");
            Ok(())
        }

        PipelineCommand::Execute { id, input } => {
            let input = match input {
                Some(raw) => serde_json::from_str(&raw).context("parse --input as JSON")?,
                None => serde_json::Value::Null,
            };
            let response = client.request(Request::ExecutePipeline { id, input }).await?;
            let Response::Execution { execution } = response else {
                bail!("unexpected response: {response:?}");
            };
            match output {
                OutputFormat::Json => print_json(&execution),
                OutputFormat::Text => {
                    println!("{}: {:?}", execution.id, execution.status);
                    for step in &execution.steps {
                        match &step.error {
                            Some(error) => println!("  {:<16} {:?} {error}", step.step_id, step.status),
                            None => println!("  {:<16} {:?}", step.step_id, step.status),
                        }
                    }
                    if let Some(error) = &execution.error {
                        bail!("{error}");
                    }
                    println!("{}", serde_json::to_string_pretty(&execution.output)?);
                    Ok(())
                }
            }
        }

        PipelineCommand::Execution { id } => {
            let response = client.request(Request::GetExecution { id }).await?;
            let Response::Execution { execution } = response else {
                bail!("unexpected response: {response:?}");
            };
            print_json(&execution)
        }

        PipelineCommand::Executions => {
            let response = client.request(Request::ListExecutions).await?;
            let Response::Executions { executions } = response else {
                bail!("unexpected response: {response:?}");
            };
            match output {
                OutputFormat::Json => print_json(&executions),
                OutputFormat::Text => {
                    for execution in &executions {
                        println!(
                            "{:<12} {:<20} {:?}",
                            execution.id, execution.pipeline_id, execution.status
                        );
                    }
                    Ok(())
                }
            }
        }
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Discovery registry commands.

use crate::client::DaemonClient;
use crate::output::{print_json, OutputFormat};
use anyhow::{bail, Result};
use clap::Subcommand;
use flo_core::ServiceEntry;
use flo_wire::{Request, Response};

#[derive(Subcommand)]
pub enum RegistryCommand {
    /// Register a service instance
    Register {
        name: String,
        host: String,
        port: u16,
        /// Explicit stable id (generated when omitted)
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        version: Option<String>,
        /// key=value metadata pairs
        #[arg(long = "meta", value_parser = parse_key_value)]
        metadata: Vec<(String, String)>,
        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// Remove an instance (idempotent)
    Deregister { id: String },

    /// Refresh an instance's liveness timestamp
    Heartbeat { id: String },

    /// All healthy instances of a logical name
    Discover { name: String },

    /// One entry by id
    Get { id: String },

    /// Every entry, regardless of status
    List,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got {s:?}"))
}

fn print_entry_line(entry: &ServiceEntry) {
    println!(
        "{:<24} {:<12} {:<10} {}:{}",
        entry.id, entry.name, entry.status.to_string(), entry.host, entry.port
    );
}

pub async fn run(
    client: &DaemonClient,
    command: RegistryCommand,
    output: OutputFormat,
) -> Result<()> {
    match command {
        RegistryCommand::Register {
            name,
            host,
            port,
            id,
            version,
            metadata,
            tags,
        } => {
            let mut entry = ServiceEntry::new(name, host, port);
            if let Some(id) = id {
                entry.id = id;
            }
            if let Some(version) = version {
                entry.version = version;
            }
            entry.metadata = metadata.into_iter().collect();
            entry.tags = tags;

            let response = client.request(Request::Register { entry }).await?;
            let Response::Entry { entry } = response else {
                bail!("unexpected response: {response:?}");
            };
            match output {
                OutputFormat::Json => print_json(&entry),
                OutputFormat::Text => {
                    println!("{}", entry.id);
                    Ok(())
                }
            }
        }

        RegistryCommand::Deregister { id } => {
            client.request(Request::Deregister { id }).await?;
            println!("ok");
            Ok(())
        }

        RegistryCommand::Heartbeat { id } => {
            client.request(Request::Heartbeat { id }).await?;
            println!("ok");
            Ok(())
        }

        RegistryCommand::Discover { name } => {
            let response = client.request(Request::Discover { name }).await?;
            finish_entries(response, output)
        }

        RegistryCommand::Get { id } => {
            let response = client.request(Request::GetEntry { id }).await?;
            let Response::Entry { entry } = response else {
                bail!("unexpected response: {response:?}");
            };
            match output {
                OutputFormat::Json => print_json(&entry),
                OutputFormat::Text => {
                    print_entry_line(&entry);
                    Ok(())
                }
            }
        }

        RegistryCommand::List => {
            let response = client.request(Request::ListEntries).await?;
            finish_entries(response, output)
        }
    }
}

fn finish_entries(response: Response, output: OutputFormat) -> Result<()> {
    let Response::Entries { entries } = response else {
        bail!("unexpected response: {response:?}");
    };
    match output {
        OutputFormat::Json => print_json(&entries),
        OutputFormat::Text => {
            for entry in &entries {
                print_entry_line(entry);
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::parse_key_value;

    #[test]
    fn parses_key_value_pairs() {
        assert_eq!(
            parse_key_value("region=local"),
            Ok(("region".to_string(), "local".to_string()))
        );
        // Values may themselves contain '='.
        assert_eq!(
            parse_key_value("expr=a=b"),
            Ok(("expr".to_string(), "a=b".to_string()))
        );
        assert!(parse_key_value("no-separator").is_err());
    }
}

//! `portcullis`: inspect an access-control configuration offline.
//!
//! Guard settings for `dispatch` come from the `PORTCULLIS_*` environment
//! variables.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use portcullis_auth::{
    AccessControl, DispatchGuard, GuardConfig, PolicyDocument, RequestContext, RoleGraph, RoleName, RoleRecord,
    UserRecord, Visitor,
};
use portcullis_core::UserId;

/// Inspect roles and permission rules without running the application
#[derive(Parser, Debug)]
#[command(name = "portcullis", about = "Offline access-control inspection")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
struct Sources {
    /// Role records (JSON array)
    #[arg(value_name = "ROLES_JSON")]
    roles_file: PathBuf,

    /// Permission policy (JSON)
    #[arg(value_name = "POLICY_JSON")]
    policy_file: PathBuf,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
struct Query {
    resource: String,
    privilege: String,

    /// Comma-separated roles of an authenticated visitor; omit for anonymous
    #[arg(long, value_delimiter = ',')]
    roles: Option<Vec<String>>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
enum Command {
    /// Load both documents and print a summary
    Check {
        #[command(flatten)]
        sources: Sources,
    },

    /// Explain the decision for a resource and privilege
    Explain {
        #[command(flatten)]
        sources: Sources,
        #[command(flatten)]
        query: Query,
    },

    /// Evaluate the dispatch guard for a requested path
    Dispatch {
        #[command(flatten)]
        sources: Sources,
        #[command(flatten)]
        query: Query,
        /// Requested location, as received by the router
        path: String,
    },
}

fn read(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn load(sources: &Sources) -> anyhow::Result<AccessControl> {
    let records: Vec<RoleRecord> = serde_json::from_str(&read(&sources.roles_file)?)
        .with_context(|| format!("parsing {}", sources.roles_file.display()))?;
    let policy = PolicyDocument::from_json_str(&read(&sources.policy_file)?)
        .with_context(|| format!("parsing {}", sources.policy_file.display()))?;

    let graph = RoleGraph::load(records).context("invalid role graph")?;
    AccessControl::from_policy(graph, &policy).context("invalid policy")
}

fn visitor_for(query: &Query) -> Visitor {
    match &query.roles {
        None => Visitor::anonymous(),
        Some(roles) => Visitor::with_roles(
            Some(UserRecord::new(UserId::new(0), "cli")),
            roles
                .iter()
                .map(|r| r.trim())
                .filter(|r| !r.is_empty())
                .map(|r| RoleName::from(r.to_string())),
        ),
    }
}

#[derive(Debug, Serialize)]
struct RoleSummary<'a> {
    name: &'a str,
    parent: Option<&'a str>,
    description: &'a str,
}

#[derive(Debug, Serialize)]
struct Summary<'a> {
    roles: Vec<RoleSummary<'a>>,
    resources: Vec<&'a str>,
    grants: usize,
}

impl<'a> Summary<'a> {
    fn of(access: &'a AccessControl) -> Self {
        let graph = access.graph();
        Self {
            roles: graph
                .role_names()
                .map(|name| RoleSummary {
                    name: name.as_str(),
                    parent: graph.parent_of(name.as_str()).map(RoleName::as_str),
                    description: graph.description(name.as_str()).unwrap_or_default(),
                })
                .collect(),
            resources: access.table().resources().map(|r| r.as_str()).collect(),
            grants: access.table().grant_count(),
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Check { sources } => {
            let access = load(&sources)?;
            print_json(&Summary::of(&access))
        }
        Command::Explain { sources, query } => {
            let access = load(&sources)?;
            let visitor = visitor_for(&query);
            print_json(&access.explain(&visitor, &query.resource, &query.privilege))
        }
        Command::Dispatch { sources, query, path } => {
            let access = load(&sources)?;
            let guard = DispatchGuard::new(GuardConfig::from_env()?);
            let visitor = visitor_for(&query);
            let request = RequestContext::new(path, query.resource, query.privilege);
            print_json(&guard.on_dispatch(&access, &visitor, &request))
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    portcullis_observability::init();

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "portcullis failed");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use chrono::TimeDelta;
use clap::{Parser, Subcommand, ValueEnum};
use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::config::Config;
use crate::evaluation::{EvaluationConfig, FilterCriteria, Mode, NameFilter, Severity};

#[derive(Parser, Debug)]
#[command(name = "kube-workload-check")]
#[command(author, version, about = "Check Kubernetes CronJob schedules and Job failures")]
#[command(after_help = "The --filter selector is in the form key=value. \
    Multiple selectors are comma-separated, e.g. foo=bar,red=color")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Configuration file [default: ~/.kube-workload-check/config.json]
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Seconds a CronJob's last run may differ from its expected run
    #[arg(long, global = true, value_name = "SECONDS")]
    pub schedule_tolerance: Option<u64>,

    /// Status reported when a workload failed
    #[arg(long, global = true, value_enum, default_value = "critical")]
    pub failure_severity: FailureSeverity,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Enable verbose logging
    #[arg(long, global = true)]
    pub verbose: bool,
}

impl Args {
    /// Merge command line selection with the config file defaults
    pub fn evaluation_config(&self, config: &Config) -> EvaluationConfig {
        let selection = self.command.selection();
        let tolerance_secs = self
            .schedule_tolerance
            .unwrap_or(config.schedule_tolerance_secs);

        EvaluationConfig {
            criteria: selection.criteria(config),
            names: NameFilter::parse(self.command.names()),
            label_selector: selection.filter.clone(),
            schedule_tolerance: i64::try_from(tolerance_secs)
                .ok()
                .and_then(TimeDelta::try_seconds)
                .unwrap_or(TimeDelta::MAX),
            failure_severity: self.failure_severity.into(),
        }
    }
}

/// API server connection and credentials
#[derive(clap::Args, Debug, Default, Clone)]
pub struct ConnectionArgs {
    /// URL to API server
    #[arg(short = 's', long, global = true, value_name = "URL")]
    pub api_server: Option<String>,

    /// Version of the batch API group
    #[arg(short = 'v', long, global = true, value_name = "VERSION", default_value = "v1")]
    pub api_version: String,

    /// Use service account authentication
    #[arg(long, global = true)]
    pub in_cluster: bool,

    /// CA file to verify API server cert
    #[arg(long, global = true, value_name = "CA-FILE")]
    pub ca_file: Option<PathBuf>,

    /// Client cert to present
    #[arg(long, global = true, value_name = "CERT-FILE")]
    pub cert: Option<PathBuf>,

    /// Client key for the client cert
    #[arg(long, global = true, value_name = "KEY-FILE")]
    pub key: Option<PathBuf>,

    /// User with access to API
    #[arg(short = 'u', long, global = true, value_name = "USER")]
    pub user: Option<String>,

    /// If user is passed, also pass a password
    #[arg(long, global = true, value_name = "PASSWORD")]
    pub password: Option<String>,

    /// Bearer token for authorization
    #[arg(long, global = true, value_name = "TOKEN")]
    pub token: Option<String>,

    /// File containing bearer token for authorization
    #[arg(long, global = true, value_name = "TOKEN-FILE")]
    pub token_file: Option<PathBuf>,

    /// Kubeconfig context to use when no API server is given
    #[arg(long, global = true, value_name = "CONTEXT")]
    pub context: Option<String>,
}

impl ConnectionArgs {
    pub fn has_credentials(&self) -> bool {
        self.ca_file.is_some()
            || self.cert.is_some()
            || self.key.is_some()
            || self.user.is_some()
            || self.password.is_some()
            || self.token.is_some()
            || self.token_file.is_some()
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check that every CronJob ran at its most recent scheduled time
    Cronjobs {
        #[command(flatten)]
        selection: SelectionArgs,

        /// Comma-separated CronJob names to check, or 'all'
        #[arg(short = 'c', long = "cronjobs", value_name = "CRONJOBS", default_value = "all")]
        names: String,
    },

    /// Check that no Job has failed
    Jobs {
        #[command(flatten)]
        selection: SelectionArgs,

        /// Comma-separated Job names to check, or 'all'
        #[arg(short = 'c', long = "jobs", value_name = "JOBS", default_value = "all")]
        names: String,
    },
}

impl Command {
    pub fn mode(&self) -> Mode {
        match self {
            Command::Cronjobs { .. } => Mode::Schedule,
            Command::Jobs { .. } => Mode::Completion,
        }
    }

    pub fn selection(&self) -> &SelectionArgs {
        match self {
            Command::Cronjobs { selection, .. } | Command::Jobs { selection, .. } => selection,
        }
    }

    pub fn names(&self) -> &str {
        match self {
            Command::Cronjobs { names, .. } | Command::Jobs { names, .. } => names,
        }
    }
}

/// Namespace, node and label filters
#[derive(clap::Args, Debug, Default, Clone)]
pub struct SelectionArgs {
    /// Exclude the specified list of namespaces
    #[arg(short = 'n', long = "exclude-namespace", value_name = "NAMESPACES", value_delimiter = ',')]
    pub exclude_namespaces: Vec<String>,

    /// Include the specified list of namespaces, an empty list includes all namespaces
    #[arg(short = 'i', long = "include-namespace", value_name = "NAMESPACES", value_delimiter = ',')]
    pub include_namespaces: Vec<String>,

    /// Exclude the specified nodes (comma separated list)
    #[arg(long = "exclude-nodes", value_name = "NODES", value_delimiter = ',')]
    pub exclude_nodes: Vec<String>,

    /// Include the specified nodes (comma separated list), an empty list includes all nodes
    #[arg(long = "include-nodes", value_name = "NODES", value_delimiter = ',')]
    pub include_nodes: Vec<String>,

    /// Label selector for the resources to be checked
    #[arg(short = 'f', long = "filter", value_name = "FILTER")]
    pub filter: Option<String>,
}

impl SelectionArgs {
    /// Command line lists win over config file lists when given
    pub fn criteria(&self, config: &Config) -> FilterCriteria {
        FilterCriteria {
            include_namespaces: pick(&self.include_namespaces, &config.include_namespaces),
            exclude_namespaces: pick(&self.exclude_namespaces, &config.exclude_namespaces),
            include_nodes: pick(&self.include_nodes, &config.include_nodes),
            exclude_nodes: pick(&self.exclude_nodes, &config.exclude_nodes),
        }
    }
}

fn pick(cli: &[String], configured: &[String]) -> BTreeSet<String> {
    let source = if cli.is_empty() { configured } else { cli };
    source.iter().cloned().collect()
}

#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum FailureSeverity {
    Warning,
    #[default]
    Critical,
}

impl From<FailureSeverity> for Severity {
    fn from(value: FailureSeverity) -> Self {
        match value {
            FailureSeverity::Warning => Severity::Warning,
            FailureSeverity::Critical => Severity::Critical,
        }
    }
}

#[derive(ValueEnum, Clone, Debug, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Yaml,
}

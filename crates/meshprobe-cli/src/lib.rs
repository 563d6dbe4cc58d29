//! The `meshprobe` command line: argument definitions and the two subcommands.

#![warn(unreachable_pub, missing_debug_implementations)]

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use meshprobe_core::{
    channel, BatchReport, Channel, CsvStore, DispatchOpts, Dispatcher, GenOpts, GenerationPolicy,
    Generator, Grammar, Interactive, LineSource, ProtocolVersion, RetryPolicy, Retrying,
};
use meshprobe_impls::{HttpOpts, HttpService};
use meshprobe_utils::DeploymentConfig;
use rand::prelude::*;

/// Arguments of `meshprobe generate`.
#[derive(clap::Args, Debug)]
pub struct GenerateArgs {
    /// File with one node address per line
    #[arg(long)]
    pub nodes: PathBuf,

    /// Command file to write
    #[arg(short, long)]
    pub output: PathBuf,

    /// Number of commands to generate
    #[arg(short = 'n', long, default_value_t = 100)]
    pub count: usize,

    /// Minimum number of intermediate nodes
    #[arg(long, default_value_t = 0)]
    pub min_path_len: usize,

    /// Maximum number of intermediate nodes
    #[arg(long, default_value_t = 2)]
    pub max_path_len: usize,

    /// Sampling policy: shuffle, reservoir or direct
    #[arg(long, default_value_t = GenerationPolicy::Shuffle)]
    pub policy: GenerationPolicy,

    /// Channel pool, comma-separated [default: the deployment's, or the standard 2.4/5 GHz set]
    #[arg(long, value_delimiter = ',')]
    pub channels: Option<Vec<Channel>>,

    /// Random seed [default: from entropy]
    #[arg(short, long)]
    pub seed: Option<u64>,

    /// Deployment configuration file (JSON or Dhall)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Arguments of `meshprobe dispatch`. Flags left unset fall back to the deployment configuration.
#[derive(clap::Args, Debug)]
pub struct DispatchArgs {
    /// Deployment configuration file (JSON or Dhall)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Measurement service URL
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Command file to run; without it, commands are read at a prompt
    #[arg(short, long)]
    pub batch: Option<PathBuf>,

    /// CSV file results are appended to
    #[arg(long)]
    pub store: PathBuf,

    /// Response encoding: json or csv
    #[arg(long)]
    pub protocol: Option<ProtocolVersion>,

    /// Command grammar: channels or olsr
    #[arg(long)]
    pub grammar: Option<Grammar>,

    /// Per-request timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Requests in flight
    #[arg(short, long)]
    pub concurrency: Option<usize>,

    /// Attempts per request, including the first
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Delay before the first retry in milliseconds
    #[arg(long)]
    pub backoff_ms: Option<u64>,
}

/// Runs `meshprobe generate`, returning the number of commands written.
pub fn generate(args: &GenerateArgs) -> anyhow::Result<usize> {
    let config = load_config(args.config.as_deref())?;
    let pool = meshprobe_utils::read_node_pool(&args.nodes)
        .with_context(|| format!("failed to load nodes from {}", args.nodes.display()))?;
    let required = if args.max_path_len > 0 {
        2 + args.max_path_len
    } else {
        2
    };
    anyhow::ensure!(
        pool.len() >= required,
        "insufficient nodes for paths of up to {} intermediate node(s): need {}, found {}",
        args.max_path_len,
        required,
        pool.len()
    );
    let channels = args
        .channels
        .clone()
        .or(config.channels)
        .unwrap_or_else(channel::default_channels);
    let opts = GenOpts::builder()
        .channels(channels)
        .count(args.count)
        .min_path_len(args.min_path_len)
        .max_path_len(args.max_path_len)
        .policy(args.policy)
        .build();
    let generator = Generator::new(pool, opts)?;
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let commands = generator.generate(&mut rng);
    if commands.len() < args.count {
        log::warn!(
            "Only {} distinct tuples exist, wanted {}",
            commands.len(),
            args.count
        );
    }
    let nr_written = meshprobe_utils::write_commands(&args.output, &commands)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    Ok(nr_written)
}

/// Runs `meshprobe dispatch` to completion and returns the batch counters.
pub fn dispatch(args: &DispatchArgs) -> anyhow::Result<BatchReport> {
    let settings = DispatchSettings::resolve(args, load_config(args.config.as_deref())?)?;
    let service = HttpService::from_opts(
        HttpOpts::builder()
            .endpoint(settings.endpoint.clone())
            .timeout(settings.timeout)
            .protocol(settings.protocol)
            .build(),
    )
    .context("failed to build HTTP client")?;
    let dispatcher = Dispatcher::new(
        Retrying::new(service, settings.retry),
        DispatchOpts::builder()
            .concurrency(settings.concurrency)
            .build(),
    );
    log::info!(
        "Dispatching to {} ({}, {} in flight)",
        settings.endpoint,
        settings.protocol,
        settings.concurrency
    );
    let store = CsvStore::new(&args.store);
    let report = match &args.batch {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("failed to open batch file {}", path.display()))?;
            let mut source = LineSource::new(BufReader::new(file), settings.grammar);
            dispatcher.run(&mut source, store)?
        }
        None => dispatcher.run(&mut Interactive::stdio(settings.grammar), store)?,
    };
    Ok(report)
}

fn load_config(path: Option<&Path>) -> anyhow::Result<DeploymentConfig> {
    match path {
        Some(path) => meshprobe_utils::read_config(path)
            .with_context(|| format!("failed to read config {}", path.display())),
        None => Ok(DeploymentConfig::default()),
    }
}

// Dispatch flags merged over the deployment configuration.
#[derive(Debug, Clone, PartialEq)]
struct DispatchSettings {
    endpoint: String,
    protocol: ProtocolVersion,
    grammar: Grammar,
    timeout: Duration,
    concurrency: usize,
    retry: RetryPolicy,
}

impl DispatchSettings {
    fn resolve(args: &DispatchArgs, config: DeploymentConfig) -> anyhow::Result<Self> {
        let endpoint = args
            .endpoint
            .clone()
            .or(config.endpoint)
            .context("no service endpoint: pass --endpoint or set `endpoint` in --config")?;
        let concurrency = args.concurrency.unwrap_or(config.concurrency);
        anyhow::ensure!(concurrency > 0, "concurrency must be at least 1");
        let max_attempts = args.max_attempts.unwrap_or(config.max_attempts);
        anyhow::ensure!(max_attempts > 0, "max attempts must be at least 1");
        let timeout_ms = args.timeout_ms.unwrap_or(config.timeout_ms);
        anyhow::ensure!(timeout_ms > 0, "timeout must be positive");
        let backoff = Duration::from_millis(args.backoff_ms.unwrap_or(config.backoff_ms));
        Ok(Self {
            endpoint,
            protocol: args.protocol.unwrap_or(config.protocol),
            grammar: args.grammar.unwrap_or(config.grammar),
            timeout: Duration::from_millis(timeout_ms),
            concurrency,
            retry: RetryPolicy::builder()
                .max_attempts(max_attempts)
                .backoff(backoff)
                .build(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dispatch_args() -> DispatchArgs {
        DispatchArgs {
            config: None,
            endpoint: None,
            batch: None,
            store: PathBuf::from("results.csv"),
            protocol: None,
            grammar: None,
            timeout_ms: None,
            concurrency: None,
            max_attempts: None,
            backoff_ms: None,
        }
    }

    #[test]
    fn flags_override_config() -> anyhow::Result<()> {
        let config = DeploymentConfig {
            endpoint: Some("http://config/measure".into()),
            protocol: ProtocolVersion::Csv,
            concurrency: 8,
            ..Default::default()
        };
        let args = DispatchArgs {
            endpoint: Some("http://flag/measure".into()),
            concurrency: Some(2),
            max_attempts: Some(3),
            ..dispatch_args()
        };
        let settings = DispatchSettings::resolve(&args, config)?;
        assert_eq!(settings.endpoint, "http://flag/measure");
        assert_eq!(settings.protocol, ProtocolVersion::Csv);
        assert_eq!(settings.grammar, Grammar::Channels);
        assert_eq!(settings.concurrency, 2);
        assert_eq!(settings.retry.max_attempts, 3);
        assert_eq!(settings.timeout, Duration::from_secs(10));
        Ok(())
    }

    #[test]
    fn endpoint_is_required() {
        let res = DispatchSettings::resolve(&dispatch_args(), DeploymentConfig::default());
        assert!(res.is_err());
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let args = DispatchArgs {
            endpoint: Some("http://flag/measure".into()),
            concurrency: Some(0),
            ..dispatch_args()
        };
        assert!(DispatchSettings::resolve(&args, DeploymentConfig::default()).is_err());
    }

    #[test]
    fn generate_writes_parsable_commands() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let nodes = dir.path().join("nodes.txt");
        std::fs::write(&nodes, "10.0.0.1\n10.0.0.2\n10.0.0.3\n")?;
        let output = dir.path().join("commands.txt");
        let args = GenerateArgs {
            nodes,
            output: output.clone(),
            count: 100,
            min_path_len: 0,
            max_path_len: 1,
            policy: GenerationPolicy::Shuffle,
            channels: Some(vec![Channel::new(1), Channel::new(6)]),
            seed: Some(7),
            config: None,
        };
        // 6 ordered pairs, each with an empty path or the one remaining node, on 2 channels
        assert_eq!(generate(&args)?, 24);
        let contents = std::fs::read_to_string(&output)?;
        assert_eq!(contents.lines().count(), 24);
        for line in contents.lines() {
            let command = Grammar::Channels.parse(line)?;
            assert_eq!(command.channels.len(), 1);
            assert!(command.nr_intermediate() <= 1);
        }
        Ok(())
    }

    #[test]
    fn generate_rejects_too_few_nodes_for_max_path_len() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let nodes = dir.path().join("nodes.txt");
        std::fs::write(&nodes, "10.0.0.1\n10.0.0.2\n10.0.0.3\n")?;
        let args = GenerateArgs {
            nodes,
            output: dir.path().join("commands.txt"),
            count: 10,
            min_path_len: 0,
            max_path_len: 2,
            policy: GenerationPolicy::Shuffle,
            channels: None,
            seed: Some(0),
            config: None,
        };
        let err = generate(&args).unwrap_err();
        assert!(err.to_string().contains("need 4, found 3"));
        assert!(!dir.path().join("commands.txt").exists());
        Ok(())
    }

    #[test]
    fn generate_rejects_inverted_bounds() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let nodes = dir.path().join("nodes.txt");
        std::fs::write(&nodes, "10.0.0.1\n10.0.0.2\n10.0.0.3\n")?;
        let args = GenerateArgs {
            nodes,
            output: dir.path().join("commands.txt"),
            count: 10,
            min_path_len: 2,
            max_path_len: 1,
            policy: GenerationPolicy::Shuffle,
            channels: None,
            seed: Some(0),
            config: None,
        };
        assert!(generate(&args).is_err());
        assert!(!dir.path().join("commands.txt").exists());
        Ok(())
    }
}

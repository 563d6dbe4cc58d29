//! Utilities for interfacing with meshprobe: node lists, command files and deployment
//! configuration.

#![warn(unreachable_pub, missing_debug_implementations, missing_docs)]

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use meshprobe_core::{Channel, Command, Grammar, Node, NodePool, ProtocolVersion};

/// Reads a [`NodePool`] from a file with one address per line. Lines are trimmed and blank lines
/// are skipped.
pub fn read_node_pool(path: impl AsRef<Path>) -> Result<NodePool, Error> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.into(),
        source,
    })?;
    let nodes = contents
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty())
        .map(|(line_no, text)| {
            text.parse::<Node>().map_err(|_| Error::InvalidNode {
                line_no,
                text: text.to_owned(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    if nodes.is_empty() {
        return Err(Error::EmptyNodeList(path.into()));
    }
    log::debug!("Read {} node(s) from {}", nodes.len(), path.display());
    Ok(NodePool::new(nodes)?)
}

/// Writes `commands` to `path`, one per line, replacing any existing file. Returns the number of
/// lines written.
pub fn write_commands<'a>(
    path: impl AsRef<Path>,
    commands: impl IntoIterator<Item = &'a Command>,
) -> Result<usize, Error> {
    let mut writer = BufWriter::new(File::create(path)?);
    let mut nr_written = 0;
    for command in commands {
        writeln!(writer, "{command}")?;
        nr_written += 1;
    }
    writer.flush()?;
    Ok(nr_written)
}

/// Reads a [`DeploymentConfig`] from a file in JSON or Dhall format.
pub fn read_config(path: impl AsRef<Path>) -> Result<DeploymentConfig, Error> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    let config: DeploymentConfig = match path.as_ref().extension().and_then(|ext| ext.to_str()) {
        Some("json") => serde_json::from_str(&contents)?,
        Some("dhall") => serde_dhall::from_str(&contents).parse().map_err(Box::new)?,
        _ => return Err(Error::UnknownFileType(path.as_ref().into())),
    };
    Ok(config)
}

/// Settings that are fixed per deployment rather than per invocation. Every field is optional in
/// the file; missing fields take the defaults below.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DeploymentConfig {
    /// The measurement service URL.
    pub endpoint: Option<String>,
    /// The service's response encoding.
    pub protocol: ProtocolVersion,
    /// The command grammar the batch files use.
    pub grammar: Grammar,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Requests in flight.
    pub concurrency: usize,
    /// Attempts per request, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds. Doubles on each further retry.
    pub backoff_ms: u64,
    /// The channel pool to generate commands over.
    pub channels: Option<Vec<Channel>>,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            protocol: ProtocolVersion::default(),
            grammar: Grammar::default(),
            timeout_ms: 10_000,
            concurrency: 4,
            max_attempts: 1,
            backoff_ms: 500,
            channels: None,
        }
    }
}

/// Error kinds for node lists, configuration and I/O.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Unknown file type.
    #[error("unknown file type: {0}")]
    UnknownFileType(PathBuf),

    /// A node list could not be read.
    #[error("failed to read {path}")]
    Read {
        /// The node list's path.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A node list has no addresses.
    #[error("no nodes in {0}")]
    EmptyNodeList(PathBuf),

    /// A node list line is not an address.
    #[error("line {line_no}: invalid node address {text:?}")]
    InvalidNode {
        /// 1-based line number.
        line_no: usize,
        /// The trimmed line.
        text: String,
    },

    /// Error constructing a node pool.
    #[error("invalid node pool")]
    NodePool(#[from] meshprobe_core::NodePoolError),

    /// Error serializing/deserializing Dhall.
    #[error("Dhall error")]
    Dhall(#[from] Box<serde_dhall::Error>),

    /// Error serializing/deserializing JSON.
    #[error("JSON error")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("IO error")]
    Io(#[from] std::io::Error),
}

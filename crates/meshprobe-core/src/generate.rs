//! This module defines the [`Generator`], which produces a random, size-bounded sample of
//! measurement commands from a node pool and a channel pool.

mod direct;
mod enumerate;

use std::fmt;
use std::str::FromStr;

use rand::prelude::*;

use crate::{
    channel::{self, Channel},
    command::{Command, UnknownVariant},
    node::{Node, NodePool},
};

/// How commands are drawn from the space of valid tuples.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum GenerationPolicy {
    /// Enumerate every tuple, shuffle, and keep the first `count`.
    #[default]
    Shuffle,
    /// Reservoir-sample `count` tuples in one pass over the enumeration, then shuffle them.
    Reservoir,
    /// Draw each command independently: a random pair, a random non-empty path and a random
    /// non-empty subset of channels.
    Direct,
}

impl FromStr for GenerationPolicy {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "shuffle" => Ok(GenerationPolicy::Shuffle),
            "reservoir" => Ok(GenerationPolicy::Reservoir),
            "direct" => Ok(GenerationPolicy::Direct),
            _ => Err(UnknownVariant::new("generation policy", s)),
        }
    }
}

impl fmt::Display for GenerationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GenerationPolicy::Shuffle => "shuffle",
            GenerationPolicy::Reservoir => "reservoir",
            GenerationPolicy::Direct => "direct",
        };
        f.write_str(s)
    }
}

/// Generation options.
#[derive(Debug, Clone, typed_builder::TypedBuilder)]
pub struct GenOpts {
    /// The channel pool.
    #[builder(default = channel::default_channels())]
    pub channels: Vec<Channel>,
    /// Minimum number of intermediate nodes.
    #[builder(default = 0)]
    pub min_path_len: usize,
    /// Maximum number of intermediate nodes.
    #[builder(default = 2)]
    pub max_path_len: usize,
    /// The number of commands wanted.
    #[builder(default = 100)]
    pub count: usize,
    /// Sampling policy.
    #[builder(default)]
    pub policy: GenerationPolicy,
}

/// One point in the enumeration: a single-channel command.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommandTuple {
    /// The source node.
    pub source: Node,
    /// The destination node.
    pub destination: Node,
    /// Intermediate nodes, disjoint from both endpoints.
    pub path: Vec<Node>,
    /// The measurement channel.
    pub channel: Channel,
}

impl From<CommandTuple> for Command {
    fn from(t: CommandTuple) -> Self {
        Command::new(t.source, t.destination, t.path, vec![t.channel])
    }
}

/// A command generator over a fixed node pool.
#[derive(Debug, Clone)]
pub struct Generator {
    pool: NodePool,
    opts: GenOpts,
}

impl Generator {
    /// Creates a generator, validating `opts` against `pool`.
    ///
    /// Correctness properties:
    ///
    /// - The channel pool must not be empty.
    /// - `count` must be positive.
    /// - `min_path_len <= max_path_len`.
    /// - The direct policy needs `max_path_len >= 1` and enough distinct nodes for its shortest
    ///   path, otherwise it could never draw a command.
    ///
    /// A pool too small for `min_path_len` is only a warning under the enumerating policies; some
    /// or all pairs then contribute no tuples.
    pub fn new(pool: NodePool, opts: GenOpts) -> Result<Self, GenerateError> {
        if opts.channels.is_empty() {
            return Err(GenerateError::NoChannels);
        }
        if opts.count == 0 {
            return Err(GenerateError::ZeroCount);
        }
        if opts.max_path_len < opts.min_path_len {
            return Err(GenerateError::InvertedBounds {
                min: opts.min_path_len,
                max: opts.max_path_len,
            });
        }
        let nr_nodes = pool.len();
        if matches!(opts.policy, GenerationPolicy::Direct) {
            if opts.max_path_len == 0 {
                return Err(GenerateError::DirectNeedsPath);
            }
            let required = 2 + direct::shortest(&opts);
            let distinct = pool.nr_distinct();
            if distinct < required {
                return Err(GenerateError::TooFewNodes { required, distinct });
            }
        } else if nr_nodes < 2 + opts.min_path_len {
            log::warn!(
                "Not enough nodes ({}) to satisfy min_path_len ({}). \
                 Some path lengths will not be generated.",
                nr_nodes,
                opts.min_path_len
            );
        }
        Ok(Self { pool, opts })
    }

    /// Lazily enumerates every valid single-channel tuple.
    pub fn tuples(&self) -> impl Iterator<Item = CommandTuple> + '_ {
        enumerate::tuples(&self.pool, &self.opts)
    }

    /// The number of tuples [`Generator::tuples`] yields, computed without enumerating them.
    /// Saturates at `usize::MAX`.
    pub fn enumeration_size(&self) -> usize {
        enumerate::count(&self.pool, &self.opts).unwrap_or(usize::MAX)
    }

    /// Draws a sample of commands according to the configured policy. The result never holds
    /// more than `count` commands, and holds exactly `count` whenever the space of valid tuples
    /// is at least that large.
    pub fn generate<R>(&self, rng: &mut R) -> Vec<Command>
    where
        R: Rng + ?Sized,
    {
        let count = self.opts.count;
        let tuples = match self.opts.policy {
            GenerationPolicy::Shuffle => {
                let mut all = self.tuples().collect::<Vec<_>>();
                log::info!("Enumerated {} candidate commands", all.len());
                all.shuffle(rng);
                all.truncate(count);
                all
            }
            GenerationPolicy::Reservoir => {
                let mut sample = self.tuples().choose_multiple(rng, count);
                // Reservoir order is not uniformly random
                sample.shuffle(rng);
                sample
            }
            GenerationPolicy::Direct => return direct::sample(&self.pool, &self.opts, rng),
        };
        tuples.into_iter().map(Command::from).collect()
    }

    /// Get a reference to the generator's node pool.
    pub fn pool(&self) -> &NodePool {
        &self.pool
    }

    /// Get a reference to the generator's options.
    pub fn opts(&self) -> &GenOpts {
        &self.opts
    }
}

/// Generation configuration error.
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    /// The channel pool is empty.
    #[error("channel pool is empty")]
    NoChannels,

    /// Zero commands were requested.
    #[error("the number of commands must be positive")]
    ZeroCount,

    /// The path length bounds are inverted.
    #[error("max_path_len ({max}) is less than min_path_len ({min})")]
    InvertedBounds {
        /// The minimum path length.
        min: usize,
        /// The maximum path length.
        max: usize,
    },

    /// The direct policy was asked for paths of length zero only.
    #[error("the direct policy needs max_path_len >= 1")]
    DirectNeedsPath,

    /// The pool cannot supply the shortest path the direct policy draws.
    #[error("need at least {required} distinct nodes, found {distinct}")]
    TooFewNodes {
        /// The number of distinct nodes required.
        required: usize,
        /// The number of distinct nodes in the pool.
        distinct: usize,
    },
}

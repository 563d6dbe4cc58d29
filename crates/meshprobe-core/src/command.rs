//! Measurement commands and the line grammars used to exchange them.
//!
//! A command travels between the generator and the dispatcher as one line of text:
//!
//! ```text
//! from <node> to <node> through <node>[,<node>...] channels <int>[,<int>...]
//! ```
//!
//! An empty path renders as an empty string, so a direct command reads
//! `from 10.0.0.1 to 10.0.0.2 through  channels 1`. Older deployments use the
//! [`Grammar::Olsr`] form, which ends in `with olsr <on|off>` instead of a channel list.

use std::fmt;
use std::str::FromStr;

use crate::channel::{self, Channel};
use crate::node::{self, Node};

/// A unit of measurement work: one source, one destination, an ordered path of intermediate
/// nodes and the channels to measure on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Command {
    /// The source node.
    pub from: Node,
    /// The destination node.
    pub to: Node,
    /// Intermediate nodes, in traversal order.
    pub path: Vec<Node>,
    /// Channels in textual order. Duplicates are preserved. Empty for OLSR commands.
    pub channels: Vec<Channel>,
    /// The OLSR flag of a [`Grammar::Olsr`] command.
    pub olsr: Option<bool>,
}

impl Command {
    /// Creates a command measured on each of `channels`.
    pub fn new(from: Node, to: Node, path: Vec<Node>, channels: Vec<Channel>) -> Self {
        Self {
            from,
            to,
            path,
            channels,
            olsr: None,
        }
    }

    /// Creates an OLSR command. The service chooses the channel.
    pub fn with_olsr(from: Node, to: Node, path: Vec<Node>, olsr: bool) -> Self {
        Self {
            from,
            to,
            path,
            channels: Vec::new(),
            olsr: Some(olsr),
        }
    }

    /// Returns the number of intermediate nodes.
    pub fn nr_intermediate(&self) -> usize {
        self.path.len()
    }

    /// Returns the path as a comma-separated list.
    pub fn path_string(&self) -> String {
        node::join(&self.path)
    }

    /// The grammar this command renders in.
    pub fn grammar(&self) -> Grammar {
        match self.olsr {
            Some(_) => Grammar::Olsr,
            None => Grammar::Channels,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "from {} to {} through {} ",
            self.from,
            self.to,
            self.path_string()
        )?;
        match self.olsr {
            Some(olsr) => write!(f, "with olsr {}", if olsr { "on" } else { "off" }),
            None => write!(f, "channels {}", channel::join(&self.channels)),
        }
    }
}

/// The line grammar a deployment has standardized on.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Grammar {
    /// `... channels <int>[,<int>...]`
    #[default]
    Channels,
    /// `... with olsr <on|off>`
    Olsr,
}

impl Grammar {
    /// Parses one line. A line that does not match this grammar exactly yields [`Unparsable`]
    /// carrying the original text; no partial command is ever produced.
    pub fn parse(self, line: &str) -> Result<Command, Unparsable> {
        parse_tokens(self, line).ok_or_else(|| Unparsable::new(line))
    }

    // The keyword that follows the path.
    fn tail_keyword(self) -> &'static str {
        match self {
            Grammar::Channels => "channels",
            Grammar::Olsr => "with",
        }
    }
}

impl FromStr for Grammar {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "channels" => Ok(Grammar::Channels),
            "olsr" => Ok(Grammar::Olsr),
            _ => Err(UnknownVariant::new("grammar", s)),
        }
    }
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Grammar::Channels => f.write_str("channels"),
            Grammar::Olsr => f.write_str("olsr"),
        }
    }
}

fn parse_tokens(grammar: Grammar, line: &str) -> Option<Command> {
    let mut tokens = line.split_whitespace().peekable();
    keyword(&mut tokens, "from")?;
    let from = tokens.next()?.parse().ok()?;
    keyword(&mut tokens, "to")?;
    let to = tokens.next()?.parse().ok()?;
    keyword(&mut tokens, "through")?;
    let next = *tokens.peek()?;
    let path = if next == grammar.tail_keyword() {
        Vec::new()
    } else {
        list(tokens.next()?)?
    };
    let command = match grammar {
        Grammar::Channels => {
            keyword(&mut tokens, "channels")?;
            let token = tokens.next()?;
            // Digits only; `u32::from_str` would also take a sign
            if !token.split(',').all(|s| s.bytes().all(|b| b.is_ascii_digit())) {
                return None;
            }
            let channels = list::<Channel>(token)?;
            if channels.iter().any(|c| c.inner() == 0) {
                return None;
            }
            Command::new(from, to, path, channels)
        }
        Grammar::Olsr => {
            keyword(&mut tokens, "with")?;
            keyword(&mut tokens, "olsr")?;
            let olsr = match tokens.next()? {
                "on" => true,
                "off" => false,
                _ => return None,
            };
            Command::with_olsr(from, to, path, olsr)
        }
    };
    // Trailing garbage rejects the whole line
    tokens.next().is_none().then_some(command)
}

fn keyword<'a>(tokens: &mut impl Iterator<Item = &'a str>, expected: &str) -> Option<()> {
    (tokens.next()? == expected).then_some(())
}

// A comma-separated list with no empty elements.
fn list<T: FromStr>(token: &str) -> Option<Vec<T>> {
    token.split(',').map(|s| s.parse().ok()).collect()
}

/// A line that does not match the configured grammar.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unparsable command: {line:?}")]
pub struct Unparsable {
    /// The offending line, as read.
    pub line: String,
}

impl Unparsable {
    pub(crate) fn new(line: &str) -> Self {
        Self {
            line: line.to_owned(),
        }
    }
}

/// An unrecognized configuration value.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown {kind} `{value}`")]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

impl UnknownVariant {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}

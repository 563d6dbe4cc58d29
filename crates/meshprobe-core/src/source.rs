//! Command sources. The dispatcher pulls commands one at a time, so a file, a terminal and a
//! generator all look the same to it.

use std::io::{self, BufRead, Stdin, StdinLock, Stdout, Write};

use crate::command::{Command, Grammar, Unparsable};

/// The next item from a [`CommandSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Next {
    /// A parsed command.
    Command(Command),
    /// A line that did not parse. The source can still produce more.
    Unparsable(Unparsable),
    /// The source is exhausted.
    EndOfInput,
}

/// A bounded stream of commands.
pub trait CommandSource {
    /// Returns the next command, or [`Next::EndOfInput`] once the source is exhausted.
    fn next_command(&mut self) -> Next;
}

impl<T: CommandSource + ?Sized> CommandSource for &mut T {
    fn next_command(&mut self) -> Next {
        (**self).next_command()
    }
}

impl<T: CommandSource + ?Sized> CommandSource for Box<T> {
    fn next_command(&mut self) -> Next {
        (**self).next_command()
    }
}

/// Reads one command per line, skipping blank lines. A read error is logged and ends the input.
#[derive(Debug)]
pub struct LineSource<R> {
    reader: R,
    grammar: Grammar,
    line_no: usize,
}

impl<R: BufRead> LineSource<R> {
    /// Creates a source reading lines in `grammar` from `reader`.
    pub fn new(reader: R, grammar: Grammar) -> Self {
        Self {
            reader,
            grammar,
            line_no: 0,
        }
    }

    // The next non-blank line, trimmed.
    fn next_line(&mut self) -> Option<String> {
        let mut buf = String::new();
        loop {
            buf.clear();
            match self.reader.read_line(&mut buf) {
                Ok(0) => return None,
                Ok(_) => {
                    self.line_no += 1;
                    let line = buf.trim();
                    if !line.is_empty() {
                        return Some(line.to_owned());
                    }
                }
                Err(e) => {
                    log::error!("Failed to read line {}: {}", self.line_no + 1, e);
                    return None;
                }
            }
        }
    }
}

impl<R: BufRead> CommandSource for LineSource<R> {
    fn next_command(&mut self) -> Next {
        match self.next_line() {
            Some(line) => match self.grammar.parse(&line) {
                Ok(command) => Next::Command(command),
                Err(u) => Next::Unparsable(u),
            },
            None => Next::EndOfInput,
        }
    }
}

/// Reads commands typed at a prompt until an exit sentinel (`exit` or `quit`) or end of input.
#[derive(Debug)]
pub struct Interactive<R, W> {
    lines: LineSource<R>,
    prompt: W,
}

/// The prompt printed before every command.
pub const PROMPT: &str = "command> ";

impl Interactive<StdinLock<'static>, Stdout> {
    /// An interactive source on the process's standard streams.
    pub fn stdio(grammar: Grammar) -> Self {
        let stdin: Stdin = io::stdin();
        Self::new(stdin.lock(), io::stdout(), grammar)
    }
}

impl<R: BufRead, W: Write> Interactive<R, W> {
    /// Creates an interactive source reading from `input` and prompting on `prompt`.
    pub fn new(input: R, prompt: W, grammar: Grammar) -> Self {
        Self {
            lines: LineSource::new(input, grammar),
            prompt,
        }
    }

    fn show_prompt(&mut self) {
        let res = write!(self.prompt, "{PROMPT}").and_then(|_| self.prompt.flush());
        if let Err(e) = res {
            log::debug!("failed to write prompt: {}", e);
        }
    }
}

impl<R: BufRead, W: Write> CommandSource for Interactive<R, W> {
    fn next_command(&mut self) -> Next {
        self.show_prompt();
        match self.lines.next_line() {
            Some(line) if is_sentinel(&line) => Next::EndOfInput,
            Some(line) => match self.lines.grammar.parse(&line) {
                Ok(command) => Next::Command(command),
                Err(u) => Next::Unparsable(u),
            },
            None => Next::EndOfInput,
        }
    }
}

fn is_sentinel(line: &str) -> bool {
    line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit")
}

/// Serves commands from an iterator, for example a generator's output.
#[derive(Debug, derive_new::new)]
pub struct IterSource<I> {
    inner: I,
}

impl<I: Iterator<Item = Command>> CommandSource for IterSource<I> {
    fn next_command(&mut self) -> Next {
        match self.inner.next() {
            Some(command) => Next::Command(command),
            None => Next::EndOfInput,
        }
    }
}

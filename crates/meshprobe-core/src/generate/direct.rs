//! Direct sampling: each command is drawn independently instead of being picked out of a full
//! enumeration. Commands may repeat and may carry several channels.

use std::cmp;

use rand::prelude::*;

use crate::{channel::Channel, command::Command, node::NodePool};

use super::GenOpts;

/// The shortest path the direct policy draws.
pub(super) fn shortest(opts: &GenOpts) -> usize {
    cmp::max(1, opts.min_path_len)
}

/// PRECONDITION: `pool` has at least `2 + shortest(opts)` distinct nodes and
/// `opts.max_path_len >= shortest(opts)`, so every pair of distinct nodes can be completed.
pub(super) fn sample<R>(pool: &NodePool, opts: &GenOpts, rng: &mut R) -> Vec<Command>
where
    R: Rng + ?Sized,
{
    let nodes = pool.as_slice();
    let lo = shortest(opts);
    let mut commands = Vec::with_capacity(opts.count);
    while commands.len() < opts.count {
        let (src, dst) = match nodes.choose_multiple(rng, 2).collect::<Vec<_>>()[..] {
            [&a, &b] if a != b => (a, b),
            // Duplicate addresses; draw again
            _ => continue,
        };
        let remaining = pool.remaining(src, dst);
        let hi = cmp::min(opts.max_path_len, remaining.len());
        if lo > hi {
            continue;
        }
        let len = rng.gen_range(lo..=hi);
        let path = remaining.choose_multiple(rng, len).copied().collect();
        let channels = channel_subset(&opts.channels, rng);
        commands.push(Command::new(src, dst, path, channels));
    }
    commands
}

// A uniformly sized, non-empty subset of `channels` in pool order.
fn channel_subset<R>(channels: &[Channel], rng: &mut R) -> Vec<Channel>
where
    R: Rng + ?Sized,
{
    let k = rng.gen_range(1..=channels.len());
    let mut indices = rand::seq::index::sample(rng, channels.len(), k).into_vec();
    indices.sort_unstable();
    indices.into_iter().map(|i| channels[i]).collect()
}

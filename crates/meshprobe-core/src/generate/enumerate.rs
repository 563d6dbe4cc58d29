//! Exhaustive enumeration of `(source, destination, path, channel)` tuples.

use std::{cmp, iter};

use itertools::{Either, Itertools};

use crate::node::{Node, NodePool};

use super::{CommandTuple, GenOpts};

/// For every ordered pair, every arrangement of `min_path_len..=max_path_len` distinct remaining
/// nodes, and every channel, in that nesting order.
pub(super) fn tuples<'a>(
    pool: &'a NodePool,
    opts: &'a GenOpts,
) -> impl Iterator<Item = CommandTuple> + 'a {
    pool.ordered_pairs().flat_map(move |(src, dst)| {
        let remaining = pool.remaining(src, dst);
        // An empty range yields nothing for this pair
        let max = cmp::min(remaining.len(), opts.max_path_len);
        (opts.min_path_len..=max)
            .flat_map(move |len| arrangements(remaining.clone(), len))
            .flat_map(move |path| {
                opts.channels.iter().map(move |&channel| CommandTuple {
                    source: src,
                    destination: dst,
                    path: path.clone(),
                    channel,
                })
            })
    })
}

fn arrangements(nodes: Vec<Node>, len: usize) -> impl Iterator<Item = Vec<Node>> {
    if len == 0 {
        Either::Left(iter::once(Vec::new()))
    } else {
        Either::Right(nodes.into_iter().permutations(len))
    }
}

/// The size of [`tuples`], as a sum of falling factorials. `None` if it does not fit in a
/// `usize`.
pub(super) fn count(pool: &NodePool, opts: &GenOpts) -> Option<usize> {
    let nr_paths = pool
        .ordered_pairs()
        .try_fold(0usize, |acc, (src, dst)| {
            let n = pool.remaining(src, dst).len();
            let max = cmp::min(n, opts.max_path_len);
            (opts.min_path_len..=max)
                .try_fold(acc, |acc, k| acc.checked_add(falling_factorial(n, k)?))
        })?;
    nr_paths.checked_mul(opts.channels.len())
}

// n! / (n - k)!, the number of ordered arrangements of k out of n. PRECONDITION: k <= n
fn falling_factorial(n: usize, k: usize) -> Option<usize> {
    (n - k + 1..=n).try_fold(1usize, |acc, i| acc.checked_mul(i))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falling_factorial_works() {
        assert_eq!(falling_factorial(4, 0), Some(1));
        assert_eq!(falling_factorial(0, 0), Some(1));
        assert_eq!(falling_factorial(4, 1), Some(4));
        assert_eq!(falling_factorial(4, 2), Some(12));
        assert_eq!(falling_factorial(5, 5), Some(120));
        assert_eq!(falling_factorial(22, 22), None);
    }

    #[test]
    fn arrangements_of_zero_is_one_empty_path() {
        let nodes = crate::testing::pool(3).as_slice().to_vec();
        assert_eq!(arrangements(nodes.clone(), 0).collect::<Vec<_>>(), vec![vec![]]);
        assert_eq!(arrangements(nodes, 2).count(), 6);
    }
}

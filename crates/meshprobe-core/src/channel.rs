//! Radio channel identifiers.

identifier!(Channel, u32);

/// The 2.4 GHz channels 1-13 followed by the usable 5 GHz channels.
pub const DEFAULT_CHANNELS: [u32; 22] = [
    1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 36, 40, 44, 48, 149, 153, 157, 161, 165,
];

/// Returns the default channel pool.
pub fn default_channels() -> Vec<Channel> {
    DEFAULT_CHANNELS.into_iter().map(Channel::new).collect()
}

/// Renders channels as a comma-separated list, preserving order.
pub(crate) fn join(channels: &[Channel]) -> String {
    itertools::join(channels, ",")
}

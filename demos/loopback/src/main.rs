use std::path::PathBuf;

use clap::Parser;
use itertools::Itertools;
use meshprobe::core::{
    Channel, CsvStore, DispatchOpts, Dispatcher, GenOpts, Generator, Grammar, LineSource,
    Measurement, MeasurementRequest, MeasurementService, Node, NodePool, ResultRow, RowSink,
    ServiceError, SinkError,
};
use rand::prelude::*;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Number of mesh nodes
    #[arg(short, long, default_value_t = 6)]
    nr_nodes: u8,

    /// Number of commands
    #[arg(short, long, default_value_t = 200)]
    count: usize,

    /// Maximum number of intermediate nodes
    #[arg(short, long, default_value_t = 2)]
    max_path_len: usize,

    /// A channel whose radio is down
    #[arg(short, long)]
    dead_channel: Option<Channel>,

    /// CSV file results are appended to
    #[arg(long, default_value = "loopback.csv")]
    store: PathBuf,

    /// Random seed
    #[arg(short, long, default_value_t = 0)]
    seed: u64,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    anyhow::ensure!(args.nr_nodes >= 2, "need at least two nodes");

    let mut rng = StdRng::seed_from_u64(args.seed);
    let pool = NodePool::new(
        (1..=args.nr_nodes)
            .map(|i| Node::new([10, 0, 0, i].into()))
            .collect(),
    )?;
    let opts = GenOpts::builder()
        .count(args.count)
        .max_path_len(args.max_path_len)
        .build();
    let generator = Generator::new(pool, opts)?;
    println!(
        "Sampling {} of {} possible commands",
        args.count.min(generator.enumeration_size()),
        generator.enumeration_size()
    );

    // Round-trip through the text format, as a separate dispatch process would
    let text = generator.generate(&mut rng).iter().join("\n");
    let mut source = LineSource::new(text.as_bytes(), Grammar::Channels);

    let service = Airtime {
        dead_channel: args.dead_channel,
    };
    let dispatcher = Dispatcher::new(service, DispatchOpts::default());
    let mut tee = Tee {
        store: CsvStore::new(&args.store),
        rows: Vec::new(),
    };
    let report = dispatcher.run(&mut source, &mut tee)?;
    println!("{report}");

    let by_hops = tee.rows.iter().into_group_map_by(|row| row.nr_intermediate);
    for (hops, rows) in by_hops.into_iter().sorted_by_key(|&(hops, _)| hops) {
        let mean = rows.iter().map(|row| row.throughput).sum::<f64>() / rows.len() as f64;
        println!(
            "{} intermediate node(s): {} rows, mean throughput {:.1} Mbit/s",
            hops,
            rows.len(),
            mean
        );
    }
    println!("Results appended to {}", args.store.display());
    Ok(())
}

/// A stand-in for the measurement service: 802.11g rates on 2.4 GHz channels, 802.11n rates on
/// 5 GHz ones, and every relay halves the airtime left for the flow.
#[derive(Debug)]
struct Airtime {
    dead_channel: Option<Channel>,
}

impl MeasurementService for Airtime {
    fn measure(&self, request: &MeasurementRequest) -> Result<Measurement, ServiceError> {
        let channel = request.wireless_channel.unwrap_or(Channel::new(1));
        if Some(channel) == self.dead_channel {
            return Err(ServiceError::Status {
                code: 503,
                body: format!("radio on channel {channel} is down"),
            });
        }
        let link_rate = if channel.inner() <= 14 { 54.0 } else { 150.0 };
        Ok(Measurement {
            source: request.source,
            destination: request.destination,
            wireless_channel: channel,
            throughput: link_rate / 2f64.powi(request.path.len() as i32),
            timestamp: None,
        })
    }
}

/// Appends to the store and keeps a copy for the summary.
#[derive(Debug)]
struct Tee {
    store: CsvStore,
    rows: Vec<ResultRow>,
}

impl RowSink for Tee {
    fn append(&mut self, row: &ResultRow) -> Result<(), SinkError> {
        self.store.append(row)?;
        self.rows.push(row.clone());
        Ok(())
    }
}

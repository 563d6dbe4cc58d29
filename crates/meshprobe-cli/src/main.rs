use clap::{Parser, Subcommand};
use meshprobe_cli::{DispatchArgs, GenerateArgs};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Sample measurement commands from a node list into a command file
    Generate(GenerateArgs),
    /// Run commands from a batch file, or typed at a prompt, against a measurement service
    Dispatch(DispatchArgs),
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    match args.command {
        Cmd::Generate(args) => {
            let nr_written = meshprobe_cli::generate(&args)?;
            println!("Wrote {} commands to {}", nr_written, args.output.display());
        }
        Cmd::Dispatch(args) => {
            let report = meshprobe_cli::dispatch(&args)?;
            println!("{report}");
        }
    }
    Ok(())
}

#![allow(unexpected_cfgs)]
#![cfg(not(tarpaulin_include))]

mod commands;
mod error;
mod util;
use argh::FromArgs;
use core::error::Error;

#[derive(FromArgs, Debug)]
/// Bit transpose and compress raw files of fixed width elements
struct TopLevel {
    #[argh(subcommand)]
    command: Commands,
}

#[derive(FromArgs, Debug)]
#[argh(subcommand)]
enum Commands {
    Shuffle(commands::shuffle::ShuffleCmd),
    Unshuffle(commands::shuffle::UnshuffleCmd),
    Compress(commands::compress::CompressCmd),
    Decompress(commands::compress::DecompressCmd),
    Info(commands::info::InfoCmd),
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli: TopLevel = argh::from_env();

    match cli.command {
        Commands::Shuffle(cmd) => commands::shuffle::handle_shuffle_command(cmd)?,
        Commands::Unshuffle(cmd) => commands::shuffle::handle_unshuffle_command(cmd)?,
        Commands::Compress(cmd) => commands::compress::handle_compress_command(cmd)?,
        Commands::Decompress(cmd) => commands::compress::handle_decompress_command(cmd)?,
        Commands::Info(cmd) => commands::info::handle_info_command(cmd),
    }

    Ok(())
}

mod convert;
mod dump;
mod info;
mod io;
mod listen;
mod opts;
mod types;
mod utils;

use clap::Parser;
use eyre::Result;
use opts::Opts;

fn main() -> Result<()> {
    color_eyre::install()?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let opts = Opts::parse();

    match opts {
        Opts::Info(args) => {
            crate::info::info(args)?;
        }
        Opts::Dump(args) => {
            crate::dump::dump(args)?;
        }
        Opts::Convert(args) => {
            crate::convert::convert(args)?;
        }
        Opts::Listen(args) => {
            crate::listen::listen(args)?;
        }
    }

    Ok(())
}

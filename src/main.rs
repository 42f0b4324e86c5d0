use std::path::PathBuf;

use clap::Parser;

use chip8_vm::emulator::{DEFAULT_CLOCK_HZ, Emulator, Settings};

/// A CHIP-8 virtual machine with a terminal front end.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Path to the CHIP-8 program image
    rom: PathBuf,

    /// Machine steps per second (60 matches the original timer rate)
    #[arg(long, default_value_t = DEFAULT_CLOCK_HZ)]
    clock: u64,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Args::parse();
    let mut emulator = Emulator::new(Settings {
        clock_hz: args.clock,
        rom: args.rom,
    })?;

    emulator.run()
}

mod cli;
mod config;
mod progress;
mod selector;
mod serial;
mod uart;

use std::process;

use anyhow::Result;
use clap::Parser;
use kboot_lib::info::render_properties;
use kboot_lib::{
    DeviceSession, EraseFlashParams, FillMemoryParams, KBootTool, ReadMemoryParams, ReadOutcome,
    Status, UnlockParams, WriteMemoryParams, WriteOutcome,
};

use crate::cli::{Cli, Commands, merge_config};
use crate::config::KBootConfig;
use crate::progress::create_progress_callback;
use crate::selector::ConsoleSelector;
use crate::serial::SerialTransport;

/// Log level can also be controlled with the RUST_LOG environment variable
/// while `--debug` is 0, e.g. RUST_LOG=kboot_lib=debug
fn init_tracing(debug: u8) {
    let env_filter = match debug {
        0 => tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("off")),
        1 => tracing_subscriber::EnvFilter::new("info"),
        _ => tracing_subscriber::EnvFilter::new("debug"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_status(command: &str, status: Status) {
    println!("\n {} Command Status: {} \n", command, status);
}

fn execute(tool: &mut KBootTool, command: Commands) -> Result<()> {
    match command {
        Commands::Info => {
            let properties = tool.info()?;
            println!("{}", render_properties(&properties));
        }
        Commands::Write(params) => {
            let outcome = tool.write_memory(&WriteMemoryParams {
                address: params.addr,
                offset: params.offset,
                file: params.file,
            })?;
            match outcome {
                WriteOutcome::Written { .. } => print_status("Write", Status::Success),
                WriteOutcome::NothingToWrite => {
                    println!("\n Nothing to write, offset is past the end of the file \n")
                }
            }
        }
        Commands::Read(params) => {
            println!("\n Reading MCU memory, please wait !!! \n");
            let outcome = tool.read_memory(&ReadMemoryParams {
                address: params.addr,
                length: params.length,
                file: params.file,
            })?;
            match outcome {
                ReadOutcome::Dump(dump) => println!("{}", dump),
                ReadOutcome::Saved { path, .. } => {
                    println!("\n Successfully saved into file: {} \n", path.display())
                }
            }
        }
        Commands::Erase(params) => {
            let status = tool.erase_flash(&EraseFlashParams {
                address: params.addr,
                length: params.length,
                mass: params.mass,
            })?;
            print_status("Erase", status);
        }
        Commands::Unlock(params) => {
            let status = tool.unlock(&UnlockParams { key: params.key })?;
            print_status("Unlock", status);
        }
        Commands::Fill(params) => {
            let status = tool.fill_memory(&FillMemoryParams {
                address: params.addr,
                length: params.length,
                pattern: params.pattern,
            })?;
            print_status("Fill", status);
        }
        Commands::Reset => {
            let status = tool.reset()?;
            print_status("Reset", status);
        }
    }
    Ok(())
}

fn run(args: Cli) -> Result<()> {
    let config = args
        .config
        .as_deref()
        .map(KBootConfig::from_file)
        .transpose()?;
    let merged = merge_config(&args, config)?;
    init_tracing(merged.debug);
    tracing::debug!("settings: {:?}", merged);

    let session = DeviceSession::new(
        Box::new(SerialTransport::new(merged.baud)),
        Box::new(ConsoleSelector),
        merged.vid,
        merged.pid,
    );
    let mut tool = KBootTool::new(session, create_progress_callback());
    execute(&mut tool, args.command)
}

fn main() {
    let args = Cli::parse();

    if let Err(e) = run(args) {
        eprintln!("<E> {}", e);
        process::exit(1);
    }
}

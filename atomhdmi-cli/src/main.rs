use std::{
    path::PathBuf,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};

use atomhdmi_gowin::{
    Loader,
    bitstream::{self, Stats},
};
use atomhdmi_io::{
    StdClock, TapController,
    fake_backend::{FakePins, FakeRegisterBus, FakeSerialBus},
};
use atomhdmi_panel::{ColorDepth, Device, PanelConfig, Resolution, TransmitterConfig, timing};
use clap::Parser;
use color_eyre::Result;

use crate::cli_helpers::Size;

mod cli_helpers;

#[derive(clap::Parser)]
struct Args {
    #[command(flatten)]
    global: GlobalOpts,
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Args)]
struct GlobalOpts {
    /// Disable the progress bar
    #[arg(long, global = true)]
    no_progress_bar: bool,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Summarize an encoded configuration image
    Inspect(Inspect),
    /// Run-length encode a raw configuration image
    Pack(Convert),
    /// Expand an encoded configuration image
    Unpack(Convert),
    /// Clock an encoded image into simulated programming pins
    Simulate(Simulate),
    /// Run the power-on sequence against simulated buses
    Bringup(Bringup),
    /// Estimated busy time of a fill or copy
    Estimate(Estimate),
}

impl CliCommand {
    fn streams(&self) -> bool {
        matches!(self, Self::Simulate(_) | Self::Bringup(_))
    }
}

#[derive(clap::Args)]
struct Inspect {
    input_file: PathBuf,
}

#[derive(clap::Args)]
struct Convert {
    input_file: PathBuf,
    output_file: PathBuf,
}

#[derive(clap::Args)]
struct Simulate {
    input_file: PathBuf,

    /// Print the recorded TMS/TDI/TDO waveform
    #[arg(long)]
    waveform: bool,
}

#[derive(clap::Args)]
struct Bringup {
    input_file: PathBuf,

    #[arg(long, default_value_t = 0)]
    rotation: u8,

    /// Requested color depth in bits, rounded to a supported one
    #[arg(long, default_value_t = 16)]
    depth: u8,

    /// Logical resolution to switch to afterwards
    #[arg(long)]
    resolution: Option<Size>,

    /// Keep the simulated transmitter PLL from locking
    #[arg(long)]
    unlocked: bool,
}

#[derive(clap::Args)]
struct Estimate {
    operation: Operation,
    size: Size,

    /// Copy straight to the destination instead of through scratch memory
    #[arg(long)]
    direct: bool,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum Operation {
    Fill,
    Copy,
}

fn main() -> Result<()> {
    init_logging()?;
    let Args { global, command } = Args::parse();

    if global.no_progress_bar || !command.streams() {
        run(command, None, None)?;
    } else {
        let notify = &AtomicUsize::new(0);
        let done = &AtomicBool::new(false);
        let pb = &setup_progress_bar()?;
        std::thread::scope(|s| {
            s.spawn(move || {
                while !done.load(Ordering::Acquire) {
                    pb.set_position(notify.load(Ordering::Acquire) as _);
                    std::thread::sleep(std::time::Duration::from_millis(20));
                }
            });

            let r = run(command, Some(notify), Some(pb));
            done.store(true, Ordering::Release);
            r
        })?;
    }
    Ok(())
}

fn setup_progress_bar() -> Result<indicatif::ProgressBar> {
    let template =
        "{spinner:.green} {elapsed:>3}/{duration:>3} {bar} {bytes}/{total_bytes} ({bytes_per_sec})";
    let style = indicatif::ProgressStyle::with_template(template)?;
    let pb = indicatif::ProgressBar::new(0)
        .with_finish(indicatif::ProgressFinish::Abandon)
        .with_style(style);
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    Ok(pb)
}

fn loader<'a>(
    data: &'a [u8],
    notify: Option<&'a AtomicUsize>,
    pb: Option<&indicatif::ProgressBar>,
) -> Loader<'a> {
    if let Some(pb) = pb {
        pb.set_length(data.len() as _);
    }
    let loader = Loader::new(data);
    match notify {
        Some(notify) => loader.with_notifications(notify),
        None => loader,
    }
}

fn run(
    command: CliCommand,
    notify: Option<&AtomicUsize>,
    pb: Option<&indicatif::ProgressBar>,
) -> Result<()> {
    match command {
        CliCommand::Inspect(args) => {
            let data = std::fs::read(args.input_file)?;
            let stats = Stats::of(&data)?;
            println!("{stats}");
            let image = bitstream::decode(&data)?;
            println!("head: {}", hex::encode(&image[..image.len().min(16)]));
        }
        CliCommand::Pack(args) => {
            let raw = std::fs::read(args.input_file)?;
            let encoded = bitstream::encode(&raw);
            println!("{}", Stats::of(&encoded)?);
            std::fs::write(args.output_file, encoded)?;
        }
        CliCommand::Unpack(args) => {
            let encoded = std::fs::read(args.input_file)?;
            std::fs::write(args.output_file, bitstream::decode(&encoded)?)?;
        }
        CliCommand::Simulate(args) => {
            let data = std::fs::read(args.input_file)?;
            let loader = loader(&data, notify, pb);
            let mut pins = FakePins::new();
            let mut tap = TapController::new(&mut pins)?;
            let report = loader.load(&mut tap, &mut StdClock::new())?;
            drop(tap);

            println!(
                "{} writes, {} bytes, {} clock cycles",
                report.writes,
                report.bytes,
                pins.cycles().len()
            );
            if let Some(offset) = report.truncated_at {
                println!("truncated in the group at offset {offset}");
            }
            if args.waveform {
                println!("{}", pins.consume_waveform());
            }
        }
        CliCommand::Bringup(args) => bringup(args, notify, pb)?,
        CliCommand::Estimate(Estimate {
            operation,
            size: Size { width, height },
            direct,
        }) => {
            let us = match operation {
                Operation::Fill => timing::fill_busy_us(width, height),
                Operation::Copy => timing::copy_busy_us(width, height, direct),
            };
            println!("{us} us");
        }
    }

    Ok(())
}

/// A transmitter that answers with a known ID and, unless `locked` is
/// false, reports a locked PLL.
fn simulated_transmitter(locked: bool) -> FakeRegisterBus {
    let mut regs = FakeRegisterBus::new();
    for (reg, value) in [(0x00, 0x17), (0x01, 0x02), (0x02, 0xe2)] {
        regs.set(0x80, reg, value);
    }
    if locked {
        regs.set(0x82, 0x15, 0x80);
        regs.set(0x82, 0xeb, 0x80);
    }
    regs
}

fn bringup(
    args: Bringup,
    notify: Option<&AtomicUsize>,
    pb: Option<&indicatif::ProgressBar>,
) -> Result<()> {
    let data = std::fs::read(args.input_file)?;
    let config = PanelConfig {
        rotation: args.rotation,
        color_depth: ColorDepth::from_bits(args.depth),
        ..PanelConfig::default()
    };
    let mut device = Device::new(
        FakeSerialBus::new(),
        simulated_transmitter(!args.unlocked),
        StdClock::new(),
        config,
        TransmitterConfig::default(),
    );
    let report = device.init(FakePins::new(), &loader(&data, notify, pb))?;

    if let Some(Size { width, height }) = args.resolution {
        device.panel_mut().set_resolution(Resolution {
            logical_width: width,
            logical_height: height,
            ..Resolution::default()
        })?;
    }

    let chip = report
        .chip_id
        .map(|id| hex::encode_upper(id.0))
        .unwrap_or_else(|| "none".into());
    println!("transmitter: {chip}");
    match &report.transmitter_error {
        None => println!("         pll: locked"),
        Some(e) => println!("         pll: {e}"),
    }
    println!("        fpga: {}", hex::encode_upper(report.fpga_id.to_le_bytes()));
    println!("       image: {} bytes", report.load.bytes);
    let panel = device.panel();
    println!(
        "       panel: {}x{} {}",
        panel.width(),
        panel.height(),
        panel.color_depth()
    );
    Ok(())
}

fn init_logging() -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .with(tracing_error::ErrorLayer::default())
        .init();
    color_eyre::install()?;
    Ok(())
}

//! ordstat - order statistics of a sample file on a GPU

use std::path::PathBuf;

use clap::Parser;
use env_logger::Env;
use log::info;
use ordstat::dataset::{Dataset, DatasetSource, Scale};
use ordstat::error::{Error, Result};
use ordstat::geometry::PaddingPolicy;
use ordstat::kernel::SortKernel;
use ordstat::pipeline::{Pipeline, PipelineConfig};
use ordstat::report::Summary;
use ordstat::runtime::cpu::CpuRuntime;
use ordstat::runtime::wgpu::{WgpuDevice, WgpuRuntime, list_platforms};
use ordstat::runtime::{Device, Runtime, RuntimeClient};

/// Order statistics (min, max, mean, variance, deviation, quartiles) of a
/// sample set, computed with device kernels.
#[derive(Parser, Debug)]
#[command(name = "ordstat", version, about)]
struct Cli {
    /// Platform (backend group) index
    #[arg(short = 'p', long, default_value_t = 0)]
    platform: usize,

    /// Device index within the platform
    #[arg(short = 'd', long, default_value_t = 0)]
    device: usize,

    /// List platforms and devices, then continue
    #[arg(short = 'l', long)]
    list: bool,

    /// Whitespace-delimited record file; the sixth field of each record is sampled
    #[arg(long, default_value = "temp_lincolnshire_short.txt")]
    dataset: PathBuf,

    /// Use the built-in test vector (unscaled) instead of a file
    #[arg(long, conflicts_with = "dataset")]
    test_vector: bool,

    /// Work items per group
    #[arg(short = 'g', long, default_value_t = 64)]
    group_size: usize,

    /// Sort kernel
    #[arg(short = 's', long, value_enum, default_value_t = SortKernel::Selection)]
    sort: SortKernel,

    /// Fixed-point multiplier applied to file samples
    #[arg(long, default_value_t = 10, value_parser = parse_scale)]
    scale: i32,

    /// Padding policy: per-reduction or shared-zero
    #[arg(long, default_value = "per-reduction", value_parser = PaddingPolicy::parse)]
    padding: PaddingPolicy,

    /// Skip timestamp collection
    #[arg(long)]
    no_profiling: bool,

    /// Run on the host reference backend instead of a GPU
    #[arg(long)]
    cpu: bool,
}

fn parse_scale(s: &str) -> std::result::Result<i32, String> {
    let m: i32 = s.parse().map_err(|e| format!("{e}"))?;
    Scale::new(m).map(Scale::multiplier).map_err(|e| e.to_string())
}

fn main() {
    let cli = Cli::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    if cli.list {
        let platforms = list_platforms();
        if platforms.is_empty() {
            println!("No platforms found");
        }
        for platform in platforms {
            print!("{platform}");
        }
    }

    // Failures are reported, not turned into an exit code.
    if let Err(e) = run(&cli) {
        report_error(&e);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = PipelineConfig::default()
        .with_group_size(cli.group_size)
        .with_sort(cli.sort)
        .with_padding(cli.padding)
        .with_scale(Scale::new(cli.scale)?)
        .with_profiling(!cli.no_profiling);
    config.validate()?;

    let source = if cli.test_vector {
        DatasetSource::TestVector
    } else {
        DatasetSource::File(cli.dataset.clone())
    };
    let dataset = source.load(config.scale)?;

    if cli.cpu {
        let client = CpuRuntime::client(&CpuRuntime::default_device())?;
        execute::<CpuRuntime>(&client, config, &dataset)
    } else {
        let client = WgpuRuntime::client(&WgpuDevice::new(cli.platform, cli.device))?;
        println!(
            "Running on platform {}, {}",
            client.device().platform(),
            client.device().adapter_name()
        );
        execute::<WgpuRuntime>(&client, config, &dataset)
    }
}

fn execute<R: Runtime>(
    client: &R::Client,
    config: PipelineConfig,
    dataset: &Dataset,
) -> Result<()> {
    let pipeline = Pipeline::<R>::new(client, config)?;
    info!(
        "Sorting with {} on {}{}",
        config.sort,
        client.device().name(),
        if config.sort.single_group() { ", please wait" } else { "" }
    );

    let result = pipeline.run(dataset)?;
    println!();
    print!("{}", Summary::from_result(&result, config.scale));
    if config.profiling {
        println!();
        print!("{}", result.profiling);
    }
    Ok(())
}

fn report_error(e: &Error) {
    match e.code() {
        Some(code) => eprintln!("ERROR: {e}, {}", code.as_str()),
        None => eprintln!("ERROR: {e}"),
    }
}

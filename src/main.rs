//! Запуск GEMM на каждом найденном OpenCL-устройстве

use anyhow::{Context as _, Result};
use clap::Parser;
use log::{error, info, warn};
use opencl_gemm::config::{Overrides, RunConfig};
use opencl_gemm::matrix::{compare_results, reference_gemm, Comparison};
use opencl_gemm::opencl::list_devices;
use opencl_gemm::utils::{gflops, measure_time};
use opencl_gemm::{Context, Device, Gemm, GemmError, Job, Matrix, OpenCl};
use prettytable::{row, Table};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use std::time::Duration;

/// Compute C = alpha * A * B + beta * C on every OpenCL device
#[derive(Parser)]
#[command(name = "gemm", version)]
struct Cli {
    /// JSON run configuration
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: Overrides,

    /// More log output (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Silence all log output
    #[arg(short, long)]
    quiet: bool,
}

/// Итог запуска на одном устройстве
enum Outcome {
    Done {
        elapsed: Duration,
        check: Option<Comparison>,
    },
    Failed {
        step: &'static str,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    stderrlog::new()
        .module(module_path!())
        .module("opencl_gemm")
        .quiet(cli.quiet)
        .verbosity(usize::from(cli.verbose) + 1)
        .init()?;

    let config = RunConfig::resolve(cli.config.as_deref(), &cli.overrides)?;
    info!("run configuration: {config:?}");

    let api = OpenCl::load()?;
    let devices = list_devices(&api).context("failed to enumerate OpenCL devices")?;
    if devices.is_empty() {
        println!("No OpenCL devices found");
        return Ok(());
    }

    let source = config.kernel_source().load()?;

    let seed = config.seed.unwrap_or_else(|| rand::thread_rng().gen());
    info!("input seed {seed}");
    let mut rng = StdRng::seed_from_u64(seed);
    let a = Matrix::generate(config.fill, config.size, &mut rng).context("failed to generate matrix A")?;
    let mut b = Matrix::generate(config.fill, config.size, &mut rng).context("failed to generate matrix B")?;

    let gemm = Gemm::new(&api, &source).transfer(config.transfer);
    let mut summary = Table::new();
    summary.set_titles(row!["Device", "Status", "Time, s", "GFLOP/s", "Check"]);

    for device in devices {
        let name = device.name(&api).unwrap_or_else(|err| {
            warn!("{err}");
            format!("{:p}", device.raw())
        });
        println!("{name}");

        let outcome = match run_on_device(&api, &gemm, &config, device, &a, &mut b) {
            Ok((elapsed, check)) => Outcome::Done { elapsed, check },
            Err(err) => {
                error!("{name}: {} step failed: {err}", err.step());
                Outcome::Failed { step: err.step() }
            }
        };

        match outcome {
            Outcome::Done { elapsed, check } => {
                let check = match check {
                    Some(c) if c.matches() => format!("ok ({:.2e})", c.max_relative_diff),
                    Some(c) => format!("{} mismatches ({:.2e})", c.mismatches, c.max_relative_diff),
                    None => "-".to_owned(),
                };
                summary.add_row(row![
                    name,
                    "ok",
                    format!("{:.4}", elapsed.as_secs_f64()),
                    format!("{:.2}", gflops(config.size, elapsed)),
                    check
                ]);
            }
            Outcome::Failed { step } => {
                summary.add_row(row![name, format!("{step} failed"), "-", "-", "-"]);
            }
        }
    }

    summary.printstd();
    Ok(())
}

/// Один запуск: контекст, матрица C, замер, при необходимости сверка
fn run_on_device(
    api: &OpenCl,
    gemm: &Gemm<'_, OpenCl>,
    config: &RunConfig,
    device: Device,
    a: &Matrix,
    b: &mut Matrix,
) -> Result<(Duration, Option<Comparison>), GemmError> {
    let context = Context::create(api, device)?;
    let mut c = Matrix::zeroed(config.size)?;
    let initial = config.verify.then(|| c.clone());

    let (result, elapsed) =
        measure_time(|| gemm.dispatch(Job::new(config.alpha, config.beta, a, &mut *b, &mut c, &context)));
    result?;
    println!("GEMM in {}s", elapsed.as_secs_f64());

    let check = initial.map(|mut expected| {
        reference_gemm(config.alpha, config.beta, a, b, &mut expected);
        compare_results(&c, &expected, config.tolerance)
    });
    Ok((elapsed, check))
}

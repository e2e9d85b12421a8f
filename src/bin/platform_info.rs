//! Печать сведений о платформах и устройствах OpenCL

use anyhow::{Context, Result};
use clap::Parser;
use opencl_gemm::opencl::info;
use opencl_gemm::OpenCl;

/// Print OpenCL platforms and their devices
#[derive(Parser)]
#[command(name = "platform_info", version)]
struct Cli {
    /// More log output (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    stderrlog::new()
        .module(module_path!())
        .module("opencl_gemm")
        .verbosity(usize::from(cli.verbose) + 1)
        .init()?;

    let api = OpenCl::load()?;
    let reports = info::collect(&api).context("failed to query OpenCL platforms")?;
    if reports.is_empty() {
        println!("No OpenCL platforms found");
        return Ok(());
    }

    for (index, report) in reports.iter().enumerate() {
        println!("Platform #{index}");
        report.table().printstd();
        for (device_index, device) in report.devices.iter().enumerate() {
            println!("  Device #{device_index}");
            device.table().printstd();
        }
        println!();
    }
    Ok(())
}

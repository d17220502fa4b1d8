use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use clap::Parser;
use setblocksize_rs::{
    cfg::{cli::Cli, logger::init_logger},
    client::sg_device::SgChannel,
    control_block::inquiry::DeviceIdentity,
    state_machine::{
        common::{ConfirmGate, StateMachineCtx},
        format_states::FormatCtx,
    },
};
use tokio::{main, task};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Interactive gate: print what the device says it is and ask on stdin.
struct StdinConfirm {
    assume_yes: bool,
}

impl ConfirmGate for StdinConfirm {
    async fn confirm(&mut self, identity: &DeviceIdentity) -> Result<bool> {
        println!("{}", "=".repeat(79));
        if let Some(addr) = identity.address {
            println!("SCSI ID     : {}", addr.scsi_id);
            println!("LUN         : {}", addr.lun);
            println!("Connected to: Host{} / Channel{}", addr.host_no, addr.channel);
        }
        println!("Manufacturer: {}", identity.manufacturer);
        println!("Model       : {}", identity.model);
        println!("Device type : {}", identity.device_type);
        println!("{}", "=".repeat(79));

        if self.assume_yes {
            warn!("confirmation skipped on request (--assume-yes)");
            return Ok(true);
        }

        print!("Do you really want to reformat this device [y/n]? ");
        io::stdout().flush()?;
        let line = task::spawn_blocking(|| {
            let mut line = String::new();
            io::stdin().lock().read_line(&mut line)?;
            Ok::<_, io::Error>(line)
        })
        .await
        .context("confirmation prompt failed")??;

        Ok(line.trim().eq_ignore_ascii_case("y"))
    }
}

#[main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = init_logger(cli.logger_config.as_deref())?;

    let config = cli.merged_config()?;
    info!(
        block_size = config.format.block_size,
        timeout_minutes = config.format.timeout_minutes,
        device = %cli.device.display(),
        "setblocksize starting"
    );

    let mut chan = SgChannel::open(&cli.device).with_context(|| {
        format!(
            "failed to open {} (root permissions? sg passthrough node?)",
            cli.device.display()
        )
    })?;

    let cancel = CancellationToken::new();
    let mut ctx = FormatCtx::new(
        &mut chan,
        StdinConfirm {
            assume_yes: cli.assume_yes,
        },
        config.format.block_size,
        config.format_timeout(),
    );

    let report = ctx.execute(&cancel).await?;
    info!(
        manufacturer = %report.identity.manufacturer,
        model = %report.identity.model,
        stages = report.outcomes.len(),
        "device reformatted"
    );

    Ok(())
}

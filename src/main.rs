use std::{env, io, process};

use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;
use vend_ctl::blinker::spawn_idle_blinker;
use vend_ctl::csv::{machine_report, read_script, write_report};
use vend_ctl::log::{EventLog, FileLog, TracingLog};
use vend_ctl::sim::{SimMachine, settle};
use vend_ctl::{Controller, ControllerConfig};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("warn".parse().unwrap()))
        .with_writer(std::io::stderr)
        .init();

    let path = env::args().nth(1).expect("usage: vend-ctl <script.csv>");

    if !path.ends_with(".csv") {
        warn!(path, "input file seems to not be a csv file");
    }

    let config = ControllerConfig::from_env();
    let log: Box<dyn EventLog> = match &config.event_log {
        Some(file) => match FileLog::open(file) {
            Ok(log) => Box::new(log),
            Err(e) => {
                warn!(path = %file.display(), reason = %e, "cannot open event log, using tracing");
                Box::new(TracingLog)
            }
        },
        None => Box::new(TracingLog),
    };

    let commands = match read_script(path.clone()) {
        Ok(commands) => commands,
        Err(e) => {
            error!("{e}");
            process::exit(1);
        }
    };

    let sim = SimMachine::standard();
    let display = sim.display_handle();
    let mut controller = match Controller::new(sim, log, config.clone()) {
        Ok(controller) => controller,
        Err(e) => {
            error!("{e}");
            process::exit(1);
        }
    };
    controller.hardware_mut().power_on();
    settle(&mut controller).await;

    let blinker = config
        .blink_enabled
        .then(|| spawn_idle_blinker(controller.subscribe_status(), display, &config));

    let (cmd_sender, cmd_receiver) = tokio::sync::mpsc::channel(16);

    tokio::spawn(async move {
        for result in commands {
            match result {
                Ok(command) => {
                    if cmd_sender.send(command).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("{e}");
                }
            }
        }
    });

    let mut commands = ReceiverStream::new(cmd_receiver);
    while let Some(command) = commands.next().await {
        if let Err(e) = controller.hardware_mut().execute(&command) {
            warn!(?command, "{e}");
        }
        settle(&mut controller).await;
    }

    controller.finish().await;
    if let Some(blinker) = blinker {
        blinker.abort();
    }

    if let Err(e) = write_report(io::stdout().lock(), machine_report(&controller)) {
        error!("failed to write report: {e}");
        process::exit(1);
    }
}

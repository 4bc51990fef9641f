//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

mod config;

use clap::{App, Arg};
use config::{Config, LoggingFileRotation, LoggingFmtStyle};
use ospf6ac::event_recorder::EventRecorder;
use ospf6ac::instance::{
    Instance, InstanceChannelsRx, InstanceChannelsTx, InstanceMsg,
};
use ospf6ac::northbound::NbMsg;
use ospf6ac::tasks::messages::ProtocolOutputMsg;
use ospf6ac::tasks::messages::input::OspfMsg;
use ospf6ac_utils::ibus::{IbusChannelsTx, IbusMsg};
use ospf6ac_utils::{UnboundedReceiver, UnboundedSender};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::mpsc;
use tracing::level_filters::LevelFilter;
use tracing::{error, info, warn};
use tracing_appender::rolling;
use tracing_subscriber::Layer;
use tracing_subscriber::prelude::*;

// Message written to standard output.
#[derive(Debug, Serialize)]
enum OutputMsg {
    // Request to the OSPFv3 collaborator, or reply to an operator request.
    Protocol(ProtocolOutputMsg),
    // Request to the address plane.
    Ibus(IbusMsg),
}

// Senders feeding the instance with the messages read from standard input.
struct InputChannelsTx {
    nb: UnboundedSender<NbMsg>,
    ibus: UnboundedSender<IbusMsg>,
    ospf: UnboundedSender<OspfMsg>,
}

fn init_tracing(config: &config::Logging) {
    // Enable logging to journald.
    let journald = config.journald.enabled.then(|| {
        tracing_journald::layer().expect("couldn't connect to journald")
    });

    // Enable logging to a file.
    let file = config.file.enabled.then(|| {
        let file_appender = match config.file.rotation {
            LoggingFileRotation::Never => {
                rolling::never(&config.file.dir, &config.file.name)
            }
            LoggingFileRotation::Hourly => {
                rolling::hourly(&config.file.dir, &config.file.name)
            }
            LoggingFileRotation::Daily => {
                rolling::daily(&config.file.dir, &config.file.name)
            }
        };

        let log_level_filter = LevelFilter::from_level(tracing::Level::TRACE);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(file_appender)
            .with_target(false)
            .with_thread_ids(config.file.fmt.show_thread_id)
            .with_file(config.file.fmt.show_source)
            .with_line_number(config.file.fmt.show_source)
            .with_ansi(config.file.fmt.colors);
        let layer = match config.file.fmt.style {
            LoggingFmtStyle::Compact => layer.compact().boxed(),
            LoggingFmtStyle::Full => layer.boxed(),
            LoggingFmtStyle::Json => layer.json().boxed(),
            LoggingFmtStyle::Pretty => layer.pretty().boxed(),
        };
        layer.with_filter(log_level_filter)
    });

    // Enable logging to stderr.
    let stderr = config.stderr.enabled.then(|| {
        let log_level_filter = LevelFilter::from_level(tracing::Level::TRACE);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_ids(config.stderr.fmt.show_thread_id)
            .with_file(config.stderr.fmt.show_source)
            .with_line_number(config.stderr.fmt.show_source)
            .with_ansi(config.stderr.fmt.colors);
        let layer = match config.stderr.fmt.style {
            LoggingFmtStyle::Compact => layer.compact().boxed(),
            LoggingFmtStyle::Full => layer.boxed(),
            LoggingFmtStyle::Json => layer.json().boxed(),
            LoggingFmtStyle::Pretty => layer.pretty().boxed(),
        };
        layer.with_filter(log_level_filter)
    });

    let env_filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive("ospf6ac=debug".parse().unwrap())
        .from_env_lossy();
    tracing_subscriber::registry()
        .with(env_filter)
        .with(journald)
        .with(file)
        .with(stderr)
        .init();
}

fn signal_listener() -> mpsc::Receiver<()> {
    let (signal_tx, signal_rx) = mpsc::channel(1);

    tokio::task::spawn(async move {
        let mut sigint = signal(SignalKind::interrupt()).unwrap();
        let mut sigterm = signal(SignalKind::terminate()).unwrap();

        tokio::select! {
            _ = sigint.recv() => {
                info!("received SIGINT");
                let _ = signal_tx.send(()).await;
            },
            _ = sigterm.recv() => {
                info!("received SIGTERM");
                let _ = signal_tx.send(()).await;
            }
        }
    });

    signal_rx
}

// Reads instance messages from standard input, one JSON object per line.
// Timer messages are generated internally and aren't accepted.
async fn input_task(tx: InputChannelsTx) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(error) => {
                error!(%error, "failed to read standard input");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let msg = match serde_json::from_str::<InstanceMsg>(&line) {
            Ok(msg) => msg,
            Err(error) => {
                warn!(%error, "failed to parse instance message");
                continue;
            }
        };
        let sent = match msg {
            InstanceMsg::Northbound(msg) => tx.nb.send(msg).is_ok(),
            InstanceMsg::Ibus(msg) => tx.ibus.send(msg).is_ok(),
            InstanceMsg::Ospf(msg) => tx.ospf.send(msg).is_ok(),
            InstanceMsg::Protocol(_) => {
                warn!("ignoring protocol message");
                true
            }
        };
        if !sent {
            break;
        }
    }
}

// Writes the instance output messages to standard output, one JSON object
// per line.
async fn output_task(
    mut protocol_output_rx: UnboundedReceiver<ProtocolOutputMsg>,
    mut ibus_output_rx: UnboundedReceiver<IbusMsg>,
) {
    loop {
        let msg = tokio::select! {
            Some(msg) = protocol_output_rx.recv() => OutputMsg::Protocol(msg),
            Some(msg) = ibus_output_rx.recv() => OutputMsg::Ibus(msg),
            else => break,
        };
        output(&msg);
    }
}

fn output(msg: &OutputMsg) {
    match serde_json::to_string(msg) {
        Ok(line) => println!("{line}"),
        Err(error) => warn!(%error, "failed to serialize output message"),
    }
}

// Runs the instance until standard input is closed or a termination signal
// is received.
async fn run(config: Config) {
    let (nb_tx, nb_rx) = mpsc::unbounded_channel();
    let (ibus_tx, ibus_rx) = mpsc::unbounded_channel();
    let (ospf_tx, ospf_rx) = mpsc::unbounded_channel();
    let (ibus_output_tx, ibus_output_rx) = mpsc::unbounded_channel();
    let (protocol_output_tx, protocol_output_rx) = mpsc::unbounded_channel();
    let (protocol_input_tx, protocol_input_rx) =
        Instance::protocol_input_channels();

    let channels_tx = InstanceChannelsTx {
        ibus: IbusChannelsTx::new(ibus_output_tx),
        protocol_input: protocol_input_tx,
        protocol_output: protocol_output_tx,
    };
    let channels_rx = InstanceChannelsRx {
        nb: nb_rx,
        ibus: ibus_rx,
        ospf: ospf_rx,
        protocol_input: protocol_input_rx,
    };
    let event_recorder = EventRecorder::new(&config.event_recorder);
    let instance = Instance::new(config.instance, channels_tx);

    // Spawn input and output tasks.
    let input_tx = InputChannelsTx {
        nb: nb_tx,
        ibus: ibus_tx,
        ospf: ospf_tx,
    };
    let input = tokio::task::spawn(input_task(input_tx));
    let output =
        tokio::task::spawn(output_task(protocol_output_rx, ibus_output_rx));

    // The instance stops once the northbound channel is closed.
    let mut signal_rx = signal_listener();
    let mut instance =
        tokio::task::spawn(instance.run(channels_rx, event_recorder));
    tokio::select! {
        _ = &mut instance => {}
        _ = signal_rx.recv() => {
            input.abort();
            let _ = instance.await;
        }
    }

    // Flush pending output messages.
    let _ = output.await;
}

// Replays a file of recorded instance messages.
async fn replay(config: Config, filename: &str) {
    let (ibus_output_tx, mut ibus_output_rx) = mpsc::unbounded_channel();
    let (protocol_output_tx, mut protocol_output_rx) =
        mpsc::unbounded_channel();
    // Timers are driven by the recorded messages.
    let (protocol_input_tx, _protocol_input_rx) =
        Instance::protocol_input_channels();

    let channels_tx = InstanceChannelsTx {
        ibus: IbusChannelsTx::new(ibus_output_tx),
        protocol_input: protocol_input_tx,
        protocol_output: protocol_output_tx,
    };
    let mut instance = Instance::new(config.instance, channels_tx);

    let data = match std::fs::read_to_string(filename) {
        Ok(data) => data,
        Err(error) => {
            error!(%filename, %error, "failed to read record file");
            std::process::exit(1);
        }
    };
    for line in data.lines().filter(|line| !line.trim().is_empty()) {
        match serde_json::from_str::<InstanceMsg>(line) {
            Ok(msg) => instance.process_msg(msg),
            Err(error) => {
                warn!(%error, "failed to parse instance message");
            }
        }

        while let Ok(msg) = protocol_output_rx.try_recv() {
            output(&OutputMsg::Protocol(msg));
        }
        while let Ok(msg) = ibus_output_rx.try_recv() {
            output(&OutputMsg::Ibus(msg));
        }
    }
}

// ===== main =====

fn main() {
    // Parse command-line parameters.
    let matches = App::new("OSPFv3 autoconfiguration daemon")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("file")
                .help("Specify an alternative configuration file."),
        )
        .arg(
            Arg::with_name("replay")
                .long("replay")
                .value_name("file")
                .help("Replay events from a record file and exit."),
        )
        .get_matches();

    // Read configuration file.
    let config_file = matches.value_of("config");
    let config = Config::load(config_file);

    // Initialize tracing.
    init_tracing(&config.logging);

    // We're ready to go!
    info!("starting up");

    // Main loop.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to create async runtime");
    match matches.value_of("replay") {
        Some(filename) => runtime.block_on(replay(config, filename)),
        None => runtime.block_on(run(config)),
    }

    info!("exiting");
}

use std::sync::mpsc::Receiver;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rflink_datagram::{
    delivery_channel, DatagramConfig, Delivery, LinkTelemetry, Manager, PollEvent, SendOutcome,
    StopHandle,
};
use rflink_radio::{Ether, EtherConfig, FaultPlan, Mode, SimRadio, Transceiver};
use tracing::{info, warn};

use crate::cmd::{parse_duration, SimulateArgs};
use crate::exit::{
    datagram_error, radio_error, CliError, CliResult, FAILURE, INTERNAL, SUCCESS, TIMEOUT, USAGE,
};
use crate::output::{
    print_simulation, DeliveryRecord, NodeTelemetry, OutputFormat, SendRecord, SimulationReport,
};

const REPLY: &[u8] = b"And hello back to you";
const SERVER_POLL: Duration = Duration::from_millis(50);
const SNIFFER_CAPACITY: usize = 256;

struct NodeReport {
    address: u8,
    telemetry: LinkTelemetry,
    deliveries: Vec<Delivery>,
}

#[derive(Default)]
struct ClientReport {
    sends: Vec<SendRecord>,
    replies: Vec<Delivery>,
    missing_replies: u32,
}

pub fn run(args: SimulateArgs, format: OutputFormat) -> CliResult<i32> {
    let ack_timeout = parse_duration(&args.ack_timeout)?;
    let interval = parse_duration(&args.interval)?;
    let reply_timeout = parse_duration(&args.reply_timeout)?;
    let frame = args.frame.to_config()?;

    if args.server == args.client {
        return Err(CliError::new(USAGE, "server and client addresses must differ"));
    }
    if args
        .sniffer
        .is_some_and(|sniffer| sniffer == args.server || sniffer == args.client)
    {
        return Err(CliError::new(USAGE, "sniffer address must differ from server and client"));
    }

    let ether = Ether::with_config(EtherConfig {
        faults: FaultPlan {
            drop_every: args.drop_every,
            corrupt_every: args.corrupt_every,
            ..FaultPlan::default()
        },
        ..EtherConfig::default()
    });
    let node_config = |address: u8| {
        DatagramConfig::new(address)
            .with_retries(args.retries, ack_timeout)
            .with_frame(frame.clone())
    };

    // Every node is brought up before any traffic; a failed init aborts the run.
    let server = start_node(&ether, node_config(args.server), "server")?;
    let mut client = start_node(&ether, node_config(args.client), "client")?;
    let sniffer = match args.sniffer {
        Some(address) => {
            let (tx, rx) = delivery_channel(SNIFFER_CAPACITY);
            let node = start_node(&ether, node_config(address).with_promiscuous(true), "sniffer")?
                .with_delivery_sender(tx);
            Some((node, rx))
        }
        None => None,
    };

    let stop = StopHandle::new();
    install_ctrlc_handler(stop.clone())?;

    let server_handle = spawn_node("server", {
        let stop = stop.clone();
        let reply = args.reply;
        move || serve(server, &stop, reply)
    })?;
    let sniffer_handle = match sniffer {
        Some((node, rx)) => {
            let stop = stop.clone();
            Some(spawn_node("sniffer", move || sniff(node, rx, &stop))?)
        }
        None => None,
    };

    info!(
        client = args.client,
        server = args.server,
        count = args.count,
        "simulation started"
    );
    let client_result = drive_client(&mut client, &args, interval, reply_timeout, &stop);
    let interrupted = stop.is_stopped();
    stop.stop();

    let server_report = join_node("server", server_handle);
    let sniffer_report = sniffer_handle.map(|handle| join_node("sniffer", handle));
    let client_report = client_result.map_err(|err| datagram_error("client failed", err))?;
    let server_report = server_report?;
    let sniffer_report = sniffer_report.transpose()?;

    client
        .radio_mut()
        .set_mode(Mode::Idle)
        .map_err(|err| radio_error("client shutdown failed", err))?;

    let mut report = SimulationReport::new(ether.stats());
    report.interrupted = interrupted;
    report.sends = client_report.sends;
    report.deliveries.extend(
        server_report
            .deliveries
            .iter()
            .map(|d| DeliveryRecord::new("server", d)),
    );
    report.deliveries.extend(
        client_report
            .replies
            .iter()
            .map(|d| DeliveryRecord::new("client", d)),
    );
    report.nodes.push(NodeTelemetry {
        node: "client",
        address: client.address(),
        telemetry: client.telemetry().clone(),
    });
    report.nodes.push(NodeTelemetry {
        node: "server",
        address: server_report.address,
        telemetry: server_report.telemetry,
    });
    if let Some(sniffer) = sniffer_report {
        report.deliveries.extend(
            sniffer
                .deliveries
                .iter()
                .map(|d| DeliveryRecord::new("sniffer", d)),
        );
        report.nodes.push(NodeTelemetry {
            node: "sniffer",
            address: sniffer.address,
            telemetry: sniffer.telemetry,
        });
    }

    print_simulation(&report, format);

    let failed = report.sends.iter().filter(|s| s.outcome == "failed").count();
    if failed > 0 {
        warn!(failed, "some datagrams were never acknowledged");
        return Ok(FAILURE);
    }
    if client_report.missing_replies > 0 {
        warn!(missing = client_report.missing_replies, "some replies never arrived");
        return Ok(TIMEOUT);
    }
    Ok(SUCCESS)
}

fn start_node(
    ether: &Ether,
    config: DatagramConfig,
    role: &str,
) -> CliResult<Manager<SimRadio>> {
    Manager::new(ether.attach(), config)
        .map_err(|err| datagram_error(&format!("{role} startup failed"), err))
}

fn drive_client(
    client: &mut Manager<SimRadio>,
    args: &SimulateArgs,
    interval: Duration,
    reply_timeout: Duration,
    stop: &StopHandle,
) -> rflink_datagram::Result<ClientReport> {
    let mut report = ClientReport::default();

    for seq in 1..=args.count {
        if stop.is_stopped() {
            break;
        }

        let outcome = client.send_reliable(args.server, args.data.as_bytes())?;
        report.sends.push(send_record(seq, args.server, &outcome));

        if args.reply && outcome.is_acked() {
            match client.recv_timeout(reply_timeout)? {
                Some(reply) => {
                    info!(from = reply.from, id = reply.id, rssi = reply.rssi, "reply received");
                    report.replies.push(reply);
                }
                None => {
                    warn!(seq, "no reply from server");
                    report.missing_replies += 1;
                }
            }
        }

        if seq < args.count {
            thread::sleep(interval);
        }
    }
    Ok(report)
}

fn serve(
    mut server: Manager<SimRadio>,
    stop: &StopHandle,
    reply: bool,
) -> rflink_datagram::Result<NodeReport> {
    let mut deliveries = Vec::new();

    while !stop.is_stopped() {
        let Some(delivery) = server.recv_timeout(SERVER_POLL)? else {
            continue;
        };
        info!(
            from = delivery.from,
            id = delivery.id,
            rssi = delivery.rssi,
            len = delivery.payload.len(),
            "datagram received"
        );
        if reply {
            let outcome = server.send_reliable(delivery.from, REPLY)?;
            if !outcome.is_acked() {
                warn!(to = delivery.from, id = outcome.id(), "reply not acknowledged");
            }
        }
        deliveries.push(delivery);
    }

    server.radio_mut().set_mode(Mode::Idle)?;
    Ok(NodeReport {
        address: server.address(),
        telemetry: server.telemetry().clone(),
        deliveries,
    })
}

fn sniff(
    mut sniffer: Manager<SimRadio>,
    deliveries: Receiver<Delivery>,
    stop: &StopHandle,
) -> rflink_datagram::Result<NodeReport> {
    sniffer.run(stop)?;
    // Frames already in the FIFO when the stop arrived still count.
    while sniffer.poll()? != PollEvent::Idle {}
    sniffer.radio_mut().set_mode(Mode::Idle)?;
    Ok(NodeReport {
        address: sniffer.address(),
        telemetry: sniffer.telemetry().clone(),
        deliveries: deliveries.try_iter().collect(),
    })
}

fn send_record(seq: u32, to: u8, outcome: &SendOutcome) -> SendRecord {
    let (label, attempts, elapsed) = match *outcome {
        SendOutcome::Acked {
            attempts, elapsed, ..
        } => ("acked", attempts, elapsed),
        SendOutcome::Failed {
            attempts, elapsed, ..
        } => ("failed", attempts, elapsed),
        SendOutcome::Broadcast { .. } => ("broadcast", 1, Duration::ZERO),
    };
    SendRecord {
        seq,
        to,
        id: outcome.id(),
        outcome: label,
        attempts,
        elapsed_ms: elapsed.as_millis() as u64,
    }
}

fn spawn_node<F>(name: &str, body: F) -> CliResult<JoinHandle<rflink_datagram::Result<NodeReport>>>
where
    F: FnOnce() -> rflink_datagram::Result<NodeReport> + Send + 'static,
{
    thread::Builder::new()
        .name(name.to_string())
        .spawn(body)
        .map_err(|err| CliError::new(INTERNAL, format!("failed to start {name} node: {err}")))
}

fn join_node(
    name: &str,
    handle: JoinHandle<rflink_datagram::Result<NodeReport>>,
) -> CliResult<NodeReport> {
    match handle.join() {
        Ok(Ok(report)) => Ok(report),
        Ok(Err(err)) => Err(datagram_error(&format!("{name} node failed"), err)),
        Err(_) => Err(CliError::new(INTERNAL, format!("{name} node panicked"))),
    }
}

fn install_ctrlc_handler(stop: StopHandle) -> CliResult<()> {
    ctrlc::set_handler(move || stop.stop()).map_err(|err| {
        CliError::new(INTERNAL, format!("signal handler setup failed: {err}"))
    })
}

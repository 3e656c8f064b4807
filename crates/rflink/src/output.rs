use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use rflink_datagram::{Delivery, LinkTelemetry};
use rflink_frame::{flags, Frame};
use rflink_radio::EtherStats;
use serde::Serialize;

const FRAME_ENCODED_SCHEMA: &str =
    "https://schemas.3leaps.dev/rflink/cli/v1/frame-encoded.schema.json";
const FRAME_DECODED_SCHEMA: &str =
    "https://schemas.3leaps.dev/rflink/cli/v1/frame-decoded.schema.json";
const SIMULATION_SCHEMA: &str =
    "https://schemas.3leaps.dev/rflink/cli/v1/simulation-report.schema.json";

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct FrameOutput {
    schema_id: &'static str,
    to: u8,
    from: u8,
    id: u8,
    flags: u8,
    flag_names: String,
    broadcast: bool,
    payload_size: usize,
    payload: String,
    wire_size: usize,
    hex: String,
}

impl FrameOutput {
    fn new(schema_id: &'static str, frame: &Frame, wire: &[u8]) -> Self {
        let header = frame.header;
        Self {
            schema_id,
            to: header.to,
            from: header.from,
            id: header.id,
            flags: header.flags,
            flag_names: flags::describe(header.flags),
            broadcast: header.is_broadcast(),
            payload_size: frame.payload.len(),
            payload: payload_preview(&frame.payload),
            wire_size: wire.len(),
            hex: to_hex(wire),
        }
    }

    fn rows(&self) -> Vec<(&'static str, String)> {
        vec![
            ("TO", address_label(self.to)),
            ("FROM", self.from.to_string()),
            ("ID", self.id.to_string()),
            ("FLAGS", format!("0x{:02X} {}", self.flags, self.flag_names)),
            ("PAYLOAD", self.payload.clone()),
            ("SIZE", self.payload_size.to_string()),
            ("WIRE", self.hex.clone()),
        ]
    }
}

/// Print a frame built by `encode`. Raw output is the wire bytes.
pub fn print_encoded(frame: &Frame, wire: &[u8], format: OutputFormat) {
    let out = FrameOutput::new(FRAME_ENCODED_SCHEMA, frame, wire);
    match format {
        OutputFormat::Raw => print_raw(wire),
        OutputFormat::Pretty => println!("{}", out.hex),
        _ => print_frame_output(&out, format),
    }
}

/// Print a frame recovered by `decode`. Raw output is the payload.
pub fn print_decoded(frame: &Frame, wire: &[u8], format: OutputFormat) {
    let out = FrameOutput::new(FRAME_DECODED_SCHEMA, frame, wire);
    match format {
        OutputFormat::Raw => print_raw(&frame.payload),
        _ => print_frame_output(&out, format),
    }
}

fn print_frame_output(out: &FrameOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "VALUE"]);
            for (field, value) in out.rows() {
                table.add_row(vec![field.to_string(), value]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "to={} from={} id={} flags={} size={} payload={}",
                address_label(out.to),
                out.from,
                out.id,
                out.flag_names,
                out.payload_size,
                out.payload
            );
        }
        OutputFormat::Raw => {}
    }
}

/// One reliable send made by the simulated client.
#[derive(Debug, Serialize)]
pub struct SendRecord {
    pub seq: u32,
    pub to: u8,
    pub id: u8,
    pub outcome: &'static str,
    pub attempts: u32,
    pub elapsed_ms: u64,
}

/// One datagram handed to a simulated node's application.
#[derive(Debug, Serialize)]
pub struct DeliveryRecord {
    pub node: &'static str,
    pub from: u8,
    pub to: u8,
    pub id: u8,
    pub flags: String,
    pub rssi: i16,
    pub payload: String,
}

impl DeliveryRecord {
    pub fn new(node: &'static str, delivery: &Delivery) -> Self {
        Self {
            node,
            from: delivery.from,
            to: delivery.to,
            id: delivery.id,
            flags: flags::describe(delivery.flags),
            rssi: delivery.rssi,
            payload: payload_preview(&delivery.payload),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct NodeTelemetry {
    pub node: &'static str,
    pub address: u8,
    #[serde(flatten)]
    pub telemetry: LinkTelemetry,
}

#[derive(Debug, Serialize)]
pub struct MediumStats {
    pub transmissions: u64,
    pub delivered: u64,
    pub dropped: u64,
    pub corrupted: u64,
    pub overflowed: u64,
}

impl From<EtherStats> for MediumStats {
    fn from(stats: EtherStats) -> Self {
        Self {
            transmissions: stats.transmissions,
            delivered: stats.delivered,
            dropped: stats.dropped,
            corrupted: stats.corrupted,
            overflowed: stats.overflowed,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SimulationReport {
    pub schema_id: &'static str,
    pub interrupted: bool,
    pub sends: Vec<SendRecord>,
    pub deliveries: Vec<DeliveryRecord>,
    pub nodes: Vec<NodeTelemetry>,
    pub medium: MediumStats,
}

impl SimulationReport {
    pub fn new(medium: EtherStats) -> Self {
        Self {
            schema_id: SIMULATION_SCHEMA,
            interrupted: false,
            sends: Vec::new(),
            deliveries: Vec::new(),
            nodes: Vec::new(),
            medium: medium.into(),
        }
    }
}

pub fn print_simulation(report: &SimulationReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(report),
        OutputFormat::Table => {
            let mut sends = Table::new();
            sends
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["SEQ", "TO", "ID", "OUTCOME", "ATTEMPTS", "ELAPSED"]);
            for send in &report.sends {
                sends.add_row(vec![
                    send.seq.to_string(),
                    address_label(send.to),
                    send.id.to_string(),
                    send.outcome.to_string(),
                    send.attempts.to_string(),
                    format!("{}ms", send.elapsed_ms),
                ]);
            }
            println!("{sends}");

            let mut deliveries = Table::new();
            deliveries
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["NODE", "FROM", "TO", "ID", "FLAGS", "RSSI", "PAYLOAD"]);
            for delivery in &report.deliveries {
                deliveries.add_row(vec![
                    delivery.node.to_string(),
                    delivery.from.to_string(),
                    address_label(delivery.to),
                    delivery.id.to_string(),
                    delivery.flags.clone(),
                    delivery.rssi.to_string(),
                    delivery.payload.clone(),
                ]);
            }
            println!("{deliveries}");
            println!("{}", telemetry_table(&report.nodes));
        }
        OutputFormat::Pretty => {
            for send in &report.sends {
                println!(
                    "send seq={} to={} id={} outcome={} attempts={} elapsed={}ms",
                    send.seq,
                    address_label(send.to),
                    send.id,
                    send.outcome,
                    send.attempts,
                    send.elapsed_ms
                );
            }
            for delivery in &report.deliveries {
                println!(
                    "recv node={} from={} to={} id={} flags={} rssi={} payload={}",
                    delivery.node,
                    delivery.from,
                    address_label(delivery.to),
                    delivery.id,
                    delivery.flags,
                    delivery.rssi,
                    delivery.payload
                );
            }
            for node in &report.nodes {
                let t = &node.telemetry;
                println!(
                    "node={} address={} delivered={} duplicates={} dropped={} filtered={} sent={} acks_sent={} acks_received={} retries={} failed={} overflow={}",
                    node.node,
                    node.address,
                    t.delivered,
                    t.duplicates,
                    t.dropped.total(),
                    t.filtered,
                    t.data_sent,
                    t.acks_sent,
                    t.acks_received,
                    t.retries,
                    t.failed,
                    t.delivery_overflow
                );
            }
            let m = &report.medium;
            println!(
                "medium transmissions={} delivered={} dropped={} corrupted={} overflowed={}",
                m.transmissions, m.delivered, m.dropped, m.corrupted, m.overflowed
            );
        }
        OutputFormat::Raw => {
            for delivery in report.deliveries.iter().filter(|d| d.node == "server") {
                print_raw(delivery.payload.as_bytes());
                print_raw(b"\n");
            }
        }
    }
}

fn telemetry_table(nodes: &[NodeTelemetry]) -> Table {
    let mut header = vec!["COUNTER".to_string()];
    header.extend(nodes.iter().map(|n| format!("{} ({})", n.node, n.address)));

    let counters: [(&str, fn(&LinkTelemetry) -> u64); 14] = [
        ("delivered", |t| t.delivered),
        ("duplicates", |t| t.duplicates),
        ("dropped: invalid sync", |t| t.dropped.invalid_sync),
        ("dropped: length mismatch", |t| t.dropped.length_mismatch),
        ("dropped: crc mismatch", |t| t.dropped.crc_mismatch),
        ("filtered", |t| t.filtered),
        ("data sent", |t| t.data_sent),
        ("acks sent", |t| t.acks_sent),
        ("acks received", |t| t.acks_received),
        ("unmatched acks", |t| t.unmatched_acks),
        ("retries", |t| t.retries),
        ("failed sends", |t| t.failed),
        ("delivery overflow", |t| t.delivery_overflow),
        ("peers heard", |t| t.last_rssi.len() as u64),
    ];

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    for (name, read) in counters {
        let mut row = vec![name.to_string()];
        row.extend(nodes.iter().map(|n| read(&n.telemetry).to_string()));
        table.add_row(row);
    }
    table
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

pub fn to_hex(data: &[u8]) -> String {
    data.iter().map(|b| format!("{b:02x}")).collect()
}

fn address_label(address: u8) -> String {
    if flags::is_broadcast(address) {
        "broadcast".to_string()
    } else {
        address.to_string()
    }
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}

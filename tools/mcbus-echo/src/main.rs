// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! mcbus-echo - Echo mcbus frames for one message type in real-time
//!
//! Joins the multicast endpoint of a message type and prints every frame
//! header. No schema is needed: payloads are shown as hex.

use chrono::{Local, TimeZone};
use clap::{Parser, ValueEnum};
use colored::*;
use mcbus::config::{parse_prefix, YamlLoader, DEFAULT_PREFIX_LEN, RECV_BUFFER_LEN};
use mcbus::engine::{SequenceEvent, SequenceTracker};
use mcbus::transport::{open_transport, Role};
use mcbus::wire::{decode_frame, now_micros, FrameHeader};
use mcbus::{endpoint_for, BusConfig, MulticastEndpoint, MulticastScope};
use std::io::{self, IsTerminal, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Echo mcbus frames in real-time
#[derive(Parser, Debug)]
#[command(name = "mcbus-echo")]
#[command(version = "0.1.0")]
#[command(about = "Echo mcbus frame headers for one message type")]
struct Args {
    /// Message type name whose endpoint to join
    type_name: String,

    /// YAML configuration file (namespace and transport sections)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Namespace prefix, e.g. ff15:0:0:1::/64 (overrides config and MCBUS_PREFIX)
    #[arg(long)]
    prefix: Option<String>,

    /// First port of the namespace
    #[arg(long)]
    port_base: Option<u16>,

    /// Number of ports types are spread over
    #[arg(long)]
    port_span: Option<u16>,

    /// Join this endpoint ([group]:port) instead of the derived one
    #[arg(short, long)]
    endpoint: Option<MulticastEndpoint>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Pretty)]
    format: OutputFormat,

    /// Maximum number of frames to receive (0 = unlimited)
    #[arg(short = 'n', long, default_value = "0")]
    count: u64,

    /// Show fingerprint, send time and one-way latency
    #[arg(short, long)]
    verbose: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Quiet mode - only output frames, no banner or summary
    #[arg(short = 'q', long)]
    quiet: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Header line and payload preview per frame
    #[value(alias = "p")]
    Pretty,
    /// One line per frame
    #[value(alias = "c")]
    Compact,
    /// Hex dump of the payload
    #[value(alias = "r", alias = "hex")]
    Raw,
}

#[derive(Debug, Default)]
struct Summary {
    frames: u64,
    bytes: u64,
    rejected: u64,
    missing: u64,
    reordered: u64,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    if args.no_color || !io::stdout().is_terminal() {
        colored::control::set_override(false);
    }

    if let Err(e) = run_echo(&args) {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn load_config(args: &Args) -> Result<BusConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => YamlLoader::load_config(path)?,
        None => BusConfig::default(),
    };
    config.apply_env()?;

    if let Some(prefix) = &args.prefix {
        let (addr, len) = parse_prefix(prefix, DEFAULT_PREFIX_LEN)?;
        config.namespace.prefix = addr;
        config.namespace.prefix_len = len;
        if let Some(scope) = MulticastScope::of(&addr) {
            config.namespace.scope = scope;
        }
    }
    if let Some(port_base) = args.port_base {
        config.namespace.port_base = port_base;
    }
    if let Some(port_span) = args.port_span {
        config.namespace.port_span = port_span;
    }
    config.namespace.validate()?;
    Ok(config)
}

fn run_echo(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    let config = load_config(args)?;
    let endpoint = match args.endpoint {
        Some(endpoint) => endpoint,
        None => endpoint_for(&args.type_name, &config.namespace)?,
    };

    if !args.quiet {
        print_header(args, endpoint);
    }

    let mut transport = open_transport(&config.mode, endpoint, Role::Subscriber, &config.transport)?;
    let mut buf = vec![0u8; RECV_BUFFER_LEN];
    let mut tracker = SequenceTracker::new();
    let mut summary = Summary::default();
    let poll = Duration::from_millis(100);

    while running.load(Ordering::SeqCst) {
        if args.count > 0 && summary.frames >= args.count {
            break;
        }
        let Some(received) = transport.receive(&mut buf, poll)? else {
            continue;
        };
        let datagram = &buf[..received.len];

        match decode_frame(datagram) {
            Ok((header, payload)) => {
                summary.frames += 1;
                summary.bytes += datagram.len() as u64;
                match tracker.observe(received.source, header.sequence) {
                    SequenceEvent::Gap { missing, .. } => {
                        summary.missing += missing;
                        if !args.quiet {
                            eprintln!(
                                "{} {} frame(s) missing from {}",
                                "!!!".yellow().bold(),
                                missing,
                                received.source
                            );
                        }
                    }
                    SequenceEvent::Reorder { last, received: seq } => {
                        summary.reordered += 1;
                        if !args.quiet {
                            eprintln!(
                                "{} seq {} after {} from {}",
                                "<<<".yellow(),
                                seq,
                                last,
                                received.source
                            );
                        }
                    }
                    SequenceEvent::Restart { last, received: seq } => {
                        if !args.quiet {
                            eprintln!(
                                "{} {} restarted at {} (was {})",
                                "***".cyan(),
                                received.source,
                                seq,
                                last
                            );
                        }
                    }
                    SequenceEvent::First | SequenceEvent::InOrder => {}
                }
                print_frame(args, &header, payload, received.source);
            }
            Err(e) => {
                summary.rejected += 1;
                if !args.quiet {
                    eprintln!(
                        "{}: {} byte(s) from {}: {}",
                        "Rejected".red(),
                        datagram.len(),
                        received.source,
                        e
                    );
                }
            }
        }
        let _ = io::stdout().flush();
    }

    if let Err(e) = transport.close() {
        log::warn!("closing transport failed: {}", e);
    }

    if !args.quiet {
        print_summary(&summary, tracker.sources());
    }
    Ok(())
}

fn print_header(args: &Args, endpoint: MulticastEndpoint) {
    eprintln!(
        "{} {} {} on {} (format={:?})",
        ">>>".green().bold(),
        "Listening for".bold(),
        args.type_name.cyan(),
        endpoint.to_string().cyan(),
        args.format
    );
    eprintln!("{}", "Press Ctrl+C to stop".dimmed());
    eprintln!();
}

fn print_frame(args: &Args, header: &FrameHeader, payload: &[u8], source: SocketAddr) {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string();

    match args.format {
        OutputFormat::Pretty => {
            println!(
                "{} {} from {} ({} bytes)",
                format!("[{}]", timestamp).dimmed(),
                format!("#{}", header.sequence).yellow(),
                source,
                payload.len()
            );
            if args.verbose {
                print_metadata(header);
            }
            print_preview(payload);
            println!();
        }
        OutputFormat::Compact => {
            let preview: String = payload.iter().take(32).map(|b| format!("{:02x}", b)).collect();
            let suffix = if payload.len() > 32 { "..." } else { "" };
            println!(
                "#{} {:016x}: {}{} ({} bytes)",
                header.sequence,
                header.fingerprint,
                preview,
                suffix,
                payload.len()
            );
        }
        OutputFormat::Raw => {
            if args.verbose {
                println!(
                    "{} #{} ({} bytes)",
                    format!("[{}]", timestamp).dimmed(),
                    header.sequence,
                    payload.len()
                );
            }
            print_hex_dump(payload);
            println!();
        }
    }
}

fn print_metadata(header: &FrameHeader) {
    let sent = i64::try_from(header.timestamp_us)
        .ok()
        .and_then(|us| Local.timestamp_micros(us).single())
        .map_or_else(
            || "?".to_string(),
            |t| t.format("%H:%M:%S%.6f").to_string(),
        );
    let latency = now_micros()
        .checked_sub(header.timestamp_us)
        .map_or_else(|| "?".to_string(), |us| format!("{}us", us));
    println!(
        "  {}: {:#018x}  {}: v{}  {}: {}  {}: {}",
        "fingerprint".cyan(),
        header.fingerprint,
        "wire".cyan(),
        header.version,
        "sent".cyan(),
        sent,
        "latency".cyan(),
        latency
    );
}

fn print_preview(payload: &[u8]) {
    if payload.is_empty() {
        println!("  {}", "(empty)".dimmed());
        return;
    }
    let preview: String = payload
        .iter()
        .take(16)
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ");
    let suffix = if payload.len() > 16 { " ..." } else { "" };
    println!("  {}: {}{}", "payload".cyan(), preview, suffix);
}

/// Width of one hex dump row.
const ROW: usize = 16;

fn hex_row(offset: usize, row: &[u8]) -> String {
    let mut hex = String::with_capacity(ROW * 3 + 1);
    for (i, byte) in row.iter().enumerate() {
        if i == ROW / 2 {
            hex.push(' ');
        }
        hex.push_str(&format!("{:02x} ", byte));
    }
    let ascii: String = row
        .iter()
        .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
        .collect();
    format!("  {:04x}  {:<width$} |{}|", offset, hex, ascii, width = ROW * 3 + 1)
}

fn print_hex_dump(data: &[u8]) {
    for (i, row) in data.chunks(ROW).enumerate() {
        println!("{}", hex_row(i * ROW, row));
    }
}

fn print_summary(summary: &Summary, sources: usize) {
    eprintln!(
        "\n{} {} frame(s), {} byte(s) from {} publisher(s)",
        "---".dimmed(),
        summary.frames,
        summary.bytes,
        sources
    );
    if summary.rejected + summary.missing + summary.reordered > 0 {
        eprintln!(
            "{} rejected={} missing={} reordered={}",
            "---".dimmed(),
            summary.rejected,
            summary.missing,
            summary.reordered
        );
    }
}

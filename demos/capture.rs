// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Dump capture
//!
//! This program extracts dumps from a log of a firmware's serial output, e.g.
//! as recorded via `cat /dev/ttyACM0 > uart.log`, and writes the records to a
//! tab separated trace with one row per access. Repeated accesses are expanded
//! unless `--compressed` is given, in which case the repeat count is kept as
//! an additional column. Every row is annotated with the peripheral owning the
//! accessed address, if known.
//!
//! All output outside of dumps is echoed to stdout and optionally written to
//! the file given via `--uart`. Diagnostics are logged to stderr, filtered by
//! `RUST_LOG` or, with `--debug`, including debug messages.

use std::io::{BufRead, Write};
use std::path::PathBuf;

use conware::capture::{Capture, Line};
use conware::config::sam3x;
use conware::record::PC_PLACEHOLDER;
use conware::{Operation, Record};

const HEADER: &[&str] = &[
    "Operation",
    "Seqn",
    "Address",
    "Value",
    "PC",
    "Size",
    "Timestamp",
    "Peripheral",
];

fn main() {
    let matches = clap::Command::new("Dump capture")
        .arg(
            clap::arg!(<input> "Path to the serial log")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            clap::arg!(-o --output <FILE> "Output file").value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            clap::arg!(--uart <FILE> "File receiving all output outside of dumps")
                .env("CONWARE_UART_LOG")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            clap::arg!(-c --compressed "Keep repeat counts instead of expanding records")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            clap::arg!(-d --debug "Enable additional debug output")
                .env("DEBUG")
                .action(clap::ArgAction::SetTrue)
                .value_parser(clap::builder::FalseyValueParser::new()),
        )
        .get_matches();

    let debug = matches.get_flag("debug");
    let compressed = matches.get_flag("compressed");

    let level = if debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    let input = matches
        .get_one::<PathBuf>("input")
        .expect("No input file specified");
    let output = matches
        .get_one::<PathBuf>("output")
        .cloned()
        .unwrap_or_else(|| input.with_extension("tsv"));

    let input = std::fs::File::open(input).expect("Could not open serial log");
    let input = std::io::BufReader::new(input);
    let output = std::fs::File::create(output).expect("Could not create output file");
    let mut output = std::io::BufWriter::new(output);
    let mut uart = matches.get_one::<PathBuf>("uart").map(|p| {
        let file = std::fs::File::create(p).expect("Could not create UART log");
        std::io::BufWriter::new(file)
    });

    let mut header = HEADER.join("\t");
    if compressed {
        header.push_str("\tRepeat");
    }
    writeln!(output, "{header}").expect("Could not write header");

    let mut capture = Capture::new();
    let mut rows = 0u64;
    for line in input.split(b'\n') {
        let line = line.expect("Could not read serial log");
        let line = String::from_utf8_lossy(&line);
        let classified = match capture.feed(&line) {
            Ok(classified) => classified,
            Err(e) => {
                log::warn!("{e}: {}", e.source);
                continue;
            }
        };
        match classified {
            Line::Start => log::info!("Dump started in line {}", capture.lines()),
            Line::End { records } => log::info!("Dump done ({records} records)"),
            Line::Record(record) if compressed => {
                write_row(&mut output, &record, Some(record.repeat));
                rows += 1;
            }
            Line::Record(record) => {
                if record.repeat > 0 {
                    log::debug!("Repeating {} times...", record.repeat);
                }
                for record in record.expand() {
                    write_row(&mut output, &record, None);
                    rows += 1;
                }
            }
            Line::Other(text) => {
                println!("{text}");
                if let Some(uart) = uart.as_mut() {
                    writeln!(uart, "{text}").expect("Could not write UART log");
                }
            }
        }
    }

    if capture.is_dumping() {
        log::warn!("Serial log ended within a dump");
    }
    log::info!("{} dumps, {rows} rows written", capture.dumps());
}

/// Write a single trace row
fn write_row(output: &mut impl Write, record: &Record, repeat: Option<u32>) {
    let operation = record.operation.name();
    let pc = record
        .pc
        .map(|pc| format!("{pc:08x}"))
        .unwrap_or_else(|| PC_PLACEHOLDER.into());
    let peripheral = match record.operation {
        Operation::Interrupt => "",
        _ => sam3x::peripheral_at(record.address).unwrap_or(""),
    };
    write!(
        output,
        "{operation}\t{}\t{:08x}\t{:08x}\t{pc}\t{}\t{}\t{peripheral}",
        record.seqn, record.address, record.value, record.size, record.timestamp,
    )
    .expect("Could not write row");
    if let Some(repeat) = repeat {
        write!(output, "\t{repeat}").expect("Could not write row");
    }
    writeln!(output).expect("Could not write row");
}

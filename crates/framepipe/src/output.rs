use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use framepipe_frame::{PixelFormat, RasterLayout};
use serde::Serialize;

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

/// Endpoint details printed by `serve` once the pipe is open.
#[derive(Serialize)]
pub struct EndpointOutput<'a> {
    pub path: &'a str,
    pub direction: &'a str,
    pub kind: &'a str,
    pub argument: &'a str,
}

pub fn print_endpoint(endpoint: &EndpointOutput<'_>, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(endpoint),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["PATH", "DIRECTION", "KIND", "ARGUMENT"])
                .add_row(vec![
                    endpoint.path,
                    endpoint.direction,
                    endpoint.kind,
                    endpoint.argument,
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "path={} direction={} kind={} argument={}",
                endpoint.path, endpoint.direction, endpoint.kind, endpoint.argument
            );
        }
        OutputFormat::Raw => println!("{}", endpoint.path),
    }
    let _ = std::io::stdout().flush();
}

#[derive(Serialize)]
struct FormatRow {
    layout: &'static str,
    bits_per_pixel: usize,
    pix_fmt: Option<&'static str>,
}

pub fn print_formats(format: OutputFormat) {
    let rows: Vec<FormatRow> = RasterLayout::ALL
        .iter()
        .map(|layout| FormatRow {
            layout: layout.name(),
            bits_per_pixel: layout.bits_per_pixel(),
            pix_fmt: PixelFormat::from_layout(*layout).ok().map(PixelFormat::as_str),
        })
        .collect();

    match format {
        OutputFormat::Json => print_json(&rows),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["LAYOUT", "BPP", "PIX_FMT"]);
            for row in &rows {
                table.add_row(vec![
                    row.layout.to_string(),
                    row.bits_per_pixel.to_string(),
                    row.pix_fmt.unwrap_or("-").to_string(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            for row in &rows {
                println!(
                    "{} bpp={} pix_fmt={}",
                    row.layout,
                    row.bits_per_pixel,
                    row.pix_fmt.unwrap_or("unsupported")
                );
            }
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

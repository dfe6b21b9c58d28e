use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use coprocwire_client::{CountMapDecode, UnreadCount};
use coprocwire_frame::Operation;
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

/// How a payload was interpreted after the call returned.
#[derive(Debug)]
pub enum Decoded {
    Text,
    List(Vec<String>),
    Counts(CountMapDecode),
}

/// One completed call, ready to print.
#[derive(Debug)]
pub struct CallReport {
    pub operation: Operation,
    pub call_id: u64,
    pub payload: String,
    pub decoded: Decoded,
}

#[derive(Serialize)]
struct CallOutput<'a> {
    operation: &'static str,
    call_id: u64,
    payload: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    items: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    counts: Option<&'a [UnreadCount]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    skipped: Option<usize>,
}

impl<'a> From<&'a CallReport> for CallOutput<'a> {
    fn from(report: &'a CallReport) -> Self {
        let (items, counts, skipped) = match &report.decoded {
            Decoded::Text => (None, None, None),
            Decoded::List(items) => (Some(items.as_slice()), None, None),
            Decoded::Counts(decoded) => (
                None,
                Some(decoded.entries.as_slice()),
                Some(decoded.skipped()),
            ),
        };
        Self {
            operation: report.operation.as_str(),
            call_id: report.call_id,
            payload: &report.payload,
            items,
            counts,
            skipped,
        }
    }
}

pub fn print_call(report: &CallReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{}", to_json(report)),
        OutputFormat::Table => println!("{}", render_table(report)),
        OutputFormat::Pretty => print!("{}", render_pretty(report)),
        OutputFormat::Raw => print_raw(report.payload.as_bytes()),
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn to_json(report: &CallReport) -> String {
    serde_json::to_string(&CallOutput::from(report)).unwrap_or_else(|_| "{}".to_string())
}

fn render_table(report: &CallReport) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    match &report.decoded {
        Decoded::Text => {
            table
                .set_header(vec!["OPERATION", "CALL ID", "PAYLOAD"])
                .add_row(vec![
                    report.operation.as_str().to_string(),
                    report.call_id.to_string(),
                    report.payload.clone(),
                ]);
        }
        Decoded::List(items) => {
            table.set_header(vec!["#", "NAME"]);
            for (index, item) in items.iter().enumerate() {
                table.add_row(vec![index.to_string(), item.clone()]);
            }
        }
        Decoded::Counts(decoded) => {
            table.set_header(vec!["NAME", "UNREAD"]);
            for entry in &decoded.entries {
                table.add_row(vec![entry.name.clone(), entry.count.to_string()]);
            }
        }
    }
    table
}

fn render_pretty(report: &CallReport) -> String {
    let mut out = format!(
        "operation={} call_id={}\n",
        report.operation, report.call_id
    );
    match &report.decoded {
        Decoded::Text => {
            out.push_str(&report.payload);
            out.push('\n');
        }
        Decoded::List(items) => {
            for item in items {
                out.push_str(&format!("  {item}\n"));
            }
        }
        Decoded::Counts(decoded) => {
            for entry in &decoded.entries {
                out.push_str(&format!("  {}: {}\n", entry.name, entry.count));
            }
            if decoded.skipped() > 0 {
                out.push_str(&format!("  ({} malformed entries skipped)\n", decoded.skipped()));
            }
        }
    }
    out
}

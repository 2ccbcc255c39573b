use std::io::{IsTerminal, Write};

use acsys_acnet::{Reply, Status};
use acsys_dpm::ListItem;
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
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

#[derive(Serialize)]
struct ReplyOutput<'a> {
    destination: &'a str,
    status: i16,
    status_name: Option<&'static str>,
    trunk: u8,
    node: u8,
    payload_size: usize,
    payload: String,
}

impl<'a> ReplyOutput<'a> {
    fn new(destination: &'a str, reply: &Reply) -> Self {
        Self {
            destination,
            status: reply.status.raw(),
            status_name: reply.status.name(),
            trunk: (reply.address >> 8) as u8,
            node: (reply.address & 0xff) as u8,
            payload_size: reply.payload.len(),
            payload: hex(reply.payload.as_ref()),
        }
    }
}

/// Print the replies to one request.
pub fn print_replies(destination: &str, replies: &[Reply], format: OutputFormat) {
    let rows: Vec<ReplyOutput<'_>> = replies
        .iter()
        .map(|reply| ReplyOutput::new(destination, reply))
        .collect();

    match format {
        OutputFormat::Json => {
            for row in &rows {
                println!(
                    "{}",
                    serde_json::to_string(row).unwrap_or_else(|_| "{}".to_string())
                );
            }
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FROM", "STATUS", "SIZE", "PAYLOAD"]);
            for row in &rows {
                table.add_row(vec![
                    format!("{:02x}{:02x}", row.trunk, row.node),
                    status_label(row.status),
                    row.payload_size.to_string(),
                    row.payload.clone(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for row in &rows {
                println!(
                    "from={:02x}{:02x} status={} size={} payload={}",
                    row.trunk,
                    row.node,
                    status_label(row.status),
                    row.payload_size,
                    row.payload
                );
            }
        }
        OutputFormat::Raw => {
            for reply in replies {
                print_raw(reply.payload.as_ref());
            }
        }
    }
}

#[derive(Serialize)]
struct NodeOutput<'a> {
    name: &'a str,
    trunk: u8,
    node: u8,
    address: u16,
}

pub fn print_node(name: &str, address: u16, format: OutputFormat) {
    let out = NodeOutput {
        name,
        trunk: (address >> 8) as u8,
        node: (address & 0xff) as u8,
        address,
    };
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("Node:    {}", out.name.to_ascii_uppercase());
            println!("  Trunk: {}", out.trunk);
            println!("  Node:  {}", out.node);
        }
        OutputFormat::Raw => {
            println!("{:02x}{:02x}", out.trunk, out.node);
        }
    }
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum ItemOutput {
    Data {
        tag: u32,
        drf: String,
        stamp: f64,
        cycle: i64,
        value: String,
    },
    Status {
        tag: u32,
        drf: String,
        status: i16,
        status_name: Option<&'static str>,
    },
}

/// Print list items as they arrive. `drf` looks up the request behind a tag.
pub fn print_items<'a, F>(items: &[ListItem], drf: F, format: OutputFormat)
where
    F: Fn(u32) -> &'a str,
{
    let rows: Vec<ItemOutput> = items
        .iter()
        .map(|item| match item {
            ListItem::Data(data) => ItemOutput::Data {
                tag: data.tag,
                drf: drf(data.tag).to_string(),
                stamp: data.stamp,
                cycle: data.cycle,
                value: data.value.to_string(),
            },
            ListItem::Status(status) => ItemOutput::Status {
                tag: status.tag,
                drf: drf(status.tag).to_string(),
                status: status.status.raw(),
                status_name: status.status.name(),
            },
        })
        .collect();

    match format {
        OutputFormat::Json => {
            for row in &rows {
                println!(
                    "{}",
                    serde_json::to_string(row).unwrap_or_else(|_| "{}".to_string())
                );
            }
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["TAG", "DRF", "STAMP", "VALUE"]);
            for row in &rows {
                match row {
                    ItemOutput::Data {
                        tag,
                        drf,
                        stamp,
                        value,
                        ..
                    } => table.add_row(vec![
                        tag.to_string(),
                        drf.clone(),
                        format!("{stamp:.3}"),
                        value.clone(),
                    ]),
                    ItemOutput::Status {
                        tag, drf, status, ..
                    } => table.add_row(vec![
                        tag.to_string(),
                        drf.clone(),
                        String::new(),
                        status_label(*status),
                    ]),
                };
            }
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            for item in items {
                match item {
                    ListItem::Data(data) => println!("{data}"),
                    ListItem::Status(status) => {
                        println!("{{tag: {}, status: {}}}", status.tag, status.status)
                    }
                }
            }
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn status_label(raw: i16) -> String {
    let status = Status::from_raw(raw);
    match status.name() {
        Some(name) => name.to_string(),
        None => status.to_string(),
    }
}

fn hex(payload: &[u8]) -> String {
    payload.iter().map(|byte| format!("{byte:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn reply_rows_split_address_and_hex_encode_payload() {
        let reply = Reply {
            status: Status::SUCCESS,
            address: 0x0a21,
            payload: Bytes::from_static(&[0x00, 0x01, 0xff]),
        };
        let row = ReplyOutput::new("ACNET@CENTRA", &reply);
        assert_eq!(row.trunk, 0x0a);
        assert_eq!(row.node, 0x21);
        assert_eq!(row.payload, "0001ff");
        assert_eq!(row.status_name, Some("ACNET_SUCCESS"));
    }

    #[test]
    fn unnamed_statuses_print_facility_and_code() {
        assert_eq!(status_label(Status::NOCON.raw()), "ACNET_NOCON");
        assert_eq!(status_label(Status::new(17, -24).raw()), "[17 -24]");
    }
}

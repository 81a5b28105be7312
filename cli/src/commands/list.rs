//! List command - show open sockets.

use std::io::Write;

use anyhow::Result;
use ports_core::{filter_ports, list_ports, PortFilter, PortRecord};

use crate::table::Table;

const HEADER: [&str; 4] = ["PROTO", "LOCAL ADDRESS", "FOREIGN ADDRESS", "STATE"];
const OWNER_HEADER: &str = "PID/Program";

/// Build the output table for already-filtered records.
pub fn build_table<'a, I>(records: I, show_owner: bool) -> Table
where
    I: IntoIterator<Item = &'a PortRecord>,
{
    let mut header: Vec<&str> = HEADER.to_vec();
    if show_owner {
        header.push(OWNER_HEADER);
    }
    let mut table = Table::new(header);

    for record in records {
        let mut row = vec![
            record.protocol.as_str(),
            record.local.as_str(),
            record.remote.as_str(),
            record.state.as_str(),
        ];
        if show_owner {
            row.push(record.owner.as_str());
        }
        table.push_row(row);
    }

    table
}

pub fn run(filter: PortFilter, show_owner: bool) -> Result<()> {
    let records = list_ports()?;
    let shown = filter_ports(&records, &filter);
    tracing::debug!(total = records.len(), shown = shown.len(), "Filtered sockets");

    let table = build_table(shown, show_owner).with_bold_header(atty::is(atty::Stream::Stdout));

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(table.render().as_bytes())?;
    stdout.flush()?;
    Ok(())
}

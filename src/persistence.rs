// This file is part of msg-router.
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! Persistence for provisioned routing-table entries. One
//! record per line (newline-delimited JSON) so that an unknown address
//! kind encountered while loading can be skipped record-by-record
//! without invalidating the rest of the file, keeping the format
//! forward-compatible.
//!
//! Writes are atomic: the new content is written to a temp file next to
//! the target, `fsync`ed, then renamed into place.

use std::fs::{rename, File};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::routing_table::{ParticipantId, RoutingEntry};

#[derive(Serialize, Deserialize)]
struct PersistedEntry {
    participant_id: String,
    address: Address,
    is_globally_visible: bool,
}

/// Load provisioned entries from `path`. A missing file is treated as
/// empty. A file that exists but cannot be parsed at all is also
/// treated as empty (a logged, non-fatal condition, never a load-time
/// panic); individual malformed lines are skipped with a warning while
/// the rest of the file is kept.
pub fn load(path: &Path) -> Vec<(ParticipantId, RoutingEntry)> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(_) => {
            info!(
                "Routing table persistence file at \"{}\" does not exist yet. Starting empty",
                path.display()
            );
            return Vec::new();
        }
    };

    let mut entries = Vec::new();

    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = match line {
            Ok(l) if l.trim().is_empty() => continue,
            Ok(l) => l,
            Err(e) => {
                warn!("Failed to read line {} of routing table persistence file: {e}", line_no + 1);
                continue;
            }
        };

        match serde_json::from_str::<PersistedEntry>(&line) {
            Ok(record) => match ParticipantId::new(record.participant_id) {
                Ok(id) => {
                    let entry = RoutingEntry::new(record.address, record.is_globally_visible, true);
                    entries.push((id, entry));
                }
                Err(e) => warn!("Skipping persisted entry with invalid participant id: {e}"),
            },
            Err(e) => {
                warn!(
                    "Skipping unreadable routing table record at line {}: {e}",
                    line_no + 1
                );
            }
        }
    }

    entries
}

/// Atomically rewrite `path` with the given provisioned entries.
pub fn save(path: &Path, entries: &[(ParticipantId, RoutingEntry)]) -> anyhow::Result<()> {
    let path_tmp = {
        let mut p = path.to_owned();
        let file_name = p
            .file_name()
            .map(|n| format!("{}.tmp", n.to_string_lossy()))
            .unwrap_or_else(|| "routing-table.tmp".to_string());
        p.set_file_name(file_name);
        p
    };

    {
        let mut fd = File::create(&path_tmp)?;

        for (id, entry) in entries {
            let record = PersistedEntry {
                participant_id: id.as_str().to_string(),
                address: entry.address.clone(),
                is_globally_visible: entry.is_globally_visible,
            };
            serde_json::to_writer(&fd, &record)?;
            fd.write_all(b"\n")?;
        }

        fd.sync_all()?;
    }

    rename(path_tmp, path)?;

    Ok(())
}

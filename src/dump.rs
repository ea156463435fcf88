use crate::collision::CollisionDetector;
use crate::error::Result;
use crate::events::RunReport;
use crate::history::History;
use crate::ir::{Edge, Node};
use crate::store::WorkspaceStore;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceDump {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub crossings: usize,
    pub report: Option<RunReport>,
    pub history: Vec<HistoryEntryDump>,
    pub current_index: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntryDump {
    pub index: usize,
    pub label: String,
    pub timestamp: String,
    pub nodes: usize,
    pub edges: usize,
}

impl WorkspaceDump {
    pub fn capture<S>(
        store: &S,
        history: &History,
        detector: &CollisionDetector,
        report: Option<RunReport>,
    ) -> Self
    where
        S: WorkspaceStore + ?Sized,
    {
        let nodes = store.nodes();
        let edges = store.edges();
        let crossings = detector.count_crossings(&edges, &nodes);
        let history_entries = history
            .snapshots()
            .enumerate()
            .map(|(index, snapshot)| HistoryEntryDump {
                index,
                label: snapshot.label.clone(),
                timestamp: snapshot.timestamp.to_rfc3339(),
                nodes: snapshot.nodes.len(),
                edges: snapshot.edges.len(),
            })
            .collect();

        WorkspaceDump {
            nodes,
            edges,
            crossings,
            report,
            history: history_entries,
            current_index: history.current_index(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

pub fn write_dump(path: &Path, dump: &WorkspaceDump) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, dump)?;
    Ok(())
}

pub fn print_dump(dump: &WorkspaceDump) -> anyhow::Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    out.write_all(dump.to_json()?.as_bytes())?;
    out.write_all(b"\n")?;
    Ok(())
}

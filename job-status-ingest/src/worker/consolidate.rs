use std::cmp::Ordering;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use crate::types::message::{MessageKind, WorkerMessage};

/// Reduces one poll batch to a single representative message per job key.
///
/// Results and errors win over begins, which win over progress. Among
/// results and errors the later message wins, among begins the first one, and
/// among progress messages the highest progress. A message with an
/// unrecognised type never displaces a known one.
pub fn consolidate_by_job_key(messages: Vec<WorkerMessage>) -> BTreeMap<String, WorkerMessage> {
    let mut representatives: BTreeMap<String, WorkerMessage> = BTreeMap::new();
    for message in messages {
        match representatives.entry(message.job_key.clone()) {
            Entry::Vacant(entry) => {
                entry.insert(message);
            }
            Entry::Occupied(mut entry) => {
                if displaces(entry.get(), &message) {
                    entry.insert(message);
                }
            }
        }
    }
    representatives
}

fn displaces(current: &WorkerMessage, incoming: &WorkerMessage) -> bool {
    match incoming.kind.precedence().cmp(&current.kind.precedence()) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => match incoming.kind {
            MessageKind::Result | MessageKind::Error => true,
            MessageKind::Progress => {
                incoming.progress().unwrap_or(f64::NEG_INFINITY) > current.progress().unwrap_or(f64::NEG_INFINITY)
            }
            MessageKind::Begin | MessageKind::Unknown => false,
        },
    }
}

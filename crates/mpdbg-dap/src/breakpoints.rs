use std::collections::BTreeMap;

use itertools::Itertools;
use tracing::debug;

use crate::source_map::file_name;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct BreakpointEntry {
    pub id: i64,
    pub line: i64,
}

/// Line breakpoints keyed by the source path the client used.
#[derive(Debug, Default)]
pub struct BreakpointManager {
    sources: BTreeMap<String, Vec<BreakpointEntry>>,
    next_id: i64,
}

impl BreakpointManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces every breakpoint of `source` with `lines` and returns one entry
    /// per requested line. Lines that were already set keep their id, so
    /// repeating a call yields the same result.
    pub fn set_breakpoints(&mut self, source: &str, lines: &[i64]) -> Vec<BreakpointEntry> {
        let previous = self.sources.remove(source).unwrap_or_default();

        let entries: Vec<BreakpointEntry> = lines
            .iter()
            .unique()
            .map(|&line| match previous.iter().find(|bp| bp.line == line) {
                Some(existing) => *existing,
                None => {
                    self.next_id += 1;
                    BreakpointEntry {
                        id: self.next_id,
                        line,
                    }
                }
            })
            .collect();

        debug!(source, lines = ?entries.iter().map(|bp| bp.line).collect_vec(), "Replaced breakpoints");

        let response = lines
            .iter()
            .filter_map(|line| entries.iter().find(|bp| bp.line == *line).copied())
            .collect();

        if !entries.is_empty() {
            self.sources.insert(source.to_string(), entries);
        }
        response
    }

    /// Lines currently set for `source`, in request order.
    pub fn lines(&self, source: &str) -> Vec<i64> {
        self.sources
            .get(source)
            .map(|entries| entries.iter().map(|bp| bp.line).collect())
            .unwrap_or_default()
    }

    /// Id of the breakpoint at `line` of `source`, matching sources by file
    /// name.
    pub fn hit(&self, source: &str, line: i64) -> Option<i64> {
        let name = file_name(source);
        self.sources
            .iter()
            .filter(|(path, _)| file_name(path) == name)
            .flat_map(|(_, entries)| entries.iter())
            .find(|bp| bp.line == line)
            .map(|bp| bp.id)
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

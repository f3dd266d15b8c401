//! Cluster state parsing
//!
//! A cluster state is a version-stamped snapshot of which nodes are usable,
//! written as space separated tokens:
//! `version:12 bits:16 distributor:3 storage:10 .4.s:d .7.c:2.0`.
//! Node tokens apply to the node type section they follow.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::core::error::{Error, Result};

/// Default number of bucket bits used for distribution
pub const DEFAULT_DISTRIBUTION_BITS: u32 = 16;

/// State of one node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    /// Available
    Up,
    /// Not available
    Down,
    /// Temporarily out for maintenance
    Maintenance,
    /// Being drained; copies should move elsewhere
    Retired,
    /// Starting up
    Initializing,
    /// Shutting down
    Stopping,
}

impl State {
    fn from_code(code: &str) -> Option<State> {
        match code {
            "u" => Some(State::Up),
            "d" => Some(State::Down),
            "m" => Some(State::Maintenance),
            "r" => Some(State::Retired),
            "i" => Some(State::Initializing),
            "s" => Some(State::Stopping),
            _ => None,
        }
    }

    fn code(self) -> &'static str {
        match self {
            State::Up => "u",
            State::Down => "d",
            State::Maintenance => "m",
            State::Retired => "r",
            State::Initializing => "i",
            State::Stopping => "s",
        }
    }

    /// Whether ideal placement may pick a node in this state
    pub fn is_available(self) -> bool {
        matches!(self, State::Up | State::Initializing)
    }
}

/// State and capacity of one node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeState {
    /// Current state
    pub state: State,
    /// Relative capacity; 1.0 unless set
    pub capacity: f64,
}

impl Default for NodeState {
    fn default() -> Self {
        Self { state: State::Up, capacity: 1.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeType {
    Distributor,
    Storage,
}

/// Parsed cluster state
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterState {
    version: u32,
    distribution_bits: u32,
    distributor_count: u16,
    storage_count: u16,
    distributors: BTreeMap<u16, NodeState>,
    storage: BTreeMap<u16, NodeState>,
}

impl Default for ClusterState {
    fn default() -> Self {
        Self {
            version: 0,
            distribution_bits: DEFAULT_DISTRIBUTION_BITS,
            distributor_count: 0,
            storage_count: 0,
            distributors: BTreeMap::new(),
            storage: BTreeMap::new(),
        }
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::cluster_state(format!("Invalid value '{}' for '{}'", value, key)))
}

impl ClusterState {
    /// Parse a cluster state string
    pub fn parse(text: &str) -> Result<Self> {
        let mut state = ClusterState::default();
        let mut section: Option<NodeType> = None;

        for token in text.split_whitespace() {
            let (key, value) = token
                .split_once(':')
                .ok_or_else(|| Error::cluster_state(format!("Token '{}' has no value", token)))?;

            if let Some(node_key) = key.strip_prefix('.') {
                let node_type =
                    section.ok_or_else(|| Error::cluster_state(format!("Node token '{}' outside a node section", token)))?;
                let (index, attribute) = node_key
                    .split_once('.')
                    .ok_or_else(|| Error::cluster_state(format!("Malformed node token '{}'", token)))?;
                let index: u16 = parse_number(token, index)?;
                let node = state.node_map(node_type).entry(index).or_default();
                match attribute {
                    "s" => {
                        node.state = State::from_code(value)
                            .ok_or_else(|| Error::cluster_state(format!("Unknown node state '{}'", value)))?;
                    }
                    "c" => node.capacity = parse_number(token, value)?,
                    // Attributes not used for placement (descriptions, disk info) are ignored
                    _ => {}
                }
                continue;
            }

            match key {
                "version" => state.version = parse_number(key, value)?,
                "bits" => state.distribution_bits = parse_number(key, value)?,
                "cluster" => {}
                "distributor" => {
                    state.distributor_count = parse_number(key, value)?;
                    section = Some(NodeType::Distributor);
                }
                "storage" => {
                    state.storage_count = parse_number(key, value)?;
                    section = Some(NodeType::Storage);
                }
                _ => return Err(Error::cluster_state(format!("Unknown token '{}'", token))),
            }
        }

        if state.distribution_bits > crate::bucket::id::MAX_USED_BITS {
            return Err(Error::cluster_state(format!("Too many distribution bits: {}", state.distribution_bits)));
        }
        Ok(state)
    }

    fn node_map(&mut self, node_type: NodeType) -> &mut BTreeMap<u16, NodeState> {
        match node_type {
            NodeType::Distributor => &mut self.distributors,
            NodeType::Storage => &mut self.storage,
        }
    }

    /// Version of this state
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Bucket bits used to seed placement
    pub fn distribution_bits(&self) -> u32 {
        self.distribution_bits
    }

    /// Number of storage node indexes
    pub fn storage_count(&self) -> u16 {
        self.storage_count
    }

    /// Number of distributor node indexes
    pub fn distributor_count(&self) -> u16 {
        self.distributor_count
    }

    /// State of a storage node; indexes past the node count are down
    pub fn storage_node(&self, index: u16) -> NodeState {
        Self::lookup(&self.storage, self.storage_count, index)
    }

    /// State of a distributor node; indexes past the node count are down
    pub fn distributor_node(&self, index: u16) -> NodeState {
        Self::lookup(&self.distributors, self.distributor_count, index)
    }

    fn lookup(nodes: &BTreeMap<u16, NodeState>, count: u16, index: u16) -> NodeState {
        if index >= count {
            return NodeState { state: State::Down, capacity: 1.0 };
        }
        nodes.get(&index).copied().unwrap_or_default()
    }
}

impl FromStr for ClusterState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn write_nodes(f: &mut fmt::Formatter<'_>, nodes: &BTreeMap<u16, NodeState>, count: u16) -> fmt::Result {
    for (index, node) in nodes.range(..count) {
        if node.state != State::Up {
            write!(f, " .{}.s:{}", index, node.state.code())?;
        }
        if node.capacity != 1.0 {
            write!(f, " .{}.c:{}", index, node.capacity)?;
        }
    }
    Ok(())
}

impl fmt::Display for ClusterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "version:{}", self.version)?;
        if self.distribution_bits != DEFAULT_DISTRIBUTION_BITS {
            write!(f, " bits:{}", self.distribution_bits)?;
        }
        write!(f, " distributor:{}", self.distributor_count)?;
        write_nodes(f, &self.distributors, self.distributor_count)?;
        write!(f, " storage:{}", self.storage_count)?;
        write_nodes(f, &self.storage, self.storage_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nodes_and_sections() {
        let state = ClusterState::parse("version:12 bits:8 distributor:3 .1.s:d storage:10 .4.s:r .7.c:2.5").unwrap();
        assert_eq!(state.version(), 12);
        assert_eq!(state.distribution_bits(), 8);
        assert_eq!(state.distributor_count(), 3);
        assert_eq!(state.distributor_node(1).state, State::Down);
        assert_eq!(state.storage_node(1).state, State::Up);
        assert_eq!(state.storage_node(4).state, State::Retired);
        assert_eq!(state.storage_node(7).capacity, 2.5);
        assert_eq!(state.storage_node(10).state, State::Down);
    }

    #[test]
    fn test_defaults() {
        let state = ClusterState::parse("storage:10").unwrap();
        assert_eq!(state.version(), 0);
        assert_eq!(state.distribution_bits(), DEFAULT_DISTRIBUTION_BITS);
        assert_eq!(state.distributor_count(), 0);
        assert!(state.storage_node(9).state.is_available());
    }

    #[test]
    fn test_display_round_trips() {
        let text = "version:3 distributor:2 storage:5 .0.s:m .3.c:0.5";
        let state: ClusterState = text.parse().unwrap();
        assert_eq!(state.to_string(), text);
        assert_eq!(ClusterState::parse(&state.to_string()).unwrap(), state);
    }

    #[test]
    fn test_parse_errors() {
        for bad in ["storage", "storage:x", ".1.s:d", "storage:3 .1.s:q", "bogus:1", "bits:60 storage:1"] {
            assert!(matches!(ClusterState::parse(bad), Err(Error::ClusterState(_))), "{}", bad);
        }
    }
}

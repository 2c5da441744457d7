//! OSC root: owns the parameter tree and the connectors mirroring it
//!
//! ```text
//!  transport bytes ─► Connector (SLIP) ─► packet ─► OscRoot::on_osc_packet_received
//!                                                      │ resolve address
//!                                                      ▼
//!                                               Variable::execute
//!                                                      │ changed + policy allows
//!                                                      ▼
//!  transport bytes ◄─ Connector (SLIP) ◄─ packet ◄─ OscRoot::send_message
//! ```
//!
//! Everything here runs on one control thread. Connectors are pumped with
//! [`OscRoot::poll`]; nothing blocks.

use bytes::Bytes;
use std::collections::{BTreeMap, HashSet};

use crate::codec::{self, Argument};
use crate::config::ControlConfig;
use crate::constants::MAX_PACKET_SIZE;
use crate::error::{CodecError, NetworkError, TreeError};
use crate::network::{Connector, ConnectorId};
use crate::tree::{
    BroadcastPolicy, ExecuteOutcome, NodeId, OscEndpoint, OscValue, Origin, Tree, Value, Var, Variable,
};

/// Persisted configuration: address → stored arguments
pub type NodeConfig = BTreeMap<String, Vec<Argument<'static>>>;

/// Bundles nested deeper than this are dropped
const MAX_BUNDLE_DEPTH: usize = 8;

/// Root statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RootStats {
    pub packets_received: u64,
    pub packets_malformed: u64,
    pub messages_dispatched: u64,
    pub messages_unresolved: u64,
    pub messages_sent: u64,
}

/// Owner of a parameter tree and of the connectors that mirror it
pub struct OscRoot {
    tree: Tree,
    connectors: BTreeMap<ConnectorId, Box<dyn Connector>>,
    next_connector_id: u32,
    /// Scratch buffer for outgoing messages, grown to the largest one sent
    output_buffer: Vec<u8>,
    policy: BroadcastPolicy,
    on_value_changed: Option<Box<dyn FnMut()>>,
    /// Last loaded configuration, kept for nodes created afterwards
    node_config: NodeConfig,
    nodes_pending_config: HashSet<NodeId>,
    stats: RootStats,
}

impl OscRoot {
    pub fn new(authority: bool, notify_at_init: bool) -> Self {
        Self {
            tree: Tree::new(),
            connectors: BTreeMap::new(),
            next_connector_id: 0,
            output_buffer: vec![0u8; 256],
            policy: BroadcastPolicy {
                authority,
                notify_at_init,
            },
            on_value_changed: None,
            node_config: NodeConfig::new(),
            nodes_pending_config: HashSet::new(),
            stats: RootStats::default(),
        }
    }

    pub fn from_config(config: &ControlConfig) -> Self {
        Self::new(config.authority, config.notify_at_init)
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn stats(&self) -> RootStats {
        self.stats
    }

    /// Whether this process holds the ground truth for values
    pub fn is_osc_value_authority(&self) -> bool {
        self.policy.authority
    }

    pub fn set_osc_value_authority(&mut self, authority: bool) {
        self.policy.authority = authority;
    }

    /// Called after every value change, e.g. to schedule saving the config
    pub fn set_on_value_changed(&mut self, callback: impl FnMut() + 'static) {
        self.on_value_changed = Some(Box::new(callback));
    }

    pub fn add_connector(&mut self, connector: Box<dyn Connector>) -> ConnectorId {
        let id = ConnectorId(self.next_connector_id);
        self.next_connector_id += 1;
        tracing::info!(connector = connector.name(), id = id.0, "Connector added");
        self.connectors.insert(id, connector);
        id
    }

    /// Detach a connector, handing it back to the caller
    pub fn remove_connector(&mut self, id: ConnectorId) -> Result<Box<dyn Connector>, NetworkError> {
        let connector = self
            .connectors
            .remove(&id)
            .ok_or(NetworkError::ConnectorNotFound(id.0))?;
        tracing::info!(connector = connector.name(), id = id.0, "Connector removed");
        Ok(connector)
    }

    pub fn connector_count(&self) -> usize {
        self.connectors.len()
    }

    pub fn connector_ids(&self) -> Vec<ConnectorId> {
        self.connectors.keys().copied().collect()
    }

    /// Pump every connector once and dispatch all complete packets.
    /// Returns the number of packets handled.
    pub fn poll(&mut self) -> usize {
        let mut packets: Vec<Bytes> = Vec::new();
        for connector in self.connectors.values_mut() {
            connector.poll_packets(&mut |packet| packets.push(packet));
        }
        for packet in &packets {
            self.on_osc_packet_received(packet);
        }
        packets.len()
    }

    pub fn add_container(&mut self, parent: NodeId, name: &str) -> Result<NodeId, TreeError> {
        self.tree.add_container(parent, name)
    }

    pub fn add_variable(&mut self, parent: NodeId, name: &str, variable: Variable) -> Result<NodeId, TreeError> {
        self.tree.add_variable(parent, name, variable)
    }

    /// Add a variable accepting relative adjustments
    pub fn add_var<T: OscValue>(&mut self, parent: NodeId, name: &str, initial: T) -> Result<Var<T>, TreeError> {
        self.add_variable(parent, name, Variable::new(initial))
            .map(Var::new)
    }

    /// Add a variable that always carries exactly one argument
    pub fn add_fixed_var<T: OscValue>(&mut self, parent: NodeId, name: &str, initial: T) -> Result<Var<T>, TreeError> {
        self.add_variable(parent, name, Variable::fixed(initial))
            .map(Var::new)
    }

    /// Detach a node and its subtree, deregistering everything removed
    pub fn remove_node(&mut self, id: NodeId) -> Result<(), TreeError> {
        for removed in self.tree.remove(id)? {
            self.node_removed(removed);
        }
        Ok(())
    }

    /// Forget a node that is going away
    pub fn node_removed(&mut self, id: NodeId) {
        self.nodes_pending_config.remove(&id);
    }

    pub fn get<T: OscValue>(&self, var: Var<T>) -> Option<T> {
        let variable = self.tree.get(var.id())?.as_variable()?;
        T::from_value(variable.value())
    }

    /// Set a value from this process. Broadcast when it changed.
    pub fn set<T: OscValue>(&mut self, var: Var<T>, value: T) -> ExecuteOutcome {
        let Some(variable) = self.tree.get_mut(var.id()).and_then(|n| n.as_variable_mut()) else {
            return ExecuteOutcome::Ignored;
        };
        let outcome = variable.set(value.into());
        self.after_execute(var.id(), outcome, Origin::Local);
        outcome
    }

    pub fn set_increment<T: OscValue>(&mut self, var: Var<T>, amount: T) -> bool {
        self.tree
            .get_mut(var.id())
            .and_then(|n| n.as_variable_mut())
            .map(|v| v.set_increment(amount.into()))
            .unwrap_or(false)
    }

    /// Apply arguments to a node as if they came from `origin`
    pub fn execute(&mut self, id: NodeId, arguments: &[Argument<'_>], origin: Origin) -> ExecuteOutcome {
        let Some(node) = self.tree.get_mut(id) else {
            return ExecuteOutcome::Ignored;
        };
        let outcome = node.execute(arguments);
        self.after_execute(id, outcome, origin);
        outcome
    }

    fn after_execute(&mut self, id: NodeId, outcome: ExecuteOutcome, origin: Origin) {
        match outcome {
            ExecuteOutcome::Changed => {
                if let Some(callback) = self.on_value_changed.as_mut() {
                    callback();
                }
                if self.policy.should_broadcast(origin) {
                    self.broadcast_value(id);
                }
            }
            ExecuteOutcome::Announce => {
                if self.policy.should_broadcast(origin) {
                    self.broadcast_value(id);
                }
            }
            ExecuteOutcome::Unchanged | ExecuteOutcome::Ignored => {}
        }
    }

    /// Handle one packet (message or bundle) received from a connector.
    /// Malformed packets and unknown addresses are dropped.
    pub fn on_osc_packet_received(&mut self, packet: &[u8]) {
        self.stats.packets_received += 1;
        self.dispatch_packet(packet, 0);
    }

    fn dispatch_packet(&mut self, packet: &[u8], depth: usize) {
        if codec::is_bundle(packet) {
            if depth >= MAX_BUNDLE_DEPTH {
                tracing::debug!(depth, "Dropping over-nested bundle");
                self.stats.packets_malformed += 1;
                return;
            }
            match codec::parse_bundle(packet) {
                // Timetags are not scheduled: bundle contents run now
                Ok(bundle) => {
                    for element in bundle.messages() {
                        self.dispatch_packet(element, depth + 1);
                    }
                }
                Err(e) => {
                    self.stats.packets_malformed += 1;
                    tracing::debug!(code = e.code(), "Dropping malformed bundle: {}", e);
                }
            }
            return;
        }

        match codec::parse_message(packet) {
            Ok(message) => self.execute_message(&message),
            Err(e) => {
                self.stats.packets_malformed += 1;
                tracing::debug!(code = e.code(), len = packet.len(), "Dropping malformed message: {}", e);
            }
        }
    }

    fn execute_message(&mut self, message: &codec::Message<'_>) {
        let Some(id) = self.tree.resolve(message.address()) else {
            self.stats.messages_unresolved += 1;
            tracing::trace!(address = message.address(), "No node at address");
            return;
        };
        let arguments: Vec<Argument<'_>> = message.arguments().collect();
        self.stats.messages_dispatched += 1;
        self.execute(id, &arguments, Origin::Remote);
    }

    fn broadcast_value(&mut self, id: NodeId) {
        let Some(variable) = self.tree.get(id).and_then(|n| n.as_variable()) else {
            return;
        };
        let arguments = variable.to_arguments();
        if let Err(e) = self.send_message(id, &arguments) {
            tracing::warn!("Value not broadcast: {}", e);
        }
    }

    /// Encode a message for `node` and push it to every connector. Messages
    /// larger than a peer could reassemble are refused.
    pub fn send_message(&mut self, node: NodeId, arguments: &[Argument<'_>]) -> crate::Result<()> {
        let address = self.tree.full_address(node).ok_or(TreeError::StaleNode)?;
        let needed = codec::message_len(&address, arguments);
        if needed > MAX_PACKET_SIZE {
            return Err(NetworkError::PacketTooLarge(needed).into());
        }
        if needed > self.output_buffer.len() {
            self.output_buffer.resize(needed, 0);
        }

        let written = codec::write_message(&mut self.output_buffer, &address, arguments);
        if written == 0 {
            return Err(CodecError::InteriorNul.into());
        }

        self.stats.messages_sent += 1;
        let packet = &self.output_buffer[..written];
        for connector in self.connectors.values_mut() {
            connector.send_osc_message(packet);
        }
        Ok(())
    }

    /// Re-send the current value of the node at `address`, or of every
    /// variable below it when it is a container. Values are not modified.
    /// Returns false when nothing lives at the address.
    pub fn trigger_address(&mut self, address: &str) -> bool {
        let Some(id) = self.tree.resolve(address) else {
            tracing::debug!(address, "Trigger on unknown address");
            return false;
        };
        let targets: Vec<NodeId> = self.tree.walk(id).collect();
        for target in targets {
            self.broadcast_value(target);
        }
        true
    }

    /// Address and value text of every variable, depth-first
    pub fn dump_nodes(&self) -> Vec<(String, String)> {
        self.tree
            .walk(self.tree.root())
            .filter_map(|id| {
                let node = self.tree.get(id)?;
                let value = node.as_string()?;
                Some((self.tree.full_address(id)?, value))
            })
            .collect()
    }

    pub fn print_all_nodes(&self) {
        for (address, value) in self.dump_nodes() {
            tracing::info!("{} {}", address, value);
        }
    }

    /// Address → value text, for saving
    pub fn export_config(&self) -> BTreeMap<String, String> {
        self.dump_nodes().into_iter().collect()
    }

    /// Address → argument list of every variable, the inverse of
    /// [`OscRoot::load_node_config`]
    pub fn snapshot_config(&self) -> NodeConfig {
        self.tree
            .walk(self.tree.root())
            .filter_map(|id| {
                let variable = self.tree.get(id)?.as_variable()?;
                Some((self.tree.full_address(id)?, vec![variable.value().to_argument()]))
            })
            .collect()
    }

    /// Apply a configuration map to every node it addresses. The map is kept
    /// so nodes created later still get their value through
    /// [`OscRoot::add_pending_config_node`].
    pub fn load_node_config(&mut self, config: &NodeConfig) {
        let mut applied = 0usize;
        for (address, arguments) in config {
            if arguments.is_empty() {
                tracing::debug!(address = %address, "Skipping config entry without value");
                continue;
            }
            self.node_config.insert(address.clone(), arguments.clone());
            if let Some(id) = self.tree.resolve(address) {
                self.execute(id, arguments, Origin::Config);
                applied += 1;
            }
        }

        let tree = &self.tree;
        self.nodes_pending_config.retain(|&pending| match tree.full_address(pending) {
            Some(prefix) => !config
                .iter()
                .any(|(address, arguments)| !arguments.is_empty() && is_under(address, &prefix)),
            None => false,
        });

        tracing::info!(
            entries = config.len(),
            applied,
            pending = self.nodes_pending_config.len(),
            "Node configuration loaded"
        );
    }

    /// Register a node created after the configuration was loaded. Stored
    /// values for it (or for anything below it) are applied right away;
    /// otherwise it waits for the next [`OscRoot::load_node_config`].
    pub fn add_pending_config_node(&mut self, id: NodeId) {
        let Some(prefix) = self.tree.full_address(id) else {
            return;
        };

        let entries: Vec<(String, Vec<Argument<'static>>)> = self
            .node_config
            .iter()
            .filter(|(address, _)| is_under(address, &prefix))
            .map(|(address, arguments)| (address.clone(), arguments.clone()))
            .collect();

        if entries.is_empty() {
            self.nodes_pending_config.insert(id);
            return;
        }

        for (address, arguments) in entries {
            if let Some(target) = self.tree.resolve(&address) {
                self.execute(target, &arguments, Origin::Config);
            }
        }
    }

    pub fn is_pending_config(&self, id: NodeId) -> bool {
        self.nodes_pending_config.contains(&id)
    }

    pub fn pending_config_count(&self) -> usize {
        self.nodes_pending_config.len()
    }

    /// Read the stored value of a variable directly (for tests and tools)
    pub fn value_at(&self, address: &str) -> Option<Value> {
        let id = self.tree.resolve(address)?;
        Some(self.tree.get(id)?.as_variable()?.value())
    }
}

/// `address` is `prefix` itself or lies below it
fn is_under(address: &str, prefix: &str) -> bool {
    match address.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/') || prefix.is_empty(),
        None => false,
    }
}

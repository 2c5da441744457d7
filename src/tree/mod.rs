//! The addressable parameter tree
//!
//! Containers hold named children; variables are typed leaves. Nodes are
//! addressed by `/`-separated paths from the root container.

pub mod node;
pub mod variable;

pub use node::{Container, Node, NodeId, NodeKind, Tree, Walk};
pub use variable::{OscValue, Value, ValueKind, Var, Variable};

use crate::codec::Argument;

/// Result of applying a message to a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecuteOutcome {
    /// The stored value changed
    Changed,
    /// The message set the value it already had
    Unchanged,
    /// Nothing changed, but the current value should be sent out again
    Announce,
    /// The message did not apply (wrong type, wrong arity, container)
    Ignored,
}

/// Anything that can be the target of an OSC message
pub trait OscEndpoint {
    /// Apply the arguments of a message addressed to this node
    fn execute(&mut self, arguments: &[Argument<'_>]) -> ExecuteOutcome;

    /// Canonical text form of the node's value, if it has one
    fn as_string(&self) -> Option<String>;
}

/// Where a mutation came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Changed by this process (control surface, DSP side, resync)
    Local,
    /// Received from a peer over a connector
    Remote,
    /// Applied from the persisted configuration
    Config,
}

/// Inputs of the re-broadcast decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastPolicy {
    /// This process holds the ground truth for values
    pub authority: bool,
    /// Values applied from configuration are sent out as well
    pub notify_at_init: bool,
}

impl BroadcastPolicy {
    /// Whether a change from `origin` goes out to the connectors.
    ///
    /// Remote changes are only echoed by the authority; a mirror applying a
    /// value it just received keeps quiet, which is what stops two peers
    /// from bouncing a value back and forth.
    pub fn should_broadcast(&self, origin: Origin) -> bool {
        match origin {
            Origin::Local => true,
            Origin::Remote => self.authority,
            Origin::Config => self.notify_at_init,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_decision_table() {
        let mirror = BroadcastPolicy {
            authority: false,
            notify_at_init: false,
        };
        let authority = BroadcastPolicy {
            authority: true,
            notify_at_init: true,
        };

        assert!(mirror.should_broadcast(Origin::Local));
        assert!(!mirror.should_broadcast(Origin::Remote));
        assert!(!mirror.should_broadcast(Origin::Config));

        assert!(authority.should_broadcast(Origin::Local));
        assert!(authority.should_broadcast(Origin::Remote));
        assert!(authority.should_broadcast(Origin::Config));
    }
}

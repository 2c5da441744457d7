//! Equalizer parameters

use crate::error::TreeError;
use crate::root::OscRoot;
use crate::tree::{NodeId, Var};

/// Plain copy of the equalizer parameters, for the processing side
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EqParams {
    pub enabled: bool,
    pub filter_type: i32,
    pub f0: f32,
    pub gain: f32,
    pub q: f32,
}

impl Default for EqParams {
    fn default() -> Self {
        Self {
            enabled: false,
            filter_type: 0,
            f0: 1000.0,
            gain: 0.0,
            q: 0.5,
        }
    }
}

/// One equalizer band exposed as `enable`, `type`, `f0`, `gain` and `Q`
#[derive(Debug, Clone, Copy)]
pub struct EqFilter {
    node: NodeId,
    enabled: Var<bool>,
    filter_type: Var<i32>,
    f0: Var<f32>,
    gain: Var<f32>,
    q: Var<f32>,
}

impl EqFilter {
    pub fn new(root: &mut OscRoot, parent: NodeId, name: &str) -> Result<Self, TreeError> {
        let defaults = EqParams::default();
        let node = root.add_container(parent, name)?;

        let filter = Self {
            node,
            enabled: root.add_var(node, "enable", defaults.enabled)?,
            filter_type: root.add_fixed_var(node, "type", defaults.filter_type)?,
            f0: root.add_var(node, "f0", defaults.f0)?,
            gain: root.add_var(node, "gain", defaults.gain)?,
            q: root.add_var(node, "Q", defaults.q)?,
        };
        root.set_increment(filter.enabled, true);
        root.set_increment(filter.gain, 0.5);

        root.add_pending_config_node(node);
        Ok(filter)
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn f0(&self) -> Var<f32> {
        self.f0
    }

    pub fn gain(&self) -> Var<f32> {
        self.gain
    }

    /// Current values. Falls back to defaults for nodes that were removed.
    pub fn params(&self, root: &OscRoot) -> EqParams {
        let defaults = EqParams::default();
        EqParams {
            enabled: root.get(self.enabled).unwrap_or(defaults.enabled),
            filter_type: root.get(self.filter_type).unwrap_or(defaults.filter_type),
            f0: root.get(self.f0).unwrap_or(defaults.f0),
            gain: root.get(self.gain).unwrap_or(defaults.gain),
            q: root.get(self.q).unwrap_or(defaults.q),
        }
    }
}

//! Reverb parameters
//!
//! A reverb is a feedback delay whose `reverberators` array holds nested
//! reverbs. The array is resized at runtime; elements created after the
//! node configuration was loaded pick their values up through the root's
//! pending configuration.

use crate::error::TreeError;
use crate::root::OscRoot;
use crate::tree::{NodeId, Var};

const DEFAULT_DELAY: i32 = 0;
const DEFAULT_GAIN: f32 = 0.0;

/// Plain copy of one reverb stage
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReverbParams {
    pub enabled: bool,
    /// Delay in samples
    pub delay: i32,
    pub gain: f32,
}

#[derive(Debug, Clone)]
pub struct ReverbFilter {
    node: NodeId,
    enabled: Var<bool>,
    delay: Var<i32>,
    gain: Var<f32>,
    reverberators: NodeId,
    inner: Vec<ReverbFilter>,
}

impl ReverbFilter {
    pub fn new(root: &mut OscRoot, parent: NodeId, name: &str) -> Result<Self, TreeError> {
        let node = root.add_container(parent, name)?;
        let filter = Self {
            node,
            enabled: root.add_var(node, "enable", false)?,
            delay: root.add_var(node, "delay", DEFAULT_DELAY)?,
            gain: root.add_var(node, "gain", DEFAULT_GAIN)?,
            reverberators: root.add_container(node, "reverberators")?,
            inner: Vec::new(),
        };
        root.set_increment(filter.enabled, true);
        root.set_increment(filter.delay, 1);
        root.add_pending_config_node(node);
        Ok(filter)
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn reverberators(&self) -> &[ReverbFilter] {
        &self.inner
    }

    /// Rebuild the nested structure: `depth` levels below this one, each
    /// with `inner_count` reverberators
    pub fn reset(&mut self, root: &mut OscRoot, depth: usize, inner_count: usize) -> Result<(), TreeError> {
        let target = if depth == 0 { 0 } else { inner_count };
        self.resize(root, target)?;
        for inner in &mut self.inner {
            inner.reset(root, depth.saturating_sub(1), inner_count)?;
        }
        Ok(())
    }

    /// Grow or shrink the `reverberators` array. Removed elements are
    /// dropped from the tree, the newest first.
    pub fn resize(&mut self, root: &mut OscRoot, count: usize) -> Result<(), TreeError> {
        while self.inner.len() > count {
            if let Some(removed) = self.inner.pop() {
                root.remove_node(removed.node)?;
            }
        }
        while self.inner.len() < count {
            let name = self.inner.len().to_string();
            let element = ReverbFilter::new(root, self.reverberators, &name)?;
            self.inner.push(element);
        }
        Ok(())
    }

    pub fn params(&self, root: &OscRoot) -> ReverbParams {
        ReverbParams {
            enabled: root.get(self.enabled).unwrap_or(false),
            delay: root.get(self.delay).unwrap_or(DEFAULT_DELAY),
            gain: root.get(self.gain).unwrap_or(DEFAULT_GAIN),
        }
    }
}

//! Mixer parameters
//!
//! Parameter containers of a mixing console, without the signal
//! processing. Each filter owns typed handles into the root's tree and can
//! hand a plain copy of its values to whoever processes audio.

pub mod eq;
pub mod reverb;

pub use eq::{EqFilter, EqParams};
pub use reverb::{ReverbFilter, ReverbParams};

use crate::error::TreeError;
use crate::root::OscRoot;

/// Default nesting of the reverb
pub const DEFAULT_REVERB_DEPTH: usize = 1;
/// Default number of reverberators per level
pub const DEFAULT_REVERBERATORS: usize = 5;

/// Parameters of one mixer channel: `/<name>/eq/<band>` and `/<name>/reverb`
#[derive(Debug, Clone)]
pub struct Mixer {
    pub eq: Vec<EqFilter>,
    pub reverb: ReverbFilter,
}

impl Mixer {
    pub fn new(root: &mut OscRoot, name: &str, eq_bands: usize) -> Result<Self, TreeError> {
        let node = root.add_container(root.tree().root(), name)?;
        let eq_node = root.add_container(node, "eq")?;
        let eq = (0..eq_bands)
            .map(|band| EqFilter::new(root, eq_node, &band.to_string()))
            .collect::<Result<Vec<_>, _>>()?;

        let mut reverb = ReverbFilter::new(root, node, "reverb")?;
        reverb.reset(root, DEFAULT_REVERB_DEPTH, DEFAULT_REVERBERATORS)?;

        tracing::info!(name, eq_bands, nodes = root.tree().len(), "Mixer tree built");
        Ok(Self { eq, reverb })
    }
}

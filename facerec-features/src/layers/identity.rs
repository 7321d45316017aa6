use super::FeatureLayer;
use crate::error::Result;
use facerec_core::Matrix;
use std::io::{Read, Write};

/// Leaves samples in pixel space. Nothing is learned or persisted.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityLayer;

impl IdentityLayer {
    pub fn new() -> Self {
        Self
    }
}

impl FeatureLayer for IdentityLayer {
    fn name(&self) -> &'static str {
        "Identity"
    }

    /// Returns `None` instead of materializing a `rows x rows` identity basis.
    fn compute(&mut self, x: &Matrix, labels: &[usize], num_classes: usize) -> Result<Option<Matrix>> {
        self.validate_inputs(x, labels, num_classes)?;
        Ok(None)
    }

    fn project(&self, x: &Matrix) -> Result<Matrix> {
        Ok(x.copy())
    }

    fn save(&self, _w: &mut dyn Write) -> Result<()> {
        Ok(())
    }

    fn load(&mut self, _r: &mut dyn Read) -> Result<()> {
        Ok(())
    }

    fn describe(&self) -> String {
        "Identity".to_string()
    }
}

//! Global render parameters read by shaders and effects

use crate::config::WORLD_OFFSET_PARAM;
use glam::Vec3;
use std::collections::HashMap;

/// Named global vectors pushed to rendering consumers
#[derive(Debug, Clone, Default)]
pub struct GlobalRenderParams {
    vectors: HashMap<&'static str, Vec3>,
}

impl GlobalRenderParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_vector(&mut self, name: &'static str, value: Vec3) {
        self.vectors.insert(name, value);
    }

    pub fn vector(&self, name: &str) -> Option<Vec3> {
        self.vectors.get(name).copied()
    }

    /// Current anchor offset, zero before the first update
    pub fn world_offset(&self) -> Vec3 {
        self.vector(WORLD_OFFSET_PARAM).unwrap_or(Vec3::ZERO)
    }

    pub fn set_world_offset(&mut self, offset: Vec3) {
        self.set_vector(WORLD_OFFSET_PARAM, offset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_world_offset_defaults_to_zero() {
        let params = GlobalRenderParams::new();
        assert_eq!(params.world_offset(), Vec3::ZERO);
        assert_eq!(params.vector(WORLD_OFFSET_PARAM), None);
    }

    #[test]
    fn test_set_world_offset() {
        let mut params = GlobalRenderParams::new();
        params.set_world_offset(Vec3::new(-150.0, 0.0, 0.0));
        assert_eq!(params.vector(WORLD_OFFSET_PARAM), Some(Vec3::new(-150.0, 0.0, 0.0)));
    }
}

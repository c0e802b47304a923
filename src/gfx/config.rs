//! Context configuration
//!
//! Defines the limits the resource layer enforces and the options a graphics
//! context is created with.

/// Driver-imposed limits.
///
/// The uniform table of every program is bounded by
/// `max_uniform_locations`; texture units are accepted in
/// `0..max_texture_units`; vertex attribute indices in
/// `0..max_vertex_attributes`. Textures are at most `max_texture_size`
/// texels along either side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_uniform_locations: usize,
    pub max_texture_units: u32,
    pub max_vertex_attributes: u32,
    pub max_texture_size: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_uniform_locations: 1024,
            max_texture_units: 32,
            max_vertex_attributes: 16,
            max_texture_size: 16384,
        }
    }
}

impl Limits {
    pub fn with_max_uniform_locations(mut self, count: usize) -> Self {
        self.max_uniform_locations = count;
        self
    }

    pub fn with_max_texture_units(mut self, count: u32) -> Self {
        self.max_texture_units = count;
        self
    }

    pub fn with_max_vertex_attributes(mut self, count: u32) -> Self {
        self.max_vertex_attributes = count;
        self
    }

    pub fn with_max_texture_size(mut self, size: u32) -> Self {
        self.max_texture_size = size;
        self
    }
}

/// Options used when a graphics context is initialised.
#[derive(Debug, Clone, Default)]
pub struct ContextConfig {
    /// Overrides the limits reported by the driver. Each field is clamped to
    /// the driver's own limit, so this can only tighten them.
    pub limits: Option<Limits>,
    /// Log at debug level whenever a bind is skipped because the resource is
    /// already current.
    pub warn_on_redundant_bind: bool,
}

impl ContextConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder pattern: tighten the driver limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = Some(limits);
        self
    }

    /// Builder pattern: report redundant binds
    pub fn with_redundant_bind_logging(mut self) -> Self {
        self.warn_on_redundant_bind = true;
        self
    }

    /// Limits actually in force for a driver reporting `driver`.
    pub fn effective_limits(&self, driver: Limits) -> Limits {
        match self.limits {
            None => driver,
            Some(requested) => Limits {
                max_uniform_locations: requested
                    .max_uniform_locations
                    .min(driver.max_uniform_locations),
                max_texture_units: requested.max_texture_units.min(driver.max_texture_units),
                max_vertex_attributes: requested
                    .max_vertex_attributes
                    .min(driver.max_vertex_attributes),
                max_texture_size: requested.max_texture_size.min(driver.max_texture_size),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_limits_only_tighten() {
        let driver = Limits::default();
        let config = ContextConfig::new().with_limits(
            Limits::default()
                .with_max_uniform_locations(4)
                .with_max_texture_units(64),
        );
        let limits = config.effective_limits(driver);
        assert_eq!(limits.max_uniform_locations, 4);
        assert_eq!(limits.max_texture_units, 32);
        assert_eq!(limits.max_vertex_attributes, 16);
    }

    #[test]
    fn test_default_uses_driver_limits() {
        let driver = Limits::default().with_max_vertex_attributes(8);
        assert_eq!(ContextConfig::default().effective_limits(driver), driver);
    }
}

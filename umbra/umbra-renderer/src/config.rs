//! Umbra configuration: startup options (`UmbraConfig`) and runtime-tunable shadow settings.

use umbra_field::pcss::{LightProjection, PcssParams, SampleCount};
use umbra_field::soft_shadow::{MarchParams, MAX_SOFTNESS, MIN_SOFTNESS};

/// Which estimator the composite pass evaluates per fragment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ShadowTechnique {
    #[default]
    ShadowMap,
    DistanceField,
}

impl ShadowTechnique {
    pub fn toggled(self) -> Self {
        match self {
            Self::ShadowMap => Self::DistanceField,
            Self::DistanceField => Self::ShadowMap,
        }
    }

    pub(crate) fn index(self) -> u32 {
        match self {
            Self::ShadowMap => 0,
            Self::DistanceField => 1,
        }
    }
}

/// Debug output of the composite pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Visualization {
    #[default]
    Shaded,
    /// Blocker search hits over the tap count; march steps over the step limit for fields.
    NumBlockers,
    /// PCSS penumbra width; `1 - min(k*d/t)` for fields.
    PenumbraWidth,
}

impl Visualization {
    pub fn next(self) -> Self {
        match self {
            Self::Shaded => Self::NumBlockers,
            Self::NumBlockers => Self::PenumbraWidth,
            Self::PenumbraWidth => Self::Shaded,
        }
    }

    pub(crate) fn index(self) -> u32 {
        match self {
            Self::Shaded => 0,
            Self::NumBlockers => 1,
            Self::PenumbraWidth => 2,
        }
    }
}

/// Scalar settings stepped from the keyboard, one at a time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Tunable {
    #[default]
    LightSize,
    DepthBias,
    LightNear,
    LightFar,
    MarchStart,
    MarchEnd,
    MaxSteps,
}

impl Tunable {
    pub const ALL: [Tunable; 7] = [
        Self::LightSize,
        Self::DepthBias,
        Self::LightNear,
        Self::LightFar,
        Self::MarchStart,
        Self::MarchEnd,
        Self::MaxSteps,
    ];

    pub fn next(self) -> Self {
        let i = Self::ALL.iter().position(|t| *t == self).unwrap_or(0);
        Self::ALL[(i + 1) % Self::ALL.len()]
    }

    /// Change per key press.
    pub fn increment(self) -> f32 {
        match self {
            Self::LightSize => 0.005,
            Self::DepthBias => 0.0005,
            Self::LightNear | Self::LightFar => 5.0,
            Self::MarchStart => 0.01,
            Self::MarchEnd => 5.0,
            Self::MaxSteps => 8.0,
        }
    }
}

/// Renderer and bake configuration, fixed at startup.
#[derive(Clone, Debug)]
pub struct UmbraConfig {
    /// Initial estimator; toggled at runtime through `ShadowSettings`.
    pub technique: ShadowTechnique,
    /// Light depth map resolution (square).
    pub shadow_map_size: u32,
    /// Swapchain texture format for the composite pass.
    pub surface_format: wgpu::TextureFormat,
    /// Voxel size for on-line bakes.
    pub sdf_spacing: f32,
    /// Empty voxels around each mesh.
    pub sdf_padding: u32,
    /// Upper bound on voxels along a mesh's longest axis; coarsens `sdf_spacing` for large meshes.
    pub sdf_max_resolution: u32,
}

impl Default for UmbraConfig {
    fn default() -> Self {
        Self {
            technique: ShadowTechnique::default(),
            shadow_map_size: 2048,
            surface_format: wgpu::TextureFormat::Bgra8UnormSrgb,
            sdf_spacing: 0.1,
            sdf_padding: umbra_field::DEFAULT_PADDING,
            sdf_max_resolution: 128,
        }
    }
}

impl UmbraConfig {
    /// Defaults overridden by `UMBRA_SHADOW_MAP_SIZE`, `UMBRA_SDF_SPACING`, `UMBRA_SDF_PADDING`
    /// and `UMBRA_SDF_MAX_RESOLUTION`.
    /// Unparseable or out-of-range values are ignored with a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(size) = parse_var::<u32>(&lookup, "UMBRA_SHADOW_MAP_SIZE") {
            if (256..=8192).contains(&size) {
                config.shadow_map_size = size;
            } else {
                log::warn!("UMBRA_SHADOW_MAP_SIZE={} outside 256..=8192, keeping {}", size, config.shadow_map_size);
            }
        }
        if let Some(spacing) = parse_var::<f32>(&lookup, "UMBRA_SDF_SPACING") {
            if spacing.is_finite() && spacing > 0.0 {
                config.sdf_spacing = spacing;
            } else {
                log::warn!("UMBRA_SDF_SPACING={} must be > 0, keeping {}", spacing, config.sdf_spacing);
            }
        }
        if let Some(padding) = parse_var::<u32>(&lookup, "UMBRA_SDF_PADDING") {
            config.sdf_padding = padding;
        }
        if let Some(res) = parse_var::<u32>(&lookup, "UMBRA_SDF_MAX_RESOLUTION") {
            if (8..=1024).contains(&res) {
                config.sdf_max_resolution = res;
            } else {
                log::warn!("UMBRA_SDF_MAX_RESOLUTION={} outside 8..=1024, keeping {}", res, config.sdf_max_resolution);
            }
        }
        config
    }

    /// Voxel spacing for a mesh spanning `extent`: the configured spacing, coarsened until the
    /// longest axis fits `sdf_max_resolution` voxels.
    pub fn spacing_for(&self, extent: glam::Vec3) -> f32 {
        let longest = extent.max_element();
        if !longest.is_finite() || longest <= 0.0 {
            return self.sdf_spacing;
        }
        self.sdf_spacing.max(longest / self.sdf_max_resolution.max(1) as f32)
    }
}

fn parse_var<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            log::warn!("ignoring {}={:?}: not a number", key, raw);
            None
        }
    }
}

/// Runtime-tunable shadow parameters. Every setter clamps to the documented range.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShadowSettings {
    pub technique: ShadowTechnique,
    pub visualization: Visualization,
    pub march: MarchParams,
    pub pcss: PcssParams,
    /// Added to the light colour's contribution as flat fill light.
    pub ambient: f32,
    /// Draw the light's view volume as a wireframe.
    pub show_light_frustum: bool,
}

impl Default for ShadowSettings {
    fn default() -> Self {
        Self {
            technique: ShadowTechnique::default(),
            visualization: Visualization::default(),
            march: MarchParams::default(),
            pcss: PcssParams::default(),
            ambient: 0.05,
            show_light_frustum: false,
        }
    }
}

impl ShadowSettings {
    pub const LIGHT_SIZE_RANGE: (f32, f32) = (0.0, 1.0);
    pub const BIAS_RANGE: (f32, f32) = (0.0, 1.0);
    pub const SOFTNESS_RANGE: (f32, f32) = (MIN_SOFTNESS, MAX_SOFTNESS);
    pub const MAX_STEPS_RANGE: (u32, u32) = (1, 512);
    pub const MARCH_START_RANGE: (f32, f32) = (1e-4, 10.0);
    pub const MARCH_END_RANGE: (f32, f32) = (1.0, 2000.0);

    pub fn set_softness(&mut self, k: f32) {
        self.march.softness_k = clamp_f32(k, Self::SOFTNESS_RANGE);
    }

    /// Multiplies softness by `factor`, staying within range.
    pub fn scale_softness(&mut self, factor: f32) {
        self.set_softness(self.march.softness_k * factor);
    }

    pub fn set_light_size(&mut self, size: f32) {
        self.pcss.light_size = clamp_f32(size, Self::LIGHT_SIZE_RANGE);
    }

    pub fn set_bias(&mut self, bias: f32) {
        self.pcss.depth_bias = clamp_f32(bias, Self::BIAS_RANGE);
    }

    /// Light frustum planes; `far` is kept strictly beyond `near`.
    pub fn set_light_planes(&mut self, near: f32, far: f32) {
        let near = if near.is_finite() { near.max(0.01) } else { self.pcss.near };
        let far = if far.is_finite() { far } else { self.pcss.far };
        self.pcss.near = near;
        self.pcss.far = far.max(near + 0.01);
    }

    pub fn set_max_steps(&mut self, steps: u32) {
        self.march.max_steps = steps.clamp(Self::MAX_STEPS_RANGE.0, Self::MAX_STEPS_RANGE.1);
    }

    /// March interval; `t_max` is kept strictly beyond `t_min`.
    pub fn set_march_range(&mut self, t_min: f32, t_max: f32) {
        let t_min = clamp_f32(t_min, Self::MARCH_START_RANGE);
        let t_max = if t_max.is_nan() { self.march.t_max } else { t_max };
        self.march.t_min = t_min;
        self.march.t_max = t_max.clamp(Self::MARCH_END_RANGE.0, Self::MARCH_END_RANGE.1).max(t_min + 0.01);
    }

    pub fn value(&self, tunable: Tunable) -> f32 {
        match tunable {
            Tunable::LightSize => self.pcss.light_size,
            Tunable::DepthBias => self.pcss.depth_bias,
            Tunable::LightNear => self.pcss.near,
            Tunable::LightFar => self.pcss.far,
            Tunable::MarchStart => self.march.t_min,
            Tunable::MarchEnd => self.march.t_max,
            Tunable::MaxSteps => self.march.max_steps as f32,
        }
    }

    /// Moves `tunable` by `presses` increments through its clamped setter.
    pub fn adjust(&mut self, tunable: Tunable, presses: f32) {
        let v = self.value(tunable) + tunable.increment() * presses;
        match tunable {
            Tunable::LightSize => self.set_light_size(v),
            Tunable::DepthBias => self.set_bias(v),
            Tunable::LightNear => self.set_light_planes(v, self.pcss.far),
            Tunable::LightFar => self.set_light_planes(self.pcss.near, v),
            Tunable::MarchStart => self.set_march_range(v, self.march.t_max),
            Tunable::MarchEnd => self.set_march_range(self.march.t_min, v),
            Tunable::MaxSteps => self.set_max_steps(if v.is_finite() { v.round().max(0.0) as u32 } else { 0 }),
        }
    }

    pub fn set_blocker_samples(&mut self, samples: SampleCount) {
        self.pcss.blocker_samples = samples;
    }

    pub fn set_pcf_samples(&mut self, samples: SampleCount) {
        self.pcss.pcf_samples = samples;
    }

    pub fn toggle_projection(&mut self) {
        self.pcss.projection = self.pcss.projection.toggled();
    }

    pub fn is_orthographic(&self) -> bool {
        self.pcss.projection == LightProjection::Orthographic
    }

    /// One-line summary for the settings report.
    pub fn summary(&self) -> String {
        format!(
            "technique {:?}, view {:?}, k {:.3}, t {:.3}..{:.1}, steps {}, light size {:.3}, bias {:.4}, planes {:.1}..{:.1}, {:?} light, blocker/pcf taps {}/{}",
            self.technique,
            self.visualization,
            self.march.softness_k,
            self.march.t_min,
            self.march.t_max,
            self.march.max_steps,
            self.pcss.light_size,
            self.pcss.depth_bias,
            self.pcss.near,
            self.pcss.far,
            self.pcss.projection,
            self.pcss.blocker_samples.count(),
            self.pcss.pcf_samples.count(),
        )
    }
}

fn clamp_f32(v: f32, (lo, hi): (f32, f32)) -> f32 {
    if v.is_nan() {
        lo
    } else {
        v.clamp(lo, hi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn env_overrides_and_rejects() {
        let vars: HashMap<&str, &str> =
            [("UMBRA_SHADOW_MAP_SIZE", "1024"), ("UMBRA_SDF_SPACING", "-1"), ("UMBRA_SDF_PADDING", "two")]
                .into_iter()
                .collect();
        let config = UmbraConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.shadow_map_size, 1024);
        assert_eq!(config.sdf_spacing, 0.1);
        assert_eq!(config.sdf_padding, umbra_field::DEFAULT_PADDING);
    }

    #[test]
    fn spacing_coarsens_for_large_meshes() {
        let config = UmbraConfig::default();
        assert_eq!(config.spacing_for(glam::Vec3::splat(10.0)), 0.1);
        assert_eq!(config.spacing_for(glam::Vec3::new(4.0, 256.0, 8.0)), 2.0);
        assert_eq!(config.spacing_for(glam::Vec3::ZERO), 0.1);
    }

    #[test]
    fn setters_clamp() {
        let mut s = ShadowSettings::default();
        s.set_light_size(4.0);
        assert_eq!(s.pcss.light_size, 1.0);
        s.set_bias(-1.0);
        assert_eq!(s.pcss.depth_bias, 0.0);
        s.set_softness(0.0);
        assert_eq!(s.march.softness_k, MIN_SOFTNESS);
        s.set_softness(f32::NAN);
        assert_eq!(s.march.softness_k, MIN_SOFTNESS);
        s.scale_softness(1e9);
        assert_eq!(s.march.softness_k, MAX_SOFTNESS);
        s.set_max_steps(0);
        assert_eq!(s.march.max_steps, 1);
        s.set_light_planes(200.0, 100.0);
        assert!(s.pcss.far > s.pcss.near);
    }

    #[test]
    fn tunables_step_through_clamped_setters() {
        let mut s = ShadowSettings::default();
        s.adjust(Tunable::LightSize, 2.0);
        assert!((s.pcss.light_size - 0.08).abs() < 1e-6);
        s.adjust(Tunable::DepthBias, -100.0);
        assert_eq!(s.pcss.depth_bias, 0.0);
        s.adjust(Tunable::LightNear, 1.0);
        assert_eq!(s.pcss.near, 125.0);
        s.adjust(Tunable::LightFar, -100.0);
        assert!(s.pcss.far > s.pcss.near);
        s.adjust(Tunable::MarchStart, 1.0);
        assert!((s.march.t_min - 0.06).abs() < 1e-6);
        s.adjust(Tunable::MarchEnd, -1000.0);
        assert_eq!(s.march.t_max, ShadowSettings::MARCH_END_RANGE.0);
        s.adjust(Tunable::MaxSteps, -100.0);
        assert_eq!(s.march.max_steps, 1);
        s.adjust(Tunable::MaxSteps, 1.0);
        assert_eq!(s.march.max_steps, 9);
    }

    #[test]
    fn march_range_stays_ordered() {
        let mut s = ShadowSettings::default();
        s.set_march_range(50.0, 5.0);
        assert_eq!(s.march.t_min, ShadowSettings::MARCH_START_RANGE.1);
        assert!(s.march.t_max > s.march.t_min);
        s.set_march_range(f32::NAN, f32::NAN);
        assert_eq!(s.march.t_min, ShadowSettings::MARCH_START_RANGE.0);
        assert!(s.march.t_max > s.march.t_min);
    }

    #[test]
    fn tunable_cycle_visits_every_entry() {
        let mut t = Tunable::default();
        for _ in 0..Tunable::ALL.len() {
            t = t.next();
        }
        assert_eq!(t, Tunable::default());
        assert_eq!(Tunable::MaxSteps.next(), Tunable::LightSize);
    }

    #[test]
    fn cycles_wrap() {
        assert_eq!(Visualization::PenumbraWidth.next(), Visualization::Shaded);
        assert_eq!(ShadowTechnique::ShadowMap.toggled().toggled(), ShadowTechnique::ShadowMap);
        let mut s = ShadowSettings::default();
        assert!(s.is_orthographic());
        s.toggle_projection();
        assert!(!s.is_orthographic());
    }
}

//! Percentage-closer soft shadows over a light-space depth map.
//!
//! CPU reference for the shadow-map branch of `composite.wgsl`: a blocker search sized by the
//! light's area, a penumbra estimate from the average blocker depth, then PCF over a disk of
//! that size. Depths are wgpu-style normalized `[0, 1]`; comparisons happen in normalized depth
//! and distances in linear depth.

use glam::Vec2;
use render_api::RenderError;

/// Depth read for taps that fall outside the map.
pub const BORDER_DEPTH: f32 = 1.0;

const GOLDEN_ANGLE: f32 = 2.399_963_2;

/// Tap counts offered for the blocker search and the PCF filter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SampleCount {
    S25,
    S32,
    S64,
    S100,
    S128,
}

impl SampleCount {
    pub const ALL: [SampleCount; 5] = [Self::S25, Self::S32, Self::S64, Self::S100, Self::S128];
    pub const MAX: u32 = 128;

    pub fn count(self) -> u32 {
        match self {
            Self::S25 => 25,
            Self::S32 => 32,
            Self::S64 => 64,
            Self::S100 => 100,
            Self::S128 => 128,
        }
    }

    pub fn from_count(n: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.count() == n)
    }

    /// Next preset, wrapping from 128 back to 25.
    pub fn next(self) -> Self {
        let i = Self::ALL.iter().position(|&s| s == self).unwrap_or(0);
        Self::ALL[(i + 1) % Self::ALL.len()]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LightProjection {
    Orthographic,
    Perspective,
}

impl LightProjection {
    pub fn toggled(self) -> Self {
        match self {
            Self::Orthographic => Self::Perspective,
            Self::Perspective => Self::Orthographic,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PcssParams {
    pub near: f32,
    pub far: f32,
    /// Light source size in shadow map uv units.
    pub light_size: f32,
    /// Subtracted from the receiver's normalized depth before any comparison.
    pub depth_bias: f32,
    pub blocker_search_scale: f32,
    pub blocker_samples: SampleCount,
    pub pcf_samples: SampleCount,
    pub projection: LightProjection,
}

impl Default for PcssParams {
    fn default() -> Self {
        Self {
            near: 120.0,
            far: 250.0,
            light_size: 0.07,
            depth_bias: 0.008,
            blocker_search_scale: 1.0,
            blocker_samples: SampleCount::S128,
            pcf_samples: SampleCount::S128,
            projection: LightProjection::Orthographic,
        }
    }
}

/// Square-texel depth map addressed by uv with nearest filtering.
#[derive(Clone, Debug)]
pub struct DepthMap {
    width: u32,
    height: u32,
    depths: Vec<f32>,
}

impl DepthMap {
    pub fn new(width: u32, height: u32, depths: Vec<f32>) -> Result<Self, RenderError> {
        if width == 0 || height == 0 || depths.len() != width as usize * height as usize {
            return Err(RenderError::geometry(format!(
                "{} depths for a {}x{} map",
                depths.len(),
                width,
                height
            )));
        }
        Ok(Self { width, height, depths })
    }

    pub fn filled(width: u32, height: u32, depth: f32) -> Result<Self, RenderError> {
        Self::new(width, height, vec![depth; width as usize * height as usize])
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn set(&mut self, x: u32, y: u32, depth: f32) {
        if x < self.width && y < self.height {
            self.depths[(y * self.width + x) as usize] = depth;
        }
    }

    pub fn depth_at(&self, uv: Vec2) -> f32 {
        if !(uv.x >= 0.0 && uv.x < 1.0 && uv.y >= 0.0 && uv.y < 1.0) {
            return BORDER_DEPTH;
        }
        let x = ((uv.x * self.width as f32) as u32).min(self.width - 1);
        let y = ((uv.y * self.height as f32) as u32).min(self.height - 1);
        self.depths[(y * self.width + x) as usize]
    }
}

/// Normalized `[0, 1]` depth to view-space distance from the light.
pub fn linearize_depth(z: f32, near: f32, far: f32, projection: LightProjection) -> f32 {
    match projection {
        LightProjection::Orthographic => near + z * (far - near),
        LightProjection::Perspective => near * far / (far - z * (far - near)),
    }
}

/// `count` points of a Vogel (golden angle) spiral filling the unit disk.
pub fn disk_taps(count: u32) -> Vec<Vec2> {
    let n = count.max(1) as f32;
    (0..count)
        .map(|i| {
            let r = ((i as f32 + 0.5) / n).sqrt();
            let theta = i as f32 * GOLDEN_ANGLE;
            Vec2::new(theta.cos(), theta.sin()) * r
        })
        .collect()
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlockerSearch {
    pub count: u32,
    /// Mean linear depth of the blockers; zero when none were found.
    pub avg_depth: f32,
}

/// Blocker search radius in uv for a receiver at linear depth `receiver`.
pub fn search_radius(receiver: f32, params: &PcssParams) -> f32 {
    if receiver <= 0.0 {
        return 0.0;
    }
    params.light_size * (receiver - params.near) / receiver * params.blocker_search_scale
}

pub fn find_blockers(map: &DepthMap, uv: Vec2, receiver_z: f32, params: &PcssParams) -> BlockerSearch {
    let biased = receiver_z - params.depth_bias;
    let receiver = linearize_depth(biased, params.near, params.far, params.projection);
    let radius = search_radius(receiver, params);
    let mut count = 0u32;
    let mut sum = 0.0f32;
    for tap in disk_taps(params.blocker_samples.count()) {
        let z = map.depth_at(uv + tap * radius);
        if z < biased {
            count += 1;
            sum += linearize_depth(z, params.near, params.far, params.projection);
        }
    }
    BlockerSearch { count, avg_depth: if count > 0 { sum / count as f32 } else { 0.0 } }
}

/// Penumbra width in uv from similar triangles between light, blocker and receiver.
pub fn penumbra_width(receiver: f32, avg_blocker: f32, light_size: f32) -> f32 {
    if avg_blocker <= 0.0 {
        return 0.0;
    }
    (receiver - avg_blocker) / avg_blocker * light_size
}

/// Fraction of `pcf_samples` taps within `radius` whose depth is not in front of the receiver.
pub fn pcf(map: &DepthMap, uv: Vec2, receiver_z: f32, radius: f32, params: &PcssParams) -> f32 {
    let biased = receiver_z - params.depth_bias;
    let taps = disk_taps(params.pcf_samples.count());
    let lit = taps.iter().filter(|&&tap| map.depth_at(uv + tap * radius) >= biased).count();
    lit as f32 / taps.len() as f32
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PcssResult {
    pub visibility: f32,
    pub blockers: u32,
    pub penumbra: f32,
}

/// Visibility of a receiver at shadow map `uv` with normalized light depth `receiver_z`.
pub fn estimate(map: &DepthMap, uv: Vec2, receiver_z: f32, params: &PcssParams) -> PcssResult {
    let search = find_blockers(map, uv, receiver_z, params);
    if search.count == 0 {
        return PcssResult { visibility: 1.0, blockers: 0, penumbra: 0.0 };
    }
    let receiver = linearize_depth(receiver_z - params.depth_bias, params.near, params.far, params.projection);
    let penumbra = penumbra_width(receiver, search.avg_depth, params.light_size);
    PcssResult {
        visibility: pcf(map, uv, receiver_z, penumbra, params),
        blockers: search.count,
        penumbra,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_cycle_and_round_trip_counts() {
        assert_eq!(SampleCount::S25.next(), SampleCount::S32);
        assert_eq!(SampleCount::S128.next(), SampleCount::S25);
        for s in SampleCount::ALL {
            assert_eq!(SampleCount::from_count(s.count()), Some(s));
            assert!(s.count() <= SampleCount::MAX);
        }
        assert_eq!(SampleCount::from_count(48), None);
    }

    #[test]
    fn linearize_hits_the_planes() {
        for proj in [LightProjection::Orthographic, LightProjection::Perspective] {
            assert!((linearize_depth(0.0, 120.0, 250.0, proj) - 120.0).abs() < 1e-3);
            assert!((linearize_depth(1.0, 120.0, 250.0, proj) - 250.0).abs() < 1e-3);
        }
        let mid = linearize_depth(0.5, 120.0, 250.0, LightProjection::Orthographic);
        assert!((mid - 185.0).abs() < 1e-3);
    }

    #[test]
    fn disk_taps_stay_in_the_unit_disk() {
        for s in SampleCount::ALL {
            let taps = disk_taps(s.count());
            assert_eq!(taps.len() as u32, s.count());
            assert!(taps.iter().all(|t| t.length() <= 1.0));
        }
    }

    #[test]
    fn no_blockers_means_fully_lit() {
        let map = DepthMap::filled(64, 64, 0.9).unwrap();
        for blocker in SampleCount::ALL {
            for pcf_samples in SampleCount::ALL {
                let params = PcssParams { blocker_samples: blocker, pcf_samples, ..PcssParams::default() };
                let r = estimate(&map, Vec2::splat(0.5), 0.5, &params);
                assert_eq!(r.visibility, 1.0);
                assert_eq!(r.blockers, 0);
            }
        }
    }

    #[test]
    fn fully_covered_receiver_is_dark() {
        let map = DepthMap::filled(64, 64, 0.2).unwrap();
        let params = PcssParams::default();
        let r = estimate(&map, Vec2::splat(0.5), 0.8, &params);
        assert_eq!(r.blockers, params.blocker_samples.count());
        assert_eq!(r.visibility, 0.0);
        let receiver = linearize_depth(0.8 - params.depth_bias, params.near, params.far, params.projection);
        let blocker = linearize_depth(0.2, params.near, params.far, params.projection);
        assert!((r.penumbra - (receiver - blocker) / blocker * params.light_size).abs() < 1e-5);
    }

    #[test]
    fn bias_suppresses_self_shadowing() {
        let map = DepthMap::filled(32, 32, 0.5).unwrap();
        let r = estimate(&map, Vec2::splat(0.5), 0.505, &PcssParams::default());
        assert_eq!(r.visibility, 1.0);
    }

    #[test]
    fn taps_outside_the_map_read_the_border() {
        let map = DepthMap::filled(8, 8, 0.0).unwrap();
        assert_eq!(map.depth_at(Vec2::new(-0.1, 0.5)), BORDER_DEPTH);
        assert_eq!(map.depth_at(Vec2::new(0.5, 1.0)), BORDER_DEPTH);
        assert_eq!(map.depth_at(Vec2::new(0.5, 0.5)), 0.0);
    }

    #[test]
    fn half_covered_edge_is_partially_lit() {
        // blocker over the left half of the map
        let mut map = DepthMap::filled(256, 256, 1.0).unwrap();
        for y in 0..256 {
            for x in 0..128 {
                map.set(x, y, 0.1);
            }
        }
        let r = estimate(&map, Vec2::new(0.5, 0.5), 0.9, &PcssParams::default());
        assert!(r.blockers > 0);
        assert!(r.visibility > 0.0 && r.visibility < 1.0, "visibility {}", r.visibility);
    }

    #[test]
    fn penumbra_grows_with_receiver_distance() {
        let near = penumbra_width(150.0, 130.0, 0.07);
        let far = penumbra_width(200.0, 130.0, 0.07);
        assert!(far > near && near > 0.0);
        assert_eq!(penumbra_width(150.0, 0.0, 0.07), 0.0);
    }
}

//! Social context pooling: for one agent at one frame, aggregate the
//! relative positions of every other present agent into a fixed-size grid
//! feature. Selected once at construction from configuration names;
//! `Combined` composes the other variants recursively.

use burn::config::Config;

use crate::error::Error;

#[derive(Config, Debug)]
pub struct GridConfig {
    /// Cells per axis.
    #[config(default = 4)]
    pub grid_size: usize,

    /// Total spatial extent of the grid, centered on the target agent.
    #[config(default = 2.0)]
    pub neighborhood_size: f32,

    /// When true, neighbors outside the extent are clamped to the border
    /// cell instead of being excluded.
    #[config(default = false)]
    pub clip_out_of_bounds: bool,
}

/// Spatial binning shared by the social and occupancy variants.
#[derive(Debug, Clone)]
pub struct GridPooling {
    grid_size: usize,
    neighborhood_size: f32,
    clip_out_of_bounds: bool,
}

impl GridPooling {
    fn new(config: &GridConfig) -> Result<Self, Error> {
        if config.grid_size == 0 {
            return Err(Error::Config("grid_size must be positive".into()));
        }
        if config.neighborhood_size <= 0.0 {
            return Err(Error::Config("neighborhood_size must be positive".into()));
        }
        Ok(GridPooling {
            grid_size: config.grid_size,
            neighborhood_size: config.neighborhood_size,
            clip_out_of_bounds: config.clip_out_of_bounds,
        })
    }

    fn output_len(&self) -> usize {
        self.grid_size * self.grid_size
    }

    /// Cell index for a relative offset, or `None` when the neighbor falls
    /// outside the extent and clipping is off.
    fn cell_of(&self, dx: f32, dy: f32) -> Option<usize> {
        let half = self.neighborhood_size / 2.0;
        if !self.clip_out_of_bounds && (dx < -half || dx >= half || dy < -half || dy >= half) {
            return None;
        }
        let cell_size = self.neighborhood_size / self.grid_size as f32;
        let max = self.grid_size as isize - 1;
        let cx = (((dx + half) / cell_size).floor() as isize).clamp(0, max) as usize;
        let cy = (((dy + half) / cell_size).floor() as isize).clamp(0, max) as usize;
        Some(cy * self.grid_size + cx)
    }

    fn accumulate(
        &self,
        positions: &[f32],
        mask: &[bool],
        slots: usize,
        frame: usize,
        slot: usize,
        weighted: bool,
        out: &mut [f32],
    ) {
        if !mask[frame * slots + slot] {
            return;
        }
        let target = (frame * slots + slot) * 2;
        let (tx, ty) = (positions[target], positions[target + 1]);

        for other in 0..slots {
            if other == slot || !mask[frame * slots + other] {
                continue;
            }
            let base = (frame * slots + other) * 2;
            let dx = positions[base] - tx;
            let dy = positions[base + 1] - ty;
            if let Some(cell) = self.cell_of(dx, dy) {
                out[cell] += if weighted {
                    1.0 / (1.0 + (dx * dx + dy * dy).sqrt())
                } else {
                    1.0
                };
            }
        }
    }
}

/// Tagged pooling variant, chosen once at construction.
#[derive(Debug, Clone)]
pub enum PoolingModule {
    /// Distance-damped aggregate of neighbor offsets per grid cell.
    Social(GridPooling),
    /// Plain neighbor-count histogram per grid cell.
    Occupancy(GridPooling),
    /// Ordered sub-modules; features concatenated in declared order.
    Combined(Vec<PoolingModule>),
}

impl PoolingModule {
    pub fn from_name(name: &str, grid: &GridConfig) -> Result<Self, Error> {
        match name {
            "social" => Ok(PoolingModule::Social(GridPooling::new(grid)?)),
            "occupancy" => Ok(PoolingModule::Occupancy(GridPooling::new(grid)?)),
            other => Err(Error::Config(format!(
                "unknown pooling module '{}'",
                other
            ))),
        }
    }

    /// One name builds that module; several build a `Combined` in declared
    /// order, all sharing `grid`. An empty list is a configuration error.
    pub fn from_names(names: &[String], grid: &GridConfig) -> Result<Self, Error> {
        match names {
            [] => Err(Error::Config("pooling module list is empty".into())),
            [name] => Self::from_name(name, grid),
            names => Self::combined(
                names
                    .iter()
                    .map(|name| Self::from_name(name, grid))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
        }
    }

    /// Composes independently configured sub-modules.
    pub fn combined(modules: Vec<PoolingModule>) -> Result<Self, Error> {
        if modules.is_empty() {
            return Err(Error::Config("pooling module list is empty".into()));
        }
        Ok(PoolingModule::Combined(modules))
    }

    pub fn output_len(&self) -> usize {
        match self {
            PoolingModule::Social(grid) | PoolingModule::Occupancy(grid) => grid.output_len(),
            PoolingModule::Combined(modules) => modules.iter().map(|m| m.output_len()).sum(),
        }
    }

    /// Writes the feature vector for one agent-slot at one frame into
    /// `out` (length `output_len()`, zeroed by the caller). No present
    /// neighbors leaves it all zero.
    pub fn compute(
        &self,
        positions: &[f32],
        mask: &[bool],
        slots: usize,
        frame: usize,
        slot: usize,
        out: &mut [f32],
    ) {
        match self {
            PoolingModule::Social(grid) => {
                grid.accumulate(positions, mask, slots, frame, slot, true, out)
            }
            PoolingModule::Occupancy(grid) => {
                grid.accumulate(positions, mask, slots, frame, slot, false, out)
            }
            PoolingModule::Combined(modules) => {
                let mut offset = 0;
                for module in modules {
                    let len = module.output_len();
                    module.compute(
                        positions,
                        mask,
                        slots,
                        frame,
                        slot,
                        &mut out[offset..offset + len],
                    );
                    offset += len;
                }
            }
        }
    }

    /// Materializes the `[frames, slots, output_len]` feature tensor for a
    /// whole window.
    pub fn features(
        &self,
        positions: &[f32],
        mask: &[bool],
        frames: usize,
        slots: usize,
    ) -> Vec<f32> {
        let len = self.output_len();
        let mut out = vec![0.0f32; frames * slots * len];
        for frame in 0..frames {
            for slot in 0..slots {
                let base = (frame * slots + slot) * len;
                self.compute(
                    positions,
                    mask,
                    slots,
                    frame,
                    slot,
                    &mut out[base..base + len],
                );
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SLOTS: usize = 4;

    /// One frame: target at the origin plus three neighbors inside a 4.0
    /// extent and one far outside it.
    fn scene() -> (Vec<f32>, Vec<bool>) {
        let positions = vec![
            0.0, 0.0, // slot 0, target
            0.5, 0.5, // slot 1
            -0.5, -0.5, // slot 2
            100.0, 100.0, // slot 3, out of bounds
        ];
        (positions, vec![true; SLOTS])
    }

    #[test]
    fn occupancy_sums_to_in_bounds_neighbor_count() {
        let (positions, mask) = scene();
        let module =
            PoolingModule::from_name("occupancy", &GridConfig::new().with_neighborhood_size(4.0))
                .unwrap();

        let mut out = vec![0.0; module.output_len()];
        module.compute(&positions, &mask, SLOTS, 0, 0, &mut out);
        assert_eq!(out.iter().sum::<f32>(), 2.0);
    }

    #[test]
    fn clipping_claims_out_of_bounds_neighbors_for_border_cells() {
        let (positions, mask) = scene();
        let grid = GridConfig::new()
            .with_neighborhood_size(4.0)
            .with_clip_out_of_bounds(true);
        let module = PoolingModule::from_name("occupancy", &grid).unwrap();

        let mut out = vec![0.0; module.output_len()];
        module.compute(&positions, &mask, SLOTS, 0, 0, &mut out);
        assert_eq!(out.iter().sum::<f32>(), 3.0);
        // The far neighbor lands in the top-right border cell.
        assert_eq!(out[module.output_len() - 1], 1.0);
    }

    #[test]
    fn social_weights_decay_with_distance() {
        let (positions, mask) = scene();
        let module =
            PoolingModule::from_name("social", &GridConfig::new().with_neighborhood_size(4.0))
                .unwrap();

        let mut out = vec![0.0; module.output_len()];
        module.compute(&positions, &mask, SLOTS, 0, 0, &mut out);

        let total: f32 = out.iter().sum();
        let dist = (0.5f32 * 0.5 + 0.5 * 0.5).sqrt();
        let expected = 2.0 / (1.0 + dist);
        assert!((total - expected).abs() < 1e-6);
    }

    #[test]
    fn neighbors_bin_into_quadrant_cells() {
        let (positions, mask) = scene();
        let grid = GridConfig::new().with_grid_size(2).with_neighborhood_size(4.0);
        let module = PoolingModule::from_name("occupancy", &grid).unwrap();

        let mut out = vec![0.0; module.output_len()];
        module.compute(&positions, &mask, SLOTS, 0, 0, &mut out);
        // Slot 1 is up-right (cell 3), slot 2 down-left (cell 0).
        assert_eq!(out, vec![1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn lone_agent_gets_all_zero_features() {
        let positions = vec![0.0; SLOTS * 2];
        let mut mask = vec![false; SLOTS];
        mask[0] = true;

        let module = PoolingModule::from_name("social", &GridConfig::new()).unwrap();
        let mut out = vec![0.0; module.output_len()];
        module.compute(&positions, &mask, SLOTS, 0, 0, &mut out);
        assert!(out.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn combined_concatenates_in_declared_order() {
        let (positions, mask) = scene();
        let social_grid = GridConfig::new().with_grid_size(2).with_neighborhood_size(4.0);
        let occupancy_grid = GridConfig::new().with_grid_size(3).with_neighborhood_size(4.0);
        let module = PoolingModule::combined(vec![
            PoolingModule::from_name("social", &social_grid).unwrap(),
            PoolingModule::from_name("occupancy", &occupancy_grid).unwrap(),
        ])
        .unwrap();

        assert_eq!(module.output_len(), 2 * 2 + 3 * 3);

        let mut out = vec![0.0; module.output_len()];
        module.compute(&positions, &mask, SLOTS, 0, 0, &mut out);

        let social_total: f32 = out[..4].iter().sum();
        let occupancy_total: f32 = out[4..].iter().sum();
        assert!(social_total > 0.0 && social_total < 2.0);
        assert_eq!(occupancy_total, 2.0);
    }

    #[test]
    fn empty_and_unknown_module_lists_are_config_errors() {
        let grid = GridConfig::new();
        assert!(matches!(
            PoolingModule::from_names(&[], &grid),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            PoolingModule::from_name("magnetic", &grid),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            PoolingModule::combined(vec![]),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn features_cover_every_frame_and_slot() {
        // Two frames, two agents side by side.
        let positions = vec![
            0.0, 0.0, 1.0, 0.0, // frame 0
            0.0, 0.0, 1.0, 0.0, // frame 1
        ];
        let mask = vec![true; 4];
        let module =
            PoolingModule::from_name("occupancy", &GridConfig::new().with_neighborhood_size(4.0))
                .unwrap();

        let features = module.features(&positions, &mask, 2, 2);
        let len = module.output_len();
        assert_eq!(features.len(), 2 * 2 * len);
        for frame in 0..2 {
            for slot in 0..2 {
                let base = (frame * 2 + slot) * len;
                let total: f32 = features[base..base + len].iter().sum();
                assert_eq!(total, 1.0);
            }
        }
    }
}

use std::collections::HashMap;

use burn::config::Config;
use tracing::debug;

use crate::data::loader::FrameLog;
use crate::error::Error;

/// Policy for choosing which agents keep a slot when a scene holds more
/// than `max_num_ped` of them. Over-populated scenes are common, so this
/// is a selection, never a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AgentSelection {
    /// Keep the first `max_num_ped` agents in first-appearance order.
    FirstSeen,
    /// Keep the agents present in the most frames of the window,
    /// first-appearance order breaking ties.
    MostPresent,
}

fn parse_selection(name: &str) -> Result<AgentSelection, Error> {
    match name {
        "first_seen" => Ok(AgentSelection::FirstSeen),
        "most_present" => Ok(AgentSelection::MostPresent),
        other => Err(Error::Config(format!(
            "unknown agent selection policy '{}'",
            other
        ))),
    }
}

#[derive(Config, Debug)]
pub struct WindowerConfig {
    pub obs_len: usize,
    pub pred_len: usize,
    pub max_num_ped: usize,

    /// Window starts are taken at every `skip`-th frame index.
    #[config(default = 1)]
    pub skip: usize,

    /// `"first_seen"` or `"most_present"`.
    #[config(default = "String::from(\"first_seen\")")]
    pub selection: String,
}

/// One fixed-length slice of a dataset: `obs_len + pred_len` frames with a
/// fixed agent-slot table of `max_num_ped` entries. Slot assignment is
/// stable across all frames of the window; agents absent from a frame are
/// padding (sentinel position, mask false). Immutable after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneWindow {
    id: usize,
    dataset: usize,
    start_frame: i64,
    agents: Vec<i64>,
    frames: usize,
    slots: usize,
    positions: Vec<f32>,
    mask: Vec<bool>,
}

impl SceneWindow {
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn dataset(&self) -> usize {
        self.dataset
    }

    /// Frame id of the first frame of the window.
    pub fn start_frame(&self) -> i64 {
        self.start_frame
    }

    /// Slot to agent-id mapping. Only the first `num_agents` slots are
    /// bound; the rest of the table is padding.
    pub fn agents(&self) -> &[i64] {
        &self.agents
    }

    pub fn num_agents(&self) -> usize {
        self.agents.len()
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn slots(&self) -> usize {
        self.slots
    }

    /// Dense `[frames, slots, 2]` row-major absolute positions, zero where
    /// the mask is false.
    pub fn positions(&self) -> &[f32] {
        &self.positions
    }

    /// Dense `[frames, slots]` presence flags.
    pub fn mask(&self) -> &[bool] {
        &self.mask
    }

    pub fn position(&self, frame: usize, slot: usize) -> [f32; 2] {
        let base = (frame * self.slots + slot) * 2;
        [self.positions[base], self.positions[base + 1]]
    }

    pub fn present(&self, frame: usize, slot: usize) -> bool {
        self.mask[frame * self.slots + slot]
    }
}

/// Slices frame logs into scene windows. Windows are derived once at
/// construction and iterated in a fixed order, so two passes over the same
/// windower see identical sequences.
#[derive(Debug, Clone)]
pub struct Windower {
    windows: Vec<SceneWindow>,
}

impl Windower {
    pub fn new(logs: &[FrameLog], config: &WindowerConfig) -> Result<Self, Error> {
        if config.obs_len == 0 || config.pred_len == 0 {
            return Err(Error::Config(
                "obs_len and pred_len must be positive".into(),
            ));
        }
        if config.max_num_ped == 0 {
            return Err(Error::Config("max_num_ped must be positive".into()));
        }
        if config.skip == 0 {
            return Err(Error::Config("skip must be positive".into()));
        }
        let selection = parse_selection(&config.selection)?;

        let trajectory_size = config.obs_len + config.pred_len;
        let mut windows = Vec::new();

        for (dataset, log) in logs.iter().enumerate() {
            let frames = log.frames();
            let before = windows.len();

            let mut start = 0;
            while start + trajectory_size <= frames.len() {
                let slice = &frames[start..start + trajectory_size];
                if let Some(window) = build_window(
                    windows.len(),
                    dataset,
                    slice,
                    config.max_num_ped,
                    selection,
                ) {
                    windows.push(window);
                }
                start += config.skip;
            }

            debug!(
                dataset,
                windows = windows.len() - before,
                "windowed dataset"
            );
        }

        Ok(Windower { windows })
    }

    pub fn num_sequences(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SceneWindow> {
        self.windows.iter()
    }

    pub fn windows(&self) -> &[SceneWindow] {
        &self.windows
    }

    pub(crate) fn into_windows(self) -> Vec<SceneWindow> {
        self.windows
    }
}

fn build_window(
    id: usize,
    dataset: usize,
    frames: &[crate::data::loader::Frame],
    max_num_ped: usize,
    selection: AgentSelection,
) -> Option<SceneWindow> {
    // Agents in first-appearance order, with per-agent presence counts.
    let mut order: Vec<i64> = Vec::new();
    let mut presence: HashMap<i64, usize> = HashMap::new();
    for frame in frames {
        for (agent, _, _) in &frame.observations {
            let count = presence.entry(*agent).or_insert(0);
            if *count == 0 {
                order.push(*agent);
            }
            *count += 1;
        }
    }

    if order.is_empty() {
        return None;
    }

    let mut agents = order.clone();
    if selection == AgentSelection::MostPresent {
        let first_seen: HashMap<i64, usize> = order
            .iter()
            .enumerate()
            .map(|(idx, agent)| (*agent, idx))
            .collect();
        agents.sort_by_key(|agent| (std::cmp::Reverse(presence[agent]), first_seen[agent]));
    }
    agents.truncate(max_num_ped);

    // A window whose primary agent shows up in fewer than two frames has
    // no frame-to-frame displacement to supervise.
    if presence[&agents[0]] < 2 {
        return None;
    }

    let trajectory_size = frames.len();
    let slots = max_num_ped;
    let slot_of: HashMap<i64, usize> = agents
        .iter()
        .enumerate()
        .map(|(slot, agent)| (*agent, slot))
        .collect();

    let mut positions = vec![0.0f32; trajectory_size * slots * 2];
    let mut mask = vec![false; trajectory_size * slots];

    for (t, frame) in frames.iter().enumerate() {
        for (agent, x, y) in &frame.observations {
            if let Some(&slot) = slot_of.get(agent) {
                let base = (t * slots + slot) * 2;
                positions[base] = *x;
                positions[base + 1] = *y;
                mask[t * slots + slot] = true;
            }
        }
    }

    Some(SceneWindow {
        id,
        dataset,
        start_frame: frames[0].frame_id,
        agents,
        frames: trajectory_size,
        slots,
        positions,
        mask,
    })
}

use std::sync::mpsc::{sync_channel, Receiver};
use std::sync::Arc;
use std::thread;

use tracing::{debug, info, warn};

use crate::coordinates::to_relative;
use crate::data::windower::{SceneWindow, Windower};
use crate::pooling::PoolingModule;

/// One fully materialized scene window: everything the model consumes for
/// a single step. Produced once by the prefetch worker, never mutated, and
/// discarded after consumption.
#[derive(Debug, Clone)]
pub struct SceneSample {
    pub window_id: usize,
    pub frames: usize,
    pub slots: usize,
    pub pooling_len: usize,
    /// `[frames, slots, 2]` absolute positions, sentinel where not present.
    pub positions: Vec<f32>,
    /// `[frames, slots]` presence mask as 0/1.
    pub mask: Vec<f32>,
    /// `[frames, slots, 2]` frame-to-frame displacements.
    pub coordinates_rel: Vec<f32>,
    /// `[frames, slots, pooling_len]` social context features.
    pub pooling: Vec<f32>,
}

fn materialize(window: &SceneWindow, pooling: &PoolingModule) -> SceneSample {
    let frames = window.frames();
    let slots = window.slots();
    let positions = window.positions().to_vec();
    let mask_bits = window.mask();

    let coordinates_rel = to_relative(&positions, mask_bits, frames, slots);
    let features = pooling.features(&positions, mask_bits, frames, slots);
    let mask = mask_bits
        .iter()
        .map(|&m| if m { 1.0 } else { 0.0 })
        .collect();

    SceneSample {
        window_id: window.id(),
        frames,
        slots,
        pooling_len: pooling.output_len(),
        positions,
        mask,
        coordinates_rel,
        pooling: features,
    }
}

/// One restartable iteration handle over a fixed window sequence. A
/// bounded worker materializes at most `prefetch` samples ahead of the
/// consumer; resetting drops the worker and starts over from the first
/// window.
struct SplitHandle {
    windows: Arc<Vec<SceneWindow>>,
    pooling: Arc<PoolingModule>,
    prefetch: usize,
    rx: Option<Receiver<SceneSample>>,
}

impl SplitHandle {
    fn new(windows: Vec<SceneWindow>, pooling: Arc<PoolingModule>, prefetch: usize) -> Self {
        let mut handle = SplitHandle {
            windows: Arc::new(windows),
            pooling,
            prefetch: prefetch.max(1),
            rx: None,
        };
        handle.init();
        handle
    }

    fn init(&mut self) {
        // Dropping the previous receiver makes the old worker's next send
        // fail, which shuts it down.
        let (tx, rx) = sync_channel(self.prefetch);
        self.rx = Some(rx);

        let windows = Arc::clone(&self.windows);
        let pooling = Arc::clone(&self.pooling);
        thread::spawn(move || {
            for window in windows.iter() {
                let sample = materialize(window, &pooling);
                if tx.send(sample).is_err() {
                    break;
                }
            }
        });
    }

    fn next(&mut self) -> Option<SceneSample> {
        let rx = self.rx.as_ref()?;
        match rx.recv() {
            Ok(sample) => Some(sample),
            Err(_) => {
                // Worker finished: epoch exhausted until the next init.
                self.rx = None;
                None
            }
        }
    }

    fn num_sequences(&self) -> usize {
        self.windows.len()
    }
}

/// Train and validation iteration over scene windows, with bounded
/// prefetch. The two handles are independent: resetting or exhausting one
/// never disturbs the other. Advancing past the last window of an epoch
/// yields `None`; `init_train` / `init_val` deterministically re-establish
/// the first window.
pub struct TrajectoriesDataset {
    train: SplitHandle,
    val: Option<SplitHandle>,
    pooling_len: usize,
}

impl TrajectoriesDataset {
    pub fn new(
        train: Windower,
        val: Option<Windower>,
        pooling: PoolingModule,
        prefetch_size: usize,
    ) -> Self {
        let pooling = Arc::new(pooling);
        let pooling_len = pooling.output_len();

        if train.is_empty() {
            warn!("training split produced zero scene windows; check skip/trajectory size against the dataset length");
        }
        if let Some(val) = &val {
            if val.is_empty() {
                warn!("validation split produced zero scene windows; check skip/trajectory size against the dataset length");
            }
        }

        let train = SplitHandle::new(train.into_windows(), Arc::clone(&pooling), prefetch_size);
        let val =
            val.map(|v| SplitHandle::new(v.into_windows(), Arc::clone(&pooling), prefetch_size));

        info!(
            train_sequences = train.num_sequences(),
            val_sequences = val.as_ref().map(|v| v.num_sequences()).unwrap_or(0),
            pooling_len,
            "dataset pipeline ready"
        );

        TrajectoriesDataset {
            train,
            val,
            pooling_len,
        }
    }

    /// Restarts the training epoch from the first window.
    pub fn init_train(&mut self) {
        debug!("resetting training iterator");
        self.train.init();
    }

    /// Restarts the validation pass from the first window.
    pub fn init_val(&mut self) {
        if let Some(val) = &mut self.val {
            debug!("resetting validation iterator");
            val.init();
        }
    }

    pub fn next_train(&mut self) -> Option<SceneSample> {
        self.train.next()
    }

    pub fn next_val(&mut self) -> Option<SceneSample> {
        self.val.as_mut()?.next()
    }

    /// Steps per training epoch. Zero means the split never had windows,
    /// as opposed to an exhausted epoch.
    pub fn num_train_sequences(&self) -> usize {
        self.train.num_sequences()
    }

    pub fn num_val_sequences(&self) -> usize {
        self.val.as_ref().map(|v| v.num_sequences()).unwrap_or(0)
    }

    pub fn pooling_len(&self) -> usize {
        self.pooling_len
    }
}

use burn::data::dataloader::batcher::Batcher;
use burn::tensor::backend::Backend;
use burn::tensor::{Data, Shape, Tensor};

use crate::data::pipeline::SceneSample;

/// Tensors for one scene window. Batching is size-1 by design: agent count
/// varies per window, so windows are consumed one at a time instead of
/// being padded to a global maximum.
#[derive(Clone, Debug)]
pub struct SceneBatch<B: Backend> {
    pub positions: Tensor<B, 3>,       // [T, P, 2]
    pub mask: Tensor<B, 2>,            // [T, P]
    pub coordinates_rel: Tensor<B, 3>, // [T, P, 2]
    pub pooling: Tensor<B, 3>,         // [T, P, F]
}

pub struct SceneBatcher<B: Backend> {
    device: B::Device,
}

impl<B: Backend> SceneBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }

    fn tensor3(&self, values: Vec<f32>, dims: [usize; 3]) -> Tensor<B, 3> {
        let data = Data::new(values, Shape { dims });
        Tensor::from_data(data.convert()).to_device(&self.device)
    }
}

impl<B: Backend> Batcher<SceneSample, SceneBatch<B>> for SceneBatcher<B> {
    fn batch(&self, items: Vec<SceneSample>) -> SceneBatch<B> {
        debug_assert_eq!(items.len(), 1, "scene windows are batched one at a time");
        let sample = items.into_iter().next().expect("empty scene batch");

        let (t, p, f) = (sample.frames, sample.slots, sample.pooling_len);

        let mask_data = Data::new(sample.mask, Shape { dims: [t, p] });
        let mask: Tensor<B, 2> = Tensor::from_data(mask_data.convert()).to_device(&self.device);

        SceneBatch {
            positions: self.tensor3(sample.positions, [t, p, 2]),
            mask,
            coordinates_rel: self.tensor3(sample.coordinates_rel, [t, p, 2]),
            pooling: self.tensor3(sample.pooling, [t, p, f]),
        }
    }
}

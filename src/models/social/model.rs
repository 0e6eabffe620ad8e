use burn::config::Config;
use burn::module::Module;
use burn::nn::{Linear, LinearConfig};
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::{activation, backend::Backend, Tensor};
use burn::train::{RegressionOutput, TrainOutput, TrainStep, ValidStep};

use crate::data::batchitem::SceneBatch;
use crate::modules::lstm_cell::{LstmCell, LstmCellConfig};
use crate::utils::{bivariate_gaussian_nll, position_estimate, weighted_average};

/// Social LSTM: one shared recurrent cell stepped over the frames of a
/// scene window, with every agent slot as an independent state row. Each
/// step embeds the slot's displacement and its social pooling feature, and
/// the output head emits the five parameters of a bivariate Gaussian over
/// the next displacement.
#[derive(Module, Debug)]
pub struct SocialModel<B: Backend> {
    input_embed: Linear<B>,
    pooling_embed: Linear<B>,
    cell: LstmCell<B>,
    output_proj: Linear<B>,
}

impl<B: Backend> SocialModel<B> {
    /// `coordinates_rel` is `[T, P, 2]`, `pooling` is `[T, P, F]`.
    /// Returns Gaussian parameters `[T - 1, P, 5]`: the prediction made at
    /// frame t targets the displacement observed at frame t + 1.
    pub fn forward(&self, coordinates_rel: Tensor<B, 3>, pooling: Tensor<B, 3>) -> Tensor<B, 3> {
        let [frames, slots, _] = coordinates_rel.dims();
        let pooling_len = pooling.dims()[2];

        let (mut hidden, mut cell_state) = self.cell.init_state(slots);
        let mut outputs: Vec<Tensor<B, 3>> = Vec::with_capacity(frames - 1);

        for t in 0..frames - 1 {
            let xt = coordinates_rel
                .clone()
                .slice([t..t + 1, 0..slots, 0..2])
                .reshape([slots, 2]);
            let pt = pooling
                .clone()
                .slice([t..t + 1, 0..slots, 0..pooling_len])
                .reshape([slots, pooling_len]);

            let embedded = Tensor::cat(
                vec![
                    activation::relu(self.input_embed.forward(xt)),
                    activation::relu(self.pooling_embed.forward(pt)),
                ],
                1,
            );

            let (h, c) = self.cell.forward(embedded, (hidden, cell_state));
            hidden = h;
            cell_state = c;

            outputs.push(self.output_proj.forward(hidden.clone()).reshape([
                1,
                slots,
                5,
            ]));
        }

        Tensor::cat(outputs, 0)
    }

    /// Masked NLL over the window. A step contributes only where the slot
    /// is present in both the predicting and the target frame.
    pub fn forward_regression(
        &self,
        coordinates_rel: Tensor<B, 3>, // [T, P, 2]
        pooling: Tensor<B, 3>,         // [T, P, F]
        mask: Tensor<B, 2>,            // [T, P]
    ) -> RegressionOutput<B> {
        let [frames, slots, _] = coordinates_rel.dims();

        let params = self.forward(coordinates_rel.clone(), pooling);
        let targets = coordinates_rel.slice([1..frames, 0..slots, 0..2]);

        let nll = bivariate_gaussian_nll(params.clone(), targets.clone());
        let weights = mask.clone().slice([1..frames, 0..slots])
            * mask.slice([0..frames - 1, 0..slots]);
        let loss = weighted_average(nll, weights);

        let estimates = position_estimate(params).reshape([frames - 1, slots * 2]);
        let targets = targets.reshape([frames - 1, slots * 2]);

        RegressionOutput::new(loss, estimates, targets)
    }
}

impl<B: AutodiffBackend> TrainStep<SceneBatch<B>, RegressionOutput<B>> for SocialModel<B> {
    fn step(&self, batch: SceneBatch<B>) -> TrainOutput<RegressionOutput<B>> {
        let item = self.forward_regression(batch.coordinates_rel, batch.pooling, batch.mask);
        TrainOutput::new(self, item.loss.backward(), item)
    }
}

impl<B: Backend> ValidStep<SceneBatch<B>, RegressionOutput<B>> for SocialModel<B> {
    fn step(&self, batch: SceneBatch<B>) -> RegressionOutput<B> {
        self.forward_regression(batch.coordinates_rel, batch.pooling, batch.mask)
    }
}

#[derive(Config, Debug)]
pub struct SocialModelConfig {
    /// Length of the pooling feature vector the pipeline produces.
    d_pooling: usize,

    #[config(default = 64)]
    d_embed: usize,

    #[config(default = 128)]
    d_hidden: usize,
}

impl SocialModelConfig {
    pub fn init<B: Backend>(&self) -> SocialModel<B> {
        SocialModel {
            input_embed: LinearConfig::new(2, self.d_embed).init(),
            pooling_embed: LinearConfig::new(self.d_pooling, self.d_embed).init(),
            cell: LstmCellConfig::new(self.d_embed * 2, self.d_hidden).init(),
            output_proj: LinearConfig::new(self.d_hidden, 5).init(),
        }
    }
}

use burn::config::Config;
use burn::module::Module;
use burn::nn::{Linear, LinearConfig};
use burn::tensor::{activation, backend::Backend, Tensor};

use crate::utils::split;

/// Single-step LSTM cell. Rows of the input are independent recurrent
/// streams (one per agent slot), stepped manually frame by frame so the
/// caller can feed per-frame social context between steps.
#[derive(Module, Debug)]
pub struct LstmCell<B: Backend> {
    input_proj: Linear<B>,
    hidden_proj: Linear<B>,
    d_hidden: usize,
}

impl<B: Backend> LstmCell<B> {
    /// `x` is `[rows, d_input]`, state is `(hidden, cell)` each
    /// `[rows, d_hidden]`. Returns the next state.
    pub fn forward(
        &self,
        x: Tensor<B, 2>,
        state: (Tensor<B, 2>, Tensor<B, 2>),
    ) -> (Tensor<B, 2>, Tensor<B, 2>) {
        let (hidden, cell) = state;

        let gates = self.input_proj.forward(x) + self.hidden_proj.forward(hidden);
        let mut gates = split(gates, vec![self.d_hidden; 4], -1);

        let input_gate = activation::sigmoid(gates.remove(0));
        let forget_gate = activation::sigmoid(gates.remove(0));
        let candidate = gates.remove(0).tanh();
        let output_gate = activation::sigmoid(gates.remove(0));

        let cell = forget_gate * cell + input_gate * candidate;
        let hidden = output_gate * cell.clone().tanh();

        (hidden, cell)
    }

    pub fn init_state(&self, rows: usize) -> (Tensor<B, 2>, Tensor<B, 2>) {
        (
            Tensor::zeros([rows, self.d_hidden]),
            Tensor::zeros([rows, self.d_hidden]),
        )
    }
}

#[derive(Config, Debug)]
pub struct LstmCellConfig {
    d_input: usize,
    d_hidden: usize,
}

impl LstmCellConfig {
    pub fn init<B: Backend>(&self) -> LstmCell<B> {
        LstmCell {
            input_proj: LinearConfig::new(self.d_input, self.d_hidden * 4).init(),
            hidden_proj: LinearConfig::new(self.d_hidden, self.d_hidden * 4)
                .with_bias(false)
                .init(),
            d_hidden: self.d_hidden,
        }
    }
}

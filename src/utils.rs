use burn::tensor::{backend::Backend, Tensor};

pub fn weighted_average<B: Backend>(x: Tensor<B, 2>, weights: Tensor<B, 2>) -> Tensor<B, 1> {
    let zeros = x.zeros_like();
    let mask = weights.clone().equal_elem(0.0).bool_not();
    let weighted = x * weights.clone();

    let weighted_tensor = zeros.mask_where(mask, weighted);
    let sum_weights = weights.sum().clamp_min(1.0);

    weighted_tensor.sum() / sum_weights
}

/// Negative log likelihood of `targets` under per-element bivariate
/// Gaussians. `params` is `[S, P, 5]` raw network output interpreted as
/// (mu_x, mu_y, log sigma_x, log sigma_y, pre-tanh rho); `targets` is
/// `[S, P, 2]`. Returns `[S, P]`.
pub fn bivariate_gaussian_nll<B: Backend>(
    params: Tensor<B, 3>,
    targets: Tensor<B, 3>,
) -> Tensor<B, 2> {
    let mut params = params.chunk(5, 2);
    let mux = params.remove(0);
    let muy = params.remove(0);
    let sx = params.remove(0).exp();
    let sy = params.remove(0).exp();
    let rho = params.remove(0).tanh();

    let mut targets = targets.chunk(2, 2);
    let x = targets.remove(0);
    let y = targets.remove(0);

    let nx = (x - mux) / sx.clone();
    let ny = (y - muy) / sy.clone();

    let z = nx.clone() * nx.clone() + ny.clone() * ny.clone() - nx * ny * rho.clone() * 2.0;
    let neg_rho = ((rho.clone() * rho).neg() + 1.0).clamp_min(1e-6);

    let numerator = (z.neg() / (neg_rho.clone() * 2.0)).exp();
    let denominator = sx * sy * neg_rho.sqrt() * (2.0 * std::f32::consts::PI);
    let density = numerator / denominator;

    density.clamp_min(1e-10).log().neg().squeeze(2)
}

/// Expected position under the predicted Gaussians: the (mu_x, mu_y) slice
/// of `[S, P, 5]` params, as `[S, P, 2]` displacements ready for
/// `coordinates::to_absolute`.
pub fn position_estimate<B: Backend>(params: Tensor<B, 3>) -> Tensor<B, 3> {
    let [s, p, _] = params.dims();
    params.slice([0..s, 0..p, 0..2])
}

pub fn split<B: Backend, const D: usize>(
    x: Tensor<B, D>,
    splits: Vec<usize>,
    dim: i32,
) -> Vec<Tensor<B, D>> {
    let dim: usize = if dim < 0 { D - 1 } else { dim as usize };

    let dim_size = x.dims()[dim];

    if splits.len() == 0 {
        return vec![x];
    }

    if splits.len() > 1 {
        assert!(splits.iter().copied().fold(0, |x, y| x + y) == dim_size);
    }

    let splits: Vec<usize> = if splits.len() == 1 {
        let l = splits[0];
        let reps = dim_size / l;
        let reminder = dim_size % l;
        (0..reps).map(|_| l).chain(vec![reminder]).collect()
    } else {
        splits
    };

    let mut current_idx: usize = 0;
    splits
        .into_iter()
        .map(|s| {
            let mut ranges = x.dims().map(|x| 0..x);
            ranges[dim] = current_idx..current_idx + s;
            current_idx += s;
            x.clone().slice(ranges)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::{Data, Shape};

    type B = burn::backend::NdArray;

    fn tensor3(values: Vec<f32>, dims: [usize; 3]) -> Tensor<B, 3> {
        Tensor::from_data(Data::new(values, Shape { dims }).convert())
    }

    #[test]
    fn nll_is_low_at_the_mean_and_grows_away_from_it() {
        // Unit sigmas, zero correlation, mean at the origin.
        let params = tensor3(vec![0.0, 0.0, 0.0, 0.0, 0.0], [1, 1, 5]);

        let at_mean = bivariate_gaussian_nll(params.clone(), tensor3(vec![0.0, 0.0], [1, 1, 2]));
        let far = bivariate_gaussian_nll(params, tensor3(vec![3.0, 3.0], [1, 1, 2]));

        let at_mean = at_mean.into_data().value[0];
        let far = far.into_data().value[0];
        assert!(at_mean.is_finite() && far.is_finite());
        assert!(far > at_mean);
        // -log(1/2pi) at the mean.
        assert!((at_mean - (2.0 * std::f32::consts::PI).ln()).abs() < 1e-4);
    }

    #[test]
    fn position_estimate_takes_the_gaussian_mean() {
        let params = tensor3(vec![1.5, -0.5, 9.0, 9.0, 9.0], [1, 1, 5]);
        let estimate = position_estimate(params);
        assert_eq!(estimate.dims(), [1, 1, 2]);
        let values = estimate.into_data().value;
        assert_eq!(values, vec![1.5, -0.5]);
    }

    #[test]
    fn weighted_average_ignores_masked_entries() {
        let x: Tensor<B, 2> = Tensor::from_data(
            Data::new(vec![2.0, 100.0, 4.0, 100.0], Shape { dims: [2, 2] }).convert(),
        );
        let w: Tensor<B, 2> = Tensor::from_data(
            Data::new(vec![1.0, 0.0, 1.0, 0.0], Shape { dims: [2, 2] }).convert(),
        );

        let avg = weighted_average(x, w).into_data().value[0];
        assert!((avg - 3.0).abs() < 1e-6);
    }
}

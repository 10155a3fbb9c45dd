use serde::{Deserialize, Serialize};

/// A fully connected neural network layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dense {
    /// Row-major `out_dim x in_dim` weight matrix.
    pub w: Vec<f32>,
    /// The bias vector for the layer.
    pub b: Vec<f32>,
    /// The number of input dimensions.
    pub in_dim: usize,
    /// The number of output dimensions.
    pub out_dim: usize,
}

impl Dense {
    /// Creates a new `Dense` layer with the given weights and biases.
    #[must_use]
    pub fn new(weights: Vec<f32>, bias: Vec<f32>, in_d: usize, out_d: usize) -> Self {
        assert_eq!(weights.len(), in_d * out_d);
        assert_eq!(bias.len(), out_d);
        Self {
            w: weights,
            b: bias,
            in_dim: in_d,
            out_dim: out_d,
        }
    }

    /// Glorot-uniform weights scaled by `gain`, zero bias.
    #[must_use]
    pub fn random(in_d: usize, out_d: usize, gain: f32, rng: &fastrand::Rng) -> Self {
        let limit = gain * (6.0 / (in_d + out_d) as f32).sqrt();
        let weights = (0..in_d * out_d)
            .map(|_| rng.f32() * 2.0 * limit - limit)
            .collect();
        Self::new(weights, vec![0.0; out_d], in_d, out_d)
    }

    /// Performs the forward pass through the layer.
    #[must_use]
    pub fn forward(&self, x: &[f32]) -> Vec<f32> {
        debug_assert_eq!(x.len(), self.in_dim);
        self.b
            .iter()
            .zip(self.w.chunks_exact(self.in_dim))
            .map(|(b, row)| b + row.iter().zip(x).map(|(w, v)| w * v).sum::<f32>())
            .collect()
    }

    /// Accumulates parameter gradients for one sample into `grad_w`/`grad_b`
    /// and returns the gradient with respect to the input.
    pub fn backward(
        &self,
        x: &[f32],
        grad_out: &[f32],
        grad_w: &mut [f32],
        grad_b: &mut [f32],
    ) -> Vec<f32> {
        let mut grad_input = vec![0.0; self.in_dim];
        for o in 0..self.out_dim {
            let go = grad_out[o];
            if go == 0.0 {
                continue;
            }
            let row = o * self.in_dim;
            for i in 0..self.in_dim {
                grad_w[row + i] += go * x[i];
                grad_input[i] += self.w[row + i] * go;
            }
            grad_b[o] += go;
        }
        grad_input
    }
}

/// Stack of dense layers with tanh between them and a linear output.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Mlp {
    pub layers: Vec<Dense>,
}

impl Mlp {
    /// Hidden layers use unit gain; the output layer uses `out_gain`, so a
    /// small value starts the network close to a constant output.
    #[must_use]
    pub fn new(
        in_dim: usize,
        hidden: &[usize],
        out_dim: usize,
        out_gain: f32,
        rng: &fastrand::Rng,
    ) -> Self {
        let mut layers = Vec::with_capacity(hidden.len() + 1);
        let mut prev = in_dim;
        for &h in hidden {
            layers.push(Dense::random(prev, h, 1.0, rng));
            prev = h;
        }
        layers.push(Dense::random(prev, out_dim, out_gain, rng));
        Self { layers }
    }

    #[must_use]
    pub fn in_dim(&self) -> usize {
        self.layers.first().map_or(0, |l| l.in_dim)
    }

    #[must_use]
    pub fn out_dim(&self) -> usize {
        self.layers.last().map_or(0, |l| l.out_dim)
    }

    #[must_use]
    pub fn forward(&self, x: &[f32]) -> Vec<f32> {
        self.forward_cached(x).0
    }

    /// Forward pass that also returns the input seen by every layer, which
    /// [`Mlp::backward`] needs.
    #[must_use]
    pub fn forward_cached(&self, x: &[f32]) -> (Vec<f32>, Vec<Vec<f32>>) {
        let mut inputs = Vec::with_capacity(self.layers.len());
        let mut h = x.to_vec();
        let last = self.layers.len() - 1;
        for (i, layer) in self.layers.iter().enumerate() {
            let mut out = layer.forward(&h);
            if i < last {
                out.iter_mut().for_each(|v| *v = v.tanh());
            }
            inputs.push(h);
            h = out;
        }
        (h, inputs)
    }

    /// Backpropagate `grad_out` through the network. `grads` holds one buffer
    /// per parameter tensor in [`Mlp::params`] order.
    pub fn backward(&self, inputs: &[Vec<f32>], grad_out: &[f32], grads: &mut [Vec<f32>]) {
        debug_assert_eq!(grads.len(), 2 * self.layers.len());
        let mut grad = grad_out.to_vec();
        for (i, layer) in self.layers.iter().enumerate().rev() {
            let (gw, gb) = grads[2 * i..2 * i + 2].split_at_mut(1);
            let grad_in = layer.backward(&inputs[i], &grad, &mut gw[0], &mut gb[0]);
            if i == 0 {
                break;
            }
            // inputs[i] is the tanh output of layer i - 1
            grad = grad_in
                .iter()
                .zip(&inputs[i])
                .map(|(g, a)| g * (1.0 - a * a))
                .collect();
        }
    }

    /// Parameter tensors in a fixed order: `w0, b0, w1, b1, ...`.
    #[must_use]
    pub fn params(&self) -> Vec<&[f32]> {
        self.layers
            .iter()
            .flat_map(|l| [l.w.as_slice(), l.b.as_slice()])
            .collect()
    }

    pub fn params_mut(&mut self) -> Vec<&mut [f32]> {
        self.layers
            .iter_mut()
            .flat_map(|l| [l.w.as_mut_slice(), l.b.as_mut_slice()])
            .collect()
    }

    #[must_use]
    pub fn num_params(&self) -> usize {
        self.layers.iter().map(|l| l.w.len() + l.b.len()).sum()
    }
}

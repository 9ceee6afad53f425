// src/train/nn.rs
//
// Minimal dense networks and Adam, in f64.
//
// The trainer only needs batched feed-forward evaluation and gradient
// descent over three scalar losses, so the numerics stay hand-rolled:
// fully-connected layers with ReLU hidden activations and a linear head.

use rand::Rng;
use rand_chacha::ChaCha8Rng;

/// One dense layer, weights stored row-major `[out][in]`.
#[derive(Debug, Clone)]
pub struct Linear {
    pub w: Vec<f64>,
    pub b: Vec<f64>,
    pub in_dim: usize,
    pub out_dim: usize,
}

impl Linear {
    /// Uniform He-style init scaled by fan-in.
    pub fn new(in_dim: usize, out_dim: usize, rng: &mut ChaCha8Rng) -> Self {
        let scale = (2.0 / in_dim as f64).sqrt();
        let w = (0..in_dim * out_dim)
            .map(|_| rng.gen_range(-scale..scale))
            .collect();
        Self {
            w,
            b: vec![0.0; out_dim],
            in_dim,
            out_dim,
        }
    }

    pub fn forward(&self, x: &[f64], out: &mut [f64]) {
        debug_assert_eq!(x.len(), self.in_dim);
        debug_assert_eq!(out.len(), self.out_dim);
        for (o, (row, bias)) in out
            .iter_mut()
            .zip(self.w.chunks_exact(self.in_dim).zip(&self.b))
        {
            let mut acc = *bias;
            for (wi, xi) in row.iter().zip(x) {
                acc += wi * xi;
            }
            *o = acc;
        }
    }

    pub fn param_count(&self) -> usize {
        self.w.len() + self.b.len()
    }
}

/// Per-layer activations cached by a forward pass, reused for backprop.
#[derive(Debug, Clone, Default)]
pub struct ForwardCache {
    /// Input followed by each layer's post-activation output.
    pub activations: Vec<Vec<f64>>,
    /// Pre-activation values for each hidden layer.
    pub pre_relu: Vec<Vec<f64>>,
}

/// Fully-connected network: ReLU after every layer except the last.
#[derive(Debug, Clone)]
pub struct Mlp {
    pub layers: Vec<Linear>,
}

impl Mlp {
    /// `dims` lists the layer widths input-first, e.g. `[obs, 64, 64, 1]`.
    pub fn new(dims: &[usize], rng: &mut ChaCha8Rng) -> Self {
        assert!(dims.len() >= 2, "network needs at least one layer");
        let layers = dims
            .windows(2)
            .map(|pair| Linear::new(pair[0], pair[1], rng))
            .collect();
        Self { layers }
    }

    pub fn in_dim(&self) -> usize {
        self.layers[0].in_dim
    }

    pub fn out_dim(&self) -> usize {
        self.layers[self.layers.len() - 1].out_dim
    }

    /// Plain forward pass for inference.
    pub fn forward(&self, x: &[f64]) -> Vec<f64> {
        let mut cur = x.to_vec();
        let last = self.layers.len() - 1;
        for (i, layer) in self.layers.iter().enumerate() {
            let mut next = vec![0.0; layer.out_dim];
            layer.forward(&cur, &mut next);
            if i < last {
                for v in &mut next {
                    *v = v.max(0.0);
                }
            }
            cur = next;
        }
        cur
    }

    /// Forward pass retaining every intermediate needed by `backward`.
    pub fn forward_cached(&self, x: &[f64]) -> (Vec<f64>, ForwardCache) {
        let mut cache = ForwardCache {
            activations: vec![x.to_vec()],
            pre_relu: Vec::new(),
        };
        let last = self.layers.len() - 1;
        let mut cur = x.to_vec();
        for (i, layer) in self.layers.iter().enumerate() {
            let mut next = vec![0.0; layer.out_dim];
            layer.forward(&cur, &mut next);
            if i < last {
                cache.pre_relu.push(next.clone());
                for v in &mut next {
                    *v = v.max(0.0);
                }
            }
            cache.activations.push(next.clone());
            cur = next;
        }
        (cur, cache)
    }

    /// Accumulate parameter gradients for one example given the gradient of
    /// the loss w.r.t. the network output. `grads` is laid out layer by
    /// layer, weights then biases, matching `flat_params`.
    pub fn backward(&self, cache: &ForwardCache, d_out: &[f64], grads: &mut [f64]) {
        debug_assert_eq!(grads.len(), self.param_count());
        let mut delta = d_out.to_vec();
        let mut offset = self.param_count();
        for (i, layer) in self.layers.iter().enumerate().rev() {
            offset -= layer.param_count();
            let input = &cache.activations[i];
            let (gw, gb) = grads[offset..offset + layer.param_count()]
                .split_at_mut(layer.w.len());
            for (j, dj) in delta.iter().enumerate() {
                gb[j] += dj;
                let row = &mut gw[j * layer.in_dim..(j + 1) * layer.in_dim];
                for (g, xi) in row.iter_mut().zip(input) {
                    *g += dj * xi;
                }
            }
            if i > 0 {
                let mut prev = vec![0.0; layer.in_dim];
                for (j, dj) in delta.iter().enumerate() {
                    let row = &layer.w[j * layer.in_dim..(j + 1) * layer.in_dim];
                    for (p, wi) in prev.iter_mut().zip(row) {
                        *p += dj * wi;
                    }
                }
                // ReLU mask from the layer below.
                for (p, z) in prev.iter_mut().zip(&cache.pre_relu[i - 1]) {
                    if *z <= 0.0 {
                        *p = 0.0;
                    }
                }
                delta = prev;
            }
        }
    }

    pub fn param_count(&self) -> usize {
        self.layers.iter().map(Linear::param_count).sum()
    }

    /// Apply a flat parameter update in the `backward` layout.
    pub fn apply_update(&mut self, update: &[f64]) {
        debug_assert_eq!(update.len(), self.param_count());
        let mut offset = 0;
        for layer in &mut self.layers {
            for w in &mut layer.w {
                *w += update[offset];
                offset += 1;
            }
            for b in &mut layer.b {
                *b += update[offset];
                offset += 1;
            }
        }
    }
}

/// Adam optimizer state for one network's flat parameter vector.
#[derive(Debug, Clone)]
pub struct Adam {
    lr: f64,
    beta1: f64,
    beta2: f64,
    eps: f64,
    t: u64,
    m: Vec<f64>,
    v: Vec<f64>,
}

impl Adam {
    pub fn new(param_count: usize, lr: f64) -> Self {
        Self {
            lr,
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
            t: 0,
            m: vec![0.0; param_count],
            v: vec![0.0; param_count],
        }
    }

    /// Turn a raw gradient into a parameter update (negated, scaled).
    pub fn step(&mut self, grads: &[f64], update: &mut [f64]) {
        debug_assert_eq!(grads.len(), self.m.len());
        self.t += 1;
        let bc1 = 1.0 - self.beta1.powi(self.t as i32);
        let bc2 = 1.0 - self.beta2.powi(self.t as i32);
        for i in 0..grads.len() {
            let g = grads[i];
            self.m[i] = self.beta1 * self.m[i] + (1.0 - self.beta1) * g;
            self.v[i] = self.beta2 * self.v[i] + (1.0 - self.beta2) * g * g;
            let m_hat = self.m[i] / bc1;
            let v_hat = self.v[i] / bc2;
            update[i] = -self.lr * m_hat / (v_hat.sqrt() + self.eps);
        }
    }
}

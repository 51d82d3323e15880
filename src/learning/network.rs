//! `QNetwork`: the minimal `{predict, fit, copy_to}` interface the DQN
//! agent needs (SPEC_FULL §9 resolved Open Question — no hard dependency
//! on a neural framework). [`LinearQNetwork`] is the default, dependency-free
//! backend; `CandleQNetwork` (behind the `neural` feature) swaps in the
//! teacher's `candle-core`/`candle-nn` stack (`agent/rl.rs`) for an actual
//! feed-forward net, with no change to callers.

use std::any::Any;

use crate::domain::Experience;

/// Learning rate for the default linear backend's gradient step.
const LINEAR_LEARNING_RATE: f32 = 0.01;

pub trait QNetwork: Send + Sync {
    /// Q-values over the full action space for one state.
    fn predict(&self, state: &[f32]) -> Vec<f32>;

    /// One gradient step over a sampled batch against precomputed TD
    /// targets (`reward + gamma * max_a' Q_target(next_state, a')`).
    /// Returns the mean squared error for the step.
    fn fit(&mut self, batch: &[Experience], targets: &[f32]) -> f32;

    /// Copies this network's weights onto `target` (online -> target sync).
    fn copy_to(&self, target: &mut dyn QNetwork);

    /// A freshly initialized network with the same shape, used to build
    /// the paired target network at construction time.
    fn clone_network(&self) -> Box<dyn QNetwork>;

    fn init(&mut self) {}

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Dependency-free fallback: a linear Q approximation, one weight vector
/// per action over the 21-dim state (spec §4.F: "If the neural
/// implementation is unavailable, the agent must degrade to a linear Q
/// approximation over the same state space with no loss of interface").
#[derive(Clone)]
pub struct LinearQNetwork {
    weights: Vec<Vec<f32>>,
    bias: Vec<f32>,
}

impl LinearQNetwork {
    pub fn new(action_count: usize) -> Self {
        Self {
            weights: vec![vec![0.0; crate::domain::STATE_DIM]; action_count.max(1)],
            bias: vec![0.0; action_count.max(1)],
        }
    }

    fn q_value(&self, action: usize, state: &[f32]) -> f32 {
        let dot: f32 = self.weights[action].iter().zip(state).map(|(w, s)| w * s).sum();
        dot + self.bias[action]
    }
}

impl QNetwork for LinearQNetwork {
    fn predict(&self, state: &[f32]) -> Vec<f32> {
        (0..self.weights.len()).map(|a| self.q_value(a, state)).collect()
    }

    fn fit(&mut self, batch: &[Experience], targets: &[f32]) -> f32 {
        let mut total_squared_error = 0.0;
        for (experience, &target) in batch.iter().zip(targets) {
            let action = experience.action.min(self.weights.len() - 1);
            let predicted = self.q_value(action, &experience.state);
            let error = target - predicted;
            total_squared_error += error * error;

            // Gradient of squared error w.r.t. weights is `-2*error*state`;
            // absorb the constant into the learning rate.
            for (w, s) in self.weights[action].iter_mut().zip(&experience.state) {
                *w += LINEAR_LEARNING_RATE * error * s;
            }
            self.bias[action] += LINEAR_LEARNING_RATE * error;
        }
        total_squared_error / batch.len().max(1) as f32
    }

    fn copy_to(&self, target: &mut dyn QNetwork) {
        if let Some(linear) = target.as_any_mut().downcast_mut::<LinearQNetwork>() {
            linear.weights = self.weights.clone();
            linear.bias = self.bias.clone();
        }
    }

    fn clone_network(&self) -> Box<dyn QNetwork> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(feature = "neural")]
pub use candle_backend::CandleQNetwork;

#[cfg(feature = "neural")]
mod candle_backend {
    use std::any::Any;

    use candle_core::{DType, Device, Tensor};
    use candle_nn::{linear, AdamW, Linear, Module, Optimizer, ParamsAdamW, VarBuilder, VarMap};

    use super::QNetwork;
    use crate::domain::{Experience, STATE_DIM};

    const HIDDEN_1: usize = 64;
    const HIDDEN_2: usize = 32;

    /// Feed-forward 21 -> 64 (ReLU) -> 32 (ReLU) -> |actions| (spec §4.F),
    /// built on the teacher's `candle-core`/`candle-nn` stack
    /// (`agent/rl.rs`'s `GRPOTrainer`) rather than a hand-rolled autodiff.
    pub struct CandleQNetwork {
        varmap: VarMap,
        layer1: Linear,
        layer2: Linear,
        layer3: Linear,
        optimizer: AdamW,
        device: Device,
        action_count: usize,
    }

    impl CandleQNetwork {
        pub fn new(action_count: usize) -> candle_core::Result<Self> {
            let device = Device::Cpu;
            let varmap = VarMap::new();
            let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
            let layer1 = linear(STATE_DIM, HIDDEN_1, vb.pp("l1"))?;
            let layer2 = linear(HIDDEN_1, HIDDEN_2, vb.pp("l2"))?;
            let layer3 = linear(HIDDEN_2, action_count, vb.pp("l3"))?;
            let optimizer = AdamW::new(varmap.all_vars(), ParamsAdamW { lr: 1e-3, ..Default::default() })?;
            Ok(Self { varmap, layer1, layer2, layer3, optimizer, device, action_count })
        }

        fn forward(&self, state: &Tensor) -> candle_core::Result<Tensor> {
            let h1 = self.layer1.forward(state)?.relu()?;
            let h2 = self.layer2.forward(&h1)?.relu()?;
            self.layer3.forward(&h2)
        }
    }

    impl QNetwork for CandleQNetwork {
        fn predict(&self, state: &[f32]) -> Vec<f32> {
            let Ok(tensor) = Tensor::from_slice(state, (1, STATE_DIM), &self.device) else {
                return vec![0.0; self.action_count];
            };
            match self.forward(&tensor).and_then(|t| t.squeeze(0)?.to_vec1::<f32>()) {
                Ok(values) => values,
                Err(_) => vec![0.0; self.action_count],
            }
        }

        fn fit(&mut self, batch: &[Experience], targets: &[f32]) -> f32 {
            let Ok(states) = Tensor::from_slice(
                &batch.iter().flat_map(|e| e.state.clone()).collect::<Vec<f32>>(),
                (batch.len(), STATE_DIM),
                &self.device,
            ) else {
                return 0.0;
            };
            let Ok(predicted) = self.forward(&states) else { return 0.0 };
            let Ok(target_tensor) = Tensor::from_slice(targets, (targets.len(),), &self.device) else {
                return 0.0;
            };
            let actions: Vec<u32> = batch.iter().map(|e| e.action as u32).collect();
            let Ok(action_idx) = Tensor::from_slice(&actions, (actions.len(), 1), &self.device) else {
                return 0.0;
            };
            let Ok(taken) = predicted.gather(&action_idx, 1).and_then(|t| t.squeeze(1)) else {
                return 0.0;
            };
            let Ok(diff) = (&taken - &target_tensor) else { return 0.0 };
            let Ok(loss) = diff.sqr().and_then(|t| t.mean_all()) else { return 0.0 };
            let loss_value = loss.to_scalar::<f32>().unwrap_or(0.0);
            if let Ok(grads) = loss.backward() {
                let _ = self.optimizer.step(&grads);
            }
            loss_value
        }

        fn copy_to(&self, target: &mut dyn QNetwork) {
            if let Some(candle_target) = target.as_any_mut().downcast_mut::<CandleQNetwork>() {
                for (src, dst) in self.varmap.all_vars().iter().zip(candle_target.varmap.all_vars().iter()) {
                    let _ = dst.set(src);
                }
            }
        }

        fn clone_network(&self) -> Box<dyn QNetwork> {
            Box::new(Self::new(self.action_count).expect("network shape is known-valid"))
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn experience(state: Vec<f32>, action: usize, reward: f32, next_state: Vec<f32>) -> Experience {
        Experience { state, action, reward, next_state, done: false }
    }

    #[test]
    fn predict_has_one_value_per_action() {
        let net = LinearQNetwork::new(4);
        let q = net.predict(&vec![0.1; crate::domain::STATE_DIM]);
        assert_eq!(q.len(), 4);
    }

    #[test]
    fn fit_reduces_error_on_repeated_updates() {
        let mut net = LinearQNetwork::new(2);
        let state = vec![1.0; crate::domain::STATE_DIM];
        let batch = vec![experience(state.clone(), 0, 1.0, state.clone())];
        let first_loss = net.fit(&batch, &[1.0]);
        let second_loss = net.fit(&batch, &[1.0]);
        assert!(second_loss <= first_loss, "expected loss to shrink, got {first_loss} -> {second_loss}");
    }

    #[test]
    fn copy_to_synchronizes_weights() {
        let mut online = LinearQNetwork::new(2);
        let state = vec![1.0; crate::domain::STATE_DIM];
        online.fit(&[experience(state.clone(), 0, 1.0, state.clone())], &[1.0]);
        let mut target = LinearQNetwork::new(2);
        online.copy_to(&mut target);
        assert_eq!(online.predict(&state), target.predict(&state));
    }
}

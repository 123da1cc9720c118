//! Observers invoked synchronously by [`StreamBatcher`](crate::StreamBatcher).

use std::time::Instant;

use tracing::info;

use crate::batching::StreamState;

/// Callback run by the streamer at epoch start and for every batch handed out.
pub trait BatchHook {
    fn on_epoch_start(&mut self, _state: &StreamState) {}

    fn on_batch(&mut self, state: &StreamState);
}

/// Logs throughput and estimated time to the end of the epoch.
#[derive(Debug)]
pub struct EtaHook {
    name: String,
    every: usize,
    started: Instant,
}

impl EtaHook {
    pub fn new(name: impl Into<String>, print_every_x_batches: usize) -> Self {
        Self {
            name: name.into(),
            every: print_every_x_batches.max(1),
            started: Instant::now(),
        }
    }
}

impl BatchHook for EtaHook {
    fn on_epoch_start(&mut self, _state: &StreamState) {
        self.started = Instant::now();
    }

    fn on_batch(&mut self, state: &StreamState) {
        if state.batch == 0 || state.batch % self.every != 0 {
            return;
        }
        let elapsed = self.started.elapsed().as_secs_f64();
        let per_batch = elapsed / state.batch as f64;
        let remaining = per_batch * state.num_batches.saturating_sub(state.batch) as f64;
        info!(
            hook = %self.name,
            epoch = state.epoch,
            batch = state.batch,
            num_batches = state.num_batches,
            "{:.1} batches/s, ETA {:.1}s",
            1.0 / per_batch.max(f64::EPSILON),
            remaining
        );
    }
}

/// Logs the mean of the losses recorded since its last report.
#[derive(Debug)]
pub struct LossHook {
    name: String,
    every: usize,
    losses: Vec<f32>,
}

impl LossHook {
    pub fn new(name: impl Into<String>, print_every_x_batches: usize) -> Self {
        Self {
            name: name.into(),
            every: print_every_x_batches.max(1),
            losses: Vec::new(),
        }
    }
}

impl BatchHook for LossHook {
    fn on_epoch_start(&mut self, _state: &StreamState) {
        self.losses.clear();
    }

    fn on_batch(&mut self, state: &StreamState) {
        if let Some(loss) = state.loss {
            self.losses.push(loss);
        }
        if state.batch % self.every != 0 || self.losses.is_empty() {
            return;
        }
        let mean = self.losses.iter().sum::<f32>() / self.losses.len() as f32;
        info!(
            hook = %self.name,
            epoch = state.epoch,
            batch = state.batch,
            "loss {:.5}",
            mean
        );
        self.losses.clear();
    }
}

// ============================================================
// Layer 5 - Compute Placement
// ============================================================
// Decides where a classifier forward pass runs. Selected once
// before the epoch loop; the epoch runners only ever call
// `placement.forward(model, sequences)` and never see devices.
//
//   SingleDevice  → plain forward on the primary device
//
//   Replicated    → data parallelism across N devices:
//                     1. split the batch into N chunks along dim 0
//                     2. copy the model to each device
//                     3. forward each chunk on its device
//                     4. move every chunk's logits back to the
//                        primary device and concatenate
//
// The gather in step 4 is a full barrier: the combined logits
// exist only after every replica has finished, so the loss, the
// backward pass and the optimizer step always see the whole batch.
// Replicas are created with `to_device`, which stays on the
// autodiff graph, so gradients flow back to the primary parameters.
//
// Requested accelerators are tried first (`usable_devices`). A
// device with no adapter behind it is dropped with a warning; when
// none is left the caller falls back to the CPU backend.

use burn::prelude::*;
use std::fmt::Debug;
use std::panic::{self, AssertUnwindSafe};

use crate::ml::model::SequenceClassifier;

pub trait ComputePlacement<B: Backend> {
    /// Device that owns the model parameters, batches and logits
    fn primary(&self) -> &B::Device;

    /// Run the classifier; logits land on the primary device.
    fn forward(&self, model: &SequenceClassifier<B>, sequences: Tensor<B, 3>) -> Tensor<B, 2>;

    fn describe(&self) -> String;
}

/// Pick the strategy for a device list: more than one device
/// replicates, otherwise everything runs on the first (or default)
/// device.
pub fn select_placement<B: Backend>(devices: &[B::Device]) -> Box<dyn ComputePlacement<B>> {
    match devices {
        []       => Box::new(SingleDevice::<B>::new(Default::default())),
        [single] => Box::new(SingleDevice::<B>::new(single.clone())),
        many     => Box::new(Replicated::<B>::new(many.to_vec())),
    }
}

/// The requested devices that can run a one-element tensor round trip
#[cfg_attr(not(feature = "wgpu"), allow(dead_code))]
pub fn usable_devices<B: Backend>(requested: Vec<B::Device>) -> Vec<B::Device> {
    retain_responsive(requested, device_responds::<B>)
}

fn retain_responsive<D: Debug>(requested: Vec<D>, responds: impl Fn(&D) -> bool) -> Vec<D> {
    requested
        .into_iter()
        .filter(|device| {
            let ok = responds(device);
            if !ok {
                tracing::warn!("Device {device:?} is not available; leaving it out");
            }
            ok
        })
        .collect()
}

/// Backends without an adapter panic on first allocation
fn device_responds<B: Backend>(device: &B::Device) -> bool {
    panic::catch_unwind(AssertUnwindSafe(|| {
        Tensor::<B, 1>::zeros([1], device).into_data();
    }))
    .is_ok()
}

// ─── SingleDevice ─────────────────────────────────────────────────────────────
pub struct SingleDevice<B: Backend> {
    device: B::Device,
}

impl<B: Backend> SingleDevice<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> ComputePlacement<B> for SingleDevice<B> {
    fn primary(&self) -> &B::Device {
        &self.device
    }

    fn forward(&self, model: &SequenceClassifier<B>, sequences: Tensor<B, 3>) -> Tensor<B, 2> {
        model.forward(sequences)
    }

    fn describe(&self) -> String {
        format!("single device {:?}", self.device)
    }
}

// ─── Replicated ───────────────────────────────────────────────────────────────
pub struct Replicated<B: Backend> {
    devices: Vec<B::Device>,
}

impl<B: Backend> Replicated<B> {
    /// `devices[0]` is the primary device.
    pub fn new(devices: Vec<B::Device>) -> Self {
        debug_assert!(!devices.is_empty());
        Self { devices }
    }
}

impl<B: Backend> ComputePlacement<B> for Replicated<B> {
    fn primary(&self) -> &B::Device {
        &self.devices[0]
    }

    fn forward(&self, model: &SequenceClassifier<B>, sequences: Tensor<B, 3>) -> Tensor<B, 2> {
        let batch_size = sequences.dims()[0];
        let replicas   = self.devices.len().min(batch_size);
        if replicas <= 1 {
            return model.forward(sequences);
        }

        // chunk() may return fewer than `replicas` pieces for small batches
        let gathered: Vec<Tensor<B, 2>> = sequences
            .chunk(replicas, 0)
            .into_iter()
            .zip(&self.devices)
            .map(|(part, device)| {
                let replica = model.clone().to_device(device);
                replica
                    .forward(part.to_device(device))
                    .to_device(self.primary())
            })
            .collect();

        Tensor::cat(gathered, 0)
    }

    fn describe(&self) -> String {
        format!("{} replicated devices {:?}", self.devices.len(), self.devices)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::model::{CellType, SequenceClassifierConfig};
    use burn::backend::{ndarray::NdArrayDevice, Autodiff, NdArray};

    type B = NdArray;

    fn model() -> SequenceClassifier<B> {
        SequenceClassifierConfig::new(4, 8, 1, 8, 3, CellType::Gru).init::<B>(&NdArrayDevice::Cpu)
    }

    fn sequences(batch: usize) -> Tensor<B, 3> {
        let values: Vec<f32> = (0..batch * 5 * 4).map(|v| (v as f32 * 0.37).sin()).collect();
        Tensor::from_data(TensorData::new(values, [batch, 5, 4]), &NdArrayDevice::Cpu)
    }

    #[test]
    fn test_replicated_matches_single_device() {
        let model = model();
        let x     = sequences(7);

        let single = SingleDevice::<B>::new(NdArrayDevice::Cpu).forward(&model, x.clone());
        let split  = Replicated::<B>::new(vec![NdArrayDevice::Cpu; 3]).forward(&model, x);

        assert_eq!(split.dims(), [7, 3]);
        let a: Vec<f32> = single.into_data().iter::<f32>().collect();
        let b: Vec<f32> = split.into_data().iter::<f32>().collect();
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-5);
        }
    }

    #[test]
    fn test_more_devices_than_samples() {
        let out = Replicated::<B>::new(vec![NdArrayDevice::Cpu; 4]).forward(&model(), sequences(2));
        assert_eq!(out.dims(), [2, 3]);
    }

    #[test]
    fn test_gradients_reach_primary_parameters() {
        type AD = Autodiff<NdArray>;
        let device = NdArrayDevice::Cpu;
        let model  = SequenceClassifierConfig::new(4, 8, 1, 8, 3, CellType::Lstm).init::<AD>(&device);
        let x      = Tensor::<AD, 3>::ones([4, 5, 4], &device);

        let logits = Replicated::<AD>::new(vec![device; 2]).forward(&model, x);
        let grads  = logits.sum().backward();

        let weight_grad = model.fc2.weight.val().grad(&grads);
        assert!(weight_grad.is_some());
    }

    #[test]
    fn test_unavailable_devices_are_left_out() {
        let kept = retain_responsive(vec![0usize, 1, 2, 3], |i| i % 2 == 0);
        assert_eq!(kept, vec![0, 2]);
        assert!(retain_responsive(vec![7usize], |_| false).is_empty());
    }

    #[test]
    fn test_panicking_device_counts_as_missing() {
        let kept = retain_responsive(vec![0usize, 1], |&i| {
            panic::catch_unwind(|| assert!(i == 0, "no adapter for device {i}")).is_ok()
        });
        assert_eq!(kept, vec![0]);
        assert_eq!(usable_devices::<B>(vec![NdArrayDevice::Cpu]), vec![NdArrayDevice::Cpu]);
    }

    #[test]
    fn test_selection_by_device_count() {
        assert!(select_placement::<B>(&[]).describe().starts_with("single"));
        assert!(select_placement::<B>(&[NdArrayDevice::Cpu]).describe().starts_with("single"));
        assert!(select_placement::<B>(&[NdArrayDevice::Cpu, NdArrayDevice::Cpu])
            .describe()
            .starts_with("2 replicated"));
    }
}

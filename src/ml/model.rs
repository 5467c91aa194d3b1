use burn::{
    nn::{
        gru::{Gru, GruConfig},
        Dropout, DropoutConfig, Linear, LinearConfig, Lstm, LstmConfig,
    },
    prelude::*,
    tensor::activation::relu,
};
use serde::{Deserialize, Serialize};

use crate::domain::error::TrainError;

/// Recurrent cell family, chosen once at model construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CellType {
    Lstm,
    Gru,
}

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct SequenceClassifierConfig {
    /// Values per frame (2 × selected joints)
    pub input_size:       usize,
    pub hidden_size:      usize,
    pub num_layers:       usize,
    /// Width of the fully-connected head's hidden layer
    pub head_hidden_size: usize,
    pub num_classes:      usize,
    pub cell:             CellType,
    #[config(default = 0.0)]
    pub dropout:          f64,
}

impl SequenceClassifierConfig {
    /// Reject architectures that cannot be built.
    pub fn check(&self) -> Result<(), TrainError> {
        let positive = [
            ("input_size", self.input_size),
            ("hidden_size", self.hidden_size),
            ("num_layers", self.num_layers),
            ("head_hidden_size", self.head_hidden_size),
            ("num_classes", self.num_classes),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, v)| *v == 0) {
            return Err(TrainError::config(format!("{name} must be > 0")));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(TrainError::config(format!(
                "dropout must be in [0, 1), got {}",
                self.dropout
            )));
        }
        Ok(())
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> SequenceClassifier<B> {
        let encoder = match self.cell {
            CellType::Lstm => RecurrentEncoder::Lstm(
                (0..self.num_layers)
                    .map(|l| LstmConfig::new(self.layer_input(l), self.hidden_size, true).init(device))
                    .collect(),
            ),
            CellType::Gru => RecurrentEncoder::Gru(
                (0..self.num_layers)
                    .map(|l| GruConfig::new(self.layer_input(l), self.hidden_size, true).init(device))
                    .collect(),
            ),
        };
        let fc1     = LinearConfig::new(self.hidden_size, self.head_hidden_size).init(device);
        let fc2     = LinearConfig::new(self.head_hidden_size, self.num_classes).init(device);
        let dropout = DropoutConfig::new(self.dropout).init();
        SequenceClassifier {
            encoder, fc1, fc2, dropout,
            input_size:  self.input_size,
            num_classes: self.num_classes,
        }
    }

    fn layer_input(&self, layer: usize) -> usize {
        if layer == 0 { self.input_size } else { self.hidden_size }
    }
}

/// Stacked recurrent layers of one cell family.
#[derive(Module, Debug)]
pub enum RecurrentEncoder<B: Backend> {
    Lstm(Vec<Lstm<B>>),
    Gru(Vec<Gru<B>>),
}

impl<B: Backend> RecurrentEncoder<B> {
    /// [batch, seq_len, input] → final-timestep output [batch, hidden]
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 2> {
        let [batch_size, seq_len, _] = x.dims();

        let out = match self {
            Self::Lstm(layers) => layers.iter().fold(x, |h, layer| layer.forward(h, None).0),
            Self::Gru(layers)  => layers.iter().fold(x, |h, layer| layer.forward(h, None)),
        };

        let hidden = out.dims()[2];
        out.slice([0..batch_size, seq_len - 1..seq_len, 0..hidden])
            .reshape([batch_size, hidden])
    }
}

#[derive(Module, Debug)]
pub struct SequenceClassifier<B: Backend> {
    pub encoder:     RecurrentEncoder<B>,
    pub fc1:         Linear<B>,
    pub fc2:         Linear<B>,
    pub dropout:     Dropout,
    pub input_size:  usize,
    pub num_classes: usize,
}

impl<B: Backend> SequenceClassifier<B> {
    /// sequences: [batch, seq_len, input_size] → logits: [batch, num_classes]
    /// Raw scores; pair with a cross-entropy-with-logits loss.
    pub fn forward(&self, sequences: Tensor<B, 3>) -> Tensor<B, 2> {
        let h = self.encoder.forward(sequences);
        let h = relu(self.fc1.forward(h));
        let h = self.dropout.forward(h);
        self.fc2.forward(h)
    }

    /// Fail fast when data and classifier disagree on the frame width.
    pub fn check_input(&self, feature_dim: usize) -> Result<(), TrainError> {
        if feature_dim != self.input_size {
            return Err(TrainError::FeatureDimMismatch {
                expected: self.input_size,
                found:    feature_dim,
            });
        }
        Ok(())
    }
}

/// Predicted class per row: argmax over the class dimension.
pub fn predictions<B: Backend>(logits: Tensor<B, 2>) -> Vec<usize> {
    // argmax(1) returns [batch, 1]; flatten to [batch]
    logits
        .argmax(1)
        .flatten::<1>(0, 1)
        .into_data()
        .iter::<i64>()
        .map(|p| p as usize)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type B = NdArray;

    fn config(cell: CellType) -> SequenceClassifierConfig {
        SequenceClassifierConfig::new(8, 16, 2, 12, 5, cell).with_dropout(0.2)
    }

    #[test]
    fn test_forward_shapes_for_both_cells() {
        let device = Default::default();
        for cell in [CellType::Lstm, CellType::Gru] {
            let model = config(cell).init::<B>(&device);
            let x     = Tensor::<B, 3>::zeros([3, 7, 8], &device);
            assert_eq!(model.forward(x).dims(), [3, 5]);
        }
    }

    #[test]
    fn test_predictions_are_row_argmax() {
        let device = Default::default();
        let logits = Tensor::<B, 2>::from_data(
            TensorData::new(vec![2.0f32, 0.0, 0.0, 0.0, 0.0, 5.0], [2, 3]),
            &device,
        );
        assert_eq!(predictions(logits), vec![0, 2]);
    }

    #[test]
    fn test_input_mismatch_fails_fast() {
        let model = config(CellType::Gru).init::<B>(&Default::default());
        assert!(model.check_input(8).is_ok());
        let err = model.check_input(10).unwrap_err();
        assert!(matches!(err, TrainError::FeatureDimMismatch { expected: 8, found: 10 }));
    }

    #[test]
    fn test_config_check() {
        assert!(config(CellType::Lstm).check().is_ok());
        assert!(config(CellType::Lstm).with_dropout(1.0).check().is_err());
        let mut zero_layers = config(CellType::Lstm);
        zero_layers.num_layers = 0;
        assert!(zero_layers.check().is_err());
    }
}

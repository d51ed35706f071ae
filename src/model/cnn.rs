//! CNN Model Architecture for Face-Mask Classification
//!
//! A compact convolutional network built with the Burn framework that maps a
//! `[batch, 3, 112, 112]` image tensor to one logit per class.

use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig, Dropout, DropoutConfig, Linear, LinearConfig, PaddingConfig2d,
        Relu,
    },
    tensor::{backend::Backend, Tensor},
};

use super::trace::{self, join_name, ForwardTrace, ParamInfo, ParamSource};
use super::ImageClassifier;

/// Configuration for the MaskClassifier CNN model
#[derive(Config, Debug)]
pub struct MaskClassifierConfig {
    /// Number of output classes (with_mask / without_mask)
    #[config(default = "2")]
    pub num_classes: usize,

    /// Input image size (assumes square images)
    #[config(default = "112")]
    pub input_size: usize,

    /// Dropout rate for regularization
    #[config(default = "0.3")]
    pub dropout_rate: f64,

    /// Number of input channels (3 for RGB)
    #[config(default = "3")]
    pub in_channels: usize,

    /// Base number of convolutional filters
    #[config(default = "16")]
    pub base_filters: usize,

    /// Width of the hidden fully connected layer
    #[config(default = "128")]
    pub hidden_units: usize,
}

impl MaskClassifierConfig {
    /// Initialize a model on the given device
    pub fn init<B: Backend>(&self, device: &B::Device) -> MaskClassifier<B> {
        MaskClassifier::new(self, device)
    }
}

/// A CNN block with Conv2d, BatchNorm, ReLU, and optional MaxPool
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    pub conv: Conv2d<B>,
    pub bn: BatchNorm<B>,
    pub relu: Relu,
    pub pool: Option<MaxPool2d>,
}

impl<B: Backend> ConvBlock<B> {
    /// Create a new convolutional block
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        with_pool: bool,
        device: &B::Device,
    ) -> Self {
        let conv = Conv2dConfig::new([in_channels, out_channels], [kernel_size, kernel_size])
            .with_padding(PaddingConfig2d::Same)
            .init(device);

        let bn = BatchNormConfig::new(out_channels).init(device);

        let pool = if with_pool {
            Some(MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init())
        } else {
            None
        };

        Self {
            conv,
            bn,
            relu: Relu::new(),
            pool,
        }
    }

    /// Forward pass through the block
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(x);
        let x = self.bn.forward(x);
        let x = self.relu.forward(x);

        match &self.pool {
            Some(pool) => pool.forward(x),
            None => x,
        }
    }

    /// Forward pass that records every layer into `trace`
    pub fn forward_traced(
        &self,
        prefix: &str,
        x: Tensor<B, 4>,
        trace: &mut ForwardTrace,
    ) -> Tensor<B, 4> {
        let x = trace::conv2d(&join_name(prefix, "conv"), &self.conv, x, trace);
        let x = trace::batch_norm(&join_name(prefix, "bn"), &self.bn, x, trace);
        let x = trace::relu(&join_name(prefix, "relu"), &self.relu, x, trace);

        match &self.pool {
            Some(pool) => trace::max_pool2d(&join_name(prefix, "pool"), pool, x, trace),
            None => x,
        }
    }
}

impl<B: Backend> ParamSource for ConvBlock<B> {
    fn collect_params(&self, prefix: &str, out: &mut Vec<ParamInfo>) {
        self.conv.collect_params(&join_name(prefix, "conv"), out);
        self.bn.collect_params(&join_name(prefix, "bn"), out);
    }
}

/// Face-mask classifier CNN
///
/// Architecture:
/// - 3 convolutional blocks (16 -> 32 -> 64 filters), each halving the resolution
/// - Global Average Pooling
/// - Fully connected classifier with dropout
#[derive(Module, Debug)]
pub struct MaskClassifier<B: Backend> {
    pub conv1: ConvBlock<B>,
    pub conv2: ConvBlock<B>,
    pub conv3: ConvBlock<B>,

    pub global_pool: AdaptiveAvgPool2d,

    pub fc1: Linear<B>,
    pub relu: Relu,
    pub dropout: Dropout,
    pub fc2: Linear<B>,

    num_classes: usize,
}

impl<B: Backend> MaskClassifier<B> {
    /// Create a new MaskClassifier from configuration
    pub fn new(config: &MaskClassifierConfig, device: &B::Device) -> Self {
        let base = config.base_filters;

        let conv1 = ConvBlock::new(config.in_channels, base, 3, true, device); // 112 -> 56
        let conv2 = ConvBlock::new(base, base * 2, 3, true, device); // 56 -> 28
        let conv3 = ConvBlock::new(base * 2, base * 4, 3, true, device); // 28 -> 14

        let global_pool = AdaptiveAvgPool2dConfig::new([1, 1]).init();

        let fc1 = LinearConfig::new(base * 4, config.hidden_units).init(device);
        let dropout = DropoutConfig::new(config.dropout_rate).init();
        let fc2 = LinearConfig::new(config.hidden_units, config.num_classes).init(device);

        Self {
            conv1,
            conv2,
            conv3,
            global_pool,
            fc1,
            relu: Relu::new(),
            dropout,
            fc2,
            num_classes: config.num_classes,
        }
    }

    /// Flatten `[B, C, 1, 1]` pooled features to `[B, C]`
    fn flatten(x: Tensor<B, 4>) -> Tensor<B, 2> {
        let [batch_size, channels, _, _] = x.dims();
        x.reshape([batch_size, channels])
    }
}

impl<B: Backend> ImageClassifier<B> for MaskClassifier<B> {
    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.conv1.forward(x);
        let x = self.conv2.forward(x);
        let x = self.conv3.forward(x);

        let x = Self::flatten(self.global_pool.forward(x));

        let x = self.fc1.forward(x);
        let x = self.relu.forward(x);
        let x = self.dropout.forward(x);
        self.fc2.forward(x)
    }

    fn forward_traced(&self, x: Tensor<B, 4>, trace: &mut ForwardTrace) -> Tensor<B, 2> {
        let x = self.conv1.forward_traced("conv1", x, trace);
        let x = self.conv2.forward_traced("conv2", x, trace);
        let x = self.conv3.forward_traced("conv3", x, trace);

        let x = trace::adaptive_avg_pool2d("global_pool", &self.global_pool, x, trace);
        let x = Self::flatten(x);

        let x = trace::linear("fc1", &self.fc1, x, trace);
        let x = trace::relu("relu", &self.relu, x, trace);
        let x = trace::dropout("dropout", &self.dropout, x, trace);
        trace::linear("fc2", &self.fc2, x, trace)
    }

    fn parameters(&self) -> Vec<ParamInfo> {
        let mut params = Vec::new();
        self.conv1.collect_params("conv1", &mut params);
        self.conv2.collect_params("conv2", &mut params);
        self.conv3.collect_params("conv3", &mut params);
        self.fc1.collect_params("fc1", &mut params);
        self.fc2.collect_params("fc2", &mut params);
        params
    }

    fn num_classes(&self) -> usize {
        self.num_classes
    }
}

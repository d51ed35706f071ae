//! Forward-pass tracing
//!
//! Instrumented wrappers around the Burn layers used by the classifiers in
//! this crate. Each wrapper runs the real layer, then records the layer kind,
//! its output shape, its parameters and the floating point operations it
//! performed into a [`ForwardTrace`].
//!
//! ## FLOP counting rules
//!
//! One fused multiply-add counts as one FLOP and biases are ignored:
//!
//! | Layer               | FLOPs                                         |
//! |---------------------|-----------------------------------------------|
//! | `Conv2d`            | `output_elements * in_channels/groups * kh * kw` |
//! | `Linear`            | `batch * d_input * d_output`                  |
//! | `BatchNorm` (eval)  | `2 * input_elements`                          |
//! | `AdaptiveAvgPool2d` | `input_elements`                              |
//! | ReLU, MaxPool, Dropout | not counted                                |

use burn::{
    module::Param,
    nn::{
        conv::Conv2d,
        pool::{AdaptiveAvgPool2d, MaxPool2d},
        BatchNorm, Dropout, Linear, Relu,
    },
    tensor::{backend::Backend, Tensor},
};
use serde::{Deserialize, Serialize};

/// Kind of a traced leaf layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayerKind {
    Conv2d,
    BatchNorm2d,
    ReLU,
    MaxPool2d,
    AdaptiveAvgPool2d,
    Linear,
    Dropout,
}

impl std::fmt::Display for LayerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LayerKind::Conv2d => "Conv2d",
            LayerKind::BatchNorm2d => "BatchNorm2d",
            LayerKind::ReLU => "ReLU",
            LayerKind::MaxPool2d => "MaxPool2d",
            LayerKind::AdaptiveAvgPool2d => "AdaptiveAvgPool2d",
            LayerKind::Linear => "Linear",
            LayerKind::Dropout => "Dropout",
        };
        f.write_str(name)
    }
}

/// A single parameter tensor of a model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamInfo {
    /// Dotted path of the parameter, e.g. `conv1.conv.weight`
    pub name: String,
    /// Tensor dimensions
    pub shape: Vec<usize>,
    /// Whether the parameter receives gradients
    pub trainable: bool,
}

impl ParamInfo {
    /// Number of scalar elements in the parameter tensor
    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }
}

/// One leaf layer as observed during a traced forward pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerRecord {
    /// Layer kind
    pub kind: LayerKind,
    /// Dotted path of the layer inside the model
    pub name: String,
    /// Output shape including the batch dimension
    pub output_shape: Vec<usize>,
    /// Parameters owned by this layer
    pub params: Vec<ParamInfo>,
    /// Floating point operations performed by this layer
    pub flops: u64,
}

impl LayerRecord {
    /// Number of parameter elements owned by this layer
    pub fn num_params(&self) -> usize {
        self.params.iter().map(ParamInfo::numel).sum()
    }
}

/// Ordered record of the leaf layers visited by one forward pass
#[derive(Debug, Clone, Default)]
pub struct ForwardTrace {
    layers: Vec<LayerRecord>,
}

impl ForwardTrace {
    /// Create an empty trace
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a layer to the trace
    pub fn record(
        &mut self,
        kind: LayerKind,
        name: &str,
        output_shape: &[usize],
        params: Vec<ParamInfo>,
        flops: u64,
    ) {
        tracing::trace!("{} {} -> {:?} ({} FLOPs)", kind, name, output_shape, flops);

        self.layers.push(LayerRecord {
            kind,
            name: name.to_string(),
            output_shape: output_shape.to_vec(),
            params,
            flops,
        });
    }

    /// Layers in the order they were executed
    pub fn layers(&self) -> &[LayerRecord] {
        &self.layers
    }

    /// Sum of FLOPs over all traced layers
    pub fn total_flops(&self) -> u64 {
        self.layers.iter().map(|l| l.flops).sum()
    }

    /// Whether no layer has been recorded
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

/// Layers that own trainable parameters
pub trait ParamSource {
    /// Append this layer's parameters, named under `prefix`
    fn collect_params(&self, prefix: &str, out: &mut Vec<ParamInfo>);

    /// Parameters of this layer as a fresh list
    fn params(&self, prefix: &str) -> Vec<ParamInfo> {
        let mut out = Vec::new();
        self.collect_params(prefix, &mut out);
        out
    }
}

/// Join a module path and a field name with a dot
pub fn join_name(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

fn param_info<B: Backend, const D: usize>(
    prefix: &str,
    name: &str,
    param: &Param<Tensor<B, D>>,
) -> ParamInfo {
    let tensor = param.val();
    ParamInfo {
        name: join_name(prefix, name),
        shape: tensor.dims().to_vec(),
        trainable: tensor.is_require_grad(),
    }
}

impl<B: Backend> ParamSource for Conv2d<B> {
    fn collect_params(&self, prefix: &str, out: &mut Vec<ParamInfo>) {
        out.push(param_info(prefix, "weight", &self.weight));
        if let Some(bias) = &self.bias {
            out.push(param_info(prefix, "bias", bias));
        }
    }
}

impl<B: Backend> ParamSource for Linear<B> {
    fn collect_params(&self, prefix: &str, out: &mut Vec<ParamInfo>) {
        out.push(param_info(prefix, "weight", &self.weight));
        if let Some(bias) = &self.bias {
            out.push(param_info(prefix, "bias", bias));
        }
    }
}

impl<B: Backend> ParamSource for BatchNorm<B> {
    fn collect_params(&self, prefix: &str, out: &mut Vec<ParamInfo>) {
        out.push(param_info(prefix, "gamma", &self.gamma));
        out.push(param_info(prefix, "beta", &self.beta));
    }
}

fn numel(dims: &[usize]) -> u64 {
    dims.iter().product::<usize>() as u64
}

/// Traced 2D convolution
pub fn conv2d<B: Backend>(
    name: &str,
    layer: &Conv2d<B>,
    x: Tensor<B, 4>,
    trace: &mut ForwardTrace,
) -> Tensor<B, 4> {
    let output = layer.forward(x);
    let output_dims = output.dims();

    // weight: [out_channels, in_channels / groups, kernel_h, kernel_w]
    let [_, in_per_group, kernel_h, kernel_w] = layer.weight.val().dims();
    let flops = numel(&output_dims) * (in_per_group * kernel_h * kernel_w) as u64;

    trace.record(LayerKind::Conv2d, name, &output_dims, layer.params(name), flops);
    output
}

/// Traced batch normalization (inference statistics)
pub fn batch_norm<B: Backend>(
    name: &str,
    layer: &BatchNorm<B>,
    x: Tensor<B, 4>,
    trace: &mut ForwardTrace,
) -> Tensor<B, 4> {
    let flops = 2 * numel(&x.dims());
    let output = layer.forward(x);

    trace.record(LayerKind::BatchNorm2d, name, &output.dims(), layer.params(name), flops);
    output
}

/// Traced ReLU activation
pub fn relu<B: Backend, const D: usize>(
    name: &str,
    layer: &Relu,
    x: Tensor<B, D>,
    trace: &mut ForwardTrace,
) -> Tensor<B, D> {
    let output = layer.forward(x);

    trace.record(LayerKind::ReLU, name, &output.dims(), Vec::new(), 0);
    output
}

/// Traced 2D max pooling
pub fn max_pool2d<B: Backend>(
    name: &str,
    layer: &MaxPool2d,
    x: Tensor<B, 4>,
    trace: &mut ForwardTrace,
) -> Tensor<B, 4> {
    let output = layer.forward(x);

    trace.record(LayerKind::MaxPool2d, name, &output.dims(), Vec::new(), 0);
    output
}

/// Traced adaptive average pooling
pub fn adaptive_avg_pool2d<B: Backend>(
    name: &str,
    layer: &AdaptiveAvgPool2d,
    x: Tensor<B, 4>,
    trace: &mut ForwardTrace,
) -> Tensor<B, 4> {
    let flops = numel(&x.dims());
    let output = layer.forward(x);

    trace.record(LayerKind::AdaptiveAvgPool2d, name, &output.dims(), Vec::new(), flops);
    output
}

/// Traced fully connected layer on a `[batch, features]` input
pub fn linear<B: Backend>(
    name: &str,
    layer: &Linear<B>,
    x: Tensor<B, 2>,
    trace: &mut ForwardTrace,
) -> Tensor<B, 2> {
    let [batch, _] = x.dims();
    // weight: [d_input, d_output]
    let [d_input, d_output] = layer.weight.val().dims();
    let output = layer.forward(x);
    let flops = (batch * d_input * d_output) as u64;

    trace.record(LayerKind::Linear, name, &output.dims(), layer.params(name), flops);
    output
}

/// Traced dropout
pub fn dropout<B: Backend, const D: usize>(
    name: &str,
    layer: &Dropout,
    x: Tensor<B, D>,
    trace: &mut ForwardTrace,
) -> Tensor<B, D> {
    let output = layer.forward(x);

    trace.record(LayerKind::Dropout, name, &output.dims(), Vec::new(), 0);
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::nn::{
        conv::Conv2dConfig, pool::AdaptiveAvgPool2dConfig, BatchNormConfig, LinearConfig,
        PaddingConfig2d,
    };
    use burn_ndarray::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_conv2d_flops_and_params() {
        let device = Default::default();
        let conv = Conv2dConfig::new([3, 4], [3, 3])
            .with_padding(PaddingConfig2d::Same)
            .init::<TestBackend>(&device);
        let input = Tensor::<TestBackend, 4>::zeros([1, 3, 8, 8], &device);

        let mut trace = ForwardTrace::new();
        let output = conv2d("conv", &conv, input, &mut trace);

        assert_eq!(output.dims(), [1, 4, 8, 8]);
        let layer = &trace.layers()[0];
        assert_eq!(layer.kind, LayerKind::Conv2d);
        // 4 * 8 * 8 outputs, each a 3x3x3 dot product
        assert_eq!(layer.flops, 256 * 27);
        // 4 * 3 * 3 * 3 weights + 4 biases
        assert_eq!(layer.num_params(), 112);
        assert_eq!(layer.params[0].name, "conv.weight");
        assert_eq!(layer.params[1].name, "conv.bias");
    }

    #[test]
    fn test_linear_flops_scale_with_batch() {
        let device = Default::default();
        let fc = LinearConfig::new(10, 5).init::<TestBackend>(&device);

        let mut trace = ForwardTrace::new();
        let output = linear("fc", &fc, Tensor::zeros([2, 10], &device), &mut trace);

        assert_eq!(output.dims(), [2, 5]);
        assert_eq!(trace.total_flops(), 100);
        assert_eq!(trace.layers()[0].num_params(), 55);
    }

    #[test]
    fn test_norm_and_pool_flops() {
        let device = Default::default();
        let bn = BatchNormConfig::new(4).init::<TestBackend>(&device);
        let pool = AdaptiveAvgPool2dConfig::new([1, 1]).init();

        let mut trace = ForwardTrace::new();
        let x = Tensor::<TestBackend, 4>::ones([1, 4, 8, 8], &device);
        let x = batch_norm("bn", &bn, x, &mut trace);
        let x = relu("relu", &Relu::new(), x, &mut trace);
        let x = adaptive_avg_pool2d("pool", &pool, x, &mut trace);

        assert_eq!(x.dims(), [1, 4, 1, 1]);
        let flops: Vec<u64> = trace.layers().iter().map(|l| l.flops).collect();
        assert_eq!(flops, vec![512, 0, 256]);
        assert_eq!(trace.layers()[0].num_params(), 8);
    }

    #[test]
    fn test_params_on_inference_backend_are_not_trainable() {
        let device = Default::default();
        let fc = LinearConfig::new(4, 2).init::<TestBackend>(&device);

        let params = fc.params("head");
        assert_eq!(params.len(), 2);
        assert!(params.iter().all(|p| !p.trainable));
        assert_eq!(params[0].shape, vec![4, 2]);
    }

    #[test]
    fn test_join_name() {
        assert_eq!(join_name("", "weight"), "weight");
        assert_eq!(join_name("conv1.conv", "weight"), "conv1.conv.weight");
    }
}

//! Layer-by-layer model summary
//!
//! Renders a traced forward pass as the familiar table of layer type, output
//! shape and parameter count, followed by parameter totals and float32 memory
//! estimates.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::InputShape;
use crate::model::{LayerRecord, ParamInfo};
use crate::utils::{bytes_to_mb, format_number};

const RULE: &str = "----------------------------------------------------------------";
const DOUBLE_RULE: &str = "================================================================";

/// Bytes per float32 element
const BYTES_PER_ELEMENT: f64 = 4.0;

/// One row of the summary table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRow {
    /// Layer type with its 1-based execution index, e.g. `Conv2d-1`
    pub layer: String,
    /// Output shape with the batch dimension shown as -1
    pub output_shape: Vec<i64>,
    /// Parameter elements owned by the layer
    pub params: usize,
}

impl SummaryRow {
    fn shape_string(&self) -> String {
        let dims: Vec<String> = self.output_shape.iter().map(|d| d.to_string()).collect();
        format!("[{}]", dims.join(", "))
    }

    /// Elements of one sample's output (batch dimension excluded)
    fn per_sample_elements(&self) -> usize {
        self.output_shape.iter().skip(1).map(|&d| d as usize).product()
    }
}

/// Summary of a model's architecture for one input shape
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSummary {
    pub input_shape: InputShape,
    pub rows: Vec<SummaryRow>,
    pub total_params: usize,
    pub trainable_params: usize,
    /// Sum of per-sample output elements over all layers
    pub total_output_elements: usize,
}

impl ModelSummary {
    /// Build a summary from traced layers
    ///
    /// `params` supplies the trainable flags; parameters are matched to
    /// layers by name.
    pub fn new(input_shape: InputShape, layers: &[LayerRecord], params: &[ParamInfo]) -> Self {
        let trainable: HashSet<&str> = params
            .iter()
            .filter(|p| p.trainable)
            .map(|p| p.name.as_str())
            .collect();

        let rows: Vec<SummaryRow> = layers
            .iter()
            .enumerate()
            .map(|(idx, layer)| {
                let output_shape = std::iter::once(-1)
                    .chain(layer.output_shape.iter().skip(1).map(|&d| d as i64))
                    .collect();

                SummaryRow {
                    layer: format!("{}-{}", layer.kind, idx + 1),
                    output_shape,
                    params: layer.num_params(),
                }
            })
            .collect();

        let total_params = rows.iter().map(|r| r.params).sum();
        let trainable_params = layers
            .iter()
            .flat_map(|layer| layer.params.iter())
            .filter(|p| trainable.contains(p.name.as_str()))
            .map(ParamInfo::numel)
            .sum();
        let total_output_elements = rows.iter().map(SummaryRow::per_sample_elements).sum();

        Self {
            input_shape,
            rows,
            total_params,
            trainable_params,
            total_output_elements,
        }
    }

    pub fn non_trainable_params(&self) -> usize {
        self.total_params - self.trainable_params
    }

    pub fn input_size_mb(&self) -> f64 {
        bytes_to_mb(self.input_shape.numel() as f64 * BYTES_PER_ELEMENT)
    }

    /// Activations kept for a forward and a backward pass
    pub fn forward_backward_size_mb(&self) -> f64 {
        bytes_to_mb(2.0 * self.total_output_elements as f64 * BYTES_PER_ELEMENT)
    }

    pub fn params_size_mb(&self) -> f64 {
        bytes_to_mb(self.total_params as f64 * BYTES_PER_ELEMENT)
    }

    pub fn estimated_total_size_mb(&self) -> f64 {
        self.input_size_mb() + self.forward_backward_size_mb() + self.params_size_mb()
    }
}

impl std::fmt::Display for ModelSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", RULE)?;
        writeln!(f, "{:>20}  {:>25} {:>15}", "Layer (type)", "Output Shape", "Param #")?;
        writeln!(f, "{}", DOUBLE_RULE)?;
        for row in &self.rows {
            writeln!(
                f,
                "{:>20}  {:>25} {:>15}",
                row.layer,
                row.shape_string(),
                format_number(row.params)
            )?;
        }
        writeln!(f, "{}", DOUBLE_RULE)?;
        writeln!(f, "Total params: {}", format_number(self.total_params))?;
        writeln!(f, "Trainable params: {}", format_number(self.trainable_params))?;
        writeln!(f, "Non-trainable params: {}", format_number(self.non_trainable_params()))?;
        writeln!(f, "{}", RULE)?;
        writeln!(f, "Input size (MB): {:.2}", self.input_size_mb())?;
        writeln!(f, "Forward/backward pass size (MB): {:.2}", self.forward_backward_size_mb())?;
        writeln!(f, "Params size (MB): {:.2}", self.params_size_mb())?;
        writeln!(f, "Estimated Total Size (MB): {:.2}", self.estimated_total_size_mb())?;
        write!(f, "{}", RULE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LayerKind;

    fn layer(kind: LayerKind, name: &str, shape: &[usize], params: Vec<ParamInfo>) -> LayerRecord {
        LayerRecord {
            kind,
            name: name.to_string(),
            output_shape: shape.to_vec(),
            params,
            flops: 0,
        }
    }

    fn param(name: &str, shape: &[usize], trainable: bool) -> ParamInfo {
        ParamInfo {
            name: name.to_string(),
            shape: shape.to_vec(),
            trainable,
        }
    }

    fn sample_layers() -> Vec<LayerRecord> {
        vec![
            layer(
                LayerKind::Conv2d,
                "conv",
                &[1, 4, 8, 8],
                vec![param("conv.weight", &[4, 3, 3, 3], false), param("conv.bias", &[4], false)],
            ),
            layer(LayerKind::ReLU, "relu", &[1, 4, 8, 8], Vec::new()),
            layer(
                LayerKind::Linear,
                "fc",
                &[1, 2],
                vec![param("fc.weight", &[256, 2], false), param("fc.bias", &[2], false)],
            ),
        ]
    }

    #[test]
    fn test_rows_are_numbered_in_execution_order() {
        let summary = ModelSummary::new(InputShape::new(3, 8, 8), &sample_layers(), &[]);

        let labels: Vec<&str> = summary.rows.iter().map(|r| r.layer.as_str()).collect();
        assert_eq!(labels, vec!["Conv2d-1", "ReLU-2", "Linear-3"]);
        assert_eq!(summary.rows[0].output_shape, vec![-1, 4, 8, 8]);
        assert_eq!(summary.rows[0].params, 112);
    }

    #[test]
    fn test_trainable_flags_come_from_inventory() {
        let inventory = vec![
            param("conv.weight", &[4, 3, 3, 3], true),
            param("conv.bias", &[4], true),
            param("fc.weight", &[256, 2], false),
            param("fc.bias", &[2], false),
        ];
        let summary = ModelSummary::new(InputShape::new(3, 8, 8), &sample_layers(), &inventory);

        assert_eq!(summary.total_params, 112 + 514);
        assert_eq!(summary.trainable_params, 112);
        assert_eq!(summary.non_trainable_params(), 514);
    }

    #[test]
    fn test_memory_estimates() {
        let summary = ModelSummary::new(InputShape::new(3, 8, 8), &sample_layers(), &[]);

        // 256 + 256 + 2 output elements per sample
        assert_eq!(summary.total_output_elements, 514);
        let expected = 2.0 * 514.0 * 4.0 / (1024.0 * 1024.0);
        assert!((summary.forward_backward_size_mb() - expected).abs() < 1e-12);
        assert!(summary.estimated_total_size_mb() > summary.params_size_mb());
    }

    #[test]
    fn test_display_layout() {
        let summary = ModelSummary::new(InputShape::new(3, 8, 8), &sample_layers(), &[]);
        let text = summary.to_string();

        let header = format!("{}Layer (type){}Output Shape{}Param #", " ".repeat(8), " ".repeat(15), " ".repeat(9));
        let first_row = format!("{}Conv2d-1{}[-1, 4, 8, 8]{}112", " ".repeat(12), " ".repeat(14), " ".repeat(13));
        assert!(text.contains(&header));
        assert!(text.contains(&first_row));
        assert!(text.contains("Total params: 626"));
        assert!(text.contains("Non-trainable params: 626"));
        assert!(text.ends_with(RULE));
    }
}

//! Small ONNX classifiers for tests
//!
//! Only the slice of the ONNX protobuf schema needed to describe a linear
//! binary classifier is declared here. Models follow the exported pipeline
//! contract: one float input `[1, n_features]`, an int64 `label` output and a
//! float `probabilities` output `[1, 2]`.

use prost::Message;
use std::path::Path;

const FLOAT: i32 = 1;
const INT64: i32 = 7;
const ATTRIBUTE_INT: i32 = 2;

#[derive(Clone, PartialEq, Message)]
struct ModelProto {
    #[prost(int64, tag = "1")]
    ir_version: i64,
    #[prost(string, tag = "2")]
    producer_name: String,
    #[prost(message, optional, tag = "7")]
    graph: Option<GraphProto>,
    #[prost(message, repeated, tag = "8")]
    opset_import: Vec<OperatorSetIdProto>,
}

#[derive(Clone, PartialEq, Message)]
struct OperatorSetIdProto {
    #[prost(string, tag = "1")]
    domain: String,
    #[prost(int64, tag = "2")]
    version: i64,
}

#[derive(Clone, PartialEq, Message)]
struct GraphProto {
    #[prost(message, repeated, tag = "1")]
    node: Vec<NodeProto>,
    #[prost(string, tag = "2")]
    name: String,
    #[prost(message, repeated, tag = "5")]
    initializer: Vec<TensorProto>,
    #[prost(message, repeated, tag = "11")]
    input: Vec<ValueInfoProto>,
    #[prost(message, repeated, tag = "12")]
    output: Vec<ValueInfoProto>,
}

#[derive(Clone, PartialEq, Message)]
struct NodeProto {
    #[prost(string, repeated, tag = "1")]
    input: Vec<String>,
    #[prost(string, repeated, tag = "2")]
    output: Vec<String>,
    #[prost(string, tag = "3")]
    name: String,
    #[prost(string, tag = "4")]
    op_type: String,
    #[prost(message, repeated, tag = "5")]
    attribute: Vec<AttributeProto>,
}

#[derive(Clone, PartialEq, Message)]
struct AttributeProto {
    #[prost(string, tag = "1")]
    name: String,
    #[prost(int64, tag = "3")]
    i: i64,
    #[prost(int32, tag = "20")]
    r#type: i32,
}

#[derive(Clone, PartialEq, Message)]
struct TensorProto {
    #[prost(int64, repeated, tag = "1")]
    dims: Vec<i64>,
    #[prost(int32, tag = "2")]
    data_type: i32,
    #[prost(float, repeated, tag = "4")]
    float_data: Vec<f32>,
    #[prost(string, tag = "8")]
    name: String,
}

#[derive(Clone, PartialEq, Message)]
struct ValueInfoProto {
    #[prost(string, tag = "1")]
    name: String,
    #[prost(message, optional, tag = "2")]
    r#type: Option<TypeProto>,
}

#[derive(Clone, PartialEq, Message)]
struct TypeProto {
    #[prost(message, optional, tag = "1")]
    tensor_type: Option<TensorTypeProto>,
}

#[derive(Clone, PartialEq, Message)]
struct TensorTypeProto {
    #[prost(int32, tag = "1")]
    elem_type: i32,
    #[prost(message, optional, tag = "2")]
    shape: Option<TensorShapeProto>,
}

#[derive(Clone, PartialEq, Message)]
struct TensorShapeProto {
    #[prost(message, repeated, tag = "1")]
    dim: Vec<Dimension>,
}

#[derive(Clone, PartialEq, Message)]
struct Dimension {
    #[prost(int64, optional, tag = "1")]
    dim_value: Option<i64>,
}

fn node(op_type: &str, inputs: &[&str], output: &str, attribute: Vec<AttributeProto>) -> NodeProto {
    NodeProto {
        input: inputs.iter().map(|s| s.to_string()).collect(),
        output: vec![output.to_string()],
        name: output.to_string(),
        op_type: op_type.to_string(),
        attribute,
    }
}

fn int_attribute(name: &str, value: i64) -> AttributeProto {
    AttributeProto {
        name: name.to_string(),
        i: value,
        r#type: ATTRIBUTE_INT,
    }
}

fn float_tensor(name: &str, dims: &[i64], data: Vec<f32>) -> TensorProto {
    TensorProto {
        dims: dims.to_vec(),
        data_type: FLOAT,
        float_data: data,
        name: name.to_string(),
    }
}

fn value_info(name: &str, elem_type: i32, dims: Option<&[i64]>) -> ValueInfoProto {
    ValueInfoProto {
        name: name.to_string(),
        r#type: Some(TypeProto {
            tensor_type: Some(TensorTypeProto {
                elem_type,
                shape: dims.map(|dims| TensorShapeProto {
                    dim: dims.iter().map(|d| Dimension { dim_value: Some(*d) }).collect(),
                }),
            }),
        }),
    }
}

/// Binary classifier with `P(1) = sigmoid(x . weights + bias)`; the label is
/// 1 when that probability exceeds 0.5.
pub fn linear_classifier(weights: &[f32], bias: f32) -> Vec<u8> {
    let width = weights.len() as i64;

    let graph = GraphProto {
        name: "linear_classifier".to_string(),
        node: vec![
            node("MatMul", &["input", "coef"], "score", vec![]),
            node("Add", &["score", "intercept"], "logit", vec![]),
            node("Sigmoid", &["logit"], "positive", vec![]),
            node("Sub", &["one", "positive"], "negative", vec![]),
            node("Concat", &["negative", "positive"], "probabilities", vec![int_attribute("axis", 1)]),
            node("Greater", &["positive", "half"], "is_positive", vec![]),
            node("Cast", &["is_positive"], "label", vec![int_attribute("to", INT64 as i64)]),
        ],
        initializer: vec![
            float_tensor("coef", &[width, 1], weights.to_vec()),
            float_tensor("intercept", &[1], vec![bias]),
            float_tensor("one", &[1], vec![1.0]),
            float_tensor("half", &[1], vec![0.5]),
        ],
        input: vec![value_info("input", FLOAT, Some(&[1, width]))],
        output: vec![
            value_info("label", INT64, None),
            value_info("probabilities", FLOAT, None),
        ],
    };

    ModelProto {
        ir_version: 7,
        producer_name: "toodu-tests".to_string(),
        graph: Some(graph),
        opset_import: vec![OperatorSetIdProto {
            domain: String::new(),
            version: 13,
        }],
    }
    .encode_to_vec()
}

/// Write [`linear_classifier`] to `path`
pub fn write_linear_classifier(path: &Path, weights: &[f32], bias: f32) -> std::io::Result<()> {
    std::fs::write(path, linear_classifier(weights, bias))
}

/// `1 / (1 + e^-x)` in the precision the models compute in
pub fn sigmoid(x: f32) -> f64 {
    (1.0 / (1.0 + (-x).exp())) as f64
}

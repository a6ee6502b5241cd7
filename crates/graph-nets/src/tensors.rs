use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ------------------------------------------------------------------
// Named tensor format
// ------------------------------------------------------------------

/// Tensor names in the order the model graph declares its inputs.
pub const TENSOR_NAMES: [&str; 7] = [
    "nodes",
    "edges",
    "receivers",
    "senders",
    "globals",
    "n_node",
    "n_edge",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    Float32,
    Int32,
}

/// One entry of a dataset file: `{"name": .., "dtype": .., "value": ..}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorData {
    pub name: String,
    pub dtype: DType,
    pub value: Value,
}

impl TensorData {
    fn matrix(name: &str, m: &Array2<f32>) -> Self {
        let rows: Vec<Vec<f32>> =
            m.rows().into_iter().map(|r| r.to_vec()).collect();
        Self {
            name: name.to_string(),
            dtype: DType::Float32,
            value: serde_json::json!(rows),
        }
    }

    fn vector(name: &str, v: &Array1<i32>) -> Self {
        Self {
            name: name.to_string(),
            dtype: DType::Int32,
            value: serde_json::json!(v.to_vec()),
        }
    }
}

// ------------------------------------------------------------------
// Graph tensors
// ------------------------------------------------------------------

/// Flat tensor view of one or more graphs, as consumed by the model.
///
/// Row `i` of `edges` belongs to the directed edge `senders[i] -> receivers[i]`,
/// both indices pointing into the rows of `nodes`.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphTensors {
    pub nodes: Array2<f32>,
    pub edges: Array2<f32>,
    pub receivers: Array1<i32>,
    pub senders: Array1<i32>,
    pub globals: Array2<f32>,
    pub n_node: Array1<i32>,
    pub n_edge: Array1<i32>,
}

impl GraphTensors {
    /// Wrap a single graph. Globals are a `[[0]]` placeholder; the model
    /// computes the real global state itself.
    pub fn single(
        nodes: Array2<f32>,
        edges: Array2<f32>,
        senders: Vec<usize>,
        receivers: Vec<usize>,
    ) -> Self {
        debug_assert_eq!(senders.len(), edges.nrows());
        debug_assert_eq!(receivers.len(), edges.nrows());
        let n_node = nodes.nrows() as i32;
        let n_edge = edges.nrows() as i32;
        Self {
            nodes,
            edges,
            receivers: receivers.into_iter().map(|r| r as i32).collect(),
            senders: senders.into_iter().map(|s| s as i32).collect(),
            globals: Array2::zeros((1, 1)),
            n_node: Array1::from(vec![n_node]),
            n_edge: Array1::from(vec![n_edge]),
        }
    }

    pub fn num_graphs(&self) -> usize {
        self.n_node.len()
    }

    /// Check the cross-tensor contract without building anything.
    pub fn validate(&self) -> Result<(), DecodeError> {
        let edges = self.edges.nrows();
        if self.senders.len() != edges || self.receivers.len() != edges {
            return Err(DecodeError::LengthMismatch {
                senders: self.senders.len(),
                receivers: self.receivers.len(),
                edges,
            });
        }
        if self.n_edge.len() != self.n_node.len() {
            return Err(DecodeError::CountMismatch {
                tensor: "n_edge",
                declared: self.n_edge.len(),
                found: self.n_node.len(),
            });
        }
        let declared_nodes = checked_total("n_node", &self.n_node)?;
        if declared_nodes != self.nodes.nrows() {
            return Err(DecodeError::CountMismatch {
                tensor: "n_node",
                declared: declared_nodes,
                found: self.nodes.nrows(),
            });
        }
        let declared_edges = checked_total("n_edge", &self.n_edge)?;
        if declared_edges != edges {
            return Err(DecodeError::CountMismatch {
                tensor: "n_edge",
                declared: declared_edges,
                found: edges,
            });
        }
        if self.globals.nrows() != self.n_node.len() {
            return Err(DecodeError::CountMismatch {
                tensor: "globals",
                declared: self.n_node.len(),
                found: self.globals.nrows(),
            });
        }
        Ok(())
    }

    /// Graph id of every node row.
    pub fn node_graph_ids(&self) -> Vec<usize> {
        segment_ids(&self.n_node)
    }

    /// Graph id of every edge row.
    pub fn edge_graph_ids(&self) -> Vec<usize> {
        segment_ids(&self.n_edge)
    }

    /// Inverse of the encoder: feature rows plus index triples.
    ///
    /// Endpoints stay plain integers; turning them into graph references
    /// is left to the caller.
    pub fn decode(&self) -> Result<DecodedGraph, DecodeError> {
        self.validate()?;

        let nodes: Vec<Vec<f32>> =
            self.nodes.rows().into_iter().map(|r| r.to_vec()).collect();

        let mut edges = Vec::with_capacity(self.edges.nrows());
        for (i, row) in self.edges.rows().into_iter().enumerate() {
            let sender = non_negative("senders", self.senders[i])?;
            let receiver = non_negative("receivers", self.receivers[i])?;
            edges.push(DecodedEdge {
                sender,
                receiver,
                features: row.to_vec(),
            });
        }

        Ok(DecodedGraph { nodes, edges })
    }

    /// Serialize to the named list in model input order.
    pub fn to_named(&self) -> Vec<TensorData> {
        vec![
            TensorData::matrix("nodes", &self.nodes),
            TensorData::matrix("edges", &self.edges),
            TensorData::vector("receivers", &self.receivers),
            TensorData::vector("senders", &self.senders),
            TensorData::matrix("globals", &self.globals),
            TensorData::vector("n_node", &self.n_node),
            TensorData::vector("n_edge", &self.n_edge),
        ]
    }

    /// Parse a named list. Lookup is by name, so the order in the file
    /// does not matter.
    pub fn from_named(tensors: &[TensorData]) -> Result<Self, DecodeError> {
        let find = |name: &'static str| {
            tensors
                .iter()
                .find(|t| t.name == name)
                .map(|t| &t.value)
                .ok_or(DecodeError::MissingTensor(name))
        };

        let nodes = parse_matrix("nodes", find("nodes")?)?;
        let edges = parse_matrix("edges", find("edges")?)?;
        let receivers = parse_indices("receivers", find("receivers")?)?;
        let senders = parse_indices("senders", find("senders")?)?;
        let n_node = parse_indices("n_node", find("n_node")?)?;
        let n_edge = parse_indices("n_edge", find("n_edge")?)?;
        let globals = match tensors.iter().find(|t| t.name == "globals") {
            Some(t) => parse_matrix("globals", &t.value)?,
            None => Array2::zeros((n_node.len(), 1)),
        };

        let tensors = Self {
            nodes,
            edges,
            receivers,
            senders,
            globals,
            n_node,
            n_edge,
        };
        tensors.validate()?;
        Ok(tensors)
    }
}

fn segment_ids(counts: &Array1<i32>) -> Vec<usize> {
    counts
        .iter()
        .enumerate()
        .flat_map(|(g, &c)| std::iter::repeat_n(g, c.max(0) as usize))
        .collect()
}

fn checked_total(
    tensor: &'static str,
    counts: &Array1<i32>,
) -> Result<usize, DecodeError> {
    counts.iter().try_fold(0usize, |acc, &c| {
        Ok(acc + non_negative(tensor, c)?)
    })
}

fn non_negative(tensor: &'static str, value: i32) -> Result<usize, DecodeError> {
    usize::try_from(value)
        .map_err(|_| DecodeError::NegativeIndex { tensor, value })
}

fn parse_number(tensor: &'static str, value: &Value) -> Result<f64, DecodeError> {
    value
        .as_f64()
        .ok_or_else(|| DecodeError::NotANumber { tensor })
}

fn parse_matrix(
    tensor: &'static str,
    value: &Value,
) -> Result<Array2<f32>, DecodeError> {
    let rows = value
        .as_array()
        .ok_or(DecodeError::NotAMatrix { tensor })?;

    let mut width = None;
    let mut data = Vec::new();
    for (row_idx, row) in rows.iter().enumerate() {
        let row = row
            .as_array()
            .ok_or(DecodeError::NotAMatrix { tensor })?;
        match width {
            None => width = Some(row.len()),
            Some(w) if w != row.len() => {
                return Err(DecodeError::RaggedRows {
                    tensor,
                    row: row_idx,
                    expected: w,
                    found: row.len(),
                });
            }
            Some(_) => {}
        }
        for v in row {
            data.push(parse_number(tensor, v)? as f32);
        }
    }

    Ok(Array2::from_shape_vec((rows.len(), width.unwrap_or(0)), data)?)
}

fn parse_indices(
    tensor: &'static str,
    value: &Value,
) -> Result<Array1<i32>, DecodeError> {
    // Some exports store the counts as a bare scalar.
    if value.is_number() {
        return Ok(Array1::from(vec![parse_number(tensor, value)? as i32]));
    }
    let items = value
        .as_array()
        .ok_or(DecodeError::NotAMatrix { tensor })?;
    items
        .iter()
        .map(|v| parse_number(tensor, v).map(|n| n as i32))
        .collect::<Result<Vec<_>, _>>()
        .map(Array1::from)
}

// ------------------------------------------------------------------
// Decoded graph
// ------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedEdge {
    pub sender: usize,
    pub receiver: usize,
    pub features: Vec<f32>,
}

/// Graph rebuilt from tensors, with unresolved integer endpoints.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DecodedGraph {
    pub nodes: Vec<Vec<f32>>,
    pub edges: Vec<DecodedEdge>,
}

#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error("tensor `{0}` is missing")]
    MissingTensor(&'static str),
    #[error("tensor `{tensor}` is not a list of lists")]
    NotAMatrix { tensor: &'static str },
    #[error("tensor `{tensor}` holds a non-numeric value")]
    NotANumber { tensor: &'static str },
    #[error("tensor `{tensor}` row {row} has {found} columns, expected {expected}")]
    RaggedRows {
        tensor: &'static str,
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error(
        "senders ({senders}), receivers ({receivers}) and edges ({edges}) disagree in length"
    )]
    LengthMismatch {
        senders: usize,
        receivers: usize,
        edges: usize,
    },
    #[error("`{tensor}` declares {declared} entries but {found} are present")]
    CountMismatch {
        tensor: &'static str,
        declared: usize,
        found: usize,
    },
    #[error("`{tensor}` holds negative value {value}")]
    NegativeIndex { tensor: &'static str, value: i32 },
    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),
}

// ------------------------------------------------------------------
// Tests
// ------------------------------------------------------------------

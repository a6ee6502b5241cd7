use ndarray::{concatenate, Array1, Array2, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::model::{GraphModel, InferenceError};
use crate::segment::{segment_reduce, Aggregation};
use crate::tensors::GraphTensors;

// Hyper-parameter grid offered by the playground.
pub const DEPTH_OPTIONS: [usize; 4] = [1, 2, 3, 4];
pub const NODE_DIM_OPTIONS: [usize; 3] = [25, 50, 100];
pub const EDGE_DIM_OPTIONS: [usize; 3] = [5, 10, 20];
pub const GLOBAL_DIM_OPTIONS: [usize; 3] = [25, 50, 100];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub depth: usize,
    pub aggregation: Aggregation,
    pub node_dim: usize,
    pub edge_dim: usize,
    pub global_dim: usize,
    pub learn_nodes: bool,
    pub learn_edges: bool,
    pub learn_globals: bool,
    /// Width of the one-hot node features.
    pub node_features: usize,
    /// Width of the one-hot edge features.
    pub edge_features: usize,
    pub seed: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            depth: 3,
            aggregation: Aggregation::Sum,
            node_dim: 50,
            edge_dim: 10,
            global_dim: 50,
            learn_nodes: true,
            learn_edges: true,
            learn_globals: true,
            node_features: 4,
            edge_features: 4,
            seed: 7,
        }
    }
}

// ------------------------------------------------------------------
// Layers
// ------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dense {
    pub weight: Array2<f32>,
    pub bias: Array1<f32>,
}

impl Dense {
    /// Glorot-uniform weights, zero bias.
    fn seeded(rng: &mut StdRng, inputs: usize, outputs: usize) -> Self {
        let limit = (6.0 / (inputs + outputs).max(1) as f32).sqrt();
        let weight = Array2::from_shape_fn((inputs, outputs), |_| {
            rng.random_range(-limit..=limit)
        });
        Self {
            weight,
            bias: Array1::zeros(outputs),
        }
    }

    fn forward(&self, x: ArrayView2<f32>) -> Array2<f32> {
        x.dot(&self.weight) + &self.bias
    }

    fn shape(&self) -> (usize, usize) {
        self.weight.dim()
    }
}

fn relu(mut x: Array2<f32>) -> Array2<f32> {
    x.mapv_inplace(|v| v.max(0.0));
    x
}

fn sigmoid(mut x: Array2<f32>) -> Array2<f32> {
    x.mapv_inplace(|v| 1.0 / (1.0 + (-v).exp()));
    x
}

/// One round of message passing. A missing layer means that part of the
/// state is carried through unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Block {
    edge: Option<Dense>,
    node: Option<Dense>,
    global: Option<Dense>,
}

// ------------------------------------------------------------------
// Network
// ------------------------------------------------------------------

/// Encode-process-decode graph network over [`GraphTensors`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNetwork {
    config: NetworkConfig,
    node_encoder: Dense,
    edge_encoder: Dense,
    global_encoder: Dense,
    blocks: Vec<Block>,
    score_head: Dense,
    embedding_head: Dense,
}

impl GraphNetwork {
    /// Build a network with deterministic weights drawn from `config.seed`.
    pub fn seeded(config: NetworkConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let (n, e, g) = (config.node_dim, config.edge_dim, config.global_dim);

        let node_encoder = Dense::seeded(&mut rng, config.node_features, n);
        let edge_encoder = Dense::seeded(&mut rng, config.edge_features, e);
        let global_encoder = Dense::seeded(&mut rng, 1, g);

        let blocks = (0..config.depth)
            .map(|_| Block {
                edge: config
                    .learn_edges
                    .then(|| Dense::seeded(&mut rng, e + 2 * n + g, e)),
                node: config
                    .learn_nodes
                    .then(|| Dense::seeded(&mut rng, n + e + g, n)),
                global: config
                    .learn_globals
                    .then(|| Dense::seeded(&mut rng, g + n + e, g)),
            })
            .collect();

        let score_head = Dense::seeded(&mut rng, g + n + e, 1);
        let embedding_head = Dense::seeded(&mut rng, g + n + e, 2);

        log::debug!(
            "built graph network: depth {}, {:?} aggregation",
            config.depth,
            config.aggregation
        );

        Self {
            config,
            node_encoder,
            edge_encoder,
            global_encoder,
            blocks,
            score_head,
            embedding_head,
        }
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn from_json(json: &str) -> Result<Self, NetworkError> {
        let network: Self = serde_json::from_str(json)?;
        network.check_shapes()?;
        Ok(network)
    }

    pub fn to_json(&self) -> Result<String, NetworkError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Every layer must agree with the dimensions in the config, otherwise
    /// the forward pass would multiply incompatible matrices.
    fn check_shapes(&self) -> Result<(), NetworkError> {
        let c = &self.config;
        let (n, e, g) = (c.node_dim, c.edge_dim, c.global_dim);
        let readout = g + n + e;

        let mut expected: Vec<(String, &Dense, (usize, usize))> = vec![
            ("node_encoder".into(), &self.node_encoder, (c.node_features, n)),
            ("edge_encoder".into(), &self.edge_encoder, (c.edge_features, e)),
            ("global_encoder".into(), &self.global_encoder, (1, g)),
            ("score_head".into(), &self.score_head, (readout, 1)),
            ("embedding_head".into(), &self.embedding_head, (readout, 2)),
        ];
        for (i, block) in self.blocks.iter().enumerate() {
            if let Some(layer) = &block.edge {
                expected.push((format!("block {i} edge"), layer, (e + 2 * n + g, e)));
            }
            if let Some(layer) = &block.node {
                expected.push((format!("block {i} node"), layer, (n + e + g, n)));
            }
            if let Some(layer) = &block.global {
                expected.push((format!("block {i} global"), layer, (g + n + e, g)));
            }
        }

        for (layer, dense, shape) in expected {
            if dense.shape() != shape || dense.bias.len() != shape.1 {
                return Err(NetworkError::LayerShape {
                    layer,
                    expected: shape,
                    found: dense.shape(),
                });
            }
        }
        Ok(())
    }

    fn check_width(
        tensor: &'static str,
        expected: usize,
        found: usize,
    ) -> Result<(), InferenceError> {
        if expected == found {
            Ok(())
        } else {
            Err(InferenceError::FeatureWidth {
                tensor,
                expected,
                found,
            })
        }
    }

    fn indices(
        tensor: &'static str,
        values: &Array1<i32>,
        bound: usize,
    ) -> Result<Vec<usize>, InferenceError> {
        values
            .iter()
            .map(|&v| match usize::try_from(v) {
                Ok(i) if i < bound => Ok(i),
                _ => Err(InferenceError::IndexOutOfRange {
                    tensor,
                    index: v,
                    bound,
                }),
            })
            .collect()
    }
}

impl GraphModel for GraphNetwork {
    fn predict(
        &self,
        inputs: &GraphTensors,
    ) -> Result<Vec<Array2<f32>>, InferenceError> {
        inputs.validate()?;
        let c = &self.config;
        let num_nodes = inputs.nodes.nrows();
        let num_graphs = inputs.num_graphs();

        // Empty matrices may arrive without a declared width.
        if num_nodes > 0 {
            Self::check_width("nodes", c.node_features, inputs.nodes.ncols())?;
        }
        if inputs.edges.nrows() > 0 {
            Self::check_width("edges", c.edge_features, inputs.edges.ncols())?;
        }
        Self::check_width("globals", 1, inputs.globals.ncols())?;

        let senders = Self::indices("senders", &inputs.senders, num_nodes)?;
        let receivers =
            Self::indices("receivers", &inputs.receivers, num_nodes)?;
        let node_graph = inputs.node_graph_ids();
        let edge_graph = inputs.edge_graph_ids();

        let nodes = if num_nodes > 0 {
            inputs.nodes.clone()
        } else {
            Array2::zeros((0, c.node_features))
        };
        let edges = if inputs.edges.nrows() > 0 {
            inputs.edges.clone()
        } else {
            Array2::zeros((0, c.edge_features))
        };

        let mut v = relu(self.node_encoder.forward(nodes.view()));
        let mut e = relu(self.edge_encoder.forward(edges.view()));
        let mut u = relu(self.global_encoder.forward(inputs.globals.view()));

        for block in &self.blocks {
            if let Some(layer) = &block.edge {
                let x = concatenate(
                    Axis(1),
                    &[
                        e.view(),
                        v.select(Axis(0), &senders).view(),
                        v.select(Axis(0), &receivers).view(),
                        u.select(Axis(0), &edge_graph).view(),
                    ],
                )?;
                e = relu(layer.forward(x.view()));
            }
            if let Some(layer) = &block.node {
                let incoming = segment_reduce(
                    e.view(),
                    &receivers,
                    num_nodes,
                    c.aggregation,
                );
                let x = concatenate(
                    Axis(1),
                    &[
                        v.view(),
                        incoming.view(),
                        u.select(Axis(0), &node_graph).view(),
                    ],
                )?;
                v = relu(layer.forward(x.view()));
            }
            if let Some(layer) = &block.global {
                let x = self.readout(&u, &v, &e, &node_graph, &edge_graph, num_graphs)?;
                u = relu(layer.forward(x.view()));
            }
        }

        let x = self.readout(&u, &v, &e, &node_graph, &edge_graph, num_graphs)?;
        let score = sigmoid(self.score_head.forward(x.view()));
        let embedding = self.embedding_head.forward(x.view());

        Ok(vec![score, embedding])
    }
}

impl GraphNetwork {
    fn readout(
        &self,
        u: &Array2<f32>,
        v: &Array2<f32>,
        e: &Array2<f32>,
        node_graph: &[usize],
        edge_graph: &[usize],
        num_graphs: usize,
    ) -> Result<Array2<f32>, InferenceError> {
        let agg = self.config.aggregation;
        let nodes = segment_reduce(v.view(), node_graph, num_graphs, agg);
        let edges = segment_reduce(e.view(), edge_graph, num_graphs, agg);
        Ok(concatenate(Axis(1), &[u.view(), nodes.view(), edges.view()])?)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum NetworkError {
    #[error("weights file is not valid: {0}")]
    Json(#[from] serde_json::Error),
    #[error("layer `{layer}` has shape {found:?}, expected {expected:?}")]
    LayerShape {
        layer: String,
        expected: (usize, usize),
        found: (usize, usize),
    },
}

// ------------------------------------------------------------------
// Tests
// ------------------------------------------------------------------

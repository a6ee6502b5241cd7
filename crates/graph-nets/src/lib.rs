//! Graph tensors, segment reductions and a small message-passing network.
//!
//! Nothing in here knows about molecules or user interfaces: graphs arrive
//! as [`GraphTensors`] and leave as raw output arrays or a [`Prediction`].

pub mod model;
pub mod network;
pub mod outputs;
pub mod segment;
pub mod tensors;

pub use model::{predict_graph, GraphModel, InferenceError};
pub use network::{GraphNetwork, NetworkConfig, NetworkError};
pub use outputs::{OutputError, Prediction};
pub use segment::{segment_reduce, Aggregation};
pub use tensors::{DecodeError, DecodedEdge, DecodedGraph, GraphTensors, TensorData};

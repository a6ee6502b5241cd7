use graph_nets::{GraphModel, GraphTensors, InferenceError, Prediction, predict_graph};
use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender, channel};

/// Monotonic id of an inference request. Only the newest one may update
/// the displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestToken(u64);

#[derive(Debug)]
pub struct Completion {
    pub token: RequestToken,
    pub result: Result<Prediction, InferenceError>,
}

#[derive(Debug)]
pub enum Accepted {
    Applied(Prediction),
    /// A newer request was issued after this one.
    Stale,
    /// The newest request failed; the previous prediction stays.
    Failed(InferenceError),
}

/// Issues tokens and keeps the last accepted prediction.
#[derive(Debug, Default)]
pub struct PredictionTracker {
    next: u64,
    latest: Option<RequestToken>,
    settled: bool,
    current: Option<Prediction>,
    /// Request that produced `current`.
    applied: Option<RequestToken>,
}

impl PredictionTracker {
    pub fn issue(&mut self) -> RequestToken {
        let token = RequestToken(self.next);
        self.next += 1;
        self.latest = Some(token);
        self.settled = false;
        token
    }

    pub fn accept(&mut self, completion: Completion) -> Accepted {
        if self.latest != Some(completion.token) || self.settled {
            return Accepted::Stale;
        }
        self.settled = true;
        match completion.result {
            Ok(prediction) => {
                self.current = Some(prediction);
                self.applied = Some(completion.token);
                Accepted::Applied(prediction)
            }
            Err(e) => Accepted::Failed(e),
        }
    }

    pub fn current(&self) -> Option<Prediction> {
        self.current
    }

    /// The token the next call to [`issue`](Self::issue) will return.
    pub fn next_token(&self) -> RequestToken {
        RequestToken(self.next)
    }

    /// The current prediction, if it answers `token` or a later request.
    pub fn current_since(&self, token: RequestToken) -> Option<Prediction> {
        match self.applied {
            Some(applied) if applied >= token => self.current,
            _ => None,
        }
    }

    /// Whether the newest request is still outstanding.
    pub fn is_pending(&self) -> bool {
        self.latest.is_some() && !self.settled
    }
}

/// Runs the model off the UI thread where threads exist.
pub struct InferenceRunner {
    model: Arc<dyn GraphModel>,
    sender: Sender<Completion>,
    receiver: Receiver<Completion>,
}

impl InferenceRunner {
    pub fn new(model: Arc<dyn GraphModel>) -> Self {
        let (sender, receiver) = channel();
        Self {
            model,
            sender,
            receiver,
        }
    }

    /// Requests already submitted finish with the model they started with.
    pub fn set_model(&mut self, model: Arc<dyn GraphModel>) {
        self.model = model;
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn submit(&self, token: RequestToken, tensors: GraphTensors) {
        let model = self.model.clone();
        let sender = self.sender.clone();
        let spawned = std::thread::Builder::new()
            .name("inference".to_string())
            .spawn(move || {
                let result = predict_graph(model.as_ref(), &tensors);
                // The runner may be gone by now, which is fine.
                let _ = sender.send(Completion { token, result });
            });
        if let Err(e) = spawned {
            let _ = self.sender.send(Completion {
                token,
                result: Err(InferenceError::Worker(e.to_string())),
            });
        }
    }

    #[cfg(target_arch = "wasm32")]
    pub fn submit(&self, token: RequestToken, tensors: GraphTensors) {
        let result = predict_graph(self.model.as_ref(), &tensors);
        let _ = self.sender.send(Completion { token, result });
    }

    /// Completions that arrived since the last call, in arrival order.
    pub fn drain(&self) -> Vec<Completion> {
        self.receiver.try_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, array};
    use std::time::Duration;

    struct Constant(f32);

    impl GraphModel for Constant {
        fn predict(
            &self,
            _inputs: &GraphTensors,
        ) -> Result<Vec<Array2<f32>>, InferenceError> {
            // Embedding first, to exercise the shape-based disambiguation.
            Ok(vec![array![[1.0, 2.0]], array![[self.0]]])
        }
    }

    fn prediction(score: f32) -> Prediction {
        Prediction {
            score,
            embedding: [0.0, 0.0],
        }
    }

    #[test]
    fn test_stale_completion_is_dropped() {
        let mut tracker = PredictionTracker::default();
        let first = tracker.issue();
        let second = tracker.issue();

        let late = tracker.accept(Completion {
            token: first,
            result: Ok(prediction(0.1)),
        });
        assert!(matches!(late, Accepted::Stale));
        assert!(tracker.is_pending());

        let fresh = tracker.accept(Completion {
            token: second,
            result: Ok(prediction(0.9)),
        });
        assert!(matches!(fresh, Accepted::Applied(_)));
        assert_eq!(tracker.current(), Some(prediction(0.9)));
        assert!(!tracker.is_pending());
    }

    #[test]
    fn test_failure_keeps_last_prediction() {
        let mut tracker = PredictionTracker::default();
        let ok = tracker.issue();
        tracker.accept(Completion {
            token: ok,
            result: Ok(prediction(0.4)),
        });

        let failing = tracker.issue();
        let outcome = tracker.accept(Completion {
            token: failing,
            result: Err(InferenceError::Worker("boom".into())),
        });

        assert!(matches!(outcome, Accepted::Failed(_)));
        assert_eq!(tracker.current(), Some(prediction(0.4)));
    }

    #[test]
    fn test_prediction_before_a_mark_is_not_current_since() {
        let mut tracker = PredictionTracker::default();
        let old = tracker.issue();
        tracker.accept(Completion {
            token: old,
            result: Ok(prediction(0.2)),
        });

        let mark = tracker.next_token();
        assert_eq!(tracker.current_since(mark), None);
        assert_eq!(tracker.current(), Some(prediction(0.2)));

        let fresh = tracker.issue();
        assert_eq!(fresh, mark);
        tracker.accept(Completion {
            token: fresh,
            result: Ok(prediction(0.8)),
        });
        assert_eq!(tracker.current_since(mark), Some(prediction(0.8)));
    }

    #[test]
    fn test_runner_delivers_completion() {
        let mut tracker = PredictionTracker::default();
        let runner = InferenceRunner::new(Arc::new(Constant(0.75)));
        let token = tracker.issue();

        runner.submit(token, GraphTensors::single(
            Array2::zeros((0, 4)),
            Array2::zeros((0, 4)),
            vec![],
            vec![],
        ));
        let completion = runner
            .receiver
            .recv_timeout(Duration::from_secs(5))
            .expect("worker answers");

        assert_eq!(completion.token, token);
        match tracker.accept(completion) {
            Accepted::Applied(p) => {
                assert_eq!(p.score, 0.75);
                assert_eq!(p.embedding, [1.0, 2.0]);
            }
            other => panic!("expected a prediction, got {:?}", other),
        }
    }
}

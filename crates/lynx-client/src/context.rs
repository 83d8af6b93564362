// Author: The Lynx Developers
// Copyright © 2026, The Lynx Developers, all rights reserved.
// Created: 15 October 2026

/*!
A session bound to one served model.
*/

use crate::{
    classification::decode_classes,
    pool::{Reply, RequestPool},
    transport::{InferRequest, ModelRef, Protocol, Transport},
    ClientError, GrpcTransport, HttpTransport,
};
use lynx_core::prelude::{InferSession, ModelConfig, ResultSet, RunOptions};
use std::sync::{mpsc, Arc};

/// Number of requests a context keeps on the wire at once unless told otherwise.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 4;

/// A request that has been queued for sending and not yet resolved.
pub struct PendingRequest {
    id: u64,
    options: RunOptions,
    response: mpsc::Receiver<Reply>,
}

impl PendingRequest {
    /// The id the request was sent with.
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Inference context for a single model, holding the bindings of the request being built.
pub struct InferContext {
    transport: Arc<dyn Transport>,
    model: ModelRef,
    config: ModelConfig,
    options: Option<RunOptions>,
    bindings: Vec<u8>,
    bound: usize,
    input_bytes: Option<usize>,
    next_id: u64,
    max_in_flight: usize,
    pool: Option<RequestPool>,
}

impl InferContext {
    /// Connect to the service at `url` and fetch the configuration of model `name`.
    pub fn create(
        protocol: Protocol,
        url: &str,
        name: &str,
        version: Option<i64>,
    ) -> Result<Self, ClientError> {
        let transport: Arc<dyn Transport> = match protocol {
            Protocol::Http => Arc::new(HttpTransport::new(url)?),
            Protocol::Grpc => Arc::new(GrpcTransport::connect(url)?),
        };

        log::debug!("connected to {} at {}", protocol, url);
        Self::with_transport(transport, ModelRef::new(name, version))
    }

    /// Bind to `model` over an existing transport.
    pub fn with_transport(
        transport: Arc<dyn Transport>,
        model: ModelRef,
    ) -> Result<Self, ClientError> {
        let config = transport.model_config(&model)?;
        log::info!(
            "model {} has {} input(s), {} output(s), max batch size {}",
            model,
            config.inputs.len(),
            config.outputs.len(),
            config.max_batch_size
        );

        Ok(Self {
            transport,
            model,
            input_bytes: input_bytes(&config),
            config,
            options: None,
            bindings: vec![],
            bound: 0,
            next_id: 0,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            pool: None,
        })
    }

    /// Limit how many submitted requests are on the wire at once.
    ///
    /// Takes effect for the first submission; later submissions reuse its workers.
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    /// The model this context is bound to.
    pub fn model(&self) -> &ModelRef {
        &self.model
    }

    fn options(&self) -> Result<RunOptions, ClientError> {
        self.options.ok_or(ClientError::NotConfigured)
    }

    fn clear_bindings(&mut self) {
        self.bindings.clear();
        self.bound = 0;
    }

    /// Build the request for the current bindings, which must fill every slot.
    fn take_request(&mut self) -> Result<(InferRequest, RunOptions), ClientError> {
        let options = self.options()?;
        if self.bound != options.batch_size {
            return Err(ClientError::IncompleteBatch {
                bound: self.bound,
                expected: options.batch_size,
            });
        }

        let input = self
            .config
            .inputs
            .first()
            .ok_or_else(|| ClientError::InvalidConfig("model declares no input".to_owned()))?;
        let output = self
            .config
            .output_name()
            .ok_or_else(|| ClientError::MissingOutput(String::new()))?;

        let mut shape = Vec::with_capacity(input.dims.len() + 1);
        if self.config.max_batch_size > 0 {
            shape.push(options.batch_size as i64);
        }
        shape.extend_from_slice(&input.dims);

        let id = self.next_id;
        self.next_id += 1;

        let request = InferRequest {
            id: id.to_string(),
            input: input.name.clone(),
            datatype: input.data_type,
            shape,
            data: std::mem::take(&mut self.bindings),
            output: output.to_owned(),
            top_k: options.top_k,
        };
        self.bound = 0;

        Ok((request, options))
    }
}

/// Byte size of one element of the model's input, if it has a fixed one.
fn input_bytes(config: &ModelConfig) -> Option<usize> {
    let input = config.inputs.first()?;
    input
        .dims
        .iter()
        .try_fold(input.data_type.size()?, |bytes, &dim| {
            usize::try_from(dim)
                .ok()
                .filter(|&dim| dim > 0)
                .map(|dim| bytes * dim)
        })
}

impl InferSession for InferContext {
    type Pending = PendingRequest;

    fn model_name(&self) -> &str {
        &self.model.name
    }

    fn config(&self) -> &ModelConfig {
        &self.config
    }

    fn set_run_options(&mut self, options: RunOptions) -> anyhow::Result<()> {
        log::debug!(
            "run options: batch size {}, top {} classes",
            options.batch_size,
            options.top_k
        );

        self.options = Some(options);
        self.clear_bindings();
        Ok(())
    }

    fn reset_input(&mut self) -> anyhow::Result<()> {
        self.options()?;
        self.clear_bindings();
        Ok(())
    }

    fn bind_input(&mut self, data: &[u8]) -> anyhow::Result<()> {
        let options = self.options()?;
        if self.bound >= options.batch_size {
            return Err(ClientError::BatchFull {
                batch_size: options.batch_size,
            }
            .into());
        }

        let expected = self.input_bytes.ok_or_else(|| {
            ClientError::InvalidConfig("model input has no fixed size".to_owned())
        })?;
        if data.len() != expected {
            return Err(ClientError::InputSize {
                found: data.len(),
                expected,
            }
            .into());
        }

        if self.bound == 0 {
            self.bindings.reserve(expected * options.batch_size);
        }
        self.bindings.extend_from_slice(data);
        self.bound += 1;
        Ok(())
    }

    fn run(&mut self) -> anyhow::Result<ResultSet> {
        let (request, options) = self.take_request()?;
        log::debug!("sending request {} ({} bytes)", request.id, request.data.len());

        let response = self.transport.infer(&self.model, &request)?;
        Ok(decode_classes(&response.classes, options.batch_size)?)
    }

    fn submit(&mut self) -> anyhow::Result<Self::Pending> {
        let (request, options) = self.take_request()?;
        let id = self.next_id - 1;
        log::debug!("submitting request {} ({} bytes)", id, request.data.len());

        let pool = match &mut self.pool {
            Some(pool) => pool,
            pool @ None => pool.insert(RequestPool::new(
                Arc::clone(&self.transport),
                self.max_in_flight,
            )?),
        };
        log::trace!("{} request workers", pool.size());
        let response = pool.send(self.model.clone(), request)?;

        Ok(PendingRequest {
            id,
            options,
            response,
        })
    }

    fn resolve(&mut self, pending: Self::Pending) -> anyhow::Result<ResultSet> {
        let response = pending
            .response
            .recv()
            .map_err(|_| ClientError::WorkerPanicked)??;
        log::debug!("resolved request {}", pending.id);

        Ok(decode_classes(
            &response.classes,
            pending.options.batch_size,
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::InferResponse;
    use lynx_core::prelude::{DataType, InputFormat, TensorConfig};
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Mutex,
        },
        time::Duration,
    };

    /// Answers every request with the same best class for each slot and records what it got.
    #[derive(Default)]
    struct EchoTransport {
        max_batch_size: u32,
        seen: Mutex<Vec<InferRequest>>,
    }

    impl Transport for EchoTransport {
        fn model_config(&self, model: &ModelRef) -> Result<ModelConfig, ClientError> {
            Ok(ModelConfig {
                name: model.name.clone(),
                max_batch_size: self.max_batch_size,
                inputs: vec![TensorConfig {
                    name: "data".to_owned(),
                    data_type: DataType::Uint8,
                    format: InputFormat::Nhwc,
                    dims: vec![2, 2, 1],
                }],
                outputs: vec![TensorConfig {
                    name: "prob".to_owned(),
                    data_type: DataType::Fp32,
                    format: InputFormat::None,
                    dims: vec![10],
                }],
            })
        }

        fn infer(
            &self,
            _model: &ModelRef,
            request: &InferRequest,
        ) -> Result<InferResponse, ClientError> {
            self.seen.lock().unwrap().push(request.clone());

            let slots = request.data.len() / 4;
            let classes = request
                .data
                .chunks(4)
                .take(slots)
                .flat_map(|slot| {
                    (0..request.top_k).map(move |rank| format!("0.5:{}:c{}", slot[0], rank))
                })
                .collect();

            Ok(InferResponse {
                id: request.id.clone(),
                classes,
            })
        }
    }

    fn context(max_batch_size: u32) -> (Arc<EchoTransport>, InferContext) {
        let transport = Arc::new(EchoTransport {
            max_batch_size,
            ..Default::default()
        });
        let ctx = InferContext::with_transport(transport.clone(), ModelRef::new("tiny", None))
            .unwrap();
        (transport, ctx)
    }

    #[test]
    fn run_sends_batch_shape_and_all_slots() {
        let (transport, mut ctx) = context(4);
        ctx.set_run_options(RunOptions::new(2, 3)).unwrap();
        ctx.reset_input().unwrap();
        ctx.bind_input(&[7; 4]).unwrap();
        ctx.bind_input(&[9; 4]).unwrap();

        let result = ctx.run().unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result.classes(0).len(), 3);
        assert_eq!(result.classes(1)[0].index, 9);

        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen[0].shape, [2, 2, 2, 1]);
        assert_eq!(seen[0].input, "data");
        assert_eq!(seen[0].output, "prob");
        assert_eq!(seen[0].top_k, 3);
    }

    #[test]
    fn unbatched_models_have_no_batch_dimension() {
        let (transport, mut ctx) = context(0);
        ctx.set_run_options(RunOptions::new(1, 1)).unwrap();
        ctx.reset_input().unwrap();
        ctx.bind_input(&[1; 4]).unwrap();
        ctx.run().unwrap();

        assert_eq!(transport.seen.lock().unwrap()[0].shape, [2, 2, 1]);
    }

    #[test]
    fn submitted_requests_resolve_in_any_order() {
        let (_, mut ctx) = context(1);
        ctx.set_run_options(RunOptions::new(1, 1)).unwrap();

        let mut pending = vec![];
        for value in 0..3u8 {
            ctx.reset_input().unwrap();
            ctx.bind_input(&[value; 4]).unwrap();
            pending.push(ctx.submit().unwrap());
        }

        assert_eq!(pending.iter().map(|p| p.id()).collect::<Vec<_>>(), [0, 1, 2]);
        for (value, request) in pending.into_iter().enumerate().rev() {
            let result = ctx.resolve(request).unwrap();
            assert_eq!(result.classes(0)[0].index, value);
        }
    }

    #[test]
    fn binding_requires_run_options() {
        let (_, mut ctx) = context(1);
        let err = ctx.bind_input(&[0; 4]).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ClientError>(),
            Some(ClientError::NotConfigured)
        ));
    }

    #[test]
    fn rejects_overfull_and_incomplete_batches() {
        let (_, mut ctx) = context(4);
        ctx.set_run_options(RunOptions::new(2, 1)).unwrap();
        ctx.reset_input().unwrap();
        ctx.bind_input(&[0; 4]).unwrap();

        let err = ctx.run().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ClientError>(),
            Some(ClientError::IncompleteBatch {
                bound: 1,
                expected: 2
            })
        ));

        ctx.reset_input().unwrap();
        ctx.bind_input(&[0; 4]).unwrap();
        ctx.bind_input(&[0; 4]).unwrap();
        assert!(ctx.bind_input(&[0; 4]).is_err());
    }

    fn assert_input_size(err: anyhow::Error, found: usize) {
        assert!(
            matches!(
                err.downcast_ref::<ClientError>(),
                Some(&ClientError::InputSize { found: f, expected: 4 }) if f == found
            ),
            "{err}"
        );
    }

    #[test]
    fn slots_must_have_matching_sizes() {
        let (_, mut ctx) = context(4);
        ctx.set_run_options(RunOptions::new(2, 1)).unwrap();
        ctx.reset_input().unwrap();
        ctx.bind_input(&[0; 4]).unwrap();

        assert_input_size(ctx.bind_input(&[0; 3]).unwrap_err(), 3);
    }

    #[test]
    fn slot_size_comes_from_model_input() {
        let (transport, mut ctx) = context(4);
        ctx.set_run_options(RunOptions::new(2, 1)).unwrap();
        ctx.reset_input().unwrap();

        assert_input_size(ctx.bind_input(&[0; 3]).unwrap_err(), 3);
        assert_input_size(ctx.bind_input(&[0; 5]).unwrap_err(), 5);

        // nothing was bound, so a consistent but wrong batch never reaches the wire
        assert!(ctx.bind_input(&[0; 3]).is_err());
        assert!(ctx.run().is_err());
        assert!(transport.seen.lock().unwrap().is_empty());
    }

    /// Holds every request for a moment and records how many were in flight at once.
    #[derive(Default)]
    struct SlowTransport {
        echo: EchoTransport,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl Transport for SlowTransport {
        fn model_config(&self, model: &ModelRef) -> Result<ModelConfig, ClientError> {
            self.echo.model_config(model)
        }

        fn infer(
            &self,
            model: &ModelRef,
            request: &InferRequest,
        ) -> Result<InferResponse, ClientError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(5));
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            self.echo.infer(model, request)
        }
    }

    #[test]
    fn submissions_share_a_bounded_set_of_workers() {
        let transport = Arc::new(SlowTransport {
            echo: EchoTransport {
                max_batch_size: 1,
                ..Default::default()
            },
            ..Default::default()
        });
        let mut ctx = InferContext::with_transport(transport.clone(), ModelRef::new("tiny", None))
            .unwrap()
            .with_max_in_flight(3);
        ctx.set_run_options(RunOptions::new(1, 1)).unwrap();

        let mut pending = vec![];
        for value in 0..24u8 {
            ctx.reset_input().unwrap();
            ctx.bind_input(&[value; 4]).unwrap();
            pending.push(ctx.submit().unwrap());
        }
        assert_eq!(ctx.pool.as_ref().map(RequestPool::size), Some(3));

        for (value, request) in pending.into_iter().enumerate() {
            let result = ctx.resolve(request).unwrap();
            assert_eq!(result.classes(0)[0].index, value);
        }

        assert!(transport.peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(transport.echo.seen.lock().unwrap().len(), 24);
    }

    struct PanickingTransport(EchoTransport);

    impl Transport for PanickingTransport {
        fn model_config(&self, model: &ModelRef) -> Result<ModelConfig, ClientError> {
            self.0.model_config(model)
        }

        fn infer(
            &self,
            _model: &ModelRef,
            _request: &InferRequest,
        ) -> Result<InferResponse, ClientError> {
            panic!("connection reset");
        }
    }

    #[test]
    fn panicking_request_is_reported_on_resolve() {
        let transport = Arc::new(PanickingTransport(EchoTransport::default()));
        let mut ctx =
            InferContext::with_transport(transport, ModelRef::new("tiny", None)).unwrap();
        ctx.set_run_options(RunOptions::new(1, 1)).unwrap();

        for _ in 0..2 {
            ctx.reset_input().unwrap();
            ctx.bind_input(&[0; 4]).unwrap();
            let pending = ctx.submit().unwrap();

            let err = ctx.resolve(pending).unwrap_err();
            assert!(matches!(
                err.downcast_ref::<ClientError>(),
                Some(ClientError::WorkerPanicked)
            ));
        }
    }
}

// Author: The Lynx Developers
// Copyright © 2026, The Lynx Developers, all rights reserved.
// Created: 15 October 2026

/*!
The KServe v2 gRPC protocol.

Calls are made through a generic tonic client on a runtime owned by the
transport, so callers stay synchronous. Any number of threads may be
blocked on calls at once.
*/

use crate::{
    classification::split_bytes_tensor,
    proto,
    transport::{base_url, InferRequest, InferResponse, ModelRef, Transport},
    ClientError,
};
use lynx_core::prelude::{DataType, InputFormat, ModelConfig, TensorConfig};
use std::collections::HashMap;
use tonic::{
    codec::ProstCodec,
    codegen::http::uri::PathAndQuery,
    transport::{Channel, Endpoint},
};

const MODEL_CONFIG: &str = "/inference.GRPCInferenceService/ModelConfig";
const MODEL_INFER: &str = "/inference.GRPCInferenceService/ModelInfer";

pub struct GrpcTransport {
    runtime: tokio::runtime::Runtime,
    channel: Channel,
}

impl GrpcTransport {
    /// Connect to the service at `url`.
    pub fn connect(url: &str) -> Result<Self, ClientError> {
        let endpoint =
            Endpoint::from_shared(base_url(url)).map_err(|e| ClientError::InvalidUrl {
                url: url.to_owned(),
                reason: e.to_string(),
            })?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("lynx-grpc")
            .enable_all()
            .build()
            .map_err(ClientError::Runtime)?;

        let channel = runtime
            .block_on(endpoint.connect())
            .map_err(|e| ClientError::Transport(format!("{}: {}", url, e)))?;

        Ok(Self { runtime, channel })
    }

    fn unary<Req, Resp>(&self, path: &'static str, message: Req) -> Result<Resp, ClientError>
    where
        Req: prost::Message + Send + Sync + 'static,
        Resp: prost::Message + Default + Send + Sync + 'static,
    {
        self.runtime.block_on(async {
            let mut client = tonic::client::Grpc::new(self.channel.clone());
            client
                .ready()
                .await
                .map_err(|e| ClientError::Transport(e.to_string()))?;

            let response = client
                .unary(
                    tonic::Request::new(message),
                    PathAndQuery::from_static(path),
                    ProstCodec::<Req, Resp>::default(),
                )
                .await?;

            Ok::<_, ClientError>(response.into_inner())
        })
    }
}

impl Transport for GrpcTransport {
    fn model_config(&self, model: &ModelRef) -> Result<ModelConfig, ClientError> {
        log::debug!("requesting configuration of {}", model);

        let response: proto::ModelConfigResponse = self.unary(
            MODEL_CONFIG,
            proto::ModelConfigRequest {
                name: model.name.clone(),
                version: model.version_string(),
            },
        )?;

        let config = response
            .config
            .ok_or_else(|| ClientError::InvalidConfig("empty configuration".to_owned()))?;
        convert_config(config)
    }

    fn infer(
        &self,
        model: &ModelRef,
        request: &InferRequest,
    ) -> Result<InferResponse, ClientError> {
        let message = proto::ModelInferRequest {
            model_name: model.name.clone(),
            model_version: model.version_string(),
            id: request.id.clone(),
            parameters: HashMap::new(),
            inputs: vec![proto::InferInputTensor {
                name: request.input.clone(),
                datatype: request.datatype.wire_name().to_owned(),
                shape: request.shape.clone(),
                parameters: HashMap::new(),
            }],
            outputs: vec![proto::InferRequestedOutputTensor {
                name: request.output.clone(),
                parameters: HashMap::from([(
                    "classification".to_owned(),
                    proto::InferParameter::int64(request.top_k as i64),
                )]),
            }],
            raw_input_contents: vec![request.data.clone()],
        };

        log::debug!(
            "ModelInfer {} for {} ({} bytes)",
            request.id,
            model,
            request.data.len()
        );
        let response: proto::ModelInferResponse = self.unary(MODEL_INFER, message)?;

        decode_response(response, &request.output)
    }
}

fn convert_config(config: proto::ModelConfig) -> Result<ModelConfig, ClientError> {
    let data_type = |name: &str, code: i32| {
        DataType::from_config_code(code).ok_or_else(|| {
            ClientError::InvalidConfig(format!("unknown data type {} for {:?}", code, name))
        })
    };

    let inputs = config
        .input
        .into_iter()
        .map(|input| {
            Ok(TensorConfig {
                data_type: data_type(&input.name, input.data_type)?,
                format: InputFormat::from_config_code(input.format).ok_or_else(|| {
                    ClientError::InvalidConfig(format!(
                        "unknown format {} for {:?}",
                        input.format, input.name
                    ))
                })?,
                dims: input.dims,
                name: input.name,
            })
        })
        .collect::<Result<_, ClientError>>()?;

    let outputs = config
        .output
        .into_iter()
        .map(|output| {
            Ok(TensorConfig {
                data_type: data_type(&output.name, output.data_type)?,
                format: InputFormat::None,
                dims: output.dims,
                name: output.name,
            })
        })
        .collect::<Result<_, ClientError>>()?;

    Ok(ModelConfig {
        name: config.name,
        max_batch_size: config.max_batch_size.max(0) as u32,
        inputs,
        outputs,
    })
}

fn decode_response(
    response: proto::ModelInferResponse,
    output_name: &str,
) -> Result<InferResponse, ClientError> {
    let index = response
        .outputs
        .iter()
        .position(|output| output.name == output_name)
        .ok_or_else(|| ClientError::MissingOutput(output_name.to_owned()))?;

    let classes = match response.raw_output_contents.get(index) {
        Some(raw) => split_bytes_tensor(raw)?,
        None => response.outputs[index]
            .contents
            .iter()
            .flat_map(|contents| &contents.bytes_contents)
            .map(|element| String::from_utf8_lossy(element).into_owned())
            .collect(),
    };

    Ok(InferResponse {
        id: response.id,
        classes,
    })
}

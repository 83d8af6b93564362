// Author: The Lynx Developers
// Copyright © 2026, The Lynx Developers, all rights reserved.
// Created: 15 October 2026

/*!
The KServe v2 REST protocol.

Inference requests carry their tensor data as binary after the JSON
header, whose length is sent in the `Inference-Header-Content-Length`
header. Classification output is requested as JSON strings.
*/

use crate::{
    classification::split_bytes_tensor,
    transport::{base_url, InferRequest, InferResponse, ModelRef, Transport},
    ClientError,
};
use lynx_core::prelude::{DataType, InputFormat, ModelConfig, TensorConfig};
use reqwest::blocking::{Client, Response};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const HEADER_LENGTH: &str = "Inference-Header-Content-Length";

/// Talks to a server over HTTP with a blocking client.
pub struct HttpTransport {
    base: String,
    client: Client,
}

impl HttpTransport {
    pub fn new(url: &str) -> Result<Self, ClientError> {
        let base = base_url(url);
        reqwest::Url::parse(&base).map_err(|e| ClientError::InvalidUrl {
            url: url.to_owned(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            base,
            client: Client::builder().build()?,
        })
    }

    fn model_url(&self, model: &ModelRef, endpoint: &str) -> String {
        match model.version {
            Some(version) => format!(
                "{}/v2/models/{}/versions/{}/{}",
                self.base, model.name, version, endpoint
            ),
            None => format!("{}/v2/models/{}/{}", self.base, model.name, endpoint),
        }
    }
}

/// Turn non-success responses into errors carrying the server's message.
fn check(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|e| e.error)
        .unwrap_or(body);

    Err(ClientError::Status {
        status: status.as_u16(),
        message,
    })
}

impl Transport for HttpTransport {
    fn model_config(&self, model: &ModelRef) -> Result<ModelConfig, ClientError> {
        let url = self.model_url(model, "config");
        log::debug!("GET {}", url);

        let response = check(self.client.get(&url).send()?)?;
        let config: ConfigJson = serde_json::from_slice(&response.bytes()?)?;
        config.into_model_config()
    }

    fn infer(
        &self,
        model: &ModelRef,
        request: &InferRequest,
    ) -> Result<InferResponse, ClientError> {
        let header = InferRequestJson {
            id: &request.id,
            inputs: [InputJson {
                name: &request.input,
                datatype: request.datatype.wire_name(),
                shape: &request.shape,
                parameters: InputParameters {
                    binary_data_size: request.data.len(),
                },
            }],
            outputs: [OutputRequestJson {
                name: &request.output,
                parameters: OutputParameters {
                    classification: request.top_k,
                    binary_data: false,
                },
            }],
        };

        let mut body = serde_json::to_vec(&header)?;
        let header_len = body.len();
        body.extend_from_slice(&request.data);

        let url = self.model_url(model, "infer");
        log::debug!("POST {} ({} + {} bytes)", url, header_len, request.data.len());

        let response = check(
            self.client
                .post(&url)
                .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
                .header(HEADER_LENGTH, header_len)
                .body(body)
                .send()?,
        )?;

        let header_len = response
            .headers()
            .get(HEADER_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<usize>().ok());
        let bytes = response.bytes()?;

        decode_response(&bytes, header_len, &request.output)
    }
}

/// Find the classification strings of `output_name` in a response body.
fn decode_response(
    body: &[u8],
    header_len: Option<usize>,
    output_name: &str,
) -> Result<InferResponse, ClientError> {
    let header_len = header_len.unwrap_or(body.len()).min(body.len());
    let (header, mut binary) = body.split_at(header_len);
    let header: InferResponseJson = serde_json::from_slice(header)?;

    let mut classes = None;
    for output in header.outputs {
        // binary outputs are laid out back to back in declaration order
        let raw = match output.parameters.binary_data_size {
            Some(size) => {
                let size = size.min(binary.len());
                let (raw, rest) = binary.split_at(size);
                binary = rest;
                Some(raw)
            }
            None => None,
        };

        if output.name != output_name {
            continue;
        }

        classes = Some(match raw {
            Some(raw) => split_bytes_tensor(raw)?,
            None => output.data,
        });
    }

    Ok(InferResponse {
        id: header.id,
        classes: classes.ok_or_else(|| ClientError::MissingOutput(output_name.to_owned()))?,
    })
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// A dimension, which JSON renderings of the configuration give either as a number or a string.
#[derive(Deserialize)]
#[serde(untagged)]
enum Dim {
    Number(i64),
    Text(String),
}

impl Dim {
    fn value(&self) -> Result<i64, ClientError> {
        match self {
            Dim::Number(value) => Ok(*value),
            Dim::Text(text) => text
                .parse()
                .map_err(|_| ClientError::InvalidConfig(format!("bad dimension {:?}", text))),
        }
    }
}

#[derive(Deserialize)]
struct TensorJson {
    name: String,
    #[serde(default)]
    data_type: Option<String>,
    #[serde(default)]
    format: Option<String>,
    #[serde(default)]
    dims: Vec<Dim>,
}

impl TensorJson {
    fn into_tensor_config(self) -> Result<TensorConfig, ClientError> {
        let data_type = match self.data_type.as_deref() {
            None => DataType::Invalid,
            Some(name) => DataType::from_config_name(name).ok_or_else(|| {
                ClientError::InvalidConfig(format!("unknown data type {:?} for {:?}", name, self.name))
            })?,
        };

        let format = match self.format.as_deref() {
            None => InputFormat::None,
            Some(name) => InputFormat::from_config_name(name).ok_or_else(|| {
                ClientError::InvalidConfig(format!("unknown format {:?} for {:?}", name, self.name))
            })?,
        };

        let dims = self
            .dims
            .iter()
            .map(Dim::value)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(TensorConfig {
            name: self.name,
            data_type,
            format,
            dims,
        })
    }
}

#[derive(Deserialize)]
struct ConfigJson {
    #[serde(default)]
    name: String,
    #[serde(default)]
    max_batch_size: u32,
    #[serde(default)]
    input: Vec<TensorJson>,
    #[serde(default)]
    output: Vec<TensorJson>,
}

impl ConfigJson {
    fn into_model_config(self) -> Result<ModelConfig, ClientError> {
        Ok(ModelConfig {
            name: self.name,
            max_batch_size: self.max_batch_size,
            inputs: self
                .input
                .into_iter()
                .map(TensorJson::into_tensor_config)
                .collect::<Result<_, _>>()?,
            outputs: self
                .output
                .into_iter()
                .map(TensorJson::into_tensor_config)
                .collect::<Result<_, _>>()?,
        })
    }
}

#[derive(Serialize)]
struct InputParameters {
    binary_data_size: usize,
}

#[derive(Serialize)]
struct InputJson<'a> {
    name: &'a str,
    datatype: &'a str,
    shape: &'a [i64],
    parameters: InputParameters,
}

#[derive(Serialize)]
struct OutputParameters {
    classification: usize,
    binary_data: bool,
}

#[derive(Serialize)]
struct OutputRequestJson<'a> {
    name: &'a str,
    parameters: OutputParameters,
}

#[derive(Serialize)]
struct InferRequestJson<'a> {
    id: &'a str,
    inputs: [InputJson<'a>; 1],
    outputs: [OutputRequestJson<'a>; 1],
}

#[derive(Deserialize, Default)]
struct OutputResponseParameters {
    #[serde(default)]
    binary_data_size: Option<usize>,
}

#[derive(Deserialize)]
struct OutputJson {
    name: String,
    #[serde(default)]
    parameters: OutputResponseParameters,
    #[serde(default)]
    data: Vec<String>,
}

#[derive(Deserialize)]
struct InferResponseJson {
    #[serde(default)]
    id: String,
    #[serde(default)]
    outputs: Vec<OutputJson>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_configs_with_string_dims() {
        let json = r#"{
            "name": "densenet",
            "platform": "onnxruntime_onnx",
            "max_batch_size": 0,
            "input": [{"name": "data_0", "data_type": "TYPE_FP32", "format": "FORMAT_NCHW", "dims": ["3", 224, "224"]}],
            "output": [{"name": "fc6_1", "data_type": "TYPE_FP32", "dims": [1000, 1, 1], "label_filename": "labels.txt"}]
        }"#;

        let config = serde_json::from_str::<ConfigJson>(json)
            .unwrap()
            .into_model_config()
            .unwrap();

        assert_eq!(config.max_batch_size, 0);
        assert_eq!(config.inputs[0].dims, [3, 224, 224]);
        assert_eq!(config.inputs[0].format, InputFormat::Nchw);
        assert_eq!(config.outputs[0].format, InputFormat::None);
        assert!(config.validate(1).is_ok());
    }

    #[test]
    fn rejects_unknown_types() {
        let json = r#"{"name": "m", "input": [{"name": "x", "data_type": "TYPE_QUBIT"}]}"#;
        let err = serde_json::from_str::<ConfigJson>(json)
            .unwrap()
            .into_model_config()
            .unwrap_err();

        assert!(matches!(err, ClientError::InvalidConfig(_)));
    }

    #[test]
    fn decodes_json_classification() {
        let body = br#"{"id": "4", "outputs": [{"name": "prob", "datatype": "BYTES", "shape": [1, 2], "data": ["0.9:3:cat", "0.1:5:dog"]}]}"#;
        let response = decode_response(body, None, "prob").unwrap();

        assert_eq!(response.id, "4");
        assert_eq!(response.classes, ["0.9:3:cat", "0.1:5:dog"]);
    }

    #[test]
    fn decodes_binary_classification() {
        let header =
            br#"{"outputs": [{"name": "prob", "parameters": {"binary_data_size": 11}}]}"#.to_vec();
        let mut body = header.clone();
        body.extend_from_slice(&7u32.to_le_bytes());
        body.extend_from_slice(b"0.9:3:a");

        let response = decode_response(&body, Some(header.len()), "prob").unwrap();
        assert_eq!(response.classes, ["0.9:3:a"]);
    }

    #[test]
    fn missing_output_is_an_error() {
        let body = br#"{"outputs": [{"name": "other", "data": []}]}"#;
        assert!(matches!(
            decode_response(body, None, "prob"),
            Err(ClientError::MissingOutput(name)) if name == "prob"
        ));
    }

    #[test]
    fn request_header_layout() {
        let shape = [2, 3, 4, 4];
        let header = InferRequestJson {
            id: "0",
            inputs: [InputJson {
                name: "data",
                datatype: "FP32",
                shape: &shape,
                parameters: InputParameters {
                    binary_data_size: 384,
                },
            }],
            outputs: [OutputRequestJson {
                name: "prob",
                parameters: OutputParameters {
                    classification: 5,
                    binary_data: false,
                },
            }],
        };

        let value = serde_json::to_value(&header).unwrap();
        assert_eq!(value["inputs"][0]["shape"], serde_json::json!([2, 3, 4, 4]));
        assert_eq!(value["inputs"][0]["parameters"]["binary_data_size"], 384);
        assert_eq!(value["outputs"][0]["parameters"]["classification"], 5);
    }

    #[test]
    fn rejects_unparseable_urls() {
        assert!(matches!(
            HttpTransport::new("http://[::1"),
            Err(ClientError::InvalidUrl { .. })
        ));
    }
}

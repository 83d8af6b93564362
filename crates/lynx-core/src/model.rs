// Author: The Lynx Developers
// Copyright © 2026, The Lynx Developers, all rights reserved.
// Created: 14 October 2026

/*!
The subset of a served model's configuration that image classification
depends on, and the checks that decide whether a model is usable.
*/

use thiserror::Error;

/// Element types a model tensor can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Invalid,
    Bool,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Int8,
    Int16,
    Int32,
    Int64,
    Fp16,
    Fp32,
    Fp64,
    String,
}

impl DataType {
    /// Parse the `TYPE_*` name used by model configurations.
    pub fn from_config_name(name: &str) -> Option<Self> {
        let dtype = match name {
            "TYPE_INVALID" => Self::Invalid,
            "TYPE_BOOL" => Self::Bool,
            "TYPE_UINT8" => Self::Uint8,
            "TYPE_UINT16" => Self::Uint16,
            "TYPE_UINT32" => Self::Uint32,
            "TYPE_UINT64" => Self::Uint64,
            "TYPE_INT8" => Self::Int8,
            "TYPE_INT16" => Self::Int16,
            "TYPE_INT32" => Self::Int32,
            "TYPE_INT64" => Self::Int64,
            "TYPE_FP16" => Self::Fp16,
            "TYPE_FP32" => Self::Fp32,
            "TYPE_FP64" => Self::Fp64,
            "TYPE_STRING" => Self::String,
            _ => return None,
        };

        Some(dtype)
    }

    /// Map the numeric enum value of the protobuf model configuration.
    pub fn from_config_code(code: i32) -> Option<Self> {
        let dtype = match code {
            0 => Self::Invalid,
            1 => Self::Bool,
            2 => Self::Uint8,
            3 => Self::Uint16,
            4 => Self::Uint32,
            5 => Self::Uint64,
            6 => Self::Int8,
            7 => Self::Int16,
            8 => Self::Int32,
            9 => Self::Int64,
            10 => Self::Fp16,
            11 => Self::Fp32,
            12 => Self::Fp64,
            13 => Self::String,
            _ => return None,
        };

        Some(dtype)
    }

    /// The `TYPE_*` name used by model configurations.
    pub fn config_name(self) -> &'static str {
        match self {
            Self::Invalid => "TYPE_INVALID",
            Self::Bool => "TYPE_BOOL",
            Self::Uint8 => "TYPE_UINT8",
            Self::Uint16 => "TYPE_UINT16",
            Self::Uint32 => "TYPE_UINT32",
            Self::Uint64 => "TYPE_UINT64",
            Self::Int8 => "TYPE_INT8",
            Self::Int16 => "TYPE_INT16",
            Self::Int32 => "TYPE_INT32",
            Self::Int64 => "TYPE_INT64",
            Self::Fp16 => "TYPE_FP16",
            Self::Fp32 => "TYPE_FP32",
            Self::Fp64 => "TYPE_FP64",
            Self::String => "TYPE_STRING",
        }
    }

    /// The tensor datatype string used on the inference wire.
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Invalid => "INVALID",
            Self::Bool => "BOOL",
            Self::Uint8 => "UINT8",
            Self::Uint16 => "UINT16",
            Self::Uint32 => "UINT32",
            Self::Uint64 => "UINT64",
            Self::Int8 => "INT8",
            Self::Int16 => "INT16",
            Self::Int32 => "INT32",
            Self::Int64 => "INT64",
            Self::Fp16 => "FP16",
            Self::Fp32 => "FP32",
            Self::Fp64 => "FP64",
            Self::String => "BYTES",
        }
    }

    /// Size of one element in bytes, `None` for variable-sized types.
    pub fn size(self) -> Option<usize> {
        match self {
            Self::Invalid | Self::String => None,
            Self::Bool | Self::Uint8 | Self::Int8 => Some(1),
            Self::Uint16 | Self::Int16 | Self::Fp16 => Some(2),
            Self::Uint32 | Self::Int32 | Self::Fp32 => Some(4),
            Self::Uint64 | Self::Int64 | Self::Fp64 => Some(8),
        }
    }

    /// Whether image pixels can be converted into this type.
    pub fn is_image_compatible(self) -> bool {
        matches!(
            self,
            Self::Uint8
                | Self::Int8
                | Self::Uint16
                | Self::Int16
                | Self::Int32
                | Self::Fp32
                | Self::Fp64
        )
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.config_name())
    }
}

/// The declared memory format of an input tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputFormat {
    #[default]
    None,
    Nhwc,
    Nchw,
}

impl InputFormat {
    pub fn from_config_name(name: &str) -> Option<Self> {
        match name {
            "FORMAT_NONE" => Some(Self::None),
            "FORMAT_NHWC" => Some(Self::Nhwc),
            "FORMAT_NCHW" => Some(Self::Nchw),
            _ => None,
        }
    }

    pub fn from_config_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::None),
            1 => Some(Self::Nhwc),
            2 => Some(Self::Nchw),
            _ => None,
        }
    }
}

impl std::fmt::Display for InputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => f.pad("FORMAT_NONE"),
            Self::Nhwc => f.pad("FORMAT_NHWC"),
            Self::Nchw => f.pad("FORMAT_NCHW"),
        }
    }
}

/// One named tensor of a model. `dims` excludes the batch dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorConfig {
    pub name: String,
    pub data_type: DataType,
    pub format: InputFormat,
    pub dims: Vec<i64>,
}

/// The configuration a served model declares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelConfig {
    pub name: String,

    /// Zero means the model does not batch and its tensors have no batch dimension.
    pub max_batch_size: u32,
    pub inputs: Vec<TensorConfig>,
    pub outputs: Vec<TensorConfig>,
}

/// Pixel arrangement of an image input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Channel-last, interleaved.
    Nhwc,
    /// Channel-first, planar.
    Nchw,
}

/// The validated shape of a model's single image input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSpec {
    pub name: String,
    pub data_type: DataType,
    pub layout: Layout,
    pub channels: usize,
    pub height: usize,
    pub width: usize,
}

impl InputSpec {
    /// Number of elements in one image.
    pub fn element_count(&self) -> usize {
        self.channels * self.height * self.width
    }

    /// Number of bytes in one pre-processed image.
    pub fn byte_size(&self) -> usize {
        // validated as image compatible, which implies a fixed size
        self.element_count() * self.data_type.size().unwrap_or(0)
    }
}

/// Ways a model can fail to be an image classifier.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContractError {
    #[error("expecting 1 input, model \"{model}\" has {count}")]
    InputCount { model: String, count: usize },

    #[error("expecting 1 output, model \"{model}\" has {count}")]
    OutputCount { model: String, count: usize },

    #[error("expecting model output datatype to be TYPE_FP32, model \"{model}\" output type is {found}")]
    OutputDataType { model: String, found: DataType },

    #[error("expecting model output to be a vector, model \"{model}\" output has dims {dims:?}")]
    OutputNotVector { model: String, dims: Vec<i64> },

    #[error("batching not supported for model \"{model}\"")]
    BatchingUnsupported { model: String },

    #[error("expecting batch size <= {max} for model \"{model}\"")]
    BatchTooLarge { model: String, max: u32 },

    #[error("expecting model input to have 3 dimensions, model \"{model}\" input has {rank}")]
    InputRank { model: String, rank: usize },

    #[error("expecting fixed positive input dimensions, model \"{model}\" input has dims {dims:?}")]
    VariableInputDims { model: String, dims: Vec<i64> },

    #[error("unexpected input format {found}, expecting FORMAT_NHWC or FORMAT_NCHW")]
    UnsupportedFormat { found: InputFormat },

    #[error("unexpected input datatype \"{found}\" for model \"{model}\"")]
    UnsupportedInputType { model: String, found: DataType },

    #[error("expecting 1 or 3 input channels, model \"{model}\" has {channels}")]
    UnsupportedChannels { model: String, channels: i64 },
}

impl ModelConfig {
    /// Check that this model can classify images in batches of
    /// `batch_size`, and describe its image input.
    pub fn validate(&self, batch_size: usize) -> Result<InputSpec, ContractError> {
        let model = || self.name.clone();

        let [input] = self.inputs.as_slice() else {
            return Err(ContractError::InputCount {
                model: model(),
                count: self.inputs.len(),
            });
        };

        let [output] = self.outputs.as_slice() else {
            return Err(ContractError::OutputCount {
                model: model(),
                count: self.outputs.len(),
            });
        };

        if output.data_type != DataType::Fp32 {
            return Err(ContractError::OutputDataType {
                model: model(),
                found: output.data_type,
            });
        }

        // {10}, {1, 10} and {10, 1, 1} are all vectors.
        if output.dims.iter().filter(|&&dim| dim > 1).count() > 1 {
            return Err(ContractError::OutputNotVector {
                model: model(),
                dims: output.dims.clone(),
            });
        }

        if self.max_batch_size == 0 {
            if batch_size != 1 {
                return Err(ContractError::BatchingUnsupported { model: model() });
            }
        } else if batch_size > self.max_batch_size as usize {
            return Err(ContractError::BatchTooLarge {
                model: model(),
                max: self.max_batch_size,
            });
        }

        let [d0, d1, d2] = input.dims[..] else {
            return Err(ContractError::InputRank {
                model: model(),
                rank: input.dims.len(),
            });
        };

        if input.dims.iter().any(|&dim| dim <= 0) {
            return Err(ContractError::VariableInputDims {
                model: model(),
                dims: input.dims.clone(),
            });
        }

        let (layout, channels, height, width) = match input.format {
            InputFormat::Nhwc => (Layout::Nhwc, d2, d0, d1),
            InputFormat::Nchw => (Layout::Nchw, d0, d1, d2),
            InputFormat::None => {
                return Err(ContractError::UnsupportedFormat {
                    found: input.format,
                })
            }
        };

        if !input.data_type.is_image_compatible() {
            return Err(ContractError::UnsupportedInputType {
                model: model(),
                found: input.data_type,
            });
        }

        if channels != 1 && channels != 3 {
            return Err(ContractError::UnsupportedChannels {
                model: model(),
                channels,
            });
        }

        Ok(InputSpec {
            name: input.name.clone(),
            data_type: input.data_type,
            layout,
            channels: channels as usize,
            height: height as usize,
            width: width as usize,
        })
    }

    /// The name of the single classification output.
    pub fn output_name(&self) -> Option<&str> {
        self.outputs.first().map(|output| output.name.as_str())
    }
}

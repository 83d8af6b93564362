// Author: The Lynx Developers
// Copyright © 2026, The Lynx Developers, all rights reserved.
// Created: 15 October 2026

/*!
# Lynx Image

Pre-processing of image files into the exact byte layout a served
classifier expects, as described by an [`InputSpec`].

The pipeline converts the image to the model's channel count (grayscale
or RGB), resizes it, converts every sample to the input data type,
applies the selected [`Scaling`] and finally lays the samples out
channel-last or channel-first. Integer conversions saturate.

```no_run
use lynx_core::prelude::{DataType, InputSpec, Layout};
use lynx_image::Scaling;

let spec = InputSpec {
    name: "input".to_owned(),
    data_type: DataType::Fp32,
    layout: Layout::Nchw,
    channels: 3,
    height: 224,
    width: 224,
};

let payload = lynx_image::load("mug.jpg", &spec, Scaling::Inception)?;
assert_eq!(payload.len(), spec.byte_size());
# Ok::<(), Box<dyn std::error::Error>>(())
```
*/

#![warn(rust_2018_idioms)]

use image::{imageops::FilterType, DynamicImage};
use lynx_core::prelude::{DataType, InputSpec, Layout};
use std::{
    path::{Path, PathBuf},
    str::FromStr,
};
use thiserror::Error;

/// Per-channel rescaling applied after type conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scaling {
    #[default]
    None,

    /// Subtract the mean value (104, 117, 123) from each pixel, or 128 for grayscale.
    Vgg,

    /// Scale each pixel value to [-1.0, 1.0).
    Inception,
}

impl FromStr for Scaling {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Scaling::None),
            "vgg" => Ok(Scaling::Vgg),
            "inception" => Ok(Scaling::Inception),
            _ => Err(format!(
                "unexpected scale type \"{}\", expecting NONE, INCEPTION or VGG",
                s
            )),
        }
    }
}

const VGG_MEAN: [f64; 3] = [104.0, 117.0, 123.0];
const VGG_MEAN_GRAY: f64 = 128.0;

/// Errors raised while turning an image into an input payload.
#[derive(Error, Debug)]
pub enum ImageError {
    #[error("unable to decode image {}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("unexpected input datatype {0} for an image")]
    UnsupportedDataType(DataType),

    #[error("unexpected number of channels in model input: {0}")]
    UnsupportedChannels(usize),

    #[error("unexpected total size of channels {found}, expecting {expected}")]
    SizeMismatch { found: usize, expected: usize },

    #[error("unable to write image {}", path.display())]
    Save {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Decode the image at `path` and pre-process it for `spec`.
pub fn load(
    path: impl AsRef<Path>,
    spec: &InputSpec,
    scaling: Scaling,
) -> Result<Vec<u8>, ImageError> {
    let path = path.as_ref();
    let img = image::open(path).map_err(|source| ImageError::Decode {
        path: path.to_owned(),
        source,
    })?;

    log::debug!(
        "decoded {} ({}x{})",
        path.display(),
        img.width(),
        img.height()
    );
    preprocess(&img, spec, scaling)
}

/// Convert `img` into one input element for `spec`.
pub fn preprocess(
    img: &DynamicImage,
    spec: &InputSpec,
    scaling: Scaling,
) -> Result<Vec<u8>, ImageError> {
    let element_size = spec
        .data_type
        .size()
        .filter(|_| spec.data_type.is_image_compatible())
        .ok_or(ImageError::UnsupportedDataType(spec.data_type))?;

    let (width, height) = (spec.width as u32, spec.height as u32);
    let samples = match spec.channels {
        1 => resized(img.to_luma8(), width, height).into_raw(),
        3 => resized(img.to_rgb8(), width, height).into_raw(),
        other => return Err(ImageError::UnsupportedChannels(other)),
    };

    let values: Vec<f64> = samples
        .iter()
        .enumerate()
        .map(|(idx, &sample)| {
            let value = saturate(spec.data_type, sample as f64);
            scale(spec.data_type, scaling, spec.channels, idx % spec.channels, value)
        })
        .collect();

    let mut data = Vec::with_capacity(values.len() * element_size);
    match spec.layout {
        Layout::Nhwc => {
            for value in &values {
                encode(spec.data_type, *value, &mut data);
            }
        }
        Layout::Nchw => {
            for channel in 0..spec.channels {
                for value in values.iter().skip(channel).step_by(spec.channels) {
                    encode(spec.data_type, *value, &mut data);
                }
            }
        }
    }

    if data.len() != spec.byte_size() {
        return Err(ImageError::SizeMismatch {
            found: data.len(),
            expected: spec.byte_size(),
        });
    }

    Ok(data)
}

/// Resize the image at `path` to the model's input size and write it to `out`.
///
/// Only the geometry changes: channels and pixel type are kept, and the
/// output format follows the extension of `out`.
pub fn resample(
    path: impl AsRef<Path>,
    spec: &InputSpec,
    out: impl AsRef<Path>,
) -> Result<(), ImageError> {
    let (path, out) = (path.as_ref(), out.as_ref());
    let img = image::open(path).map_err(|source| ImageError::Decode {
        path: path.to_owned(),
        source,
    })?;

    let (width, height) = (spec.width as u32, spec.height as u32);
    let img = if img.width() == width && img.height() == height {
        img
    } else {
        log::debug!(
            "resizing {} from {}x{} to {}x{}",
            path.display(),
            img.width(),
            img.height(),
            width,
            height
        );
        img.resize_exact(width, height, FilterType::Triangle)
    };

    img.save(out).map_err(|source| ImageError::Save {
        path: out.to_owned(),
        source,
    })
}

fn resized<P>(
    buffer: image::ImageBuffer<P, Vec<u8>>,
    width: u32,
    height: u32,
) -> image::ImageBuffer<P, Vec<u8>>
where
    P: image::Pixel<Subpixel = u8> + 'static,
{
    if buffer.dimensions() == (width, height) {
        buffer
    } else {
        image::imageops::resize(&buffer, width, height, FilterType::Triangle)
    }
}

fn scale(dtype: DataType, scaling: Scaling, channels: usize, channel: usize, value: f64) -> f64 {
    match scaling {
        Scaling::None => value,
        Scaling::Inception => {
            let value = saturate(dtype, value / 128.0);
            saturate(dtype, value - 1.0)
        }
        Scaling::Vgg => {
            let mean = if channels == 1 {
                VGG_MEAN_GRAY
            } else {
                VGG_MEAN[channel]
            };
            saturate(dtype, value - mean)
        }
    }
}

/// Round and clamp `value` into the range of `dtype`.
fn saturate(dtype: DataType, value: f64) -> f64 {
    let (min, max) = match dtype {
        DataType::Uint8 => (u8::MIN as f64, u8::MAX as f64),
        DataType::Int8 => (i8::MIN as f64, i8::MAX as f64),
        DataType::Uint16 => (u16::MIN as f64, u16::MAX as f64),
        DataType::Int16 => (i16::MIN as f64, i16::MAX as f64),
        DataType::Int32 => (i32::MIN as f64, i32::MAX as f64),
        DataType::Fp32 => return value as f32 as f64,
        _ => return value,
    };

    value.round_ties_even().clamp(min, max)
}

fn encode(dtype: DataType, value: f64, out: &mut Vec<u8>) {
    match dtype {
        DataType::Uint8 => out.push(value as u8),
        DataType::Int8 => out.extend_from_slice(&(value as i8).to_le_bytes()),
        DataType::Uint16 => out.extend_from_slice(&(value as u16).to_le_bytes()),
        DataType::Int16 => out.extend_from_slice(&(value as i16).to_le_bytes()),
        DataType::Int32 => out.extend_from_slice(&(value as i32).to_le_bytes()),
        DataType::Fp32 => out.extend_from_slice(&(value as f32).to_le_bytes()),
        DataType::Fp64 => out.extend_from_slice(&value.to_le_bytes()),
        // rejected before encoding starts
        _ => {}
    }
}

/*!
Resize an image to the input size of a served model and write it out.
*/

use anyhow::{Context, Result};
use clap::Parser;
use lynx_client::{InferContext, Protocol};
use lynx_core::prelude::{InferSession, LynxError};
use std::path::PathBuf;
use tracing_subscriber::filter::LevelFilter;

/// Resample an image to the height and width a model's input declares.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Enable debug logging.
    #[clap(short, long)]
    verbose: bool,

    /// The name of the model to size for.
    #[clap(short, long)]
    model: String,

    /// The model version to use, latest when omitted.
    #[clap(short = 'x', long)]
    model_version: Option<i64>,

    /// The inference service endpoint, defaults to the protocol's usual port on localhost.
    #[clap(short, long)]
    url: Option<String>,

    /// The protocol to talk to the service: HTTP or gRPC.
    #[clap(short = 'i', long, default_value = "http")]
    protocol: Protocol,

    /// Where to write the resampled image. The extension picks the format.
    #[clap(short, long, default_value = "resampled.jpg")]
    output: PathBuf,

    /// The image file to resample.
    input: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .try_init();

    let url = args
        .url
        .clone()
        .unwrap_or_else(|| args.protocol.default_url().to_owned());
    let ctx = InferContext::create(args.protocol, &url, &args.model, args.model_version)
        .with_context(|| {
            format!(
                "unable to create inference context for model {:?} at {}",
                args.model, url
            )
        })?;
    let spec = ctx.config().validate(1).map_err(LynxError::from)?;

    lynx_image::resample(&args.input, &spec, &args.output)?;
    log::info!(
        "wrote {} ({}x{})",
        args.output.display(),
        spec.width,
        spec.height
    );

    Ok(())
}

/*!
Command line image classification against a served model.
*/

mod classify;
mod inputs;

use anyhow::Result;
use clap::Parser;
use lynx_client::Protocol;
use lynx_image::Scaling;
use std::path::PathBuf;
use tracing_subscriber::filter::LevelFilter;

/// Classify an image, or every image in a directory, with a model served
/// over the KServe v2 protocol.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub(crate) struct Args {
    /// Print the ranked classes of every image and debug logging.
    #[clap(short, long)]
    verbose: bool,

    /// The number of images sent in each request.
    #[clap(short, long, default_value = "1", value_parser = clap::value_parser!(u64).range(1..))]
    batch_size: u64,

    /// The number of ranked classes to request for each image.
    #[clap(short = 'c', long, default_value = "1", value_parser = clap::value_parser!(u64).range(1..))]
    classes: u64,

    /// Pixel scaling applied after type conversion: NONE, INCEPTION or VGG.
    #[clap(short, long, default_value = "none")]
    scale: Scaling,

    /// Write the pre-processed bytes of a single input image to this file.
    #[clap(short, long)]
    preprocess_output: Option<PathBuf>,

    /// The name of the model to use.
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

    /// An image file, or a directory of images.
    input: PathBuf,
}

impl Args {
    fn url(&self) -> String {
        self.url
            .clone()
            .unwrap_or_else(|| self.protocol.default_url().to_owned())
    }
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

    classify::run(args)
}

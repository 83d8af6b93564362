// Author: The Lynx Developers
// Copyright © 2026, The Lynx Developers, all rights reserved.
// Created: 16 October 2026

use crate::{inputs, Args};
use anyhow::{Context, Result};
use lynx_client::InferContext;
use lynx_core::prelude::*;
use std::io::Write;

pub(crate) fn run(args: Args) -> Result<()> {
    let url = args.url();
    let options = RunOptions::new(args.batch_size as usize, args.classes as usize);

    let mut ctx = InferContext::create(args.protocol, &url, &args.model, args.model_version)
        .with_context(|| {
            format!(
                "unable to create inference context for model {:?} at {}",
                args.model, url
            )
        })?;
    let spec = ctx
        .config()
        .validate(options.batch_size)
        .map_err(LynxError::from)?;
    log::debug!(
        "input {:?}: {} {:?} {}x{}x{}",
        spec.name,
        spec.data_type,
        spec.layout,
        spec.channels,
        spec.height,
        spec.width
    );

    let files = inputs::discover(&args.input)?;
    let payloads = files
        .iter()
        .map(|file| lynx_image::load(file, &spec, args.scale))
        .collect::<Result<Vec<_>, _>>()?;

    if let Some(dump) = &args.preprocess_output {
        match payloads.as_slice() {
            [payload] if args.input.is_file() => std::fs::write(dump, payload)
                .with_context(|| format!("failed writing {}", dump.display()))?,
            _ => log::warn!("ignoring -p, {} is not a single file", args.input.display()),
        }
    }

    let names = inputs::display_names(&args.input, &files);
    let verbose = args.verbose || files.len() > 1;

    let batches = plan(&payloads, options.batch_size);
    log::info!(
        "classifying {} image(s) in {} batch(es) of {}",
        payloads.len(),
        batches.len(),
        options.batch_size
    );

    let pending = DispatchMode::for_inputs(payloads.len()).dispatch(&mut ctx, &batches, options)?;
    let results = collect(&mut ctx, pending)?;

    let mut aggregator = Aggregator::new(options, verbose);
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for (batch, result) in batches.iter().zip(&results) {
        let sources = batch
            .sources()
            .map(|source| names[source].as_str())
            .collect::<Vec<_>>();
        aggregator.aggregate(result, &sources, &mut out)?;
    }

    write!(out, "{}", aggregator.finish())?;
    out.flush()?;
    Ok(())
}

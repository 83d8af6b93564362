/*!

# Lynx Core

The batching and aggregation half of the lynx image classification
client. Nothing in here talks to the network: a remote model is reached
through the [`InferSession`](session::InferSession) seam, which
`lynx-client` implements for HTTP and gRPC and tests implement with
closures.

A run has four steps:

1. [`batcher::plan`] packs pre-processed images into fixed-size
   batches, padding the last one with the final image.
2. A [`Dispatch`](dispatch::Dispatch) implementation, picked by
   [`DispatchMode::for_inputs`](dispatch::DispatchMode::for_inputs),
   binds and submits every batch.
3. [`dispatch::collect`] resolves the pending requests in submission order.
4. [`Aggregator`](tally::Aggregator) tallies the top-1 class of every
   slot and optionally prints the full ranking.

```no_run
# struct Remote;
# impl lynx_core::prelude::InferSession for Remote {
#     type Pending = ();
#     fn model_name(&self) -> &str { unimplemented!() }
#     fn config(&self) -> &lynx_core::prelude::ModelConfig { unimplemented!() }
#     fn set_run_options(&mut self, _: lynx_core::prelude::RunOptions) -> anyhow::Result<()> { unimplemented!() }
#     fn reset_input(&mut self) -> anyhow::Result<()> { unimplemented!() }
#     fn bind_input(&mut self, _: &[u8]) -> anyhow::Result<()> { unimplemented!() }
#     fn run(&mut self) -> anyhow::Result<lynx_core::prelude::ResultSet> { unimplemented!() }
#     fn submit(&mut self) -> anyhow::Result<()> { unimplemented!() }
#     fn resolve(&mut self, _: ()) -> anyhow::Result<lynx_core::prelude::ResultSet> { unimplemented!() }
# }
# fn connect() -> Remote { unimplemented!() }
use lynx_core::prelude::*;

let mut session = connect();
let payloads: Vec<Vec<u8>> = vec![vec![0; 12], vec![1; 12]];
let options = RunOptions::new(2, 3);

let batches = plan(&payloads, options.batch_size);
let pending = DispatchMode::for_inputs(payloads.len()).dispatch(&mut session, &batches, options)?;
let results = collect(&mut session, pending)?;

let mut aggregator = Aggregator::new(options, false);
let mut stdout = std::io::stdout();
for (batch, result) in batches.iter().zip(&results) {
    let names: Vec<&str> = batch.sources().map(|_| "image").collect();
    aggregator.aggregate(result, &names, &mut stdout)?;
}
print!("{}", aggregator.finish());
# Ok::<(), Box<dyn std::error::Error>>(())
```

 */

#![warn(rust_2018_idioms)]

pub mod batcher;
pub mod dispatch;
mod error;
pub mod model;
pub mod session;
pub mod tally;

#[doc(inline)]
pub use crate::error::LynxError;

/// Most core utilities are re-exported here.
pub mod prelude {
    pub use super::batcher::{plan, Batch, Slot};
    pub use super::dispatch::{
        collect, AsyncDispatch, Dispatch, DispatchMode, Pending, SyncDispatch,
    };
    pub use super::error::LynxError;
    pub use super::model::{
        ContractError, DataType, InputFormat, InputSpec, Layout, ModelConfig, TensorConfig,
    };
    pub use super::session::{ClassEntry, InferSession, ResultSet, RunOptions};
    pub use super::tally::{Aggregator, PredictionTally, TallyEntry};
}

/*!

# Lynx Client

Sessions against a model served over the KServe v2 inference protocol,
as spoken by Triton and compatible servers.

An [`InferContext`] is bound to one model. It fetches the model
configuration when created, keeps the input bindings of the request
being built, and implements
[`InferSession`](lynx_core::session::InferSession) so the core can plan,
dispatch and collect batches against it. The wire is abstracted behind
[`Transport`], with [`HttpTransport`] and [`GrpcTransport`] provided.

```no_run
use lynx_client::{InferContext, Protocol};
use lynx_core::prelude::{InferSession, RunOptions};

let mut ctx = InferContext::create(Protocol::Http, "localhost:8000", "resnet50", None)?;
let spec = ctx.config().validate(1)?;

ctx.set_run_options(RunOptions::new(1, 5))?;
ctx.reset_input()?;
ctx.bind_input(&vec![0; spec.byte_size()])?;
let result = ctx.run()?;

for class in result.classes(0) {
    println!("{} ({}) = {}", class.index, class.label, class.score);
}
# Ok::<(), Box<dyn std::error::Error>>(())
```
*/

#![warn(rust_2018_idioms)]

mod classification;
mod context;
mod error;
mod grpc;
mod http;
mod pool;
mod proto;
mod transport;

pub use classification::decode_classes;
pub use context::{InferContext, PendingRequest};
pub use error::ClientError;
pub use grpc::GrpcTransport;
pub use http::HttpTransport;
pub use transport::{InferRequest, InferResponse, ModelRef, Protocol, Transport};

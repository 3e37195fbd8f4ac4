/*!
# Token bucket traffic shaping, the data model

This crate provides the passive building blocks of a user-space
[Token Bucket Filter] traffic shaper: the [`Packet`] unit, the
[`TokenBucket`] credit accumulator, the bounded priority
[`PacketQueue`], the per-source [`Flow`] state with its arrival
processes, and the statistics snapshot types.

Nothing in this crate spawns a thread or sleeps. Components take the
current time as a parameter wherever it matters (see
[`TokenBucket::consume_at`]), which keeps the accounting testable at
any clock speed. The real-time pipeline that drives these types with
worker threads lives in the `tbfsim` crate.

# Shaping rate versus wire speed

Two [`Bandwidth`] values rule a simulation and they are deliberately
distinct:

* the **token rate** is policy: the long-run average the shaper
  enforces, with bursting up to the bucket capacity;
* the **link capacity** is physics: the serialization time of each
  packet on the wire.

A sensibly configured scenario keeps the token rate below the link
capacity so that shaping, not the wire, is the bottleneck.

# Example

```
use std::time::Duration;
use tbfsim_core::{Bandwidth, PacketQueue, Priority, TokenBucket};
use tbfsim_core::packet::{FlowId, Packet};

let queue = PacketQueue::new(500);
let bucket = TokenBucket::new(
    "600kbps".parse::<Bandwidth>().unwrap(),
    80 * 1_024,
);

// a source enqueues...
queue.enqueue(Packet::new(FlowId::new(1), 1_200, Priority::High));

// ...and the shaper drains, gated by the bucket
let packet = queue.try_dequeue().unwrap();
assert!(bucket.consume(packet.size()));
```

[Token Bucket Filter]: https://en.wikipedia.org/wiki/Token_bucket
*/

pub mod bucket;
pub mod config;
pub mod defaults;
pub mod flow;
pub mod measure;
pub mod packet;
pub mod queue;
pub mod stats;

pub use self::{
    bucket::TokenBucket,
    config::{ConfigError, FlowConfig, SimulationConfig, SizeRange},
    flow::{ArrivalKind, ArrivalSampler, Flow},
    measure::Bandwidth,
    packet::{FlowId, Packet, Priority},
    queue::PacketQueue,
    stats::{FlowStats, SystemStats},
};

//! bpsim Randomness Layer
//!
//! Every stochastic choice a replication makes (durations, branch selection,
//! inter-arrival gaps) is drawn from a [`UniformSource`]. Sources are created
//! by an [`RngFactory`] from a 64-bit seed, so any run is reproducible from
//! its seed alone.
//!
//! # Replication streams
//!
//! Each replication gets its own stream, seeded with
//! [`replication_seed`]`(seed_base, replication)`. The stride is fixed, so
//! raising the replication count never perturbs the streams of the
//! replications that were already there.
//!
//! ```
//! use bpsim_env::{replication_seed, Mulberry32Factory, RngFactory, UniformSource};
//!
//! let mut first = Mulberry32Factory.stream(replication_seed(123, 1));
//! let mut again = Mulberry32Factory.stream(replication_seed(123, 1));
//! assert_eq!(first.next_f64(), again.next_f64());
//! ```

mod factory;
mod mulberry;
mod source;

pub use factory::{
    replication_seed, ChaChaFactory, Mulberry32Factory, RngFactory, StreamKind,
    REPLICATION_SEED_STRIDE,
};
pub use mulberry::Mulberry32;
pub use source::{SequenceSource, UniformSource};

//! series-a-digest: discover newly funded companies, summarize them into a
//! memo, narrate it and email both to one recipient.

pub mod artifacts;
pub mod clock;
pub mod config;
pub mod delivery;
pub mod discovery;
pub mod error;
pub mod model;
pub mod narrator;
pub mod pipeline;
pub mod summarizer;

pub use error::{PipelineError, Result};

pub mod pipeline;

pub use pipeline::{PipelineReport, PipelineService};

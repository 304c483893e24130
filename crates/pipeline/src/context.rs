//! State shared by every ticker task of a run.

use tickpack_core::{Config, Result};
use tickpack_output::{OutputSink, TickFormatter};

/// Configuration plus the run-wide formatter and output sink.
#[derive(Debug)]
pub struct PipelineContext {
    pub config: Config,
    pub formatter: TickFormatter,
    pub sink: OutputSink,
}

impl PipelineContext {
    /// Validate `config` and build the shared output components.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let formatter = TickFormatter::new(&config.output);
        let sink = OutputSink::new(&config.output);
        Ok(Self {
            config,
            formatter,
            sink,
        })
    }
}

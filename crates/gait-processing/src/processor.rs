//! Core stream processor trait and timing helpers

use gait_core::{GaitResult, SensorStream};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

/// A pure transformation from one sensor stream to a new one.
///
/// Implementations never mutate their input; the caller keeps the source
/// stream for comparison plots.
pub trait StreamProcessor {
    /// Process a stream and return the transformed copy
    fn process(&self, input: &SensorStream) -> GaitResult<SensorStream>;

    /// Get processor name/identifier
    fn name(&self) -> &str;
}

/// Performance metrics for one processing operation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessingMetrics {
    /// Processing time in microseconds
    pub processing_time_us: u64,
    /// Samples per channel handled
    pub samples: usize,
}

impl ProcessingMetrics {
    /// Start timing a processing operation
    pub fn start_timing() -> ProcessingTimer {
        ProcessingTimer {
            start_time: Instant::now(),
            metrics: ProcessingMetrics::default(),
        }
    }
}

/// Helper for timing processing operations
pub struct ProcessingTimer {
    start_time: Instant,
    metrics: ProcessingMetrics,
}

impl ProcessingTimer {
    pub fn set_samples(&mut self, samples: usize) {
        self.metrics.samples = samples;
    }

    /// Finish timing and return metrics
    pub fn finish(mut self) -> ProcessingMetrics {
        self.metrics.processing_time_us = self.start_time.elapsed().as_micros() as u64;
        self.metrics
    }
}

/// Processors applied in order, each to the previous one's output
#[derive(Default)]
pub struct ProcessingChain<'a> {
    processors: Vec<Box<dyn StreamProcessor + 'a>>,
}

impl<'a> ProcessingChain<'a> {
    pub fn new() -> Self {
        Self {
            processors: Vec::new(),
        }
    }

    /// Add processor to the end of the chain
    pub fn then(mut self, processor: impl StreamProcessor + 'a) -> Self {
        self.processors.push(Box::new(processor));
        self
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Run every processor and return each intermediate stream in order
    pub fn run(&self, input: &SensorStream) -> GaitResult<Vec<SensorStream>> {
        let mut outputs: Vec<SensorStream> = Vec::with_capacity(self.processors.len());

        for processor in &self.processors {
            let current = outputs.last().unwrap_or(input);
            let start = Instant::now();
            let next = processor.process(current)?;
            debug!(
                processor = processor.name(),
                elapsed_us = start.elapsed().as_micros() as u64,
                "stage complete"
            );
            outputs.push(next);
        }

        Ok(outputs)
    }
}

//! Text review plots
//!
//! Summarises each plotted stream as per-channel ranges in the log, which is
//! enough to pick calibration and trial bounds from a terminal.

use gait_core::{Channel, GaitResult, SensorRole, SensorStream};
use gait_processing::{AnnotatedSpan, ReviewPlotter};
use tracing::info;

#[derive(Debug, Default)]
pub struct TracePlotter {
    plots: usize,
    comparisons: usize,
}

impl TracePlotter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn plots(&self) -> usize {
        self.plots
    }

    pub fn comparisons(&self) -> usize {
        self.comparisons
    }
}

fn channel_label(channel: Channel) -> &'static str {
    match channel {
        Channel::AccelX => "ax",
        Channel::AccelY => "ay",
        Channel::AccelZ => "az",
        Channel::GyroX => "gx",
        Channel::GyroY => "gy",
        Channel::GyroZ => "gz",
    }
}

/// `ax [min, max] mean` for each channel on one line
fn summarise(stream: &SensorStream, channels: &[Channel]) -> String {
    channels
        .iter()
        .map(|&channel| {
            let stats = stream.channel_stats(channel);
            format!(
                "{} [{:.2}, {:.2}] {:.2}",
                channel_label(channel),
                stats.min,
                stats.max,
                stats.mean
            )
        })
        .collect::<Vec<_>>()
        .join("  ")
}

impl ReviewPlotter for TracePlotter {
    fn plot_stream(&mut self, role: SensorRole, title: &str, stream: &SensorStream, spans: &[AnnotatedSpan]) -> GaitResult<()> {
        self.plots += 1;
        info!(
            role = %role,
            title,
            start = ?stream.first_timestamp(),
            end = ?stream.last_timestamp(),
            samples = stream.len(),
            "{}",
            summarise(stream, &Channel::ALL[..3])
        );
        for span in spans {
            info!(role = %role, title, "{} {}", span.label, span.window);
        }
        Ok(())
    }

    fn plot_comparison(&mut self, role: SensorRole, raw: &SensorStream, oriented: &SensorStream, filtered: &SensorStream) -> GaitResult<()> {
        self.comparisons += 1;
        for (stage, stream) in [("raw", raw), ("oriented", oriented), ("filtered", filtered)] {
            info!(role = %role, stage, "{}", summarise(stream, &Channel::ALL));
        }
        Ok(())
    }
}

//! The calibration engine (§4.5): runs in place of the pipeline while
//! the user calibrates, observing per-channel samples, then at
//! finalization derives the `SourceConfig`/`ChannelConfig` frames the
//! controller sends to the device.
//!
//! Calibration proceeds in two stages. **Analog** calibration picks one
//! `opamp_gain` index and `opamp_offset` per acquisition source, shared
//! by every channel reading that source. **Digital** calibration then
//! picks a `channel_offset`/`channel_shift` per channel so its samples
//! land centered in the top 16 bits of the device's accumulator.

use std::collections::HashMap;

use dpp_wire::{ChannelConfig, SourceConfig};

use crate::error::CalibrationError;

/// The maximum raw sample value at zero hardware oversampling; analog
/// bounds are clamped to this, left-shifted by `hw_scale`.
const SAMPLE_CEILING: u32 = 4095;

/// The device accumulator's usable signed half-range; gain selection
/// keeps the scaled source range under this.
const GAIN_HEADROOM: u32 = 2047;

/// The digital accumulator's top 16 bits; `channel_shift` is chosen so
/// the calibrated range fits under this.
const DIGITAL_CEILING: u32 = 65535;

/// Per-channel accumulated extremes, built while calibration is active.
#[derive(Debug, Clone, Copy)]
struct ChannelAccumulator {
    source: u8,
    /// Ticks remaining before samples start contributing to min/max.
    discard_remaining: u64,
    sample_min: u32,
    sample_max: u32,
}

impl ChannelAccumulator {
    fn new(source: u8, discard_ticks: u64) -> Self {
        Self {
            source,
            discard_remaining: discard_ticks,
            sample_min: u32::MAX,
            sample_max: 0,
        }
    }

    fn observe(&mut self, sample: u32) {
        if self.discard_remaining > 0 {
            self.discard_remaining -= 1;
            return;
        }
        self.sample_min = self.sample_min.min(sample);
        self.sample_max = self.sample_max.max(sample);
    }

    fn has_samples(&self) -> bool {
        self.sample_min <= self.sample_max
    }
}

/// The device-reported and host-chosen capabilities a source is being
/// calibrated under. Fed to [`CalibrationEngine::finalize`] alongside
/// the accumulated per-channel observations.
#[derive(Debug, Clone)]
pub struct SourceCapabilities {
    /// Acquisition source index.
    pub source: u8,
    /// Whether the source supports an opamp offset DAC.
    pub opamp_offset_capable: bool,
    /// Published analog gain steps, in the device's own order.
    pub opamp_gain_table: Vec<u8>,
    /// Hardware oversampling ratio currently configured on this source.
    pub hw_oversample: u8,
    /// Hardware right-shift currently configured on this source.
    pub hw_shift: u8,
    /// Software oversampling ratio currently configured on this source.
    pub sw_oversample: u16,
}

/// Diagnostic summary for one calibrated channel, reported alongside
/// the frames actually sent to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelCalibrationSummary {
    /// Logical channel index.
    pub channel: u8,
    /// Acquisition source this channel read from.
    pub source: u8,
    /// Minimum sample observed after the discard window.
    pub sample_min: u32,
    /// Maximum sample observed after the discard window.
    pub sample_max: u32,
    /// Chosen digital offset.
    pub channel_offset: u32,
    /// Chosen digital shift.
    pub channel_shift: u8,
}

/// The result of finalizing calibration: the frames to send to the
/// device, plus a diagnostic summary per channel.
#[derive(Debug, Clone)]
pub struct CalibrationReport {
    /// One `SourceConfig` per distinct source observed, in source-index
    /// order.
    pub source_configs: Vec<SourceConfig>,
    /// One `ChannelConfig` per channel the engine was tracking, in the
    /// order channels were registered.
    pub channel_configs: Vec<ChannelConfig>,
    /// Per-channel diagnostics.
    pub per_channel: Vec<ChannelCalibrationSummary>,
}

/// Accumulates per-channel extremes during calibration and, at
/// `finalize`, derives the device configuration.
pub struct CalibrationEngine {
    channels: Vec<u8>,
    accumulators: HashMap<u8, ChannelAccumulator>,
}

impl CalibrationEngine {
    /// Start calibrating `channels` (channel index, source index pairs)
    /// at `frequency` Hz. The first `2 * frequency` ticks on each
    /// channel are discarded for signal stabilisation.
    pub fn new(frequency: f64, channels: &[(u8, u8)]) -> Self {
        let discard_ticks = (2.0 * frequency).round().max(0.0) as u64;
        let mut accumulators = HashMap::with_capacity(channels.len());
        let mut order = Vec::with_capacity(channels.len());
        for &(channel, source) in channels {
            accumulators.insert(channel, ChannelAccumulator::new(source, discard_ticks));
            order.push(channel);
        }
        Self {
            channels: order,
            accumulators,
        }
    }

    /// Fold in one fresh sample for `channel`.
    pub fn observe(&mut self, channel: u8, sample: u32) -> Result<(), CalibrationError> {
        let accumulator = self
            .accumulators
            .get_mut(&channel)
            .ok_or(CalibrationError::UnknownChannel { channel })?;
        accumulator.observe(sample);
        Ok(())
    }

    /// Derive the device configuration from everything observed so far.
    ///
    /// `sources` must list capabilities for every source at least one
    /// tracked channel reads from; extras are ignored.
    pub fn finalize(
        &self,
        sources: &[SourceCapabilities],
    ) -> Result<CalibrationReport, CalibrationError> {
        let sources_by_index: HashMap<u8, &SourceCapabilities> =
            sources.iter().map(|s| (s.source, s)).collect();

        let mut source_configs = Vec::new();
        let mut channel_configs = Vec::with_capacity(self.channels.len());
        let mut per_channel = Vec::with_capacity(self.channels.len());

        let mut sources_seen: Vec<u8> = self
            .accumulators
            .values()
            .map(|acc| acc.source)
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();
        sources_seen.sort_unstable();

        for source in sources_seen {
            let caps = sources_by_index
                .get(&source)
                .copied()
                .ok_or(CalibrationError::UnknownSource { source })?;

            let members: Vec<(&u8, &ChannelAccumulator)> = self
                .accumulators
                .iter()
                .filter(|(_, acc)| acc.source == source && acc.has_samples())
                .collect();
            if members.is_empty() {
                continue;
            }

            let source_min = members.iter().map(|(_, acc)| acc.sample_min).min().expect(
                "members is non-empty, so at least one accumulator contributes a minimum",
            );
            let source_max = members.iter().map(|(_, acc)| acc.sample_max).max().expect(
                "members is non-empty, so at least one accumulator contributes a maximum",
            );

            let analog = analog_calibration(caps, source_min, source_max)?;
            source_configs.push(SourceConfig {
                source,
                opamp_gain: analog.opamp_gain_index,
                opamp_offset: analog.opamp_offset,
                sw_oversample: caps.sw_oversample,
                hw_oversample: caps.hw_oversample,
                hw_shift: caps.hw_shift,
            });

            for &channel in &self.channels {
                let acc = &self.accumulators[&channel];
                if acc.source != source || !acc.has_samples() {
                    continue;
                }
                let digital = digital_calibration(caps, &analog, acc.sample_min, acc.sample_max);
                channel_configs.push(ChannelConfig {
                    channel,
                    source,
                    shift: digital.channel_shift,
                    offset: digital.channel_offset,
                    sample32: false,
                });
                per_channel.push(ChannelCalibrationSummary {
                    channel,
                    source,
                    sample_min: acc.sample_min,
                    sample_max: acc.sample_max,
                    channel_offset: digital.channel_offset,
                    channel_shift: digital.channel_shift,
                });
            }
        }

        Ok(CalibrationReport {
            source_configs,
            channel_configs,
            per_channel,
        })
    }
}

struct AnalogCalibration {
    opamp_gain_index: u8,
    opamp_gain: u32,
    opamp_offset: u16,
    hw_scale: u32,
    source_mid: u32,
}

fn analog_calibration(
    caps: &SourceCapabilities,
    observed_min: u32,
    observed_max: u32,
) -> Result<AnalogCalibration, CalibrationError> {
    let hw_scale = (caps.hw_oversample as u32).saturating_sub(caps.hw_shift as u32);
    let ceiling = SAMPLE_CEILING << hw_scale;

    let range = observed_max - observed_min;
    let margin = range / 10;
    let min = observed_min.saturating_sub(margin).min(ceiling);
    let max = observed_max.saturating_add(margin).min(ceiling);
    let mid = (min + max + 1) / 2;

    let opamp_offset = if caps.opamp_offset_capable {
        (SAMPLE_CEILING.saturating_sub(mid >> hw_scale)) as u16
    } else {
        2048
    };

    let source_range = max.saturating_sub(mid).max(mid.saturating_sub(min)) >> hw_scale;

    if caps.opamp_gain_table.is_empty() {
        return Err(CalibrationError::EmptyGainTable {
            source: caps.source,
        });
    }
    let mut best: Option<(usize, u8)> = None;
    for (index, &gain) in caps.opamp_gain_table.iter().enumerate() {
        if source_range.saturating_mul(gain as u32) <= GAIN_HEADROOM {
            // Prefer the larger gain; ties broken by the later index.
            match best {
                Some((_, best_gain)) if gain < best_gain => {}
                _ => best = Some((index, gain)),
            }
        }
    }
    // No published gain keeps the source under headroom: fall back to
    // the smallest (most conservative) gain rather than error out, on
    // the assumption a device always publishes at least a unity step.
    let (opamp_gain_index, opamp_gain) = best.unwrap_or_else(|| {
        caps.opamp_gain_table
            .iter()
            .enumerate()
            .min_by_key(|(_, &gain)| gain)
            .map(|(index, &gain)| (index, gain))
            .expect("checked non-empty above")
    });

    Ok(AnalogCalibration {
        opamp_gain_index: opamp_gain_index as u8,
        opamp_gain: opamp_gain as u32,
        opamp_offset,
        hw_scale,
        source_mid: mid,
    })
}

struct DigitalCalibration {
    channel_offset: u32,
    channel_shift: u8,
}

fn digital_calibration(
    caps: &SourceCapabilities,
    analog: &AnalogCalibration,
    channel_min: u32,
    channel_max: u32,
) -> DigitalCalibration {
    let sw_oversample = caps.sw_oversample as u64;
    let gain = analog.opamp_gain as u64;

    let sample_mid_offset: u64 = if caps.opamp_offset_capable {
        (2048u64 << analog.hw_scale) * sw_oversample
    } else {
        (channel_min as u64) * sw_oversample
    };

    let (target_max, mut offset) = if caps.opamp_offset_capable {
        let sample_pos = (channel_max as u64).saturating_sub(analog.source_mid as u64);
        let sample_neg = (analog.source_mid as u64).saturating_sub(channel_min as u64);
        let target_max = sample_mid_offset + sample_pos * gain;
        let offset = sample_mid_offset.saturating_sub(sample_neg * gain);
        (target_max, offset)
    } else {
        let target_max = (channel_max as u64) * gain;
        let offset = (channel_min as u64) * gain;
        (target_max, offset)
    };

    let mut shift: u32 = 0;
    while (target_max.saturating_sub(offset)) >> shift > DIGITAL_CEILING as u64 {
        shift += 1;
    }
    let span = (target_max.saturating_sub(offset)) >> shift;
    let centering = ((DIGITAL_CEILING as u64).saturating_sub(span)) / 2;
    offset = offset.saturating_sub(centering << shift);

    DigitalCalibration {
        channel_offset: offset.min(u32::MAX as u64) as u32,
        channel_shift: shift.min(u8::MAX as u32) as u8,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_source_two_channels_keeps_shift_under_headroom() {
        let mut engine = CalibrationEngine::new(1000.0, &[(0, 0), (1, 0)]);
        // Discard window is 2000 ticks; feed past it.
        for _ in 0..2000 {
            engine.observe(0, 2000).expect("observe");
            engine.observe(1, 1050).expect("observe");
        }
        for sample in [300u32, 3800, 1800] {
            engine.observe(0, sample).expect("observe");
        }
        for sample in [1000u32, 1100, 1050] {
            engine.observe(1, sample).expect("observe");
        }

        let caps = SourceCapabilities {
            source: 0,
            opamp_offset_capable: true,
            opamp_gain_table: vec![1, 2, 4, 8, 16, 32],
            hw_oversample: 0,
            hw_shift: 0,
            sw_oversample: 1,
        };
        let report = engine.finalize(&[caps]).expect("finalize");

        assert_eq!(report.source_configs.len(), 1);
        assert_eq!(report.channel_configs.len(), 2);
        for summary in &report.per_channel {
            // target_max - offset, after shifting, must fit in 16 bits.
            assert!(summary.channel_shift <= 16);
        }
    }

    #[test]
    fn discard_window_excludes_warm_up_samples() {
        let mut engine = CalibrationEngine::new(10.0, &[(0, 0)]);
        // Discard window is 20 ticks.
        for _ in 0..20 {
            engine.observe(0, 0).expect("observe");
        }
        engine.observe(0, 500).expect("observe");
        engine.observe(0, 600).expect("observe");

        let caps = SourceCapabilities {
            source: 0,
            opamp_offset_capable: false,
            opamp_gain_table: vec![1, 2, 4],
            hw_oversample: 0,
            hw_shift: 0,
            sw_oversample: 1,
        };
        let report = engine.finalize(&[caps]).expect("finalize");
        assert_eq!(report.per_channel[0].sample_min, 500);
        assert_eq!(report.per_channel[0].sample_max, 600);
    }

    #[test]
    fn unknown_channel_observation_is_rejected() {
        let mut engine = CalibrationEngine::new(100.0, &[(0, 0)]);
        assert_eq!(
            engine.observe(5, 10),
            Err(CalibrationError::UnknownChannel { channel: 5 })
        );
    }
}

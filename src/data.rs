//! Data body decoder.
//!
//! Computes the fixed size of one multiplexed data block from the channel
//! catalog, reads the remainder of the byte source as whole blocks, and
//! scatters each block's interleaved samples into pre-sized per-channel
//! arrays. A trailing partial block is recoverable: the complete blocks are
//! kept and the remainder is reported through [`Diagnostics`].

use std::f64::consts::PI;
use std::io::{Read, Seek};
use std::sync::atomic::{AtomicBool, Ordering};

use ndarray::{s, Array1, Array2};

use crate::error::RhsError;
use crate::header::SAMPLES_PER_DATA_BLOCK;
use crate::types::*;

// Scaling constants from the Intan RHS data format specification.
const AMPLIFIER_SCALE_FACTOR: f64 = 0.195; // μV per bit
const DC_AMPLIFIER_SCALE_FACTOR: f64 = 19.23; // mV per bit
const ADC_DAC_SCALE_FACTOR: f64 = 0.0003125; // V per bit
const AUX_INPUT_SCALE_FACTOR: f64 = 0.0000374; // V per bit
const SUPPLY_VOLTAGE_SCALE_FACTOR: f64 = 0.0000748; // V per bit
const DC_AMPLIFIER_OFFSET: f64 = 512.0;
const ADC_DAC_OFFSET: f64 = 32768.0;

/// Sub-region order of channel groups within one data block.
const GROUP_ORDER: [SignalGroup; 7] = [
    SignalGroup::Amplifier,
    SignalGroup::AuxInput,
    SignalGroup::SupplyVoltage,
    SignalGroup::BoardAdc,
    SignalGroup::BoardDac,
    SignalGroup::BoardDigIn,
    SignalGroup::BoardDigOut,
];

/// Size in bytes of one multiplexed data block for this header's channel
/// catalog.
///
/// Every block carries a full-rate sample-index stream, then one sub-region
/// per non-empty channel group. The DC amplifier stream (when saved) and the
/// stimulation stream mirror the amplifier channel count. Digital groups
/// contribute a single packed word stream regardless of channel count.
pub(crate) fn bytes_per_data_block(header: &RhsHeader) -> usize {
    let full_rate = SAMPLES_PER_DATA_BLOCK;
    let mut bytes = full_rate * 4; // sample-index stream

    for group in GROUP_ORDER {
        let num_channels = header.channels(group).len();
        if num_channels == 0 {
            continue;
        }
        let lanes = if group.packs_channels() { 1 } else { num_channels };
        bytes += group.samples_per_block(full_rate) * group.bytes_per_sample() * lanes;
    }

    let num_amplifier = header.amplifier_channels.len();
    if header.dc_amplifier_data_saved {
        bytes += full_rate * 2 * num_amplifier;
    }
    bytes += full_rate * 2 * num_amplifier; // stimulation stream

    bytes
}

/// De-interleaved raw sample storage, filled block by block.
///
/// All arrays are allocated once at their final length before the block loop
/// begins; the scatter step only writes by computed offset.
struct RawData {
    timestamps: Array1<i32>,
    amplifier: Option<Array2<i32>>,
    dc_amplifier: Option<Array2<i32>>,
    stim: Option<Array2<i32>>,
    aux_input: Option<Array2<i32>>,
    supply_voltage: Option<Array2<i32>>,
    board_adc: Option<Array2<i32>>,
    board_dac: Option<Array2<i32>>,
    dig_in_words: Option<Array1<i32>>,
    dig_out_words: Option<Array1<i32>>,
}

impl RawData {
    fn new(header: &RhsHeader, num_blocks: usize) -> RawData {
        let full = num_blocks * SAMPLES_PER_DATA_BLOCK;
        let aux = num_blocks * SignalGroup::AuxInput.samples_per_block(SAMPLES_PER_DATA_BLOCK);
        let supply = num_blocks;

        let matrix = |channels: usize, samples: usize| -> Option<Array2<i32>> {
            (channels > 0).then(|| Array2::zeros((channels, samples)))
        };

        let num_amplifier = header.amplifier_channels.len();
        RawData {
            timestamps: Array1::zeros(full),
            amplifier: matrix(num_amplifier, full),
            dc_amplifier: if header.dc_amplifier_data_saved {
                matrix(num_amplifier, full)
            } else {
                None
            },
            stim: matrix(num_amplifier, full),
            aux_input: matrix(header.aux_input_channels.len(), aux),
            supply_voltage: matrix(header.supply_voltage_channels.len(), supply),
            board_adc: matrix(header.board_adc_channels.len(), full),
            board_dac: matrix(header.board_dac_channels.len(), full),
            dig_in_words: (!header.board_dig_in_channels.is_empty())
                .then(|| Array1::zeros(full)),
            dig_out_words: (!header.board_dig_out_channels.is_empty())
                .then(|| Array1::zeros(full)),
        }
    }

    /// Shrinks every array to the prefix covered by `blocks` complete blocks.
    /// Used when cancellation stops the block loop early.
    fn truncate(self, blocks: usize) -> RawData {
        let full = blocks * SAMPLES_PER_DATA_BLOCK;
        let aux = blocks * SignalGroup::AuxInput.samples_per_block(SAMPLES_PER_DATA_BLOCK);

        let cut2 = |a: Option<Array2<i32>>, len: usize| {
            a.map(|a| a.slice(s![.., ..len]).to_owned())
        };
        let cut1 = |a: Option<Array1<i32>>, len: usize| {
            a.map(|a| a.slice(s![..len]).to_owned())
        };

        RawData {
            timestamps: self.timestamps.slice(s![..full]).to_owned(),
            amplifier: cut2(self.amplifier, full),
            dc_amplifier: cut2(self.dc_amplifier, full),
            stim: cut2(self.stim, full),
            aux_input: cut2(self.aux_input, aux),
            supply_voltage: cut2(self.supply_voltage, blocks),
            board_adc: cut2(self.board_adc, full),
            board_dac: cut2(self.board_dac, full),
            dig_in_words: cut1(self.dig_in_words, full),
            dig_out_words: cut1(self.dig_out_words, full),
        }
    }
}

/// Reads the data body and produces the decoded dataset.
///
/// Returns the dataset (when at least one complete block was read), the
/// presence flag, and the diagnostics accumulated along the way.
pub(crate) fn read_data<R: Read + Seek>(
    header: &RhsHeader,
    reader: &mut R,
    file_size: u64,
    cancel: Option<&AtomicBool>,
) -> Result<(Option<RhsData>, bool, Diagnostics), RhsError> {
    let mut diagnostics = Diagnostics::default();

    let body_start = reader.stream_position()?;
    let remaining = file_size.saturating_sub(body_start);
    if remaining == 0 {
        log::info!("Header-only file: no data body present");
        return Ok((None, false, diagnostics));
    }

    let bytes_per_block = bytes_per_data_block(header) as u64;
    let num_blocks = (remaining / bytes_per_block) as usize;
    let trailing_bytes = remaining % bytes_per_block;

    if trailing_bytes != 0 {
        log::warn!(
            "Data body ends mid-block: keeping {} complete blocks, dropping {} trailing bytes",
            num_blocks,
            trailing_bytes
        );
        diagnostics.truncated_body = Some(TruncatedBody {
            complete_blocks: num_blocks as u64,
            trailing_bytes,
        });
    }

    if num_blocks == 0 {
        return Ok((None, false, diagnostics));
    }

    log::info!(
        "File contains {:.3} seconds of data sampled at {:.2} kS/s",
        (num_blocks * SAMPLES_PER_DATA_BLOCK) as f32 / header.sample_rate,
        header.sample_rate / 1000.0
    );

    let mut raw = RawData::new(header, num_blocks);
    let mut block_buf = vec![0u8; bytes_per_block as usize];
    let mut blocks_read = 0;

    for block in 0..num_blocks {
        reader.read_exact(&mut block_buf)?;
        scatter_block(&mut raw, header, &block_buf, block)?;
        blocks_read = block + 1;

        if cancel.is_some_and(|c| c.load(Ordering::Relaxed)) {
            log::warn!("Decoding cancelled after {} of {} blocks", blocks_read, num_blocks);
            diagnostics.cancelled = true;
            break;
        }
    }

    if blocks_read < num_blocks {
        raw = raw.truncate(blocks_read);
    }

    let data = process_data(header, raw);
    Ok((Some(data), true, diagnostics))
}

/// Demultiplexes one block into the raw arrays. Sub-regions appear in a
/// fixed order: sample indices, amplifier, DC amplifier, stimulation,
/// auxiliary input, supply voltage, board ADC, board DAC, digital in,
/// digital out.
fn scatter_block(
    raw: &mut RawData,
    header: &RhsHeader,
    block_buf: &[u8],
    block: usize,
) -> Result<(), RhsError> {
    let full_rate = SAMPLES_PER_DATA_BLOCK;
    let index = block * full_rate;
    let mut offset = 0;

    // Sample-index stream anchors the block's position on the time axis.
    let base = i32::from_le_bytes([block_buf[0], block_buf[1], block_buf[2], block_buf[3]]);
    if base < 0 {
        return Err(RhsError::InvalidBlockIndex { block, value: base });
    }
    scatter_timestamps(&block_buf[..full_rate * 4], &mut raw.timestamps, index);
    offset += full_rate * 4;

    let analog = |dest: &mut Option<Array2<i32>>, samples: usize, offset: &mut usize| {
        if let Some(dest) = dest.as_mut() {
            let num_channels = dest.shape()[0];
            let len = samples * num_channels * 2;
            let region_index = block * samples;
            scatter_analog(&block_buf[*offset..*offset + len], dest, region_index, samples);
            *offset += len;
        }
    };

    analog(&mut raw.amplifier, full_rate, &mut offset);
    analog(&mut raw.dc_amplifier, full_rate, &mut offset);
    analog(&mut raw.stim, full_rate, &mut offset);
    analog(
        &mut raw.aux_input,
        SignalGroup::AuxInput.samples_per_block(full_rate),
        &mut offset,
    );
    analog(
        &mut raw.supply_voltage,
        SignalGroup::SupplyVoltage.samples_per_block(full_rate),
        &mut offset,
    );
    analog(&mut raw.board_adc, full_rate, &mut offset);
    analog(&mut raw.board_dac, full_rate, &mut offset);

    for words in [&mut raw.dig_in_words, &mut raw.dig_out_words] {
        if let Some(words) = words.as_mut() {
            let len = full_rate * 2;
            scatter_words(&block_buf[offset..offset + len], words, index);
            offset += len;
        }
    }

    debug_assert_eq!(offset, bytes_per_data_block(header));

    Ok(())
}

fn scatter_timestamps(src: &[u8], dest: &mut Array1<i32>, index: usize) {
    let num_samples = src.len() / 4;
    let mut slice = dest.slice_mut(s![index..index + num_samples]);
    for i in 0..num_samples {
        let o = i * 4;
        slice[i] = i32::from_le_bytes([src[o], src[o + 1], src[o + 2], src[o + 3]]);
    }
}

/// Scatters one interleaved analog sub-region. Samples are stored
/// sample-major on disk (all channels of sample 0, then sample 1, ...).
fn scatter_analog(src: &[u8], dest: &mut Array2<i32>, index: usize, num_samples: usize) {
    let num_channels = dest.shape()[0];
    let mut slice = dest.slice_mut(s![.., index..index + num_samples]);
    for ch in 0..num_channels {
        for sample in 0..num_samples {
            let o = 2 * (sample * num_channels + ch);
            slice[[ch, sample]] = u16::from_le_bytes([src[o], src[o + 1]]) as i32;
        }
    }
}

/// Scatters a packed digital word stream: one 16-bit word per sample shared
/// by every channel of the group.
fn scatter_words(src: &[u8], dest: &mut Array1<i32>, index: usize) {
    let num_samples = src.len() / 2;
    let mut slice = dest.slice_mut(s![index..index + num_samples]);
    for i in 0..num_samples {
        slice[i] = u16::from_le_bytes([src[i * 2], src[i * 2 + 1]]) as i32;
    }
}

/// Converts raw sample arrays into the published dataset: physical-unit
/// scaling, stimulation word decoding, digital bit extraction, and the
/// derived time vector.
fn process_data(header: &RhsHeader, raw: RawData) -> RhsData {
    check_timestamps(&raw.timestamps);

    let t = raw
        .timestamps
        .mapv(|ts| f64::from(ts) / f64::from(header.sample_rate));

    let amplifier_data = raw.amplifier.map(|a| {
        let mut scaled = scale_amplifier_data(&a);
        apply_notch_filter(header, &mut scaled);
        scaled
    });

    let (stim_data, compliance_limit_data, charge_recovery_data, amp_settle_data) =
        match raw.stim {
            Some(stim_raw) => {
                let (stim, compliance, charge, settle) =
                    extract_stim_data(&stim_raw, header.stim_step_size);
                (Some(stim), Some(compliance), Some(charge), Some(settle))
            }
            None => (None, None, None, None),
        };

    RhsData {
        timestamps: raw.timestamps,
        t,
        amplifier_data,
        dc_amplifier_data: raw.dc_amplifier.map(|a| scale_dc_amplifier_data(&a)),
        stim_data,
        compliance_limit_data,
        charge_recovery_data,
        amp_settle_data,
        aux_input_data: raw
            .aux_input
            .map(|a| a.mapv(|x| f64::from(x) * AUX_INPUT_SCALE_FACTOR)),
        supply_voltage_data: raw
            .supply_voltage
            .map(|a| a.mapv(|x| f64::from(x) * SUPPLY_VOLTAGE_SCALE_FACTOR)),
        board_adc_data: raw.board_adc.map(|a| scale_adc_dac_data(&a)),
        board_dac_data: raw.board_dac.map(|a| scale_adc_dac_data(&a)),
        board_dig_in_data: raw
            .dig_in_words
            .map(|w| extract_digital_data(&w, &header.board_dig_in_channels)),
        board_dig_out_data: raw
            .dig_out_words
            .map(|w| extract_digital_data(&w, &header.board_dig_out_channels)),
    }
}

fn check_timestamps(timestamps: &Array1<i32>) {
    let num_gaps = timestamps
        .windows(2)
        .into_iter()
        .filter(|window| window[1] - window[0] != 1)
        .count();

    if num_gaps == 0 {
        log::debug!("No missing timestamps in data");
    } else {
        log::warn!(
            "{} gaps in timestamp data found; time scale will not be uniform",
            num_gaps
        );
    }
}

/// Scales amplifier data from raw ADC values to microvolts
/// (0.195 μV/bit, offset 32768).
fn scale_amplifier_data(raw: &Array2<i32>) -> Array2<f64> {
    raw.mapv(|x| (f64::from(x) - ADC_DAC_OFFSET) * AMPLIFIER_SCALE_FACTOR)
}

/// Scales DC amplifier data to volts (19.23 mV/bit, offset 512).
fn scale_dc_amplifier_data(raw: &Array2<i32>) -> Array2<f64> {
    raw.mapv(|x| (f64::from(x) - DC_AMPLIFIER_OFFSET) * DC_AMPLIFIER_SCALE_FACTOR / 1000.0)
}

/// Scales board ADC/DAC data to volts (312.5 μV/bit, offset 32768).
fn scale_adc_dac_data(raw: &Array2<i32>) -> Array2<f64> {
    raw.mapv(|x| (f64::from(x) - ADC_DAC_OFFSET) * ADC_DAC_SCALE_FACTOR)
}

/// Decodes the packed stimulation words into current amplitude (μA) and the
/// compliance-limit, charge-recovery, and amp-settle flag planes.
fn extract_stim_data(
    stim_raw: &Array2<i32>,
    stim_step_size: f32,
) -> (Array2<f64>, Array2<bool>, Array2<bool>, Array2<bool>) {
    let shape = stim_raw.raw_dim();
    let (num_channels, num_samples) = (shape[0], shape[1]);

    let mut stim_data = Array2::<f64>::zeros((num_channels, num_samples));
    let mut compliance_limit = Array2::from_elem((num_channels, num_samples), false);
    let mut charge_recovery = Array2::from_elem((num_channels, num_samples), false);
    let mut amp_settle = Array2::from_elem((num_channels, num_samples), false);

    for i in 0..num_channels {
        for j in 0..num_samples {
            let value = stim_raw[[i, j]];

            compliance_limit[[i, j]] = (value & 0x8000) != 0;
            charge_recovery[[i, j]] = (value & 0x4000) != 0;
            amp_settle[[i, j]] = (value & 0x2000) != 0;

            // Bit 8 is the polarity, the low byte the current amplitude in
            // units of the stimulation step size.
            let polarity = 1 - 2 * ((value & 0x0100) >> 8);
            let current_amplitude = value & 0x00ff;

            stim_data[[i, j]] =
                f64::from(current_amplitude * polarity) * f64::from(stim_step_size);
        }
    }

    (stim_data, compliance_limit, charge_recovery, amp_settle)
}

/// Unpacks the shared digital word stream into one 0/1 row per declared
/// channel, selected by each channel's native order bit.
fn extract_digital_data(words: &Array1<i32>, channels: &[ChannelInfo]) -> Array2<i32> {
    let num_samples = words.len();
    let mut digital = Array2::<i32>::zeros((channels.len(), num_samples));

    for (i, channel) in channels.iter().enumerate() {
        let mask = 1 << channel.native_order;
        for j in 0..num_samples {
            digital[[i, j]] = i32::from((words[j] & mask) != 0);
        }
    }

    digital
}

/// Re-applies the recorded notch filter in software.
///
/// Files written by RHX software version 3.0 or later already contain
/// notch-filtered samples, so the filter is only applied to older files.
fn apply_notch_filter(header: &RhsHeader, data: &mut Array2<f64>) {
    let Some(notch_frequency) = header.notch_filter_frequency else {
        return;
    };
    if header.version.major >= 3 {
        return;
    }

    log::debug!("Applying {} Hz notch filter", notch_frequency);

    let num_channels = data.shape()[0];
    for i in 0..num_channels {
        let channel_data: Vec<f64> = data.slice(s![i, ..]).to_vec();
        let filtered = notch_filter(&channel_data, header.sample_rate, notch_frequency as f32, 10);

        let mut slice = data.slice_mut(s![i, ..]);
        for (j, &value) in filtered.iter().enumerate() {
            slice[j] = value;
        }
    }
}

/// Second-order IIR notch filter over one channel.
fn notch_filter(signal_in: &[f64], f_sample: f32, f_notch: f32, bandwidth: i32) -> Vec<f64> {
    let signal_length = signal_in.len();
    if signal_length < 3 {
        return signal_in.to_vec();
    }

    let t_step = 1.0 / f64::from(f_sample);
    let f_c = f64::from(f_notch) * t_step;

    let d = (-2.0 * PI * (f64::from(bandwidth) / 2.0) * t_step).exp();
    let b = (1.0 + d * d) * (2.0 * PI * f_c).cos();
    let a0 = 1.0;
    let a1 = -b;
    let a2 = d * d;
    let a = (1.0 + d * d) / 2.0;
    let b0 = 1.0;
    let b1 = -2.0 * (2.0 * PI * f_c).cos();
    let b2 = 1.0;

    let mut signal_out = vec![0.0; signal_length];
    signal_out[0] = signal_in[0];
    signal_out[1] = signal_in[1];

    for i in 2..signal_length {
        signal_out[i] =
            (a * b0 * signal_in[i] + a * b1 * signal_in[i - 1] + a * b2 * signal_in[i - 2]
                - a2 * signal_out[i - 2]
                - a1 * signal_out[i - 1])
                / a0;
    }

    signal_out
}

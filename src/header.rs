//! Header region decoder.
//!
//! Reads the magic number, file version, global acquisition parameters, and
//! the variable-length signal-group catalog, producing an immutable
//! [`RhsHeader`]. Header errors are fatal: no partial header is ever
//! returned, since channel-array sizing downstream depends on every field.

use std::io::{Read, Seek};
use std::ops::RangeInclusive;

use crate::bytes::{read_f32, read_i16, read_qstring, read_u32};
use crate::error::RhsError;
use crate::types::*;

/// Magic number identifying RHS files.
pub(crate) const RHS_MAGIC_NUMBER: u32 = 0xd69127ac;

/// Number of full-rate samples in one data block, fixed for the RHS format.
pub(crate) const SAMPLES_PER_DATA_BLOCK: usize = 128;

/// File format versions this decoder knows the layout of. Anything outside
/// this range fails with `UnsupportedVersion` rather than guessing.
const SUPPORTED_MAJOR_VERSIONS: RangeInclusive<i32> = 1..=3;

/// Versions at which gated header fields were introduced. A gated field is
/// read only when the decoded file version is at or above its entry here.
const REFERENCE_CHANNEL_SINCE: Version = Version::new(1, 1);

/// Reads the complete header region from a byte source positioned at offset 0.
pub(crate) fn read_header<R: Read + Seek>(reader: &mut R) -> Result<RhsHeader, RhsError> {
    check_magic_number(reader)?;
    let version = read_version(reader)?;

    log::info!(
        "Reading Intan Technologies RHS data file, version {}.{}",
        version.major,
        version.minor
    );

    let sample_rate = read_f32(reader)?;

    // Bandwidth and DSP settings, in fixed file order.
    let dsp_enabled = read_i16(reader)? as i32;
    let actual_dsp_cutoff_frequency = read_f32(reader)?;
    let actual_lower_bandwidth = read_f32(reader)?;
    let actual_lower_settle_bandwidth = read_f32(reader)?;
    let actual_upper_bandwidth = read_f32(reader)?;
    let desired_dsp_cutoff_frequency = read_f32(reader)?;
    let desired_lower_bandwidth = read_f32(reader)?;
    let desired_lower_settle_bandwidth = read_f32(reader)?;
    let desired_upper_bandwidth = read_f32(reader)?;

    let notch_filter_frequency = match read_i16(reader)? {
        1 => Some(50),
        2 => Some(60),
        _ => None,
    };

    let desired_impedance_test_frequency = read_f32(reader)?;
    let actual_impedance_test_frequency = read_f32(reader)?;

    let amp_settle_mode = read_i16(reader)? as i32;
    let charge_recovery_mode = read_i16(reader)? as i32;
    let stim_step_size = read_f32(reader)?;
    let recovery_current_limit = read_f32(reader)?;
    let recovery_target_voltage = read_f32(reader)?;

    let notes = Notes {
        note1: read_qstring(reader)?,
        note2: read_qstring(reader)?,
        note3: read_qstring(reader)?,
    };

    let dc_amplifier_data_saved = read_i16(reader)? != 0;
    let eval_board_mode = read_i16(reader)? as i32;

    let reference_channel = if version >= REFERENCE_CHANNEL_SINCE {
        Some(read_qstring(reader)?)
    } else {
        None
    };

    let mut header = RhsHeader {
        version,
        sample_rate,
        num_samples_per_data_block: SAMPLES_PER_DATA_BLOCK as i32,
        dsp_enabled,
        actual_dsp_cutoff_frequency,
        actual_lower_bandwidth,
        actual_lower_settle_bandwidth,
        actual_upper_bandwidth,
        desired_dsp_cutoff_frequency,
        desired_lower_bandwidth,
        desired_lower_settle_bandwidth,
        desired_upper_bandwidth,
        notch_filter_frequency,
        desired_impedance_test_frequency,
        actual_impedance_test_frequency,
        amp_settle_mode,
        charge_recovery_mode,
        stim_step_size,
        recovery_current_limit,
        recovery_target_voltage,
        notes,
        dc_amplifier_data_saved,
        eval_board_mode,
        reference_channel,
        amplifier_channels: Vec::new(),
        spike_triggers: Vec::new(),
        aux_input_channels: Vec::new(),
        supply_voltage_channels: Vec::new(),
        board_adc_channels: Vec::new(),
        board_dac_channels: Vec::new(),
        board_dig_in_channels: Vec::new(),
        board_dig_out_channels: Vec::new(),
        frequency_parameters: FrequencyParameters::default(),
        stim_parameters: StimParameters::default(),
    };

    read_signal_summary(reader, &mut header)?;

    header.frequency_parameters = consolidate_frequency_parameters(&header);
    header.stim_parameters = consolidate_stim_parameters(&header);

    log_header_summary(&header);

    Ok(header)
}

fn check_magic_number<R: Read + Seek>(reader: &mut R) -> Result<(), RhsError> {
    let found = read_u32(reader)?;
    if found != RHS_MAGIC_NUMBER {
        return Err(RhsError::InvalidMagic { found });
    }
    Ok(())
}

fn read_version<R: Read + Seek>(reader: &mut R) -> Result<Version, RhsError> {
    let major = read_i16(reader)? as i32;
    let minor = read_i16(reader)? as i32;

    if !SUPPORTED_MAJOR_VERSIONS.contains(&major) {
        return Err(RhsError::UnsupportedVersion { major, minor });
    }

    Ok(Version { major, minor })
}

/// Reads the signal-group catalog: a leading group count, then for each group
/// its name, prefix, enabled flag, channel count, and that many channel
/// records. A count of 0 is valid and yields empty channel lists.
fn read_signal_summary<R: Read + Seek>(
    reader: &mut R,
    header: &mut RhsHeader,
) -> Result<(), RhsError> {
    let number_of_signal_groups = read_i16(reader)?;

    for _ in 0..number_of_signal_groups {
        read_signal_group(reader, header)?;
    }

    Ok(())
}

fn read_signal_group<R: Read + Seek>(
    reader: &mut R,
    header: &mut RhsHeader,
) -> Result<(), RhsError> {
    let group_name = read_qstring(reader)?;
    let group_prefix = read_qstring(reader)?;

    let group_enabled = read_i16(reader)?;
    let num_channels = read_i16(reader)?;
    let _num_amp_channels = read_i16(reader)?;

    if num_channels > 0 && group_enabled > 0 {
        for _ in 0..num_channels {
            read_channel(reader, header, &group_name, &group_prefix)?;
        }
    }

    Ok(())
}

/// Reads one channel record and routes it to its group's catalog. Disabled
/// channels are parsed but not retained; they occupy no space in data blocks.
fn read_channel<R: Read + Seek>(
    reader: &mut R,
    header: &mut RhsHeader,
    group_name: &str,
    group_prefix: &str,
) -> Result<(), RhsError> {
    let mut channel = ChannelInfo {
        port_name: group_name.to_string(),
        port_prefix: group_prefix.to_string(),
        ..ChannelInfo::default()
    };

    channel.native_channel_name = read_qstring(reader)?;
    channel.custom_channel_name = read_qstring(reader)?;
    channel.native_order = read_i16(reader)? as i32;
    channel.custom_order = read_i16(reader)? as i32;

    let signal_type = read_i16(reader)? as i32;
    let channel_enabled = read_i16(reader)? as i32;

    channel.chip_channel = read_i16(reader)? as i32;
    let _reserved = read_i16(reader)?;
    channel.board_stream = read_i16(reader)? as i32;

    let trigger = SpikeTrigger {
        voltage_trigger_mode: read_i16(reader)? as i32,
        voltage_threshold: read_i16(reader)? as i32,
        digital_trigger_channel: read_i16(reader)? as i32,
        digital_edge_polarity: read_i16(reader)? as i32,
    };

    channel.electrode_impedance_magnitude = read_f32(reader)?;
    channel.electrode_impedance_phase = read_f32(reader)?;

    if channel_enabled == 0 {
        return Ok(());
    }

    match signal_type {
        0 => {
            header.amplifier_channels.push(channel);
            header.spike_triggers.push(trigger);
        }
        1 => header.aux_input_channels.push(channel),
        2 => header.supply_voltage_channels.push(channel),
        3 => header.board_adc_channels.push(channel),
        4 => header.board_dac_channels.push(channel),
        5 => header.board_dig_in_channels.push(channel),
        6 => header.board_dig_out_channels.push(channel),
        code => return Err(RhsError::InvalidChannelType { code }),
    }

    Ok(())
}

fn consolidate_frequency_parameters(header: &RhsHeader) -> FrequencyParameters {
    FrequencyParameters {
        amplifier_sample_rate: header.sample_rate,
        // Sub-rate groups sample at fixed ratios of the amplifier rate.
        aux_input_sample_rate: header.sample_rate / 4.0,
        supply_voltage_sample_rate: header.sample_rate / SAMPLES_PER_DATA_BLOCK as f32,
        board_adc_sample_rate: header.sample_rate,
        board_dig_in_sample_rate: header.sample_rate,
        desired_dsp_cutoff_frequency: header.desired_dsp_cutoff_frequency,
        actual_dsp_cutoff_frequency: header.actual_dsp_cutoff_frequency,
        dsp_enabled: header.dsp_enabled,
        desired_lower_bandwidth: header.desired_lower_bandwidth,
        desired_lower_settle_bandwidth: header.desired_lower_settle_bandwidth,
        actual_lower_bandwidth: header.actual_lower_bandwidth,
        actual_lower_settle_bandwidth: header.actual_lower_settle_bandwidth,
        desired_upper_bandwidth: header.desired_upper_bandwidth,
        actual_upper_bandwidth: header.actual_upper_bandwidth,
        notch_filter_frequency: header.notch_filter_frequency,
        desired_impedance_test_frequency: header.desired_impedance_test_frequency,
        actual_impedance_test_frequency: header.actual_impedance_test_frequency,
    }
}

fn consolidate_stim_parameters(header: &RhsHeader) -> StimParameters {
    StimParameters {
        stim_step_size: header.stim_step_size,
        charge_recovery_current_limit: header.recovery_current_limit,
        charge_recovery_target_voltage: header.recovery_target_voltage,
        amp_settle_mode: header.amp_settle_mode,
        charge_recovery_mode: header.charge_recovery_mode,
    }
}

fn log_header_summary(header: &RhsHeader) {
    log::info!(
        "Found {} amplifier, {} aux input, {} supply voltage channels",
        header.amplifier_channels.len(),
        header.aux_input_channels.len(),
        header.supply_voltage_channels.len()
    );
    if header.dc_amplifier_data_saved {
        log::info!(
            "Found {} DC amplifier channels",
            header.amplifier_channels.len()
        );
    }
    log::info!(
        "Found {} board ADC, {} board DAC channels",
        header.board_adc_channels.len(),
        header.board_dac_channels.len()
    );
    log::info!(
        "Found {} digital input, {} digital output channels",
        header.board_dig_in_channels.len(),
        header.board_dig_out_channels.len()
    );
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Cursor;

    // Minimal synthetic header builder. Mirrors the field order read above.
    pub(crate) struct HeaderBuilder {
        version: (i16, i16),
        magic: u32,
        channels: Vec<(i32, i16)>, // (signal type, enabled)
    }

    impl HeaderBuilder {
        pub(crate) fn new() -> Self {
            HeaderBuilder {
                version: (1, 1),
                magic: RHS_MAGIC_NUMBER,
                channels: Vec::new(),
            }
        }

        pub(crate) fn version(mut self, major: i16, minor: i16) -> Self {
            self.version = (major, minor);
            self
        }

        pub(crate) fn magic(mut self, magic: u32) -> Self {
            self.magic = magic;
            self
        }

        pub(crate) fn channel(mut self, signal_type: i32, enabled: bool) -> Self {
            self.channels.push((signal_type, enabled as i16));
            self
        }

        pub(crate) fn build(&self) -> Vec<u8> {
            let mut bytes = Vec::new();
            bytes.extend_from_slice(&self.magic.to_le_bytes());
            bytes.extend_from_slice(&self.version.0.to_le_bytes());
            bytes.extend_from_slice(&self.version.1.to_le_bytes());
            bytes.extend_from_slice(&30000.0f32.to_le_bytes()); // sample rate

            push_i16(&mut bytes, 1); // dsp enabled
            for _ in 0..8 {
                bytes.extend_from_slice(&1.0f32.to_le_bytes()); // bandwidth settings
            }
            push_i16(&mut bytes, 1); // notch mode -> 50 Hz
            bytes.extend_from_slice(&1000.0f32.to_le_bytes()); // desired impedance freq
            bytes.extend_from_slice(&1000.0f32.to_le_bytes()); // actual impedance freq
            push_i16(&mut bytes, 0); // amp settle mode
            push_i16(&mut bytes, 0); // charge recovery mode
            bytes.extend_from_slice(&10.0f32.to_le_bytes()); // stim step size
            bytes.extend_from_slice(&0.1f32.to_le_bytes()); // recovery current limit
            bytes.extend_from_slice(&0.0f32.to_le_bytes()); // recovery target voltage
            for _ in 0..3 {
                push_qstring(&mut bytes, ""); // notes
            }
            push_i16(&mut bytes, 0); // dc amplifier saved
            push_i16(&mut bytes, 0); // eval board mode
            if Version::new(self.version.0 as i32, self.version.1 as i32)
                >= REFERENCE_CHANNEL_SINCE
            {
                push_qstring(&mut bytes, "n/a"); // reference channel
            }

            // One signal group holding every requested channel.
            push_i16(&mut bytes, 1);
            push_qstring(&mut bytes, "Port A");
            push_qstring(&mut bytes, "A");
            push_i16(&mut bytes, 1); // enabled
            push_i16(&mut bytes, self.channels.len() as i16);
            push_i16(&mut bytes, 0);

            for (i, &(signal_type, enabled)) in self.channels.iter().enumerate() {
                push_qstring(&mut bytes, &format!("A-{:03}", i));
                push_qstring(&mut bytes, &format!("chan{}", i));
                push_i16(&mut bytes, i as i16); // native order
                push_i16(&mut bytes, i as i16); // custom order
                push_i16(&mut bytes, signal_type as i16);
                push_i16(&mut bytes, enabled);
                push_i16(&mut bytes, i as i16); // chip channel
                push_i16(&mut bytes, 0); // reserved
                push_i16(&mut bytes, 0); // board stream
                for _ in 0..4 {
                    push_i16(&mut bytes, 0); // spike trigger fields
                }
                bytes.extend_from_slice(&0.0f32.to_le_bytes()); // impedance magnitude
                bytes.extend_from_slice(&0.0f32.to_le_bytes()); // impedance phase
            }

            bytes
        }
    }

    fn push_i16(bytes: &mut Vec<u8>, v: i16) {
        bytes.extend_from_slice(&v.to_le_bytes());
    }

    fn push_qstring(bytes: &mut Vec<u8>, s: &str) {
        let units: Vec<u16> = s.encode_utf16().collect();
        bytes.extend_from_slice(&((units.len() * 2) as u32).to_le_bytes());
        for u in units {
            bytes.extend_from_slice(&u.to_le_bytes());
        }
    }

    #[test]
    fn bad_magic_is_rejected() {
        let bytes = HeaderBuilder::new().magic(0xdeadbeef).build();
        let mut cursor = Cursor::new(bytes);
        match read_header(&mut cursor) {
            Err(RhsError::InvalidMagic { found }) => assert_eq!(found, 0xdeadbeef),
            other => panic!("expected InvalidMagic, got {:?}", other),
        }
    }

    #[test]
    fn magic_mismatch_stops_reading() {
        // Only the 4 magic bytes are provided; a decoder that read past the
        // identifier would hit EOF and report truncation instead.
        let mut cursor = Cursor::new(0xdeadbeefu32.to_le_bytes().to_vec());
        assert!(matches!(
            read_header(&mut cursor),
            Err(RhsError::InvalidMagic { .. })
        ));
    }

    #[test]
    fn unsupported_version_names_the_version() {
        let bytes = HeaderBuilder::new().version(7, 2).build();
        let mut cursor = Cursor::new(bytes);
        match read_header(&mut cursor) {
            Err(RhsError::UnsupportedVersion { major, minor }) => {
                assert_eq!((major, minor), (7, 2));
            }
            other => panic!("expected UnsupportedVersion, got {:?}", other),
        }
    }

    #[test]
    fn truncated_header_reports_offset() {
        let mut bytes = HeaderBuilder::new().build();
        bytes.truncate(20);
        let len = bytes.len() as u64;
        let mut cursor = Cursor::new(bytes);
        match read_header(&mut cursor) {
            Err(RhsError::TruncatedHeader { offset }) => assert!(offset <= len),
            other => panic!("expected TruncatedHeader, got {:?}", other),
        }
    }

    #[test]
    fn channel_counts_match_declared_groups() {
        let bytes = HeaderBuilder::new()
            .channel(0, true)
            .channel(0, true)
            .channel(1, true)
            .channel(3, true)
            .channel(5, true)
            .channel(5, true)
            .build();
        let mut cursor = Cursor::new(bytes);
        let header = read_header(&mut cursor).unwrap();

        assert_eq!(header.amplifier_channels.len(), 2);
        assert_eq!(header.spike_triggers.len(), 2);
        assert_eq!(header.aux_input_channels.len(), 1);
        assert_eq!(header.board_adc_channels.len(), 1);
        assert_eq!(header.board_dig_in_channels.len(), 2);
        assert_eq!(header.board_dig_out_channels.len(), 0);
        assert_eq!(header.amplifier_channels[0].native_channel_name, "A-000");
        assert_eq!(header.amplifier_channels[1].native_channel_name, "A-001");
    }

    #[test]
    fn disabled_channels_are_skipped() {
        let bytes = HeaderBuilder::new()
            .channel(0, true)
            .channel(0, false)
            .build();
        let mut cursor = Cursor::new(bytes);
        let header = read_header(&mut cursor).unwrap();
        assert_eq!(header.amplifier_channels.len(), 1);
    }

    #[test]
    fn empty_channel_catalog_is_valid() {
        let bytes = HeaderBuilder::new().build();
        let mut cursor = Cursor::new(bytes);
        let header = read_header(&mut cursor).unwrap();
        assert!(header.amplifier_channels.is_empty());
        assert_eq!(header.sample_rate, 30000.0);
        assert_eq!(header.notch_filter_frequency, Some(50));
    }

    #[test]
    fn invalid_signal_type_is_rejected() {
        let bytes = HeaderBuilder::new().channel(9, true).build();
        let mut cursor = Cursor::new(bytes);
        match read_header(&mut cursor) {
            Err(RhsError::InvalidChannelType { code }) => assert_eq!(code, 9),
            other => panic!("expected InvalidChannelType, got {:?}", other),
        }
    }

    #[test]
    fn reference_channel_is_version_gated() {
        let old = HeaderBuilder::new().version(1, 0).build();
        let new = HeaderBuilder::new().version(1, 1).build();

        let old_header = read_header(&mut Cursor::new(old)).unwrap();
        let new_header = read_header(&mut Cursor::new(new)).unwrap();

        assert_eq!(old_header.reference_channel, None);
        assert_eq!(new_header.reference_channel.as_deref(), Some("n/a"));

        // Everything outside the gated field decodes identically.
        assert_eq!(old_header.sample_rate, new_header.sample_rate);
        assert_eq!(old_header.eval_board_mode, new_header.eval_board_mode);
        assert_eq!(
            old_header.amplifier_channels.len(),
            new_header.amplifier_channels.len()
        );
    }

    #[test]
    fn derived_sample_rates_use_fixed_ratios() {
        let bytes = HeaderBuilder::new().build();
        let header = read_header(&mut Cursor::new(bytes)).unwrap();
        let freq = &header.frequency_parameters;
        assert_eq!(freq.amplifier_sample_rate, 30000.0);
        assert_eq!(freq.aux_input_sample_rate, 7500.0);
        assert_eq!(freq.supply_voltage_sample_rate, 30000.0 / 128.0);
    }
}

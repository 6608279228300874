use ndarray::{Array1, Array2};

/// Version information for the RHS file.
///
/// Versions order lexicographically on (major, minor); the header decoder
/// compares against this to decide which gated fields are present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    /// Major version number
    pub major: i32,
    /// Minor version number
    pub minor: i32,
}

impl Version {
    pub const fn new(major: i32, minor: i32) -> Self {
        Version { major, minor }
    }
}

/// Notes stored in the RHS file.
///
/// Intan recording software allows up to three notes to be stored with each
/// recording, typically used to document experimental conditions.
#[derive(Debug, Clone, Default)]
pub struct Notes {
    /// First note text
    pub note1: String,
    /// Second note text
    pub note2: String,
    /// Third note text
    pub note3: String,
}

/// Frequency parameters for the recording.
///
/// Contains the sampling rates of every signal group and the filter settings.
/// Includes both the originally requested values ("desired_*") and the actual
/// values achieved by the hardware ("actual_*").
#[derive(Debug, Clone, Default)]
pub struct FrequencyParameters {
    /// Sample rate for amplifier channels (Hz)
    pub amplifier_sample_rate: f32,
    /// Sample rate for auxiliary input channels (Hz), one quarter of the amplifier rate
    pub aux_input_sample_rate: f32,
    /// Sample rate for supply voltage channels (Hz), one sample per data block
    pub supply_voltage_sample_rate: f32,
    /// Sample rate for board ADC channels (Hz)
    pub board_adc_sample_rate: f32,
    /// Sample rate for digital input channels (Hz)
    pub board_dig_in_sample_rate: f32,
    /// User-requested DSP cutoff frequency (Hz)
    pub desired_dsp_cutoff_frequency: f32,
    /// Actual DSP cutoff frequency achieved (Hz)
    pub actual_dsp_cutoff_frequency: f32,
    /// Whether DSP was enabled (1) or disabled (0)
    pub dsp_enabled: i32,
    /// User-requested lower bandwidth (Hz)
    pub desired_lower_bandwidth: f32,
    /// User-requested lower settle bandwidth (Hz)
    pub desired_lower_settle_bandwidth: f32,
    /// Actual lower bandwidth achieved (Hz)
    pub actual_lower_bandwidth: f32,
    /// Actual lower settle bandwidth achieved (Hz)
    pub actual_lower_settle_bandwidth: f32,
    /// User-requested upper bandwidth (Hz)
    pub desired_upper_bandwidth: f32,
    /// Actual upper bandwidth achieved (Hz)
    pub actual_upper_bandwidth: f32,
    /// Notch filter frequency (50Hz, 60Hz, or None)
    pub notch_filter_frequency: Option<i32>,
    /// User-requested impedance test frequency (Hz)
    pub desired_impedance_test_frequency: f32,
    /// Actual impedance test frequency achieved (Hz)
    pub actual_impedance_test_frequency: f32,
}

/// Stimulation parameters for the recording.
#[derive(Debug, Clone, Default)]
pub struct StimParameters {
    /// Stimulation current step size (μA)
    pub stim_step_size: f32,
    /// Maximum current used in charge recovery (μA)
    pub charge_recovery_current_limit: f32,
    /// Target voltage for charge recovery (V)
    pub charge_recovery_target_voltage: f32,
    /// Amplifier settle mode setting
    /// - 0: Traditional (switch to ground)
    /// - 1: Limited switches
    pub amp_settle_mode: i32,
    /// Charge recovery mode setting
    /// - 0: Current-limited charge recovery circuit engaged during stimulation
    /// - 1: Circuit engaged all the time
    pub charge_recovery_mode: i32,
}

/// Information about an individual channel.
///
/// Contains naming, ordering, and hardware configuration for a single
/// recording channel, whatever its signal group.
#[derive(Debug, Clone, Default)]
pub struct ChannelInfo {
    /// Name of the port (e.g., "Port A")
    pub port_name: String,
    /// Prefix for the port (e.g., "A")
    pub port_prefix: String,
    /// Port number on the device
    pub port_number: i32,
    /// Default channel name assigned by the system
    pub native_channel_name: String,
    /// User-defined custom name for the channel
    pub custom_channel_name: String,
    /// Original order in the native system
    pub native_order: i32,
    /// Custom order (often used for display purposes)
    pub custom_order: i32,
    /// Channel on the chip
    pub chip_channel: i32,
    /// Hardware stream on the board
    pub board_stream: i32,
    /// Measured electrode impedance magnitude (Ω)
    pub electrode_impedance_magnitude: f32,
    /// Measured electrode impedance phase (radians)
    pub electrode_impedance_phase: f32,
}

/// Spike trigger configuration, one per amplifier channel.
#[derive(Debug, Clone, Default)]
pub struct SpikeTrigger {
    /// Voltage trigger mode
    /// - 0: Trigger on digital input
    /// - 1: Trigger on voltage threshold
    pub voltage_trigger_mode: i32,
    /// Voltage threshold for triggering (μV)
    pub voltage_threshold: i32,
    /// Digital input channel to use for triggering
    pub digital_trigger_channel: i32,
    /// Digital edge polarity for trigger
    /// - 0: Trigger on falling edge
    /// - 1: Trigger on rising edge
    pub digital_edge_polarity: i32,
}

/// One channel-group kind of the RHS block layout.
///
/// Each variant knows its own per-block sample multiplicity and byte width,
/// so block sizing and the scatter loop never branch on parallel flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalGroup {
    /// AC-coupled amplifier channels, sampled at the full amplifier rate.
    Amplifier,
    /// Auxiliary analog inputs, sampled at one quarter of the amplifier rate.
    AuxInput,
    /// Chip supply voltage sensors, one sample per data block.
    SupplyVoltage,
    /// Board analog inputs, sampled at the full amplifier rate.
    BoardAdc,
    /// Board analog outputs, sampled at the full amplifier rate.
    BoardDac,
    /// Board digital inputs, packed as one 16-bit word per sample.
    BoardDigIn,
    /// Board digital outputs, packed as one 16-bit word per sample.
    BoardDigOut,
}

impl SignalGroup {
    /// Number of samples this group contributes to one data block.
    pub fn samples_per_block(self, full_rate_samples: usize) -> usize {
        match self {
            SignalGroup::AuxInput => full_rate_samples / 4,
            SignalGroup::SupplyVoltage => 1,
            _ => full_rate_samples,
        }
    }

    /// Width of one sample of this group on disk.
    pub fn bytes_per_sample(self) -> usize {
        2
    }

    /// Whether all channels of this group share one multi-channel word per
    /// sample instead of one field per channel.
    pub fn packs_channels(self) -> bool {
        matches!(self, SignalGroup::BoardDigIn | SignalGroup::BoardDigOut)
    }
}

/// Header information from the RHS file.
///
/// Contains all metadata and configuration information from the recording:
/// version, sampling rates, filter settings, channel catalogs, and more.
/// Built once per decode call and immutable afterward.
#[derive(Debug, Clone)]
pub struct RhsHeader {
    /// File format version
    pub version: Version,
    /// Primary sample rate of the recording (Hz)
    pub sample_rate: f32,
    /// Number of samples per data block (fixed at 128 for RHS files)
    pub num_samples_per_data_block: i32,

    // DSP and bandwidth settings
    /// Whether DSP was enabled (1) or disabled (0)
    pub dsp_enabled: i32,
    /// Actual DSP cutoff frequency achieved (Hz)
    pub actual_dsp_cutoff_frequency: f32,
    /// Actual lower bandwidth achieved (Hz)
    pub actual_lower_bandwidth: f32,
    /// Actual lower settle bandwidth achieved (Hz)
    pub actual_lower_settle_bandwidth: f32,
    /// Actual upper bandwidth achieved (Hz)
    pub actual_upper_bandwidth: f32,
    /// User-requested DSP cutoff frequency (Hz)
    pub desired_dsp_cutoff_frequency: f32,
    /// User-requested lower bandwidth (Hz)
    pub desired_lower_bandwidth: f32,
    /// User-requested lower settle bandwidth (Hz)
    pub desired_lower_settle_bandwidth: f32,
    /// User-requested upper bandwidth (Hz)
    pub desired_upper_bandwidth: f32,

    // Filter settings
    /// Notch filter frequency (50Hz, 60Hz, or None)
    pub notch_filter_frequency: Option<i32>,

    // Impedance test settings
    /// User-requested impedance test frequency (Hz)
    pub desired_impedance_test_frequency: f32,
    /// Actual impedance test frequency achieved (Hz)
    pub actual_impedance_test_frequency: f32,

    // Recovery and settle modes
    /// Amplifier settle mode setting
    pub amp_settle_mode: i32,
    /// Charge recovery mode setting
    pub charge_recovery_mode: i32,

    // Stim settings
    /// Stimulation current step size (μA)
    pub stim_step_size: f32,
    /// Maximum current used in charge recovery (μA)
    pub recovery_current_limit: f32,
    /// Target voltage for charge recovery (V)
    pub recovery_target_voltage: f32,

    // Notes and modes
    /// User notes saved with the recording
    pub notes: Notes,
    /// Whether DC amplifier data was saved (true) or not (false)
    pub dc_amplifier_data_saved: bool,
    /// Evaluation board mode
    /// - 0: Recording Controller
    /// - 1: Recording Controller + Stim
    /// - 2: Recording System
    pub eval_board_mode: i32,
    /// Name of the reference channel used. Recorded from file version 1.1
    /// onward; `None` for older files.
    pub reference_channel: Option<String>,

    // Channel catalogs, in file order
    /// List of amplifier channels in the recording
    pub amplifier_channels: Vec<ChannelInfo>,
    /// List of spike trigger configurations (one per amplifier channel)
    pub spike_triggers: Vec<SpikeTrigger>,
    /// List of auxiliary input channels
    pub aux_input_channels: Vec<ChannelInfo>,
    /// List of supply voltage channels
    pub supply_voltage_channels: Vec<ChannelInfo>,
    /// List of board ADC (analog-to-digital converter) channels
    pub board_adc_channels: Vec<ChannelInfo>,
    /// List of board DAC (digital-to-analog converter) channels
    pub board_dac_channels: Vec<ChannelInfo>,
    /// List of board digital input channels
    pub board_dig_in_channels: Vec<ChannelInfo>,
    /// List of board digital output channels
    pub board_dig_out_channels: Vec<ChannelInfo>,

    // Computed values
    /// Consolidated frequency parameters from various header fields
    pub frequency_parameters: FrequencyParameters,
    /// Consolidated stimulation parameters from various header fields
    pub stim_parameters: StimParameters,
}

impl RhsHeader {
    /// Channel catalog for one signal group, in file order.
    pub fn channels(&self, group: SignalGroup) -> &[ChannelInfo] {
        match group {
            SignalGroup::Amplifier => &self.amplifier_channels,
            SignalGroup::AuxInput => &self.aux_input_channels,
            SignalGroup::SupplyVoltage => &self.supply_voltage_channels,
            SignalGroup::BoardAdc => &self.board_adc_channels,
            SignalGroup::BoardDac => &self.board_dac_channels,
            SignalGroup::BoardDigIn => &self.board_dig_in_channels,
            SignalGroup::BoardDigOut => &self.board_dig_out_channels,
        }
    }
}

/// Data contained in the RHS file.
///
/// Each matrix is channel-major: the first dimension is the channel (in
/// header order) and the second is the time sample. Analog groups are scaled
/// to physical units during decoding.
#[derive(Debug, Clone)]
pub struct RhsData {
    /// Raw sample indices for each full-rate sample
    pub timestamps: Array1<i32>,
    /// Time of each full-rate sample in seconds (sample index ÷ amplifier sample rate)
    pub t: Array1<f64>,
    /// Neural data from amplifier channels (μV)
    pub amplifier_data: Option<Array2<f64>>,
    /// DC amplifier data (V)
    pub dc_amplifier_data: Option<Array2<f64>>,
    /// Stimulation current (μA)
    pub stim_data: Option<Array2<f64>>,
    /// Whether the compliance limit was reached, per channel and sample
    pub compliance_limit_data: Option<Array2<bool>>,
    /// Whether charge recovery was active, per channel and sample
    pub charge_recovery_data: Option<Array2<bool>>,
    /// Whether amplifier settle was active, per channel and sample
    pub amp_settle_data: Option<Array2<bool>>,
    /// Auxiliary input data (V), sampled at one quarter of the amplifier rate
    pub aux_input_data: Option<Array2<f64>>,
    /// Supply voltage data (V), one sample per data block
    pub supply_voltage_data: Option<Array2<f64>>,
    /// Board ADC data (V)
    pub board_adc_data: Option<Array2<f64>>,
    /// Board DAC data (V)
    pub board_dac_data: Option<Array2<f64>>,
    /// Board digital input data (0 or 1 per declared channel)
    pub board_dig_in_data: Option<Array2<i32>>,
    /// Board digital output data (0 or 1 per declared channel)
    pub board_dig_out_data: Option<Array2<i32>>,
}

/// Recoverable irregularity found in the data body.
///
/// The file ended partway through a data block. All complete blocks were
/// decoded; only the trailing fragment was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TruncatedBody {
    /// Number of complete data blocks recovered.
    pub complete_blocks: u64,
    /// Bytes of the trailing partial block that were discarded.
    pub trailing_bytes: u64,
}

/// Diagnostics attached to a decode result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Diagnostics {
    /// Set when the data body ended partway through a block.
    pub truncated_body: Option<TruncatedBody>,
    /// Set when decoding stopped early because the caller cancelled it.
    pub cancelled: bool,
}

/// Complete representation of an RHS file, including header and data.
///
/// This is the top-level struct returned by [`load`](crate::load) and
/// [`decode`](crate::decode). It contains the header (metadata,
/// configuration), the recorded data when the file has a body, and
/// diagnostics describing any recoverable irregularities.
///
/// # Examples
///
/// ```no_run
/// use intan_rhs::load;
///
/// let rhs_file = load("path/to/your/file.rhs").unwrap();
///
/// // Access header information
/// println!("Sample rate: {} Hz", rhs_file.header.sample_rate);
///
/// // Check if data is present
/// if rhs_file.data_present {
///     if let Some(data) = &rhs_file.data {
///         if let Some(amp_data) = &data.amplifier_data {
///             if amp_data.shape()[0] > 0 {
///                 println!("First sample: {} μV", amp_data[[0, 0]]);
///             }
///         }
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RhsFile {
    /// Header information containing metadata and configuration
    pub header: RhsHeader,
    /// Recorded data (if present in the file)
    pub data: Option<RhsData>,
    /// Flag indicating whether data is present in the file
    pub data_present: bool,
    /// Recoverable irregularities found while decoding
    pub diagnostics: Diagnostics,
}

impl RhsFile {
    /// Returns the duration of the recording in seconds.
    ///
    /// If no data is present, returns 0.0.
    pub fn duration(&self) -> f32 {
        if let Some(data) = &self.data {
            let num_samples = data.timestamps.len();
            num_samples as f32 / self.header.sample_rate
        } else {
            0.0
        }
    }

    /// Returns the number of full-rate samples in the recording.
    ///
    /// If no data is present, returns 0.
    pub fn num_samples(&self) -> usize {
        if let Some(data) = &self.data {
            data.timestamps.len()
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_ordering_is_lexicographic() {
        assert!(Version::new(1, 0) < Version::new(1, 1));
        assert!(Version::new(1, 9) < Version::new(2, 0));
        assert!(Version::new(3, 0) >= Version::new(1, 1));
    }

    #[test]
    fn group_multiplicities() {
        assert_eq!(SignalGroup::Amplifier.samples_per_block(128), 128);
        assert_eq!(SignalGroup::AuxInput.samples_per_block(128), 32);
        assert_eq!(SignalGroup::SupplyVoltage.samples_per_block(128), 1);
        assert!(SignalGroup::BoardDigIn.packs_channels());
        assert!(!SignalGroup::BoardAdc.packs_channels());
    }
}

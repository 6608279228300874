use intan_rhs::load;

fn main() -> Result<(), intan_rhs::RhsError> {
    env_logger::init();

    // Load RHS file
    let rhs_file = load("data/sample.rhs")?;

    // Print basic file information
    println!(
        "File version: {}.{}",
        rhs_file.header.version.major, rhs_file.header.version.minor
    );
    println!("Sample rate: {} Hz", rhs_file.header.sample_rate);

    // Print notes if any
    if !rhs_file.header.notes.note1.is_empty() {
        println!("Note 1: {}", rhs_file.header.notes.note1);
    }
    if !rhs_file.header.notes.note2.is_empty() {
        println!("Note 2: {}", rhs_file.header.notes.note2);
    }
    if !rhs_file.header.notes.note3.is_empty() {
        println!("Note 3: {}", rhs_file.header.notes.note3);
    }

    // Print channel information
    println!(
        "Number of amplifier channels: {}",
        rhs_file.header.amplifier_channels.len()
    );
    println!(
        "Number of ADC channels: {}",
        rhs_file.header.board_adc_channels.len()
    );
    println!(
        "Number of digital input channels: {}",
        rhs_file.header.board_dig_in_channels.len()
    );

    // List first few amplifier channels
    if !rhs_file.header.amplifier_channels.is_empty() {
        println!("\nAmplifier channels:");
        for channel in rhs_file.header.amplifier_channels.iter().take(5) {
            println!(
                "  {} ({})",
                channel.native_channel_name, channel.custom_channel_name
            );
        }
    }

    // Summarize the recording itself
    if rhs_file.data_present {
        println!("\nRecording duration: {:.2} seconds", rhs_file.duration());
        println!("Number of samples: {}", rhs_file.num_samples());

        if let Some(data) = &rhs_file.data {
            if let Some(amp_data) = &data.amplifier_data {
                if amp_data.shape()[0] > 0 {
                    println!("First amplifier sample: {:.3} μV", amp_data[[0, 0]]);
                }
            }
        }
    } else {
        println!("\nFile contains header only, no data.");
    }

    if let Some(truncation) = rhs_file.diagnostics.truncated_body {
        println!(
            "Warning: file was truncated; recovered {} complete blocks ({} bytes dropped)",
            truncation.complete_blocks, truncation.trailing_bytes
        );
    }

    Ok(())
}

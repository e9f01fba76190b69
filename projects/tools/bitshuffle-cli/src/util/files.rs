use crate::error::CliError;
use crate::util::Throughput;
use bytesize::ByteSize;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Reads `path` whole.
pub fn read_file(path: &Path) -> Result<Vec<u8>, CliError> {
    Ok(fs::read(path)?)
}

/// Writes `data` to `path`, creating parent directories as needed.
pub fn write_file(path: &Path, data: &[u8]) -> Result<(), CliError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(fs::write(path, data)?)
}

/// Number of `elem_size` byte elements in `len` bytes.
pub fn element_count(len: usize, elem_size: usize) -> Result<usize, CliError> {
    if elem_size == 0 {
        return Err(CliError::InvalidInput(
            "Element size must be at least 1 byte".into(),
        ));
    }
    if len % elem_size != 0 {
        return Err(CliError::InvalidInput(format!(
            "Input of {len} bytes is not a whole number of {elem_size} byte elements"
        )));
    }
    Ok(len / elem_size)
}

/// Prints the sizes and speed of one run.
pub fn print_report(operation: &str, input_bytes: usize, output_bytes: usize, elapsed: Duration) {
    let processed = input_bytes.max(output_bytes) as u64;
    println!("{operation} completed in {elapsed:.2?}");
    println!(
        "  {} -> {} ({:.2}%)",
        ByteSize(input_bytes as u64),
        ByteSize(output_bytes as u64),
        if input_bytes == 0 {
            100.0
        } else {
            output_bytes as f64 * 100.0 / input_bytes as f64
        }
    );
    println!("  Throughput: {}", Throughput::measure(processed, elapsed));
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, 4, Some(0))]
    #[case(12, 4, Some(3))]
    #[case(13, 4, None)]
    #[case(8, 0, None)]
    fn counts_whole_elements(
        #[case] len: usize,
        #[case] elem_size: usize,
        #[case] expected: Option<usize>,
    ) {
        assert_eq!(element_count(len, elem_size).ok(), expected);
    }
}

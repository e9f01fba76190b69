use crate::error::CliError;
use crate::util::{element_count, print_report, read_file, write_file};
use argh::FromArgs;
use bitshuffle_core::{bitshuffle, bitunshuffle, BitshuffleError};
use log::info;
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(FromArgs, Debug)]
/// Bit shuffle a raw file of fixed width elements
#[argh(subcommand, name = "shuffle")]
pub struct ShuffleCmd {
    /// input file path
    #[argh(option)]
    pub input: PathBuf,

    /// output file path
    #[argh(option)]
    pub output: PathBuf,

    /// width of one element in bytes
    #[argh(option)]
    pub elem_size: usize,

    /// elements per block, a multiple of 8 [default: 0, picks the default block size]
    #[argh(option, default = "0")]
    pub block_size: usize,
}

#[derive(FromArgs, Debug)]
/// Undo `shuffle` on a raw file
#[argh(subcommand, name = "unshuffle")]
pub struct UnshuffleCmd {
    /// input file path
    #[argh(option)]
    pub input: PathBuf,

    /// output file path
    #[argh(option)]
    pub output: PathBuf,

    /// width of one element in bytes
    #[argh(option)]
    pub elem_size: usize,

    /// elements per block, must match the value used to shuffle [default: 0]
    #[argh(option, default = "0")]
    pub block_size: usize,
}

type Transform = fn(&[u8], &mut [u8], usize, usize, usize) -> Result<usize, BitshuffleError>;

fn run_transform(
    operation: &str,
    transform: Transform,
    input: &Path,
    output: &Path,
    elem_size: usize,
    block_size: usize,
) -> Result<(), CliError> {
    let data = read_file(input)?;
    let size = element_count(data.len(), elem_size)?;
    info!("{operation}: {} ({size} elements of {elem_size} bytes)", input.display());

    let start = Instant::now();
    let mut result = vec![0u8; data.len()];
    transform(&data, &mut result, size, elem_size, block_size)?;
    let elapsed = start.elapsed();

    write_file(output, &result)?;
    print_report(operation, data.len(), result.len(), elapsed);
    Ok(())
}

pub fn handle_shuffle_command(cmd: ShuffleCmd) -> Result<(), CliError> {
    run_transform(
        "Shuffle",
        bitshuffle,
        &cmd.input,
        &cmd.output,
        cmd.elem_size,
        cmd.block_size,
    )
}

pub fn handle_unshuffle_command(cmd: UnshuffleCmd) -> Result<(), CliError> {
    run_transform(
        "Unshuffle",
        bitunshuffle,
        &cmd.input,
        &cmd.output,
        cmd.elem_size,
        cmd.block_size,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn shuffle_then_unshuffle_restores_file() {
        let dir = tempdir().unwrap();
        let original = dir.path().join("data.bin");
        let shuffled = dir.path().join("data.shuf");
        let restored = dir.path().join("data.out");
        let data: Vec<u8> = (0..1003u16).flat_map(|x| x.to_le_bytes()).collect();
        std::fs::write(&original, &data).unwrap();

        handle_shuffle_command(ShuffleCmd {
            input: original.clone(),
            output: shuffled.clone(),
            elem_size: 2,
            block_size: 0,
        })
        .unwrap();
        assert_ne!(std::fs::read(&shuffled).unwrap(), data);

        handle_unshuffle_command(UnshuffleCmd {
            input: shuffled,
            output: restored.clone(),
            elem_size: 2,
            block_size: 0,
        })
        .unwrap();
        assert_eq!(std::fs::read(restored).unwrap(), data);
    }

    #[test]
    fn rejects_partial_elements() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("odd.bin");
        std::fs::write(&input, [1, 2, 3]).unwrap();

        let result = handle_shuffle_command(ShuffleCmd {
            input,
            output: dir.path().join("odd.out"),
            elem_size: 2,
            block_size: 0,
        });
        assert!(matches!(result, Err(CliError::InvalidInput(_))));
    }
}

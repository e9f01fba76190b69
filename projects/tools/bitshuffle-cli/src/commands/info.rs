use argh::FromArgs;
use bitshuffle_core::{default_block_size, has_wide128, has_wide256, Capability};

#[derive(FromArgs, Debug)]
/// Show the transpose implementations this machine runs and the default block sizes
#[argh(subcommand, name = "info")]
pub struct InfoCmd {
    /// element sizes to print the default block size for [default: 1, 2, 4, 8, 16]
    #[argh(option)]
    pub elem_size: Vec<usize>,
}

pub fn handle_info_command(cmd: InfoCmd) {
    println!("Transpose implementations:");
    for capability in Capability::ALL {
        let status = if capability.is_available() {
            "available"
        } else {
            "unavailable"
        };
        println!("  {capability:?}: {status}");
    }
    println!("Selected: {:?}", Capability::best());
    println!("  128-bit SIMD: {}", has_wide128());
    println!("  256-bit SIMD: {}", has_wide256());

    let elem_sizes = if cmd.elem_size.is_empty() {
        vec![1, 2, 4, 8, 16]
    } else {
        cmd.elem_size
    };

    println!("Default block sizes:");
    for elem_size in elem_sizes.into_iter().filter(|&size| size != 0) {
        let block_size = default_block_size(elem_size);
        println!(
            "  {elem_size:>3} byte elements: {block_size} elements ({} bytes)",
            block_size * elem_size
        );
    }
}

#![no_main]

// Shuffling then unshuffling must restore the input with every transpose variant,
// and every variant must produce the same shuffled bytes as the scalar one.

use bitshuffle_core::{bitshuffle_with, bitunshuffle_with, Capability};
use libfuzzer_sys::{arbitrary, fuzz_target};

#[derive(Clone, Debug, arbitrary::Arbitrary)]
pub struct ShuffleInput {
    pub elem_size: u8,
    pub block_groups: u8,
    pub data: Vec<u8>,
}

fuzz_target!(|input: ShuffleInput| {
    let elem_size = (input.elem_size as usize % 32) + 1;
    // 0 picks the default block size.
    let block_size = input.block_groups as usize * 8;
    let size = input.data.len() / elem_size;
    let data = &input.data[..size * elem_size];

    let mut reference = vec![0u8; data.len()];
    bitshuffle_with(Capability::Scalar, data, &mut reference, size, elem_size, block_size)
        .expect("scalar shuffle failed");

    for capability in Capability::ALL.into_iter().filter(|c| c.is_available()) {
        let mut shuffled = vec![0u8; data.len()];
        let mut restored = vec![0u8; data.len()];

        let written =
            bitshuffle_with(capability, data, &mut shuffled, size, elem_size, block_size)
                .expect("shuffle failed");
        assert_eq!(written, data.len());
        assert_eq!(shuffled, reference, "{capability:?} disagrees with scalar");

        bitunshuffle_with(capability, &shuffled, &mut restored, size, elem_size, block_size)
            .expect("unshuffle failed");
        assert_eq!(restored, data, "{capability:?} did not round trip");
    }
});

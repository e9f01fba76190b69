#![no_main]

// Decompressing arbitrary bytes must fail cleanly or stay inside the output buffer,
// never panic. Valid streams must still round trip.

use bitshuffle_lz4::{compress_lz4, compress_lz4_bound, decompress_lz4};
use libfuzzer_sys::{arbitrary, fuzz_target};

#[derive(Clone, Debug, arbitrary::Arbitrary)]
pub struct DecompressInput {
    pub elem_size: u8,
    pub size: u16,
    pub block_groups: u8,
    pub stream: Vec<u8>,
}

fuzz_target!(|input: DecompressInput| {
    let elem_size = (input.elem_size as usize % 16) + 1;
    let size = input.size as usize;
    let block_size = input.block_groups as usize * 8;

    let mut output = vec![0u8; size * elem_size];
    if let Ok(read) = decompress_lz4(&input.stream, &mut output, size, elem_size, block_size) {
        assert!(read <= input.stream.len());

        // Whatever decoded successfully must encode back into a decodable stream.
        let mut compressed = vec![0u8; compress_lz4_bound(size, elem_size, block_size).unwrap()];
        let written = compress_lz4(&output, &mut compressed, size, elem_size, block_size)
            .expect("compress failed");
        let mut restored = vec![0u8; output.len()];
        decompress_lz4(&compressed[..written], &mut restored, size, elem_size, block_size)
            .expect("decompress of fresh stream failed");
        assert_eq!(restored, output);
    }
});

use crate::error::CliError;
use bitshuffle_core::FRAME_HEADER_SIZE;

/// Bytes in front of the frame stream of a compressed chunk.
pub const CHUNK_HEADER_SIZE: usize = 12;

/// Header of a compressed file: the uncompressed length, then the block size in bytes.
///
/// Both fields are big-endian, the same byte order bitshuffle uses for frame lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub uncompressed_bytes: u64,
    pub block_bytes: u32,
}

impl ChunkHeader {
    /// Describes `size` elements of `elem_size` bytes split into blocks of `block_size` elements.
    pub fn new(size: usize, elem_size: usize, block_size: usize) -> Result<Self, CliError> {
        let block_bytes = block_size
            .checked_mul(elem_size)
            .and_then(|bytes| u32::try_from(bytes).ok())
            .ok_or_else(|| {
                CliError::InvalidInput(format!(
                    "Block of {block_size} elements of {elem_size} bytes does not fit the chunk header"
                ))
            })?;

        Ok(Self {
            uncompressed_bytes: (size * elem_size) as u64,
            block_bytes,
        })
    }

    pub fn to_bytes(self) -> [u8; CHUNK_HEADER_SIZE] {
        let mut bytes = [0u8; CHUNK_HEADER_SIZE];
        bytes[..8].copy_from_slice(&self.uncompressed_bytes.to_be_bytes());
        bytes[8..].copy_from_slice(&self.block_bytes.to_be_bytes());
        bytes
    }

    /// Splits `data` into its header and the frame stream that follows.
    pub fn parse(data: &[u8]) -> Result<(Self, &[u8]), CliError> {
        let Some((header, frames)) = data.split_first_chunk::<CHUNK_HEADER_SIZE>() else {
            return Err(CliError::InvalidInput(format!(
                "Compressed input is {} bytes, shorter than the {CHUNK_HEADER_SIZE} byte header",
                data.len()
            )));
        };

        let (length, block) = header.split_at(8);
        let header = Self {
            uncompressed_bytes: u64::from_be_bytes(length.try_into().unwrap_or_default()),
            block_bytes: u32::from_be_bytes(block.try_into().unwrap_or_default()),
        };
        Ok((header, frames))
    }

    /// Element count and block size for elements of `elem_size` bytes.
    ///
    /// `frames_len` is the length of the frame stream after the header. Every full block needs
    /// at least a frame header there, so a header claiming more blocks than that is rejected.
    pub fn layout(&self, elem_size: usize, frames_len: usize) -> Result<(usize, usize), CliError> {
        let total = usize::try_from(self.uncompressed_bytes).map_err(|_| {
            CliError::InvalidInput(format!(
                "Uncompressed size {} does not fit in memory",
                self.uncompressed_bytes
            ))
        })?;
        let block_bytes = self.block_bytes as usize;

        if total % elem_size != 0 || block_bytes % elem_size != 0 || block_bytes == 0 {
            return Err(CliError::InvalidInput(format!(
                "Chunk of {total} bytes with {block_bytes} byte blocks does not hold {elem_size} byte elements"
            )));
        }
        let (size, block_size) = (total / elem_size, block_bytes / elem_size);

        let min_frames_len = (size / block_size).saturating_mul(FRAME_HEADER_SIZE);
        if frames_len < min_frames_len {
            return Err(CliError::InvalidInput(format!(
                "Chunk claims {total} bytes but its {frames_len} byte frame stream holds at most {} blocks",
                frames_len / FRAME_HEADER_SIZE
            )));
        }
        Ok((size, block_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_is_big_endian() {
        let header = ChunkHeader::new(1000, 4, 2048).unwrap();
        assert_eq!(
            header.to_bytes(),
            [0, 0, 0, 0, 0, 0, 0x0F, 0xA0, 0, 0, 0x20, 0]
        );

        let mut data = header.to_bytes().to_vec();
        data.extend_from_slice(&[7, 7]);
        let (parsed, frames) = ChunkHeader::parse(&data).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(frames, &[7, 7]);
        assert_eq!(parsed.layout(4, frames.len()).unwrap(), (1000, 2048));
    }

    #[test]
    fn rejects_short_and_mismatched_chunks() {
        assert!(ChunkHeader::parse(&[0; 11]).is_err());

        let header = ChunkHeader::new(10, 3, 8).unwrap();
        assert!(header.layout(4, 64).is_err());
    }

    #[test]
    fn rejects_length_the_frames_cannot_hold() {
        let header = ChunkHeader {
            uncompressed_bytes: 1 << 46,
            block_bytes: 32768,
        };
        assert!(matches!(
            header.layout(4, 5),
            Err(CliError::InvalidInput(_))
        ));

        // Two full blocks need at least two frame headers.
        let header = ChunkHeader::new(16, 4, 8).unwrap();
        assert!(header.layout(4, 7).is_err());
        assert_eq!(header.layout(4, 8).unwrap(), (16, 8));
    }
}

//! Grid serialization: protobuf encode, zlib compress, CRC32C checksum.
//!
//! The stored object is the zlib stream; the Castagnoli checksum of the
//! compressed bytes travels with the upload so the store can reject a
//! corrupted write.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use prost::Message;
use thiserror::Error;

use crate::state::Grid;

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("proto encoding failed: {0}")]
    Proto(#[from] prost::EncodeError),
    #[error("zlib compression failed: {0}")]
    Compress(#[source] std::io::Error),
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("zlib decompression failed: {0}")]
    Decompress(#[source] std::io::Error),
    #[error("proto decoding failed: {0}")]
    Proto(#[from] prost::DecodeError),
}

/// Serialize a grid into zlib-compressed protobuf bytes.
pub fn marshal_grid(grid: &Grid) -> Result<Vec<u8>, EncodeError> {
    let mut buf = Vec::with_capacity(grid.encoded_len());
    grid.encode(&mut buf)?;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&buf).map_err(EncodeError::Compress)?;
    encoder.finish().map_err(EncodeError::Compress)
}

/// Inverse of [`marshal_grid`].
pub fn unmarshal_grid(buf: &[u8]) -> Result<Grid, DecodeError> {
    let mut decoder = ZlibDecoder::new(buf);
    let mut raw = Vec::new();
    decoder
        .read_to_end(&mut raw)
        .map_err(DecodeError::Decompress)?;
    Ok(Grid::decode(raw.as_slice())?)
}

/// Castagnoli CRC32C of `buf`.
pub fn crc32c_of(buf: &[u8]) -> u32 {
    crc32c::crc32c(buf)
}

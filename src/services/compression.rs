//! Gzip helpers for the vulnerable reports bucket.

use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::{self, Write};

/// Gzip compress data.
pub fn gzip_compress(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

#[cfg(test)]
pub fn gzip_decompress(data: &[u8]) -> io::Result<Vec<u8>> {
    use flate2::read::GzDecoder;
    use std::io::Read;

    let mut decoder = GzDecoder::new(data);
    let mut decompressed = Vec::new();
    decoder.read_to_end(&mut decompressed)?;
    Ok(decompressed)
}

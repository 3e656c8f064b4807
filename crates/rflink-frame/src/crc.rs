//! CRC-16/IBM integrity trailer.
//!
//! Reflected polynomial 0xA001 (0x8005 normal form), initial value 0, no final
//! XOR. The `crc` catalogue calls this algorithm CRC-16/ARC.

use ::crc::{Crc, CRC_16_ARC};

const CRC16_IBM: Crc<u16> = Crc::<u16>::new(&CRC_16_ARC);

/// Compute the trailer over `data`.
pub fn crc16(data: &[u8]) -> u16 {
    CRC16_IBM.checksum(data)
}

/// Compute the trailer over several slices as if they were contiguous.
pub fn crc16_parts(parts: &[&[u8]]) -> u16 {
    let mut digest = CRC16_IBM.digest();
    for part in parts {
        digest.update(part);
    }
    digest.finalize()
}

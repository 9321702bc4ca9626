/// Seeded CRC-32 for Bluetooth rumble reports.
///
/// Sony controllers expect the output report CRC to be computed over a
/// 0xA2 seed byte followed by the report body (reflected polynomial
/// 0xEDB88320, init and xor-out 0xFFFFFFFF).

pub const SEED_OUTPUT: u8 = 0xA2;

const fn build_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut n = 0;
    while n < table.len() {
        let mut c = n as u32;
        let mut bit = 0;
        while bit < 8 {
            c = if c & 1 == 1 { 0xEDB8_8320 ^ (c >> 1) } else { c >> 1 };
            bit += 1;
        }
        table[n] = c;
        n += 1;
    }
    table
}

static TABLE: [u32; 256] = build_table();

fn update(crc: u32, byte: u8) -> u32 {
    TABLE[((crc ^ byte as u32) & 0xFF) as usize] ^ (crc >> 8)
}

/// CRC-32 over `seed` followed by `data`.
pub fn checksum(seed: u8, data: &[u8]) -> u32 {
    !data.iter().fold(update(!0, seed), |crc, &b| update(crc, b))
}

/// Write the little-endian CRC of `report[..crc_offset]` into the four bytes at `crc_offset`.
pub fn stamp(seed: u8, report: &mut [u8], crc_offset: usize) {
    let crc = checksum(seed, &report[..crc_offset]);
    report[crc_offset..crc_offset + 4].copy_from_slice(&crc.to_le_bytes());
}

#[cfg(test)]
pub fn validate(seed: u8, report: &[u8]) -> bool {
    let Some(split) = report.len().checked_sub(4) else {
        return false;
    };
    let (body, tail) = report.split_at(split);
    tail == checksum(seed, body).to_le_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_check_value() {
        // "123456789" with the seed folded in as its first byte.
        assert_eq!(checksum(b'1', b"23456789"), 0xCBF4_3926);
    }

    #[test]
    fn stamped_report_validates() {
        let mut buf = [0x31, 0x02, 0xFF, 0, 0, 0, 0, 0, 0, 0];
        stamp(SEED_OUTPUT, &mut buf, 6);
        assert!(validate(SEED_OUTPUT, &buf));
        buf[2] = 0x00;
        assert!(!validate(SEED_OUTPUT, &buf));
    }
}

//! PSIセクションの誤り検出に使うCRC。

use crc::{Crc, CRC_32_MPEG_2};

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_MPEG_2);

/// `data`のCRC-32/MPEG-2を計算する。
#[inline]
pub fn checksum32(data: &[u8]) -> u32 {
    CRC32.checksum(data)
}

/// 末尾にCRC_32を含む`data`が正しいかどうかを返す。
///
/// CRC_32まで含めて計算した剰余が0であれば正しい。
#[inline]
pub fn calc32(data: &[u8]) -> bool {
    checksum32(data) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum32() {
        // CRC-32/MPEG-2のチェック値
        assert_eq!(checksum32(b"123456789"), 0x0376E6E7);
        assert_eq!(checksum32(b""), 0xFFFFFFFF);
    }

    #[test]
    fn test_calc32() {
        let mut data = b"123456789".to_vec();
        data.extend_from_slice(&0x0376E6E7_u32.to_be_bytes());
        assert!(calc32(&data));

        for bit in 0..data.len() * 8 {
            let mut broken = data.clone();
            broken[bit / 8] ^= 0x80 >> (bit % 8);
            assert!(!calc32(&broken), "bit {} flipped", bit);
        }
    }
}

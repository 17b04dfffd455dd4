//! LZ4 压缩封装：两种用法
//!
//! - **逐值模式** — 压缩体自带解压长度前缀，单值可独立解压
//! - **块模式**   — 原始长度由调用方的块索引单独记录，压缩体不带前缀

use crate::common::{ColumnError, Result};

/// 单值压缩（输出带长度前缀）
pub fn compress_value(raw: &[u8]) -> Result<Vec<u8>> {
    Ok(lz4::block::compress(raw, None, true)?)
}

pub fn decompress_value(data: &[u8]) -> Result<Vec<u8>> {
    lz4::block::decompress(data, None)
        .map_err(|e| ColumnError::Corrupt(format!("lz4 value: {e}")))
}

/// 块压缩（原始长度由块索引记录）
pub fn compress_block(raw: &[u8]) -> Result<Vec<u8>> {
    Ok(lz4::block::compress(raw, None, false)?)
}

pub fn decompress_block(data: &[u8], raw_len: usize) -> Result<Vec<u8>> {
    lz4::block::decompress(data, Some(raw_len as i32))
        .map_err(|e| ColumnError::Corrupt(format!("lz4 block: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_mode_roundtrip() {
        let raw = b"alfa bravo charlie alfa bravo charlie".repeat(10);
        let comp = compress_value(&raw).unwrap();
        assert!(comp.len() < raw.len());
        assert_eq!(decompress_value(&comp).unwrap(), raw);
    }

    #[test]
    fn block_mode_roundtrip() {
        let raw = b"delta echo foxtrot".repeat(100);
        let comp = compress_block(&raw).unwrap();
        assert_eq!(decompress_block(&comp, raw.len()).unwrap(), raw);
    }

    #[test]
    fn garbage_is_corrupt() {
        assert!(decompress_value(&[0xFF, 0xFE, 0xFD]).is_err());
    }
}

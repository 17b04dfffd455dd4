//! 位列：连续位图与 roaring 压缩位图
//!
//! BitColumn 布局：`ceil(doc_count / 8)` 字节的连续位图，
//! 位运算 `bits[docnum / 8] & (1 << (docnum % 8))` 即 O(1) 寻址。
//!
//! RoaringBitColumn 只存「值为 true 的 docnum 集合」的 roaring 序列化形式。
//! 未写入与显式写 false 同样读回 false —— 本列不区分两者。真值稀疏时
//! 空间远小于连续位图，代价是一次容器查找。

use std::cell::RefCell;
use std::io::Write;

use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};

use crate::column::{self, Column, ColumnReader, ColumnWriter};
use crate::common::{ColumnError, DocId, Result};

// ── BitColumn ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BitColumn;

impl BitColumn {
    pub fn new() -> Self {
        Self
    }
}

impl Column for BitColumn {
    type Value = bool;
    type Writer<W: Write> = BitWriter<W>;
    type Reader<'a> = BitReader<'a> where Self: 'a;

    fn default_value(&self) -> bool {
        false
    }

    fn writer<W: Write>(&self, stream: W) -> BitWriter<W> {
        BitWriter {
            stream,
            bits: Vec::new(),
            last: None,
        }
    }

    fn reader<'a>(
        &'a self,
        map:       &'a [u8],
        offset:    usize,
        length:    usize,
        doc_count: DocId,
        _native:   bool,
    ) -> Result<BitReader<'a>> {
        let data = column::range(map, offset, length)?;
        let expect = (doc_count as usize + 7) / 8;
        if data.len() < expect {
            return Err(ColumnError::Corrupt(format!(
                "bitmap truncated: {} bytes for {doc_count} docs",
                data.len()
            )));
        }
        Ok(BitReader { data, doc_count })
    }
}

pub struct BitWriter<W: Write> {
    stream: W,
    bits:   Vec<u8>,
    last:   Option<DocId>,
}

impl<W: Write> ColumnWriter for BitWriter<W> {
    type Value = bool;

    fn add(&mut self, docnum: DocId, value: bool) -> Result<()> {
        column::advance(&mut self.last, docnum)?;
        if value {
            let byte = docnum as usize / 8;
            if self.bits.len() <= byte {
                self.bits.resize(byte + 1, 0);
            }
            self.bits[byte] |= 1 << (docnum % 8);
        }
        Ok(())
    }

    fn finish(mut self, doc_count: DocId) -> Result<u64> {
        column::check_doc_count(self.last, doc_count)?;
        self.bits.resize((doc_count as usize + 7) / 8, 0);
        self.stream.write_all(&self.bits)?;
        self.stream.flush()?;
        Ok(self.bits.len() as u64)
    }
}

pub struct BitReader<'a> {
    data:      &'a [u8],
    doc_count: DocId,
}

impl ColumnReader for BitReader<'_> {
    type Value = bool;

    fn doc_count(&self) -> DocId {
        self.doc_count
    }

    fn get(&self, docnum: DocId) -> Result<bool> {
        column::check_lookup(docnum, self.doc_count)?;
        let byte = docnum as usize / 8;
        Ok(self.data[byte] & (1 << (docnum % 8)) != 0)
    }
}

// ── RoaringBitColumn ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoaringBitColumn;

impl RoaringBitColumn {
    pub fn new() -> Self {
        Self
    }
}

impl Column for RoaringBitColumn {
    type Value = bool;
    type Writer<W: Write> = RoaringBitWriter<W>;
    type Reader<'a> = RoaringBitReader<'a> where Self: 'a;

    fn default_value(&self) -> bool {
        false
    }

    fn writer<W: Write>(&self, stream: W) -> RoaringBitWriter<W> {
        RoaringBitWriter {
            stream,
            set: RoaringBitmap::new(),
            last: None,
        }
    }

    fn reader<'a>(
        &'a self,
        map:       &'a [u8],
        offset:    usize,
        length:    usize,
        doc_count: DocId,
        _native:   bool,
    ) -> Result<RoaringBitReader<'a>> {
        let data = column::range(map, offset, length)?;
        // 构造时即解码一次，坏布局尽早报 Corrupt
        let set = decode_bitmap(data)?;
        Ok(RoaringBitReader {
            data,
            doc_count,
            set: RefCell::new(Some(set)),
        })
    }
}

fn decode_bitmap(data: &[u8]) -> Result<RoaringBitmap> {
    RoaringBitmap::deserialize_from(data)
        .map_err(|e| ColumnError::Corrupt(format!("roaring bitmap: {e}")))
}

pub struct RoaringBitWriter<W: Write> {
    stream: W,
    set:    RoaringBitmap,
    last:   Option<DocId>,
}

impl<W: Write> ColumnWriter for RoaringBitWriter<W> {
    type Value = bool;

    fn add(&mut self, docnum: DocId, value: bool) -> Result<()> {
        column::advance(&mut self.last, docnum)?;
        if value {
            self.set.insert(docnum);
        }
        Ok(())
    }

    fn finish(mut self, doc_count: DocId) -> Result<u64> {
        column::check_doc_count(self.last, doc_count)?;
        let len = self.set.serialized_size() as u64;
        self.set.serialize_into(&mut self.stream)?;
        self.stream.flush()?;
        Ok(len)
    }
}

pub struct RoaringBitReader<'a> {
    data:      &'a [u8],
    doc_count: DocId,
    set:       RefCell<Option<RoaringBitmap>>,
}

impl ColumnReader for RoaringBitReader<'_> {
    type Value = bool;

    fn doc_count(&self) -> DocId {
        self.doc_count
    }

    fn get(&self, docnum: DocId) -> Result<bool> {
        column::check_lookup(docnum, self.doc_count)?;
        let mut cache = self.set.borrow_mut();
        if cache.is_none() {
            // close 之后再次访问：重新解码
            *cache = Some(decode_bitmap(self.data)?);
        }
        let set = cache.get_or_insert_with(RoaringBitmap::new);
        Ok(set.contains(docnum))
    }

    fn close(&self) {
        *self.set.borrow_mut() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitmap_roundtrip_with_gaps() {
        let col = BitColumn::new();
        let mut buf = Vec::new();
        let mut w = col.writer(&mut buf);
        w.add(0, true).unwrap();
        w.add(3, false).unwrap();
        w.add(9, true).unwrap();
        let len = w.finish(12).unwrap();
        assert_eq!(len, 2);

        let r = col.reader(&buf, 0, buf.len(), 12, true).unwrap();
        let truth = [true, false, false, false, false, false,
                     false, false, false, true, false, false];
        for (i, &t) in truth.iter().enumerate() {
            assert_eq!(r.get(i as DocId).unwrap(), t);
        }
    }

    #[test]
    fn roaring_only_explicit_true_reads_true() {
        let col = RoaringBitColumn::new();
        let mut buf = Vec::new();
        let mut w = col.writer(&mut buf);
        w.add(1, false).unwrap();
        w.add(2, true).unwrap();
        w.add(100_000, true).unwrap();
        let len = w.finish(200_000).unwrap();

        let r = col.reader(&buf, 0, len as usize, 200_000, true).unwrap();
        assert!(!r.get(0).unwrap());
        assert!(!r.get(1).unwrap());
        assert!(r.get(2).unwrap());
        assert!(r.get(100_000).unwrap());
        assert!(!r.get(199_999).unwrap());
        // close 幂等，之后仍可读（重新解码）
        r.close();
        r.close();
        assert!(r.get(2).unwrap());
    }
}

//! 定宽/变宽字节列
//!
//! FixedBytesColumn 布局（槽位直接寻址，无索引）：
//! ```text
//! ┌──────────────────────────────┐
//! │ slot 0 (width bytes)         │ ← 值在 docnum × width 处
//! │ slot 1                       │   写入间隙补零；尾部未写的槽省略
//! │ ...                          │
//! └──────────────────────────────┘
//! ```
//!
//! VarBytesColumn 布局（blob + 定稿时固定的偏移表）：
//! ```text
//! ┌──────────────────────────────┐
//! │ blob（所有值连续拼接）        │
//! │ 累计末偏移 (doc_count+1)×u32 │ ← 第 d 个值 = blob[offs[d]..offs[d+1]]
//! └──────────────────────────────┘
//! ```
//! 未写入的文档在偏移表里是零长条目，读回空字节串。

use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};
use serde::{Deserialize, Serialize};

use crate::column::{self, Column, ColumnReader, ColumnWriter};
use crate::common::{ColumnError, DocId, Result};

// ── FixedBytesColumn ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedBytesColumn {
    width: u32,
}

impl FixedBytesColumn {
    pub fn new(width: u32) -> Self {
        Self { width }
    }

    pub fn width(&self) -> usize {
        self.width as usize
    }
}

impl Column for FixedBytesColumn {
    type Value = Vec<u8>;
    type Writer<W: Write> = FixedBytesWriter<W>;
    type Reader<'a> = FixedBytesReader<'a> where Self: 'a;

    fn default_value(&self) -> Vec<u8> {
        vec![0u8; self.width as usize]
    }

    fn writer<W: Write>(&self, stream: W) -> FixedBytesWriter<W> {
        FixedBytesWriter {
            stream,
            width: self.width as usize,
            last: None,
            next: 0,
            written: 0,
        }
    }

    fn reader<'a>(
        &'a self,
        map:       &'a [u8],
        offset:    usize,
        length:    usize,
        doc_count: DocId,
        _native:   bool,
    ) -> Result<FixedBytesReader<'a>> {
        let data = column::range(map, offset, length)?;
        let width = self.width as usize;
        if width == 0 {
            return Err(ColumnError::Corrupt("fixed column with zero width".into()));
        }
        if data.len() % width != 0 {
            return Err(ColumnError::Corrupt(format!(
                "fixed column length {} not a multiple of width {width}",
                data.len()
            )));
        }
        Ok(FixedBytesReader { data, width, doc_count })
    }
}

pub struct FixedBytesWriter<W: Write> {
    stream:  W,
    width:   usize,
    last:    Option<DocId>,
    next:    DocId,
    written: u64,
}

impl<W: Write> ColumnWriter for FixedBytesWriter<W> {
    type Value = Vec<u8>;

    fn add(&mut self, docnum: DocId, value: Vec<u8>) -> Result<()> {
        // 先验域再记序，失败的 add 不占用 docnum
        if value.len() != self.width {
            return Err(ColumnError::Type(format!(
                "fixed column expects {} bytes, got {}",
                self.width,
                value.len()
            )));
        }
        column::advance(&mut self.last, docnum)?;
        if self.next < docnum {
            let zeros = vec![0u8; self.width];
            while self.next < docnum {
                self.stream.write_all(&zeros)?;
                self.written += self.width as u64;
                self.next += 1;
            }
        }
        self.stream.write_all(&value)?;
        self.written += self.width as u64;
        self.next = docnum + 1;
        Ok(())
    }

    fn finish(mut self, doc_count: DocId) -> Result<u64> {
        column::check_doc_count(self.last, doc_count)?;
        self.stream.flush()?;
        Ok(self.written)
    }
}

pub struct FixedBytesReader<'a> {
    data:      &'a [u8],
    width:     usize,
    doc_count: DocId,
}

impl ColumnReader for FixedBytesReader<'_> {
    type Value = Vec<u8>;

    fn doc_count(&self) -> DocId {
        self.doc_count
    }

    fn get(&self, docnum: DocId) -> Result<Vec<u8>> {
        column::check_lookup(docnum, self.doc_count)?;
        let pos = docnum as usize * self.width;
        if pos + self.width <= self.data.len() {
            Ok(self.data[pos..pos + self.width].to_vec())
        } else {
            // 尾部未写的槽
            Ok(vec![0u8; self.width])
        }
    }
}

// ── VarBytesColumn ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VarBytesColumn;

impl VarBytesColumn {
    pub fn new() -> Self {
        Self
    }
}

impl Column for VarBytesColumn {
    type Value = Vec<u8>;
    type Writer<W: Write> = VarBytesWriter<W>;
    type Reader<'a> = VarBytesReader<'a> where Self: 'a;

    fn default_value(&self) -> Vec<u8> {
        Vec::new()
    }

    fn writer<W: Write>(&self, stream: W) -> VarBytesWriter<W> {
        VarBytesWriter {
            stream,
            ends: Vec::new(),
            total: 0,
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
    ) -> Result<VarBytesReader<'a>> {
        let data = column::range(map, offset, length)?;
        let table_len = (doc_count as usize + 1) * 4;
        if data.len() < table_len {
            return Err(ColumnError::Corrupt(format!(
                "var column truncated: {} bytes, offset table needs {table_len}",
                data.len()
            )));
        }
        let split = data.len() - table_len;
        Ok(VarBytesReader {
            blob:      &data[..split],
            offsets:   &data[split..],
            doc_count,
        })
    }
}

pub struct VarBytesWriter<W: Write> {
    stream: W,
    /// 每文档的 blob 累计末偏移
    ends:   Vec<u32>,
    total:  u32,
    last:   Option<DocId>,
}

impl<W: Write> ColumnWriter for VarBytesWriter<W> {
    type Value = Vec<u8>;

    fn add(&mut self, docnum: DocId, value: Vec<u8>) -> Result<()> {
        column::advance(&mut self.last, docnum)?;
        // 间隙文档是零长条目
        while self.ends.len() < docnum as usize {
            self.ends.push(self.total);
        }
        if value.len() > u32::MAX as usize {
            return Err(ColumnError::Type(format!(
                "value too large for var column ({} bytes)",
                value.len()
            )));
        }
        let total = self
            .total
            .checked_add(value.len() as u32)
            .ok_or_else(|| ColumnError::Type("column blob exceeds u32 space".into()))?;
        self.stream.write_all(&value)?;
        self.total = total;
        self.ends.push(total);
        Ok(())
    }

    fn finish(mut self, doc_count: DocId) -> Result<u64> {
        column::check_doc_count(self.last, doc_count)?;
        while self.ends.len() < doc_count as usize {
            self.ends.push(self.total);
        }
        self.stream.write_u32::<LittleEndian>(0)?;
        for &end in &self.ends {
            self.stream.write_u32::<LittleEndian>(end)?;
        }
        self.stream.flush()?;
        Ok(self.total as u64 + (doc_count as u64 + 1) * 4)
    }
}

pub struct VarBytesReader<'a> {
    blob:      &'a [u8],
    offsets:   &'a [u8],
    doc_count: DocId,
}

impl<'a> VarBytesReader<'a> {
    fn end(&self, i: usize) -> u32 {
        let b = &self.offsets[i * 4..i * 4 + 4];
        u32::from_le_bytes([b[0], b[1], b[2], b[3]])
    }
}

impl ColumnReader for VarBytesReader<'_> {
    type Value = Vec<u8>;

    fn doc_count(&self) -> DocId {
        self.doc_count
    }

    fn get(&self, docnum: DocId) -> Result<Vec<u8>> {
        column::check_lookup(docnum, self.doc_count)?;
        let start = self.end(docnum as usize) as usize;
        let end = self.end(docnum as usize + 1) as usize;
        if start > end || end > self.blob.len() {
            return Err(ColumnError::Corrupt(format!(
                "var column entry {docnum}: bad range {start}..{end} (blob {} bytes)",
                self.blob.len()
            )));
        }
        Ok(self.blob[start..end].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn var_gaps_are_empty() {
        let col = VarBytesColumn::new();
        let mut buf = Vec::new();
        let mut w = col.writer(&mut buf);
        w.add(1, b"alfa".to_vec()).unwrap();
        w.add(4, b"bravo".to_vec()).unwrap();
        let len = w.finish(7).unwrap();
        assert_eq!(len as usize, buf.len());

        let r = col.reader(&buf, 0, buf.len(), 7, true).unwrap();
        assert_eq!(r.get(0).unwrap(), b"");
        assert_eq!(r.get(1).unwrap(), b"alfa");
        assert_eq!(r.get(2).unwrap(), b"");
        assert_eq!(r.get(4).unwrap(), b"bravo");
        assert_eq!(r.get(6).unwrap(), b"");
        assert!(r.get(7).is_err());
    }

    #[test]
    fn fixed_rejects_wrong_width() {
        let col = FixedBytesColumn::new(3);
        let mut buf = Vec::new();
        let mut w = col.writer(&mut buf);
        assert!(w.add(0, b"toolong".to_vec()).is_err());
        w.add(0, b"abc".to_vec()).unwrap();
        w.finish(2).unwrap();

        let r = col.reader(&buf, 0, buf.len(), 2, true).unwrap();
        assert_eq!(r.get(0).unwrap(), b"abc");
        assert_eq!(r.get(1).unwrap(), vec![0u8; 3]);
    }

    #[test]
    fn fixed_tail_slots_are_implicit() {
        let col = FixedBytesColumn::new(2);
        let mut buf = Vec::new();
        let mut w = col.writer(&mut buf);
        w.add(0, b"ab".to_vec()).unwrap();
        let len = w.finish(100).unwrap();
        assert_eq!(len, 2);
        let r = col.reader(&buf, 0, 2, 100, true).unwrap();
        assert_eq!(r.get(99).unwrap(), vec![0u8; 2]);
    }
}

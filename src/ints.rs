//! 紧凑/稀疏整数列：同一逻辑映射的两种密度取舍
//!
//! CompactIntColumn 布局（frame-of-reference，finish 时一次扫描定宽）：
//! ```text
//! ┌──────────────────────────────┐
//! │ base      (i64 LE)           │ ← 观测到的最小值
//! │ width     (u8) ∈ {0,1,2,4,8} │ ← 表示 max-base 所需的最小字节宽
//! │ slot × doc_count             │ ← (value - base)，每文档一槽含间隙
//! └──────────────────────────────┘
//! ```
//! width 为 0 时所有文档同值，槽区省略。
//!
//! SparseIntColumn 布局（只存实际写入的对）：
//! ```text
//! ┌──────────────────────────────┐
//! │ count     (u32 LE)           │
//! │ docnum × count (u32 LE，有序)│ ← 二分查找
//! │ value  × count (i64 LE)      │
//! └──────────────────────────────┘
//! ```
//! 两种编码读兼容：同一 (docnum → value) 映射与 doc_count 下，
//! 寻址与迭代结果必须一致。

use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};
use serde::{Deserialize, Serialize};

use crate::column::{self, Column, ColumnReader, ColumnWriter};
use crate::common::{ColumnError, DocId, Result};

// ── CompactIntColumn ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CompactIntColumn {
    default: i64,
}

impl CompactIntColumn {
    pub fn new() -> Self {
        Self { default: 0 }
    }

    pub fn with_default(default: i64) -> Self {
        Self { default }
    }
}

/// 表示 span 所需的最小槽宽
fn slot_width(span: u128) -> u8 {
    if span == 0 {
        0
    } else if span <= 0xFF {
        1
    } else if span <= 0xFFFF {
        2
    } else if span <= 0xFFFF_FFFF {
        4
    } else {
        8
    }
}

impl Column for CompactIntColumn {
    type Value = i64;
    type Writer<W: Write> = CompactIntWriter<W>;
    type Reader<'a> = CompactIntReader<'a> where Self: 'a;

    fn default_value(&self) -> i64 {
        self.default
    }

    fn writer<W: Write>(&self, stream: W) -> CompactIntWriter<W> {
        CompactIntWriter {
            stream,
            default: self.default,
            docnums: Vec::new(),
            values: Vec::new(),
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
    ) -> Result<CompactIntReader<'a>> {
        let data = column::range(map, offset, length)?;
        let base = column::read_i64(data, 0)?;
        let width = *column::slice(data, 8, 1)?.first().ok_or_else(|| {
            ColumnError::Corrupt("compact column missing width byte".into())
        })?;
        if !matches!(width, 0 | 1 | 2 | 4 | 8) {
            return Err(ColumnError::Corrupt(format!("bad compact slot width {width}")));
        }
        let slots = &data[9..];
        if slots.len() < doc_count as usize * width as usize {
            return Err(ColumnError::Corrupt(format!(
                "compact column truncated: {} slot bytes for {doc_count} docs × width {width}",
                slots.len()
            )));
        }
        Ok(CompactIntReader {
            slots,
            base,
            width: width as usize,
            doc_count,
        })
    }
}

pub struct CompactIntWriter<W: Write> {
    stream:  W,
    default: i64,
    docnums: Vec<DocId>,
    values:  Vec<i64>,
    last:    Option<DocId>,
}

impl<W: Write> ColumnWriter for CompactIntWriter<W> {
    type Value = i64;

    fn add(&mut self, docnum: DocId, value: i64) -> Result<()> {
        column::advance(&mut self.last, docnum)?;
        self.docnums.push(docnum);
        self.values.push(value);
        Ok(())
    }

    fn finish(mut self, doc_count: DocId) -> Result<u64> {
        column::check_doc_count(self.last, doc_count)?;

        let (mut min, mut max) = match self.values.first() {
            Some(&v) => (v, v),
            None => (self.default, self.default),
        };
        for &v in &self.values {
            min = min.min(v);
            max = max.max(v);
        }
        // 有间隙时 default 占槽，必须可表示
        if self.values.len() < doc_count as usize {
            min = min.min(self.default);
            max = max.max(self.default);
        }

        let span = (max as i128 - min as i128) as u128;
        let width = slot_width(span);

        self.stream.write_i64::<LittleEndian>(min)?;
        self.stream.write_u8(width)?;

        if width > 0 {
            let mut pi = 0usize;
            for dn in 0..doc_count {
                let v = if pi < self.docnums.len() && self.docnums[pi] == dn {
                    let v = self.values[pi];
                    pi += 1;
                    v
                } else {
                    self.default
                };
                let delta = (v as i128 - min as i128) as u64;
                match width {
                    1 => self.stream.write_u8(delta as u8)?,
                    2 => self.stream.write_u16::<LittleEndian>(delta as u16)?,
                    4 => self.stream.write_u32::<LittleEndian>(delta as u32)?,
                    _ => self.stream.write_u64::<LittleEndian>(delta)?,
                }
            }
        }

        self.stream.flush()?;
        Ok(9 + doc_count as u64 * width as u64)
    }
}

pub struct CompactIntReader<'a> {
    slots:     &'a [u8],
    base:      i64,
    width:     usize,
    doc_count: DocId,
}

impl ColumnReader for CompactIntReader<'_> {
    type Value = i64;

    fn doc_count(&self) -> DocId {
        self.doc_count
    }

    fn get(&self, docnum: DocId) -> Result<i64> {
        column::check_lookup(docnum, self.doc_count)?;
        if self.width == 0 {
            return Ok(self.base);
        }
        let pos = docnum as usize * self.width;
        let b = &self.slots[pos..pos + self.width];
        let delta = match self.width {
            1 => b[0] as u64,
            2 => u16::from_le_bytes([b[0], b[1]]) as u64,
            4 => u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as u64,
            _ => u64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]),
        };
        Ok(self.base.wrapping_add(delta as i64))
    }
}

// ── SparseIntColumn ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SparseIntColumn {
    default: i64,
}

impl SparseIntColumn {
    pub fn new() -> Self {
        Self { default: 0 }
    }

    pub fn with_default(default: i64) -> Self {
        Self { default }
    }
}

impl Column for SparseIntColumn {
    type Value = i64;
    type Writer<W: Write> = SparseIntWriter<W>;
    type Reader<'a> = SparseIntReader<'a> where Self: 'a;

    fn default_value(&self) -> i64 {
        self.default
    }

    fn writer<W: Write>(&self, stream: W) -> SparseIntWriter<W> {
        SparseIntWriter {
            stream,
            docnums: Vec::new(),
            values: Vec::new(),
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
    ) -> Result<SparseIntReader<'a>> {
        let data = column::range(map, offset, length)?;
        let count = column::read_u32(data, 0)? as usize;
        let need = 4 + count * 12;
        if data.len() < need {
            return Err(ColumnError::Corrupt(format!(
                "sparse column truncated: {} bytes, {count} entries need {need}",
                data.len()
            )));
        }
        Ok(SparseIntReader {
            docnums:   &data[4..4 + count * 4],
            values:    &data[4 + count * 4..need],
            count,
            default:   self.default,
            doc_count,
        })
    }
}

pub struct SparseIntWriter<W: Write> {
    stream:  W,
    docnums: Vec<DocId>,
    values:  Vec<i64>,
    last:    Option<DocId>,
}

impl<W: Write> ColumnWriter for SparseIntWriter<W> {
    type Value = i64;

    fn add(&mut self, docnum: DocId, value: i64) -> Result<()> {
        column::advance(&mut self.last, docnum)?;
        self.docnums.push(docnum);
        self.values.push(value);
        Ok(())
    }

    fn finish(mut self, doc_count: DocId) -> Result<u64> {
        column::check_doc_count(self.last, doc_count)?;
        self.stream.write_u32::<LittleEndian>(self.docnums.len() as u32)?;
        for &dn in &self.docnums {
            self.stream.write_u32::<LittleEndian>(dn)?;
        }
        for &v in &self.values {
            self.stream.write_i64::<LittleEndian>(v)?;
        }
        self.stream.flush()?;
        Ok(4 + self.docnums.len() as u64 * 12)
    }
}

pub struct SparseIntReader<'a> {
    docnums:   &'a [u8],
    values:    &'a [u8],
    count:     usize,
    default:   i64,
    doc_count: DocId,
}

impl SparseIntReader<'_> {
    fn docnum_at(&self, i: usize) -> DocId {
        let b = &self.docnums[i * 4..i * 4 + 4];
        u32::from_le_bytes([b[0], b[1], b[2], b[3]])
    }

    fn value_at(&self, i: usize) -> i64 {
        let b = &self.values[i * 8..i * 8 + 8];
        i64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
    }
}

impl ColumnReader for SparseIntReader<'_> {
    type Value = i64;

    fn doc_count(&self) -> DocId {
        self.doc_count
    }

    fn get(&self, docnum: DocId) -> Result<i64> {
        column::check_lookup(docnum, self.doc_count)?;
        let mut lo = 0usize;
        let mut hi = self.count;
        while lo < hi {
            let mid = (lo + hi) / 2;
            if self.docnum_at(mid) < docnum {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        if lo < self.count && self.docnum_at(lo) == docnum {
            Ok(self.value_at(lo))
        } else {
            Ok(self.default)
        }
    }

    /// 稀疏表与隐式默认值的归并遍历，免去逐文档二分
    fn iter(&self) -> Box<dyn Iterator<Item = Result<i64>> + '_> {
        let mut idx = 0usize;
        Box::new((0..self.doc_count).map(move |dn| {
            if idx < self.count && self.docnum_at(idx) == dn {
                let v = self.value_at(idx);
                idx += 1;
                Ok(v)
            } else {
                Ok(self.default)
            }
        }))
    }
}

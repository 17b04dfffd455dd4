//! 字典引用字节列
//!
//! 写入时增量去重：unique 值 → 小整数引用，每文档只存定宽引用。
//! 引用宽度随字典增长 1 → 2 字节，字典上限 65536 个条目（u16 引用
//! 空间全量，槽 0 恒为默认值）。
//!
//! 布局：
//! ```text
//! ┌──────────────────────────────────┐
//! │ ref_width  (u8) ∈ {1, 2}         │
//! │ ref × doc_count（定宽 LE）        │ ← 槽 0 = 默认值
//! │ unique_count (u32 LE)            │
//! │ uniques：变宽 = (len u32 + bytes)│   定宽 = width 字节原样
//! └──────────────────────────────────┘
//! ```
//!
//! **溢出策略**：字典满后，值已在字典中的文档照常编码；新 unique 值
//! 不再入典，文档降级存引用 0（默认值），首次降级与 finish 时各发一条
//! [`ColumnEvents`] 诊断。这是有意的有损降级，不是错误 —— 已有映射
//! 始终正确。

use std::cell::RefCell;
use std::io::Write;
use std::sync::Arc;

use byteorder::{LittleEndian, WriteBytesExt};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::column::{self, Column, ColumnReader, ColumnWriter};
use crate::common::{ColumnError, ColumnEvents, DocId, LogEvents, Result};

/// u16 引用空间全量（含默认槽 0）
pub const MAX_DICT_ENTRIES: usize = 65536;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RefBytesColumn {
    fixed_width: Option<u32>,
}

impl RefBytesColumn {
    /// 变宽 unique 值，默认空串
    pub fn new() -> Self {
        Self { fixed_width: None }
    }

    /// 定宽 unique 值，默认全零
    pub fn fixed(width: u32) -> Self {
        Self { fixed_width: Some(width) }
    }
}

impl Column for RefBytesColumn {
    type Value = Vec<u8>;
    type Writer<W: Write> = RefBytesWriter<W>;
    type Reader<'a> = RefBytesReader<'a> where Self: 'a;

    fn default_value(&self) -> Vec<u8> {
        match self.fixed_width {
            Some(w) => vec![0u8; w as usize],
            None => Vec::new(),
        }
    }

    fn writer<W: Write>(&self, stream: W) -> RefBytesWriter<W> {
        let default = self.default_value();
        let mut dict = FxHashMap::default();
        dict.insert(default.clone(), 0u16);
        RefBytesWriter {
            stream,
            fixed_width: self.fixed_width.map(|w| w as usize),
            dict,
            uniques: vec![default],
            refs: Vec::new(),
            last: None,
            dropped: 0,
            events: Arc::new(LogEvents),
        }
    }

    fn reader<'a>(
        &'a self,
        map:       &'a [u8],
        offset:    usize,
        length:    usize,
        doc_count: DocId,
        _native:   bool,
    ) -> Result<RefBytesReader<'a>> {
        let data = column::range(map, offset, length)?;
        let ref_width = *column::slice(data, 0, 1)?.first().ok_or_else(|| {
            ColumnError::Corrupt("ref column missing width byte".into())
        })?;
        if !matches!(ref_width, 1 | 2) {
            return Err(ColumnError::Corrupt(format!("bad ref width {ref_width}")));
        }
        let refs_len = doc_count as usize * ref_width as usize;
        let refs = column::slice(data, 1, refs_len)?;
        Ok(RefBytesReader {
            data,
            refs,
            ref_width: ref_width as usize,
            fixed_width: self.fixed_width.map(|w| w as usize),
            dict_at: 1 + refs_len,
            doc_count,
            uniques: RefCell::new(None),
        })
    }
}

// ── Writer ────────────────────────────────────────────────────────────────────

pub struct RefBytesWriter<W: Write> {
    stream:      W,
    fixed_width: Option<usize>,
    dict:        FxHashMap<Vec<u8>, u16>,
    /// 槽 0 = 默认值，之后按首现序
    uniques:     Vec<Vec<u8>>,
    refs:        Vec<u16>,
    last:        Option<DocId>,
    dropped:     u64,
    events:      Arc<dyn ColumnEvents>,
}

impl<W: Write> RefBytesWriter<W> {
    /// 替换诊断事件汇（默认 tracing）
    pub fn with_events(mut self, events: Arc<dyn ColumnEvents>) -> Self {
        self.events = events;
        self
    }
}

impl<W: Write> ColumnWriter for RefBytesWriter<W> {
    type Value = Vec<u8>;

    fn add(&mut self, docnum: DocId, value: Vec<u8>) -> Result<()> {
        // 先验域再记序，失败的 add 不占用 docnum
        if let Some(w) = self.fixed_width {
            if value.len() != w {
                return Err(ColumnError::Type(format!(
                    "ref column expects {w} bytes, got {}",
                    value.len()
                )));
            }
        }
        column::advance(&mut self.last, docnum)?;
        while self.refs.len() < docnum as usize {
            self.refs.push(0);
        }
        let r = match self.dict.get(&value) {
            Some(&r) => r,
            None if self.uniques.len() < MAX_DICT_ENTRIES => {
                let r = self.uniques.len() as u16;
                self.dict.insert(value.clone(), r);
                self.uniques.push(value);
                r
            }
            None => {
                if self.dropped == 0 {
                    self.events.dict_overflow(docnum, self.uniques.len());
                }
                self.dropped += 1;
                0
            }
        };
        self.refs.push(r);
        Ok(())
    }

    fn finish(mut self, doc_count: DocId) -> Result<u64> {
        column::check_doc_count(self.last, doc_count)?;
        while self.refs.len() < doc_count as usize {
            self.refs.push(0);
        }
        if self.dropped > 0 {
            self.events.dict_overflow_summary(self.dropped, self.uniques.len());
        }

        let ref_width: u8 = if self.uniques.len() <= 256 { 1 } else { 2 };
        self.stream.write_u8(ref_width)?;
        for &r in &self.refs {
            match ref_width {
                1 => self.stream.write_u8(r as u8)?,
                _ => self.stream.write_u16::<LittleEndian>(r)?,
            }
        }

        self.stream.write_u32::<LittleEndian>(self.uniques.len() as u32)?;
        let mut dict_bytes = 0u64;
        match self.fixed_width {
            Some(_) => {
                for u in &self.uniques {
                    self.stream.write_all(u)?;
                    dict_bytes += u.len() as u64;
                }
            }
            None => {
                for u in &self.uniques {
                    self.stream.write_u32::<LittleEndian>(u.len() as u32)?;
                    self.stream.write_all(u)?;
                    dict_bytes += 4 + u.len() as u64;
                }
            }
        }

        self.stream.flush()?;
        Ok(1 + self.refs.len() as u64 * ref_width as u64 + 4 + dict_bytes)
    }
}

// ── Reader ────────────────────────────────────────────────────────────────────

pub struct RefBytesReader<'a> {
    data:        &'a [u8],
    refs:        &'a [u8],
    ref_width:   usize,
    fixed_width: Option<usize>,
    dict_at:     usize,
    doc_count:   DocId,
    /// 惰性解码的字典表（close 释放，再访问时重建）
    uniques:     RefCell<Option<Vec<Vec<u8>>>>,
}

impl RefBytesReader<'_> {
    fn decode_dict(&self) -> Result<Vec<Vec<u8>>> {
        let count = column::read_u32(self.data, self.dict_at)? as usize;
        if count > MAX_DICT_ENTRIES {
            return Err(ColumnError::Corrupt(format!("dictionary count {count} exceeds cap")));
        }
        let mut pos = self.dict_at + 4;
        let mut uniques = Vec::with_capacity(count);
        match self.fixed_width {
            Some(w) => {
                for _ in 0..count {
                    uniques.push(column::slice(self.data, pos, w)?.to_vec());
                    pos += w;
                }
            }
            None => {
                for _ in 0..count {
                    let len = column::read_u32(self.data, pos)? as usize;
                    uniques.push(column::slice(self.data, pos + 4, len)?.to_vec());
                    pos += 4 + len;
                }
            }
        }
        Ok(uniques)
    }

    fn ref_at(&self, docnum: DocId) -> usize {
        let pos = docnum as usize * self.ref_width;
        match self.ref_width {
            1 => self.refs[pos] as usize,
            _ => u16::from_le_bytes([self.refs[pos], self.refs[pos + 1]]) as usize,
        }
    }
}

impl ColumnReader for RefBytesReader<'_> {
    type Value = Vec<u8>;

    fn doc_count(&self) -> DocId {
        self.doc_count
    }

    fn get(&self, docnum: DocId) -> Result<Vec<u8>> {
        column::check_lookup(docnum, self.doc_count)?;
        let r = self.ref_at(docnum);
        let mut cache = self.uniques.borrow_mut();
        if cache.is_none() {
            *cache = Some(self.decode_dict()?);
        }
        let uniques = cache.get_or_insert_with(Vec::new);
        uniques.get(r).cloned().ok_or_else(|| {
            ColumnError::Corrupt(format!("ref {r} beyond dictionary ({} entries)", uniques.len()))
        })
    }

    fn close(&self) {
        *self.uniques.borrow_mut() = None;
    }
}

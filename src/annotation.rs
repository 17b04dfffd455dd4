//! 区间标注列：每文档一个有序的 (label, start, end) 列表
//!
//! 标签在整个写会话内按首现序驻留到标签表；span 记录按文档分组，
//! 文档目录存 (docnum, 累计 span 末序号)，二分定位。
//!
//! 布局：
//! ```text
//! ┌──────────────────────────────────────┐
//! │ span_count (u32 LE)                  │
//! │ span × n：label_id(u32) start(u32)   │
//! │            end(u32)                  │
//! │ dir_count  (u32 LE)                  │
//! │ dir × m：docnum(u32) span_end(u32)   │ ← 累计末序号，按 docnum 有序
//! │ label_count (u32 LE)                 │
//! │ label × k：len(u16) + utf-8 bytes    │ ← 首现序
//! └──────────────────────────────────────┘
//! ```
//!
//! 未写入的文档读回空列表；**越界 docnum 同样读回空列表而不是报错**，
//! 这是本列对 get 契约的唯一例外。

use std::cell::RefCell;
use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::column::{self, Column, ColumnReader, ColumnWriter};
use crate::common::{ColumnError, DocId, Result};

/// 一条标注：带标签的半开区间偏移
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub name:  String,
    pub start: u32,
    pub end:   u32,
}

impl Annotation {
    pub fn new(name: &str, start: u32, end: u32) -> Self {
        Self { name: name.to_string(), start, end }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AnnotationColumn;

impl AnnotationColumn {
    pub fn new() -> Self {
        Self
    }
}

impl Column for AnnotationColumn {
    type Value = Vec<Annotation>;
    type Writer<W: Write> = AnnotationWriter<W>;
    type Reader<'a> = AnnotationReader<'a> where Self: 'a;

    fn default_value(&self) -> Vec<Annotation> {
        Vec::new()
    }

    fn writer<W: Write>(&self, stream: W) -> AnnotationWriter<W> {
        AnnotationWriter {
            stream,
            labels: FxHashMap::default(),
            names: Vec::new(),
            spans: Vec::new(),
            dir: Vec::new(),
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
    ) -> Result<AnnotationReader<'a>> {
        let data = column::range(map, offset, length)?;
        let span_count = column::read_u32(data, 0)? as usize;
        let dir_at = 4 + span_count * 12;
        let dir_count = column::read_u32(data, dir_at)? as usize;
        let labels_at = dir_at + 4 + dir_count * 8;
        // 标签区完整性由惰性解码时校验，这里只确认三段都落在区间内
        column::slice(data, labels_at, 4)?;
        Ok(AnnotationReader {
            spans:      &data[4..dir_at],
            dir:        &data[dir_at + 4..labels_at],
            data,
            labels_at,
            span_count,
            dir_count,
            doc_count,
            labels:     RefCell::new(None),
        })
    }
}

// ── Writer ────────────────────────────────────────────────────────────────────

pub struct AnnotationWriter<W: Write> {
    stream: W,
    labels: FxHashMap<String, u32>,
    /// 首现序标签表
    names:  Vec<String>,
    spans:  Vec<(u32, u32, u32)>,
    dir:    Vec<(DocId, u32)>,
    last:   Option<DocId>,
}

impl<W: Write> ColumnWriter for AnnotationWriter<W> {
    type Value = Vec<Annotation>;

    fn add(&mut self, docnum: DocId, value: Vec<Annotation>) -> Result<()> {
        for a in &value {
            if a.start > a.end {
                return Err(ColumnError::Type(format!(
                    "annotation {:?}: start {} > end {}",
                    a.name, a.start, a.end
                )));
            }
            if a.name.len() > u16::MAX as usize {
                return Err(ColumnError::Type(format!("label too long ({} bytes)", a.name.len())));
            }
        }
        column::advance(&mut self.last, docnum)?;
        for a in value {
            let id = match self.labels.get(&a.name) {
                Some(&id) => id,
                None => {
                    let id = self.names.len() as u32;
                    self.labels.insert(a.name.clone(), id);
                    self.names.push(a.name);
                    id
                }
            };
            self.spans.push((id, a.start, a.end));
        }
        self.dir.push((docnum, self.spans.len() as u32));
        Ok(())
    }

    fn finish(mut self, doc_count: DocId) -> Result<u64> {
        column::check_doc_count(self.last, doc_count)?;

        self.stream.write_u32::<LittleEndian>(self.spans.len() as u32)?;
        for &(id, start, end) in &self.spans {
            self.stream.write_u32::<LittleEndian>(id)?;
            self.stream.write_u32::<LittleEndian>(start)?;
            self.stream.write_u32::<LittleEndian>(end)?;
        }

        self.stream.write_u32::<LittleEndian>(self.dir.len() as u32)?;
        for &(dn, end) in &self.dir {
            self.stream.write_u32::<LittleEndian>(dn)?;
            self.stream.write_u32::<LittleEndian>(end)?;
        }

        self.stream.write_u32::<LittleEndian>(self.names.len() as u32)?;
        let mut label_bytes = 0u64;
        for name in &self.names {
            self.stream.write_u16::<LittleEndian>(name.len() as u16)?;
            self.stream.write_all(name.as_bytes())?;
            label_bytes += 2 + name.len() as u64;
        }

        self.stream.flush()?;
        Ok(4 + self.spans.len() as u64 * 12
            + 4 + self.dir.len() as u64 * 8
            + 4 + label_bytes)
    }
}

// ── Reader ────────────────────────────────────────────────────────────────────

pub struct AnnotationReader<'a> {
    data:       &'a [u8],
    spans:      &'a [u8],
    dir:        &'a [u8],
    labels_at:  usize,
    span_count: usize,
    dir_count:  usize,
    doc_count:  DocId,
    labels:     RefCell<Option<Vec<String>>>,
}

impl AnnotationReader<'_> {
    fn dir_docnum(&self, i: usize) -> DocId {
        let b = &self.dir[i * 8..i * 8 + 4];
        u32::from_le_bytes([b[0], b[1], b[2], b[3]])
    }

    fn dir_end(&self, i: usize) -> usize {
        let b = &self.dir[i * 8 + 4..i * 8 + 8];
        u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as usize
    }

    fn span_at(&self, i: usize) -> (u32, u32, u32) {
        let b = &self.spans[i * 12..i * 12 + 12];
        (
            u32::from_le_bytes([b[0], b[1], b[2], b[3]]),
            u32::from_le_bytes([b[4], b[5], b[6], b[7]]),
            u32::from_le_bytes([b[8], b[9], b[10], b[11]]),
        )
    }

    fn decode_labels(&self) -> Result<Vec<String>> {
        let count = column::read_u32(self.data, self.labels_at)? as usize;
        let mut pos = self.labels_at + 4;
        let mut names = Vec::with_capacity(count);
        for _ in 0..count {
            let len = column::read_u16(self.data, pos)? as usize;
            let raw = column::slice(self.data, pos + 2, len)?;
            let name = std::str::from_utf8(raw)
                .map_err(|e| ColumnError::Corrupt(format!("label not utf-8: {e}")))?;
            names.push(name.to_string());
            pos += 2 + len;
        }
        Ok(names)
    }

    fn with_labels<T>(&self, f: impl FnOnce(&[String]) -> Result<T>) -> Result<T> {
        let mut cache = self.labels.borrow_mut();
        if cache.is_none() {
            *cache = Some(self.decode_labels()?);
        }
        f(cache.get_or_insert_with(Vec::new))
    }

    /// 本会话写入的全部标签，首现序
    pub fn names(&self) -> Result<Vec<String>> {
        self.with_labels(|labels| Ok(labels.to_vec()))
    }
}

impl ColumnReader for AnnotationReader<'_> {
    type Value = Vec<Annotation>;

    fn doc_count(&self) -> DocId {
        self.doc_count
    }

    /// 未写入与越界的 docnum 都返回空列表（见模块文档）
    fn get(&self, docnum: DocId) -> Result<Vec<Annotation>> {
        let mut lo = 0usize;
        let mut hi = self.dir_count;
        while lo < hi {
            let mid = (lo + hi) / 2;
            if self.dir_docnum(mid) < docnum {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        if lo >= self.dir_count || self.dir_docnum(lo) != docnum {
            return Ok(Vec::new());
        }

        let first = if lo == 0 { 0 } else { self.dir_end(lo - 1) };
        let last = self.dir_end(lo);
        if last > self.span_count || first > last {
            return Err(ColumnError::Corrupt(format!(
                "annotation directory entry {lo}: bad span range {first}..{last}"
            )));
        }
        self.with_labels(|labels| {
            let mut out = Vec::with_capacity(last - first);
            for i in first..last {
                let (id, start, end) = self.span_at(i);
                let name = labels.get(id as usize).ok_or_else(|| {
                    ColumnError::Corrupt(format!("label id {id} beyond table ({})", labels.len()))
                })?;
                out.push(Annotation { name: name.clone(), start, end });
            }
            Ok(out)
        })
    }

    fn close(&self) {
        *self.labels.borrow_mut() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_keep_first_occurrence_order() {
        let col = AnnotationColumn::new();
        let mut buf = Vec::new();
        let mut w = col.writer(&mut buf);
        w.add(0, vec![Annotation::new("foo", 0, 2), Annotation::new("bar", 10, 20)])
            .unwrap();
        w.add(3, vec![Annotation::new("bar", 1, 2), Annotation::new("baz", 5, 9)])
            .unwrap();
        let len = w.finish(10).unwrap();

        let r = col.reader(&buf, 0, len as usize, 10, true).unwrap();
        assert_eq!(r.names().unwrap(), ["foo", "bar", "baz"]);
    }

    #[test]
    fn missing_and_out_of_range_docs_read_empty() {
        let col = AnnotationColumn::new();
        let mut buf = Vec::new();
        let mut w = col.writer(&mut buf);
        w.add(2, vec![Annotation::new("person", 15, 20)]).unwrap();
        let len = w.finish(5).unwrap();

        let r = col.reader(&buf, 0, len as usize, 5, true).unwrap();
        assert_eq!(r.get(2).unwrap(), vec![Annotation::new("person", 15, 20)]);
        assert!(r.get(0).unwrap().is_empty());
        // 越界不报错，读回空列表
        assert!(r.get(25).unwrap().is_empty());
    }

    #[test]
    fn inverted_span_is_a_type_error() {
        let col = AnnotationColumn::new();
        let mut buf = Vec::new();
        let mut w = col.writer(&mut buf);
        assert!(w.add(0, vec![Annotation::new("x", 9, 3)]).is_err());
    }
}

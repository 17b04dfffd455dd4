//! 路径列：前缀共享的分层字节串压缩
//!
//! 面向斜杠分隔、与邻居共享长公共前缀的值（文件路径等）。每个写入的
//! 文档只存「与上一条的共享前缀长 + 后缀字节」，每 16 条强制一个
//! restart 点（前缀长 0），限定最坏情况下的重建代价。
//!
//! 布局：
//! ```text
//! ┌──────────────────────────────────────┐
//! │ entry_count     (u32 LE)             │
//! │ entry_region_len(u32 LE)             │
//! │ entry × n：prefix(u16) suffix_len(u32)│
//! │             + suffix bytes           │
//! │ entry_offset × n (u32 LE)            │ ← 条目区内偏移
//! │ docnum × n       (u32 LE，有序)       │ ← 二分查找
//! └──────────────────────────────────────┘
//! ```
//!
//! 读写契约与变宽字节列完全互换：相同输入下寻址与迭代逐字节一致，
//! 路径形数据的体积通常小得多。

use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};
use serde::{Deserialize, Serialize};

use crate::column::{self, Column, ColumnReader, ColumnWriter};
use crate::common::{ColumnError, DocId, Result};

/// restart 点间隔（按写入条目计）
pub const RESTART_INTERVAL: usize = 16;

fn common_prefix(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PathColumn;

impl PathColumn {
    pub fn new() -> Self {
        Self
    }
}

impl Column for PathColumn {
    type Value = Vec<u8>;
    type Writer<W: Write> = PathWriter<W>;
    type Reader<'a> = PathReader<'a> where Self: 'a;

    fn default_value(&self) -> Vec<u8> {
        Vec::new()
    }

    fn writer<W: Write>(&self, stream: W) -> PathWriter<W> {
        PathWriter {
            stream,
            entries: Vec::new(),
            offsets: Vec::new(),
            docnums: Vec::new(),
            prev: Vec::new(),
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
    ) -> Result<PathReader<'a>> {
        let data = column::range(map, offset, length)?;
        let count = column::read_u32(data, 0)? as usize;
        let region_len = column::read_u32(data, 4)? as usize;
        let entries = column::slice(data, 8, region_len)?;
        let offsets = column::slice(data, 8 + region_len, count * 4)?;
        let docnums = column::slice(data, 8 + region_len + count * 4, count * 4)?;
        Ok(PathReader {
            entries,
            offsets,
            docnums,
            count,
            doc_count,
        })
    }
}

// ── Writer ────────────────────────────────────────────────────────────────────

pub struct PathWriter<W: Write> {
    stream:  W,
    entries: Vec<u8>,
    offsets: Vec<u32>,
    docnums: Vec<DocId>,
    prev:    Vec<u8>,
    last:    Option<DocId>,
}

impl<W: Write> ColumnWriter for PathWriter<W> {
    type Value = Vec<u8>;

    fn add(&mut self, docnum: DocId, value: Vec<u8>) -> Result<()> {
        if value.len() > u32::MAX as usize {
            return Err(ColumnError::Type(format!(
                "value too large for path column ({} bytes)",
                value.len()
            )));
        }
        column::advance(&mut self.last, docnum)?;

        let prefix = if self.docnums.len() % RESTART_INTERVAL == 0 {
            0
        } else {
            common_prefix(&self.prev, &value).min(u16::MAX as usize)
        };
        self.offsets.push(self.entries.len() as u32);
        self.entries.write_u16::<LittleEndian>(prefix as u16)?;
        self.entries
            .write_u32::<LittleEndian>((value.len() - prefix) as u32)?;
        self.entries.extend_from_slice(&value[prefix..]);
        self.docnums.push(docnum);
        self.prev = value;
        Ok(())
    }

    fn finish(mut self, doc_count: DocId) -> Result<u64> {
        column::check_doc_count(self.last, doc_count)?;
        self.stream.write_u32::<LittleEndian>(self.docnums.len() as u32)?;
        self.stream.write_u32::<LittleEndian>(self.entries.len() as u32)?;
        self.stream.write_all(&self.entries)?;
        for &off in &self.offsets {
            self.stream.write_u32::<LittleEndian>(off)?;
        }
        for &dn in &self.docnums {
            self.stream.write_u32::<LittleEndian>(dn)?;
        }
        self.stream.flush()?;
        Ok(8 + self.entries.len() as u64 + self.docnums.len() as u64 * 8)
    }
}

// ── Reader ────────────────────────────────────────────────────────────────────

pub struct PathReader<'a> {
    entries:   &'a [u8],
    offsets:   &'a [u8],
    docnums:   &'a [u8],
    count:     usize,
    doc_count: DocId,
}

impl<'a> PathReader<'a> {
    fn docnum_at(&self, i: usize) -> DocId {
        let b = &self.docnums[i * 4..i * 4 + 4];
        u32::from_le_bytes([b[0], b[1], b[2], b[3]])
    }

    fn offset_at(&self, i: usize) -> usize {
        let b = &self.offsets[i * 4..i * 4 + 4];
        u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as usize
    }

    fn entry_at(&self, i: usize) -> Result<(usize, &'a [u8])> {
        let at = self.offset_at(i);
        let prefix = column::read_u16(self.entries, at)? as usize;
        let suffix_len = column::read_u32(self.entries, at + 2)? as usize;
        let suffix = column::slice(self.entries, at + 6, suffix_len)?;
        Ok((prefix, suffix))
    }

    /// 从最近的 restart 点向前重建第 i 条的完整值
    fn value_at(&self, i: usize) -> Result<Vec<u8>> {
        let restart = i - (i % RESTART_INTERVAL);
        let (prefix, suffix) = self.entry_at(restart)?;
        if prefix != 0 {
            return Err(ColumnError::Corrupt(format!(
                "restart entry {restart} carries prefix {prefix}"
            )));
        }
        let mut value = suffix.to_vec();
        for j in restart + 1..=i {
            let (prefix, suffix) = self.entry_at(j)?;
            if prefix > value.len() {
                return Err(ColumnError::Corrupt(format!(
                    "entry {j}: shared prefix {prefix} longer than previous value"
                )));
            }
            value.truncate(prefix);
            value.extend_from_slice(suffix);
        }
        Ok(value)
    }
}

impl ColumnReader for PathReader<'_> {
    type Value = Vec<u8>;

    fn doc_count(&self) -> DocId {
        self.doc_count
    }

    fn get(&self, docnum: DocId) -> Result<Vec<u8>> {
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
            self.value_at(lo)
        } else {
            Ok(Vec::new())
        }
    }

    /// 镜像写入过程的增量重建，免去逐文档的 restart 回溯
    fn iter(&self) -> Box<dyn Iterator<Item = Result<Vec<u8>>> + '_> {
        Box::new(PathIter {
            reader: self,
            current: Vec::new(),
            idx: 0,
            next_doc: 0,
            done: false,
        })
    }
}

struct PathIter<'r, 'a> {
    reader:   &'r PathReader<'a>,
    current:  Vec<u8>,
    idx:      usize,
    next_doc: DocId,
    done:     bool,
}

impl Iterator for PathIter<'_, '_> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Result<Vec<u8>>> {
        if self.done || self.next_doc >= self.reader.doc_count {
            return None;
        }
        let dn = self.next_doc;
        self.next_doc += 1;

        if self.idx < self.reader.count && self.reader.docnum_at(self.idx) == dn {
            let (prefix, suffix) = match self.reader.entry_at(self.idx) {
                Ok(e) => e,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };
            if prefix > self.current.len() {
                self.done = true;
                return Some(Err(ColumnError::Corrupt(format!(
                    "entry {}: shared prefix {prefix} longer than previous value",
                    self.idx
                ))));
            }
            self.current.truncate(prefix);
            self.current.extend_from_slice(suffix);
            self.idx += 1;
            Some(Ok(self.current.clone()))
        } else {
            Some(Ok(Vec::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_length() {
        assert_eq!(common_prefix(b"/doc/usage/a.rst", b"/doc/usage/b.rst"), 11);
        assert_eq!(common_prefix(b"", b"/x"), 0);
        assert_eq!(common_prefix(b"/a", b"/a"), 2);
    }

    #[test]
    fn restart_points_bound_reconstruction() {
        let col = PathColumn::new();
        let paths: Vec<Vec<u8>> = (0..50)
            .map(|i| format!("/usr/share/doc/pkg-{i:03}/README").into_bytes())
            .collect();
        let mut buf = Vec::new();
        let mut w = col.writer(&mut buf);
        for (i, p) in paths.iter().enumerate() {
            w.add(i as DocId, p.clone()).unwrap();
        }
        let len = w.finish(50).unwrap();

        let r = col.reader(&buf, 0, len as usize, 50, true).unwrap();
        // 跨 restart 边界（16、32）前后都能重建
        for &i in &[0usize, 15, 16, 17, 31, 32, 49] {
            assert_eq!(r.get(i as DocId).unwrap(), paths[i]);
        }
        let all: Vec<_> = r.iter().map(|v| v.unwrap()).collect();
        assert_eq!(all, paths);
    }

    #[test]
    fn sparse_docs_read_empty_between() {
        let col = PathColumn::new();
        let mut buf = Vec::new();
        let mut w = col.writer(&mut buf);
        w.add(2, b"/a/b".to_vec()).unwrap();
        w.add(5, b"/a/c".to_vec()).unwrap();
        let len = w.finish(8).unwrap();

        let r = col.reader(&buf, 0, len as usize, 8, true).unwrap();
        assert_eq!(r.get(2).unwrap(), b"/a/b");
        assert_eq!(r.get(5).unwrap(), b"/a/c");
        assert_eq!(r.get(3).unwrap(), b"");
        let all: Vec<_> = r.iter().map(|v| v.unwrap()).collect();
        assert_eq!(all.len(), 8);
        assert_eq!(all[5], b"/a/c");
        assert_eq!(all[7], b"");
    }
}

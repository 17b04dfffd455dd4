//! 数值列：十种定宽元素类型，按写入方原生字节序存储
//!
//! 布局与定宽字节列相同：值在 `docnum × SIZE` 处，间隙补默认值，
//! 尾部未写的槽省略。元素本体是整个引擎里唯一按写入方原生字节序
//! 落盘的数据；reader 的 `native` 标志为 false 时逐元素翻转字节，
//! 保证同一份文件跨字节序平台可读。

use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::column::{self, Column, ColumnReader, ColumnWriter};
use crate::common::{ColumnError, DocId, Result};

// ── 元素类型 ──────────────────────────────────────────────────────────────────

/// 元素类型标签（描述符注册表用）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NumericKind {
    I8, U8, I16, U16, I32, U32, I64, U64, F32, F64,
}

impl NumericKind {
    pub fn size(self) -> usize {
        match self {
            Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::I64 | Self::U64 | Self::F64 => 8,
        }
    }
}

mod private {
    pub trait Sealed {}
}

/// 数值列元素：定宽，原生字节序写出，读取时可按需翻转
pub trait Element: Copy + PartialEq + private::Sealed + 'static {
    const SIZE: usize;
    const KIND: NumericKind;

    fn zero() -> Self;
    /// 原生字节序追加到缓冲
    fn push_native(self, buf: &mut Vec<u8>);
    /// 从槽位读出；swap 为 true 时翻转字节
    fn read(buf: &[u8], swap: bool) -> Self;
}

macro_rules! int_element {
    ($($t:ty => $kind:ident),* $(,)?) => {$(
        impl private::Sealed for $t {}

        impl Element for $t {
            const SIZE: usize = std::mem::size_of::<$t>();
            const KIND: NumericKind = NumericKind::$kind;

            fn zero() -> Self { 0 }

            fn push_native(self, buf: &mut Vec<u8>) {
                buf.extend_from_slice(&self.to_ne_bytes());
            }

            fn read(buf: &[u8], swap: bool) -> Self {
                let mut raw = [0u8; std::mem::size_of::<$t>()];
                raw.copy_from_slice(&buf[..std::mem::size_of::<$t>()]);
                let v = <$t>::from_ne_bytes(raw);
                if swap { v.swap_bytes() } else { v }
            }
        }
    )*};
}

int_element! {
    i8  => I8,
    u8  => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
}

impl private::Sealed for f32 {}

impl Element for f32 {
    const SIZE: usize = 4;
    const KIND: NumericKind = NumericKind::F32;

    fn zero() -> Self {
        0.0
    }

    fn push_native(self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.to_bits().to_ne_bytes());
    }

    fn read(buf: &[u8], swap: bool) -> Self {
        let bits = u32::read(buf, swap);
        f32::from_bits(bits)
    }
}

impl private::Sealed for f64 {}

impl Element for f64 {
    const SIZE: usize = 8;
    const KIND: NumericKind = NumericKind::F64;

    fn zero() -> Self {
        0.0
    }

    fn push_native(self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.to_bits().to_ne_bytes());
    }

    fn read(buf: &[u8], swap: bool) -> Self {
        let bits = u64::read(buf, swap);
        f64::from_bits(bits)
    }
}

// ── NumericColumn ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumericColumn<T: Element> {
    default: T,
}

impl<T: Element> NumericColumn<T> {
    pub fn new() -> Self {
        Self { default: T::zero() }
    }

    /// 未写入文档读回的哨兵值（零以外的默认值仅在 native 读取下保真）
    pub fn with_default(default: T) -> Self {
        Self { default }
    }

    pub fn kind(&self) -> NumericKind {
        T::KIND
    }
}

impl<T: Element> Default for NumericColumn<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Element> Column for NumericColumn<T> {
    type Value = T;
    type Writer<W: Write> = NumericWriter<W, T>;
    type Reader<'a> = NumericReader<'a, T> where Self: 'a;

    fn default_value(&self) -> T {
        self.default
    }

    fn writer<W: Write>(&self, stream: W) -> NumericWriter<W, T> {
        NumericWriter {
            stream,
            default: self.default,
            scratch: Vec::with_capacity(T::SIZE),
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
        native:    bool,
    ) -> Result<NumericReader<'a, T>> {
        let data = column::range(map, offset, length)?;
        if data.len() % T::SIZE != 0 {
            return Err(ColumnError::Corrupt(format!(
                "numeric column length {} not a multiple of element size {}",
                data.len(),
                T::SIZE
            )));
        }
        Ok(NumericReader {
            data,
            doc_count,
            default: self.default,
            swap: !native,
        })
    }
}

pub struct NumericWriter<W: Write, T: Element> {
    stream:  W,
    default: T,
    scratch: Vec<u8>,
    last:    Option<DocId>,
    next:    DocId,
    written: u64,
}

impl<W: Write, T: Element> NumericWriter<W, T> {
    fn put(&mut self, v: T) -> Result<()> {
        self.scratch.clear();
        v.push_native(&mut self.scratch);
        self.stream.write_all(&self.scratch)?;
        self.written += T::SIZE as u64;
        Ok(())
    }
}

impl<W: Write, T: Element> ColumnWriter for NumericWriter<W, T> {
    type Value = T;

    fn add(&mut self, docnum: DocId, value: T) -> Result<()> {
        column::advance(&mut self.last, docnum)?;
        while self.next < docnum {
            let d = self.default;
            self.put(d)?;
            self.next += 1;
        }
        self.put(value)?;
        self.next = docnum + 1;
        Ok(())
    }

    fn finish(mut self, doc_count: DocId) -> Result<u64> {
        column::check_doc_count(self.last, doc_count)?;
        self.stream.flush()?;
        Ok(self.written)
    }
}

pub struct NumericReader<'a, T: Element> {
    data:      &'a [u8],
    doc_count: DocId,
    default:   T,
    swap:      bool,
}

impl<T: Element> ColumnReader for NumericReader<'_, T> {
    type Value = T;

    fn doc_count(&self) -> DocId {
        self.doc_count
    }

    fn get(&self, docnum: DocId) -> Result<T> {
        column::check_lookup(docnum, self.doc_count)?;
        let pos = docnum as usize * T::SIZE;
        if pos + T::SIZE <= self.data.len() {
            Ok(T::read(&self.data[pos..], self.swap))
        } else {
            Ok(self.default)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swapped_read_reverses_bytes() {
        let col = NumericColumn::<i32>::new();
        let mut buf = Vec::new();
        let mut w = col.writer(&mut buf);
        w.add(0, 0x0102_0304).unwrap();
        w.finish(1).unwrap();

        let r = col.reader(&buf, 0, 4, 1, true).unwrap();
        assert_eq!(r.get(0).unwrap(), 0x0102_0304);
        let r = col.reader(&buf, 0, 4, 1, false).unwrap();
        assert_eq!(r.get(0).unwrap(), 0x0102_0304i32.swap_bytes());
    }

    #[test]
    fn gaps_take_default() {
        let col = NumericColumn::<u16>::with_default(7);
        let mut buf = Vec::new();
        let mut w = col.writer(&mut buf);
        w.add(2, 100).unwrap();
        let len = w.finish(5).unwrap();
        assert_eq!(len, 6);

        let r = col.reader(&buf, 0, buf.len(), 5, true).unwrap();
        assert_eq!(r.get(0).unwrap(), 7);
        assert_eq!(r.get(1).unwrap(), 7);
        assert_eq!(r.get(2).unwrap(), 100);
        // 尾部未写的槽
        assert_eq!(r.get(4).unwrap(), 7);
        assert!(r.get(5).is_err());
    }

    #[test]
    fn float_bits_survive() {
        let col = NumericColumn::<f64>::new();
        let mut buf = Vec::new();
        let mut w = col.writer(&mut buf);
        w.add(0, -2.5).unwrap();
        w.add(1, 1.25).unwrap();
        w.finish(2).unwrap();

        let r = col.reader(&buf, 0, buf.len(), 2, true).unwrap();
        assert_eq!(r.get(0).unwrap(), -2.5);
        assert_eq!(r.get(1).unwrap(), 1.25);
    }
}

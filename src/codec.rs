//! 可插拔序列化：任意值类型 ↔ 任意字节列
//!
//! `ValueCodec` 定义 `encode(value) -> bytes / decode(bytes) -> value`，
//! `CodecColumn` 把一个 codec 叠在任意以 `Vec<u8>` 为值的列之上（变宽、
//! 逐值压缩、路径列皆可）——列的序列化区间本就是不透明 blob，天然可以
//! 层层委托。约定：存储为零长字节串的文档解码为列默认值，默认值本身
//! 不经过 codec。

use std::io::Write;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::column::{Column, ColumnReader, ColumnWriter};
use crate::common::{ColumnError, DocId, Result};

// ── ValueCodec ────────────────────────────────────────────────────────────────

pub trait ValueCodec: Clone {
    type Value: Clone;

    fn encode(&self, value: &Self::Value) -> Result<Vec<u8>>;
    fn decode(&self, bytes: &[u8]) -> Result<Self::Value>;
}

/// 默认 codec：bincode
pub struct BincodeCodec<T>(PhantomData<fn() -> T>);

impl<T> BincodeCodec<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for BincodeCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for BincodeCodec<T> {
    fn clone(&self) -> Self {
        Self(PhantomData)
    }
}

impl<T> ValueCodec for BincodeCodec<T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    type Value = T;

    fn encode(&self, value: &T) -> Result<Vec<u8>> {
        bincode::serialize(value).map_err(|e| ColumnError::Type(format!("unserializable value: {e}")))
    }

    fn decode(&self, bytes: &[u8]) -> Result<T> {
        bincode::deserialize(bytes).map_err(|e| ColumnError::Corrupt(format!("stored value: {e}")))
    }
}

// ── CodecColumn ───────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct CodecColumn<C: ValueCodec, B> {
    codec:   C,
    inner:   B,
    default: C::Value,
}

impl<C, B> CodecColumn<C, B>
where
    C: ValueCodec,
    B: Column<Value = Vec<u8>>,
{
    pub fn new(codec: C, inner: B, default: C::Value) -> Self {
        Self { codec, inner, default }
    }
}

impl<C, B> Column for CodecColumn<C, B>
where
    C: ValueCodec,
    B: Column<Value = Vec<u8>>,
{
    type Value = C::Value;
    type Writer<W: Write> = CodecWriter<C, B::Writer<W>>;
    type Reader<'a> = CodecReader<C, B::Reader<'a>> where Self: 'a;

    fn default_value(&self) -> C::Value {
        self.default.clone()
    }

    fn writer<W: Write>(&self, stream: W) -> Self::Writer<W> {
        CodecWriter {
            codec: self.codec.clone(),
            inner: self.inner.writer(stream),
        }
    }

    fn reader<'a>(
        &'a self,
        map:       &'a [u8],
        offset:    usize,
        length:    usize,
        doc_count: DocId,
        native:    bool,
    ) -> Result<Self::Reader<'a>> {
        Ok(CodecReader {
            codec:   self.codec.clone(),
            default: self.default.clone(),
            inner:   self.inner.reader(map, offset, length, doc_count, native)?,
        })
    }
}

pub struct CodecWriter<C, Inner> {
    codec: C,
    inner: Inner,
}

impl<C, Inner> ColumnWriter for CodecWriter<C, Inner>
where
    C: ValueCodec,
    Inner: ColumnWriter<Value = Vec<u8>>,
{
    type Value = C::Value;

    fn add(&mut self, docnum: DocId, value: C::Value) -> Result<()> {
        let encoded = self.codec.encode(&value)?;
        self.inner.add(docnum, encoded)
    }

    fn finish(self, doc_count: DocId) -> Result<u64> {
        self.inner.finish(doc_count)
    }
}

pub struct CodecReader<C: ValueCodec, Inner> {
    codec:   C,
    default: C::Value,
    inner:   Inner,
}

impl<C, Inner> ColumnReader for CodecReader<C, Inner>
where
    C: ValueCodec,
    Inner: ColumnReader<Value = Vec<u8>>,
{
    type Value = C::Value;

    fn doc_count(&self) -> DocId {
        self.inner.doc_count()
    }

    fn get(&self, docnum: DocId) -> Result<C::Value> {
        let raw = self.inner.get(docnum)?;
        if raw.is_empty() {
            Ok(self.default.clone())
        } else {
            self.codec.decode(&raw)
        }
    }

    fn close(&self) {
        self.inner.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytes::VarBytesColumn;

    #[test]
    fn codec_over_var_bytes_roundtrips_defaults() {
        let col = CodecColumn::new(
            BincodeCodec::<(i32, String)>::new(),
            VarBytesColumn::new(),
            (0, String::new()),
        );
        let mut buf = Vec::new();
        let mut w = col.writer(&mut buf);
        w.add(1, (7, "alfa".to_string())).unwrap();
        w.add(4, (-3, "bravo".to_string())).unwrap();
        let len = w.finish(6).unwrap();

        let r = col.reader(&buf, 0, len as usize, 6, true).unwrap();
        assert_eq!(r.get(1).unwrap(), (7, "alfa".to_string()));
        assert_eq!(r.get(4).unwrap(), (-3, "bravo".to_string()));
        // 未写入 → 零长存储 → 默认值
        assert_eq!(r.get(0).unwrap(), (0, String::new()));
        assert_eq!(r.get(5).unwrap(), (0, String::new()));
    }
}

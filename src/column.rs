//! Writer/Reader 统一契约与可持久化的列描述符注册表
//!
//! 所有编码共享同一生命周期：
//!
//! ```text
//! Column（描述符，不可变值对象）
//!   ├─ writer(stream)  → add(docnum, value)* → finish(doc_count) → 区间字节数
//!   └─ reader(map, offset, length, doc_count, native)
//!        → get(docnum) / iter() / close()
//! ```
//!
//! 约束：
//! - docnum 严格递增；finish 的 doc_count ≥ 最大 docnum + 1
//! - 未写入的 docnum 读回列默认值；迭代恰好产出 doc_count 个值，可重放
//! - 布局自描述：Reader 仅凭 (offset, length, doc_count) + 描述符重建内部结构
//! - 区间本身是不透明 blob，可原样搬运或作为另一个字节列的值存储

use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::annotation::AnnotationColumn;
use crate::bits::{BitColumn, RoaringBitColumn};
use crate::bytes::{FixedBytesColumn, VarBytesColumn};
use crate::common::{ColumnError, DocId, Result};
use crate::compressed::CompressedBytesColumn;
use crate::ints::{CompactIntColumn, SparseIntColumn};
use crate::numeric::NumericKind;
use crate::path::PathColumn;
use crate::refbytes::RefBytesColumn;

// ── 契约 ──────────────────────────────────────────────────────────────────────

/// 列描述符：命名一种编码及其默认值，充当 writer/reader 工厂。
/// 除配置外无状态，按配置判等。
pub trait Column {
    type Value: Clone;
    type Writer<W: Write>: ColumnWriter<Value = Self::Value>;
    type Reader<'a>: ColumnReader<Value = Self::Value>
    where
        Self: 'a;

    /// 未写入 docnum 读回的默认值
    fn default_value(&self) -> Self::Value;

    /// 在流的当前位置开启一次独占写会话
    fn writer<W: Write>(&self, stream: W) -> Self::Writer<W>;

    /// 在 `map[offset..offset+length]` 上构造随机访问读取器。
    /// `native` 表示读取进程的字节序是否与写入方一致；为 false 时
    /// 数值列逐元素翻转字节。
    fn reader<'a>(
        &'a self,
        map:       &'a [u8],
        offset:    usize,
        length:    usize,
        doc_count: DocId,
        native:    bool,
    ) -> Result<Self::Reader<'a>>;
}

/// 一次写会话：独占目标流，直到 finish
pub trait ColumnWriter {
    type Value;

    /// 追加一个值；docnum 可以跳跃（稀疏），跳过的文档隐式取默认值
    fn add(&mut self, docnum: DocId, value: Self::Value) -> Result<()>;

    /// 定稿并落盘，返回本列消费的字节数（即配套 reader 的 length）
    fn finish(self, doc_count: DocId) -> Result<u64>;
}

/// 一次读会话：构造后不可变，多个 Reader 可并存于同一 map 之上
pub trait ColumnReader {
    type Value: Clone;

    fn doc_count(&self) -> DocId;

    /// 索引寻址；`docnum >= doc_count` 报 Range（标注列例外，见其文档）
    fn get(&self, docnum: DocId) -> Result<Self::Value>;

    /// 全量惰性迭代：按 docnum 序恰好 doc_count 个值；每次调用从头重放
    fn iter(&self) -> Box<dyn Iterator<Item = Result<Self::Value>> + '_>
    where
        Self: Sized,
    {
        Box::new((0..self.doc_count()).map(move |dn| self.get(dn)))
    }

    /// 释放本 Reader 的私有解码缓存；幂等，不触碰调用方持有的底层 map
    fn close(&self) {}
}

// ── 描述符注册表 ──────────────────────────────────────────────────────────────

/// 可序列化的列描述符：segment TOC 用它记录某字段所用的编码与配置，
/// 反序列化后即可重建同配置的描述符。泛型列（块压缩、codec 列）
/// 只登记配置参数，值类型由调用方代码决定。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnSpec {
    VarBytes(VarBytesColumn),
    FixedBytes(FixedBytesColumn),
    RefBytes(RefBytesColumn),
    Numeric(NumericKind),
    Bit(BitColumn),
    RoaringBit(RoaringBitColumn),
    CompactInt(CompactIntColumn),
    SparseInt(SparseIntColumn),
    CompressedBytes(CompressedBytesColumn),
    BlockCompressed { block_size: u32 },
    Annotation(AnnotationColumn),
    Path(PathColumn),
}

// ── 写入顺序校验 ──────────────────────────────────────────────────────────────

/// docnum 必须严格递增（重复视同回退，一并拒绝）
pub(crate) fn advance(last: &mut Option<DocId>, docnum: DocId) -> Result<()> {
    if let Some(l) = *last {
        if docnum <= l {
            return Err(ColumnError::Range { docnum, bound: l + 1 });
        }
    }
    *last = Some(docnum);
    Ok(())
}

/// finish 的 doc_count 必须覆盖所有已写入的 docnum
pub(crate) fn check_doc_count(last: Option<DocId>, doc_count: DocId) -> Result<()> {
    if let Some(l) = last {
        if doc_count < l + 1 {
            return Err(ColumnError::Range { docnum: doc_count, bound: l + 1 });
        }
    }
    Ok(())
}

/// 读取侧越界检查
pub(crate) fn check_lookup(docnum: DocId, doc_count: DocId) -> Result<()> {
    if docnum >= doc_count {
        return Err(ColumnError::Range { docnum, bound: doc_count });
    }
    Ok(())
}

// ── 字节区间解析辅助 ──────────────────────────────────────────────────────────

/// 取列的整个字节区间；越出 map 即为坏的 (offset, length)
pub(crate) fn range(map: &[u8], offset: usize, length: usize) -> Result<&[u8]> {
    let end = offset
        .checked_add(length)
        .ok_or_else(|| ColumnError::Corrupt(format!("range {offset}+{length} overflows")))?;
    map.get(offset..end).ok_or_else(|| {
        ColumnError::Corrupt(format!(
            "range {offset}+{length} beyond mapped region ({} bytes)",
            map.len()
        ))
    })
}

pub(crate) fn slice(data: &[u8], pos: usize, len: usize) -> Result<&[u8]> {
    let end = pos
        .checked_add(len)
        .ok_or_else(|| ColumnError::Corrupt(format!("slice {pos}+{len} overflows")))?;
    data.get(pos..end).ok_or_else(|| {
        ColumnError::Corrupt(format!(
            "slice {pos}+{len} beyond column data ({} bytes)",
            data.len()
        ))
    })
}

pub(crate) fn read_u16(data: &[u8], pos: usize) -> Result<u16> {
    let b = slice(data, pos, 2)?;
    Ok(u16::from_le_bytes([b[0], b[1]]))
}

pub(crate) fn read_u32(data: &[u8], pos: usize) -> Result<u32> {
    let b = slice(data, pos, 4)?;
    Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

pub(crate) fn read_u64(data: &[u8], pos: usize) -> Result<u64> {
    let b = slice(data, pos, 8)?;
    Ok(u64::from_le_bytes([
        b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
    ]))
}

pub(crate) fn read_i64(data: &[u8], pos: usize) -> Result<i64> {
    Ok(read_u64(data, pos)? as i64)
}

//! # column-engine
//!
//! 文档搜索索引的列存储层：每个 (segment, field) 一列，按 docnum 存单值。
//! 写入端顺序追加到流，finish 后字节区间不可变；读取端在 mmap 区间上
//! 随机寻址或全量惰性迭代，未写入的 docnum 读回列默认值。
//!
//! ## 整体架构
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  Column（描述符：编码 + 默认值，值对象）                  │
//! │    ├─ writer(stream)                                     │
//! │    │    └─ add(docnum, value)* → finish(doc_count) → len │
//! │    └─ reader(map, offset, length, doc_count, native)     │
//! │         └─ get(docnum) / iter() / close()                │
//! │                                                          │
//! │  列族（各自的自描述布局）                                 │
//! │    ├─ bytes      定宽槽位 / blob + 偏移表                │
//! │    ├─ refbytes   字典编码（u16 引用 + 溢出降级）          │
//! │    ├─ numeric    十种定宽元素，原生字节序 + swap 读       │
//! │    ├─ bits       位图 / roaring 压缩位图                 │
//! │    ├─ ints       紧凑 FOR 编码 / 稀疏 (docnum,value) 表  │
//! │    ├─ compressed 逐值 LZ4 / 分块 LZ4 + 块索引 + CRC      │
//! │    ├─ annotation 区间标注 + 标签表（首现序）              │
//! │    ├─ path       前缀共享路径压缩（restart 点）           │
//! │    └─ codec      任意值 ↔ 字节列的可插拔序列化            │
//! └──────────────────────────────────────────────────────────┘
//! ```

// ── 契约与基础 ────────────────────────────────────────────────────────────────
pub mod column;
pub mod common;
pub mod compression;

// ── 列族 ──────────────────────────────────────────────────────────────────────
pub mod annotation;
pub mod bits;
pub mod bytes;
pub mod codec;
pub mod compressed;
pub mod ints;
pub mod numeric;
pub mod path;
pub mod refbytes;

pub use column::{Column, ColumnReader, ColumnSpec, ColumnWriter};
pub use common::{ColumnError, ColumnEvents, DocId, LogEvents, Result};

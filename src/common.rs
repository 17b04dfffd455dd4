//! 全局基础类型、错误定义与诊断事件通道

use thiserror::Error;

// ── ID 类型别名 ───────────────────────────────────────────────────────────────

/// segment 内从 0 开始的文档编号
pub type DocId = u32;

// ── 错误 ──────────────────────────────────────────────────────────────────────

/// 列存错误分类。
///
/// 字典溢出不在此列：它是记录在案的降级策略（丢弃新 unique 值并通过
/// [`ColumnEvents`] 发出诊断），不是错误。
#[derive(Debug, Error)]
pub enum ColumnError {
    /// docnum 越界：读取时 `docnum >= doc_count`，写入时 docnum 回退，
    /// 或 finish 给出的 doc_count 小于已写入的最大 docnum + 1
    #[error("docnum {docnum} out of range (bound {bound})")]
    Range { docnum: DocId, bound: DocId },
    /// 值不在列的声明域内（定宽列宽度不符、区间 start > end 等）
    #[error("value outside column domain: {0}")]
    Type(String),
    /// 解码时遇到损坏的字节布局（截断的块、坏头、校验不符）
    #[error("corrupt column data: {0}")]
    Corrupt(String),
    /// 底层流写入失败
    #[error("column I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ColumnError>;

// ── 诊断事件 ──────────────────────────────────────────────────────────────────

/// 写入端诊断事件回调。
///
/// 字典引用列的容量溢出走这里而不是错误通道：首次丢弃发一条事件，
/// finish 时再发一条汇总。默认汇 [`LogEvents`] 输出 tracing 结构化记录，
/// 调用方可换成自己的收集器。
pub trait ColumnEvents {
    /// 字典引用空间耗尽，此文档起新 unique 值将降级存为默认值
    fn dict_overflow(&self, docnum: DocId, dict_size: usize);
    /// finish 汇总：本次写会话共丢弃的新 unique 值个数
    fn dict_overflow_summary(&self, dropped: u64, dict_size: usize);
}

/// 默认事件汇：tracing warn 记录
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEvents;

impl ColumnEvents for LogEvents {
    fn dict_overflow(&self, docnum: DocId, dict_size: usize) {
        tracing::warn!(
            docnum,
            dict_size,
            "ref dictionary full; new unique values stored as the default from here on"
        );
    }

    fn dict_overflow_summary(&self, dropped: u64, dict_size: usize) {
        tracing::warn!(
            dropped,
            dict_size,
            "ref dictionary overflow: unique values dropped during this write session"
        );
    }
}

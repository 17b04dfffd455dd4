//! 全编码共用的读写契约测试
//!
//! 每种列走同一套流程：向临时文件先写 5 字节前缀再写列区间，
//! finish 拿到字节数，mmap 后在偏移 5 处重建 reader，校验
//! 寻址、迭代、重放、close 幂等与越界报错。

use std::fs::File;
use std::io::Write as _;

use column_engine::bits::{BitColumn, RoaringBitColumn};
use column_engine::bytes::{FixedBytesColumn, VarBytesColumn};
use column_engine::codec::{BincodeCodec, CodecColumn};
use column_engine::compressed::{BlockCompressedColumn, CompressedBytesColumn};
use column_engine::ints::{CompactIntColumn, SparseIntColumn};
use column_engine::numeric::{NumericColumn, NumericKind};
use column_engine::path::PathColumn;
use column_engine::refbytes::RefBytesColumn;
use column_engine::{Column, ColumnError, ColumnReader, ColumnSpec, ColumnWriter, DocId};

/// 写入 → mmap → 读回，逐项核对契约。pairs 按 docnum 有序。
fn check_contract<C>(col: &C, pairs: &[(DocId, C::Value)], doc_count: DocId)
where
    C: Column,
    C::Value: PartialEq + std::fmt::Debug,
{
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("col.bin");
    let mut f = File::create(&path).unwrap();
    f.write_all(b"hello").unwrap();
    let mut w = col.writer(&mut f);
    for (dn, v) in pairs {
        w.add(*dn, v.clone()).unwrap();
    }
    let length = w.finish(doc_count).unwrap();
    f.flush().unwrap();
    drop(f);

    let file = File::open(&path).unwrap();
    let map = unsafe { memmap2::Mmap::map(&file).unwrap() };
    // finish 返回的字节数就是本列消费的区间长度
    assert_eq!(map.len() as u64, 5 + length);

    let r = col.reader(&map, 5, length as usize, doc_count, true).unwrap();
    assert_eq!(r.doc_count(), doc_count);

    let mut expect = Vec::with_capacity(doc_count as usize);
    let mut pi = 0usize;
    for dn in 0..doc_count {
        if pi < pairs.len() && pairs[pi].0 == dn {
            expect.push(pairs[pi].1.clone());
            pi += 1;
        } else {
            expect.push(col.default_value());
        }
    }

    for dn in 0..doc_count {
        assert_eq!(r.get(dn).unwrap(), expect[dn as usize], "get({dn})");
    }

    let by_iter: Vec<_> = r.iter().map(|v| v.unwrap()).collect();
    assert_eq!(by_iter, expect);
    // 迭代可重放
    let replay: Vec<_> = r.iter().map(|v| v.unwrap()).collect();
    assert_eq!(replay, expect);

    // close 幂等，之后仍可读
    r.close();
    r.close();
    if doc_count > 0 {
        let last = doc_count - 1;
        assert_eq!(r.get(last).unwrap(), expect[last as usize]);
    }
    assert!(matches!(r.get(doc_count), Err(ColumnError::Range { .. })));
}

// ── 字节列 ────────────────────────────────────────────────────────────────────

#[test]
fn var_bytes_contract() {
    let pairs: Vec<(DocId, Vec<u8>)> = vec![
        (0, b"alfa".to_vec()),
        (1, b"".to_vec()),
        (4, b"bravo charlie".to_vec()),
        (7, b"d".to_vec()),
    ];
    check_contract(&VarBytesColumn::new(), &pairs, 10);
}

#[test]
fn fixed_bytes_contract() {
    let col = FixedBytesColumn::new(5);
    let pairs: Vec<(DocId, Vec<u8>)> = vec![
        (1, b"aaaaa".to_vec()),
        (2, b"bbbbb".to_vec()),
        (6, b"ccccc".to_vec()),
    ];
    check_contract(&col, &pairs, 9);
}

#[test]
fn ref_bytes_contract() {
    let pairs: Vec<(DocId, Vec<u8>)> = vec![
        (0, b"open".to_vec()),
        (2, b"closed".to_vec()),
        (3, b"open".to_vec()),
        (5, b"pending".to_vec()),
    ];
    check_contract(&RefBytesColumn::new(), &pairs, 8);
}

#[test]
fn ref_fixed_bytes_contract() {
    let col = RefBytesColumn::fixed(3);
    let pairs: Vec<(DocId, Vec<u8>)> = vec![
        (1, b"red".to_vec()),
        (4, b"grn".to_vec()),
        (5, b"red".to_vec()),
    ];
    check_contract(&col, &pairs, 7);
}

// ── 数值列 ────────────────────────────────────────────────────────────────────

macro_rules! numeric_contract {
    ($name:ident, $t:ty, $vals:expr) => {
        #[test]
        fn $name() {
            let col = NumericColumn::<$t>::new();
            let vals: Vec<$t> = $vals;
            // 稀疏放置：docnum 步进 3，留出间隙与尾槽
            let pairs: Vec<(DocId, $t)> = vals
                .iter()
                .enumerate()
                .map(|(i, &v)| ((i * 3) as DocId, v))
                .collect();
            let doc_count = vals.len() as DocId * 3 + 2;
            check_contract(&col, &pairs, doc_count);
        }
    };
}

numeric_contract!(numeric_i8_contract, i8, vec![-128, -1, 0, 1, 127]);
numeric_contract!(numeric_u8_contract, u8, vec![1, 128, 255]);
numeric_contract!(numeric_i16_contract, i16, vec![-32768, -7, 300, 32767]);
numeric_contract!(numeric_u16_contract, u16, vec![1, 777, 65535]);
numeric_contract!(numeric_i32_contract, i32, vec![i32::MIN, -5, 6, i32::MAX]);
numeric_contract!(numeric_u32_contract, u32, vec![1, 100_000, u32::MAX]);
numeric_contract!(numeric_i64_contract, i64, vec![i64::MIN, -9, 10, i64::MAX]);
numeric_contract!(numeric_u64_contract, u64, vec![1, 1 << 40, u64::MAX]);
numeric_contract!(numeric_f32_contract, f32, vec![-1.5, 0.25, 1e10]);
numeric_contract!(numeric_f64_contract, f64, vec![-2.5, 0.125, 1e300]);

#[test]
fn numeric_foreign_endianness_swaps_per_element() {
    let col = NumericColumn::<i32>::new();
    let vals = [-1i32, 10, -20, 300, 0x0102_0304];
    let mut buf = Vec::new();
    let mut w = col.writer(&mut buf);
    for (i, &v) in vals.iter().enumerate() {
        w.add(i as DocId, v).unwrap();
    }
    let len = w.finish(5).unwrap();

    let r = col.reader(&buf, 0, len as usize, 5, false).unwrap();
    for (i, &v) in vals.iter().enumerate() {
        assert_eq!(r.get(i as DocId).unwrap(), v.swap_bytes());
    }
}

// ── 位列 ──────────────────────────────────────────────────────────────────────

#[test]
fn bit_contract() {
    let pairs: Vec<(DocId, bool)> = vec![(0, true), (3, false), (8, true), (9, true)];
    check_contract(&BitColumn::new(), &pairs, 12);
}

#[test]
fn roaring_bit_contract() {
    let pairs: Vec<(DocId, bool)> = vec![(1, false), (2, true), (500, true), (9000, false)];
    check_contract(&RoaringBitColumn::new(), &pairs, 10_000);
}

// ── 整数列 ────────────────────────────────────────────────────────────────────

#[test]
fn compact_int_contract() {
    let pairs: Vec<(DocId, i64)> = vec![(0, -500), (2, 499), (5, 0), (9, 123)];
    check_contract(&CompactIntColumn::new(), &pairs, 11);
}

#[test]
fn sparse_int_contract() {
    let pairs: Vec<(DocId, i64)> = vec![(3, 30), (8, -80), (9, 90)];
    check_contract(&SparseIntColumn::new(), &pairs, 12);
}

// ── 压缩列 ────────────────────────────────────────────────────────────────────

#[test]
fn compressed_bytes_contract() {
    let pairs: Vec<(DocId, Vec<u8>)> = vec![
        (0, b"alfa bravo charlie ".repeat(20)),
        (2, b"delta".to_vec()),
        (5, b"echo foxtrot ".repeat(10)),
    ];
    check_contract(&CompressedBytesColumn::new(), &pairs, 8);
}

#[test]
fn block_compressed_contract() {
    let col = BlockCompressedColumn::new(String::new()).with_block_size(4);
    let pairs: Vec<(DocId, String)> = (0..13)
        .map(|i| (i * 2, format!("document number {i}")))
        .collect();
    check_contract(&col, &pairs, 30);
}

// ── 层叠列 ────────────────────────────────────────────────────────────────────

#[test]
fn codec_column_contract() {
    let col = CodecColumn::new(
        BincodeCodec::<(i32, String)>::new(),
        VarBytesColumn::new(),
        (0, String::new()),
    );
    let pairs: Vec<(DocId, (i32, String))> = vec![
        (1, (7, "alfa".to_string())),
        (4, (-3, "bravo".to_string())),
        (5, (99, "charlie".to_string())),
    ];
    check_contract(&col, &pairs, 8);
}

#[test]
fn path_contract() {
    let pairs: Vec<(DocId, Vec<u8>)> = (0..40)
        .map(|i| (i, format!("/srv/data/shard-{i:02}/segment.bin").into_bytes()))
        .collect();
    check_contract(&PathColumn::new(), &pairs, 45);
}

// ── 写入顺序与定稿校验 ────────────────────────────────────────────────────────

#[test]
fn writers_reject_docnum_regression() {
    let col = VarBytesColumn::new();
    let mut buf = Vec::new();
    let mut w = col.writer(&mut buf);
    w.add(5, b"a".to_vec()).unwrap();
    assert!(matches!(
        w.add(3, b"b".to_vec()),
        Err(ColumnError::Range { .. })
    ));
    assert!(matches!(
        w.add(5, b"c".to_vec()),
        Err(ColumnError::Range { .. })
    ));
    // 失败的 add 不影响后续合法写入
    w.add(6, b"d".to_vec()).unwrap();
}

#[test]
fn finish_rejects_doc_count_below_last_docnum() {
    let col = CompactIntColumn::new();
    let mut buf = Vec::new();
    let mut w = col.writer(&mut buf);
    w.add(9, 1).unwrap();
    assert!(matches!(w.finish(9), Err(ColumnError::Range { .. })));
}

// ── 描述符注册表 ──────────────────────────────────────────────────────────────

#[test]
fn column_specs_survive_serialization() {
    let specs = vec![
        ColumnSpec::VarBytes(VarBytesColumn::new()),
        ColumnSpec::FixedBytes(FixedBytesColumn::new(8)),
        ColumnSpec::RefBytes(RefBytesColumn::fixed(3)),
        ColumnSpec::Numeric(NumericKind::I64),
        ColumnSpec::Bit(BitColumn::new()),
        ColumnSpec::RoaringBit(RoaringBitColumn::new()),
        ColumnSpec::CompactInt(CompactIntColumn::with_default(-1)),
        ColumnSpec::SparseInt(SparseIntColumn::new()),
        ColumnSpec::CompressedBytes(CompressedBytesColumn::new()),
        ColumnSpec::BlockCompressed { block_size: 64 },
        ColumnSpec::Path(PathColumn::new()),
    ];
    let raw = bincode::serialize(&specs).unwrap();
    let back: Vec<ColumnSpec> = bincode::deserialize(&raw).unwrap();
    assert_eq!(back, specs);
}

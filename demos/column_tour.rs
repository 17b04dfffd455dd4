//! # column-engine 使用案例
//!
//! 演示列存引擎的核心能力：
//!
//! 1. 变宽字节列写入 + mmap 读回
//! 2. 字典引用列（重复值去重）
//! 3. 数值列与跨字节序读取
//! 4. 紧凑 vs 稀疏整数列的体积对比
//! 5. 分块压缩的结构化列
//! 6. 区间标注列
//! 7. 路径列 vs 变宽列的压缩比

use std::collections::HashMap;
use std::fs::File;
use std::io::Write;

use column_engine::annotation::{Annotation, AnnotationColumn};
use column_engine::bytes::VarBytesColumn;
use column_engine::compressed::BlockCompressedColumn;
use column_engine::ints::{CompactIntColumn, SparseIntColumn};
use column_engine::numeric::NumericColumn;
use column_engine::path::PathColumn;
use column_engine::refbytes::RefBytesColumn;
use column_engine::{Column, ColumnReader, ColumnWriter, DocId};

fn main() -> column_engine::Result<()> {
    println!("═══════════════════════════════════════════════════════════");
    println!("   column-engine 列存演示");
    println!("═══════════════════════════════════════════════════════════\n");

    let dir = tempfile::tempdir()?;

    // =========================================================================
    // 1. 变宽字节列
    // =========================================================================
    println!("【1】变宽字节列 ...");
    let col = VarBytesColumn::new();
    let path = dir.path().join("var.col");
    let mut f = File::create(&path)?;
    let mut w = col.writer(&mut f);
    for (i, v) in ["alfa", "bravo", "charlie"].iter().enumerate() {
        w.add(i as DocId, v.as_bytes().to_vec())?;
    }
    w.add(5, b"foxtrot".to_vec())?; // docnum 跳跃，3/4 取默认空值
    let length = w.finish(6)?;
    f.flush()?;

    let file = File::open(&path)?;
    let map = unsafe { memmap2::Mmap::map(&file)? };
    let r = col.reader(&map, 0, length as usize, 6, true)?;
    println!("    doc 2 = {:?}", String::from_utf8_lossy(&r.get(2)?));
    println!("    doc 3 = {:?} (未写入)", String::from_utf8_lossy(&r.get(3)?));
    println!("    全量  = {} 个值\n", r.iter().count());

    // =========================================================================
    // 2. 字典引用列
    // =========================================================================
    println!("【2】字典引用列（3 个 unique × 2000 文档）...");
    let col = RefBytesColumn::new();
    let path = dir.path().join("ref.col");
    let mut f = File::create(&path)?;
    let mut w = col.writer(&mut f);
    let statuses = [b"open".as_slice(), b"closed", b"pending"];
    for i in 0..2000u32 {
        w.add(i, statuses[i as usize % 3].to_vec())?;
    }
    let length = w.finish(2000)?;
    println!("    2000 文档 → {length} 字节（每文档 1 字节引用）\n");

    // =========================================================================
    // 3. 数值列与跨字节序
    // =========================================================================
    println!("【3】数值列 ...");
    let col = NumericColumn::<i32>::new();
    let path = dir.path().join("num.col");
    let mut f = File::create(&path)?;
    let mut w = col.writer(&mut f);
    for (i, v) in [-1, 10, -20, 300].iter().enumerate() {
        w.add(i as DocId, *v)?;
    }
    let length = w.finish(4)?;
    f.flush()?;
    let file = File::open(&path)?;
    let map = unsafe { memmap2::Mmap::map(&file)? };
    let r = col.reader(&map, 0, length as usize, 4, true)?;
    println!("    native 读取: doc 3 = {}", r.get(3)?);
    let r = col.reader(&map, 0, length as usize, 4, false)?;
    println!("    异字节序读取（逐元素 swap）: doc 3 = {}\n", r.get(3)?);

    // =========================================================================
    // 4. 紧凑 vs 稀疏整数列
    // =========================================================================
    println!("【4】紧凑 vs 稀疏整数列（10000 文档，1% 写入）...");
    let doc_count = 10_000u32;
    let compact = CompactIntColumn::new();
    let sparse = SparseIntColumn::new();

    let mut buf1 = Vec::new();
    let mut w = compact.writer(&mut buf1);
    for i in (0..doc_count).step_by(100) {
        w.add(i, i as i64)?;
    }
    let len1 = w.finish(doc_count)?;

    let mut buf2 = Vec::new();
    let mut w = sparse.writer(&mut buf2);
    for i in (0..doc_count).step_by(100) {
        w.add(i, i as i64)?;
    }
    let len2 = w.finish(doc_count)?;
    println!("    compact = {len1} 字节（每文档一槽）");
    println!("    sparse  = {len2} 字节（只存写入对）\n");

    // =========================================================================
    // 5. 分块压缩的结构化列
    // =========================================================================
    println!("【5】分块压缩列（HashMap 值）...");
    let col = BlockCompressedColumn::new(HashMap::<String, String>::new());
    let path = dir.path().join("block.col");
    let mut f = File::create(&path)?;
    let mut w = col.writer(&mut f);
    for i in 0..500u32 {
        let mut doc = HashMap::new();
        doc.insert("title".to_string(), format!("document {i}"));
        doc.insert("lang".to_string(), "en".to_string());
        w.add(i, doc)?;
    }
    let length = w.finish(500)?;
    f.flush()?;
    let file = File::open(&path)?;
    let map = unsafe { memmap2::Mmap::map(&file)? };
    let r = col.reader(&map, 0, length as usize, 500, true)?;
    println!("    500 结构化文档 → {length} 字节");
    println!("    doc 321[\"title\"] = {:?}\n", r.get(321)?["title"]);

    // =========================================================================
    // 6. 区间标注列
    // =========================================================================
    println!("【6】区间标注列 ...");
    let col = AnnotationColumn::new();
    let path = dir.path().join("anno.col");
    let mut f = File::create(&path)?;
    let mut w = col.writer(&mut f);
    w.add(0, vec![Annotation::new("person", 0, 5), Annotation::new("corp", 10, 18)])?;
    w.add(7, vec![Annotation::new("person", 30, 35)])?;
    let length = w.finish(20)?;
    f.flush()?;
    let file = File::open(&path)?;
    let map = unsafe { memmap2::Mmap::map(&file)? };
    let r = col.reader(&map, 0, length as usize, 20, true)?;
    println!("    标签（首现序）= {:?}", r.names()?);
    println!("    doc 0 = {} 条标注，doc 3 = {} 条\n", r.get(0)?.len(), r.get(3)?.len());

    // =========================================================================
    // 7. 路径列 vs 变宽列
    // =========================================================================
    println!("【7】路径列压缩比 ...");
    let paths: Vec<Vec<u8>> = (0..200)
        .map(|i| format!("/doc/usage/extensions/ext-{i:03}.rst").into_bytes())
        .collect();

    let var = VarBytesColumn::new();
    let mut buf1 = Vec::new();
    let mut w = var.writer(&mut buf1);
    for (i, p) in paths.iter().enumerate() {
        w.add(i as DocId, p.clone())?;
    }
    let len1 = w.finish(paths.len() as DocId)?;

    let pc = PathColumn::new();
    let mut buf2 = Vec::new();
    let mut w = pc.writer(&mut buf2);
    for (i, p) in paths.iter().enumerate() {
        w.add(i as DocId, p.clone())?;
    }
    let len2 = w.finish(paths.len() as DocId)?;
    println!("    var  = {len1} 字节");
    println!("    path = {len2} 字节（前缀共享 + restart 点）");

    println!("\n═══════════════════════════════════════════════════════════");
    println!("   演示完成");
    println!("═══════════════════════════════════════════════════════════");
    Ok(())
}

//! 流式写入目标文件（非原子，失败时保留已写入部分）。

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// 创建或截断 `destination`，并把 `source` 的全部字节写入。
pub fn write_stream<R: Read + ?Sized>(source: &mut R, destination: &Path) -> io::Result<u64> {
    let mut file = File::create(destination)?;
    io::copy(source, &mut file)
}

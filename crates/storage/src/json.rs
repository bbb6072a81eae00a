use domain::{Error, Result};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::io::{ErrorKind, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// 文件不存在返回 `None`；内容坏掉是错误，避免随后的写入把它覆盖掉
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(Error::Persistence(format!(
                "read {}: {}",
                path.display(),
                e
            )))
        }
    };
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(None);
    }
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| Error::Persistence(format!("corrupt json in {}: {}", path.display(), e)))
}

/// 顶层必须是数组
pub(crate) fn read_json_array(path: &Path) -> Result<Vec<Value>> {
    match read_json::<Value>(path)? {
        None => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items),
        Some(_) => Err(Error::Persistence(format!(
            "{} does not contain a json array",
            path.display()
        ))),
    }
}

/// 同目录临时文件写完、落盘后整体替换，崩溃时旧文件保持完整
pub(crate) fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let persist_err = |e: &dyn std::fmt::Display| {
        Error::Persistence(format!("write {}: {}", path.display(), e))
    };

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let bytes = serde_json::to_vec_pretty(value).map_err(|e| persist_err(&e))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| persist_err(&e))?;
    tmp.write_all(&bytes).map_err(|e| persist_err(&e))?;
    tmp.as_file().sync_all().map_err(|e| persist_err(&e))?;
    tmp.persist(path).map_err(|e| persist_err(&e.error))?;
    Ok(())
}

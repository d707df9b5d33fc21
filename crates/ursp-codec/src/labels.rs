//! DNN / FQDN 的标签化字符串编码。
//!
//! 外层 1 字节总长，其后重复 `(标签长度, 标签字节)`，解码时以 `.` 连接。
//! 标签长度之和（含各自的长度字节）必须恰好等于外层长度。

use ursp_core::DecodeError;

use crate::cursor::Cursor;

/// 读取一个标签化字符串。
pub fn read_labelled(cursor: &mut Cursor<'_>, context: &'static str) -> Result<String, DecodeError> {
    let total = usize::from(cursor.read_u8()?);
    let available = cursor.remaining();
    if total > available {
        return Err(DecodeError::truncated(context, total, available));
    }

    let mut consumed = 0usize;
    let mut labels: Vec<String> = Vec::new();
    while consumed < total {
        let label_len = usize::from(cursor.read_u8()?);
        consumed += 1;
        if consumed + label_len > total {
            return Err(DecodeError::StructuralMismatch {
                context,
                reason: "label lengths exceed the declared total",
            });
        }
        let bytes = cursor.read_bytes(label_len)?;
        labels.push(String::from_utf8_lossy(bytes).into_owned());
        consumed += label_len;
    }
    Ok(labels.join("."))
}

//! 带边界检查的大端读取游标。
//!
//! 所有读取在越界前返回 [`DecodeError::Truncated`]，调用方无需自行比较剩余长度。

use ursp_core::DecodeError;

/// 长度字段宽度。
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LengthWidth {
    /// 1 字节。
    One,
    /// 2 字节。
    Two,
}

impl LengthWidth {
    /// 字段占用的字节数。
    pub fn bytes(self) -> usize {
        match self {
            Self::One => 1,
            Self::Two => 2,
        }
    }
}

/// 只读游标。
#[derive(Clone, Debug)]
pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
    context: &'static str,
}

impl<'a> Cursor<'a> {
    /// 以 `context` 命名的游标，错误信息会携带该名称。
    pub fn new(buf: &'a [u8], context: &'static str) -> Self {
        Self {
            buf,
            pos: 0,
            context,
        }
    }

    /// 剩余字节数。
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// 是否已读尽。
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// 已消费字节数。
    pub fn position(&self) -> usize {
        self.pos
    }

    /// 读取 `len` 字节。
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        let available = self.remaining();
        if len > available {
            return Err(DecodeError::truncated(self.context, len, available));
        }
        let bytes = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    /// 读取定长数组。
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    /// 读取 1 字节。
    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.read_array::<1>()?[0])
    }

    /// 读取大端 `u16`。
    pub fn read_u16(&mut self) -> Result<u16, DecodeError> {
        self.read_array().map(u16::from_be_bytes)
    }

    /// 按宽度读取长度字段。
    pub fn read_length(&mut self, width: LengthWidth) -> Result<usize, DecodeError> {
        match width {
            LengthWidth::One => self.read_u8().map(usize::from),
            LengthWidth::Two => self.read_u16().map(usize::from),
        }
    }

    /// 切出长度为 `len` 的子游标，父游标越过这段字节。
    pub fn split(&mut self, len: usize, context: &'static str) -> Result<Cursor<'a>, DecodeError> {
        let available = self.remaining();
        if len > available {
            return Err(DecodeError::truncated(context, len, available));
        }
        let bytes = self.read_bytes(len)?;
        Ok(Cursor::new(bytes, context))
    }

    /// 读取长度前缀后切出对应子游标。
    pub fn split_prefixed(
        &mut self,
        width: LengthWidth,
        context: &'static str,
    ) -> Result<Cursor<'a>, DecodeError> {
        let len = self.read_length(width)?;
        self.split(len, context)
    }

    /// 丢弃剩余字节。
    pub fn skip_rest(&mut self) {
        self.pos = self.buf.len();
    }
}

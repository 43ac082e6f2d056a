use crate::error::*;

/// Cursor-based big-endian reader over a table's bytes.
///
/// Every read advances the cursor; `seek` moves it to an absolute offset
/// within the slice. Reads past the end return `Truncated` carrying the
/// error source the reader was constructed with.
#[derive(Debug, Clone)]
pub struct FontReader<'a> {
    bytes: &'a [u8],
    pos: usize,
    source: OvtErrorSource,
}

impl<'a> FontReader<'a> {
    pub fn new(bytes: &'a [u8], source: OvtErrorSource) -> Self {
        Self {
            bytes,
            pos: 0,
            source,
        }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn seek(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub fn skip(&mut self, count: usize) {
        self.pos += count;
    }

    fn truncated(&self) -> OvtError {
        OvtError {
            kind: OvtErrorKind::Truncated,
            source: self.source,
        }
    }

    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8], OvtError> {
        if self.pos + count > self.bytes.len() {
            return Err(self.truncated());
        }

        let slice = &self.bytes[self.pos..(self.pos + count)];
        self.pos += count;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8, OvtError> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8, OvtError> {
        Ok(self.read_bytes(1)?[0] as i8)
    }

    pub fn read_u16(&mut self) -> Result<u16, OvtError> {
        Ok(u16::from_be_bytes(self.read_bytes(2)?.try_into().unwrap()))
    }

    pub fn read_i16(&mut self) -> Result<i16, OvtError> {
        Ok(i16::from_be_bytes(self.read_bytes(2)?.try_into().unwrap()))
    }

    pub fn read_u24(&mut self) -> Result<u32, OvtError> {
        let b = self.read_bytes(3)?;
        Ok(((b[0] as u32) << 16) | ((b[1] as u32) << 8) | b[2] as u32)
    }

    pub fn read_u32(&mut self) -> Result<u32, OvtError> {
        Ok(u32::from_be_bytes(self.read_bytes(4)?.try_into().unwrap()))
    }

    pub fn read_i32(&mut self) -> Result<i32, OvtError> {
        Ok(i32::from_be_bytes(self.read_bytes(4)?.try_into().unwrap()))
    }

    /// LONGDATETIME: seconds since 1904-01-01, left raw.
    pub fn read_i64(&mut self) -> Result<i64, OvtError> {
        Ok(i64::from_be_bytes(self.read_bytes(8)?.try_into().unwrap()))
    }

    /// 16.16 fixed point.
    pub fn read_fixed(&mut self) -> Result<f32, OvtError> {
        Ok(self.read_i32()? as f32 / 65536.0)
    }

    /// S1.14 fixed point ("F2Dot14").
    pub fn read_f2dot14(&mut self) -> Result<f32, OvtError> {
        Ok(self.read_i16()? as f32 / 16384.0)
    }

    /// 4-byte tag as a big-endian u32.
    pub fn read_tag(&mut self) -> Result<u32, OvtError> {
        self.read_u32()
    }
}

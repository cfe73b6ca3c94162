//! Bundle envelope codec
//!
//! The portable "code artifact" unit the engine loads dynamically: a small
//! envelope carrying an export table (names plus visibility flags) and an
//! opaque code body. Structural transformers parse this envelope; byte-level
//! transformers work on the raw bytes and never need it.
//!
//! Wire layout (big-endian):
//!
//! ```text
//! magic   "MFB1"
//! u16     format version (currently 1)
//! u16     export count
//! per export: u16 name length, name (utf-8), u8 visibility
//! u32     body length, body
//! ```

use crate::module::traits::EngineError;

/// Envelope magic
pub const BUNDLE_MAGIC: &[u8; 4] = b"MFB1";
/// Current format version
pub const BUNDLE_VERSION: u16 = 1;

/// Export visibility flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Internal,
    Public,
}

/// A named export in a bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    pub name: String,
    pub visibility: Visibility,
}

/// Decoded bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    pub exports: Vec<Export>,
    pub body: Vec<u8>,
}

impl Bundle {
    /// Decode a bundle envelope
    pub fn decode(bytes: &[u8]) -> Result<Self, EngineError> {
        let mut cursor = Cursor { bytes, pos: 0 };

        let magic = cursor.take(4)?;
        if magic != BUNDLE_MAGIC {
            return Err(EngineError::MalformedBundle("bad magic".to_string()));
        }
        let version = cursor.u16()?;
        if version != BUNDLE_VERSION {
            return Err(EngineError::MalformedBundle(format!(
                "unsupported format version {}",
                version
            )));
        }

        let export_count = cursor.u16()? as usize;
        let mut exports = Vec::with_capacity(export_count);
        for _ in 0..export_count {
            let name_len = cursor.u16()? as usize;
            let name = std::str::from_utf8(cursor.take(name_len)?)
                .map_err(|_| EngineError::MalformedBundle("export name not UTF-8".to_string()))?
                .to_string();
            let visibility = match cursor.u8()? {
                0 => Visibility::Internal,
                1 => Visibility::Public,
                other => {
                    return Err(EngineError::MalformedBundle(format!(
                        "unknown visibility flag {}",
                        other
                    )))
                }
            };
            exports.push(Export { name, visibility });
        }

        let body_len = cursor.u32()? as usize;
        let body = cursor.take(body_len)?.to_vec();
        if cursor.pos != bytes.len() {
            return Err(EngineError::MalformedBundle(format!(
                "{} trailing bytes",
                bytes.len() - cursor.pos
            )));
        }

        Ok(Bundle { exports, body })
    }

    /// Encode the bundle envelope
    ///
    /// Fields wider than their wire representation are an error; a lossy
    /// cast would encode an envelope that decodes to different content.
    pub fn encode(&self) -> Result<Vec<u8>, EngineError> {
        if self.exports.len() > u16::MAX as usize {
            return Err(EngineError::MalformedBundle(format!(
                "{} exports exceed the table limit",
                self.exports.len()
            )));
        }
        if self.body.len() > u32::MAX as usize {
            return Err(EngineError::MalformedBundle(format!(
                "body of {} bytes exceeds the length field",
                self.body.len()
            )));
        }

        let mut out = Vec::with_capacity(16 + self.body.len());
        out.extend_from_slice(BUNDLE_MAGIC);
        out.extend_from_slice(&BUNDLE_VERSION.to_be_bytes());
        out.extend_from_slice(&(self.exports.len() as u16).to_be_bytes());
        for export in &self.exports {
            if export.name.len() > u16::MAX as usize {
                return Err(EngineError::MalformedBundle(format!(
                    "export name of {} bytes exceeds the length field",
                    export.name.len()
                )));
            }
            out.extend_from_slice(&(export.name.len() as u16).to_be_bytes());
            out.extend_from_slice(export.name.as_bytes());
            out.push(match export.visibility {
                Visibility::Internal => 0,
                Visibility::Public => 1,
            });
        }
        out.extend_from_slice(&(self.body.len() as u32).to_be_bytes());
        out.extend_from_slice(&self.body);
        Ok(out)
    }

    /// Look up an export by name
    pub fn export_mut(&mut self, name: &str) -> Option<&mut Export> {
        self.exports.iter_mut().find(|e| e.name == name)
    }
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8], EngineError> {
        if self.pos + len > self.bytes.len() {
            return Err(EngineError::MalformedBundle("truncated bundle".to_string()));
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, EngineError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, EngineError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, EngineError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }
}

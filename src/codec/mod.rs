//! Codec identities and the decompressor factory.
//!
//! # Identity rules
//! Every codec is identified by a u32 FourCC written into the node-added
//! record of the stream it compresses.  Identities are frozen:
//!
//! | FourCC | Meaning |
//! |--------|---------|
//! | 0 | no codec — the node never carries frame data through a codec |
//! | `"NONE"` | frames stored verbatim |
//! | `"ZSTD"` | Zstandard frames |
//! | `"LZ4F"` | LZ4 block with LE u32 uncompressed-size prefix |
//!
//! The player itself interprets only the first two; everything else goes
//! through a [`CodecFactory`], so embedders can supply decoders for ids this
//! build does not know.  A factory that cannot supply a requested id MUST
//! fail — there is no fallback and no negotiation.
//!
//! # Buffer contract
//! [`Codec::decompress`] writes into a caller-owned scratch buffer and
//! returns the decompressed length.  Codecs never allocate per frame; any
//! internal context lives in the codec instance created per node.

use std::fmt;

use crate::error::{Error, Result};

// ── CodecId ──────────────────────────────────────────────────────────────────

/// Frozen u32 FourCC codec identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CodecId(pub u32);

const fn fourcc(tag: &[u8; 4]) -> u32 {
    u32::from_le_bytes(*tag)
}

pub const CODEC_NULL: CodecId = CodecId(0);
pub const CODEC_UNCOMPRESSED: CodecId = CodecId(fourcc(b"NONE"));
pub const CODEC_ZSTD: CodecId = CodecId(fourcc(b"ZSTD"));
pub const CODEC_LZ4: CodecId = CodecId(fourcc(b"LZ4F"));

impl CodecId {
    #[inline]
    pub fn is_null(self) -> bool {
        self == CODEC_NULL
    }

    /// Human-readable tag (diagnostics only — never parsed).
    pub fn name(self) -> String {
        if self.is_null() {
            return "null".into();
        }
        let bytes = self.0.to_le_bytes();
        if bytes.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
            String::from_utf8_lossy(&bytes).trim_end().to_string()
        } else {
            format!("{:#010x}", self.0)
        }
    }
}

impl fmt::Display for CodecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// A defaulted id means "no codec".
impl Default for CodecId {
    fn default() -> Self {
        CODEC_NULL
    }
}

// ── Codec / factory traits ───────────────────────────────────────────────────

/// A per-node frame decompressor.  Instances are created by the factory when
/// the node reaches its ready state and dropped when the node is removed.
pub trait Codec {
    fn codec_id(&self) -> CodecId;

    /// Decompress `src` into `dst`, returning the decompressed length.
    fn decompress(&mut self, src: &[u8], dst: &mut [u8]) -> Result<usize>;
}

/// Constructs decompressors from a codec identity.
pub trait CodecFactory {
    fn create(&self, node_name: &str, codec_id: CodecId) -> Result<Box<dyn Codec>>;
}

// ── Built-in codecs ──────────────────────────────────────────────────────────

pub struct PassthroughCodec;

impl Codec for PassthroughCodec {
    fn codec_id(&self) -> CodecId {
        CODEC_UNCOMPRESSED
    }

    fn decompress(&mut self, src: &[u8], dst: &mut [u8]) -> Result<usize> {
        if src.len() > dst.len() {
            return Err(Error::InternalBufferTooSmall(src.len() as u64));
        }
        dst[..src.len()].copy_from_slice(src);
        Ok(src.len())
    }
}

pub struct ZstdCodec {
    dctx: zstd::bulk::Decompressor<'static>,
}

impl ZstdCodec {
    pub fn new() -> Result<Self> {
        let dctx = zstd::bulk::Decompressor::new().map_err(|e| Error::Codec(e.to_string()))?;
        Ok(Self { dctx })
    }
}

impl Codec for ZstdCodec {
    fn codec_id(&self) -> CodecId {
        CODEC_ZSTD
    }

    fn decompress(&mut self, src: &[u8], dst: &mut [u8]) -> Result<usize> {
        self.dctx.decompress_to_buffer(src, dst).map_err(|e| Error::Codec(e.to_string()))
    }
}

pub struct Lz4Codec;

impl Codec for Lz4Codec {
    fn codec_id(&self) -> CodecId {
        CODEC_LZ4
    }

    fn decompress(&mut self, src: &[u8], dst: &mut [u8]) -> Result<usize> {
        // LE u32 uncompressed-size prefix, then the raw LZ4 block.
        if src.len() < 4 {
            return Err(Error::Codec("lz4 frame shorter than its size prefix".into()));
        }
        let declared = u32::from_le_bytes(src[0..4].try_into().unwrap()) as usize;
        if declared > dst.len() {
            return Err(Error::InternalBufferTooSmall(declared as u64));
        }
        let n = lz4_flex::block::decompress_into(&src[4..], &mut dst[..declared])
            .map_err(|e| Error::Codec(e.to_string()))?;
        Ok(n)
    }
}

// ── Built-in factory ─────────────────────────────────────────────────────────

/// Factory over the codecs built into this crate.  Unknown ids fail hard.
#[derive(Default)]
pub struct BuiltinCodecFactory;

impl CodecFactory for BuiltinCodecFactory {
    fn create(&self, node_name: &str, codec_id: CodecId) -> Result<Box<dyn Codec>> {
        match codec_id {
            CODEC_UNCOMPRESSED => Ok(Box::new(PassthroughCodec)),
            CODEC_ZSTD => Ok(Box::new(ZstdCodec::new()?)),
            CODEC_LZ4 => Ok(Box::new(Lz4Codec)),
            other => Err(Error::Codec(format!(
                "no codec available for id {other} (node '{node_name}')"
            ))),
        }
    }
}

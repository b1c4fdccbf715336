// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! OpenToken - serializable descriptor for reopening a region in another process.
//!
//! Wire format (packed, native endian, no padding):
//!
//! ```text
//! +----------------------+------------------+---------------------------+
//! | region size (usize)  | name length (u16)| name bytes ... | 0x00     |
//! +----------------------+------------------+---------------------------+
//! ```
//!
//! The base64 form uses the URL/filename-safe alphabet so tokens can travel in
//! command lines, environment variables and URLs without escaping.

use std::cell::OnceCell;
use std::fmt;

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;

use crate::error::ShmError;

const SIZE_FIELD_LEN: usize = std::mem::size_of::<usize>();
const NAME_LEN_FIELD_LEN: usize = std::mem::size_of::<u16>();

/// Length of the fixed token header preceding the name.
pub const TOKEN_HEADER_LEN: usize = SIZE_FIELD_LEN + NAME_LEN_FIELD_LEN;

/// Filename-safe base64. Accepts input with or without padding.
const FILENAME_SAFE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Build the binary token payload for a region.
///
/// The caller guarantees `name.len() <= u16::MAX`.
pub(crate) fn encode_payload(name: &str, region_size: usize) -> Vec<u8> {
    let name_len = name.len() as u16;
    let mut data = Vec::with_capacity(TOKEN_HEADER_LEN + name.len() + 1);
    data.extend_from_slice(&region_size.to_ne_bytes());
    data.extend_from_slice(&name_len.to_ne_bytes());
    data.extend_from_slice(name.as_bytes());
    data.push(0);
    data
}

/// Typed view over a validated token payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TokenLayout<'a> {
    pub region_size: usize,
    pub name: &'a str,
}

impl<'a> TokenLayout<'a> {
    /// Interpret a payload, checking every bound before reading a field.
    pub(crate) fn parse(data: &'a [u8]) -> Result<Self, ShmError> {
        if data.len() < TOKEN_HEADER_LEN {
            return Err(ShmError::InvalidToken {
                reason: "payload shorter than the token header",
            });
        }

        let (size_bytes, rest) = data.split_at(SIZE_FIELD_LEN);
        let (len_bytes, rest) = rest.split_at(NAME_LEN_FIELD_LEN);

        let mut size_buf = [0u8; SIZE_FIELD_LEN];
        size_buf.copy_from_slice(size_bytes);
        let region_size = usize::from_ne_bytes(size_buf);
        let name_len = u16::from_ne_bytes([len_bytes[0], len_bytes[1]]) as usize;

        // The name must be followed by its terminator.
        if rest.len() < name_len + 1 {
            return Err(ShmError::InvalidToken {
                reason: "payload shorter than the encoded name",
            });
        }

        if name_len == 0 {
            return Err(ShmError::InvalidToken {
                reason: "token carries an empty region name",
            });
        }

        let name = std::str::from_utf8(&rest[..name_len]).map_err(|_| ShmError::InvalidToken {
            reason: "region name is not valid UTF-8",
        })?;

        Ok(Self { region_size, name })
    }
}

/// Opaque token used to open an existing region from another handle or process.
///
/// A token is only useful while at least one handle somewhere keeps the region
/// open. Equality compares the binary payload, never the base64 text.
#[derive(Default)]
pub struct OpenToken {
    data: Vec<u8>,
    base64: OnceCell<String>,
}

impl OpenToken {
    /// Create an empty (invalid) token.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_payload(data: Vec<u8>) -> Self {
        Self {
            data,
            base64: OnceCell::new(),
        }
    }

    /// Reconstruct a token from its base64 form.
    ///
    /// Empty or undecodable input yields an invalid token. The payload is not
    /// validated until the token is used to open a region.
    pub fn from_base64(encoded: &str) -> Self {
        if encoded.is_empty() {
            return Self::default();
        }

        match FILENAME_SAFE.decode(encoded) {
            Ok(data) if !data.is_empty() => Self {
                data,
                base64: OnceCell::from(encoded.to_string()),
            },
            Ok(_) => Self::default(),
            Err(e) => {
                tracing::debug!(error = %e, "Rejected malformed base64 open token");
                Self::default()
            }
        }
    }

    /// Whether this token carries any payload.
    pub fn is_valid(&self) -> bool {
        !self.data.is_empty()
    }

    /// The base64 form of the token, encoded on first request and cached.
    ///
    /// Returns None for an empty token.
    pub fn base64(&self) -> Option<&str> {
        if self.data.is_empty() {
            return None;
        }

        Some(
            self.base64
                .get_or_init(|| FILENAME_SAFE.encode(&self.data))
                .as_str(),
        )
    }

    /// Raw binary payload.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Region name carried by the token, if the payload is well formed.
    pub fn name(&self) -> Option<&str> {
        self.layout().ok().map(|layout| layout.name)
    }

    /// Region size carried by the token, if the payload is well formed.
    pub fn region_size(&self) -> Option<usize> {
        self.layout().ok().map(|layout| layout.region_size)
    }

    /// Drop the payload and any cached base64 text.
    pub fn clear(&mut self) {
        self.data.clear();
        self.base64.take();
    }

    pub(crate) fn layout(&self) -> Result<TokenLayout<'_>, ShmError> {
        if self.data.is_empty() {
            return Err(ShmError::InvalidToken {
                reason: "token is empty",
            });
        }
        TokenLayout::parse(&self.data)
    }
}

impl Clone for OpenToken {
    /// Deep-copies the payload. The copy re-encodes base64 on demand.
    fn clone(&self) -> Self {
        Self::from_payload(self.data.clone())
    }
}

impl PartialEq for OpenToken {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl Eq for OpenToken {}

impl fmt::Debug for OpenToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenToken")
            .field("len", &self.data.len())
            .field("name", &self.name())
            .field("region_size", &self.region_size())
            .finish()
    }
}

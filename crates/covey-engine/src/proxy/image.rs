//! Proxy image binary format
//!
//! The native define primitive consumes proxy classes in this format:
//!
//! ```text
//! magic      [u8; 4]   "CVYP"
//! version    u16
//! size       u32       instance size in bytes
//! align      u32       instance alignment (power of two)
//! name_len   u16
//! name       [u8]      UTF-8, fully-qualified
//! init_len   u32
//! init       [u8]      state written by the no-argument initializer
//! crc32      u32       CRC-32 of every preceding byte
//! ```
//!
//! All integers are little-endian. The initializer may be shorter than the
//! instance but never longer, and instances are capped at
//! [`MAX_INSTANCE_SIZE`] bytes.

use covey_sdk::ClassLayout;
use thiserror::Error;

/// Magic bytes at the start of every proxy image
pub const MAGIC: [u8; 4] = *b"CVYP";

/// Current image format version
pub const VERSION: u16 = 1;

/// Largest instance size an image may declare
pub const MAX_INSTANCE_SIZE: u32 = 16 << 20;

/// Proxy image decoding errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageError {
    /// Image ended before a field could be read
    #[error("Truncated proxy image: needed {needed} bytes at offset {offset}")]
    Truncated {
        /// Offset of the field being read
        offset: usize,
        /// Bytes required for the field
        needed: usize,
    },

    /// Invalid magic number
    #[error("Invalid magic number: expected CVYP, got {0:?}")]
    InvalidMagic([u8; 4]),

    /// Unsupported version
    #[error("Unsupported proxy image version: {0}")]
    UnsupportedVersion(u16),

    /// Checksum mismatch
    #[error("Checksum mismatch: expected {expected:#x}, got {actual:#x}")]
    ChecksumMismatch {
        /// Stored checksum
        expected: u32,
        /// Computed checksum
        actual: u32,
    },

    /// Size/alignment pair is not a valid layout
    #[error("Invalid instance layout: size {size}, align {align}")]
    InvalidLayout {
        /// Declared size
        size: u32,
        /// Declared alignment
        align: u32,
    },

    /// Declared instance size exceeds [`MAX_INSTANCE_SIZE`]
    #[error("Instance size {0} exceeds the proxy instance size limit")]
    InstanceTooLarge(u32),

    /// Initializer state is longer than the instance
    #[error("Initializer of {len} bytes does not fit an instance of {size} bytes")]
    InitializerTooLarge {
        /// Initializer length
        len: usize,
        /// Declared instance size
        size: u32,
    },

    /// A field is too long for its length prefix
    #[error("Field '{field}' of {len} bytes does not fit the image format")]
    FieldOverflow {
        /// Name of the oversized field
        field: &'static str,
        /// Actual length
        len: usize,
    },

    /// Class name is empty or not UTF-8
    #[error("Invalid class name in proxy image")]
    InvalidName,

    /// Bytes left over after the checksum
    #[error("Trailing data after proxy image: {0} bytes")]
    TrailingData(usize),
}

/// Decoded proxy class image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyImage {
    /// Fully-qualified class name as stored in the image
    pub name: String,
    /// Instance layout
    pub layout: ClassLayout,
    /// Initializer state
    pub initializer: Vec<u8>,
}

impl ProxyImage {
    /// Create an image description
    pub fn new(name: impl Into<String>, layout: ClassLayout, initializer: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            layout,
            initializer,
        }
    }

    /// Encode to the binary image format
    ///
    /// Fails if a length does not fit its prefix; nothing is truncated.
    pub fn encode(&self) -> Result<Vec<u8>, ImageError> {
        let size = fit::<u32>("size", self.layout.size)?;
        let align = fit::<u32>("align", self.layout.align)?;
        let name_len = fit::<u16>("name", self.name.len())?;
        let init_len = fit::<u32>("initializer", self.initializer.len())?;

        let mut out = Vec::with_capacity(24 + self.name.len() + self.initializer.len());
        out.extend_from_slice(&MAGIC);
        out.extend_from_slice(&VERSION.to_le_bytes());
        out.extend_from_slice(&size.to_le_bytes());
        out.extend_from_slice(&align.to_le_bytes());
        out.extend_from_slice(&name_len.to_le_bytes());
        out.extend_from_slice(self.name.as_bytes());
        out.extend_from_slice(&init_len.to_le_bytes());
        out.extend_from_slice(&self.initializer);

        let crc = crc32fast::hash(&out);
        out.extend_from_slice(&crc.to_le_bytes());
        Ok(out)
    }

    /// Decode from the binary image format
    pub fn decode(data: &[u8]) -> Result<Self, ImageError> {
        if data.len() < 4 {
            return Err(ImageError::Truncated {
                offset: 0,
                needed: 4,
            });
        }

        let mut reader = ImageReader::new(data);
        let magic: [u8; 4] = reader.array()?;
        if magic != MAGIC {
            return Err(ImageError::InvalidMagic(magic));
        }

        let version = u16::from_le_bytes(reader.array()?);
        if version != VERSION {
            return Err(ImageError::UnsupportedVersion(version));
        }

        let size = u32::from_le_bytes(reader.array()?);
        if size > MAX_INSTANCE_SIZE {
            return Err(ImageError::InstanceTooLarge(size));
        }
        let align = u32::from_le_bytes(reader.array()?);
        let layout = ClassLayout::new(size as usize, align as usize);
        if layout.to_layout().is_err() {
            return Err(ImageError::InvalidLayout { size, align });
        }

        let name_len = u16::from_le_bytes(reader.array()?) as usize;
        let name = std::str::from_utf8(reader.bytes(name_len)?)
            .map_err(|_| ImageError::InvalidName)?
            .to_string();
        if name.is_empty() {
            return Err(ImageError::InvalidName);
        }

        let init_len = u32::from_le_bytes(reader.array()?) as usize;
        if init_len > size as usize {
            return Err(ImageError::InitializerTooLarge {
                len: init_len,
                size,
            });
        }
        let initializer = reader.bytes(init_len)?.to_vec();

        // Checksum covers everything before it
        let checked_len = reader.offset;
        let expected = u32::from_le_bytes(reader.array()?);
        let actual = crc32fast::hash(&data[..checked_len]);
        if expected != actual {
            return Err(ImageError::ChecksumMismatch { expected, actual });
        }

        if reader.offset != data.len() {
            return Err(ImageError::TrailingData(data.len() - reader.offset));
        }

        Ok(Self {
            name,
            layout,
            initializer,
        })
    }
}

fn fit<T: TryFrom<usize>>(field: &'static str, len: usize) -> Result<T, ImageError> {
    T::try_from(len).map_err(|_| ImageError::FieldOverflow { field, len })
}

struct ImageReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> ImageReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    fn bytes(&mut self, len: usize) -> Result<&'a [u8], ImageError> {
        let end = self
            .offset
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or(ImageError::Truncated {
                offset: self.offset,
                needed: len,
            })?;
        let slice = &self.data[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], ImageError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(N)?);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample() -> ProxyImage {
        ProxyImage::new(
            "com.acme.Greeter$$Proxy",
            ClassLayout::new(16, 8),
            vec![0xAB; 16],
        )
    }

    #[test]
    fn test_decode_encoded_image() {
        let image = sample();
        let decoded = ProxyImage::decode(&image.encode().unwrap()).unwrap();
        assert_eq!(decoded, image);
    }

    #[test]
    fn test_invalid_magic() {
        let mut bytes = sample().encode().unwrap();
        bytes[0] = b'X';
        match ProxyImage::decode(&bytes) {
            Err(ImageError::InvalidMagic(magic)) => assert_eq!(&magic, b"XVYP"),
            other => panic!("Expected InvalidMagic, got {:?}", other),
        }
    }

    #[test]
    fn test_unsupported_version() {
        let mut bytes = sample().encode().unwrap();
        bytes[4] = 9;
        assert_eq!(
            ProxyImage::decode(&bytes),
            Err(ImageError::UnsupportedVersion(9))
        );
    }

    #[test]
    fn test_checksum_mismatch() {
        let mut bytes = sample().encode().unwrap();
        let last_init_byte = bytes.len() - 5;
        bytes[last_init_byte] ^= 0xFF;
        assert!(matches!(
            ProxyImage::decode(&bytes),
            Err(ImageError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_invalid_layout() {
        let image = ProxyImage::new("a.B", ClassLayout::new(8, 3), vec![]);
        assert_eq!(
            ProxyImage::decode(&image.encode().unwrap()),
            Err(ImageError::InvalidLayout { size: 8, align: 3 })
        );
    }

    #[test]
    fn test_empty_name_rejected() {
        let image = ProxyImage::new("", ClassLayout::new(0, 1), vec![]);
        assert_eq!(
            ProxyImage::decode(&image.encode().unwrap()),
            Err(ImageError::InvalidName)
        );
    }

    #[test]
    fn test_trailing_data_rejected() {
        let mut bytes = sample().encode().unwrap();
        bytes.push(0);
        assert_eq!(ProxyImage::decode(&bytes), Err(ImageError::TrailingData(1)));
    }

    #[test]
    fn test_oversized_instance_rejected_before_allocation() {
        let image = ProxyImage::new("a.Huge", ClassLayout::new(1 << 30, 8), vec![]);
        assert_eq!(
            ProxyImage::decode(&image.encode().unwrap()),
            Err(ImageError::InstanceTooLarge(1 << 30))
        );
    }

    #[test]
    fn test_initializer_longer_than_instance_rejected() {
        let image = ProxyImage::new("a.B", ClassLayout::new(2, 1), vec![1, 2, 3]);
        assert_eq!(
            ProxyImage::decode(&image.encode().unwrap()),
            Err(ImageError::InitializerTooLarge { len: 3, size: 2 })
        );
    }

    #[test]
    fn test_encode_refuses_oversized_name() {
        let image = ProxyImage::new("a".repeat(70_000), ClassLayout::new(8, 8), vec![]);
        assert_eq!(
            image.encode(),
            Err(ImageError::FieldOverflow {
                field: "name",
                len: 70_000
            })
        );
    }

    proptest! {
        #[test]
        fn prop_truncated_images_never_decode(cut in 0usize..40) {
            let bytes = sample().encode().unwrap();
            let cut = cut.min(bytes.len() - 1);
            prop_assert!(ProxyImage::decode(&bytes[..cut]).is_err());
        }
    }
}

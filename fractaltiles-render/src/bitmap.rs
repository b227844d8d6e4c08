use crate::SupervisorError;
use fractaltiles_core::TileKey;

/// Decoded RGBA tile raster, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    pub texels: Vec<[u8; 4]>,
}

impl Bitmap {
    /// Reinterpret raw worker bytes. The length must be exactly
    /// `width * height * 4`.
    pub fn from_rgba(
        tile: TileKey,
        width: u32,
        height: u32,
        bytes: &[u8],
    ) -> Result<Self, SupervisorError> {
        let expected = width as usize * height as usize * 4;
        if bytes.len() != expected {
            return Err(SupervisorError::PixelBuffer {
                tile,
                expected,
                actual: bytes.len(),
            });
        }

        Ok(Self {
            width,
            height,
            texels: bytemuck::cast_slice::<u8, [u8; 4]>(bytes).to_vec(),
        })
    }

    pub fn texel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.texels
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.texels)
    }
}

use crate::foundation::{
    core::{Rgb, Viewport},
    error::{RoomError, RoomResult},
};

/// CPU render target backed by a `vello_cpu` pixmap (premultiplied RGBA8).
pub struct RenderTarget {
    width: u16,
    height: u16,
    pixmap: vello_cpu::Pixmap,
}

pub(crate) fn dims(viewport: Viewport) -> RoomResult<(u16, u16)> {
    let w: u16 = viewport
        .width
        .try_into()
        .map_err(|_| RoomError::scene_init("render target width exceeds u16"))?;
    let h: u16 = viewport
        .height
        .try_into()
        .map_err(|_| RoomError::scene_init("render target height exceeds u16"))?;
    if w == 0 || h == 0 {
        return Err(RoomError::scene_init("render target must be non-empty"));
    }
    Ok((w, h))
}

impl RenderTarget {
    pub fn new(viewport: Viewport) -> RoomResult<Self> {
        let (w, h) = dims(viewport)?;
        Ok(Self {
            width: w,
            height: h,
            pixmap: vello_cpu::Pixmap::new(w, h),
        })
    }

    pub fn viewport(&self) -> Viewport {
        Viewport {
            width: u32::from(self.width),
            height: u32::from(self.height),
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    /// Replaces the backing buffer; the previous one is dropped here.
    pub fn resize(&mut self, viewport: Viewport) -> RoomResult<()> {
        let (w, h) = dims(viewport)?;
        self.pixmap = vello_cpu::Pixmap::new(w, h);
        self.width = w;
        self.height = h;
        Ok(())
    }

    pub fn clear(&mut self, color: Option<Rgb>) {
        let rgba = color.map(|c| [c.r, c.g, c.b, 255]).unwrap_or([0, 0, 0, 0]);
        for px in self.pixmap.data_as_u8_slice_mut().chunks_exact_mut(4) {
            px.copy_from_slice(&rgba);
        }
    }

    pub fn pixmap_mut(&mut self) -> &mut vello_cpu::Pixmap {
        &mut self.pixmap
    }

    /// Tightly packed premultiplied RGBA8, row-major.
    pub fn data(&self) -> &[u8] {
        self.pixmap.data_as_u8_slice()
    }

    pub fn to_frame(&self) -> FrameRgba {
        FrameRgba {
            width: u32::from(self.width),
            height: u32::from(self.height),
            data: self.data().to_vec(),
            premultiplied: true,
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= u32::from(self.width) || y >= u32::from(self.height) {
            return None;
        }
        let i = (y as usize * usize::from(self.width) + x as usize) * 4;
        let d = self.data();
        Some([d[i], d[i + 1], d[i + 2], d[i + 3]])
    }
}

/// A copied-out frame, row-major RGBA8.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameRgba {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub premultiplied: bool,
}

impl FrameRgba {
    /// Straight alpha, as PNG encoders expect.
    pub fn unpremultiplied(mut self) -> Self {
        if !self.premultiplied {
            return self;
        }
        for px in self.data.chunks_exact_mut(4) {
            let a = u16::from(px[3]);
            if a == 0 || a == 255 {
                continue;
            }
            for c in &mut px[..3] {
                *c = ((u16::from(*c) * 255 + a / 2) / a).min(255) as u8;
            }
        }
        self.premultiplied = false;
        self
    }
}

impl std::fmt::Debug for RenderTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderTarget")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

/// Creates render targets for mounted containers. Failure means no rendering context.
pub trait RenderContextFactory {
    fn create_target(&mut self, viewport: Viewport) -> RoomResult<RenderTarget>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CpuContextFactory;

impl RenderContextFactory for CpuContextFactory {
    fn create_target(&mut self, viewport: Viewport) -> RoomResult<RenderTarget> {
        RenderTarget::new(viewport)
    }
}

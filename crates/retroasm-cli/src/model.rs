use anyhow::Result;
use std::path::Path;

use retroasm::memory::{Memory, Unit};

/// Contiguous run of target memory loaded from a file.
#[derive(Debug, Clone)]
pub struct Segment {
    pub name: String,
    /// Load address in target units.
    pub base: u32,
    pub bytes: Vec<u8>,
    pub unit: Unit,
}

impl Segment {
    /// First address past the segment.
    pub fn end(&self) -> u32 {
        self.base.wrapping_add(self.units() as u32)
    }

    pub fn units(&self) -> usize {
        self.bytes.len() / self.unit.bytes()
    }

    pub fn contains(&self, addr: u32) -> bool {
        addr >= self.base && addr < self.end()
    }

    pub fn reader(&self) -> Memory {
        Memory::new(self.base, self.bytes.clone()).with_unit(self.unit)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Image {
    pub segments: Vec<Segment>,
}

impl Image {
    pub fn segment_at(&self, addr: u32) -> Option<&Segment> {
        self.segments.iter().find(|s| s.contains(addr))
    }
}

/// Loads a flat binary as one segment at `base`. Word targets need an even
/// number of bytes.
pub fn load_raw_bin(path: &Path, base: u32, skip: usize, len: Option<usize>, unit: Unit) -> Result<Image> {
    let file = std::fs::read(path)?;
    anyhow::ensure!(skip <= file.len(), "--skip exceeds file size");
    let mut payload = &file[skip..];
    if let Some(lim) = len {
        anyhow::ensure!(lim <= payload.len(), "--len exceeds remaining file size after skip");
        payload = &payload[..lim];
    }
    anyhow::ensure!(
        payload.len() % unit.bytes() == 0,
        "{} bytes is not a whole number of {}-byte units",
        payload.len(),
        unit.bytes()
    );
    let name = path.file_stem().map_or_else(|| "image".to_string(), |s| s.to_string_lossy().into_owned());
    Ok(Image { segments: vec![Segment { name, base, bytes: payload.to_vec(), unit }] })
}

pub fn is_mapped(img: &Image, addr: u32) -> bool {
    img.segment_at(addr).is_some()
}

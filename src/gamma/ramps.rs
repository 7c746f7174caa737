//! Gamma ramp storage.
//!
//! A [`Ramps`] holds the red, green and blue lookup tables of one unit in a
//! single contiguous allocation. Channel lengths are recorded separately so
//! that backends reporting unequal channel sizes are representable.

use super::error::{GammaError, Result};

/// Per-channel intensity lookup tables backed by one buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ramps {
    // Invariant: data.len() == red_len + green_len + blue_len, laid out R, G, B
    data: Box<[u16]>,
    red_len: usize,
    green_len: usize,
    blue_len: usize,
}

impl Ramps {
    /// Allocate zeroed ramps with the given channel lengths.
    pub fn zeroed(red_len: usize, green_len: usize, blue_len: usize) -> Result<Self> {
        let total = red_len
            .checked_add(green_len)
            .and_then(|n| n.checked_add(blue_len))
            .ok_or(GammaError::OutOfMemory { what: "gamma ramps" })?;

        let mut data = Vec::new();
        data.try_reserve_exact(total)
            .map_err(|_| GammaError::OutOfMemory { what: "gamma ramps" })?;
        data.resize(total, 0);

        Ok(Self {
            data: data.into_boxed_slice(),
            red_len,
            green_len,
            blue_len,
        })
    }

    /// Allocate zeroed ramps with the same channel layout as `other`.
    pub fn zeroed_like(other: &Ramps) -> Result<Self> {
        Self::zeroed(other.red_len, other.green_len, other.blue_len)
    }

    /// Identity ramps of `size` entries per channel, spanning 0..=65535.
    pub fn identity(size: usize) -> Result<Self> {
        let mut ramps = Self::zeroed(size, size, size)?;
        let (red, green, blue) = ramps.channels_mut();
        for channel in [red, green, blue] {
            fill_identity(channel);
        }
        Ok(ramps)
    }

    /// Build ramps from three channel tables.
    pub fn from_channels(red: &[u16], green: &[u16], blue: &[u16]) -> Result<Self> {
        let mut ramps = Self::zeroed(red.len(), green.len(), blue.len())?;
        let (r, g, b) = ramps.channels_mut();
        r.copy_from_slice(red);
        g.copy_from_slice(green);
        b.copy_from_slice(blue);
        Ok(ramps)
    }

    pub fn red(&self) -> &[u16] {
        &self.data[..self.red_len]
    }

    pub fn green(&self) -> &[u16] {
        &self.data[self.red_len..self.red_len + self.green_len]
    }

    pub fn blue(&self) -> &[u16] {
        &self.data[self.red_len + self.green_len..]
    }

    pub fn red_len(&self) -> usize {
        self.red_len
    }

    pub fn green_len(&self) -> usize {
        self.green_len
    }

    pub fn blue_len(&self) -> usize {
        self.blue_len
    }

    /// Total number of samples over all three channels.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The whole buffer, red then green then blue.
    pub fn as_slice(&self) -> &[u16] {
        &self.data
    }

    /// Split the buffer into mutable red, green and blue spans.
    pub fn channels_mut(&mut self) -> (&mut [u16], &mut [u16], &mut [u16]) {
        let (red, rest) = self.data.split_at_mut(self.red_len);
        let (green, blue) = rest.split_at_mut(self.green_len);
        (red, green, blue)
    }

    /// True if both ramps have identical channel lengths.
    pub fn same_layout(&self, other: &Ramps) -> bool {
        self.red_len == other.red_len
            && self.green_len == other.green_len
            && self.blue_len == other.blue_len
    }
}

fn fill_identity(channel: &mut [u16]) {
    let n = channel.len();
    if n == 1 {
        channel[0] = u16::MAX;
        return;
    }
    for (i, sample) in channel.iter_mut().enumerate() {
        *sample = ((i as f64 / (n - 1) as f64) * u16::MAX as f64).round() as u16;
    }
}

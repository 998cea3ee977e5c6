//! Endless road: a fixed pool of sections and the active window riding along with the player

use glam::Vec3;
use rand::Rng;
use serde::Serialize;
use tracing::{debug, error};

/// One road prefab the pool cycles through
#[derive(Debug, Clone)]
pub struct SectionVariant {
    pub name: String,
    /// Lateral placement baked into the prefab
    pub lateral_offset: f32,
}

impl SectionVariant {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lateral_offset: 0.0,
        }
    }
}

/// Recycler configuration
#[derive(Debug, Clone)]
pub struct RecyclerConfig {
    pub variants: Vec<SectionVariant>,
    /// Total pre-built sections (must exceed the window size)
    pub pool_size: usize,
    /// Sections active at once
    pub window_size: usize,
    /// Length of one section along the forward axis
    pub section_length: f32,
    /// Seconds of simulated time between recycle checks
    pub check_interval: f32,
}

impl Default for RecyclerConfig {
    fn default() -> Self {
        Self {
            variants: vec![
                SectionVariant::new("straight"),
                SectionVariant::new("roadworks"),
                SectionVariant::new("overpass"),
                SectionVariant::new("gas_station"),
            ],
            pool_size: 20,
            window_size: 10,
            section_length: 26.0,
            check_interval: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RecyclerError {
    #[error("invalid recycler config: {0}")]
    InvalidConfig(String),

    #[error("every one of the {pool_size} pooled sections is active")]
    PoolExhausted { pool_size: usize },
}

#[derive(Debug, Clone, Serialize)]
pub struct RoadSection {
    /// Index into the configured variants
    pub variant: usize,
    pub position: Vec3,
    pub active: bool,
}

/// A window slot that was handed a new section during a check
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SectionRecycled {
    pub slot: usize,
    /// Pool index that went back to the pool
    pub released: usize,
    /// Pool index that became the new leading edge
    pub acquired: usize,
    pub from_z: f32,
    pub to_z: f32,
}

pub struct SectionRecycler {
    config: RecyclerConfig,
    pool: Vec<RoadSection>,
    window: Vec<usize>,
    check_timer: f32,
}

impl SectionRecycler {
    /// Build the pool (variants round-robin, all inactive) and lay the first
    /// `window_size` sections end to end from z = 0.
    pub fn new(config: RecyclerConfig) -> Result<Self, RecyclerError> {
        if config.variants.is_empty() {
            return Err(RecyclerError::InvalidConfig("no section variants".to_string()));
        }
        if config.window_size == 0 {
            return Err(RecyclerError::InvalidConfig("window size is zero".to_string()));
        }
        if config.pool_size <= config.window_size {
            return Err(RecyclerError::InvalidConfig(format!(
                "pool size {} must exceed window size {}",
                config.pool_size, config.window_size
            )));
        }
        if !(config.section_length > 0.0) {
            return Err(RecyclerError::InvalidConfig(format!(
                "section length {} must be positive",
                config.section_length
            )));
        }

        let mut pool: Vec<RoadSection> = (0..config.pool_size)
            .map(|i| {
                let variant = i % config.variants.len();
                RoadSection {
                    variant,
                    position: Vec3::new(config.variants[variant].lateral_offset, 0.0, 0.0),
                    active: false,
                }
            })
            .collect();

        let mut window = Vec::with_capacity(config.window_size);
        for (i, section) in pool.iter_mut().take(config.window_size).enumerate() {
            section.position = Vec3::new(section.position.x, 0.0, i as f32 * config.section_length);
            section.active = true;
            window.push(i);
        }

        Ok(Self {
            config,
            pool,
            window,
            check_timer: 0.0,
        })
    }

    /// Advance simulated time and run a recycle check every `check_interval`
    pub fn update<R: Rng + ?Sized>(
        &mut self,
        dt: f32,
        player_z: f32,
        rng: &mut R,
    ) -> Result<Vec<SectionRecycled>, RecyclerError> {
        self.check_timer += dt;
        if self.check_timer < self.config.check_interval {
            return Ok(Vec::new());
        }
        self.check_timer = 0.0;
        self.tick(player_z, rng)
    }

    /// Replace every window section lying more than one section length
    /// behind the player with a pooled one a full window further ahead.
    pub fn tick<R: Rng + ?Sized>(
        &mut self,
        player_z: f32,
        rng: &mut R,
    ) -> Result<Vec<SectionRecycled>, RecyclerError> {
        let length = self.config.section_length;
        let advance = length * self.window.len() as f32;
        let mut recycled = Vec::new();

        for slot in 0..self.window.len() {
            let released = self.window[slot];
            let old_position = self.pool[released].position;
            if old_position.z - player_z >= -length {
                continue;
            }

            self.pool[released].active = false;

            let acquired = match self.acquire_random(rng) {
                Ok(index) => index,
                Err(e) => {
                    // Leave the old section in place rather than open a hole
                    self.pool[released].active = true;
                    error!(slot, error = %e, "Section pool exhausted");
                    return Err(e);
                }
            };

            let to_z = old_position.z + advance;
            let section = &mut self.pool[acquired];
            section.position = Vec3::new(old_position.x, 0.0, to_z);
            section.active = true;
            self.window[slot] = acquired;

            debug!(slot, released, acquired, from_z = old_position.z, to_z, "Section recycled");
            recycled.push(SectionRecycled {
                slot,
                released,
                acquired,
                from_z: old_position.z,
                to_z,
            });
        }

        Ok(recycled)
    }

    /// Linear scan from a random start, skipping active entries; gives up
    /// after one full lap.
    fn acquire_random<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<usize, RecyclerError> {
        let len = self.pool.len();
        let start = rng.gen_range(0..len);
        (0..len)
            .map(|step| (start + step) % len)
            .find(|&index| !self.pool[index].active)
            .ok_or(RecyclerError::PoolExhausted { pool_size: len })
    }

    pub fn config(&self) -> &RecyclerConfig {
        &self.config
    }

    pub fn section(&self, index: usize) -> Option<&RoadSection> {
        self.pool.get(index)
    }

    #[cfg(test)]
    pub fn pool(&self) -> &[RoadSection] {
        &self.pool
    }

    /// Pool indices of the active window, by slot
    pub fn window(&self) -> &[usize] {
        &self.window
    }

    #[cfg(test)]
    pub fn window_sections(&self) -> impl Iterator<Item = &RoadSection> {
        self.window.iter().map(move |&index| &self.pool[index])
    }

    #[cfg(test)]
    pub fn active_count(&self) -> usize {
        self.pool.iter().filter(|s| s.active).count()
    }

    /// Furthest point of road currently laid out ahead
    #[cfg(test)]
    pub fn leading_edge_z(&self) -> f32 {
        self.window_sections()
            .map(|s| s.position.z)
            .fold(f32::MIN, f32::max)
            + self.config.section_length
    }
}

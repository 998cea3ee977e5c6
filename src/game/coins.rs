//! Coins: the session wallet and the coins scattered over active road sections

use std::collections::HashMap;

use glam::Vec3;
use rand::Rng;
use tracing::debug;

use crate::util::math::safe_gen_range;

/// Coin total for one session
#[derive(Debug, Clone, Default)]
pub struct CoinWallet {
    total: u32,
}

impl CoinWallet {
    /// Non-positive amounts are ignored
    pub fn add(&mut self, amount: i64) -> u32 {
        if amount > 0 {
            self.total = self.total.saturating_add(amount.min(u32::MAX as i64) as u32);
        }
        self.total
    }

    pub fn total(&self) -> u32 {
        self.total
    }
}

#[derive(Debug, Clone)]
pub struct CoinConfig {
    pub min_coins: usize,
    pub max_coins: usize,
    /// Keep coins this far inside the section edges
    pub edge_padding: f32,
    /// Lift above the road surface
    pub height_offset: f32,
    /// Width of the drivable area of a section
    pub road_width: f32,
    pub pickup_radius: f32,
}

impl Default for CoinConfig {
    fn default() -> Self {
        Self {
            min_coins: 4,
            max_coins: 8,
            edge_padding: 0.5,
            height_offset: 0.1,
            road_width: 12.0,
            pickup_radius: 1.5,
        }
    }
}

/// Coins currently lying on the road, grouped by the pooled section that owns them
pub struct CoinField {
    config: CoinConfig,
    by_section: HashMap<usize, Vec<Vec3>>,
}

impl CoinField {
    pub fn new(config: CoinConfig) -> Self {
        Self {
            config,
            by_section: HashMap::new(),
        }
    }

    /// Scatter a fresh set of coins over a section centred on `origin`
    pub fn spawn_for_section<R: Rng + ?Sized>(
        &mut self,
        section: usize,
        origin: Vec3,
        section_length: f32,
        rng: &mut R,
    ) -> usize {
        let min = self.config.min_coins;
        let max = self.config.max_coins.max(min);
        let count = rng.gen_range(min..=max);

        let half_x = self.config.road_width * 0.5 - self.config.edge_padding;
        let half_z = section_length * 0.5 - self.config.edge_padding;
        let coins: Vec<Vec3> = (0..count)
            .map(|_| {
                Vec3::new(
                    origin.x + safe_gen_range(rng, -half_x, half_x),
                    origin.y + self.config.height_offset,
                    origin.z + safe_gen_range(rng, -half_z, half_z),
                )
            })
            .collect();

        debug!(section, count, "Coins spawned on section");
        self.by_section.insert(section, coins);
        count
    }

    pub fn clear_section(&mut self, section: usize) {
        self.by_section.remove(&section);
    }

    /// Remove every coin within pickup range of `point` (ignoring height)
    pub fn collect_near(&mut self, point: Vec3) -> usize {
        let radius_sq = self.config.pickup_radius * self.config.pickup_radius;
        let mut collected = 0;
        for coins in self.by_section.values_mut() {
            let before = coins.len();
            coins.retain(|coin| {
                let dx = coin.x - point.x;
                let dz = coin.z - point.z;
                dx * dx + dz * dz > radius_sq
            });
            collected += before - coins.len();
        }
        collected
    }

    #[cfg(test)]
    pub fn coins_on(&self, section: usize) -> &[Vec3] {
        self.by_section
            .get(&section)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Uncollected coins across every section
    pub fn len(&self) -> usize {
        self.by_section.values().map(Vec::len).sum()
    }
}

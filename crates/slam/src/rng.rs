//! Ziggurat Gaussian sampler (Marsaglia-Tsang) over a 32-bit SHR3 generator.
//!
//! The scan matcher draws its mutation proposals from this sampler. The
//! rectangle tables are rebuilt in the constructor, so two instances with
//! the same seed produce identical sequences.

use std::time::{SystemTime, UNIX_EPOCH};

/// Rectangle count of the ziggurat.
const TABLE_SIZE: usize = 128;

/// Rightmost rectangle edge.
const R: f32 = 3.442_620;

/// `1/R`; scales the exponential tail samples.
const TAIL_SCALE: f32 = 0.290_476_4;

/// Starting abscissa for table construction.
const DN0: f64 = 3.442_619_855_899;

/// Area of each rectangle.
const VN: f64 = 9.912_563_035_262_17e-3;

/// `2^31` as a float; normalizes 32-bit draws.
const M1: f64 = 2_147_483_648.0;

pub struct ZigguratRng {
    seed: u32,
    kn: [u32; TABLE_SIZE],
    fn_tab: [f32; TABLE_SIZE],
    wn: [f32; TABLE_SIZE],
}

impl ZigguratRng {
    /// Seed from the wall clock.
    pub fn new() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u32)
            .unwrap_or(0x9E37_79B9);
        // Zero would lock SHR3 at zero forever.
        Self::with_seed(if nanos == 0 { 0x9E37_79B9 } else { nanos })
    }

    /// Deterministic constructor for reproducible runs and tests.
    pub fn with_seed(seed: u32) -> Self {
        let mut rng = Self {
            seed,
            kn: [0; TABLE_SIZE],
            fn_tab: [0.0; TABLE_SIZE],
            wn: [0.0; TABLE_SIZE],
        };
        rng.build_tables();
        rng
    }

    fn build_tables(&mut self) {
        let mut dn = DN0;
        let mut tn = dn;
        let q = VN / (-0.5 * dn * dn).exp();

        self.kn[0] = ((dn / q) * M1) as u32;
        self.kn[1] = 0;
        self.wn[0] = (q / M1) as f32;
        self.wn[TABLE_SIZE - 1] = (dn / M1) as f32;
        self.fn_tab[0] = 1.0;
        self.fn_tab[TABLE_SIZE - 1] = (-0.5 * dn * dn).exp() as f32;

        for i in (1..=TABLE_SIZE - 2).rev() {
            dn = (-2.0 * (VN / dn + (-0.5 * dn * dn).exp()).ln()).sqrt();
            self.kn[i + 1] = ((dn / tn) * M1) as u32;
            tn = dn;
            self.fn_tab[i] = (-0.5 * dn * dn).exp() as f32;
            self.wn[i] = (dn / M1) as f32;
        }
    }

    /// SHR3 step; returns the previous state plus the shifted state.
    fn shr3(&mut self) -> u32 {
        let prev = self.seed;
        let mut s = self.seed;
        s ^= s << 13;
        s ^= s >> 17;
        s ^= s << 5;
        self.seed = s;
        prev.wrapping_add(s)
    }

    /// Uniform draw on (0, 1).
    fn uni(&mut self) -> f32 {
        0.5 + (self.shr3() as i32 as f32) * 0.232_830_6e-9
    }

    /// Standard normal draw.
    pub fn normal(&mut self) -> f64 {
        let hz = self.shr3() as i32;
        let iz = (hz & 127) as usize;
        if hz.unsigned_abs() < self.kn[iz] {
            f64::from(hz as f32 * self.wn[iz])
        } else {
            f64::from(self.nfix(hz, iz))
        }
    }

    /// Normal draw with the given mean and standard deviation.
    pub fn normal_scaled(&mut self, mu: f64, sigma: f64) -> f64 {
        mu + sigma * self.normal()
    }

    /// Rejection path taken when the draw lands outside its rectangle.
    fn nfix(&mut self, mut hz: i32, mut iz: usize) -> f32 {
        loop {
            let x = hz as f32 * self.wn[iz];

            if iz == 0 {
                // Exponential tail beyond R.
                loop {
                    let x = -self.uni().ln() * TAIL_SCALE;
                    let y = -self.uni().ln();
                    if y + y >= x * x {
                        return if hz > 0 { R + x } else { -(R + x) };
                    }
                }
            }

            if self.fn_tab[iz] + self.uni() * (self.fn_tab[iz - 1] - self.fn_tab[iz])
                < (-0.5 * x * x).exp()
            {
                return x;
            }

            hz = self.shr3() as i32;
            iz = (hz & 127) as usize;
            if hz.unsigned_abs() < self.kn[iz] {
                return hz as f32 * self.wn[iz];
            }
        }
    }
}

impl Default for ZigguratRng {
    fn default() -> Self {
        Self::new()
    }
}

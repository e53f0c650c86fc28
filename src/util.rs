pub mod math {
    pub fn degree_to_radian(degree: f32) -> f32 {
        degree * std::f32::consts::PI / 180.0
    }

    /// Number of `tile`-sized blocks needed to cover `extent`.
    pub fn div_ceil(extent: u32, tile: u32) -> u32 {
        extent / tile + u32::from(extent % tile != 0)
    }
}

pub mod color {
    use glam::Vec3;

    /// Hexcone HSV to linear RGB. `value` is not clamped so HDR colors survive.
    pub fn hsv_to_rgb(hue: f32, saturation: f32, value: f32) -> Vec3 {
        if saturation <= 0.0 {
            return Vec3::splat(value);
        }

        let h = (hue.rem_euclid(1.0)) * 6.0;
        let sector = h.floor();
        let f = h - sector;
        let p = value * (1.0 - saturation);
        let q = value * (1.0 - saturation * f);
        let t = value * (1.0 - saturation * (1.0 - f));

        match sector as u32 {
            0 => Vec3::new(value, t, p),
            1 => Vec3::new(q, value, p),
            2 => Vec3::new(p, value, t),
            3 => Vec3::new(p, q, value),
            4 => Vec3::new(t, p, value),
            _ => Vec3::new(value, p, q),
        }
    }
}

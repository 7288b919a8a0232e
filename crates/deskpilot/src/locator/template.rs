//! Screen template matching.
//!
//! Scores are zero-mean normalized cross-correlation (the same measure as
//! OpenCV's `TM_CCOEFF_NORMED`), in `[-1, 1]`. Large searches run coarse to
//! fine: both images are box-downscaled, the strongest coarse peaks are kept
//! and then re-scored at full resolution in a small neighbourhood.

use crate::types::{LocateResult, Rect};
use image::RgbaImage;

const MIN_COARSE_SIDE: usize = 8;
const MAX_PYRAMID_FACTOR: usize = 8;
const COARSE_PEAKS: usize = 5;
/// Per-pixel variance below which a window or template counts as flat.
const FLAT_VARIANCE: f64 = 1e-3;

/// Result of looking for a template on screen.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateMatch {
    Found(LocateResult),
    /// The best position scored under the threshold.
    BelowThreshold { best_score: f32 },
    /// Nothing could be compared: missing or unreadable template, or a
    /// template larger than the screen.
    Unavailable(String),
}

impl TemplateMatch {
    pub fn found(&self) -> Option<&LocateResult> {
        match self {
            TemplateMatch::Found(result) => Some(result),
            _ => None,
        }
    }

    pub fn score(&self) -> Option<f32> {
        match self {
            TemplateMatch::Found(result) => result.score,
            TemplateMatch::BelowThreshold { best_score } => Some(*best_score),
            TemplateMatch::Unavailable(_) => None,
        }
    }
}

/// Search `screen` for `template` and accept the best position when its
/// score reaches `threshold`. `origin` is the screen's top-left corner in
/// desktop coordinates.
pub fn match_template(
    screen: &RgbaImage,
    origin: (i32, i32),
    template: &RgbaImage,
    threshold: f32,
) -> TemplateMatch {
    let Some(best) = best_match(screen, template) else {
        return TemplateMatch::Unavailable(format!(
            "template {}x{} does not fit screen {}x{}",
            template.width(),
            template.height(),
            screen.width(),
            screen.height()
        ));
    };
    if best.score >= threshold {
        let rect = Rect::from_origin_size(
            origin.0 + best.x as i32,
            origin.1 + best.y as i32,
            template.width() as i32,
            template.height() as i32,
        );
        TemplateMatch::Found(LocateResult::scored(rect, best.score))
    } else {
        TemplateMatch::BelowThreshold {
            best_score: best.score,
        }
    }
}

/// Best-scoring position of `template` inside `screen`, in image pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BestMatch {
    pub x: usize,
    pub y: usize,
    pub score: f32,
}

pub fn best_match(screen: &RgbaImage, template: &RgbaImage) -> Option<BestMatch> {
    if template.width() == 0
        || template.height() == 0
        || template.width() > screen.width()
        || template.height() > screen.height()
    {
        return None;
    }
    let screen = Plane::luma(screen);
    let template = Plane::luma(template);

    let factor = pyramid_factor(template.width, template.height);
    if factor == 1 {
        let integral = Integral::new(&screen);
        let prepared = Prepared::new(&template);
        return Some(scan(
            &screen,
            &integral,
            &prepared,
            0..=screen.width - template.width,
            0..=screen.height - template.height,
        ));
    }

    let coarse_screen = screen.downscale(factor);
    let coarse_template = template.downscale(factor);
    let coarse_integral = Integral::new(&coarse_screen);
    let coarse_prepared = Prepared::new(&coarse_template);

    let max_cx = coarse_screen.width - coarse_template.width;
    let max_cy = coarse_screen.height - coarse_template.height;
    let mut coarse = Vec::with_capacity((max_cx + 1) * (max_cy + 1));
    for y in 0..=max_cy {
        for x in 0..=max_cx {
            let score = coarse_prepared.score_at(&coarse_screen, &coarse_integral, x, y);
            coarse.push((score, x, y));
        }
    }
    coarse.sort_by(|a, b| b.0.total_cmp(&a.0));

    let mut peaks: Vec<(usize, usize)> = Vec::with_capacity(COARSE_PEAKS);
    for (_, x, y) in coarse {
        if peaks.len() == COARSE_PEAKS {
            break;
        }
        if peaks
            .iter()
            .all(|&(px, py)| px.abs_diff(x) > 1 || py.abs_diff(y) > 1)
        {
            peaks.push((x, y));
        }
    }

    let integral = Integral::new(&screen);
    let prepared = Prepared::new(&template);
    let max_x = screen.width - template.width;
    let max_y = screen.height - template.height;
    peaks
        .into_iter()
        .map(|(cx, cy)| {
            let (fx, fy) = (cx * factor, cy * factor);
            let xs = fx.saturating_sub(factor)..=(fx + factor).min(max_x);
            let ys = fy.saturating_sub(factor)..=(fy + factor).min(max_y);
            scan(&screen, &integral, &prepared, xs, ys)
        })
        .max_by(|a, b| a.score.total_cmp(&b.score))
}

fn pyramid_factor(width: usize, height: usize) -> usize {
    let mut factor = 1;
    while factor < MAX_PYRAMID_FACTOR
        && width / (factor * 2) >= MIN_COARSE_SIDE
        && height / (factor * 2) >= MIN_COARSE_SIDE
    {
        factor *= 2;
    }
    factor
}

fn scan(
    screen: &Plane,
    integral: &Integral,
    template: &Prepared,
    xs: std::ops::RangeInclusive<usize>,
    ys: std::ops::RangeInclusive<usize>,
) -> BestMatch {
    let mut best = BestMatch {
        x: *xs.start(),
        y: *ys.start(),
        score: f32::MIN,
    };
    for y in ys {
        for x in xs.clone() {
            let score = template.score_at(screen, integral, x, y);
            if score > best.score {
                best = BestMatch { x, y, score };
            }
        }
    }
    best
}

/// Single-channel luminance image.
struct Plane {
    width: usize,
    height: usize,
    px: Vec<f32>,
}

impl Plane {
    fn luma(image: &RgbaImage) -> Self {
        let px = image
            .pixels()
            .map(|p| 0.299 * f32::from(p[0]) + 0.587 * f32::from(p[1]) + 0.114 * f32::from(p[2]))
            .collect();
        Self {
            width: image.width() as usize,
            height: image.height() as usize,
            px,
        }
    }

    /// Box-average `factor`×`factor` blocks; trailing partial blocks are dropped.
    fn downscale(&self, factor: usize) -> Self {
        let width = self.width / factor;
        let height = self.height / factor;
        let scale = 1.0 / (factor * factor) as f32;
        let mut px = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                let mut acc = 0.0;
                for dy in 0..factor {
                    let row = (y * factor + dy) * self.width + x * factor;
                    acc += self.px[row..row + factor].iter().sum::<f32>();
                }
                px.push(acc * scale);
            }
        }
        Self { width, height, px }
    }
}

/// Summed-area tables of values and squared values, for O(1) window stats.
struct Integral {
    stride: usize,
    sum: Vec<f64>,
    sq: Vec<f64>,
}

impl Integral {
    fn new(plane: &Plane) -> Self {
        let stride = plane.width + 1;
        let mut sum = vec![0.0; stride * (plane.height + 1)];
        let mut sq = vec![0.0; stride * (plane.height + 1)];
        for y in 0..plane.height {
            let mut row_sum = 0.0;
            let mut row_sq = 0.0;
            for x in 0..plane.width {
                let v = f64::from(plane.px[y * plane.width + x]);
                row_sum += v;
                row_sq += v * v;
                let idx = (y + 1) * stride + x + 1;
                sum[idx] = sum[idx - stride] + row_sum;
                sq[idx] = sq[idx - stride] + row_sq;
            }
        }
        Self { stride, sum, sq }
    }

    fn window(&self, x: usize, y: usize, w: usize, h: usize) -> (f64, f64) {
        let a = y * self.stride + x;
        let b = a + w;
        let c = (y + h) * self.stride + x;
        let d = c + w;
        (
            self.sum[d] - self.sum[b] - self.sum[c] + self.sum[a],
            self.sq[d] - self.sq[b] - self.sq[c] + self.sq[a],
        )
    }
}

/// Template with its mean removed, ready for correlation.
struct Prepared {
    width: usize,
    height: usize,
    centered: Vec<f32>,
    norm: f64,
}

impl Prepared {
    fn new(template: &Plane) -> Self {
        let n = template.px.len() as f64;
        let mean = template.px.iter().map(|&v| f64::from(v)).sum::<f64>() / n;
        let centered: Vec<f32> = template.px.iter().map(|&v| v - mean as f32).collect();
        let norm = centered
            .iter()
            .map(|&v| f64::from(v) * f64::from(v))
            .sum::<f64>()
            .sqrt();
        Self {
            width: template.width,
            height: template.height,
            centered,
            norm,
        }
    }

    fn score_at(&self, screen: &Plane, integral: &Integral, x: usize, y: usize) -> f32 {
        let n = (self.width * self.height) as f64;
        let (sum, sq) = integral.window(x, y, self.width, self.height);
        let variance = sq - sum * sum / n;
        if variance <= FLAT_VARIANCE * n || self.norm * self.norm <= FLAT_VARIANCE * n {
            return 0.0;
        }
        // Σ(t - t̄)(s - s̄) == Σ(t - t̄)·s since Σ(t - t̄) is zero.
        let mut cross = 0.0f64;
        for ty in 0..self.height {
            let row = (y + ty) * screen.width + x;
            let screen_row = &screen.px[row..row + self.width];
            let template_row = &self.centered[ty * self.width..(ty + 1) * self.width];
            cross += screen_row
                .iter()
                .zip(template_row)
                .map(|(&s, &t)| f64::from(s) * f64::from(t))
                .sum::<f64>();
        }
        (cross / (self.norm * variance.sqrt())).clamp(-1.0, 1.0) as f32
    }
}

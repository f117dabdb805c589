//! CSS color parsing.
//!
//! Two entry points exist on purpose: [`Color::parse_legacy`] understands only the sRGB
//! notations a canvas-snapshot renderer handles, while [`Color::parse`] also converts the
//! wide-gamut functional notations (`lab()`, `lch()`, `oklab()`, `oklch()`) to sRGB.

/// Straight-alpha sRGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ColorError {
    #[error("unsupported color function `{function}`")]
    UnsupportedFunction { function: String },
    #[error("invalid color `{0}`")]
    Invalid(String),
}

const WIDE_GAMUT_FUNCTIONS: &[&str] = &["oklab(", "oklch(", "lab(", "lch(", "color("];

/// Whether a CSS value uses a color function that legacy rasterizers cannot parse.
pub fn uses_wide_gamut_function(value: &str) -> bool {
    let v = value.to_ascii_lowercase();
    WIDE_GAMUT_FUNCTIONS.iter().any(|f| v.contains(f))
}

const NAMED: &[(&str, [u8; 3])] = &[
    ("black", [0, 0, 0]),
    ("white", [255, 255, 255]),
    ("red", [255, 0, 0]),
    ("green", [0, 128, 0]),
    ("lime", [0, 255, 0]),
    ("blue", [0, 0, 255]),
    ("yellow", [255, 255, 0]),
    ("orange", [255, 165, 0]),
    ("purple", [128, 0, 128]),
    ("gray", [128, 128, 128]),
    ("grey", [128, 128, 128]),
    ("darkgray", [169, 169, 169]),
    ("darkgrey", [169, 169, 169]),
    ("lightgray", [211, 211, 211]),
    ("lightgrey", [211, 211, 211]),
    ("silver", [192, 192, 192]),
    ("maroon", [128, 0, 0]),
    ("navy", [0, 0, 128]),
    ("teal", [0, 128, 128]),
    ("olive", [128, 128, 0]),
    ("aqua", [0, 255, 255]),
    ("cyan", [0, 255, 255]),
    ("fuchsia", [255, 0, 255]),
    ("magenta", [255, 0, 255]),
    ("gold", [255, 215, 0]),
    ("pink", [255, 192, 203]),
];

impl Color {
    pub const BLACK: Color = Color::rgba(0, 0, 0, 255);
    pub const WHITE: Color = Color::rgba(255, 255, 255, 255);
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn is_opaque(self) -> bool {
        self.a == 255
    }

    pub fn is_transparent(self) -> bool {
        self.a == 0
    }

    pub fn alpha_f32(self) -> f32 {
        f32::from(self.a) / 255.0
    }

    /// `#rrggbb`, or `#rrggbbaa` when not opaque.
    pub fn to_hex(self) -> String {
        if self.is_opaque() {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }

    /// sRGB notations only; wide-gamut functions fail with [`ColorError::UnsupportedFunction`].
    pub fn parse_legacy(text: &str) -> Result<Self, ColorError> {
        parse_color(text, false)
    }

    /// All supported notations, wide-gamut functions converted (and clamped) to sRGB.
    pub fn parse(text: &str) -> Result<Self, ColorError> {
        parse_color(text, true)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Component {
    Number(f32),
    Percent(f32),
    None,
}

impl Component {
    fn parse(token: &str) -> Option<Self> {
        let t = token.trim();
        if t.eq_ignore_ascii_case("none") {
            return Some(Self::None);
        }
        if let Some(p) = t.strip_suffix('%') {
            return p.trim().parse::<f32>().ok().map(Self::Percent);
        }
        let lower = t.to_ascii_lowercase();
        let (num, factor) = if let Some(v) = lower.strip_suffix("deg") {
            (v.to_string(), 1.0)
        } else if let Some(v) = lower.strip_suffix("grad") {
            (v.to_string(), 0.9)
        } else if let Some(v) = lower.strip_suffix("rad") {
            (v.to_string(), 180.0 / std::f32::consts::PI)
        } else if let Some(v) = lower.strip_suffix("turn") {
            (v.to_string(), 360.0)
        } else {
            (lower, 1.0)
        };
        num.trim()
            .parse::<f32>()
            .ok()
            .filter(|v| v.is_finite())
            .map(|v| Self::Number(v * factor))
    }

    /// Resolves against the reference range that `100%` maps to.
    fn value(self, percent_reference: f32) -> f32 {
        match self {
            Self::Number(v) => v,
            Self::Percent(p) => p / 100.0 * percent_reference,
            Self::None => 0.0,
        }
    }

    fn alpha(self) -> f32 {
        match self {
            Self::Number(v) => v.clamp(0.0, 1.0),
            Self::Percent(p) => (p / 100.0).clamp(0.0, 1.0),
            Self::None => 0.0,
        }
    }
}

fn parse_color(text: &str, wide_gamut: bool) -> Result<Color, ColorError> {
    let s = text.trim().to_ascii_lowercase();
    let invalid = || ColorError::Invalid(text.trim().to_string());

    if s == "transparent" {
        return Ok(Color::TRANSPARENT);
    }
    if let Some(hex) = s.strip_prefix('#') {
        return parse_hex(hex).ok_or_else(invalid);
    }
    if let Some((_, rgb)) = NAMED.iter().find(|(name, _)| *name == s) {
        return Ok(Color::rgba(rgb[0], rgb[1], rgb[2], 255));
    }

    let Some(open) = s.find('(') else {
        return Err(invalid());
    };
    let name = s[..open].trim();
    let Some(inner) = s[open + 1..].strip_suffix(')') else {
        return Err(invalid());
    };
    let (channels, alpha) = split_components(inner).ok_or_else(invalid)?;
    if channels.len() != 3 {
        return Err(invalid());
    }
    let alpha = alpha.map(Component::alpha).unwrap_or(1.0);
    let [c0, c1, c2] = [channels[0], channels[1], channels[2]];

    let linear_or_srgb = match name {
        "rgb" | "rgba" => {
            let rgb = [c0.value(255.0), c1.value(255.0), c2.value(255.0)];
            return Ok(from_srgb255(rgb, alpha));
        }
        "hsl" | "hsla" => {
            let rgb = hsl_to_srgb(c0.value(360.0), c1.value(1.0), c2.value(1.0));
            return Ok(from_unit_srgb(rgb, alpha));
        }
        "lab" | "lch" | "oklab" | "oklch" if !wide_gamut => {
            return Err(ColorError::UnsupportedFunction {
                function: name.to_string(),
            });
        }
        "lab" => lab_to_linear_srgb(c0.value(100.0), c1.value(125.0), c2.value(125.0)),
        "lch" => {
            let (a, b) = polar_to_cartesian(c1.value(150.0), c2.value(360.0));
            lab_to_linear_srgb(c0.value(100.0), a, b)
        }
        "oklab" => oklab_to_linear_srgb(c0.value(1.0), c1.value(0.4), c2.value(0.4)),
        "oklch" => {
            let (a, b) = polar_to_cartesian(c1.value(0.4), c2.value(360.0));
            oklab_to_linear_srgb(c0.value(1.0), a, b)
        }
        other => {
            return Err(ColorError::UnsupportedFunction {
                function: other.to_string(),
            });
        }
    };
    Ok(from_unit_srgb(linear_or_srgb.map(gamma_encode), alpha))
}

/// Splits `a b c / d` or `a, b, c, d` into channels plus an optional alpha.
fn split_components(inner: &str) -> Option<(Vec<Component>, Option<Component>)> {
    let (main, alpha) = match inner.split_once('/') {
        Some((m, a)) => (m, Some(Component::parse(a)?)),
        None => (inner, None),
    };
    let tokens: Vec<&str> = if main.contains(',') {
        main.split(',').map(str::trim).collect()
    } else {
        main.split_ascii_whitespace().collect()
    };
    let mut parsed = tokens
        .into_iter()
        .map(Component::parse)
        .collect::<Option<Vec<_>>>()?;
    let alpha = match (alpha, parsed.len()) {
        (Some(a), _) => Some(a),
        // Legacy comma syntax carries alpha as a fourth argument.
        (None, 4) => parsed.pop(),
        (None, _) => None,
    };
    Some((parsed, alpha))
}

fn parse_hex(hex: &str) -> Option<Color> {
    fn hex2(b: &[u8]) -> Option<u8> {
        let hi = (*b.first()? as char).to_digit(16)? as u8;
        let lo = (*b.get(1)? as char).to_digit(16)? as u8;
        Some((hi << 4) | lo)
    }
    fn hex1(c: u8) -> Option<u8> {
        let v = (c as char).to_digit(16)? as u8;
        Some((v << 4) | v)
    }

    let bytes = hex.as_bytes();
    match bytes.len() {
        3 => Some(Color::rgba(
            hex1(bytes[0])?,
            hex1(bytes[1])?,
            hex1(bytes[2])?,
            255,
        )),
        4 => Some(Color::rgba(
            hex1(bytes[0])?,
            hex1(bytes[1])?,
            hex1(bytes[2])?,
            hex1(bytes[3])?,
        )),
        6 => Some(Color::rgba(
            hex2(&bytes[0..2])?,
            hex2(&bytes[2..4])?,
            hex2(&bytes[4..6])?,
            255,
        )),
        8 => Some(Color::rgba(
            hex2(&bytes[0..2])?,
            hex2(&bytes[2..4])?,
            hex2(&bytes[4..6])?,
            hex2(&bytes[6..8])?,
        )),
        _ => None,
    }
}

fn unit_to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn from_srgb255(rgb: [f32; 3], alpha: f32) -> Color {
    from_unit_srgb(rgb.map(|c| c / 255.0), alpha)
}

fn from_unit_srgb(rgb: [f32; 3], alpha: f32) -> Color {
    Color::rgba(
        unit_to_u8(rgb[0]),
        unit_to_u8(rgb[1]),
        unit_to_u8(rgb[2]),
        unit_to_u8(alpha),
    )
}

fn hsl_to_srgb(h: f32, s: f32, l: f32) -> [f32; 3] {
    let h = h.rem_euclid(360.0);
    let s = s.clamp(0.0, 1.0);
    let l = l.clamp(0.0, 1.0);
    let f = |n: f32| {
        let k = (n + h / 30.0) % 12.0;
        let a = s * l.min(1.0 - l);
        l - a * (k - 3.0).min(9.0 - k).clamp(-1.0, 1.0)
    };
    [f(0.0), f(8.0), f(4.0)]
}

fn polar_to_cartesian(chroma: f32, hue_deg: f32) -> (f32, f32) {
    let h = hue_deg.to_radians();
    (chroma * h.cos(), chroma * h.sin())
}

fn gamma_encode(c: f32) -> f32 {
    if c <= 0.003_130_8 {
        12.92 * c
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

fn oklab_to_linear_srgb(l: f32, a: f32, b: f32) -> [f32; 3] {
    let l_ = l + 0.396_337_78 * a + 0.215_803_76 * b;
    let m_ = l - 0.105_561_346 * a - 0.063_854_17 * b;
    let s_ = l - 0.089_484_18 * a - 1.291_485_5 * b;
    let (l3, m3, s3) = (l_.powi(3), m_.powi(3), s_.powi(3));
    [
        4.076_741_7 * l3 - 3.307_711_6 * m3 + 0.230_969_94 * s3,
        -1.268_438 * l3 + 2.609_757_4 * m3 - 0.341_319_38 * s3,
        -0.004_196_086_3 * l3 - 0.703_418_6 * m3 + 1.707_614_7 * s3,
    ]
}

/// CIE Lab (D50) to linear sRGB (D65) via Bradford-adapted XYZ.
fn lab_to_linear_srgb(l: f32, a: f32, b: f32) -> [f32; 3] {
    const KAPPA: f32 = 24389.0 / 27.0;
    const EPSILON: f32 = 216.0 / 24389.0;
    let fy = (l + 16.0) / 116.0;
    let fx = fy + a / 500.0;
    let fz = fy - b / 200.0;
    let finv = |t: f32| {
        let t3 = t * t * t;
        if t3 > EPSILON {
            t3
        } else {
            (116.0 * t - 16.0) / KAPPA
        }
    };
    let yr = if l > KAPPA * EPSILON {
        fy * fy * fy
    } else {
        l / KAPPA
    };
    let x = finv(fx) * 0.964_22;
    let y = yr;
    let z = finv(fz) * 0.825_21;
    [
        3.133_856_1 * x - 1.616_866_7 * y - 0.490_614_6 * z,
        -0.978_768_4 * x + 1.916_141_5 * y + 0.033_454 * z,
        0.071_945_3 * x - 0.228_991_4 * y + 1.405_242_7 * z,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_parser_rejects_wide_gamut_functions() {
        let err = Color::parse_legacy("oklch(0.637 0.237 25.331)").unwrap_err();
        assert_eq!(
            err,
            ColorError::UnsupportedFunction {
                function: "oklch".to_string()
            }
        );
        assert!(Color::parse_legacy("lab(50% 40 59.5)").is_err());
    }

    #[test]
    fn legacy_notations_parse() {
        assert_eq!(Color::parse_legacy("#fff").unwrap(), Color::WHITE);
        assert_eq!(
            Color::parse_legacy("rgba(255, 0, 0, 0.5)").unwrap(),
            Color::rgba(255, 0, 0, 128)
        );
        assert_eq!(
            Color::parse_legacy("rgb(0 128 255 / 100%)").unwrap(),
            Color::rgba(0, 128, 255, 255)
        );
        assert_eq!(
            Color::parse_legacy("hsl(120, 100%, 50%)").unwrap(),
            Color::rgba(0, 255, 0, 255)
        );
        assert_eq!(Color::parse_legacy("Transparent").unwrap(), Color::TRANSPARENT);
    }

    #[test]
    fn oklch_converts_to_srgb() {
        // Achromatic extremes map to black and white.
        assert_eq!(Color::parse("oklch(0 0 0)").unwrap(), Color::BLACK);
        assert_eq!(Color::parse("oklch(100% 0 0)").unwrap(), Color::WHITE);

        // Tailwind's red-500 is close to #fb2c36.
        let red = Color::parse("oklch(63.7% 0.237 25.331)").unwrap();
        assert!(red.r > 240 && red.g < 70 && red.b < 80, "{red:?}");
    }

    #[test]
    fn lab_converts_to_srgb() {
        assert_eq!(Color::parse("lab(100 0 0)").unwrap(), Color::WHITE);
        let mid = Color::parse("lab(50% 0 0 / 0.5)").unwrap();
        assert_eq!(mid.a, 128);
        assert!((i32::from(mid.r) - 119).abs() <= 2, "{mid:?}");
        assert_eq!(mid.r, mid.g);
    }

    #[test]
    fn detects_wide_gamut_values() {
        assert!(uses_wide_gamut_function("1px solid OKLCH(0.5 0.1 20)"));
        assert!(uses_wide_gamut_function("lab(50 0 0)"));
        assert!(!uses_wide_gamut_function("rgb(0, 0, 0)"));
    }
}

//! Output size policy
//!
//! Maps a symbolic size token to a target resolution relative to the original
//! image. Tokens name a pixel-area budget rather than literal dimensions, and an
//! image is never enlarged to meet a budget.

/// Recognized size tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeToken {
    /// Keep original resolution
    Full,
    /// Keep original resolution
    FourK,
    /// Keep original resolution
    Auto,
    /// 0.25 megapixels
    Preview,
    /// 1.5 megapixels
    Medium,
    /// 4 megapixels
    Hd,
    /// 50 megapixels
    FiftyMp,
}

impl SizeToken {
    /// Parse a client token; surrounding whitespace and case are ignored
    ///
    /// Returns `None` for unrecognized tokens.
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        match token.trim().to_lowercase().as_str() {
            "full" => Some(Self::Full),
            "4k" => Some(Self::FourK),
            "auto" => Some(Self::Auto),
            "preview" => Some(Self::Preview),
            "medium" => Some(Self::Medium),
            "hd" => Some(Self::Hd),
            "50mp" => Some(Self::FiftyMp),
            _ => None,
        }
    }

    /// Target area in megapixels, or `None` for tokens that keep the original size
    #[must_use]
    pub fn target_megapixels(self) -> Option<f64> {
        match self {
            Self::Full | Self::FourK | Self::Auto => None,
            Self::Preview => Some(0.25),
            Self::Medium => Some(1.5),
            Self::Hd => Some(4.0),
            Self::FiftyMp => Some(50.0),
        }
    }
}

/// Stateless size policy
pub struct SizePolicy;

impl SizePolicy {
    /// Compute the output resolution for `original` under `token`
    ///
    /// Returns `None` when no resize should happen: the token is absent,
    /// unrecognized, one of `full`/`4k`/`auto`, or the image already fits the
    /// token's area budget. Otherwise both sides are scaled by the same factor
    /// `sqrt(target_area / original_area)` and truncated.
    ///
    /// # Examples
    /// ```rust
    /// use bgremove_api::services::SizePolicy;
    ///
    /// assert_eq!(SizePolicy::compute_target_size((5000, 4000), Some("preview")), Some((559, 447)));
    /// assert_eq!(SizePolicy::compute_target_size((800, 600), Some("hd")), None);
    /// assert_eq!(SizePolicy::compute_target_size((1920, 1080), Some("banana")), None);
    /// ```
    #[must_use]
    pub fn compute_target_size(original: (u32, u32), token: Option<&str>) -> Option<(u32, u32)> {
        let target_mp = SizeToken::parse(token?)?.target_megapixels()?;

        let (width, height) = original;
        let original_area = f64::from(width) * f64::from(height);
        let target_area = target_mp * 1e6;
        if original_area <= target_area {
            return None;
        }

        let scale = (target_area / original_area).sqrt();
        // A side can only floor to zero for extreme aspect ratios
        let new_width = ((f64::from(width) * scale).floor() as u32).max(1);
        let new_height = ((f64::from(height) * scale).floor() as u32).max(1);
        Some((new_width, new_height))
    }
}

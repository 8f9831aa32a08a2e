//! Strategy selection and application for OCR binarization.
//!
//! The selector is a pure function of a [`BrightnessProfile`]: an ordered
//! table of rules is walked top to bottom and the first matching rule picks
//! the [`Branch`]. Each branch then maps to a concrete [`Strategy`] with its
//! tuned parameters. The thresholds below are empirical; keep the exact
//! comparison operators when touching them.

use super::analyzer::BrightnessProfile;
use super::intermediate::Intermediates;
use super::steps::bilateral::{self, BilateralParams};
use super::steps::clahe::{self, ClaheParams};
use super::steps::threshold::{self, AdaptiveMethod, ThresholdParams};
use super::steps::{equalize, morphology};
use crate::error::OcrError;
use image::GrayImage;
use serde::Serialize;
use std::fmt;

/// Dark branch fires below this darkest-patch ratio (strict)
pub const DARK_PATCH_RATIO: f64 = 0.086;
/// Dark branch fires below this global mean (strict)
pub const DARK_MEAN: f64 = 200.0;
/// Bright branch fires above this global mean (strict)
pub const BRIGHT_MEAN: f64 = 231.0;

/// Which part of the decision table matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Branch {
    /// Bold strokes or a generally dark page
    Dark,
    /// Very bright page, likely light or faint text
    Bright,
    /// Everything in between
    Normal,
}

impl Branch {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dark => "dark",
            Self::Bright => "bright",
            Self::Normal => "normal",
        }
    }
}

struct Rule {
    branch: Branch,
    matches: fn(&BrightnessProfile) -> bool,
}

fn is_dark(profile: &BrightnessProfile) -> bool {
    profile.darkest_patch_ratio < DARK_PATCH_RATIO || profile.global_mean < DARK_MEAN
}

fn is_bright(profile: &BrightnessProfile) -> bool {
    profile.global_mean > BRIGHT_MEAN
}

fn always(_: &BrightnessProfile) -> bool {
    true
}

const RULES: [Rule; 3] = [
    Rule {
        branch: Branch::Dark,
        matches: is_dark,
    },
    Rule {
        branch: Branch::Bright,
        matches: is_bright,
    },
    Rule {
        branch: Branch::Normal,
        matches: always,
    },
];

/// First branch whose rule matches the profile
pub fn branch_for(profile: &BrightnessProfile) -> Branch {
    RULES
        .iter()
        .find(|rule| (rule.matches)(profile))
        .map(|rule| rule.branch)
        .unwrap_or(Branch::Normal)
}

/// Enhancement used by the dark branch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum DarkVariant {
    /// CLAHE only
    #[default]
    Clahe,
    /// Bilateral smoothing only
    Bilateral,
    /// Histogram equalization, adaptive mean threshold, closing
    EqualizeHist,
    /// CLAHE, adaptive mean threshold, closing
    ClaheThreshold,
    /// Adaptive Gaussian threshold only
    Threshold,
}

/// Enhancement used by the normal branch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum NormalVariant {
    /// CLAHE only
    #[default]
    Clahe,
    /// Bilateral smoothing only
    Bilateral,
    /// Adaptive mean threshold only
    Threshold,
    /// Leave the grayscale image as is
    None,
}

/// Server-wide choice of the alternate enhancement paths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Variants {
    pub dark: DarkVariant,
    pub normal: NormalVariant,
}

/// One enhancement plan with all of its parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Strategy {
    Clahe(ClaheParams),
    Bilateral(BilateralParams),
    AdaptiveMean(ThresholdParams),
    AdaptiveGaussian(ThresholdParams),
    EqualizeHistThenThreshold(ThresholdParams),
    ClaheThenThreshold {
        clahe: ClaheParams,
        method: AdaptiveMethod,
        threshold: ThresholdParams,
        /// Intermediate stage name of the CLAHE output
        snapshot: &'static str,
    },
    None,
}

impl Strategy {
    fn apply(
        &self,
        image: GrayImage,
        intermediates: Option<&Intermediates>,
    ) -> Result<GrayImage, OcrError> {
        match *self {
            Self::Clahe(params) => clahe::apply(&image, params),
            Self::Bilateral(params) => bilateral::apply(&image, params),
            Self::AdaptiveMean(params) => threshold::apply(&image, AdaptiveMethod::Mean, params),
            Self::AdaptiveGaussian(params) => {
                threshold::apply(&image, AdaptiveMethod::Gaussian, params)
            }
            Self::EqualizeHistThenThreshold(params) => {
                let equalized = equalize::apply(&image)?;
                save(intermediates, "eqh_", &equalized);
                threshold::apply(&equalized, AdaptiveMethod::Mean, params)
            }
            Self::ClaheThenThreshold {
                clahe: clahe_params,
                method,
                threshold: params,
                snapshot,
            } => {
                let enhanced = clahe::apply(&image, clahe_params)?;
                save(intermediates, snapshot, &enhanced);
                threshold::apply(&enhanced, method, params)
            }
            Self::None => Ok(image),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clahe(p) => write!(f, "clahe({p})"),
            Self::Bilateral(p) => write!(f, "bilateral({p})"),
            Self::AdaptiveMean(p) => write!(f, "adaptive_mean({p})"),
            Self::AdaptiveGaussian(p) => write!(f, "adaptive_gaussian({p})"),
            Self::EqualizeHistThenThreshold(p) => write!(f, "equalize_hist+adaptive_mean({p})"),
            Self::ClaheThenThreshold {
                clahe,
                method,
                threshold,
                ..
            } => write!(f, "clahe({clahe})+{method:?}({threshold})"),
            Self::None => write!(f, "none"),
        }
    }
}

/// Outcome of the selector for one profile
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Selection {
    pub branch: Branch,
    pub strategy: Strategy,
    /// Follow the strategy with a 2x2 dilate then erode
    pub close_strokes: bool,
}

fn dark_selection(variant: DarkVariant) -> Selection {
    let strategy = match variant {
        DarkVariant::Clahe => Strategy::Clahe(ClaheParams::new(1.4, 6)),
        DarkVariant::Bilateral => Strategy::Bilateral(BilateralParams::new(6, 40.0, 60.0)),
        DarkVariant::EqualizeHist => {
            Strategy::EqualizeHistThenThreshold(ThresholdParams::new(11, 2.0))
        }
        DarkVariant::ClaheThreshold => Strategy::ClaheThenThreshold {
            clahe: ClaheParams::new(2.0, 6),
            method: AdaptiveMethod::Mean,
            threshold: ThresholdParams::new(11, 2.0),
            snapshot: "cl0_",
        },
        DarkVariant::Threshold => Strategy::AdaptiveGaussian(ThresholdParams::new(11, 2.0)),
    };
    let close_strokes = matches!(
        variant,
        DarkVariant::EqualizeHist | DarkVariant::ClaheThreshold
    );
    Selection {
        branch: Branch::Dark,
        strategy,
        close_strokes,
    }
}

fn bright_selection(mean: f64) -> Selection {
    let clip_limit = if mean > 238.0 {
        2.6
    } else if mean > 234.0 {
        2.4
    } else {
        2.2
    };
    // smallest neighbourhood keeps tiny light glyphs alive
    let threshold = if mean > 236.0 {
        ThresholdParams::new(3, 1.85)
    } else {
        ThresholdParams::new(7, 1.9)
    };
    Selection {
        branch: Branch::Bright,
        strategy: Strategy::ClaheThenThreshold {
            clahe: ClaheParams::new(clip_limit, 4),
            method: AdaptiveMethod::Gaussian,
            threshold,
            snapshot: "eqh_",
        },
        close_strokes: false,
    }
}

fn normal_selection(mean: f64, variant: NormalVariant) -> Selection {
    let strategy = match variant {
        NormalVariant::Clahe => {
            let clip_limit = if mean > 216.0 { 2.0 } else { 1.6 };
            Strategy::Clahe(ClaheParams::new(clip_limit, 6))
        }
        NormalVariant::Bilateral => Strategy::Bilateral(BilateralParams::new(4, 40.0, 70.0)),
        NormalVariant::Threshold => Strategy::AdaptiveMean(ThresholdParams::new(11, 1.9)),
        NormalVariant::None => Strategy::None,
    };
    Selection {
        branch: Branch::Normal,
        strategy,
        close_strokes: false,
    }
}

/// Picks and applies the enhancement for an image
#[derive(Debug, Clone, Copy, Default)]
pub struct Binarizer {
    variants: Variants,
}

impl Binarizer {
    pub fn new(variants: Variants) -> Self {
        Self { variants }
    }

    /// `None` when optimization is off
    pub fn select(&self, profile: &BrightnessProfile, optimize: bool) -> Option<Selection> {
        if !optimize {
            return None;
        }
        let selection = match branch_for(profile) {
            Branch::Dark => dark_selection(self.variants.dark),
            Branch::Bright => bright_selection(profile.global_mean),
            Branch::Normal => normal_selection(profile.global_mean, self.variants.normal),
        };
        Some(selection)
    }

    pub fn binarize(
        &self,
        image: GrayImage,
        profile: &BrightnessProfile,
        optimize: bool,
        intermediates: Option<&Intermediates>,
    ) -> Result<GrayImage, OcrError> {
        let Some(selection) = self.select(profile, optimize) else {
            return Ok(image);
        };

        tracing::debug!(
            branch = selection.branch.as_str(),
            strategy = %selection.strategy,
            close_strokes = selection.close_strokes,
            "Selected binarization strategy"
        );

        if selection.branch == Branch::Dark {
            save(intermediates, "t1_", &image);
        }

        let mut result = selection.strategy.apply(image, intermediates)?;

        if selection.branch == Branch::Dark {
            save(intermediates, "t2_", &result);
        }

        if selection.close_strokes {
            let k = morphology::CLOSE_KERNEL;
            let dilated = morphology::dilate(&result, k, k, 1)?;
            save(intermediates, "dil_", &dilated);
            result = morphology::erode(&dilated, k, k, 1)?;
            save(intermediates, "er_", &result);
        }

        Ok(result)
    }
}

fn save(intermediates: Option<&Intermediates>, stage: &str, image: &GrayImage) {
    if let Some(intermediates) = intermediates {
        intermediates.save(stage, image);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::analyzer::{analyze, DEFAULT_PATCH_SIZE};
    use image::Luma;

    fn profile(global_mean: f64, darkest_patch_ratio: f64) -> BrightnessProfile {
        BrightnessProfile {
            global_mean,
            darkest_patch_ratio,
        }
    }

    fn selected(p: BrightnessProfile) -> Selection {
        Binarizer::default().select(&p, true).unwrap()
    }

    #[test]
    fn test_patch_ratio_boundary_is_strict() {
        assert_eq!(branch_for(&profile(220.0, 0.086)), Branch::Normal);
        assert_eq!(branch_for(&profile(220.0, 0.0859999)), Branch::Dark);
    }

    #[test]
    fn test_dark_mean_boundary_is_strict() {
        assert_eq!(branch_for(&profile(200.0, 0.5)), Branch::Normal);
        assert_eq!(branch_for(&profile(199.9999, 0.5)), Branch::Dark);
    }

    #[test]
    fn test_bright_mean_boundary_is_strict() {
        assert_eq!(branch_for(&profile(231.0, 0.5)), Branch::Normal);
        assert_eq!(branch_for(&profile(231.0001, 0.5)), Branch::Bright);
    }

    #[test]
    fn test_dark_patch_wins_over_bright_mean() {
        assert_eq!(branch_for(&profile(250.0, 0.05)), Branch::Dark);
    }

    #[test]
    fn test_mid_range_selects_normal_and_is_idempotent() {
        for mean in [200.0, 205.5, 216.0, 216.5, 231.0] {
            for ratio in [0.086, 0.3, 1.0] {
                let p = profile(mean, ratio);
                let first = selected(p);
                assert_eq!(first.branch, Branch::Normal);
                assert_eq!(selected(p), first);
            }
        }
    }

    #[test]
    fn test_dark_default_is_clahe_without_closing() {
        let s = selected(profile(150.0, 0.3));
        assert_eq!(s.strategy, Strategy::Clahe(ClaheParams::new(1.4, 6)));
        assert!(!s.close_strokes);
    }

    #[test]
    fn test_dark_threshold_variants_close_strokes() {
        let p = profile(150.0, 0.3);
        for (variant, closes) in [
            (DarkVariant::Clahe, false),
            (DarkVariant::Bilateral, false),
            (DarkVariant::EqualizeHist, true),
            (DarkVariant::ClaheThreshold, true),
            (DarkVariant::Threshold, false),
        ] {
            let binarizer = Binarizer::new(Variants {
                dark: variant,
                ..Variants::default()
            });
            let s = binarizer.select(&p, true).unwrap();
            assert_eq!(s.close_strokes, closes, "{variant:?}");
        }
    }

    #[test]
    fn test_bright_clip_and_block_ranges() {
        let clahe_of = |s: Selection| match s.strategy {
            Strategy::ClaheThenThreshold {
                clahe, threshold, ..
            } => (clahe, threshold),
            other => panic!("unexpected strategy {other:?}"),
        };

        let (c, t) = clahe_of(selected(profile(232.0, 0.5)));
        assert_eq!(c, ClaheParams::new(2.2, 4));
        assert_eq!(t, ThresholdParams::new(7, 1.9));

        let (c, t) = clahe_of(selected(profile(234.0, 0.5)));
        assert_eq!(c.clip_limit, 2.2);
        assert_eq!(t.block_size, 7);

        let (c, t) = clahe_of(selected(profile(235.0, 0.5)));
        assert_eq!(c.clip_limit, 2.4);
        assert_eq!(t.block_size, 7);

        let (c, t) = clahe_of(selected(profile(236.5, 0.5)));
        assert_eq!(c.clip_limit, 2.4);
        assert_eq!(t, ThresholdParams::new(3, 1.85));

        let (c, _) = clahe_of(selected(profile(238.5, 0.5)));
        assert_eq!(c.clip_limit, 2.6);
    }

    #[test]
    fn test_bright_branch_never_closes() {
        let s = selected(profile(245.0, 0.5));
        assert_eq!(s.branch, Branch::Bright);
        assert!(!s.close_strokes);
    }

    #[test]
    fn test_normal_clip_limit_split() {
        assert_eq!(
            selected(profile(216.0, 0.5)).strategy,
            Strategy::Clahe(ClaheParams::new(1.6, 6))
        );
        assert_eq!(
            selected(profile(216.1, 0.5)).strategy,
            Strategy::Clahe(ClaheParams::new(2.0, 6))
        );
    }

    #[test]
    fn test_normal_variants() {
        let p = profile(220.0, 0.5);
        let with = |normal| {
            Binarizer::new(Variants {
                normal,
                ..Variants::default()
            })
            .select(&p, true)
            .unwrap()
            .strategy
        };
        assert_eq!(
            with(NormalVariant::Bilateral),
            Strategy::Bilateral(BilateralParams::new(4, 40.0, 70.0))
        );
        assert_eq!(
            with(NormalVariant::Threshold),
            Strategy::AdaptiveMean(ThresholdParams::new(11, 1.9))
        );
        assert_eq!(with(NormalVariant::None), Strategy::None);
    }

    #[test]
    fn test_optimize_off_passes_through() {
        let img = GrayImage::from_fn(9, 9, |x, y| Luma([(x * 20 + y) as u8]));
        let p = analyze(&img, DEFAULT_PATCH_SIZE).unwrap();
        assert!(Binarizer::default().select(&p, false).is_none());
        assert_eq!(
            Binarizer::default()
                .binarize(img.clone(), &p, false, None)
                .unwrap(),
            img
        );
    }

    #[test]
    fn test_uniform_dark_gray_goes_through_clahe() {
        let img = GrayImage::from_pixel(20, 20, Luma([50]));
        let p = analyze(&img, DEFAULT_PATCH_SIZE).unwrap();

        assert_eq!(p.global_mean, 50.0);
        assert!((p.darkest_patch_ratio - 50.0 / 255.0).abs() < 1e-9);
        assert_eq!(branch_for(&p), Branch::Dark);

        let result = Binarizer::default()
            .binarize(img.clone(), &p, true, None)
            .unwrap();
        assert_eq!(result.dimensions(), img.dimensions());
        assert_ne!(result, img);
    }

    #[test]
    fn test_closing_variant_runs_end_to_end() {
        let mut img = GrayImage::from_pixel(24, 24, Luma([180]));
        for x in 4..20 {
            img.put_pixel(x, 12, Luma([20]));
        }
        let p = analyze(&img, DEFAULT_PATCH_SIZE).unwrap();
        let binarizer = Binarizer::new(Variants {
            dark: DarkVariant::ClaheThreshold,
            ..Variants::default()
        });

        let result = binarizer.binarize(img, &p, true, None).unwrap();

        assert_eq!(result.dimensions(), (24, 24));
        assert!(result.pixels().all(|px| px.0[0] == 0 || px.0[0] == 255));
    }

    #[test]
    fn test_clahe_snapshot_stage_depends_on_branch() {
        let img = GrayImage::from_fn(16, 16, |x, y| Luma([200 + ((x * 7 + y * 3) % 50) as u8]));
        let dir = tempfile::tempdir().unwrap();

        let bright = Intermediates::new(dir.path(), "req", 0, "bright.png");
        Binarizer::default()
            .binarize(img.clone(), &profile(245.0, 0.5), true, Some(&bright))
            .unwrap();
        assert!(bright.path_for("eqh_").exists());
        assert!(!bright.path_for("cl0_").exists());

        let dark = Intermediates::new(dir.path(), "req", 1, "dark.png");
        Binarizer::new(Variants {
            dark: DarkVariant::ClaheThreshold,
            ..Variants::default()
        })
        .binarize(img, &profile(120.0, 0.5), true, Some(&dark))
        .unwrap();
        assert!(dark.path_for("cl0_").exists());
        assert!(!dark.path_for("eqh_").exists());
        assert!(dark.path_for("t1_").exists());
    }
}

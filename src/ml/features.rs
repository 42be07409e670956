//! Feature extraction for ML predictions
//!
//! Converts a validated prediction request plus the static reference data
//! into the seven-column feature vector the fitted preprocessor expects.

use std::fmt;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate};

use super::address::AddressFrequencyMaps;
use crate::reference::{NUM_PLACE_FEATURES, ReferenceDataset};
use crate::request::{FestivalType, PredictionRequest};
use crate::traits::PlaceProjector;

/// Season of the festival start date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Fall,
}

impl Season {
    pub const ALL: [Season; 4] = [Season::Winter, Season::Spring, Season::Summer, Season::Fall];

    /// Map a calendar month (1-12) to its season.
    pub fn from_month(month: u32) -> Option<Self> {
        match month {
            12 | 1 | 2 => Some(Season::Winter),
            3..=5 => Some(Season::Spring),
            6..=8 => Some(Season::Summer),
            9..=11 => Some(Season::Fall),
            _ => None,
        }
    }

    pub fn from_date(date: NaiveDate) -> Self {
        // chrono months are always 1-12
        Self::from_month(date.month()).unwrap_or(Season::Winter)
    }

    /// Label used as the categorical value at training time.
    pub fn label(self) -> &'static str {
        match self {
            Season::Winter => "겨울",
            Season::Spring => "봄",
            Season::Summer => "여름",
            Season::Fall => "가을",
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Top-level festival category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FestivalCategory {
    CultureArts,
    TraditionHistory,
    EcologyNature,
    SpecialtyProduct,
    CommunityHarmony,
    Tourism,
    Other,
    Experience,
}

/// Keyword groups checked in order; the first group with a hit wins.
const CATEGORY_RULES: [(&[&str], FestivalCategory); 8] = [
    (&["문화", "예술"], FestivalCategory::CultureArts),
    (&["전통", "역사"], FestivalCategory::TraditionHistory),
    (&["생태", "자연", "환경"], FestivalCategory::EcologyNature),
    (&["특산", "먹거리", "농산", "수산"], FestivalCategory::SpecialtyProduct),
    (&["주민화합", "시민화합", "화합"], FestivalCategory::CommunityHarmony),
    (&["관광"], FestivalCategory::Tourism),
    (&["기타"], FestivalCategory::Other),
    (&["체험"], FestivalCategory::Experience),
];

impl FestivalCategory {
    pub const ALL: [FestivalCategory; 8] = [
        FestivalCategory::CultureArts,
        FestivalCategory::TraditionHistory,
        FestivalCategory::EcologyNature,
        FestivalCategory::SpecialtyProduct,
        FestivalCategory::CommunityHarmony,
        FestivalCategory::Tourism,
        FestivalCategory::Other,
        FestivalCategory::Experience,
    ];

    /// Classify a free-text festival type.
    pub fn classify(raw: &str) -> Self {
        let normalized = normalize_type(raw);

        CATEGORY_RULES
            .iter()
            .find(|(keywords, _)| keywords.iter().any(|k| normalized.contains(k)))
            .map(|(_, category)| *category)
            .unwrap_or(FestivalCategory::Other)
    }

    /// Classify the request's festival type; non-text values are "other".
    pub fn from_festival_type(festival_type: &FestivalType) -> Self {
        match festival_type {
            FestivalType::Text(s) => Self::classify(s),
            FestivalType::NonText => FestivalCategory::Other,
        }
    }

    /// Label used as the categorical value at training time.
    pub fn label(self) -> &'static str {
        match self {
            FestivalCategory::CultureArts => "문화예술",
            FestivalCategory::TraditionHistory => "전통역사",
            FestivalCategory::EcologyNature => "생태자연",
            FestivalCategory::SpecialtyProduct => "특산물",
            FestivalCategory::CommunityHarmony => "주민화합",
            FestivalCategory::Tourism => "관광",
            FestivalCategory::Other => "기타",
            FestivalCategory::Experience => "체험행사",
        }
    }
}

impl fmt::Display for FestivalCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Lowercase, turn newlines into spaces, collapse whitespace runs and trim.
fn normalize_type(raw: &str) -> String {
    raw.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Features for a single prediction, in training-time column order.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    /// Budget in millions of won
    pub budget: f64,
    /// Distance to Seoul; `None` is left for the fitted imputer
    pub distance_to_capital: Option<f64>,
    /// Always 0.0; the training column leaked the target
    pub per_capita_budget: f64,
    pub place_pca: f64,
    pub address_score: f64,
    pub festival_category: FestivalCategory,
    pub season: Season,
}

impl FeatureVector {
    /// Number of columns
    pub const NUM_FEATURES: usize = 7;

    /// Training-time column names, in order.
    pub const COLUMNS: [&'static str; Self::NUM_FEATURES] = [
        "예산\n(백만)",
        "서울과거리",
        "1인당예산",
        "장소_PCA",
        "주소점수",
        "축제유형_대분류",
        "계절",
    ];

    /// Numeric columns (the first five of `COLUMNS`).
    pub const NUMERIC_COLUMNS: [&'static str; 5] = [
        "예산\n(백만)",
        "서울과거리",
        "1인당예산",
        "장소_PCA",
        "주소점수",
    ];

    /// Categorical columns (the last two of `COLUMNS`).
    pub const CATEGORICAL_COLUMNS: [&'static str; 2] = ["축제유형_대분류", "계절"];

    pub fn numeric_values(&self) -> [Option<f64>; 5] {
        [
            Some(self.budget),
            self.distance_to_capital,
            Some(self.per_capita_budget),
            Some(self.place_pca),
            Some(self.address_score),
        ]
    }

    pub fn categorical_values(&self) -> [&'static str; 2] {
        [self.festival_category.label(), self.season.label()]
    }
}

/// Builds feature vectors from requests and the static reference data
#[derive(Clone)]
pub struct FeatureExtractor {
    reference: Arc<ReferenceDataset>,
    address_maps: Arc<AddressFrequencyMaps>,
    projector: Option<Arc<dyn PlaceProjector>>,
}

impl FeatureExtractor {
    pub fn new(
        reference: Arc<ReferenceDataset>,
        address_maps: Arc<AddressFrequencyMaps>,
        projector: Option<Arc<dyn PlaceProjector>>,
    ) -> Self {
        Self {
            reference,
            address_maps,
            projector,
        }
    }

    /// Derive the feature vector for a request.
    pub fn extract(&self, request: &PredictionRequest) -> FeatureVector {
        let season = Season::from_date(request.start_date);
        let festival_category = FestivalCategory::from_festival_type(&request.festival_type);

        let lookup = self.reference.lookup(
            &request.region,
            &request.sub_region,
            &request.sub_sub_region,
        );
        let place_pca = self.place_pca(&lookup.place_features);

        let address_score = self.address_maps.score(
            &request.region,
            &request.sub_region,
            &request.sub_sub_region,
        );

        FeatureVector {
            budget: request.budget,
            distance_to_capital: lookup.distance_to_capital,
            per_capita_budget: 0.0,
            place_pca,
            address_score,
            festival_category,
            season,
        }
    }

    /// First principal component of the place features, 0.0 when unavailable.
    fn place_pca(&self, place_features: &[f64; NUM_PLACE_FEATURES]) -> f64 {
        let Some(projector) = self.projector.as_ref() else {
            tracing::debug!("No place projector configured, using 0.0 for place PCA");
            return 0.0;
        };

        if projector.n_features_in() != place_features.len() {
            tracing::warn!(
                "Place projector expects {} features, got {}; using 0.0 for place PCA",
                projector.n_features_in(),
                place_features.len()
            );
            return 0.0;
        }

        match projector.project(place_features) {
            Ok(components) => components.first().copied().unwrap_or(0.0),
            Err(e) => {
                tracing::warn!("Place projection failed, using 0.0: {}", e);
                0.0
            }
        }
    }
}

impl fmt::Debug for FeatureExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeatureExtractor")
            .field("reference_rows", &self.reference.len())
            .field("has_projector", &self.projector.is_some())
            .finish()
    }
}

//! Accuracy bucketing
//!
//! Reported accuracy is bucketed into three classes; the ordering matters,
//! because presence rows only ever upgrade to a strictly better class.

/// Bucketed geo-accuracy label, ordered worst to best
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PrecisionClass {
    /// Accuracy >= 200 m, or not reported
    Coarse,
    /// Accuracy < 200 m
    Medium,
    /// Accuracy < 50 m
    High,
}

impl PrecisionClass {
    /// Classify a reported accuracy in meters. Missing accuracy is coarse.
    pub fn from_accuracy(accuracy_m: Option<f64>) -> Self {
        match accuracy_m {
            Some(acc) if acc < 50.0 => Self::High,
            Some(acc) if acc < 200.0 => Self::Medium,
            _ => Self::Coarse,
        }
    }

    /// Stored string form
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Coarse => "coarse",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Parse the stored string form
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "coarse" => Some(Self::Coarse),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

impl std::fmt::Display for PrecisionClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

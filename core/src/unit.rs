use serde::Serialize;
use serde::Serializer;
use std::fmt;

/// Which way a measurement moves when it gets better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ImprovementDirection {
    BiggerIsBetter,
    SmallerIsBetter,
}

impl ImprovementDirection {
    pub fn name_suffix(self) -> &'static str {
        match self {
            ImprovementDirection::BiggerIsBetter => "_biggerIsBetter",
            ImprovementDirection::SmallerIsBetter => "_smallerIsBetter",
        }
    }
}

pub(crate) const UNITLESS_NUMBER: &str = "unitlessNumber";
const NORMALIZED_PERCENTAGE: &str = "normalizedPercentage";

const BASE_UNITS: &[&str] = &[
    "bytesPerSecond",
    "count",
    "energyInJoules",
    NORMALIZED_PERCENTAGE,
    "powerInWatts",
    "sigma",
    "sizeInBytes",
    "timeDurationInMs",
    "timeStampInMs",
    UNITLESS_NUMBER,
];

/// Legacy dashboard unit names: (legacy name, base unit, conversion factor).
const LEGACY_UNITS: &[(&str, &str, f64)] = &[
    ("%", NORMALIZED_PERCENTAGE, 0.01),
    ("percent", NORMALIZED_PERCENTAGE, 0.01),
    ("ms", "timeDurationInMs", 1.0),
    ("msBestFitFormat", "timeDurationInMs", 1.0),
    ("us", "timeDurationInMs", 0.001),
    ("ns", "timeDurationInMs", 0.000_001),
    ("s", "timeDurationInMs", 1000.0),
    ("sec", "timeDurationInMs", 1000.0),
    ("seconds", "timeDurationInMs", 1000.0),
    ("bytes", "sizeInBytes", 1.0),
    ("kb", "sizeInBytes", 1024.0),
    ("KB", "sizeInBytes", 1024.0),
    ("available_kB", "sizeInBytes", 1024.0),
    ("MB", "sizeInBytes", 1024.0 * 1024.0),
    ("count", "count", 1.0),
    ("objects", "count", 1.0),
    ("garbage_collections", "count", 1.0),
    ("fps", UNITLESS_NUMBER, 1.0),
    ("score", UNITLESS_NUMBER, 1.0),
    ("runs/s", UNITLESS_NUMBER, 1.0),
    ("Hz", UNITLESS_NUMBER, 1.0),
    ("W", "powerInWatts", 1.0),
    ("mW", "powerInWatts", 0.001),
    ("J", "energyInJoules", 1.0),
    ("mJ", "energyInJoules", 0.001),
    ("mWh", "energyInJoules", 3.6),
];

/// A display unit: a base unit, whether it describes a delta, and its
/// improvement direction. Renders as e.g. `timeDurationInMsDelta_smallerIsBetter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Unit {
    base: &'static str,
    delta: bool,
    improvement_direction: ImprovementDirection,
}

impl Unit {
    pub fn unitless(improvement_direction: ImprovementDirection) -> Self {
        Self {
            base: UNITLESS_NUMBER,
            delta: false,
            improvement_direction,
        }
    }

    pub fn normalized_percentage_delta(improvement_direction: ImprovementDirection) -> Self {
        Self {
            base: NORMALIZED_PERCENTAGE,
            delta: true,
            improvement_direction,
        }
    }

    /// Resolve a unit name as reported by the dashboard into a display unit
    /// plus the factor values must be multiplied by. Unknown names degrade to
    /// a dimensionless unit, and so does a name whose direction suffix
    /// disagrees with `improvement_direction`.
    pub fn resolve(name: &str, improvement_direction: ImprovementDirection) -> (Self, f64) {
        let (base, factor) = match split_direction_suffix(name) {
            (stripped, Some(direction)) => {
                let base = BASE_UNITS
                    .iter()
                    .find(|base| **base == stripped)
                    .filter(|_| direction == improvement_direction)
                    .copied()
                    .unwrap_or(UNITLESS_NUMBER);
                (base, 1.0)
            }
            (name, None) => {
                if let Some(base) = BASE_UNITS.iter().find(|base| **base == name) {
                    (*base, 1.0)
                } else if let Some((_, base, factor)) =
                    LEGACY_UNITS.iter().find(|(legacy, _, _)| *legacy == name)
                {
                    (*base, *factor)
                } else {
                    (UNITLESS_NUMBER, 1.0)
                }
            }
        };
        (
            Self {
                base,
                delta: false,
                improvement_direction,
            },
            factor,
        )
    }

    pub fn corresponding_delta_unit(self) -> Self {
        Self {
            delta: true,
            ..self
        }
    }

    pub fn base(&self) -> &'static str {
        self.base
    }

    pub fn is_delta(&self) -> bool {
        self.delta
    }

    pub fn improvement_direction(&self) -> ImprovementDirection {
        self.improvement_direction
    }

    pub fn name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let delta = if self.delta { "Delta" } else { "" };
        write!(
            f,
            "{}{delta}{}",
            self.base,
            self.improvement_direction.name_suffix()
        )
    }
}

impl Serialize for Unit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

fn split_direction_suffix(name: &str) -> (&str, Option<ImprovementDirection>) {
    for direction in [
        ImprovementDirection::BiggerIsBetter,
        ImprovementDirection::SmallerIsBetter,
    ] {
        if let Some(stripped) = name.strip_suffix(direction.name_suffix()) {
            return (stripped, Some(direction));
        }
    }
    (name, None)
}

//! Read diagnostics: timing and counts for each stage of a link import.
//!
//! These are permanent instrumentation for tuning the search parameters
//! and comparing index backends. Every call to
//! [`read_links_with_diagnostics`](crate::read_links_with_diagnostics)
//! collects them alongside the imported links.
//!
//! The engine never reads the system clock itself. Timestamps come from
//! a caller-supplied [`Clock`]; [`NullClock`] records zero durations.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::CoordinateSource;

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Source of timestamps for stage timing.
pub trait Clock {
    /// Opaque point in time.
    type Instant;

    /// The current instant.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// A clock that never advances. Every stage reports zero duration.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullClock;

impl Clock for NullClock {
    type Instant = ();

    fn now(&self) {}

    fn elapsed(&self, _since: &()) -> Duration {
        Duration::ZERO
    }
}

/// Diagnostics collected from a single link import.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadDiagnostics {
    /// Collaborator checks and input array validation.
    pub validate: StageDiagnostics,
    /// 1D search context construction.
    pub build_mesh1d: StageDiagnostics,
    /// 2D search context construction.
    pub build_mesh2d: StageDiagnostics,
    /// Parallel endpoint resolution.
    pub resolve: StageDiagnostics,
    /// Clearing and refilling the output collection.
    pub assemble: StageDiagnostics,
    /// Duplicate 1D source detection.
    pub validate_sources: StageDiagnostics,
    /// Total wall-clock duration of the import (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts across all stages.
    pub summary: ReadSummary,
}

/// Diagnostics for a single stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Input validation metrics.
    Validate {
        /// Number of link records in the file.
        link_count: usize,
        /// Whether a runtime network was supplied.
        network_available: bool,
    },
    /// Search context metrics.
    BuildIndex {
        /// Which index backend was built.
        backend: String,
        /// Runtime objects offered to the index.
        object_count: usize,
        /// Objects actually indexed (finite footprint).
        indexed_count: usize,
        /// Quadtree subdivision depth for this object count.
        depth: usize,
        /// Whether the file's coordinate arrays were trusted.
        trustworthy: bool,
    },
    /// Resolution metrics.
    Resolve {
        /// Links resolved.
        link_count: usize,
        /// Worker threads used.
        threads: usize,
        /// Links whose resolution raised a fault.
        fault_count: usize,
    },
    /// Assembly metrics.
    Assemble {
        /// Links appended to the output.
        links_appended: usize,
        /// Links whose type code was unknown.
        unknown_type_count: usize,
    },
    /// Duplicate source metrics.
    ValidateSources {
        /// Links whose 1D node shares a location.
        duplicate_count: usize,
    },
}

/// Per-endpoint tally of how indices were determined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCounts {
    /// Matched from trustworthy file coordinates.
    pub file_coordinates: usize,
    /// Matched from branch and chainage.
    pub branch_chainage: usize,
    /// Matched from a face centroid.
    pub face_centroid: usize,
    /// File-local index kept.
    pub unresolved: usize,
}

impl SourceCounts {
    /// Count one endpoint.
    pub const fn record(&mut self, source: CoordinateSource) {
        match source {
            CoordinateSource::FileCoordinates => self.file_coordinates += 1,
            CoordinateSource::BranchChainage => self.branch_chainage += 1,
            CoordinateSource::FaceCentroid => self.face_centroid += 1,
            CoordinateSource::Unresolved => self.unresolved += 1,
        }
    }

    /// Count for one source.
    #[must_use]
    pub const fn get(&self, source: CoordinateSource) -> usize {
        match source {
            CoordinateSource::FileCoordinates => self.file_coordinates,
            CoordinateSource::BranchChainage => self.branch_chainage,
            CoordinateSource::FaceCentroid => self.face_centroid,
            CoordinateSource::Unresolved => self.unresolved,
        }
    }

    /// Endpoints counted.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.file_coordinates + self.branch_chainage + self.face_centroid + self.unresolved
    }
}

/// High-level summary counts for a link import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadSummary {
    /// Links appended to the output collection.
    pub link_count: usize,
    /// How the 1D endpoints were determined.
    pub mesh1d: SourceCounts,
    /// How the 2D endpoints were determined.
    pub mesh2d: SourceCounts,
    /// Links whose resolution raised a fault.
    pub fault_count: usize,
    /// Links imported with an unknown type code.
    pub unknown_type_count: usize,
    /// Links whose 1D node shares its location with other nodes.
    pub duplicate_source_count: usize,
}

impl ReadDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Link Import Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!("Links: {}", self.summary.link_count));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        let stages = [
            ("Validate", &self.validate),
            ("Build 1D Index", &self.build_mesh1d),
            ("Build 2D Index", &self.build_mesh2d),
            ("Resolve", &self.resolve),
            ("Assemble", &self.assemble),
            ("Validate Sources", &self.validate_sources),
        ];
        for (name, diag) in stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!("{:<24} {:>10} {:>10}", "Source", "1D", "2D"));
        lines.push("-".repeat(46));
        for source in CoordinateSource::ALL {
            lines.push(format!(
                "{:<24} {:>10} {:>10}",
                source.to_string(),
                self.summary.mesh1d.get(source),
                self.summary.mesh2d.get(source),
            ));
        }

        lines.push(String::new());
        lines.push(format!(
            "Faults: {}  |  Unknown types: {}  |  Duplicate sources: {}",
            self.summary.fault_count,
            self.summary.unknown_type_count,
            self.summary.duplicate_source_count,
        ));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Validate {
            link_count,
            network_available,
        } => {
            let network = if *network_available {
                "network"
            } else {
                "no network"
            };
            format!("{link_count} records, {network}")
        }
        StageMetrics::BuildIndex {
            backend,
            object_count,
            indexed_count,
            depth,
            trustworthy,
        } => {
            let coords = if *trustworthy { "trusted" } else { "fallback" };
            format!(
                "{backend} {indexed_count}/{object_count} objects depth={depth} coords={coords}"
            )
        }
        StageMetrics::Resolve {
            link_count,
            threads,
            fault_count,
        } => format!("{link_count} links on {threads} threads, {fault_count} faults"),
        StageMetrics::Assemble {
            links_appended,
            unknown_type_count,
        } => format!("{links_appended} appended, {unknown_type_count} unknown types"),
        StageMetrics::ValidateSources { duplicate_count } => {
            format!("{duplicate_count} duplicate sources")
        }
    }
}

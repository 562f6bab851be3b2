//! Operator-facing diagnostic messages and the sinks that receive them.
//!
//! Every problem the engine meets ends up here as a structured
//! [`Diagnostic`], with enough context (link id, indices, node names)
//! to find the offending record in the source file.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{Endpoint, LinkError};

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// Informational; the result is still as good as the file allows.
    Info,
    /// Something the operator should look at.
    Warning,
    /// The import aborted, or a link could not be resolved properly.
    Error,
}

/// What a diagnostic is about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// A collaborator the import cannot run without is missing.
    MissingCollaborator {
        /// Which collaborator.
        name: String,
    },
    /// No runtime network was given, so 1D nodes cannot be placed by
    /// branch and chainage.
    NetworkUnavailable,
    /// The file-domain arrays are inconsistent.
    MalformedInput {
        /// What is wrong.
        detail: String,
    },
    /// The output collection refused to be cleared.
    ClearNotSupported {
        /// Why it refused.
        reason: String,
    },
    /// The worker pool could not be created.
    WorkerPool {
        /// Underlying error.
        detail: String,
    },
    /// A link carries a type code with no known meaning.
    UnknownLinkType {
        /// Link identifier.
        link_id: String,
        /// The persisted code.
        code: i32,
    },
    /// An endpoint could not be located; the file index was kept.
    UnresolvedEndpoint {
        /// Link identifier.
        link_id: String,
        /// Which end of the link.
        endpoint: Endpoint,
        /// The file-local index that was kept.
        file_index: usize,
    },
    /// Resolving a link raised an arithmetic fault.
    ResolveFault {
        /// Link identifier.
        link_id: String,
        /// Fault description.
        detail: String,
    },
    /// A link's 1D source location is shared with other nodes or links.
    DuplicateSourceLocation {
        /// Link identifier.
        link_id: String,
        /// Link long name.
        link_name: String,
        /// Name of the link's 1D node.
        node: String,
        /// Runtime index of the link's 1D node.
        calculation_point_index: usize,
        /// Runtime index of the link's 2D cell.
        cell_index: usize,
        /// Names of the other nodes at the same location.
        coincident: Vec<String>,
        /// Id and 1D node name of every other link at the same location.
        other_links: Vec<(String, String)>,
    },
}

impl DiagnosticKind {
    /// Severity implied by the kind.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        match self {
            Self::MissingCollaborator { .. }
            | Self::MalformedInput { .. }
            | Self::ClearNotSupported { .. }
            | Self::WorkerPool { .. }
            | Self::ResolveFault { .. } => Severity::Error,
            Self::NetworkUnavailable
            | Self::UnknownLinkType { .. }
            | Self::DuplicateSourceLocation { .. } => Severity::Warning,
            Self::UnresolvedEndpoint { .. } => Severity::Info,
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingCollaborator { name } => {
                write!(f, "cannot read 1D2D links: no {name} was provided")
            }
            Self::NetworkUnavailable => f.write_str(
                "no network was provided; 1D nodes without usable coordinates keep their file index",
            ),
            Self::MalformedInput { detail } => write!(f, "malformed 1D2D link data: {detail}"),
            Self::ClearNotSupported { reason } => {
                write!(f, "cannot replace existing 1D2D links: {reason}")
            }
            Self::WorkerPool { detail } => {
                write!(f, "cannot start link resolution workers: {detail}")
            }
            Self::UnknownLinkType { link_id, code } => write!(
                f,
                "link '{link_id}' has unknown link type code {code}; imported as embedded",
            ),
            Self::UnresolvedEndpoint {
                link_id,
                endpoint,
                file_index,
            } => write!(
                f,
                "link '{link_id}': {endpoint} endpoint could not be located, kept file index {file_index}",
            ),
            Self::ResolveFault { link_id, detail } => write!(
                f,
                "link '{link_id}' could not be resolved ({detail}); kept the file index",
            ),
            Self::DuplicateSourceLocation {
                link_id,
                link_name,
                node,
                calculation_point_index,
                cell_index,
                coincident,
                other_links,
            } => {
                let users: Vec<String> = coincident
                    .iter()
                    .cloned()
                    .chain(other_links.iter().map(|(id, node)| format!("link '{id}' ({node})")))
                    .collect();
                write!(
                    f,
                    "link '{link_id}' ({link_name}) from 1D node '{node}' (index {calculation_point_index}) to cell {cell_index}: the same location is also used by {}",
                    users.join(", "),
                )
            }
        }
    }
}

impl From<&LinkError> for DiagnosticKind {
    fn from(err: &LinkError) -> Self {
        match err {
            LinkError::MissingCollaborator(name) => Self::MissingCollaborator {
                name: (*name).to_string(),
            },
            LinkError::MalformedInput(detail) => Self::MalformedInput {
                detail: detail.clone(),
            },
            LinkError::ClearNotSupported(e) => Self::ClearNotSupported {
                reason: e.reason.clone(),
            },
            LinkError::ThreadPool(e) => Self::WorkerPool {
                detail: e.to_string(),
            },
        }
    }
}

/// A message for the operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// How serious it is.
    pub severity: Severity,
    /// What it is about.
    pub kind: DiagnosticKind,
}

impl Diagnostic {
    /// Wrap a kind with its implied severity.
    #[must_use]
    pub fn new(kind: DiagnosticKind) -> Self {
        Self {
            severity: kind.severity(),
            kind,
        }
    }
}

impl From<DiagnosticKind> for Diagnostic {
    fn from(kind: DiagnosticKind) -> Self {
        Self::new(kind)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{level}: {}", self.kind)
    }
}

/// Receiver for operator-facing diagnostics.
pub trait DiagnosticSink {
    /// Accept one diagnostic.
    fn report(&mut self, diagnostic: Diagnostic);
}

impl DiagnosticSink for Vec<Diagnostic> {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.push(diagnostic);
    }
}

/// Forwards diagnostics to `tracing` at the matching level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Info => tracing::info!("{}", diagnostic.kind),
            Severity::Warning => tracing::warn!("{}", diagnostic.kind),
            Severity::Error => tracing::error!("{}", diagnostic.kind),
        }
    }
}

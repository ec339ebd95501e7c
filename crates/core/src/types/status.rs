//! Status enums for orders handled by the connector.

use serde::{Deserialize, Serialize};

/// Order status as the platform reports it.
///
/// Slugs follow the WooCommerce convention (`on-hold`, not `on_hold`).
/// Unknown statuses are preserved verbatim so custom states registered by
/// other extensions survive a round-trip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    OnHold,
    Completed,
    Cancelled,
    Refunded,
    Failed,
    Draft,
    #[serde(untagged)]
    Other(String),
}

impl OrderStatus {
    /// The status slug as the platform spells it.
    #[must_use]
    pub fn as_slug(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::OnHold => "on-hold",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
            Self::Failed => "failed",
            Self::Draft => "draft",
            Self::Other(slug) => slug,
        }
    }

    /// Cancelled and refunded orders are candidates for invoice cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Refunded)
    }

    /// Any non-cancelled order counts as outstanding for invoice creation.
    #[must_use]
    pub const fn is_outstanding(&self) -> bool {
        !self.is_cancelled()
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_slug())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "pending" => Self::Pending,
            "processing" => Self::Processing,
            "on-hold" => Self::OnHold,
            "completed" => Self::Completed,
            "cancelled" => Self::Cancelled,
            "refunded" => Self::Refunded,
            "failed" => Self::Failed,
            "draft" => Self::Draft,
            other => Self::Other(other.to_string()),
        })
    }
}

/// Kind of order record the platform handed us.
///
/// Only regular orders are automated; subscription records and other
/// order-like entities are skipped by the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderKind {
    #[default]
    Order,
    Subscription,
    Other,
}

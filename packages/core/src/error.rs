use thiserror::Error;

/// Failure taxonomy for a single report request. Every variant is terminal:
/// no retries, no partial results.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("unknown tenant `{tenant}`")]
    UnknownTenant { tenant: String },

    #[error("data source failure for tenant `{tenant}`: {source}")]
    DataSource {
        tenant: String,
        #[source]
        source: sea_orm::DbErr,
    },

    #[error("report computation failed: {message}")]
    Computation { message: String },
}

impl ReportError {
    pub fn unknown_tenant(tenant: impl Into<String>) -> Self {
        Self::UnknownTenant {
            tenant: tenant.into(),
        }
    }

    pub fn data_source(tenant: impl Into<String>, source: sea_orm::DbErr) -> Self {
        Self::DataSource {
            tenant: tenant.into(),
            source,
        }
    }

    pub fn computation(message: impl Into<String>) -> Self {
        Self::Computation {
            message: message.into(),
        }
    }

    /// Tenant the failing request addressed, when the variant carries one.
    pub fn tenant(&self) -> Option<&str> {
        match self {
            Self::UnknownTenant { tenant } | Self::DataSource { tenant, .. } => Some(tenant),
            Self::Computation { .. } => None,
        }
    }
}

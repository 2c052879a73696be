//! RPC Error Types
//!
//! Maps application errors to JSON-RPC error codes.

use envprov_core::domain::DomainError;
use envprov_core::error::AppError;
use jsonrpsee::types::ErrorObjectOwned;

/// RPC Error Codes
pub mod code {
    pub const VALIDATION_ERROR: i32 = 4000;
    pub const NOT_FOUND: i32 = 4001;
    pub const CONFLICT: i32 = 4002;
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const DB_ERROR: i32 = 5001;
    pub const PROVIDER_ERROR: i32 = 5003;
    pub const AUTH_ERROR: i32 = 5004;
}

/// Convert AppError to JSON-RPC ErrorObject
pub fn to_rpc_error(err: AppError) -> ErrorObjectOwned {
    let code = match &err {
        AppError::Validation(_) | AppError::Serialization(_) => code::VALIDATION_ERROR,
        AppError::Domain(DomainError::InvalidStateTransition { .. })
        | AppError::Domain(DomainError::InvalidStatusTransition { .. }) => code::CONFLICT,
        AppError::Domain(_) => code::VALIDATION_ERROR,
        AppError::NotFound(_) => code::NOT_FOUND,
        AppError::Conflict(_) | AppError::InvalidState(_) => code::CONFLICT,
        AppError::ProviderApi(_) => code::PROVIDER_ERROR,
        AppError::Authentication(_) => code::AUTH_ERROR,
        AppError::Database(_) => code::DB_ERROR,
        AppError::Io(_) | AppError::Config(_) | AppError::Internal(_) => code::INTERNAL_ERROR,
    };
    ErrorObjectOwned::owned(code, err.to_string(), None::<()>)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let cases = [
            (AppError::Validation("bad".into()), code::VALIDATION_ERROR),
            (AppError::NotFound("env".into()), code::NOT_FOUND),
            (AppError::Conflict("slug".into()), code::CONFLICT),
            (AppError::InvalidState("no instance".into()), code::CONFLICT),
            (AppError::ProviderApi("Contabo API error: x".into()), code::PROVIDER_ERROR),
            (AppError::Authentication("denied".into()), code::AUTH_ERROR),
            (AppError::Database("locked".into()), code::DB_ERROR),
            (AppError::Internal("boom".into()), code::INTERNAL_ERROR),
            (
                AppError::Domain(DomainError::InvalidStatusTransition {
                    from: "deleting".into(),
                    to: "running".into(),
                }),
                code::CONFLICT,
            ),
            (
                AppError::Domain(DomainError::UnknownStatus("gone".into())),
                code::VALIDATION_ERROR,
            ),
        ];

        for (err, expected) in cases {
            let message = err.to_string();
            let obj = to_rpc_error(err);
            assert_eq!(obj.code(), expected, "{}", message);
            assert_eq!(obj.message(), message);
        }
    }
}

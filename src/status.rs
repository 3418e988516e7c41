use serde::Serialize;

/// Numeric OPC UA status code. The upper 16 bits carry the code itself, the
/// lower 16 bits are flags and are ignored when comparing severities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct StatusCode(pub u32);

impl StatusCode {
    pub const GOOD: StatusCode = StatusCode(0x0000_0000);
    pub const UNCERTAIN_INITIAL_VALUE: StatusCode = StatusCode(0x4092_0000);
    pub const BAD_UNEXPECTED_ERROR: StatusCode = StatusCode(0x8001_0000);
    pub const BAD_INTERNAL_ERROR: StatusCode = StatusCode(0x8002_0000);
    pub const BAD_OUT_OF_MEMORY: StatusCode = StatusCode(0x8003_0000);
    pub const BAD_TIMEOUT: StatusCode = StatusCode(0x800A_0000);
    pub const BAD_ENCODING_ERROR: StatusCode = StatusCode(0x8006_0000);
    pub const BAD_DECODING_ERROR: StatusCode = StatusCode(0x8007_0000);
    pub const BAD_ENCODING_LIMITS_EXCEEDED: StatusCode = StatusCode(0x8008_0000);
    pub const BAD_DATA_ENCODING_INVALID: StatusCode = StatusCode(0x8009_0000);
    pub const BAD_NOT_SUPPORTED: StatusCode = StatusCode(0x803D_0000);
    pub const BAD_NOT_FOUND: StatusCode = StatusCode(0x803E_0000);
    pub const BAD_NOT_IMPLEMENTED: StatusCode = StatusCode(0x8040_0000);
    pub const BAD_TYPE_MISMATCH: StatusCode = StatusCode(0x8074_0000);
    pub const BAD_MAX_CONNECTIONS_REACHED: StatusCode = StatusCode(0x80B7_0000);
    pub const BAD_AGGREGATE_CONFIGURATION_REJECTED: StatusCode = StatusCode(0x80DA_0000);

    pub fn is_good(self) -> bool {
        self.0 & 0xC000_0000 == 0
    }

    pub fn is_bad(self) -> bool {
        self.0 & 0x8000_0000 != 0
    }

    /// The symbolic name used by the non-reversible JSON form. Codes missing
    /// from the table get the catch-all name.
    #[cfg(feature = "status-names")]
    pub fn name(self) -> &'static str {
        STATUS_NAMES
            .binary_search_by_key(&self.0, |&(code, _)| code)
            .map(|idx| STATUS_NAMES[idx].1)
            .unwrap_or("Unknown StatusCode")
    }
}

impl From<u32> for StatusCode {
    fn from(value: u32) -> Self {
        StatusCode(value)
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        #[cfg(feature = "status-names")]
        return write!(f, "{}", self.name());
        #[cfg(not(feature = "status-names"))]
        write!(f, "0x{:08X}", self.0)
    }
}

/// Sorted by numeric value so `name()` can binary-search. Only the codes
/// this crate can produce or that commonly travel inside DataValues are
/// kept; the full generated table lives upstream with the information model.
#[cfg(feature = "status-names")]
const STATUS_NAMES: &[(u32, &str)] = &[
    (0x0000_0000, "Good"),
    (0x002F_0000, "GoodClamped"),
    (0x4092_0000, "UncertainInitialValue"),
    (0x8001_0000, "BadUnexpectedError"),
    (0x8002_0000, "BadInternalError"),
    (0x8003_0000, "BadOutOfMemory"),
    (0x8004_0000, "BadResourceUnavailable"),
    (0x8005_0000, "BadCommunicationError"),
    (0x8006_0000, "BadEncodingError"),
    (0x8007_0000, "BadDecodingError"),
    (0x8008_0000, "BadEncodingLimitsExceeded"),
    (0x8009_0000, "BadDataEncodingInvalid"),
    (0x800A_0000, "BadTimeout"),
    (0x800B_0000, "BadServiceUnsupported"),
    (0x800C_0000, "BadShutdown"),
    (0x800D_0000, "BadServerNotConnected"),
    (0x800E_0000, "BadServerHalted"),
    (0x800F_0000, "BadNothingToDo"),
    (0x8010_0000, "BadTooManyOperations"),
    (0x8011_0000, "BadTcpServerTooBusy"),
    (0x8013_0000, "BadCertificateInvalid"),
    (0x8014_0000, "BadSecurityChecksFailed"),
    (0x801F_0000, "BadUserAccessDenied"),
    (0x8020_0000, "BadIdentityTokenInvalid"),
    (0x8025_0000, "BadInvalidState"),
    (0x802A_0000, "BadDataLost"),
    (0x802B_0000, "BadDataUnavailable"),
    (0x8033_0000, "BadNodeIdInvalid"),
    (0x8034_0000, "BadNodeIdUnknown"),
    (0x8035_0000, "BadAttributeIdInvalid"),
    (0x8037_0000, "BadIndexRangeInvalid"),
    (0x8038_0000, "BadIndexRangeNoData"),
    (0x8039_0000, "BadDataEncodingUnsupported"),
    (0x803A_0000, "BadNotReadable"),
    (0x803B_0000, "BadNotWritable"),
    (0x803C_0000, "BadOutOfRange"),
    (0x803D_0000, "BadNotSupported"),
    (0x803E_0000, "BadNotFound"),
    (0x8040_0000, "BadNotImplemented"),
    (0x8041_0000, "BadMonitoringModeInvalid"),
    (0x8074_0000, "BadTypeMismatch"),
    (0x8075_0000, "BadMethodInvalid"),
    (0x80B7_0000, "BadMaxConnectionsReached"),
    (0x80DA_0000, "BadAggregateConfigurationRejected"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(feature = "status-names")]
    fn name_lookup() {
        assert_eq!(StatusCode::GOOD.name(), "Good");
        assert_eq!(
            StatusCode::BAD_AGGREGATE_CONFIGURATION_REJECTED.name(),
            "BadAggregateConfigurationRejected"
        );
        assert_eq!(StatusCode(0xDEAD_0000).name(), "Unknown StatusCode");
    }

    #[test]
    fn severity() {
        assert!(StatusCode::GOOD.is_good());
        assert!(!StatusCode::GOOD.is_bad());
        assert!(StatusCode::BAD_DECODING_ERROR.is_bad());
        assert!(!StatusCode::UNCERTAIN_INITIAL_VALUE.is_good());
    }
}

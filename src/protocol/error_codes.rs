//! Kafka protocol error codes, as embedded in otherwise-successful response
//! bodies. See <https://kafka.apache.org/protocol#protocol_error_codes> for
//! the canonical list; this enumerates the subset the core's Error
//! Classifier and routing layer act on, plus a catch-all for everything
//! else so a response is never unrepresentable.

/// A Kafka protocol error code, decoded from the `i16` a response body
/// carries alongside its data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolErrorCode {
    /// NONE (0)
    ///
    /// **RETRIABLE**: False
    ///
    /// **DESCRIPTION**:
    /// No error.
    None,

    /// UNKNOWN_SERVER_ERROR (-1)
    ///
    /// **RETRIABLE**: False
    ///
    /// **DESCRIPTION**:
    /// The server experienced an unexpected error when processing the request.
    UnknownServerError,

    /// OFFSET_OUT_OF_RANGE (1)
    ///
    /// **RETRIABLE**: False
    ///
    /// **DESCRIPTION**:
    /// The requested offset is not within the range of offsets maintained by the server.
    OffsetOutOfRange,

    /// CORRUPT_MESSAGE (2)
    ///
    /// **RETRIABLE**: True
    ///
    /// **DESCRIPTION**:
    /// This message has failed its CRC checksum, exceeds the valid size, has a null key for a
    /// compacted topic, or is otherwise corrupt.
    CorruptMessage,

    /// UNKNOWN_TOPIC_OR_PARTITION (3)
    ///
    /// **RETRIABLE**: True
    ///
    /// **DESCRIPTION**:
    /// This server does not host this topic-partition.
    UnknownTopicOrPartition,

    /// INVALID_FETCH_SIZE (4)
    ///
    /// **RETRIABLE**: False
    ///
    /// **DESCRIPTION**:
    /// The requested fetch size is invalid.
    InvalidFetchSize,

    /// LEADER_NOT_AVAILABLE (5)
    ///
    /// **RETRIABLE**: True
    ///
    /// **DESCRIPTION**:
    /// There is no leader for this topic-partition as we are in the middle of a leadership
    /// election.
    LeaderNotAvailable,

    /// NOT_LEADER_OR_FOLLOWER (6)
    ///
    /// **RETRIABLE**: True
    ///
    /// **DESCRIPTION**:
    /// For requests intended only for the leader, this error indicates that the broker is not
    /// the current leader. For requests intended for any replica, this error indicates that
    /// the broker is not a replica of the topic partition.
    NotLeaderOrFollower,

    /// REQUEST_TIMED_OUT (7)
    ///
    /// **RETRIABLE**: True
    ///
    /// **DESCRIPTION**:
    /// The request timed out.
    RequestTimedOut,

    /// BROKER_NOT_AVAILABLE (8)
    ///
    /// **RETRIABLE**: False
    ///
    /// **DESCRIPTION**:
    /// The broker is not available.
    BrokerNotAvailable,

    /// REPLICA_NOT_AVAILABLE (9)
    ///
    /// **RETRIABLE**: True
    ///
    /// **DESCRIPTION**:
    /// The replica is not available for the requested topic-partition. Produce/Fetch requests
    /// and other requests intended only for the leader or follower return
    /// NOT_LEADER_OR_FOLLOWER if the broker is not a replica of the topic-partition.
    ReplicaNotAvailable,

    /// MESSAGE_TOO_LARGE (10)
    ///
    /// **RETRIABLE**: False
    ///
    /// **DESCRIPTION**:
    /// The request included a message larger than the max message size the server will accept.
    MessageTooLarge,

    /// NETWORK_EXCEPTION (13)
    ///
    /// **RETRIABLE**: True
    ///
    /// **DESCRIPTION**:
    /// The server disconnected before a response was received.
    NetworkException,

    /// COORDINATOR_LOAD_IN_PROGRESS (14)
    ///
    /// **RETRIABLE**: True
    ///
    /// **DESCRIPTION**:
    /// The coordinator is loading and hence can't process requests.
    CoordinatorLoadInProgress,

    /// COORDINATOR_NOT_AVAILABLE (15)
    ///
    /// **RETRIABLE**: True
    ///
    /// **DESCRIPTION**:
    /// The coordinator is not available.
    CoordinatorNotAvailable,

    /// NOT_COORDINATOR (16)
    ///
    /// **RETRIABLE**: True
    ///
    /// **DESCRIPTION**:
    /// This is not the correct coordinator for the requested group or transaction.
    NotCoordinator,

    /// INVALID_TOPIC_EXCEPTION (17)
    ///
    /// **RETRIABLE**: False
    ///
    /// **DESCRIPTION**:
    /// The request attempted to perform an operation on an invalid topic.
    InvalidTopicException,

    /// ILLEGAL_GENERATION (22)
    ///
    /// **RETRIABLE**: False
    ///
    /// **DESCRIPTION**:
    /// Specified group generation ID is not valid.
    IllegalGeneration,

    /// UNKNOWN_MEMBER_ID (25)
    ///
    /// **RETRIABLE**: False
    ///
    /// **DESCRIPTION**:
    /// The coordinator is not aware of this member.
    UnknownMemberId,

    /// REBALANCE_IN_PROGRESS (27)
    ///
    /// **RETRIABLE**: False
    ///
    /// **DESCRIPTION**:
    /// The group is rebalancing, so a rejoin is needed.
    RebalanceInProgress,

    /// TOPIC_AUTHORIZATION_FAILED (29)
    ///
    /// **RETRIABLE**: False
    ///
    /// **DESCRIPTION**:
    /// Topic authorization failed.
    TopicAuthorizationFailed,

    /// GROUP_AUTHORIZATION_FAILED (30)
    ///
    /// **RETRIABLE**: False
    ///
    /// **DESCRIPTION**:
    /// Group authorization failed.
    GroupAuthorizationFailed,

    /// UNSUPPORTED_VERSION (35)
    ///
    /// **RETRIABLE**: False
    ///
    /// **DESCRIPTION**:
    /// The version of API is not supported.
    UnsupportedVersion,

    /// NOT_CONTROLLER (41)
    ///
    /// **RETRIABLE**: True
    ///
    /// **DESCRIPTION**:
    /// This is not the correct controller for this cluster.
    NotController,

    /// INVALID_REQUEST (42)
    ///
    /// **RETRIABLE**: False
    ///
    /// **DESCRIPTION**:
    /// The request is malformed or incompatible with this broker's version. The broker logs
    /// may have more details.
    InvalidRequest,

    /// GROUP_ID_NOT_FOUND (69)
    ///
    /// **RETRIABLE**: False
    ///
    /// **DESCRIPTION**:
    /// The group ID does not exist.
    GroupIdNotFound,

    /// A code this catalogue doesn't name explicitly. Carries the raw value
    /// so callers can still branch on it.
    Unknown(i16),
}

impl ProtocolErrorCode {
    /// Maps the raw wire value to a typed code. Values not in the known
    /// table fall back to `Unknown` rather than erroring — an unrecognized
    /// code is still a valid (if unfamiliar) piece of protocol data.
    pub fn from_code(code: i16) -> Self {
        match code {
            0 => Self::None,
            -1 => Self::UnknownServerError,
            1 => Self::OffsetOutOfRange,
            2 => Self::CorruptMessage,
            3 => Self::UnknownTopicOrPartition,
            4 => Self::InvalidFetchSize,
            5 => Self::LeaderNotAvailable,
            6 => Self::NotLeaderOrFollower,
            7 => Self::RequestTimedOut,
            8 => Self::BrokerNotAvailable,
            9 => Self::ReplicaNotAvailable,
            10 => Self::MessageTooLarge,
            13 => Self::NetworkException,
            14 => Self::CoordinatorLoadInProgress,
            15 => Self::CoordinatorNotAvailable,
            16 => Self::NotCoordinator,
            17 => Self::InvalidTopicException,
            22 => Self::IllegalGeneration,
            25 => Self::UnknownMemberId,
            27 => Self::RebalanceInProgress,
            29 => Self::TopicAuthorizationFailed,
            30 => Self::GroupAuthorizationFailed,
            35 => Self::UnsupportedVersion,
            41 => Self::NotController,
            42 => Self::InvalidRequest,
            69 => Self::GroupIdNotFound,
            other => Self::Unknown(other),
        }
    }

    /// The raw wire value for this code.
    pub fn code(self) -> i16 {
        match self {
            Self::None => 0,
            Self::UnknownServerError => -1,
            Self::OffsetOutOfRange => 1,
            Self::CorruptMessage => 2,
            Self::UnknownTopicOrPartition => 3,
            Self::InvalidFetchSize => 4,
            Self::LeaderNotAvailable => 5,
            Self::NotLeaderOrFollower => 6,
            Self::RequestTimedOut => 7,
            Self::BrokerNotAvailable => 8,
            Self::ReplicaNotAvailable => 9,
            Self::MessageTooLarge => 10,
            Self::NetworkException => 13,
            Self::CoordinatorLoadInProgress => 14,
            Self::CoordinatorNotAvailable => 15,
            Self::NotCoordinator => 16,
            Self::InvalidTopicException => 17,
            Self::IllegalGeneration => 22,
            Self::UnknownMemberId => 25,
            Self::RebalanceInProgress => 27,
            Self::TopicAuthorizationFailed => 29,
            Self::GroupAuthorizationFailed => 30,
            Self::UnsupportedVersion => 35,
            Self::NotController => 41,
            Self::InvalidRequest => 42,
            Self::GroupIdNotFound => 69,
            Self::Unknown(v) => v,
        }
    }

    /// Whether a client may reasonably retry the request unmodified after
    /// seeing this code. Used by the Error Classifier to decide between a
    /// delayed-retry signal and an outright escalation.
    pub fn is_retriable(self) -> bool {
        matches!(
            self,
            Self::CorruptMessage
                | Self::UnknownTopicOrPartition
                | Self::LeaderNotAvailable
                | Self::NotLeaderOrFollower
                | Self::RequestTimedOut
                | Self::ReplicaNotAvailable
                | Self::NetworkException
                | Self::CoordinatorLoadInProgress
                | Self::CoordinatorNotAvailable
                | Self::NotCoordinator
                | Self::NotController
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_known_codes() {
        for code in [0, -1, 3, 5, 6, 7, 41, 42] {
            assert_eq!(ProtocolErrorCode::from_code(code).code(), code);
        }
    }

    #[test]
    fn unknown_code_is_preserved() {
        let unk = ProtocolErrorCode::from_code(9_999);
        assert_eq!(unk, ProtocolErrorCode::Unknown(9_999));
        assert_eq!(unk.code(), 9_999);
    }

    #[test]
    fn retriable_classification_matches_spec_examples() {
        assert!(ProtocolErrorCode::LeaderNotAvailable.is_retriable());
        assert!(ProtocolErrorCode::RequestTimedOut.is_retriable());
        assert!(!ProtocolErrorCode::None.is_retriable());
        assert!(!ProtocolErrorCode::InvalidRequest.is_retriable());
    }
}

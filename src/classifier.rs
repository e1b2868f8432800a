//! Inspects an otherwise-successful response for embedded Kafka protocol
//! error codes and decides the follow-up action (spec §4.8). The
//! classifier never retries or refreshes anything itself — it only
//! produces signals; the [`crate::manager::ConnectionManager`] (or a
//! caller) decides what to do with them. The contract is that no error
//! code is ever silently discarded.

use tracing::debug;

use crate::data::{Partition, Topic};
use crate::protocol::error_codes::ProtocolErrorCode;
use crate::protocol::messages::Response;

/// What the classifier recommends doing about one observed error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierAction {
    /// `NoError`; nothing to do.
    PassThrough,
    /// The partition's leader has moved; a metadata refresh is needed, but
    /// the response carrying this signal is still returned to the caller
    /// unmodified (spec Open Question (a): no automatic retry here).
    ScheduleMetadataRefresh,
    /// Transient; a higher layer may retry after a delay.
    RetryAfterDelay,
    /// Anything else: surfaced to the caller as a hard failure.
    Escalate,
}

/// One error code observed in a response, with the scope it applies to
/// (a (topic, partition) for Fetch/Produce/Offset, or no scope for a
/// group-level response like GroupCoordinator) and the recommended action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifierSignal {
    pub topic: Option<Topic>,
    pub partition: Option<Partition>,
    pub code: ProtocolErrorCode,
    pub action: ClassifierAction,
}

fn classify_code(code: ProtocolErrorCode) -> ClassifierAction {
    match code {
        ProtocolErrorCode::None => ClassifierAction::PassThrough,
        // The modern protocol error code 6 renamed NotLeaderForPartition to
        // NotLeaderOrFollower; same wire value, same classifier signal.
        ProtocolErrorCode::NotLeaderOrFollower => ClassifierAction::ScheduleMetadataRefresh,
        ProtocolErrorCode::LeaderNotAvailable | ProtocolErrorCode::RequestTimedOut => {
            ClassifierAction::RetryAfterDelay
        }
        _ => ClassifierAction::Escalate,
    }
}

fn signal(topic: Option<Topic>, partition: Option<Partition>, raw_code: i16) -> ClassifierSignal {
    let code = ProtocolErrorCode::from_code(raw_code);
    let action = classify_code(code);
    if action != ClassifierAction::PassThrough {
        debug!(?topic, ?partition, ?code, ?action, "classified response error code");
    }
    ClassifierSignal {
        topic,
        partition,
        code,
        action,
    }
}

/// Extracts every embedded error code from `response` and classifies each.
/// Responses with no embedded codes (Metadata, Opaque) yield no signals.
pub fn classify(response: &Response) -> Vec<ClassifierSignal> {
    match response {
        Response::Fetch(r) => r
            .topics
            .iter()
            .flat_map(|t| {
                t.partitions
                    .iter()
                    .map(move |p| signal(Some(t.topic.clone()), Some(p.partition), p.error_code))
            })
            .collect(),
        Response::Produce(r) => r
            .topics
            .iter()
            .flat_map(|t| {
                t.partitions
                    .iter()
                    .map(move |p| signal(Some(t.topic.clone()), Some(p.partition), p.error_code))
            })
            .collect(),
        Response::Offset(r) => r
            .topics
            .iter()
            .flat_map(|t| {
                t.partitions
                    .iter()
                    .map(move |p| signal(Some(t.topic.clone()), Some(p.partition), p.error_code))
            })
            .collect(),
        Response::GroupCoordinator(r) => vec![signal(None, None, r.error_code)],
        Response::Metadata(_) | Response::Opaque(_) => Vec::new(),
    }
}

/// Whether any signal demands escalation — callers that want "fail hard on
/// anything unrecognized" behavior can check this instead of walking
/// `classify`'s output themselves.
pub fn has_escalation(signals: &[ClassifierSignal]) -> bool {
    signals.iter().any(|s| s.action == ClassifierAction::Escalate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::messages::{
        FetchResponse, FetchResponseTopic, FetchResponsePartition, GroupCoordinatorResponse,
    };
    use crate::data::NodeId;
    use bytes::Bytes;

    #[test]
    fn not_leader_schedules_refresh_without_escalating() {
        let response = Response::Fetch(FetchResponse {
            topics: vec![FetchResponseTopic {
                topic: "orders".into(),
                partitions: vec![FetchResponsePartition {
                    partition: 0,
                    error_code: ProtocolErrorCode::NotLeaderOrFollower.code(),
                    high_watermark: 0,
                    records: Bytes::new(),
                }],
            }],
        });

        let signals = classify(&response);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].action, ClassifierAction::ScheduleMetadataRefresh);
        assert!(!has_escalation(&signals));
    }

    #[test]
    fn leader_not_available_and_timeout_are_retryable() {
        let response = Response::Fetch(FetchResponse {
            topics: vec![FetchResponseTopic {
                topic: "orders".into(),
                partitions: vec![
                    FetchResponsePartition {
                        partition: 0,
                        error_code: ProtocolErrorCode::LeaderNotAvailable.code(),
                        high_watermark: 0,
                        records: Bytes::new(),
                    },
                    FetchResponsePartition {
                        partition: 1,
                        error_code: ProtocolErrorCode::RequestTimedOut.code(),
                        high_watermark: 0,
                        records: Bytes::new(),
                    },
                ],
            }],
        });

        let signals = classify(&response);
        assert!(signals.iter().all(|s| s.action == ClassifierAction::RetryAfterDelay));
    }

    #[test]
    fn unrecognized_codes_escalate() {
        let response = Response::GroupCoordinator(GroupCoordinatorResponse {
            error_code: ProtocolErrorCode::GroupAuthorizationFailed.code(),
            node_id: NodeId(1),
            host: "h".into(),
            port: 9092,
        });

        let signals = classify(&response);
        assert!(has_escalation(&signals));
    }

    #[test]
    fn no_error_never_surfaces_as_a_signal_to_act_on() {
        let response = Response::Produce(crate::protocol::messages::ProduceResponse {
            topics: vec![crate::protocol::messages::ProduceResponseTopic {
                topic: "orders".into(),
                partitions: vec![crate::protocol::messages::ProduceResponsePartition {
                    partition: 0,
                    error_code: 0,
                    base_offset: 42,
                }],
            }],
        });

        let signals = classify(&response);
        assert_eq!(signals[0].action, ClassifierAction::PassThrough);
        assert!(!has_escalation(&signals));
    }
}

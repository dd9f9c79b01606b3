use crate::errors::IngestError;
use crate::feed_entity::{
    Alert, EntityPayload, FeedEntity, StopTimeUpdate, TripInfo, TripUpdate, VehiclePosition,
};

/// Entities decoded from one feed payload, in source order.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedFeed {
    pub header_timestamp: Option<u64>,
    pub entities: Vec<FeedEntity>,
    /// Entities that carried no trip update, vehicle or alert.
    pub unsupported: usize,
}

pub fn parse_protobuf_message(
    url: &str,
    bytes: &[u8],
) -> Result<gtfs_realtime::FeedMessage, IngestError> {
    prost::Message::decode(bytes).map_err(|source| IngestError::Decode {
        url: url.to_string(),
        source,
    })
}

pub fn decode_feed(url: &str, bytes: &[u8]) -> Result<DecodedFeed, IngestError> {
    let message = parse_protobuf_message(url, bytes)?;

    let header_timestamp = message.header.timestamp;
    let total = message.entity.len();

    let entities: Vec<FeedEntity> = message
        .entity
        .into_iter()
        .filter_map(feed_entity_from_gtfs_rt)
        .collect();

    let unsupported = total - entities.len();

    if unsupported > 0 {
        tracing::debug!(url, unsupported, "dropped entities without a known payload");
    }

    Ok(DecodedFeed {
        header_timestamp,
        entities,
        unsupported,
    })
}

/// Returns `None` for entities carrying none of the three payloads. When the
/// feed sets more than one, trip update wins over vehicle, vehicle over alert.
pub fn feed_entity_from_gtfs_rt(entity: gtfs_realtime::FeedEntity) -> Option<FeedEntity> {
    let payload = if let Some(trip_update) = entity.trip_update {
        EntityPayload::TripUpdate(trip_update_from_gtfs_rt(trip_update))
    } else if let Some(vehicle) = entity.vehicle {
        EntityPayload::VehiclePosition(VehiclePosition {
            trip: vehicle.trip.map(TripInfo::from),
            timestamp: vehicle.timestamp,
            current_stop_id: vehicle.stop_id,
        })
    } else if let Some(alert) = entity.alert {
        EntityPayload::Alert(alert_from_gtfs_rt(alert))
    } else {
        return None;
    };

    Some(FeedEntity {
        entity_id: entity.id,
        payload,
    })
}

fn trip_update_from_gtfs_rt(trip_update: gtfs_realtime::TripUpdate) -> TripUpdate {
    let stop_time_updates = trip_update
        .stop_time_update
        .into_iter()
        //updates addressed only by stop_sequence have no direction to split off
        .filter_map(|stu| {
            let stop_id_raw = stu.stop_id?;
            Some(StopTimeUpdate {
                stop_id_raw,
                arrival: stu.arrival.and_then(|arrival| arrival.time),
                departure: stu.departure.and_then(|departure| departure.time),
            })
        })
        .collect();

    TripUpdate {
        trip: TripInfo::from(trip_update.trip),
        stop_time_updates,
    }
}

fn alert_from_gtfs_rt(alert: gtfs_realtime::Alert) -> Alert {
    Alert {
        active_periods: alert.active_period.into_iter().map(Into::into).collect(),
        informed_entities: alert.informed_entity.into_iter().map(Into::into).collect(),
        header_text: alert.header_text.and_then(first_available_translation),
    }
}

fn first_available_translation(text: gtfs_realtime::TranslatedString) -> Option<String> {
    text.translation
        .into_iter()
        .map(|translation| translation.text)
        .find(|text| !text.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::feed_entity::AlertTarget;
    use crate::test_utils::*;

    #[test]
    fn test_decode_mixed_feed_keeps_source_order() {
        let bytes = encode_feed(&[
            trip_update_entity("000031FS", "111150_FS.S01R", "FS", &[("S01S", 1742855490), ("D26S", 1742855880)]),
            vehicle_entity("000030FS", "111100_FS.N01R", "FS", 1742855460, "D26N"),
            alert_entity("A28S#EL226", &[stop_selector("A28S")], "Elevator outage @ 34 St-Penn Station"),
        ]);

        let decoded = decode_feed("http://feeds.test/ace", &bytes).unwrap();

        assert_eq!(decoded.header_timestamp, Some(FEED_TIMESTAMP));
        assert_eq!(decoded.unsupported, 0);
        assert_eq!(decoded.entities.len(), 3);

        match &decoded.entities[0].payload {
            EntityPayload::TripUpdate(trip_update) => {
                assert_eq!(trip_update.trip.trip_id.as_deref(), Some("111150_FS.S01R"));
                assert_eq!(trip_update.trip.route_id.as_deref(), Some("FS"));
                assert_eq!(trip_update.stop_time_updates.len(), 2);
                assert_eq!(trip_update.stop_time_updates[1].stop_id_raw, "D26S");
                assert_eq!(trip_update.stop_time_updates[1].arrival, Some(1742855880));
            }
            other => panic!("expected trip update, got {:?}", other),
        }

        match &decoded.entities[1].payload {
            EntityPayload::VehiclePosition(vehicle) => {
                assert_eq!(vehicle.timestamp, Some(1742855460));
                assert_eq!(vehicle.current_stop_id.as_deref(), Some("D26N"));
                assert_eq!(vehicle.trip_id(), Some("111100_FS.N01R"));
            }
            other => panic!("expected vehicle, got {:?}", other),
        }

        match &decoded.entities[2].payload {
            EntityPayload::Alert(alert) => {
                assert_eq!(
                    alert.header_text.as_deref(),
                    Some("Elevator outage @ 34 St-Penn Station")
                );
                assert_eq!(
                    alert.informed_entities[0].target(),
                    Some(AlertTarget::Stop("A28S".to_string()))
                );
            }
            other => panic!("expected alert, got {:?}", other),
        }
    }

    #[test]
    fn test_garbage_bytes_are_a_decode_error() {
        let result = decode_feed("http://feeds.test/broken", b"<html>502 Bad Gateway</html>");

        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[test]
    fn test_entities_without_payload_are_counted() {
        let empty = gtfs_realtime::FeedEntity {
            id: "nothing".to_string(),
            ..Default::default()
        };
        let bytes = encode_feed(&[empty, vehicle_entity("v1", "t1", "A", 10, "A01N")]);

        let decoded = decode_feed("http://feeds.test/a", &bytes).unwrap();

        assert_eq!(decoded.unsupported, 1);
        assert_eq!(decoded.entities.len(), 1);
        assert_eq!(decoded.entities[0].entity_id, "v1");
    }

    #[test]
    fn test_header_text_skips_blank_translations() {
        let alert = gtfs_realtime::Alert {
            header_text: Some(gtfs_realtime::TranslatedString {
                translation: vec![
                    translation("  ", "en"),
                    translation("Take the [7] instead", "en"),
                    translation("<p>Take the [7] instead</p>", "en-html"),
                ],
            }),
            ..Default::default()
        };

        let decoded = alert_from_gtfs_rt(alert);

        assert_eq!(decoded.header_text.as_deref(), Some("Take the [7] instead"));
    }

    #[test]
    fn test_stop_time_updates_without_stop_id_are_dropped() {
        let trip_update = gtfs_realtime::TripUpdate {
            trip: gtfs_realtime::TripDescriptor {
                trip_id: Some("t".to_string()),
                ..Default::default()
            },
            stop_time_update: vec![
                gtfs_realtime::trip_update::StopTimeUpdate {
                    stop_sequence: Some(4),
                    ..Default::default()
                },
                make_stu("R16N", 100),
            ],
            ..Default::default()
        };

        let decoded = trip_update_from_gtfs_rt(trip_update);

        assert_eq!(decoded.stop_time_updates.len(), 1);
        assert_eq!(decoded.stop_time_updates[0].stop_id_raw, "R16N");
    }
}

use axum::response::sse::Event;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};

use crate::models::{Booking, BookingEvent, BookingEventKind};
use crate::state::AppState;

pub const SSE_EVENT_NAME: &str = "booking_event";

pub fn booking_event(kind: BookingEventKind, booking: &Booking) -> BookingEvent {
    BookingEvent {
        kind,
        booking_id: booking.id,
        customer_id: booking.customer_id,
        service_id: booking.service_id,
        date: booking.date.format("%Y-%m-%d").to_string(),
        status: booking.status,
        at: booking.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
    }
}

pub fn publish(state: &AppState, kind: BookingEventKind, booking: &Booking) {
    let event = booking_event(kind, booking);
    tracing::debug!(booking_id = event.booking_id, kind = ?event.kind, "publishing booking event");
    // Broadcast to SSE subscribers; ignore if no receivers
    let _ = state.booking_tx.send(event);
}

/// Replays `backlog` as `Created` events, then follows `rx`.
///
/// `rx` must be subscribed before the backlog is read so nothing falls in
/// between; a creation seen by both is only emitted once. A subscriber that
/// lags skips the events it missed instead of ending the stream.
pub fn replay_then_follow(
    backlog: Vec<Booking>,
    rx: broadcast::Receiver<BookingEvent>,
) -> impl Stream<Item = BookingEvent> + Send + 'static {
    let replayed_up_to = backlog.iter().map(|b| b.id).max();
    let replay = tokio_stream::iter(
        backlog
            .into_iter()
            .map(|booking| booking_event(BookingEventKind::Created, &booking)),
    );

    let live = BroadcastStream::new(rx).filter_map(move |received| {
        let event = received.ok()?;
        let already_sent = matches!(event.kind, BookingEventKind::Created)
            && replayed_up_to.is_some_and(|last| event.booking_id <= last);
        (!already_sent).then_some(event)
    });

    replay.chain(live)
}

pub fn sse_event(event: &BookingEvent) -> Event {
    match Event::default().event(SSE_EVENT_NAME).json_data(event) {
        Ok(sse) => sse,
        Err(e) => {
            tracing::warn!(booking_id = event.booking_id, error = %e, "failed to encode booking event");
            Event::default().comment("dropped booking event")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BookingStatus;
    use chrono::NaiveDate;

    fn booking(id: i64, status: BookingStatus) -> Booking {
        let at = NaiveDate::from_ymd_opt(2026, 11, 2)
            .unwrap()
            .and_hms_opt(8, 15, 0)
            .unwrap();
        Booking {
            id,
            customer_id: 7,
            service_id: 3,
            date: NaiveDate::from_ymd_opt(2026, 11, 20).unwrap(),
            time: "09:00".to_string(),
            duration_minutes: 120,
            address: "1 Main St, Springfield, IL 62701".to_string(),
            special_instructions: None,
            property_type: None,
            property_size: None,
            cleaning_frequency: None,
            status,
            quoted_amount: None,
            created_at: at,
            updated_at: at,
        }
    }

    #[tokio::test]
    async fn test_replay_precedes_live_events_without_repeats() {
        let (tx, rx) = broadcast::channel(16);
        // created after subscribing but also picked up by the backlog read
        tx.send(booking_event(BookingEventKind::Created, &booking(2, BookingStatus::Requested)))
            .unwrap();
        tx.send(booking_event(
            BookingEventKind::StatusChanged,
            &booking(1, BookingStatus::Confirmed),
        ))
        .unwrap();
        tx.send(booking_event(BookingEventKind::Created, &booking(3, BookingStatus::Requested)))
            .unwrap();
        drop(tx);

        let backlog = vec![
            booking(1, BookingStatus::Requested),
            booking(2, BookingStatus::Requested),
        ];
        let seen: Vec<(i64, String)> = replay_then_follow(backlog, rx)
            .map(|e| (e.booking_id, format!("{:?}", e.kind)))
            .collect()
            .await;

        assert_eq!(
            seen,
            vec![
                (1, "Created".to_string()),
                (2, "Created".to_string()),
                (1, "StatusChanged".to_string()),
                (3, "Created".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_lagging_subscriber_keeps_streaming() {
        let (tx, rx) = broadcast::channel(1);
        for id in 1..=3 {
            tx.send(booking_event(BookingEventKind::Created, &booking(id, BookingStatus::Requested)))
                .unwrap();
        }
        drop(tx);

        let ids: Vec<i64> = replay_then_follow(vec![], rx)
            .map(|e| e.booking_id)
            .collect()
            .await;
        assert_eq!(ids, vec![3]);
    }

    #[test]
    fn test_sse_event_is_named() {
        let event = booking_event(BookingEventKind::Created, &booking(5, BookingStatus::Requested));
        let rendered = format!("{:?}", sse_event(&event));
        assert!(rendered.contains(SSE_EVENT_NAME));
        assert!(rendered.contains("booking_id"));
    }
}

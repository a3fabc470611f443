use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Domain events emitted by the booking services
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    CheckoutSessionCreated {
        session_id: String,
        booking_reference: String,
        total_minor: i64,
    },
    PaymentVerified {
        session_id: String,
        booking_reference: String,
    },
    PaymentCompleted {
        session_id: String,
        booking_reference: String,
        amount_total_minor: i64,
    },
    BookingUpserted {
        booking_reference: String,
        created: bool,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Fire-and-forget send; event loss is logged, never propagated into the
    /// request path
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("Dropping domain event: {}", e);
        }
    }
}

/// Consumes domain events and records them; the side-effecting fan-out lives
/// in the webhook processor, not here.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match event {
            Event::CheckoutSessionCreated {
                session_id,
                booking_reference,
                total_minor,
            } => {
                info!(
                    session_id,
                    booking_reference, total_minor, "checkout session created"
                );
            }
            Event::PaymentVerified {
                session_id,
                booking_reference,
            } => {
                info!(session_id, booking_reference, "payment verified");
            }
            Event::PaymentCompleted {
                session_id,
                booking_reference,
                amount_total_minor,
            } => {
                info!(
                    session_id,
                    booking_reference, amount_total_minor, "payment completed"
                );
            }
            Event::BookingUpserted {
                booking_reference,
                created,
            } => {
                info!(booking_reference, created, "booking record upserted");
            }
        }
    }

    info!("Event processing loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_flow_through_the_channel() {
        let (tx, mut rx) = mpsc::channel(8);
        let sender = EventSender::new(tx);

        sender
            .send(Event::BookingUpserted {
                booking_reference: "LDR-7XKQ2MNP".to_string(),
                created: true,
            })
            .await
            .unwrap();

        match rx.recv().await {
            Some(Event::BookingUpserted {
                booking_reference,
                created,
            }) => {
                assert_eq!(booking_reference, "LDR-7XKQ2MNP");
                assert!(created);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn send_into_a_closed_channel_reports_an_error() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);
        let result = sender
            .send(Event::PaymentVerified {
                session_id: "cs_test_1".to_string(),
                booking_reference: "LDR-7XKQ2MNP".to_string(),
            })
            .await;
        assert!(result.is_err());
        // send_or_log swallows the same failure
        sender
            .send_or_log(Event::PaymentVerified {
                session_id: "cs_test_1".to_string(),
                booking_reference: "LDR-7XKQ2MNP".to_string(),
            })
            .await;
    }
}

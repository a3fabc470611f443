//! Booking receipts: a printable HTML document rendered from a reconciled
//! booking. Served over HTTP for paid sessions and attached to the customer
//! confirmation email.

use std::sync::Arc;

use tracing::instrument;

use crate::errors::ServiceError;
use crate::models::Booking;
use crate::notifications::templates::{
    escape_html, OPENING_HOURS, STORAGE_ADDRESS_LOCALITY, STORAGE_ADDRESS_STREET,
};
use crate::services::verification::booking_from_session;
use crate::stripe::StripeClient;

/// Download filename for the receipt, both over HTTP and as a mail attachment
pub const RECEIPT_FILENAME: &str = "booking-confirmation.html";

// Kept free of format placeholders so the braces stay single.
const RECEIPT_STYLE: &str = r#"
  body { font-family: 'Helvetica Neue', Helvetica, Arial, sans-serif; color: #1a1a1a; margin: 0; background-color: #f3f4f6; }
  .card { max-width: 640px; margin: 24px auto; background: #ffffff; border-radius: 12px; overflow: hidden; border: 1px solid #e5e7eb; }
  .header { background-color: #064e3b; color: #ffffff; padding: 28px; text-align: center; }
  .header h1 { margin: 0; font-size: 22px; }
  .header p { margin: 6px 0 0 0; text-transform: uppercase; letter-spacing: 2px; font-size: 10px; color: #a7f3d0; }
  .body { padding: 32px; }
  .muted { color: #6b7280; font-size: 12px; }
  table.items { width: 100%; border-collapse: collapse; margin: 16px 0; }
  table.items th { text-align: left; font-size: 12px; color: #6b7280; border-bottom: 1px solid #e5e7eb; padding: 6px 0; }
  table.items td { padding: 8px 0; border-bottom: 1px solid #f3f4f6; font-size: 14px; }
  .total { text-align: right; font-size: 20px; font-weight: bold; margin-top: 12px; }
  .badge { display: inline-block; background-color: #d1fae5; color: #064e3b; font-size: 11px; font-weight: bold; padding: 3px 10px; border-radius: 9999px; letter-spacing: 1px; }
  .footer { background-color: #f3f4f6; padding: 16px; text-align: center; font-size: 12px; color: #9ca3af; }
  @media print { body { background: #ffffff; } .card { margin: 0; border: 0; } }
"#;

/// Serves receipts for paid checkout sessions
#[derive(Debug, Clone)]
pub struct ReceiptService {
    stripe: Arc<StripeClient>,
}

impl ReceiptService {
    pub fn new(stripe: Arc<StripeClient>) -> Self {
        Self { stripe }
    }

    /// Verifies the session with the provider, then renders the document.
    /// Unpaid sessions are refused rather than receiving a pending receipt.
    #[instrument(skip(self))]
    pub async fn receipt_for_session(&self, session_id: &str) -> Result<String, ServiceError> {
        if session_id.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "Missing session ID".to_string(),
            ));
        }

        let session = self.stripe.retrieve_checkout_session(session_id).await?;
        if !session.is_paid() {
            return Err(ServiceError::Forbidden(
                "Receipt is only available for paid bookings".to_string(),
            ));
        }

        let booking = booking_from_session(&session)?;
        Ok(render_receipt(&booking))
    }
}

/// Renders the printable receipt document for a reconciled booking
pub fn render_receipt(booking: &Booking) -> String {
    let reference = escape_html(&booking.booking_reference);
    let rows: String = booking
        .quantities
        .iter()
        .filter(|(_, quantity)| *quantity > 0)
        .map(|(size, quantity)| {
            let rate = size.rate_per_day();
            let per_day = rate * rust_decimal::Decimal::from(quantity);
            format!(
                "<tr><td>{} Bag</td><td>{}</td><td>€{:.2}/day</td><td>€{:.2}/day</td></tr>",
                size, quantity, rate, per_day
            )
        })
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8" />
<title>Booking Confirmation #{reference}</title>
<style>{style}</style>
</head>
<body>
<div class="card">
  <div class="header">
    <h1>Booking Confirmation</h1>
    <p>Luggage Deposit Rome</p>
  </div>
  <div class="body">
    <p><span class="badge">PAID</span></p>
    <p class="muted">REFERENCE</p>
    <p style="font-weight: bold; font-size: 18px; margin: 0 0 16px 0;">#{reference}</p>
    <p class="muted">CUSTOMER</p>
    <p style="margin: 0 0 16px 0;">{name}{contact}</p>
    <p class="muted">SCHEDULE</p>
    <p style="margin: 0 0 16px 0;">Drop-off: {drop_off}<br />Pick-up: {pick_up}<br />Duration: {days} Day(s)</p>
    <table class="items">
      <tr><th>Item</th><th>Qty</th><th>Rate</th><th>Line</th></tr>
      {rows}
    </table>
    <p class="muted" style="text-align: right;">Daily subtotal: €{per_day} × {days} Day(s)</p>
    <p class="total">Total Paid: €{total}</p>
    <p class="muted">DROP-OFF POINT</p>
    <p style="margin: 0;">{street}<br />{locality}<br />Opening Hours: {hours}</p>
    <p class="muted" style="margin-top: 20px;">Paid on {paid_on} &bull; Session {session_id}</p>
  </div>
  <div class="footer">&copy; Luggage Deposit Rome &bull; luggagedepositrome.com</div>
</div>
</body>
</html>"#,
        reference = reference,
        style = RECEIPT_STYLE,
        name = escape_html(&booking.customer.name),
        contact = contact_line(booking),
        drop_off = schedule_line(
            &booking.schedule.drop_off_date,
            booking.schedule.drop_off_time.as_deref()
        ),
        pick_up = schedule_line(
            &booking.schedule.pick_up_date,
            booking.schedule.pick_up_time.as_deref()
        ),
        days = booking.billable_days,
        rows = rows,
        per_day = format!("{:.2}", booking.per_day_subtotal),
        total = format!("{:.2}", booking.total_price),
        street = STORAGE_ADDRESS_STREET,
        locality = STORAGE_ADDRESS_LOCALITY,
        hours = OPENING_HOURS,
        paid_on = booking.created_at.format("%Y-%m-%d %H:%M UTC"),
        session_id = escape_html(&booking.provider_session_id),
    )
}

fn contact_line(booking: &Booking) -> String {
    let mut parts = Vec::new();
    if let Some(email) = &booking.customer.email {
        parts.push(escape_html(email));
    }
    if let Some(phone) = &booking.customer.phone {
        parts.push(escape_html(phone));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!("<br /><span class=\"muted\">{}</span>", parts.join(" &bull; "))
    }
}

fn schedule_line(date: &str, time: Option<&str>) -> String {
    match time {
        Some(time) => format!("{} at {}", escape_html(date), escape_html(time)),
        None => escape_html(date),
    }
}

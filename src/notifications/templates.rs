//! HTML bodies and subject lines for the post-payment emails.
//!
//! The customer confirmation mirrors the storefront branding; the operator
//! alert is a plain summary. All interpolated customer input is escaped.

use crate::models::Booking;
use crate::pricing::BagQuantities;

pub const STORAGE_ADDRESS_STREET: &str = "Via Gioberti, 42";
pub const STORAGE_ADDRESS_LOCALITY: &str = "00185 Roma RM, Italy (Near Termini Station)";
pub const OPENING_HOURS: &str = "09:00 - 19:00 Daily";
pub const BRAND_GREEN: &str = "#064e3b";

const EMAIL_FONT: &str =
    "font-family: 'Helvetica Neue', Helvetica, Arial, sans-serif; color: #1a1a1a; line-height: 1.6;";

/// Link to the hosted HTML receipt for a checkout session
pub fn receipt_url(site_url: &str, session_id: &str) -> String {
    format!(
        "{}/api/v1/receipts?session_id={}",
        site_url.trim_end_matches('/'),
        session_id
    )
}

pub fn customer_subject(booking_reference: &str) -> String {
    format!(
        "Booking Confirmed – Luggage Deposit Rome (Ref: #{})",
        booking_reference
    )
}

pub fn operator_subject(booking_reference: &str, customer_name: &str) -> String {
    format!(
        "New Paid Booking – Ref: #{} ({})",
        booking_reference, customer_name
    )
}

pub fn customer_confirmation_html(booking: &Booking, receipt_url: &str) -> String {
    format!(
        r#"<div style="{font} max-width: 600px; margin: 0 auto; border: 1px solid #eee; border-radius: 12px; overflow: hidden;">
  <div style="background-color: {green}; padding: 30px; text-align: center;">
    <h1 style="color: #ffffff; margin: 0; font-size: 24px;">Booking Confirmed!</h1>
    <p style="color: #a7f3d0; margin: 5px 0 0 0; text-transform: uppercase; letter-spacing: 2px; font-size: 10px; font-weight: bold;">Luggage Deposit Rome</p>
  </div>
  <div style="padding: 40px;">
    <p>Hi {name},</p>
    <p>Your luggage storage reservation has been confirmed. Below are your booking details:</p>
    <div style="background-color: #f9fafb; padding: 20px; border-radius: 8px; margin: 25px 0;">
      <table style="width: 100%; border-collapse: collapse;">
        <tr><td style="padding: 5px 0; font-size: 12px; color: #6b7280;">REFERENCE</td><td style="padding: 5px 0; text-align: right; font-weight: bold;">#{reference}</td></tr>
        <tr><td style="padding: 5px 0; font-size: 12px; color: #6b7280;">DROP-OFF</td><td style="padding: 5px 0; text-align: right; font-weight: bold;">{drop_off}</td></tr>
        <tr><td style="padding: 5px 0; font-size: 12px; color: #6b7280;">PICK-UP</td><td style="padding: 5px 0; text-align: right; font-weight: bold;">{pick_up}</td></tr>
        <tr><td style="padding: 5px 0; font-size: 12px; color: #6b7280;">DURATION</td><td style="padding: 5px 0; text-align: right; font-weight: bold;">{days} Day(s)</td></tr>
      </table>
      <hr style="border: 0; border-top: 1px solid #e5e7eb; margin: 15px 0;" />
      <p style="font-size: 12px; color: #6b7280; margin-bottom: 5px;">ITEMS:</p>
      <ul style="margin: 0; padding-left: 18px; font-size: 14px;">{items}</ul>
      <p style="text-align: right; font-size: 20px; font-weight: bold; margin-top: 15px;">Total Paid: €{total}</p>
    </div>
    <h3 style="font-size: 16px; margin-bottom: 10px;">Drop-off Point:</h3>
    <p style="margin: 0; font-weight: bold;">{street}</p>
    <p style="margin: 0; color: #6b7280; font-size: 14px;">{locality}</p>
    <p style="margin: 10px 0 0 0; font-size: 13px; font-style: italic;">Opening Hours: {hours}</p>
    <div style="margin-top: 40px; text-align: center;">
      <a href="{receipt_url}" style="background-color: {green}; color: #ffffff; padding: 14px 28px; text-decoration: none; border-radius: 8px; font-weight: bold; display: inline-block;">View Booking Confirmation</a>
    </div>
  </div>
  <div style="background-color: #f3f4f6; padding: 20px; text-align: center; font-size: 12px; color: #9ca3af;">
    <p style="margin: 0;">&copy; Luggage Deposit Rome &bull; luggagedepositrome.com</p>
  </div>
</div>"#,
        font = EMAIL_FONT,
        green = BRAND_GREEN,
        name = escape_html(&booking.customer.name),
        reference = escape_html(&booking.booking_reference),
        drop_off = escape_html(&booking.schedule.drop_off_date),
        pick_up = escape_html(&booking.schedule.pick_up_date),
        days = booking.billable_days,
        items = bag_list_items(&booking.quantities),
        total = format_eur(booking),
        street = STORAGE_ADDRESS_STREET,
        locality = STORAGE_ADDRESS_LOCALITY,
        hours = OPENING_HOURS,
        receipt_url = receipt_url,
    )
}

pub fn operator_alert_html(booking: &Booking, receipt_url: &str) -> String {
    format!(
        r#"<div style="{font}">
  <h2>New Paid Booking Received!</h2>
  <p>A new luggage storage booking has been completed.</p>
  <ul>
    <li><strong>Customer:</strong> {name}</li>
    <li><strong>Email:</strong> {email}</li>
    <li><strong>Phone:</strong> {phone}</li>
    <li><strong>Dates:</strong> {drop_off} to {pick_up}</li>
    <li><strong>Duration:</strong> {days} days</li>
    <li><strong>Amount Paid:</strong> €{total}</li>
  </ul>
  <p>Items booked:</p>
  <ul>{items}</ul>
  <p><a href="{receipt_url}">Click here to view the booking receipt</a></p>
</div>"#,
        font = EMAIL_FONT,
        name = escape_html(&booking.customer.name),
        email = escape_html(booking.customer.email.as_deref().unwrap_or("not provided")),
        phone = escape_html(booking.customer.phone.as_deref().unwrap_or("not provided")),
        drop_off = escape_html(&booking.schedule.drop_off_date),
        pick_up = escape_html(&booking.schedule.pick_up_date),
        days = booking.billable_days,
        total = format_eur(booking),
        items = bag_list_items(&booking.quantities),
        receipt_url = receipt_url,
    )
}

/// `<li>` rows for every size with at least one bag
fn bag_list_items(quantities: &BagQuantities) -> String {
    quantities
        .iter()
        .filter(|(_, qty)| *qty > 0)
        .map(|(size, qty)| format!("<li><strong>{}x</strong> {} Bag(s)</li>", qty, size))
        .collect()
}

fn format_eur(booking: &Booking) -> String {
    format!("{:.2}", booking.total_price)
}

/// Replaces the characters that change meaning inside an HTML document
pub(crate) fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
